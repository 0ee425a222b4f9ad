/// Failures reported to C callers as negative return codes.
///
/// Playback failures are not listed here: they surface through the zero
/// result of `reel_open` and the `reel_error` string, like the native API.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("invalid pointer")]
	InvalidPointer,

	#[error("invalid string")]
	InvalidString,

	#[error("panic")]
	Panic,
}

impl Error {
	/// The negative code crossing the FFI boundary.
	pub fn code(&self) -> i32 {
		match self {
			Self::InvalidPointer => -1,
			Self::InvalidString => -2,
			Self::Panic => -3,
		}
	}
}

impl From<std::str::Utf8Error> for Error {
	fn from(_: std::str::Utf8Error) -> Self {
		Error::InvalidString
	}
}
