/// A list of possible errors produced while opening media.
///
/// Decode errors during playback are deliberately absent: the engine skips
/// the offending packet and keeps going.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
	/// The container could not be opened or probed.
	#[error("failed to open container: {0}")]
	Open(String),

	/// No decoder is registered for the stream's codec.
	#[error("unsupported codec: {0}")]
	UnsupportedCodec(String),

	/// Decoder allocation, parameter transfer, or open failed.
	///
	/// Also covers converter setup, which is part of bringing up the video
	/// stream.
	#[error("failed to initialize decoder: {0}")]
	DecoderInit(String),
}

pub type Result<T> = std::result::Result<T, Error>;
