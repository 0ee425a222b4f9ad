use std::ffi::{CStr, c_char, c_void};

use crate::Error;

/// Runs an FFI entry point, translating panics into an error code so they
/// never unwind across the C boundary.
pub fn return_code<C: ReturnCode, F: FnOnce() -> C>(f: F) -> i32 {
	match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
		Ok(ret) => ret.code(),
		Err(_) => Error::Panic.code(),
	}
}

pub trait ReturnCode {
	fn code(&self) -> i32;
}

impl ReturnCode for i32 {
	fn code(&self) -> i32 {
		*self
	}
}

impl ReturnCode for Result<(), Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(()) => 0,
			Err(e) => e.code(),
		}
	}
}

// Boolean-as-integer results: 1 for true, 0 for false.
impl ReturnCode for Result<bool, Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(value) => i32::from(*value),
			Err(e) => e.code(),
		}
	}
}

impl ReturnCode for Result<i32, Error> {
	fn code(&self) -> i32 {
		match self {
			Ok(code) => *code,
			Err(e) => e.code(),
		}
	}
}

/// # Safety
///
/// The caller must ensure that cstr is valid for 'a.
pub unsafe fn parse_str<'a>(cstr: *const c_char) -> Result<&'a str, Error> {
	if cstr.is_null() {
		return Err(Error::InvalidPointer);
	}

	let string = unsafe { CStr::from_ptr(cstr) };
	Ok(string.to_str()?)
}

/// A caller-supplied context pointer handed back through every callback.
#[derive(Clone, Copy)]
pub struct UserData(*mut c_void);

impl UserData {
	pub fn new(ptr: *mut c_void) -> Self {
		Self(ptr)
	}

	pub fn get(&self) -> *mut c_void {
		self.0
	}
}

// SAFETY: the pointer is moved into the playback callbacks and handed back
// to C on the decode thread. The C side must guarantee it is safe to use
// from that thread for the lifetime of the run.
unsafe impl Send for UserData {}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn panics_become_codes() {
		let code = return_code(|| -> Result<(), Error> { panic!("boom") });
		assert_eq!(code, Error::Panic.code());
	}

	#[test]
	fn results_map_to_codes() {
		assert_eq!(return_code(|| -> Result<(), Error> { Ok(()) }), 0);
		assert_eq!(return_code(|| -> Result<bool, Error> { Ok(true) }), 1);
		assert_eq!(return_code(|| -> Result<bool, Error> { Ok(false) }), 0);
		assert_eq!(
			return_code(|| -> Result<i32, Error> { Err(Error::InvalidPointer) }),
			Error::InvalidPointer.code()
		);
	}

	#[test]
	fn null_strings_are_rejected() {
		let result = unsafe { parse_str(std::ptr::null()) };
		assert!(matches!(result, Err(Error::InvalidPointer)));
	}
}
