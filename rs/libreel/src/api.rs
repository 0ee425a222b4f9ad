use std::ffi::{CString, c_char, c_void};

use crate::Error;
use crate::ffi::{self, UserData};

/// An opened player. Opaque to C: create with [reel_create], destroy with
/// [reel_free].
pub struct ReelPlayer {
	player: reel::Player,

	/// NUL-terminated copy of the most recent failure, handed out by
	/// [reel_error]. Empty when there is none.
	error: CString,
}

impl ReelPlayer {
	fn refresh_error(&mut self) {
		self.error = match self.player.last_error() {
			Some(err) => CString::new(err.to_string()).unwrap_or_default(),
			None => CString::default(),
		};
	}
}

/// Called on the decode thread for every delivered video frame.
///
/// `data` is packed RGBA, `size` bytes long with `stride` bytes per row,
/// valid only during the call.
pub type OnVideoFrame = Option<
	extern "C" fn(user_data: *mut c_void, time: f64, data: *const u8, size: usize, stride: usize),
>;

/// Called on the decode thread for every decoded audio frame.
///
/// `planes` holds `plane_count` pointers (1 or 2) to float sample data and
/// `sample_count` is the per-channel frame count; when `interleaved` is
/// set, plane 0 holds interleaved channel data instead of one plane per
/// channel. Valid only during the call.
pub type OnAudioSamples = Option<
	extern "C" fn(
		user_data: *mut c_void,
		planes: *const *const f32,
		plane_count: usize,
		sample_count: usize,
		interleaved: bool,
	),
>;

/// Called on the decode thread exactly once per play, after decoding has
/// fully ceased.
pub type OnStop = Option<extern "C" fn(user_data: *mut c_void)>;

/// Create a new player.
///
/// Returns a handle that must be released with [reel_free].
#[unsafe(no_mangle)]
pub extern "C" fn reel_create() -> *mut ReelPlayer {
	Box::into_raw(Box::new(ReelPlayer {
		player: reel::Player::new(),
		error: CString::default(),
	}))
}

/// Destroy a player, stopping any playback in progress first.
///
/// # Safety
/// - The caller must ensure that player came from [reel_create] and is not
///   used afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_free(player: *mut ReelPlayer) {
	if player.is_null() {
		return;
	}

	// Dropping the player stops playback and joins the decode thread.
	drop(unsafe { Box::from_raw(player) });
}

/// Open a media container.
///
/// Returns 1 on success, 0 when the container cannot be opened (see
/// [reel_error]), or a negative code on invalid arguments.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
/// - The caller must ensure that path is a valid null-terminated C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_open(player: *mut ReelPlayer, path: *const c_char) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_mut() }.ok_or(Error::InvalidPointer)?;
		let path = unsafe { ffi::parse_str(path)? };

		let opened = player.player.open(path).is_ok();
		player.refresh_error();

		Ok(opened)
	})
}

/// Start playback.
///
/// A run already in progress is stopped first. The callbacks fire on the
/// decode thread until the stop callback fires, exactly once per call to
/// this function. Returns 0 on success or a negative code on invalid
/// arguments.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
/// - The caller must ensure each callback is a valid function pointer, or
///   null.
/// - The caller must ensure user_data is safe to use from the decode thread
///   for the duration of the run.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_play(
	player: *mut ReelPlayer,
	on_video: OnVideoFrame,
	on_audio: OnAudioSamples,
	on_stop: OnStop,
	user_data: *mut c_void,
) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_mut() }.ok_or(Error::InvalidPointer)?;
		let data = UserData::new(user_data);

		player.player.play(
			move |frame| {
				if let Some(on_video) = on_video {
					on_video(
						data.get(),
						frame.time,
						frame.data.as_ptr(),
						frame.data.len(),
						frame.stride,
					);
				}
			},
			move |audio| {
				if let Some(on_audio) = on_audio {
					let mut planes = [std::ptr::null(); 2];
					for (slot, plane) in planes.iter_mut().zip(audio.planes) {
						*slot = plane.as_ptr();
					}

					on_audio(
						data.get(),
						planes.as_ptr(),
						audio.planes.len(),
						audio.sample_count,
						audio.interleaved,
					);
				}
			},
			move || {
				if let Some(on_stop) = on_stop {
					on_stop(data.get());
				}
			},
		);

		Ok(())
	})
}

/// Stop playback, blocking until the decode thread has exited and the stop
/// callback has returned. Safe to call repeatedly. Must not be called from
/// a callback.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_stop(player: *mut ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_mut() }.ok_or(Error::InvalidPointer)?;
		player.player.stop();
		Ok(())
	})
}

/// Whether the last run reached its end (end of container, read failure, or
/// stop). Returns 1 or 0, or a negative code on invalid arguments.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_at_end(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.at_end())
	})
}

/// The most recent failure as a NUL-terminated string, empty when there is
/// none. The pointer is owned by the handle and stays valid until the next
/// [reel_open] or [reel_free] call. Null on an invalid handle.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_error(player: *const ReelPlayer) -> *const c_char {
	match unsafe { player.as_ref() } {
		Some(player) => player.error.as_ptr(),
		None => std::ptr::null(),
	}
}

/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_has_video(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.has_video())
	})
}

/// Video width in pixels, 0 without a video stream.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_width(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.width() as i32)
	})
}

/// Video height in pixels, 0 without a video stream.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_height(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.height() as i32)
	})
}

/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_has_audio(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.has_audio())
	})
}

/// Audio sample rate in samples per second, 0 without an audio stream.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_audio_sample_rate(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.audio_sample_rate() as i32)
	})
}

/// Audio channel count, 0 without an audio stream.
///
/// # Safety
/// - The caller must ensure that player is a valid handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reel_audio_channels(player: *const ReelPlayer) -> i32 {
	ffi::return_code(|| {
		let player = unsafe { player.as_ref() }.ok_or(Error::InvalidPointer)?;
		Ok(player.player.audio_channels() as i32)
	})
}
