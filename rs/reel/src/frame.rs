//! Callback payloads delivered during playback.
//!
//! Both payloads are borrowed views into engine-owned buffers that are
//! overwritten by the next frame: read them during the callback, copy what
//! you need, and let them go.

/// One converted video frame.
///
/// Pixels are packed RGBA, row-major, with a tight stride: `data` is exactly
/// `stride * height` bytes and `stride` is exactly `width * 4`.
#[derive(Clone, Copy, Debug)]
pub struct VideoFrame<'a> {
	/// Presentation time in seconds, relative to the start of playback.
	pub time: f64,

	/// The packed pixel data.
	pub data: &'a [u8],

	/// Bytes per row.
	pub stride: usize,
}

/// One decoded audio frame.
///
/// Audio is forwarded as fast as it decodes, without wall-clock pacing;
/// downstream output owns its own timing and buffering.
#[derive(Clone, Copy, Debug)]
pub struct AudioSamples<'a> {
	/// One plane per channel, or a single plane of interleaved channel data
	/// when `interleaved` is set. At most two planes.
	pub planes: &'a [&'a [f32]],

	/// Samples per channel in this frame.
	pub sample_count: usize,

	/// True when plane 0 holds interleaved channel data.
	pub interleaved: bool,
}

/// Called on the worker thread for every delivered video frame.
pub type OnVideoFrame = Box<dyn FnMut(VideoFrame<'_>) + Send>;

/// Called on the worker thread for every decoded audio frame.
pub type OnAudioSamples = Box<dyn FnMut(AudioSamples<'_>) + Send>;

/// Called on the worker thread exactly once per play, after decoding has
/// fully ceased.
pub type OnStop = Box<dyn FnOnce() + Send>;
