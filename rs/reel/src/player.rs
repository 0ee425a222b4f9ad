//! The public playback facade.

use std::path::Path;

use crate::engine::PlaybackEngine;
use crate::frame::{AudioSamples, VideoFrame};
use crate::{Error, Result};

/// A single-stream media player.
///
/// One `Player` owns one playback engine: [`open`](Player::open) a
/// container, then start a run with [`play`](Player::play). Decoding happens
/// on a background worker thread and every callback runs there, inline with
/// the pacing logic.
///
/// Callbacks must be non-blocking, must not retain the borrowed payloads
/// past their return, and must never call [`stop`](Player::stop) on the same
/// player (the worker would deadlock joining itself).
pub struct Player {
	engine: PlaybackEngine,
}

impl Player {
	pub fn new() -> Self {
		Self {
			engine: PlaybackEngine::new(),
		}
	}

	/// Opens a media container and prepares the first video and first audio
	/// stream for playback.
	///
	/// On failure the player stays usable for inspection: the error is also
	/// retained for [`last_error`](Player::last_error), which additionally
	/// reports per-stream decoder failures that did not fail the open as a
	/// whole.
	pub fn open(&mut self, path: impl AsRef<Path>) -> Result<()> {
		self.engine.open(path.as_ref())
	}

	/// Starts playback, stopping any run already in progress first (its stop
	/// callback fires before the new run begins).
	///
	/// Returns immediately. Video frames are delivered paced against a wall
	/// clock derived from stream timestamps; audio is forwarded as fast as
	/// it decodes. After a run ends, playing again resumes from wherever the
	/// demux cursor stopped.
	pub fn play(
		&mut self,
		on_video: impl FnMut(VideoFrame<'_>) + Send + 'static,
		on_audio: impl FnMut(AudioSamples<'_>) + Send + 'static,
		on_stop: impl FnOnce() + Send + 'static,
	) {
		self.engine
			.play(Box::new(on_video), Box::new(on_audio), Box::new(on_stop));
	}

	/// Stops playback and blocks until decoding has fully ceased and the
	/// stop callback has returned. Idempotent.
	pub fn stop(&mut self) {
		self.engine.stop();
	}

	/// True once a run ended (container exhausted, read failure, or
	/// [`stop`](Player::stop)), until the next [`play`](Player::play).
	pub fn at_end(&self) -> bool {
		self.engine.at_end()
	}

	/// The most recent open or stream-setup failure.
	pub fn last_error(&self) -> Option<&Error> {
		self.engine.last_error()
	}

	pub fn has_video(&self) -> bool {
		self.engine.video().is_some()
	}

	/// Video width in pixels, or 0 without a video stream.
	pub fn width(&self) -> u32 {
		self.engine.video().map(|v| v.width).unwrap_or(0)
	}

	/// Video height in pixels, or 0 without a video stream.
	pub fn height(&self) -> u32 {
		self.engine.video().map(|v| v.height).unwrap_or(0)
	}

	pub fn has_audio(&self) -> bool {
		self.engine.audio().is_some()
	}

	/// Audio sample rate in samples per second, or 0 without an audio
	/// stream.
	pub fn audio_sample_rate(&self) -> u32 {
		self.engine.audio().map(|a| a.sample_rate).unwrap_or(0)
	}

	/// Audio channel count, or 0 without an audio stream.
	pub fn audio_channels(&self) -> u16 {
		self.engine.audio().map(|a| a.channels).unwrap_or(0)
	}
}

impl Default for Player {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn queries_are_empty_before_open() {
		let player = Player::new();

		assert!(!player.has_video());
		assert!(!player.has_audio());
		assert_eq!(player.width(), 0);
		assert_eq!(player.height(), 0);
		assert_eq!(player.audio_sample_rate(), 0);
		assert_eq!(player.audio_channels(), 0);
		assert!(!player.at_end());
		assert!(player.last_error().is_none());
	}

	#[test]
	fn open_missing_file_retains_the_error() {
		let mut player = Player::new();

		let err = player.open("/no/such/container.mp4").unwrap_err();
		assert!(matches!(err, Error::Open(_)));

		// The player stays inspectable but reports no streams.
		assert_eq!(player.last_error(), Some(&err));
		assert!(!player.has_video());
		assert!(!player.has_audio());
	}
}
