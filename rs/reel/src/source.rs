//! Container demuxing.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::codec;
use ffmpeg::format;
use ffmpeg::media;

use crate::{Error, Result};

/// A selected elementary stream, immutable after open.
pub(crate) struct StreamDesc {
	pub index: usize,

	/// Seconds per timestamp tick.
	pub time_base: f64,

	pub parameters: codec::Parameters,
}

/// An opened container, yielding packets in container order.
pub(crate) struct MediaSource {
	input: format::context::Input,
	video: Option<StreamDesc>,
	audio: Option<StreamDesc>,
}

impl MediaSource {
	/// Opens and probes a container, selecting the first video and the first
	/// audio stream. Any other stream is ignored.
	pub fn open(path: &Path) -> Result<Self> {
		// Registers codecs and formats; idempotent.
		ffmpeg::init().map_err(|err| Error::Open(err.to_string()))?;

		let input = format::input(&path).map_err(|err| Error::Open(err.to_string()))?;

		let mut video = None;
		let mut audio = None;

		for stream in input.streams() {
			let slot = match stream.parameters().medium() {
				media::Type::Video => &mut video,
				media::Type::Audio => &mut audio,
				_ => continue,
			};

			if slot.is_none() {
				*slot = Some(StreamDesc {
					index: stream.index(),
					time_base: f64::from(stream.time_base()),
					parameters: stream.parameters(),
				});
			}
		}

		tracing::debug!(
			video = video.as_ref().map(|s| s.index),
			audio = audio.as_ref().map(|s| s.index),
			"opened container"
		);

		Ok(Self { input, video, audio })
	}

	pub fn video(&self) -> Option<&StreamDesc> {
		self.video.as_ref()
	}

	pub fn audio(&self) -> Option<&StreamDesc> {
		self.audio.as_ref()
	}

	/// Reads the next packet in container order into `packet`.
	///
	/// Returns false once the container is exhausted or on an unrecoverable
	/// read error; the two are not distinguished here.
	pub fn read_packet(&mut self, packet: &mut codec::packet::Packet) -> bool {
		match packet.read(&mut self.input) {
			Ok(()) => true,
			Err(ffmpeg::Error::Eof) => false,
			Err(err) => {
				tracing::debug!(%err, "read failed, treating as end of stream");
				false
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn open_missing_file_fails() {
		let err = MediaSource::open(Path::new("/no/such/container.mp4")).unwrap_err();
		assert!(matches!(err, Error::Open(_)));
		assert!(!err.to_string().is_empty());
	}
}
