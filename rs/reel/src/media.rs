//! The media session driven by the decode loop.
//!
//! [`Media`] is the narrow seam between the playback engine and the
//! demux/decode/convert stack: the engine only routes packets and paces
//! video, everything FFmpeg-specific lives behind the trait. Engine tests
//! drive the loop with a scripted implementation instead.

use std::path::Path;

use ffmpeg_next as ffmpeg;
use ffmpeg::codec::packet::Packet;
use ffmpeg::format::Sample;
use ffmpeg::format::sample::Type as SampleType;

use crate::convert::FrameConverter;
use crate::decode::{AudioDecoder, VideoDecoder};
use crate::frame::{AudioSamples, VideoFrame};
use crate::source::{MediaSource, StreamDesc};
use crate::{Error, Result};

/// Header of the most recently read packet.
pub(crate) struct PacketHeader {
	/// Index of the stream the packet belongs to.
	pub stream: usize,

	/// Decode timestamp in stream time-base ticks.
	pub pts: Option<i64>,
}

/// Fixed video stream properties, captured once at open.
#[derive(Clone, Copy, Debug)]
pub(crate) struct VideoProps {
	pub width: u32,
	pub height: u32,
}

/// Fixed audio stream properties, captured once at open.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AudioProps {
	pub sample_rate: u32,
	pub channels: u16,
}

/// What the decode loop needs from an opened container and its decoders.
///
/// `read_packet` stages the next packet; `decode_audio` and `decode_video`
/// run the staged packet through the matching decoder and hand every
/// produced frame to the sink. Frames are views into reusable slots, valid
/// only for the duration of the sink call.
pub(crate) trait Media: Send {
	fn video_stream(&self) -> Option<usize>;
	fn audio_stream(&self) -> Option<usize>;

	/// Seconds per tick of the video stream's timestamps.
	fn video_time_base(&self) -> f64;

	/// Advances to the next packet, or None at end of stream.
	fn read_packet(&mut self) -> Option<PacketHeader>;

	fn decode_audio(&mut self, sink: &mut dyn FnMut(AudioSamples<'_>));
	fn decode_video(&mut self, time: f64, sink: &mut dyn FnMut(VideoFrame<'_>));
}

/// The selected video stream: decoder plus converter.
struct VideoStream {
	index: usize,
	time_base: f64,
	decoder: VideoDecoder,
	converter: FrameConverter,
}

impl VideoStream {
	fn new(desc: &StreamDesc) -> Result<Self> {
		let decoder = VideoDecoder::new(desc)?;
		let converter = FrameConverter::new(decoder.format(), decoder.width(), decoder.height())?;

		Ok(Self {
			index: desc.index,
			time_base: desc.time_base,
			decoder,
			converter,
		})
	}
}

struct AudioStream {
	index: usize,
	decoder: AudioDecoder,
}

/// The FFmpeg-backed session: container, decoders, converter, and the
/// reusable packet slot.
pub(crate) struct FfmpegMedia {
	source: MediaSource,
	video: Option<VideoStream>,
	audio: Option<AudioStream>,
	packet: Packet,

	/// Most recent per-stream setup failure, if any.
	setup_error: Option<Error>,
}

// SAFETY: the session is owned by one engine and touched by at most one
// thread at a time: open() runs on the caller thread before any worker is
// spawned, and afterwards only the worker uses it, serialized by the
// engine's session mutex and thread join.
unsafe impl Send for FfmpegMedia {}

impl FfmpegMedia {
	/// Opens a container and brings up a decoder per selected stream.
	///
	/// A stream whose decoder (or converter) fails to initialize is dropped
	/// from the session; the failure is retained but does not prevent
	/// playback of the other stream.
	pub fn open(path: &Path) -> Result<Self> {
		let source = MediaSource::open(path)?;
		let mut setup_error = None;

		let video = source.video().and_then(|desc| match VideoStream::new(desc) {
			Ok(stream) => Some(stream),
			Err(err) => {
				tracing::warn!(%err, stream = desc.index, "video stream unavailable");
				setup_error = Some(err);
				None
			}
		});

		let audio = source.audio().and_then(|desc| match AudioDecoder::new(desc) {
			Ok(decoder) => Some(AudioStream { index: desc.index, decoder }),
			Err(err) => {
				tracing::warn!(%err, stream = desc.index, "audio stream unavailable");
				setup_error = Some(err);
				None
			}
		});

		Ok(Self {
			source,
			video,
			audio,
			packet: Packet::empty(),
			setup_error,
		})
	}

	pub fn take_setup_error(&mut self) -> Option<Error> {
		self.setup_error.take()
	}

	pub fn video_props(&self) -> Option<VideoProps> {
		self.video.as_ref().map(|v| VideoProps {
			width: v.decoder.width(),
			height: v.decoder.height(),
		})
	}

	pub fn audio_props(&self) -> Option<AudioProps> {
		self.audio.as_ref().map(|a| AudioProps {
			sample_rate: a.decoder.rate(),
			channels: a.decoder.channels(),
		})
	}
}

impl Media for FfmpegMedia {
	fn video_stream(&self) -> Option<usize> {
		self.video.as_ref().map(|v| v.index)
	}

	fn audio_stream(&self) -> Option<usize> {
		self.audio.as_ref().map(|a| a.index)
	}

	fn video_time_base(&self) -> f64 {
		self.video.as_ref().map(|v| v.time_base).unwrap_or(1.0)
	}

	fn read_packet(&mut self) -> Option<PacketHeader> {
		if !self.source.read_packet(&mut self.packet) {
			return None;
		}

		Some(PacketHeader {
			stream: self.packet.stream(),
			pts: self.packet.pts().or_else(|| self.packet.dts()),
		})
	}

	fn decode_audio(&mut self, sink: &mut dyn FnMut(AudioSamples<'_>)) {
		let Some(audio) = self.audio.as_mut() else {
			return;
		};

		if !audio.decoder.submit(&self.packet) {
			return;
		}

		while let Some(frame) = audio.decoder.receive() {
			forward_samples(frame, sink);
		}
	}

	fn decode_video(&mut self, time: f64, sink: &mut dyn FnMut(VideoFrame<'_>)) {
		let Some(video) = self.video.as_mut() else {
			return;
		};

		if !video.decoder.submit(&self.packet) {
			return;
		}

		while let Some(frame) = video.decoder.receive() {
			match video.converter.convert(frame) {
				Ok((data, stride)) => sink(VideoFrame { time, data, stride }),
				Err(err) => tracing::trace!(%err, "conversion failed, skipping frame"),
			}
		}
	}
}

/// Hands one decoded audio frame to the sink as float planes.
///
/// Only 32-bit float layouts are forwarded; anything else is skipped rather
/// than reinterpreted.
fn forward_samples(frame: &ffmpeg::frame::Audio, sink: &mut dyn FnMut(AudioSamples<'_>)) {
	let interleaved = match frame.format() {
		Sample::F32(SampleType::Packed) => true,
		Sample::F32(SampleType::Planar) => false,
		format => {
			tracing::trace!(?format, "unsupported sample format, skipping frame");
			return;
		}
	};

	let count = frame.planes().min(2);
	let mut planes: [&[f32]; 2] = [&[], &[]];
	for (index, slot) in planes.iter_mut().take(count).enumerate() {
		*slot = frame.plane::<f32>(index);
	}

	sink(AudioSamples {
		planes: &planes[..count],
		sample_count: frame.samples(),
		interleaved,
	});
}
