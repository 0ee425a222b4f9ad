//! Stream decoders with a submit/drain protocol.
//!
//! Each decoder owns one reusable frame slot. The slot is overwritten on
//! every drain call, so a received frame is a short-lived view, valid only
//! until the next call on the same decoder.

use ffmpeg_next as ffmpeg;
use ffmpeg::codec;
use ffmpeg::codec::packet::Packet;

use crate::source::StreamDesc;
use crate::{Error, Result};

/// Looks up the stream's decoder and transfers its codec parameters.
fn open_context(desc: &StreamDesc) -> Result<codec::Context> {
	let id = desc.parameters.id();
	if codec::decoder::find(id).is_none() {
		return Err(Error::UnsupportedCodec(format!("{id:?}")));
	}

	codec::Context::from_parameters(desc.parameters.clone())
		.map_err(|err| Error::DecoderInit(err.to_string()))
}

/// Decoder for the selected video stream.
pub(crate) struct VideoDecoder {
	decoder: codec::decoder::Video,
	frame: ffmpeg::frame::Video,
}

impl VideoDecoder {
	pub fn new(desc: &StreamDesc) -> Result<Self> {
		let decoder = open_context(desc)?
			.decoder()
			.video()
			.map_err(|err| Error::DecoderInit(err.to_string()))?;

		Ok(Self {
			decoder,
			frame: ffmpeg::frame::Video::empty(),
		})
	}

	pub fn width(&self) -> u32 {
		self.decoder.width()
	}

	pub fn height(&self) -> u32 {
		self.decoder.height()
	}

	pub fn format(&self) -> ffmpeg::format::Pixel {
		self.decoder.format()
	}

	/// Feeds one compressed packet. A rejected packet is dropped; the
	/// decoder stays usable for the next one.
	pub fn submit(&mut self, packet: &Packet) -> bool {
		match self.decoder.send_packet(packet) {
			Ok(()) => true,
			Err(err) => {
				tracing::trace!(%err, "video packet rejected");
				false
			}
		}
	}

	/// Drains the next decoded frame into the slot, or None once the decoder
	/// has nothing more to emit for the submitted input.
	pub fn receive(&mut self) -> Option<&ffmpeg::frame::Video> {
		match self.decoder.receive_frame(&mut self.frame) {
			Ok(()) => Some(&self.frame),
			Err(_) => None,
		}
	}
}

/// Decoder for the selected audio stream.
pub(crate) struct AudioDecoder {
	decoder: codec::decoder::Audio,
	frame: ffmpeg::frame::Audio,
}

impl AudioDecoder {
	pub fn new(desc: &StreamDesc) -> Result<Self> {
		let decoder = open_context(desc)?
			.decoder()
			.audio()
			.map_err(|err| Error::DecoderInit(err.to_string()))?;

		Ok(Self {
			decoder,
			frame: ffmpeg::frame::Audio::empty(),
		})
	}

	pub fn rate(&self) -> u32 {
		self.decoder.rate()
	}

	pub fn channels(&self) -> u16 {
		self.decoder.channels()
	}

	pub fn submit(&mut self, packet: &Packet) -> bool {
		match self.decoder.send_packet(packet) {
			Ok(()) => true,
			Err(err) => {
				tracing::trace!(%err, "audio packet rejected");
				false
			}
		}
	}

	pub fn receive(&mut self) -> Option<&ffmpeg::frame::Audio> {
		match self.decoder.receive_frame(&mut self.frame) {
			Ok(()) => Some(&self.frame),
			Err(_) => None,
		}
	}
}
