//! Pixel-format conversion into the persistent delivery buffer.

use ffmpeg_next as ffmpeg;
use ffmpeg::software::scaling;

use crate::{Error, Result};

/// Converts decoded video frames to packed RGBA at identical spatial size.
///
/// Owns the single persistent delivery buffer: exactly `width * 4 * height`
/// bytes with a tight `width * 4` stride, allocated once and overwritten by
/// every conversion. There is no retained history and no resizing.
pub(crate) struct FrameConverter {
	scaler: scaling::Context,

	/// Scaler output; its row stride may carry FFmpeg alignment padding.
	scratch: ffmpeg::frame::Video,

	/// The delivery buffer.
	buffer: Vec<u8>,

	width: usize,
	height: usize,
}

impl FrameConverter {
	pub fn new(format: ffmpeg::format::Pixel, width: u32, height: u32) -> Result<Self> {
		let scaler = scaling::Context::get(
			format,
			width,
			height,
			ffmpeg::format::Pixel::RGBA,
			width,
			height,
			scaling::Flags::BILINEAR,
		)
		.map_err(|err| Error::DecoderInit(err.to_string()))?;

		let (width, height) = (width as usize, height as usize);

		Ok(Self {
			scaler,
			scratch: ffmpeg::frame::Video::empty(),
			buffer: vec![0; width * 4 * height],
			width,
			height,
		})
	}

	/// Converts one frame into the delivery buffer, returning the buffer and
	/// its stride. Fails if the frame does not match the configured input.
	pub fn convert(
		&mut self,
		frame: &ffmpeg::frame::Video,
	) -> std::result::Result<(&[u8], usize), ffmpeg::Error> {
		self.scaler.run(frame, &mut self.scratch)?;

		// Compact the scaler output into the tight delivery stride.
		let stride = self.width * 4;
		let Self { scratch, buffer, height, .. } = self;
		let src_stride = scratch.stride(0);
		let src = scratch.data(0);

		for row in 0..*height {
			let dst = &mut buffer[row * stride..(row + 1) * stride];
			dst.copy_from_slice(&src[row * src_stride..row * src_stride + stride]);
		}

		Ok((&self.buffer, stride))
	}
}
