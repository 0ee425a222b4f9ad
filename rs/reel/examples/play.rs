// cargo run --example play -- <media file>
//
// Plays a file and prints delivery statistics when it finishes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

use anyhow::Context;

fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let path = std::env::args()
		.nth(1)
		.context("usage: play <media file>")?;

	let mut player = reel::Player::new();
	player.open(&path)?;

	if player.has_video() {
		println!("video: {}x{}", player.width(), player.height());
	}
	if player.has_audio() {
		println!(
			"audio: {} Hz, {} channels",
			player.audio_sample_rate(),
			player.audio_channels()
		);
	}

	let frames = Arc::new(AtomicU64::new(0));
	let samples = Arc::new(AtomicU64::new(0));
	let position_ms = Arc::new(AtomicU64::new(0));
	let (tx, rx) = mpsc::channel();

	let frame_count = Arc::clone(&frames);
	let sample_count = Arc::clone(&samples);
	let position = Arc::clone(&position_ms);

	player.play(
		move |frame| {
			frame_count.fetch_add(1, Ordering::Relaxed);
			position.store((frame.time * 1000.0) as u64, Ordering::Relaxed);
		},
		move |audio| {
			sample_count.fetch_add(audio.sample_count as u64, Ordering::Relaxed);
		},
		move || {
			let _ = tx.send(());
		},
	);

	rx.recv()?;

	println!(
		"done: {} video frames over {:.1}s, {} audio samples per channel",
		frames.load(Ordering::Relaxed),
		position_ms.load(Ordering::Relaxed) as f64 / 1000.0,
		samples.load(Ordering::Relaxed)
	);

	Ok(())
}
