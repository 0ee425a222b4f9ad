//! The playback engine: worker thread, pacing, and cancellation.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

use crate::clock::PlaybackClock;
use crate::frame::{OnAudioSamples, OnStop, OnVideoFrame};
use crate::media::{AudioProps, FfmpegMedia, Media, VideoProps};
use crate::{Error, Result};

/// Control state shared between the caller and the worker thread.
///
/// `playing` is the only mutable state both threads touch; the condvar backs
/// the cancellable pacing wait and wakes it promptly on stop.
struct Shared {
	playing: Mutex<bool>,
	wake: Condvar,
	at_end: AtomicBool,
}

impl Shared {
	fn new() -> Arc<Self> {
		Arc::new(Self {
			playing: Mutex::new(false),
			wake: Condvar::new(),
			at_end: AtomicBool::new(false),
		})
	}

	fn is_playing(&self) -> bool {
		*self.playing.lock()
	}

	fn begin(&self) {
		*self.playing.lock() = true;
		self.at_end.store(false, Ordering::Release);
	}

	fn request_stop(&self) {
		*self.playing.lock() = false;
		self.wake.notify_all();
	}

	fn finish(&self) {
		*self.playing.lock() = false;
		self.at_end.store(true, Ordering::Release);
	}

	/// Blocks until `deadline` or until playback is stopped, whichever comes
	/// first. Returns false when stop won: the pending frame must not be
	/// delivered.
	fn pace_until(&self, deadline: Instant) -> bool {
		let mut playing = self.playing.lock();

		while *playing {
			if self.wake.wait_until(&mut playing, deadline).timed_out() {
				return *playing;
			}
		}

		false
	}
}

/// Caller-supplied callbacks for one playback run.
struct Sinks {
	on_video: OnVideoFrame,
	on_audio: OnAudioSamples,
	on_stop: OnStop,
}

/// Owns the media session and drives the decode loop on a worker thread.
///
/// At most one worker is alive at any time: `play` stops a previous run
/// before spawning, and `stop` (also run on drop) joins the thread before
/// returning.
pub(crate) struct PlaybackEngine {
	shared: Arc<Shared>,
	media: Arc<Mutex<Option<Box<dyn Media>>>>,
	worker: Option<thread::JoinHandle<()>>,
	video: Option<VideoProps>,
	audio: Option<AudioProps>,
	last_error: Option<Error>,
}

impl PlaybackEngine {
	pub fn new() -> Self {
		Self {
			shared: Shared::new(),
			media: Arc::new(Mutex::new(None)),
			worker: None,
			video: None,
			audio: None,
			last_error: None,
		}
	}

	/// Opens a container and prepares decoders. A prior session, playing or
	/// not, is stopped and discarded first.
	///
	/// On failure the engine stays inspectable: the error is retained and
	/// the stream queries report nothing.
	pub fn open(&mut self, path: &Path) -> Result<()> {
		self.stop();

		self.video = None;
		self.audio = None;

		let mut media = match FfmpegMedia::open(path) {
			Ok(media) => media,
			Err(err) => {
				*self.media.lock() = None;
				self.last_error = Some(err.clone());
				return Err(err);
			}
		};

		self.last_error = media.take_setup_error();
		self.video = media.video_props();
		self.audio = media.audio_props();
		*self.media.lock() = Some(Box::new(media));

		Ok(())
	}

	/// Starts a playback run, stopping any previous run first (its stop
	/// callback fires before this returns). Callbacks execute exclusively on
	/// the worker thread.
	///
	/// Replay after the end of a run resumes from wherever the demux cursor
	/// stopped; the container is not rewound.
	pub fn play(&mut self, on_video: OnVideoFrame, on_audio: OnAudioSamples, on_stop: OnStop) {
		self.stop();

		let origin = Instant::now();
		self.shared.begin();

		let shared = Arc::clone(&self.shared);
		let media = Arc::clone(&self.media);
		let mut sinks = Sinks {
			on_video,
			on_audio,
			on_stop,
		};

		let worker = thread::Builder::new()
			.name("reel-decode".into())
			.spawn(move || {
				// Held for the whole run; stop() only touches `shared`.
				let mut media = media.lock();

				if let Some(media) = media.as_deref_mut() {
					decode_loop(&shared, media, origin, &mut sinks);
				}

				shared.finish();
				(sinks.on_stop)();
			})
			.expect("failed to spawn decode thread");

		self.worker = Some(worker);
	}

	/// Stops playback and blocks until the worker has exited and its stop
	/// callback has returned. Idempotent.
	///
	/// Must not be called from inside a playback callback: the worker would
	/// be joining itself.
	pub fn stop(&mut self) {
		self.shared.request_stop();

		if let Some(worker) = self.worker.take() {
			let _ = worker.join();
		}
	}

	/// True once a run ended for any reason, until the next play.
	pub fn at_end(&self) -> bool {
		self.shared.at_end.load(Ordering::Acquire)
	}

	pub fn video(&self) -> Option<VideoProps> {
		self.video
	}

	pub fn audio(&self) -> Option<AudioProps> {
		self.audio
	}

	pub fn last_error(&self) -> Option<&Error> {
		self.last_error.as_ref()
	}

	#[cfg(test)]
	fn install(&mut self, media: Box<dyn Media>) {
		self.stop();
		*self.media.lock() = Some(media);
	}
}

impl Drop for PlaybackEngine {
	fn drop(&mut self) {
		self.stop();
	}
}

/// The demux→decode→deliver loop. Runs on the worker thread until the
/// container is exhausted or stop is requested.
fn decode_loop(shared: &Shared, media: &mut dyn Media, origin: Instant, sinks: &mut Sinks) {
	let clock = PlaybackClock::new(origin, media.video_time_base());
	let video_stream = media.video_stream();
	let audio_stream = media.audio_stream();

	tracing::debug!(?video_stream, ?audio_stream, "decode loop started");

	loop {
		if !shared.is_playing() {
			tracing::debug!("stop requested");
			break;
		}

		let Some(packet) = media.read_packet() else {
			tracing::debug!("end of container");
			break;
		};

		// Audio is never paced: downstream output owns its own timing, so
		// samples are forwarded as fast as they decode.
		if audio_stream == Some(packet.stream) {
			media.decode_audio(&mut |samples| (sinks.on_audio)(samples));
			continue;
		}

		if video_stream != Some(packet.stream) {
			continue;
		}

		// Pacing uses the packet's own timestamp. Decoders that reorder
		// frames may emit them with a different display time; that skew is
		// a known limitation and is not corrected here.
		let time = clock.presentation(packet.pts.unwrap_or(0));

		if let Some(deadline) = clock.deadline(time) {
			if !shared.pace_until(deadline) {
				break;
			}
		}

		media.decode_video(time, &mut |frame| (sinks.on_video)(frame));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::frame::{AudioSamples, VideoFrame};
	use crate::media::PacketHeader;

	use std::collections::VecDeque;
	use std::sync::atomic::AtomicUsize;
	use std::sync::mpsc;
	use std::time::Duration;

	const VIDEO: usize = 0;
	const AUDIO: usize = 1;
	const OTHER: usize = 7;

	enum Step {
		Video { pts: i64 },
		Audio,
		Other,
	}

	/// Scripted stand-in for the FFmpeg session.
	struct ScriptedMedia {
		steps: VecDeque<Step>,
		time_base: f64,
		has_video: bool,
		has_audio: bool,
		endless_video: bool,
		next_pts: i64,
		pixels: Vec<u8>,
		samples: Vec<f32>,
	}

	impl ScriptedMedia {
		fn new(steps: Vec<Step>, time_base: f64) -> Self {
			Self {
				steps: steps.into(),
				time_base,
				has_video: true,
				has_audio: true,
				endless_video: false,
				next_pts: 0,
				pixels: vec![0; 32],
				samples: vec![0.0; 64],
			}
		}
	}

	impl Media for ScriptedMedia {
		fn video_stream(&self) -> Option<usize> {
			self.has_video.then_some(VIDEO)
		}

		fn audio_stream(&self) -> Option<usize> {
			self.has_audio.then_some(AUDIO)
		}

		fn video_time_base(&self) -> f64 {
			self.time_base
		}

		fn read_packet(&mut self) -> Option<PacketHeader> {
			let step = match self.steps.pop_front() {
				Some(step) => step,
				None if self.endless_video => {
					self.next_pts += 1;
					Step::Video { pts: self.next_pts }
				}
				None => return None,
			};

			Some(match step {
				Step::Video { pts } => PacketHeader {
					stream: VIDEO,
					pts: Some(pts),
				},
				Step::Audio => PacketHeader {
					stream: AUDIO,
					pts: None,
				},
				Step::Other => PacketHeader {
					stream: OTHER,
					pts: None,
				},
			})
		}

		fn decode_audio(&mut self, sink: &mut dyn FnMut(AudioSamples<'_>)) {
			let planes: [&[f32]; 1] = [&self.samples];
			sink(AudioSamples {
				planes: &planes,
				sample_count: self.samples.len(),
				interleaved: false,
			});
		}

		fn decode_video(&mut self, time: f64, sink: &mut dyn FnMut(VideoFrame<'_>)) {
			sink(VideoFrame {
				time,
				data: &self.pixels,
				stride: 8,
			});
		}
	}

	struct Run {
		engine: PlaybackEngine,
		frames: Arc<Mutex<Vec<(f64, Instant)>>>,
		audio_frames: Arc<AtomicUsize>,
		stops: Arc<AtomicUsize>,
		stopped: mpsc::Receiver<()>,
	}

	/// Installs the scripted media and starts one playback run.
	fn start(media: ScriptedMedia) -> Run {
		let mut engine = PlaybackEngine::new();
		engine.install(Box::new(media));

		let frames = Arc::new(Mutex::new(Vec::new()));
		let audio_frames = Arc::new(AtomicUsize::new(0));
		let stops = Arc::new(AtomicUsize::new(0));
		let (tx, stopped) = mpsc::channel();

		let sink = Arc::clone(&frames);
		let audio_sink = Arc::clone(&audio_frames);
		let stop_count = Arc::clone(&stops);

		engine.play(
			Box::new(move |frame: VideoFrame<'_>| {
				sink.lock().push((frame.time, Instant::now()));
			}),
			Box::new(move |_samples: AudioSamples<'_>| {
				audio_sink.fetch_add(1, Ordering::SeqCst);
			}),
			Box::new(move || {
				stop_count.fetch_add(1, Ordering::SeqCst);
				let _ = tx.send(());
			}),
		);

		Run {
			engine,
			frames,
			audio_frames,
			stops,
			stopped,
		}
	}

	fn wait_for_stop(run: &Run) {
		run.stopped
			.recv_timeout(Duration::from_secs(5))
			.expect("run did not stop in time");
	}

	#[test]
	fn paces_video_against_the_clock() {
		let media = ScriptedMedia::new(
			vec![
				Step::Video { pts: 0 },
				Step::Video { pts: 1 },
				Step::Video { pts: 2 },
			],
			0.05,
		);

		let before = Instant::now();
		let run = start(media);
		wait_for_stop(&run);

		let frames = run.frames.lock();
		let times: Vec<f64> = frames.iter().map(|(time, _)| *time).collect();
		assert_eq!(times, vec![0.0, 0.05, 0.1]);

		// Never delivered meaningfully early: the engine's origin is
		// captured after `before`, so each delivery must land at least its
		// presentation time later.
		for (time, delivered) in frames.iter() {
			assert!(delivered.duration_since(before) >= Duration::from_secs_f64(*time));
		}
	}

	#[test]
	fn stop_cancels_the_pacing_wait() {
		// A single frame due far in the future.
		let media = ScriptedMedia::new(vec![Step::Video { pts: 1 }], 60.0);
		let mut run = start(media);

		// Give the worker time to enter the pacing wait.
		thread::sleep(Duration::from_millis(50));

		let begun = Instant::now();
		run.engine.stop();
		assert!(begun.elapsed() < Duration::from_secs(1));

		// The pending frame was abandoned, and the stop callback completed
		// before stop() returned.
		assert!(run.frames.lock().is_empty());
		assert_eq!(run.stops.load(Ordering::SeqCst), 1);
		assert!(run.engine.at_end());
	}

	#[test]
	fn stop_is_idempotent() {
		let media = ScriptedMedia::new(vec![Step::Video { pts: 1 }], 60.0);
		let mut run = start(media);

		run.engine.stop();
		run.engine.stop();

		assert_eq!(run.stops.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn replay_resumes_from_the_cursor() {
		let media = ScriptedMedia::new(
			vec![Step::Video { pts: 0 }, Step::Video { pts: 0 }],
			0.01,
		);
		let mut run = start(media);
		wait_for_stop(&run);

		assert!(run.engine.at_end());
		assert_eq!(run.frames.lock().len(), 2);

		// The script is exhausted, so a second run ends immediately instead
		// of starting over.
		let stops = Arc::clone(&run.stops);
		let (tx, stopped) = mpsc::channel();
		run.engine.play(
			Box::new(|_frame| panic!("no frames left to deliver")),
			Box::new(|_samples| {}),
			Box::new(move || {
				stops.fetch_add(1, Ordering::SeqCst);
				let _ = tx.send(());
			}),
		);

		stopped
			.recv_timeout(Duration::from_secs(5))
			.expect("second run did not stop");
		assert_eq!(run.stops.load(Ordering::SeqCst), 2);
		assert!(run.engine.at_end());
	}

	#[test]
	fn play_stops_the_previous_run_first() {
		// The first run parks on a frame due a minute out.
		let media = ScriptedMedia::new(vec![Step::Video { pts: 1 }], 60.0);
		let mut run = start(media);

		thread::sleep(Duration::from_millis(50));

		let (tx, stopped) = mpsc::channel();
		run.engine.play(
			Box::new(|_frame| {}),
			Box::new(|_samples| {}),
			Box::new(move || {
				let _ = tx.send(());
			}),
		);

		// The first run's stop callback fired during the play() call above.
		assert_eq!(run.stops.load(Ordering::SeqCst), 1);

		stopped
			.recv_timeout(Duration::from_secs(5))
			.expect("second run did not stop");
	}

	#[test]
	fn audio_only_session_never_delivers_video() {
		let mut media = ScriptedMedia::new(
			vec![Step::Audio, Step::Audio, Step::Audio, Step::Other],
			// An absurd time base: if audio were paced, this would hang.
			1_000.0,
		);
		media.has_video = false;

		let run = start(media);
		wait_for_stop(&run);

		assert!(run.frames.lock().is_empty());
		assert_eq!(run.audio_frames.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn audio_payload_reaches_the_sink_intact() {
		let media = ScriptedMedia::new(vec![Step::Audio], 0.01);

		let mut engine = PlaybackEngine::new();
		engine.install(Box::new(media));

		let (tx, stopped) = mpsc::channel();
		let seen = Arc::new(Mutex::new(None));
		let sink = Arc::clone(&seen);

		engine.play(
			Box::new(|_frame| {}),
			Box::new(move |samples: AudioSamples<'_>| {
				*sink.lock() = Some((
					samples.planes.len(),
					samples.planes[0].len(),
					samples.sample_count,
					samples.interleaved,
				));
			}),
			Box::new(move || {
				let _ = tx.send(());
			}),
		);

		stopped
			.recv_timeout(Duration::from_secs(5))
			.expect("run did not stop");

		assert_eq!(*seen.lock(), Some((1, 64, 64, false)));
	}

	#[test]
	fn packets_for_unselected_streams_are_skipped() {
		let media = ScriptedMedia::new(
			vec![Step::Other, Step::Video { pts: 0 }, Step::Other],
			0.01,
		);

		let run = start(media);
		wait_for_stop(&run);

		assert_eq!(run.frames.lock().len(), 1);
		assert_eq!(run.audio_frames.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn drop_performs_an_implicit_stop() {
		let mut media = ScriptedMedia::new(Vec::new(), 0.01);
		media.endless_video = true;

		let run = start(media);
		thread::sleep(Duration::from_millis(50));

		let stops = Arc::clone(&run.stops);
		drop(run.engine);

		// The drop joined the worker, so the stop callback already ran.
		assert_eq!(stops.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn play_without_media_stops_immediately() {
		let mut engine = PlaybackEngine::new();

		let (tx, stopped) = mpsc::channel();
		engine.play(
			Box::new(|_frame| {}),
			Box::new(|_samples| {}),
			Box::new(move || {
				let _ = tx.send(());
			}),
		);

		stopped
			.recv_timeout(Duration::from_secs(5))
			.expect("run did not stop");
		assert!(engine.at_end());
	}

	#[test]
	fn pace_until_wakes_on_stop() {
		let shared = Shared::new();
		shared.begin();

		let waker = Arc::clone(&shared);
		let handle = thread::spawn(move || {
			thread::sleep(Duration::from_millis(30));
			waker.request_stop();
		});

		let begun = Instant::now();
		let delivered = shared.pace_until(Instant::now() + Duration::from_secs(60));

		assert!(!delivered);
		assert!(begun.elapsed() < Duration::from_secs(5));
		handle.join().unwrap();
	}

	#[test]
	fn pace_until_delivers_after_the_deadline() {
		let shared = Shared::new();
		shared.begin();

		assert!(shared.pace_until(Instant::now()));
		assert!(shared.pace_until(Instant::now() + Duration::from_millis(10)));
	}
}
