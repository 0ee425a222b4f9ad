//! Wall-clock pacing for video delivery.

use std::time::{Duration, Instant};

/// Converts stream timestamps into wall-clock deadlines.
///
/// The origin is captured once per play; a packet stamped `t` ticks is due
/// at `origin + t * time_base` seconds.
pub(crate) struct PlaybackClock {
	origin: Instant,
	time_base: f64,
}

impl PlaybackClock {
	pub fn new(origin: Instant, time_base: f64) -> Self {
		Self { origin, time_base }
	}

	/// Presentation time in seconds for a packet timestamp.
	pub fn presentation(&self, ticks: i64) -> f64 {
		ticks as f64 * self.time_base
	}

	/// Wall-clock deadline for a presentation time.
	///
	/// Non-positive presentation times have no deadline; the frame is due
	/// immediately.
	pub fn deadline(&self, presentation: f64) -> Option<Instant> {
		if presentation <= 0.0 {
			return None;
		}

		Some(self.origin + Duration::from_secs_f64(presentation))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn presentation_scales_by_time_base() {
		let clock = PlaybackClock::new(Instant::now(), 1.0 / 90_000.0);
		assert_eq!(clock.presentation(0), 0.0);
		assert!((clock.presentation(90_000) - 1.0).abs() < 1e-9);
		assert!((clock.presentation(45_000) - 0.5).abs() < 1e-9);
	}

	#[test]
	fn no_deadline_for_past_timestamps() {
		let clock = PlaybackClock::new(Instant::now(), 0.04);
		assert!(clock.deadline(0.0).is_none());
		assert!(clock.deadline(-1.0).is_none());
	}

	#[test]
	fn deadlines_follow_presentation_order() {
		let origin = Instant::now();
		let clock = PlaybackClock::new(origin, 0.04);

		let first = clock.deadline(clock.presentation(1)).unwrap();
		let second = clock.deadline(clock.presentation(2)).unwrap();

		assert!(first > origin);
		assert!(second > first);
		assert_eq!(second - first, Duration::from_millis(40));
	}
}
