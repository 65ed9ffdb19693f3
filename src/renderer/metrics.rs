use std::collections::VecDeque;
use std::time::{Duration, Instant};

use super::*;

/// Wall-clock time spent in each phase of the last [`Renderer::render`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PhaseTimings {
    /// Propagating transforms from the root down.
    pub update_transforms: Duration,
    /// Walking the scene, serializing batches and issuing draws.
    pub walk_and_flush: Duration,
    /// `GpuBackend::end_frame`, which is where deferred backends encode and submit.
    pub submit: Duration,
    pub total: Duration,
}

const WINDOW: Duration = Duration::from_secs(1);
/// Upper bound on frames kept in the rolling window.
const MAX_WINDOW_FRAMES: usize = 8_192;

#[derive(Debug, Clone, Copy)]
struct FrameSample {
    finished_at: Instant,
    duration: Duration,
}

/// Cumulative and rolling one-second frame statistics.
#[derive(Debug, Default)]
pub(super) struct FrameMetricsTracker {
    frames: u64,
    busy: Duration,
    first_started_at: Option<Instant>,
    last_finished_at: Option<Instant>,
    window: VecDeque<FrameSample>,
    window_busy: Duration,
}

impl FrameMetricsTracker {
    fn evict_oldest(&mut self) {
        if let Some(sample) = self.window.pop_front() {
            self.window_busy = self.window_busy.saturating_sub(sample.duration);
        }
    }

    pub(super) fn record_frame(&mut self, started_at: Instant, finished_at: Instant) {
        let duration = finished_at.saturating_duration_since(started_at);

        self.first_started_at.get_or_insert(started_at);
        self.last_finished_at = Some(finished_at);
        self.frames += 1;
        self.busy += duration;

        if self.window.len() == MAX_WINDOW_FRAMES {
            self.evict_oldest();
        }
        self.window.push_back(FrameSample {
            finished_at,
            duration,
        });
        self.window_busy += duration;

        while self
            .window
            .front()
            .is_some_and(|oldest| finished_at.saturating_duration_since(oldest.finished_at) > WINDOW)
        {
            self.evict_oldest();
        }
    }

    pub(super) fn frames(&self) -> u64 {
        self.frames
    }

    /// Frames per second between the start of the first frame and the end of the last one.
    pub(super) fn average_frames_per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.first_started_at, self.last_finished_at) else {
            return 0.0;
        };
        let elapsed = last.saturating_duration_since(first).as_secs_f64();
        if elapsed == 0.0 {
            0.0
        } else {
            self.frames as f64 / elapsed
        }
    }

    pub(super) fn average_frame_duration(&self) -> Duration {
        average(self.busy, self.frames)
    }

    pub(super) fn rolling_frames_per_second(&self) -> f64 {
        self.window.len() as f64
    }

    pub(super) fn rolling_average_frame_duration(&self) -> Duration {
        average(self.window_busy, self.window.len() as u64)
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        Duration::ZERO
    } else {
        Duration::from_secs_f64(total.as_secs_f64() / count as f64)
    }
}

impl<B: GpuBackend> Renderer<B> {
    /// Frames per second since metrics were last reset, counting only frames the backend
    /// accepted.
    pub fn average_frames_per_second(&self) -> f64 {
        self.frame_metrics.average_frames_per_second()
    }

    /// Mean time spent inside [`Renderer::render`].
    pub fn average_frame_duration(&self) -> Duration {
        self.frame_metrics.average_frame_duration()
    }

    /// Frames finished during the last second.
    pub fn rolling_one_second_frames_per_second(&self) -> f64 {
        self.frame_metrics.rolling_frames_per_second()
    }

    pub fn rolling_one_second_average_frame_duration(&self) -> Duration {
        self.frame_metrics.rolling_average_frame_duration()
    }

    pub fn rendered_frame_count(&self) -> u64 {
        self.frame_metrics.frames()
    }

    pub fn reset_frame_metrics(&mut self) {
        self.frame_metrics.reset();
    }

    pub fn last_phase_timings(&self) -> PhaseTimings {
        self.last_phase_timings
    }
}
