use std::time::{Duration, Instant};

pub(crate) const FRAME_WINDOW_LEN: usize = 120;

/// Published into the resource map once per frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStats {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub frame_time_max_ms: f32,
    pub frames: u64,
}

#[derive(Debug)]
pub struct Clock {
    last_frame_end: Option<Instant>,
    max_frame_delta: Duration,
    window: RollingWindowSecs,
    frames: u64,
}

impl Clock {
    pub fn new(max_frame_delta: Duration) -> Self {
        Self {
            last_frame_end: None,
            max_frame_delta: normalize_non_zero_duration(
                max_frame_delta,
                Duration::from_millis(250),
            ),
            window: RollingWindowSecs::default(),
            frames: 0,
        }
    }

    /// Closes the current frame and returns the delta, in seconds, to feed the next one.
    pub fn end_frame(&mut self, now: Instant) -> f32 {
        let raw = match self.last_frame_end {
            Some(previous) => now.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last_frame_end = Some(now);
        self.record(raw)
    }

    pub(crate) fn record(&mut self, raw: Duration) -> f32 {
        let clamped = clamp_frame_delta(raw, self.max_frame_delta);
        self.frames = self.frames.saturating_add(1);
        self.window.push(clamped.as_secs_f32());
        clamped.as_secs_f32()
    }

    pub fn max_frame_delta(&self) -> Duration {
        self.max_frame_delta
    }

    pub fn snapshot(&self) -> FrameStats {
        let sum = self.window.sum();
        let fps = if sum > f32::EPSILON {
            self.window.len() as f32 / sum
        } else {
            0.0
        };
        FrameStats {
            fps,
            frame_time_ms: self.window.last() * 1000.0,
            frame_time_max_ms: self.window.max() * 1000.0,
            frames: self.frames,
        }
    }
}

#[derive(Debug)]
struct RollingWindowSecs {
    samples: [f32; FRAME_WINDOW_LEN],
    head: usize,
    count: usize,
    sum: f32,
    last: f32,
}

impl Default for RollingWindowSecs {
    fn default() -> Self {
        Self {
            samples: [0.0; FRAME_WINDOW_LEN],
            head: 0,
            count: 0,
            sum: 0.0,
            last: 0.0,
        }
    }
}

impl RollingWindowSecs {
    fn push(&mut self, value: f32) {
        self.last = value;
        if self.count < FRAME_WINDOW_LEN {
            self.samples[self.head] = value;
            self.head = (self.head + 1) % FRAME_WINDOW_LEN;
            self.count += 1;
            self.sum += value;
            return;
        }

        let evicted = self.samples[self.head];
        self.samples[self.head] = value;
        self.head = (self.head + 1) % FRAME_WINDOW_LEN;
        self.sum = (self.sum + value - evicted).max(0.0);
    }

    fn len(&self) -> usize {
        self.count
    }

    fn sum(&self) -> f32 {
        self.sum
    }

    fn last(&self) -> f32 {
        self.last
    }

    fn max(&self) -> f32 {
        self.samples[..self.count]
            .iter()
            .copied()
            .fold(0.0, f32::max)
    }
}

pub(crate) fn clamp_frame_delta(frame_dt: Duration, max_frame_delta: Duration) -> Duration {
    frame_dt.min(max_frame_delta)
}

pub(crate) fn normalize_non_zero_duration(value: Duration, fallback: Duration) -> Duration {
    if value.is_zero() {
        fallback
    } else {
        value
    }
}
