//! Amplitude animator — eases a smoothed amplitude toward the talking state
//! and renders a mirrored diagonal pulse offset each frame.
//!
//! The frame loop is self-halting: it runs while the target or the smoothed
//! amplitude is non-zero, snaps the offsets to zero once settled, and stops
//! scheduling frames until the next activity transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Animation parameters. `Default` is the production tuning.
#[derive(Debug, Clone)]
pub struct PulseConfig {
    /// Oscillation frequency in Hz.
    pub freq_hz: f32,
    /// Shape exponent sharpening the triangle wave into a narrow pulse.
    pub gamma: f32,
    /// Width floor so the pulse never fully collapses.
    pub eps: f32,
    /// Base displacement in pixels at the reference width.
    pub amp_base: f32,
    /// Width the base amplitude is tuned against; actual width scales it.
    pub reference_width: f32,
    /// Attack time constant (amplitude rising toward the target).
    pub ramp_in: Duration,
    /// Release time constant (amplitude falling).
    pub ramp_out: Duration,
    /// With target 0, a smoothed amplitude at or below this stops the loop.
    pub settle: f32,
    /// Render task frame interval.
    pub frame: Duration,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            freq_hz: 0.95,
            gamma: 6.0,
            eps: 0.03,
            amp_base: 60.0,
            reference_width: 144.0,
            ramp_in: Duration::from_millis(180),
            ramp_out: Duration::from_millis(320),
            settle: 0.002,
            frame: Duration::from_millis(16),
        }
    }
}

/// Receives the animator's output: a width for proportional scaling and two
/// mirrored diagonal offsets per frame.
pub trait VisualSink: Send + Sync {
    /// Current rendered width of the pulse stack.
    fn width(&self) -> f32;

    /// Apply per-frame offsets; each pair is (x, y) and always diagonal.
    fn apply(&self, offset_a: (f32, f32), offset_b: (f32, f32));
}

/// Sink that renders nothing. Keeps the playback stack runnable headless.
#[derive(Debug, Default)]
pub struct NullSink;

impl VisualSink for NullSink {
    fn width(&self) -> f32 {
        144.0
    }

    fn apply(&self, _offset_a: (f32, f32), _offset_b: (f32, f32)) {}
}

/// Smoothed amplitude, advanced once per frame.
#[derive(Debug, Clone)]
pub struct PulseState {
    current: f32,
    last_frame: Instant,
}

impl PulseState {
    pub fn new(now: Instant) -> Self {
        Self {
            current: 0.0,
            last_frame: now,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    /// Ease `current` toward `target` using the asymmetric attack/release
    /// ramps and an ease-out quadratic on the per-frame fraction.
    pub fn advance(&mut self, target: f32, now: Instant, config: &PulseConfig) -> f32 {
        let dt = now.saturating_duration_since(self.last_frame);
        self.last_frame = now;

        let ramp = if target > self.current {
            config.ramp_in
        } else {
            config.ramp_out
        };
        let k = (dt.as_secs_f32() / ramp.as_secs_f32()).min(1.0);
        self.current += (target - self.current) * (1.0 - (1.0 - k) * (1.0 - k));
        self.current
    }

    /// Whether the loop may stop scheduling frames.
    pub fn settled(&self, target: f32, config: &PulseConfig) -> bool {
        target == 0.0 && self.current.abs() <= config.settle
    }
}

/// Signed displacement at wall-clock time `t` (seconds) for the given
/// smoothed amplitude and rendered width. The two visual elements are offset
/// by the negated and plain value respectively.
pub fn displacement(config: &PulseConfig, t: f32, current: f32, width: f32) -> f32 {
    let phase = (t * config.freq_hz).rem_euclid(1.0);
    let tri = 1.0 - (2.0 * phase - 1.0).abs();

    let h = tri.powf(config.gamma);
    let w = (1.0 - h) * (1.0 - config.eps) + (1.0 - tri) * config.eps;
    let sign = if phase < 0.5 { -1.0 } else { 1.0 };

    let amp = config.amp_base * (width / config.reference_width);
    sign * (amp * w * current) / std::f32::consts::SQRT_2
}

/// Drives the self-halting frame loop; `set_active` follows the talking flag.
pub struct PulseAnimator {
    config: PulseConfig,
    sink: Arc<dyn VisualSink>,
    target: Arc<AtomicBool>,
    scheduled: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    epoch: Instant,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PulseAnimator {
    pub fn new(config: PulseConfig, sink: Arc<dyn VisualSink>) -> Self {
        Self {
            config,
            sink,
            target: Arc::new(AtomicBool::new(false)),
            scheduled: Arc::new(AtomicBool::new(false)),
            frames: Arc::new(AtomicU64::new(0)),
            epoch: Instant::now(),
            task: Mutex::new(None),
        }
    }

    /// Flip the target amplitude; restarts the frame loop when none is
    /// scheduled.
    pub fn set_active(&self, active: bool) {
        self.target.store(active, Ordering::SeqCst);
        self.ensure_scheduled();
    }

    /// Whether a frame loop is currently scheduled.
    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }

    /// Frames rendered since creation. The counter stops growing once the
    /// loop settles.
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }

    fn ensure_scheduled(&self) {
        if self.scheduled.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let sink = Arc::clone(&self.sink);
        let target = Arc::clone(&self.target);
        let scheduled = Arc::clone(&self.scheduled);
        let frames = Arc::clone(&self.frames);
        let epoch = self.epoch;

        let handle = tokio::spawn(async move {
            let mut state = PulseState::new(Instant::now());
            let mut ticker = tokio::time::interval(config.frame);
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let target_amp = if target.load(Ordering::SeqCst) { 1.0 } else { 0.0 };
                state.advance(target_amp, now, &config);
                frames.fetch_add(1, Ordering::SeqCst);

                let t = now.duration_since(epoch).as_secs_f32();
                let d = displacement(&config, t, state.current(), sink.width());
                sink.apply((-d, -d), (d, d));

                if state.settled(target_amp, &config) {
                    sink.apply((0.0, 0.0), (0.0, 0.0));
                    scheduled.store(false, Ordering::SeqCst);
                    // A set_active landing between the settle check and the
                    // store above would otherwise be lost; reclaim the slot
                    // and keep ticking instead of going dark.
                    if target.load(Ordering::SeqCst)
                        && !scheduled.swap(true, Ordering::SeqCst)
                    {
                        continue;
                    }
                    break;
                }
            }
            debug!("pulse loop settled");
        });

        // Any previous loop has already released the schedule slot and exited.
        *self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }
}

impl Drop for PulseAnimator {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}
