use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{PressError, Result};
use crate::link::{ControllerLink, Transport};
use crate::palette::ColorName;
use crate::plan::{Calibration, DrawPlan, SamplePoint};

/// Log a progress line every this many points.
const PROGRESS_EVERY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawState {
    Idle,
    Running,
    Completed,
    Cancelled,
    Faulted,
}

impl DrawState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DrawState::Completed | DrawState::Cancelled | DrawState::Faulted)
    }
}

/// Shared stop flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// When to tap the color selector before a point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SwatchStrategy {
    /// Before every point, even if the color did not change.
    #[default]
    Always,
    /// Only when the color differs from the previous point.
    OnColorChange,
}

#[derive(Debug, Clone)]
pub struct DrawOptions {
    pub offset_x: i32,
    pub offset_y: i32,
    /// Overrides the rate negotiated on the link.
    pub poll_rate_ms: Option<u32>,
    pub input_lag_ms: u64,
    pub swatch: SwatchStrategy,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            offset_x: 0,
            offset_y: 0,
            poll_rate_ms: None,
            input_lag_ms: Calibration::default().input_lag_ms,
            swatch: SwatchStrategy::Always,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawReport {
    pub drawn: usize,
    pub total: usize,
    pub elapsed: Duration,
}

/// Replays a plan on a link, one point per throttle interval.
///
/// A scheduler runs once. After it reaches a terminal state a new one must
/// be created to draw again.
pub struct DrawScheduler<T: Transport> {
    link: Arc<ControllerLink<T>>,
    options: DrawOptions,
    state: DrawState,
    drawn: usize,
}

impl<T: Transport> DrawScheduler<T> {
    pub fn new(link: Arc<ControllerLink<T>>, options: DrawOptions) -> Self {
        Self {
            link,
            options,
            state: DrawState::Idle,
            drawn: 0,
        }
    }

    pub fn state(&self) -> DrawState {
        self.state
    }

    /// Points fully touched so far.
    pub fn drawn(&self) -> usize {
        self.drawn
    }

    /// Pause between two points.
    pub fn interval(&self) -> Duration {
        let poll = self.options.poll_rate_ms.unwrap_or_else(|| self.link.poll_rate_ms());
        Duration::from_millis(poll as u64 + self.options.input_lag_ms)
    }

    /// Draws every point of `plan`.
    ///
    /// The stop flag is looked at once per point, before its first touch.
    /// A stop during the pause lets the pause finish and then returns
    /// `CancellationRequested`. Link failures leave the scheduler `Faulted`.
    pub async fn run(&mut self, plan: &DrawPlan, cancel: &CancelSignal) -> Result<DrawReport> {
        if self.state != DrawState::Idle {
            return Err(PressError::Task(format!(
                "scheduler already used (state {:?})",
                self.state
            )));
        }
        self.state = DrawState::Running;

        let interval = self.interval();
        let started = Instant::now();
        let total = plan.len();
        info!(
            points = total,
            interval_ms = interval.as_millis() as u64,
            offset_x = self.options.offset_x,
            offset_y = self.options.offset_y,
            "drawing started"
        );

        let mut previous: Option<ColorName> = None;
        for point in plan.points() {
            if cancel.is_cancelled() {
                self.state = DrawState::Cancelled;
                info!(drawn = self.drawn, total, "drawing cancelled");
                return Err(PressError::CancellationRequested);
            }

            if let Err(e) = self.draw_point(point, previous).await {
                self.state = DrawState::Faulted;
                warn!(drawn = self.drawn, total, error = %e, "drawing stopped");
                return Err(e);
            }
            previous = Some(point.color.name);
            self.drawn += 1;
            if self.drawn % PROGRESS_EVERY == 0 {
                info!(drawn = self.drawn, total, "progress");
            }

            tokio::time::sleep(interval).await;
        }

        self.state = DrawState::Completed;
        let elapsed = started.elapsed();
        info!(drawn = self.drawn, elapsed_s = elapsed.as_secs(), "drawing finished");
        Ok(DrawReport {
            drawn: self.drawn,
            total,
            elapsed,
        })
    }

    async fn draw_point(&self, point: &SamplePoint, previous: Option<ColorName>) -> Result<()> {
        let select = match self.options.swatch {
            SwatchStrategy::Always => true,
            SwatchStrategy::OnColorChange => previous != Some(point.color.name),
        };
        if select {
            if let Some(picker) = point.color.picker {
                self.link.touch(picker).await?;
            }
        }
        let at = point.screen_position(self.options.offset_x, self.options.offset_y);
        debug!(color = %point.color.name, x = at.x, y = at.y, "point");
        self.link.touch(at).await
    }
}
