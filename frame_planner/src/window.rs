use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PlanError;

/// Half-open bar range `[start, end)` shown by one output frame.
///
/// `sequence` is the frame's position in playback order; artifact names are
/// derived from it so that lexicographic order equals playback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Window {
    pub sequence: usize,
    pub start: usize,
    pub end: usize,
}

impl Window {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_full(&self, n: usize) -> bool {
        self.start == 0 && self.end == n
    }
}

/// Produces the ordered frame plan for a series of `n` bars.
pub trait WindowPlanner {
    fn plan(&self, n: usize) -> Vec<Window>;

    fn name(&self) -> &'static str;
}

fn push(plan: &mut Vec<Window>, start: usize, end: usize) {
    let sequence = plan.len();
    plan.push(Window { sequence, start, end });
}

/// Reveals the series one bar at a time: `[0, 0)`, `[0, 1)`, ..., `[0, n)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullReveal;

impl WindowPlanner for FullReveal {
    fn plan(&self, n: usize) -> Vec<Window> {
        (0..=n)
            .map(|end| Window {
                sequence: end,
                start: 0,
                end,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "bg"
    }
}

/// Zooms in from the full series to a fixed-width window, slides it across
/// the series, then widens back out to the full series.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    length: usize,
    step: usize,
}

impl SlidingWindow {
    pub fn new(length: usize, step: usize) -> Result<Self, PlanError> {
        if length == 0 {
            return Err(PlanError::InvalidParameter("window length must be at least 1".into()));
        }
        if step == 0 {
            return Err(PlanError::InvalidParameter("window step must be at least 1".into()));
        }
        Ok(Self { length, step })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

impl WindowPlanner for SlidingWindow {
    fn plan(&self, n: usize) -> Vec<Window> {
        // A series shorter than the window is shown as a single full window.
        let length = self.length.min(n);
        let step = self.step;
        let mut plan = Vec::new();

        // Shrink the right edge from n down towards the window length.
        let mut end = n;
        let mut narrowest = n;
        while end >= length {
            push(&mut plan, 0, end);
            narrowest = end;
            match end.checked_sub(step) {
                Some(next) => end = next,
                None => break,
            }
        }

        // Slide a fixed-width window, skipping the one the zoom already ended on.
        for start in 0..=(n - length) {
            if start + length == narrowest {
                continue;
            }
            push(&mut plan, start, start + length);
        }

        // Grow the left edge back out to the start of the series.
        if n > length {
            let mut start = n - length - 1;
            loop {
                push(&mut plan, start, n);
                match start.checked_sub(step) {
                    Some(next) => start = next,
                    None => break,
                }
            }
        }

        if plan.last().is_none_or(|w| !w.is_full(n)) {
            push(&mut plan, 0, n);
        }

        debug!(n, length, step, frames = plan.len(), "planned sliding windows");
        plan
    }

    fn name(&self) -> &'static str {
        "windows"
    }
}

/// Which planner a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlannerKind {
    /// Progressive reveal over the full-series background.
    #[default]
    Bg,
    /// Sliding window with pinned axes.
    Windows,
}

impl PlannerKind {
    /// Builds the planner for this kind. `length` and `step` are only used by
    /// [`PlannerKind::Windows`].
    pub fn build(self, length: usize, step: usize) -> Result<Box<dyn WindowPlanner + Send + Sync>, PlanError> {
        match self {
            PlannerKind::Bg => Ok(Box::new(FullReveal)),
            PlannerKind::Windows => Ok(Box::new(SlidingWindow::new(length, step)?)),
        }
    }

    pub fn pins_axes(self) -> bool {
        matches!(self, PlannerKind::Windows)
    }
}
