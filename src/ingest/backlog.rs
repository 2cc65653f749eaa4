// src/ingest/backlog.rs

/// Advisory signal emitted when the discovered-URL backlog crosses a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BacklogSignal {
    /// Depth rose to or above `threshold`.
    Growing { threshold: usize, depth: usize },
    /// Depth fell back below `threshold`.
    Draining { threshold: usize, depth: usize },
}

/// Tracks which multiple of `step` the backlog last reached.
///
/// Each threshold crossing yields exactly one signal; staying on the same
/// side of a threshold yields nothing.
#[derive(Debug, Clone)]
pub struct BacklogMonitor {
    step: usize,
    level: usize,
}

impl BacklogMonitor {
    pub fn new(step: usize) -> Self {
        Self {
            step: step.max(1),
            level: 0,
        }
    }

    /// Highest threshold currently at or below the observed depth.
    pub fn level_threshold(&self) -> usize {
        self.level * self.step
    }

    pub fn observe(&mut self, depth: usize) -> Vec<BacklogSignal> {
        let target = depth / self.step;
        let mut out = Vec::new();
        while self.level < target {
            self.level += 1;
            out.push(BacklogSignal::Growing {
                threshold: self.level * self.step,
                depth,
            });
        }
        while self.level > target {
            out.push(BacklogSignal::Draining {
                threshold: self.level * self.step,
                depth,
            });
            self.level -= 1;
        }
        out
    }
}
