use std::time::{Duration, Instant};

/// A button label that can temporarily show another text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Indicator {
    idle: String,
    current: String,
}

impl Indicator {
    pub fn new(idle: impl Into<String>) -> Self {
        let idle = idle.into();
        Self {
            current: idle.clone(),
            idle,
        }
    }

    pub fn label(&self) -> &str {
        &self.current
    }

    pub fn flash(&mut self, text: impl Into<String>) {
        self.current = text.into();
    }

    pub fn restore(&mut self) {
        self.current.clone_from(&self.idle);
    }
}

/// UI affordances whose label can be flashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affordance {
    CopyCode,
    FormatCode,
    CopyImage,
    Export,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    Restore(Affordance),
    CloseWindow,
}

/// Delayed actions, fired by polling with the current time.
#[derive(Debug, Default)]
pub struct Timers {
    pending: Vec<(Instant, TimerAction)>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, delay: Duration, action: TimerAction) {
        self.schedule_at(Instant::now() + delay, action);
    }

    pub fn schedule_at(&mut self, due: Instant, action: TimerAction) {
        self.pending.push((due, action));
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Removes and returns the actions due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<TimerAction> {
        let mut due: Vec<(Instant, TimerAction)> = Vec::new();
        self.pending.retain(|&(at, action)| {
            if at <= now {
                due.push((at, action));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|&(at, _)| at);
        due.into_iter().map(|(_, action)| action).collect()
    }
}
