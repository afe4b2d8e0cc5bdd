//! Repetition counting over a stream of joint angles.
//!
//! The counter is a two-state machine with a hysteresis band between the
//! `down_below` and `up_above` thresholds, and a refractory period that
//! rejects a second count arriving too soon after the previous one.

use std::fmt;
use std::time::{Duration, Instant};

use crate::config::CounterConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Up,
    Down,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Up => f.write_str("up"),
            Position::Down => f.write_str("down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepRules {
    pub down_below: f32,
    pub up_above: f32,
    pub debounce: Duration,
}

impl Default for RepRules {
    fn default() -> Self {
        Self {
            down_below: 70.0,
            up_above: 140.0,
            debounce: Duration::from_millis(500),
        }
    }
}

impl From<&CounterConfig> for RepRules {
    fn from(config: &CounterConfig) -> Self {
        Self {
            down_below: config.down_below,
            up_above: config.up_above,
            debounce: config.debounce(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepState {
    pub position: Position,
    pub rep_count: u32,
    /// `None` until the first counted repetition.
    pub last_transition: Option<Instant>,
}

impl Default for RepState {
    fn default() -> Self {
        Self {
            position: Position::Up,
            rep_count: 0,
            last_transition: None,
        }
    }
}

/// Advances the state by one measured angle observed at `now`.
pub fn transition(state: RepState, angle: f32, now: Instant, rules: &RepRules) -> RepState {
    let candidate = if angle < rules.down_below {
        Position::Down
    } else if angle > rules.up_above {
        Position::Up
    } else {
        state.position
    };

    let mut next = RepState {
        position: candidate,
        ..state
    };

    if state.position == Position::Down && candidate == Position::Up {
        let settled = state
            .last_transition
            .map_or(true, |last| now.saturating_duration_since(last) > rules.debounce);
        if settled {
            next.rep_count += 1;
            next.last_transition = Some(now);
        }
    }

    next
}

/// Summary shown on the overlay after each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Tracking {
        angle: f32,
        position: Position,
        reps: u32,
    },
    NotDetected,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Tracking {
                angle,
                position,
                reps,
            } => write!(f, "Elbow: {angle:.1} | Pos: {position} | Reps: {reps}"),
            Status::NotDetected => f.write_str("Pose not detected properly."),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepCounter {
    state: RepState,
    rules: RepRules,
}

impl RepCounter {
    pub fn new(rules: RepRules) -> Self {
        Self {
            state: RepState::default(),
            rules,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RepState {
        self.state
    }

    pub fn reps(&self) -> u32 {
        self.state.rep_count
    }

    /// Feeds one frame's combined angle. A missing angle leaves the state untouched.
    pub fn update(&mut self, angle: Option<f32>, now: Instant) -> Status {
        let Some(angle) = angle else {
            return Status::NotDetected;
        };

        let previous = self.state.rep_count;
        self.state = transition(self.state, angle, now, &self.rules);

        if self.state.rep_count > previous {
            tracing::info!(
                reps = self.state.rep_count,
                angle = format!("{:.1}", angle),
                "rep counted"
            );
        }

        Status::Tracking {
            angle,
            position: self.state.position,
            reps: self.state.rep_count,
        }
    }
}
