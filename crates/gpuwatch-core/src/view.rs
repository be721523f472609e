//! View window navigation.
//!
//! A [`ViewWindow`] is a plain value: every transition takes the window and
//! the current index [`Bounds`] and returns the next window. Nothing here
//! reads the clock or the terminal, so the whole state machine is testable
//! on its own.
//!
//! While `following`, the window's duration is the user-controlled state and
//! `end` tracks the newest sample. Looking into the past (any backward pan,
//! jump to start) drops out of following; reaching "now" again (forward pan
//! onto the last sample, jump to end, reset) resumes it.

use chrono::{NaiveDateTime, TimeDelta};

use crate::index::Bounds;

/// Share of the window duration moved by one pan step.
pub const PAN_FRACTION: f64 = 0.02;

/// Zoom-in never produces a window shorter than this.
pub const MIN_DURATION: TimeDelta = TimeDelta::seconds(5);

/// Window duration after startup and reset.
pub const DEFAULT_DURATION: TimeDelta = TimeDelta::seconds(300);

pub const ZOOM_IN: f64 = 0.5;
pub const ZOOM_OUT: f64 = 2.0;

/// Pan direction along the time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    /// Toward older samples.
    Backward,
    /// Toward newer samples.
    Forward,
}

/// Scale a duration by a float factor at microsecond resolution.
pub fn scale(delta: TimeDelta, factor: f64) -> TimeDelta {
    let micros = delta.num_microseconds().unwrap_or(i64::MAX);
    TimeDelta::microseconds((micros as f64 * factor).round() as i64)
}

/// The visible `[start, end]` range plus follow mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub following: bool,
}

impl ViewWindow {
    /// Startup window: same as [`reset`](Self::reset).
    pub fn initial(bounds: Option<Bounds>, now: NaiveDateTime, default: TimeDelta) -> Self {
        let end = bounds.map_or(now, |b| b.last);
        Self {
            start: end - default,
            end,
            following: true,
        }
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Shift by [`PAN_FRACTION`] of the duration.
    pub fn pan(self, direction: PanDirection, bounds: Option<Bounds>) -> Self {
        let Some(b) = bounds else { return self };
        let duration = self.duration();
        let shift = scale(duration, PAN_FRACTION);

        match direction {
            PanDirection::Backward => {
                let mut start = self.start - shift;
                if start < b.first {
                    start = b.first;
                }
                Self {
                    start,
                    end: start + duration,
                    following: false,
                }
            }
            PanDirection::Forward => {
                let end = self.end + shift;
                if end >= b.last {
                    Self {
                        start: b.last - duration,
                        end: b.last,
                        following: true,
                    }
                } else {
                    Self {
                        start: self.start + shift,
                        end,
                        following: self.following,
                    }
                }
            }
        }
    }

    /// Multiply the duration by `factor`.
    ///
    /// Zooming in below [`MIN_DURATION`] leaves the window untouched.
    /// Following windows stay pinned to the newest sample; others keep their
    /// center. Zooming out clamps both edges to the data.
    pub fn zoom(self, factor: f64, bounds: Option<Bounds>) -> Self {
        let Some(b) = bounds else { return self };
        if !(factor.is_finite() && factor > 0.0) {
            return self;
        }
        let duration = self.duration();
        let new_duration = scale(duration, factor);
        if factor < 1.0 && new_duration < MIN_DURATION {
            return self;
        }

        let mut next = if self.following {
            Self {
                start: b.last - new_duration,
                end: b.last,
                following: true,
            }
        } else {
            let center = self.start + scale(duration, 0.5);
            let half = scale(new_duration, 0.5);
            Self {
                start: center - half,
                end: center - half + new_duration,
                following: false,
            }
        };

        if factor > 1.0 {
            next.start = next.start.max(b.first);
            next.end = next.end.min(b.last);
            if next.start > next.end {
                next.start = next.end;
            }
        }
        next
    }

    /// Show the oldest data, keeping the duration. Stops following.
    pub fn jump_start(self, bounds: Option<Bounds>) -> Self {
        let Some(b) = bounds else { return self };
        let duration = self.duration();
        Self {
            start: b.first,
            end: b.first + duration,
            following: false,
        }
    }

    /// Show the newest data, keeping the duration. Resumes following.
    pub fn jump_end(self, bounds: Option<Bounds>) -> Self {
        let Some(b) = bounds else { return self };
        let duration = self.duration();
        Self {
            start: b.last - duration,
            end: b.last,
            following: true,
        }
    }

    /// Back to the default duration ending at the newest sample, or at `now`
    /// when nothing has been loaded. Resumes following.
    pub fn reset(self, bounds: Option<Bounds>, now: NaiveDateTime, default: TimeDelta) -> Self {
        Self::initial(bounds, now, default)
    }

    /// Re-anchor on the newest sample while following. The only transition
    /// driven by time rather than input.
    pub fn live_tick(self, bounds: Option<Bounds>) -> Self {
        match bounds {
            Some(b) if self.following => {
                let duration = self.duration();
                Self {
                    start: b.last - duration,
                    end: b.last,
                    following: true,
                }
            }
            _ => self,
        }
    }
}
