use std::fmt;
use std::time::Duration;

use taskline_core::Work;

/// How an event repeats, derived from its `delay` and `loop_fixed` fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleMode {
    /// Fire once after the first delay.
    Once,
    /// Fire every period measured from the first due time. A late firing
    /// is followed immediately by the next overdue one; none are skipped.
    FixedRate(Duration),
    /// Wait the period after each firing completes.
    FixedDelay(Duration),
}

/// Descriptor of a timed action.
///
/// A zero `delay` means the event fires once, whatever `loop_fixed` says.
pub struct TimerEvent {
    first_delay: Duration,
    delay: Duration,
    loop_fixed: bool,
    action: Box<dyn Work>,
}

impl TimerEvent {
    /// Raw form: `delay == 0` fires once, otherwise `loop_fixed` selects
    /// fixed-rate (`true`) or fixed-delay (`false`) repetition.
    pub fn new(first_delay: Duration, delay: Duration, loop_fixed: bool, action: impl Work) -> Self {
        Self {
            first_delay,
            delay,
            loop_fixed,
            action: Box::new(action),
        }
    }

    /// Fire once after `delay`.
    pub fn once(delay: Duration, action: impl Work) -> Self {
        Self::new(delay, Duration::ZERO, false, action)
    }

    pub fn fixed_rate(first_delay: Duration, period: Duration, action: impl Work) -> Self {
        Self::new(first_delay, period, true, action)
    }

    pub fn fixed_delay(first_delay: Duration, delay: Duration, action: impl Work) -> Self {
        Self::new(first_delay, delay, false, action)
    }

    pub fn first_delay(&self) -> Duration {
        self.first_delay
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn loop_fixed(&self) -> bool {
        self.loop_fixed
    }

    pub fn mode(&self) -> ScheduleMode {
        if self.delay.is_zero() {
            ScheduleMode::Once
        } else if self.loop_fixed {
            ScheduleMode::FixedRate(self.delay)
        } else {
            ScheduleMode::FixedDelay(self.delay)
        }
    }

    pub fn origin(&self) -> &str {
        self.action.origin()
    }

    pub(crate) fn into_parts(self) -> (ScheduleMode, Duration, Box<dyn Work>) {
        let mode = self.mode();
        (mode, self.first_delay, self.action)
    }
}

impl fmt::Debug for TimerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerEvent")
            .field("first_delay", &self.first_delay)
            .field("delay", &self.delay)
            .field("loop_fixed", &self.loop_fixed)
            .field("origin", &self.origin())
            .finish()
    }
}
