//! Roleplay clock.
//!
//! Story time advances by scaled real time between turns, never by less
//! than a fixed minimum, so even rapid exchanges move the scene forward.

use std::time::Instant;

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::ContextConfig;

/// Display format for the prompt, e.g. `"Wednesday, 02:00 PM"`.
pub const DISPLAY_FORMAT: &str = "%A, %I:%M %p";

/// In-story wall clock.
#[derive(Debug, Clone)]
pub struct RoleplayClock {
    current: NaiveDateTime,
    scale_factor: f64,
    min_advance: Duration,
    last_tick: Instant,
}

impl RoleplayClock {
    /// Start at `config.clock_start`.
    #[must_use]
    pub fn new(config: &ContextConfig) -> Self {
        Self {
            current: config.clock_start,
            scale_factor: config.time_scale_factor,
            min_advance: Duration::minutes(i64::from(config.min_advance_minutes)),
            last_tick: Instant::now(),
        }
    }

    /// Advance by `max(real_elapsed * scale, min_advance)`. If that would
    /// leave the representable date range the clock holds and returns zero.
    pub fn advance(&mut self, real_elapsed: std::time::Duration) -> Duration {
        #[allow(clippy::cast_possible_truncation)]
        let scaled_ms = (real_elapsed.as_secs_f64() * self.scale_factor * 1000.0) as i64;
        let delta = Duration::try_milliseconds(scaled_ms)
            .unwrap_or(Duration::MAX)
            .max(self.min_advance);
        let Some(next) = self.current.checked_add_signed(delta) else {
            warn!(
                time = %self.current,
                advance_s = delta.num_seconds(),
                "Roleplay clock would overflow, holding current time"
            );
            return Duration::zero();
        };
        self.current = next;
        debug!(
            real_ms = real_elapsed.as_millis(),
            advanced_s = delta.num_seconds(),
            "Advanced roleplay clock"
        );
        delta
    }

    /// Advance by the real time since the previous tick.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick);
        self.last_tick = now;
        let delta = self.advance(elapsed);
        info!(time = %self.current.format("%Y-%m-%d %H:%M:%S"), "Roleplay time advanced");
        delta
    }

    /// Set story time from persisted state and reset the real-time tracker.
    pub fn restore(&mut self, current: NaiveDateTime) {
        self.current = current;
        self.last_tick = Instant::now();
    }

    /// Current story time.
    #[must_use]
    pub fn now(&self) -> NaiveDateTime {
        self.current
    }

    /// Current story time in [`DISPLAY_FORMAT`].
    #[must_use]
    pub fn display(&self) -> String {
        self.current.format(DISPLAY_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_a_wednesday_afternoon() {
        let clock = RoleplayClock::new(&ContextConfig::default());
        assert_eq!(clock.display(), "Wednesday, 02:00 PM");
    }

    #[test]
    fn short_turns_advance_by_the_minimum() {
        let mut clock = RoleplayClock::new(&ContextConfig::default());
        let delta = clock.advance(std::time::Duration::from_secs(1));
        assert_eq!(delta, Duration::minutes(2));
        assert_eq!(clock.display(), "Wednesday, 02:02 PM");
    }

    #[test]
    fn long_turns_are_scaled() {
        let mut clock = RoleplayClock::new(&ContextConfig::default());
        // 60s real * 15 = 15 minutes story time.
        let delta = clock.advance(std::time::Duration::from_secs(60));
        assert_eq!(delta, Duration::minutes(15));
        assert_eq!(clock.display(), "Wednesday, 02:15 PM");
    }

    #[test]
    fn overflow_holds_time_instead_of_panicking() {
        let mut clock = RoleplayClock::new(&ContextConfig::default());
        clock.restore(NaiveDateTime::MAX);
        assert_eq!(clock.advance(std::time::Duration::from_secs(1)), Duration::zero());
        assert_eq!(clock.now(), NaiveDateTime::MAX);
    }

    #[test]
    fn huge_scale_factor_does_not_panic() {
        let config = ContextConfig {
            time_scale_factor: 1e15,
            ..ContextConfig::default()
        };
        let mut clock = RoleplayClock::new(&config);
        let start = clock.now();
        clock.advance(std::time::Duration::from_secs(3600));
        assert!(clock.now() >= start);
    }
}
