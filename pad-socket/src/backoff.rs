//! Reconnect scheduling with bounded exponential backoff and jitter.

use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Sleep};
use tracing::{debug, error, warn};

use pad_core::config::ReconnectSettings;

/// Configuration for socket reconnection behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay cap for exponential backoff.
    pub max_delay: Duration,
    /// Maximum number of reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
    /// Upper bound of the random delay added on top of the backoff.
    pub jitter: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self::from(&ReconnectSettings::default())
    }
}

impl From<&ReconnectSettings> for ReconnectConfig {
    fn from(settings: &ReconnectSettings) -> Self {
        Self {
            initial_delay: settings.initial_delay(),
            max_delay: settings.max_delay(),
            max_attempts: settings.max_attempts,
            jitter: settings.jitter(),
        }
    }
}

impl ReconnectConfig {
    /// Backoff for `attempt` (1-based) without jitter:
    /// `min(initial * 2^(attempt-1), max)`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Backoff for `attempt` plus uniform jitter in `[0, jitter)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + self.jitter.mul_f64(rand::random::<f64>())
    }

    /// Whether `attempt` is past the ceiling.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        self.max_attempts > 0 && attempt > self.max_attempts
    }
}

/// Result of asking the scheduler for another attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// A timer is armed for `attempt`.
    Scheduled { attempt: u32, delay: Duration },
    /// A timer was already armed; nothing changed.
    AlreadyPending,
    /// The attempt ceiling was exceeded; no timer is armed.
    Exhausted { attempts: u32 },
}

/// Tracks consecutive attempts and the single pending reconnect timer.
pub struct BackoffScheduler {
    config: ReconnectConfig,
    attempts: u32,
    pending: Option<Pin<Box<Sleep>>>,
}

impl BackoffScheduler {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            config,
            attempts: 0,
            pending: None,
        }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Consecutive attempts since the last reset.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Arm the timer for the next attempt.
    ///
    /// Ignored while a timer is already pending, so two failure reports for
    /// the same drop never race two reconnects.
    pub fn schedule(&mut self) -> ScheduleOutcome {
        if self.pending.is_some() {
            debug!("reconnect already scheduled, ignoring request");
            return ScheduleOutcome::AlreadyPending;
        }

        self.attempts = self.attempts.saturating_add(1);
        if self.config.is_exhausted(self.attempts) {
            error!(
                "max reconnection attempts ({}) reached",
                self.config.max_attempts
            );
            return ScheduleOutcome::Exhausted {
                attempts: self.attempts,
            };
        }

        let delay = self.config.delay_for_attempt(self.attempts);
        warn!(
            "reconnection attempt {} in {:.1}s",
            self.attempts,
            delay.as_secs_f64()
        );
        self.pending = Some(Box::pin(sleep(delay)));
        ScheduleOutcome::Scheduled {
            attempt: self.attempts,
            delay,
        }
    }

    /// Drop the pending timer, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Clear the attempt counter and the pending timer.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.pending = None;
    }

    /// Resolve when the pending timer expires, yielding the attempt number.
    ///
    /// Never resolves while no timer is armed. Dropping the returned future
    /// keeps the timer armed.
    pub async fn fired(&mut self) -> u32 {
        match self.pending.as_mut() {
            Some(timer) => {
                timer.as_mut().await;
                self.pending = None;
                self.attempts
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts,
            jitter: Duration::ZERO,
        }
    }

    #[test]
    fn test_base_delay_sequence() {
        let config = config(0);
        assert_eq!(config.base_delay(1), Duration::from_secs(1));
        assert_eq!(config.base_delay(2), Duration::from_secs(2));
        assert_eq!(config.base_delay(3), Duration::from_secs(4));
        assert_eq!(config.base_delay(5), Duration::from_secs(16));
        assert_eq!(config.base_delay(6), Duration::from_secs(30));
        assert_eq!(config.base_delay(200), Duration::from_secs(30));
    }

    #[test]
    fn test_jitter_is_bounded_and_additive() {
        let config = ReconnectConfig {
            jitter: Duration::from_millis(500),
            ..config(0)
        };
        for attempt in 1..8 {
            let base = config.base_delay(attempt);
            let delay = config.delay_for_attempt(attempt);
            assert!(delay >= base);
            assert!(delay < base + Duration::from_millis(500));
        }
    }

    #[test]
    fn test_defaults_match_settings() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 10);
    }

    #[tokio::test]
    async fn test_single_pending_timer() {
        let mut scheduler = BackoffScheduler::new(config(5));
        assert_eq!(
            scheduler.schedule(),
            ScheduleOutcome::Scheduled {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(scheduler.schedule(), ScheduleOutcome::AlreadyPending);
        assert_eq!(scheduler.attempts(), 1);
        assert!(scheduler.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fired_clears_pending() {
        let mut scheduler = BackoffScheduler::new(config(5));
        scheduler.schedule();
        let start = tokio::time::Instant::now();

        assert_eq!(scheduler.fired().await, 1);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(!scheduler.is_pending());

        assert!(matches!(
            scheduler.schedule(),
            ScheduleOutcome::Scheduled { attempt: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_exhaustion_after_ceiling() {
        let mut scheduler = BackoffScheduler::new(config(2));
        for expected in 1..=2 {
            assert!(matches!(
                scheduler.schedule(),
                ScheduleOutcome::Scheduled { attempt, .. } if attempt == expected
            ));
            scheduler.cancel();
        }
        assert_eq!(
            scheduler.schedule(),
            ScheduleOutcome::Exhausted { attempts: 3 }
        );
        assert!(!scheduler.is_pending());
    }

    #[tokio::test]
    async fn test_reset_clears_attempts_and_timer() {
        let mut scheduler = BackoffScheduler::new(config(2));
        scheduler.schedule();
        scheduler.reset();
        assert_eq!(scheduler.attempts(), 0);
        assert!(!scheduler.is_pending());
        assert!(!scheduler.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unarmed_scheduler_never_fires() {
        let mut scheduler = BackoffScheduler::new(config(2));
        let result =
            tokio::time::timeout(Duration::from_secs(3600), scheduler.fired()).await;
        assert!(result.is_err());
    }
}
