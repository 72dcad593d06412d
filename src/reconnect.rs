// Copyright (c) 2021 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Pluggable reconnect backoff. No direct teacher analogue exists (the
//! teacher's client connects exactly once); built fresh as a small trait so
//! callers can supply their own schedule alongside the built-ins.

use std::time::Duration;

/// Why a reconnect attempt is being made, in case a strategy wants to react
/// differently to a clean disconnect versus a dropped connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectCause {
    ConnectionLost,
    ConnectFailed,
}

/// A reconnect schedule. `next_delay` is called after each failed attempt
/// with a 1-based attempt counter; returning `None` stops further attempts.
pub trait ReconnectStrategy: Send + Sync {
    fn next_delay(&self, attempt: u32, cause: ReconnectCause) -> Option<Duration>;
}

/// Never reconnect automatically.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

impl ReconnectStrategy for NoReconnect {
    fn next_delay(&self, _attempt: u32, _cause: ReconnectCause) -> Option<Duration> {
        None
    }
}

/// Fixed delay between every attempt.
#[derive(Debug, Clone, Copy)]
pub struct ConstantBackoff {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectStrategy for ConstantBackoff {
    fn next_delay(&self, attempt: u32, _cause: ReconnectCause) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        Some(self.delay)
    }
}

/// Delay grows linearly with the attempt count, capped at `max`.
#[derive(Debug, Clone, Copy)]
pub struct LinearBackoff {
    pub step: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectStrategy for LinearBackoff {
    fn next_delay(&self, attempt: u32, _cause: ReconnectCause) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let delay = self.step.saturating_mul(attempt).min(self.max);
        Some(delay)
    }
}

/// Delay doubles with every attempt starting from `initial`, capped at
/// `max`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
}

impl ReconnectStrategy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32, _cause: ReconnectCause) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let factor = 1_u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = self.initial.saturating_mul(factor).min(self.max);
        Some(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_doubles_until_cap() {
        let strategy = ExponentialBackoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            max_attempts: None,
        };
        let delays: Vec<_> = (1..=6)
            .map(|a| strategy.next_delay(a, ReconnectCause::ConnectionLost).unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8),
                Duration::from_secs(16),
                Duration::from_secs(30),
            ]
        );
    }

    #[test]
    fn constant_respects_max_attempts() {
        let strategy = ConstantBackoff {
            delay: Duration::from_secs(5),
            max_attempts: Some(2),
        };
        assert!(strategy.next_delay(1, ReconnectCause::ConnectionLost).is_some());
        assert!(strategy.next_delay(2, ReconnectCause::ConnectionLost).is_some());
        assert!(strategy.next_delay(3, ReconnectCause::ConnectionLost).is_none());
    }

    #[test]
    fn no_reconnect_never_retries() {
        assert!(NoReconnect.next_delay(1, ReconnectCause::ConnectFailed).is_none());
    }
}
