//! Roll cooldown state machine
//!
//! Two states keyed off the session's `last_roll_time`:
//!
//! - **Idle**: no roll recorded, or the last one is at least
//!   [`ROLL_COOLDOWN`] old. Rolling is permitted.
//! - **Cooling**: a roll happened less than [`ROLL_COOLDOWN`] ago.
//!
//! Committing a roll stamps `last_roll_time = now`, which moves every
//! observer to Cooling. The way back to Idle is purely time based and each
//! client evaluates it against its own clock; nothing server-side enforces
//! it.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Minimum spacing between rolls
pub const ROLL_COOLDOWN: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownState {
    Idle,
    Cooling,
}

/// Cooldown state plus the time left until Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CooldownStatus {
    pub state: CooldownState,
    /// Zero while Idle
    pub remaining: Duration,
}

impl CooldownStatus {
    pub const IDLE: CooldownStatus = CooldownStatus {
        state: CooldownState::Idle,
        remaining: Duration::ZERO,
    };

    /// Evaluate the state machine at `now`
    pub fn evaluate(last_roll_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(last_roll) = last_roll_time else {
            return Self::IDLE;
        };

        let elapsed = now.signed_duration_since(last_roll);
        let cooldown = chrono::Duration::from_std(ROLL_COOLDOWN).unwrap_or(chrono::Duration::MAX);
        let remaining = cooldown - elapsed;

        match remaining.to_std() {
            Ok(left) if !left.is_zero() => Self {
                state: CooldownState::Cooling,
                remaining: left,
            },
            // Zero or negative: the full interval has passed
            _ => Self::IDLE,
        }
    }

    pub fn can_roll(&self) -> bool {
        self.state == CooldownState::Idle
    }

    /// Whole minutes left, rounded down
    pub fn remaining_minutes(&self) -> u64 {
        self.remaining.as_secs() / 60
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, 4, 22, 0, 0).unwrap()
    }

    #[test]
    fn test_no_roll_yet_is_idle() {
        assert_eq!(CooldownStatus::evaluate(None, now()), CooldownStatus::IDLE);
    }

    #[test]
    fn test_ten_minutes_ago_is_cooling() {
        let status = CooldownStatus::evaluate(Some(now() - chrono::Duration::minutes(10)), now());
        assert_eq!(status.state, CooldownState::Cooling);
        assert!(!status.can_roll());
        assert_eq!(status.remaining, Duration::from_secs(5 * 60));
        assert_eq!(status.remaining_minutes(), 5);
    }

    #[test]
    fn test_sixteen_minutes_ago_is_idle() {
        let status = CooldownStatus::evaluate(Some(now() - chrono::Duration::minutes(16)), now());
        assert!(status.can_roll());
    }

    #[test]
    fn test_exactly_fifteen_minutes_is_idle() {
        let status = CooldownStatus::evaluate(Some(now() - chrono::Duration::minutes(15)), now());
        assert!(status.can_roll());
        assert_eq!(status.remaining, Duration::ZERO);
    }

    #[test]
    fn test_roll_just_committed_is_cooling_for_full_interval() {
        let status = CooldownStatus::evaluate(Some(now()), now());
        assert_eq!(status.state, CooldownState::Cooling);
        assert_eq!(status.remaining, ROLL_COOLDOWN);
    }

    #[test]
    fn test_future_stamp_from_skewed_clock_keeps_cooling() {
        let status = CooldownStatus::evaluate(Some(now() + chrono::Duration::minutes(3)), now());
        assert_eq!(status.state, CooldownState::Cooling);
        assert_eq!(status.remaining, Duration::from_secs(18 * 60));
    }
}
