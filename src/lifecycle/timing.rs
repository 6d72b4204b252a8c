//! Timing and policy configuration for the phase runners.
//!
//! # Intervals
//!
//! - **Collection poll**: 15 seconds by default (configurable via
//!   `GIVEAWAY_POLL_INTERVAL_SECS`). The registration handler closes
//!   collection as soon as the target is reached; the poll is the fallback
//!   that also enforces the deadline.
//! - **Store backoff**: 5 seconds after a failed store call inside a runner.
//! - **Countdown tick**: the manual-selection roster is re-rendered every
//!   minute while the decision window runs.
//! - **Leaderboard refresh**: the activity leaderboard is re-rendered every
//!   30 seconds.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;

use crate::types::MAX_WINDOW;

/// Default collection poll interval (15 seconds).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 15;

/// Default wait after a failed store call (5 seconds).
const DEFAULT_STORE_BACKOFF_SECS: u64 = 5;

/// Default countdown re-render interval (1 minute).
const DEFAULT_COUNTDOWN_TICK_SECS: u64 = 60;

/// Default leaderboard re-render interval (30 seconds).
const DEFAULT_LEADERBOARD_REFRESH_SECS: u64 = 30;

/// Second window used for records that never stored one (10 minutes).
const DEFAULT_SECOND_WINDOW_SECS: u64 = 600;

/// The instant `remaining` from now.
///
/// Windows that would overflow the clock are clamped to [`MAX_WINDOW`].
pub fn deadline_after(remaining: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(remaining)
        .unwrap_or_else(|| now + MAX_WINDOW)
}

/// What an activity contest does when nobody posted during its window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZeroActivityPolicy {
    /// The top leaderboard entry wins even with a count of zero.
    #[default]
    DeclareTopRanked,

    /// No winner unless the top entry posted at least once.
    RequireActivity,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown zero-activity policy: {0} (expected `top` or `require`)")]
pub struct UnknownPolicy(pub String);

impl FromStr for ZeroActivityPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" | "declare_top_ranked" => Ok(ZeroActivityPolicy::DeclareTopRanked),
            "require" | "require_activity" => Ok(ZeroActivityPolicy::RequireActivity),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

/// Timing and policy knobs shared by every runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Interval between collection-phase ticks.
    ///
    /// Default: 15 seconds. Configure via `GIVEAWAY_POLL_INTERVAL_SECS`.
    pub poll_interval: Duration,

    /// Wait after a failed store call before the runner retries.
    pub store_backoff: Duration,

    /// Interval between manual-selection countdown edits.
    pub countdown_tick: Duration,

    /// Interval between activity leaderboard edits.
    pub leaderboard_refresh: Duration,

    /// Fallback second window for records that lack one.
    pub default_second_window: Duration,

    /// Configure via `GIVEAWAY_ZERO_ACTIVITY` (`top` or `require`).
    pub zero_activity: ZeroActivityPolicy,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleConfig {
    /// Creates a `LifecycleConfig` with default values.
    pub fn new() -> Self {
        LifecycleConfig {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            store_backoff: Duration::from_secs(DEFAULT_STORE_BACKOFF_SECS),
            countdown_tick: Duration::from_secs(DEFAULT_COUNTDOWN_TICK_SECS),
            leaderboard_refresh: Duration::from_secs(DEFAULT_LEADERBOARD_REFRESH_SECS),
            default_second_window: Duration::from_secs(DEFAULT_SECOND_WINDOW_SECS),
            zero_activity: ZeroActivityPolicy::default(),
        }
    }

    /// Creates a `LifecycleConfig` from environment variables.
    ///
    /// Unset or unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        let poll_secs = std::env::var("GIVEAWAY_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let zero_activity = std::env::var("GIVEAWAY_ZERO_ACTIVITY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        LifecycleConfig {
            poll_interval: Duration::from_secs(poll_secs),
            zero_activity,
            ..Self::new()
        }
    }

    pub fn with_zero_activity(mut self, policy: ZeroActivityPolicy) -> Self {
        self.zero_activity = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_intervals() {
        let config = LifecycleConfig::new();
        assert_eq!(config.poll_interval, Duration::from_secs(15));
        assert_eq!(config.store_backoff, Duration::from_secs(5));
        assert_eq!(config.countdown_tick, Duration::from_secs(60));
        assert_eq!(config.leaderboard_refresh, Duration::from_secs(30));
        assert_eq!(config.zero_activity, ZeroActivityPolicy::DeclareTopRanked);
    }

    #[test]
    fn policy_parses_short_and_long_names() {
        assert_eq!(
            "require".parse::<ZeroActivityPolicy>(),
            Ok(ZeroActivityPolicy::RequireActivity)
        );
        assert_eq!(
            "Declare_Top_Ranked".parse::<ZeroActivityPolicy>(),
            Ok(ZeroActivityPolicy::DeclareTopRanked)
        );
        assert!("never".parse::<ZeroActivityPolicy>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_clamps_windows_that_would_overflow() {
        let now = Instant::now();
        assert_eq!(deadline_after(Duration::from_secs(90)), now + Duration::from_secs(90));
        assert_eq!(deadline_after(Duration::MAX), now + MAX_WINDOW);
    }

    #[test]
    fn builder_overrides_policy() {
        let config =
            LifecycleConfig::new().with_zero_activity(ZeroActivityPolicy::RequireActivity);
        assert_eq!(config.zero_activity, ZeroActivityPolicy::RequireActivity);
    }
}
