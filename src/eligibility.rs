//! Entry-rule evaluation.
//!
//! A pure function over a user's aggregate stats and a contest's entry rules.
//! The caller fetches the stats; nothing here performs I/O.
//!
//! Rules short-circuit in a fixed order so a rejected user gets one actionable
//! cause: referral minimum, then participation minimum, then participation
//! maximum. The participant cap is not evaluated here; the store enforces it
//! atomically at insert time.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{EntryRules, UserStats};

/// The entry rule a candidate failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    MinReferrals,
    MinContests,
    MaxContests,
}

impl Rule {
    pub fn name(&self) -> &'static str {
        match self {
            Rule::MinReferrals => "min_referrals",
            Rule::MinContests => "min_contests",
            Rule::MaxContests => "max_contests",
        }
    }
}

/// Structured rejection: which rule, what it requires, what was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleViolation {
    pub rule: Rule,
    pub required: u32,
    pub observed: u32,
}

impl fmt::Display for RuleViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            Rule::MinReferrals => write!(
                f,
                "at least {} referrals are required, you have {}",
                self.required, self.observed
            ),
            Rule::MinContests => write!(
                f,
                "at least {} previous contests are required, you have {}",
                self.required, self.observed
            ),
            Rule::MaxContests => write!(
                f,
                "at most {} previous contests are allowed, you have {}",
                self.required, self.observed
            ),
        }
    }
}

/// Evaluates `rules` against `stats`, returning the first violated rule.
pub fn evaluate(stats: &UserStats, rules: &EntryRules) -> Result<(), RuleViolation> {
    if let Some(required) = rules.min_referrals
        && stats.referrals < required
    {
        return Err(RuleViolation {
            rule: Rule::MinReferrals,
            required,
            observed: stats.referrals,
        });
    }

    if let Some(required) = rules.min_contests
        && stats.contests < required
    {
        return Err(RuleViolation {
            rule: Rule::MinContests,
            required,
            observed: stats.contests,
        });
    }

    if let Some(required) = rules.max_contests
        && stats.contests > required
    {
        return Err(RuleViolation {
            rule: Rule::MaxContests,
            required,
            observed: stats.contests,
        });
    }

    Ok(())
}
