//! Subscription tiers, plan quotas, and quota classification
//!
//! The quota table here is the single source of truth for plan limits.

use serde::{Deserialize, Serialize};

/// Subscription tier gating quota
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Pro,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
        }
    }

    /// Parse a tier stored in the database; unknown values fall back to free
    /// so a bad row never grants paid quota.
    pub fn from_db(value: &str) -> Self {
        match value {
            "pro" => SubscriptionTier::Pro,
            _ => SubscriptionTier::Free,
        }
    }
}

/// Subscription status as tracked on the user row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Inactive,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Canceled => "canceled",
        }
    }

    /// Collapse Stripe's subscription status onto the four states the user
    /// row tracks. Trialing, incomplete, unpaid and paused subscriptions are
    /// all "inactive" until Stripe reports them active.
    pub fn from_stripe(status: stripe::SubscriptionStatus) -> Self {
        match status {
            stripe::SubscriptionStatus::Active => SubscriptionStatus::Active,
            stripe::SubscriptionStatus::PastDue => SubscriptionStatus::PastDue,
            stripe::SubscriptionStatus::Canceled => SubscriptionStatus::Canceled,
            _ => SubscriptionStatus::Inactive,
        }
    }

    /// Tier is derived from status, never set independently: a subscription
    /// grants pro exactly while it is active.
    pub fn derived_tier(&self) -> SubscriptionTier {
        match self {
            SubscriptionStatus::Active => SubscriptionTier::Pro,
            _ => SubscriptionTier::Free,
        }
    }
}

/// Plan quota configuration
#[derive(Debug, Clone, Copy)]
pub struct Plan {
    pub tier: SubscriptionTier,
    pub clips_per_month: u32,
    pub storage_limit_mb: f64,
}

impl Plan {
    /// Free tier: 10 clips/month, 100 MB storage
    pub fn free() -> Self {
        Self {
            tier: SubscriptionTier::Free,
            clips_per_month: 10,
            storage_limit_mb: 100.0,
        }
    }

    /// Pro tier: 1,000 clips/month, 5 GB storage
    pub fn pro() -> Self {
        Self {
            tier: SubscriptionTier::Pro,
            clips_per_month: 1_000,
            storage_limit_mb: 5_120.0,
        }
    }

    pub fn for_tier(tier: SubscriptionTier) -> Self {
        match tier {
            SubscriptionTier::Free => Self::free(),
            SubscriptionTier::Pro => Self::pro(),
        }
    }
}

/// Quota left before the limit, saturating at zero.
pub fn remaining(used: u32, limit: u32) -> u32 {
    limit.saturating_sub(used)
}

/// Classification of quota consumption into warning bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WarningLevel {
    Safe,
    Warning,
    Critical,
    Exceeded,
}

impl WarningLevel {
    /// Band thresholds on used/limit percent:
    /// <75% safe, <90% warning, <100% critical, >=100% exceeded.
    pub fn classify(used: u32, limit: u32) -> Self {
        if limit == 0 {
            return WarningLevel::Exceeded;
        }
        let pct = (used as f64 / limit as f64) * 100.0;
        if pct >= 100.0 {
            WarningLevel::Exceeded
        } else if pct >= 90.0 {
            WarningLevel::Critical
        } else if pct >= 75.0 {
            WarningLevel::Warning
        } else {
            WarningLevel::Safe
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WarningLevel::Safe => "safe",
            WarningLevel::Warning => "warning",
            WarningLevel::Critical => "critical",
            WarningLevel::Exceeded => "exceeded",
        }
    }
}
