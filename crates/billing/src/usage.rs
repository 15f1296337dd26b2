//! Usage metering
//!
//! Tracks clips captured per calendar month and storage consumed per user.
//! The monthly counter resets at calendar month boundaries, not on a rolling
//! window: every read and write compares `last_reset_date` against the start
//! of the current month and zeroes the counter when a boundary was crossed,
//! so the sweep job in the worker is a tidy-up rather than a correctness
//! requirement.

use serde::Serialize;
use sqlx::PgPool;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::error::BillingResult;
use crate::plans::{remaining, Plan, SubscriptionTier, WarningLevel};

/// First day of the month after `now`, in UTC.
pub fn next_month_start(now: OffsetDateTime) -> Date {
    let date = now.date();
    let first = match date.month() {
        Month::December => Date::from_calendar_date(date.year() + 1, Month::January, 1),
        month => Date::from_calendar_date(date.year(), month.next(), 1),
    };
    // Day 1 of a real month is always a valid calendar date.
    first.unwrap_or(date)
}

/// Ceiling of the day difference between `now` and the next reset boundary.
pub fn days_until_reset(now: OffsetDateTime) -> i64 {
    let reset = next_month_start(now).midnight().assume_utc();
    let secs = (reset - now).whole_seconds();
    (secs + 86_399) / 86_400
}

/// Current counters for one user
#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentUsage {
    pub clips_this_month: u32,
    pub storage_used_mb: f64,
}

/// Usage endpoint response body
#[derive(Debug, Clone, Serialize)]
pub struct UsageSummary {
    pub subscription_tier: SubscriptionTier,
    pub clips_this_month: u32,
    pub clips_limit: u32,
    pub clips_remaining: u32,
    pub storage_used_mb: f64,
    pub storage_limit_mb: f64,
    pub reset_date: String,
    pub days_until_reset: i64,
    pub warning_level: WarningLevel,
}

/// Build the usage summary from already-fetched counters.
///
/// Pure so the quota bands and reset math are testable with a pinned clock.
pub fn summarize(tier: SubscriptionTier, usage: CurrentUsage, now: OffsetDateTime) -> UsageSummary {
    let plan = Plan::for_tier(tier);
    let date_format = format_description!("[year]-[month]-[day]");
    let reset_date = next_month_start(now)
        .format(&date_format)
        .unwrap_or_default();

    UsageSummary {
        subscription_tier: tier,
        clips_this_month: usage.clips_this_month,
        clips_limit: plan.clips_per_month,
        clips_remaining: remaining(usage.clips_this_month, plan.clips_per_month),
        storage_used_mb: usage.storage_used_mb,
        storage_limit_mb: plan.storage_limit_mb,
        reset_date,
        days_until_reset: days_until_reset(now),
        warning_level: WarningLevel::classify(usage.clips_this_month, plan.clips_per_month),
    }
}

/// Usage meter backed by the `usage_records` table
#[derive(Clone)]
pub struct UsageMeter {
    pool: PgPool,
}

impl UsageMeter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current counters for a user, applying the lazy month reset on read.
    /// A user with no usage row yet reads as zero.
    pub async fn current_usage(&self, user_id: Uuid) -> BillingResult<CurrentUsage> {
        let row: Option<(i32, f64)> = sqlx::query_as(
            r#"
            SELECT
                CASE WHEN last_reset_date < date_trunc('month', NOW())
                     THEN 0 ELSE clips_this_month END,
                storage_used_mb
            FROM usage_records
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row
            .map(|(clips, storage)| CurrentUsage {
                clips_this_month: clips.max(0) as u32,
                storage_used_mb: storage,
            })
            .unwrap_or_default())
    }

    /// Record one captured clip: bump the monthly counter and storage total
    /// in a single upsert. Crossing a month boundary restarts the counter at
    /// one rather than incrementing the stale value.
    pub async fn record_clip(&self, user_id: Uuid, size_mb: f64) -> BillingResult<()> {
        sqlx::query(
            r#"
            INSERT INTO usage_records (user_id, clips_this_month, storage_used_mb, last_reset_date)
            VALUES ($1, 1, $2, date_trunc('month', NOW()))
            ON CONFLICT (user_id) DO UPDATE SET
                clips_this_month = CASE
                    WHEN usage_records.last_reset_date < date_trunc('month', NOW()) THEN 1
                    ELSE usage_records.clips_this_month + 1
                END,
                storage_used_mb = usage_records.storage_used_mb + EXCLUDED.storage_used_mb,
                last_reset_date = date_trunc('month', NOW())
            "#,
        )
        .bind(user_id)
        .bind(size_mb)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Release storage when a clip is deleted. The monthly clip counter is
    /// monotonic within a month and is not decremented.
    pub async fn release_storage(&self, user_id: Uuid, size_mb: f64) -> BillingResult<()> {
        sqlx::query(
            r#"
            UPDATE usage_records
            SET storage_used_mb = GREATEST(0, storage_used_mb - $2)
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(size_mb)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Fetch counters and produce the usage endpoint response.
    pub async fn usage_summary(
        &self,
        user_id: Uuid,
        tier: SubscriptionTier,
        now: OffsetDateTime,
    ) -> BillingResult<UsageSummary> {
        let usage = self.current_usage(user_id).await?;
        Ok(summarize(tier, usage, now))
    }

    /// Zero counters whose reset date is in a previous month. Run by the
    /// worker on the first of each month; returns the number of rows swept.
    pub async fn sweep_monthly_reset(&self) -> BillingResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE usage_records
            SET clips_this_month = 0,
                last_reset_date = date_trunc('month', NOW())
            WHERE last_reset_date < date_trunc('month', NOW())
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Recompute storage totals from the clips table. Corrects drift from
    /// interrupted deletes; returns the number of rows touched.
    pub async fn reconcile_storage(&self) -> BillingResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE usage_records u
            SET storage_used_mb = COALESCE(c.total_mb, 0)
            FROM usage_records u2
            LEFT JOIN (
                SELECT user_id, SUM(size_mb) AS total_mb
                FROM clips
                GROUP BY user_id
            ) c ON c.user_id = u2.user_id
            WHERE u.user_id = u2.user_id
              AND u.storage_used_mb IS DISTINCT FROM COALESCE(c.total_mb, 0)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
