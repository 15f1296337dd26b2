// Test file - these are expected patterns in test code
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Edge Case Tests for Billing
//!
//! Tests critical boundary conditions in:
//! - Plan quotas and remaining-quota math (PLAN-01 to PLAN-04)
//! - Warning level bands (WARN-01 to WARN-08)
//! - Calendar month reset (RESET-01 to RESET-06)
//! - Stripe status mapping and tier derivation (SUB-01 to SUB-05)
//! - Webhook signature verification (HOOK-01 to HOOK-07)
//! - Usage summary shape (USAGE-01 to USAGE-03)

#[cfg(test)]
mod plan_tests {
    use crate::plans::*;

    // =========================================================================
    // PLAN-01: Quota table is the single source of truth
    // =========================================================================
    #[test]
    fn test_free_plan_quotas() {
        let plan = Plan::free();
        assert_eq!(plan.clips_per_month, 10);
        assert_eq!(plan.storage_limit_mb, 100.0);
        assert_eq!(plan.tier, SubscriptionTier::Free);
    }

    #[test]
    fn test_pro_plan_quotas() {
        let plan = Plan::pro();
        assert_eq!(plan.clips_per_month, 1_000);
        assert_eq!(plan.storage_limit_mb, 5_120.0);
        assert_eq!(plan.tier, SubscriptionTier::Pro);
    }

    // =========================================================================
    // PLAN-02: remaining() saturates at zero, never negative
    // =========================================================================
    #[test]
    fn test_remaining_never_negative() {
        assert_eq!(remaining(15, 10), 0);
        assert_eq!(remaining(u32::MAX, 10), 0);
    }

    // =========================================================================
    // PLAN-03: remaining() at and below the limit
    // =========================================================================
    #[test]
    fn test_remaining_at_boundaries() {
        assert_eq!(remaining(0, 10), 10);
        assert_eq!(remaining(9, 10), 1);
        assert_eq!(remaining(10, 10), 0);
    }

    // =========================================================================
    // PLAN-04: Unknown DB tier values fail closed to free
    // =========================================================================
    #[test]
    fn test_unknown_db_tier_reads_as_free() {
        assert_eq!(SubscriptionTier::from_db("pro"), SubscriptionTier::Pro);
        assert_eq!(SubscriptionTier::from_db("free"), SubscriptionTier::Free);
        assert_eq!(
            SubscriptionTier::from_db("enterprise"),
            SubscriptionTier::Free
        );
        assert_eq!(SubscriptionTier::from_db(""), SubscriptionTier::Free);
    }
}

#[cfg(test)]
mod warning_level_tests {
    use crate::plans::WarningLevel;

    // =========================================================================
    // WARN-01: Band edges - 74.99% is safe, 75% is warning
    // =========================================================================
    #[test]
    fn test_safe_warning_boundary() {
        assert_eq!(WarningLevel::classify(74, 100), WarningLevel::Safe);
        assert_eq!(WarningLevel::classify(75, 100), WarningLevel::Warning);
    }

    // =========================================================================
    // WARN-02: Band edges - 89% is warning, 90% is critical
    // =========================================================================
    #[test]
    fn test_warning_critical_boundary() {
        assert_eq!(WarningLevel::classify(89, 100), WarningLevel::Warning);
        assert_eq!(WarningLevel::classify(90, 100), WarningLevel::Critical);
    }

    // =========================================================================
    // WARN-03: Band edges - 99% is critical, 100% is exceeded
    // =========================================================================
    #[test]
    fn test_critical_exceeded_boundary() {
        assert_eq!(WarningLevel::classify(99, 100), WarningLevel::Critical);
        assert_eq!(WarningLevel::classify(100, 100), WarningLevel::Exceeded);
        assert_eq!(WarningLevel::classify(150, 100), WarningLevel::Exceeded);
    }

    // =========================================================================
    // WARN-04: 9 of 10 free clips = 90% = critical (not warning)
    // =========================================================================
    #[test]
    fn test_nine_of_ten_is_critical() {
        assert_eq!(WarningLevel::classify(9, 10), WarningLevel::Critical);
    }

    // =========================================================================
    // WARN-05: Zero usage is safe
    // =========================================================================
    #[test]
    fn test_zero_usage_is_safe() {
        assert_eq!(WarningLevel::classify(0, 10), WarningLevel::Safe);
        assert_eq!(WarningLevel::classify(0, 1_000), WarningLevel::Safe);
    }

    // =========================================================================
    // WARN-06: Zero limit is always exceeded
    // =========================================================================
    #[test]
    fn test_zero_limit_is_exceeded() {
        assert_eq!(WarningLevel::classify(0, 0), WarningLevel::Exceeded);
        assert_eq!(WarningLevel::classify(5, 0), WarningLevel::Exceeded);
    }

    // =========================================================================
    // WARN-07: classify() is monotonically non-decreasing in `used`
    // =========================================================================
    #[test]
    fn test_monotonic_in_used() {
        for limit in [10u32, 100, 1_000] {
            let mut previous = WarningLevel::Safe;
            for used in 0..=(limit + 10) {
                let level = WarningLevel::classify(used, limit);
                assert!(
                    level >= previous,
                    "warning level regressed at used={} limit={}",
                    used,
                    limit
                );
                previous = level;
            }
        }
    }

    // =========================================================================
    // WARN-08: Serialized band names match the API contract
    // =========================================================================
    #[test]
    fn test_band_names() {
        assert_eq!(WarningLevel::Safe.as_str(), "safe");
        assert_eq!(WarningLevel::Warning.as_str(), "warning");
        assert_eq!(WarningLevel::Critical.as_str(), "critical");
        assert_eq!(WarningLevel::Exceeded.as_str(), "exceeded");

        let json = serde_json::to_value(WarningLevel::Exceeded).unwrap();
        assert_eq!(json, serde_json::json!("exceeded"));
    }
}

#[cfg(test)]
mod reset_tests {
    use crate::usage::{days_until_reset, next_month_start};
    use time::macros::datetime;
    use time::Month;

    // =========================================================================
    // RESET-01: Mid-month resolves to the 1st of the next month
    // =========================================================================
    #[test]
    fn test_mid_month_reset_date() {
        let reset = next_month_start(datetime!(2026-08-06 12:00 UTC));
        assert_eq!(reset.year(), 2026);
        assert_eq!(reset.month(), Month::September);
        assert_eq!(reset.day(), 1);
    }

    // =========================================================================
    // RESET-02: December rolls the year
    // =========================================================================
    #[test]
    fn test_december_rolls_year() {
        let reset = next_month_start(datetime!(2026-12-31 23:59 UTC));
        assert_eq!(reset.year(), 2027);
        assert_eq!(reset.month(), Month::January);
        assert_eq!(reset.day(), 1);
    }

    // =========================================================================
    // RESET-03: The 1st of a month still resets next month, not today
    // =========================================================================
    #[test]
    fn test_first_of_month_resets_next_month() {
        let reset = next_month_start(datetime!(2026-08-01 00:00 UTC));
        assert_eq!(reset.month(), Month::September);
        assert_eq!(reset.day(), 1);
    }

    // =========================================================================
    // RESET-04: days_until_reset is a ceiling of the day difference
    // =========================================================================
    #[test]
    fn test_days_until_reset_is_ceiling() {
        // 25 days and 12 hours remain -> 26 days
        assert_eq!(days_until_reset(datetime!(2026-08-06 12:00 UTC)), 26);
        // Exactly 26 days remain -> 26 days
        assert_eq!(days_until_reset(datetime!(2026-08-06 00:00 UTC)), 26);
    }

    // =========================================================================
    // RESET-05: Last moment of the month still reports one day
    // =========================================================================
    #[test]
    fn test_last_day_reports_one() {
        assert_eq!(days_until_reset(datetime!(2026-08-31 00:00 UTC)), 1);
        assert_eq!(days_until_reset(datetime!(2026-08-31 23:59:59 UTC)), 1);
    }

    // =========================================================================
    // RESET-06: days_until_reset is always at least one
    // =========================================================================
    #[test]
    fn test_always_at_least_one_day() {
        for day in 1..=28u8 {
            let now = time::Date::from_calendar_date(2026, Month::February, day)
                .unwrap()
                .midnight()
                .assume_utc();
            assert!(days_until_reset(now) >= 1, "day {} reported zero", day);
        }
    }
}

#[cfg(test)]
mod status_mapping_tests {
    use crate::plans::{SubscriptionStatus, SubscriptionTier};

    // =========================================================================
    // SUB-01: The three tracked Stripe statuses map one-to-one
    // =========================================================================
    #[test]
    fn test_tracked_statuses() {
        assert_eq!(
            SubscriptionStatus::from_stripe(stripe::SubscriptionStatus::Active),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_stripe(stripe::SubscriptionStatus::PastDue),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_stripe(stripe::SubscriptionStatus::Canceled),
            SubscriptionStatus::Canceled
        );
    }

    // =========================================================================
    // SUB-02: Everything else collapses to inactive
    // =========================================================================
    #[test]
    fn test_other_statuses_are_inactive() {
        for status in [
            stripe::SubscriptionStatus::Trialing,
            stripe::SubscriptionStatus::Incomplete,
            stripe::SubscriptionStatus::IncompleteExpired,
            stripe::SubscriptionStatus::Unpaid,
            stripe::SubscriptionStatus::Paused,
        ] {
            assert_eq!(
                SubscriptionStatus::from_stripe(status),
                SubscriptionStatus::Inactive,
                "{:?} should map to inactive",
                status
            );
        }
    }

    // =========================================================================
    // SUB-03: Tier derives from status - pro iff active
    // =========================================================================
    #[test]
    fn test_tier_derivation() {
        assert_eq!(
            SubscriptionStatus::Active.derived_tier(),
            SubscriptionTier::Pro
        );
        assert_eq!(
            SubscriptionStatus::PastDue.derived_tier(),
            SubscriptionTier::Free
        );
        assert_eq!(
            SubscriptionStatus::Canceled.derived_tier(),
            SubscriptionTier::Free
        );
        assert_eq!(
            SubscriptionStatus::Inactive.derived_tier(),
            SubscriptionTier::Free
        );
    }

    // =========================================================================
    // SUB-04: Database string values round-trip
    // =========================================================================
    #[test]
    fn test_status_db_strings() {
        assert_eq!(SubscriptionStatus::Inactive.as_str(), "inactive");
        assert_eq!(SubscriptionStatus::Active.as_str(), "active");
        assert_eq!(SubscriptionStatus::PastDue.as_str(), "past_due");
        assert_eq!(SubscriptionStatus::Canceled.as_str(), "canceled");
    }

    // =========================================================================
    // SUB-05: Tier string values match what handlers write
    // =========================================================================
    #[test]
    fn test_tier_db_strings() {
        assert_eq!(SubscriptionTier::Free.as_str(), "free");
        assert_eq!(SubscriptionTier::Pro.as_str(), "pro");
    }
}

#[cfg(test)]
mod signature_tests {
    use crate::error::BillingError;
    use crate::webhooks::verify_signature;
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    const SECRET: &str = "whsec_test_secret_for_verification";
    const NOW: i64 = 1_770_000_000;

    /// Produce the signature header Stripe would send for this payload.
    fn sign(payload: &str, timestamp: i64, secret: &str) -> String {
        let key = secret.strip_prefix("whsec_").unwrap_or(secret);
        let mut mac = Hmac::<Sha256>::new_from_slice(key.as_bytes()).unwrap();
        mac.update(format!("{}.{}", timestamp, payload).as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        format!("t={},v1={}", timestamp, sig)
    }

    // =========================================================================
    // HOOK-01: A correctly signed payload verifies
    // =========================================================================
    #[test]
    fn test_valid_signature_accepted() {
        let payload = r#"{"id":"evt_1","type":"invoice.payment_succeeded"}"#;
        let header = sign(payload, NOW, SECRET);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    // =========================================================================
    // HOOK-02: Tampered payload is rejected
    // =========================================================================
    #[test]
    fn test_tampered_payload_rejected() {
        let header = sign(r#"{"amount":100}"#, NOW, SECRET);
        let result = verify_signature(r#"{"amount":999}"#, &header, SECRET, NOW);
        assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    }

    // =========================================================================
    // HOOK-03: Timestamp outside the 5-minute tolerance is rejected
    // =========================================================================
    #[test]
    fn test_stale_timestamp_rejected() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, NOW - 301, SECRET);
        let result = verify_signature(payload, &header, SECRET, NOW);
        assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    }

    // =========================================================================
    // HOOK-04: Timestamp just inside the tolerance is accepted
    // =========================================================================
    #[test]
    fn test_timestamp_within_tolerance_accepted() {
        let payload = r#"{"id":"evt_1"}"#;
        let header = sign(payload, NOW - 299, SECRET);
        assert!(verify_signature(payload, &header, SECRET, NOW).is_ok());
    }

    // =========================================================================
    // HOOK-05: Missing v1 component is rejected
    // =========================================================================
    #[test]
    fn test_missing_v1_rejected() {
        let header = format!("t={}", NOW);
        let result = verify_signature("{}", &header, SECRET, NOW);
        assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    }

    // =========================================================================
    // HOOK-06: Missing timestamp component is rejected
    // =========================================================================
    #[test]
    fn test_missing_timestamp_rejected() {
        let result = verify_signature("{}", "v1=deadbeef", SECRET, NOW);
        assert!(matches!(result, Err(BillingError::WebhookSignatureInvalid)));
    }

    // =========================================================================
    // HOOK-07: Garbage header is rejected, not a panic
    // =========================================================================
    #[test]
    fn test_garbage_header_rejected() {
        for header in ["", ",,,", "t=abc,v1=xyz", "not-a-header"] {
            let result = verify_signature("{}", header, SECRET, NOW);
            assert!(
                matches!(result, Err(BillingError::WebhookSignatureInvalid)),
                "header {:?} should be rejected",
                header
            );
        }
    }
}

#[cfg(test)]
mod usage_summary_tests {
    use crate::plans::{SubscriptionTier, WarningLevel};
    use crate::usage::{summarize, CurrentUsage};
    use time::macros::datetime;

    // =========================================================================
    // USAGE-01: The worked example - 9/10 free clips
    // =========================================================================
    #[test]
    fn test_nine_of_ten_free_summary() {
        let summary = summarize(
            SubscriptionTier::Free,
            CurrentUsage {
                clips_this_month: 9,
                storage_used_mb: 42.5,
            },
            datetime!(2026-08-06 12:00 UTC),
        );

        assert_eq!(summary.clips_this_month, 9);
        assert_eq!(summary.clips_limit, 10);
        assert_eq!(summary.clips_remaining, 1);
        assert_eq!(summary.warning_level, WarningLevel::Critical);
        assert_eq!(summary.storage_limit_mb, 100.0);
        assert_eq!(summary.reset_date, "2026-09-01");
        assert_eq!(summary.days_until_reset, 26);
    }

    // =========================================================================
    // USAGE-02: Over-quota summary clamps remaining and reports exceeded
    // =========================================================================
    #[test]
    fn test_over_quota_summary() {
        let summary = summarize(
            SubscriptionTier::Free,
            CurrentUsage {
                clips_this_month: 14,
                storage_used_mb: 0.0,
            },
            datetime!(2026-08-06 12:00 UTC),
        );

        assert_eq!(summary.clips_remaining, 0);
        assert_eq!(summary.warning_level, WarningLevel::Exceeded);
    }

    // =========================================================================
    // USAGE-03: Response field names and values match the API contract
    // =========================================================================
    #[test]
    fn test_response_shape() {
        let summary = summarize(
            SubscriptionTier::Pro,
            CurrentUsage {
                clips_this_month: 100,
                storage_used_mb: 512.0,
            },
            datetime!(2026-12-15 00:00 UTC),
        );

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["subscription_tier"], "pro");
        assert_eq!(json["clips_this_month"], 100);
        assert_eq!(json["clips_limit"], 1_000);
        assert_eq!(json["clips_remaining"], 900);
        assert_eq!(json["storage_used_mb"], 512.0);
        assert_eq!(json["storage_limit_mb"], 5_120.0);
        assert_eq!(json["reset_date"], "2027-01-01");
        assert_eq!(json["days_until_reset"], 17);
        assert_eq!(json["warning_level"], "safe");
    }
}
