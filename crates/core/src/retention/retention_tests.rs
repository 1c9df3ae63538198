use super::*;
use crate::errors::Error;
use chrono::{Duration, TimeZone, Utc};

fn default_policy() -> RetentionPolicy {
    RetentionPolicy::from_settings(&RetentionSettings::default()).unwrap()
}

#[test]
fn test_default_settings_match_documented_values() {
    let settings = RetentionSettings::default();
    assert_eq!(settings.fine_days, 7);
    assert_eq!(settings.mid_days, 30);
    assert_eq!(settings.coarse_days, 365);
    assert_eq!(settings.mid_bucket_minutes, 5);
    assert_eq!(settings.coarse_bucket_minutes, 60);
    assert_eq!(settings.archive_bucket_minutes, 1_440);
    assert_eq!(default_policy(), RetentionPolicy::default());
}

#[test]
fn test_fine_window_is_never_compacted() {
    let policy = default_policy();
    assert_eq!(policy.evaluate(Duration::zero()), TierAssignment::NoCompaction);
    assert_eq!(
        policy.evaluate(Duration::days(7) - Duration::milliseconds(1)),
        TierAssignment::NoCompaction
    );
    // Clock skew: snapshot newer than "now".
    assert_eq!(policy.evaluate(Duration::minutes(-3)), TierAssignment::NoCompaction);
}

#[test]
fn test_boundaries_are_half_open() {
    let policy = default_policy();

    assert_eq!(
        policy.evaluate(Duration::days(7)),
        TierAssignment::Tier { index: 0, bucket_minutes: 5 }
    );
    assert_eq!(
        policy.evaluate(Duration::days(30) - Duration::milliseconds(1)),
        TierAssignment::Tier { index: 0, bucket_minutes: 5 }
    );
    assert_eq!(
        policy.evaluate(Duration::days(30)),
        TierAssignment::Tier { index: 1, bucket_minutes: 60 }
    );
    assert_eq!(
        policy.evaluate(Duration::days(365) - Duration::milliseconds(1)),
        TierAssignment::Tier { index: 1, bucket_minutes: 60 }
    );
    assert_eq!(
        policy.evaluate(Duration::days(365)),
        TierAssignment::Tier { index: 2, bucket_minutes: 1_440 }
    );
    assert_eq!(
        policy.evaluate(Duration::days(10_000)),
        TierAssignment::Tier { index: 2, bucket_minutes: 1_440 }
    );
}

#[test]
fn test_compare_age_orders_tiers() {
    let tier = RetentionTier::new(7, Some(30), 5);
    assert_eq!(tier.compare_age(Duration::days(6)), std::cmp::Ordering::Greater);
    assert_eq!(tier.compare_age(Duration::days(7)), std::cmp::Ordering::Equal);
    assert_eq!(tier.compare_age(Duration::days(30)), std::cmp::Ordering::Less);

    let open = RetentionTier::new(365, None, 1_440);
    assert_eq!(open.compare_age(Duration::days(50_000)), std::cmp::Ordering::Equal);
}

#[test]
fn test_bucket_key_is_epoch_aligned() {
    let t = Utc.with_ymd_and_hms(2024, 3, 1, 10, 7, 59).unwrap();
    assert_eq!(bucket_key(t, 5) % 5, 0);
    assert_eq!(bucket_key(t, 5), t.timestamp() / 60 / 5 * 5);
    assert_eq!(
        bucket_key(Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(), 5),
        bucket_key(Utc.with_ymd_and_hms(2024, 3, 1, 10, 9, 59).unwrap(), 5)
    );
    assert_ne!(
        bucket_key(Utc.with_ymd_and_hms(2024, 3, 1, 10, 9, 59).unwrap(), 5),
        bucket_key(Utc.with_ymd_and_hms(2024, 3, 1, 10, 10, 0).unwrap(), 5)
    );
    // Daily buckets start at UTC midnight.
    let midnight = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    assert_eq!(bucket_key(t, 1_440), midnight.timestamp() / 60);
}

#[test]
fn test_bucket_key_before_epoch() {
    let t = Utc.timestamp_millis_opt(-1).unwrap();
    assert_eq!(bucket_key(t, 5), -5);
}

#[test]
fn test_assign_bucket_depends_on_now() {
    let policy = default_policy();
    let captured = Utc.with_ymd_and_hms(2024, 1, 1, 12, 3, 0).unwrap();

    assert_eq!(policy.assign_bucket(captured, captured + Duration::days(1)), None);

    let mid = policy
        .assign_bucket(captured, captured + Duration::days(8))
        .unwrap();
    assert_eq!(mid.bucket_minutes, 5);

    let coarse = policy
        .assign_bucket(captured, captured + Duration::days(40))
        .unwrap();
    assert_eq!(coarse.bucket_minutes, 60);
    assert_eq!(coarse.start_minute, bucket_key(captured, 60));
}

#[test]
fn test_bucket_end_and_archive_tier() {
    let odd = RetentionPolicy::new(
        2,
        vec![RetentionTier::new(2, Some(9), 7), RetentionTier::new(9, None, 1_439)],
    )
    .unwrap();
    assert_eq!(odd.archive_tier().map(|t| t.bucket_minutes), Some(1_439));

    let captured = Utc.with_ymd_and_hms(2024, 1, 1, 23, 58, 0).unwrap();
    let bucket = odd
        .assign_bucket(captured, captured + Duration::days(3))
        .unwrap();
    assert_eq!(bucket.bucket_minutes, 7);
    assert!(bucket.start_minute * 60_000 <= captured.timestamp_millis());
    assert!(captured.timestamp_millis() < bucket.end_ms());
    assert_eq!(bucket.end_ms() - bucket.start_minute * 60_000, 7 * 60_000);
}

#[test]
fn test_rejects_gaps_and_overlaps() {
    let gap = RetentionPolicy::new(
        7,
        vec![RetentionTier::new(7, Some(30), 5), RetentionTier::new(31, None, 60)],
    );
    assert!(matches!(gap, Err(Error::InvalidConfigValue(_))));

    let overlap = RetentionPolicy::new(
        7,
        vec![RetentionTier::new(7, Some(30), 5), RetentionTier::new(20, None, 60)],
    );
    assert!(overlap.is_err());

    let not_from_fine = RetentionPolicy::new(7, vec![RetentionTier::new(8, None, 5)]);
    assert!(not_from_fine.is_err());
}

#[test]
fn test_rejects_bounded_last_tier_and_unbounded_middle() {
    assert!(RetentionPolicy::new(7, vec![RetentionTier::new(7, Some(30), 5)]).is_err());
    assert!(RetentionPolicy::new(
        7,
        vec![RetentionTier::new(7, None, 5), RetentionTier::new(30, None, 60)],
    )
    .is_err());
    assert!(RetentionPolicy::new(7, vec![]).is_err());
}

#[test]
fn test_rejects_invalid_widths() {
    assert!(RetentionPolicy::new(7, vec![RetentionTier::new(7, None, 0)]).is_err());
    assert!(RetentionPolicy::new(
        7,
        vec![RetentionTier::new(7, Some(30), 60), RetentionTier::new(30, None, 5)],
    )
    .is_err());
}

#[test]
fn test_from_settings_requires_increasing_days() {
    let settings = RetentionSettings {
        mid_days: 7,
        ..RetentionSettings::default()
    };
    assert!(RetentionPolicy::from_settings(&settings).is_err());

    let settings = RetentionSettings {
        fine_days: 0,
        ..RetentionSettings::default()
    };
    assert!(RetentionPolicy::from_settings(&settings).is_err());
}
