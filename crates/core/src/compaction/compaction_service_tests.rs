#[cfg(test)]
mod tests {
    use crate::compaction::{CompactionOptions, CompactionService};
    use crate::jobs::{JobCursor, JobName, JobRunStatus};
    use crate::retention::{bucket_key, RetentionPolicy, RetentionSettings, RetentionTier};
    use crate::snapshots::{InMemorySnapshotRepository, Snapshot, SnapshotRepositoryTrait};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 3, 17, 0).unwrap()
    }

    fn service(repo: &InMemorySnapshotRepository, policy: RetentionPolicy) -> CompactionService {
        CompactionService::new(
            Arc::new(repo.clone()),
            policy,
            CompactionOptions { concurrency: 2 },
        )
    }

    /// One snapshot per minute for `minutes` minutes starting at `start`.
    fn minutely(account_id: &str, start: DateTime<Utc>, minutes: i64) -> Vec<Snapshot> {
        (0..minutes)
            .map(|i| {
                Snapshot::new(
                    account_id,
                    start + Duration::minutes(i),
                    Decimal::from(1_000 + i),
                    dec!(50),
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fine_window_left_untouched() {
        let repo = InMemorySnapshotRepository::new();
        let fine = minutely("acc-1", now() - Duration::days(2), 120);
        repo.seed(fine.clone());
        let svc = service(&repo, RetentionPolicy::default());

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(report.snapshots_deleted, 0);
        assert_eq!(repo.all("acc-1"), fine);
        assert_eq!(repo.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_mid_tier_collapses_to_latest_per_bucket() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
        let history = minutely("acc-1", start, 60);
        repo.seed(history.clone());
        let svc = service(&repo, RetentionPolicy::default());

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        let remaining = repo.all("acc-1");
        assert_eq!(remaining.len(), 12);
        assert_eq!(report.snapshots_deleted, 48);
        assert_eq!(report.buckets_collapsed, 12);
        for (i, kept) in remaining.iter().enumerate() {
            // 10:04, 10:09, ... are the last minute of each 5-minute bucket.
            let expected = &history[i * 5 + 4];
            assert_eq!(kept, expected);
        }
    }

    #[tokio::test]
    async fn test_survivor_values_are_unchanged() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let history = minutely("acc-1", start, 180);
        repo.seed(history.clone());
        let svc = service(&repo, RetentionPolicy::default());

        svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        let remaining = repo.all("acc-1");
        assert_eq!(remaining.len(), 3);
        for kept in &remaining {
            let original = history
                .iter()
                .find(|s| s.captured_at == kept.captured_at)
                .unwrap();
            assert_eq!(kept, original);
        }
        assert_eq!(remaining[2].value, Decimal::from(1_000 + 179));
    }

    #[tokio::test]
    async fn test_compaction_is_idempotent() {
        let repo = InMemorySnapshotRepository::new();
        repo.seed(minutely("acc-1", now() - Duration::days(400), 3 * 1_440));
        repo.seed(minutely("acc-1", now() - Duration::days(45), 600));
        repo.seed(minutely("acc-1", now() - Duration::days(12), 600));
        repo.seed(minutely("acc-1", now() - Duration::days(1), 60));
        let svc = service(&repo, RetentionPolicy::default());

        let (first, cursor) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;
        let after_first = repo.all("acc-1");
        let mutations = repo.mutation_count();

        let (second, _) = svc.run(now(), cursor).await;

        assert!(first.snapshots_deleted > 0);
        assert_eq!(second.snapshots_deleted, 0);
        assert_eq!(second.buckets_collapsed, 0);
        assert_eq!(repo.all("acc-1"), after_first);
        assert_eq!(repo.mutation_count(), mutations);
    }

    #[tokio::test]
    async fn test_snapshots_migrate_to_coarser_tiers() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        repo.seed(minutely("acc-1", start, 60));
        let svc = service(&repo, RetentionPolicy::default());

        // 10 days old: mid tier, 5-minute buckets.
        svc.run(start + Duration::days(10), JobCursor::new(JobName::Compaction))
            .await;
        assert_eq!(repo.count("acc-1").unwrap(), 12);

        // 40 days old: coarse tier, one per hour.
        svc.run(start + Duration::days(40), JobCursor::new(JobName::Compaction))
            .await;
        let remaining = repo.all("acc-1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].captured_at, start + Duration::minutes(59));
    }

    #[tokio::test]
    async fn test_boundary_age_is_eligible() {
        let repo = InMemorySnapshotRepository::new();
        // Exactly fine_days old, and one minute earlier in the same bucket.
        let at_boundary = now() - Duration::days(7);
        assert_eq!(bucket_key(at_boundary, 5), bucket_key(at_boundary - Duration::minutes(1), 5));
        repo.seed([
            Snapshot::new("acc-1", at_boundary - Duration::minutes(1), dec!(1), dec!(0)),
            Snapshot::new("acc-1", at_boundary, dec!(2), dec!(0)),
        ]);
        let svc = service(&repo, RetentionPolicy::default());

        svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        let remaining = repo.all("acc-1");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].captured_at, at_boundary);
    }

    #[tokio::test]
    async fn test_just_inside_fine_window_is_kept() {
        let repo = InMemorySnapshotRepository::new();
        let inside = now() - Duration::days(7) + Duration::milliseconds(1);
        let older = inside - Duration::milliseconds(2);
        assert_eq!(bucket_key(inside, 5), bucket_key(older, 5));
        repo.seed([
            Snapshot::new("acc-1", older, dec!(1), dec!(0)),
            Snapshot::new("acc-1", inside, dec!(2), dec!(0)),
        ]);
        let svc = service(&repo, RetentionPolicy::default());

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        // `older` is alone among the eligible snapshots of its bucket.
        assert_eq!(report.snapshots_deleted, 0);
        assert_eq!(repo.count("acc-1").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_documented_age_scenario() {
        let settings = RetentionSettings {
            fine_days: 7,
            mid_days: 30,
            mid_bucket_minutes: 5,
            ..RetentionSettings::default()
        };
        let policy = RetentionPolicy::from_settings(&settings).unwrap();
        let ages = [40, 35, 33, 2];
        let snaps: Vec<Snapshot> = ages
            .iter()
            .rev()
            .map(|days| Snapshot::new("acc-1", now() - Duration::days(*days), dec!(1), dec!(0)))
            .collect();

        // Expected survivors are derived from bucket alignment, not from ages.
        let expected: HashSet<_> = snaps
            .iter()
            .map(|s| match policy.assign_bucket(s.captured_at, now()) {
                Some(bucket) => (bucket.bucket_minutes, bucket.start_minute),
                None => (0, s.captured_at_ms()),
            })
            .collect();

        let repo = InMemorySnapshotRepository::new();
        repo.seed(snaps);
        let svc = service(&repo, policy);
        svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        let remaining = repo.all("acc-1");
        assert_eq!(remaining.len(), expected.len());
        assert_eq!(remaining.len(), 4);
        assert!(remaining
            .iter()
            .any(|s| s.captured_at == now() - Duration::days(2)));
    }

    #[tokio::test]
    async fn test_failing_account_does_not_stop_others() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
        repo.seed(minutely("acc-bad", start, 30));
        repo.seed(minutely("acc-good", start, 30));
        repo.fail_account("acc-bad");
        let svc = service(&repo, RetentionPolicy::default());

        let (report, cursor) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(report.status, JobRunStatus::Completed);
        assert_eq!(report.accounts_processed, 2);
        assert_eq!(report.accounts_failed, 1);
        assert_eq!(report.failures[0].account_id, "acc-bad");
        assert_eq!(repo.count("acc-good").unwrap(), 6);
        assert_eq!(cursor.retry_accounts, vec!["acc-bad"]);

        // The next run picks the account up again.
        repo.restore_account("acc-bad");
        let (retry, cursor) = svc.run(now(), cursor).await;
        assert_eq!(retry.accounts_failed, 0);
        assert_eq!(repo.count("acc-bad").unwrap(), 6);
        assert!(cursor.retry_accounts.is_empty());
    }

    #[tokio::test]
    async fn test_accounts_are_compacted_independently() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
        repo.seed(minutely("acc-1", start, 10));
        repo.seed(minutely("acc-2", start, 10));
        let svc = service(&repo, RetentionPolicy::default());

        svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(repo.count("acc-1").unwrap(), 2);
        assert_eq!(repo.count("acc-2").unwrap(), 2);
        assert!(repo.all("acc-2").iter().all(|s| s.account_id == "acc-2"));
    }

    #[tokio::test]
    async fn test_archive_buckets_align_to_utc_days() {
        let repo = InMemorySnapshotRepository::new();
        let day = Utc.with_ymd_and_hms(2023, 1, 10, 0, 0, 0).unwrap();
        repo.seed([
            Snapshot::new("acc-1", day - Duration::minutes(1), dec!(1), dec!(0)),
            Snapshot::new("acc-1", day, dec!(2), dec!(0)),
            Snapshot::new("acc-1", day + Duration::hours(23), dec!(3), dec!(0)),
        ]);
        let svc = service(&repo, RetentionPolicy::default());

        svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        let kept: Vec<Decimal> = repo.all("acc-1").iter().map(|s| s.value).collect();
        assert_eq!(kept, vec![dec!(1), dec!(3)]);
    }

    #[tokio::test]
    async fn test_compact_account_without_history() {
        let repo = InMemorySnapshotRepository::new();
        let svc = service(&repo, RetentionPolicy::default());
        let totals = svc.compact_account("nobody", now(), None).await.unwrap();
        assert_eq!(totals.scanned, 0);
        assert_eq!(totals.deleted, 0);
    }

    #[tokio::test]
    async fn test_widths_without_common_multiple_still_compact() {
        let policy = RetentionPolicy::new(
            1,
            vec![
                RetentionTier::new(1, Some(2), 5),
                RetentionTier::new(2, Some(3), 1_000_003),
                RetentionTier::new(3, None, 1_000_033),
            ],
        )
        .unwrap();
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 30, 12, 0, 0).unwrap();
        repo.seed(minutely("acc-1", start, 10));
        let svc = service(&repo, policy);

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(report.accounts_failed, 0);
        assert_eq!(report.buckets_collapsed, 2);
        let kept: Vec<_> = repo.all("acc-1").iter().map(|s| s.captured_at).collect();
        assert_eq!(kept, vec![start + Duration::minutes(4), start + Duration::minutes(9)]);
    }

    #[tokio::test]
    async fn test_bucket_straddling_midnight_keeps_one_survivor() {
        let policy = RetentionPolicy::new(
            7,
            vec![RetentionTier::new(7, Some(30), 7), RetentionTier::new(30, None, 1_439)],
        )
        .unwrap();
        let midnight = Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap();
        let bucket_start = bucket_key(midnight, 7);
        let first = DateTime::from_timestamp_millis(bucket_start * 60_000).unwrap();
        assert!(first < midnight);

        let repo = InMemorySnapshotRepository::new();
        let history = minutely("acc-1", first, 7);
        repo.seed(history.clone());
        let svc = service(&repo, policy);

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(report.snapshots_scanned, 7);
        assert_eq!(report.snapshots_deleted, 6);
        assert_eq!(report.buckets_collapsed, 1);
        assert_eq!(repo.all("acc-1"), vec![history[6].clone()]);
    }

    #[tokio::test]
    async fn test_reads_stop_at_fine_window() {
        let repo = InMemorySnapshotRepository::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 15, 10, 0, 0).unwrap();
        repo.seed(minutely("acc-1", start, 10));
        repo.seed(minutely("acc-1", now() - Duration::hours(5), 120));
        let svc = service(&repo, RetentionPolicy::default());

        let (report, _) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;

        assert_eq!(report.snapshots_scanned, 10);
        assert_eq!(repo.count("acc-1").unwrap(), 2 + 120);
    }

    #[tokio::test]
    async fn test_later_runs_resume_at_archive_watermark() {
        let repo = InMemorySnapshotRepository::new();
        let archived_day = Utc.with_ymd_and_hms(2023, 1, 10, 0, 0, 0).unwrap();
        repo.seed(minutely("acc-1", archived_day, 1_440));
        repo.seed(minutely("acc-1", now() - Duration::days(12), 60));
        let svc = service(&repo, RetentionPolicy::default());

        let (first, cursor) = svc.run(now(), JobCursor::new(JobName::Compaction)).await;
        let watermark = cursor.archived_through.unwrap();
        assert_eq!(watermark.bucket_minutes, 1_440);
        assert!(watermark.through > archived_day + Duration::days(1));
        assert_eq!(first.snapshots_scanned, 1_440 + 60);

        // A stray row in a finished archive bucket is outside the resumed scan.
        let stray = Snapshot::new("acc-1", archived_day + Duration::hours(1), dec!(7), dec!(0));
        repo.seed([stray.clone()]);

        let next_day = now() + Duration::days(1);
        let (second, cursor) = svc.run(next_day, cursor).await;
        assert_eq!(second.snapshots_scanned, 12);
        assert!(repo.all("acc-1").contains(&stray));

        // Accounts queued for retry are rescanned from the start.
        let mut retry = cursor;
        retry.retry_accounts = vec!["acc-1".to_string()];
        let (third, _) = svc.run(next_day, retry).await;
        assert_eq!(third.snapshots_deleted, 1);
        assert!(!repo.all("acc-1").contains(&stray));
    }

    #[tokio::test]
    async fn test_watermark_ignored_after_archive_width_change() {
        let repo = InMemorySnapshotRepository::new();
        let archived_day = Utc.with_ymd_and_hms(2023, 1, 10, 0, 0, 0).unwrap();
        repo.seed(minutely("acc-1", archived_day, 1_440));
        let daily = service(&repo, RetentionPolicy::default());
        let (_, cursor) = daily.run(now(), JobCursor::new(JobName::Compaction)).await;
        assert_eq!(repo.count("acc-1").unwrap(), 1);
        repo.seed([Snapshot::new("acc-1", archived_day, dec!(1), dec!(0))]);

        let settings = RetentionSettings {
            archive_bucket_minutes: 2_880,
            ..RetentionSettings::default()
        };
        let two_day = service(&repo, RetentionPolicy::from_settings(&settings).unwrap());
        let (report, cursor) = two_day.run(now(), cursor).await;

        assert_eq!(report.snapshots_deleted, 1);
        assert_eq!(cursor.archived_through.map(|w| w.bucket_minutes), Some(2_880));
    }
}
