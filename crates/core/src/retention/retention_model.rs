//! Retention policy models and validation.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Environment-facing retention options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionSettings {
    pub fine_days: u32,
    pub mid_days: u32,
    pub coarse_days: u32,
    pub mid_bucket_minutes: u32,
    pub coarse_bucket_minutes: u32,
    pub archive_bucket_minutes: u32,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            fine_days: 7,
            mid_days: 30,
            coarse_days: 365,
            mid_bucket_minutes: 5,
            coarse_bucket_minutes: 60,
            archive_bucket_minutes: 1_440,
        }
    }
}

/// An age range `[min_age_days, max_age_days)` and the bucket width applied to it.
/// `max_age_days == None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionTier {
    pub min_age_days: u32,
    pub max_age_days: Option<u32>,
    pub bucket_minutes: u32,
}

impl RetentionTier {
    pub fn new(min_age_days: u32, max_age_days: Option<u32>, bucket_minutes: u32) -> Self {
        Self {
            min_age_days,
            max_age_days,
            bucket_minutes,
        }
    }
}

/// Ordered, contiguous tier table covering `[fine_days, infinity)`.
///
/// Only constructible through [`RetentionPolicy::new`] or
/// [`RetentionPolicy::from_settings`], both of which validate the table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    fine_days: u32,
    tiers: Vec<RetentionTier>,
}

impl RetentionPolicy {
    pub fn new(fine_days: u32, tiers: Vec<RetentionTier>) -> Result<Self> {
        if fine_days == 0 {
            return Err(invalid("fine_days must be at least 1"));
        }
        let Some(last) = tiers.last() else {
            return Err(invalid("at least one retention tier is required"));
        };
        if last.max_age_days.is_some() {
            return Err(invalid("the last retention tier must be unbounded"));
        }

        let mut expected_start = fine_days;
        let mut previous_bucket = 0;
        for (i, tier) in tiers.iter().enumerate() {
            if tier.min_age_days != expected_start {
                return Err(invalid(&format!(
                    "tier {} starts at {} days, expected {}",
                    i, tier.min_age_days, expected_start
                )));
            }
            if tier.bucket_minutes == 0 {
                return Err(invalid(&format!("tier {} has a zero bucket width", i)));
            }
            if tier.bucket_minutes < previous_bucket {
                return Err(invalid(&format!(
                    "tier {} uses {} minute buckets, narrower than the younger tier's {}",
                    i, tier.bucket_minutes, previous_bucket
                )));
            }
            previous_bucket = tier.bucket_minutes;

            match tier.max_age_days {
                Some(max) if max <= tier.min_age_days => {
                    return Err(invalid(&format!(
                        "tier {} is empty: [{}, {})",
                        i, tier.min_age_days, max
                    )));
                }
                Some(max) => expected_start = max,
                None if i + 1 != tiers.len() => {
                    return Err(invalid(&format!(
                        "tier {} is unbounded but is not the last tier",
                        i
                    )));
                }
                None => {}
            }
        }

        Ok(Self { fine_days, tiers })
    }

    /// Builds the fine/mid/coarse/archive policy.
    pub fn from_settings(settings: &RetentionSettings) -> Result<Self> {
        if !(settings.fine_days < settings.mid_days && settings.mid_days < settings.coarse_days) {
            return Err(invalid(&format!(
                "expected fine_days < mid_days < coarse_days, got {} / {} / {}",
                settings.fine_days, settings.mid_days, settings.coarse_days
            )));
        }
        Self::new(
            settings.fine_days,
            vec![
                RetentionTier::new(
                    settings.fine_days,
                    Some(settings.mid_days),
                    settings.mid_bucket_minutes,
                ),
                RetentionTier::new(
                    settings.mid_days,
                    Some(settings.coarse_days),
                    settings.coarse_bucket_minutes,
                ),
                RetentionTier::new(settings.coarse_days, None, settings.archive_bucket_minutes),
            ],
        )
    }

    pub fn fine_days(&self) -> u32 {
        self.fine_days
    }

    pub fn tiers(&self) -> &[RetentionTier] {
        &self.tiers
    }

    /// The last, unbounded tier.
    pub fn archive_tier(&self) -> Option<&RetentionTier> {
        self.tiers.last()
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        let settings = RetentionSettings::default();
        Self {
            fine_days: settings.fine_days,
            tiers: vec![
                RetentionTier::new(7, Some(30), 5),
                RetentionTier::new(30, Some(365), 60),
                RetentionTier::new(365, None, 1_440),
            ],
        }
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidConfigValue(format!("retention policy: {}", message))
}
