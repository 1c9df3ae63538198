//! Database model for portfolio snapshots.

use diesel::prelude::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use tidemark_core::errors::{Error, Result};
use tidemark_core::snapshots::{from_epoch_millis, Snapshot};

/// Row of `portfolio_snapshots`. Decimals are stored as text to keep their
/// exact scale; `captured_at` is epoch milliseconds UTC.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable, Insertable)]
#[diesel(table_name = crate::schema::portfolio_snapshots)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotDB {
    pub account_id: String,
    pub captured_at: i64,
    pub value: String,
    pub buying_power: String,
}

impl From<&Snapshot> for SnapshotDB {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            account_id: snapshot.account_id.clone(),
            captured_at: snapshot.captured_at_ms(),
            value: snapshot.value.to_string(),
            buying_power: snapshot.buying_power.to_string(),
        }
    }
}

impl TryFrom<SnapshotDB> for Snapshot {
    type Error = Error;

    fn try_from(db: SnapshotDB) -> Result<Self> {
        let captured_at = from_epoch_millis(db.captured_at).ok_or_else(|| {
            Error::Unexpected(format!(
                "snapshot of account {} has an out-of-range timestamp {}",
                db.account_id, db.captured_at
            ))
        })?;
        Ok(Snapshot {
            captured_at,
            value: Decimal::from_str(&db.value)?,
            buying_power: Decimal::from_str(&db.buying_power)?,
            account_id: db.account_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_keeps_decimal_scale() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let snapshot = Snapshot::new("acc-1", ts, dec!(1050.250000), dec!(10.5));
        let row = SnapshotDB::from(&snapshot);
        assert_eq!(row.value, "1050.250000");
        assert_eq!(row.captured_at, ts.timestamp_millis());

        let back = Snapshot::try_from(row).unwrap();
        assert_eq!(back, snapshot);
    }

    #[test]
    fn test_corrupt_decimal_is_rejected() {
        let row = SnapshotDB {
            account_id: "acc-1".to_string(),
            captured_at: 0,
            value: "not-a-number".to_string(),
            buying_power: "0".to_string(),
        };
        assert!(matches!(Snapshot::try_from(row), Err(Error::Validation(_))));
    }
}
