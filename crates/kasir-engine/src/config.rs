//! # Engine Configuration
//!
//! Static settings fixed at startup. The refund window is not here: it is
//! a runtime setting (`refund.window_days`) read per request and passed to
//! the refund service as a `RefundPolicy`.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use kasir_core::refund::DEFAULT_UTC_OFFSET_MINUTES;
use kasir_core::TaxRate;

/// Default cap on transactions per sync batch.
pub const DEFAULT_SYNC_BATCH_LIMIT: usize = 500;

/// How far a till clock may run ahead of the server before its
/// `occurred_at` is rejected.
pub const MAX_CLOCK_SKEW_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Tax applied to (subtotal − discount_total).
    pub tax_rate: TaxRate,
    /// Let checkout take on-hand below zero.
    pub allow_negative_stock: bool,
    /// Store's local offset from UTC; drives invoice dates and refund
    /// deadlines.
    pub utc_offset_minutes: i32,
    pub sync_batch_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tax_rate: TaxRate::default(),
            allow_negative_stock: false,
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            sync_batch_limit: DEFAULT_SYNC_BATCH_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Local calendar date of `at` in the store's timezone.
    pub fn business_date(&self, at: DateTime<Utc>) -> NaiveDate {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        at.with_timezone(&offset).date_naive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_business_date_uses_local_offset() {
        let config = EngineConfig::default();
        // 18:30 UTC is 01:30 the next day in WIB
        let late = Utc.with_ymd_and_hms(2025, 3, 3, 18, 30, 0).unwrap();
        assert_eq!(config.business_date(late), NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    }
}
