//! Day-scoped invoice numbers of the form `YYYY_MM_DD-NNN`.
//!
//! Days are UTC calendar days. The sequence part is zero-padded to three
//! digits and simply grows wider past 999.

use chrono::{DateTime, Days, NaiveDate, Utc};

/// Timestamp layout used for every `created_at` column. Lexicographic order
/// matches chronological order, so day bounds can be compared as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp the way it is stored.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// A calendar day (UTC) that invoice numbers are scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceDay(NaiveDate);

impl InvoiceDay {
    /// Strip the time of day.
    pub fn of(at: DateTime<Utc>) -> Self {
        Self(at.date_naive())
    }

    /// The `YYYY_MM_DD` prefix.
    pub fn prefix(&self) -> String {
        self.0.format("%Y_%m_%d").to_string()
    }

    /// Inclusive start and exclusive end of the day as stored timestamps.
    pub fn bounds(&self) -> (String, String) {
        let start = self.0.format("%Y-%m-%d 00:00:00").to_string();
        let end = self
            .0
            .checked_add_days(Days::new(1))
            .map(|d| d.format("%Y-%m-%d 00:00:00").to_string())
            // Only reachable at NaiveDate::MAX; '~' sorts after any digit
            .unwrap_or_else(|| "~".to_string());
        (start, end)
    }

    /// The full invoice number for the given 1-based sequence.
    pub fn id_number(&self, sequence: i64) -> String {
        format_id_number(&self.prefix(), sequence)
    }
}

/// Join a day prefix and a sequence number.
pub fn format_id_number(prefix: &str, sequence: i64) -> String {
    format!("{}-{:03}", prefix, sequence)
}

/// The number following the highest one issued today (0 when none was).
pub fn next_sequence(highest_today: i64) -> i64 {
    highest_today + 1
}
