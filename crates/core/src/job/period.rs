//! Date-range slicing.
//!
//! The portal caps searches at 30 days, so a job's range is split into
//! ordered sub-periods before any entity is processed.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// A sub-range of a job's date range, at most `period_days` long.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Period {
    /// Split `[start, end]` into consecutive slices of at most `days` days.
    ///
    /// Returns an empty vector when `start > end`.
    pub fn split(start: NaiveDate, end: NaiveDate, days: i64) -> Vec<Period> {
        let mut periods = Vec::new();
        let mut cursor = start;
        while cursor <= end {
            let slice_end = std::cmp::min(cursor + Duration::days(days - 1), end);
            periods.push(Period {
                start: cursor,
                end: slice_end,
            });
            cursor = slice_end + Duration::days(1);
        }
        periods
    }

    /// Period start in the portal's `dd/mm/YYYY` form.
    pub fn portal_start(&self) -> String {
        self.start.format("%d/%m/%Y").to_string()
    }

    /// Period end in the portal's `dd/mm/YYYY` form.
    pub fn portal_end(&self) -> String {
        self.end.format("%d/%m/%Y").to_string()
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} a {}", self.portal_start(), self.portal_end())
    }
}

/// Key identifying a job's whole date range, used for checkpoint records
/// and artifact directories: `ddmmYYYY_ddmmYYYY`.
pub fn range_key(start: NaiveDate, end: NaiveDate) -> String {
    format!("{}_{}", start.format("%d%m%Y"), end.format("%d%m%Y"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_split_single_period() {
        let periods = Period::split(date(2024, 1, 1), date(2024, 1, 15), 30);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, date(2024, 1, 1));
        assert_eq!(periods[0].end, date(2024, 1, 15));
    }

    #[test]
    fn test_split_exact_boundary() {
        let periods = Period::split(date(2024, 1, 1), date(2024, 1, 30), 30);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].end, date(2024, 1, 30));
    }

    #[test]
    fn test_split_multiple_periods() {
        let periods = Period::split(date(2024, 1, 1), date(2024, 3, 15), 30);
        assert_eq!(periods.len(), 3);
        assert_eq!(periods[0].start, date(2024, 1, 1));
        assert_eq!(periods[0].end, date(2024, 1, 30));
        assert_eq!(periods[1].start, date(2024, 1, 31));
        assert_eq!(periods[1].end, date(2024, 2, 29));
        assert_eq!(periods[2].start, date(2024, 3, 1));
        assert_eq!(periods[2].end, date(2024, 3, 15));
    }

    #[test]
    fn test_split_contiguous_no_gaps() {
        let periods = Period::split(date(2023, 11, 20), date(2024, 2, 10), 30);
        for pair in periods.windows(2) {
            assert_eq!(pair[0].end + Duration::days(1), pair[1].start);
        }
        assert_eq!(periods.first().unwrap().start, date(2023, 11, 20));
        assert_eq!(periods.last().unwrap().end, date(2024, 2, 10));
    }

    #[test]
    fn test_split_inverted_range_is_empty() {
        let periods = Period::split(date(2024, 2, 1), date(2024, 1, 1), 30);
        assert!(periods.is_empty());
    }

    #[test]
    fn test_single_day_range() {
        let periods = Period::split(date(2024, 5, 7), date(2024, 5, 7), 30);
        assert_eq!(periods.len(), 1);
        assert_eq!(periods[0].start, periods[0].end);
    }

    #[test]
    fn test_portal_format() {
        let period = Period {
            start: date(2024, 1, 5),
            end: date(2024, 2, 3),
        };
        assert_eq!(period.portal_start(), "05/01/2024");
        assert_eq!(period.portal_end(), "03/02/2024");
    }

    #[test]
    fn test_range_key() {
        assert_eq!(
            range_key(date(2024, 1, 1), date(2024, 3, 15)),
            "01012024_15032024"
        );
    }
}
