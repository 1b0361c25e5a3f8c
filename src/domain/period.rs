use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Relative reporting windows ("this month", "this year").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Monthly,
    Yearly,
}

impl PeriodType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeriodType::Monthly => "monthly",
            PeriodType::Yearly => "yearly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "monthly" => Some(PeriodType::Monthly),
            "yearly" => Some(PeriodType::Yearly),
            _ => None,
        }
    }
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A calendar month or year, as a half-open date window `[start, end)`.
///
/// Only constructible through the validating constructors, so the bounds
/// are always real dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    period_type: PeriodType,
    start: NaiveDate,
    end: NaiveDate,
}

impl ReportPeriod {
    /// A calendar month. `None` if `month` is not 1..=12 or the date is out of range.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let end = if month == 12 {
            NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            period_type: PeriodType::Monthly,
            start,
            end,
        })
    }

    /// A calendar year.
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year.checked_add(1)?, 1, 1)?;
        Some(Self {
            period_type: PeriodType::Yearly,
            start,
            end,
        })
    }

    /// The month or year containing `today`.
    pub fn current(period_type: PeriodType, today: NaiveDate) -> Option<Self> {
        match period_type {
            PeriodType::Monthly => Self::month(today.year(), today.month()),
            PeriodType::Yearly => Self::year(today.year()),
        }
    }

    /// First day of the window (inclusive).
    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// First day after the window (exclusive).
    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn bounds(&self) -> (NaiveDate, NaiveDate) {
        (self.start, self.end)
    }
}

impl std::fmt::Display for ReportPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.period_type {
            PeriodType::Monthly => write!(f, "{}", self.start.format("%Y-%m")),
            PeriodType::Yearly => write!(f, "{}", self.start.format("%Y")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_period_type_roundtrip() {
        for pt in [PeriodType::Monthly, PeriodType::Yearly] {
            assert_eq!(PeriodType::from_str(pt.as_str()), Some(pt));
        }
        assert_eq!(PeriodType::from_str("weekly"), None);
    }

    #[test]
    fn test_month_bounds() {
        let period = ReportPeriod::month(2025, 2).unwrap();
        assert_eq!(period.bounds(), (date("2025-02-01"), date("2025-03-01")));
        assert_eq!(period.to_string(), "2025-02");
    }

    #[test]
    fn test_december_rolls_into_next_year() {
        let period = ReportPeriod::month(2024, 12).unwrap();
        assert_eq!(period.end(), date("2025-01-01"));
    }

    #[test]
    fn test_invalid_month() {
        assert!(ReportPeriod::month(2025, 0).is_none());
        assert!(ReportPeriod::month(2025, 13).is_none());
    }

    #[test]
    fn test_year_bounds() {
        let period = ReportPeriod::year(2024).unwrap();
        assert_eq!(period.bounds(), (date("2024-01-01"), date("2025-01-01")));
        assert_eq!(period.to_string(), "2024");
    }

    #[test]
    fn test_current_period() {
        let today = date("2025-02-14");
        assert_eq!(
            ReportPeriod::current(PeriodType::Monthly, today),
            ReportPeriod::month(2025, 2)
        );
        assert_eq!(
            ReportPeriod::current(PeriodType::Yearly, today),
            ReportPeriod::year(2025)
        );
    }
}
