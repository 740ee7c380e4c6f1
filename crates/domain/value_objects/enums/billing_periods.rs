use std::fmt::Display;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    #[default]
    Month,
    Year,
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Month => "month",
            BillingPeriod::Year => "year",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value {
            "year" => BillingPeriod::Year,
            _ => BillingPeriod::Month,
        }
    }

    pub fn months(&self) -> u32 {
        match self {
            BillingPeriod::Month => 1,
            BillingPeriod::Year => 12,
        }
    }

    /// End of one billing cycle starting at `start`. Keeps the day of month and
    /// clamps it to the last day of the target month (Jan 31 -> Feb 28/29).
    pub fn cycle_end(&self, start: DateTime<Utc>) -> Result<DateTime<Utc>> {
        start
            .checked_add_months(Months::new(self.months()))
            .ok_or_else(|| anyhow!("billing period end is out of range for start {start}"))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 10, 30, 0).unwrap()
    }

    #[test]
    fn month_end_is_clamped_in_non_leap_year() {
        let end = BillingPeriod::Month.cycle_end(at(2023, 1, 31)).unwrap();
        assert_eq!(end, at(2023, 2, 28));
    }

    #[test]
    fn month_end_is_clamped_in_leap_year() {
        let end = BillingPeriod::Month.cycle_end(at(2024, 1, 31)).unwrap();
        assert_eq!(end, at(2024, 2, 29));
    }

    #[test]
    fn december_rolls_into_next_year() {
        let end = BillingPeriod::Month.cycle_end(at(2024, 12, 15)).unwrap();
        assert_eq!(end, at(2025, 1, 15));
    }

    #[test]
    fn thirty_first_clamps_to_thirtieth() {
        let end = BillingPeriod::Month.cycle_end(at(2024, 3, 31)).unwrap();
        assert_eq!(end, at(2024, 4, 30));
    }

    #[test]
    fn yearly_cycle_adds_twelve_months() {
        let end = BillingPeriod::Year.cycle_end(at(2024, 2, 29)).unwrap();
        assert_eq!(end, at(2025, 2, 28));
    }

    #[test]
    fn unknown_stored_value_falls_back_to_month() {
        assert_eq!(BillingPeriod::from_str("year"), BillingPeriod::Year);
        assert_eq!(BillingPeriod::from_str("week"), BillingPeriod::Month);
    }
}
