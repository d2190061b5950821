//! Recurring schedules for cron-driven blocks.
//!
//! A schedule fires at `start`, then every period after it, and never past
//! `end`. Month and year steps keep the day of month where the calendar
//! allows it.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};

/// Unit of a custom period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl PeriodUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit {
            "minutes" | "minute" => Some(Self::Minutes),
            "hours" | "hour" => Some(Self::Hours),
            "days" | "day" => Some(Self::Days),
            "weeks" | "week" => Some(Self::Weeks),
            "months" | "month" => Some(Self::Months),
            "years" | "year" => Some(Self::Years),
            _ => None,
        }
    }
}

/// Repetition period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Custom { interval: u32, unit: PeriodUnit },
}

impl Period {
    /// Parse the `period`, `periodInterval` and `periodUnit` options.
    pub fn parse(period: &str, interval: Option<u32>, unit: Option<&str>) -> Option<Self> {
        match period {
            "yearly" => Some(Self::Yearly),
            "monthly" => Some(Self::Monthly),
            "weekly" => Some(Self::Weekly),
            "daily" => Some(Self::Daily),
            "hourly" => Some(Self::Hourly),
            "custom" => {
                let interval = interval.filter(|i| *i > 0)?;
                let unit = PeriodUnit::parse(unit?)?;
                Some(Self::Custom { interval, unit })
            }
            _ => None,
        }
    }

    fn step(self) -> (u32, PeriodUnit) {
        match self {
            Self::Yearly => (1, PeriodUnit::Years),
            Self::Monthly => (1, PeriodUnit::Months),
            Self::Weekly => (1, PeriodUnit::Weeks),
            Self::Daily => (1, PeriodUnit::Days),
            Self::Hourly => (1, PeriodUnit::Hours),
            Self::Custom { interval, unit } => (interval, unit),
        }
    }
}

/// A start date, a period, and an optional end date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub period: Period,
}

impl Schedule {
    pub fn new(start: DateTime<Utc>, end: Option<DateTime<Utc>>, period: Period) -> Self {
        Self { start, end, period }
    }

    /// Whether the schedule can never fire again after `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.end.is_some_and(|end| end <= now)
    }

    /// First firing strictly after `after`, or `None` past the end date.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.is_expired(after) {
            return None;
        }
        let next = if self.start > after {
            self.start
        } else {
            match self.period.step() {
                (n, PeriodUnit::Months) => self.next_by_months(after, n)?,
                (n, PeriodUnit::Years) => self.next_by_months(after, n.checked_mul(12)?)?,
                (n, unit) => self.next_by_duration(after, fixed_duration(n, unit))?,
            }
        };
        match self.end {
            Some(end) if next > end => None,
            _ => Some(next),
        }
    }

    fn next_by_duration(&self, after: DateTime<Utc>, step: Duration) -> Option<DateTime<Utc>> {
        let step_ms = step.num_milliseconds();
        if step_ms <= 0 {
            return None;
        }
        let elapsed = (after - self.start).num_milliseconds();
        let k = elapsed / step_ms + 1;
        self.start
            .checked_add_signed(Duration::milliseconds(k.checked_mul(step_ms)?))
    }

    fn next_by_months(&self, after: DateTime<Utc>, step: u32) -> Option<DateTime<Utc>> {
        use chrono::Datelike;
        if step == 0 {
            return None;
        }
        let months = (after.year() - self.start.year()) * 12 + after.month() as i32
            - self.start.month() as i32;
        let mut k = u32::try_from(months.max(0)).ok()? / step;
        loop {
            let candidate = self.start.checked_add_months(Months::new(k.checked_mul(step)?))?;
            if candidate > after {
                return Some(candidate);
            }
            k += 1;
        }
    }
}

fn fixed_duration(n: u32, unit: PeriodUnit) -> Duration {
    let n = i64::from(n);
    match unit {
        PeriodUnit::Minutes => Duration::minutes(n),
        PeriodUnit::Hours => Duration::hours(n),
        PeriodUnit::Days => Duration::days(n),
        PeriodUnit::Weeks => Duration::weeks(n),
        PeriodUnit::Months | PeriodUnit::Years => Duration::zero(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_before_start_fires_at_start() {
        let schedule = Schedule::new(at(2030, 1, 1, 0), None, Period::Daily);
        assert_eq!(schedule.next_after(at(2029, 6, 1, 0)), Some(at(2030, 1, 1, 0)));
    }

    #[test]
    fn test_daily_steps() {
        let schedule = Schedule::new(at(2024, 1, 1, 9), None, Period::Daily);
        assert_eq!(schedule.next_after(at(2024, 1, 1, 9)), Some(at(2024, 1, 2, 9)));
        assert_eq!(schedule.next_after(at(2024, 1, 5, 10)), Some(at(2024, 1, 6, 9)));
    }

    #[test]
    fn test_monthly_keeps_day() {
        let schedule = Schedule::new(at(2024, 1, 15, 0), None, Period::Monthly);
        assert_eq!(schedule.next_after(at(2024, 3, 20, 0)), Some(at(2024, 4, 15, 0)));
        assert_eq!(schedule.next_after(at(2024, 3, 10, 0)), Some(at(2024, 3, 15, 0)));
    }

    #[test]
    fn test_custom_interval() {
        let period = Period::parse("custom", Some(3), Some("hours")).unwrap();
        let schedule = Schedule::new(at(2024, 1, 1, 0), None, period);
        assert_eq!(schedule.next_after(at(2024, 1, 1, 4)), Some(at(2024, 1, 1, 6)));
        assert!(Period::parse("custom", Some(0), Some("hours")).is_none());
        assert!(Period::parse("custom", Some(2), Some("fortnights")).is_none());
    }

    #[test]
    fn test_past_end_never_fires() {
        let schedule = Schedule::new(at(2020, 1, 1, 0), Some(at(2020, 2, 1, 0)), Period::Hourly);
        assert!(schedule.is_expired(at(2024, 1, 1, 0)));
        assert_eq!(schedule.next_after(at(2024, 1, 1, 0)), None);
    }

    #[test]
    fn test_next_beyond_end_is_none() {
        let schedule = Schedule::new(at(2024, 1, 1, 0), Some(at(2024, 1, 1, 12)), Period::Daily);
        assert_eq!(schedule.next_after(at(2024, 1, 1, 1)), None);
    }

    proptest::proptest! {
        #[test]
        fn prop_next_is_later_and_on_grid(offset_min in 0i64..5_000_000, interval in 1u32..500) {
            let start = at(2024, 1, 1, 0);
            let period = Period::Custom { interval, unit: PeriodUnit::Minutes };
            let schedule = Schedule::new(start, None, period);
            let after = start + Duration::minutes(offset_min);
            let next = schedule.next_after(after).unwrap();
            proptest::prop_assert!(next > after);
            proptest::prop_assert!(next - after <= Duration::minutes(i64::from(interval)));
            proptest::prop_assert_eq!((next - start).num_minutes() % i64::from(interval), 0);
        }
    }
}
