//! Clocks and the `Date` global.

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use reprise_core::{EngineResult, Timestamp};
use std::rc::Rc;

/// Source of the current time
pub trait Clock {
    /// Milliseconds since the Unix epoch
    fn now(&self) -> Timestamp;
}

/// Wall clock, for platforms embedded in real time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(Utc::now().timestamp_millis())
    }
}

/// A calendar value in UTC, or the invalid date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    value: Option<DateTime<Utc>>,
}

impl Date {
    /// Date at `time`; out-of-range values give the invalid date
    #[must_use]
    pub fn from_timestamp(time: Timestamp) -> Self {
        Self {
            value: DateTime::from_timestamp_millis(time.as_millis()),
        }
    }

    /// Date from calendar components, normalizing overflow
    ///
    /// `month` is zero based and out-of-range fields roll into the next
    /// larger unit.
    #[must_use]
    pub fn from_components(c: &DateComponents) -> Self {
        let value = i32::try_from(c.year + c.month.div_euclid(12))
            .ok()
            .and_then(|year| {
                let month = u32::try_from(c.month.rem_euclid(12) + 1).ok()?;
                NaiveDate::from_ymd_opt(year, month, 1)
            })
            .and_then(|first| first.and_hms_opt(0, 0, 0))
            .and_then(|start| {
                let offset = (c.day - 1)
                    .checked_mul(86_400_000)?
                    .checked_add(c.hours.checked_mul(3_600_000)?)?
                    .checked_add(c.minutes.checked_mul(60_000)?)?
                    .checked_add(c.seconds.checked_mul(1_000)?)?
                    .checked_add(c.millis)?;
                start.checked_add_signed(TimeDelta::try_milliseconds(offset)?)
            })
            .map(|naive| naive.and_utc());
        Self { value }
    }

    /// Milliseconds since the epoch, `None` for the invalid date
    #[must_use]
    pub fn time(&self) -> Option<Timestamp> {
        self.value
            .map(|value| Timestamp::from_millis(value.timestamp_millis()))
    }

    /// Whether this is the invalid date
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.value.is_some()
    }

    /// ISO 8601 rendering
    #[must_use]
    pub fn to_iso_string(&self) -> Option<String> {
        self.value
            .map(|value| value.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
    }

    /// Calendar fields, `None` for the invalid date
    #[must_use]
    pub fn components(&self) -> Option<DateComponents> {
        use chrono::{Datelike, Timelike};
        self.value.map(|v| DateComponents {
            year: i64::from(v.year()),
            month: i64::from(v.month0()),
            day: i64::from(v.day()),
            hours: i64::from(v.hour()),
            minutes: i64::from(v.minute()),
            seconds: i64::from(v.second()),
            millis: i64::from(v.timestamp_subsec_millis()),
        })
    }
}

impl std::fmt::Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.value {
            Some(value) => write!(
                f,
                "{}",
                value.format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
            ),
            None => write!(f, "Invalid Date"),
        }
    }
}

/// Calendar fields of a date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateComponents {
    /// Full year
    pub year: i64,
    /// Zero-based month
    pub month: i64,
    /// Day of month, from 1
    pub day: i64,
    /// Hours
    pub hours: i64,
    /// Minutes
    pub minutes: i64,
    /// Seconds
    pub seconds: i64,
    /// Milliseconds
    pub millis: i64,
}

/// Arguments of a `new Date(...)` construction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateArgs {
    /// No arguments: the current time
    Now,
    /// Milliseconds since the epoch
    Millis(i64),
    /// Calendar fields
    Components(DateComponents),
}

/// The `Date` global
pub trait DateApi {
    /// `Date.now()`
    ///
    /// # Errors
    ///
    /// Returns error if an interceptor cannot produce a time
    fn now(&self) -> EngineResult<Timestamp>;

    /// `new Date(...)`
    ///
    /// # Errors
    ///
    /// Returns error if an interceptor cannot produce a time
    fn construct(&self, args: DateArgs) -> EngineResult<Date>;

    /// `Date()` called as a function: the current time as a string
    ///
    /// # Errors
    ///
    /// Returns error if an interceptor cannot produce a time
    fn call(&self) -> EngineResult<String>;
}

/// The platform's own `Date`
pub struct NativeDate {
    clock: Rc<dyn Clock>,
}

impl NativeDate {
    /// `Date` reading `clock`
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self { clock }
    }
}

impl DateApi for NativeDate {
    fn now(&self) -> EngineResult<Timestamp> {
        Ok(self.clock.now())
    }

    fn construct(&self, args: DateArgs) -> EngineResult<Date> {
        Ok(match args {
            DateArgs::Now => Date::from_timestamp(self.clock.now()),
            DateArgs::Millis(millis) => Date::from_timestamp(Timestamp::from_millis(millis)),
            DateArgs::Components(c) => Date::from_components(&c),
        })
    }

    fn call(&self) -> EngineResult<String> {
        Ok(Date::from_timestamp(self.clock.now()).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedClock(Cell<i64>);

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_millis(self.0.get())
        }
    }

    #[test]
    fn test_native_date_reads_clock() {
        let clock = Rc::new(FixedClock(Cell::new(1_357_000_000_000)));
        let date = NativeDate::new(clock.clone());
        assert_eq!(date.now().unwrap().as_millis(), 1_357_000_000_000);

        clock.0.set(0);
        let epoch = date.construct(DateArgs::Now).unwrap();
        assert_eq!(epoch.to_iso_string().as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            date.call().unwrap(),
            "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)"
        );
    }

    #[test]
    fn test_components_normalize() {
        let date = Date::from_components(&DateComponents {
            year: 2012,
            month: 12,
            day: 32,
            ..DateComponents::default()
        });
        assert_eq!(date.to_iso_string().as_deref(), Some("2013-02-01T00:00:00.000Z"));

        let parts = date.components().unwrap();
        assert_eq!((parts.year, parts.month, parts.day), (2013, 1, 1));
    }

    #[test]
    fn test_invalid_date() {
        let date = Date::from_timestamp(Timestamp::from_millis(i64::MAX));
        assert!(!date.is_valid());
        assert_eq!(date.time(), None);
        assert_eq!(date.to_string(), "Invalid Date");
    }

    #[test]
    fn test_system_clock_is_recent() {
        assert!(SystemClock.now() > Timestamp::from_millis(1_357_000_000_000));
    }
}
