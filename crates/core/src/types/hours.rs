//! Weekly business hours and the "are we open right now" check.
//!
//! Stored as the `businessHours` setting. Times are local wall-clock times
//! at a fixed UTC offset; overnight spans (close earlier than open) run into
//! the following day.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// Errors returned by [`BusinessHours::validate`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum HoursError {
    #[error("utc offset must be within +/-14 hours (got {0} minutes)")]
    InvalidOffset(i32),
}

/// Opening hours for a single weekday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayHours {
    /// Closed all day.
    #[serde(default)]
    pub closed: bool,
    #[serde(with = "hhmm")]
    pub open: NaiveTime,
    #[serde(with = "hhmm")]
    pub close: NaiveTime,
}

impl DayHours {
    /// Open between `open` and `close`.
    #[must_use]
    pub const fn open(open: NaiveTime, close: NaiveTime) -> Self {
        Self {
            closed: false,
            open,
            close,
        }
    }

    /// Closed all day.
    #[must_use]
    pub const fn closed() -> Self {
        Self {
            closed: true,
            open: NaiveTime::MIN,
            close: NaiveTime::MIN,
        }
    }

    /// Equal open and close times mean open around the clock.
    fn is_all_day(&self) -> bool {
        !self.closed && self.open == self.close
    }

    fn is_overnight(&self) -> bool {
        !self.closed && self.close < self.open
    }

    /// Open at `time` based on this day's own span.
    fn covers_same_day(&self, time: NaiveTime) -> bool {
        if self.closed {
            return false;
        }
        if self.is_all_day() {
            return true;
        }
        if self.is_overnight() {
            time >= self.open
        } else {
            time >= self.open && time < self.close
        }
    }

    /// Open at `time` because the previous day's span runs past midnight.
    fn covers_spillover(&self, time: NaiveTime) -> bool {
        self.is_overnight() && time < self.close
    }
}

/// Weekly schedule, Monday first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessHours {
    /// Local offset from UTC in minutes (e.g. -300 for UTC-5).
    #[serde(default)]
    pub utc_offset_minutes: i32,
    /// Monday..Sunday.
    pub days: [DayHours; 7],
}

impl Default for BusinessHours {
    fn default() -> Self {
        let weekday = DayHours::open(at(9, 0), at(21, 0));
        let weekend = DayHours::open(at(10, 0), at(22, 0));
        Self {
            utc_offset_minutes: 0,
            days: [
                DayHours::closed(),
                weekday,
                weekday,
                weekday,
                weekday,
                weekend,
                weekend,
            ],
        }
    }
}

impl BusinessHours {
    /// Hours for a weekday.
    #[must_use]
    pub fn day(&self, weekday: Weekday) -> DayHours {
        let index = weekday.num_days_from_monday() as usize;
        self.days.get(index).copied().unwrap_or_else(DayHours::closed)
    }

    /// Whether orders are accepted at the given instant.
    #[must_use]
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let local = now.naive_utc() + Duration::minutes(i64::from(self.utc_offset_minutes));
        let weekday = local.weekday();
        let time = local.time();

        self.day(weekday).covers_same_day(time) || self.day(weekday.pred()).covers_spillover(time)
    }

    /// Check the schedule for values the storefront cannot interpret.
    ///
    /// # Errors
    ///
    /// Returns [`HoursError::InvalidOffset`] if the offset exceeds 14 hours.
    pub const fn validate(&self) -> Result<(), HoursError> {
        if self.utc_offset_minutes.unsigned_abs() > 14 * 60 {
            return Err(HoursError::InvalidOffset(self.utc_offset_minutes));
        }
        Ok(())
    }
}

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

/// `"HH:MM"` (de)serialization for [`NaiveTime`].
mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, FORMAT)
            .or_else(|_| NaiveTime::parse_from_str(&s, "%H:%M:%S"))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_default_schedule() {
        let hours = BusinessHours::default();
        // 2026-10-19 is a Monday (closed by default)
        assert!(!hours.is_open_at(utc(2026, 10, 19, 12, 0)));
        // Tuesday noon
        assert!(hours.is_open_at(utc(2026, 10, 20, 12, 0)));
        // Tuesday at closing time
        assert!(!hours.is_open_at(utc(2026, 10, 20, 21, 0)));
        // Tuesday before opening
        assert!(!hours.is_open_at(utc(2026, 10, 20, 8, 59)));
    }

    #[test]
    fn test_utc_offset_shifts_local_time() {
        let hours = BusinessHours {
            utc_offset_minutes: -300,
            ..BusinessHours::default()
        };
        // 13:30 UTC is 08:30 local on Tuesday: not yet open
        assert!(!hours.is_open_at(utc(2026, 10, 20, 13, 30)));
        // 14:30 UTC is 09:30 local
        assert!(hours.is_open_at(utc(2026, 10, 20, 14, 30)));
    }

    #[test]
    fn test_overnight_span_spills_into_next_day() {
        let mut hours = BusinessHours::default();
        // Friday 18:00 - 02:00
        hours.days[4] = DayHours::open(at(18, 0), at(2, 0));
        hours.days[5] = DayHours::closed();

        // Friday 23:00
        assert!(hours.is_open_at(utc(2026, 10, 23, 23, 0)));
        // Saturday 01:30 (spillover from Friday)
        assert!(hours.is_open_at(utc(2026, 10, 24, 1, 30)));
        // Saturday 02:00 is closing time
        assert!(!hours.is_open_at(utc(2026, 10, 24, 2, 0)));
    }

    #[test]
    fn test_equal_times_mean_all_day() {
        let mut hours = BusinessHours::default();
        hours.days[0] = DayHours::open(at(0, 0), at(0, 0));
        assert!(hours.is_open_at(utc(2026, 10, 19, 3, 0)));
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(BusinessHours::default()).unwrap();
        assert_eq!(json["utcOffsetMinutes"], 0);
        assert_eq!(json["days"][1]["open"], "09:00");
        assert_eq!(json["days"][0]["closed"], true);

        let parsed: BusinessHours = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, BusinessHours::default());
    }

    #[test]
    fn test_validate_offset() {
        let hours = BusinessHours {
            utc_offset_minutes: 15 * 60,
            ..BusinessHours::default()
        };
        assert_eq!(hours.validate(), Err(HoursError::InvalidOffset(900)));
    }

    #[test]
    fn test_validate_offset_extremes() {
        for offset in [i32::MIN, i32::MAX] {
            let hours = BusinessHours {
                utc_offset_minutes: offset,
                ..BusinessHours::default()
            };
            assert_eq!(hours.validate(), Err(HoursError::InvalidOffset(offset)));
        }

        for offset in [-14 * 60, 14 * 60] {
            let hours = BusinessHours {
                utc_offset_minutes: offset,
                ..BusinessHours::default()
            };
            assert_eq!(hours.validate(), Ok(()));
        }
    }
}
