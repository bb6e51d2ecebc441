//! CF-convention time decoding and temporal intervals.
//!
//! NetCDF time coordinates store offsets such as `hours since 1970-01-01`
//! together with a `calendar` attribute. UKCP18 uses the `360_day` calendar,
//! where every month has 30 days, so dates like February 30th exist. Such
//! dates have no Gregorian equivalent and are clamped to the last valid day
//! of the month when converted to [`DateTime<Utc>`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

const MS_PER_DAY: i64 = 86_400_000;

const DAYS_360: [u32; 12] = [30; 12];
const DAYS_NOLEAP: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
const DAYS_ALL_LEAP: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Calendars defined by the CF conventions that can be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfCalendar {
    /// `standard` / `gregorian`. Decoded as proleptic Gregorian.
    Standard,
    /// `proleptic_gregorian`
    ProlepticGregorian,
    /// `360_day`: twelve 30-day months.
    Day360,
    /// `365_day` / `noleap`
    NoLeap,
    /// `366_day` / `all_leap`
    AllLeap,
}

impl CfCalendar {
    /// Parse a CF `calendar` attribute value (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        match s.trim().to_lowercase().as_str() {
            "standard" | "gregorian" => Ok(CfCalendar::Standard),
            "proleptic_gregorian" => Ok(CfCalendar::ProlepticGregorian),
            "360_day" => Ok(CfCalendar::Day360),
            "365_day" | "noleap" => Ok(CfCalendar::NoLeap),
            "366_day" | "all_leap" => Ok(CfCalendar::AllLeap),
            _ => Err(TimeParseError::UnsupportedCalendar(s.to_string())),
        }
    }

    /// Month lengths for calendars with a fixed year length.
    fn fixed_month_lengths(&self) -> Option<&'static [u32; 12]> {
        match self {
            CfCalendar::Day360 => Some(&DAYS_360),
            CfCalendar::NoLeap => Some(&DAYS_NOLEAP),
            CfCalendar::AllLeap => Some(&DAYS_ALL_LEAP),
            CfCalendar::Standard | CfCalendar::ProlepticGregorian => None,
        }
    }
}

impl Default for CfCalendar {
    fn default() -> Self {
        CfCalendar::Standard
    }
}

/// Unit of a CF time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CfTimeUnit {
    Days,
    Hours,
    Minutes,
    Seconds,
}

impl CfTimeUnit {
    fn milliseconds(&self) -> f64 {
        match self {
            CfTimeUnit::Days => 86_400_000.0,
            CfTimeUnit::Hours => 3_600_000.0,
            CfTimeUnit::Minutes => 60_000.0,
            CfTimeUnit::Seconds => 1_000.0,
        }
    }
}

/// Broken-down reference date of a `units` attribute, in calendar terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CalendarDate {
    year: i32,
    month: u32,
    day: u32,
    ms_of_day: i64,
}

/// Parsed CF time `units` attribute plus the calendar it is interpreted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CfTimeUnits {
    pub unit: CfTimeUnit,
    pub calendar: CfCalendar,
    reference: CalendarDate,
}

/// Result of decoding a single CF time value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTime {
    pub datetime: DateTime<Utc>,
    /// The calendar date did not exist in the Gregorian calendar and was clamped.
    pub clamped: bool,
}

impl CfTimeUnits {
    /// Parse a `units` attribute such as `"hours since 1970-01-01 00:00:00"`.
    pub fn parse(units: &str, calendar: CfCalendar) -> Result<Self, TimeParseError> {
        let (unit_str, reference_str) = units
            .split_once(" since ")
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;

        let unit = match unit_str.trim().to_lowercase().as_str() {
            "days" | "day" | "d" => CfTimeUnit::Days,
            "hours" | "hour" | "hr" | "h" => CfTimeUnit::Hours,
            "minutes" | "minute" | "min" => CfTimeUnit::Minutes,
            "seconds" | "second" | "sec" | "s" => CfTimeUnit::Seconds,
            _ => return Err(TimeParseError::InvalidUnits(units.to_string())),
        };

        let reference = parse_reference(reference_str.trim())
            .ok_or_else(|| TimeParseError::InvalidUnits(units.to_string()))?;

        if let Some(lengths) = calendar.fixed_month_lengths() {
            if reference.day > lengths[reference.month as usize - 1] {
                return Err(TimeParseError::InvalidUnits(units.to_string()));
            }
        }

        Ok(Self {
            unit,
            calendar,
            reference,
        })
    }

    /// Decode one offset into a UTC datetime.
    pub fn decode(&self, value: f64) -> Result<DecodedTime, TimeParseError> {
        if !value.is_finite() {
            return Err(TimeParseError::OutOfRange(value));
        }
        let offset_ms = (value * self.unit.milliseconds()).round();
        if offset_ms.abs() > i64::MAX as f64 / 2.0 {
            return Err(TimeParseError::OutOfRange(value));
        }
        let offset_ms = offset_ms as i64;

        match self.calendar.fixed_month_lengths() {
            None => self.decode_gregorian(offset_ms, value),
            Some(lengths) => self.decode_fixed(offset_ms, lengths, value),
        }
    }

    /// Decode a whole coordinate vector.
    pub fn decode_all(&self, values: &[f64]) -> Result<Vec<DecodedTime>, TimeParseError> {
        values.iter().map(|v| self.decode(*v)).collect()
    }

    fn decode_gregorian(&self, offset_ms: i64, value: f64) -> Result<DecodedTime, TimeParseError> {
        let r = self.reference;
        let base = NaiveDate::from_ymd_opt(r.year, r.month, r.day)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or(TimeParseError::OutOfRange(value))?;
        let naive = base
            .checked_add_signed(Duration::milliseconds(r.ms_of_day + offset_ms))
            .ok_or(TimeParseError::OutOfRange(value))?;
        Ok(DecodedTime {
            datetime: Utc.from_utc_datetime(&naive),
            clamped: false,
        })
    }

    fn decode_fixed(
        &self,
        offset_ms: i64,
        lengths: &[u32; 12],
        value: f64,
    ) -> Result<DecodedTime, TimeParseError> {
        let year_days: i64 = lengths.iter().map(|d| *d as i64).sum();
        let r = self.reference;

        let days_before_month: i64 = lengths[..r.month as usize - 1]
            .iter()
            .map(|d| *d as i64)
            .sum();
        let reference_ms = ((r.year as i64 * year_days + days_before_month + r.day as i64 - 1)
            * MS_PER_DAY)
            + r.ms_of_day;

        let total_ms = reference_ms
            .checked_add(offset_ms)
            .ok_or(TimeParseError::OutOfRange(value))?;
        let days = total_ms.div_euclid(MS_PER_DAY);
        let ms_of_day = total_ms.rem_euclid(MS_PER_DAY);

        let year = days.div_euclid(year_days);
        let mut day_of_year = days.rem_euclid(year_days);
        let mut month = 1u32;
        for len in lengths.iter() {
            if day_of_year < *len as i64 {
                break;
            }
            day_of_year -= *len as i64;
            month += 1;
        }
        let day = day_of_year as u32 + 1;
        let year = i32::try_from(year).map_err(|_| TimeParseError::OutOfRange(value))?;

        let last_day = last_day_of_month(year, month).ok_or(TimeParseError::OutOfRange(value))?;
        let clamped = day > last_day;
        let date = NaiveDate::from_ymd_opt(year, month, day.min(last_day))
            .ok_or(TimeParseError::OutOfRange(value))?;
        let naive = date
            .and_hms_opt(0, 0, 0)
            .ok_or(TimeParseError::OutOfRange(value))?
            + Duration::milliseconds(ms_of_day);

        Ok(DecodedTime {
            datetime: Utc.from_utc_datetime(&naive),
            clamped,
        })
    }
}

/// Parse a reference date: `YYYY-M-D`, optionally followed by `[ T]HH:MM[:SS[.f]]`
/// and a UTC designator.
fn parse_reference(s: &str) -> Option<CalendarDate> {
    let s = s
        .trim_end_matches('Z')
        .trim_end_matches(" UTC")
        .trim_end_matches("+00:00")
        .trim_end_matches(" +0:00")
        .trim();
    let (date_part, time_part) = match s.split_once(|c| c == ' ' || c == 'T') {
        Some((d, t)) => (d, Some(t.trim())),
        None => (s, None),
    };

    let mut fields = date_part.splitn(3, '-');
    let year: i32 = fields.next()?.parse().ok()?;
    let month: u32 = fields.next()?.parse().ok()?;
    let day: u32 = fields.next().unwrap_or("1").parse().ok()?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let ms_of_day = match time_part {
        None | Some("") => 0,
        Some(t) => {
            let mut parts = t.split(':');
            let hour: i64 = parts.next()?.parse().ok()?;
            let minute: i64 = parts.next().unwrap_or("0").parse().ok()?;
            let second: f64 = parts.next().unwrap_or("0").parse().ok()?;
            if hour > 23 || minute > 59 || !(0.0..61.0).contains(&second) {
                return None;
            }
            (hour * 3_600_000) + (minute * 60_000) + (second * 1000.0).round() as i64
        }
    };

    Some(CalendarDate {
        year,
        month,
        day,
        ms_of_day,
    })
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1)?;
    first_of_next.pred_opt().map(|d| chrono::Datelike::day(&d))
}

/// Closed temporal interval `[start, end]`; `start == end` is a valid, degenerate interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TemporalInterval {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `[min, max]` of the given instants, or `None` if there are none.
    pub fn from_instants<I: IntoIterator<Item = DateTime<Utc>>>(instants: I) -> Option<Self> {
        instants.into_iter().fold(None, |acc, t| match acc {
            None => Some(Self::new(t, t)),
            Some(i) => Some(Self::new(i.start.min(t), i.end.max(t))),
        })
    }

    pub fn is_degenerate(&self) -> bool {
        self.start == self.end
    }
}

/// Format a datetime the way STAC documents expect: `1999-12-01T00:00:00Z`.
pub fn format_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse an ISO 8601 datetime, a naive datetime (assumed UTC) or a bare date.
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid CF time units: {0}. Expected '<unit> since <date>'")]
    InvalidUnits(String),

    #[error("Unsupported CF calendar: {0}")]
    UnsupportedCalendar(String),

    #[error("Time value {0} is out of the representable range")]
    OutOfRange(f64),
}
