//! Timestamps tagged with how the remote service should interpret them
//!
//! A due date of "2023-08-28" and a due instant of "2023-08-28T13:00:00Z" look
//! alike locally (both are UTC instants) but mean different things remotely.
//! `SyncDateTime` keeps the instant in the task's zone plus an explicit
//! `DateKind`; every remote format is a pure function of the kind.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use syncstore::Due;
use thiserror::Error;
use tracing::debug;

/// Compact UTC form used by the local task database
const LOCAL_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const REMOTE_DATE_FORMAT: &str = "%Y-%m-%d";
const REMOTE_FLOATING_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const REMOTE_FIXED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const REMOTE_FIXED_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateParseError {
    #[error("Unrecognised timestamp '{0}'")]
    Invalid(String),

    #[error("Unknown time zone '{0}'")]
    UnknownZone(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    /// Calendar date, no time of day
    FloatingDate,
    /// Wall-clock time in whatever zone the viewer is in
    FloatingDateTime,
    /// Absolute instant anchored to a zone
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncDateTime {
    value: DateTime<Tz>,
    kind: DateKind,
}

impl SyncDateTime {
    /// Wrap `value`; floating dates are normalised to local midnight
    pub fn new(value: DateTime<Tz>, kind: DateKind) -> Self {
        match kind {
            DateKind::FloatingDate => Self::floating_date(value.date_naive(), value.timezone()),
            _ => Self { value, kind },
        }
    }

    pub fn floating_date(date: NaiveDate, tz: Tz) -> Self {
        Self {
            value: local_to_zoned(date.and_time(NaiveTime::default()), tz),
            kind: DateKind::FloatingDate,
        }
    }

    /// Classify a local-database instant: local midnight means a plain date
    pub fn infer(instant: DateTime<Utc>, tz: Tz) -> Self {
        let value = instant.with_timezone(&tz);
        let kind = if value.hour() == 0 && value.minute() == 0 {
            DateKind::FloatingDate
        } else {
            DateKind::Fixed
        };
        Self::new(value, kind)
    }

    /// Parse the local database's `YYYYMMDDTHHMMSSZ` form
    pub fn parse_local(raw: &str, tz: Tz) -> Result<Self, DateParseError> {
        let naive = NaiveDateTime::parse_from_str(raw, LOCAL_FORMAT)
            .map_err(|_| DateParseError::Invalid(raw.to_string()))?;
        Ok(Self::infer(naive.and_utc(), tz))
    }

    /// Parse an RFC 3339 instant such as a remote `completed_at`
    pub fn parse_instant(raw: &str, tz: Tz) -> Result<Self, DateParseError> {
        let instant =
            DateTime::parse_from_rfc3339(raw).map_err(|_| DateParseError::Invalid(raw.to_string()))?;
        Ok(Self {
            value: instant.with_timezone(&tz),
            kind: DateKind::Fixed,
        })
    }

    /// Parse a remote due value, trying date, floating and fixed forms in order
    pub fn parse_remote(date: &str, timezone: Option<&str>, default_tz: Tz) -> Result<Self, DateParseError> {
        let tz = match timezone {
            Some(name) => parse_zone(name)?,
            None => default_tz,
        };

        if let Ok(day) = NaiveDate::parse_from_str(date, REMOTE_DATE_FORMAT) {
            return Ok(Self::floating_date(day, tz));
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, REMOTE_FLOATING_FORMAT) {
            return Ok(Self {
                value: local_to_zoned(naive, tz),
                kind: DateKind::FloatingDateTime,
            });
        }
        if let Ok(naive) = NaiveDateTime::parse_from_str(date, REMOTE_FIXED_PARSE_FORMAT) {
            return Ok(Self {
                value: naive.and_utc().with_timezone(&tz),
                kind: DateKind::Fixed,
            });
        }
        debug!(date, "SyncDateTime::parse_remote: no format matched");
        Err(DateParseError::Invalid(date.to_string()))
    }

    pub fn from_remote_due(due: &Due, default_tz: Tz) -> Result<Self, DateParseError> {
        Self::parse_remote(&due.date, due.timezone.as_deref(), default_tz)
    }

    pub fn kind(&self) -> DateKind {
        self.kind
    }

    pub fn value(&self) -> &DateTime<Tz> {
        &self.value
    }

    pub fn timezone(&self) -> Tz {
        self.value.timezone()
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.value.with_timezone(&Utc)
    }

    /// Local database form
    pub fn to_local_string(&self) -> String {
        self.to_utc().format(LOCAL_FORMAT).to_string()
    }

    /// UTC instant with microseconds, as the remote expects for fixed values
    pub fn to_fixed_string(&self) -> String {
        self.to_utc().format(REMOTE_FIXED_FORMAT).to_string()
    }

    /// The remote `date` string for this value's kind
    pub fn remote_date(&self) -> String {
        match self.kind {
            DateKind::FloatingDate => self.value.date_naive().format(REMOTE_DATE_FORMAT).to_string(),
            DateKind::FloatingDateTime => self.value.naive_local().format(REMOTE_FLOATING_FORMAT).to_string(),
            DateKind::Fixed => self.to_fixed_string(),
        }
    }

    pub fn to_remote_due(&self) -> Due {
        let timezone = match self.kind {
            DateKind::Fixed => Some(self.timezone().name().to_string()),
            DateKind::FloatingDate | DateKind::FloatingDateTime => None,
        };
        Due {
            date: self.remote_date(),
            timezone,
            is_recurring: false,
            string: None,
            lang: None,
        }
    }
}

fn parse_zone(name: &str) -> Result<Tz, DateParseError> {
    name.parse::<Tz>()
        .map_err(|_| DateParseError::UnknownZone(name.to_string()))
}

/// Resolve a wall-clock time in `tz`; times skipped by a DST jump are read as UTC
fn local_to_zoned(naive: NaiveDateTime, tz: Tz) -> DateTime<Tz> {
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

/// The process-local zone: `TZ`, then the `/etc/localtime` link, then UTC
pub fn local_zone() -> Tz {
    let tz_env = std::env::var("TZ").ok();
    let link = std::fs::read_link("/etc/localtime").ok();
    zone_from_sources(tz_env.as_deref(), link.as_deref())
}

pub fn zone_from_sources(tz_env: Option<&str>, localtime_link: Option<&Path>) -> Tz {
    if let Some(tz) = tz_env
        .map(|raw| raw.trim_start_matches(':'))
        .and_then(|name| name.parse::<Tz>().ok())
    {
        return tz;
    }
    localtime_link
        .and_then(|link| link.to_str())
        .and_then(|link| link.split_once("zoneinfo/"))
        .and_then(|(_, name)| name.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::America::New_York;
    use std::path::PathBuf;

    #[test]
    fn test_local_midnight_is_floating_date() {
        // 04:00Z is midnight in New York during EDT
        let dt = SyncDateTime::parse_local("20230828T040000Z", New_York).unwrap();
        assert_eq!(dt.kind(), DateKind::FloatingDate);
        assert_eq!(dt.remote_date(), "2023-08-28");

        let due = dt.to_remote_due();
        assert_eq!(due.timezone, None);
        assert!(!due.is_recurring);
    }

    #[test]
    fn test_time_of_day_is_fixed() {
        let dt = SyncDateTime::parse_local("20230828T130000Z", New_York).unwrap();
        assert_eq!(dt.kind(), DateKind::Fixed);

        let due = dt.to_remote_due();
        assert_eq!(due.date, "2023-08-28T13:00:00.000000Z");
        assert_eq!(due.timezone.as_deref(), Some("America/New_York"));
    }

    #[test]
    fn test_midnight_utc_is_not_midnight_locally() {
        let dt = SyncDateTime::parse_local("20230828T000000Z", New_York).unwrap();
        assert_eq!(dt.kind(), DateKind::Fixed);
        let dt = SyncDateTime::parse_local("20230828T000000Z", Tz::UTC).unwrap();
        assert_eq!(dt.kind(), DateKind::FloatingDate);
    }

    #[test]
    fn test_floating_date_normalised_to_midnight() {
        let noon = New_York.with_ymd_and_hms(2023, 8, 28, 12, 30, 0).unwrap();
        let dt = SyncDateTime::new(noon, DateKind::FloatingDate);
        assert_eq!(dt.value().hour(), 0);
        assert_eq!(dt.value().minute(), 0);
        assert_eq!(dt.remote_date(), "2023-08-28");
    }

    #[test]
    fn test_local_string_roundtrip() {
        let dt = SyncDateTime::parse_local("20230828T130000Z", New_York).unwrap();
        assert_eq!(dt.to_local_string(), "20230828T130000Z");
    }

    #[test]
    fn test_parse_remote_formats_in_order() {
        let date = SyncDateTime::parse_remote("2023-08-28", None, New_York).unwrap();
        assert_eq!(date.kind(), DateKind::FloatingDate);
        assert_eq!(date.to_local_string(), "20230828T040000Z");

        let floating = SyncDateTime::parse_remote("2023-08-28T09:00:00", None, New_York).unwrap();
        assert_eq!(floating.kind(), DateKind::FloatingDateTime);
        assert_eq!(floating.remote_date(), "2023-08-28T09:00:00");

        let fixed = SyncDateTime::parse_remote("2023-08-28T13:00:00Z", Some("America/New_York"), Tz::UTC).unwrap();
        assert_eq!(fixed.kind(), DateKind::Fixed);
        assert_eq!(fixed.timezone(), New_York);
        assert_eq!(fixed.value().hour(), 9);

        let micros = SyncDateTime::parse_remote("2023-08-28T13:00:00.000000Z", None, Tz::UTC).unwrap();
        assert_eq!(micros, SyncDateTime::parse_local("20230828T130000Z", Tz::UTC).unwrap());
    }

    #[test]
    fn test_parse_remote_rejects_garbage() {
        assert!(matches!(
            SyncDateTime::parse_remote("next tuesday", None, Tz::UTC),
            Err(DateParseError::Invalid(_))
        ));
        assert!(matches!(
            SyncDateTime::parse_remote("2023-08-28", Some("Mars/Olympus"), Tz::UTC),
            Err(DateParseError::UnknownZone(_))
        ));
    }

    #[test]
    fn test_parse_instant() {
        let dt = SyncDateTime::parse_instant("2023-08-27T21:29:31.440088Z", New_York).unwrap();
        assert_eq!(dt.kind(), DateKind::Fixed);
        assert_eq!(dt.to_local_string(), "20230827T212931Z");
    }

    #[test]
    fn test_zone_from_sources() {
        assert_eq!(zone_from_sources(Some("America/New_York"), None), New_York);
        assert_eq!(zone_from_sources(Some(":Europe/Berlin"), None), chrono_tz::Europe::Berlin);

        let link = PathBuf::from("/usr/share/zoneinfo/Asia/Tokyo");
        assert_eq!(zone_from_sources(None, Some(&link)), chrono_tz::Asia::Tokyo);
        assert_eq!(zone_from_sources(Some("garbage"), Some(&link)), chrono_tz::Asia::Tokyo);
        assert_eq!(zone_from_sources(None, None), Tz::UTC);
    }
}
