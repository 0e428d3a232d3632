//! Notification and scheduled notification models

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

use crate::metadata::MetadataError;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    pub table_id: Option<i32>,
    pub record_id: Option<i32>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}

/// How a scheduled notification repeats after it fires
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "none",
            Recurrence::Daily => "daily",
            Recurrence::Weekly => "weekly",
            Recurrence::Monthly => "monthly",
        }
    }

    /// First occurrence strictly after `now`, or `None` for one-shot ones.
    ///
    /// Occurrences are counted from `recurs_from`, never from the previous
    /// one, so a monthly schedule on the 31st keeps its day when it can.
    pub fn next_after(&self, recurs_from: DateTime<Utc>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let nth = |n: u32| match self {
            Recurrence::None => None,
            Recurrence::Daily => Some(recurs_from + Duration::days(i64::from(n))),
            Recurrence::Weekly => Some(recurs_from + Duration::weeks(i64::from(n))),
            Recurrence::Monthly => recurs_from.checked_add_months(Months::new(n)),
        };

        let mut n = 1;
        loop {
            let next = nth(n)?;
            if next > now {
                return Some(next);
            }
            n = n.checked_add(1)?;
        }
    }
}

impl FromStr for Recurrence {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" | "" => Ok(Recurrence::None),
            "daily" => Ok(Recurrence::Daily),
            "weekly" => Ok(Recurrence::Weekly),
            "monthly" => Ok(Recurrence::Monthly),
            other => Err(MetadataError::invalid(format!(
                "Unknown recurrence: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduledNotification {
    pub id: i32,
    pub user_id: i32,
    pub table_id: Option<i32>,
    pub record_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    /// First occurrence; recurring schedules count from here
    pub recurs_from: DateTime<Utc>,
    pub recurrence: String,
    pub is_sent: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduledNotification {
    /// Defaults to the caller
    pub user_id: Option<i32>,
    pub table_id: Option<i32>,
    pub record_id: Option<i32>,
    pub title: String,
    pub message: String,
    pub scheduled_for: DateTime<Utc>,
    #[serde(default)]
    pub recurrence: Recurrence,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateScheduledNotification {
    pub title: Option<String>,
    pub message: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub recurrence: Option<Recurrence>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_one_shot_has_no_next() {
        assert_eq!(
            Recurrence::None.next_after(at(2024, 1, 1, 9), at(2024, 1, 1, 9)),
            None
        );
    }

    #[test]
    fn test_daily_skips_missed_occurrences() {
        let next = Recurrence::Daily.next_after(at(2024, 1, 1, 9), at(2024, 1, 3, 12));
        assert_eq!(next, Some(at(2024, 1, 4, 9)));
    }

    #[test]
    fn test_weekly_and_monthly() {
        assert_eq!(
            Recurrence::Weekly.next_after(at(2024, 1, 1, 9), at(2024, 1, 1, 9)),
            Some(at(2024, 1, 8, 9))
        );
        assert_eq!(
            Recurrence::Monthly.next_after(at(2024, 1, 31, 9), at(2024, 1, 31, 9)),
            Some(at(2024, 2, 29, 9))
        );
    }

    #[test]
    fn test_monthly_keeps_day_of_month() {
        let anchor = at(2024, 1, 31, 9);
        assert_eq!(
            Recurrence::Monthly.next_after(anchor, at(2024, 2, 29, 9)),
            Some(at(2024, 3, 31, 9))
        );
        assert_eq!(
            Recurrence::Monthly.next_after(anchor, at(2024, 4, 1, 0)),
            Some(at(2024, 4, 30, 9))
        );
        assert_eq!(
            Recurrence::Monthly.next_after(anchor, at(2024, 4, 30, 9)),
            Some(at(2024, 5, 31, 9))
        );
    }

    #[test]
    fn test_parse_recurrence() {
        assert_eq!("weekly".parse::<Recurrence>().unwrap(), Recurrence::Weekly);
        assert_eq!("".parse::<Recurrence>().unwrap(), Recurrence::None);
        assert!("hourly".parse::<Recurrence>().is_err());
    }
}
