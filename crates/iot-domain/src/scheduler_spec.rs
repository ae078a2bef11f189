//! The scheduler spec attached to every task: describes *when* it fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cron::parse_tz;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Once,
    Weekly,
    Daily,
    Hourly,
    Minutely,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Sun,
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
}

impl Weekday {
    fn num_from_sunday(self) -> u32 {
        match self {
            Weekday::Sun => 0,
            Weekday::Mon => 1,
            Weekday::Tue => 2,
            Weekday::Wed => 3,
            Weekday::Thu => 4,
            Weekday::Fri => 5,
            Weekday::Sat => 6,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeekSpec {
    pub days: Vec<Weekday>,
    pub time: String,
}

fn default_tz() -> String {
    "UTC".to_string()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerSpec {
    #[serde(default = "default_tz")]
    pub time_zone: String,
    pub frequency: Frequency,
    #[serde(default)]
    pub date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub week: Option<WeekSpec>,
    #[serde(default)]
    pub day_time: Option<String>,
    #[serde(default)]
    pub hour: Option<u32>,
    #[serde(default)]
    pub minute: Option<u32>,
}

fn parse_hh_mm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    if h > 23 || m > 59 {
        return None;
    }
    Some((h, m))
}

impl SchedulerSpec {
    /// Validate the spec against its own `frequency` and normalize `time_zone`.
    /// Unlike a permissive clone of this idiom, an unparseable zone name is a
    /// hard validation error rather than a silent fallback to UTC.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<()> {
        let tz = parse_tz(&self.time_zone)
            .ok_or_else(|| Error::Validation(format!("unknown time zone: {}", self.time_zone)))?;

        match self.frequency {
            Frequency::Once => {
                let dt = self
                    .date_time
                    .ok_or_else(|| Error::Validation("once requires date_time".into()))?;
                if dt <= now + chrono::Duration::minutes(1) {
                    return Err(Error::Validation(
                        "date_time must be at least one minute in the future".into(),
                    ));
                }
                let _ = dt.with_timezone(&tz);
            }
            Frequency::Weekly => {
                let week = self
                    .week
                    .as_ref()
                    .ok_or_else(|| Error::Validation("weekly requires week".into()))?;
                if week.days.is_empty() {
                    return Err(Error::Validation("week.days must be nonempty".into()));
                }
                parse_hh_mm(&week.time).ok_or_else(|| {
                    Error::Validation(format!("invalid week.time: {}", week.time))
                })?;
            }
            Frequency::Daily => {
                let day_time = self
                    .day_time
                    .as_ref()
                    .ok_or_else(|| Error::Validation("daily requires day_time".into()))?;
                parse_hh_mm(day_time)
                    .ok_or_else(|| Error::Validation(format!("invalid day_time: {day_time}")))?;
            }
            Frequency::Hourly => {
                let hour = self
                    .hour
                    .ok_or_else(|| Error::Validation("hourly requires hour".into()))?;
                if !(1..=23).contains(&hour) {
                    return Err(Error::Validation("hour must be in 1..=23".into()));
                }
            }
            Frequency::Minutely => {
                let minute = self
                    .minute
                    .ok_or_else(|| Error::Validation("minutely requires minute".into()))?;
                if !(1..=59).contains(&minute) {
                    return Err(Error::Validation("minute must be in 1..=59".into()));
                }
            }
        }
        Ok(())
    }

    /// Translate to a 5-field cron expression. Not meaningful for `Once`.
    pub fn to_cron(&self) -> Option<String> {
        match self.frequency {
            Frequency::Once => None,
            Frequency::Minutely => {
                let m = self.minute.unwrap_or(1);
                Some(format!("*/{m} * * * *"))
            }
            Frequency::Hourly => {
                let h = self.hour.unwrap_or(1);
                Some(format!("0 */{h} * * *"))
            }
            Frequency::Daily => {
                let (h, m) = parse_hh_mm(self.day_time.as_deref().unwrap_or("00:00"))?;
                Some(format!("{m} {h} * * *"))
            }
            Frequency::Weekly => {
                let week = self.week.as_ref()?;
                let (h, m) = parse_hh_mm(&week.time)?;
                let days = week
                    .days
                    .iter()
                    .map(|d| d.num_from_sunday().to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                Some(format!("{m} {h} * * {days}"))
            }
        }
    }

    pub fn tz(&self) -> chrono_tz::Tz {
        parse_tz(&self.time_zone).unwrap_or(chrono_tz::UTC)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minutely_cron() {
        let spec = SchedulerSpec {
            time_zone: "UTC".into(),
            frequency: Frequency::Minutely,
            date_time: None,
            week: None,
            day_time: None,
            hour: None,
            minute: Some(5),
        };
        assert_eq!(spec.to_cron().unwrap(), "*/5 * * * *");
    }

    #[test]
    fn weekly_cron() {
        let spec = SchedulerSpec {
            time_zone: "UTC".into(),
            frequency: Frequency::Weekly,
            date_time: None,
            week: Some(WeekSpec {
                days: vec![Weekday::Mon, Weekday::Wed],
                time: "09:30".into(),
            }),
            day_time: None,
            hour: None,
            minute: None,
        };
        assert_eq!(spec.to_cron().unwrap(), "30 9 * * 1,3");
    }

    #[test]
    fn invalid_time_zone_rejected() {
        let spec = SchedulerSpec {
            time_zone: "Not/A/Zone".into(),
            frequency: Frequency::Hourly,
            date_time: None,
            week: None,
            day_time: None,
            hour: Some(1),
            minute: None,
        };
        assert!(spec.validate(Utc::now()).is_err());
    }
}
