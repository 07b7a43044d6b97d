//! Calendar attributes derived from a transaction date.
//!
//! Everything here is a pure function of the date; the time dimension never
//! stores anything that cannot be recomputed from `fecha`.

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
  "January", "February", "March", "April", "May", "June", "July", "August",
  "September", "October", "November", "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
  "Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday",
];

/// Half of the calendar year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
pub enum Semester {
  #[strum(serialize = "1st")]
  #[serde(rename = "1st")]
  First,
  #[strum(serialize = "2nd")]
  #[serde(rename = "2nd")]
  Second,
}

/// Every attribute of a `dim_tiempo` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeAttributes {
  pub date:        NaiveDate,
  pub day:         u32,
  pub month:       u32,
  pub year:        i32,
  pub semester:    Semester,
  /// 1..=4; rendered as `T1`..`T4`.
  pub quarter:     u32,
  pub weekday:     Weekday,
  pub day_of_year: u32,
  pub is_weekend:  bool,
  /// Placeholder; no holiday calendar is consulted yet.
  pub holiday:     bool,
}

impl TimeAttributes {
  /// Derive the calendar attributes of `date`.
  pub fn derive(date: NaiveDate) -> Self {
    let month = date.month();
    let weekday = date.weekday();

    Self {
      date,
      day: date.day(),
      month,
      year: date.year(),
      semester: if month <= 6 { Semester::First } else { Semester::Second },
      quarter: month.div_ceil(3),
      weekday,
      day_of_year: date.ordinal(),
      is_weekend: matches!(weekday, Weekday::Sat | Weekday::Sun),
      holiday: false,
    }
  }

  pub fn quarter_label(&self) -> String { format!("T{}", self.quarter) }

  pub fn month_name(&self) -> &'static str { MONTH_NAMES[self.date.month0() as usize] }

  pub fn weekday_name(&self) -> &'static str {
    WEEKDAY_NAMES[self.weekday.num_days_from_monday() as usize]
  }
}

/// Storage rendering of the yes/no flags in `dim_tiempo`.
pub fn flag_label(flag: bool) -> &'static str { if flag { "Sí" } else { "No" } }
