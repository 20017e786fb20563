use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  Datelike,
  Duration,
  Local,
  NaiveDate,
  TimeZone,
  Utc,
  Weekday
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

const TIMEZONE_CONFIG_FILE: &str =
  "zentask-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "ZENTASK_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "ZENTASK_TIME_CONFIG";

pub const DUE_DATE_FORMAT: &str =
  "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

/// Configured zone for "today" and
/// day bucketing. `None` means the
/// system local zone.
pub fn project_timezone()
-> Option<&'static Tz> {
  static PROJECT_TZ: OnceLock<
    Option<Tz>
  > = OnceLock::new();
  PROJECT_TZ
    .get_or_init(
      resolve_project_timezone
    )
    .as_ref()
}

#[must_use]
pub fn to_project_date(
  dt: DateTime<Utc>
) -> NaiveDate {
  match project_timezone() {
    | Some(tz) => {
      dt.with_timezone(tz).date_naive()
    }
    | None => {
      dt.with_timezone(&Local)
        .date_naive()
    }
  }
}

/// The single "today" used for
/// default due dates, group labels
/// and the agenda.
#[must_use]
pub fn today() -> NaiveDate {
  to_project_date(Utc::now())
}

#[must_use]
pub fn millis_to_project_date(
  millis: i64
) -> Option<NaiveDate> {
  Utc
    .timestamp_millis_opt(millis)
    .single()
    .map(to_project_date)
}

fn resolve_project_timezone()
-> Option<Tz> {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return Some(tz);
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return Some(tz);
  }

  tracing::debug!(
    "no timezone configured; using \
     system local time"
  );
  None
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured project timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Parses exactly `YYYY-MM-DD`.
/// chrono alone would accept
/// unpadded fields.
pub fn parse_due_date(
  raw: &str
) -> anyhow::Result<NaiveDate> {
  let date_re =
    Regex::new(r"^\d{4}-\d{2}-\d{2}$")
      .map_err(|e| {
        anyhow!(
          "internal regex compile \
           failure: {e}"
        )
      })?;
  if !date_re.is_match(raw) {
    return Err(anyhow!(
      "due date must be YYYY-MM-DD, \
       got: {raw}"
    ));
  }
  NaiveDate::parse_from_str(
    raw,
    DUE_DATE_FORMAT
  )
  .map_err(|err| {
    anyhow!(
      "invalid calendar date {raw}: \
       {err}"
    )
  })
}

#[must_use]
pub fn format_due_date(
  date: NaiveDate
) -> String {
  date
    .format(DUE_DATE_FORMAT)
    .to_string()
}

/// Resolves user input for a due
/// date: `today`, `tomorrow`,
/// `yesterday`, a weekday name (next
/// occurrence) or `YYYY-MM-DD`.
#[tracing::instrument(skip(today), fields(input = input))]
pub fn parse_date_expr(
  input: &str,
  today: NaiveDate
) -> anyhow::Result<NaiveDate> {
  let token = input.trim();
  let lower =
    token.to_ascii_lowercase();

  match lower.as_str() {
    | "today" => return Ok(today),
    | "tomorrow" => {
      return today
        .checked_add_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to advance to \
             tomorrow"
          )
        });
    }
    | "yesterday" => {
      return today
        .checked_sub_signed(
          Duration::days(1)
        )
        .ok_or_else(|| {
          anyhow!(
            "failed to step back to \
             yesterday"
          )
        });
    }
    | _ => {}
  }

  if let Some(target_weekday) =
    parse_weekday_name(&lower)
  {
    return Ok(next_weekday_date(
      today,
      target_weekday
    ));
  }

  parse_due_date(token)
}

fn parse_weekday_name(
  token: &str
) -> Option<Weekday> {
  match token.trim() {
    | "monday" | "mon" => {
      Some(Weekday::Mon)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(Weekday::Tue)
    }
    | "wednesday" | "wed" => {
      Some(Weekday::Wed)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => Some(Weekday::Thu),
    | "friday" | "fri" => {
      Some(Weekday::Fri)
    }
    | "saturday" | "sat" => {
      Some(Weekday::Sat)
    }
    | "sunday" | "sun" => {
      Some(Weekday::Sun)
    }
    | _ => None
  }
}

fn next_weekday_date(
  from: NaiveDate,
  target: Weekday
) -> NaiveDate {
  let from_idx = from
    .weekday()
    .num_days_from_monday()
    as i64;
  let target_idx = target
    .num_days_from_monday()
    as i64;
  let mut delta =
    (7 + target_idx - from_idx) % 7;
  if delta == 0 {
    delta = 7;
  }
  from
    .checked_add_signed(Duration::days(
      delta
    ))
    .unwrap_or(from)
}

/// Serde adapter holding `dueDate`
/// to the strict `YYYY-MM-DD` form.
pub mod due_date_serde {
  use chrono::NaiveDate;
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  pub fn serialize<S>(
    date: &NaiveDate,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &super::format_due_date(*date)
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<NaiveDate, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    super::parse_due_date(&raw)
      .map_err(serde::de::Error::custom)
  }
}
