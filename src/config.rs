use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use chrono_tz::Tz;

use crate::clients::bigtime_client::{BigTimeAuth, DEFAULT_BASE_URL};
use crate::error::ConfigError;
use crate::models::calendar::{WorkCalendarConfig, MAX_LOOK_AHEAD_MONTHS};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// `KEY=VALUE` pairs read from the file named by `CONFIG_FILE`.
#[derive(Debug, Default, Clone)]
pub struct AppConfig {
    values: HashMap<String, String>,
}

impl AppConfig {
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        for (idx, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::Parse {
                    line: idx + 1,
                    content: line.to_string(),
                });
            };
            let key = key.trim();
            let mut value = value.trim().to_string();
            if value.len() >= 2
                && ((value.starts_with('"') && value.ends_with('"'))
                    || (value.starts_with('\'') && value.ends_with('\'')))
            {
                value = value[1..value.len() - 1].to_string();
            }
            values.insert(key.to_string(), value);
        }
        Ok(Self { values })
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphCredentials {
    AccessToken(String),
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarSettings {
    Fixture(PathBuf),
    Graph(GraphCredentials),
}

#[derive(Debug, Clone)]
pub struct BigTimeSettings {
    pub auth: BigTimeAuth,
    pub firm_id: String,
    pub base_url: String,
}

/// Process-wide settings, built once at startup and passed down explicitly.
#[derive(Debug, Clone)]
pub struct Settings {
    pub work_calendar: WorkCalendarConfig,
    pub tracked_persons: Vec<String>,
    pub calendar: CalendarSettings,
    pub bigtime: Option<BigTimeSettings>,
    pub host: String,
    pub port: u16,
    pub cache_ttl: Duration,
}

fn non_empty<F: Fn(&str) -> Option<String>>(get: &F, key: &str) -> Option<String> {
    get(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T, F>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match non_empty(get, key) {
        Some(raw) => raw.parse::<T>().map_err(|e| ConfigError::Invalid {
            key: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.into(),
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn work_calendar<F: Fn(&str) -> Option<String>>(get: &F) -> Result<WorkCalendarConfig, ConfigError> {
    let defaults = WorkCalendarConfig::default();

    let look_ahead_months: u32 = parse_or(get, "LOOK_AHEAD_MONTHS", defaults.look_ahead_months)?;
    if !(1..=MAX_LOOK_AHEAD_MONTHS).contains(&look_ahead_months) {
        return Err(invalid(
            "LOOK_AHEAD_MONTHS",
            format!("must be between 1 and {}", MAX_LOOK_AHEAD_MONTHS),
        ));
    }

    let hours_per_day: f64 = parse_or(get, "HOURS_PER_DAY", defaults.hours_per_day)?;
    if !hours_per_day.is_finite() || hours_per_day <= 0.0 || hours_per_day > 24.0 {
        return Err(invalid("HOURS_PER_DAY", "must be a positive number of hours up to 24"));
    }

    let timezone = match non_empty(get, "TIMEZONE") {
        Some(raw) => raw
            .parse::<Tz>()
            .map_err(|_| invalid("TIMEZONE", format!("unknown time zone '{}'", raw)))?,
        None => defaults.timezone,
    };

    let week_start = match non_empty(get, "WEEK_START") {
        Some(raw) => raw
            .parse::<Weekday>()
            .map_err(|_| invalid("WEEK_START", format!("unknown weekday '{}'", raw)))?,
        None => defaults.week_start,
    };

    let work_days = match non_empty(get, "WORK_DAYS") {
        Some(raw) => split_list(&raw)
            .map(|day| {
                day.parse::<Weekday>()
                    .map(|d| d.num_days_from_monday() as u8)
                    .map_err(|_| invalid("WORK_DAYS", format!("unknown weekday '{}'", day)))
            })
            .collect::<Result<BTreeSet<u8>, ConfigError>>()?,
        None => defaults.work_days,
    };
    if work_days.is_empty() {
        return Err(invalid("WORK_DAYS", "at least one working day is required"));
    }

    let holidays = match non_empty(get, "HOLIDAYS") {
        Some(raw) => split_list(&raw)
            .map(|day| {
                NaiveDate::parse_from_str(day, "%Y-%m-%d")
                    .map_err(|_| invalid("HOLIDAYS", format!("'{}' is not a YYYY-MM-DD date", day)))
            })
            .collect::<Result<BTreeSet<NaiveDate>, ConfigError>>()?,
        None => BTreeSet::new(),
    };

    Ok(WorkCalendarConfig {
        hours_per_day,
        look_ahead_months,
        timezone,
        week_start,
        work_days,
        holidays,
    })
}

fn calendar_settings<F: Fn(&str) -> Option<String>>(get: &F) -> Result<CalendarSettings, ConfigError> {
    if let Some(path) = non_empty(get, "CALENDAR_FIXTURE") {
        return Ok(CalendarSettings::Fixture(PathBuf::from(path)));
    }
    if let Some(token) = non_empty(get, "GRAPH_ACCESS_TOKEN") {
        return Ok(CalendarSettings::Graph(GraphCredentials::AccessToken(token)));
    }
    match (
        non_empty(get, "AZURE_TENANT_ID"),
        non_empty(get, "AZURE_CLIENT_ID"),
        non_empty(get, "AZURE_CLIENT_SECRET"),
    ) {
        (Some(tenant_id), Some(client_id), Some(client_secret)) => {
            Ok(CalendarSettings::Graph(GraphCredentials::ClientSecret {
                tenant_id,
                client_id,
                client_secret,
            }))
        }
        _ => Err(ConfigError::Missing(
            "calendar credentials: set AZURE_TENANT_ID, AZURE_CLIENT_ID and AZURE_CLIENT_SECRET \
             (or GRAPH_ACCESS_TOKEN, or CALENDAR_FIXTURE for offline data)"
                .to_string(),
        )),
    }
}

fn bigtime_settings<F: Fn(&str) -> Option<String>>(get: &F) -> Option<BigTimeSettings> {
    let firm_id = non_empty(get, "BIGTIME_FIRM_ID");
    let auth = match (
        non_empty(get, "BIGTIME_API_TOKEN"),
        &firm_id,
        non_empty(get, "BIGTIME_USERNAME"),
        non_empty(get, "BIGTIME_PASSWORD"),
    ) {
        (Some(api_token), Some(_), _, _) => BigTimeAuth::FirmToken { api_token },
        (_, _, Some(username), Some(password)) => BigTimeAuth::Credentials { username, password },
        _ => return None,
    };
    Some(BigTimeSettings {
        auth,
        firm_id: firm_id.unwrap_or_default(),
        base_url: non_empty(get, "BIGTIME_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
    })
}

impl Settings {
    /// Builds settings from a key lookup, normally config file first, then env.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self, ConfigError> {
        let work_calendar = work_calendar(&get)?;
        let calendar = calendar_settings(&get)?;
        let tracked_persons: Vec<String> = non_empty(&get, "OUTLOOK_USERS")
            .map(|raw| split_list(&raw).map(str::to_string).collect())
            .unwrap_or_default();
        if tracked_persons.is_empty() && matches!(calendar, CalendarSettings::Graph(_)) {
            return Err(ConfigError::Missing(
                "OUTLOOK_USERS: list the staff e-mails to track, comma separated".to_string(),
            ));
        }

        Ok(Settings {
            work_calendar,
            tracked_persons,
            calendar,
            bigtime: bigtime_settings(&get),
            host: non_empty(&get, "HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            cache_ttl: Duration::from_secs(parse_or(&get, "CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?),
        })
    }
}
