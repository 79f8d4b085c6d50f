use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_TIMEZONE: &str = "Europe/Berlin";
pub const DEFAULT_TICK_SECS: u64 = 60;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 3_000;
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ALARM_HORIZON_DAYS: u32 = 7;
pub const DEFAULT_ARCHIVE_AFTER_MONTHS: u32 = 12;

/// Top-level config (dienstplan.toml + DIENSTPLAN_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DienstplanConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub calendar: CalendarConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long a write waits on a locked database before failing as retryable.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// One recurring weekly duty slot as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub id: u32,
    /// English weekday name, e.g. `"tuesday"`.
    pub weekday: String,
    pub label: String,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_summer_from")]
    pub summer_pause_from_month: u32,
    #[serde(default = "default_summer_to")]
    pub summer_pause_to_month: u32,
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
    /// ISO dates. Years without any entry are treated as holiday-free.
    #[serde(default = "default_holidays")]
    pub holidays: Vec<String>,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            summer_pause_from_month: default_summer_from(),
            summer_pause_to_month: default_summer_to(),
            slots: default_slots(),
            holidays: default_holidays(),
        }
    }
}

impl CalendarConfig {
    pub fn tz(&self) -> crate::error::Result<chrono_tz::Tz> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|e| {
            crate::error::DienstplanError::Config(format!(
                "invalid timezone {:?}: {e}",
                self.timezone
            ))
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Earliest local time (`HH:MM`) the 24h reminder scan runs; `None` runs it on every tick.
    #[serde(default = "default_evening")]
    pub reminder_24h_at: Option<String>,
    #[serde(default = "default_evening_required")]
    pub alarm_at: String,
    #[serde(default = "default_alarm_horizon_days")]
    pub alarm_horizon_days: u32,
    #[serde(default = "bool_true")]
    pub digest_enabled: bool,
    #[serde(default = "default_digest_at")]
    pub digest_at: String,
    #[serde(default = "default_archive_after_months")]
    pub archive_after_months: u32,
    /// Extra snapshot recipients on top of every active admin.
    #[serde(default)]
    pub backup_recipients: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: DEFAULT_TICK_SECS,
            reminder_24h_at: default_evening(),
            alarm_at: default_evening_required(),
            alarm_horizon_days: DEFAULT_ALARM_HORIZON_DAYS,
            digest_enabled: true,
            digest_at: default_digest_at(),
            archive_after_months: DEFAULT_ARCHIVE_AFTER_MONTHS,
            backup_recipients: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
        }
    }
}

/// Admin account created on first start when the directory has none with this email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_email")]
    pub email: String,
    #[serde(default = "default_admin_name")]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: default_admin_email(),
            name: default_admin_name(),
            phone: String::new(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dienstplan/dienstplan.db", home)
}
fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_summer_from() -> u32 {
    6
}
fn default_summer_to() -> u32 {
    9
}
fn default_tick_secs() -> u64 {
    DEFAULT_TICK_SECS
}
fn default_evening() -> Option<String> {
    Some(default_evening_required())
}
fn default_evening_required() -> String {
    "18:00".to_string()
}
fn default_digest_at() -> String {
    "20:00".to_string()
}
fn default_alarm_horizon_days() -> u32 {
    DEFAULT_ALARM_HORIZON_DAYS
}
fn default_archive_after_months() -> u32 {
    DEFAULT_ARCHIVE_AFTER_MONTHS
}
fn default_send_timeout_secs() -> u64 {
    DEFAULT_SEND_TIMEOUT_SECS
}
fn default_admin_email() -> String {
    "admin@wasserwacht.de".to_string()
}
fn default_admin_name() -> String {
    "Admin".to_string()
}

fn default_slots() -> Vec<SlotConfig> {
    let slot = |id, weekday: &str, label: &str, start: &str, end: &str| SlotConfig {
        id,
        weekday: weekday.to_string(),
        label: label.to_string(),
        start: start.to_string(),
        end: end.to_string(),
    };
    vec![
        slot(1, "tuesday", "Dienstag", "17:00", "20:00"),
        slot(2, "friday", "Freitag", "17:00", "20:00"),
        slot(3, "saturday", "Samstag", "14:00", "17:00"),
    ]
}

// Bavarian public holidays.
fn default_holidays() -> Vec<String> {
    [
        "2025-01-01", "2025-01-06", "2025-04-18", "2025-04-21", "2025-05-01", "2025-05-29",
        "2025-06-09", "2025-06-19", "2025-08-15", "2025-10-03", "2025-11-01", "2025-12-25",
        "2025-12-26", "2026-01-01", "2026-01-06", "2026-04-03", "2026-04-06", "2026-05-01",
        "2026-05-14", "2026-05-25", "2026-06-04", "2026-08-15", "2026-10-03", "2026-11-01",
        "2026-12-25", "2026-12-26",
    ]
    .iter()
    .map(|d| d.to_string())
    .collect()
}

impl DienstplanConfig {
    /// Load config from a TOML file with DIENSTPLAN_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `DIENSTPLAN_SCHEDULER__TICK_SECS=30`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: DienstplanConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("DIENSTPLAN_").split("__"))
            .extract()
            .map_err(|e| crate::error::DienstplanError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.dienstplan/dienstplan.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = DienstplanConfig::load(Some("/nonexistent/dienstplan.toml")).unwrap();
        assert_eq!(cfg.calendar.timezone, DEFAULT_TIMEZONE);
        assert_eq!(cfg.calendar.slots.len(), 3);
        assert_eq!(cfg.scheduler.alarm_horizon_days, 7);
        assert_eq!(cfg.scheduler.reminder_24h_at.as_deref(), Some("18:00"));
        assert!(cfg.calendar.tz().is_ok());
    }

    #[test]
    fn toml_overrides_slots_and_holidays() {
        let cfg: DienstplanConfig = Figment::new()
            .merge(Toml::string(
                r#"
                [calendar]
                holidays = ["2025-12-25"]

                [[calendar.slots]]
                id = 7
                weekday = "thursday"
                label = "Donnerstag"
                start = "17:00"
                end = "20:00"

                [scheduler]
                tick_secs = 5
                "#,
            ))
            .extract()
            .unwrap();
        assert_eq!(cfg.calendar.holidays, vec!["2025-12-25".to_string()]);
        assert_eq!(cfg.calendar.slots[0].weekday, "thursday");
        assert_eq!(cfg.scheduler.tick_secs, 5);
        assert_eq!(cfg.scheduler.digest_at, "20:00");
    }

    #[test]
    fn bad_timezone_is_config_error() {
        let cal = CalendarConfig {
            timezone: "Mars/Olympus".to_string(),
            ..CalendarConfig::default()
        };
        assert_eq!(cal.tz().unwrap_err().code(), "CONFIG_ERROR");
    }
}
