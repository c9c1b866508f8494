use chrono_tz::Tz;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub pricing: PricingSettings,
    pub business_rules: BusinessRules,
    pub flight_status: FlightStatusSettings,
    pub notifications: NotificationSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricingSettings {
    pub interval_seconds: u64,
    /// `MM-DD` dates that carry the holiday surcharge
    pub holidays: Vec<String>,
    #[serde(default = "default_conflict_retries")]
    pub max_conflict_retries: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    /// IANA zone in which refund windows and holidays are evaluated
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_freeze_minutes")]
    pub default_freeze_minutes: i64,
}

impl BusinessRules {
    pub fn tz(&self) -> Result<Tz, config::ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| {
            config::ConfigError::Message(format!("invalid timezone '{}': {}", self.timezone, e))
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FlightStatusSettings {
    #[serde(default)]
    pub enabled: bool,
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    /// Per-subscriber buffer; a subscriber that falls this far behind is dropped
    pub channel_capacity: usize,
}

fn default_conflict_retries() -> u32 { 5 }
fn default_timezone() -> String { "UTC".to_string() }
fn default_freeze_minutes() -> i64 { 30 }

impl Default for Config {
    fn default() -> Self {
        Self {
            pricing: PricingSettings {
                interval_seconds: 300,
                holidays: vec![
                    "01-01".to_string(),
                    "08-15".to_string(),
                    "10-02".to_string(),
                    "12-25".to_string(),
                ],
                max_conflict_retries: default_conflict_retries(),
            },
            business_rules: BusinessRules {
                timezone: default_timezone(),
                default_freeze_minutes: default_freeze_minutes(),
            },
            flight_status: FlightStatusSettings {
                enabled: false,
                interval_seconds: 15,
            },
            notifications: NotificationSettings {
                channel_capacity: 64,
            },
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides, never checked in
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(environment())
            .build()?;

        let config: Config = s.try_deserialize()?;
        config.business_rules.tz()?;
        Ok(config)
    }
}

/// Overrides such as `WAYFARE__PRICING__INTERVAL_SECONDS=60`.
/// Holidays are comma-separated: `WAYFARE__PRICING__HOLIDAYS=01-01,12-25`.
fn environment() -> config::Environment {
    config::Environment::with_prefix("WAYFARE")
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("pricing.holidays")
        .try_parsing(true)
}
