use anyhow::Context;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::reduce::{parse_statistics, NavigationOptions, ReduceOptions, Statistic};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub reporting: ReportingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "DatabaseConfig::default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Defaults applied to dashboard queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    /// Offset of the reporting timezone from UTC, in minutes
    pub utc_offset_minutes: i32,
    /// Days covered by a query that gives no start date
    #[serde(default = "ReportingConfig::default_days")]
    pub default_days: u32,
    /// Widest span, in days, a query may cover
    #[serde(default = "ReportingConfig::default_max_days")]
    pub max_days: u32,
    /// Navigation statistics computed when a query names none
    pub navigation_calculate: Vec<Statistic>,
    pub navigation_percentile: f64,
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

impl ReportingConfig {
    const fn default_days() -> u32 {
        30
    }

    const fn default_max_days() -> u32 {
        366
    }

    pub fn timezone(&self) -> anyhow::Result<FixedOffset> {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .with_context(|| {
                format!(
                    "REPORT_UTC_OFFSET_MINUTES {} is not a valid offset",
                    self.utc_offset_minutes
                )
            })
    }

    /// Aggregation options with these defaults and no date bounds.
    pub fn reduce_options(&self) -> anyhow::Result<ReduceOptions> {
        Ok(ReduceOptions {
            start: None,
            end: None,
            timezone: self.timezone()?,
            navigation: NavigationOptions {
                calculate: self.navigation_calculate.clone(),
                percentile: self.navigation_percentile,
            },
        })
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        let navigation = NavigationOptions::default();
        Self {
            utc_offset_minutes: 0,
            default_days: Self::default_days(),
            max_days: Self::default_max_days(),
            navigation_calculate: navigation.calculate,
            navigation_percentile: navigation.percentile,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./rum-diary.db?mode=rwc".to_string());
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or_else(DatabaseConfig::default_max_connections);

        let api_host = std::env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let api_port = std::env::var("API_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let defaults = ReportingConfig::default();

        let utc_offset_minutes = match std::env::var("REPORT_UTC_OFFSET_MINUTES") {
            Ok(v) => v
                .parse::<i32>()
                .context("REPORT_UTC_OFFSET_MINUTES must be an integer")?,
            Err(_) => defaults.utc_offset_minutes,
        };

        let default_days = std::env::var("REPORT_DEFAULT_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(defaults.default_days);

        let max_days = std::env::var("REPORT_MAX_DAYS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .filter(|days| *days > 0)
            .unwrap_or(defaults.max_days)
            .max(default_days);

        let navigation_calculate = match std::env::var("NAVIGATION_CALCULATE") {
            Ok(v) => parse_statistics(&v).context("NAVIGATION_CALCULATE")?,
            Err(_) => defaults.navigation_calculate,
        };

        let navigation_percentile = match std::env::var("NAVIGATION_PERCENTILE") {
            Ok(v) => {
                let p = v
                    .parse::<f64>()
                    .context("NAVIGATION_PERCENTILE must be a number")?;
                if !(0.0..=100.0).contains(&p) {
                    tracing::warn!(
                        "NAVIGATION_PERCENTILE {p} is outside 0..=100, falling back to {}",
                        defaults.navigation_percentile
                    );
                    defaults.navigation_percentile
                } else {
                    p
                }
            }
            Err(_) => defaults.navigation_percentile,
        };

        let reporting = ReportingConfig {
            utc_offset_minutes,
            default_days,
            max_days,
            navigation_calculate,
            navigation_percentile,
        };
        reporting.timezone()?;

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            reporting,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reporting_defaults() {
        let reporting = ReportingConfig::default();
        let options = reporting.reduce_options().unwrap();

        assert_eq!(reporting.default_days, 30);
        assert_eq!(reporting.max_days, 366);
        assert_eq!(options.timezone.local_minus_utc(), 0);
        assert_eq!(options.navigation.calculate, vec![Statistic::Median]);
        assert_eq!(options.navigation.percentile, 95.0);
    }

    #[test]
    fn test_reporting_timezone_offset() {
        let reporting = ReportingConfig {
            utc_offset_minutes: -300,
            ..Default::default()
        };
        assert_eq!(reporting.timezone().unwrap().local_minus_utc(), -18_000);

        let invalid = ReportingConfig {
            utc_offset_minutes: 24 * 60,
            ..Default::default()
        };
        assert!(invalid.timezone().is_err());

        let overflowing = ReportingConfig {
            utc_offset_minutes: i32::MAX,
            ..Default::default()
        };
        assert!(overflowing.timezone().is_err());
    }
}
