// src/config.rs
use crate::application::sweep::SweepConfig;
use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::StockListing;
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::path::Path;

/// Paper broker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Demo account seeding
    pub account: AccountConfig,

    /// Quote provider endpoint
    pub quotes: QuoteConfig,

    /// Sweep scheduler settings
    pub sweep: SweepSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Demo account configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Display name of the single demo user
    pub user_name: String,

    /// Starting cash balance
    pub starting_cash: Decimal,

    /// Instruments to seed the stock catalog with
    pub watchlist: Vec<StockListing>,
}

/// Quote provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteConfig {
    /// Base URL of the REST quote provider
    pub base_url: String,
}

/// Sweep scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Seconds between sweep ticks
    pub interval_secs: u64,

    /// Concurrent per-order evaluations per tick
    pub workers: usize,

    /// Per-order quote fetch timeout in seconds
    pub quote_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl From<&SweepSettings> for SweepConfig {
    fn from(settings: &SweepSettings) -> Self {
        SweepConfig {
            interval_secs: settings.interval_secs,
            workers: settings.workers,
            quote_timeout_secs: settings.quote_timeout_secs,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let account = AccountConfig {
            user_name: env::var("DEMO_USER_NAME").unwrap_or_else(|_| "demo".to_string()),
            starting_cash: env::var("STARTING_CASH")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()
                .unwrap_or(Decimal::new(100_000, 0)),
            watchlist: parse_watchlist(
                &env::var("WATCHLIST")
                    .unwrap_or_else(|_| "RELIANCE:NSE,TCS:NSE,INFY:NSE".to_string()),
            ),
        };

        let quotes = QuoteConfig {
            base_url: env::var("QUOTE_API_BASE")
                .unwrap_or_else(|_| "https://quotes.example.com/api".to_string()),
        };

        let sweep = SweepSettings {
            interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap_or(5),
            workers: env::var("SWEEP_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .unwrap_or(4),
            quote_timeout_secs: env::var("QUOTE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .unwrap_or(3),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: env::var("LOG_TO_FILE")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        Ok(Config {
            account,
            quotes,
            sweep,
            logging,
        })
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| AppError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path)
                    .map_err(|e| AppError::Config(format!("Failed to create log file: {}", e)))?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.init();

        Ok(())
    }
}

/// Parse a comma-separated "SYMBOL:EXCHANGE" watchlist, e.g. "TCS:NSE,INFY:NSE".
fn parse_watchlist(raw: &str) -> Vec<StockListing> {
    raw.split(',')
        .filter_map(|entry| {
            let entry = entry.trim();
            if entry.is_empty() {
                return None;
            }
            let (symbol, exchange) = entry.split_once(':')?;
            Some(StockListing::new(symbol.trim(), exchange.trim()))
        })
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            account: AccountConfig {
                user_name: "demo".to_string(),
                starting_cash: Decimal::new(100_000, 0),
                watchlist: parse_watchlist("RELIANCE:NSE,TCS:NSE,INFY:NSE"),
            },
            quotes: QuoteConfig {
                base_url: "https://quotes.example.com/api".to_string(),
            },
            sweep: SweepSettings {
                interval_secs: 5,
                workers: 4,
                quote_timeout_secs: 3,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchlist_parsing() {
        let listings = parse_watchlist("tcs:nse, infy:NSE ,,BAD");
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].symbol, "TCS");
        assert_eq!(listings[0].exchange, "NSE");
        assert_eq!(listings[1].symbol, "INFY");
    }
}
