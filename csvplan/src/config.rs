//! Settings read from the environment.
//!
//! | Variable | Meaning | Default |
//! |----------|---------|---------|
//! | `CSVPLAN_LOG` | log filter directive | `info` |
//! | `CSVPLAN_LOG_FORMAT` | `pretty`, `compact` or `json` | `pretty` |
//! | `CSVPLAN_ENCODING` | input encoding | auto-detect |
//! | `CSVPLAN_DELIMITER` | input delimiter, one character (`tab` accepted) | auto-detect |
//! | `CSVPLAN_SKIP_UNKNOWN` | skip unknown plan record types | `false` |
//!
//! The binary loads `.env` first, so these can live there too.

use encoding_rs::Encoding;

use crate::error::{ConfigError, ConfigResult};
use crate::logs::{validate_filter, LogConfig, LogFormat};
use crate::parser::ReadOptions;
use crate::transform::dsl::PlanOptions;

pub const ENV_LOG: &str = "CSVPLAN_LOG";
pub const ENV_LOG_FORMAT: &str = "CSVPLAN_LOG_FORMAT";
pub const ENV_ENCODING: &str = "CSVPLAN_ENCODING";
pub const ENV_DELIMITER: &str = "CSVPLAN_DELIMITER";
pub const ENV_SKIP_UNKNOWN: &str = "CSVPLAN_SKIP_UNKNOWN";

/// Process-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub log_filter: String,
    pub log_format: LogFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<u8>,
    pub skip_unknown: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            log_format: LogFormat::default(),
            encoding: None,
            delimiter: None,
            skip_unknown: false,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Read settings from `(name, value)` pairs; unrelated names are ignored.
    pub fn from_vars<I, K, V>(vars: I) -> ConfigResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut settings = Settings::default();
        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            match key.as_ref() {
                ENV_LOG => {
                    validate_filter(&value).map_err(|message| invalid(ENV_LOG, &value, message))?;
                    settings.log_filter = value;
                }
                ENV_LOG_FORMAT => {
                    settings.log_format = value
                        .parse()
                        .map_err(|message| invalid(ENV_LOG_FORMAT, &value, message))?;
                }
                ENV_ENCODING => {
                    settings.encoding = Some(
                        parse_encoding(&value).map_err(|message| invalid(ENV_ENCODING, &value, message))?,
                    );
                }
                ENV_DELIMITER => {
                    settings.delimiter = Some(
                        parse_delimiter(&value).map_err(|message| invalid(ENV_DELIMITER, &value, message))?,
                    );
                }
                ENV_SKIP_UNKNOWN => {
                    settings.skip_unknown = parse_flag(&value)
                        .map_err(|message| invalid(ENV_SKIP_UNKNOWN, &value, message))?;
                }
                _ => {}
            }
        }
        Ok(settings)
    }

    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            filter: self.log_filter.clone(),
            format: self.log_format,
            ..LogConfig::default()
        }
    }

    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            encoding: self.encoding.clone(),
            delimiter: self.delimiter,
        }
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            skip_unknown: self.skip_unknown,
        }
    }
}

fn invalid(key: &'static str, value: &str, message: String) -> ConfigError {
    ConfigError {
        key,
        value: value.to_string(),
        message,
    }
}

/// Accept any label `encoding_rs` knows, plus `latin-1` spellings.
pub fn parse_encoding(value: &str) -> Result<String, String> {
    let label = value.trim().to_lowercase();
    if matches!(label.as_str(), "latin-1" | "latin1" | "iso-8859-1" | "utf-8" | "utf8") {
        return Ok(label);
    }
    Encoding::for_label(label.as_bytes())
        .map(|_| label.clone())
        .ok_or_else(|| format!("unknown encoding '{label}'"))
}

/// One single-byte character, or `tab`.
pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    if value.eq_ignore_ascii_case("tab") || value == "\\t" {
        return Ok(b'\t');
    }
    match value.as_bytes() {
        [b] if b.is_ascii() && *b != b'"' && *b != b'\n' && *b != b'\r' => Ok(*b),
        _ => Err("expected a single ASCII character".to_string()),
    }
}

fn parse_flag(value: &str) -> Result<bool, String> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err("expected true or false".to_string()),
    }
}
