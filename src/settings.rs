use config::{Config, ConfigError, File};
use serde::Deserialize;
use std::env;

use crate::types::{Asset, Chain, TypeError};

#[derive(Debug, Deserialize, Clone)]
pub struct Ledger {
    /// The ledger's base asset; every pool pairs it with one external asset.
    #[serde(default = "default_base_asset")]
    pub base_asset: String,
    /// Chain used to qualify abbreviated asset symbols in memos.
    #[serde(default = "default_chain_code")]
    pub default_chain: String,
    /// Chains the node accepts observations from at genesis; further chains
    /// register on first observation.
    #[serde(default = "default_supported_chains")]
    pub supported_chains: Vec<String>,
    /// Fixed network fee charged to a pool's base balance when a swap is
    /// rejected, in smallest units.
    #[serde(default = "default_network_fee")]
    pub network_fee: u64,
    /// Tolerance band for follow-on stake ratios, in basis points.
    #[serde(default = "default_max_stake_ratio_deviation_bps")]
    pub max_stake_ratio_deviation_bps: u64,
}

fn default_base_asset() -> String {
    "BNB.RUNE-B1A".to_string()
}
fn default_chain_code() -> String {
    "BNB".to_string()
}
fn default_supported_chains() -> Vec<String> {
    vec!["BNB".to_string()]
}
fn default_network_fee() -> u64 {
    100_000_000 // one whole base unit
}
fn default_max_stake_ratio_deviation_bps() -> u64 {
    1_000 // 10%
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            base_asset: default_base_asset(),
            default_chain: default_chain_code(),
            supported_chains: default_supported_chains(),
            network_fee: default_network_fee(),
            max_stake_ratio_deviation_bps: default_max_stake_ratio_deviation_bps(),
        }
    }
}

impl Ledger {
    pub fn parsed_base_asset(&self) -> Result<Asset, TypeError> {
        self.base_asset.parse()
    }

    pub fn parsed_default_chain(&self) -> Result<Chain, TypeError> {
        self.default_chain.parse()
    }

    pub fn parsed_supported_chains(&self) -> Result<Vec<Chain>, TypeError> {
        self.supported_chains.iter().map(|c| c.parse()).collect()
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[default]
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_metrics_port() -> u16 {
    9184
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    #[serde(default)]
    pub ledger: Ledger,
    #[serde(default)]
    pub log: LogSettings,
    #[serde(default)]
    pub metrics: Metrics,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("Config.toml").required(false))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Environment variable overrides
        if let Ok(raw) = env::var("LEDGER_BASE_ASSET") {
            if !raw.trim().is_empty() {
                settings.ledger.base_asset = raw.trim().to_string();
            }
        }
        if let Ok(raw) = env::var("LEDGER_DEFAULT_CHAIN") {
            if !raw.trim().is_empty() {
                settings.ledger.default_chain = raw.trim().to_string();
            }
        }
        if let Ok(raw) = env::var("LEDGER_SUPPORTED_CHAINS") {
            if let Some(list) = parse_string_list(&raw) {
                if !list.is_empty() {
                    settings.ledger.supported_chains = list;
                }
            }
        }
        if let Ok(raw) = env::var("LEDGER_NETWORK_FEE") {
            match raw.trim().parse::<u64>() {
                Ok(fee) => settings.ledger.network_fee = fee,
                Err(e) => eprintln!("Failed to parse LEDGER_NETWORK_FEE: {e}"),
            }
        }

        Ok(settings)
    }
}

/// Accepts either a JSON array or a comma-separated list.
fn parse_string_list(input: &str) -> Option<Vec<String>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Some(vec![]);
    }

    if trimmed.starts_with('[') {
        if let Ok(v) = serde_json::from_str::<Vec<String>>(trimmed) {
            return Some(v);
        }
    }

    let parts: Vec<String> = trimmed
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .map(|s| s.trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
        .collect();
    Some(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_a_config_file() {
        let settings = Settings::default();
        assert_eq!(
            settings.ledger.parsed_base_asset().unwrap().to_string(),
            "BNB.RUNE-B1A"
        );
        assert_eq!(
            settings.ledger.parsed_default_chain().unwrap().as_str(),
            "BNB"
        );
        assert_eq!(settings.ledger.network_fee, 100_000_000);
    }

    #[test]
    fn string_lists_parse_both_shapes() {
        assert_eq!(
            parse_string_list(r#"["BNB","BTC"]"#).unwrap(),
            vec!["BNB".to_string(), "BTC".to_string()]
        );
        assert_eq!(
            parse_string_list("BNB, BTC").unwrap(),
            vec!["BNB".to_string(), "BTC".to_string()]
        );
        assert!(parse_string_list("").unwrap().is_empty());
    }
}
