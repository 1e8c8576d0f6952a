//! Configuration for aegisd
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! file, then `AEGIS_`-prefixed environment variables.

use crate::error::{DaemonError, DaemonResult};
use aegis_consensus::Specialization;
use aegis_oracle::{AnomalyThresholds, BoundingBox, SourceFormat};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Main daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AegisConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub consensus: ConsensusConfig,

    /// Validator pool; every kind needs at least `quorum` routed validators
    #[serde(default = "default_validators")]
    pub validators: Vec<ValidatorConfig>,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub oracle: OracleConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AegisConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            consensus: ConsensusConfig::default(),
            validators: default_validators(),
            dispatch: DispatchConfig::default(),
            oracle: OracleConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,

    #[serde(default = "default_true")]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8080),
            enable_cors: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub quorum: usize,
    pub threshold: f64,
    pub reward_multiplier: f64,
    pub pending_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    /// Share of the free balance one stake may take
    pub max_stake_fraction: f64,
    /// Share of the initial stake used as base stake
    pub base_stake_fraction: f64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            quorum: 3,
            threshold: 0.7,
            reward_multiplier: 1.2,
            pending_ttl_secs: 900,
            sweep_interval_secs: 60,
            max_stake_fraction: 0.5,
            base_stake_fraction: 0.1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatorConfig {
    pub id: String,
    pub specialization: Specialization,
    pub initial_stake: f64,
    /// Half-width of the confidence jitter; 0 disables it
    #[serde(default)]
    pub noise: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_validators() -> Vec<ValidatorConfig> {
    [
        ("earthquake_validator", Specialization::EarthquakeSpecialist, 10_000.0),
        ("multimodal_validator", Specialization::MultiModal, 8_000.0),
        ("social_validator", Specialization::SocialSignal, 5_000.0),
        ("general_validator", Specialization::General, 6_000.0),
    ]
    .into_iter()
    .map(|(id, specialization, initial_stake)| ValidatorConfig {
        id: id.to_string(),
        specialization,
        initial_stake,
        noise: 0.0,
        seed: None,
    })
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    pub min_accept_confidence: f64,
    pub response_allocation: u64,
    pub treasury_balance: u64,
    pub vault_balance: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            min_accept_confidence: 0.8,
            response_allocation: 2_000_000,
            treasury_balance: 10_000_000,
            vault_balance: 10_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// Start the polling network with the daemon
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub request_timeout_secs: u64,
    pub cell_degrees: f64,
    pub time_bucket_secs: i64,
    #[serde(default)]
    pub anomaly: AnomalyThresholds,
    #[serde(default)]
    pub region: Option<BoundingBox>,
    #[serde(default = "default_sources")]
    pub sources: Vec<SourceConfig>,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            request_timeout_secs: 30,
            cell_degrees: 0.1,
            time_bucket_secs: 600,
            anomaly: AnomalyThresholds::default(),
            region: Some(BoundingBox::indonesia()),
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub format: SourceFormat,
    pub url: String,
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_sources() -> Vec<SourceConfig> {
    let source = |name: &str, format, url: &str, interval_secs, enabled| SourceConfig {
        name: name.to_string(),
        format,
        url: url.to_string(),
        interval_secs,
        enabled,
    };
    vec![
        source(
            "bmkg_autogempa",
            SourceFormat::BmkgAutogempa,
            "https://data.bmkg.go.id/DataMKG/TEWS/autogempa.json",
            60,
            true,
        ),
        source(
            "usgs_earthquakes",
            SourceFormat::UsgsGeojson,
            "https://earthquake.usgs.gov/earthquakes/feed/v1.0/summary/4.5_hour.geojson",
            300,
            true,
        ),
        source(
            "petabencana_floods",
            SourceFormat::Petabencana,
            "https://data.petabencana.id/floods?admin=ID-JK&minimum_state=1",
            180,
            true,
        ),
        source(
            "firms_viirs",
            SourceFormat::FirmsCsv,
            "https://firms.modaps.eosdis.nasa.gov/data/active_fire/suomi-npp-viirs-c2/csv/SUOMI_VIIRS_C2_SouthEast_Asia_24h.csv",
            3600,
            true,
        ),
        // No public endpoint; point it at a monitor and enable it.
        source(
            "social_monitor",
            SourceFormat::SocialMonitor,
            "http://127.0.0.1:9090/social/latest",
            120,
            false,
        ),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub mailbox_capacity: usize,
    pub lifecycle_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 500,
            mailbox_capacity: 256,
            lifecycle_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AegisConfig {
    /// Load configuration: defaults, then the optional file, then `AEGIS_*`
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&AegisConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AEGIS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Reject settings the consensus and dispatch invariants cannot hold under
    pub fn validate(&self) -> DaemonResult<()> {
        let consensus = &self.consensus;
        if consensus.quorum == 0 {
            return Err(invalid("consensus.quorum must be at least 1"));
        }
        unit_interval("consensus.threshold", consensus.threshold)?;
        unit_interval("consensus.max_stake_fraction", consensus.max_stake_fraction)?;
        unit_interval("consensus.base_stake_fraction", consensus.base_stake_fraction)?;
        if !(consensus.reward_multiplier >= 1.0 && consensus.reward_multiplier.is_finite()) {
            return Err(invalid(format!(
                "consensus.reward_multiplier must be at least 1.0, got {}",
                consensus.reward_multiplier
            )));
        }
        unit_interval(
            "dispatch.min_accept_confidence",
            self.dispatch.min_accept_confidence,
        )?;

        for validator in &self.validators {
            if !(validator.initial_stake >= 0.0 && validator.initial_stake.is_finite()) {
                return Err(invalid(format!(
                    "validator {} has initial_stake {}",
                    validator.id, validator.initial_stake
                )));
            }
        }

        if self.bridge.max_attempts == 0
            || self.bridge.mailbox_capacity == 0
            || self.bridge.lifecycle_capacity == 0
        {
            return Err(invalid(
                "bridge.max_attempts, mailbox_capacity and lifecycle_capacity must be non-zero",
            ));
        }

        Ok(())
    }

    /// Push-only configuration with no pollers, used by tests
    pub fn push_only() -> Self {
        let mut config = Self::default();
        config.oracle.enabled = false;
        config
    }
}

fn invalid(message: impl Into<String>) -> DaemonError {
    DaemonError::Config(message.into())
}

fn unit_interval(name: &str, value: f64) -> DaemonResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(format!("{name} must be within [0, 1], got {value}")))
    }
}
