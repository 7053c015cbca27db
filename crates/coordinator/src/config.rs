//! `EngineConfig`: every configuration option spec.md §6 recognizes,
//! loaded via the `config` crate layered over environment variables —
//! the same `config::Config::builder().add_source(...)` shape as
//! `IndexerConfig::load`.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Local,
    Testnet,
    Production,
    Mainnet,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Local => "local",
            Mode::Testnet => "testnet",
            Mode::Production => "production",
            Mode::Mainnet => "mainnet",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub address: String,
    #[serde(default)]
    pub skills: HashSet<String>,
    #[serde(default = "default_min_fee")]
    pub min_fee: Decimal,
    #[serde(default = "default_stake")]
    pub stake: Decimal,
    #[serde(default)]
    pub response_time: Option<String>,
    #[serde(rename = "meshGroupId")]
    pub mesh_group_id: String,
    #[serde(default)]
    pub reply_chat: Option<String>,
    #[serde(default)]
    pub operator_chat_id: Option<String>,

    #[serde(default)]
    pub contract_address: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: Mode,
    #[serde(default)]
    pub strict_chain: Option<bool>,
    #[serde(default)]
    pub allow_local_reputation_fallback: Option<bool>,
    #[serde(default)]
    pub auto_register_on_start: bool,

    #[serde(default = "default_true")]
    pub wait_for_deadline: bool,
    #[serde(default = "default_true")]
    pub enable_scheduler: bool,
    #[serde(default = "default_scheduler_interval_ms")]
    pub scheduler_interval_ms: u64,
    #[serde(default = "default_expiry_sweep_interval_ms")]
    pub expiry_sweep_interval_ms: u64,

    #[serde(default = "default_send_retries")]
    pub send_retries: u32,
    #[serde(default = "default_send_retry_base_ms")]
    pub send_retry_base_ms: u64,

    #[serde(default = "default_max_intent_deadline_seconds")]
    pub max_intent_deadline_seconds: i64,
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_service_role_key: Option<String>,
}

fn default_min_fee() -> Decimal {
    Decimal::ZERO
}

fn default_stake() -> Decimal {
    Decimal::ZERO
}

fn default_mode() -> Mode {
    Mode::Local
}

fn default_true() -> bool {
    true
}

fn default_scheduler_interval_ms() -> u64 {
    1000
}

fn default_expiry_sweep_interval_ms() -> u64 {
    1000
}

fn default_send_retries() -> u32 {
    2
}

fn default_send_retry_base_ms() -> u64 {
    150
}

fn default_max_intent_deadline_seconds() -> i64 {
    3600
}

fn default_max_payload_bytes() -> usize {
    16_384
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backend {
    Postgres,
    Memory,
}

impl EngineConfig {
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let cfg = config::Config::builder()
            .add_source(config::Environment::default().try_parsing(true).separator("__"))
            .build()?;
        cfg.try_deserialize()
    }

    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        Self::load()
    }

    /// `sendRetryBaseMs` floored at its spec-mandated minimum of 50ms.
    pub fn effective_send_retry_base_ms(&self) -> u64 {
        self.send_retry_base_ms.max(50)
    }

    /// `schedulerIntervalMs` floored at its spec-mandated minimum of
    /// 250ms.
    pub fn effective_scheduler_interval_ms(&self) -> u64 {
        self.scheduler_interval_ms.max(250)
    }

    pub fn backend(&self) -> Backend {
        if self.database_url.is_some() {
            Backend::Postgres
        } else {
            Backend::Memory
        }
    }

    /// `strictChain = (mode in {production, mainnet})` unless
    /// explicitly overridden — the single authoritative gate.
    pub fn trust_mode(&self) -> mesh_reputation::TrustMode {
        let strict_chain = self
            .strict_chain
            .unwrap_or_else(|| matches!(self.mode, Mode::Production | Mode::Mainnet));
        let allow_local_fallback = self
            .allow_local_reputation_fallback
            .unwrap_or(!strict_chain);
        mesh_reputation::TrustMode {
            strict_chain,
            allow_local_fallback,
        }
    }
}
