use std::path::PathBuf;

use clap::Parser;

/// `apexd` process configuration: ledger location, wire limits, and the
/// economic constants the ledger bootstraps new agents with.
#[derive(Debug, Clone, Parser)]
#[command(name = "apexd", version, about = "APEX financial control plane for autonomous-agent tool calls")]
pub struct ApexConfig {
    /// Directory holding the ledger snapshot, WAL, and lock file.
    #[arg(long, env = "APEX_LEDGER_PATH", default_value = "apex-data")]
    pub ledger_path: PathBuf,

    /// Path to the hook manifest JSON file.
    #[arg(long, env = "APEX_HOOK_MANIFEST", default_value = "apex-server/config/hooks.json")]
    pub hook_manifest: PathBuf,

    /// Path to the append-only hash-chained audit log.
    #[arg(long, env = "APEX_AUDIT_LOG", default_value = "apex-data/audit.log")]
    pub audit_log: PathBuf,

    /// Seconds an active request may remain unresolved before it is marked
    /// timed out.
    #[arg(long, env = "APEX_REQUEST_TTL_SECONDS", default_value_t = 60)]
    pub request_ttl_seconds: u64,

    /// Cadence of the background registry timeout sweep.
    #[arg(long, env = "APEX_TIMEOUT_SWEEP_INTERVAL_SECONDS", default_value_t = 5)]
    pub timeout_sweep_interval_seconds: u64,

    /// Seconds a terminal registry entry is retained before eviction.
    #[arg(long, env = "APEX_RETENTION_SECONDS", default_value_t = 30)]
    pub retention_seconds: u64,

    /// Maximum size, in bytes, of one NDJSON-framed message.
    #[arg(long, env = "APEX_MAX_MESSAGE_SIZE_BYTES", default_value_t = 512 * 1024)]
    pub max_message_size_bytes: usize,

    /// Capacity, in bytes, of the inbound framing buffer.
    #[arg(long, env = "APEX_BUFFER_SIZE_BYTES", default_value_t = 2 * 1024 * 1024)]
    pub buffer_size_bytes: usize,

    /// Fraction of `buffer_size_bytes` at which `server/busy` is emitted.
    #[arg(long, env = "APEX_BACKPRESSURE_THRESHOLD_RATIO", default_value_t = 0.90)]
    pub backpressure_threshold_ratio: f64,

    /// Per-token tax rate `mu` applied by the compensation formula.
    #[arg(long, env = "APEX_TOKEN_TAX_RATE", default_value_t = 0.01)]
    pub token_tax_rate: f64,

    /// Starting balance credited to a newly created agent.
    #[arg(long, env = "APEX_INITIAL_AGENT_BALANCE", default_value_t = 100)]
    pub initial_agent_balance: i64,

    /// Starting balance of the system bank account.
    #[arg(long, env = "APEX_INITIAL_BANK_BALANCE", default_value_t = 10_000)]
    pub initial_bank_balance: i64,

    /// Default per-agent debt ceiling (always <= 0).
    #[arg(long, env = "APEX_DEBT_CEILING_DEFAULT", default_value_t = -100)]
    pub debt_ceiling_default: i64,

    /// Per-hook execution budget, in milliseconds, before it is treated as
    /// timed out.
    #[arg(long, env = "APEX_HOOK_BUDGET_MS", default_value_t = 500)]
    pub hook_budget_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_external_interface_table() {
        let config = ApexConfig::parse_from(["apexd"]);
        assert_eq!(config.request_ttl_seconds, 60);
        assert_eq!(config.timeout_sweep_interval_seconds, 5);
        assert_eq!(config.max_message_size_bytes, 512 * 1024);
        assert_eq!(config.buffer_size_bytes, 2 * 1024 * 1024);
        assert_eq!(config.initial_agent_balance, 100);
        assert_eq!(config.initial_bank_balance, 10_000);
        assert_eq!(config.debt_ceiling_default, -100);
    }
}
