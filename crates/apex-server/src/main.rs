mod config;

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use apex_dispatcher::{Dispatcher, DispatcherConfig, FramingConfig, SimulatedSandbox, ToolSandbox};
use apex_hooks::hooks::{
    AuditHook, FiscalContextHook, MemoryContextHook, OutputSanitizationHook, PermissionHook,
    ResourceMeteringHook, RetryDecisionHook, StaticAnalysisHook,
};
use apex_hooks::{Hook, HookManifest, Pipeline};
use apex_ledger::{Ledger, LedgerConfig};
use apex_types::Money;

use config::ApexConfig;

/// Ledger file lock already held by another process.
const EXIT_LOCK_HELD: u8 = 10;
/// WAL replay failed during bootstrap.
const EXIT_WAL_REPLAY_FAILURE: u8 = 11;
/// Snapshot was corrupt, or any other startup failure not covered by the
/// two codes above (hook manifest errors, audit log I/O).
const EXIT_SNAPSHOT_CORRUPT: u8 = 12;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "apex_server=info,info".to_string()))
        .init();
}

fn builtin_hooks(audit: AuditHook) -> HashMap<String, Arc<dyn Hook>> {
    let mut hooks: HashMap<String, Arc<dyn Hook>> = HashMap::new();
    hooks.insert("fiscal_context".to_string(), Arc::new(FiscalContextHook));
    hooks.insert("memory_context".to_string(), Arc::new(MemoryContextHook));
    hooks.insert("static_analysis".to_string(), Arc::new(StaticAnalysisHook));
    hooks.insert(
        "resource_metering".to_string(),
        Arc::new(ResourceMeteringHook::default()),
    );
    hooks.insert("permission".to_string(), Arc::new(PermissionHook));
    hooks.insert(
        "output_sanitization".to_string(),
        Arc::new(OutputSanitizationHook),
    );
    hooks.insert("retry_decision".to_string(), Arc::new(RetryDecisionHook));
    hooks.insert("audit".to_string(), Arc::new(audit));
    hooks
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let config = ApexConfig::parse();

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(StartupError::LockHeld) => {
            error!("ledger lock already held by another apexd process");
            ExitCode::from(EXIT_LOCK_HELD)
        }
        Err(StartupError::WalReplayFailure(msg)) => {
            error!(error = %msg, "WAL replay failed");
            ExitCode::from(EXIT_WAL_REPLAY_FAILURE)
        }
        Err(StartupError::SnapshotCorrupt(msg)) => {
            error!(error = %msg, "ledger snapshot corrupt");
            ExitCode::from(EXIT_SNAPSHOT_CORRUPT)
        }
        Err(StartupError::ManifestInvalid(msg)) => {
            error!(error = %msg, "hook manifest invalid");
            ExitCode::from(EXIT_SNAPSHOT_CORRUPT)
        }
        Err(StartupError::Other(msg)) => {
            error!(error = %msg, "startup failed");
            ExitCode::from(EXIT_SNAPSHOT_CORRUPT)
        }
    }
}

enum StartupError {
    LockHeld,
    WalReplayFailure(String),
    SnapshotCorrupt(String),
    ManifestInvalid(String),
    Other(String),
}

async fn run(config: ApexConfig) -> Result<(), StartupError> {
    let ledger = Ledger::bootstrap(LedgerConfig {
        root: config.ledger_path.clone(),
        initial_bank_balance: Money::from_apx(config.initial_bank_balance),
        initial_agent_balance: Money::from_apx(config.initial_agent_balance),
        default_debt_ceiling: Money::from_apx(config.debt_ceiling_default),
    })
    .await
    .map_err(|e| match e {
        apex_ledger::LedgerError::LockHeld => StartupError::LockHeld,
        apex_ledger::LedgerError::ReplayFailure(msg) => StartupError::WalReplayFailure(msg),
        apex_ledger::LedgerError::SnapshotCorrupt(msg) => StartupError::SnapshotCorrupt(msg),
        other => StartupError::Other(other.to_string()),
    })?;
    info!(path = %config.ledger_path.display(), "ledger bootstrapped");

    let manifest = HookManifest::load_from_file(&config.hook_manifest)
        .await
        .map_err(|e| StartupError::ManifestInvalid(e.to_string()))?;

    let audit = AuditHook::open(config.audit_log.clone())
        .await
        .map_err(|e| StartupError::Other(e.to_string()))?;

    let pipeline = Pipeline::new(&manifest, builtin_hooks(audit))
        .map_err(|e| StartupError::ManifestInvalid(e.to_string()))?
        .with_hook_budget(std::time::Duration::from_millis(config.hook_budget_ms));

    let sandbox: Arc<dyn ToolSandbox> = Arc::new(SimulatedSandbox::new());

    let dispatcher = Dispatcher::new(
        Arc::new(ledger),
        Arc::new(pipeline),
        sandbox,
        DispatcherConfig {
            framing: FramingConfig {
                max_message_size: config.max_message_size_bytes,
                buffer_size: config.buffer_size_bytes,
                backpressure_threshold_ratio: config.backpressure_threshold_ratio,
            },
            request_ttl: std::time::Duration::from_secs(config.request_ttl_seconds),
            sweep_interval: std::time::Duration::from_secs(config.timeout_sweep_interval_seconds),
            retention: std::time::Duration::from_secs(config.retention_seconds),
            token_tax_rate: config.token_tax_rate,
        },
    );

    info!("apexd serving on stdio");
    dispatcher
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
        .map_err(|e| StartupError::Other(e.to_string()))?;

    Ok(())
}
