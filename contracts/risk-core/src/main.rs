//! vaultguard-sim: runs the stress scenarios against a fresh risk core.
//!
//! Usage: `vaultguard-sim [config.toml]`. Without a path the default
//! configuration is used.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info, warn};

use vaultguard_risk_core::{
    common::RiskConfig,
    stress::{run_all, DEFAULT_SCENARIOS},
};

fn load_config(path: Option<PathBuf>) -> anyhow::Result<RiskConfig> {
    let Some(path) = path else {
        info!("no config path given, using defaults");
        return Ok(RiskConfig::default());
    };

    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config = RiskConfig::from_toml_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = load_config(std::env::args_os().nth(1).map(PathBuf::from))?;

    let mut broken = 0;
    for (scenario, result) in run_all(&config, &DEFAULT_SCENARIOS) {
        match result {
            Ok(report) if report.invariants_hold => info!(
                ?scenario,
                paused = report.paused,
                breaker_tripped = report.breaker_tripped,
                emergency = report.emergency_activated,
                final_price = ?report.final_price,
                confidence_bps = ?report.confidence_bps,
                queued = report.queued_redemptions,
                rejected = report.rejected_redemptions,
                released = report.released_amount,
                oracle_failures = report.oracle_failures,
                oracle_failed_rounds = report.oracle_failed_rounds,
                events = report.events_emitted,
                "scenario report"
            ),
            Ok(report) => {
                broken += 1;
                warn!(?scenario, ?report, "invariants violated");
            }
            Err(e) => {
                broken += 1;
                error!(?scenario, error = %e, "scenario aborted");
            }
        }
    }

    anyhow::ensure!(broken == 0, "{broken} scenario(s) failed");
    info!("all scenarios passed");
    Ok(())
}
