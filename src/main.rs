use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use config_store::Store;
use fleet_sync::{FleetSyncEngine, RosterPaths};
use forge_client::{ForgeClient, ForgeConfig};
use orchestrator::{RunContext, run_validation};

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file when present.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(env_or("LOG_LEVEL", "info"))),
        )
        .init();

    let store = Store::open(PathBuf::from(env_or(
        "DRIFTGUARD_DB",
        "config_data/driftguard.db",
    )))
    .context("opening store")?;

    let forge = ForgeClient::new(ForgeConfig::new(
        std::env::var("GITLAB_API_URL").context("GITLAB_API_URL is required")?,
        std::env::var("GITLAB_TOKEN").context("GITLAB_TOKEN is required")?,
    ))
    .context("building forge client")?;

    let git = git_ops::GitCredentials::from_env();
    let llm = Arc::new(
        llm_service::LlmServiceProfiles::from_env().context("configuring llm profiles")?,
    );
    let policies = drift_engine::load_policies(Some(&PathBuf::from(env_or(
        "DRIFTGUARD_POLICIES",
        "config/policies.yaml",
    ))));

    // Keep the fleet registry aligned before any validation.
    let roster = RosterPaths::in_dir(env_or("DRIFTGUARD_CONFIG_DIR", "config"));
    let sync = FleetSyncEngine::new(forge.clone(), store.clone(), git.clone(), roster);
    let report = sync.sync().await.context("fleet sync")?;
    info!(
        no_op = report.no_op,
        added = report.added,
        branches = report.branches_created,
        "fleet sync finished"
    );

    // One-shot validation when a target is supplied.
    if let (Ok(service_id), Ok(environment)) = (
        std::env::var("DRIFTGUARD_SERVICE"),
        std::env::var("DRIFTGUARD_ENVIRONMENT"),
    ) {
        let (ctx, _cancel) = RunContext::new(store, forge, git, llm, policies);
        let outcome = run_validation(&ctx, &service_id, &environment).await?;
        info!(
            run_id = %outcome.run_id,
            score = outcome.certification.confidence_score,
            decision = ?outcome.certification.decision,
            "validation finished"
        );
    }

    Ok(())
}
