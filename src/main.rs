//! Application entrypoint and state wiring.

use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use code_ledger::config::Config;
use code_ledger::routes::{self, AppState};
use code_ledger::verifier::spawn_verifier;
use code_ledger::HashChain;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::parse();

    // 1) ledger
    let chain = HashChain::open(config.chain_options()).with_context(|| {
        format!("open ledger in {}", config.data_dir.display())
    })?;
    let chain = Arc::new(chain);
    let latest = chain.latest().context("ledger has no genesis record")?;
    info!(
        records = chain.len(),
        latest_digest = %latest.digest,
        algorithm = %chain.algorithm(),
        in_memory = config.in_memory,
        "ledger ready"
    );

    // 2) optional background verification
    let _verifier = config.verify_interval().map(|interval| {
        info!(?interval, "background verification enabled");
        spawn_verifier(Arc::clone(&chain), interval)
    });

    // 3) router
    let app = routes::router(AppState { chain });

    // 4) serve
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("bind {}", config.bind))?;
    info!("running on http://{}", config.bind);
    axum::serve(listener, app).await.context("serve")?;
    Ok(())
}
