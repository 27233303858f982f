//! Opt-in periodic integrity check.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::chain::HashChain;
use crate::model::Verification;

/// Re-verify `chain` every `interval` until the returned task is aborted.
/// Failures are logged on every tick; nothing is repaired.
pub fn spawn_verifier(chain: Arc<HashChain>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // The first tick fires immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let chain = Arc::clone(&chain);
            match tokio::task::spawn_blocking(move || chain.verify()).await {
                Ok(verification) => report(&verification),
                Err(e) => error!("verifier task failed: {e}"),
            }
        }
    })
}

fn report(verification: &Verification) {
    match &verification.failure {
        None => debug!(checked = verification.checked, "ledger verified"),
        Some(failure) => error!(
            index = ?failure.index,
            reason = %failure.kind,
            expected = %failure.expected,
            actual = %failure.actual,
            "ledger is untrusted from this index onward"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::HashAlgorithm;
    use serde_json::json;

    #[tokio::test]
    async fn verifier_runs_alongside_appends() {
        let chain = Arc::new(HashChain::initialize(HashAlgorithm::Sha256));
        let handle = spawn_verifier(Arc::clone(&chain), Duration::from_millis(5));

        for n in 0..20 {
            chain.append(json!({ "n": n })).unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(chain.len(), 21);
        assert!(chain.verify().is_ok());
    }
}
