//! Persistent dependency caches
//!
//! Dependency work is keyed by the content of dependency declarations
//! alone. A volume counts as warm for a key only when the ledger says
//! `complete` for that exact key and the volume still exists.
//!
//! # Cache States
//!
//! | State | Meaning |
//! |-------|---------|
//! | (no entry) | Never warmed |
//! | building | Warm-up started, not finished; redone next run |
//! | complete | Warm for the recorded key |

pub mod ledger;
pub mod volume;

pub use ledger::{CacheLedger, LedgerEntry, LEDGER_FILE};
pub use volume::{labels, CacheKind, CacheState, CacheVolume, CacheVolumes, VOLUME_PREFIX};

use crate::error::{DrydockError, DrydockResult};
use crate::orchestration::{ContainerRuntime, Environment};
use tokio::sync::Mutex;
use tracing::info;

/// Whether a dependency step had to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Volume already warm for the key; nothing ran
    Hit,
    /// The warm-up command ran
    Warmed,
}

/// Run `command` to fill `volume` for `key`, unless it is already warm.
///
/// The ledger is marked `building` before the command and `complete` only
/// after it succeeds, so an interrupted warm-up is redone next time.
pub async fn warm_cache(
    runtime: &dyn ContainerRuntime,
    ledger: &Mutex<CacheLedger>,
    volume: &CacheVolume,
    key: &str,
    env: &Environment,
    command: &[String],
    stage: &str,
) -> DrydockResult<CacheOutcome> {
    let recorded = ledger.lock().await.is_complete(&volume.name, key);
    if recorded && runtime.volume_exists(&volume.name).await? {
        info!("{}: cache hit on {} ({})", stage, volume.kind, key);
        return Ok(CacheOutcome::Hit);
    }

    {
        let mut ledger = ledger.lock().await;
        ledger.mark(&volume.name, key, CacheState::Building);
        ledger.save().await?;
    }

    info!("{}: warming {} for {}", stage, volume.kind, key);
    let result = runtime.exec(env, command).await?;
    if !result.success() {
        return Err(DrydockError::Compilation {
            stage: stage.to_string(),
            output: result.tail(),
        });
    }

    let mut ledger = ledger.lock().await;
    ledger.mark(&volume.name, key, CacheState::Complete);
    ledger.save().await?;
    Ok(CacheOutcome::Warmed)
}
