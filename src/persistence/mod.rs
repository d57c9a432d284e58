//! Balance snapshot persistence
//!
//! Features:
//! - Versioned JSON envelope
//! - LocalStorage on web, a plain file natively
//! - Unknown versions and corrupt data are rejected, never half-loaded

use serde::{Deserialize, Serialize};

use crate::error::{PlinkoError, Result};
use crate::money::Amount;

/// Current envelope version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Balance at the end of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub version: u32,
    pub balance: Amount,
    /// Milliseconds since the Unix epoch
    pub saved_at_ms: u64,
}

impl BalanceSnapshot {
    /// LocalStorage key
    pub const STORAGE_KEY: &'static str = "plinko_balance";

    pub fn new(balance: Amount) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            balance,
            saved_at_ms: now_ms(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| PlinkoError::snapshot(format!("Failed to encode snapshot: {}", e)))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)
            .map_err(|e| PlinkoError::snapshot(format!("Corrupt snapshot: {}", e)))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(PlinkoError::snapshot(format!(
                "Unsupported snapshot version {}",
                snapshot.version
            )));
        }
        if snapshot.balance < Amount::ZERO {
            return Err(PlinkoError::snapshot("Negative balance in snapshot"));
        }
        Ok(snapshot)
    }

    /// Load the snapshot from LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn load() -> Option<Self> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()?;
        let json = storage.get_item(Self::STORAGE_KEY).ok().flatten()?;
        match Self::from_json(&json) {
            Ok(snapshot) => {
                log::info!("Loaded balance snapshot: {}", snapshot.balance);
                Some(snapshot)
            }
            Err(e) => {
                log::warn!("Ignoring stored balance: {}", e);
                None
            }
        }
    }

    /// Save the snapshot to LocalStorage (WASM only)
    #[cfg(target_arch = "wasm32")]
    pub fn save(&self) -> Result<()> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok())
            .flatten()
            .ok_or_else(|| PlinkoError::snapshot("LocalStorage unavailable"))?;
        storage
            .set_item(Self::STORAGE_KEY, &self.to_json()?)
            .map_err(|e| PlinkoError::snapshot(format!("Failed to store snapshot: {:?}", e)))?;
        log::info!("Balance snapshot saved");
        Ok(())
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            PlinkoError::snapshot(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        std::fs::write(path, self.to_json()?).map_err(|e| {
            PlinkoError::snapshot(format!("Failed to write {}: {}", path.display(), e))
        })?;
        log::info!("Balance snapshot written to {}", path.display());
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
fn now_ms() -> u64 {
    js_sys::Date::now() as u64
}

#[cfg(not(target_arch = "wasm32"))]
fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
