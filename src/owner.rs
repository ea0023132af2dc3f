//! Owner registry - who receives the audit stream
//!
//! The first user to `/start` the bot claims ownership; the claim is
//! persisted to a small state file so restarts keep the same owner. An
//! explicitly configured owner id always wins over the file.

use std::path::PathBuf;

use crate::Result;

pub struct OwnerRegistry {
    file: PathBuf,
    configured: Option<i64>,
    log_chat: Option<i64>,
}

impl OwnerRegistry {
    pub fn new(file: impl Into<PathBuf>, configured: Option<i64>, log_chat: Option<i64>) -> Self {
        Self {
            file: file.into(),
            configured,
            log_chat,
        }
    }

    /// Current owner, if any
    pub fn get(&self) -> Option<i64> {
        if self.configured.is_some() {
            return self.configured;
        }
        std::fs::read_to_string(&self.file)
            .ok()
            .and_then(|s| s.trim().parse().ok())
    }

    /// Persist a new owner claim
    pub fn claim(&self, user_id: i64) -> Result<()> {
        std::fs::write(&self.file, user_id.to_string())?;
        tracing::info!(user_id, "owner claimed");
        Ok(())
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.get() == Some(user_id)
    }

    /// Chat the audit stream goes to: the owner, or the legacy log group
    pub fn target_chat(&self) -> Option<i64> {
        self.get().or(self.log_chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_persists() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("owner_id.txt");

        let registry = OwnerRegistry::new(&file, None, None);
        assert_eq!(registry.get(), None);
        assert_eq!(registry.target_chat(), None);

        registry.claim(42).unwrap();
        assert_eq!(registry.get(), Some(42));
        assert!(registry.is_owner(42));
        assert!(!registry.is_owner(7));

        // A fresh registry over the same file sees the claim.
        let reloaded = OwnerRegistry::new(&file, None, None);
        assert_eq!(reloaded.get(), Some(42));
    }

    #[test]
    fn test_configured_owner_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("owner_id.txt");
        std::fs::write(&file, "42").unwrap();

        let registry = OwnerRegistry::new(&file, Some(9), None);
        assert_eq!(registry.get(), Some(9));
    }

    #[test]
    fn test_log_chat_fallback() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = OwnerRegistry::new(tmp.path().join("owner_id.txt"), None, Some(-100));
        assert_eq!(registry.target_chat(), Some(-100));
    }
}
