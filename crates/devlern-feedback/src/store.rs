//! Where an agent persists its policy.

use crate::error::Result;
use devlern_core::ActionCatalog;
use devlern_qlearn::{QTable, TableStore};
use std::path::PathBuf;

/// Durable storage for a policy of type `P`.
pub trait PolicyStore<P> {
    /// Full save, called at the end of every episode.
    fn save(&self, policy: &P, catalog: &ActionCatalog) -> Result<()>;
    /// Human-readable export only; returns the written path.
    fn export(&self, policy: &P, catalog: &ActionCatalog) -> Result<PathBuf>;
}

impl PolicyStore<QTable> for TableStore {
    fn save(&self, policy: &QTable, catalog: &ActionCatalog) -> Result<()> {
        TableStore::save(self, policy, catalog)?;
        Ok(())
    }

    fn export(&self, policy: &QTable, catalog: &ActionCatalog) -> Result<PathBuf> {
        self.export_tabular(policy, catalog)?;
        Ok(self.tabular_path())
    }
}
