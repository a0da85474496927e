//! Completed jobs ledger.
//!
//! Append-only record of finished conversions. Entries are never edited;
//! the only way to remove them is a full clear.

mod memory;
mod sqlite;
mod types;

pub use memory::MemoryLedger;
pub use sqlite::SqliteLedger;
pub use types::*;

use crate::registry::FileId;

/// Trait for completed job storage.
pub trait JobLedger: Send + Sync {
    /// Record a finished job.
    fn append(&self, job: &CompletedJob) -> Result<(), LedgerError>;

    /// All recorded jobs in completion order.
    fn list(&self) -> Result<Vec<CompletedJob>, LedgerError>;

    /// Jobs recorded for one file (a file may be converted several times).
    fn for_file(&self, id: FileId) -> Result<Vec<CompletedJob>, LedgerError>;

    /// Highest file id recorded, if any.
    fn max_file_id(&self) -> Result<Option<FileId>, LedgerError>;

    /// Number of recorded jobs.
    fn len(&self) -> Result<usize, LedgerError>;

    fn is_empty(&self) -> Result<bool, LedgerError> {
        Ok(self.len()? == 0)
    }

    /// Remove every record. Returns how many were removed.
    fn clear(&self) -> Result<usize, LedgerError>;
}
