//! In-memory ledger, used when no database path is configured.

use std::sync::{Mutex, PoisonError};

use super::{CompletedJob, JobLedger, LedgerError};
use crate::registry::FileId;

#[derive(Debug, Default)]
pub struct MemoryLedger {
    jobs: Mutex<Vec<CompletedJob>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobLedger for MemoryLedger {
    fn append(&self, job: &CompletedJob) -> Result<(), LedgerError> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(job.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<CompletedJob>, LedgerError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn for_file(&self, id: FileId) -> Result<Vec<CompletedJob>, LedgerError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|job| job.id == id)
            .cloned()
            .collect())
    }

    fn max_file_id(&self) -> Result<Option<FileId>, LedgerError> {
        Ok(self
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|job| job.id)
            .max())
    }

    fn len(&self) -> Result<usize, LedgerError> {
        Ok(self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    fn clear(&self) -> Result<usize, LedgerError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = jobs.len();
        jobs.clear();
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_append_and_list_in_order() {
        let ledger = MemoryLedger::new();
        for i in 1..=3 {
            let job = CompletedJob::new(FileId::new(i), Duration::from_secs(i), "/in", "/out");
            ledger.append(&job).unwrap();
        }

        let ids: Vec<_> = ledger.list().unwrap().iter().map(|j| j.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ledger.len().unwrap(), 3);
    }

    #[test]
    fn test_for_file_and_clear() {
        let ledger = MemoryLedger::new();
        let id = FileId::new(9);
        ledger
            .append(&CompletedJob::new(id, Duration::ZERO, "/a.mov", "/a.mp4"))
            .unwrap();
        ledger
            .append(&CompletedJob::new(id, Duration::ZERO, "/a.mov", "/a.webm"))
            .unwrap();

        assert_eq!(ledger.for_file(id).unwrap().len(), 2);
        assert_eq!(ledger.max_file_id().unwrap(), Some(id));
        assert_eq!(ledger.clear().unwrap(), 2);
        assert!(ledger.is_empty().unwrap());
        assert_eq!(ledger.max_file_id().unwrap(), None);
    }
}
