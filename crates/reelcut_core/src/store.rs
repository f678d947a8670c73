use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{CoreError, Result};
use crate::types::JobId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Running,
    Done,
    Failed { kind: String, message: String },
}

impl JobState {
    fn name(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Done => "done",
            JobState::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Job states keyed by id. Every transition happens under one lock.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: Mutex<BTreeMap<JobId, JobState>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from JSON. A missing file is an empty store.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::new());
        }
        let data = std::fs::read_to_string(path)?;
        let jobs: BTreeMap<JobId, JobState> = serde_json::from_str(&data)?;
        Ok(Self {
            jobs: Mutex::new(jobs),
        })
    }

    /// Save as pretty JSON, replacing the previous file in one rename.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Register a job as pending. Returns false if the id is already known.
    pub fn enqueue(&self, id: JobId) -> bool {
        let mut jobs = self.lock();
        if jobs.contains_key(&id) {
            return false;
        }
        jobs.insert(id, JobState::Pending);
        true
    }

    pub fn start(&self, id: JobId) -> Result<()> {
        self.transition(id, JobState::Running, |s| matches!(s, JobState::Pending))
    }

    pub fn finish(&self, id: JobId) -> Result<()> {
        self.transition(id, JobState::Done, |s| matches!(s, JobState::Running))
    }

    pub fn fail(&self, id: JobId, kind: impl Into<String>, message: impl Into<String>) -> Result<()> {
        let failed = JobState::Failed {
            kind: kind.into(),
            message: message.into(),
        };
        self.transition(id, failed, |s| matches!(s, JobState::Running))
    }

    /// Put a failed job back in the queue; retries always cover the whole job.
    pub fn requeue(&self, id: JobId) -> Result<()> {
        self.transition(id, JobState::Pending, |s| matches!(s, JobState::Failed { .. }))
    }

    /// Jobs left `running` by a runner that died are made pending again.
    pub fn recover_interrupted(&self) -> usize {
        let mut jobs = self.lock();
        let mut recovered = 0;
        for state in jobs.values_mut() {
            if *state == JobState::Running {
                *state = JobState::Pending;
                recovered += 1;
            }
        }
        recovered
    }

    pub fn get(&self, id: JobId) -> Option<JobState> {
        self.lock().get(&id).cloned()
    }

    pub fn pending(&self) -> Vec<JobId> {
        self.lock()
            .iter()
            .filter(|(_, s)| **s == JobState::Pending)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn snapshot(&self) -> BTreeMap<JobId, JobState> {
        self.lock().clone()
    }

    fn transition(
        &self,
        id: JobId,
        to: JobState,
        allowed: impl Fn(&JobState) -> bool,
    ) -> Result<()> {
        let mut jobs = self.lock();
        let current = jobs.get_mut(&id).ok_or(CoreError::JobNotFound(id))?;
        if !allowed(current) {
            return Err(CoreError::InvalidTransition {
                id,
                from: current.clone(),
                to: to.name(),
            });
        }
        *current = to;
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<JobId, JobState>> {
        // Each transition is a single assignment, so a poisoned map is still consistent.
        self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
