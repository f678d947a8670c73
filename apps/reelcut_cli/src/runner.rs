use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context as _};
use reelcut_core::layout::{discover_jobs, JobPaths};
use reelcut_core::store::{JobState, JobStore};
use reelcut_core::types::JobId;
use reelcut_render::{CancelToken, ReelPipeline};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub uploads: PathBuf,
    pub reels: PathBuf,
    pub store_path: PathBuf,
    pub concurrency: usize,
    pub timeout: Duration,
    pub retry_failed: bool,
}

/// Drives pending jobs through the pipeline and records their state.
///
/// The store file is rewritten after every transition.
pub struct Runner {
    config: RunnerConfig,
    store: JobStore,
    persist: Mutex<()>,
    pipeline: Arc<ReelPipeline>,
}

impl Runner {
    pub fn new(config: RunnerConfig, pipeline: Arc<ReelPipeline>) -> anyhow::Result<Self> {
        if config.concurrency == 0 {
            bail!("--jobs must be at least 1");
        }
        let store = JobStore::load_from_file(&config.store_path).with_context(|| {
            format!("failed to load job store '{}'", config.store_path.display())
        })?;
        let recovered = store.recover_interrupted();
        if recovered > 0 {
            tracing::warn!(recovered, "re-queued jobs interrupted by a previous run");
        }

        Ok(Self {
            config,
            store,
            persist: Mutex::new(()),
            pipeline,
        })
    }

    /// Queue new job directories, then build every pending job.
    ///
    /// Every job is waited for even when some fail to record their state;
    /// those failures are reported together at the end.
    pub async fn run_pass(self: Arc<Self>) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.config.uploads)?;
        for id in discover_jobs(&self.config.uploads)? {
            if self.store.enqueue(id) {
                tracing::info!(job = %id, "queued new job");
            }
        }
        if self.config.retry_failed {
            for (id, state) in self.store.snapshot() {
                if matches!(state, JobState::Failed { .. }) {
                    self.store.requeue(id)?;
                }
            }
        }
        self.save()?;

        let pending = self.store.pending();
        if pending.is_empty() {
            tracing::debug!("no pending jobs");
            return Ok(());
        }
        let total = pending.len();
        tracing::info!(pending = total, "processing queue");

        let slots = Arc::new(Semaphore::new(self.config.concurrency));
        let mut tasks = JoinSet::new();
        for id in pending {
            let permit = slots.clone().acquire_owned().await?;
            let runner = self.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let result = runner.run_job(id).await;
                (id, result)
            });
        }

        let mut failed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((id, Err(e))) => {
                    failed += 1;
                    let error = format!("{e:#}");
                    tracing::error!(job = %id, %error, "job state not recorded");
                }
                Err(join_error) => {
                    failed += 1;
                    tracing::error!(error = %join_error, "job task aborted");
                }
            }
        }
        if failed > 0 {
            bail!("{failed} of {total} jobs could not be recorded");
        }
        Ok(())
    }

    async fn run_job(&self, id: JobId) -> anyhow::Result<()> {
        self.store.start(id)?;
        self.save()?;
        tracing::info!(job = %id, "job started");

        let paths = JobPaths::new(&self.config.uploads, &self.config.reels, id);
        let pipeline = self.pipeline.clone();
        let cancel = CancelToken::new();
        let mut build = tokio::task::spawn_blocking({
            let cancel = cancel.clone();
            move || {
                let music = paths.music_track();
                pipeline.build(&paths, &music, &cancel)
            }
        });

        let joined = match tokio::time::timeout(self.config.timeout, &mut build).await {
            Ok(joined) => joined,
            Err(_) => {
                let limit = self.config.timeout.as_secs_f64();
                tracing::error!(job = %id, timeout_secs = limit, "job timed out, cancelling");
                cancel.cancel();
                // The job only leaves `running` once its build has stopped, so a
                // requeued build never overlaps the old one.
                if let Err(join_error) = build.await {
                    tracing::warn!(job = %id, error = %join_error, "cancelled build panicked");
                }
                self.store.fail(id, "Timeout", format!("exceeded {limit}s"))?;
                return self.save();
            }
        };

        match joined {
            Ok(Ok(reel)) => {
                tracing::info!(job = %id, output = %reel.path.display(), "job done");
                self.store.finish(id)?;
            }
            Ok(Err(e)) => {
                tracing::error!(job = %id, kind = e.kind(), error = %e, "job failed");
                self.store.fail(id, e.kind(), e.to_string())?;
            }
            Err(join_error) => {
                tracing::error!(job = %id, error = %join_error, "job panicked");
                self.store.fail(id, "Panic", join_error.to_string())?;
            }
        }
        self.save()
    }

    fn save(&self) -> anyhow::Result<()> {
        let _guard = self.persist.lock().unwrap_or_else(|p| p.into_inner());
        let path = &self.config.store_path;
        self.store
            .save_to_file(path)
            .with_context(|| format!("failed to save job store '{}'", path.display()))
    }
}
