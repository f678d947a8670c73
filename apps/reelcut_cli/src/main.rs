mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context as _};
use clap::{Args, Parser, Subcommand};
use reelcut_core::layout::JobPaths;
use reelcut_core::settings::ReelSettings;
use reelcut_core::types::JobId;
use reelcut_render::ffmpeg::is_tool_on_path;
use reelcut_render::{CancelToken, ReelPipeline};

use runner::{Runner, RunnerConfig};

#[derive(Parser, Debug)]
#[command(name = "reelcut", version, about = "Assemble voiced vertical reels from uploaded media")]
struct Cli {
    /// Directory holding one sub-directory per job.
    #[arg(long, global = true, default_value = "user_uploads")]
    uploads: PathBuf,

    /// Directory finished reels are written to.
    #[arg(long, global = true, default_value = "static/reels")]
    reels: PathBuf,

    /// Optional JSON file with output and mix settings.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the reel for one job.
    Build {
        job: JobId,
    },
    /// Print the allocated timeline for one job without rendering.
    Plan {
        job: JobId,
    },
    /// Build every pending job found under the uploads directory.
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Job-state store.
    #[arg(long, default_value = "jobs.json")]
    store: PathBuf,

    /// Jobs built at the same time.
    #[arg(long, default_value_t = 2)]
    jobs: usize,

    /// Wall-clock limit per job.
    #[arg(long, default_value_t = 900)]
    timeout_secs: u64,

    /// Queue failed jobs again before running.
    #[arg(long, default_value_t = false)]
    retry_failed: bool,

    /// Keep scanning for new jobs at this interval instead of exiting.
    #[arg(long)]
    poll_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let settings = match &cli.settings {
        Some(path) => ReelSettings::load_from_file(path)
            .with_context(|| format!("failed to load settings '{}'", path.display()))?,
        None => ReelSettings::default(),
    };

    match cli.cmd {
        Command::Plan { job } => {
            let paths = JobPaths::new(&cli.uploads, &cli.reels, job);
            let timeline = ReelPipeline::with_ffmpeg(&settings)
                .plan(&paths)
                .with_context(|| format!("failed to plan job {job}"))?;
            println!("{}", serde_json::to_string_pretty(&timeline)?);
        }
        Command::Build { job } => {
            check_dependencies()?;
            let paths = JobPaths::new(&cli.uploads, &cli.reels, job);
            let music = paths.music_track();
            let reel = ReelPipeline::with_ffmpeg(&settings)
                .build(&paths, &music, &CancelToken::new())
                .with_context(|| format!("failed to build job {job}"))?;
            println!("{}", reel.path.display());
        }
        Command::Run(args) => {
            check_dependencies()?;
            let config = RunnerConfig {
                uploads: cli.uploads,
                reels: cli.reels,
                store_path: args.store,
                concurrency: args.jobs,
                timeout: Duration::from_secs(args.timeout_secs),
                retry_failed: args.retry_failed,
            };
            let pipeline = Arc::new(ReelPipeline::with_ffmpeg(&settings));
            let runner = Arc::new(Runner::new(config, pipeline)?);
            loop {
                runner.clone().run_pass().await?;
                match args.poll_secs {
                    Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn check_dependencies() -> anyhow::Result<()> {
    let deps = [
        ("ffmpeg", "segment rendering, concatenation and muxing"),
        ("ffprobe", "media duration probing"),
    ];

    let missing: Vec<_> = deps.iter().filter(|(bin, _)| !is_tool_on_path(bin)).collect();

    if !missing.is_empty() {
        for (bin, purpose) in &missing {
            tracing::error!("missing {bin} ({purpose}); install with: sudo apt install ffmpeg");
        }
        bail!("required ffmpeg tools are not on PATH");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "reelcut",
            "--uploads",
            "/srv/up",
            "run",
            "--jobs",
            "4",
            "--timeout-secs",
            "60",
            "--retry-failed",
        ])
        .unwrap();
        assert_eq!(cli.uploads, PathBuf::from("/srv/up"));
        match cli.cmd {
            Command::Run(args) => {
                assert_eq!(args.jobs, 4);
                assert_eq!(args.timeout_secs, 60);
                assert!(args.retry_failed);
                assert!(args.poll_secs.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn cli_parses_job_id() {
        let id = JobId::new();
        let cli = Cli::try_parse_from(["reelcut", "plan", &id.to_string()]).unwrap();
        assert!(matches!(cli.cmd, Command::Plan { job } if job == id));
    }

    #[test]
    fn cli_rejects_bad_job_id() {
        assert!(Cli::try_parse_from(["reelcut", "build", "not-a-job"]).is_err());
    }
}
