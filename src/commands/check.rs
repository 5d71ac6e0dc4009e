use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use iptv_checker::checker::PlaylistChecker;
use iptv_checker::config::Config;
use iptv_checker::scheduler::ShutdownHandle;
use iptv_checker::storage::{ResumeManager, ResumeStatus};

use super::{collect_inputs, InputArgs};

/// Options of the `check` command
#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Output file name prefix
    #[arg(short, long)]
    pub output_prefix: Option<String>,

    /// Per-probe timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<f64>,

    /// Maximum probes in flight per worker
    #[arg(long)]
    pub concurrent: Option<usize>,

    /// Number of shard workers
    #[arg(long)]
    pub processes: Option<usize>,

    /// Extra attempts for timed-out or errored channels
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Directory for working playlists
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Directory for broken playlists
    #[arg(long)]
    pub broken_dir: Option<PathBuf>,

    /// Write only the working playlist
    #[arg(long, conflicts_with = "broken_only")]
    pub working_only: bool,

    /// Write only the broken playlist
    #[arg(long)]
    pub broken_only: bool,

    /// Check playlists even if earlier outputs are complete
    #[arg(long, default_value = "false")]
    pub force: bool,
}

impl CheckArgs {
    /// Apply command line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(prefix) = &self.output_prefix {
            config.output.prefix = prefix.clone();
        }
        if let Some(timeout) = self.timeout {
            config.checker.timeout_secs = timeout;
        }
        if let Some(concurrent) = self.concurrent {
            config.checker.concurrent = concurrent;
        }
        if let Some(processes) = self.processes {
            config.checker.processes = processes;
        }
        if let Some(max_retries) = self.max_retries {
            config.checker.max_retries = max_retries;
        }
        if let Some(dir) = &self.working_dir {
            config.output.working_dir = Some(dir.clone());
        }
        if let Some(dir) = &self.broken_dir {
            config.output.broken_dir = Some(dir.clone());
        }
        if self.working_only {
            config.output.working_only = true;
            config.output.broken_only = false;
        }
        if self.broken_only {
            config.output.broken_only = true;
            config.output.working_only = false;
        }
    }
}

pub async fn check(mut config: Config, args: CheckArgs, shutdown: ShutdownHandle) -> Result<()> {
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let layout = config.output_layout();
    let inputs = collect_inputs(&args.input, &layout)?;

    println!("IPTV Playlist Check");
    println!("===================");
    println!("Playlists: {}", inputs.len());
    println!("Timeout: {}s", config.checker.timeout_secs);
    println!(
        "Workers: {} x {} concurrent",
        config.checker.processes, config.checker.concurrent
    );
    println!("Retries: {}", config.checker.max_retries);
    if config.output.working_only {
        println!("Output: working only");
    } else if config.output.broken_only {
        println!("Output: broken only");
    }

    let resume = ResumeManager::new(layout, config.input.encodings.clone());
    let (to_check, skipped) = if config.resume.enabled {
        resume.filter(inputs, args.force)
    } else {
        (inputs, Vec::new())
    };

    if !skipped.is_empty() {
        println!("\nAlready complete (skipped)");
        println!("--------------------------");
        for (path, status) in &skipped {
            println!("{}: {status}", path.display());
        }
    }

    if config.resume.auto_cleanup_incomplete {
        for input in &to_check {
            if matches!(resume.inspect(input), ResumeStatus::Incomplete(_)) {
                resume
                    .remove_outputs(input)
                    .with_context(|| format!("Failed to clean up outputs of {}", input.display()))?;
            }
        }
    }

    if to_check.is_empty() {
        println!("\nNothing to check. Use --force to check again.");
        return Ok(());
    }

    let checker = PlaylistChecker::from_config(&config)
        .context("Failed to set up checker")?
        .with_shutdown(shutdown);

    let mut batch = checker.check_files(&to_check).await;
    batch.skipped = skipped;

    for report in &batch.files {
        println!();
        print!(
            "{}",
            report.render(config.report.show_errors, config.report.max_errors_to_show)
        );
    }

    println!();
    print!("{}", batch.render());

    if !batch.is_success() {
        anyhow::bail!(
            "{} of {} playlists could not be checked",
            batch.failed.len(),
            to_check.len()
        );
    }

    Ok(())
}
