use anyhow::{bail, Context, Result};
use colored::Colorize;
use indicatif::{ParallelProgressIterator, ProgressBar};
use rayon::prelude::*;
use std::any::Any;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::commands::splat::splat_utils::{
    create_conversion_tasks, find_ply_files, ConversionTask,
};
use crate::config::Config;
use crate::converter::{Converter, UsdzConverter};
use crate::shared::progressbar::get_progress_bar;
use crate::BatchConvertArgs;

/// Settings for one batch run after merging CLI flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub workers: usize,
    pub force_zero_order_sh: bool,
    pub overwrite: bool,
    pub show_progress: bool,
}

impl RunOptions {
    pub fn resolve(args: &BatchConvertArgs, config: &Config) -> Result<Self> {
        let workers = match args.workers {
            Some(n) => n.get(),
            None => config.workers,
        };
        if workers == 0 {
            bail!("Number of workers must be at least 1");
        }
        Ok(Self {
            workers,
            force_zero_order_sh: args
                .force_zero_order_sh
                .unwrap_or(config.force_zero_order_sh),
            overwrite: args.overwrite.unwrap_or(config.overwrite),
            show_progress: !args.no_progress,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Converted,
    Skipped,
    Failed(String),
}

/// Aggregated outcome counts over a batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Tally {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    fn update(&mut self, outcome: &TaskOutcome) {
        self.total += 1;
        match outcome {
            TaskOutcome::Converted => self.succeeded += 1,
            TaskOutcome::Skipped => self.skipped += 1,
            TaskOutcome::Failed(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: Tally) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

pub fn execute(args: BatchConvertArgs) -> Result<()> {
    let config = Config::load()?;
    run_batch(&args, &config)
}

pub fn run_batch(args: &BatchConvertArgs, config: &Config) -> Result<()> {
    let options = RunOptions::resolve(args, config)?;

    let ply_files = find_ply_files(&args.input_dir)?;
    if ply_files.is_empty() {
        warn!("No PLY files found in {}", args.input_dir.display());
        return Ok(());
    }

    let tasks = create_conversion_tasks(&ply_files, &args.input_dir, &args.output_dir)?;

    info!("Planning to convert {} files", tasks.len());
    info!("Input directory: {}", args.input_dir.display());
    info!("Output directory: {}", args.output_dir.display());
    info!("Workers: {}", options.workers);
    info!("Force zero-order SH: {}", options.force_zero_order_sh);

    if args.dry_run {
        info!("=== DRY RUN - No files will be converted ===");
        for line in dry_run_plan(&tasks, &args.output_dir) {
            info!("{}", line);
        }
        return Ok(());
    }

    let converter = UsdzConverter::new(config.export.clone());
    let started = Instant::now();
    let tally = run_tasks(&tasks, &options, &converter)?;
    print_summary(&tally, started.elapsed());

    if tally.failed > 0 {
        warn!("Some conversions failed. Check the logs above for details.");
        bail!("{} of {} conversions failed", tally.failed, tally.total);
    }
    info!("All conversions completed successfully!");
    Ok(())
}

/// One `Would convert: <input> -> <output>` line per task, both relative to their roots.
pub fn dry_run_plan(tasks: &[ConversionTask], output_dir: &Path) -> Vec<String> {
    tasks
        .iter()
        .map(|task| {
            let output = task
                .output_path
                .strip_prefix(output_dir)
                .unwrap_or(&task.output_path);
            format!(
                "Would convert: {} -> {}",
                task.relative_path.display(),
                output.display()
            )
        })
        .collect()
}

/// Convert every task with `options.workers` threads. Failures are logged and counted,
/// never propagated; the only error is failing to start the worker pool.
pub fn run_tasks<C: Converter>(
    tasks: &[ConversionTask],
    options: &RunOptions,
    converter: &C,
) -> Result<Tally> {
    let total = tasks.len();
    let bar = if options.show_progress {
        ProgressBar::new(total as u64).with_style(get_progress_bar("Converting"))
    } else {
        ProgressBar::hidden()
    };

    let tally = if options.workers == 1 {
        let mut tally = Tally::default();
        for (i, task) in tasks.iter().enumerate() {
            bar.suspend(|| {
                info!("[{}/{}] Converting {}", i + 1, total, task.relative_path.display())
            });
            let outcome = process_task(task, options, converter, &bar);
            tally.update(&outcome);
            bar.inc(1);
        }
        tally
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.workers)
            .thread_name(|i| format!("plyusdz-worker-{}", i))
            .build()
            .context("Failed to start worker pool")?;
        let completed = AtomicUsize::new(0);

        pool.install(|| {
            tasks
                .par_iter()
                .progress_with(bar.clone())
                .map(|task| {
                    let outcome = process_task(task, options, converter, &bar);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    bar.suspend(|| {
                        info!("[{}/{}] Processed {}", done, total, task.relative_path.display())
                    });
                    outcome
                })
                .fold(Tally::default, |mut acc, outcome| {
                    acc.update(&outcome);
                    acc
                })
                .reduce(Tally::default, |mut a, b| {
                    a.merge(b);
                    a
                })
        })
    };

    bar.finish_and_clear();
    Ok(tally)
}

fn process_task<C: Converter>(
    task: &ConversionTask,
    options: &RunOptions,
    converter: &C,
    bar: &ProgressBar,
) -> TaskOutcome {
    let relative = task.relative_path.display();

    // Log lines are printed with the bar cleared so the two never share a terminal row.
    if !options.overwrite && task.output_path.exists() {
        bar.suspend(|| info!("Skipping existing {}", relative));
        return TaskOutcome::Skipped;
    }

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        convert_single_file(task, options.force_zero_order_sh, converter)
    }));

    match result {
        Ok(Ok(())) => {
            let name = task
                .output_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            bar.suspend(|| info!("{} -> {}", relative, name));
            TaskOutcome::Converted
        }
        Ok(Err(err)) => {
            bar.suspend(|| {
                error!("{}: {:#}", relative, err);
                debug!("{}: {:?}", relative, err);
            });
            TaskOutcome::Failed(format!("{:#}", err))
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            bar.suspend(|| error!("{}: Unexpected error: {}", relative, message));
            TaskOutcome::Failed(message)
        }
    }
}

fn convert_single_file<C: Converter>(
    task: &ConversionTask,
    force_zero_order_sh: bool,
    converter: &C,
) -> Result<()> {
    if let Some(parent) = task.output_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Unable to create directory '{}'", parent.display()))?;
    }
    converter.convert(&task.input_path, &task.output_path, force_zero_order_sh)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

fn print_summary(tally: &Tally, elapsed: Duration) {
    let rule = "=".repeat(60);
    let failed = if tally.failed > 0 {
        tally.failed.to_string().red().bold()
    } else {
        tally.failed.to_string().normal()
    };

    println!("{}", rule);
    println!("{}", "CONVERSION SUMMARY".bold());
    println!("{}", rule);
    println!("Total files: {}", tally.total);
    println!("Successful: {}", tally.succeeded.to_string().green());
    println!("Failed: {}", failed);
    println!("Skipped: {}", tally.skipped.to_string().yellow());
    println!("Elapsed: {:.2?}", elapsed);
}
