use std::path::{Path, PathBuf};
use std::process::ExitCode;

use image_bridge::config::job::JobFile;
use image_bridge::config::merged::MergedConfig;
use image_bridge::config::{self};
use image_bridge::log::Logger;
use image_bridge::pipeline::job_runner::JobConfig;
use image_bridge::pipeline::orchestrator::run_all_jobs;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: image_bridge <jobs.yaml>...");
        eprintln!("  Convert images according to job specifications.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("image_bridge {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let logger = Logger::tracing();

    let mut job_configs: Vec<JobConfig> = Vec::new();
    let mut workers = 0usize;

    for job_file_arg in &args {
        let job_file_path = Path::new(job_file_arg);

        // Load settings from the same directory as the job file.
        let settings = match config::load_settings_for_job(job_file_path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("ERROR: Failed to load settings for {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };
        workers = workers.max(settings.parallel_workers);

        let yaml_content = match std::fs::read_to_string(job_file_path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("ERROR: Failed to read job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        let job_file: JobFile = match serde_yml::from_str(&yaml_content) {
            Ok(jf) => jf,
            Err(e) => {
                eprintln!("ERROR: Failed to parse job file {job_file_arg}: {e}");
                return ExitCode::FAILURE;
            }
        };

        // Resolve job file directory for relative paths.
        let job_dir = job_file_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        for job in &job_file.jobs {
            let merged = match MergedConfig::new(&settings, job) {
                Ok(m) => m,
                Err(e) => {
                    eprintln!("ERROR: {}: {e}", job.input);
                    return ExitCode::FAILURE;
                }
            };

            job_configs.push(JobConfig::new(
                resolve_path(&job_dir, &job.input),
                resolve_path(&job_dir, &job.output),
                merged,
            ));
        }
    }

    let results = run_all_jobs(&job_configs, workers, &logger);

    let mut has_error = false;
    for (config, result) in job_configs.iter().zip(&results) {
        match result {
            Ok(job_result) => {
                let report = &job_result.report;
                eprintln!(
                    "OK: {} -> {} ({:?}, {}x{}, {} bytes)",
                    job_result.input_path.display(),
                    job_result.output_path.display(),
                    report.input_format,
                    report.width,
                    report.height,
                    report.bytes_written
                );
            }
            Err(e) => {
                eprintln!(
                    "ERROR: {} -> {}: {e}",
                    config.input_path.display(),
                    config.output_path.display()
                );
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
