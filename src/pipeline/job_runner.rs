// ジョブ単位: 入力ファイル -> ソースアダプタ -> 変換 -> ターゲットアダプタ -> 出力ファイル

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::config::merged::MergedConfig;
use crate::config::save::ResolvedSave;
use crate::error::BridgeError;
use crate::log::Logger;
use crate::ops::Operation;
use crate::pipeline::{LoadOptions, TranscodeReport, transcode};
use crate::stream::host::{SeekSource, WriteTarget};

/// Configuration for a single job.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub operations: Vec<Operation>,
    pub load: LoadOptions,
    pub save: ResolvedSave,
}

impl JobConfig {
    pub fn new(input_path: PathBuf, output_path: PathBuf, merged: MergedConfig) -> Self {
        JobConfig {
            input_path,
            output_path,
            operations: merged.operations,
            load: LoadOptions {
                format: None,
                limits: merged.limits,
                autorotate: merged.autorotate,
            },
            save: merged.save,
        }
    }
}

/// Result of processing a single job.
#[derive(Debug, Clone)]
pub struct JobResult {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub report: TranscodeReport,
}

/// Run a single conversion job.
///
/// The input file becomes a bounded seekable source. Output goes to a
/// temporary file next to the destination, which replaces the destination
/// only after the whole transcode succeeded. A failed job therefore never
/// touches an existing output, and a job whose input and output are the
/// same file recompresses it in place.
pub fn run_job(config: &JobConfig, logger: &Logger) -> crate::error::Result<JobResult> {
    let input = File::open(&config.input_path)?;
    let source = SeekSource::new(input)?;

    let dir = match config.output_path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let staged = NamedTempFile::new_in(dir)?;
    let target = WriteTarget::new(BufWriter::new(staged.as_file().try_clone()?));

    let report = transcode(
        source,
        target,
        &config.operations,
        &config.load,
        &config.save,
        logger,
    )?;

    staged.persist(&config.output_path).map_err(|e| {
        BridgeError::host_io(format!(
            "could not move output into place at {}: {}",
            config.output_path.display(),
            e.error
        ))
    })?;
    logger.debug(&format!("wrote {}", config.output_path.display()));

    Ok(JobResult {
        input_path: config.input_path.clone(),
        output_path: config.output_path.clone(),
        report,
    })
}
