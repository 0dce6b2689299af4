use std::path::Path;

use super::job::Job;
use super::save::{JpegSaveParams, OutputFormat, PngSaveParams, ResolvedSave, SaveParams};
use super::settings::Settings;
use crate::ops::Operation;

#[derive(Debug, Clone)]
pub struct MergedConfig {
    pub save: ResolvedSave,
    pub operations: Vec<Operation>,
    pub limits: image::Limits,
    pub autorotate: bool,
    pub parallel_workers: usize,
}

impl MergedConfig {
    /// JobのOption値がSomeならJobの値を、NoneならSettingsの値を使用する。
    ///
    /// 出力形式は `format` が無ければ出力パスの拡張子から推定する。
    pub fn new(settings: &Settings, job: &Job) -> crate::error::Result<Self> {
        let format = match job.format {
            Some(f) => f,
            None => OutputFormat::from_path(Path::new(&job.output)).ok_or_else(|| {
                crate::error::BridgeError::config(format!(
                    "Cannot infer output format from '{}'; set `format`",
                    job.output
                ))
            })?,
        };

        let params = match format {
            OutputFormat::Jpeg => SaveParams::Jpeg(JpegSaveParams {
                quality: job.quality,
                background: job.background,
            }),
            OutputFormat::Png => SaveParams::Png(PngSaveParams {
                compression: job.compression,
                filter: None,
            }),
            other => SaveParams::for_format(other),
        };

        Ok(MergedConfig {
            save: params.resolve(settings)?,
            operations: job.operations(),
            limits: settings.limits(),
            autorotate: job.autorotate.unwrap_or(settings.autorotate),
            parallel_workers: settings.parallel_workers,
        })
    }
}
