// 設定ファイル解析テスト

use std::io::Write;

use image_bridge::config::job::{JobFile, parse_rotation};
use image_bridge::config::load_settings_for_job;
use image_bridge::config::merged::MergedConfig;
use image_bridge::config::save::{
    JpegSaveParams, OutputFormat, PngFilter, PngSaveParams, ResolvedSave, SaveParams,
};
use image_bridge::config::settings::Settings;
use image_bridge::error::BridgeError;
use image_bridge::ops::{
    Angle, Colorspace, Embed, Extend, ExtractArea, FlipDirection, Gaussblur, Kernel, Operation,
    Sharpen, Thumbnail,
};

// ============================================================
// 1. Settings のデシリアライズ
// ============================================================

#[test]
fn test_settings_full_yaml() {
    let yaml = r#"
jpeg_quality: 75
png_compression: 9
png_filter: paeth
background: [255, 255, 255]
max_width: 4000
max_height: 3000
max_alloc: 1048576
parallel_workers: 4
"#;
    let settings = Settings::from_yaml(yaml).expect("should parse full YAML");
    assert_eq!(settings.jpeg_quality, 75);
    assert_eq!(settings.png_compression, 9);
    assert_eq!(settings.png_filter, PngFilter::Paeth);
    assert_eq!(settings.background, [255, 255, 255]);
    assert_eq!(settings.max_width, Some(4000));
    assert_eq!(settings.max_height, Some(3000));
    assert_eq!(settings.max_alloc, Some(1_048_576));
    assert_eq!(settings.parallel_workers, 4);
}

#[test]
fn test_settings_empty_yaml() {
    let settings = Settings::from_yaml("{}").expect("should parse empty mapping");
    assert_eq!(settings.jpeg_quality, 90);
    assert_eq!(settings.png_compression, 6);
    assert_eq!(settings.png_filter, PngFilter::Adaptive);
    assert_eq!(settings.background, [0, 0, 0]);
    assert_eq!(settings.parallel_workers, 0);
}

#[test]
fn test_settings_invalid_yaml() {
    let result = Settings::from_yaml("jpeg_quality: [not, a, number]");
    assert!(matches!(result, Err(BridgeError::ConfigError(_))));
}

#[test]
fn test_settings_limits() {
    let settings = Settings {
        max_width: Some(10),
        ..Settings::default()
    };
    let limits = settings.limits();
    assert_eq!(limits.max_image_width, Some(10));
    assert_eq!(limits.max_image_height, None);
}

#[test]
fn test_load_settings_for_job_discovers_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut f = std::fs::File::create(dir.path().join("settings.yaml")).unwrap();
    writeln!(f, "jpeg_quality: 42").unwrap();

    let settings = load_settings_for_job(&dir.path().join("jobs.yaml")).unwrap();
    assert_eq!(settings.jpeg_quality, 42);
}

#[test]
fn test_load_settings_for_job_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let settings = load_settings_for_job(&dir.path().join("jobs.yaml")).unwrap();
    assert_eq!(settings.jpeg_quality, 90);
}

// ============================================================
// 2. 保存パラメータの解決
// ============================================================

#[test]
fn test_explicit_values_win_over_settings() {
    let settings = Settings::default();
    let resolved = SaveParams::Jpeg(JpegSaveParams {
        quality: Some(55),
        background: Some([1, 2, 3]),
    })
    .resolve(&settings)
    .unwrap();
    assert_eq!(
        resolved,
        ResolvedSave::Jpeg {
            quality: 55,
            background: [1, 2, 3]
        }
    );
}

#[test]
fn test_unset_values_fall_back_to_settings() {
    let settings = Settings {
        png_compression: 2,
        png_filter: PngFilter::Up,
        ..Settings::default()
    };
    let resolved = SaveParams::Png(PngSaveParams::default())
        .resolve(&settings)
        .unwrap();
    assert_eq!(
        resolved,
        ResolvedSave::Png {
            compression: 2,
            filter: PngFilter::Up
        }
    );
}

#[test]
fn test_out_of_range_values_rejected() {
    let settings = Settings::default();
    for q in [0u8, 101] {
        let r = SaveParams::Jpeg(JpegSaveParams {
            quality: Some(q),
            background: None,
        })
        .resolve(&settings);
        assert!(matches!(r, Err(BridgeError::ConfigError(_))), "quality {q}");
    }
    let r = SaveParams::Png(PngSaveParams {
        compression: Some(10),
        filter: None,
    })
    .resolve(&settings);
    assert!(r.is_err());
}

#[test]
fn test_default_for_matches_default_settings() {
    for format in [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Gif] {
        assert_eq!(
            ResolvedSave::default_for(format),
            SaveParams::for_format(format)
                .resolve(&Settings::default())
                .unwrap()
        );
    }
}

#[test]
fn test_output_format_from_path() {
    use std::path::Path;
    assert_eq!(OutputFormat::from_path(Path::new("a/b.JPG")), Some(OutputFormat::Jpeg));
    assert_eq!(OutputFormat::from_path(Path::new("x.tif")), Some(OutputFormat::Tiff));
    assert_eq!(OutputFormat::from_path(Path::new("x.webp")), Some(OutputFormat::Webp));
    assert_eq!(OutputFormat::from_path(Path::new("x.heic")), None);
    assert_eq!(OutputFormat::from_path(Path::new("noext")), None);
}

// ============================================================
// 3. ジョブファイル
// ============================================================

#[test]
fn test_parse_rotation() {
    assert_eq!(parse_rotation(0).unwrap(), None);
    assert_eq!(parse_rotation(90).unwrap(), Some(Angle::D90));
    assert_eq!(parse_rotation(-90).unwrap(), Some(Angle::D270));
    assert_eq!(parse_rotation(540).unwrap(), Some(Angle::D180));
    assert!(parse_rotation(45).is_err());
}

#[test]
fn test_job_file_full() {
    let yaml = r#"
jobs:
  - input: in.png
    output: out.jpg
    quality: 70
    background: [10, 20, 30]
    resize:
      width: 100
      kernel: cubic
    rotate: 270
    flip: horizontal
    grayscale: true
  - input: a.bmp
    output: b.bin
    format: png
"#;
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    assert_eq!(file.jobs.len(), 2);

    let job = &file.jobs[0];
    assert_eq!(job.quality, Some(70));
    assert_eq!(job.rotate, Some(Angle::D270));
    assert_eq!(job.flip, Some(FlipDirection::Horizontal));

    let ops = job.operations();
    assert_eq!(ops.len(), 4);
    match ops[0] {
        Operation::Resize(r) => {
            assert_eq!(r.width, Some(100));
            assert_eq!(r.height, None);
            assert_eq!(r.kernel, Kernel::Cubic);
        }
        other => panic!("expected resize first, got {other:?}"),
    }
    assert_eq!(ops[1], Operation::Rotate(Angle::D270));
    assert_eq!(ops[3], Operation::Colorspace(Colorspace::Grayscale));

    assert_eq!(file.jobs[1].format, Some(OutputFormat::Png));
    assert!(file.jobs[1].operations().is_empty());
}

#[test]
fn test_job_file_extended_operations_in_order() {
    let yaml = r#"
jobs:
  - input: in.png
    output: out.png
    crop: {left: 1, top: 2, width: 30, height: 40}
    thumbnail: {width: 20, height: 20, crop: true}
    embed: {x: 5, y: 5, width: 30, height: 30, extend: background, background: [1, 2, 3, 255]}
    blur: 1.5
    sharpen: {sigma: 0.8}
    invert: true
    autorotate: true
"#;
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    let ops = file.jobs[0].operations();
    assert_eq!(
        ops,
        vec![
            Operation::ExtractArea(ExtractArea {
                left: 1,
                top: 2,
                width: 30,
                height: 40
            }),
            Operation::Thumbnail(Thumbnail {
                width: 20,
                height: Some(20),
                crop: true
            }),
            Operation::Embed(Embed {
                x: 5,
                y: 5,
                width: 30,
                height: 30,
                extend: Extend::Background,
                background: [1, 2, 3, 255]
            }),
            Operation::Gaussblur(Gaussblur { sigma: 1.5 }),
            Operation::Sharpen(Sharpen {
                sigma: 0.8,
                threshold: 0
            }),
            Operation::Invert,
        ]
    );
    assert_eq!(file.jobs[0].autorotate, Some(true));
}

#[test]
fn test_embed_defaults() {
    let yaml = "jobs:\n  - input: a.png\n    output: b.png\n    embed: {width: 8, height: 8}\n";
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    match file.jobs[0].operations()[0] {
        Operation::Embed(e) => {
            assert_eq!((e.x, e.y), (0, 0));
            assert_eq!(e.extend, Extend::Black);
            assert_eq!(e.background, [0, 0, 0, 255]);
        }
        other => panic!("expected embed, got {other:?}"),
    }
}

#[test]
fn test_merged_autorotate_job_then_settings() {
    let settings = Settings {
        autorotate: true,
        ..Settings::default()
    };
    let yaml = "jobs:\n  - input: a.png\n    output: b.png\n  - input: a.png\n    output: c.png\n    autorotate: false\n";
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    assert!(MergedConfig::new(&settings, &file.jobs[0]).unwrap().autorotate);
    assert!(!MergedConfig::new(&settings, &file.jobs[1]).unwrap().autorotate);
    assert!(!MergedConfig::new(&Settings::default(), &file.jobs[0]).unwrap().autorotate);
}

#[test]
fn test_job_file_bad_rotation_rejected() {
    let yaml = "jobs:\n  - input: a.png\n    output: b.png\n    rotate: 30\n";
    assert!(serde_yml::from_str::<JobFile>(yaml).is_err());
}

#[test]
fn test_merged_config_uses_job_then_settings() {
    let yaml = "jobs:\n  - input: a.png\n    output: b.jpeg\n";
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    let settings = Settings {
        jpeg_quality: 33,
        ..Settings::default()
    };
    let merged = MergedConfig::new(&settings, &file.jobs[0]).unwrap();
    assert_eq!(
        merged.save,
        ResolvedSave::Jpeg {
            quality: 33,
            background: [0, 0, 0]
        }
    );

    let yaml = "jobs:\n  - input: a.png\n    output: b.jpeg\n    quality: 80\n";
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    let merged = MergedConfig::new(&settings, &file.jobs[0]).unwrap();
    assert!(matches!(merged.save, ResolvedSave::Jpeg { quality: 80, .. }));
}

#[test]
fn test_merged_config_unknown_extension_needs_format() {
    let yaml = "jobs:\n  - input: a.png\n    output: b.xyz\n";
    let file: JobFile = serde_yml::from_str(yaml).unwrap();
    let result = MergedConfig::new(&Settings::default(), &file.jobs[0]);
    assert!(matches!(result, Err(BridgeError::ConfigError(_))));
}
