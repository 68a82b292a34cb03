use clap::Parser;
use dpmatch::image::io::load_image;
use dpmatch::{
    Detection, Detector, JsonModelFile, MatchConfig, MultiClassDetector, PyramidConfig,
    DEFAULT_OVERLAP_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const SCHEMA_JSON: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.schema.json"));
const EXAMPLE_JSON: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/config.example.json"));

#[derive(Parser, Debug)]
#[command(author, version, about = "dpmatch CLI (JSON config driven)")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.json")]
    config: PathBuf,
    /// Print the JSON schema and exit.
    #[arg(long)]
    print_schema: bool,
    /// Print an example config and exit.
    #[arg(long)]
    print_example: bool,
    /// Enable tracing output for performance profiling.
    #[arg(long)]
    trace: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct PyramidConfigJson {
    cell_size: usize,
    levels_per_octave: usize,
}

impl Default for PyramidConfigJson {
    fn default() -> Self {
        let cfg = PyramidConfig::default();
        Self {
            cell_size: cfg.cell_size,
            levels_per_octave: cfg.levels_per_octave,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MatchConfigJson {
    parallel: bool,
    /// `null` disables the compressed prefilter.
    prefilter_slack: Option<f32>,
    max_part_displacement: usize,
}

impl Default for MatchConfigJson {
    fn default() -> Self {
        let cfg = MatchConfig::default();
        Self {
            parallel: cfg.parallel,
            prefilter_slack: Some(cfg.prefilter_slack),
            max_part_displacement: cfg.max_part_displacement,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    path: PathBuf,
    #[serde(default)]
    class_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct Config {
    image_path: String,
    models: Vec<ModelEntry>,
    output_path: Option<String>,
    overlap_threshold: f32,
    pyramid: PyramidConfigJson,
    #[serde(rename = "match")]
    match_cfg: MatchConfigJson,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image_path: String::new(),
            models: Vec::new(),
            output_path: None,
            overlap_threshold: DEFAULT_OVERLAP_THRESHOLD,
            pyramid: PyramidConfigJson::default(),
            match_cfg: MatchConfigJson::default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DetectionRecord {
    class_id: usize,
    class_name: String,
    score: f32,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

#[derive(Debug, Serialize)]
struct SkippedRecord {
    source: String,
    error: String,
}

#[derive(Debug, Serialize)]
struct Output {
    classes: Vec<String>,
    detections: Vec<DetectionRecord>,
    skipped_models: Vec<SkippedRecord>,
}

fn record(facade: &MultiClassDetector, det: Detection) -> DetectionRecord {
    DetectionRecord {
        class_id: det.class_id,
        class_name: facade.class_name(det.class_id).unwrap_or_default().to_string(),
        score: det.score,
        left: det.bbox.left,
        top: det.bbox.top,
        right: det.bbox.right,
        bottom: det.bbox.bottom,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env().add_directive("dpmatch=info".parse()?))
            .with_target(false)
            .init();
    }

    if cli.print_schema {
        println!("{SCHEMA_JSON}");
        return Ok(());
    }
    if cli.print_example {
        println!("{EXAMPLE_JSON}");
        return Ok(());
    }

    let config_text = fs::read_to_string(&cli.config)?;
    let config: Config = serde_json::from_str(&config_text)?;
    if config.image_path.is_empty() || config.models.is_empty() {
        return Err("image_path and at least one model must be set in the config".into());
    }

    let pyramid = PyramidConfig {
        cell_size: config.pyramid.cell_size,
        levels_per_octave: config.pyramid.levels_per_octave,
    };
    pyramid.validate()?;
    let matching = MatchConfig {
        parallel: config.match_cfg.parallel,
        prefilter_slack: config.match_cfg.prefilter_slack.unwrap_or(f32::INFINITY),
        max_part_displacement: config.match_cfg.max_part_displacement,
    };
    matching.validate()?;

    let sources = config
        .models
        .into_iter()
        .map(|entry| (JsonModelFile::new(entry.path), entry.class_name));
    let (facade, skipped) = MultiClassDetector::load(Detector::new(pyramid, matching), sources);
    for skip in &skipped {
        tracing::warn!(source = %skip.source, error = %skip.error, "skipping model");
    }
    if facade.is_empty() {
        return Err("no model could be loaded".into());
    }

    let image = load_image(&config.image_path)?;
    let detections = facade.detect(image.view(), config.overlap_threshold)?;

    let output = Output {
        classes: facade.class_names().into_iter().map(String::from).collect(),
        detections: detections
            .into_iter()
            .map(|det| record(&facade, det))
            .collect(),
        skipped_models: skipped
            .into_iter()
            .map(|skip| SkippedRecord {
                source: skip.source,
                error: skip.error.to_string(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&output)?;

    match config.output_path {
        Some(path) => fs::write(path, json)?,
        None => println!("{json}"),
    }

    Ok(())
}
