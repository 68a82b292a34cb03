//! JSON model files (feature `json`).
//!
//! I/O and decoding errors map to `DpmError::LoadFailure`; structural
//! violations surface as `DpmError::InvalidModel` from `Model::new`.

use crate::model::source::ModelSource;
use crate::model::{Anchor, Component, DeformationCost, Filter, Model, Projection};
use crate::util::{DpmError, DpmResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize, Deserialize)]
struct AnchorJson {
    x: i32,
    y: i32,
    level_offset: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct FilterJson {
    size_x: usize,
    size_y: usize,
    num_features: usize,
    weights: Vec<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    deformation: Option<[f32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    anchor: Option<AnchorJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComponentJson {
    #[serde(default)]
    bias: f32,
    root: FilterJson,
    #[serde(default)]
    parts: Vec<FilterJson>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProjectionJson {
    input_dim: usize,
    output_dim: usize,
    coeffs: Vec<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModelJson {
    score_threshold: f32,
    projection: ProjectionJson,
    components: Vec<ComponentJson>,
}

impl FilterJson {
    fn into_root(self) -> DpmResult<Filter> {
        Filter::new(self.size_x, self.size_y, self.num_features, self.weights)
    }

    fn into_part(self) -> DpmResult<Filter> {
        let anchor = self.anchor.ok_or_else(|| DpmError::InvalidModel {
            reason: "part filter is missing its anchor".to_string(),
        })?;
        Filter::part(
            self.size_x,
            self.size_y,
            self.num_features,
            self.weights,
            DeformationCost(self.deformation.unwrap_or_default()),
            Anchor {
                x: anchor.x,
                y: anchor.y,
                level_offset: anchor.level_offset,
            },
        )
    }

    fn from_filter(filter: &Filter, with_placement: bool) -> Self {
        let anchor = filter.anchor();
        Self {
            size_x: filter.size_x(),
            size_y: filter.size_y(),
            num_features: filter.num_features(),
            weights: filter.weights().to_vec(),
            deformation: with_placement.then_some(filter.deformation().0),
            anchor: with_placement.then_some(AnchorJson {
                x: anchor.x,
                y: anchor.y,
                level_offset: anchor.level_offset,
            }),
        }
    }
}

impl ModelJson {
    fn into_model(self) -> DpmResult<Model> {
        let projection = Projection::new(
            self.projection.input_dim,
            self.projection.output_dim,
            self.projection.coeffs,
        )?;
        let components = self
            .components
            .into_iter()
            .map(|c| {
                let root = c.root.into_root()?;
                let parts = c
                    .parts
                    .into_iter()
                    .map(FilterJson::into_part)
                    .collect::<DpmResult<Vec<_>>>()?;
                Ok(Component::new(root, parts, c.bias))
            })
            .collect::<DpmResult<Vec<_>>>()?;
        Model::new(components, self.score_threshold, projection)
    }
}

/// Parses a model from JSON text. `source_name` labels load failures.
pub fn parse_model_json(text: &str, source_name: &str) -> DpmResult<Model> {
    let parsed: ModelJson = serde_json::from_str(text).map_err(|err| DpmError::LoadFailure {
        source_name: source_name.to_string(),
        reason: err.to_string(),
    })?;
    parsed.into_model()
}

/// Reads and parses a JSON model file.
pub fn load_model_json<P: AsRef<Path>>(path: P) -> DpmResult<Model> {
    let path = path.as_ref();
    let source_name = path.display().to_string();
    let text = fs::read_to_string(path).map_err(|err| DpmError::LoadFailure {
        source_name: source_name.clone(),
        reason: err.to_string(),
    })?;
    parse_model_json(&text, &source_name)
}

/// Serialises a model to pretty-printed JSON.
pub fn model_to_json(model: &Model) -> DpmResult<String> {
    let projection = model.projection();
    let doc = ModelJson {
        score_threshold: model.score_threshold(),
        projection: ProjectionJson {
            input_dim: projection.input_dim(),
            output_dim: projection.output_dim(),
            coeffs: projection.coeffs().to_vec(),
        },
        components: model
            .components()
            .iter()
            .map(|c| ComponentJson {
                bias: c.bias,
                root: FilterJson::from_filter(&c.root, false),
                parts: c
                    .parts
                    .iter()
                    .map(|p| FilterJson::from_filter(p, true))
                    .collect(),
            })
            .collect(),
    };
    serde_json::to_string_pretty(&doc).map_err(|err| DpmError::LoadFailure {
        source_name: "<in-memory model>".to_string(),
        reason: err.to_string(),
    })
}

/// JSON model file on disk.
#[derive(Clone, Debug)]
pub struct JsonModelFile {
    path: PathBuf,
}

impl JsonModelFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

impl ModelSource for JsonModelFile {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> DpmResult<Model> {
        load_model_json(&self.path)
    }
}
