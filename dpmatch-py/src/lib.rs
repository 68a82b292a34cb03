//! Python bindings for the dpmatch detector.
//!
//! This module exposes the multi-class detection facade to Python via PyO3.

use numpy::{PyReadonlyArrayDyn, PyUntypedArrayMethods};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use dpmatch::{
    Detection as RustDetection, Detector as RustDetector, DpmError, ImageView, JsonModelFile,
    MatchConfig, MultiClassDetector, PyramidConfig, DEFAULT_OVERLAP_THRESHOLD,
};

/// Convert a DpmError to a Python exception.
fn to_py_err(err: DpmError) -> PyErr {
    match err {
        DpmError::InvalidInput(_) | DpmError::InvalidDimensions { .. } => {
            PyValueError::new_err(err.to_string())
        }
        other => PyRuntimeError::new_err(other.to_string()),
    }
}

/// Detection result in image coordinates.
#[pyclass]
#[derive(Clone)]
pub struct Detection {
    /// Inclusive box as (left, top, right, bottom).
    #[pyo3(get)]
    pub bbox: (i32, i32, i32, i32),
    #[pyo3(get)]
    pub score: f32,
    #[pyo3(get)]
    pub class_id: usize,
    #[pyo3(get)]
    pub class_name: String,
}

#[pymethods]
impl Detection {
    fn __repr__(&self) -> String {
        let (l, t, r, b) = self.bbox;
        format!(
            "Detection(class_name='{}', score={:.4}, bbox=({}, {}, {}, {}))",
            self.class_name, self.score, l, t, r, b
        )
    }
}

impl Detection {
    fn from_rust(det: RustDetection, class_name: &str) -> Self {
        Self {
            bbox: (det.bbox.left, det.bbox.top, det.bbox.right, det.bbox.bottom),
            score: det.score,
            class_id: det.class_id,
            class_name: class_name.to_string(),
        }
    }
}

/// Multi-class detector built from JSON model files.
#[pyclass]
pub struct Detector {
    inner: MultiClassDetector,
    skipped: Vec<(String, String)>,
}

#[pymethods]
impl Detector {
    /// Load models and configure the detector.
    ///
    /// Models that fail to load are skipped; see `skipped_models`.
    ///
    /// Args:
    ///     model_paths: List of JSON model files
    ///     class_names: Optional list of class names, one per model
    ///     cell_size: HOG cell size in pixels at full resolution (default: 8)
    ///     levels_per_octave: Pyramid levels per octave (default: 10)
    ///     prefilter_slack: Prefilter slack, None disables the prefilter (default: 1.0)
    ///     max_part_displacement: Part search radius in cells (default: 8)
    ///     parallel: Enable parallel execution (default: False)
    #[new]
    #[pyo3(signature = (
        model_paths,
        class_names = None,
        cell_size = 8,
        levels_per_octave = 10,
        prefilter_slack = Some(1.0),
        max_part_displacement = 8,
        parallel = false
    ))]
    #[allow(clippy::too_many_arguments)]
    fn new(
        model_paths: Vec<String>,
        class_names: Option<Vec<String>>,
        cell_size: usize,
        levels_per_octave: usize,
        prefilter_slack: Option<f32>,
        max_part_displacement: usize,
        parallel: bool,
    ) -> PyResult<Self> {
        let names: Vec<Option<String>> = match class_names {
            Some(names) if names.len() != model_paths.len() => {
                return Err(PyValueError::new_err(
                    "class_names must have one entry per model path",
                ))
            }
            Some(names) => names.into_iter().map(Some).collect(),
            None => vec![None; model_paths.len()],
        };

        let pyramid = PyramidConfig {
            cell_size,
            levels_per_octave,
        };
        pyramid.validate().map_err(to_py_err)?;
        let matching = MatchConfig {
            parallel,
            prefilter_slack: prefilter_slack.unwrap_or(f32::INFINITY),
            max_part_displacement,
        };
        matching.validate().map_err(to_py_err)?;

        let sources = model_paths
            .into_iter()
            .map(JsonModelFile::new)
            .zip(names);
        let (inner, skipped) =
            MultiClassDetector::load(RustDetector::new(pyramid, matching), sources);
        let skipped = skipped
            .into_iter()
            .map(|s| (s.source, s.error.to_string()))
            .collect();
        Ok(Self { inner, skipped })
    }

    /// Detect every class in an image.
    ///
    /// Args:
    ///     image: uint8 numpy array (height x width or height x width x channels)
    ///     overlap_threshold: Suppression threshold in (0, 1] (default: 0.5)
    ///
    /// Returns:
    ///     List of Detection objects grouped by class, best first within a class
    #[pyo3(signature = (image, overlap_threshold = DEFAULT_OVERLAP_THRESHOLD))]
    fn detect(
        &self,
        image: PyReadonlyArrayDyn<'_, u8>,
        overlap_threshold: f32,
    ) -> PyResult<Vec<Detection>> {
        let shape = image.shape();
        let (height, width, channels) = match *shape {
            [h, w] => (h, w, 1),
            [h, w, c] => (h, w, c),
            _ => {
                return Err(PyValueError::new_err(
                    "image must be a 2D or 3D uint8 array",
                ))
            }
        };
        let data = image.as_slice()?;
        let view = ImageView::from_slice(data, width, height, channels).map_err(to_py_err)?;

        let detections = self
            .inner
            .detect(view, overlap_threshold)
            .map_err(to_py_err)?;
        Ok(detections
            .into_iter()
            .map(|det| {
                let name = self.inner.class_name(det.class_id).unwrap_or_default();
                Detection::from_rust(det, name)
            })
            .collect())
    }

    /// Names of the loaded classes, indexed by class id.
    #[getter]
    fn class_names(&self) -> Vec<String> {
        self.inner
            .class_names()
            .into_iter()
            .map(String::from)
            .collect()
    }

    /// Models that failed to load, as (source, error) pairs.
    #[getter]
    fn skipped_models(&self) -> Vec<(String, String)> {
        self.skipped.clone()
    }

    fn __repr__(&self) -> String {
        format!(
            "Detector(classes={}, skipped={})",
            self.inner.class_count(),
            self.skipped.len()
        )
    }
}

/// Python module for dpmatch detection.
#[pymodule]
fn _dpmatch(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<Detection>()?;
    m.add_class::<Detector>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;

    Ok(())
}
