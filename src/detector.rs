//! End-to-end detection: pyramid, search, clipping and suppression.

use crate::candidate::nms::suppress;
use crate::candidate::{BoundingBox, Candidate};
use crate::feature::{PyramidBuilder, PyramidConfig};
use crate::image::ImageView;
use crate::model::source::{default_class_name, ModelSource};
use crate::model::Model;
use crate::search::{MatchConfig, Matcher};
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{DpmError, DpmResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Overlap threshold used when the caller has no preference.
pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.5;

/// Final detection in image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub score: f32,
    /// Index of the model (class) that produced the detection.
    pub class_id: usize,
}

/// Single-model detector.
#[derive(Clone, Debug, Default)]
pub struct Detector {
    pyramid: PyramidConfig,
    matching: MatchConfig,
}

fn check_overlap(overlap_threshold: f32) -> DpmResult<()> {
    if overlap_threshold > 0.0 && overlap_threshold <= 1.0 {
        Ok(())
    } else {
        Err(DpmError::InvalidInput("overlap threshold must be in (0, 1]"))
    }
}

impl Detector {
    pub fn new(pyramid: PyramidConfig, matching: MatchConfig) -> Self {
        Self { pyramid, matching }
    }

    pub fn pyramid_config(&self) -> &PyramidConfig {
        &self.pyramid
    }

    pub fn match_config(&self) -> &MatchConfig {
        &self.matching
    }

    /// Detects `model` in `image`; every detection gets `class_id` 0.
    pub fn detect(
        &self,
        image: ImageView<'_>,
        model: &Model,
        overlap_threshold: f32,
    ) -> DpmResult<Vec<Detection>> {
        self.detect_class(image, model, overlap_threshold, 0)
    }

    /// Detects `model` and tags the detections with `class_id`.
    pub fn detect_class(
        &self,
        image: ImageView<'_>,
        model: &Model,
        overlap_threshold: f32,
        class_id: usize,
    ) -> DpmResult<Vec<Detection>> {
        let _span = trace_span!("detect", class_id = class_id).entered();
        let kept = self.detect_candidates(image, model, overlap_threshold)?;
        Ok(kept
            .into_iter()
            .map(|c| Detection {
                bbox: c.bbox,
                score: c.score,
                class_id,
            })
            .collect())
    }

    /// Runs the pipeline and returns the surviving candidates with their
    /// part boxes, clipped to the image.
    pub fn detect_candidates(
        &self,
        image: ImageView<'_>,
        model: &Model,
        overlap_threshold: f32,
    ) -> DpmResult<Vec<Candidate>> {
        check_overlap(overlap_threshold)?;
        self.matching.validate()?;

        let builder = PyramidBuilder::new(self.pyramid.clone());
        // No feature cell means nothing can be found.
        let Some((pyramid, compressed)) =
            builder.try_build(image, model.max_filter_dims(), model.projection())?
        else {
            return Ok(Vec::new());
        };
        let candidates = Matcher::new(model)
            .with_config(self.matching.clone())
            .search(&pyramid, &compressed)?;

        let (width, height) = (image.width(), image.height());
        let clipped: Vec<Candidate> = candidates
            .into_iter()
            .map(|c| c.clip(width, height))
            .collect();
        suppress(clipped, overlap_threshold)
    }
}

/// A loaded model with its class name.
#[derive(Clone, Debug)]
pub struct ClassModel {
    pub name: String,
    pub model: Model,
}

/// A model source that failed to load.
#[derive(Clone, Debug, PartialEq)]
pub struct SkippedModel {
    pub source: String,
    pub error: DpmError,
}

/// Runs several independent class models over the same image.
///
/// Detections of different classes never suppress each other.
#[derive(Clone, Debug, Default)]
pub struct MultiClassDetector {
    detector: Detector,
    classes: Vec<ClassModel>,
}

impl MultiClassDetector {
    /// Creates an empty facade.
    pub fn new(detector: Detector) -> Self {
        Self {
            detector,
            classes: Vec::new(),
        }
    }

    /// Loads every source in order. Sources that fail are returned in the
    /// skip list; the remaining ones get consecutive class ids.
    ///
    /// A missing class name defaults to the file stem of the source.
    pub fn load<S, I>(detector: Detector, sources: I) -> (Self, Vec<SkippedModel>)
    where
        S: ModelSource,
        I: IntoIterator<Item = (S, Option<String>)>,
    {
        let mut facade = Self::new(detector);
        let mut skipped = Vec::new();
        for (source, name) in sources {
            let described = source.describe();
            match source.load() {
                Ok(model) => {
                    let name = name.unwrap_or_else(|| default_class_name(&described));
                    facade.push(name, model);
                }
                Err(error) => {
                    trace_warn!(
                        "model_skipped",
                        source = described.as_str(),
                        error = error.to_string().as_str()
                    );
                    skipped.push(SkippedModel {
                        source: described,
                        error,
                    });
                }
            }
        }
        trace_event!("models_loaded", count = facade.classes.len(), skipped = skipped.len());
        (facade, skipped)
    }

    /// Adds a class and returns its id.
    pub fn push(&mut self, name: impl Into<String>, model: Model) -> usize {
        self.classes.push(ClassModel {
            name: name.into(),
            model,
        });
        self.classes.len() - 1
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn classes(&self) -> &[ClassModel] {
        &self.classes
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Name of class `class_id`.
    pub fn class_name(&self, class_id: usize) -> Option<&str> {
        self.classes.get(class_id).map(|c| c.name.as_str())
    }

    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    /// Detects every class. Results are grouped by class id, each group in
    /// suppression order.
    pub fn detect(
        &self,
        image: ImageView<'_>,
        overlap_threshold: f32,
    ) -> DpmResult<Vec<Detection>> {
        check_overlap(overlap_threshold)?;
        let per_class = self.detect_per_class(image, overlap_threshold);
        let mut out = Vec::new();
        for detections in per_class {
            out.extend(detections?);
        }
        Ok(out)
    }

    fn detect_per_class(
        &self,
        image: ImageView<'_>,
        overlap_threshold: f32,
    ) -> Vec<DpmResult<Vec<Detection>>> {
        let run = |(class_id, class): (usize, &ClassModel)| {
            self.detector
                .detect_class(image, &class.model, overlap_threshold, class_id)
        };
        #[cfg(feature = "rayon")]
        if self.detector.matching.parallel {
            return self.classes.par_iter().enumerate().map(run).collect();
        }
        self.classes.iter().enumerate().map(run).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{check_overlap, Detector, MultiClassDetector};
    use crate::model::source::LoadFn;
    use crate::model::{Component, Filter, Model, Projection};
    use crate::util::DpmError;

    fn tiny_model() -> crate::util::DpmResult<Model> {
        let root = Filter::new(1, 1, 32, vec![0.0; 32])?;
        Model::new(
            vec![Component::new(root, vec![], 0.0)],
            0.0,
            Projection::truncating(31, 4)?,
        )
    }

    fn broken_model() -> crate::util::DpmResult<Model> {
        Err(DpmError::LoadFailure {
            source_name: "models/broken.json".to_string(),
            reason: "truncated".to_string(),
        })
    }

    #[test]
    fn overlap_threshold_bounds() {
        assert!(check_overlap(0.5).is_ok());
        assert!(check_overlap(1.0).is_ok());
        assert!(check_overlap(0.0).is_err());
        assert!(check_overlap(f32::NAN).is_err());
    }

    #[test]
    fn load_skips_failed_sources_and_names_from_stem() {
        let sources = vec![
            (
                LoadFn::new("models/person.json", tiny_model as fn() -> _),
                None,
            ),
            (
                LoadFn::new("models/broken.json", broken_model as fn() -> _),
                None,
            ),
            (
                LoadFn::new("car.json", tiny_model as fn() -> _),
                Some("vehicle".to_string()),
            ),
        ];
        let (facade, skipped) = MultiClassDetector::load(Detector::default(), sources);
        assert_eq!(facade.class_names(), vec!["person", "vehicle"]);
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].source, "models/broken.json");
    }
}
