//! Model search over a feature pyramid.
//!
//! Each component is evaluated at every root level, starting at the
//! pyramid's first root level, that has all of its part levels below it.
//! Placements are prefiltered with the compressed root response, scored
//! exactly, and combined with the distance-transformed part responses.

pub(crate) mod deform;
pub mod estimator;
pub(crate) mod scan;

use crate::candidate::Candidate;
use crate::feature::{CompressedPyramid, FeaturePyramid};
use crate::model::Model;
use crate::trace::{trace_event, trace_span, trace_warn};
use crate::util::{DpmError, DpmResult};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Configuration for the matcher.
#[derive(Clone, Debug)]
pub struct MatchConfig {
    /// Evaluate (component, level) pairs and part responses in parallel.
    /// Requires the `rayon` feature; ignored otherwise.
    pub parallel: bool,
    /// Placements whose compressed root estimate plus bias is below
    /// `score_threshold - prefilter_slack - sum(part maxima)` are skipped,
    /// where each part maximum is its best deformed score on the level.
    /// `f32::INFINITY` disables the prefilter.
    pub prefilter_slack: f32,
    /// Maximum part displacement from its anchor along each axis, in cells.
    pub max_part_displacement: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            parallel: false,
            prefilter_slack: 1.0,
            max_part_displacement: 8,
        }
    }
}

impl MatchConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> DpmResult<()> {
        if self.prefilter_slack.is_nan() || self.prefilter_slack < 0.0 {
            return Err(DpmError::InvalidInput("prefilter_slack must be >= 0"));
        }
        Ok(())
    }
}

/// Search result with the components that had to be skipped.
#[derive(Clone, Debug, Default)]
pub struct SearchReport {
    pub candidates: Vec<Candidate>,
    /// Component index and the `PyramidLevelMismatch` that excluded it.
    pub skipped: Vec<(usize, DpmError)>,
}

/// Searches a pyramid for placements of one model.
#[derive(Clone, Debug)]
pub struct Matcher<'m> {
    model: &'m Model,
    cfg: MatchConfig,
}

impl<'m> Matcher<'m> {
    /// Creates a matcher with the default configuration.
    pub fn new(model: &'m Model) -> Self {
        Self {
            model,
            cfg: MatchConfig::default(),
        }
    }

    /// Overrides the match configuration.
    pub fn with_config(mut self, cfg: MatchConfig) -> Self {
        self.cfg = cfg;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.cfg
    }

    pub fn model(&self) -> &'m Model {
        self.model
    }

    /// Returns every placement scoring strictly above the model threshold.
    ///
    /// Components that do not fit the pyramid are skipped; use
    /// [`Matcher::search_report`] to see which.
    pub fn search(
        &self,
        pyramid: &FeaturePyramid,
        compressed: &CompressedPyramid,
    ) -> DpmResult<Vec<Candidate>> {
        self.search_report(pyramid, compressed)
            .map(|report| report.candidates)
    }

    /// Like [`Matcher::search`], also reporting skipped components.
    pub fn search_report(
        &self,
        pyramid: &FeaturePyramid,
        compressed: &CompressedPyramid,
    ) -> DpmResult<SearchReport> {
        self.cfg.validate()?;
        if !compressed.mirrors(pyramid) {
            return Err(DpmError::InvalidInput(
                "compressed pyramid does not mirror the feature pyramid",
            ));
        }

        let _span = trace_span!(
            "search",
            components = self.model.components().len(),
            levels = pyramid.num_levels()
        )
        .entered();

        let mut skipped = Vec::new();
        let mut tasks = Vec::new();
        for component in 0..self.model.components().len() {
            match self.check_component(component, pyramid, compressed) {
                Ok(first_level) => {
                    tasks.extend((first_level..pyramid.num_levels()).map(|level| (component, level)))
                }
                Err(err) => {
                    trace_warn!(
                        "component_skipped",
                        component = component,
                        error = err.to_string().as_str()
                    );
                    skipped.push((component, err));
                }
            }
        }

        let per_task = self.run_tasks(&tasks, pyramid, compressed);
        let candidates: Vec<Candidate> = per_task.into_iter().flatten().collect();

        trace_event!("search_candidates", count = candidates.len(), skipped = skipped.len());
        Ok(SearchReport {
            candidates,
            skipped,
        })
    }

    fn run_tasks(
        &self,
        tasks: &[(usize, usize)],
        pyramid: &FeaturePyramid,
        compressed: &CompressedPyramid,
    ) -> Vec<Vec<Candidate>> {
        let run = |&(component, level): &(usize, usize)| {
            scan::scan_component_level(self.model, component, pyramid, compressed, level, &self.cfg)
        };
        #[cfg(feature = "rayon")]
        if self.cfg.parallel {
            return tasks.par_iter().map(run).collect();
        }
        tasks.iter().map(run).collect()
    }

    /// Returns the first eligible root level, or why the component cannot
    /// be evaluated on this pyramid.
    fn check_component(
        &self,
        component: usize,
        pyramid: &FeaturePyramid,
        compressed: &CompressedPyramid,
    ) -> DpmResult<usize> {
        let mismatch = |reason| DpmError::PyramidLevelMismatch { component, reason };
        let comp = &self.model.components()[component];

        if comp.root.num_features() != pyramid.num_features() {
            return Err(mismatch("filter feature count differs from the pyramid"));
        }
        let compressed_root = self
            .model
            .compressed_root(component)
            .ok_or_else(|| mismatch("missing compressed root filter"))?;
        if compressed_root.num_features() != compressed.num_features() {
            return Err(mismatch(
                "compressed filter feature count differs from the compressed pyramid",
            ));
        }
        if comp.parts.iter().any(|p| p.anchor().level_offset == 0) {
            return Err(mismatch("part level offset must be at least 1"));
        }
        let max_offset = comp.max_level_offset();
        if max_offset >= pyramid.num_levels() {
            return Err(mismatch("part anchor references a level outside the pyramid"));
        }
        Ok(max_offset.max(pyramid.first_root_level()))
    }
}
