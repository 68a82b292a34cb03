//! Model sources for the multi-class facade.

use crate::model::Model;
use crate::util::DpmResult;
use std::path::Path;

/// Anything that can produce a validated `Model`.
pub trait ModelSource {
    /// Identifier used in load reports and to derive default class names.
    fn describe(&self) -> String;

    /// Loads and validates the model.
    fn load(&self) -> DpmResult<Model>;
}

/// Model source backed by a closure.
pub struct LoadFn<F> {
    name: String,
    load: F,
}

impl<F> LoadFn<F>
where
    F: Fn() -> DpmResult<Model>,
{
    pub fn new(name: impl Into<String>, load: F) -> Self {
        Self {
            name: name.into(),
            load,
        }
    }
}

impl<F> ModelSource for LoadFn<F>
where
    F: Fn() -> DpmResult<Model>,
{
    fn describe(&self) -> String {
        self.name.clone()
    }

    fn load(&self) -> DpmResult<Model> {
        (self.load)()
    }
}

/// Derives a class name from a source identifier: the file stem of a path,
/// e.g. `models/person.json` becomes `person`.
pub fn default_class_name(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or(source)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::default_class_name;

    #[test]
    fn class_name_is_file_stem() {
        assert_eq!(default_class_name("models/person.json"), "person");
        assert_eq!(default_class_name("car.xml"), "car");
        assert_eq!(default_class_name("bicycle"), "bicycle");
    }
}
