//! The ordered genre label space.

use cadence_settings::check_genres;

use crate::errors::LoadError;

/// Index-to-name mapping for classifier outputs. Non-empty, unique, fixed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenreLabels(Vec<String>);

impl GenreLabels {
    /// Validate and wrap a label list.
    pub fn new(labels: Vec<String>) -> Result<Self, LoadError> {
        check_genres(&labels).map_err(LoadError::InvalidLabels)?;
        Ok(Self(labels))
    }

    /// Number of genres.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a constructed value.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Name at `index`.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Index of `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|l| l == name)
    }

    /// Labels in order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterate labels in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}
