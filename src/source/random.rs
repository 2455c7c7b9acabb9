//! Test source: random values, no OS dependencies.

use rand::Rng;

use crate::error::Result;
use crate::model::Fields;

use super::Source;

/// Field names produced by [`RandomSource::new`].
pub const TEST_FIELDS: [&str; 2] = ["thing1", "thing2"];

/// Generates a fresh random integer in `1..=999_999` for each field on every read.
#[derive(Debug, Clone)]
pub struct RandomSource {
    fields: &'static [&'static str],
}

impl RandomSource {
    /// Two fields: `thing1`, `thing2`.
    pub fn new() -> Self {
        Self {
            fields: &TEST_FIELDS,
        }
    }

    /// A source with caller-chosen field names.
    pub fn with_fields(fields: &'static [&'static str]) -> Self {
        Self { fields }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl Source for RandomSource {
    fn kind(&self) -> &'static str {
        "test"
    }

    fn field_names(&self) -> &[&'static str] {
        self.fields
    }

    fn read(&mut self) -> Result<Fields> {
        let mut rng = rand::rng();
        Ok(self
            .fields
            .iter()
            .map(|name| (*name, rng.random_range(1_i64..=999_999)))
            .collect())
    }
}
