//! The ordered list of fields one enrichment run fills.

use std::collections::{BTreeMap, HashSet};

use canopy_common::{Category, Error, FieldKey, Result};

/// A validated, ordered selection of catalog fields.
///
/// Fields are filled in the order given. Each field belongs to exactly one
/// [`Category`]; category totals are computed once here and never change
/// during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    fields: Vec<FieldKey>,
    totals: BTreeMap<Category, usize>,
}

impl FieldSchema {
    /// Build a schema from an explicit field list.
    ///
    /// Rejects an empty list and duplicate fields.
    pub fn new(fields: Vec<FieldKey>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::config("field list must not be empty"));
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if !seen.insert(*field) {
                return Err(Error::config(format!("field '{field}' is listed twice")));
            }
        }

        let mut totals = BTreeMap::new();
        for field in &fields {
            *totals.entry(field.category()).or_insert(0) += 1;
        }

        Ok(Self { fields, totals })
    }

    /// Every known field, in canonical order.
    pub fn full() -> Self {
        let fields = FieldKey::ALL.to_vec();
        let mut totals = BTreeMap::new();
        for field in &fields {
            *totals.entry(field.category()).or_insert(0) += 1;
        }
        Self { fields, totals }
    }

    pub fn fields(&self) -> &[FieldKey] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields in `category` (0 if the category is unused).
    pub fn category_total(&self, category: Category) -> usize {
        self.totals.get(&category).copied().unwrap_or(0)
    }

    /// Categories with at least one field, with their totals.
    pub fn categories(&self) -> impl Iterator<Item = (Category, usize)> + '_ {
        self.totals.iter().map(|(c, n)| (*c, *n))
    }
}

impl Default for FieldSchema {
    fn default() -> Self {
        Self::full()
    }
}
