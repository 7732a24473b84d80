//! Progress bookkeeping for fields, categories, uploads and the run.
//!
//! These are plain values. The pipeline mutates them and hands snapshots to
//! the observer; nothing here is shared across tasks.

use std::collections::BTreeMap;

use canopy_common::{Category, FieldKey};
use serde::{Deserialize, Serialize};

use super::fields::FieldSchema;

/// Field counter for the active item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProgress {
    pub completed: usize,
    pub total: usize,
}

impl FieldProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
        }
    }
}

/// Fill status of one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Idle,
    Filling,
    Done,
}

/// Progress of one category for the active item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryState {
    pub total: usize,
    pub completed: usize,
    pub status: CategoryStatus,
}

/// Per-category progress, rebuilt for every item.
///
/// `completed` only grows and never exceeds `total`; status moves
/// idle -> filling -> done and reaches done exactly when
/// `completed == total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryProgress {
    categories: BTreeMap<Category, CategoryState>,
}

impl CategoryProgress {
    /// Fresh progress with every used category idle.
    pub fn new(schema: &FieldSchema) -> Self {
        let categories = schema
            .categories()
            .map(|(category, total)| {
                (
                    category,
                    CategoryState {
                        total,
                        completed: 0,
                        status: CategoryStatus::Idle,
                    },
                )
            })
            .collect();
        Self { categories }
    }

    /// Mark the field's category as filling. Returns the updated state when
    /// the status changed.
    pub fn start_field(&mut self, field: FieldKey) -> Option<(Category, CategoryState)> {
        let category = field.category();
        let state = self.categories.get_mut(&category)?;
        if state.status != CategoryStatus::Idle {
            return None;
        }
        state.status = CategoryStatus::Filling;
        Some((category, *state))
    }

    /// Count one completed field towards its category.
    pub fn complete_field(&mut self, field: FieldKey) -> Option<(Category, CategoryState)> {
        let category = field.category();
        let state = self.categories.get_mut(&category)?;
        if state.completed < state.total {
            state.completed += 1;
        }
        state.status = if state.completed == state.total {
            CategoryStatus::Done
        } else {
            CategoryStatus::Filling
        };
        Some((category, *state))
    }

    pub fn get(&self, category: Category) -> Option<&CategoryState> {
        self.categories.get(&category)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &CategoryState)> {
        self.categories.iter().map(|(c, s)| (*c, s))
    }

    /// Sum of `completed` across categories.
    pub fn completed_sum(&self) -> usize {
        self.categories.values().map(|s| s.completed).sum()
    }

    pub fn all_done(&self) -> bool {
        self.categories
            .values()
            .all(|s| s.status == CategoryStatus::Done)
    }
}

/// Upload counters for one item.
///
/// `uploaded + failed <= current <= total` holds at every point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUploadProgress {
    pub current: usize,
    pub total: usize,
    pub uploaded: usize,
    pub failed: usize,
}

impl ImageUploadProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Count the start of one attempt.
    pub fn begin(&mut self) {
        if self.current < self.total {
            self.current += 1;
        }
    }

    /// Record the result of the attempt started last.
    pub fn finish(&mut self, success: bool) {
        if self.uploaded + self.failed >= self.current {
            return;
        }
        if success {
            self.uploaded += 1;
        } else {
            self.failed += 1;
        }
    }
}

/// Position of the run within its queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverallProgress {
    pub current: usize,
    pub total: usize,
}

/// Run-level state owned by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub running: bool,
    pub overall_progress: OverallProgress,
    pub current_item_name: Option<String>,
    pub cancellation_requested: bool,
}
