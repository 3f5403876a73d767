use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use crate::frontmatter::types::{HeaderValue, ValueKind};

/// Number of values kept in `top_values` once a tally is finished
pub const TOP_VALUES_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// Value statistics for one field, present only when value analysis is on
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueStats {
    /// Distinct rendered scalar values seen, not capped by the top list
    pub unique_value_count: usize,
    pub top_values: Vec<ValueCount>,
    pub type_distribution: BTreeMap<ValueKind, usize>,
}

/// Accumulator for folding raw values of one field
#[derive(Debug, Default)]
pub struct ValueTally {
    values: Vec<ValueCount>,
    positions: HashMap<String, usize>,
    types: BTreeMap<ValueKind, usize>,
}

impl ValueTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fold(&mut self, value: &HeaderValue) {
        let kind = value.kind();
        *self.types.entry(kind).or_insert(0) += 1;

        if !kind.is_scalar() {
            return;
        }

        let rendered = value.render();
        match self.positions.get(&rendered) {
            Some(&pos) => self.values[pos].count += 1,
            None => {
                self.positions.insert(rendered.clone(), self.values.len());
                self.values.push(ValueCount {
                    value: rendered,
                    count: 1,
                });
            }
        }
    }

    /// Keep the `limit` most frequent values; equal counts keep first-seen order
    pub fn finish(self, limit: usize) -> ValueStats {
        let unique_value_count = self.values.len();
        let mut top_values = self.values;
        // sort_by is stable, so earlier values win ties
        top_values.sort_by(|a, b| b.count.cmp(&a.count));
        top_values.truncate(limit);

        ValueStats {
            unique_value_count,
            top_values,
            type_distribution: self.types,
        }
    }
}
