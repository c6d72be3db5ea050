use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::dataset::Column;

/// Maps the categories of a text column onto `0..n` in sorted order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Learns the distinct present values of `column`.
    pub fn fit(column: &Column) -> Self {
        let classes: BTreeSet<String> = column.cells().iter().filter_map(|c| c.category()).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Code of `category`, or `None` when it was not seen during fitting.
    pub fn encode(&self, category: &str) -> Option<f64> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(category))
            .ok()
            .map(|idx| idx as f64)
    }

    /// Encodes a whole column; missing and unseen values become NaN.
    pub fn transform(&self, column: &Column) -> Vec<f64> {
        column
            .cells()
            .iter()
            .map(|cell| {
                cell.category()
                    .and_then(|c| self.encode(&c))
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_sorts_classes() {
        let column = Column::text("Department", ["Sales", "HR", "", "Research", "Sales"]);
        let encoder = LabelEncoder::fit(&column);
        assert_eq!(encoder.classes(), ["HR", "Research", "Sales"]);
    }

    #[test]
    fn test_transform_marks_unseen_and_missing() {
        let train = Column::text("Department", ["Sales", "HR"]);
        let encoder = LabelEncoder::fit(&train);

        let input = Column::text("Department", ["HR", "Legal", "NA", "Sales"]);
        let codes = encoder.transform(&input);
        assert_eq!(codes[0], 0.0);
        assert!(codes[1].is_nan());
        assert!(codes[2].is_nan());
        assert_eq!(codes[3], 1.0);
    }
}
