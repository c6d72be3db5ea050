use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::core::{weights_for_metrics, Candidate, CandidateId, NormalizedWeights, Weights};

// ---------------------------------------------------------------------------
// RankedTable: candidates ordered by weighted score with dense ranks
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RankedRow {
    pub candidate: Candidate,
    pub weighted_score: f64,
    /// Dense, 1-based.
    pub rank: u32,
    /// Candidate's rating for every metric in the table, `None` where unrated.
    pub metric_values: BTreeMap<String, Option<f64>>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RankedTable {
    /// Sorted union of metrics observed across the ranked candidates.
    pub metrics: Vec<String>,
    /// Normalized weights applied to `metrics`; empty on the overall-score fallback.
    pub weights: NormalizedWeights,
    pub rows: Vec<RankedRow>,
}

impl RankedTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn top(&self) -> Option<&RankedRow> {
        self.rows.first()
    }

    pub fn position_of(&self, id: &CandidateId) -> Option<&RankedRow> {
        self.rows.iter().find(|row| &row.candidate.id == id)
    }
}

/// Sorted union of metric names across all candidates.
pub fn metric_union(candidates: &[Candidate]) -> Vec<String> {
    candidates
        .iter()
        .flat_map(|c| c.scores.metrics())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect()
}

// ---------------------------------------------------------------------------
// rank_candidates
// ---------------------------------------------------------------------------

/// Ranks candidates by weighted score over the union of their metrics.
///
/// A candidate missing a metric scores 0 on it. If no candidate has any
/// per-metric score, the overall score is ranked instead. Rows are sorted by
/// descending score; equal scores keep their input order and share a rank.
pub fn rank_candidates(candidates: &[Candidate], weights: Option<&Weights>) -> RankedTable {
    if candidates.is_empty() {
        return RankedTable::default();
    }

    let metrics = metric_union(candidates);
    if metrics.is_empty() {
        let rows = candidates
            .iter()
            .map(|c| RankedRow {
                candidate: c.clone(),
                weighted_score: c.overall_or_zero(),
                rank: 0,
                metric_values: BTreeMap::new(),
            })
            .collect();
        return RankedTable {
            metrics,
            weights: NormalizedWeights::new(),
            rows: sort_and_rank(rows),
        };
    }

    let normalized = weights_for_metrics(weights, &metrics);
    let rows = candidates
        .iter()
        .map(|c| {
            let weighted_score = metrics
                .iter()
                .map(|m| c.scores.value(m) * normalized.get(m).copied().unwrap_or(0.0))
                .sum();
            let metric_values = metrics
                .iter()
                .map(|m| (m.clone(), c.scores.get(m)))
                .collect();
            RankedRow {
                candidate: c.clone(),
                weighted_score,
                rank: 0,
                metric_values,
            }
        })
        .collect();

    RankedTable {
        metrics,
        weights: normalized,
        rows: sort_and_rank(rows),
    }
}

fn sort_and_rank(mut rows: Vec<RankedRow>) -> Vec<RankedRow> {
    // Vec::sort_by is stable, so ties keep input order.
    rows.sort_by(|a, b| descending(a.weighted_score, b.weighted_score));

    let mut rank = 0u32;
    let mut previous: Option<f64> = None;
    for row in &mut rows {
        if previous != Some(row.weighted_score) {
            rank += 1;
            previous = Some(row.weighted_score);
        }
        row.rank = rank;
    }
    rows
}

fn descending(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

// ---------------------------------------------------------------------------
// prepare_input_for_model: numeric projection keyed by metric
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ModelInputRow {
    pub name: String,
    pub id: CandidateId,
    /// One value per entry in `ModelInput::metrics`, same order.
    pub values: Vec<f64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ModelInput {
    pub metrics: Vec<String>,
    pub rows: Vec<ModelInputRow>,
}

impl ModelInput {
    pub fn column(&self, metric: &str) -> Option<Vec<f64>> {
        let idx = self.metrics.iter().position(|m| m == metric)?;
        Some(self.rows.iter().map(|r| r.values[idx]).collect())
    }
}

/// Projects candidates into a numeric table, one column per metric.
///
/// `metrics` fixes the columns and their order; when omitted the sorted union
/// of observed metrics is used. Missing ratings become 0.0.
pub fn prepare_input_for_model(candidates: &[Candidate], metrics: Option<&[String]>) -> ModelInput {
    if candidates.is_empty() {
        return ModelInput::default();
    }

    let metrics = match metrics {
        Some(m) => m.to_vec(),
        None => metric_union(candidates),
    };
    let rows = candidates
        .iter()
        .map(|c| ModelInputRow {
            name: c.name.clone(),
            id: c.id.clone(),
            values: metrics.iter().map(|m| c.scores.value(m)).collect(),
        })
        .collect();

    ModelInput { metrics, rows }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn scored(name: &str, scores: &[(&str, f64)]) -> Candidate {
        let mut c = Candidate::new(name, "Dev").with_id(name);
        for (m, v) in scores {
            c.scores.insert(*m, *v);
        }
        c
    }

    fn names(table: &RankedTable) -> Vec<&str> {
        table.rows.iter().map(|r| r.candidate.name.as_str()).collect()
    }

    fn assert_dense(table: &RankedTable) {
        for pair in table.rows.windows(2) {
            assert!(pair[0].weighted_score >= pair[1].weighted_score);
            if pair[0].weighted_score == pair[1].weighted_score {
                assert_eq!(pair[0].rank, pair[1].rank);
            } else {
                assert_eq!(pair[0].rank + 1, pair[1].rank);
            }
        }
        if let Some(first) = table.rows.first() {
            assert_eq!(first.rank, 1);
        }
    }

    #[test]
    fn test_rank_with_weights() {
        let candidates = vec![
            scored("Alice", &[("Communication", 8.0), ("Technical Skills", 9.0)]),
            scored("Bob", &[("Communication", 7.0), ("Technical Skills", 6.0)]),
            scored("Carol", &[("Communication", 9.0), ("Technical Skills", 8.0)]),
        ];
        let w = Weights::from_pairs([("Communication", 0.2), ("Technical Skills", 0.8)])
            .expect("valid weights");

        let table = rank_candidates(&candidates, Some(&w));

        assert_eq!(names(&table), vec!["Alice", "Carol", "Bob"]);
        assert_eq!(
            table.rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!((table.rows[0].weighted_score - 8.8).abs() < EPS);
        assert_dense(&table);
    }

    #[test]
    fn test_rank_ties_share_rank_and_keep_input_order() {
        let candidates = vec![
            scored("A", &[("X", 5.0)]),
            scored("B", &[("X", 9.0)]),
            scored("C", &[("X", 5.0)]),
            scored("D", &[("X", 1.0)]),
        ];
        let table = rank_candidates(&candidates, None);

        assert_eq!(names(&table), vec!["B", "A", "C", "D"]);
        assert_eq!(
            table.rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 2, 3]
        );
        assert_dense(&table);
    }

    #[test]
    fn test_rank_missing_metric_counts_as_zero() {
        let candidates = vec![
            scored("A", &[("X", 10.0)]),
            scored("B", &[("X", 6.0), ("Y", 6.0)]),
        ];
        let table = rank_candidates(&candidates, None);

        assert_eq!(table.metrics, vec!["X", "Y"]);
        assert_eq!(names(&table), vec!["B", "A"]);
        assert!((table.rows[1].weighted_score - 5.0).abs() < EPS);
        assert_eq!(table.rows[1].metric_values["Y"], None);
        assert_eq!(table.rows[0].metric_values["Y"], Some(6.0));
    }

    #[test]
    fn test_rank_weights_outside_union_fall_back_to_equal() {
        let candidates = vec![scored("A", &[("X", 2.0), ("Y", 4.0)])];
        let w = Weights::from_pairs([("Z", 1.0)]).expect("valid weights");
        let table = rank_candidates(&candidates, Some(&w));

        assert!((table.weights["X"] - 0.5).abs() < EPS);
        assert!((table.rows[0].weighted_score - 3.0).abs() < EPS);
    }

    #[test]
    fn test_rank_zero_weights_fall_back_to_equal_over_union() {
        let candidates = vec![scored("A", &[("X", 2.0), ("Y", 4.0), ("Z", 6.0)])];
        let w = Weights::from_pairs([("X", 0.0)]).expect("valid weights");
        let table = rank_candidates(&candidates, Some(&w));

        assert!((table.rows[0].weighted_score - 4.0).abs() < EPS);
        let total: f64 = table.weights.values().sum();
        assert!((total - 1.0).abs() < EPS);
    }

    #[test]
    fn test_rank_unweighted_union_metrics_get_zero() {
        let candidates = vec![scored("A", &[("X", 2.0), ("Y", 10.0)])];
        let w = Weights::from_pairs([("X", 3.0)]).expect("valid weights");
        let table = rank_candidates(&candidates, Some(&w));

        assert!((table.weights["X"] - 1.0).abs() < EPS);
        assert!(table.weights["Y"].abs() < EPS);
        assert!((table.rows[0].weighted_score - 2.0).abs() < EPS);
    }

    #[test]
    fn test_rank_overall_score_fallback() {
        let candidates = vec![
            Candidate::new("A", "Dev").with_overall(6.0),
            Candidate::new("B", "Dev"),
            Candidate::new("C", "Dev").with_overall(9.0),
            Candidate::new("D", "Dev").with_overall(6.0),
        ];
        let table = rank_candidates(&candidates, None);

        assert!(table.metrics.is_empty());
        assert!(table.weights.is_empty());
        assert_eq!(names(&table), vec!["C", "A", "D", "B"]);
        assert_eq!(
            table.rows.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 2, 3]
        );
        assert_eq!(table.rows[3].weighted_score, 0.0);
    }

    #[test]
    fn test_rank_empty_input() {
        let table = rank_candidates(&[], None);
        assert!(table.is_empty());
        assert!(table.top().is_none());
    }

    #[test]
    fn test_position_of() {
        let candidates = vec![scored("A", &[("X", 1.0)]), scored("B", &[("X", 2.0)])];
        let table = rank_candidates(&candidates, None);
        let row = table
            .position_of(&CandidateId::new("A"))
            .expect("candidate A ranked");
        assert_eq!(row.rank, 2);
    }

    // -- prepare_input_for_model --

    #[test]
    fn test_prepare_input_union_sorted() {
        let candidates = vec![
            scored("A", &[("Zeta", 1.0)]),
            scored("B", &[("Alpha", 2.0), ("Zeta", 3.0)]),
        ];
        let input = prepare_input_for_model(&candidates, None);

        assert_eq!(input.metrics, vec!["Alpha", "Zeta"]);
        assert_eq!(input.rows[0].values, vec![0.0, 1.0]);
        assert_eq!(input.rows[1].values, vec![2.0, 3.0]);
        assert_eq!(input.rows[1].name, "B");
        assert_eq!(input.rows[1].id, CandidateId::new("B"));
    }

    #[test]
    fn test_prepare_input_explicit_metrics() {
        let candidates = vec![scored("A", &[("X", 4.0), ("Y", 5.0)])];
        let metrics = vec!["Y".to_owned(), "Missing".to_owned()];
        let input = prepare_input_for_model(&candidates, Some(&metrics));

        assert_eq!(input.metrics, metrics);
        assert_eq!(input.rows[0].values, vec![5.0, 0.0]);
        assert_eq!(input.column("Y"), Some(vec![5.0]));
        assert_eq!(input.column("X"), None);
    }

    #[test]
    fn test_prepare_input_empty() {
        assert!(prepare_input_for_model(&[], None).rows.is_empty());
    }
}
