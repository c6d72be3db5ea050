use hr_core::core::ValidationError;
use ndarray::{Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ForestParams
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 15,
            min_samples_split: 10,
            min_samples_leaf: 4,
            seed: 42,
        }
    }
}

// ---------------------------------------------------------------------------
// DecisionTree: flat node arena, root at index 0
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    /// Fraction of positive samples that reached this leaf.
    Leaf { proba: f64 },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    fn predict_one(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { proba }) => return *proba,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                None => return 0.0,
            }
        }
    }
}

fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// n_left * gini_left + n_right * gini_right
    weighted_impurity: f64,
}

struct TreeBuilder<'a, 'p> {
    x: ArrayView2<'a, f64>,
    y: &'p [u8],
    params: &'p ForestParams,
    max_features: usize,
    rng: StdRng,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl TreeBuilder<'_, '_> {
    fn build(&mut self, samples: &mut [usize], depth: usize) -> usize {
        let n = samples.len();
        let pos = samples.iter().filter(|&&i| self.y[i] == 1).count();
        let node = self.nodes.len();
        self.nodes.push(Node::Leaf {
            proba: pos as f64 / n as f64,
        });

        let pure = pos == 0 || pos == n;
        if pure
            || depth >= self.params.max_depth
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
        {
            return node;
        }

        let Some(split) = self.best_split(samples, pos) else {
            return node;
        };

        let gain = n as f64 * gini(pos, n) - split.weighted_impurity;
        self.importances[split.feature] += gain.max(0.0);

        let x = self.x;
        let mut boundary = 0;
        for k in 0..n {
            if x[[samples[k], split.feature]] <= split.threshold {
                samples.swap(k, boundary);
                boundary += 1;
            }
        }
        let (left_samples, right_samples) = samples.split_at_mut(boundary);
        let left = self.build(left_samples, depth + 1);
        let right = self.build(right_samples, depth + 1);
        self.nodes[node] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node
    }

    /// Lowest weighted gini split over randomly drawn features. Features that
    /// are constant within the node do not count toward `max_features`.
    fn best_split(&mut self, samples: &[usize], pos: usize) -> Option<SplitCandidate> {
        let n = samples.len();
        let n_features = self.x.ncols();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let order = rand::seq::index::sample(&mut self.rng, n_features, n_features);

        let mut best: Option<SplitCandidate> = None;
        let mut visited = 0;
        let mut pairs: Vec<(f64, u8)> = Vec::with_capacity(n);

        for feature in order.iter() {
            if visited >= self.max_features {
                break;
            }
            pairs.clear();
            pairs.extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));
            if pairs[0].0 == pairs[n - 1].0 {
                continue;
            }
            visited += 1;

            let mut left_pos = 0;
            for k in 0..n - 1 {
                left_pos += usize::from(pairs[k].1 == 1);
                if pairs[k].0 == pairs[k + 1].0 {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let weighted_impurity = n_left as f64 * gini(left_pos, n_left)
                    + n_right as f64 * gini(pos - left_pos, n_right);
                if best
                    .as_ref()
                    .is_some_and(|b| b.weighted_impurity <= weighted_impurity)
                {
                    continue;
                }
                let mut threshold = (pairs[k].0 + pairs[k + 1].0) / 2.0;
                if threshold >= pairs[k + 1].0 {
                    threshold = pairs[k].0;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    weighted_impurity,
                });
            }
        }
        best
    }
}

// ---------------------------------------------------------------------------
// RandomForest: bagged gini trees for a binary target
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    trees: Vec<DecisionTree>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Fits `params.n_estimators` trees on bootstrap samples of `(x, y)`.
    ///
    /// Every split considers `floor(sqrt(n_features))` features. The same
    /// inputs and seed always produce the same forest.
    pub fn fit(
        x: ArrayView2<'_, f64>,
        y: &[u8],
        params: ForestParams,
    ) -> Result<Self, ValidationError> {
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || y.len() != n_samples {
            return Err(ValidationError::EmptyDataset);
        }
        if n_features == 0 {
            return Err(ValidationError::NoFeatures);
        }

        let max_features = ((n_features as f64).sqrt().floor() as usize).max(1);
        let mut master = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        let mut importance_sum = vec![0.0; n_features];

        for _ in 0..params.n_estimators {
            let mut rng = StdRng::seed_from_u64(master.random::<u64>());
            let mut samples: Vec<usize> = (0..n_samples)
                .map(|_| rng.random_range(0..n_samples))
                .collect();

            let mut builder = TreeBuilder {
                x,
                y,
                params: &params,
                max_features,
                rng,
                nodes: Vec::new(),
                importances: vec![0.0; n_features],
            };
            builder.build(&mut samples, 0);

            let total: f64 = builder.importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importance_sum.iter_mut().zip(&builder.importances) {
                    *acc += value / total;
                }
            }
            trees.push(DecisionTree {
                nodes: builder.nodes,
            });
        }

        let total: f64 = importance_sum.iter().sum();
        let feature_importances = if total > 0.0 {
            importance_sum.iter().map(|v| v / total).collect()
        } else {
            importance_sum
        };

        Ok(Self {
            params,
            n_features,
            trees,
            feature_importances,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Mean decrease in impurity per feature, summing to 1 unless no tree split.
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }

    /// Positive-class probability per row, averaged over trees.
    pub fn predict_positive(&self, x: ArrayView2<'_, f64>) -> Vec<f64> {
        let n_trees = self.trees.len().max(1) as f64;
        x.rows()
            .into_iter()
            .map(|row| {
                let sum: f64 = self.trees.iter().map(|t| t.predict_one(row)).sum();
                sum / n_trees
            })
            .collect()
    }

    /// `N × 2` matrix of `[P(stay), P(leave)]`.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let positive = self.predict_positive(x);
        let mut proba = Array2::<f64>::zeros((positive.len(), 2));
        for (i, p) in positive.into_iter().enumerate() {
            proba[[i, 0]] = 1.0 - p;
            proba[[i, 1]] = p;
        }
        proba
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
