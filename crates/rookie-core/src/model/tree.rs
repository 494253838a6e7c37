// CART regression tree (squared error, exhaustive splits, unlimited depth).

use serde::{Deserialize, Serialize};

use crate::model::Matrix;

/// Nodes holding fewer samples than this become leaves.
const MIN_SAMPLES_SPLIT: usize = 2;

/// Consecutive sorted values closer than this are not split between.
const FEATURE_THRESHOLD: f64 = 1e-7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A fitted tree stored as a flat node list with the root at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
}

struct Task {
    node: usize,
    samples: Vec<usize>,
}

impl RegressionTree {
    /// Grow a tree on the rows of `x` listed in `samples`. Duplicate indices
    /// are allowed and count as separate samples (bootstrap draws).
    pub fn fit(x: &Matrix, y: &[f64], samples: Vec<usize>) -> Self {
        let placeholder = Node::Leaf { value: 0.0 };
        let mut nodes = vec![placeholder.clone()];
        let mut stack = vec![Task { node: 0, samples }];

        while let Some(Task { node, samples }) = stack.pop() {
            let value = mean(y, &samples);
            let Some(split) = best_split(x, y, &samples) else {
                nodes[node] = Node::Leaf { value };
                continue;
            };

            let (left_samples, right_samples): (Vec<usize>, Vec<usize>) = samples
                .iter()
                .partition(|&&i| x.get(i, split.feature) <= split.threshold);

            let left = nodes.len();
            nodes.push(placeholder.clone());
            let right = nodes.len();
            nodes.push(placeholder.clone());
            nodes[node] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left,
                right,
            };

            stack.push(Task {
                node: right,
                samples: right_samples,
            });
            stack.push(Task {
                node: left,
                samples: left_samples,
            });
        }

        Self { nodes }
    }

    pub fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        let mut max_depth = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, d)) = stack.pop() {
            max_depth = max_depth.max(d);
            if let Node::Split { left, right, .. } = &self.nodes[idx] {
                stack.push((*left, d + 1));
                stack.push((*right, d + 1));
            }
        }
        max_depth
    }

    /// Structural check for trees read from disk: non-empty, every child
    /// index points forward and in bounds (so traversal terminates), and
    /// every split feature is below `n_features`.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let links_ok = self.nodes.iter().enumerate().all(|(idx, node)| match node {
            Node::Split { left, right, .. } => {
                *left > idx && *right > idx && *left < self.nodes.len() && *right < self.nodes.len()
            }
            Node::Leaf { .. } => true,
        });
        links_ok && self.max_feature().map_or(true, |f| f < n_features)
    }

    /// Largest feature index referenced by any split.
    pub fn max_feature(&self) -> Option<usize> {
        self.nodes
            .iter()
            .filter_map(|n| match n {
                Node::Split { feature, .. } => Some(*feature),
                Node::Leaf { .. } => None,
            })
            .max()
    }
}

fn mean(y: &[f64], samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

/// Find the split maximizing the squared-error reduction, or `None` when the
/// node is pure, too small, or constant on every feature.
///
/// Maximizing `S_l^2/n_l + S_r^2/n_r` is equivalent to minimizing the
/// children's summed squared error. Ties keep the first candidate found.
fn best_split(x: &Matrix, y: &[f64], samples: &[usize]) -> Option<Split> {
    let n = samples.len();
    if n < MIN_SAMPLES_SPLIT {
        return None;
    }

    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let node_mean = total / n as f64;
    let impurity = samples
        .iter()
        .map(|&i| (y[i] - node_mean).powi(2))
        .sum::<f64>()
        / n as f64;
    if impurity <= f64::EPSILON {
        return None;
    }

    let mut best: Option<Split> = None;
    let mut best_score = f64::NEG_INFINITY;
    let mut order = samples.to_vec();

    for feature in 0..x.n_cols() {
        order.sort_by(|&a, &b| x.get(a, feature).total_cmp(&x.get(b, feature)));
        if x.get(order[n - 1], feature) <= x.get(order[0], feature) + FEATURE_THRESHOLD {
            continue;
        }

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += y[order[k]];
            let current = x.get(order[k], feature);
            let next = x.get(order[k + 1], feature);
            if next <= current + FEATURE_THRESHOLD {
                continue;
            }

            let n_left = (k + 1) as f64;
            let n_right = (n - k - 1) as f64;
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / n_left + right_sum * right_sum / n_right;
            if score > best_score {
                best_score = score;
                let mut threshold = current / 2.0 + next / 2.0;
                if threshold >= next || !threshold.is_finite() {
                    threshold = current;
                }
                best = Some(Split { feature, threshold });
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[f64]]) -> Matrix {
        Matrix::from_rows(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x = matrix(&[&[1.0], &[2.0], &[3.0]]);
        let tree = RegressionTree::fit(&x, &[4.0, 4.0, 4.0], vec![0, 1, 2]);
        assert_eq!(tree.nodes, vec![Node::Leaf { value: 4.0 }]);
        assert_eq!(tree.predict_row(&[100.0]), 4.0);
    }

    #[test]
    fn step_function_splits_at_midpoint() {
        let x = matrix(&[&[1.0], &[2.0], &[10.0], &[11.0]]);
        let tree = RegressionTree::fit(&x, &[0.0, 0.0, 5.0, 5.0], vec![0, 1, 2, 3]);
        match &tree.nodes[0] {
            Node::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 0);
                assert!((threshold - 6.0).abs() < 1e-12);
            }
            other => panic!("expected split at root, got {other:?}"),
        }
        assert_eq!(tree.predict_row(&[3.0]), 0.0);
        assert_eq!(tree.predict_row(&[6.0]), 0.0);
        assert_eq!(tree.predict_row(&[6.5]), 5.0);
        assert_eq!(tree.n_leaves(), 2);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn picks_the_informative_feature() {
        // Feature 0 is noise, feature 1 separates the targets.
        let x = matrix(&[&[3.0, 0.0], &[1.0, 0.0], &[2.0, 1.0], &[0.0, 1.0]]);
        let tree = RegressionTree::fit(&x, &[10.0, 10.0, 20.0, 20.0], vec![0, 1, 2, 3]);
        assert_eq!(tree.max_feature(), Some(1));
        assert_eq!(tree.predict_row(&[3.0, 1.0]), 20.0);
        assert_eq!(tree.predict_row(&[0.0, 0.0]), 10.0);
    }

    #[test]
    fn fully_grown_tree_memorizes_training_rows() {
        let x = matrix(&[&[1.0], &[2.0], &[3.0], &[4.0], &[5.0]]);
        let y = [3.0, 1.0, 4.0, 1.5, 9.0];
        let tree = RegressionTree::fit(&x, &y, (0..5).collect());
        for (i, expected) in y.iter().enumerate() {
            assert_eq!(tree.predict_row(x.row(i)), *expected);
        }
    }

    #[test]
    fn fitted_trees_are_well_formed() {
        let x = matrix(&[&[1.0, 4.0], &[2.0, 3.0], &[3.0, 2.0], &[4.0, 1.0]]);
        let tree = RegressionTree::fit(&x, &[1.0, 5.0, 2.0, 8.0], (0..4).collect());
        assert!(tree.is_well_formed(2));
    }

    #[test]
    fn cyclic_or_dangling_links_are_rejected() {
        let split = |left, right| Node::Split {
            feature: 0,
            threshold: 0.5,
            left,
            right,
        };
        let leaf = Node::Leaf { value: 1.0 };

        let self_loop = RegressionTree {
            nodes: vec![split(0, 1), leaf.clone()],
        };
        assert!(!self_loop.is_well_formed(1));

        let back_edge = RegressionTree {
            nodes: vec![split(1, 2), split(0, 2), leaf.clone()],
        };
        assert!(!back_edge.is_well_formed(1));

        let dangling = RegressionTree {
            nodes: vec![split(1, 7), leaf.clone()],
        };
        assert!(!dangling.is_well_formed(1));

        let sound = RegressionTree {
            nodes: vec![split(1, 2), leaf.clone(), leaf],
        };
        assert!(sound.is_well_formed(1));
        // Splits on feature 0, which a zero-width forest does not have.
        assert!(!sound.is_well_formed(0));

        assert!(!RegressionTree { nodes: Vec::new() }.is_well_formed(1));
    }

    #[test]
    fn duplicate_rows_with_different_targets_average() {
        let x = matrix(&[&[1.0], &[1.0]]);
        let tree = RegressionTree::fit(&x, &[2.0, 4.0], vec![0, 1, 1]);
        // No split possible on a constant feature; leaf is the bootstrap mean.
        assert_eq!(tree.n_leaves(), 1);
        assert!((tree.predict_row(&[1.0]) - 10.0 / 3.0).abs() < 1e-12);
    }
}
