//! 决策树与随机森林

use crate::models::{balanced_weights, check_training_data, single_class, Model};
use crate::types::{MLError, MLResult, ModelType};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// 每次分裂考虑的特征数量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaxFeatures {
    All,
    Sqrt,
}

impl MaxFeatures {
    fn count(&self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => {
                ((n_features as f64).sqrt().floor() as usize).clamp(1, n_features.max(1))
            }
        }
    }
}

/// 决策树节点
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Internal {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// 分裂候选
struct Split {
    feature_idx: usize,
    threshold: f64,
    impurity: f64,
}

/// 加权平方误差回归树
///
/// 标签为 0/1 时，叶子值即加权的正类比例，分裂准则与基尼系数等价。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    max_features: MaxFeatures,
    root: Option<TreeNode>,
    n_features: usize,
}

/// 训练时的只读上下文
struct TreeData<'a> {
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    weights: &'a Array1<f64>,
    leaf_value: &'a dyn Fn(&[usize]) -> f64,
}

impl DecisionTree {
    pub fn new(
        max_depth: Option<usize>,
        min_samples_split: usize,
        max_features: MaxFeatures,
    ) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            max_features,
            root: None,
            n_features: 0,
        }
    }

    /// 在给定样本下标上训练（下标可重复，用于自助采样）
    ///
    /// `leaf_value` 根据落入叶子的样本计算叶子输出。
    pub fn fit_indices(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &Array1<f64>,
        indices: &[usize],
        rng: &mut StdRng,
        leaf_value: &dyn Fn(&[usize]) -> f64,
    ) -> MLResult<()> {
        if indices.is_empty() {
            return Err(MLError::Training("训练样本为空".to_string()));
        }

        let data = TreeData {
            x,
            y,
            weights,
            leaf_value,
        };
        self.n_features = x.ncols();
        let mut indices = indices.to_vec();
        self.root = Some(self.build_tree(&data, &mut indices, 0, rng));
        Ok(())
    }

    /// 以加权均值作为叶子值训练
    pub fn fit_weighted(
        &mut self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        weights: &Array1<f64>,
        indices: &[usize],
        rng: &mut StdRng,
    ) -> MLResult<()> {
        let mean = |idx: &[usize]| weighted_mean(y, weights, idx);
        self.fit_indices(x, y, weights, indices, rng, &mean)
    }

    fn build_tree(
        &self,
        data: &TreeData<'_>,
        indices: &mut [usize],
        depth: usize,
        rng: &mut StdRng,
    ) -> TreeNode {
        let leaf = |idx: &[usize]| TreeNode::Leaf {
            value: (data.leaf_value)(idx),
        };

        // 停止条件
        let depth_reached = self.max_depth.is_some_and(|max| depth >= max);
        if depth_reached || indices.len() < self.min_samples_split {
            return leaf(indices);
        }

        let node_impurity = weighted_sse(data.y, data.weights, indices);
        if node_impurity <= 1e-12 {
            return leaf(indices);
        }

        let Some(split) = self.find_best_split(data, indices, rng) else {
            return leaf(indices);
        };
        if split.impurity >= node_impurity {
            return leaf(indices);
        }

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| data.x[[i, split.feature_idx]] <= split.threshold);
        if left_idx.is_empty() || right_idx.is_empty() {
            return leaf(indices);
        }

        let mut left_idx = left_idx;
        let mut right_idx = right_idx;
        let left = Box::new(self.build_tree(data, &mut left_idx, depth + 1, rng));
        let right = Box::new(self.build_tree(data, &mut right_idx, depth + 1, rng));

        TreeNode::Internal {
            feature_idx: split.feature_idx,
            threshold: split.threshold,
            left,
            right,
        }
    }

    /// 对每个候选特征排序后一次扫描，阈值取相邻取值的中点
    fn find_best_split(
        &self,
        data: &TreeData<'_>,
        indices: &mut [usize],
        rng: &mut StdRng,
    ) -> Option<Split> {
        let n_features = data.x.ncols();
        if n_features == 0 {
            return None;
        }
        let k = self.max_features.count(n_features);
        let candidates = rand::seq::index::sample(rng, n_features, k);

        let total_w: f64 = indices.iter().map(|&i| data.weights[i]).sum();
        let total_wy: f64 = indices.iter().map(|&i| data.weights[i] * data.y[i]).sum();
        let total_wyy: f64 = indices
            .iter()
            .map(|&i| data.weights[i] * data.y[i] * data.y[i])
            .sum();

        let mut best: Option<Split> = None;
        for feature_idx in candidates.iter() {
            indices.sort_by(|&a, &b| data.x[[a, feature_idx]].total_cmp(&data.x[[b, feature_idx]]));

            let mut left_w = 0.0;
            let mut left_wy = 0.0;
            let mut left_wyy = 0.0;
            for pos in 0..indices.len() - 1 {
                let i = indices[pos];
                let w = data.weights[i];
                left_w += w;
                left_wy += w * data.y[i];
                left_wyy += w * data.y[i] * data.y[i];

                let current = data.x[[i, feature_idx]];
                let next = data.x[[indices[pos + 1], feature_idx]];
                if current == next {
                    continue;
                }

                let right_w = total_w - left_w;
                if left_w <= 0.0 || right_w <= 0.0 {
                    continue;
                }
                let right_wy = total_wy - left_wy;
                let right_wyy = total_wyy - left_wyy;
                let impurity = (left_wyy - left_wy * left_wy / left_w)
                    + (right_wyy - right_wy * right_wy / right_w);

                if best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    best = Some(Split {
                        feature_idx,
                        threshold: (current + next) / 2.0,
                        impurity,
                    });
                }
            }
        }

        best
    }

    pub fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| MLError::Prediction("模型未训练".to_string()))?;
        if x.ncols() != self.n_features {
            return Err(MLError::DimensionMismatch {
                expected: self.n_features,
                actual: x.ncols(),
            });
        }

        Ok(x
            .axis_iter(Axis(0))
            .map(|row| Self::predict_single(&row, root))
            .collect())
    }

    fn predict_single(x: &ArrayView1<f64>, node: &TreeNode) -> f64 {
        match node {
            TreeNode::Leaf { value } => *value,
            TreeNode::Internal {
                feature_idx,
                threshold,
                left,
                right,
            } => {
                if x[*feature_idx] <= *threshold {
                    Self::predict_single(x, left)
                } else {
                    Self::predict_single(x, right)
                }
            }
        }
    }
}

pub(crate) fn weighted_mean(y: &Array1<f64>, weights: &Array1<f64>, indices: &[usize]) -> f64 {
    let total_w: f64 = indices.iter().map(|&i| weights[i]).sum();
    if total_w <= 0.0 {
        return 0.0;
    }
    indices.iter().map(|&i| weights[i] * y[i]).sum::<f64>() / total_w
}

fn weighted_sse(y: &Array1<f64>, weights: &Array1<f64>, indices: &[usize]) -> f64 {
    let mean = weighted_mean(y, weights, indices);
    indices
        .iter()
        .map(|&i| weights[i] * (y[i] - mean).powi(2))
        .sum()
}

/// 训练一组自助采样的树并对预测取平均
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Forest {
    n_trees: usize,
    max_features: MaxFeatures,
    seed: u64,
    trees: Vec<DecisionTree>,
}

impl Forest {
    fn new(n_trees: usize, max_features: MaxFeatures, seed: u64) -> Self {
        Self {
            n_trees: n_trees.max(1),
            max_features,
            seed,
            trees: Vec::new(),
        }
    }

    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, weights: &Array1<f64>) -> MLResult<()> {
        self.trees.clear();
        let n_samples = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);

        for _ in 0..self.n_trees {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen());
            let indices: Vec<usize> = (0..n_samples)
                .map(|_| tree_rng.gen_range(0..n_samples))
                .collect();

            let mut tree = DecisionTree::new(None, 2, self.max_features);
            tree.fit_weighted(x, y, weights, &indices, &mut tree_rng)?;
            self.trees.push(tree);
        }

        tracing::debug!("trained forest of {} trees on {} samples", self.trees.len(), n_samples);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(MLError::Prediction("模型未训练".to_string()));
        }

        let mut predictions = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            predictions += &tree.predict(x)?;
        }

        Ok(predictions / self.trees.len() as f64)
    }
}

/// 随机森林回归模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    forest: Forest,
}

impl RandomForestRegressor {
    pub fn new(n_trees: usize, seed: u64) -> Self {
        Self {
            forest: Forest::new(n_trees, MaxFeatures::All, seed),
        }
    }
}

impl Model for RandomForestRegressor {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;
        let weights = Array1::ones(y_train.len());
        self.forest.fit(x_train, y_train, &weights)
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        self.forest.predict(x)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForestRegressor
    }
}

/// 随机森林分类模型（平衡类别权重，每次分裂随机取 sqrt(p) 个特征）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    forest: Forest,
    constant: Option<f64>,
}

impl RandomForestClassifier {
    pub fn new(n_trees: usize, seed: u64) -> Self {
        Self {
            forest: Forest::new(n_trees, MaxFeatures::Sqrt, seed),
            constant: None,
        }
    }
}

impl Model for RandomForestClassifier {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;
        self.constant = single_class(y_train);
        let weights = match self.constant {
            Some(_) => Array1::ones(y_train.len()),
            None => balanced_weights(y_train),
        };
        self.forest.fit(x_train, y_train, &weights)
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        if let Some(constant) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), constant));
        }
        self.forest.predict(x)
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForestClassifier
    }
}
