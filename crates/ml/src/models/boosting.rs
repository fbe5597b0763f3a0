//! 梯度提升模型

use crate::models::traditional::{DecisionTree, MaxFeatures};
use crate::models::{check_training_data, sigmoid, single_class, Model};
use crate::types::{MLError, MLResult, ModelType};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// 所有特征都参与分裂，种子只影响并列候选的顺序
const TREE_SEED: u64 = 0;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BoostedTrees {
    n_stages: usize,
    learning_rate: f64,
    max_depth: usize,
    init: f64,
    trees: Vec<DecisionTree>,
}

impl BoostedTrees {
    fn new(n_stages: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_stages,
            learning_rate,
            max_depth,
            init: 0.0,
            trees: Vec::new(),
        }
    }

    /// 逐轮拟合残差；`stage` 根据当前原始预测返回残差和叶子值计算方式
    fn fit<F>(&mut self, x: &Array2<f64>, init: f64, mut stage: F) -> MLResult<()>
    where
        F: FnMut(&Array1<f64>) -> (Array1<f64>, Box<dyn Fn(&[usize]) -> f64>),
    {
        self.init = init;
        self.trees.clear();

        let n_samples = x.nrows();
        let indices: Vec<usize> = (0..n_samples).collect();
        let weights = Array1::<f64>::ones(n_samples);
        let mut rng = StdRng::seed_from_u64(TREE_SEED);
        let mut raw = Array1::from_elem(n_samples, init);

        for _ in 0..self.n_stages {
            let (residual, leaf_value) = stage(&raw);
            let mut tree = DecisionTree::new(Some(self.max_depth), 2, MaxFeatures::All);
            tree.fit_indices(x, &residual, &weights, &indices, &mut rng, &*leaf_value)?;

            raw = raw + tree.predict(x)? * self.learning_rate;
            self.trees.push(tree);
        }

        tracing::debug!("boosted {} stages on {} samples", self.trees.len(), n_samples);
        Ok(())
    }

    fn raw_predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        let mut raw = Array1::from_elem(x.nrows(), self.init);
        for tree in &self.trees {
            raw = raw + tree.predict(x)? * self.learning_rate;
        }
        Ok(raw)
    }
}

/// 梯度提升回归模型（平方损失）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    boosted: BoostedTrees,
    trained: bool,
}

impl GradientBoostingRegressor {
    pub fn new(n_stages: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            boosted: BoostedTrees::new(n_stages, learning_rate, max_depth),
            trained: false,
        }
    }
}

impl Model for GradientBoostingRegressor {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;

        let init = y_train.mean().unwrap_or(0.0);
        self.boosted.fit(x_train, init, |raw| {
            let residual = y_train - raw;
            let targets = residual.clone();
            let leaf: Box<dyn Fn(&[usize]) -> f64> = Box::new(move |idx: &[usize]| {
                idx.iter().map(|&i| targets[i]).sum::<f64>() / idx.len().max(1) as f64
            });
            (residual, leaf)
        })?;
        self.trained = true;

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        if !self.trained {
            return Err(MLError::Prediction("模型未训练".to_string()));
        }
        self.boosted.raw_predict(x)
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoostingRegressor
    }
}

/// 梯度提升分类模型（对数损失，叶子值取一步牛顿更新）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    boosted: BoostedTrees,
    trained: bool,
    constant: Option<f64>,
}

impl GradientBoostingClassifier {
    pub fn new(n_stages: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            boosted: BoostedTrees::new(n_stages, learning_rate, max_depth),
            trained: false,
            constant: None,
        }
    }
}

impl Model for GradientBoostingClassifier {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;

        self.constant = single_class(y_train);
        self.trained = true;
        if self.constant.is_some() {
            return Ok(());
        }

        let prior = y_train.mean().unwrap_or(0.5);
        let init = (prior / (1.0 - prior)).ln();
        self.boosted.fit(x_train, init, |raw| {
            let p = raw.mapv(sigmoid);
            let residual = y_train - &p;
            let targets = residual.clone();
            let leaf: Box<dyn Fn(&[usize]) -> f64> = Box::new(move |idx: &[usize]| {
                let numerator: f64 = idx.iter().map(|&i| targets[i]).sum();
                let denominator: f64 = idx.iter().map(|&i| p[i] * (1.0 - p[i])).sum();
                if denominator.abs() < 1e-12 {
                    0.0
                } else {
                    numerator / denominator
                }
            });
            (residual, leaf)
        })?;

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        if !self.trained {
            return Err(MLError::Prediction("模型未训练".to_string()));
        }
        if let Some(constant) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), constant));
        }
        Ok(self.boosted.raw_predict(x)?.mapv(sigmoid))
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoostingClassifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::Evaluator;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| {
            if j == 0 {
                i as f64 / 4.0
            } else {
                (i % 5) as f64
            }
        });
        let y = x.column(0).mapv(|v| v * v) + x.column(1).mapv(|v| 0.5 * v);
        (x, y)
    }

    #[test]
    fn test_gradient_boosting_regressor_fits_training_data() {
        let (x, y) = data();
        let mut model = GradientBoostingRegressor::new(100, 0.1, 3);
        model.train(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        assert!(Evaluator::r2_score(&y, &pred) > 0.95);
    }

    #[test]
    fn test_zero_stages_predicts_mean() {
        let (x, y) = data();
        let mut model = GradientBoostingRegressor::new(0, 0.1, 3);
        model.train(&x, &y).unwrap();

        let mean = y.mean().unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|&p| (p - mean).abs() < 1e-12));
    }

    #[test]
    fn test_gradient_boosting_classifier() {
        let (x, y) = data();
        let labels = y.mapv(|v| if v > 20.0 { 1.0 } else { 0.0 });

        let mut model = GradientBoostingClassifier::new(50, 0.1, 3);
        model.train(&x, &labels).unwrap();
        let p = model.predict(&x).unwrap();

        assert!(p.iter().all(|&v| v > 0.0 && v < 1.0));
        assert!(Evaluator::roc_auc_score(&labels, &p).unwrap() > 0.95);
    }

    #[test]
    fn test_gradient_boosting_classifier_single_class() {
        let (x, _) = data();
        let labels = Array1::ones(x.nrows());

        let mut model = GradientBoostingClassifier::new(10, 0.1, 3);
        model.train(&x, &labels).unwrap();
        assert!(model.predict(&x).unwrap().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn test_untrained_boosting() {
        let (x, _) = data();
        let model = GradientBoostingClassifier::new(10, 0.1, 3);
        assert!(matches!(model.predict(&x), Err(MLError::Prediction(_))));
    }
}
