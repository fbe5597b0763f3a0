//! 机器学习模型模块
//!
//! 回归模型输出预测值，分类模型输出正类（标签 1）的概率。

pub mod boosting;
pub mod linear;
pub mod traditional;

use crate::types::{MLError, MLResult, ModelType};
use crate::EvaluatorConfig;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

pub use boosting::{GradientBoostingClassifier, GradientBoostingRegressor};
pub use linear::{LinearRegression, LogisticRegression};
pub use traditional::{DecisionTree, RandomForestClassifier, RandomForestRegressor};

/// 模型训练接口
pub trait Model: Send + Sync {
    /// 训练模型
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()>;

    /// 预测
    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>>;

    fn model_type(&self) -> ModelType;
}

/// 可序列化的模型集合
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    LinearRegression(LinearRegression),
    LogisticRegression(LogisticRegression),
    RandomForestRegressor(RandomForestRegressor),
    RandomForestClassifier(RandomForestClassifier),
    GradientBoostingRegressor(GradientBoostingRegressor),
    GradientBoostingClassifier(GradientBoostingClassifier),
}

impl Estimator {
    /// 按配置创建未训练的模型
    pub fn from_config(model_type: ModelType, config: &EvaluatorConfig) -> Self {
        let seed = config.random_seed;
        match model_type {
            ModelType::LinearRegression => Estimator::LinearRegression(LinearRegression::new()),
            ModelType::LogisticRegression => {
                Estimator::LogisticRegression(LogisticRegression::new(config.logistic_max_iter))
            }
            ModelType::RandomForestRegressor => Estimator::RandomForestRegressor(
                RandomForestRegressor::new(config.forest_regressor_trees, seed),
            ),
            ModelType::RandomForestClassifier => Estimator::RandomForestClassifier(
                RandomForestClassifier::new(config.forest_classifier_trees, seed),
            ),
            ModelType::GradientBoostingRegressor => {
                Estimator::GradientBoostingRegressor(GradientBoostingRegressor::new(
                    config.boosting_stages,
                    config.boosting_learning_rate,
                    config.boosting_max_depth,
                ))
            }
            ModelType::GradientBoostingClassifier => {
                Estimator::GradientBoostingClassifier(GradientBoostingClassifier::new(
                    config.boosting_stages,
                    config.boosting_learning_rate,
                    config.boosting_max_depth,
                ))
            }
        }
    }

    fn inner(&self) -> &dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForestRegressor(m) => m,
            Estimator::RandomForestClassifier(m) => m,
            Estimator::GradientBoostingRegressor(m) => m,
            Estimator::GradientBoostingClassifier(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Model {
        match self {
            Estimator::LinearRegression(m) => m,
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForestRegressor(m) => m,
            Estimator::RandomForestClassifier(m) => m,
            Estimator::GradientBoostingRegressor(m) => m,
            Estimator::GradientBoostingClassifier(m) => m,
        }
    }
}

impl Model for Estimator {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        self.inner_mut().train(x_train, y_train)
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        self.inner().predict(x)
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }
}

/// 训练前的形状检查
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> MLResult<()> {
    if x.nrows() != y.len() {
        return Err(MLError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if x.nrows() == 0 {
        return Err(MLError::InsufficientData {
            required: 1,
            actual: 0,
        });
    }
    Ok(())
}

/// 训练集只有一个类别时返回该类别
pub(crate) fn single_class(y: &Array1<f64>) -> Option<f64> {
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    if positives == 0 {
        Some(0.0)
    } else if positives == y.len() {
        Some(1.0)
    } else {
        None
    }
}

/// 平衡类别权重：n / (2 * 该类样本数)
pub(crate) fn balanced_weights(y: &Array1<f64>) -> Array1<f64> {
    let n = y.len() as f64;
    let positives = y.iter().filter(|&&v| v > 0.5).count() as f64;
    let negatives = n - positives;
    y.mapv(|v| {
        let count = if v > 0.5 { positives } else { negatives };
        n / (2.0 * count)
    })
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}
