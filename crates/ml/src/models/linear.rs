//! 线性模型

use crate::models::{balanced_weights, check_training_data, sigmoid, single_class, Model};
use crate::types::{MLError, MLResult, ModelType};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// 正规方程的微小岭项，独热列共线时保证可解
const RIDGE: f64 = 1e-6;

/// 线性回归模型（最小二乘）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    weights: Option<Array1<f64>>,
    bias: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            weights: None,
            bias: 0.0,
        }
    }
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for LinearRegression {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;

        let x_mean = x_train
            .mean_axis(Axis(0))
            .ok_or_else(|| MLError::Training("无法计算均值".to_string()))?;
        let y_mean = y_train.mean().unwrap_or(0.0);

        // 中心化后截距可直接由均值求出
        let xc = x_train - &x_mean;
        let yc = y_train - y_mean;

        let mut gram = xc.t().dot(&xc);
        for i in 0..gram.nrows() {
            gram[[i, i]] += RIDGE;
        }
        let rhs = xc.t().dot(&yc);

        let weights = solve(gram, rhs)?;
        self.bias = y_mean - x_mean.dot(&weights);
        self.weights = Some(weights);

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| MLError::Prediction("模型未训练".to_string()))?;
        if x.ncols() != weights.len() {
            return Err(MLError::DimensionMismatch {
                expected: weights.len(),
                actual: x.ncols(),
            });
        }

        Ok(x.dot(weights) + self.bias)
    }

    fn model_type(&self) -> ModelType {
        ModelType::LinearRegression
    }
}

/// 逻辑回归模型（L2 正则，C = 1，平衡类别权重）
///
/// 使用牛顿法（IRLS）求解，截距不参与正则。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    max_iter: usize,
    c: f64,
    weights: Option<Array1<f64>>,
    bias: f64,
    /// 训练集只有一个类别时的常数概率
    constant: Option<f64>,
}

impl LogisticRegression {
    const TOLERANCE: f64 = 1e-8;

    pub fn new(max_iter: usize) -> Self {
        Self {
            max_iter,
            c: 1.0,
            weights: None,
            bias: 0.0,
            constant: None,
        }
    }

    fn decision(&self, x: &Array2<f64>, weights: &Array1<f64>) -> Array1<f64> {
        x.dot(weights) + self.bias
    }
}

impl Model for LogisticRegression {
    fn train(&mut self, x_train: &Array2<f64>, y_train: &Array1<f64>) -> MLResult<()> {
        check_training_data(x_train, y_train)?;

        let n_features = x_train.ncols();
        self.weights = Some(Array1::zeros(n_features));
        self.bias = 0.0;
        self.constant = single_class(y_train);
        if self.constant.is_some() {
            return Ok(());
        }

        let sample_weight = balanced_weights(y_train);
        let lambda = 1.0 / self.c;

        // 参数向量：[截距, 权重...]
        let n_samples = x_train.nrows();
        let mut design = Array2::<f64>::ones((n_samples, n_features + 1));
        design.slice_mut(ndarray::s![.., 1..]).assign(x_train);
        let mut theta = Array1::<f64>::zeros(n_features + 1);

        for iter in 0..self.max_iter {
            let p = design.dot(&theta).mapv(sigmoid);

            let residual = (&p - y_train) * &sample_weight;
            let mut gradient = design.t().dot(&residual);
            for j in 1..=n_features {
                gradient[j] += lambda * theta[j];
            }

            let curvature = (&p * &(1.0 - &p)) * &sample_weight;
            let weighted = &design * &curvature.view().insert_axis(Axis(1));
            let mut hessian = design.t().dot(&weighted);
            hessian[[0, 0]] += 1e-10;
            for j in 1..=n_features {
                hessian[[j, j]] += lambda;
            }

            let step = solve(hessian, gradient)?;
            theta -= &step;

            if step.iter().all(|s| s.abs() < Self::TOLERANCE) {
                tracing::debug!("logistic regression converged after {} iterations", iter + 1);
                break;
            }
        }

        self.bias = theta[0];
        self.weights = Some(theta.slice(ndarray::s![1..]).to_owned());

        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> MLResult<Array1<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| MLError::Prediction("模型未训练".to_string()))?;
        if x.ncols() != weights.len() {
            return Err(MLError::DimensionMismatch {
                expected: weights.len(),
                actual: x.ncols(),
            });
        }

        if let Some(constant) = self.constant {
            return Ok(Array1::from_elem(x.nrows(), constant));
        }

        Ok(self.decision(x, weights).mapv(sigmoid))
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }
}

/// 高斯消元（部分主元）求解 A x = b
pub(crate) fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> MLResult<Array1<f64>> {
    let n = b.len();
    if a.nrows() != n || a.ncols() != n {
        return Err(MLError::DimensionMismatch {
            expected: n,
            actual: a.nrows(),
        });
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))
            .unwrap_or(col);
        if a[[pivot, col]].abs() < 1e-12 {
            return Err(MLError::Training("线性方程组奇异".to_string()));
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }

        for row in (col + 1)..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::<f64>::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_solve() {
        let a = array![[2.0, 1.0], [1.0, 3.0]];
        let b = array![3.0, 5.0];
        let x = solve(a, b).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_linear_regression_recovers_coefficients() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0], [5.0, 0.0]];
        let y = x.column(0).mapv(|v| 2.0 * v) + x.column(1).mapv(|v| -3.0 * v) + 1.0;

        let mut model = LinearRegression::new();
        model.train(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-4);
        }
    }

    #[test]
    fn test_linear_regression_collinear_columns() {
        // 两列独热编码之和恒为 1
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 0.0], [0.0, 1.0]];
        let y = array![1.0, 3.0, 1.0, 3.0];

        let mut model = LinearRegression::new();
        model.train(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!((pred[0] - 1.0).abs() < 1e-4);
        assert!((pred[1] - 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_untrained_model() {
        let model = LinearRegression::new();
        assert!(matches!(model.predict(&array![[1.0]]), Err(MLError::Prediction(_))));
    }

    #[test]
    fn test_logistic_regression_separates_classes() {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new(200);
        model.train(&x, &y).unwrap();
        let p = model.predict(&x).unwrap();

        assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(p[0] < 0.5);
        assert!(p[7] > 0.5);
        assert!(p[7] > p[0]);
    }

    #[test]
    fn test_logistic_regression_single_class() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new(200);
        model.train(&x, &y).unwrap();
        assert_eq!(model.predict(&array![[10.0], [-10.0]]).unwrap(), array![1.0, 1.0]);
    }
}
