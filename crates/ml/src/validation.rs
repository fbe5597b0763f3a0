//! 交叉验证：折数选择、K 折与分层 K 折切分

use crate::pipeline::Pipeline;
use crate::types::{MLError, MLResult};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// 折数上限
pub const MAX_FOLDS: usize = 5;

/// 折数下限
pub const MIN_FOLDS: usize = 2;

/// 折数选择策略：`clamp(min_class_count, 2, 5)`，且不超过样本数
///
/// 回归任务传入 `(n, n)`；分类任务传入较小类别的样本数。
/// 较小类别不足 2 个时仍返回 2。
pub fn choose_fold_count(sample_count: usize, min_class_count: usize) -> usize {
    fold_count_with_cap(sample_count, min_class_count, MAX_FOLDS)
}

pub(crate) fn fold_count_with_cap(
    sample_count: usize,
    min_class_count: usize,
    max_folds: usize,
) -> usize {
    let cap = max_folds.max(MIN_FOLDS);
    min_class_count.min(sample_count).clamp(MIN_FOLDS, cap)
}

/// 一次训练 / 验证切分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// 数据切分器
pub trait Splitter {
    fn split(&self, y: &Array1<f64>) -> MLResult<Vec<Fold>>;
}

fn check_split(n_splits: usize, n_samples: usize) -> MLResult<()> {
    if n_samples < MIN_FOLDS {
        return Err(MLError::InsufficientData {
            required: MIN_FOLDS,
            actual: n_samples,
        });
    }
    if n_splits < MIN_FOLDS || n_splits > n_samples {
        return Err(MLError::InvalidConfig(format!(
            "折数 {} 无效（样本数 {}）",
            n_splits, n_samples
        )));
    }
    Ok(())
}

/// 由每个样本所属的折号构造切分
fn folds_from_assignment(assignment: &[usize], n_splits: usize) -> Vec<Fold> {
    (0..n_splits)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..assignment.len()).partition(|&i| assignment[i] == fold);
            Fold { train, test }
        })
        .collect()
}

/// 打乱顺序的 K 折切分，前 `n % k` 折各多一个样本
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    seed: u64,
}

impl KFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }
}

impl Splitter for KFold {
    fn split(&self, y: &Array1<f64>) -> MLResult<Vec<Fold>> {
        let n_samples = y.len();
        check_split(self.n_splits, n_samples)?;

        let mut order: Vec<usize> = (0..n_samples).collect();
        order.shuffle(&mut StdRng::seed_from_u64(self.seed));

        let mut assignment = vec![0; n_samples];
        let base = n_samples / self.n_splits;
        let extra = n_samples % self.n_splits;
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            for &idx in &order[start..start + size] {
                assignment[idx] = fold;
            }
            start += size;
        }

        Ok(folds_from_assignment(&assignment, self.n_splits))
    }
}

/// 打乱顺序的分层 K 折切分
///
/// 每个类别内部打乱后轮流分配到各折，类别之间折号连续，保证每折样本数相差不超过 1。
#[derive(Debug, Clone)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }
}

impl Splitter for StratifiedKFold {
    fn split(&self, y: &Array1<f64>) -> MLResult<Vec<Fold>> {
        let n_samples = y.len();
        check_split(self.n_splits, n_samples)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut assignment = vec![0; n_samples];
        let mut next_fold = 0;
        for label in [0.0, 1.0] {
            let mut members: Vec<usize> = (0..n_samples)
                .filter(|&i| (y[i] > 0.5) == (label > 0.5))
                .collect();
            members.shuffle(&mut rng);
            for idx in members {
                assignment[idx] = next_fold;
                next_fold = (next_fold + 1) % self.n_splits;
            }
        }

        Ok(folds_from_assignment(&assignment, self.n_splits))
    }
}

/// 各类别样本数 (负类, 正类)
pub fn class_counts(y: &Array1<f64>) -> (usize, usize) {
    let positives = y.iter().filter(|&&v| v > 0.5).count();
    (y.len() - positives, positives)
}

/// 中位数，偶数个样本取中间两个值的平均
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// 交叉验证打分
///
/// 每折使用全新的流水线，只在训练折上拟合。`scorer` 返回 `None` 的折不计入平均；
/// 全部折都被跳过时结果为 NaN。
pub fn cross_val_score<M, S>(
    x: &Array2<f64>,
    y: &Array1<f64>,
    splitter: &dyn Splitter,
    make_pipeline: M,
    scorer: S,
) -> MLResult<f64>
where
    M: Fn() -> Pipeline,
    S: Fn(&Array1<f64>, &Array1<f64>) -> Option<f64>,
{
    if x.nrows() != y.len() {
        return Err(MLError::DimensionMismatch {
            expected: x.nrows(),
            actual: y.len(),
        });
    }

    let folds = splitter.split(y)?;
    let mut scores = Vec::with_capacity(folds.len());
    for (i, fold) in folds.iter().enumerate() {
        let x_train = x.select(Axis(0), &fold.train);
        let y_train = y.select(Axis(0), &fold.train);
        let x_test = x.select(Axis(0), &fold.test);
        let y_test = y.select(Axis(0), &fold.test);

        let mut pipeline = make_pipeline();
        pipeline.fit(&x_train, &y_train)?;
        let predictions = pipeline.predict(&x_test)?;

        match scorer(&y_test, &predictions) {
            Some(score) => {
                tracing::debug!("fold {} ({}): score {:.4}", i, pipeline.model_type(), score);
                scores.push(score);
            }
            None => {
                tracing::debug!("fold {} ({}): score undefined, skipped", i, pipeline.model_type())
            }
        }
    }

    if scores.is_empty() {
        return Ok(f64::NAN);
    }
    Ok(scores.iter().sum::<f64>() / scores.len() as f64)
}
