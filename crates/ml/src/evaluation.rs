//! 模型评估模块

use ndarray::Array1;

/// 模型评估器
pub struct Evaluator;

impl Evaluator {
    /// R² 分数
    ///
    /// 真实值方差为 0 时：预测完全一致返回 1.0，否则返回 0.0。
    pub fn r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
        let y_mean = y_true.mean().unwrap_or(0.0);

        let ss_res: f64 = (y_true - y_pred).mapv(|x| x * x).sum();
        let ss_tot: f64 = y_true.mapv(|x| (x - y_mean).powi(2)).sum();

        if ss_tot == 0.0 {
            return if ss_res == 0.0 { 1.0 } else { 0.0 };
        }

        1.0 - (ss_res / ss_tot)
    }

    /// 单折的 R²：少于 2 个样本时无定义，返回 `None`
    pub fn fold_r2_score(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Option<f64> {
        (y_true.len() >= 2).then(|| Self::r2_score(y_true, y_pred))
    }

    /// ROC 曲线下面积
    ///
    /// 基于秩的计算（Mann-Whitney U），相同分数取平均秩。
    /// 只有一个类别时 AUC 无定义，返回 `None`。
    pub fn roc_auc_score(y_true: &Array1<f64>, scores: &Array1<f64>) -> Option<f64> {
        let n_pos = y_true.iter().filter(|&&y| y > 0.5).count();
        let n_neg = y_true.len() - n_pos;
        if n_pos == 0 || n_neg == 0 {
            return None;
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

        let mut ranks = vec![0.0; scores.len()];
        let mut i = 0;
        while i < order.len() {
            let mut j = i;
            while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
                j += 1;
            }
            // 秩从 1 开始
            let avg_rank = (i + j) as f64 / 2.0 + 1.0;
            for &idx in &order[i..=j] {
                ranks[idx] = avg_rank;
            }
            i = j + 1;
        }

        let pos_rank_sum: f64 = y_true
            .iter()
            .zip(ranks.iter())
            .filter(|(&y, _)| y > 0.5)
            .map(|(_, &r)| r)
            .sum();

        let n_pos = n_pos as f64;
        let n_neg = n_neg as f64;
        Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_r2() {
        let y_true = array![1.0, 2.0, 3.0, 4.0];
        assert!((Evaluator::r2_score(&y_true, &y_true) - 1.0).abs() < 1e-12);

        let mean_pred = array![2.5, 2.5, 2.5, 2.5];
        assert!(Evaluator::r2_score(&y_true, &mean_pred).abs() < 1e-12);
    }

    #[test]
    fn test_r2_constant_target() {
        let y_true = array![3.0, 3.0];
        assert_eq!(Evaluator::r2_score(&y_true, &array![3.0, 3.0]), 1.0);
        assert_eq!(Evaluator::r2_score(&y_true, &array![3.0, 4.0]), 0.0);
    }

    #[test]
    fn test_fold_r2_needs_two_samples() {
        assert_eq!(Evaluator::fold_r2_score(&array![3.0], &array![3.0]), None);
        assert_eq!(Evaluator::fold_r2_score(&array![3.0], &array![5.0]), None);
        assert_eq!(
            Evaluator::fold_r2_score(&array![3.0, 3.0], &array![3.0, 3.0]),
            Some(1.0)
        );
    }

    #[test]
    fn test_roc_auc() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(Evaluator::roc_auc_score(&y, &array![0.1, 0.4, 0.35, 0.8]), Some(0.75));
        assert_eq!(Evaluator::roc_auc_score(&y, &array![0.1, 0.2, 0.3, 0.4]), Some(1.0));
        // 全部相同的分数
        assert_eq!(Evaluator::roc_auc_score(&y, &array![0.5, 0.5, 0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn test_roc_auc_single_class_is_undefined() {
        let y = array![1.0, 1.0, 1.0];
        assert_eq!(Evaluator::roc_auc_score(&y, &array![0.2, 0.5, 0.9]), None);
    }
}
