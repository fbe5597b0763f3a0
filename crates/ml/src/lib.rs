//! # Popularity ML Engine
//!
//! 基于特征表评估视频热度预测模型。
//!
//! ## 主要模块
//!
//! - `preprocessing`: 标准化、独热编码和特征列定义
//! - `validation`: 折数选择策略、K 折 / 分层 K 折切分和交叉验证
//! - `models`: 线性模型、随机森林、梯度提升
//! - `pipeline`: 预处理 + 模型流水线及可持久化的模型文件
//! - `evaluation`: 评估指标（R²、ROC-AUC）
//! - `experiment`: 针对特征表的完整评估流程

pub mod types;
pub mod preprocessing;
pub mod validation;
pub mod models;
pub mod pipeline;
pub mod evaluation;
pub mod experiment;

pub use experiment::{AdvancedEvaluation, ModelEvaluator};
pub use models::{Estimator, Model};
pub use pipeline::{ModelArtifact, Pipeline};
pub use preprocessing::{Feature, FeatureSet};
pub use types::{MLError, MLResult, MetricsReport, ModelType};
pub use validation::choose_fold_count;

/// 评估器配置
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EvaluatorConfig {
    /// 随机种子（切分、自助采样）
    pub random_seed: u64,
    /// 交叉验证折数上限
    pub max_folds: usize,
    /// 逻辑回归最大迭代次数
    pub logistic_max_iter: usize,
    /// 随机森林回归树数量
    pub forest_regressor_trees: usize,
    /// 随机森林分类树数量
    pub forest_classifier_trees: usize,
    /// 梯度提升轮数
    pub boosting_stages: usize,
    /// 梯度提升学习率
    pub boosting_learning_rate: f64,
    /// 梯度提升树深度
    pub boosting_max_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            random_seed: 42,
            max_folds: 5,
            logistic_max_iter: 200,
            forest_regressor_trees: 400,
            forest_classifier_trees: 600,
            boosting_stages: 100,
            boosting_learning_rate: 0.1,
            boosting_max_depth: 3,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::{Datelike, NaiveDate};
    use etl::{FeatureRow, FeatureTable};

    /// 观看数互不相同的测试特征表（未 enrich）
    pub(crate) fn sample_table(n: usize) -> FeatureTable {
        let rows = (0..n)
            .map(|i| {
                let views = ((i * 7 % 13) * 1000 + i * 10 + 100) as u64;
                let likes = views / 20;
                let hour = (i * 5 % 24) as u32;
                let published_at = NaiveDate::from_ymd_opt(2024, 1, 1 + (i % 28) as u32)
                    .and_then(|d| d.and_hms_opt(hour, 0, 0))
                    .unwrap();
                let title = match i % 4 {
                    0 => format!("How to build a raft {i}"),
                    1 => format!("Team A vs Team B {i}"),
                    _ => format!("Video number {i}"),
                };
                let duration_seconds = if i % 3 == 0 {
                    45.0
                } else {
                    120.0 + (i * 53 % 900) as f64
                };

                FeatureRow {
                    video_id: format!("v{i:03}"),
                    title_len: title.chars().count(),
                    title,
                    published_at,
                    publish_hour: hour,
                    publish_dow: published_at.weekday().num_days_from_monday(),
                    duration_seconds,
                    views,
                    likes,
                    comments: likes / 10,
                    likes_per_1k_views: likes as f64 / views.max(1) as f64 * 1000.0,
                    log_views: (views as f64).ln_1p(),
                    peak_hour: u8::from((18..=22).contains(&hour)),
                    is_short: None,
                    duration_bin: None,
                    has_howto: None,
                    has_vs: None,
                }
            })
            .collect();
        FeatureTable::new(rows)
    }
}
