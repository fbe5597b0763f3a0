//! 核心类型定义

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

pub type MLResult<T> = Result<T, MLError>;

#[derive(Debug, Error)]
pub enum MLError {
    #[error("样本不足: 至少需要 {required} 行，实际 {actual} 行")]
    InsufficientData { required: usize, actual: usize },

    #[error("数据预处理错误: {0}")]
    Preprocessing(String),

    #[error("模型训练错误: {0}")]
    Training(String),

    #[error("模型预测错误: {0}")]
    Prediction(String),

    #[error("数据维度不匹配: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("特征列不匹配: {0}")]
    SchemaMismatch(String),

    #[error("无效的配置: {0}")]
    InvalidConfig(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("数据错误: {0}")]
    Data(#[from] etl::ETLError),
}

/// 模型类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelType {
    LinearRegression,
    LogisticRegression,
    RandomForestRegressor,
    RandomForestClassifier,
    GradientBoostingRegressor,
    GradientBoostingClassifier,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LinearRegression => write!(f, "LinearRegression"),
            ModelType::LogisticRegression => write!(f, "LogisticRegression"),
            ModelType::RandomForestRegressor => write!(f, "RandomForestRegressor"),
            ModelType::RandomForestClassifier => write!(f, "RandomForestClassifier"),
            ModelType::GradientBoostingRegressor => write!(f, "GradientBoostingRegressor"),
            ModelType::GradientBoostingClassifier => write!(f, "GradientBoostingClassifier"),
        }
    }
}

/// 交叉验证指标：名称 -> 四舍五入到 4 位小数的分数
///
/// 无定义的分数（NaN）存为 `None`，序列化为 `null`，读回后仍是 NaN。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsReport(BTreeMap<String, Option<f64>>);

impl MetricsReport {
    pub const DECIMALS: i32 = 4;

    pub fn new() -> Self {
        Self::default()
    }

    /// 仅在写入报告时四舍五入
    pub fn insert(&mut self, name: impl Into<String>, score: f64) {
        let value = (!score.is_nan()).then(|| round_to(score, Self::DECIMALS));
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).map(|score| score.unwrap_or(f64::NAN))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_rounding() {
        let mut report = MetricsReport::new();
        report.insert("cv_r2_regression", 0.123_456_7);
        report.insert("cv_roc_auc_classification", -1.999_96);
        report.insert("undefined", f64::NAN);

        assert_eq!(report.get("cv_r2_regression"), Some(0.1235));
        assert_eq!(report.get("cv_roc_auc_classification"), Some(-2.0));
        assert!(report.get("undefined").unwrap().is_nan());
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn test_metrics_serialize_flat() {
        let mut report = MetricsReport::new();
        report.insert("rf_reg_r2", 0.5);
        report.insert("gb_cls_roc_auc", f64::NAN);

        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"gb_cls_roc_auc":null,"rf_reg_r2":0.5}"#);
    }

    #[test]
    fn test_metrics_read_back_with_null() {
        let mut report = MetricsReport::new();
        report.insert("rf_reg_r2", 0.5);
        report.insert("gb_cls_roc_auc", f64::NAN);

        let json = r#"{"gb_cls_roc_auc":null,"rf_reg_r2":0.5}"#;
        let loaded: MetricsReport = serde_json::from_str(json).unwrap();
        assert_eq!(loaded, report);
        assert!(loaded.get("gb_cls_roc_auc").unwrap().is_nan());
        assert_eq!(loaded.get("rf_reg_r2"), Some(0.5));
    }
}
