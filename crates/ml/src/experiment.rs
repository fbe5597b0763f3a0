//! 特征表上的完整评估流程

use crate::evaluation::Evaluator;
use crate::models::Estimator;
use crate::pipeline::{ModelArtifact, Pipeline};
use crate::preprocessing::FeatureSet;
use crate::types::{MLError, MLResult, MetricsReport, ModelType};
use crate::validation::{
    class_counts, cross_val_score, fold_count_with_cap, median, KFold, StratifiedKFold,
};
use crate::EvaluatorConfig;
use etl::FeatureTable;
use ndarray::{Array1, Array2};

/// 进阶评估结果：指标 + 在全量数据上训练的随机森林分类流水线
#[derive(Debug, Clone)]
pub struct AdvancedEvaluation {
    pub metrics: MetricsReport,
    pub artifact: ModelArtifact,
}

/// 回归 / 分类目标和各自的折数
struct Targets {
    regression: Array1<f64>,
    classification: Array1<f64>,
    regression_folds: usize,
    classification_folds: usize,
}

impl Targets {
    fn from_table(table: &FeatureTable, max_folds: usize) -> MLResult<Self> {
        let n = table.len();
        if n < 2 {
            return Err(MLError::InsufficientData {
                required: 2,
                actual: n,
            });
        }

        let views: Vec<f64> = table.views().into_iter().map(|v| v as f64).collect();
        let threshold = median(&views).ok_or(MLError::InsufficientData {
            required: 2,
            actual: n,
        })?;
        let classification: Array1<f64> = views
            .iter()
            .map(|&v| if v >= threshold { 1.0 } else { 0.0 })
            .collect();
        let (negatives, positives) = class_counts(&classification);
        let min_class = negatives.min(positives);

        let targets = Self {
            regression: Array1::from(table.log_views()),
            classification,
            regression_folds: fold_count_with_cap(n, n, max_folds),
            classification_folds: fold_count_with_cap(n, min_class, max_folds),
        };

        tracing::info!(
            "evaluating {} rows: {} regression folds, {} classification folds (smaller class {})",
            n,
            targets.regression_folds,
            targets.classification_folds,
            min_class
        );
        if min_class < 2 {
            tracing::warn!(
                "smaller class has {} rows, classification folds may be unstratified",
                min_class
            );
        }

        Ok(targets)
    }
}

/// 模型评估器
#[derive(Debug, Clone, Default)]
pub struct ModelEvaluator {
    config: EvaluatorConfig,
}

impl ModelEvaluator {
    pub fn new(config: EvaluatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    /// 基础评估：线性回归 R² 与逻辑回归 ROC-AUC
    pub fn evaluate(&self, table: &FeatureTable) -> MLResult<MetricsReport> {
        let targets = Targets::from_table(table, self.config.max_folds)?;
        let features = FeatureSet::basic();
        let raw = features.matrix(&table.rows)?;

        let mut report = MetricsReport::new();
        report.insert(
            "cv_r2_regression",
            self.score_regression(&raw, &targets, &features, ModelType::LinearRegression)?,
        );
        report.insert(
            "cv_roc_auc_classification",
            self.score_classification(&raw, &targets, &features, ModelType::LogisticRegression)?,
        );

        tracing::info!("basic metrics: {:?}", report);
        Ok(report)
    }

    /// 进阶评估：先 enrich，再评估随机森林和梯度提升，
    /// 最后在全部数据上训练随机森林分类流水线
    pub fn evaluate_advanced(&self, table: &FeatureTable) -> MLResult<AdvancedEvaluation> {
        let enriched = etl::enrich(table);
        let targets = Targets::from_table(&enriched, self.config.max_folds)?;
        let features = FeatureSet::advanced();
        features.check_table(&enriched)?;
        let raw = features.matrix(&enriched.rows)?;

        let mut metrics = MetricsReport::new();
        metrics.insert(
            "rf_reg_r2",
            self.score_regression(&raw, &targets, &features, ModelType::RandomForestRegressor)?,
        );
        metrics.insert(
            "rf_cls_roc_auc",
            self.score_classification(
                &raw,
                &targets,
                &features,
                ModelType::RandomForestClassifier,
            )?,
        );
        metrics.insert(
            "gb_reg_r2",
            self.score_regression(&raw, &targets, &features, ModelType::GradientBoostingRegressor)?,
        );
        metrics.insert(
            "gb_cls_roc_auc",
            self.score_classification(
                &raw,
                &targets,
                &features,
                ModelType::GradientBoostingClassifier,
            )?,
        );
        tracing::info!("advanced metrics: {:?}", metrics);

        let mut pipeline = self.pipeline(&features, ModelType::RandomForestClassifier);
        pipeline.fit(&raw, &targets.classification)?;

        Ok(AdvancedEvaluation {
            metrics,
            artifact: ModelArtifact::new(pipeline),
        })
    }

    fn pipeline(&self, features: &FeatureSet, model_type: ModelType) -> Pipeline {
        Pipeline::new(features.clone(), Estimator::from_config(model_type, &self.config))
    }

    fn score_regression(
        &self,
        raw: &Array2<f64>,
        targets: &Targets,
        features: &FeatureSet,
        model_type: ModelType,
    ) -> MLResult<f64> {
        let splitter = KFold::new(targets.regression_folds, self.config.random_seed);
        let score = cross_val_score(
            raw,
            &targets.regression,
            &splitter,
            || self.pipeline(features, model_type),
            Evaluator::fold_r2_score,
        )?;
        tracing::debug!("{} mean R2 {:.4}", model_type, score);
        Ok(score)
    }

    fn score_classification(
        &self,
        raw: &Array2<f64>,
        targets: &Targets,
        features: &FeatureSet,
        model_type: ModelType,
    ) -> MLResult<f64> {
        let splitter = StratifiedKFold::new(targets.classification_folds, self.config.random_seed);
        let score = cross_val_score(
            raw,
            &targets.classification,
            &splitter,
            || self.pipeline(features, model_type),
            Evaluator::roc_auc_score,
        )?;
        tracing::debug!("{} mean ROC-AUC {:.4}", model_type, score);
        Ok(score)
    }
}
