//! 预处理 + 模型流水线，以及可持久化的模型文件

use crate::models::{Estimator, Model};
use crate::preprocessing::{Feature, FeatureSet, Preprocessor};
use crate::types::{MLError, MLResult, ModelType};
use etl::FeatureTable;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 预处理 + 模型
///
/// 输入为 [`FeatureSet::matrix`] 生成的原始特征矩阵。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    features: FeatureSet,
    preprocessor: Option<Preprocessor>,
    estimator: Estimator,
}

impl Pipeline {
    pub fn new(features: FeatureSet, estimator: Estimator) -> Self {
        Self {
            features,
            preprocessor: None,
            estimator,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn model_type(&self) -> ModelType {
        self.estimator.model_type()
    }

    /// 在训练数据上拟合预处理和模型
    pub fn fit(&mut self, raw: &Array2<f64>, y: &Array1<f64>) -> MLResult<()> {
        let (preprocessor, x) = Preprocessor::fit_transform(raw, self.features.n_numeric())?;
        self.estimator.train(&x, y)?;
        self.preprocessor = Some(preprocessor);
        Ok(())
    }

    pub fn predict(&self, raw: &Array2<f64>) -> MLResult<Array1<f64>> {
        let preprocessor = self
            .preprocessor
            .as_ref()
            .ok_or_else(|| MLError::Prediction("流水线未训练".to_string()))?;
        let x = preprocessor.transform(raw)?;
        self.estimator.predict(&x)
    }

    pub fn fit_table(&mut self, table: &FeatureTable, y: &Array1<f64>) -> MLResult<()> {
        self.features.check_table(table)?;
        let raw = self.features.matrix(&table.rows)?;
        self.fit(&raw, y)
    }
}

/// 持久化的分类流水线及其输入列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    schema_version: u32,
    feature_columns: Vec<String>,
    pipeline: Pipeline,
}

impl ModelArtifact {
    pub const SCHEMA_VERSION: u32 = 1;

    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            schema_version: Self::SCHEMA_VERSION,
            feature_columns: pipeline.features().names(),
            pipeline,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn feature_columns(&self) -> &[String] {
        &self.feature_columns
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn to_bytes(&self) -> MLResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| MLError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> MLResult<Self> {
        let artifact: Self =
            bincode::deserialize(bytes).map_err(|e| MLError::Serialization(e.to_string()))?;
        if artifact.schema_version != Self::SCHEMA_VERSION {
            return Err(MLError::SchemaMismatch(format!(
                "不支持的模型文件版本 {}（当前 {}）",
                artifact.schema_version,
                Self::SCHEMA_VERSION
            )));
        }
        Ok(artifact)
    }

    /// 保存模型
    pub fn save(&self, path: impl AsRef<Path>) -> MLResult<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_bytes()?)?;
        tracing::info!("saved {} artifact to {}", self.pipeline.model_type(), path.display());
        Ok(())
    }

    /// 加载模型
    pub fn load(path: impl AsRef<Path>) -> MLResult<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// 按列名解析输入列，并确认与流水线训练时的列一致
    fn resolve_columns(&self) -> MLResult<Vec<Feature>> {
        let resolved = self
            .feature_columns
            .iter()
            .map(|name| {
                Feature::from_name(name)
                    .ok_or_else(|| MLError::SchemaMismatch(format!("未知的特征列 {}", name)))
            })
            .collect::<MLResult<Vec<_>>>()?;

        let trained: Vec<Feature> = self.pipeline.features().columns().collect();
        if resolved != trained {
            return Err(MLError::SchemaMismatch(format!(
                "模型文件列 {:?} 与流水线列 {:?} 不一致",
                self.feature_columns,
                self.pipeline.features().names()
            )));
        }
        Ok(resolved)
    }

    /// 对特征表预测正类概率
    ///
    /// 缺少任一输入列（如未 enrich 的表）时立即返回 `SchemaMismatch`。
    pub fn predict(&self, table: &FeatureTable) -> MLResult<Array1<f64>> {
        let columns = self.resolve_columns()?;
        for feature in &columns {
            if let Some(column) = feature.enriched_column() {
                if !table.has_column(column) {
                    return Err(MLError::SchemaMismatch(format!(
                        "特征表缺少 {} 列",
                        feature.name()
                    )));
                }
            }
        }

        let mut values = Vec::with_capacity(table.len() * columns.len());
        for row in &table.rows {
            for feature in &columns {
                values.push(feature.value(row)?);
            }
        }
        let raw = Array2::from_shape_vec((table.len(), columns.len()), values)
            .map_err(|e| MLError::Preprocessing(e.to_string()))?;

        self.pipeline.predict(&raw)
    }
}
