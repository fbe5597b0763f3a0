//! 数据预处理和特征工程模块

use crate::types::{MLError, MLResult};
use etl::{EnrichedColumn, FeatureRow, FeatureTable};
use ndarray::{concatenate, Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// 可用于建模的特征列
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feature {
    DurationSeconds,
    TitleLen,
    PublishHour,
    PublishDow,
    PeakHour,
    IsShort,
    DurationBin,
    HasHowto,
    HasVs,
}

impl Feature {
    const ALL: [Feature; 9] = [
        Feature::DurationSeconds,
        Feature::TitleLen,
        Feature::PublishHour,
        Feature::PublishDow,
        Feature::PeakHour,
        Feature::IsShort,
        Feature::DurationBin,
        Feature::HasHowto,
        Feature::HasVs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::DurationSeconds => "duration_seconds",
            Feature::TitleLen => "title_len",
            Feature::PublishHour => "publish_hour",
            Feature::PublishDow => "publish_dow",
            Feature::PeakHour => "peak_hour",
            Feature::IsShort => "is_short",
            Feature::DurationBin => "duration_bin",
            Feature::HasHowto => "has_howto",
            Feature::HasVs => "has_vs",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|feature| feature.name() == name)
    }

    /// 需要先 enrich 才存在的列
    pub fn enriched_column(&self) -> Option<EnrichedColumn> {
        match self {
            Feature::IsShort => Some(EnrichedColumn::IsShort),
            Feature::DurationBin => Some(EnrichedColumn::DurationBin),
            Feature::HasHowto => Some(EnrichedColumn::HasHowto),
            Feature::HasVs => Some(EnrichedColumn::HasVs),
            _ => None,
        }
    }

    pub fn value(&self, row: &FeatureRow) -> MLResult<f64> {
        let value = match self {
            Feature::DurationSeconds => row.duration_seconds,
            Feature::TitleLen => row.title_len as f64,
            Feature::PublishHour => f64::from(row.publish_hour),
            Feature::PublishDow => f64::from(row.publish_dow),
            Feature::PeakHour => f64::from(row.peak_hour),
            Feature::IsShort | Feature::DurationBin | Feature::HasHowto | Feature::HasVs => {
                let column = self.enriched_column().ok_or_else(|| {
                    MLError::Preprocessing(format!("{} 不是增强列", self.name()))
                })?;
                column.value(row).map(f64::from).ok_or_else(|| {
                    MLError::SchemaMismatch(format!(
                        "视频 {} 缺少 {} 列，请先调用 enrich",
                        row.video_id,
                        self.name()
                    ))
                })?
            }
        };
        Ok(value)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 数值列 + 类别列
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub numeric: Vec<Feature>,
    pub categorical: Vec<Feature>,
}

impl FeatureSet {
    /// 基础模型使用的列
    pub fn basic() -> Self {
        Self {
            numeric: vec![Feature::DurationSeconds, Feature::TitleLen],
            categorical: vec![Feature::PublishHour, Feature::PublishDow, Feature::PeakHour],
        }
    }

    /// 进阶模型额外使用增强列
    pub fn advanced() -> Self {
        let mut set = Self::basic();
        set.categorical.extend([
            Feature::IsShort,
            Feature::DurationBin,
            Feature::HasHowto,
            Feature::HasVs,
        ]);
        set
    }

    pub fn n_numeric(&self) -> usize {
        self.numeric.len()
    }

    /// 输入列顺序：数值列在前，类别列在后
    pub fn columns(&self) -> impl Iterator<Item = Feature> + '_ {
        self.numeric.iter().chain(self.categorical.iter()).copied()
    }

    pub fn names(&self) -> Vec<String> {
        self.columns().map(|f| f.name().to_string()).collect()
    }

    /// 检查表中是否具备全部列
    pub fn check_table(&self, table: &FeatureTable) -> MLResult<()> {
        for feature in self.columns() {
            if let Some(column) = feature.enriched_column() {
                if !table.has_column(column) {
                    return Err(MLError::SchemaMismatch(format!(
                        "特征表缺少 {} 列",
                        feature.name()
                    )));
                }
            }
        }
        Ok(())
    }

    /// 提取原始特征矩阵（未缩放、未编码）
    pub fn matrix(&self, rows: &[FeatureRow]) -> MLResult<Array2<f64>> {
        let n_cols = self.numeric.len() + self.categorical.len();
        let mut values = Vec::with_capacity(rows.len() * n_cols);
        for row in rows {
            for feature in self.columns() {
                values.push(feature.value(row)?);
            }
        }
        Array2::from_shape_vec((rows.len(), n_cols), values)
            .map_err(|e| MLError::Preprocessing(e.to_string()))
    }
}

/// 特征缩放器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// 从训练数据拟合缩放器（总体标准差）
    pub fn fit(data: &ArrayView2<f64>) -> MLResult<Self> {
        if data.nrows() == 0 {
            return Err(MLError::Preprocessing("数据为空".to_string()));
        }

        let mean = data.mean_axis(Axis(0)).ok_or_else(|| {
            MLError::Preprocessing("无法计算均值".to_string())
        })?;

        let std = data.std_axis(Axis(0), 0.0);

        Ok(Self { mean, std })
    }

    /// 标准化数据
    pub fn transform(&self, data: &ArrayView2<f64>) -> MLResult<Array2<f64>> {
        if data.ncols() != self.mean.len() {
            return Err(MLError::DimensionMismatch {
                expected: self.mean.len(),
                actual: data.ncols(),
            });
        }

        let mut normalized = data.to_owned();
        for mut row in normalized.axis_iter_mut(Axis(0)) {
            for (j, val) in row.iter_mut().enumerate() {
                let std = if self.std[j].abs() < 1e-10 { 1.0 } else { self.std[j] };
                *val = (*val - self.mean[j]) / std;
            }
        }

        Ok(normalized)
    }
}

/// 独热编码器，未见过的类别编码为全 0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    categories: Vec<Vec<i64>>,
}

impl OneHotEncoder {
    pub fn fit(data: &ArrayView2<f64>) -> Self {
        let categories = data
            .axis_iter(Axis(1))
            .map(|column| {
                let mut levels: Vec<i64> = column.iter().map(|&v| v.round() as i64).collect();
                levels.sort_unstable();
                levels.dedup();
                levels
            })
            .collect();
        Self { categories }
    }

    pub fn n_outputs(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    pub fn transform(&self, data: &ArrayView2<f64>) -> MLResult<Array2<f64>> {
        if data.ncols() != self.categories.len() {
            return Err(MLError::DimensionMismatch {
                expected: self.categories.len(),
                actual: data.ncols(),
            });
        }

        let mut encoded = Array2::<f64>::zeros((data.nrows(), self.n_outputs()));
        for (i, row) in data.axis_iter(Axis(0)).enumerate() {
            let mut offset = 0;
            for (levels, &value) in self.categories.iter().zip(row.iter()) {
                if let Ok(pos) = levels.binary_search(&(value.round() as i64)) {
                    encoded[[i, offset + pos]] = 1.0;
                }
                offset += levels.len();
            }
        }

        Ok(encoded)
    }
}

/// 列变换：数值列标准化，类别列独热编码
///
/// 只在训练折上拟合，验证折使用训练折的统计量。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preprocessor {
    n_numeric: usize,
    scaler: Option<Scaler>,
    encoder: Option<OneHotEncoder>,
}

impl Preprocessor {
    pub fn fit(raw: &Array2<f64>, n_numeric: usize) -> MLResult<Self> {
        if n_numeric > raw.ncols() {
            return Err(MLError::DimensionMismatch {
                expected: n_numeric,
                actual: raw.ncols(),
            });
        }

        let (numeric, categorical) = raw.view().split_at(Axis(1), n_numeric);
        let scaler = if n_numeric > 0 { Some(Scaler::fit(&numeric)?) } else { None };
        let encoder = if categorical.ncols() > 0 {
            Some(OneHotEncoder::fit(&categorical))
        } else {
            None
        };

        Ok(Self {
            n_numeric,
            scaler,
            encoder,
        })
    }

    pub fn transform(&self, raw: &Array2<f64>) -> MLResult<Array2<f64>> {
        if self.n_numeric > raw.ncols() {
            return Err(MLError::DimensionMismatch {
                expected: self.n_numeric,
                actual: raw.ncols(),
            });
        }

        let (numeric, categorical) = raw.view().split_at(Axis(1), self.n_numeric);
        let mut blocks = Vec::new();
        if let Some(scaler) = &self.scaler {
            blocks.push(scaler.transform(&numeric)?);
        }
        if let Some(encoder) = &self.encoder {
            blocks.push(encoder.transform(&categorical)?);
        }

        if blocks.is_empty() {
            return Ok(Array2::zeros((raw.nrows(), 0)));
        }
        let views: Vec<_> = blocks.iter().map(|b| b.view()).collect();
        concatenate(Axis(1), &views).map_err(|e| MLError::Preprocessing(e.to_string()))
    }

    pub fn fit_transform(raw: &Array2<f64>, n_numeric: usize) -> MLResult<(Self, Array2<f64>)> {
        let preprocessor = Self::fit(raw, n_numeric)?;
        let transformed = preprocessor.transform(raw)?;
        Ok((preprocessor, transformed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaler() {
        let data = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let scaler = Scaler::fit(&data.view()).unwrap();
        let transformed = scaler.transform(&data.view()).unwrap();

        assert!(transformed.mean_axis(Axis(0)).unwrap().iter().all(|&x| x.abs() < 1e-10));
        // 总体标准差: sqrt(8/3)
        assert!((scaler.std[0] - (8.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_scaler_constant_column() {
        let data = array![[5.0], [5.0]];
        let scaler = Scaler::fit(&data.view()).unwrap();
        assert_eq!(scaler.transform(&data.view()).unwrap(), array![[0.0], [0.0]]);
    }

    #[test]
    fn test_one_hot_unknown_category_is_all_zero() {
        let train = array![[1.0, 0.0], [3.0, 1.0], [1.0, 1.0]];
        let encoder = OneHotEncoder::fit(&train.view());
        assert_eq!(encoder.n_outputs(), 4);

        let test = array![[3.0, 0.0], [7.0, 1.0]];
        let encoded = encoder.transform(&test.view()).unwrap();
        assert_eq!(encoded, array![[0.0, 1.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_preprocessor_uses_training_statistics() {
        let train = array![[10.0, 1.0], [20.0, 2.0], [30.0, 1.0]];
        let (pre, transformed) = Preprocessor::fit_transform(&train, 1).unwrap();
        assert_eq!(transformed.ncols(), 3);

        let test = array![[20.0, 5.0]];
        let out = pre.transform(&test).unwrap();
        assert_eq!(out, array![[0.0, 0.0, 0.0]]);
    }

    #[test]
    fn test_feature_names_round_trip() {
        for feature in FeatureSet::advanced().columns() {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("views"), None);
        assert_eq!(
            FeatureSet::basic().names(),
            vec!["duration_seconds", "title_len", "publish_hour", "publish_dow", "peak_hour"]
        );
    }
}
