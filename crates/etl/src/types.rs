//! 核心类型定义

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ETLResult<T> = Result<T, ETLError>;

#[derive(Debug, Error)]
pub enum ETLError {
    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("未找到: {0}")]
    NotFound(String),

    #[error("HTTP 请求失败: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("解析失败: {0}")]
    Parse(String),

    #[error("JSON 解析失败: {0}")]
    JsonParsing(#[from] serde_json::Error),

    #[error("CSV 读写失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 视频 ID（Catalog API 中的 content id）
pub type ContentId = String;

/// Catalog API 返回的单个视频记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: ContentId,
    pub snippet: Snippet,
    pub content_details: ContentDetails,
    #[serde(default)]
    pub statistics: Statistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
    pub title: String,
    /// RFC 3339 时间戳，例如 `2024-03-01T18:30:00Z`
    pub published_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentDetails {
    /// ISO-8601 时长，例如 `PT12M3S`
    pub duration: String,
}

/// 互动计数，API 以字符串形式返回，隐藏时字段缺失
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub view_count: Option<String>,
    pub like_count: Option<String>,
    pub comment_count: Option<String>,
}

/// 特征行（每个视频一行）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub video_id: ContentId,
    pub title: String,
    /// 标题字符数
    pub title_len: usize,
    /// 去掉时区后的 UTC 时间
    #[serde(with = "naive_timestamp")]
    pub published_at: NaiveDateTime,
    pub publish_hour: u32,
    /// 星期几，周一为 0
    pub publish_dow: u32,
    pub duration_seconds: f64,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub likes_per_1k_views: f64,
    pub log_views: f64,
    pub peak_hour: u8,

    // === 增强列（enrich 之前为空） ===
    #[serde(default)]
    pub is_short: Option<u8>,
    #[serde(default)]
    pub duration_bin: Option<u32>,
    #[serde(default)]
    pub has_howto: Option<u8>,
    #[serde(default)]
    pub has_vs: Option<u8>,
}

/// 由 enrich 计算的列
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnrichedColumn {
    IsShort,
    DurationBin,
    HasHowto,
    HasVs,
}

impl EnrichedColumn {
    pub const ALL: [EnrichedColumn; 4] = [
        EnrichedColumn::IsShort,
        EnrichedColumn::DurationBin,
        EnrichedColumn::HasHowto,
        EnrichedColumn::HasVs,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            EnrichedColumn::IsShort => "is_short",
            EnrichedColumn::DurationBin => "duration_bin",
            EnrichedColumn::HasHowto => "has_howto",
            EnrichedColumn::HasVs => "has_vs",
        }
    }

    /// 读取某一行上该列的值
    pub fn value(&self, row: &FeatureRow) -> Option<u32> {
        match self {
            EnrichedColumn::IsShort => row.is_short.map(u32::from),
            EnrichedColumn::DurationBin => row.duration_bin,
            EnrichedColumn::HasHowto => row.has_howto.map(u32::from),
            EnrichedColumn::HasVs => row.has_vs.map(u32::from),
        }
    }
}

impl std::fmt::Display for EnrichedColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 特征表，行顺序与视频 ID 的收集顺序一致
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    pub rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 列存在 = 表非空且每一行都有值
    pub fn has_column(&self, column: EnrichedColumn) -> bool {
        !self.rows.is_empty() && self.rows.iter().all(|row| column.value(row).is_some())
    }

    pub fn views(&self) -> Vec<u64> {
        self.rows.iter().map(|row| row.views).collect()
    }

    pub fn log_views(&self) -> Vec<f64> {
        self.rows.iter().map(|row| row.log_views).collect()
    }
}

/// ETL 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ETLConfig {
    /// Catalog API key（进程启动时读取一次）
    pub api_key: Option<String>,
    /// API 根地址
    pub base_url: String,
    /// playlistItems 每页条数（服务端上限 50）
    pub page_size: usize,
    /// videos 每批 ID 数（服务端上限 50）
    pub batch_size: usize,
    /// 每批请求之后的固定等待（毫秒）
    pub throttle_ms: u64,
    /// 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 每个频道最多收集的视频数
    pub videos_per_channel: usize,
}

impl ETLConfig {
    pub const API_KEY_ENV: &'static str = "YOUTUBE_API_KEY";
    pub const BASE_URL_ENV: &'static str = "YOUTUBE_API_BASE";

    /// 从环境变量读取 key（以及可选的 API 根地址），其余使用默认值
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_key: std::env::var(Self::API_KEY_ENV)
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: std::env::var(Self::BASE_URL_ENV).unwrap_or(defaults.base_url.clone()),
            ..defaults
        }
    }
}

impl Default for ETLConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://www.googleapis.com/youtube/v3".to_string(),
            page_size: 50,
            batch_size: 50,
            throttle_ms: 50,
            request_timeout_secs: 30,
            videos_per_channel: 250,
        }
    }
}

/// `published_at` 的 CSV 格式：`%Y-%m-%d %H:%M:%S[.f]`，读取时也接受 `T` 分隔
pub(crate) mod naive_timestamp {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw.replacen('T', " ", 1), FORMAT).map_err(de::Error::custom)
    }
}
