//! # ETL - Extract, Transform, Load
//!
//! 用于频道视频元数据的 ETL 管道
//!
//! ## 功能
//!
//! - 解析频道 handle，分页读取 uploads 播放列表
//! - 按批（每批最多 50 个 ID）获取视频详情，批间固定限流
//! - 将原始记录转换为特征表
//! - 幂等的特征增强
//! - 特征表 / 指标的持久化

pub mod types;
pub mod catalog;
pub mod features;
pub mod enrichment;
pub mod storage;
pub mod pipeline;

pub use catalog::{dedupe_ids, ApiKey, BatchFetcher, Catalog, CatalogClient};
pub use enrichment::enrich;
pub use features::FeatureDeriver;
pub use pipeline::{ETLPipeline, ETLPipelineBuilder};
pub use storage::Storage;
pub use types::{
    ContentId, ETLConfig, ETLError, ETLResult, EnrichedColumn, FeatureRow, FeatureTable,
    VideoRecord,
};
