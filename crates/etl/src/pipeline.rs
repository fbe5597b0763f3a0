//! ETL 管道：频道 handle -> 视频 ID -> 视频记录 -> 特征表

use crate::catalog::{dedupe_ids, BatchFetcher, Catalog, CatalogClient};
use crate::features::FeatureDeriver;
use crate::types::{ContentId, ETLConfig, ETLResult, FeatureTable, VideoRecord};

/// 样本量低于该值时给出提示
const SMALL_DATASET_WARNING: usize = 20;

/// 依次处理每个 handle，拼接后去重
pub async fn collect_video_ids(
    catalog: &dyn Catalog,
    handles: &[String],
    per_channel: usize,
) -> ETLResult<Vec<ContentId>> {
    let mut all_ids = Vec::new();

    for handle in handles {
        let channel_id = catalog.resolve_channel_id(handle).await?;
        let uploads = catalog.uploads_playlist_id(&channel_id).await?;
        let ids = catalog.list_video_ids(&uploads, per_channel).await?;
        tracing::info!("Channel {} ({}): {} video ids", handle, channel_id, ids.len());
        all_ids.extend(ids);
    }

    let unique = dedupe_ids(all_ids);
    if unique.len() < SMALL_DATASET_WARNING {
        tracing::warn!(
            "Only {} videos collected; consider adding channels or raising videos_per_channel",
            unique.len()
        );
    }
    Ok(unique)
}

/// ETL 管道
pub struct ETLPipeline {
    config: ETLConfig,
    catalog: CatalogClient,
    fetcher: BatchFetcher,
}

impl ETLPipeline {
    /// 凭证和分页参数在这里一次性校验
    pub fn new(config: ETLConfig) -> ETLResult<Self> {
        let catalog = CatalogClient::new(&config)?;
        let fetcher = BatchFetcher::new(&config)?;
        Ok(Self {
            config,
            catalog,
            fetcher,
        })
    }

    pub fn config(&self) -> &ETLConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogClient {
        &self.catalog
    }

    pub async fn collect_video_ids(&self, handles: &[String]) -> ETLResult<Vec<ContentId>> {
        collect_video_ids(&self.catalog, handles, self.config.videos_per_channel).await
    }

    pub async fn fetch_records(&self, ids: &[ContentId]) -> ETLResult<Vec<VideoRecord>> {
        self.fetcher.fetch_stats(ids).await
    }

    /// 完整的 ETL 流程
    pub async fn run(&self, handles: &[String]) -> ETLResult<FeatureTable> {
        tracing::info!("Running ETL pipeline for {} channels", handles.len());

        let ids = self.collect_video_ids(handles).await?;
        let records = self.fetch_records(&ids).await?;
        let table = FeatureDeriver::to_table(&records)?;

        tracing::info!("ETL pipeline completed with {} rows", table.len());
        Ok(table)
    }
}

/// ETL 管道构建器
pub struct ETLPipelineBuilder {
    config: ETLConfig,
}

impl ETLPipelineBuilder {
    pub fn new() -> Self {
        Self {
            config: ETLConfig::default(),
        }
    }

    pub fn from_config(config: ETLConfig) -> Self {
        Self { config }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    pub fn with_videos_per_channel(mut self, count: usize) -> Self {
        self.config.videos_per_channel = count;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.config.batch_size = batch_size;
        self
    }

    pub fn with_throttle_ms(mut self, millis: u64) -> Self {
        self.config.throttle_ms = millis;
        self
    }

    pub fn build(self) -> ETLResult<ETLPipeline> {
        ETLPipeline::new(self.config)
    }
}

impl Default for ETLPipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
