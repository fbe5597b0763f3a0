//! 按批获取视频详情

use super::{ApiTransport, MAX_PAGE_SIZE};
use crate::types::{ContentId, ETLConfig, ETLError, ETLResult, VideoRecord};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const VIDEO_FIELDS: &str = "items(id,snippet(title,publishedAt),contentDetails(duration),statistics(viewCount,likeCount,commentCount))";

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoRecord>,
}

/// 视频详情批量获取器
///
/// 每批之后固定等待 `throttle`，遇到限流响应也不会退避重试。
#[derive(Debug, Clone)]
pub struct BatchFetcher {
    transport: ApiTransport,
    batch_size: usize,
    throttle: Duration,
}

impl BatchFetcher {
    pub fn new(config: &ETLConfig) -> ETLResult<Self> {
        if config.batch_size == 0 || config.batch_size > MAX_PAGE_SIZE {
            return Err(ETLError::Configuration(format!(
                "batch_size 必须在 1..={} 之间，当前为 {}",
                MAX_PAGE_SIZE, config.batch_size
            )));
        }

        Ok(Self {
            transport: ApiTransport::new(config)?,
            batch_size: config.batch_size,
            throttle: Duration::from_millis(config.throttle_ms),
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// 按顺序分批请求，结果按批次顺序拼接；任何一批失败都会中止整个获取
    pub async fn fetch_stats(&self, ids: &[ContentId]) -> ETLResult<Vec<VideoRecord>> {
        let mut records = Vec::with_capacity(ids.len());

        for (batch_idx, chunk) in ids.chunks(self.batch_size).enumerate() {
            let response: VideoListResponse = self
                .transport
                .get_json(
                    "videos",
                    &[
                        ("part", "snippet,contentDetails,statistics".to_string()),
                        ("id", chunk.join(",")),
                        ("fields", VIDEO_FIELDS.to_string()),
                    ],
                )
                .await?;

            debug!(
                "Batch {}: requested {} ids, received {} records",
                batch_idx + 1,
                chunk.len(),
                response.items.len()
            );
            records.extend(response.items);

            tokio::time::sleep(self.throttle).await;
        }

        info!("Fetched {} video records for {} ids", records.len(), ids.len());
        Ok(records)
    }
}
