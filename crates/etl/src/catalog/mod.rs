//! Catalog API 客户端模块

pub mod channels;
pub mod videos;

use crate::types::{ContentId, ETLConfig, ETLError, ETLResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;

pub use channels::CatalogClient;
pub use videos::BatchFetcher;

/// 服务端对 playlistItems 每页和 videos 每批的上限
pub const MAX_PAGE_SIZE: usize = 50;

/// 频道目录接口
#[async_trait]
pub trait Catalog: Send + Sync {
    /// 根据 handle（如 `@MrBeast`）解析频道 ID
    async fn resolve_channel_id(&self, handle: &str) -> ETLResult<String>;

    /// 获取频道的 uploads 播放列表 ID
    async fn uploads_playlist_id(&self, channel_id: &str) -> ETLResult<String>;

    /// 分页读取播放列表中的视频 ID，最多 `max_results` 个
    async fn list_video_ids(
        &self,
        playlist_id: &str,
        max_results: usize,
    ) -> ETLResult<Vec<ContentId>>;
}

/// API 凭证，构造时校验非空
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: Option<&str>) -> ETLResult<Self> {
        match key.map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Self(key.to_string())),
            _ => Err(ETLError::Configuration(format!(
                "未设置 API key，请先设置 {} 环境变量",
                ETLConfig::API_KEY_ENV
            ))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// 通用 HTTP 客户端配置
pub fn create_http_client(timeout_secs: u64) -> ETLResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent("popularity-etl/0.1")
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(Into::into)
}

/// 带凭证的只读 GET 请求
#[derive(Debug, Clone)]
pub(crate) struct ApiTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl ApiTransport {
    pub(crate) fn new(config: &ETLConfig) -> ETLResult<Self> {
        let api_key = ApiKey::new(config.api_key.as_deref())?;
        Ok(Self {
            client: create_http_client(config.request_timeout_secs)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// 非 2xx 响应直接作为错误返回，不重试
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> ETLResult<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let body = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        Ok(serde_json::from_str(&body)?)
    }
}

/// 去重并保留首次出现的顺序
pub fn dedupe_ids<I>(ids: I) -> Vec<ContentId>
where
    I: IntoIterator<Item = ContentId>,
{
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
