//! 频道解析与 uploads 播放列表分页

use super::{ApiTransport, Catalog, MAX_PAGE_SIZE};
use crate::types::{ContentId, ETLConfig, ETLError, ETLResult};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChannelListResponse {
    #[serde(default)]
    items: Vec<ChannelItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelItem {
    content_details: Option<ChannelContentDetails>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChannelContentDetails {
    related_playlists: Option<RelatedPlaylists>,
}

#[derive(Debug, Deserialize)]
struct RelatedPlaylists {
    uploads: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    #[serde(default)]
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    content_details: PlaylistItemDetails,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemDetails {
    video_id: ContentId,
}

/// Catalog API 频道客户端
#[derive(Debug, Clone)]
pub struct CatalogClient {
    transport: ApiTransport,
    page_size: usize,
}

impl CatalogClient {
    /// 未配置 API key 时返回 `Configuration` 错误，不发出任何请求
    pub fn new(config: &ETLConfig) -> ETLResult<Self> {
        if config.page_size == 0 || config.page_size > MAX_PAGE_SIZE {
            return Err(ETLError::Configuration(format!(
                "page_size 必须在 1..={} 之间，当前为 {}",
                MAX_PAGE_SIZE, config.page_size
            )));
        }

        Ok(Self {
            transport: ApiTransport::new(config)?,
            page_size: config.page_size,
        })
    }

    /// handle 统一加上 `@` 前缀
    fn normalize_handle(handle: &str) -> String {
        if handle.starts_with('@') {
            handle.to_string()
        } else {
            format!("@{}", handle)
        }
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn resolve_channel_id(&self, handle: &str) -> ETLResult<String> {
        let query = Self::normalize_handle(handle);
        let response: SearchResponse = self
            .transport
            .get_json(
                "search",
                &[
                    ("part", "snippet".to_string()),
                    ("type", "channel".to_string()),
                    ("q", query),
                    ("maxResults", "1".to_string()),
                    ("fields", "items(id(channelId))".to_string()),
                ],
            )
            .await?;

        let channel_id = response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.id.channel_id)
            .ok_or_else(|| ETLError::NotFound(format!("没有与 handle {} 匹配的频道", handle)))?;

        debug!("Resolved handle {} to channel {}", handle, channel_id);
        Ok(channel_id)
    }

    async fn uploads_playlist_id(&self, channel_id: &str) -> ETLResult<String> {
        let response: ChannelListResponse = self
            .transport
            .get_json(
                "channels",
                &[
                    ("part", "contentDetails".to_string()),
                    ("id", channel_id.to_string()),
                    (
                        "fields",
                        "items(contentDetails(relatedPlaylists(uploads)))".to_string(),
                    ),
                ],
            )
            .await?;

        response
            .items
            .into_iter()
            .next()
            .and_then(|item| item.content_details)
            .and_then(|details| details.related_playlists)
            .and_then(|playlists| playlists.uploads)
            .ok_or_else(|| ETLError::NotFound(format!("频道 {} 没有 uploads 播放列表", channel_id)))
    }

    async fn list_video_ids(
        &self,
        playlist_id: &str,
        max_results: usize,
    ) -> ETLResult<Vec<ContentId>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        // 最后一页没有 nextPageToken，循环必然结束
        while ids.len() < max_results {
            let mut params = vec![
                ("part", "contentDetails".to_string()),
                ("playlistId", playlist_id.to_string()),
                ("maxResults", self.page_size.to_string()),
                (
                    "fields",
                    "nextPageToken,items(contentDetails(videoId))".to_string(),
                ),
            ];
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page: PlaylistItemsResponse =
                self.transport.get_json("playlistItems", &params).await?;
            pages += 1;
            debug!(
                "Playlist {} page {}: {} items",
                playlist_id,
                pages,
                page.items.len()
            );

            ids.extend(page.items.into_iter().map(|item| item.content_details.video_id));

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        ids.truncate(max_results);
        info!(
            "Collected {} video ids from playlist {} in {} pages",
            ids.len(),
            playlist_id,
            pages
        );
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_handle() {
        assert_eq!(CatalogClient::normalize_handle("MrBeast"), "@MrBeast");
        assert_eq!(CatalogClient::normalize_handle("@MrBeast"), "@MrBeast");
    }

    #[test]
    fn test_rejects_oversized_page() {
        let config = ETLConfig {
            api_key: Some("key".to_string()),
            page_size: 51,
            ..ETLConfig::default()
        };
        assert!(matches!(CatalogClient::new(&config), Err(ETLError::Configuration(_))));
    }
}
