//! 原始视频记录 -> 特征行

use crate::types::{ETLError, ETLResult, FeatureRow, FeatureTable, VideoRecord};
use chrono::{DateTime, Datelike, Timelike};
use regex::Regex;
use std::sync::LazyLock;

/// 晚间高峰时段 18:00 - 22:59
const PEAK_HOURS: std::ops::RangeInclusive<u32> = 18..=22;

static ISO_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^P(?:(?P<weeks>\d+)W)?(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$",
    )
    .expect("duration pattern is valid")
});

/// 特征提取器
pub struct FeatureDeriver;

impl FeatureDeriver {
    /// 单条记录转特征行，相同输入总是得到相同输出（不依赖当前时间）
    pub fn to_feature_row(record: &VideoRecord) -> ETLResult<FeatureRow> {
        let title = record.snippet.title.clone();
        let published_at = DateTime::parse_from_rfc3339(&record.snippet.published_at)
            .map_err(|e| {
                ETLError::Parse(format!(
                    "视频 {} 的发布时间 {:?} 无法解析: {}",
                    record.id, record.snippet.published_at, e
                ))
            })?
            .naive_utc();
        let duration_seconds = parse_duration(&record.content_details.duration).map_err(|e| {
            ETLError::Parse(format!("视频 {} 的时长无法解析: {}", record.id, e))
        })?;

        let views = parse_count(&record.id, "viewCount", record.statistics.view_count.as_deref())?;
        let likes = parse_count(&record.id, "likeCount", record.statistics.like_count.as_deref())?;
        let comments = parse_count(
            &record.id,
            "commentCount",
            record.statistics.comment_count.as_deref(),
        )?;

        let publish_hour = published_at.hour();

        Ok(FeatureRow {
            video_id: record.id.clone(),
            title_len: title.chars().count(),
            title,
            published_at,
            publish_hour,
            publish_dow: published_at.weekday().num_days_from_monday(),
            duration_seconds,
            views,
            likes,
            comments,
            likes_per_1k_views: likes as f64 / views.max(1) as f64 * 1000.0,
            log_views: (views as f64).ln_1p(),
            peak_hour: u8::from(PEAK_HOURS.contains(&publish_hour)),
            is_short: None,
            duration_bin: None,
            has_howto: None,
            has_vs: None,
        })
    }

    /// 批量转换，保持输入顺序；任一记录出错则整体失败
    pub fn to_table(records: &[VideoRecord]) -> ETLResult<FeatureTable> {
        let rows = records
            .iter()
            .map(Self::to_feature_row)
            .collect::<ETLResult<Vec<_>>>()?;

        tracing::info!("Derived {} feature rows", rows.len());
        Ok(FeatureTable::new(rows))
    }
}

/// 解析 ISO-8601 时长（如 `PT1H2M3S`、`P1DT2H`、`P0D`），返回秒数
///
/// 年、月没有固定秒数，视为格式错误。
pub fn parse_duration(token: &str) -> ETLResult<f64> {
    let caps = ISO_DURATION
        .captures(token.trim())
        .filter(|caps| caps.iter().skip(1).any(|group| group.is_some()))
        .ok_or_else(|| ETLError::Parse(format!("无效的 ISO-8601 时长: {:?}", token)))?;

    let component = |name: &str, unit: f64| -> ETLResult<f64> {
        match caps.name(name) {
            Some(m) => m
                .as_str()
                .parse::<f64>()
                .map(|value| value * unit)
                .map_err(|e| ETLError::Parse(format!("时长分量 {:?} 无效: {}", m.as_str(), e))),
            None => Ok(0.0),
        }
    };

    Ok(component("weeks", 604_800.0)?
        + component("days", 86_400.0)?
        + component("hours", 3_600.0)?
        + component("minutes", 60.0)?
        + component("seconds", 1.0)?)
}

/// 计数缺失视为 0
fn parse_count(video_id: &str, field: &str, raw: Option<&str>) -> ETLResult<u64> {
    match raw {
        None => Ok(0),
        Some(value) => value.trim().parse::<u64>().map_err(|e| {
            ETLError::Parse(format!("视频 {} 的 {} = {:?} 无效: {}", video_id, field, value, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentDetails, Snippet, Statistics};

    fn record(
        published_at: &str,
        duration: &str,
        views: Option<&str>,
        likes: Option<&str>,
    ) -> VideoRecord {
        VideoRecord {
            id: "vid1".to_string(),
            snippet: Snippet {
                title: "How to build a treehouse".to_string(),
                published_at: published_at.to_string(),
            },
            content_details: ContentDetails {
                duration: duration.to_string(),
            },
            statistics: Statistics {
                view_count: views.map(String::from),
                like_count: likes.map(String::from),
                comment_count: None,
            },
        }
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("PT1H2M3S").unwrap(), 3723.0);
        assert_eq!(parse_duration("PT45S").unwrap(), 45.0);
        assert_eq!(parse_duration("P1DT2H").unwrap(), 93_600.0);
        assert_eq!(parse_duration("P0D").unwrap(), 0.0);
        assert_eq!(parse_duration("PT1.5S").unwrap(), 1.5);
        assert_eq!(parse_duration("P1W").unwrap(), 604_800.0);
    }

    #[test]
    fn test_parse_duration_rejects_malformed() {
        for token in ["", "P", "PT", "12:30", "P1Y", "PT5X", "1H"] {
            assert!(
                matches!(parse_duration(token), Err(ETLError::Parse(_))),
                "token {:?} should be rejected",
                token
            );
        }
    }

    #[test]
    fn test_zero_views_ratio() {
        let row = FeatureDeriver::to_feature_row(&record(
            "2024-03-01T20:15:00Z",
            "PT30S",
            Some("0"),
            Some("5"),
        ))
        .unwrap();

        assert_eq!(row.likes_per_1k_views, 5000.0);
        assert_eq!(row.log_views, 0.0);
        assert_eq!(row.comments, 0);
        assert_eq!(row.publish_hour, 20);
        assert_eq!(row.peak_hour, 1);
    }

    #[test]
    fn test_off_peak_and_timezone_normalization() {
        // 12:30+02:00 == 10:30 UTC，2024-03-04 是周一
        let row = FeatureDeriver::to_feature_row(&record(
            "2024-03-04T12:30:00+02:00",
            "PT10M",
            Some("999"),
            None,
        ))
        .unwrap();

        assert_eq!(row.publish_hour, 10);
        assert_eq!(row.peak_hour, 0);
        assert_eq!(row.publish_dow, 0);
        assert_eq!(row.duration_seconds, 600.0);
        assert_eq!(row.likes, 0);
        assert_eq!(row.title_len, 24);
        assert!((row.log_views - 1000f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_missing_statistics_default_to_zero() {
        let row =
            FeatureDeriver::to_feature_row(&record("2024-03-01T08:00:00Z", "PT1M", None, None))
                .unwrap();
        assert_eq!((row.views, row.likes, row.comments), (0, 0, 0));
        assert_eq!(row.likes_per_1k_views, 0.0);
    }

    #[test]
    fn test_malformed_fields_are_fatal() {
        let bad_duration = record("2024-03-01T08:00:00Z", "ten minutes", None, None);
        assert!(matches!(FeatureDeriver::to_feature_row(&bad_duration), Err(ETLError::Parse(_))));

        let bad_time = record("yesterday", "PT1M", None, None);
        assert!(matches!(FeatureDeriver::to_feature_row(&bad_time), Err(ETLError::Parse(_))));

        let bad_count = record("2024-03-01T08:00:00Z", "PT1M", Some("lots"), None);
        assert!(matches!(FeatureDeriver::to_feature_row(&bad_count), Err(ETLError::Parse(_))));
    }

    #[test]
    fn test_to_table_is_deterministic() {
        let records = vec![
            record("2024-03-01T08:00:00Z", "PT1M", Some("10"), Some("1")),
            record("2024-03-02T19:00:00Z", "PT2M", Some("20"), Some("2")),
        ];
        let first = FeatureDeriver::to_table(&records).unwrap();
        let second = FeatureDeriver::to_table(&records).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }
}
