//! 特征表增强模块
//!
//! `enrich` 是表到表的纯函数：每个增强列单独检查是否已存在，已存在的列原样保留，
//! 因此对同一张表重复调用（或对从 CSV 重新读入的表调用）结果不变。

use crate::types::{EnrichedColumn, FeatureRow, FeatureTable};
use regex::Regex;
use std::sync::LazyLock;

/// `duration_bin` 的等频分箱数
pub const DURATION_BINS: usize = 5;

/// 不超过该秒数的视频视为 Shorts
pub const SHORT_MAX_SECONDS: f64 = 60.0;

static HOWTO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bhow to\b").expect("howto pattern is valid"));
static VERSUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bvs\b").expect("vs pattern is valid"));

/// 返回增强后的新表
pub fn enrich(table: &FeatureTable) -> FeatureTable {
    let mut enriched = table.clone();
    if enriched.is_empty() {
        return enriched;
    }

    for column in EnrichedColumn::ALL {
        if table.has_column(column) {
            tracing::debug!("Column {} already present, keeping it", column);
            continue;
        }

        match column {
            EnrichedColumn::IsShort => {
                for row in &mut enriched.rows {
                    row.is_short = Some(u8::from(row.duration_seconds <= SHORT_MAX_SECONDS));
                }
            }
            EnrichedColumn::DurationBin => {
                let durations: Vec<f64> =
                    enriched.rows.iter().map(|r| r.duration_seconds).collect();
                let bins = quantile_bins(&durations, DURATION_BINS);
                for (row, bin) in enriched.rows.iter_mut().zip(bins) {
                    row.duration_bin = Some(bin);
                }
            }
            EnrichedColumn::HasHowto => set_title_flag(&mut enriched.rows, &HOWTO, |row, flag| {
                row.has_howto = Some(flag)
            }),
            EnrichedColumn::HasVs => set_title_flag(&mut enriched.rows, &VERSUS, |row, flag| {
                row.has_vs = Some(flag)
            }),
        }
    }

    enriched
}

fn set_title_flag(rows: &mut [FeatureRow], pattern: &Regex, set: impl Fn(&mut FeatureRow, u8)) {
    for row in rows {
        let flag = u8::from(pattern.is_match(&row.title));
        set(row, flag);
    }
}

/// 等频分箱，返回每个值所在箱的下标
///
/// 分位点采用线性插值；重复的分位点会被去掉，所以数据区分度不够时箱数可能少于 `q`。
/// 第一个区间左闭，其余区间左开右闭。
pub fn quantile_bins(values: &[f64], q: usize) -> Vec<u32> {
    if values.is_empty() {
        return Vec::new();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut edges: Vec<f64> = (0..=q)
        .map(|i| quantile(&sorted, i as f64 / q as f64))
        .collect();
    edges.dedup();

    if edges.len() < 2 {
        return vec![0; values.len()];
    }

    let inner = &edges[1..];
    values
        .iter()
        .map(|&v| inner.partition_point(|&edge| edge < v).min(inner.len() - 1) as u32)
        .collect()
}

/// 已排序数据上的线性插值分位数
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(id: &str, title: &str, duration_seconds: f64) -> FeatureRow {
        FeatureRow {
            video_id: id.to_string(),
            title: title.to_string(),
            title_len: title.chars().count(),
            published_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            publish_hour: 12,
            publish_dow: 0,
            duration_seconds,
            views: 100,
            likes: 10,
            comments: 1,
            likes_per_1k_views: 100.0,
            log_views: 101f64.ln(),
            peak_hour: 0,
            is_short: None,
            duration_bin: None,
            has_howto: None,
            has_vs: None,
        }
    }

    fn sample_table() -> FeatureTable {
        FeatureTable::new(vec![
            row("a", "How To bake bread", 30.0),
            row("b", "Cats VS dogs", 60.0),
            row("c", "showdown versus", 120.0),
            row("d", "how tomorrow works", 600.0),
            row("e", "vs.", 1800.0),
            row("f", "plain", 45.0),
        ])
    }

    #[test]
    fn test_enrich_columns() {
        let enriched = enrich(&sample_table());
        let flags: Vec<_> = enriched
            .rows
            .iter()
            .map(|r| (r.is_short.unwrap(), r.has_howto.unwrap(), r.has_vs.unwrap()))
            .collect();

        assert_eq!(
            flags,
            vec![(1, 1, 0), (1, 0, 1), (0, 0, 0), (0, 0, 0), (0, 0, 1), (1, 0, 0)]
        );
        for column in EnrichedColumn::ALL {
            assert!(enriched.has_column(column));
        }
    }

    #[test]
    fn test_enrich_is_idempotent() {
        let once = enrich(&sample_table());
        let twice = enrich(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_existing_column_is_kept() {
        let mut table = sample_table();
        for r in &mut table.rows {
            r.is_short = Some(0);
        }

        let enriched = enrich(&table);
        assert!(enriched.rows.iter().all(|r| r.is_short == Some(0)));
        assert!(enriched.has_column(EnrichedColumn::HasVs));
    }

    #[test]
    fn test_partially_filled_column_is_recomputed() {
        let mut table = sample_table();
        table.rows[0].has_vs = Some(1);

        let enriched = enrich(&table);
        assert_eq!(enriched.rows[0].has_vs, Some(0));
    }

    #[test]
    fn test_quantile_bins_five_buckets() {
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(quantile_bins(&values, 5), vec![0, 0, 1, 1, 2, 2, 3, 3, 4, 4]);
    }

    #[test]
    fn test_quantile_bins_drop_duplicate_edges() {
        // 分位点 [1, 1, 1, 1, 2, 3] 去重后只剩两个箱
        let values = [1.0, 1.0, 1.0, 1.0, 2.0, 3.0];
        let bins = quantile_bins(&values, 5);
        assert_eq!(bins, vec![0, 0, 0, 0, 0, 1]);

        assert_eq!(quantile_bins(&[7.0, 7.0, 7.0], 5), vec![0, 0, 0]);
        assert!(quantile_bins(&[], 5).is_empty());
    }

    #[test]
    fn test_enrich_empty_table() {
        let table = FeatureTable::default();
        assert_eq!(enrich(&table), table);
    }
}
