//! 数据存储模块
//!
//! 特征表以带表头的 CSV 保存，指标以 JSON 保存。

use crate::types::{ETLResult, FeatureRow, FeatureTable};
use serde::Serialize;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const DATASET_FILE: &str = "youtube_dataset.csv";
pub const METRICS_FILE: &str = "metrics.json";
pub const ADVANCED_METRICS_FILE: &str = "metrics_advanced.json";
pub const MODEL_FILE: &str = "rf_classifier.bin";

/// 输出目录下的文件存储
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// 确保目录存在
    pub fn new(root: impl Into<PathBuf>) -> ETLResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    pub fn save_table(&self, file_name: &str, table: &FeatureTable) -> ETLResult<PathBuf> {
        let path = self.path(file_name);
        write_table(fs::File::create(&path)?, table)?;
        tracing::info!("Saved {} rows to {}", table.len(), path.display());
        Ok(path)
    }

    pub fn load_table(&self, file_name: &str) -> ETLResult<FeatureTable> {
        let path = self.path(file_name);
        let table = read_table(fs::File::open(&path)?)?;
        tracing::info!("Loaded {} rows from {}", table.len(), path.display());
        Ok(table)
    }

    /// 以缩进 JSON 保存任意可序列化对象（指标等）
    pub fn save_json<T: Serialize>(&self, file_name: &str, value: &T) -> ETLResult<PathBuf> {
        let path = self.path(file_name);
        let mut file = fs::File::create(&path)?;
        serde_json::to_writer_pretty(&mut file, value)?;
        file.write_all(b"\n")?;
        Ok(path)
    }
}

/// 写出全部列，缺失的增强值为空单元格
pub fn write_table<W: Write>(writer: W, table: &FeatureTable) -> ETLResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in &table.rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// 按表头读取；没有增强列的旧文件也可以读入
pub fn read_table<R: Read>(reader: R) -> ETLResult<FeatureTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let rows = csv_reader
        .deserialize::<FeatureRow>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureTable::new(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::enrich;
    use crate::features::FeatureDeriver;
    use crate::types::{ContentDetails, Snippet, Statistics, VideoRecord};

    fn sample_table() -> FeatureTable {
        let records: Vec<VideoRecord> = [
            ("a1", "How to fix a bike, part 1", "2024-05-01T18:03:07Z", "PT59S", Some("1234")),
            ("b2", "Rust vs Go", "2024-05-02T09:15:00.250Z", "PT12M30S", Some("98765")),
            ("c3", "Quoted \"title\"", "2024-05-03T21:00:00Z", "PT1H", None),
        ]
        .into_iter()
        .map(|(id, title, published_at, duration, views)| VideoRecord {
            id: id.to_string(),
            snippet: Snippet {
                title: title.to_string(),
                published_at: published_at.to_string(),
            },
            content_details: ContentDetails {
                duration: duration.to_string(),
            },
            statistics: Statistics {
                view_count: views.map(String::from),
                like_count: Some("17".to_string()),
                comment_count: Some("3".to_string()),
            },
        })
        .collect();

        FeatureDeriver::to_table(&records).unwrap()
    }

    #[test]
    fn test_round_trip_then_enrich() {
        let table = sample_table();
        let mut buffer = Vec::new();
        write_table(&mut buffer, &table).unwrap();

        let reloaded = read_table(buffer.as_slice()).unwrap();
        assert_eq!(reloaded, table);
        assert_eq!(enrich(&reloaded), enrich(&table));
    }

    #[test]
    fn test_enriched_round_trip_is_noop() {
        let enriched = enrich(&sample_table());
        let mut buffer = Vec::new();
        write_table(&mut buffer, &enriched).unwrap();

        let reloaded = read_table(buffer.as_slice()).unwrap();
        assert_eq!(enrich(&reloaded), enriched);
    }

    #[test]
    fn test_header_and_timestamp_format() {
        let mut buffer = Vec::new();
        write_table(&mut buffer, &sample_table()).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();

        assert_eq!(
            lines.next().unwrap(),
            "video_id,title,title_len,published_at,publish_hour,publish_dow,duration_seconds,\
             views,likes,comments,likes_per_1k_views,log_views,peak_hour,is_short,duration_bin,\
             has_howto,has_vs"
        );
        assert!(lines.next().unwrap().contains("2024-05-01 18:03:07,"));
        assert!(lines.next().unwrap().contains("2024-05-02 09:15:00.250,"));
    }

    #[test]
    fn test_reads_table_without_enrichment_columns() {
        let csv = "video_id,title,title_len,published_at,publish_hour,publish_dow,duration_seconds,\
                   views,likes,comments,likes_per_1k_views,log_views,peak_hour\n\
                   x1,Some title,10,2024-01-01T20:00:00,20,0,42.0,10,1,0,100.0,2.3978952727983707,1\n";
        let table = read_table(csv.as_bytes()).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].is_short, None);
        assert_eq!(enrich(&table).rows[0].is_short, Some(1));
    }

    #[test]
    fn test_storage_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(dir.path().join("out")).unwrap();

        let table = sample_table();
        storage.save_table(DATASET_FILE, &table).unwrap();
        assert_eq!(storage.load_table(DATASET_FILE).unwrap(), table);

        let metrics = std::collections::BTreeMap::from([("cv_r2_regression", 0.1234)]);
        let path = storage.save_json(METRICS_FILE, &metrics).unwrap();
        let text = fs::read_to_string(path).unwrap();
        assert!(text.contains("\"cv_r2_regression\": 0.1234"));
    }
}
