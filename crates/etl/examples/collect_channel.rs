//! 基础 ETL 示例
//!
//! 收集一个频道的视频并打印特征表摘要。需要设置 `YOUTUBE_API_KEY`。
//!
//! ```text
//! cargo run -p etl --example collect_channel -- @MrBeast
//! ```

use etl::{enrich, ETLConfig, ETLPipeline};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let handle = std::env::args().nth(1).unwrap_or_else(|| "@MrBeast".to_string());

    let config = ETLConfig {
        videos_per_channel: 50,
        ..ETLConfig::from_env()
    };
    let pipeline = ETLPipeline::new(config)?;

    let table = enrich(&pipeline.run(&[handle.clone()]).await?);
    println!("{}: {} videos\n", handle, table.len());

    for row in table.rows.iter().take(5) {
        println!(
            "  {} | {:>10} views | {:>6.0}s | short={} howto={} vs={}",
            row.published_at.format("%Y-%m-%d %H:%M"),
            row.views,
            row.duration_seconds,
            row.is_short.unwrap_or(0),
            row.has_howto.unwrap_or(0),
            row.has_vs.unwrap_or(0),
        );
    }

    let peak = table.rows.iter().filter(|r| r.peak_hour == 1).count();
    println!("\n  published in peak hours: {}/{}", peak, table.len());

    Ok(())
}
