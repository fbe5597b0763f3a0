//! # popularity: 频道视频热度数据收集与模型评估
//!
//! - `collect`: 调用 Catalog API 生成特征表
//! - `evaluate`: 基础模型交叉验证
//! - `advanced`: 增强特征 + 树模型交叉验证，并保存随机森林分类模型
//! - `run`: 依次执行以上三步

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use etl::storage::{ADVANCED_METRICS_FILE, DATASET_FILE, METRICS_FILE, MODEL_FILE};
use etl::{ETLPipelineBuilder, FeatureTable, Storage};
use ml::{EvaluatorConfig, ModelEvaluator};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 收集指定频道的视频元数据，生成特征表
    Collect(CollectArgs),
    /// 在已保存的特征表上交叉验证线性回归 / 逻辑回归基线
    Evaluate(EvaluateArgs),
    /// 增强特征表，交叉验证树模型并保存分类模型
    Advanced(EvaluateArgs),
    /// 依次执行收集、基础评估和进阶评估
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct CollectArgs {
    /// Catalog API 密钥
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// 覆盖 Catalog API 的基础 URL
    #[arg(long, env = "YOUTUBE_API_BASE")]
    api_base: Option<String>,
    /// 频道 handle，可带或不带开头的 '@'
    #[arg(long = "handle", default_value = "@MrBeast")]
    handles: Vec<String>,
    /// 每个频道最多收集的视频数
    #[arg(long, default_value_t = 250)]
    per_channel: usize,
    /// 特征表输出目录
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Args, Debug)]
struct EvaluateArgs {
    /// 特征表所在目录
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
    /// 指标和模型文件的输出目录
    #[arg(long, default_value = "figs")]
    figs_dir: PathBuf,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    collect: CollectArgs,
    /// 指标和模型文件的输出目录
    #[arg(long, default_value = "figs")]
    figs_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Collect(args) => {
            collect(&args).await?;
        }
        Commands::Evaluate(args) => {
            let table = Storage::new(&args.data_dir)?.load_table(DATASET_FILE)?;
            evaluate(&table, &Storage::new(&args.figs_dir)?)?;
        }
        Commands::Advanced(args) => {
            let table = Storage::new(&args.data_dir)?.load_table(DATASET_FILE)?;
            advanced(&table, &Storage::new(&args.figs_dir)?)?;
        }
        Commands::Run(args) => {
            let table = collect(&args.collect).await?;
            let figs = Storage::new(&args.figs_dir)?;
            evaluate(&table, &figs)?;
            advanced(&table, &figs)?;
            info!(
                "Done. Outputs in {} and {}",
                args.collect.data_dir.display(),
                figs.root().display()
            );
        }
    }

    Ok(())
}

async fn collect(args: &CollectArgs) -> Result<FeatureTable> {
    let mut builder = ETLPipelineBuilder::new().with_videos_per_channel(args.per_channel);
    if let Some(key) = &args.api_key {
        builder = builder.with_api_key(key);
    }
    if let Some(base) = &args.api_base {
        builder = builder.with_base_url(base);
    }
    // 缺少凭证时在这里失败，不会发出任何请求
    let pipeline = builder.build()?;

    let table = pipeline.run(&args.handles).await?;
    if table.is_empty() {
        warn!("No videos collected");
    }
    Storage::new(&args.data_dir)?.save_table(DATASET_FILE, &table)?;
    Ok(table)
}

fn evaluate(table: &FeatureTable, figs: &Storage) -> Result<()> {
    let metrics = ModelEvaluator::new(EvaluatorConfig::default()).evaluate(table)?;
    let path = figs.save_json(METRICS_FILE, &metrics)?;
    info!("Saved metrics to {}", path.display());
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

fn advanced(table: &FeatureTable, figs: &Storage) -> Result<()> {
    let evaluation = ModelEvaluator::new(EvaluatorConfig::default()).evaluate_advanced(table)?;
    let path = figs.save_json(ADVANCED_METRICS_FILE, &evaluation.metrics)?;
    info!("Saved advanced metrics to {}", path.display());
    evaluation.artifact.save(figs.path(MODEL_FILE))?;
    println!("{}", serde_json::to_string_pretty(&evaluation.metrics)?);
    Ok(())
}
