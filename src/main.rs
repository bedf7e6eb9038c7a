use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use yuanjing_forensics::{Config, FileHandle, ForensicScanner, Verdict};

/// 对单张图片做 AI 生成 / 后期处理取证
#[derive(Debug, Parser)]
#[command(name = "yuanjing-forensics", version)]
struct Args {
    /// 待检测的图片
    image: PathBuf,

    /// 输出完整 JSON (逐项结果 + 判决)
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // ----------------------------------------------------------------
    // 0. 加载配置 & 日志
    // ----------------------------------------------------------------
    let config = Config::from_env()?;
    let env_filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // ----------------------------------------------------------------
    // 1. 读取文件并扫描
    // ----------------------------------------------------------------
    let file = FileHandle::from_path(&args.image)?;
    let scanner = ForensicScanner::new(config.scan_config());
    let outcome = scanner.scan_file(&file).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    // ----------------------------------------------------------------
    // 2. 人类可读输出
    // ----------------------------------------------------------------
    let report = &outcome.report;
    let badge = match report.verdict {
        Verdict::ProcessedAi => "🤖 PROCESSED / AI",
        Verdict::OriginalRaw => "📷 ORIGINAL / RAW",
    };
    println!("🛡️ {}  ->  {}", file.name, badge);
    println!("   生成概率: {}%   处理强度: {}%", report.ai_score, report.edit_score);
    println!("   {}", report.description);
    println!("   {}", report.summary);
    for item in &report.per_detector_display {
        println!("   - {:<28} {:>3}  {}", item.name, item.score, item.markers.join("; "));
    }
    for mitigation in &report.mitigations {
        println!("   ↓ {mitigation}");
    }

    Ok(())
}
