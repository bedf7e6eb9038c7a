//! 原镜取证引擎 (Yuanjing Forensics)
//!
//! 输入一张解码后的图片和原始文件字节，跑十个相互独立的统计检测器，
//! 再把结果聚合成"生成概率 / 处理强度"两项分数和最终判决。
//!
//! ```no_run
//! # async fn demo() -> yuanjing_forensics::Result<()> {
//! use yuanjing_forensics::{FileHandle, ForensicScanner};
//!
//! let file = FileHandle::from_path(std::path::Path::new("photo.jpg"))?;
//! let outcome = ForensicScanner::default().scan_file(&file).await?;
//! println!("{:?} ai={} edit={}", outcome.report.verdict, outcome.report.ai_score, outcome.report.edit_score);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod detectors;
pub mod error;
pub mod evidence;
pub mod fingerprint;
pub mod sample;
pub mod scanner;
pub mod tags;
pub mod verdict;

pub use config::{Config, ScanConfig};
pub use error::{ForensicsError, Result};
pub use evidence::{DetectorKind, DetectorResult, FileInfo, Payload, ResultsMap};
pub use sample::{FileHandle, PixelSample, SourceImage};
pub use scanner::{ForensicScanner, ScanOutcome};
pub use tags::{ContainerTagReader, TagMap, TagReader};
pub use verdict::{aggregate, HeatmapHint, Verdict, VerdictReport};
