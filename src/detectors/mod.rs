//! 十个相互独立的检测器
//!
//! 九个像素检测器都是 `(&SourceImage) -> Result<DetectorResult>` 的纯函数，各自决定采样尺寸；
//! 元数据检测器是异步的，由扫描器单独调度。

pub mod bloom;
pub mod compression;
pub mod diffusion;
pub mod hessian;
pub mod metadata;
pub mod noise;
pub mod physics;
pub mod prnu;
pub mod spectral;
pub mod watermark;

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use crate::error::{ForensicsError, Result};
use crate::evidence::{DetectorKind, DetectorResult};
use crate::sample::SourceImage;

/// 像素检测器的调用上下文
#[derive(Debug, Clone, Copy)]
pub struct PixelContext<'a> {
    pub image: &'a SourceImage,
    // 图片来源标识 (文件名 / URL)，水印检测会在里面找 C2PA 引用
    pub source_hint: &'a str,
}

/// 安全调用：检测器返回 `Err` 或者 panic，都降级为 0 分 + `Forensic Fault: <name>`。
pub fn safe_invoke<F>(kind: DetectorKind, detector: F) -> DetectorResult
where
    F: FnOnce() -> Result<DetectorResult>,
{
    match catch_unwind(AssertUnwindSafe(detector)) {
        Ok(Ok(result)) => {
            debug!(detector = %kind, score = result.score, "detector finished");
            result
        }
        Ok(Err(e)) => {
            warn!(detector = %kind, error = %e, detector_fault = e.is_detector_fault(), "detector failed");
            DetectorResult::fault(kind)
        }
        Err(_) => {
            warn!(detector = %kind, "detector panicked");
            DetectorResult::fault(kind)
        }
    }
}

/// 按枚举分派到具体的像素检测器
pub fn run_pixel(kind: DetectorKind, ctx: PixelContext<'_>) -> Result<DetectorResult> {
    match kind {
        DetectorKind::Spectral => spectral::analyze(ctx.image),
        DetectorKind::Noise => noise::analyze(ctx.image),
        DetectorKind::Prnu => prnu::analyze(ctx.image),
        DetectorKind::Hessian => hessian::analyze(ctx.image),
        DetectorKind::Physics => physics::analyze(ctx.image),
        DetectorKind::Bloom => bloom::analyze(ctx.image),
        DetectorKind::Diffusion => diffusion::analyze(ctx.image),
        DetectorKind::Compression => compression::analyze(ctx.image),
        DetectorKind::Watermark => watermark::analyze(ctx.image, ctx.source_hint),
        // 元数据是异步的，由扫描器单独调度
        DetectorKind::Metadata => Err(ForensicsError::NotPixelDetector(kind)),
    }
}

/// 方差 (总体)，空切片返回 0
pub(crate) fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n
}
