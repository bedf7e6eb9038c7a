//! 压缩画像：8 像素网格上的块效应是 JPEG 重编码的证据；孤立的高差尖峰则像生成图的"光晕"。

use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 128;
const BLOCK: usize = 8;
const BLOCK_DELTA: f64 = 15.0;
const SPIKE_DELTA: f64 = 50.0;
const SETTLE_DELTA: f64 = 5.0;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let g = image.resample(SIZE, SIZE)?.luma_plane();

    let mut block_artifacts = 0usize;
    for y in (BLOCK..g.height).step_by(BLOCK) {
        for x in 0..g.width {
            if (g.at(x, y) - g.at(x, y - 1)).abs() > BLOCK_DELTA {
                block_artifacts += 1;
            }
        }
    }

    let mut haloing = 0usize;
    for y in 0..g.height {
        for x in 1..g.width.saturating_sub(1) {
            let jump = (g.at(x, y) - g.at(x - 1, y)).abs();
            let settle = (g.at(x + 1, y) - g.at(x, y)).abs();
            if jump > SPIKE_DELTA && settle < SETTLE_DELTA {
                haloing += 1;
            }
        }
    }

    let ratio = ensure_finite("compression", "halo ratio", haloing as f64 / (block_artifacts as f64 + 1.0))?;
    let score = (ratio * 50.0).min(100.0);

    let mut markers = Vec::new();
    if block_artifacts > 0 {
        markers.push(format!("JPEG block grid: {block_artifacts} aligned jumps"));
    }
    if haloing > 0 {
        markers.push(format!("AI haloing: {haloing} isolated spikes"));
    }

    Ok(DetectorResult::new(score, markers, "Clean compression profile")
        .with_payload(Payload::Compression { block_artifacts, haloing, ratio }))
}
