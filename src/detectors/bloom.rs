//! 神经"光晕" (Neural Bloom)：相邻 patch 的亮度方差突然跳变，像激活函数而不像随机纹理。

use crate::detectors::variance;
use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 64;
const PATCH: usize = 8;
const JUMP_HIGH: f64 = 15.0;
const JUMP_LOW: f64 = 0.05;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let plane = image.resample(SIZE, SIZE)?.luma_plane();

    let mut variances = Vec::new();
    let mut patch = Vec::with_capacity(PATCH * PATCH);
    for py in (0..plane.height).step_by(PATCH) {
        for px in (0..plane.width).step_by(PATCH) {
            patch.clear();
            for y in py..(py + PATCH).min(plane.height) {
                for x in px..(px + PATCH).min(plane.width) {
                    patch.push(plane.at(x, y));
                }
            }
            variances.push(variance(&patch));
        }
    }

    let clusters = variances
        .windows(2)
        .filter(|w| is_jump(w[0], w[1]))
        .count();

    let patches = variances.len();
    let bloom_ratio = ensure_finite("bloom", "bloom ratio", clusters as f64 / patches.max(1) as f64)?;
    let score = (bloom_ratio * 400.0).min(100.0);

    let mut markers = Vec::new();
    if clusters > 0 {
        markers.push(format!("Discretized activation clusters: {clusters}/{patches} patches"));
    }

    Ok(DetectorResult::new(score, markers, "Stochastic texture transitions")
        .with_payload(Payload::Bloom { clusters, patches, bloom_ratio }))
}

/// 相邻 patch 的方差比是否越界；两块都是纯色时不算跳变
fn is_jump(prev: f64, next: f64) -> bool {
    if prev <= f64::EPSILON && next <= f64::EPSILON {
        return false;
    }
    let ratio = next / prev.max(f64::EPSILON);
    ratio > JUMP_HIGH || ratio < JUMP_LOW
}
