//! Hessian 几何
//!
//! 真实边缘是各向异性的：Hessian 一个特征值占主导。生成图像的边缘常常"发糊"，
//! 两个特征值量级接近且曲率中等。

use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 64;
const GRADIENT_LIMIT: f64 = 30.0;
const RATIO_LIMIT: f64 = 1.6;
const CURVATURE_MIN: f64 = 8.0;
const CURVATURE_MAX: f64 = 25.0;

/// 2x2 对称矩阵的特征值，按绝对值从大到小返回
pub(crate) fn eigenvalues(dxx: f64, dyy: f64, dxy: f64) -> (f64, f64) {
    let half_trace = (dxx + dyy) / 2.0;
    let spread = (((dxx - dyy) / 2.0).powi(2) + dxy * dxy).sqrt();
    let (a, b) = (half_trace + spread, half_trace - spread);
    if a.abs() >= b.abs() {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let g = image.resample(SIZE, SIZE)?.luma_plane();

    let mut strong_edges = 0usize;
    let mut mushy_edges = 0usize;

    for y in 1..g.height.saturating_sub(1) {
        for x in 1..g.width.saturating_sub(1) {
            let gx = g.at(x + 1, y) - g.at(x - 1, y);
            let gy = g.at(x, y + 1) - g.at(x, y - 1);
            if gx.hypot(gy) <= GRADIENT_LIMIT {
                continue;
            }
            strong_edges += 1;

            let center = g.at(x, y);
            let dxx = g.at(x + 1, y) - 2.0 * center + g.at(x - 1, y);
            let dyy = g.at(x, y + 1) - 2.0 * center + g.at(x, y - 1);
            let dxy = (g.at(x + 1, y + 1) - g.at(x + 1, y - 1) - g.at(x - 1, y + 1) + g.at(x - 1, y - 1)) / 4.0;

            let (l1, l2) = eigenvalues(dxx, dyy, dxy);
            let ratio = l1.abs() / (l2.abs() + 0.1);
            if ratio < RATIO_LIMIT && l1.abs() > CURVATURE_MIN && l1.abs() < CURVATURE_MAX {
                mushy_edges += 1;
            }
        }
    }

    let mushy_ratio = ensure_finite("hessian", "mushy ratio", mushy_edges as f64 / (strong_edges as f64 + 1.0))?;
    let score = (mushy_ratio * 250.0).min(100.0);

    let mut markers = Vec::new();
    if mushy_edges > 0 {
        markers.push(format!("Isotropic 'mushy' edges: {mushy_edges}/{strong_edges} strong edges"));
    }

    Ok(DetectorResult::new(score, markers, "Anisotropic edge geometry")
        .with_payload(Payload::Hessian { strong_edges, mushy_edges, mushy_ratio }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_images::{checkerboard, solid};

    #[test]
    fn eigenvalues_of_diagonal_matrix() {
        assert_eq!(eigenvalues(10.0, 2.0, 0.0), (10.0, 2.0));
        assert_eq!(eigenvalues(-1.0, -9.0, 0.0), (-9.0, -1.0));
    }

    #[test]
    fn flat_image_has_no_strong_edges() {
        let result = analyze(&solid(64, 64, [255, 255, 255])).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.payload, Payload::Hessian { strong_edges: 0, mushy_edges: 0, mushy_ratio: 0.0 });
    }

    #[test]
    fn hard_step_edges_are_not_mushy() {
        // 锐利阶跃边缘的曲率远超 25，不计入
        let result = analyze(&checkerboard(64, 64, 16)).unwrap();
        assert!(result.score < 20, "{:?}", result.payload);
    }
}
