//! 频谱滚降 (Spectral Roll-off)
//!
//! 自然图像的功率谱随频率近似 1/f 衰减；很多生成模型在高频段留下过量能量 (平台)，
//! 上采样层还会留下周期性的棋盘格跳变。

use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 256;
const ROW_STRIDE: usize = 4;
const BAND: f64 = 0.3;
const DISCONTINUITY_DELTA: f64 = 60.0;
const ROLL_OFF_LIMIT: f64 = 0.65;
const DENSITY_LIMIT: f64 = 0.005;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let plane = image.resample(SIZE, SIZE)?.luma_plane();
    let width = plane.width;
    let low_end = (width as f64 * BAND) as usize;
    let high_start = width - low_end;

    let mut low_freq = 0.0;
    let mut high_freq = 0.0;
    let mut discontinuities = 0usize;
    let mut rows = 0usize;

    for y in (0..plane.height).step_by(ROW_STRIDE) {
        rows += 1;
        for x in 1..width {
            let diff = (plane.at(x, y) - plane.at(x - 1, y)).abs();
            if x < low_end {
                low_freq += diff;
            } else if x >= high_start {
                high_freq += diff;
                if diff > DISCONTINUITY_DELTA {
                    discontinuities += 1;
                }
            }
        }
    }

    let roll_off = ensure_finite("spectral", "roll-off ratio", high_freq / (low_freq + 1.0))?;
    let density = discontinuities as f64 / (rows * width).max(1) as f64;

    let mut score = 0.0;
    let mut markers = Vec::new();
    if roll_off > ROLL_OFF_LIMIT {
        score += (roll_off - ROLL_OFF_LIMIT) * 500.0;
        markers.push(format!("Spectral plateau: high-frequency roll-off {roll_off:.2}"));
    }
    if density > DENSITY_LIMIT {
        score += density * 10_000.0;
        markers.push(format!("Periodic upsampling discontinuities ({:.2}%)", density * 100.0));
    }

    Ok(DetectorResult::new(score, markers, "Natural roll-off")
        .with_payload(Payload::Spectral { roll_off, discontinuity_density: density }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_images::{checkerboard, solid};

    #[test]
    fn flat_image_has_natural_roll_off() {
        let result = analyze(&solid(64, 64, [255, 255, 255])).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.markers, vec!["Natural roll-off".to_string()]);
    }

    #[test]
    fn fine_checkerboard_reads_as_plateau() {
        // 1px 棋盘格缩放后仍保持大量高频跳变
        let result = analyze(&checkerboard(256, 256, 1)).unwrap();
        match result.payload {
            Payload::Spectral { roll_off, .. } => assert!(roll_off > 0.65),
            ref other => panic!("unexpected payload {other:?}"),
        }
        assert!(result.score > 0);
    }

    #[test]
    fn deterministic_output() {
        let img = checkerboard(300, 200, 3);
        assert_eq!(analyze(&img).unwrap(), analyze(&img).unwrap());
    }
}
