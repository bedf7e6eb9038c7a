//! 光照悖论：单一光源下局部明暗方向应当连贯，近乎相反的梯度方向频繁出现说明光照不自洽。

use std::f64::consts::PI;

use crate::error::Result;
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 64;
const MAGNITUDE_LIMIT: f64 = 60.0;
const LAG: usize = 10;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let plane = image.resample(SIZE, SIZE)?.luma_plane();

    let mut angles = Vec::new();
    for y in 1..plane.height.saturating_sub(1) {
        for x in 1..plane.width.saturating_sub(1) {
            let dx = plane.at(x + 1, y) - plane.at(x - 1, y);
            let dy = plane.at(x, y + 1) - plane.at(x, y - 1);
            if dx.hypot(dy) > MAGNITUDE_LIMIT {
                angles.push(dy.atan2(dx));
            }
        }
    }

    let paradoxes = angles
        .iter()
        .zip(angles.iter().skip(LAG))
        .filter(|(a, b)| {
            let diff = (*b - *a).abs();
            (0.7 * PI..=1.3 * PI).contains(&diff)
        })
        .count();

    let score = ((paradoxes as f64 / 20.0) * 100.0).min(100.0);
    let mut markers = Vec::new();
    if paradoxes > 0 {
        markers.push(format!("Lighting paradox: {paradoxes} contradictory shading vectors"));
    }

    Ok(DetectorResult::new(score, markers, "Consistent light direction")
        .with_payload(Payload::Physics { vectors: angles.len(), paradoxes }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_images::{checkerboard, solid};

    #[test]
    fn flat_image_has_no_vectors() {
        let result = analyze(&solid(64, 64, [10, 200, 30])).unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.markers, vec!["Consistent light direction".to_string()]);
    }

    #[test]
    fn alternating_edges_produce_paradoxes() {
        // 8px 棋盘格：相邻格边的梯度方向正好相反
        let result = analyze(&checkerboard(64, 64, 8)).unwrap();
        assert!(result.score > 0, "{:?}", result.payload);
    }
}
