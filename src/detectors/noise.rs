//! 噪声分布：过于平滑像是合成去噪，过于粗糙像是后加的颗粒。

use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 200;
const SMOOTH_DELTA: u32 = 5;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let sample = image.resample(SIZE, SIZE)?;
    let (w, h) = (sample.width(), sample.height());

    let mut smooth = 0usize;
    let mut pairs = 0usize;
    let mut noise_sum = 0u64;

    for y in 0..h {
        for x in 1..w {
            let a = sample.rgba(x - 1, y);
            let b = sample.rgba(x, y);
            let delta: u32 = (0..3).map(|c| a[c].abs_diff(b[c]) as u32).sum();
            pairs += 1;
            if delta < SMOOTH_DELTA {
                smooth += 1;
            } else {
                noise_sum += delta as u64;
            }
        }
    }

    let smooth_ratio = ensure_finite("noise", "smooth ratio", smooth as f64 / pairs.max(1) as f64)?;
    let noisy = pairs - smooth;
    let mean_noise = if noisy == 0 { 0.0 } else { noise_sum as f64 / noisy as f64 };

    let mut markers = Vec::new();
    let score = if smooth_ratio > 0.7 {
        markers.push(format!("Over-smoothed surface ({:.0}% flat transitions)", smooth_ratio * 100.0));
        (smooth_ratio - 0.7) * 300.0
    } else if smooth_ratio < 0.2 {
        markers.push(format!("Artificial grain ({:.0}% flat transitions)", smooth_ratio * 100.0));
        (0.2 - smooth_ratio) * 200.0
    } else {
        0.0
    };

    Ok(DetectorResult::new(score, markers, "Organic noise distribution")
        .with_payload(Payload::Noise { smooth_ratio, mean_noise }))
}
