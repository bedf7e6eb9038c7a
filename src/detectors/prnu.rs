//! PRNU 传感器指纹
//!
//! 物理传感器会在各通道留下相互对齐的噪声底；纯生成像素没有这层底噪。

use crate::error::Result;
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 100;
const STRIDE: usize = 2;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let sample = image.resample(SIZE, SIZE)?;
    let (w, h) = (sample.width(), sample.height());

    let mut organic = 0usize;
    let mut uniform = 0usize;
    let mut samples = 0usize;

    for y in (0..h).step_by(STRIDE) {
        for x in (0..w.saturating_sub(1)).step_by(STRIDE) {
            let a = sample.rgba(x, y);
            let b = sample.rgba(x + 1, y);
            let r_noise = a[0].abs_diff(b[0]) as i32;
            let g_noise = a[1].abs_diff(b[1]) as i32;

            samples += 1;
            if (r_noise - g_noise).abs() < 3 && r_noise > 2 {
                organic += 1;
            }
            if r_noise == 0 {
                uniform += 1;
            }
        }
    }

    // 1 像素宽的图没有可比较的像素对，全部视为均匀
    let (grain_ratio, uniform_ratio) = if samples == 0 {
        (0.0, 1.0)
    } else {
        (organic as f64 / samples as f64, uniform as f64 / samples as f64)
    };

    let (score, marker) = if grain_ratio < 0.15 || uniform_ratio > 0.4 {
        (90.0, format!("Sensor fingerprint absent (grain {:.0}%, uniform {:.0}%)", grain_ratio * 100.0, uniform_ratio * 100.0))
    } else if grain_ratio < 0.3 {
        (50.0, format!("Weak sensor grain ({:.0}%)", grain_ratio * 100.0))
    } else {
        (0.0, format!("Organic sensor noise (PRNU) detected ({:.0}%)", grain_ratio * 100.0))
    };

    Ok(DetectorResult::new(score, vec![marker], "")
        .with_payload(Payload::Prnu { grain_ratio, uniform_ratio }))
}
