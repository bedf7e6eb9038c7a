//! 水印 / 身份识别
//!
//! 四个子检查取最大分，命中的标记全部保留：
//! 1. Gemini 角标 (右下角孤立的高对比星形图标)
//! 2. 来源地址里的 C2PA 内容凭证引用
//! 3. 可见角落水印 (DALL-E 彩条，或高饱和 + 几何纯色的组合)
//! 4. 频域/隐写图案 (SynthID 类 LSB 奇偶一致性)

use std::collections::BTreeSet;

use crate::error::Result;
use crate::evidence::{DetectorResult, Payload};
use crate::sample::{PixelSample, SourceImage};

const SPARKLE_BOX: u32 = 60;
const CORNER_SAMPLE: u32 = 64;
const FREQUENCY_SIZE: u32 = 32;

#[derive(Debug, Default)]
struct SubScores {
    sparkle: u8,
    credential: u8,
    corner: u8,
    frequency: u8,
    markers: Vec<String>,
}

pub fn analyze(image: &SourceImage, source_hint: &str) -> Result<DetectorResult> {
    let mut sub = SubScores::default();

    sparkle_check(image, &mut sub)?;
    credential_check(source_hint, &mut sub);
    corner_check(image, &mut sub)?;
    frequency_check(image, &mut sub)?;

    let score = sub.sparkle.max(sub.credential).max(sub.corner).max(sub.frequency);
    let payload = Payload::Watermark {
        sparkle: sub.sparkle,
        credential: sub.credential,
        corner: sub.corner,
        frequency: sub.frequency,
    };
    Ok(DetectorResult::new(score as f64, sub.markers, "No identity markers").with_payload(payload))
}

fn sparkle_check(image: &SourceImage, sub: &mut SubScores) -> Result<()> {
    let x = image.width().saturating_sub(SPARKLE_BOX);
    let y = image.height().saturating_sub(SPARKLE_BOX);
    let region = image.crop(x, y, SPARKLE_BOX, SPARKLE_BOX)?;

    let (mut bright, mut dark) = (0usize, 0usize);
    for_each_rgb(&region, |r, g, b| {
        if r > 240 && g > 240 && b > 240 {
            bright += 1;
        } else if r < 100 && g < 100 && b < 100 {
            dark += 1;
        }
    });

    if bright > 30 && bright < 600 && dark > 10 {
        sub.sparkle = 100;
        sub.markers.push(format!("Gemini sparkle signature ({bright} bright / {dark} dark px)"));
    }
    Ok(())
}

fn credential_check(source_hint: &str, sub: &mut SubScores) {
    let hint = source_hint.to_lowercase();
    if ["c2pa", "contentcredentials", "content-credentials"].iter().any(|k| hint.contains(k)) {
        sub.credential = 100;
        sub.markers.push("C2PA content credential reference in source".to_string());
    }
}

fn corner_check(image: &SourceImage, sub: &mut SubScores) -> Result<()> {
    let (w, h) = (image.width(), image.height());

    // DALL-E 彩条：右下角 10% 区域采样成 50x10
    let bar_x = w * 9 / 10;
    let bar_y = h * 9 / 10;
    let bar = image.crop_resample(bar_x, bar_y, w - bar_x, h - bar_y, 50, 10)?;
    let mut buckets = BTreeSet::new();
    for_each_rgb(&bar, |r, g, b| {
        if saturation(r, g, b) > 100 {
            buckets.insert((r / 64, g / 64, b / 64));
        }
    });
    if buckets.len() >= 6 {
        sub.corner = 100;
        sub.markers.push(format!("DALL-E style colour bar ({} hues)", buckets.len()));
        return Ok(());
    }

    // 两个下角：高饱和像素和几何纯色像素同时大量出现
    let corner_w = (w * 15 / 100).max(1);
    let corner_h = (h * 15 / 100).max(1);
    let corners = [("bottom-left", 0, h - corner_h), ("bottom-right", w - corner_w, h - corner_h)];
    let total = (CORNER_SAMPLE * CORNER_SAMPLE) as f64;

    for (label, x, y) in corners {
        let region = image.crop_resample(x, y, corner_w, corner_h, CORNER_SAMPLE, CORNER_SAMPLE)?;
        let (mut saturated, mut pure) = (0usize, 0usize);
        for_each_rgb(&region, |r, g, b| {
            if saturation(r, g, b) > 100 {
                saturated += 1;
            }
            if is_geometric_pure(r, g, b) {
                pure += 1;
            }
        });
        if saturated > 400 && pure > 200 {
            let score = ((saturated + pure) as f64 / total * 150.0).round().min(100.0) as u8;
            if score > sub.corner {
                sub.corner = score;
            }
            sub.markers.push(format!("Visible corner watermark ({label}: {saturated} saturated, {pure} pure px)"));
        }
    }
    Ok(())
}

fn frequency_check(image: &SourceImage, sub: &mut SubScores) -> Result<()> {
    let sample = image.resample(FREQUENCY_SIZE, FREQUENCY_SIZE)?;
    let (mut qualifying, mut matching) = (0usize, 0usize);

    for y in 0..sample.height() {
        for x in 1..sample.width() {
            let a = sample.rgba(x - 1, y);
            let b = sample.rgba(x, y);
            let diff: u32 = (0..3).map(|c| a[c].abs_diff(b[c]) as u32).sum();
            if diff <= 5 {
                continue;
            }
            qualifying += 1;
            let parity = b[0] & 1;
            if b[1] & 1 == parity && b[2] & 1 == parity {
                matching += 1;
            }
        }
    }

    if qualifying >= 100 && matching as f64 / qualifying as f64 > 0.85 {
        sub.frequency = 85;
        sub.markers.push(format!("Frequency watermark pattern (SynthID-like, {matching}/{qualifying} LSB matches)"));
    }
    Ok(())
}

fn for_each_rgb(sample: &PixelSample, mut f: impl FnMut(u8, u8, u8)) {
    for px in sample.as_raw().chunks_exact(4) {
        f(px[0], px[1], px[2]);
    }
}

fn saturation(r: u8, g: u8, b: u8) -> u8 {
    r.max(g).max(b) - r.min(g).min(b)
}

/// 近乎纯色 (单通道饱满) 或近乎无彩 (极亮/极暗的灰)
fn is_geometric_pure(r: u8, g: u8, b: u8) -> bool {
    let channels = [r, g, b];
    let strong = channels.iter().filter(|c| **c > 200).count();
    let weak = channels.iter().filter(|c| **c < 60).count();
    let pure_tone = strong == 1 && weak == 2;
    let achromatic = saturation(r, g, b) < 12 && (r > 235 || r < 20);
    pure_tone || achromatic
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_images::solid;
    use image::{Rgba, RgbaImage};

    #[test]
    fn neutral_image_has_no_markers() {
        let img = RgbaImage::from_fn(120, 90, |x, y| Rgba([x as u8, y as u8, 128, 255]));
        let result = analyze(&SourceImage::from_rgba(img), "holiday.jpg").unwrap();
        assert_eq!(result.score, 0);
        assert_eq!(result.markers, vec!["No identity markers".to_string()]);
    }

    #[test]
    fn sparkle_icon_in_corner() {
        let img = RgbaImage::from_fn(200, 200, |x, y| {
            if (175..185).contains(&x) && (175..185).contains(&y) {
                Rgba([255, 255, 255, 255])
            } else {
                Rgba([50, 50, 50, 255])
            }
        });
        let result = analyze(&SourceImage::from_rgba(img), "photo.png").unwrap();
        assert_eq!(result.score, 100);
        assert!(result.markers.iter().any(|m| m.starts_with("Gemini sparkle")));
    }

    #[test]
    fn credential_reference_in_source_hint() {
        let result = analyze(&solid(80, 80, [90, 90, 90]), "https://cdn.example.com/c2pa/asset.jpg").unwrap();
        assert_eq!(result.score, 100);
        assert!(result.markers.iter().any(|m| m.contains("C2PA")));
    }

    #[test]
    fn dalle_colour_bar() {
        let palette = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0], [0, 255, 255], [255, 0, 255]];
        let img = RgbaImage::from_fn(500, 100, |x, y| {
            if x >= 450 && y >= 90 {
                let c = palette[(((x - 450) / 9) as usize).min(5)];
                Rgba([c[0], c[1], c[2], 255])
            } else {
                Rgba([128, 128, 128, 255])
            }
        });
        let result = analyze(&SourceImage::from_rgba(img), "image.png").unwrap();
        assert_eq!(result.score, 100);
        assert!(result.markers.iter().any(|m| m.starts_with("DALL-E")));
    }

    #[test]
    fn lsb_parity_pattern() {
        let img = RgbaImage::from_fn(32, 32, |x, y| {
            let v = (100 + (x * 6 + y * 2) % 100) as u8 & !1;
            Rgba([v, v, v, 255])
        });
        let result = analyze(&SourceImage::from_rgba(img), "image.png").unwrap();
        assert_eq!(result.score, 85);
        assert!(result.markers.iter().any(|m| m.starts_with("Frequency watermark")));
    }
}
