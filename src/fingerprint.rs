use image::{imageops, DynamicImage};
use img_hash::{HashAlg, HasherConfig}; // pHash 配置器和算法枚举
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::sample::SourceImage;

// pHash 只需要 9x8 的梯度，先缩到这个边长以内再交给 img_hash
const THUMB_EDGE: u32 = 256;

/// 被扫描文件的双重指纹
///
/// - `sha256`: 原始字节的密码学哈希，改一个字节就雪崩，用来证明"没被调包"。
/// - `phash`: 视觉感知哈希，压缩/缩放后仍然相近，用来关联同一内容的不同副本。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFingerprint {
    pub sha256: String,
    // 没有像素可用时为 None
    pub phash: Option<String>,
}

/// 字节算 SHA-256，已解码的像素算 pHash，不再重复解码
pub fn generate_fingerprints(bytes: &[u8], image: &SourceImage) -> FileFingerprint {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let sha256 = hex::encode(hasher.finalize());

    let phash = (!image.is_empty()).then(|| {
        let (w, h) = thumb_size(image.width(), image.height());
        let thumb = DynamicImage::ImageRgba8(imageops::thumbnail(image.as_rgba(), w, h));
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient) // 梯度算法，对明暗变化比均值算法更鲁棒
            .hash_size(8, 8) // 8x8 = 64 位
            .to_hasher();
        hasher.hash_image(&thumb).to_base64()
    });

    FileFingerprint { sha256, phash }
}

fn thumb_size(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= THUMB_EDGE {
        return (width, height);
    }
    let scale = THUMB_EDGE as f64 / longest as f64;
    (
        ((width as f64 * scale).round() as u32).max(1),
        ((height as f64 * scale).round() as u32).max(1),
    )
}
