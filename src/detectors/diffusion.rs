//! DIRE 扩散残差：拉普拉斯残差的方差过小 (太干净) 或过大 (太杂乱)，都不像传感器 + 场景的自然噪声。

use crate::detectors::variance;
use crate::error::{ensure_finite, Result};
use crate::evidence::{DetectorResult, Payload};
use crate::sample::SourceImage;

const SIZE: u32 = 64;

pub fn analyze(image: &SourceImage) -> Result<DetectorResult> {
    let g = image.resample(SIZE, SIZE)?.luma_plane();

    let mut residues = Vec::with_capacity(g.width * g.height);
    for y in 1..g.height.saturating_sub(1) {
        for x in 1..g.width.saturating_sub(1) {
            let neighbours = g.at(x - 1, y) + g.at(x + 1, y) + g.at(x, y - 1) + g.at(x, y + 1);
            residues.push(4.0 * g.at(x, y) - neighbours);
        }
    }

    let residue_variance = ensure_finite("diffusion", "residue variance", variance(&residues))?;

    let (score, markers) = if residue_variance < 15.0 {
        (85.0, vec![format!("Diffusion residue too clean (variance {residue_variance:.1})")])
    } else if residue_variance > 250.0 {
        (85.0, vec![format!("Diffusion residue erratic (variance {residue_variance:.1})")])
    } else if residue_variance < 40.0 {
        (40.0, vec![format!("Low residue variance ({residue_variance:.1})")])
    } else {
        (0.0, Vec::new())
    };

    Ok(DetectorResult::new(score, markers, "Natural reconstruction residue")
        .with_payload(Payload::Diffusion { residue_variance }))
}
