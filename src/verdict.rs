//! 判决聚合
//!
//! `aggregate` 是 `ResultsMap -> VerdictReport` 的纯函数，没有跨扫描的状态：
//! 1. 两张权重表分别算出生成概率 (AI) 与处理强度 (Edit)；缺席的检测器不进入分母
//! 2. 身份未确认时，按"现实证据"下调 AI 分
//! 3. 水印/元数据的确定性证据 (>= 95) 直接把 AI 分拉满
//! 4. 判决表 + 摘要文本

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::detectors::metadata::{C2PA_EDIT_PREFIX, FILENAME_IDENTITY_PREFIX};
use crate::evidence::{DetectorKind, ResultsMap};

/// 生成概率权重
pub const AI_WEIGHTS: [(DetectorKind, f64); 9] = [
    (DetectorKind::Metadata, 4.0),
    (DetectorKind::Watermark, 4.0),
    (DetectorKind::Bloom, 3.5),
    (DetectorKind::Hessian, 3.0),
    (DetectorKind::Physics, 2.5),
    (DetectorKind::Prnu, 2.5),
    (DetectorKind::Diffusion, 2.5),
    (DetectorKind::Spectral, 1.5),
    (DetectorKind::Noise, 1.0),
];

/// 处理强度权重
pub const EDIT_WEIGHTS: [(DetectorKind, f64); 4] = [
    (DetectorKind::Compression, 3.0),
    (DetectorKind::Noise, 2.5),
    (DetectorKind::Spectral, 2.0),
    (DetectorKind::Prnu, 1.0),
];

const IDENTITY_WATERMARK: u8 = 90;
const OVERRIDE_THRESHOLD: u8 = 95;
const LOW_SIGNAL: u8 = 20;

static GENERATIVE_SOFTWARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bai\b|generat").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    ProcessedAi,
    OriginalRaw,
}

/// 逐项展示用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorDisplay {
    pub key: DetectorKind,
    pub name: String,
    pub score: u8,
    pub markers: Vec<String>,
}

/// 热力图叠加提示，只用于渲染
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapHint {
    pub intensity: f64,
    pub bloom_hotspot: bool,
}

impl HeatmapHint {
    pub fn from_results(results: &ResultsMap) -> Self {
        let spectral = results.score(DetectorKind::Spectral).unwrap_or(0) as f64;
        let hessian = results.score(DetectorKind::Hessian).unwrap_or(0) as f64;
        Self {
            intensity: (spectral + hessian) / 200.0,
            bloom_hotspot: results.score(DetectorKind::Bloom).is_some_and(|s| s > 50),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReport {
    pub ai_score: u8,
    pub edit_score: u8,
    pub verdict: Verdict,
    pub description: String,
    pub summary: String,
    pub per_detector_display: Vec<DetectorDisplay>,
    // 实际生效的下调项，例如 "PRNU organic noise (-25)"
    pub mitigations: Vec<String>,
    pub heatmap: HeatmapHint,
}

/// 加权平均，只统计在场的检测器；全部缺席时为 0
pub fn weighted_score(results: &ResultsMap, weights: &[(DetectorKind, f64)]) -> u8 {
    let (sum, total) = weights.iter().fold((0.0, 0.0), |(sum, total), (kind, weight)| {
        match results.score(*kind) {
            Some(score) => (sum + score as f64 / 100.0 * weight, total + weight),
            None => (sum, total),
        }
    });
    if total == 0.0 {
        return 0;
    }
    (sum / total * 100.0).round().clamp(0.0, 100.0) as u8
}

/// 水印 > 90 或任一检测器给出文件名身份标记
pub fn is_identity_confirmed(results: &ResultsMap) -> bool {
    results.score(DetectorKind::Watermark).is_some_and(|s| s > IDENTITY_WATERMARK)
        || has_filename_identity(results)
}

fn has_filename_identity(results: &ResultsMap) -> bool {
    results.iter().any(|(_, r)| r.has_marker_prefix(FILENAME_IDENTITY_PREFIX))
}

fn has_c2pa_edit_signal(results: &ResultsMap) -> bool {
    results
        .get(DetectorKind::Metadata)
        .is_some_and(|r| r.has_marker_prefix(C2PA_EDIT_PREFIX))
}

/// 有相机 Make + Model，且 Software 不像生成工具
fn has_camera_provenance(results: &ResultsMap) -> bool {
    let Some(tags) = results.metadata_tags() else {
        return false;
    };
    let present = |key: &str| tags.get(key).is_some_and(|v| !v.trim().is_empty());
    let software_clean = tags.get("Software").map_or(true, |s| !GENERATIVE_SOFTWARE.is_match(s));
    present("Make") && present("Model") && software_clean
}

fn below(results: &ResultsMap, kind: DetectorKind, limit: u8) -> bool {
    results.score(kind).is_some_and(|s| s < limit)
}

/// 现实证据下调；返回下调后的分数与生效项
fn mitigate(results: &ResultsMap, ai_score: u8) -> (u8, Vec<String>) {
    let mut score = ai_score as i32;
    let mut applied = Vec::new();
    let mut apply = |label: &str, amount: i32| {
        score -= amount;
        applied.push(format!("{label} (-{amount})"));
    };

    if has_camera_provenance(results) {
        apply("Camera make/model provenance", 20);
    }
    if below(results, DetectorKind::Hessian, LOW_SIGNAL) {
        apply("Anisotropic edge geometry", 15);
    }
    if below(results, DetectorKind::Prnu, LOW_SIGNAL) {
        apply("PRNU organic noise", 25);
    }
    if below(results, DetectorKind::Physics, LOW_SIGNAL) {
        apply("Consistent lighting", 10);
    }
    // 砂石/织物等粗糙但真实的纹理会被误读成频谱平台
    let spectral_high = results.score(DetectorKind::Spectral).is_some_and(|s| s > 80);
    if spectral_high && below(results, DetectorKind::Hessian, LOW_SIGNAL) {
        apply("Physical texture safeguard", 30);
    }

    (score.max(0) as u8, applied)
}

pub fn aggregate(results: &ResultsMap) -> VerdictReport {
    let raw_ai = weighted_score(results, &AI_WEIGHTS);
    let edit_score = weighted_score(results, &EDIT_WEIGHTS);
    let identity = is_identity_confirmed(results);

    let (mut ai_score, mitigations) = if identity { (raw_ai, Vec::new()) } else { mitigate(results, raw_ai) };

    let deterministic = results.score(DetectorKind::Watermark).is_some_and(|s| s >= OVERRIDE_THRESHOLD)
        || results.score(DetectorKind::Metadata).is_some_and(|s| s >= OVERRIDE_THRESHOLD);
    if deterministic {
        ai_score = 100;
    }

    let has_ai_signals = ai_score > 50 || identity;
    let c2pa = has_c2pa_edit_signal(results);
    let total = ai_score as u16 + edit_score as u16;

    let (verdict, description) = if has_ai_signals || c2pa || total > 50 {
        let description = if identity {
            "Identity confirmed: a generator watermark or filename signature was found."
        } else if has_ai_signals {
            "Statistical generation signals dominate the forensic profile."
        } else if c2pa {
            "Content credentials record a post-capture editing history."
        } else if edit_score > 50 {
            "Heavy post-processing detected; generation signals are inconclusive."
        } else {
            "Combined weak signals exceed the processing threshold."
        };
        (Verdict::ProcessedAi, description)
    } else {
        (Verdict::OriginalRaw, "No generation or heavy-processing signals; consistent with an original capture.")
    };

    let summary = match verdict {
        Verdict::ProcessedAi => processed_summary(results, ai_score, edit_score, identity, c2pa),
        Verdict::OriginalRaw => raw_summary(results, ai_score, edit_score),
    };

    let per_detector_display = results
        .iter()
        .map(|(kind, r)| DetectorDisplay {
            key: kind,
            name: kind.display_name().to_string(),
            score: r.score,
            markers: r.markers.clone(),
        })
        .collect();

    info!(ai_score, edit_score, ?verdict, "verdict aggregated");

    VerdictReport {
        ai_score,
        edit_score,
        verdict,
        description: description.to_string(),
        summary,
        per_detector_display,
        mitigations,
        heatmap: HeatmapHint::from_results(results),
    }
}

fn above(results: &ResultsMap, kind: DetectorKind, limit: u8) -> bool {
    results.score(kind).is_some_and(|s| s > limit)
}

/// 检测器第一条标记，用于在摘要里引用
fn lead_marker(results: &ResultsMap, kind: DetectorKind) -> Option<&str> {
    results.get(kind).and_then(|r| r.markers.first()).map(String::as_str)
}

fn processed_summary(results: &ResultsMap, ai: u8, edit: u8, identity: bool, c2pa: bool) -> String {
    let mut findings = Vec::new();

    if identity {
        let filename = results
            .iter()
            .flat_map(|(_, r)| r.markers.iter())
            .find(|m| m.starts_with(FILENAME_IDENTITY_PREFIX));
        if let Some(marker) = filename {
            findings.push(format!("{marker} matches a known generator naming pattern."));
        }
    }
    if above(results, DetectorKind::Watermark, 50) {
        if let Some(marker) = lead_marker(results, DetectorKind::Watermark) {
            findings.push(format!("Watermark analysis: {marker}."));
        }
    }
    if above(results, DetectorKind::Metadata, 50) && !has_filename_identity(results) {
        findings.push("Metadata carries generator keywords.".to_string());
    }
    if above(results, DetectorKind::Physics, 50) {
        findings.push("Shading vectors contradict a single coherent light source.".to_string());
    }
    if above(results, DetectorKind::Spectral, 80) {
        findings.push("The spectrum shows a high-frequency plateau instead of a natural roll-off.".to_string());
    }
    if above(results, DetectorKind::Prnu, 50) {
        findings.push("No organic sensor (PRNU) fingerprint was found.".to_string());
    }
    if above(results, DetectorKind::Hessian, 50) {
        findings.push("Edge geometry is isotropic ('mushy'), typical of synthesized detail.".to_string());
    }
    if above(results, DetectorKind::Bloom, 50) {
        findings.push("Texture shows discretized activation clusters.".to_string());
    }
    if above(results, DetectorKind::Diffusion, 80) {
        findings.push("Diffusion residue is inconsistent with natural sensor noise.".to_string());
    }
    if c2pa {
        if let Some(marker) = lead_marker(results, DetectorKind::Metadata) {
            findings.push(format!("{marker}: content credentials document an editing history."));
        }
    }
    if edit > 50 {
        findings.push(format!("Processing intensity is high ({edit}%)."));
    }
    if findings.is_empty() {
        findings.push("No single detector is decisive; the verdict rests on the combined signal.".to_string());
    }

    format!("Generation probability {ai}%, processing intensity {edit}%. {}", findings.join(" "))
}

fn raw_summary(results: &ResultsMap, ai: u8, edit: u8) -> String {
    let mut findings = Vec::new();

    if below(results, DetectorKind::Prnu, LOW_SIGNAL) {
        findings.push("Organic PRNU sensor noise is present.".to_string());
    }
    if let Some(info) = results.file_info() {
        if let (Some(make), Some(model)) = (&info.make, &info.model) {
            if info.is_smartphone {
                findings.push(format!("Captured on a smartphone ({make} {model})."));
            } else {
                findings.push(format!("Camera metadata present ({make} {model})."));
            }
        }
    }
    if above(results, DetectorKind::Compression, 0) || edit > 0 {
        findings.push("Compression traces point to re-encoding or editing, not generation.".to_string());
    }
    if findings.is_empty() {
        findings.push("No detector exceeded its alert threshold.".to_string());
    }

    format!("Generation probability {ai}%, processing intensity {edit}%. {}", findings.join(" "))
}
