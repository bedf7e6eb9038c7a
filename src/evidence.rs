use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize}; // 序列化，让结果能直接转成 JSON 交给展示层

use crate::fingerprint::FileFingerprint;

/// 十个检测器的固定枚举集合
///
/// 声明顺序就是报告里逐项展示的顺序。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Metadata,
    Spectral,
    Noise,
    Prnu,
    Hessian,
    Physics,
    Bloom,
    Diffusion,
    Compression,
    Watermark,
}

impl DetectorKind {
    pub const ALL: [DetectorKind; 10] = [
        DetectorKind::Metadata,
        DetectorKind::Spectral,
        DetectorKind::Noise,
        DetectorKind::Prnu,
        DetectorKind::Hessian,
        DetectorKind::Physics,
        DetectorKind::Bloom,
        DetectorKind::Diffusion,
        DetectorKind::Compression,
        DetectorKind::Watermark,
    ];

    /// 九个同步像素检测器（元数据单独异步执行）
    pub const PIXEL: [DetectorKind; 9] = [
        DetectorKind::Spectral,
        DetectorKind::Noise,
        DetectorKind::Prnu,
        DetectorKind::Hessian,
        DetectorKind::Physics,
        DetectorKind::Bloom,
        DetectorKind::Diffusion,
        DetectorKind::Compression,
        DetectorKind::Watermark,
    ];

    pub fn key(self) -> &'static str {
        match self {
            DetectorKind::Metadata => "metadata",
            DetectorKind::Spectral => "spectral",
            DetectorKind::Noise => "noise",
            DetectorKind::Prnu => "prnu",
            DetectorKind::Hessian => "hessian",
            DetectorKind::Physics => "physics",
            DetectorKind::Bloom => "bloom",
            DetectorKind::Diffusion => "diffusion",
            DetectorKind::Compression => "compression",
            DetectorKind::Watermark => "watermark",
        }
    }

    /// 报告里给人看的名字
    pub fn display_name(self) -> &'static str {
        match self {
            DetectorKind::Metadata => "Metadata Forensics",
            DetectorKind::Spectral => "Spectral Roll-off",
            DetectorKind::Noise => "Noise Pattern",
            DetectorKind::Prnu => "PRNU Sensor Fingerprint",
            DetectorKind::Hessian => "Hessian Geometry",
            DetectorKind::Physics => "Lighting Physics",
            DetectorKind::Bloom => "Neural Bloom",
            DetectorKind::Diffusion => "Diffusion Residue (DIRE)",
            DetectorKind::Compression => "Compression Profile",
            DetectorKind::Watermark => "Watermark / Identity",
        }
    }
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// 单个检测器的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorResult {
    // 0..=100 的整数分，构造时已截断
    pub score: u8,

    // 人类可读的发现，按产生顺序；至少一条
    pub markers: Vec<String>,

    // 检测器私有的附加数据，不参与打分
    #[serde(default, skip_serializing_if = "Payload::is_none")]
    pub payload: Payload,
}

impl DetectorResult {
    /// 把任意浮点分数截断到 [0, 100] 并四舍五入；markers 为空时补一条基线标记。
    pub fn new(raw_score: f64, mut markers: Vec<String>, baseline: &str) -> Self {
        if markers.is_empty() {
            markers.push(baseline.to_string());
        }
        Self { score: clamp_score(raw_score), markers, payload: Payload::None }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// 安全调用包装器的兜底结果
    pub fn fault(kind: DetectorKind) -> Self {
        Self {
            score: 0,
            markers: vec![format!("{FAULT_MARKER_PREFIX}{}", kind.key())],
            payload: Payload::None,
        }
    }

    pub fn is_fault(&self) -> bool {
        self.markers.iter().any(|m| m.starts_with(FAULT_MARKER_PREFIX))
    }

    pub fn has_marker_prefix(&self, prefix: &str) -> bool {
        self.markers.iter().any(|m| m.starts_with(prefix))
    }
}

pub const FAULT_MARKER_PREFIX: &str = "Forensic Fault: ";

pub fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

/// 检测器附加数据
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    #[default]
    None,
    Spectral { roll_off: f64, discontinuity_density: f64 },
    Noise { smooth_ratio: f64, mean_noise: f64 },
    Prnu { grain_ratio: f64, uniform_ratio: f64 },
    Physics { vectors: usize, paradoxes: usize },
    Hessian { strong_edges: usize, mushy_edges: usize, mushy_ratio: f64 },
    Bloom { clusters: usize, patches: usize, bloom_ratio: f64 },
    Diffusion { residue_variance: f64 },
    Compression { block_artifacts: usize, haloing: usize, ratio: f64 },
    Watermark { sparkle: u8, credential: u8, corner: u8, frequency: u8 },
    Metadata { raw_data: BTreeMap<String, String>, file_info: Box<FileInfo> },
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }
}

/// 被扫描文件的描述信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub size: u64,
    pub mime: String,
    pub extension: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub scanned_at: DateTime<Utc>,
    pub declared_width: Option<u32>,
    pub declared_height: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub software: Option<String>,
    pub is_smartphone: bool,
    pub fingerprint: Option<FileFingerprint>,
}

/// 检测器名 -> 结果
///
/// 缺失的键表示"不在场"，和"在场但 0 分"不同：聚合时缺失项不进入加权分母。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultsMap {
    entries: BTreeMap<DetectorKind, DetectorResult>,
}

impl ResultsMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: DetectorKind, result: DetectorResult) {
        self.entries.insert(kind, result);
    }

    pub fn get(&self, kind: DetectorKind) -> Option<&DetectorResult> {
        self.entries.get(&kind)
    }

    pub fn score(&self, kind: DetectorKind) -> Option<u8> {
        self.entries.get(&kind).map(|r| r.score)
    }

    pub fn contains(&self, kind: DetectorKind) -> bool {
        self.entries.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按固定展示顺序迭代
    pub fn iter(&self) -> impl Iterator<Item = (DetectorKind, &DetectorResult)> {
        self.entries.iter().map(|(k, v)| (*k, v))
    }

    /// 元数据检测器带回的原始标签字典
    pub fn metadata_tags(&self) -> Option<&BTreeMap<String, String>> {
        match self.get(DetectorKind::Metadata).map(|r| &r.payload) {
            Some(Payload::Metadata { raw_data, .. }) => Some(raw_data),
            _ => None,
        }
    }

    pub fn file_info(&self) -> Option<&FileInfo> {
        match self.get(DetectorKind::Metadata).map(|r| &r.payload) {
            Some(Payload::Metadata { file_info, .. }) => Some(file_info),
            _ => None,
        }
    }
}

impl FromIterator<(DetectorKind, DetectorResult)> for ResultsMap {
    fn from_iter<T: IntoIterator<Item = (DetectorKind, DetectorResult)>>(iter: T) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}
