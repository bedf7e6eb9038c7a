use thiserror::Error;

use crate::evidence::DetectorKind;

/// 取证引擎的错误类型
///
/// 分两层：
/// - 检测器级 (`EmptyImage` / `Degenerate`)：由安全调用包装器吞掉，只留下一条 `Forensic Fault` 标记。
/// - 扫描级 (`Decode` / `Task` / `Io`)：直接返回给调用方，不产出部分报告。
/// - 调用错误 (`NotPixelDetector` / `Config`)：调用方传错了参数。
#[derive(Debug, Error)]
pub enum ForensicsError {
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("empty pixel sample ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("degenerate statistic in {detector}: {reason}")]
    Degenerate { detector: &'static str, reason: String },

    #[error("{0} is not a pixel detector")]
    NotPixelDetector(DetectorKind),

    #[error("invalid configuration {key}: {message}")]
    Config { key: String, message: String },

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ForensicsError>;

impl ForensicsError {
    pub fn degenerate<S: Into<String>>(detector: &'static str, reason: S) -> Self {
        Self::Degenerate { detector, reason: reason.into() }
    }

    pub fn config<K: Into<String>, S: Into<String>>(key: K, message: S) -> Self {
        Self::Config { key: key.into(), message: message.into() }
    }

    /// 检测器级错误可以降级为零分；其余属于扫描级故障。
    pub fn is_detector_fault(&self) -> bool {
        matches!(self, Self::EmptyImage { .. } | Self::Degenerate { .. })
    }
}

/// 非有限值 (NaN / inf) 统一视为退化输入
pub(crate) fn ensure_finite(detector: &'static str, label: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ForensicsError::degenerate(detector, format!("{label} is {value}")))
    }
}
