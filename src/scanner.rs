use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ScanConfig;
use crate::detectors::{self, metadata, PixelContext};
use crate::error::Result;
use crate::evidence::{DetectorKind, DetectorResult, Payload, ResultsMap};
use crate::fingerprint::generate_fingerprints;
use crate::sample::{FileHandle, SourceImage};
use crate::tags::{ContainerTagReader, TagReader};
use crate::verdict::{self, VerdictReport};

/// 一次扫描的完整产出：逐项结果 + 最终判决
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub results: ResultsMap,
    pub report: VerdictReport,
}

/// 扫描编排器
///
/// 无状态：每次 `scan` 都只依赖传入的图片和文件，扫描之间不共享任何可变数据。
#[derive(Clone)]
pub struct ForensicScanner {
    config: ScanConfig,
    reader: Arc<dyn TagReader>,
}

impl Default for ForensicScanner {
    fn default() -> Self {
        Self::new(ScanConfig::default())
    }
}

impl ForensicScanner {
    pub fn new(config: ScanConfig) -> Self {
        Self { config, reader: Arc::new(ContainerTagReader) }
    }

    /// 替换标签提取协作者
    pub fn with_reader<R: TagReader + 'static>(mut self, reader: R) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// 跑完全部十个检测器
    ///
    /// 元数据 (异步、带超时) 先行，其余九个同步依次执行；单个检测器失败只会留下 fault 标记。
    pub async fn run_detectors(&self, image: &SourceImage, file: &FileHandle) -> ResultsMap {
        self.run_detectors_with(image, file, detectors::run_pixel).await
    }

    async fn run_detectors_with<F>(&self, image: &SourceImage, file: &FileHandle, pixel: F) -> ResultsMap
    where
        F: Fn(DetectorKind, PixelContext<'_>) -> Result<DetectorResult>,
    {
        let mut results = ResultsMap::new();

        let mut meta = metadata::analyze(file.clone(), Arc::clone(&self.reader), &self.config).await;
        // 指纹不占元数据的超时预算：像素已经解码好了
        if let Payload::Metadata { file_info, .. } = &mut meta.payload {
            file_info.fingerprint = Some(generate_fingerprints(&file.bytes, image));
        }
        results.insert(DetectorKind::Metadata, meta);

        let ctx = PixelContext { image, source_hint: &file.name };
        for kind in DetectorKind::PIXEL {
            let result = detectors::safe_invoke(kind, || pixel(kind, ctx));
            results.insert(kind, result);
        }

        results
    }

    /// 像素 + 文件 => 判决
    pub async fn scan(&self, image: &SourceImage, file: &FileHandle) -> ScanOutcome {
        info!(file = %file.name, width = image.width(), height = image.height(), "🔍 scan started");
        let results = self.run_detectors(image, file).await;
        let report = verdict::aggregate(&results);
        info!(file = %file.name, verdict = ?report.verdict, ai = report.ai_score, edit = report.edit_score, "✅ scan finished");
        ScanOutcome { results, report }
    }

    /// 先解码再扫描；解码失败属于扫描级错误，不产出部分报告
    pub async fn scan_file(&self, file: &FileHandle) -> Result<ScanOutcome> {
        let bytes = Arc::clone(&file.bytes);
        let image = tokio::task::spawn_blocking(move || SourceImage::decode(&bytes)).await??;
        Ok(self.scan(&image, file).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForensicsError;
    use crate::tags::TagMap;
    use image::{Rgba, RgbaImage};

    struct CameraTags;

    impl TagReader for CameraTags {
        fn read_tags(&self, _bytes: &[u8]) -> Result<TagMap> {
            Ok([("Make", "Canon"), ("Model", "EOS R5")].iter().map(|(k, v)| (k.to_string(), v.to_string())).collect())
        }
    }

    fn gradient() -> SourceImage {
        SourceImage::from_rgba(RgbaImage::from_fn(120, 90, |x, y| Rgba([(x * 2) as u8, (y * 2) as u8, ((x ^ y) % 256) as u8, 255])))
    }

    fn assert_others_unchanged(baseline: &ResultsMap, faulty: &ResultsMap, failed: DetectorKind) {
        assert_eq!(faulty.len(), 10);
        assert_eq!(faulty.get(failed), Some(&DetectorResult::fault(failed)));
        for kind in DetectorKind::PIXEL.into_iter().filter(|k| *k != failed) {
            assert_eq!(faulty.get(kind), baseline.get(kind), "{kind} changed");
        }
        // scanned_at 每次不同，只比较分数和标记
        let (base_meta, meta) = (baseline.get(DetectorKind::Metadata).unwrap(), faulty.get(DetectorKind::Metadata).unwrap());
        assert_eq!(meta.score, base_meta.score);
        assert_eq!(meta.markers, base_meta.markers);
    }

    #[tokio::test]
    async fn one_failing_detector_leaves_the_rest_untouched() {
        let scanner = ForensicScanner::default().with_reader(CameraTags);
        let image = gradient();
        let file = FileHandle::new("IMG_0042.png", Vec::<u8>::new(), "image/png");
        let baseline = scanner.run_detectors(&image, &file).await;

        for failed in DetectorKind::PIXEL {
            let faulty = scanner
                .run_detectors_with(&image, &file, |kind, ctx| {
                    if kind == failed {
                        Err(ForensicsError::degenerate("test", "forced failure"))
                    } else {
                        detectors::run_pixel(kind, ctx)
                    }
                })
                .await;
            assert_others_unchanged(&baseline, &faulty, failed);
        }
    }

    #[tokio::test]
    async fn one_panicking_detector_leaves_the_rest_untouched() {
        let scanner = ForensicScanner::default().with_reader(CameraTags);
        let image = gradient();
        let file = FileHandle::new("IMG_0042.png", Vec::<u8>::new(), "image/png");
        let baseline = scanner.run_detectors(&image, &file).await;

        let faulty = scanner
            .run_detectors_with(&image, &file, |kind, ctx| {
                if kind == DetectorKind::Hessian {
                    panic!("eigen solver blew up");
                }
                detectors::run_pixel(kind, ctx)
            })
            .await;
        assert_others_unchanged(&baseline, &faulty, DetectorKind::Hessian);
    }

    #[tokio::test]
    async fn fingerprint_is_attached_from_decoded_pixels() {
        let scanner = ForensicScanner::default().with_reader(CameraTags);
        let file = FileHandle::new("IMG_0042.png", b"not really a png".to_vec(), "image/png");
        let results = scanner.run_detectors(&gradient(), &file).await;

        let fingerprint = results.file_info().and_then(|info| info.fingerprint.clone()).unwrap();
        assert!(fingerprint.phash.is_some());
        assert_eq!(fingerprint.sha256.len(), 64);
    }
}
