//! 元数据取证
//!
//! 唯一的异步检测器：标签提取放在阻塞线程里跑，和硬超时赛跑。超时后直接给出 0 分兜底，
//! 迟到的提取结果随 `JoinHandle` 一起被丢弃，不会再写回本次扫描。
//! 超时预算里只有读标签和打分；文件指纹由扫描器用已解码的像素另算。
//!
//! 打分顺序：
//! 1. C2PA 内容凭证 => 编辑记录，基础分归 0，且跳过第 4~6 条通用启发式
//! 2. 文件名里的生成器名称组合 => 100 ("铁证")
//! 3. Software/Make/Model/XPKeywords 里的取证关键词 => 每命中 +50
//! 4. 全部标签值里的通用 AI 关键词 => 每个 +40 (智能手机上的 "ai" 不计)
//! 5. 同时缺少 Make 和 Model => +25
//! 6. Software 匹配生成/编辑工具 => +30 (智能手机上仅命中 "ai" 时不计)

use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::evidence::{DetectorKind, DetectorResult, FileInfo, Payload};
use crate::sample::FileHandle;
use crate::tags::{TagMap, TagReader};

pub const FILENAME_IDENTITY_PREFIX: &str = "Filename Identity";
pub const C2PA_EDIT_PREFIX: &str = "C2PA Edit Record";
pub const TIMEOUT_MARKER: &str = "Metadata extraction timed out";

/// 文件名里同时出现两段即视为生成器署名；第二段为空表示单词即可
const FILENAME_SIGNATURES: &[(&str, &str, &str)] = &[
    ("dall", "e", "DALL-E"),
    ("stable", "diffusion", "Stable Diffusion"),
    ("gemini", "generated", "Gemini"),
    ("chatgpt", "", "ChatGPT"),
    ("midjourney", "", "Midjourney"),
    ("adobe", "firefly", "Adobe Firefly"),
];

const FORENSIC_FIELDS: &[&str] = &["Software", "Make", "Model", "XPKeywords"];
const FORENSIC_KEYWORDS: &[&str] = &["gemini", "deepmind", "synthid", "midjourney"];

/// 只有这个关键词会因为智能手机而被豁免
const SMARTPHONE_EXEMPT_KEYWORD: &str = "ai";

const AI_KEYWORDS: &[&str] = &[
    "ai",
    "generated",
    "diffusion",
    "midjourney",
    "dall-e",
    "openai",
    "firefly",
    "gemini",
    "imagen",
    "novelai",
    "comfyui",
    "automatic1111",
    "trainedalgorithmicmedia",
];

// "ai" 只按整词匹配，否则 "portrait" 之类都会命中
static AI_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bai\b").expect("valid regex"));

static SOFTWARE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)midjourney|dall-?e|stable.?diffusion|firefly|comfyui|automatic1111|novelai|generat\w*|photoshop|\bai\b")
        .expect("valid regex")
});

/// 异步入口：提取 + 打分，受 `config.metadata_timeout` 约束
pub async fn analyze(file: FileHandle, reader: Arc<dyn TagReader>, config: &ScanConfig) -> DetectorResult {
    let brands = config.smartphone_brands.clone();
    let task = tokio::task::spawn_blocking(move || extract(&file, reader.as_ref(), &brands));

    match tokio::time::timeout(config.metadata_timeout, task).await {
        Ok(Ok(Ok(result))) => {
            debug!(score = result.score, "metadata scan finished");
            result
        }
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "metadata extraction failed");
            DetectorResult::fault(DetectorKind::Metadata)
        }
        Ok(Err(join)) => {
            warn!(error = %join, "metadata task aborted");
            DetectorResult::fault(DetectorKind::Metadata)
        }
        Err(_) => {
            warn!(timeout_ms = config.metadata_timeout.as_millis() as u64, "⏱️ metadata extraction timed out");
            DetectorResult::new(0.0, vec![TIMEOUT_MARKER.to_string()], TIMEOUT_MARKER)
        }
    }
}

/// 同步部分：读标签、打分
pub fn extract(file: &FileHandle, reader: &dyn TagReader, smartphone_brands: &[String]) -> Result<DetectorResult> {
    let tags = reader.read_tags(&file.bytes)?;
    let file_info = build_file_info(file, &tags, smartphone_brands);
    let (score, markers) = score_tags(&file.name, &tags, &file_info);

    Ok(DetectorResult::new(score, markers, "No suspicious metadata").with_payload(Payload::Metadata {
        raw_data: tags,
        file_info: Box::new(file_info),
    }))
}

pub fn build_file_info(file: &FileHandle, tags: &TagMap, smartphone_brands: &[String]) -> FileInfo {
    let make = non_empty(tags.get("Make"));
    let model = non_empty(tags.get("Model"));
    let is_smartphone = is_smartphone(make.as_deref(), model.as_deref(), smartphone_brands);

    FileInfo {
        name: file.name.clone(),
        size: file.size(),
        mime: file.mime.clone(),
        extension: file.extension(),
        last_modified: file.last_modified,
        scanned_at: Utc::now(),
        declared_width: declared_dimension(tags, &["PixelXDimension", "ImageWidth"]),
        declared_height: declared_dimension(tags, &["PixelYDimension", "ImageLength"]),
        software: non_empty(tags.get("Software")).or_else(|| non_empty(tags.get("CreatorTool"))),
        make,
        model,
        is_smartphone,
        fingerprint: None,
    }
}

pub fn is_smartphone(make: Option<&str>, model: Option<&str>, brands: &[String]) -> bool {
    let device = format!("{} {}", make.unwrap_or(""), model.unwrap_or("")).to_lowercase();
    !device.trim().is_empty() && brands.iter().any(|b| device.contains(b.as_str()))
}

/// 打分主体，纯函数
pub fn score_tags(file_name: &str, tags: &TagMap, info: &FileInfo) -> (f64, Vec<String>) {
    let haystack = tags.values().map(String::as_str).collect::<Vec<_>>().join(" ").to_lowercase();
    let mut markers = Vec::new();
    let mut score: f64 = 0.0;

    // 编辑记录只把基础分归零，生成器身份证据照样计分
    let c2pa = c2pa_edit_record(tags, &haystack);
    if let Some(record) = c2pa {
        markers.push(format!("{C2PA_EDIT_PREFIX}: {record}"));
    }

    let lower_name = file_name.to_lowercase();
    for (first, second, label) in FILENAME_SIGNATURES {
        if lower_name.contains(first) && (second.is_empty() || lower_name.contains(second)) {
            score = 100.0;
            markers.push(format!("{FILENAME_IDENTITY_PREFIX}: {label}"));
            break;
        }
    }

    for field in FORENSIC_FIELDS {
        let Some(value) = tags.get(*field) else { continue };
        let value = value.to_lowercase();
        for keyword in FORENSIC_KEYWORDS {
            if value.contains(keyword) {
                score += 50.0;
                markers.push(format!("Forensic tag: {field} mentions '{keyword}'"));
            }
        }
    }

    if c2pa.is_none() {
        score += heuristic_signals(tags, &haystack, info, &mut markers);
    }

    if let (Some(make), Some(model)) = (&info.make, &info.model) {
        let kind = if info.is_smartphone { "Smartphone" } else { "Camera" };
        markers.push(format!("{kind}: {make} {model}"));
    }

    (score.min(100.0), markers)
}

/// 通用启发式：AI 关键词、EXIF 剥离、可疑软件
fn heuristic_signals(tags: &TagMap, haystack: &str, info: &FileInfo, markers: &mut Vec<String>) -> f64 {
    let mut score: f64 = 0.0;

    let mut smartphone_exempted = false;
    for keyword in AI_KEYWORDS {
        let hit = if *keyword == SMARTPHONE_EXEMPT_KEYWORD {
            AI_WORD.is_match(haystack)
        } else {
            haystack.contains(keyword)
        };
        if !hit {
            continue;
        }
        if info.is_smartphone && *keyword == SMARTPHONE_EXEMPT_KEYWORD {
            smartphone_exempted = true;
            continue;
        }
        score += 40.0;
        markers.push(format!("AI keyword in metadata: '{keyword}'"));
    }

    if info.make.is_none() && info.model.is_none() {
        score += 25.0;
        markers.push("Stripped EXIF: no camera make/model".to_string());
    }

    if let Some(software) = tags.get("Software") {
        let suspicious = SOFTWARE_PATTERN
            .find_iter(software)
            .any(|m| !(info.is_smartphone && m.as_str().eq_ignore_ascii_case(SMARTPHONE_EXEMPT_KEYWORD)));
        if suspicious {
            score += 30.0;
            markers.push(format!("Generative/editing software: {software}"));
        } else if SOFTWARE_PATTERN.is_match(software) {
            smartphone_exempted = true;
        }
    }

    if smartphone_exempted {
        markers.push("Smartphone 'AI' camera feature ignored".to_string());
    }
    score
}

/// 只认标签提取器确认过的 manifest store，再按编辑工具细分
fn c2pa_edit_record(tags: &TagMap, haystack: &str) -> Option<&'static str> {
    if !tags.contains_key("C2PA") {
        return None;
    }
    let record = if haystack.contains("firefly") || haystack.contains("generative fill") {
        "Adobe generative edit"
    } else if haystack.contains("photoshop") {
        "Adobe Photoshop"
    } else if haystack.contains("lightroom") {
        "Adobe Lightroom"
    } else if haystack.contains("adobe") {
        "Adobe"
    } else {
        "content credentials"
    };
    Some(record)
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty()).map(str::to_string)
}

fn declared_dimension(tags: &TagMap, keys: &[&str]) -> Option<u32> {
    keys.iter().find_map(|k| {
        tags.get(*k)
            .and_then(|v| v.split_whitespace().next())
            .and_then(|v| v.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_SMARTPHONE_BRANDS;

    fn brands() -> Vec<String> {
        DEFAULT_SMARTPHONE_BRANDS.iter().map(|b| b.to_string()).collect()
    }

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn score(name: &str, pairs: &[(&str, &str)]) -> (f64, Vec<String>) {
        let tags = tags(pairs);
        let file = FileHandle::new(name, Vec::<u8>::new(), "image/jpeg");
        let info = build_file_info(&file, &tags, &brands());
        score_tags(name, &tags, &info)
    }

    #[test]
    fn c2pa_forces_zero_even_with_ai_keywords() {
        let (s, markers) = score("edited.jpg", &[("C2PA", "c2pa manifest"), ("CreatorTool", "Adobe Photoshop 25.0"), ("Software", "generated")]);
        assert_eq!(s, 0.0);
        assert_eq!(markers, vec!["C2PA Edit Record: Adobe Photoshop".to_string()]);
    }

    #[test]
    fn c2pa_does_not_hide_filename_identity() {
        let (s, markers) = score("gemini_generated_image.png", &[("C2PA", "c2pa manifest")]);
        assert_eq!(s, 100.0);
        assert_eq!(
            markers,
            vec!["C2PA Edit Record: content credentials".to_string(), "Filename Identity: Gemini".to_string()]
        );
    }

    #[test]
    fn c2pa_keeps_forensic_field_hits() {
        let (s, markers) = score("photo.jpg", &[("C2PA", "c2pa manifest"), ("Software", "Google SynthID")]);
        assert_eq!(s, 50.0);
        assert!(markers.iter().any(|m| m == "Forensic tag: Software mentions 'synthid'"));
    }

    #[test]
    fn c2pa_mentions_in_tag_values_are_not_a_record() {
        // 只有提取器确认过的 "C2PA" 键才算编辑记录
        let (s, markers) = score("IMG_1.jpg", &[("Make", "Canon"), ("Model", "EOS R5"), ("ImageDescription", "see c2pa.org")]);
        assert_eq!(s, 0.0);
        assert_eq!(markers, vec!["Camera: Canon EOS R5".to_string()]);
    }

    #[test]
    fn extraction_leaves_fingerprint_to_the_scanner() {
        let file = FileHandle::new("scan.png", vec![1u8, 2, 3], "image/png");
        let info = build_file_info(&file, &TagMap::new(), &brands());
        assert!(info.fingerprint.is_none());
        assert_eq!(info.size, 3);
    }

    #[test]
    fn filename_signature_is_smoking_gun() {
        let (s, markers) = score("Gemini_Generated_Image_abc.png", &[]);
        assert_eq!(s, 100.0);
        assert!(markers.iter().any(|m| m == "Filename Identity: Gemini"));
    }

    #[test]
    fn midjourney_software_tag_accumulates() {
        // 50 (取证字段) + 40 (通用关键词) + 25 (无 Make/Model) + 30 (软件) => 截断到 100
        let (s, markers) = score("render.png", &[("Software", "Midjourney v6")]);
        assert_eq!(s, 100.0);
        assert!(markers.iter().any(|m| m.starts_with("Forensic tag: Software")));
        assert!(markers.iter().any(|m| m.starts_with("Stripped EXIF")));
    }

    #[test]
    fn stripped_exif_alone_scores_25() {
        let (s, _) = score("scan.png", &[]);
        assert_eq!(s, 25.0);
    }

    #[test]
    fn smartphone_ai_camera_is_exempt() {
        let (s, markers) = score("IMG_0001.jpg", &[("Make", "samsung"), ("Model", "SM-S918B"), ("Software", "AI Camera")]);
        assert_eq!(s, 0.0, "{markers:?}");
        assert!(markers.iter().any(|m| m.contains("ignored")));
        assert!(markers.iter().any(|m| m == "Smartphone: samsung SM-S918B"));
    }

    #[test]
    fn ai_keyword_counts_for_non_smartphones() {
        let (s, _) = score("IMG_0001.jpg", &[("Make", "Canon"), ("Model", "EOS R5"), ("Software", "AI Upscaler")]);
        // 40 (ai) + 30 (软件)
        assert_eq!(s, 70.0);
    }

    #[test]
    fn exemption_covers_only_the_ai_keyword() {
        let (s, _) = score("IMG_0001.jpg", &[("Make", "Apple"), ("Model", "iPhone 15"), ("ImageDescription", "generated by ai")]);
        assert_eq!(s, 40.0);
    }

    #[test]
    fn camera_without_keywords_scores_zero() {
        let (s, markers) = score("IMG_1234.CR3", &[("Make", "Canon"), ("Model", "EOS R5"), ("Software", "Adobe Lightroom 12.0")]);
        assert_eq!(s, 0.0);
        assert_eq!(markers, vec!["Camera: Canon EOS R5".to_string()]);
    }

    #[test]
    fn declared_dimensions_are_parsed() {
        let t = tags(&[("PixelXDimension", "4000"), ("ImageLength", "3000 pixels")]);
        assert_eq!(declared_dimension(&t, &["PixelXDimension", "ImageWidth"]), Some(4000));
        assert_eq!(declared_dimension(&t, &["PixelYDimension", "ImageLength"]), Some(3000));
    }

    struct SlowReader;

    impl TagReader for SlowReader {
        fn read_tags(&self, _bytes: &[u8]) -> Result<TagMap> {
            std::thread::sleep(std::time::Duration::from_millis(500));
            Ok(tags(&[("Software", "Midjourney v6")]))
        }
    }

    #[tokio::test]
    async fn timeout_yields_zero_fallback() {
        let config = ScanConfig { metadata_timeout: std::time::Duration::from_millis(20), ..ScanConfig::default() };
        let file = FileHandle::new("render.png", Vec::<u8>::new(), "image/png");
        let result = analyze(file, Arc::new(SlowReader), &config).await;
        assert_eq!(result.score, 0);
        assert_eq!(result.markers, vec![TIMEOUT_MARKER.to_string()]);
        assert!(result.payload.is_none());
    }

    struct FailingReader;

    impl TagReader for FailingReader {
        fn read_tags(&self, _bytes: &[u8]) -> Result<TagMap> {
            panic!("corrupt container")
        }
    }

    #[tokio::test]
    async fn reader_panic_becomes_fault() {
        let file = FileHandle::new("x.jpg", Vec::<u8>::new(), "image/jpeg");
        let result = analyze(file, Arc::new(FailingReader), &ScanConfig::default()).await;
        assert_eq!(result, DetectorResult::fault(DetectorKind::Metadata));
    }
}
