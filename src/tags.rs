//! 标签提取：把文件容器里的 EXIF / XMP / C2PA 痕迹拍平成 `key -> value` 字典。

use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::LazyLock;

use regex::bytes::Regex as BytesRegex;
use regex::Regex;
use tracing::debug;

use crate::error::Result;

pub type TagMap = BTreeMap<String, String>;

/// 标签提取协作者
///
/// 扫描器只依赖这个 trait；测试里可以注入固定字典或故意很慢的实现。
pub trait TagReader: Send + Sync {
    fn read_tags(&self, bytes: &[u8]) -> Result<TagMap>;
}

/// 默认实现：kamadak-exif + XMP 包嗅探 + C2PA/JUMBF 标签嗅探
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainerTagReader;

const XP_KEYWORDS: u16 = 0x9c9e;

static XMP_PACKET: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"(?s)<x:xmpmeta.*?</x:xmpmeta>").expect("valid regex"));

static XMP_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[A-Za-z0-9]+:(CreatorTool|DigitalSourceType|Credit|Label|Software|Make|Model)\s*=\s*"([^"]*)""#)
        .expect("valid regex")
});

static XMP_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[A-Za-z0-9]+:(CreatorTool|DigitalSourceType|Credit|Label|Software|Make|Model)>([^<]*)</")
        .expect("valid regex")
});

// JUMBF 超级盒 `jumb`，紧跟描述盒 `jumd` (16 字节 UUID + 1 字节开关)，标签为 "c2pa\0"。
// JPEG APP11 和 PNG caBX 里装的都是这个结构，只认盒结构，不认散落的字节。
static C2PA_MANIFEST_STORE: LazyLock<BytesRegex> =
    LazyLock::new(|| BytesRegex::new(r"(?s-u)jumb.{4}jumd.{17}c2pa\x00").expect("valid regex"));

impl TagReader for ContainerTagReader {
    fn read_tags(&self, bytes: &[u8]) -> Result<TagMap> {
        let mut tags = TagMap::new();
        read_exif(bytes, &mut tags);
        read_xmp(bytes, &mut tags);

        if C2PA_MANIFEST_STORE.is_match(bytes) {
            tags.entry("C2PA".to_string()).or_insert_with(|| "c2pa manifest".to_string());
        }

        debug!(count = tags.len(), "extracted container tags");
        Ok(tags)
    }
}

fn read_exif(bytes: &[u8], tags: &mut TagMap) {
    let mut cursor = Cursor::new(bytes);
    // 没有 EXIF 不是错误，只是"被剥离"
    let exif = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif,
        Err(_) => return,
    };

    for field in exif.fields() {
        let (key, value) = if field.tag.number() == XP_KEYWORDS {
            ("XPKeywords".to_string(), decode_ucs2(&field.value))
        } else {
            let value = match &field.value {
                exif::Value::Ascii(parts) => parts
                    .iter()
                    .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').trim().to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => field.display_value().with_unit(&exif).to_string(),
            };
            (field.tag.to_string(), value)
        };
        if !value.is_empty() {
            tags.entry(key).or_insert(value);
        }
    }
}

/// Windows XP* 标签是 UCS-2 小端字节
fn decode_ucs2(value: &exif::Value) -> String {
    match value {
        exif::Value::Byte(raw) => {
            let units = raw.chunks_exact(2).map(|c| u16::from_le_bytes([c[0], c[1]]));
            char::decode_utf16(units)
                .filter_map(|c| c.ok())
                .filter(|c| *c != '\0')
                .collect::<String>()
                .trim()
                .to_string()
        }
        other => format!("{:?}", other),
    }
}

fn read_xmp(bytes: &[u8], tags: &mut TagMap) {
    let Some(packet) = XMP_PACKET.find(bytes) else {
        return;
    };
    let packet = String::from_utf8_lossy(packet.as_bytes());

    for caps in XMP_ATTR.captures_iter(&packet).chain(XMP_ELEMENT.captures_iter(&packet)) {
        let value = caps[2].trim();
        if !value.is_empty() {
            tags.entry(caps[1].to_string()).or_insert_with(|| value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_yield_empty_map() {
        let tags = ContainerTagReader.read_tags(b"not an image at all").unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn xmp_creator_tool_is_extracted() {
        let bytes = br#"....<x:xmpmeta xmlns:x="adobe:ns:meta/"><rdf:Description xmp:CreatorTool="Adobe Photoshop 25.0" Iptc4xmpExt:DigitalSourceType="http://cv.iptc.org/newscodes/digitalsourcetype/trainedAlgorithmicMedia"/></x:xmpmeta>...."#;
        let tags = ContainerTagReader.read_tags(bytes).unwrap();
        assert_eq!(tags.get("CreatorTool").map(String::as_str), Some("Adobe Photoshop 25.0"));
        assert!(tags["DigitalSourceType"].ends_with("trainedAlgorithmicMedia"));
    }

    #[test]
    fn xmp_element_form_is_extracted() {
        let bytes = b"<x:xmpmeta><tiff:Make>Canon</tiff:Make></x:xmpmeta>";
        let tags = ContainerTagReader.read_tags(bytes).unwrap();
        assert_eq!(tags.get("Make").map(String::as_str), Some("Canon"));
    }

    /// 最小的 C2PA manifest store：jumb 超级盒 + jumd 描述盒
    fn manifest_store_box() -> Vec<u8> {
        let mut jumd = Vec::new();
        jumd.extend_from_slice(&[0, 0, 0, 30]);
        jumd.extend_from_slice(b"jumd");
        jumd.extend_from_slice(b"c2pa\x00\x11\x00\x10\x80\x00\x00\xaa\x00\x38\x9b\x71");
        jumd.push(0x03);
        jumd.extend_from_slice(b"c2pa\x00");

        let mut jumb = Vec::new();
        jumb.extend_from_slice(&((jumd.len() + 8) as u32).to_be_bytes());
        jumb.extend_from_slice(b"jumb");
        jumb.extend_from_slice(&jumd);
        jumb
    }

    #[test]
    fn jumbf_manifest_store_is_flagged() {
        let mut bytes = b"\xff\xd8\xff\xeb\x00\x40JP\x02\x11\x00\x01\x00\x00\x00\x01".to_vec();
        bytes.extend_from_slice(&manifest_store_box());
        let tags = ContainerTagReader.read_tags(&bytes).unwrap();
        assert_eq!(tags.get("C2PA").map(String::as_str), Some("c2pa manifest"));
    }

    #[test]
    fn stray_c2pa_bytes_are_not_a_manifest() {
        let bytes = b"\x89PNG....IEND\xaeB`\x82\x13C2pA\x07 contentcredentials c2pa\x00";
        let tags = ContainerTagReader.read_tags(bytes).unwrap();
        assert!(!tags.contains_key("C2PA"));
    }

    #[test]
    fn ucs2_keywords_are_decoded() {
        let raw: Vec<u8> = "AI art\0".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        assert_eq!(decode_ucs2(&exif::Value::Byte(raw)), "AI art");
    }
}
