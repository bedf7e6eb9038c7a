//! 扫描输入层
//!
//! `SourceImage` 是解码后的原图快照；每个检测器从它各自重采样出固定尺寸的 `PixelSample`，
//! 所以不同检测器看到的像素不保证相同。`FileHandle` 是原始文件字节，供元数据检测器使用。

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};

use crate::error::{ForensicsError, Result};

/// 原始文件：名字、字节、声明的 MIME、最后修改时间
#[derive(Debug, Clone)]
pub struct FileHandle {
    pub name: String,
    pub bytes: Arc<[u8]>,
    pub mime: String,
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileHandle {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        Self { name: name.into(), bytes: bytes.into(), mime: mime.into(), last_modified: None }
    }

    pub fn with_last_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(modified);
        self
    }

    /// 从磁盘读取；MIME 按扩展名推断
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let modified = std::fs::metadata(path)?.modified().ok().map(DateTime::<Utc>::from);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_from_name(&name);
        Ok(Self { name, bytes: bytes.into(), mime: mime.to_string(), last_modified: modified })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// 小写扩展名，没有则为空串
    pub fn extension(&self) -> String {
        match self.name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
            _ => String::new(),
        }
    }
}

fn mime_from_name(name: &str) -> &'static str {
    let ext = name.rsplit_once('.').map(|(_, e)| e.to_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "tif" | "tiff" => "image/tiff",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// 解码后的原图 (RGBA8)，扫描期间只读
#[derive(Debug, Clone)]
pub struct SourceImage {
    image: RgbaImage,
}

impl SourceImage {
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: &DynamicImage) -> Self {
        Self { image: image.to_rgba8() }
    }

    /// 解析 JPG/PNG 头部并解压像素；失败属于扫描级错误。
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)?;
        Ok(Self::from_dynamic(&decoded))
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn as_rgba(&self) -> &RgbaImage {
        &self.image
    }

    /// 整图缩放到 `width x height`，相当于浏览器里 drawImage 到小画布
    pub fn resample(&self, width: u32, height: u32) -> Result<PixelSample> {
        self.ensure_not_empty()?;
        let resized = imageops::resize(&self.image, width.max(1), height.max(1), FilterType::Triangle);
        Ok(PixelSample::new(resized))
    }

    /// 按原始分辨率裁剪，越界部分自动截断
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelSample> {
        self.ensure_not_empty()?;
        let x = x.min(self.width() - 1);
        let y = y.min(self.height() - 1);
        let width = width.min(self.width() - x).max(1);
        let height = height.min(self.height() - y).max(1);
        let region = imageops::crop_imm(&self.image, x, y, width, height).to_image();
        Ok(PixelSample::new(region))
    }

    /// 裁剪后再缩放到固定尺寸
    pub fn crop_resample(&self, x: u32, y: u32, width: u32, height: u32, out_w: u32, out_h: u32) -> Result<PixelSample> {
        let region = self.crop(x, y, width, height)?;
        let resized = imageops::resize(&region.image, out_w.max(1), out_h.max(1), FilterType::Triangle);
        Ok(PixelSample::new(resized))
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(ForensicsError::EmptyImage { width: self.width(), height: self.height() });
        }
        Ok(())
    }
}

/// 检测器专用的固定尺寸采样
///
/// 不变量：宽高 >= 1，缓冲区长度恰好是 `width * height * 4`（由 `ImageBuffer` 保证）。
#[derive(Debug, Clone)]
pub struct PixelSample {
    image: RgbaImage,
}

impl PixelSample {
    fn new(image: RgbaImage) -> Self {
        debug_assert!(image.width() >= 1 && image.height() >= 1);
        Self { image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn pixel_count(&self) -> usize {
        self.image.width() as usize * self.image.height() as usize
    }

    /// 返回 [r, g, b, a]
    pub fn rgba(&self, x: u32, y: u32) -> [u8; 4] {
        self.image.get_pixel(x, y).0
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// 行优先的灰度平面 (luma = 0.299R + 0.587G + 0.114B)
    pub fn luma_plane(&self) -> LumaPlane {
        let values = self
            .image
            .pixels()
            .map(|p| luma(p.0[0], p.0[1], p.0[2]))
            .collect();
        LumaPlane { width: self.width() as usize, height: self.height() as usize, values }
    }
}

pub fn luma(r: u8, g: u8, b: u8) -> f64 {
    0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64
}

/// 灰度平面，坐标越界由调用方保证
#[derive(Debug, Clone)]
pub struct LumaPlane {
    pub width: usize,
    pub height: usize,
    values: Vec<f64>,
}

impl LumaPlane {
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.values[y * self.width + x]
    }
}
