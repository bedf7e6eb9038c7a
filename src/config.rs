use std::env;
use std::time::Duration;

use crate::error::{ForensicsError, Result};

/// 元数据提取的硬超时 (毫秒)
pub const DEFAULT_METADATA_TIMEOUT_MS: u64 = 2000;

/// 内置智能手机品牌白名单
///
/// 这些厂商会在 EXIF 里宣传 "AI camera" 之类的功能，关键词 `ai` 对它们不计分。
pub const DEFAULT_SMARTPHONE_BRANDS: &[&str] = &[
    "apple", "samsung", "google", "xiaomi", "huawei", "honor", "oneplus", "oppo", "vivo",
    "realme", "motorola", "nothing", "sony", "asus", "nokia", "pixel", "iphone",
];

/// 进程级配置，全部来自环境变量
#[derive(Debug, Clone)]
pub struct Config {
    pub metadata_timeout_ms: u64,
    pub log_filter: String,
    pub smartphone_brands: Option<Vec<String>>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let metadata_timeout_ms = match env::var("FORENSICS_METADATA_TIMEOUT_MS") {
            Ok(raw) => raw.trim().parse().map_err(|_| {
                ForensicsError::config("FORENSICS_METADATA_TIMEOUT_MS", format!("not a number: {raw}"))
            })?,
            Err(_) => DEFAULT_METADATA_TIMEOUT_MS,
        };

        let smartphone_brands = env::var("FORENSICS_SMARTPHONE_BRANDS")
            .ok()
            .map(|raw| parse_brand_list(&raw))
            .filter(|brands| !brands.is_empty());

        Ok(Self {
            metadata_timeout_ms,
            log_filter: env::var("FORENSICS_LOG").unwrap_or_else(|_| "info".to_string()),
            smartphone_brands,
        })
    }

    pub fn scan_config(&self) -> ScanConfig {
        let mut scan = ScanConfig {
            metadata_timeout: Duration::from_millis(self.metadata_timeout_ms),
            ..ScanConfig::default()
        };
        if let Some(brands) = &self.smartphone_brands {
            scan.smartphone_brands = brands.clone();
        }
        scan
    }
}

/// 单次扫描使用的参数，库调用方直接构造即可
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub metadata_timeout: Duration,
    pub smartphone_brands: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            metadata_timeout: Duration::from_millis(DEFAULT_METADATA_TIMEOUT_MS),
            smartphone_brands: DEFAULT_SMARTPHONE_BRANDS.iter().map(|b| b.to_string()).collect(),
        }
    }
}

fn parse_brand_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|b| b.trim().to_lowercase())
        .filter(|b| !b.is_empty())
        .collect()
}
