//! 宿主平台能力模块
//!
//! # 设计思路
//!
//! 像素级编解码、内置资源表、内容引用解析、默认媒体目录都属于宿主平台，
//! 本库只在 `HostPlatform` 这一条边界上消费它们。
//! 转换编排与解码后端都通过 `Arc<dyn HostPlatform>` 注入，测试可替换为假实现。
//!
//! # 实现思路
//!
//! - `CapabilityLevel` 表示平台发行版本，原生 HEIF 解码从 29 开始可用。
//! - WebP 统一输出无损编码（`image` 的 WebP 编码器只有无损模式），质量参数只作用于 JPEG。
//! - `LocalPlatform` 是普通 Rust 宿主的默认实现：原生编解码委托 `image` crate，
//!   默认输出目录为 `<media_root>/DCIM`，不存在时自动创建。
//! - 所有可能失败的操作均返回 `Result`，不使用 `expect()` / `unwrap()`。

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ColorType, DynamicImage};

use crate::converter::{ContentReference, OutputFormat, Quality, ResourceId};
use crate::decoder::Image;
use crate::error::ConvertError;

/// 平台能力等级（发行版本号）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CapabilityLevel(pub u32);

impl CapabilityLevel {
    /// 平台原生 HEIF 解码可用的最低等级。
    pub const NATIVE_HEIF: Self = Self(29);

    pub fn supports_native_heif(self) -> bool {
        self >= Self::NATIVE_HEIF
    }
}

/// 宿主平台提供的外部能力。
pub trait HostPlatform: Send + Sync {
    fn capability_level(&self) -> CapabilityLevel;

    /// 平台原生解码。
    ///
    /// 返回 `Ok(None)` 表示平台无法识别这些字节（软失败），而不是错误。
    fn decode_native(&self, bytes: &[u8]) -> Result<Option<Image>, ConvertError>;

    /// 按目标格式与质量编码图片，失败统一为 `ConvertError::Save`。
    fn encode(
        &self,
        image: &Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, ConvertError>;

    /// 平台默认的输出目录；无法解析时返回 `None`，调用方会跳过保存。
    fn default_output_dir(&self) -> Option<PathBuf>;

    fn has_resource(&self, id: ResourceId) -> bool;

    fn open_resource(&self, id: ResourceId) -> Result<Vec<u8>, ConvertError>;

    fn open_reference(
        &self,
        reference: &ContentReference,
    ) -> Result<Box<dyn Read + Send>, ConvertError>;
}

/// 基于本地文件系统与 `image` crate 的平台实现。
#[derive(Debug, Clone)]
pub struct LocalPlatform {
    capability: CapabilityLevel,
    media_root: Option<PathBuf>,
    resources: HashMap<ResourceId, PathBuf>,
}

impl Default for LocalPlatform {
    fn default() -> Self {
        Self {
            capability: CapabilityLevel(34),
            media_root: None,
            resources: HashMap::new(),
        }
    }
}

impl LocalPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capability_level(mut self, level: u32) -> Self {
        self.capability = CapabilityLevel(level);
        self
    }

    /// 设置媒体根目录，默认输出目录为其下的 `DCIM`。
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    /// 向内置资源表登记一个资源。
    pub fn with_resource(mut self, id: ResourceId, path: impl Into<PathBuf>) -> Self {
        self.resources.insert(id, path.into());
        self
    }

    fn encode_jpeg(image: &Image, quality: Quality) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        // JPEG 不支持 alpha，且编码器质量下限为 1
        let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
        rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality.value().max(1)))?;
        Ok(buffer)
    }

    fn encode_png(image: &Image) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        match image.color() {
            ColorType::Rgb32F | ColorType::Rgba32F => {
                DynamicImage::ImageRgba8(image.to_rgba8())
                    .write_with_encoder(PngEncoder::new(&mut buffer))?;
            }
            _ => image.write_with_encoder(PngEncoder::new(&mut buffer))?,
        }
        Ok(buffer)
    }

    fn encode_webp(image: &Image) -> Result<Vec<u8>, image::ImageError> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(image.to_rgba8())
            .write_with_encoder(WebPEncoder::new_lossless(&mut buffer))?;
        Ok(buffer)
    }
}

impl HostPlatform for LocalPlatform {
    fn capability_level(&self) -> CapabilityLevel {
        self.capability
    }

    fn decode_native(&self, bytes: &[u8]) -> Result<Option<Image>, ConvertError> {
        let Ok(format) = image::guess_format(bytes) else {
            log::debug!("🔍 平台解码器无法识别输入格式（{} bytes）", bytes.len());
            return Ok(None);
        };

        image::load_from_memory_with_format(bytes, format)
            .map(Some)
            .map_err(|e| ConvertError::Decode(format!("平台解码失败（{:?}）：{}", format, e)))
    }

    fn encode(
        &self,
        image: &Image,
        format: OutputFormat,
        quality: Quality,
    ) -> Result<Vec<u8>, ConvertError> {
        let encoded = match format {
            OutputFormat::Jpeg => Self::encode_jpeg(image, quality),
            OutputFormat::Png => Self::encode_png(image),
            OutputFormat::Webp => Self::encode_webp(image),
        };

        encoded.map_err(|e| ConvertError::Save(format!("图片编码失败（{:?}）：{}", format, e)))
    }

    fn default_output_dir(&self) -> Option<PathBuf> {
        let root = self.media_root.as_ref()?;
        let dcim = root.join("DCIM");
        if !dcim.exists() {
            if let Err(e) = fs::create_dir_all(&dcim) {
                log::warn!("⚠️ 创建默认输出目录失败 '{}'：{}", dcim.display(), e);
                return None;
            }
        }
        Some(dcim)
    }

    fn has_resource(&self, id: ResourceId) -> bool {
        self.resources.get(&id).is_some_and(|path| path.is_file())
    }

    fn open_resource(&self, id: ResourceId) -> Result<Vec<u8>, ConvertError> {
        let path = self
            .resources
            .get(&id)
            .ok_or_else(|| ConvertError::Decode(format!("资源不存在：{}", id)))?;

        fs::read(path).map_err(|e| ConvertError::Decode(format!("无法读取资源 {}：{}", id, e)))
    }

    fn open_reference(
        &self,
        reference: &ContentReference,
    ) -> Result<Box<dyn Read + Send>, ConvertError> {
        let parsed = reqwest::Url::parse(reference.as_str())
            .map_err(|e| ConvertError::Decode(format!("内容引用格式错误：{}", e)))?;

        if parsed.scheme() != "file" {
            return Err(ConvertError::Decode(format!(
                "不支持的内容引用协议：{}",
                parsed.scheme()
            )));
        }

        let path = parsed
            .to_file_path()
            .map_err(|_| ConvertError::Decode(format!("内容引用无法映射到本地路径：{}", reference.as_str())))?;

        let file = fs::File::open(&path)
            .map_err(|e| ConvertError::Decode(format!("无法打开内容引用 '{}'：{}", path.display(), e)))?;

        Ok(Box::new(file))
    }
}
