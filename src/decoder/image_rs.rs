//! # image-rs 后备解码后端
//!
//! ## 设计思路
//!
//! 平台原生解码不可用时使用的第三方解码器。
//! 优先做签名与尺寸检查，再进行完整解码，降低异常输入触发高内存开销的风险。
//!
//! ## 实现思路
//!
//! 1. 通过文件签名（`infer`）确认输入是图片
//! 2. 只读 header 获取宽高，按像素与内存上限快速拒绝
//! 3. 完整解码
//!
//! 与平台后端不同，这里无法识别的输入直接报错而不是返回空图片。

use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use image::GenericImageView;

use super::{DecodeOutcome, HeicDecoder, Image, LazyFetcher, read_file, read_stream};
use crate::converter::{ContentReference, FallbackRegistry, ResourceId};
use crate::error::ConvertError;
use crate::fetch::{FetchConfig, UrlFetcher};
use crate::platform::HostPlatform;

/// 解码阶段的资源上限。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// 解码后的像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 按 RGBA 估算的解码内存上限（字节）。
    pub max_decoded_bytes: u64,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
        }
    }
}

/// 基于 `image` crate 的后备解码器。
pub struct ImageRsDecoder {
    platform: Arc<dyn HostPlatform>,
    limits: DecodeLimits,
    fetcher: LazyFetcher,
}

impl ImageRsDecoder {
    /// `platform` 仅用于解析内置资源与内容引用。
    pub fn new(platform: Arc<dyn HostPlatform>) -> Self {
        Self {
            platform,
            limits: DecodeLimits::default(),
            fetcher: LazyFetcher::new(FetchConfig::default()),
        }
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetcher = LazyFetcher::new(config);
        self
    }

    /// 把自身注册为后备解码器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use heif_converter::{FallbackRegistry, ImageRsDecoder, LocalPlatform};
    ///
    /// let platform = Arc::new(LocalPlatform::new());
    /// ImageRsDecoder::new(platform).install(&FallbackRegistry::global())?;
    /// # Ok::<(), heif_converter::ConvertError>(())
    /// ```
    pub fn install(self, registry: &FallbackRegistry) -> Result<(), ConvertError> {
        registry.register(Arc::new(self))
    }

    /// 仅通过图片头信息读取宽高。
    fn inspect_dimensions(bytes: &[u8]) -> Result<(u32, u32), ConvertError> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ConvertError::Decode(format!("无法识别图片格式：{}", e)))?
            .into_dimensions()
            .map_err(|e| ConvertError::Decode(format!("无法读取图片尺寸：{}", e)))
    }

    fn validate_limits(&self, width: u32, height: u32) -> Result<(), ConvertError> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ConvertError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > self.limits.max_decoded_pixels {
            return Err(ConvertError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.limits.max_decoded_pixels
            )));
        }

        let estimated = pixels
            .checked_mul(4)
            .ok_or_else(|| ConvertError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > self.limits.max_decoded_bytes {
            return Err(ConvertError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                self.limits.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }

    /// 通过文件签名（magic bytes）校验输入是否为图片。
    fn validate_image_signature(bytes: &[u8]) -> Result<(), ConvertError> {
        if bytes.is_empty() {
            return Err(ConvertError::Decode("图片内容为空".to_string()));
        }

        let kind = infer::get(bytes)
            .ok_or_else(|| ConvertError::Decode("无法识别图片类型".to_string()))?;

        if kind.matcher_type() != infer::MatcherType::Image {
            return Err(ConvertError::Decode(format!(
                "文件签名不是图片类型：{}",
                kind.mime_type()
            )));
        }

        Ok(())
    }

    fn decode_checked(&self, bytes: &[u8]) -> Result<Image, ConvertError> {
        Self::validate_image_signature(bytes)?;

        let (width, height) = Self::inspect_dimensions(bytes)?;
        self.validate_limits(width, height)?;

        let decoded = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| ConvertError::Decode(format!("无法识别图片格式：{}", e)))?
            .decode()
            .map_err(|e| ConvertError::Decode(format!("图片解码失败：{}", e)))?;

        let (decoded_width, decoded_height) = decoded.dimensions();
        log::debug!(
            "✅ image-rs 解码成功 - header: {}x{} 输出: {}x{}",
            width,
            height,
            decoded_width,
            decoded_height
        );

        Ok(decoded)
    }
}

impl HeicDecoder for ImageRsDecoder {
    fn name(&self) -> &'static str {
        "image-rs"
    }

    fn decode_bytes(&self, bytes: &[u8]) -> DecodeOutcome {
        self.decode_checked(bytes).map(Some)
    }

    fn decode_file(&self, path: &Path) -> DecodeOutcome {
        let bytes = read_file(path)?;
        self.decode_bytes(&bytes)
    }

    fn decode_stream(&self, stream: &mut dyn Read) -> DecodeOutcome {
        let bytes = read_stream(stream)?;
        self.decode_bytes(&bytes)
    }

    fn decode_resource(&self, id: ResourceId) -> DecodeOutcome {
        let bytes = self.platform.open_resource(id)?;
        self.decode_bytes(&bytes)
    }

    fn decode_reference(&self, reference: &ContentReference) -> DecodeOutcome {
        let mut stream = self.platform.open_reference(reference)?;
        self.decode_stream(&mut stream)
    }

    fn default_fetcher(&self) -> Result<Arc<dyn UrlFetcher>, ConvertError> {
        self.fetcher.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::LocalPlatform;
    use image::{DynamicImage, ImageBuffer, Rgba};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, image::ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    fn decoder() -> ImageRsDecoder {
        ImageRsDecoder::new(Arc::new(LocalPlatform::new()))
    }

    #[test]
    fn decodes_valid_png() {
        let image = decoder()
            .decode_bytes(&png_bytes(32, 20))
            .expect("decode should succeed")
            .expect("image expected");

        assert_eq!(image.dimensions(), (32, 20));
    }

    #[test]
    fn rejects_non_image_payload() {
        let result = decoder().decode_bytes(b"<html><body>not an image</body></html>");

        assert!(matches!(result, Err(ConvertError::Decode(_))));
    }

    #[test]
    fn rejects_too_many_pixels_before_full_decode() {
        let decoder = decoder().with_limits(DecodeLimits {
            max_decoded_pixels: 1_000,
            ..DecodeLimits::default()
        });

        let result = decoder.decode_bytes(&png_bytes(100, 100));

        assert!(matches!(result, Err(ConvertError::ResourceLimit(_))));
    }

    #[test]
    fn rejects_decoded_memory_over_budget() {
        let decoder = decoder().with_limits(DecodeLimits {
            max_decoded_pixels: u64::MAX,
            max_decoded_bytes: 1024,
        });

        let result = decoder.decode_bytes(&png_bytes(64, 64));

        assert!(matches!(result, Err(ConvertError::ResourceLimit(_))));
    }

    #[test]
    fn reconfigured_fetcher_is_shared_across_calls() {
        let config = FetchConfig {
            download_timeout: 5,
            ..FetchConfig::default()
        };
        let decoder = decoder().with_fetch_config(config);

        let first = decoder.default_fetcher().expect("first fetcher");
        let second = decoder.default_fetcher().expect("second fetcher");

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn install_registers_once() {
        let registry = FallbackRegistry::new();

        decoder().install(&registry).expect("first install should succeed");
        let second = decoder().install(&registry);

        assert!(matches!(second, Err(ConvertError::Config(_))));
        assert_eq!(registry.get().expect("fallback present").name(), "image-rs");
    }
}
