//! # 转换配置模块
//!
//! ## 设计思路
//!
//! `ConvertOptions` 是单次转换的不可变配置快照，是唯一的配置来源。
//! `OptionsBuilder` 只是构造它的语法糖：每个方法消费旧值并返回新值，不存在第二份状态。
//!
//! ## 实现思路
//!
//! - 质量在写入时就钳制到 `[0, 100]`，之后读取到的一定是合法值。
//! - 输出文件名 = 基础名 + 格式扩展名；基础名默认由时间戳与进程内计数器生成。
//! - 显式输出目录在设置时校验（必须存在且是目录）；未设置时由编排层惰性解析平台默认目录。

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Local;
use serde::{Deserialize, Serialize};

use super::source::{Input, ResourceId};
use crate::decoder::HeicDecoder;
use crate::error::ConvertError;
use crate::fetch::UrlFetcher;
use crate::platform::HostPlatform;
use crate::settings::ConverterSettings;

static BASE_NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// 输出容器格式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// 文件扩展名（含点号）。
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => ".jpg",
            Self::Png => ".png",
            Self::Webp => ".webp",
        }
    }

    /// 从外部字符串解析格式，接受名称或扩展名。
    ///
    /// # 示例
    /// ```rust
    /// use heif_converter::OutputFormat;
    ///
    /// assert_eq!(OutputFormat::from_str(".png")?, OutputFormat::Png);
    /// assert_eq!(OutputFormat::from_str("JPEG")?, OutputFormat::Jpeg);
    /// # Ok::<(), heif_converter::ConvertError>(())
    /// ```
    pub fn from_str(format: &str) -> Result<Self, ConvertError> {
        match format.trim().trim_start_matches('.').to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::Webp),
            other => Err(ConvertError::Config(format!(
                "未知输出格式：{}（可选：jpeg / png / webp）",
                other
            ))),
        }
    }
}

/// 编码质量，始终位于 `[0, 100]`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: Self = Self(100);

    /// 超出范围的值会被钳制。
    pub fn new(value: i32) -> Self {
        Self(value.clamp(0, 100) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self::MAX
    }
}

/// 生成默认输出基础名，形如 `heic_20240102150405123456_7`。
pub(crate) fn generate_base_name() -> String {
    let timestamp = Local::now().format("%Y%m%d%H%M%S%6f");
    let seq = BASE_NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("heic_{}_{}", timestamp, seq)
}

fn validate_directory(path: &Path) -> Result<(), ConvertError> {
    if !path.exists() {
        return Err(ConvertError::Config(format!("输出目录不存在：{}", path.display())));
    }
    if !path.is_dir() {
        return Err(ConvertError::Config(format!("输出路径不是目录：{}", path.display())));
    }
    Ok(())
}

/// 单次转换的不可变配置快照。
pub struct ConvertOptions {
    pub(crate) input: Input,
    pub(crate) quality: Quality,
    pub(crate) format: OutputFormat,
    pub(crate) base_name: String,
    pub(crate) save_result_image: bool,
    pub(crate) output_dir: Option<PathBuf>,
    pub(crate) decoder: Option<Arc<dyn HeicDecoder>>,
    pub(crate) fetcher: Option<Arc<dyn UrlFetcher>>,
}

impl ConvertOptions {
    /// 以默认参数包装一个输入来源。
    pub fn new(input: Input) -> Self {
        Self {
            input,
            quality: Quality::default(),
            format: OutputFormat::default(),
            base_name: generate_base_name(),
            save_result_image: false,
            output_dir: None,
            decoder: None,
            fetcher: None,
        }
    }

    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::new()
    }

    pub fn input(&self) -> &Input {
        &self.input
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn save_result_image(&self) -> bool {
        self.save_result_image
    }

    pub fn output_dir(&self) -> Option<&Path> {
        self.output_dir.as_deref()
    }

    /// 输出文件名（基础名 + 扩展名）。
    pub fn output_file_name(&self) -> String {
        format!("{}{}", self.base_name, self.format.extension())
    }
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self::new(Input::Unset)
    }
}

impl fmt::Debug for ConvertOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConvertOptions")
            .field("input", &self.input)
            .field("quality", &self.quality)
            .field("format", &self.format)
            .field("base_name", &self.base_name)
            .field("save_result_image", &self.save_result_image)
            .field("output_dir", &self.output_dir)
            .field("decoder", &self.decoder.as_ref().map(|d| d.name()))
            .field("fetcher", &self.fetcher.is_some())
            .finish()
    }
}

/// `ConvertOptions` 的链式构造器。
///
/// # 示例
/// ```rust,no_run
/// use heif_converter::{ConvertOptions, OutputFormat};
///
/// let options = ConvertOptions::builder()
///     .from_url("https://example.com/a.heic")
///     .with_format(OutputFormat::Webp)
///     .with_quality(85)
///     .save_result_image(true)
///     .save_to_directory("/tmp")?
///     .build();
/// # Ok::<(), heif_converter::ConvertError>(())
/// ```
#[derive(Debug, Default)]
pub struct OptionsBuilder {
    options: ConvertOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以持久化的默认参数作为起点。
    pub fn from_settings(settings: &ConverterSettings) -> Result<Self, ConvertError> {
        let mut builder = Self::new()
            .with_quality(settings.quality)
            .with_format(settings.format)
            .save_result_image(settings.save_result_image);

        if let Some(dir) = &settings.output_dir {
            builder = builder.save_to_directory(dir)?;
        }

        Ok(builder)
    }

    pub fn input(mut self, input: Input) -> Self {
        self.options.input = input;
        self
    }

    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        Ok(self.input(Input::file(path)?))
    }

    pub fn from_bytes(self, data: impl Into<Vec<u8>>) -> Result<Self, ConvertError> {
        Ok(self.input(Input::bytes(data)?))
    }

    pub fn from_stream(self, reader: impl std::io::Read + Send + 'static) -> Self {
        self.input(Input::stream(reader))
    }

    pub fn from_resource(
        self,
        id: ResourceId,
        platform: &dyn HostPlatform,
    ) -> Result<Self, ConvertError> {
        Ok(self.input(Input::resource(id, platform)?))
    }

    pub fn from_url(self, url: impl Into<String>) -> Self {
        self.input(Input::url(url))
    }

    pub fn from_reference(self, uri: impl Into<String>) -> Self {
        self.input(Input::reference(uri))
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.options.quality = Quality::new(quality);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.options.format = format;
        self
    }

    pub fn with_base_name(mut self, name: impl Into<String>) -> Self {
        self.options.base_name = name.into();
        self
    }

    pub fn save_result_image(mut self, save: bool) -> Self {
        self.options.save_result_image = save;
        self
    }

    /// 指定输出目录，目录必须已存在。
    pub fn save_to_directory(mut self, dir: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let dir = dir.as_ref();
        validate_directory(dir)?;
        self.options.output_dir = Some(dir.to_path_buf());
        Ok(self)
    }

    /// 显式指定解码后端，优先级高于能力检测。
    pub fn with_decoder(mut self, decoder: Arc<dyn HeicDecoder>) -> Self {
        self.options.decoder = Some(decoder);
        self
    }

    /// 显式指定 URL 下载器，仅对远程来源生效。
    pub fn with_fetcher(mut self, fetcher: Arc<dyn UrlFetcher>) -> Self {
        self.options.fetcher = Some(fetcher);
        self
    }

    pub fn build(self) -> ConvertOptions {
        self.options
    }
}
