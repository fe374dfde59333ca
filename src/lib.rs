//! # HEIC/HEIF 转换库 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    宿主应用（调用方）                     │
//! │                                                          │
//! │  OptionsBuilder ──> ConvertOptions（不可变配置快照）      │
//! │        │                                                 │
//! │        ↓  convert().await / convert_blocking()           │
//! │           / convert_with_callback() -> ConversionTask     │
//! └────────┼─────────────────────────────────────────────────┘
//!          ↓
//! ┌────────┼─────────────────────────────────────────────────┐
//! │  converter ── HeifConverter（编排：校验→选后端→解码→保存）│
//! │   ├─ selector      能力等级 + 覆盖 -> BackendHandle       │
//! │   ├─ registry      后备解码器单次注册槽                   │
//! │   └─ writer        输出路径 + 编码 + 落盘                 │
//! │                                                          │
//! │  decoder ──── HeicDecoder（六个解码操作）                 │
//! │   ├─ PlatformDecoder   平台原生解码                       │
//! │   └─ ImageRsDecoder    image-rs 后备解码                  │
//! │                                                          │
//! │  fetch ────── UrlFetcher / HttpFetcher（reqwest）         │
//! │  platform ─── HostPlatform / LocalPlatform                │
//! │  settings ─── ConverterSettings（JSON 持久化）            │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `ConvertError` |
//! | [`converter`] | 输入描述、配置快照、后端选择、转换编排与异步任务 |
//! | [`decoder`] | 解码后端契约与两个内置后端 |
//! | [`fetch`] | 远程资源下载策略 |
//! | [`platform`] | 宿主平台能力（原生编解码、资源、默认目录） |
//! | [`settings`] | 默认转换参数的加载与保存 |
//!
//! ## 快速上手
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use heif_converter::{ConvertOptions, HeifConverter, LocalPlatform, OutputFormat};
//!
//! # async fn demo() -> Result<(), heif_converter::ConvertError> {
//! let platform = Arc::new(LocalPlatform::new().with_media_root("/tmp/heif"));
//! let converter = HeifConverter::new(platform);
//!
//! let options = ConvertOptions::builder()
//!     .from_file("/tmp/photo.heic")?
//!     .with_format(OutputFormat::Png)
//!     .save_result_image(true)
//!     .build();
//!
//! let result = converter.convert(options).await?;
//! println!("saved to {:?}", result.saved_path);
//! # Ok(())
//! # }
//! ```

pub mod converter;
pub mod decoder;
pub mod error;
pub mod fetch;
pub mod platform;
pub mod settings;

pub use converter::{
    BackendHandle, ContentReference, ConversionResult, ConversionTask, ConvertOptions,
    FallbackRegistry, HeifConverter, Input, InputKind, InputStream, OptionsBuilder,
    OutputFormat, Quality, ResourceId, select_backend,
};
pub use decoder::{DecodeLimits, HeicDecoder, Image, ImageRsDecoder, PlatformDecoder};
pub use error::{ConvertError, ErrorKind};
pub use fetch::{FetchConfig, HttpFetcher, UrlFetcher};
pub use platform::{CapabilityLevel, HostPlatform, LocalPlatform};
pub use settings::ConverterSettings;
