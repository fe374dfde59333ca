//! # 解码后端模块
//!
//! ## 设计思路
//!
//! `HeicDecoder` 是所有解码后端的统一契约：每种输入来源对应一个操作，
//! 编排层只依赖这个 trait，新增后端无需改动编排逻辑。
//!
//! - `PlatformDecoder`：委托宿主平台的原生解码能力
//! - `ImageRsDecoder`：基于 `image` crate 的后备解码器
//!
//! ## 实现思路
//!
//! - 五个同步操作在阻塞线程池中执行（由编排层负责调度）。
//! - `decode_url` 默认实现为“下载 → 按字节流解码”；传入 `UrlFetcher` 时使用传入的实现，
//!   否则使用后端自己的 `default_fetcher`。默认下载器首次使用时创建，之后复用同一个 HTTP 客户端。
//! - 返回 `Ok(None)` 表示后端未产出图片但也没有失败（软失败）。

mod image_rs;
mod platform;

use std::future::Future;
use std::io::Read;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::converter::{ContentReference, ResourceId};
use crate::error::ConvertError;
use crate::fetch::{FetchConfig, HttpFetcher, UrlFetcher};

pub use image_rs::{DecodeLimits, ImageRsDecoder};
pub use platform::PlatformDecoder;

/// 解码后的内存图像。
pub type Image = image::DynamicImage;

pub type DecodeOutcome = Result<Option<Image>, ConvertError>;

pub type DecodeFuture = Pin<Box<dyn Future<Output = DecodeOutcome> + Send + 'static>>;

/// HEIC 解码后端契约。
///
/// 自定义后端示例：
///
/// ```rust,ignore
/// struct LoggingDecoder(PlatformDecoder);
///
/// impl HeicDecoder for LoggingDecoder {
///     fn decode_file(&self, path: &Path) -> DecodeOutcome {
///         log::info!("decoding {}", path.display());
///         self.0.decode_file(path)
///     }
///     // ...
/// }
/// ```
pub trait HeicDecoder: Send + Sync + 'static {
    /// 后端名称，用于日志。
    fn name(&self) -> &'static str {
        "custom"
    }

    fn decode_bytes(&self, bytes: &[u8]) -> DecodeOutcome;

    fn decode_file(&self, path: &Path) -> DecodeOutcome;

    fn decode_stream(&self, stream: &mut dyn Read) -> DecodeOutcome;

    fn decode_resource(&self, id: ResourceId) -> DecodeOutcome;

    fn decode_reference(&self, reference: &ContentReference) -> DecodeOutcome;

    /// 未显式传入下载器时使用的默认实现。
    fn default_fetcher(&self) -> Result<Arc<dyn UrlFetcher>, ConvertError> {
        static DEFAULT: OnceCell<Arc<dyn UrlFetcher>> = OnceCell::new();
        DEFAULT
            .get_or_try_init(|| {
                HttpFetcher::new(FetchConfig::default()).map(|f| Arc::new(f) as Arc<dyn UrlFetcher>)
            })
            .map(Arc::clone)
    }

    /// 下载远程资源并解码。
    ///
    /// 返回的 Future 被丢弃时，进行中的下载随之中止。
    fn decode_url(self: Arc<Self>, url: String, fetcher: Option<Arc<dyn UrlFetcher>>) -> DecodeFuture {
        Box::pin(async move {
            let fetcher = match fetcher {
                Some(fetcher) => fetcher,
                None => self.default_fetcher()?,
            };

            let mut body = fetcher.fetch(&url).await?;
            run_blocking(move || self.decode_stream(&mut body)).await
        })
    }
}

/// 按配置懒加载的下载器，同一后端的多次 URL 解码共用一个 HTTP 客户端。
pub(crate) struct LazyFetcher {
    config: FetchConfig,
    cell: OnceCell<Arc<dyn UrlFetcher>>,
}

impl LazyFetcher {
    pub(crate) fn new(config: FetchConfig) -> Self {
        Self {
            config,
            cell: OnceCell::new(),
        }
    }

    pub(crate) fn get(&self) -> Result<Arc<dyn UrlFetcher>, ConvertError> {
        self.cell
            .get_or_try_init(|| {
                log::debug!("🌐 创建默认下载器（超时 {}s）", self.config.download_timeout);
                HttpFetcher::new(self.config.clone()).map(|f| Arc::new(f) as Arc<dyn UrlFetcher>)
            })
            .map(Arc::clone)
    }
}

/// 在阻塞线程池执行解码/编码/写盘等耗时操作。
pub(crate) async fn run_blocking<T, F>(work: F) -> Result<T, ConvertError>
where
    F: FnOnce() -> Result<T, ConvertError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ConvertError::Decode(format!("后台任务异常退出：{}", e)))?
}

/// 读取整个字节流。
pub(crate) fn read_stream(stream: &mut dyn Read) -> Result<Vec<u8>, ConvertError> {
    let mut bytes = Vec::new();
    stream
        .read_to_end(&mut bytes)
        .map_err(|e| ConvertError::Decode(format!("读取输入流失败：{}", e)))?;
    Ok(bytes)
}

/// 读取本地文件。
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, ConvertError> {
    std::fs::read(path)
        .map_err(|e| ConvertError::Decode(format!("无法读取图片文件 '{}'：{}", path.display(), e)))
}
