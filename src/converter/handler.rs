//! # 核心编排模块
//!
//! ## 设计思路
//!
//! `HeifConverter` 只负责流程编排，不做任何像素级工作。
//! 处理链路固定为：
//! 1. 校验输入（未设置直接失败，不触碰任何后端）
//! 2. 选择解码后端，缺少后端直接失败
//! 3. 需要保存时解析输出目录（显式目录优先，否则取平台默认目录），再按输入来源分派
//! 4. 未解码出图片时直接返回空结果
//! 5. 不保存或目录不可用时返回仅含图片的结果
//! 6. 编码并写盘，写盘失败升级为保存错误
//!
//! ## 实现思路
//!
//! - 平台能力、原生后端、后备注册表都在构造时注入，编排期间只读。
//! - 解码、编码、写盘都在阻塞线程池执行；URL 下载是普通异步请求。
//! - 阻塞步骤开始前检查取消标记，转换被取消或 Future 被丢弃后不再编码和写盘。
//! - 单次转换使用自己的配置快照，多次转换之间没有共享可变状态。
//! - 记录 `decode/save/total` 阶段耗时，便于性能诊断。

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use super::cancel::CancelToken;
use super::config::ConvertOptions;
use super::registry::FallbackRegistry;
use super::selector::{BackendHandle, select_backend};
use super::source::{ConversionResult, Input};
use super::writer::{output_path, persist};
use crate::decoder::{HeicDecoder, PlatformDecoder, run_blocking};
use crate::error::ConvertError;
use crate::fetch::{HttpFetcher, UrlFetcher};
use crate::platform::HostPlatform;

/// HEIC/HEIF 转换器。
///
/// 克隆代价很低（内部全部是 `Arc`），可在多个任务间共享。
#[derive(Clone)]
pub struct HeifConverter {
    pub(super) platform: Arc<dyn HostPlatform>,
    pub(super) native: Arc<dyn HeicDecoder>,
    pub(super) fallback: Arc<FallbackRegistry>,
}

impl HeifConverter {
    /// 使用平台原生后端与进程共享的后备注册表创建转换器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use heif_converter::{HeifConverter, LocalPlatform};
    ///
    /// let converter = HeifConverter::new(Arc::new(LocalPlatform::new()));
    /// ```
    pub fn new(platform: Arc<dyn HostPlatform>) -> Self {
        let native: Arc<dyn HeicDecoder> = Arc::new(PlatformDecoder::new(Arc::clone(&platform)));
        Self {
            platform,
            native,
            fallback: FallbackRegistry::global(),
        }
    }

    /// 替换后备注册表（测试或多租户宿主使用独立注册表）。
    pub fn with_fallback_registry(mut self, registry: Arc<FallbackRegistry>) -> Self {
        self.fallback = registry;
        self
    }

    /// 替换平台原生后端。
    pub fn with_native_decoder(mut self, decoder: Arc<dyn HeicDecoder>) -> Self {
        self.native = decoder;
        self
    }

    pub fn platform(&self) -> &Arc<dyn HostPlatform> {
        &self.platform
    }

    pub fn fallback_registry(&self) -> &Arc<FallbackRegistry> {
        &self.fallback
    }

    /// 按当前平台能力与覆盖项选择后端。
    pub fn select(&self, override_decoder: Option<Arc<dyn HeicDecoder>>) -> BackendHandle {
        select_backend(
            self.platform.capability_level(),
            override_decoder,
            &self.native,
            self.fallback.get(),
        )
    }

    /// 执行一次转换。
    ///
    /// 返回的 Future 被丢弃时转换随之终止：进行中的下载连接被关闭，
    /// 已在阻塞线程池里的步骤会在编码前或写盘前停下，不会留下输出文件。
    pub async fn convert(&self, options: ConvertOptions) -> Result<ConversionResult, ConvertError> {
        self.convert_with_token(options, CancelToken::new()).await
    }

    /// 带取消标记的转换。标记置位后，后续阻塞步骤返回 `ConvertError::Cancelled`。
    pub(super) async fn convert_with_token(
        &self,
        options: ConvertOptions,
        cancel: CancelToken,
    ) -> Result<ConversionResult, ConvertError> {
        let guard = cancel.cancel_on_drop();
        let result = self.run(options, &cancel).await;
        guard.disarm();
        result
    }

    async fn run(
        &self,
        options: ConvertOptions,
        cancel: &CancelToken,
    ) -> Result<ConversionResult, ConvertError> {
        let ConvertOptions {
            input,
            quality,
            format,
            base_name,
            save_result_image,
            output_dir,
            decoder: override_decoder,
            fetcher,
        } = options;

        if input.is_unset() {
            return Err(ConvertError::Config("未设置输入来源".to_string()));
        }

        let total_start = Instant::now();
        let kind = input.kind();

        let backend = self.select(override_decoder);
        let decoder = backend.decoder()?;
        log::debug!("🔍 解码后端: {:?}，输入来源: {}", backend, kind.as_str());

        let output_dir = if save_result_image {
            self.resolve_output_dir(output_dir).await?
        } else {
            None
        };

        let decode_start = Instant::now();
        let decoded = Self::dispatch(decoder, input, fetcher, cancel.clone()).await?;
        let decode_elapsed = decode_start.elapsed();
        cancel.check("保存")?;

        let Some(image) = decoded else {
            log::warn!(
                "⚠️ 后端未产出图片 - source={} backend={} decode={}ms",
                kind.as_str(),
                backend.label(),
                decode_elapsed.as_millis()
            );
            return Ok(ConversionResult::empty());
        };

        let Some(dir) = output_dir else {
            if save_result_image {
                log::warn!("⚠️ 无法解析默认输出目录，跳过保存");
            }
            log::info!(
                "✅ HEIC 转换完成 - source={} backend={} decode={}ms total={}ms",
                kind.as_str(),
                backend.label(),
                decode_elapsed.as_millis(),
                total_start.elapsed().as_millis()
            );
            return Ok(ConversionResult::decoded(image));
        };

        let save_start = Instant::now();
        let path = output_path(&dir, &base_name, format);
        let platform = Arc::clone(&self.platform);
        let target = path.clone();
        let token = cancel.clone();
        let image = run_blocking(move || {
            persist(platform.as_ref(), &image, &target, format, quality, &token)?;
            Ok(image)
        })
        .await?;
        let save_elapsed = save_start.elapsed();

        log::info!(
            "✅ HEIC 转换完成 - source={} backend={} decode={}ms save={}ms total={}ms -> {}",
            kind.as_str(),
            backend.label(),
            decode_elapsed.as_millis(),
            save_elapsed.as_millis(),
            total_start.elapsed().as_millis(),
            path.display()
        );

        Ok(ConversionResult::saved(image, path))
    }

    /// 阻塞式转换，供没有异步运行时的宿主使用。
    ///
    /// 在 tokio 运行时内部调用会返回配置错误，请改用 `convert().await`。
    pub fn convert_blocking(&self, options: ConvertOptions) -> Result<ConversionResult, ConvertError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ConvertError::Config(
                "不能在异步运行时内部调用阻塞式转换，请使用 convert().await".to_string(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| ConvertError::Config(format!("创建运行时失败：{}", e)))?;

        runtime.block_on(self.convert(options))
    }

    async fn resolve_output_dir(
        &self,
        explicit: Option<PathBuf>,
    ) -> Result<Option<PathBuf>, ConvertError> {
        if let Some(dir) = explicit {
            return Ok(Some(dir));
        }

        let platform = Arc::clone(&self.platform);
        run_blocking(move || Ok(platform.default_output_dir())).await
    }

    /// 按输入来源分派到后端的对应操作。
    async fn dispatch(
        decoder: Arc<dyn HeicDecoder>,
        input: Input,
        fetcher: Option<Arc<dyn UrlFetcher>>,
        cancel: CancelToken,
    ) -> Result<Option<crate::decoder::Image>, ConvertError> {
        const STAGE: &str = "解码";
        match input {
            Input::Unset => Err(ConvertError::Config("未设置输入来源".to_string())),
            Input::File(path) => {
                run_blocking(move || {
                    cancel.check(STAGE)?;
                    decoder.decode_file(&path)
                })
                .await
            }
            Input::Bytes(bytes) => {
                run_blocking(move || {
                    cancel.check(STAGE)?;
                    decoder.decode_bytes(&bytes)
                })
                .await
            }
            Input::Stream(stream) => {
                let mut reader = stream.into_inner();
                run_blocking(move || {
                    cancel.check(STAGE)?;
                    decoder.decode_stream(&mut reader)
                })
                .await
            }
            Input::Resource(id) => {
                run_blocking(move || {
                    cancel.check(STAGE)?;
                    decoder.decode_resource(id)
                })
                .await
            }
            Input::Url(url) => {
                log::debug!("🌐 远程来源: {}", HttpFetcher::redact_url_for_log(&url));
                decoder.decode_url(url, fetcher).await
            }
            Input::Reference(reference) => {
                run_blocking(move || {
                    cancel.check(STAGE)?;
                    decoder.decode_reference(&reference)
                })
                .await
            }
        }
    }
}

impl std::fmt::Debug for HeifConverter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeifConverter")
            .field("capability", &self.platform.capability_level())
            .field("native", &self.native.name())
            .field("fallback", &self.fallback)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::{ContentReference, OutputFormat, ResourceId};
    use crate::decoder::{DecodeOutcome, Image};
    use crate::platform::LocalPlatform;
    use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
    use std::io::{Cursor, Read};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::runtime::Runtime;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_fn(width, height, |x, y| image::Rgba([x as u8, y as u8, 7, 255]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .expect("failed to encode test image");
        cursor.into_inner()
    }

    /// 统计调用次数的假后端，可配置为返回空图片。
    struct Counting {
        calls: AtomicUsize,
        produce: bool,
    }

    impl Counting {
        fn new(produce: bool) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                produce,
            })
        }

        fn outcome(&self) -> DecodeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.produce {
                Ok(Some(DynamicImage::ImageRgba8(RgbaImage::new(3, 2))))
            } else {
                Ok(None)
            }
        }
    }

    impl HeicDecoder for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }
        fn decode_bytes(&self, _: &[u8]) -> DecodeOutcome {
            self.outcome()
        }
        fn decode_file(&self, _: &Path) -> DecodeOutcome {
            self.outcome()
        }
        fn decode_stream(&self, _: &mut dyn Read) -> DecodeOutcome {
            self.outcome()
        }
        fn decode_resource(&self, _: ResourceId) -> DecodeOutcome {
            self.outcome()
        }
        fn decode_reference(&self, _: &ContentReference) -> DecodeOutcome {
            self.outcome()
        }
    }

    fn converter(platform: LocalPlatform) -> HeifConverter {
        HeifConverter::new(Arc::new(platform)).with_fallback_registry(Arc::new(FallbackRegistry::new()))
    }

    #[test]
    fn unset_input_fails_before_any_backend_call() {
        let rt = Runtime::new().expect("runtime");
        let counting = Counting::new(true);
        let options = ConvertOptions::builder().with_decoder(counting.clone()).build();

        let result = rt.block_on(converter(LocalPlatform::new()).convert(options));

        assert!(matches!(result, Err(ConvertError::Config(_))));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn no_image_short_circuits_without_saving() {
        let rt = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ConvertOptions::builder()
            .from_bytes(vec![1, 2, 3])
            .expect("bytes")
            .with_decoder(Counting::new(false))
            .save_result_image(true)
            .save_to_directory(dir.path())
            .expect("dir")
            .build();

        let result = rt
            .block_on(converter(LocalPlatform::new()).convert(options))
            .expect("soft failure is not an error");

        assert!(result.image.is_none());
        assert!(result.saved_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn save_flag_off_never_writes() {
        let rt = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(4, 4))
            .expect("bytes")
            .save_to_directory(dir.path())
            .expect("dir")
            .build();

        let result = rt
            .block_on(converter(LocalPlatform::new()).convert(options))
            .expect("convert");

        assert!(result.image.is_some());
        assert!(result.saved_path.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn saves_to_platform_default_directory() {
        let rt = Runtime::new().expect("runtime");
        let root = tempfile::tempdir().expect("tempdir");
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(8, 5))
            .expect("bytes")
            .with_base_name("default_dir")
            .with_format(OutputFormat::Jpeg)
            .save_result_image(true)
            .build();

        let result = rt
            .block_on(converter(LocalPlatform::new().with_media_root(root.path())).convert(options))
            .expect("convert");

        let expected = root.path().join("DCIM").join("default_dir.jpg");
        assert_eq!(result.saved_path.as_deref(), Some(expected.as_path()));
        assert_eq!(image::open(&expected).expect("reopen").dimensions(), (8, 5));
    }

    #[test]
    fn unresolvable_default_directory_skips_save() {
        let rt = Runtime::new().expect("runtime");
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(2, 2))
            .expect("bytes")
            .save_result_image(true)
            .build();

        let result = rt
            .block_on(converter(LocalPlatform::new()).convert(options))
            .expect("convert");

        assert!(result.image.is_some());
        assert!(result.saved_path.is_none());
    }

    #[test]
    fn missing_backend_is_a_config_error() {
        let rt = Runtime::new().expect("runtime");
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(2, 2))
            .expect("bytes")
            .build();

        let result = rt.block_on(converter(LocalPlatform::new().with_capability_level(26)).convert(options));

        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[test]
    fn missing_backend_does_not_create_default_directory() {
        let rt = Runtime::new().expect("runtime");
        let root = tempfile::tempdir().expect("tempdir");
        let platform = LocalPlatform::new()
            .with_capability_level(26)
            .with_media_root(root.path());
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(2, 2))
            .expect("bytes")
            .save_result_image(true)
            .build();

        let result = rt.block_on(converter(platform).convert(options));

        assert!(matches!(result, Err(ConvertError::Config(_))));
        assert!(!root.path().join("DCIM").exists());
    }

    #[test]
    fn cancelled_token_stops_before_decode_and_save() {
        let rt = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let counting = Counting::new(true);
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(2, 2))
            .expect("bytes")
            .with_decoder(counting.clone())
            .with_base_name("x")
            .save_result_image(true)
            .save_to_directory(dir.path())
            .expect("dir")
            .build();
        let token = CancelToken::new();
        token.cancel();

        let result = rt.block_on(converter(LocalPlatform::new()).convert_with_token(options, token));

        assert!(matches!(result, Err(ConvertError::Cancelled(_))));
        assert_eq!(counting.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).expect("read dir").count(), 0);
    }

    #[test]
    fn old_platform_uses_registered_fallback() {
        let rt = Runtime::new().expect("runtime");
        let counting = Counting::new(true);
        let registry = Arc::new(FallbackRegistry::new());
        registry.register(counting.clone()).expect("register");
        let converter = HeifConverter::new(Arc::new(LocalPlatform::new().with_capability_level(28)))
            .with_fallback_registry(registry);
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(2, 2))
            .expect("bytes")
            .build();

        let result = rt.block_on(converter.convert(options)).expect("convert");

        assert_eq!(counting.calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.image.map(|i| i.dimensions()), Some((3, 2)));
    }

    #[test]
    fn every_input_kind_reaches_the_backend() {
        let rt = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("a.heic");
        std::fs::write(&file, b"x").expect("write");
        let platform = LocalPlatform::new().with_resource(9, &file);
        let counting = Counting::new(true);

        let inputs = vec![
            Input::file(&file).expect("file"),
            Input::bytes(vec![1]).expect("bytes"),
            Input::stream(Cursor::new(vec![1])),
            Input::resource(9, &platform).expect("resource"),
            Input::reference("file:///a.heic"),
        ];
        let converter = converter(platform);

        for input in inputs {
            let options = ConvertOptions::builder().input(input).with_decoder(counting.clone()).build();
            let result: Option<Image> = rt.block_on(converter.convert(options)).expect("convert").image;
            assert!(result.is_some());
        }

        assert_eq!(counting.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn blocking_form_rejects_nested_runtime() {
        let rt = Runtime::new().expect("runtime");
        let converter = converter(LocalPlatform::new());

        let result = rt.block_on(async {
            converter.convert_blocking(
                ConvertOptions::builder()
                    .from_bytes(png_bytes(2, 2))
                    .expect("bytes")
                    .build(),
            )
        });

        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[test]
    fn blocking_form_converts_outside_runtime() {
        let options = ConvertOptions::builder()
            .from_bytes(png_bytes(3, 3))
            .expect("bytes")
            .build();

        let result = converter(LocalPlatform::new())
            .convert_blocking(options)
            .expect("convert");

        assert_eq!(result.image.map(|i| i.dimensions()), Some((3, 3)));
    }
}
