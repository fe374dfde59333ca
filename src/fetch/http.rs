//! # HTTP 下载实现
//!
//! ## 设计思路
//!
//! 默认的 `UrlFetcher`，基于复用型 `reqwest::Client`。
//! 目标是尽快失败：状态码、声明体积、实际体积都在下载过程中校验。
//!
//! ## 实现思路
//!
//! - 协议校验：仅允许 HTTP/HTTPS。
//! - 首包与分块分别设置读取超时，避免慢速连接无限挂起。
//! - 请求可通过 `RequestCustomizer` 追加请求头或鉴权信息。
//! - 网络错误统一映射到 `ConvertError`，日志中的 URL 去掉 query 与 fragment。

use std::sync::Arc;
use std::time::Duration;

use bytes::Buf;

use super::{FetchConfig, FetchFuture, FetchedStream, UrlFetcher};
use crate::error::ConvertError;

const BUFFER_INITIAL_CAPACITY: usize = 16 * 1024;

/// 发送前对请求做定制（追加请求头、鉴权等）。
pub type RequestCustomizer =
    Arc<dyn Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync>;

/// 基于 `reqwest` 的下载器。
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    config: FetchConfig,
    customizer: Option<RequestCustomizer>,
}

impl std::fmt::Debug for HttpFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetcher")
            .field("config", &self.config)
            .field("customized", &self.customizer.is_some())
            .finish()
    }
}

impl HttpFetcher {
    /// 根据配置创建下载器。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use heif_converter::{FetchConfig, HttpFetcher};
    ///
    /// let fetcher = HttpFetcher::new(FetchConfig::default())?
    ///     .with_request_customizer(|req| req.bearer_auth("token"));
    /// # Ok::<(), heif_converter::ConvertError>(())
    /// ```
    pub fn new(config: FetchConfig) -> Result<Self, ConvertError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout))
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| ConvertError::Network(format!("无法创建 HTTP 客户端：{}", e)))?;

        Ok(Self {
            client,
            config,
            customizer: None,
        })
    }

    pub fn with_request_customizer<F>(mut self, customizer: F) -> Self
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync + 'static,
    {
        self.customizer = Some(Arc::new(customizer));
        self
    }

    /// 下载完整响应体。
    ///
    /// 使用分块读取，逐块校验体积上限。
    pub async fn download(&self, url: &str) -> Result<Vec<u8>, ConvertError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| ConvertError::Network(format!("URL 格式错误：{}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConvertError::Network(format!(
                "仅支持 HTTP/HTTPS：{}",
                parsed.scheme()
            )));
        }

        log::info!("🌐 开始下载图片 - URL: {}", Self::redact_url_for_log(url));

        let mut request = self.client.get(parsed);
        if let Some(customizer) = &self.customizer {
            request = customizer(request);
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e, url))?;

        if !response.status().is_success() {
            return Err(ConvertError::Network(format!(
                "HTTP {}: {}",
                response.status().as_u16(),
                Self::status_message(response.status().as_u16())
            )));
        }

        let total_len = response.content_length();
        if let Some(size) = total_len {
            if size > self.config.max_file_size {
                return Err(ConvertError::ResourceLimit(format!(
                    "文件过大：{:.2} MB（限制：{:.2} MB）",
                    size as f64 / 1024.0 / 1024.0,
                    self.config.max_file_size as f64 / 1024.0 / 1024.0
                )));
            }
        }

        let initial_capacity = total_len
            .map(|len| len.min(self.config.max_file_size).min(usize::MAX as u64) as usize)
            .filter(|len| *len > 0)
            .unwrap_or(BUFFER_INITIAL_CAPACITY);
        let mut buffer = Vec::with_capacity(initial_capacity);
        let mut total: u64 = 0;
        let mut received_first_chunk = false;

        loop {
            let read_timeout = if received_first_chunk {
                Duration::from_millis(self.config.stream_chunk_timeout_ms)
            } else {
                Duration::from_millis(self.config.stream_first_byte_timeout_ms)
            };

            let next_chunk = tokio::time::timeout(read_timeout, response.chunk())
                .await
                .map_err(|_| {
                    if received_first_chunk {
                        ConvertError::Timeout("下载数据流读取超时".to_string())
                    } else {
                        ConvertError::Timeout("下载首包超时".to_string())
                    }
                })?;

            let Some(chunk) = next_chunk.map_err(|e| self.map_reqwest_error(e, url))? else {
                break;
            };

            received_first_chunk = true;
            total = total.saturating_add(chunk.len() as u64);
            if total > self.config.max_file_size {
                return Err(ConvertError::ResourceLimit("下载后文件超过大小限制".to_string()));
            }
            buffer.extend_from_slice(&chunk);
        }

        log::debug!("✅ 下载完成 - {} bytes", total);
        Ok(buffer)
    }

    pub(crate) fn redact_url_for_log(url: &str) -> String {
        let Ok(parsed) = reqwest::Url::parse(url) else {
            return "<invalid-url>".to_string();
        };

        let host = parsed.host_str().unwrap_or("<unknown-host>");
        let port = parsed.port().map(|p| format!(":{}", p)).unwrap_or_default();

        format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
    }

    /// 统一映射 reqwest 错误到业务错误。
    fn map_reqwest_error(&self, e: reqwest::Error, url: &str) -> ConvertError {
        let err_msg = e.to_string().replace(url, &Self::redact_url_for_log(url));

        if e.is_timeout() {
            ConvertError::Timeout(format!("下载超时（{}秒）", self.config.download_timeout))
        } else if e.is_connect() {
            ConvertError::Network(format!("无法连接：{}", err_msg))
        } else {
            ConvertError::Network(format!("请求失败：{}", err_msg))
        }
    }

    fn status_message(code: u16) -> &'static str {
        match code {
            404 => "未找到",
            401 | 403 => "访问被拒绝",
            500..=599 => "服务器错误",
            _ => "请求失败",
        }
    }
}

impl UrlFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a> {
        Box::pin(async move {
            let body = self.download(url).await?;
            Ok(Box::new(bytes::Bytes::from(body).reader()) as FetchedStream)
        })
    }
}
