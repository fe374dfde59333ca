//! # 下载配置
//!
//! 所有下载阶段的阈值集中在 `FetchConfig`，`Default` 提供生产可用的取值。

use serde::{Deserialize, Serialize};

/// HTTP 下载配置。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// 响应体允许的最大体积（字节）。
    pub max_file_size: u64,
    /// 整体请求超时时间（秒）。
    pub download_timeout: u64,
    /// 建立连接（TCP/TLS）超时时间（秒）。
    pub connect_timeout: u64,
    /// 首包超时时间（毫秒）。
    pub stream_first_byte_timeout_ms: u64,
    /// 分块读取超时时间（毫秒）。
    pub stream_chunk_timeout_ms: u64,
    /// 最大重定向次数。
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            download_timeout: 30,
            connect_timeout: 8,
            stream_first_byte_timeout_ms: 10_000,
            stream_chunk_timeout_ms: 15_000,
            max_redirects: 5,
        }
    }
}
