//! # 远程获取模块
//!
//! ## 设计思路
//!
//! 把“URL → 字节流”从“字节流 → 图片”中拆出来，作为独立可替换的策略。
//! 宿主可以换成带鉴权、日志或自定义 TLS 的实现，而无需改动任何解码逻辑。
//!
//! ## 实现思路
//!
//! - `UrlFetcher` 只有一个操作 `fetch`，返回可读字节流。
//! - 返回值是装箱的 `Future`，保持 trait 可作为 `dyn` 使用。
//! - 本层不做重试；需要重试时由具体实现自行负责。
//! - Future 被丢弃即视为取消，底层连接随之关闭。

mod config;
mod http;

use std::future::Future;
use std::io::Read;
use std::pin::Pin;

use crate::error::ConvertError;

pub use config::FetchConfig;
pub use http::{HttpFetcher, RequestCustomizer};

/// 下载得到的响应体字节流。
pub type FetchedStream = Box<dyn Read + Send>;

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<FetchedStream, ConvertError>> + Send + 'a>>;

/// 远程资源获取策略。
pub trait UrlFetcher: Send + Sync {
    /// 打开到 `url` 的连接并返回响应体。
    fn fetch<'a>(&'a self, url: &'a str) -> FetchFuture<'a>;
}
