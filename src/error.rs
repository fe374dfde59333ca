//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 使用单一错误枚举 `ConvertError` 承载转换链路中的所有失败来源，
//! 避免字符串拼接式错误处理，同时让调用侧可按分支匹配。
//!
//! # 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `kind()` 将具体分支归入三类：配置错误 / 解码错误 / 保存错误（外加取消）。
//! - `code()` / `stage()` 输出稳定字符串，便于宿主侧做日志与埋点。
//!
//! 注意：“解码得到空图片”不是错误，而是 `ConversionResult::image == None`。

/// 转换链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// 输入未设置、目录非法、重复注册后备解码器等，立即失败、不重试。
    #[error("配置错误：{0}")]
    Config(String),

    /// 源字节损坏或格式不受支持，或后端内部失败。
    #[error("解码错误：{0}")]
    Decode(String),

    #[error("网络错误：{0}")]
    Network(String),

    #[error("超时错误：{0}")]
    Timeout(String),

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    /// 解码成功后，编码或写入磁盘失败。
    #[error("保存错误：{0}")]
    Save(String),

    #[error("已取消：{0}")]
    Cancelled(String),
}

/// 错误大类。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Decode,
    Save,
    Cancelled,
}

impl ConvertError {
    /// 归类到错误大类；网络、超时、资源限制都属于解码阶段失败。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Configuration,
            Self::Decode(_) | Self::Network(_) | Self::Timeout(_) | Self::ResourceLimit(_) => {
                ErrorKind::Decode
            }
            Self::Save(_) => ErrorKind::Save,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::Decode(_) => "E_DECODE",
            Self::Network(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Save(_) => "E_SAVE",
            Self::Cancelled(_) => "E_CANCELLED",
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) | Self::Timeout(_) => "fetch",
            Self::Decode(_) | Self::ResourceLimit(_) => "decode",
            Self::Save(_) => "save",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn is_config(&self) -> bool {
        self.kind() == ErrorKind::Configuration
    }
}
