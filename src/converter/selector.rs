//! 解码策略选择。
//!
//! 每次转换调用一次 `select_backend`，结果是一个带标签的后端句柄：
//! 显式指定 > 平台原生（能力满足时）> 已注册的后备解码器 > 缺失。
//! 缺失不会立即报错，在真正需要解码时才转为配置错误。

use std::sync::Arc;

use crate::decoder::HeicDecoder;
use crate::error::ConvertError;
use crate::platform::CapabilityLevel;

/// 本次转换选中的解码后端。
#[derive(Clone)]
pub enum BackendHandle {
    /// 调用方在选项中显式指定的后端。
    Override(Arc<dyn HeicDecoder>),
    /// 平台原生后端。
    Native(Arc<dyn HeicDecoder>),
    /// 已注册的后备后端。
    Fallback(Arc<dyn HeicDecoder>),
    /// 平台不支持原生解码且没有注册后备后端。
    Missing,
}

impl BackendHandle {
    /// 取出后端；`Missing` 时返回配置错误。
    pub fn decoder(&self) -> Result<Arc<dyn HeicDecoder>, ConvertError> {
        match self {
            Self::Override(decoder) | Self::Native(decoder) | Self::Fallback(decoder) => {
                Ok(Arc::clone(decoder))
            }
            Self::Missing => Err(ConvertError::Config(
                "当前平台不支持原生 HEIF 解码，且未注册后备解码器".to_string(),
            )),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Override(_) => "override",
            Self::Native(_) => "native",
            Self::Fallback(_) => "fallback",
            Self::Missing => "missing",
        }
    }
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Override(d) | Self::Native(d) | Self::Fallback(d) => {
                write!(f, "{}({})", self.label(), d.name())
            }
            Self::Missing => f.write_str("missing"),
        }
    }
}

/// 纯函数：根据能力等级与覆盖项选择后端。
pub fn select_backend(
    capability: CapabilityLevel,
    override_decoder: Option<Arc<dyn HeicDecoder>>,
    native: &Arc<dyn HeicDecoder>,
    fallback: Option<Arc<dyn HeicDecoder>>,
) -> BackendHandle {
    if let Some(decoder) = override_decoder {
        return BackendHandle::Override(decoder);
    }

    if capability.supports_native_heif() {
        return BackendHandle::Native(Arc::clone(native));
    }

    match fallback {
        Some(decoder) => BackendHandle::Fallback(decoder),
        None => BackendHandle::Missing,
    }
}
