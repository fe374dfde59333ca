//! 后备解码器注册表：进程级单次写入槽位。
//!
//! 第一次注册生效，之后的注册一律失败且不覆盖。读取无锁。

use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};

use crate::decoder::HeicDecoder;
use crate::error::ConvertError;

static GLOBAL_REGISTRY: Lazy<Arc<FallbackRegistry>> =
    Lazy::new(|| Arc::new(FallbackRegistry::new()));

/// 持有至多一个后备解码器。
#[derive(Default)]
pub struct FallbackRegistry {
    slot: OnceCell<Arc<dyn HeicDecoder>>,
}

impl FallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程共享的注册表，`HeifConverter::new` 默认使用它。
    pub fn global() -> Arc<FallbackRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// 注册后备解码器；已注册时返回配置错误，原值保持不变。
    pub fn register(&self, decoder: Arc<dyn HeicDecoder>) -> Result<(), ConvertError> {
        let name = decoder.name();
        match self.slot.set(decoder) {
            Ok(()) => {
                log::info!("✅ 后备解码器已注册: {}", name);
                Ok(())
            }
            Err(rejected) => {
                let existing = self.slot.get().map(|d| d.name()).unwrap_or("unknown");
                log::warn!(
                    "⚠️ 后备解码器重复注册被拒绝: {}（已注册: {}）",
                    rejected.name(),
                    existing
                );
                Err(ConvertError::Config(format!(
                    "后备解码器已注册（{}），不能重复注册",
                    existing
                )))
            }
        }
    }

    pub fn get(&self) -> Option<Arc<dyn HeicDecoder>> {
        self.slot.get().cloned()
    }

    pub fn is_registered(&self) -> bool {
        self.slot.get().is_some()
    }
}

impl std::fmt::Debug for FallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackRegistry")
            .field("registered", &self.slot.get().map(|d| d.name()))
            .finish()
    }
}
