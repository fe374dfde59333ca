//! 取消标记
//!
//! 异步任务被 abort 后，已经交给阻塞线程池的解码/编码/写盘闭包并不会停下来，
//! 所以阻塞步骤在关键节点主动检查这个共享标记。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::ConvertError;

/// 一次转换共享的取消标记，克隆后指向同一个标志位。
#[derive(Debug, Clone, Default)]
pub(crate) struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 已取消时返回 `ConvertError::Cancelled`，`stage` 写进错误信息。
    pub(crate) fn check(&self, stage: &str) -> Result<(), ConvertError> {
        if self.is_cancelled() {
            log::debug!("🛑 {}前检测到取消", stage);
            return Err(ConvertError::Cancelled(format!("转换已取消（{}前）", stage)));
        }
        Ok(())
    }

    /// 返回一个守卫，守卫被丢弃时置位取消标记。
    ///
    /// 转换 Future 正常结束时先调用 [`CancelOnDrop::disarm`]。
    pub(crate) fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop {
            token: Some(self.clone()),
        }
    }
}

pub(crate) struct CancelOnDrop {
    token: Option<CancelToken>,
}

impl CancelOnDrop {
    pub(crate) fn disarm(mut self) {
        self.token = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_passes_until_cancelled() {
        let token = CancelToken::new();
        let shared = token.clone();

        assert!(token.check("编码").is_ok());
        shared.cancel();

        assert!(matches!(token.check("编码"), Err(ConvertError::Cancelled(_))));
    }

    #[test]
    fn dropped_guard_cancels_but_disarmed_guard_does_not() {
        let dropped = CancelToken::new();
        drop(dropped.cancel_on_drop());
        assert!(dropped.is_cancelled());

        let finished = CancelToken::new();
        finished.cancel_on_drop().disarm();
        assert!(!finished.is_cancelled());
    }
}
