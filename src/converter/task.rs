//! # 可取消的回调式转换
//!
//! ## 设计思路
//!
//! 宿主提供一个执行器句柄，转换在其上运行，完成后在同一执行器上回调。
//! 返回的 `ConversionTask` 可以取消：
//! - 进行中的下载随任务一起被丢弃，底层连接关闭；
//! - 一旦取消成功，回调保证不会再被调用。
//!
//! ## 实现思路
//!
//! 取消与投递共用一把互斥锁。任务完成后先加锁检查取消标记，再在持锁状态下投递，
//! 因此“取消成功”和“已投递”两者只可能发生其一。
//!
//! abort 只能停下异步部分，已经进入阻塞线程池的编码/写盘会继续跑完，
//! 所以取消时同时置位 `CancelToken`，阻塞步骤在编码前和写盘前看到它就放弃。

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::cancel::CancelToken;
use super::config::ConvertOptions;
use super::handler::HeifConverter;
use super::source::ConversionResult;
use crate::error::ConvertError;

#[derive(Debug, Default)]
struct TaskState {
    cancelled: bool,
    delivered: bool,
}

fn lock(state: &Mutex<TaskState>) -> MutexGuard<'_, TaskState> {
    // 回调 panic 会使锁中毒，标记位本身仍然有效
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 一次异步转换的句柄。
///
/// 丢弃句柄不会取消任务；需要取消时显式调用 [`ConversionTask::cancel`]。
#[derive(Debug)]
pub struct ConversionTask {
    state: Arc<Mutex<TaskState>>,
    token: CancelToken,
    handle: JoinHandle<()>,
}

impl ConversionTask {
    /// 取消任务。
    ///
    /// 返回 `true` 表示回调不会再被调用；返回 `false` 表示回调已经投递。
    pub fn cancel(&self) -> bool {
        let mut state = lock(&self.state);
        if state.delivered {
            return false;
        }

        if !state.cancelled {
            state.cancelled = true;
            self.token.cancel();
            self.handle.abort();
            log::info!("🛑 转换任务已取消");
        }
        true
    }

    pub fn is_cancelled(&self) -> bool {
        lock(&self.state).cancelled
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// 等待任务结束（回调已投递或任务已取消）。
    pub async fn wait(self) -> Result<(), ConvertError> {
        match self.handle.await {
            Ok(()) => Ok(()),
            Err(e) if e.is_cancelled() => Err(ConvertError::Cancelled("转换任务已被取消".to_string())),
            Err(e) => Err(ConvertError::Decode(format!("转换任务异常退出：{}", e))),
        }
    }
}

impl HeifConverter {
    /// 在 `executor` 上启动转换，完成后调用 `on_complete`。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use std::sync::Arc;
    /// use heif_converter::{ConvertOptions, HeifConverter, LocalPlatform};
    ///
    /// # async fn demo() {
    /// let converter = HeifConverter::new(Arc::new(LocalPlatform::new()));
    /// let options = ConvertOptions::builder().from_url("https://example.com/a.heic").build();
    ///
    /// let task = converter.convert_with_callback(options, &tokio::runtime::Handle::current(), |result| {
    ///     println!("{:?}", result.map(|r| r.saved_path));
    /// });
    /// task.cancel();
    /// # }
    /// ```
    pub fn convert_with_callback<F>(
        &self,
        options: ConvertOptions,
        executor: &Handle,
        on_complete: F,
    ) -> ConversionTask
    where
        F: FnOnce(Result<ConversionResult, ConvertError>) + Send + 'static,
    {
        let converter = self.clone();
        let state = Arc::new(Mutex::new(TaskState::default()));
        let task_state = Arc::clone(&state);
        let token = CancelToken::new();
        let task_token = token.clone();

        let handle = executor.spawn(async move {
            let result = converter.convert_with_token(options, task_token).await;

            let mut state = lock(&task_state);
            if state.cancelled {
                log::debug!("🛑 任务已取消，丢弃转换结果");
                return;
            }
            state.delivered = true;
            on_complete(result);
        });

        ConversionTask { state, token, handle }
    }
}
