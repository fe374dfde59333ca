//! # 转换模块（converter）
//!
//! ## 设计思路
//!
//! 该模块将“输入描述 → 配置快照 → 后端选择 → 解码分派 → 落盘 → 结果组装”
//! 按职责拆分为多个子模块：
//!
//! - `source`：输入来源枚举与转换结果
//! - `config`：输出格式、质量、不可变配置快照及其构造器
//! - `selector`：根据能力等级与覆盖项选择后端（纯函数）
//! - `registry`：后备解码器的单次写入注册表
//! - `writer`：输出路径计算、编码与写盘
//! - `handler`：编排整条转换链路
//! - `task`：可取消的回调式转换
//! - `cancel`：阻塞步骤共享的取消标记
//!
//! ## 新同事快速上手
//!
//! ```text
//! OptionsBuilder ──> ConvertOptions
//!    ↓
//! handler.rs（HeifConverter::convert，阶段耗时日志）
//!    ├─ selector.rs（override / native / fallback / missing）
//!    ├─ decoder::HeicDecoder（按 Input 分支调用对应操作）
//!    └─ writer.rs（编码 + 写盘，失败升级为保存错误）
//!    ↓
//! ConversionResult { image, saved_path }
//! ```
//!
//! - 新增输入来源：先改 `source.rs` 的 `Input`，编译器会指出 `handler.rs` 里需要补的分支
//! - 后端选择规则变更：只改 `selector.rs`
//! - 输出命名或写盘策略变更：改 `config.rs` / `writer.rs`

mod cancel;
mod config;
mod handler;
mod registry;
mod selector;
mod source;
mod task;
mod writer;

pub use config::{ConvertOptions, OptionsBuilder, OutputFormat, Quality};
pub use handler::HeifConverter;
pub use registry::FallbackRegistry;
pub use selector::{BackendHandle, select_backend};
pub use source::{ContentReference, ConversionResult, Input, InputKind, InputStream, ResourceId};
pub use task::ConversionTask;
