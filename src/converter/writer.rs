//! 结果落盘
//!
//! 目标路径 = 输出目录 + 基础名 + 格式扩展名。
//! 编码与写入任一步失败都升级为 `ConvertError::Save`，这是转换链路里唯一不降级的失败。
//! 编码前、写入前各检查一次取消标记，已取消时不产生输出文件。

use std::fs;
use std::path::{Path, PathBuf};

use super::cancel::CancelToken;
use super::config::{OutputFormat, Quality};
use crate::decoder::Image;
use crate::error::ConvertError;
use crate::platform::HostPlatform;

/// 计算输出文件路径。
pub(crate) fn output_path(dir: &Path, base_name: &str, format: OutputFormat) -> PathBuf {
    dir.join(format!("{}{}", base_name, format.extension()))
}

/// 编码并写入磁盘，返回写入的字节数。
pub(crate) fn persist(
    platform: &dyn HostPlatform,
    image: &Image,
    path: &Path,
    format: OutputFormat,
    quality: Quality,
    cancel: &CancelToken,
) -> Result<usize, ConvertError> {
    cancel.check("编码")?;
    let encoded = platform.encode(image, format, quality)?;

    cancel.check("写盘")?;
    fs::write(path, &encoded)
        .map_err(|e| ConvertError::Save(format!("写入文件 '{}' 失败：{}", path.display(), e)))?;

    log::debug!(
        "💾 已写入 {}（{:?}，质量 {}，{} 字节）",
        path.display(),
        format,
        quality.value(),
        encoded.len()
    );

    Ok(encoded.len())
}
