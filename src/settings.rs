use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::converter::OutputFormat;
use crate::error::ConvertError;
use crate::fetch::FetchConfig;

/// 宿主持久化的默认转换参数。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterSettings {
    pub quality: i32,
    pub format: OutputFormat,
    pub save_result_image: bool,
    pub output_dir: Option<PathBuf>,
    pub fetch: FetchConfig,
}

impl Default for ConverterSettings {
    fn default() -> Self {
        Self {
            quality: 100,
            format: OutputFormat::Jpeg,
            save_result_image: true,
            output_dir: None,
            fetch: FetchConfig::default(),
        }
    }
}

/// 读取设置；文件缺失或内容损坏时回退到默认值。
pub fn load_settings_from_path(path: &Path) -> ConverterSettings {
    if !path.exists() {
        return ConverterSettings::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::warn!("⚠️ 读取设置文件失败 '{}'，使用默认设置: {}", path.display(), e);
            return ConverterSettings::default();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        log::warn!("⚠️ 解析设置文件失败 '{}'，使用默认设置: {}", path.display(), e);
        ConverterSettings::default()
    })
}

pub fn save_settings_to_path(path: &Path, settings: &ConverterSettings) -> Result<(), ConvertError> {
    let content = serde_json::to_string_pretty(settings)
        .map_err(|e| ConvertError::Config(format!("序列化设置失败: {}", e)))?;

    fs::write(path, content)
        .map_err(|e| ConvertError::Config(format!("写入设置文件失败 '{}': {}", path.display(), e)))
}
