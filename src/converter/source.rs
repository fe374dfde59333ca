//! # 输入来源与结果模型
//!
//! ## 设计思路
//!
//! 将“外部输入类型”和“转换结果”解耦：
//! - `Input` 表示源字节从哪里来（七个封闭分支，单次转换只有一个生效）
//! - `ConversionResult` 表示转换输出（解码图片 + 可选保存路径）
//!
//! 文件存在性、字节非空、资源 id 有效性都在构造时立即校验，尽早失败。
//! 远程 URL 与内容引用不做预校验，到解码阶段才解析。

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::decoder::Image;
use crate::error::ConvertError;
use crate::platform::HostPlatform;

/// 宿主资源表中的资源标识。
pub type ResourceId = u32;

/// 由宿主平台解析的不透明内容引用（URI 形式）。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentReference(String);

impl ContentReference {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// 一次性可读字节流，调用方负责其生命周期，最多被消费一次。
pub struct InputStream(Box<dyn Read + Send>);

impl InputStream {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self(Box::new(reader))
    }

    pub fn into_inner(self) -> Box<dyn Read + Send> {
        self.0
    }
}

impl fmt::Debug for InputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InputStream(..)")
    }
}

/// 图片输入来源。
#[derive(Default)]
pub enum Input {
    /// 未设置；执行转换时立即以配置错误失败。
    #[default]
    Unset,
    /// 本地文件路径。
    File(PathBuf),
    /// 内存字节（非空）。
    Bytes(Vec<u8>),
    /// 一次性字节流。
    Stream(InputStream),
    /// 宿主内置资源。
    Resource(ResourceId),
    /// 远程地址。
    Url(String),
    /// 不透明内容引用。
    Reference(ContentReference),
}

/// `Input` 的分支标签，用于日志与诊断。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Unset,
    File,
    Bytes,
    Stream,
    Resource,
    Url,
    Reference,
}

impl InputKind {
    pub const ALL: [InputKind; 7] = [
        InputKind::Unset,
        InputKind::File,
        InputKind::Bytes,
        InputKind::Stream,
        InputKind::Resource,
        InputKind::Url,
        InputKind::Reference,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::File => "file",
            Self::Bytes => "bytes",
            Self::Stream => "stream",
            Self::Resource => "resource",
            Self::Url => "url",
            Self::Reference => "reference",
        }
    }
}

impl Input {
    /// 本地文件来源，要求文件存在且可读。
    pub fn file(path: impl AsRef<Path>) -> Result<Self, ConvertError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConvertError::Config(format!(
                "HEIC 文件不存在：{}",
                path.display()
            )));
        }

        File::open(path).map_err(|e| {
            ConvertError::Config(format!("HEIC 文件不可读 '{}'：{}", path.display(), e))
        })?;

        Ok(Self::File(path.to_path_buf()))
    }

    /// 内存字节来源，空字节直接拒绝。
    pub fn bytes(data: impl Into<Vec<u8>>) -> Result<Self, ConvertError> {
        let data = data.into();
        if data.is_empty() {
            return Err(ConvertError::Config("输入字节为空".to_string()));
        }
        Ok(Self::Bytes(data))
    }

    pub fn stream(reader: impl Read + Send + 'static) -> Self {
        Self::Stream(InputStream::new(reader))
    }

    /// 内置资源来源，要求资源 id 在宿主资源表中存在。
    pub fn resource(id: ResourceId, platform: &dyn HostPlatform) -> Result<Self, ConvertError> {
        if !platform.has_resource(id) {
            return Err(ConvertError::Config(format!("资源不存在：{}", id)));
        }
        Ok(Self::Resource(id))
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    pub fn reference(uri: impl Into<String>) -> Self {
        Self::Reference(ContentReference::new(uri))
    }

    pub fn kind(&self) -> InputKind {
        match self {
            Self::Unset => InputKind::Unset,
            Self::File(_) => InputKind::File,
            Self::Bytes(_) => InputKind::Bytes,
            Self::Stream(_) => InputKind::Stream,
            Self::Resource(_) => InputKind::Resource,
            Self::Url(_) => InputKind::Url,
            Self::Reference(_) => InputKind::Reference,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl fmt::Debug for Input {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => f.write_str("Unset"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
            Self::Stream(stream) => f.debug_tuple("Stream").field(stream).finish(),
            Self::Resource(id) => f.debug_tuple("Resource").field(id).finish(),
            Self::Url(url) => f.debug_tuple("Url").field(url).finish(),
            Self::Reference(reference) => f.debug_tuple("Reference").field(reference).finish(),
        }
    }
}

/// 转换结果。
///
/// - `image == None`：后端未产出图片（软失败）
/// - `saved_path == None`：未要求保存、目录无法解析或未解码出图片
#[derive(Debug, Clone, Default)]
pub struct ConversionResult {
    pub image: Option<Image>,
    pub saved_path: Option<PathBuf>,
}

impl ConversionResult {
    pub(crate) fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn decoded(image: Image) -> Self {
        Self {
            image: Some(image),
            saved_path: None,
        }
    }

    pub(crate) fn saved(image: Image, path: PathBuf) -> Self {
        Self {
            image: Some(image),
            saved_path: Some(path),
        }
    }
}
