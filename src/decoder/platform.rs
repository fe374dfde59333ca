//! 平台原生解码后端。
//!
//! 所有来源先归一为字节，再交给 `HostPlatform::decode_native`。

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use super::{DecodeOutcome, HeicDecoder, LazyFetcher, read_file, read_stream};
use crate::converter::{ContentReference, ResourceId};
use crate::error::ConvertError;
use crate::fetch::{FetchConfig, UrlFetcher};
use crate::platform::HostPlatform;

/// 使用宿主平台原生编解码能力的后端。
pub struct PlatformDecoder {
    platform: Arc<dyn HostPlatform>,
    fetcher: LazyFetcher,
}

impl PlatformDecoder {
    pub fn new(platform: Arc<dyn HostPlatform>) -> Self {
        Self {
            platform,
            fetcher: LazyFetcher::new(FetchConfig::default()),
        }
    }

    pub fn with_fetch_config(mut self, config: FetchConfig) -> Self {
        self.fetcher = LazyFetcher::new(config);
        self
    }
}

impl HeicDecoder for PlatformDecoder {
    fn name(&self) -> &'static str {
        "platform"
    }

    fn decode_bytes(&self, bytes: &[u8]) -> DecodeOutcome {
        self.platform.decode_native(bytes)
    }

    fn decode_file(&self, path: &Path) -> DecodeOutcome {
        let bytes = read_file(path)?;
        self.decode_bytes(&bytes)
    }

    fn decode_stream(&self, stream: &mut dyn Read) -> DecodeOutcome {
        let bytes = read_stream(stream)?;
        self.decode_bytes(&bytes)
    }

    fn decode_resource(&self, id: ResourceId) -> DecodeOutcome {
        let bytes = self.platform.open_resource(id)?;
        self.decode_bytes(&bytes)
    }

    fn decode_reference(&self, reference: &ContentReference) -> DecodeOutcome {
        let mut stream = self.platform.open_reference(reference)?;
        self.decode_stream(&mut stream)
    }

    fn default_fetcher(&self) -> Result<Arc<dyn UrlFetcher>, ConvertError> {
        self.fetcher.get()
    }
}
