//! Track file formats
//!
//! A [`TrackCodec`] turns the bytes of a remote object into a [`TrackDraft`]
//! and a local [`Track`] back into bytes. Codecs are looked up by the lower-case
//! file extension of the remote object. One of them is the export codec, used
//! for tracks that have never been uploaded.

use bytes::Bytes;
use core_library::models::{Track, TrackDraft};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Extension used for uploads unless configured otherwise.
pub const DEFAULT_EXPORT_EXTENSION: &str = "kmz";

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Malformed track file: {0}")]
    Malformed(String),

    #[error("Track file has no content")]
    Empty,

    #[error("Failed to encode track: {0}")]
    Encode(String),
}

pub trait TrackCodec: Send + Sync {
    /// Lower-case extension without the dot, e.g. `kml`
    fn extension(&self) -> &str;

    fn decode(&self, bytes: &[u8]) -> Result<TrackDraft, CodecError>;

    fn encode(&self, track: &Track) -> Result<Bytes, CodecError>;
}

#[derive(Clone)]
pub struct CodecRegistry {
    codecs: HashMap<String, Arc<dyn TrackCodec>>,
    export_extension: String,
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
            export_extension: DEFAULT_EXPORT_EXTENSION.to_string(),
        }
    }

    /// Register `codec`, replacing any codec for the same extension.
    pub fn register(mut self, codec: Arc<dyn TrackCodec>) -> Self {
        self.codecs
            .insert(codec.extension().to_ascii_lowercase(), codec);
        self
    }

    pub fn with_export_extension(mut self, extension: impl Into<String>) -> Self {
        self.export_extension = extension.into().to_ascii_lowercase();
        self
    }

    pub fn for_extension(&self, extension: &str) -> Option<Arc<dyn TrackCodec>> {
        self.codecs.get(&extension.to_ascii_lowercase()).cloned()
    }

    pub fn export_codec(&self) -> Option<Arc<dyn TrackCodec>> {
        self.for_extension(&self.export_extension)
    }

    pub fn export_extension(&self) -> &str {
        &self.export_extension
    }

    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        extensions.sort_unstable();
        extensions
    }
}
