//! Sink configuration.

use crate::backend::code;

/// Construction-time description of an `AuralSink`: which device to open,
/// optional context attributes, and the buffer queueing limits.
#[derive(Debug, Clone)]
pub struct SinkDesc {
    /// Backend device specifier (None = default device)
    pub device: Option<String>,
    /// Context mixing frequency in Hz (None = backend default)
    pub frequency: Option<u32>,
    /// Mono source count hint for the context
    pub mono_sources: Option<u32>,
    /// Stereo source count hint for the context
    pub stereo_sources: Option<u32>,
    /// Context refresh interval hint in Hz
    pub refresh: Option<u32>,
    /// Synchronous context flag
    pub sync: Option<bool>,
    /// Maximum backend buffers kept queued per source
    pub max_buffers_per_source: usize,
    /// Maximum bytes submitted per buffer (streaming chunks split at this)
    pub max_buffer_size: usize,
}

impl Default for SinkDesc {
    fn default() -> Self {
        Self {
            device: None,
            frequency: None,
            mono_sources: None,
            stereo_sources: None,
            refresh: None,
            sync: None,
            max_buffers_per_source: 10,
            max_buffer_size: 48000,
        }
    }
}

impl SinkDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn device(mut self, name: impl Into<String>) -> Self {
        self.device = Some(name.into());
        self
    }

    pub fn frequency(mut self, hz: u32) -> Self {
        self.frequency = Some(hz);
        self
    }

    pub fn mono_sources(mut self, count: u32) -> Self {
        self.mono_sources = Some(count);
        self
    }

    pub fn stereo_sources(mut self, count: u32) -> Self {
        self.stereo_sources = Some(count);
        self
    }

    pub fn refresh(mut self, hz: u32) -> Self {
        self.refresh = Some(hz);
        self
    }

    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn max_buffers_per_source(mut self, depth: usize) -> Self {
        self.max_buffers_per_source = depth;
        self
    }

    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Attribute pairs for `AudioBackend::create_context`.
    pub(crate) fn context_attrs(&self) -> Vec<(i32, i32)> {
        let mut attrs = Vec::new();
        if let Some(hz) = self.frequency {
            attrs.push((code::CTX_FREQUENCY, hz as i32));
        }
        if let Some(count) = self.mono_sources {
            attrs.push((code::CTX_MONO_SOURCES, count as i32));
        }
        if let Some(count) = self.stereo_sources {
            attrs.push((code::CTX_STEREO_SOURCES, count as i32));
        }
        if let Some(hz) = self.refresh {
            attrs.push((code::CTX_REFRESH, hz as i32));
        }
        if let Some(sync) = self.sync {
            attrs.push((code::CTX_SYNC, sync as i32));
        }
        attrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let desc = SinkDesc::default();
        assert_eq!(desc.max_buffers_per_source, 10);
        assert_eq!(desc.max_buffer_size, 48000);
        assert!(desc.context_attrs().is_empty());
    }

    #[test]
    fn test_context_attrs_only_carry_set_fields() {
        let desc = SinkDesc::new().frequency(48000).sync(true);
        assert_eq!(
            desc.context_attrs(),
            vec![(code::CTX_FREQUENCY, 48000), (code::CTX_SYNC, 1)]
        );
    }
}
