//! Aural: a real-time spatial audio playback engine.
//!
//! Applications describe a listener and any number of sound sources, queue
//! buffered or streaming PCM chunks on them, and call [`AuralSink::update`]
//! once per frame. The sink lazily binds scarce backend ids, flushes only the
//! parameters that changed, and keeps every source's backend buffer queue
//! filled without exceeding a bounded depth. The native backend is pluggable
//! behind the [`backend::AudioBackend`] trait.

pub mod alloc;
pub mod backend;
pub mod config;
pub mod error;
pub mod math;
pub mod params;
mod queue;
pub mod sink;
pub mod sound;
pub mod world;

pub use backend::{AudioBackend, BufferFormat, SourceState};
pub use config::SinkDesc;
pub use error::{AuralError, BackendErrorKind, Result};
pub use math::{Orientation, Vec3};
pub use params::{ListenerParam, ParamKind, ParamValue, SourceParam};
pub use sink::AuralSink;
pub use sound::{
    AuralSoundData, AuralStreamingSound, LoadOptions, load_sound_file, load_sound_file_simple,
};
pub use world::{AuralListener, AuralSource};
