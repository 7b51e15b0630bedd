//! Enumerated parameters and per-object property stores.
//!
//! Each parameter kind carries its arity/type and raw backend code in a
//! static table; optional backend capabilities are added at runtime through
//! the extension registry after a one-time capability check.

use crate::backend::{AudioBackend, code};
use crate::error::{AuralError, Result};
use crate::math::Vec3;
use std::collections::HashMap;

/// Arity and element type of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Float,
    Int,
    Bool,
    Vec3,
    Floats6,
}

/// A parameter value as held by a property store.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Float(f32),
    Int(i32),
    Bool(bool),
    Vec3(Vec3),
    Floats6([f32; 6]),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Float(_) => ParamKind::Float,
            Self::Int(_) => ParamKind::Int,
            Self::Bool(_) => ParamKind::Bool,
            Self::Vec3(_) => ParamKind::Vec3,
            Self::Floats6(_) => ParamKind::Floats6,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vec3(v) => Some(*v),
            _ => None,
        }
    }
}

/// A runtime-registered extension parameter: the raw backend code plus the
/// value kind it was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExtParam {
    pub code: i32,
    pub kind: ParamKind,
}

/// Key behavior shared by `SourceParam` and `ListenerParam`.
pub trait ParamKey: Copy + Eq + std::hash::Hash {
    fn kind(self) -> ParamKind;
    fn code(self) -> i32;
    fn name(self) -> &'static str;
}

/// Source parameters understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceParam {
    Pitch,
    Gain,
    MaxDistance,
    RolloffFactor,
    ReferenceDistance,
    MinGain,
    MaxGain,
    ConeOuterGain,
    ConeInnerAngle,
    ConeOuterAngle,
    Position,
    Velocity,
    Direction,
    SourceRelative,
    Looping,
    SecOffset,
    SampleOffset,
    ByteOffset,
    Extension(ExtParam),
}

impl SourceParam {
    /// The enumerated (non-extension) parameter set, in flush/refresh order.
    pub const ALL: &'static [SourceParam] = &[
        Self::Pitch,
        Self::Gain,
        Self::MaxDistance,
        Self::RolloffFactor,
        Self::ReferenceDistance,
        Self::MinGain,
        Self::MaxGain,
        Self::ConeOuterGain,
        Self::ConeInnerAngle,
        Self::ConeOuterAngle,
        Self::Position,
        Self::Velocity,
        Self::Direction,
        Self::SourceRelative,
        Self::Looping,
        Self::SecOffset,
        Self::SampleOffset,
        Self::ByteOffset,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let param = match name {
            "pitch" => Self::Pitch,
            "gain" => Self::Gain,
            "max_distance" => Self::MaxDistance,
            "rolloff_factor" => Self::RolloffFactor,
            "reference_distance" => Self::ReferenceDistance,
            "min_gain" => Self::MinGain,
            "max_gain" => Self::MaxGain,
            "cone_outer_gain" => Self::ConeOuterGain,
            "cone_inner_angle" => Self::ConeInnerAngle,
            "cone_outer_angle" => Self::ConeOuterAngle,
            "position" => Self::Position,
            "velocity" => Self::Velocity,
            "direction" => Self::Direction,
            "source_relative" => Self::SourceRelative,
            "looping" => Self::Looping,
            "sec_offset" => Self::SecOffset,
            "sample_offset" => Self::SampleOffset,
            "byte_offset" => Self::ByteOffset,
            _ => return None,
        };
        Some(param)
    }
}

impl ParamKey for SourceParam {
    fn kind(self) -> ParamKind {
        match self {
            Self::Position | Self::Velocity | Self::Direction => ParamKind::Vec3,
            Self::SourceRelative | Self::Looping => ParamKind::Bool,
            Self::Extension(ext) => ext.kind,
            _ => ParamKind::Float,
        }
    }

    fn code(self) -> i32 {
        match self {
            Self::Pitch => code::PITCH,
            Self::Gain => code::GAIN,
            Self::MaxDistance => code::MAX_DISTANCE,
            Self::RolloffFactor => code::ROLLOFF_FACTOR,
            Self::ReferenceDistance => code::REFERENCE_DISTANCE,
            Self::MinGain => code::MIN_GAIN,
            Self::MaxGain => code::MAX_GAIN,
            Self::ConeOuterGain => code::CONE_OUTER_GAIN,
            Self::ConeInnerAngle => code::CONE_INNER_ANGLE,
            Self::ConeOuterAngle => code::CONE_OUTER_ANGLE,
            Self::Position => code::POSITION,
            Self::Velocity => code::VELOCITY,
            Self::Direction => code::DIRECTION,
            Self::SourceRelative => code::SOURCE_RELATIVE,
            Self::Looping => code::LOOPING,
            Self::SecOffset => code::SEC_OFFSET,
            Self::SampleOffset => code::SAMPLE_OFFSET,
            Self::ByteOffset => code::BYTE_OFFSET,
            Self::Extension(ext) => ext.code,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Pitch => "pitch",
            Self::Gain => "gain",
            Self::MaxDistance => "max_distance",
            Self::RolloffFactor => "rolloff_factor",
            Self::ReferenceDistance => "reference_distance",
            Self::MinGain => "min_gain",
            Self::MaxGain => "max_gain",
            Self::ConeOuterGain => "cone_outer_gain",
            Self::ConeInnerAngle => "cone_inner_angle",
            Self::ConeOuterAngle => "cone_outer_angle",
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Direction => "direction",
            Self::SourceRelative => "source_relative",
            Self::Looping => "looping",
            Self::SecOffset => "sec_offset",
            Self::SampleOffset => "sample_offset",
            Self::ByteOffset => "byte_offset",
            Self::Extension(_) => "<extension>",
        }
    }
}

/// Listener parameters understood by every backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerParam {
    Gain,
    Position,
    Velocity,
    Orientation,
    Extension(ExtParam),
}

impl ListenerParam {
    pub const ALL: &'static [ListenerParam] = &[
        Self::Gain,
        Self::Position,
        Self::Velocity,
        Self::Orientation,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        let param = match name {
            "gain" => Self::Gain,
            "position" => Self::Position,
            "velocity" => Self::Velocity,
            "orientation" => Self::Orientation,
            _ => return None,
        };
        Some(param)
    }
}

impl ParamKey for ListenerParam {
    fn kind(self) -> ParamKind {
        match self {
            Self::Gain => ParamKind::Float,
            Self::Position | Self::Velocity => ParamKind::Vec3,
            Self::Orientation => ParamKind::Floats6,
            Self::Extension(ext) => ext.kind,
        }
    }

    fn code(self) -> i32 {
        match self {
            Self::Gain => code::GAIN,
            Self::Position => code::POSITION,
            Self::Velocity => code::VELOCITY,
            Self::Orientation => code::ORIENTATION,
            Self::Extension(ext) => ext.code,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Gain => "gain",
            Self::Position => "position",
            Self::Velocity => "velocity",
            Self::Orientation => "orientation",
            Self::Extension(_) => "<extension>",
        }
    }
}

/// Per-object parameter values plus the dirty-set of parameters changed since
/// the last successful flush. The dirty list keeps insertion order so values
/// reach the backend in the order the application set them.
#[derive(Debug, Clone, Default)]
pub struct PropertyStore<P: ParamKey> {
    values: HashMap<P, ParamValue>,
    dirty: Vec<P>,
}

impl<P: ParamKey> PropertyStore<P> {
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            dirty: Vec::new(),
        }
    }

    pub fn get(&self, param: P) -> Option<&ParamValue> {
        self.values.get(&param)
    }

    /// Records `value` and marks `param` dirty. Callers are expected to hand
    /// in a value of the parameter's kind; the name-based APIs validate this
    /// before reaching the store.
    pub fn set(&mut self, param: P, value: ParamValue) {
        debug_assert_eq!(value.kind(), param.kind());
        self.values.insert(param, value);
        if !self.dirty.contains(&param) {
            self.dirty.push(param);
        }
    }

    /// Removes a recorded value (and its dirty tag, if any).
    pub fn clear(&mut self, param: P) -> Option<ParamValue> {
        self.dirty.retain(|p| *p != param);
        self.values.remove(&param)
    }

    /// Stores a value read back from the backend without dirtying it, and
    /// drops any pending dirty tag for the parameter.
    pub fn replace(&mut self, param: P, value: ParamValue) {
        self.dirty.retain(|p| *p != param);
        self.values.insert(param, value);
    }

    pub fn changed(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty(&self) -> &[P] {
        &self.dirty
    }

    /// Clears the dirty-set; called exactly when a flush succeeds.
    pub fn mark_flushed(&mut self) {
        self.dirty.clear();
    }
}

/// Runtime-registered optional parameters, looked up by name.
///
/// Registration checks the backend's capability once; an unsupported
/// extension reports `false` and the name stays unresolvable.
#[derive(Debug, Default)]
pub struct ExtRegistry {
    source: HashMap<String, ExtParam>,
    listener: HashMap<String, ExtParam>,
}

impl ExtRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register_source(
        &mut self,
        backend: &mut dyn AudioBackend,
        name: &str,
        param_code: i32,
        kind: ParamKind,
    ) -> bool {
        if !backend.extension_present(name) {
            return false;
        }
        self.source.insert(
            name.to_string(),
            ExtParam {
                code: param_code,
                kind,
            },
        );
        true
    }

    pub(crate) fn register_listener(
        &mut self,
        backend: &mut dyn AudioBackend,
        name: &str,
        param_code: i32,
        kind: ParamKind,
    ) -> bool {
        if !backend.extension_present(name) {
            return false;
        }
        self.listener.insert(
            name.to_string(),
            ExtParam {
                code: param_code,
                kind,
            },
        );
        true
    }

    /// Resolves a source parameter name: builtins first, then registered
    /// extensions.
    pub fn source_param(&self, name: &str) -> Result<SourceParam> {
        if let Some(param) = SourceParam::from_name(name) {
            return Ok(param);
        }
        self.source
            .get(name)
            .map(|ext| SourceParam::Extension(*ext))
            .ok_or_else(|| AuralError::UnknownParameter(name.to_string()))
    }

    pub fn listener_param(&self, name: &str) -> Result<ListenerParam> {
        if let Some(param) = ListenerParam::from_name(name) {
            return Ok(param);
        }
        self.listener
            .get(name)
            .map(|ext| ListenerParam::Extension(*ext))
            .ok_or_else(|| AuralError::UnknownParameter(name.to_string()))
    }

    pub(crate) fn source_extensions(&self) -> impl Iterator<Item = ExtParam> + '_ {
        self.source.values().copied()
    }

    pub(crate) fn listener_extensions(&self) -> impl Iterator<Item = ExtParam> + '_ {
        self.listener.values().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn test_set_get_roundtrip_marks_dirty() {
        let mut store = PropertyStore::new();
        assert!(!store.changed());
        store.set(SourceParam::Gain, ParamValue::Float(0.5));
        assert_eq!(
            store.get(SourceParam::Gain),
            Some(&ParamValue::Float(0.5))
        );
        assert!(store.changed());
        store.mark_flushed();
        assert!(!store.changed());
        // value survives the flush, only the dirty tag is gone
        assert_eq!(
            store.get(SourceParam::Gain),
            Some(&ParamValue::Float(0.5))
        );
    }

    #[test]
    fn test_dirty_keeps_insertion_order_without_duplicates() {
        let mut store = PropertyStore::new();
        store.set(SourceParam::Pitch, ParamValue::Float(1.0));
        store.set(SourceParam::Gain, ParamValue::Float(1.0));
        store.set(SourceParam::Pitch, ParamValue::Float(2.0));
        assert_eq!(store.dirty(), &[SourceParam::Pitch, SourceParam::Gain]);
    }

    #[test]
    fn test_replace_clears_dirty_tag() {
        let mut store = PropertyStore::new();
        store.set(ListenerParam::Gain, ParamValue::Float(0.3));
        store.replace(ListenerParam::Gain, ParamValue::Float(0.8));
        assert!(!store.changed());
        assert_eq!(
            store.get(ListenerParam::Gain),
            Some(&ParamValue::Float(0.8))
        );
    }

    #[test]
    fn test_clear_removes_value_and_dirty() {
        let mut store = PropertyStore::new();
        store.set(SourceParam::Looping, ParamValue::Bool(true));
        assert!(store.clear(SourceParam::Looping).is_some());
        assert!(store.get(SourceParam::Looping).is_none());
        assert!(!store.changed());
    }

    #[test]
    fn test_unknown_name_is_rejected() {
        let registry = ExtRegistry::new();
        assert!(matches!(
            registry.source_param("reverb_send"),
            Err(AuralError::UnknownParameter(_))
        ));
        assert!(registry.source_param("gain").is_ok());
    }

    #[test]
    fn test_extension_registration_requires_capability() {
        let mut backend = MockBackend::new();
        let mut registry = ExtRegistry::new();
        assert!(!registry.register_source(&mut backend, "AL_EXT_STEREO_ANGLES", 0x1030, ParamKind::Float));
        assert!(registry.source_param("AL_EXT_STEREO_ANGLES").is_err());

        let mut backend = MockBackend::with_extensions(&["AL_EXT_STEREO_ANGLES"]);
        assert!(registry.register_source(&mut backend, "AL_EXT_STEREO_ANGLES", 0x1030, ParamKind::Float));
        let param = registry.source_param("AL_EXT_STEREO_ANGLES").unwrap();
        assert_eq!(param.kind(), ParamKind::Float);
        assert_eq!(param.code(), 0x1030);
    }
}
