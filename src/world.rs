//! Listener and source objects.
//!
//! Both are plain data holders: setters write through a property store that
//! records the change for the next `AuralSink::update()` flush. Neither talks
//! to the backend directly.

use crate::backend::SourceId;
use crate::math::{Orientation, Vec3};
use crate::params::{ListenerParam, ParamValue, PropertyStore, SourceParam};
use crate::sound::{AuralSoundData, AuralStreamingSound, QueuedSound};
use std::collections::VecDeque;

/// The single point of audition in the 3D audio space. One per sink.
#[derive(Debug)]
pub struct AuralListener {
    pub(crate) props: PropertyStore<ListenerParam>,
}

impl AuralListener {
    pub(crate) fn new() -> Self {
        let mut props = PropertyStore::new();
        // initial pose is dirty so the first update pushes it to the backend
        props.set(ListenerParam::Position, ParamValue::Vec3(Vec3::ZERO));
        props.set(ListenerParam::Velocity, ParamValue::Vec3(Vec3::ZERO));
        props.set(
            ListenerParam::Orientation,
            ParamValue::Floats6(Orientation::default().to_array()),
        );
        Self { props }
    }

    pub fn position(&self) -> Vec3 {
        self.props
            .get(ListenerParam::Position)
            .and_then(ParamValue::as_vec3)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.props
            .set(ListenerParam::Position, ParamValue::Vec3(position));
    }

    pub fn velocity(&self) -> Vec3 {
        self.props
            .get(ListenerParam::Velocity)
            .and_then(ParamValue::as_vec3)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.props
            .set(ListenerParam::Velocity, ParamValue::Vec3(velocity));
    }

    pub fn orientation(&self) -> Orientation {
        match self.props.get(ListenerParam::Orientation) {
            Some(ParamValue::Floats6(values)) => Orientation::from_array(*values),
            _ => Orientation::default(),
        }
    }

    pub fn set_orientation(&mut self, orientation: Orientation) {
        self.props.set(
            ListenerParam::Orientation,
            ParamValue::Floats6(orientation.to_array()),
        );
    }

    /// Master gain. Defaults to 1.0 until set or refreshed.
    pub fn gain(&self) -> f32 {
        self.props
            .get(ListenerParam::Gain)
            .and_then(ParamValue::as_float)
            .unwrap_or(1.0)
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.props.set(ListenerParam::Gain, ParamValue::Float(gain));
    }

    /// Generic access for registered extension parameters.
    pub fn set_param(&mut self, param: ListenerParam, value: ParamValue) {
        self.props.set(param, value);
    }

    pub fn param(&self, param: ListenerParam) -> Option<&ParamValue> {
        self.props.get(param)
    }

    pub fn clear_param(&mut self, param: ListenerParam) -> Option<ParamValue> {
        self.props.clear(param)
    }

    /// Whether any parameter changed since the last successful flush.
    pub fn changed(&self) -> bool {
        self.props.changed()
    }
}

/// An application-level sound emitter.
///
/// Owns its pending chunk queue exclusively; chunks leave the queue only when
/// the scheduler hands them to the backend. The backend id is bound lazily on
/// first scheduling need and stays stable until released.
#[derive(Debug)]
pub struct AuralSource {
    pub(crate) props: PropertyStore<SourceParam>,
    pub(crate) pending: VecDeque<QueuedSound>,
    pub(crate) backend_id: Option<SourceId>,
}

impl AuralSource {
    pub fn new() -> Self {
        let mut props = PropertyStore::new();
        props.set(SourceParam::Gain, ParamValue::Float(1.0));
        props.set(SourceParam::Pitch, ParamValue::Float(1.0));
        props.set(SourceParam::Position, ParamValue::Vec3(Vec3::ZERO));
        props.set(SourceParam::Velocity, ParamValue::Vec3(Vec3::ZERO));
        Self {
            props,
            pending: VecDeque::new(),
            backend_id: None,
        }
    }

    pub fn gain(&self) -> f32 {
        self.float_or(SourceParam::Gain, 1.0)
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.props.set(SourceParam::Gain, ParamValue::Float(gain));
    }

    pub fn pitch(&self) -> f32 {
        self.float_or(SourceParam::Pitch, 1.0)
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        self.props.set(SourceParam::Pitch, ParamValue::Float(pitch));
    }

    pub fn position(&self) -> Vec3 {
        self.props
            .get(SourceParam::Position)
            .and_then(ParamValue::as_vec3)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.props
            .set(SourceParam::Position, ParamValue::Vec3(position));
    }

    pub fn velocity(&self) -> Vec3 {
        self.props
            .get(SourceParam::Velocity)
            .and_then(ParamValue::as_vec3)
            .unwrap_or(Vec3::ZERO)
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.props
            .set(SourceParam::Velocity, ParamValue::Vec3(velocity));
    }

    pub fn set_direction(&mut self, direction: Vec3) {
        self.props
            .set(SourceParam::Direction, ParamValue::Vec3(direction));
    }

    /// Positions this source relative to the listener instead of world space.
    pub fn set_relative(&mut self, relative: bool) {
        self.props
            .set(SourceParam::SourceRelative, ParamValue::Bool(relative));
    }

    pub fn looping(&self) -> bool {
        self.props
            .get(SourceParam::Looping)
            .and_then(ParamValue::as_bool)
            .unwrap_or(false)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.props
            .set(SourceParam::Looping, ParamValue::Bool(looping));
    }

    pub fn set_min_gain(&mut self, gain: f32) {
        self.props.set(SourceParam::MinGain, ParamValue::Float(gain));
    }

    pub fn set_max_gain(&mut self, gain: f32) {
        self.props.set(SourceParam::MaxGain, ParamValue::Float(gain));
    }

    pub fn set_rolloff_factor(&mut self, factor: f32) {
        self.props
            .set(SourceParam::RolloffFactor, ParamValue::Float(factor));
    }

    pub fn set_reference_distance(&mut self, distance: f32) {
        self.props
            .set(SourceParam::ReferenceDistance, ParamValue::Float(distance));
    }

    pub fn set_max_distance(&mut self, distance: f32) {
        self.props
            .set(SourceParam::MaxDistance, ParamValue::Float(distance));
    }

    pub fn set_cone_inner_angle(&mut self, degrees: f32) {
        self.props
            .set(SourceParam::ConeInnerAngle, ParamValue::Float(degrees));
    }

    pub fn set_cone_outer_angle(&mut self, degrees: f32) {
        self.props
            .set(SourceParam::ConeOuterAngle, ParamValue::Float(degrees));
    }

    pub fn set_cone_outer_gain(&mut self, gain: f32) {
        self.props
            .set(SourceParam::ConeOuterGain, ParamValue::Float(gain));
    }

    /// Playback offset into the current buffer queue, in seconds.
    pub fn set_sec_offset(&mut self, seconds: f32) {
        self.props
            .set(SourceParam::SecOffset, ParamValue::Float(seconds));
    }

    pub fn set_sample_offset(&mut self, samples: f32) {
        self.props
            .set(SourceParam::SampleOffset, ParamValue::Float(samples));
    }

    pub fn set_byte_offset(&mut self, bytes: f32) {
        self.props
            .set(SourceParam::ByteOffset, ParamValue::Float(bytes));
    }

    /// Generic access for registered extension parameters.
    pub fn set_param(&mut self, param: SourceParam, value: ParamValue) {
        self.props.set(param, value);
    }

    pub fn param(&self, param: SourceParam) -> Option<&ParamValue> {
        self.props.get(param)
    }

    pub fn clear_param(&mut self, param: SourceParam) -> Option<ParamValue> {
        self.props.clear(param)
    }

    pub fn changed(&self) -> bool {
        self.props.changed()
    }

    /// Appends a buffered chunk to the pending queue.
    pub fn queue(&mut self, data: AuralSoundData) {
        self.pending.push_back(QueuedSound::Buffered(data));
    }

    /// Appends a streaming chunk; it will be materialized in bounded pieces.
    pub fn queue_stream(&mut self, stream: AuralStreamingSound) {
        self.pending.push_back(QueuedSound::Streaming(stream));
    }

    /// Chunks not yet handed to the backend.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The backend id this source is bound to, if scheduling has bound one.
    pub fn backend_id(&self) -> Option<SourceId> {
        self.backend_id
    }

    fn float_or(&self, param: SourceParam, default: f32) -> f32 {
        self.props
            .get(param)
            .and_then(ParamValue::as_float)
            .unwrap_or(default)
    }
}

impl Default for AuralSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_source_has_initial_dirt() {
        // gain/pitch/position/velocity start dirty so a fresh source's state
        // reaches the backend on its first scheduled tick
        let source = AuralSource::new();
        assert!(source.changed());
        assert_eq!(source.gain(), 1.0);
        assert_eq!(source.pitch(), 1.0);
    }

    #[test]
    fn test_setters_record_and_dirty() {
        let mut source = AuralSource::new();
        source.props.mark_flushed();
        assert!(!source.changed());
        source.set_position(Vec3::new(4.0, 5.0, 6.0));
        assert!(source.changed());
        assert_eq!(source.position(), Vec3::new(4.0, 5.0, 6.0));
    }

    #[test]
    fn test_queue_preserves_fifo_order() {
        let mut source = AuralSource::new();
        let a = AuralSoundData::from_raw(vec![1; 4], 1, 16, 44100).unwrap();
        let b = AuralSoundData::from_raw(vec![2; 4], 1, 16, 44100).unwrap();
        source.queue(a);
        source.queue(b);
        assert_eq!(source.pending_len(), 2);
        match source.pending.front() {
            Some(QueuedSound::Buffered(data)) => assert_eq!(data.payload(), &[1; 4]),
            other => panic!("unexpected queue head: {other:?}"),
        }
    }

    #[test]
    fn test_listener_defaults() {
        let listener = AuralListener::new();
        assert!(listener.changed());
        assert_eq!(listener.gain(), 1.0);
        assert_eq!(listener.orientation(), Orientation::default());
    }
}
