//! The playback scheduler.
//!
//! `AuralSink` owns the backend handle (device and context are opened at
//! construction and torn down on drop), the listener, every registered
//! source, and the id pools. Applications mutate listener/source state and
//! call `update()` once per frame; the sink flushes only what changed and
//! keeps each source's backend queue fed.

use crate::alloc::{BufferPool, SourcePool};
use crate::backend::{
    AudioBackend, ContextHandle, DeviceHandle, ErrorScope, SourceId, code,
};
use crate::config::SinkDesc;
use crate::error::{AuralError, BackendErrorKind, Result, backend_error, check};
use crate::math::Vec3;
use crate::params::{
    ExtParam, ExtRegistry, ListenerParam, ParamKey, ParamKind, ParamValue, SourceParam,
};
use crate::queue::{QueuePolicy, service_source};
use crate::world::{AuralListener, AuralSource};
use std::collections::HashMap;
use uuid::Uuid;

/// Audio playback system: schedules property flushes and buffer upkeep for
/// one listener and any number of sources over a single backend context.
///
/// All methods must be called from the thread that owns the backend context,
/// and listener/source state must not be mutated while `update()` runs.
pub struct AuralSink {
    backend: Box<dyn AudioBackend>,
    device: DeviceHandle,
    context: ContextHandle,
    desc: SinkDesc,
    listener: AuralListener,
    sources: HashMap<Uuid, AuralSource>,
    source_pool: SourcePool,
    buffer_pool: BufferPool,
    registry: ExtRegistry,
}

impl AuralSink {
    /// Opens the described device, creates and activates a context on it.
    pub fn new(mut backend: Box<dyn AudioBackend>, desc: SinkDesc) -> Result<Self> {
        let device = match backend.open_device(desc.device.as_deref()) {
            Some(device) => device,
            None => {
                let error_code =
                    nonzero_or(backend.last_error(ErrorScope::Device), code::ERR_INVALID_DEVICE);
                return Err(backend_error(ErrorScope::Device, error_code));
            }
        };

        let attrs = desc.context_attrs();
        let context = match backend.create_context(device, &attrs) {
            Some(context) => context,
            None => {
                let error_code =
                    nonzero_or(backend.last_error(ErrorScope::Device), code::ERR_INVALID_CONTEXT);
                backend.close_device(device);
                return Err(backend_error(ErrorScope::Device, error_code));
            }
        };

        backend.make_current(context);
        if let Err(err) = check(backend.as_mut(), ErrorScope::Device) {
            backend.destroy_context(context);
            backend.close_device(device);
            return Err(err);
        }

        Ok(Self {
            backend,
            device,
            context,
            desc,
            listener: AuralListener::new(),
            sources: HashMap::new(),
            source_pool: SourcePool::new(),
            buffer_pool: BufferPool::new(),
            registry: ExtRegistry::new(),
        })
    }

    pub fn desc(&self) -> &SinkDesc {
        &self.desc
    }

    pub fn listener(&self) -> &AuralListener {
        &self.listener
    }

    pub fn listener_mut(&mut self) -> &mut AuralListener {
        &mut self.listener
    }

    /// Registers a source with the sink and returns its handle. Backend
    /// resources are not touched until the source is first scheduled.
    pub fn add_source(&mut self, source: AuralSource) -> Uuid {
        let handle = Uuid::new_v4();
        self.sources.insert(handle, source);
        handle
    }

    pub fn source(&self, handle: Uuid) -> Option<&AuralSource> {
        self.sources.get(&handle)
    }

    pub fn source_mut(&mut self, handle: Uuid) -> Option<&mut AuralSource> {
        self.sources.get_mut(&handle)
    }

    pub fn source_handles(&self) -> Vec<Uuid> {
        self.sources.keys().copied().collect()
    }

    /// Detaches the source from the sink. Its backend id is stopped, its
    /// still-attached buffer ids are reclaimed, and the id returns to the
    /// pool for reuse.
    pub fn remove_source(&mut self, handle: Uuid) -> Result<AuralSource> {
        let mut source = self
            .sources
            .remove(&handle)
            .ok_or(AuralError::NoSuchSource(handle))?;
        if let Some(sid) = source.backend_id.take() {
            let backend = self.backend.as_mut();
            backend.stop(sid);
            let attached = backend.buffers_queued(sid);
            if attached > 0 {
                let freed = backend.unqueue_buffers(sid, attached);
                self.buffer_pool.release_many(freed);
            }
            self.source_pool.release(handle);
            check(self.backend.as_mut(), ErrorScope::Context)?;
        }
        Ok(source)
    }

    /// Starts playback on one source, binding a backend id if needed.
    pub fn play(&mut self, handle: Uuid) -> Result<()> {
        self.play_many(std::slice::from_ref(&handle))
    }

    /// Starts playback on several sources with one batched backend call.
    pub fn play_many(&mut self, handles: &[Uuid]) -> Result<()> {
        let mut sids = Vec::with_capacity(handles.len());
        for &handle in handles {
            let source = self
                .sources
                .get_mut(&handle)
                .ok_or(AuralError::NoSuchSource(handle))?;
            let sid = match source.backend_id {
                Some(sid) => sid,
                None => {
                    let sid = self.source_pool.acquire(self.backend.as_mut(), handle)?;
                    source.backend_id = Some(sid);
                    sid
                }
            };
            sids.push(sid);
        }
        match sids.as_slice() {
            [] => Ok(()),
            [sid] => {
                self.backend.play(*sid);
                check(self.backend.as_mut(), ErrorScope::Context)
            }
            many => {
                self.backend.play_many(many);
                check(self.backend.as_mut(), ErrorScope::Context)
            }
        }
    }

    /// Stops playback. A no-op for sources never bound to a backend id.
    pub fn stop(&mut self, handle: Uuid) -> Result<()> {
        self.transport(std::slice::from_ref(&handle), Transport::Stop)
    }

    pub fn stop_many(&mut self, handles: &[Uuid]) -> Result<()> {
        self.transport(handles, Transport::Stop)
    }

    /// Stops every source currently bound to a backend id.
    pub fn stop_all(&mut self) -> Result<()> {
        let sids: Vec<SourceId> = self
            .sources
            .values()
            .filter_map(|source| source.backend_id)
            .collect();
        if sids.is_empty() {
            return Ok(());
        }
        self.backend.stop_many(&sids);
        check(self.backend.as_mut(), ErrorScope::Context)
    }

    /// Pauses playback. A no-op for sources never bound to a backend id.
    pub fn pause(&mut self, handle: Uuid) -> Result<()> {
        self.transport(std::slice::from_ref(&handle), Transport::Pause)
    }

    pub fn pause_many(&mut self, handles: &[Uuid]) -> Result<()> {
        self.transport(handles, Transport::Pause)
    }

    /// Rewinds to the initial state. A no-op for unbound sources.
    pub fn rewind(&mut self, handle: Uuid) -> Result<()> {
        self.transport(std::slice::from_ref(&handle), Transport::Rewind)
    }

    pub fn rewind_many(&mut self, handles: &[Uuid]) -> Result<()> {
        self.transport(handles, Transport::Rewind)
    }

    fn transport(&mut self, handles: &[Uuid], op: Transport) -> Result<()> {
        let mut sids = Vec::with_capacity(handles.len());
        for &handle in handles {
            let source = self
                .sources
                .get(&handle)
                .ok_or(AuralError::NoSuchSource(handle))?;
            if let Some(sid) = source.backend_id {
                sids.push(sid);
            }
        }
        if sids.is_empty() {
            return Ok(());
        }
        let backend = self.backend.as_mut();
        match (op, sids.as_slice()) {
            (Transport::Stop, [sid]) => backend.stop(*sid),
            (Transport::Stop, many) => backend.stop_many(many),
            (Transport::Pause, [sid]) => backend.pause(*sid),
            (Transport::Pause, many) => backend.pause_many(many),
            (Transport::Rewind, [sid]) => backend.rewind(*sid),
            (Transport::Rewind, many) => backend.rewind_many(many),
        }
        check(self.backend.as_mut(), ErrorScope::Context)
    }

    /// One scheduling tick: flushes the listener's dirty parameters, then for
    /// every known source flushes its dirty parameters and services its
    /// buffer queue. With nothing pending this issues only state queries.
    ///
    /// A failure attributable to one source defers that source to the next
    /// tick; device/context-scoped failures abort the tick and propagate.
    pub fn update(&mut self) -> Result<()> {
        let Self {
            backend,
            listener,
            sources,
            source_pool,
            buffer_pool,
            desc,
            ..
        } = self;
        let backend = backend.as_mut();

        flush_listener(backend, listener)?;

        let policy = QueuePolicy {
            max_depth: desc.max_buffers_per_source,
            max_chunk: desc.max_buffer_size,
        };
        for (handle, source) in sources.iter_mut() {
            // never-scheduled idle sources need no backend resources
            if source.backend_id.is_none() && source.pending.is_empty() {
                continue;
            }
            match process_source(backend, source_pool, buffer_pool, policy, *handle, source) {
                Ok(()) => {}
                Err(err) if invalidates_sink(&err) => return Err(err),
                Err(err) => {
                    log::warn!("source {handle}: {err}; deferring to next tick");
                }
            }
        }
        Ok(())
    }

    /// Pulls every enumerated (and registered extension) parameter of the
    /// source back from the backend, overwriting local values and clearing
    /// their dirty flags. A no-op for unbound sources.
    pub fn refresh_source(&mut self, handle: Uuid) -> Result<()> {
        let Self {
            backend,
            sources,
            registry,
            ..
        } = self;
        let source = sources
            .get_mut(&handle)
            .ok_or(AuralError::NoSuchSource(handle))?;
        let Some(sid) = source.backend_id else {
            log::debug!("refresh on unbound source {handle}; nothing to pull");
            return Ok(());
        };
        let backend = backend.as_mut();
        for &param in SourceParam::ALL {
            let value = read_source_param(backend, sid, param);
            check(backend, ErrorScope::Context)?;
            source.props.replace(param, value);
        }
        let extensions: Vec<ExtParam> = registry.source_extensions().collect();
        for ext in extensions {
            let param = SourceParam::Extension(ext);
            let value = read_source_param(backend, sid, param);
            check(backend, ErrorScope::Context)?;
            source.props.replace(param, value);
        }
        Ok(())
    }

    /// Listener counterpart of `refresh_source`.
    pub fn refresh_listener(&mut self) -> Result<()> {
        let Self {
            backend,
            listener,
            registry,
            ..
        } = self;
        let backend = backend.as_mut();
        for &param in ListenerParam::ALL {
            let value = read_listener_param(backend, param);
            check(backend, ErrorScope::Context)?;
            listener.props.replace(param, value);
        }
        let extensions: Vec<ExtParam> = registry.listener_extensions().collect();
        for ext in extensions {
            let param = ListenerParam::Extension(ext);
            let value = read_listener_param(backend, param);
            check(backend, ErrorScope::Context)?;
            listener.props.replace(param, value);
        }
        Ok(())
    }

    /// Makes an optional backend source parameter addressable by name.
    /// Returns `false` (and registers nothing) when the backend does not
    /// advertise the capability; the check happens once, here.
    pub fn register_source_param(&mut self, name: &str, param_code: i32, kind: ParamKind) -> bool {
        self.registry
            .register_source(self.backend.as_mut(), name, param_code, kind)
    }

    pub fn register_listener_param(
        &mut self,
        name: &str,
        param_code: i32,
        kind: ParamKind,
    ) -> bool {
        self.registry
            .register_listener(self.backend.as_mut(), name, param_code, kind)
    }

    /// Resolves a source parameter name (builtin or registered extension).
    pub fn source_param(&self, name: &str) -> Result<SourceParam> {
        self.registry.source_param(name)
    }

    pub fn listener_param(&self, name: &str) -> Result<ListenerParam> {
        self.registry.listener_param(name)
    }

    /// Name-based set on a source's property store. Unknown names and values
    /// of the wrong kind are rejected with `UnknownParameter`.
    pub fn set_source_param(&mut self, handle: Uuid, name: &str, value: ParamValue) -> Result<()> {
        let param = self.registry.source_param(name)?;
        if value.kind() != param.kind() {
            return Err(AuralError::UnknownParameter(format!(
                "parameter `{name}` expects {:?}, got {:?}",
                param.kind(),
                value.kind()
            )));
        }
        self.sources
            .get_mut(&handle)
            .ok_or(AuralError::NoSuchSource(handle))?
            .props
            .set(param, value);
        Ok(())
    }

    /// Name-based delete of a recorded value; returns the removed value.
    pub fn clear_source_param(&mut self, handle: Uuid, name: &str) -> Result<Option<ParamValue>> {
        let param = self.registry.source_param(name)?;
        let source = self
            .sources
            .get_mut(&handle)
            .ok_or(AuralError::NoSuchSource(handle))?;
        Ok(source.props.clear(param))
    }

    pub fn source_param_value(&self, handle: Uuid, name: &str) -> Result<Option<ParamValue>> {
        let param = self.registry.source_param(name)?;
        let source = self
            .sources
            .get(&handle)
            .ok_or(AuralError::NoSuchSource(handle))?;
        Ok(source.props.get(param).cloned())
    }

    pub fn set_listener_param(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let param = self.registry.listener_param(name)?;
        if value.kind() != param.kind() {
            return Err(AuralError::UnknownParameter(format!(
                "parameter `{name}` expects {:?}, got {:?}",
                param.kind(),
                value.kind()
            )));
        }
        self.listener.props.set(param, value);
        Ok(())
    }

    pub fn clear_listener_param(&mut self, name: &str) -> Result<Option<ParamValue>> {
        let param = self.registry.listener_param(name)?;
        Ok(self.listener.props.clear(param))
    }

    pub fn listener_param_value(&self, name: &str) -> Result<Option<ParamValue>> {
        let param = self.registry.listener_param(name)?;
        Ok(self.listener.props.get(param).cloned())
    }
}

impl Drop for AuralSink {
    fn drop(&mut self) {
        let sids = self.source_pool.all_ids();
        if !sids.is_empty() {
            self.backend.delete_sources(&sids);
        }
        let bids = self.buffer_pool.all_ids().to_vec();
        if !bids.is_empty() {
            self.backend.delete_buffers(&bids);
        }
        self.backend.destroy_context(self.context);
        self.backend.close_device(self.device);
    }
}

#[derive(Debug, Clone, Copy)]
enum Transport {
    Stop,
    Pause,
    Rewind,
}

/// Device-scoped failures invalidate every later call in the tick; anything
/// context-scoped is attributed to the call site that triggered it.
fn invalidates_sink(err: &AuralError) -> bool {
    matches!(
        err,
        AuralError::Backend {
            scope: ErrorScope::Device,
            ..
        } | AuralError::Backend {
            kind: BackendErrorKind::InvalidDevice | BackendErrorKind::InvalidContext,
            ..
        }
    )
}

fn nonzero_or(error_code: i32, fallback: i32) -> i32 {
    if error_code == code::NO_ERROR {
        fallback
    } else {
        error_code
    }
}

fn process_source(
    backend: &mut dyn AudioBackend,
    source_pool: &mut SourcePool,
    buffer_pool: &mut BufferPool,
    policy: QueuePolicy,
    handle: Uuid,
    source: &mut AuralSource,
) -> Result<()> {
    let sid = match source.backend_id {
        Some(sid) => sid,
        None => {
            let sid = source_pool.acquire(backend, handle)?;
            source.backend_id = Some(sid);
            sid
        }
    };
    // property flush precedes buffer refill, so a position change lands
    // before new audio queued on the same tick
    flush_source_props(backend, sid, source)?;
    service_source(backend, buffer_pool, policy, sid, source)
}

fn flush_source_props(
    backend: &mut dyn AudioBackend,
    sid: SourceId,
    source: &mut AuralSource,
) -> Result<()> {
    if !source.props.changed() {
        return Ok(());
    }
    let dirty: Vec<SourceParam> = source.props.dirty().to_vec();
    for param in dirty {
        let Some(value) = source.props.get(param).cloned() else {
            continue;
        };
        write_source_param(backend, sid, param, &value);
        check(backend, ErrorScope::Context)?;
    }
    source.props.mark_flushed();
    Ok(())
}

fn flush_listener(backend: &mut dyn AudioBackend, listener: &mut AuralListener) -> Result<()> {
    if !listener.props.changed() {
        return Ok(());
    }
    let dirty: Vec<ListenerParam> = listener.props.dirty().to_vec();
    for param in dirty {
        let Some(value) = listener.props.get(param).cloned() else {
            continue;
        };
        write_listener_param(backend, param, &value);
        check(backend, ErrorScope::Context)?;
    }
    listener.props.mark_flushed();
    Ok(())
}

fn write_source_param(
    backend: &mut dyn AudioBackend,
    sid: SourceId,
    param: SourceParam,
    value: &ParamValue,
) {
    match value {
        ParamValue::Float(v) => backend.set_source_f(sid, param.code(), *v),
        ParamValue::Int(v) => backend.set_source_i(sid, param.code(), *v),
        ParamValue::Bool(v) => backend.set_source_i(sid, param.code(), *v as i32),
        ParamValue::Vec3(v) => backend.set_source_fv(sid, param.code(), &v.to_array()),
        ParamValue::Floats6(v) => backend.set_source_fv(sid, param.code(), v),
    }
}

fn write_listener_param(backend: &mut dyn AudioBackend, param: ListenerParam, value: &ParamValue) {
    match value {
        ParamValue::Float(v) => backend.set_listener_f(param.code(), *v),
        ParamValue::Int(v) => backend.set_listener_i(param.code(), *v),
        ParamValue::Bool(v) => backend.set_listener_i(param.code(), *v as i32),
        ParamValue::Vec3(v) => backend.set_listener_fv(param.code(), &v.to_array()),
        ParamValue::Floats6(v) => backend.set_listener_fv(param.code(), v),
    }
}

fn read_source_param(
    backend: &mut dyn AudioBackend,
    sid: SourceId,
    param: SourceParam,
) -> ParamValue {
    match param.kind() {
        ParamKind::Float => ParamValue::Float(backend.get_source_f(sid, param.code())),
        ParamKind::Int => ParamValue::Int(backend.get_source_i(sid, param.code())),
        ParamKind::Bool => ParamValue::Bool(backend.get_source_i(sid, param.code()) != 0),
        ParamKind::Vec3 => {
            let mut out = [0.0f32; 3];
            backend.get_source_fv(sid, param.code(), &mut out);
            ParamValue::Vec3(Vec3::from_array(out))
        }
        ParamKind::Floats6 => {
            let mut out = [0.0f32; 6];
            backend.get_source_fv(sid, param.code(), &mut out);
            ParamValue::Floats6(out)
        }
    }
}

fn read_listener_param(backend: &mut dyn AudioBackend, param: ListenerParam) -> ParamValue {
    match param.kind() {
        ParamKind::Float => ParamValue::Float(backend.get_listener_f(param.code())),
        ParamKind::Int => ParamValue::Int(backend.get_listener_i(param.code())),
        ParamKind::Bool => ParamValue::Bool(backend.get_listener_i(param.code()) != 0),
        ParamKind::Vec3 => {
            let mut out = [0.0f32; 3];
            backend.get_listener_fv(param.code(), &mut out);
            ParamValue::Vec3(Vec3::from_array(out))
        }
        ParamKind::Floats6 => {
            let mut out = [0.0f32; 6];
            backend.get_listener_fv(param.code(), &mut out);
            ParamValue::Floats6(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{MockBackend, MockProbe};
    use crate::sound::{AuralSoundData, AuralStreamingSound};
    use std::io::Cursor;

    fn sink_with_probe() -> (AuralSink, MockProbe) {
        let backend = MockBackend::new();
        let probe = backend.probe();
        let sink = AuralSink::new(Box::new(backend), SinkDesc::default()).unwrap();
        (sink, probe)
    }

    fn tone(bytes: usize, value: u8) -> AuralSoundData {
        AuralSoundData::from_raw(vec![value; bytes], 1, 16, 44100).unwrap()
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn stream_of(bytes: Vec<u8>) -> AuralStreamingSound {
        let len = bytes.len() as u64;
        AuralStreamingSound::new(Box::new(Cursor::new(bytes)), 1, 16, 44100, len).unwrap()
    }

    #[test]
    fn test_update_flushes_listener_before_sources() {
        let (mut sink, probe) = sink_with_probe();
        sink.listener_mut().set_position(Vec3::new(1.0, 2.0, 3.0));
        let handle = sink.add_source(AuralSource::new());
        sink.source_mut(handle).unwrap().queue(tone(64, 7));

        sink.update().unwrap();

        assert_eq!(
            probe.listener_fv(code::POSITION),
            Some(vec![1.0, 2.0, 3.0])
        );
        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        assert_eq!(probe.source_f(sid, code::GAIN), Some(1.0));
        assert_eq!(probe.submissions(sid).len(), 1);
        // queueing data is a scheduling need: the source starts playing
        assert_eq!(probe.state_of(sid), Some(crate::backend::SourceState::Playing));
        assert!(!sink.listener().changed());
        assert!(!sink.source(handle).unwrap().changed());
    }

    #[test]
    fn test_update_with_no_changes_issues_no_mutations() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.source_mut(handle).unwrap().queue(tone(64, 1));
        sink.update().unwrap();

        let settled = probe.mutation_count();
        sink.update().unwrap();
        assert_eq!(probe.mutation_count(), settled);
    }

    #[test]
    fn test_backend_queue_depth_never_exceeds_max() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        for i in 0..30 {
            sink.source_mut(handle).unwrap().queue(tone(16, i as u8));
        }

        sink.update().unwrap();
        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        assert_eq!(probe.attached_count(sid), 10);
        assert_eq!(sink.source(handle).unwrap().pending_len(), 20);

        // nothing processed yet, so another tick must not grow the queue
        sink.update().unwrap();
        assert_eq!(probe.attached_count(sid), 10);

        probe.complete_buffers(sid, 4);
        sink.update().unwrap();
        assert_eq!(probe.attached_count(sid), 10);
        assert_eq!(sink.source(handle).unwrap().pending_len(), 16);
    }

    #[test]
    fn test_streaming_three_tick_scenario() {
        // 108000 bytes split at the 48000-byte chunk cap: 48000 + 48000 + 12000
        let bytes = pattern(108_000);
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.source_mut(handle)
            .unwrap()
            .queue_stream(stream_of(bytes.clone()));

        sink.update().unwrap();
        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        assert_eq!(sink.source(handle).unwrap().pending_len(), 1);
        sink.update().unwrap();
        assert_eq!(sink.source(handle).unwrap().pending_len(), 1);
        sink.update().unwrap();
        assert_eq!(sink.source(handle).unwrap().pending_len(), 0);

        let submitted = probe.submissions(sid);
        let sizes: Vec<usize> = submitted.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![48000, 48000, 12000]);
        assert_eq!(submitted.concat(), bytes);
    }

    #[test]
    fn test_overlong_stream_splits_into_ordered_pieces() {
        let bytes = pattern(100_000);
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.source_mut(handle)
            .unwrap()
            .queue_stream(stream_of(bytes.clone()));

        while sink.source(handle).unwrap().pending_len() > 0 {
            sink.update().unwrap();
        }

        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        let submitted = probe.submissions(sid);
        assert!(submitted.len() >= 2);
        assert!(submitted.iter().all(|piece| piece.len() <= 48000));
        assert_eq!(submitted.concat(), bytes);
    }

    #[test]
    fn test_transports_on_unplayed_source_are_noops() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());

        sink.stop(handle).unwrap();
        sink.pause(handle).unwrap();
        sink.rewind(handle).unwrap();
        assert_eq!(probe.mutation_count(), 0);
        assert!(sink.source(handle).unwrap().backend_id().is_none());
    }

    #[test]
    fn test_transport_on_unknown_handle_is_an_error() {
        let (mut sink, _probe) = sink_with_probe();
        let err = sink.stop(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AuralError::NoSuchSource(_)));
    }

    #[test]
    fn test_listener_refresh_clears_dirty_set() {
        let (mut sink, _probe) = sink_with_probe();
        sink.listener_mut().set_position(Vec3::new(1.0, 2.0, 3.0));
        sink.update().unwrap();

        sink.listener_mut().set_position(Vec3::new(9.0, 9.0, 9.0));
        assert!(sink.listener().changed());

        // readback wins over the unflushed local value
        sink.refresh_listener().unwrap();
        assert!(!sink.listener().changed());
        assert_eq!(sink.listener().position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_source_refresh_pulls_external_mutations() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.play(handle).unwrap();
        sink.update().unwrap();

        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        probe.poke_source_f(sid, code::GAIN, 0.25);
        sink.refresh_source(handle).unwrap();

        let source = sink.source(handle).unwrap();
        assert_eq!(source.gain(), 0.25);
        assert!(!source.changed());
    }

    #[test]
    fn test_refresh_on_unbound_source_is_noop() {
        let (mut sink, _probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.refresh_source(handle).unwrap();
        assert!(sink.source(handle).unwrap().backend_id().is_none());
    }

    #[test]
    fn test_released_source_id_is_reused() {
        let (mut sink, probe) = sink_with_probe();
        let first = sink.add_source(AuralSource::new());
        sink.play(first).unwrap();
        let first_sid = sink.source(first).unwrap().backend_id().unwrap();
        assert_eq!(probe.generated_sources(), 1);

        sink.remove_source(first).unwrap();

        let second = sink.add_source(AuralSource::new());
        sink.play(second).unwrap();
        assert_eq!(sink.source(second).unwrap().backend_id(), Some(first_sid));
        assert_eq!(probe.generated_sources(), 1);
    }

    #[test]
    fn test_removing_a_source_reclaims_buffer_ids() {
        let (mut sink, probe) = sink_with_probe();
        let first = sink.add_source(AuralSource::new());
        for _ in 0..3 {
            sink.source_mut(first).unwrap().queue(tone(32, 3));
        }
        sink.update().unwrap();
        assert_eq!(probe.generated_buffers(), 3);

        sink.remove_source(first).unwrap();

        let second = sink.add_source(AuralSource::new());
        sink.source_mut(second).unwrap().queue(tone(32, 4));
        sink.update().unwrap();
        assert_eq!(probe.generated_buffers(), 3);
    }

    #[test]
    fn test_source_id_exhaustion_is_typed() {
        let (mut sink, probe) = sink_with_probe();
        probe.set_max_sources(1);
        let first = sink.add_source(AuralSource::new());
        let second = sink.add_source(AuralSource::new());
        sink.play(first).unwrap();
        let err = sink.play(second).unwrap_err();
        assert!(matches!(err, AuralError::ResourceExhausted(_)));
    }

    #[test]
    fn test_paused_source_still_receives_buffers_without_replay() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        sink.source_mut(handle).unwrap().queue(tone(64, 1));
        sink.update().unwrap();
        let sid = sink.source(handle).unwrap().backend_id().unwrap();

        sink.pause(handle).unwrap();
        sink.source_mut(handle).unwrap().queue(tone(64, 2));
        sink.update().unwrap();

        assert_eq!(probe.submissions(sid).len(), 2);
        assert_eq!(
            probe.state_of(sid),
            Some(crate::backend::SourceState::Paused)
        );
    }

    #[test]
    fn test_backend_error_propagates_with_code() {
        let (mut sink, probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        probe.inject_error(ErrorScope::Context, code::ERR_INVALID_OPERATION);
        let err = sink.play(handle).unwrap_err();
        match err {
            AuralError::Backend { kind, code: c, .. } => {
                assert_eq!(kind, BackendErrorKind::InvalidOperation);
                assert_eq!(c, code::ERR_INVALID_OPERATION);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_device_scope_errors_invalidate_the_sink() {
        let device_err = backend_error(ErrorScope::Device, code::ERR_INVALID_DEVICE);
        let source_err = backend_error(ErrorScope::Context, code::ERR_INVALID_VALUE);
        assert!(invalidates_sink(&device_err));
        assert!(!invalidates_sink(&source_err));
    }

    #[test]
    fn test_extension_params_flush_after_registration() {
        const EXT_NAME: &str = "AL_EXT_SOURCE_RADIUS";
        const EXT_CODE: i32 = 0x1031;

        let backend = MockBackend::with_extensions(&[EXT_NAME]);
        let probe = backend.probe();
        let mut sink = AuralSink::new(Box::new(backend), SinkDesc::default()).unwrap();

        assert!(sink.register_source_param(EXT_NAME, EXT_CODE, ParamKind::Float));
        let handle = sink.add_source(AuralSource::new());
        sink.set_source_param(handle, EXT_NAME, ParamValue::Float(2.5))
            .unwrap();
        sink.play(handle).unwrap();
        sink.update().unwrap();

        let sid = sink.source(handle).unwrap().backend_id().unwrap();
        assert_eq!(probe.source_f(sid, EXT_CODE), Some(2.5));
    }

    #[test]
    fn test_unsupported_extension_stays_unresolvable() {
        let (mut sink, _probe) = sink_with_probe();
        assert!(!sink.register_source_param("AL_EXT_SOURCE_RADIUS", 0x1031, ParamKind::Float));
        let handle = sink.add_source(AuralSource::new());
        let err = sink
            .set_source_param(handle, "AL_EXT_SOURCE_RADIUS", ParamValue::Float(1.0))
            .unwrap_err();
        assert!(matches!(err, AuralError::UnknownParameter(_)));
    }

    #[test]
    fn test_name_based_set_rejects_wrong_kind() {
        let (mut sink, _probe) = sink_with_probe();
        let handle = sink.add_source(AuralSource::new());
        let err = sink
            .set_source_param(handle, "gain", ParamValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, AuralError::UnknownParameter(_)));
        sink.set_source_param(handle, "gain", ParamValue::Float(0.5))
            .unwrap();
        assert_eq!(
            sink.source_param_value(handle, "gain").unwrap(),
            Some(ParamValue::Float(0.5))
        );
    }
}
