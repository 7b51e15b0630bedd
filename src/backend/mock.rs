//! In-memory backend for tests and headless operation.
//!
//! `MockBackend` models the backend's observable semantics: generated ids,
//! per-source parameter stores, attached buffer lists with processed counts,
//! and per-scope error flags. A `MockProbe` (cheap clone of the shared state)
//! lets a test advance simulated playback and inspect what the engine did.

use super::{
    AudioBackend, BufferFormat, BufferId, ContextHandle, DeviceHandle, ErrorScope, SourceId,
    SourceState, code,
};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

#[derive(Debug, Default)]
struct MockSource {
    params_f: HashMap<i32, f32>,
    params_fv: HashMap<i32, Vec<f32>>,
    params_i: HashMap<i32, i32>,
    state: Option<SourceState>,
    attached: VecDeque<BufferId>,
    processed: usize,
}

impl MockSource {
    fn state(&self) -> SourceState {
        self.state.unwrap_or(SourceState::Initial)
    }
}

#[derive(Debug, Default)]
struct MockBuffer {
    format: Option<BufferFormat>,
    payload: Vec<u8>,
    rate: u32,
}

#[derive(Debug, Default)]
struct MockState {
    device: Option<DeviceHandle>,
    context: Option<ContextHandle>,
    current: Option<ContextHandle>,
    next_source: u32,
    next_buffer: u32,
    max_sources: Option<usize>,
    sources: HashMap<SourceId, MockSource>,
    buffers: HashMap<BufferId, MockBuffer>,
    listener_f: HashMap<i32, f32>,
    listener_fv: HashMap<i32, Vec<f32>>,
    listener_i: HashMap<i32, i32>,
    extensions: Vec<String>,
    device_error: i32,
    context_error: i32,
    mutations: usize,
    generated_sources: usize,
    generated_buffers: usize,
    /// Payload snapshots in the order buffers were queued, per source.
    submissions: HashMap<SourceId, Vec<Vec<u8>>>,
}

impl MockState {
    fn raise(&mut self, scope: ErrorScope, error_code: i32) {
        match scope {
            ErrorScope::Device => {
                if self.device_error == code::NO_ERROR {
                    self.device_error = error_code;
                }
            }
            ErrorScope::Context => {
                if self.context_error == code::NO_ERROR {
                    self.context_error = error_code;
                }
            }
        }
    }

    fn source_mut(&mut self, id: SourceId) -> Option<&mut MockSource> {
        if self.sources.contains_key(&id) {
            self.sources.get_mut(&id)
        } else {
            self.raise(ErrorScope::Context, code::ERR_INVALID_NAME);
            None
        }
    }
}

/// Fully in-memory `AudioBackend`. Not thread-safe, matching the engine's
/// single-threaded contract.
#[derive(Debug, Default)]
pub struct MockBackend {
    state: Rc<RefCell<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock advertising the given extension names.
    pub fn with_extensions(names: &[&str]) -> Self {
        let backend = Self::new();
        {
            let mut state = backend.state.borrow_mut();
            state.extensions = names.iter().map(|n| n.to_string()).collect();
        }
        backend
    }

    /// Inspection/scripting handle sharing this backend's state.
    pub fn probe(&self) -> MockProbe {
        MockProbe {
            state: Rc::clone(&self.state),
        }
    }
}

/// Test-side view of a `MockBackend`, valid for the backend's lifetime.
#[derive(Debug)]
pub struct MockProbe {
    state: Rc<RefCell<MockState>>,
}

impl MockProbe {
    /// Count of state-mutating backend calls seen so far (queries excluded).
    pub fn mutation_count(&self) -> usize {
        self.state.borrow().mutations
    }

    /// Total source ids ever generated (free-list reuse does not grow this).
    pub fn generated_sources(&self) -> usize {
        self.state.borrow().generated_sources
    }

    pub fn generated_buffers(&self) -> usize {
        self.state.borrow().generated_buffers
    }

    /// Marks up to `n` of the source's attached buffers as played out.
    pub fn complete_buffers(&self, id: SourceId, n: usize) {
        let mut state = self.state.borrow_mut();
        if let Some(source) = state.sources.get_mut(&id) {
            source.processed = (source.processed + n).min(source.attached.len());
        }
    }

    pub fn attached_count(&self, id: SourceId) -> usize {
        self.state
            .borrow()
            .sources
            .get(&id)
            .map(|s| s.attached.len())
            .unwrap_or(0)
    }

    pub fn state_of(&self, id: SourceId) -> Option<SourceState> {
        self.state.borrow().sources.get(&id).map(|s| s.state())
    }

    /// Payloads queued to the source, in submission order.
    pub fn submissions(&self, id: SourceId) -> Vec<Vec<u8>> {
        self.state
            .borrow()
            .submissions
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn listener_fv(&self, param: i32) -> Option<Vec<f32>> {
        self.state.borrow().listener_fv.get(&param).cloned()
    }

    pub fn listener_f(&self, param: i32) -> Option<f32> {
        self.state.borrow().listener_f.get(&param).copied()
    }

    pub fn source_f(&self, id: SourceId, param: i32) -> Option<f32> {
        self.state
            .borrow()
            .sources
            .get(&id)
            .and_then(|s| s.params_f.get(&param).copied())
    }

    pub fn source_fv(&self, id: SourceId, param: i32) -> Option<Vec<f32>> {
        self.state
            .borrow()
            .sources
            .get(&id)
            .and_then(|s| s.params_fv.get(&param).cloned())
    }

    /// Writes a source parameter behind the engine's back, as an external
    /// mutation that `refresh_source` should pick up.
    pub fn poke_source_f(&self, id: SourceId, param: i32, value: f32) {
        let mut state = self.state.borrow_mut();
        if let Some(source) = state.sources.get_mut(&id) {
            source.params_f.insert(param, value);
        }
    }

    pub fn poke_listener_fv(&self, param: i32, values: &[f32]) {
        self.state
            .borrow_mut()
            .listener_fv
            .insert(param, values.to_vec());
    }

    /// Raises the scope's error flag; the next engine check will observe it.
    pub fn inject_error(&self, scope: ErrorScope, error_code: i32) {
        self.state.borrow_mut().raise(scope, error_code);
    }

    /// Caps how many source ids `gen_sources` will ever hand out.
    pub fn set_max_sources(&self, n: usize) {
        self.state.borrow_mut().max_sources = Some(n);
    }
}

impl AudioBackend for MockBackend {
    fn open_device(&mut self, _spec: Option<&str>) -> Option<DeviceHandle> {
        let mut state = self.state.borrow_mut();
        let device = DeviceHandle(1);
        state.device = Some(device);
        Some(device)
    }

    fn close_device(&mut self, device: DeviceHandle) -> bool {
        let mut state = self.state.borrow_mut();
        if state.device == Some(device) {
            state.device = None;
            true
        } else {
            state.raise(ErrorScope::Device, code::ERR_INVALID_DEVICE);
            false
        }
    }

    fn create_context(
        &mut self,
        device: DeviceHandle,
        _attrs: &[(i32, i32)],
    ) -> Option<ContextHandle> {
        let mut state = self.state.borrow_mut();
        if state.device != Some(device) {
            state.raise(ErrorScope::Device, code::ERR_INVALID_DEVICE);
            return None;
        }
        let context = ContextHandle(1);
        state.context = Some(context);
        Some(context)
    }

    fn make_current(&mut self, context: ContextHandle) -> bool {
        let mut state = self.state.borrow_mut();
        if state.context == Some(context) {
            state.current = Some(context);
            true
        } else {
            state.raise(ErrorScope::Device, code::ERR_INVALID_CONTEXT);
            false
        }
    }

    fn destroy_context(&mut self, context: ContextHandle) {
        let mut state = self.state.borrow_mut();
        if state.context == Some(context) {
            state.context = None;
            state.current = None;
        } else {
            state.raise(ErrorScope::Device, code::ERR_INVALID_CONTEXT);
        }
    }

    fn gen_sources(&mut self, n: usize) -> Vec<SourceId> {
        let mut state = self.state.borrow_mut();
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            if let Some(max) = state.max_sources {
                if state.sources.len() >= max {
                    state.raise(ErrorScope::Context, code::ERR_OUT_OF_MEMORY);
                    break;
                }
            }
            state.next_source += 1;
            let id = SourceId(state.next_source);
            state.sources.insert(id, MockSource::default());
            state.generated_sources += 1;
            state.mutations += 1;
            ids.push(id);
        }
        ids
    }

    fn delete_sources(&mut self, ids: &[SourceId]) {
        let mut state = self.state.borrow_mut();
        for id in ids {
            state.sources.remove(id);
        }
        state.mutations += 1;
    }

    fn gen_buffers(&mut self, n: usize) -> Vec<BufferId> {
        let mut state = self.state.borrow_mut();
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            state.next_buffer += 1;
            let id = BufferId(state.next_buffer);
            state.buffers.insert(id, MockBuffer::default());
            state.generated_buffers += 1;
            state.mutations += 1;
            ids.push(id);
        }
        ids
    }

    fn delete_buffers(&mut self, ids: &[BufferId]) {
        let mut state = self.state.borrow_mut();
        for id in ids {
            state.buffers.remove(id);
        }
        state.mutations += 1;
    }

    fn set_source_f(&mut self, id: SourceId, param: i32, value: f32) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.params_f.insert(param, value);
        }
    }

    fn set_source_fv(&mut self, id: SourceId, param: i32, values: &[f32]) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.params_fv.insert(param, values.to_vec());
        }
    }

    fn set_source_i(&mut self, id: SourceId, param: i32, value: i32) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.params_i.insert(param, value);
        }
    }

    fn get_source_f(&mut self, id: SourceId, param: i32) -> f32 {
        let mut state = self.state.borrow_mut();
        state
            .source_mut(id)
            .and_then(|s| s.params_f.get(&param).copied())
            .unwrap_or(0.0)
    }

    fn get_source_fv(&mut self, id: SourceId, param: i32, out: &mut [f32]) {
        let mut state = self.state.borrow_mut();
        if let Some(values) = state.source_mut(id).and_then(|s| s.params_fv.get(&param)) {
            let n = values.len().min(out.len());
            out[..n].copy_from_slice(&values[..n]);
        } else {
            out.fill(0.0);
        }
    }

    fn get_source_i(&mut self, id: SourceId, param: i32) -> i32 {
        let mut state = self.state.borrow_mut();
        state
            .source_mut(id)
            .and_then(|s| s.params_i.get(&param).copied())
            .unwrap_or(0)
    }

    fn set_listener_f(&mut self, param: i32, value: f32) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        state.listener_f.insert(param, value);
    }

    fn set_listener_fv(&mut self, param: i32, values: &[f32]) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        state.listener_fv.insert(param, values.to_vec());
    }

    fn set_listener_i(&mut self, param: i32, value: i32) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        state.listener_i.insert(param, value);
    }

    fn get_listener_f(&mut self, param: i32) -> f32 {
        self.state
            .borrow()
            .listener_f
            .get(&param)
            .copied()
            .unwrap_or(0.0)
    }

    fn get_listener_fv(&mut self, param: i32, out: &mut [f32]) {
        let state = self.state.borrow();
        if let Some(values) = state.listener_fv.get(&param) {
            let n = values.len().min(out.len());
            out[..n].copy_from_slice(&values[..n]);
        } else {
            out.fill(0.0);
        }
    }

    fn get_listener_i(&mut self, param: i32) -> i32 {
        self.state
            .borrow()
            .listener_i
            .get(&param)
            .copied()
            .unwrap_or(0)
    }

    fn queue_buffers(&mut self, id: SourceId, buffers: &[BufferId]) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        let payloads: Vec<Vec<u8>> = buffers
            .iter()
            .map(|b| {
                state
                    .buffers
                    .get(b)
                    .map(|buf| buf.payload.clone())
                    .unwrap_or_default()
            })
            .collect();
        if let Some(source) = state.source_mut(id) {
            source.attached.extend(buffers.iter().copied());
        } else {
            return;
        }
        state.submissions.entry(id).or_default().extend(payloads);
    }

    fn unqueue_buffers(&mut self, id: SourceId, count: usize) -> Vec<BufferId> {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        let Some(source) = state.source_mut(id) else {
            return Vec::new();
        };
        let take = count.min(source.processed);
        let mut freed = Vec::with_capacity(take);
        for _ in 0..take {
            if let Some(buffer) = source.attached.pop_front() {
                freed.push(buffer);
            }
        }
        source.processed -= freed.len();
        freed
    }

    fn fill_buffer(&mut self, buffer: BufferId, format: BufferFormat, payload: &[u8], rate: u32) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(entry) = state.buffers.get_mut(&buffer) {
            entry.format = Some(format);
            entry.payload = payload.to_vec();
            entry.rate = rate;
        } else {
            state.raise(ErrorScope::Context, code::ERR_INVALID_NAME);
        }
    }

    fn play(&mut self, id: SourceId) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.state = Some(SourceState::Playing);
        }
    }

    fn play_many(&mut self, ids: &[SourceId]) {
        for id in ids {
            self.play(*id);
        }
    }

    fn stop(&mut self, id: SourceId) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.state = Some(SourceState::Stopped);
            // everything attached counts as processed once stopped
            source.processed = source.attached.len();
        }
    }

    fn stop_many(&mut self, ids: &[SourceId]) {
        for id in ids {
            self.stop(*id);
        }
    }

    fn pause(&mut self, id: SourceId) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.state = Some(SourceState::Paused);
        }
    }

    fn pause_many(&mut self, ids: &[SourceId]) {
        for id in ids {
            self.pause(*id);
        }
    }

    fn rewind(&mut self, id: SourceId) {
        let mut state = self.state.borrow_mut();
        state.mutations += 1;
        if let Some(source) = state.source_mut(id) {
            source.state = Some(SourceState::Initial);
        }
    }

    fn rewind_many(&mut self, ids: &[SourceId]) {
        for id in ids {
            self.rewind(*id);
        }
    }

    fn source_state(&mut self, id: SourceId) -> SourceState {
        let mut state = self.state.borrow_mut();
        state
            .source_mut(id)
            .map(|s| s.state())
            .unwrap_or(SourceState::Initial)
    }

    fn buffers_processed(&mut self, id: SourceId) -> usize {
        let mut state = self.state.borrow_mut();
        state.source_mut(id).map(|s| s.processed).unwrap_or(0)
    }

    fn buffers_queued(&mut self, id: SourceId) -> usize {
        let mut state = self.state.borrow_mut();
        state.source_mut(id).map(|s| s.attached.len()).unwrap_or(0)
    }

    fn extension_present(&mut self, name: &str) -> bool {
        self.state.borrow().extensions.iter().any(|e| e == name)
    }

    fn last_error(&mut self, scope: ErrorScope) -> i32 {
        let mut state = self.state.borrow_mut();
        match scope {
            ErrorScope::Device => std::mem::replace(&mut state.device_error, code::NO_ERROR),
            ErrorScope::Context => std::mem::replace(&mut state.context_error, code::NO_ERROR),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unqueue_respects_processed_count() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        let sid = backend.gen_sources(1)[0];
        let buffers = backend.gen_buffers(3);
        backend.queue_buffers(sid, &buffers);

        assert!(backend.unqueue_buffers(sid, 3).is_empty());
        probe.complete_buffers(sid, 2);
        let freed = backend.unqueue_buffers(sid, 3);
        assert_eq!(freed, &buffers[..2]);
        assert_eq!(backend.buffers_queued(sid), 1);
    }

    #[test]
    fn test_error_flag_clears_on_read() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        probe.inject_error(ErrorScope::Context, code::ERR_INVALID_VALUE);
        assert_eq!(
            backend.last_error(ErrorScope::Context),
            code::ERR_INVALID_VALUE
        );
        assert_eq!(backend.last_error(ErrorScope::Context), code::NO_ERROR);
    }

    #[test]
    fn test_bounded_source_pool_raises_out_of_memory() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        probe.set_max_sources(1);
        assert_eq!(backend.gen_sources(1).len(), 1);
        assert!(backend.gen_sources(1).is_empty());
        assert_eq!(
            backend.last_error(ErrorScope::Context),
            code::ERR_OUT_OF_MEMORY
        );
    }
}
