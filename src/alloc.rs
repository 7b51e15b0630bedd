//! Pooling of scarce backend ids.
//!
//! Source and buffer ids are finite backend resources. Both pools hand back
//! released ids before asking the backend to generate new ones, and neither
//! deletes an id before sink teardown.

use crate::backend::{AudioBackend, BufferId, ErrorScope, SourceId};
use crate::error::{AuralError, Result};
use std::collections::HashMap;
use uuid::Uuid;

/// Binds application source handles to backend source ids.
///
/// At most one handle owns a given id at any time; `release` returns the id
/// to the free list rather than destroying it.
#[derive(Debug, Default)]
pub struct SourcePool {
    bound: HashMap<Uuid, SourceId>,
    owners: HashMap<SourceId, Uuid>,
    free: Vec<SourceId>,
}

impl SourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id_of(&self, handle: Uuid) -> Option<SourceId> {
        self.bound.get(&handle).copied()
    }

    /// Returns the handle's existing id, or binds one from the free list, or
    /// generates a new backend id as a last resort.
    pub fn acquire(&mut self, backend: &mut dyn AudioBackend, handle: Uuid) -> Result<SourceId> {
        if let Some(id) = self.bound.get(&handle) {
            return Ok(*id);
        }
        let id = match self.free.pop() {
            Some(id) => {
                log::trace!("rebinding pooled source id {id:?}");
                id
            }
            None => match backend.gen_sources(1).pop() {
                Some(id) => id,
                None => {
                    let error_code = backend.last_error(ErrorScope::Context);
                    return Err(AuralError::ResourceExhausted(format!(
                        "backend refused a new source id (code {error_code:#06x})"
                    )));
                }
            },
        };
        debug_assert!(!self.owners.contains_key(&id));
        self.bound.insert(handle, id);
        self.owners.insert(id, handle);
        Ok(id)
    }

    /// Unbinds the handle and parks its id for reuse.
    pub fn release(&mut self, handle: Uuid) -> Option<SourceId> {
        let id = self.bound.remove(&handle)?;
        self.owners.remove(&id);
        self.free.push(id);
        Some(id)
    }

    /// Every id this pool has ever been handed, bound or free.
    pub fn all_ids(&self) -> Vec<SourceId> {
        let mut ids: Vec<SourceId> = self.owners.keys().copied().collect();
        ids.extend_from_slice(&self.free);
        ids
    }
}

/// Context-wide free list of backend buffer ids.
#[derive(Debug, Default)]
pub struct BufferPool {
    free: Vec<BufferId>,
    live: Vec<BufferId>,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, backend: &mut dyn AudioBackend) -> Result<BufferId> {
        if let Some(id) = self.free.pop() {
            return Ok(id);
        }
        match backend.gen_buffers(1).pop() {
            Some(id) => {
                self.live.push(id);
                Ok(id)
            }
            None => {
                let error_code = backend.last_error(ErrorScope::Context);
                Err(AuralError::ResourceExhausted(format!(
                    "backend refused a new buffer id (code {error_code:#06x})"
                )))
            }
        }
    }

    pub fn release(&mut self, id: BufferId) {
        self.free.push(id);
    }

    pub fn release_many(&mut self, ids: Vec<BufferId>) {
        self.free.extend(ids);
    }

    /// Every id this pool has ever generated; deleted only at teardown.
    pub fn all_ids(&self) -> &[BufferId] {
        &self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::MockBackend;

    #[test]
    fn test_acquire_is_stable_per_handle() {
        let mut backend = MockBackend::new();
        let mut pool = SourcePool::new();
        let handle = Uuid::new_v4();
        let first = pool.acquire(&mut backend, handle).unwrap();
        let second = pool.acquire(&mut backend, handle).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_released_ids_are_reused_before_growth() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        let mut pool = SourcePool::new();
        for _ in 0..32 {
            let handle = Uuid::new_v4();
            pool.acquire(&mut backend, handle).unwrap();
            pool.release(handle);
        }
        assert_eq!(probe.generated_sources(), 1);
    }

    #[test]
    fn test_exhaustion_surfaces_typed_error() {
        let mut backend = MockBackend::new();
        backend.probe().set_max_sources(1);
        let mut pool = SourcePool::new();
        pool.acquire(&mut backend, Uuid::new_v4()).unwrap();
        let err = pool.acquire(&mut backend, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, AuralError::ResourceExhausted(_)));
    }

    #[test]
    fn test_release_clears_binding_before_reuse() {
        let mut backend = MockBackend::new();
        let mut pool = SourcePool::new();
        let first = Uuid::new_v4();
        let id = pool.acquire(&mut backend, first).unwrap();
        pool.release(first);
        assert!(pool.id_of(first).is_none());

        let second = Uuid::new_v4();
        assert_eq!(pool.acquire(&mut backend, second).unwrap(), id);
        assert_eq!(pool.id_of(second), Some(id));
    }

    #[test]
    fn test_buffer_pool_reuses_freed_ids() {
        let mut backend = MockBackend::new();
        let probe = backend.probe();
        let mut pool = BufferPool::new();
        let a = pool.acquire(&mut backend).unwrap();
        pool.release(a);
        let b = pool.acquire(&mut backend).unwrap();
        assert_eq!(a, b);
        assert_eq!(probe.generated_buffers(), 1);
        assert_eq!(pool.all_ids(), &[a]);
    }
}
