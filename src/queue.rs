//! Per-source buffer queue upkeep.
//!
//! Each tick a source's backend queue is drained of processed buffers (their
//! ids go back to the pool) and refilled up to the configured depth from the
//! source's pending chunks. Streaming chunks are read in bounded pieces; a
//! partial read leaves a cursor-preserving continuation at the front of the
//! queue and ends this source's refill until the next tick.

use crate::alloc::BufferPool;
use crate::backend::{AudioBackend, BufferFormat, ErrorScope, SourceId, SourceState};
use crate::error::{Result, check};
use crate::sound::QueuedSound;
use crate::world::AuralSource;

/// Queueing limits, taken from `SinkDesc` at each tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct QueuePolicy {
    pub max_depth: usize,
    pub max_chunk: usize,
}

/// Runs one drain/refill pass for a bound source.
pub(crate) fn service_source(
    backend: &mut dyn AudioBackend,
    buffers: &mut BufferPool,
    policy: QueuePolicy,
    sid: SourceId,
    source: &mut AuralSource,
) -> Result<()> {
    // drain: every processed buffer id becomes reusable
    let processed = backend.buffers_processed(sid);
    check(backend, ErrorScope::Context)?;
    if processed > 0 {
        let freed = backend.unqueue_buffers(sid, processed);
        check(backend, ErrorScope::Context)?;
        log::trace!("source {sid:?}: recycled {} buffer id(s)", freed.len());
        buffers.release_many(freed);
    }

    let mut queued = backend.buffers_queued(sid);
    check(backend, ErrorScope::Context)?;

    // refill: bounded by queue depth and by one streaming read per tick
    while queued < policy.max_depth {
        let Some(chunk) = source.pending.pop_front() else {
            break;
        };
        match chunk {
            QueuedSound::Buffered(data) => {
                let result = submit(
                    backend,
                    buffers,
                    sid,
                    data.format(),
                    data.payload(),
                    data.sample_rate(),
                );
                if let Err(err) = result {
                    // the chunk was not handed over; keep it for the next tick
                    source.pending.push_front(QueuedSound::Buffered(data));
                    return Err(err);
                }
                queued += 1;
            }
            QueuedSound::Streaming(mut stream) => {
                let format = stream.format();
                let rate = stream.sample_rate();
                let piece = stream.read_chunk(policy.max_chunk)?;
                if piece.is_empty() {
                    // end of stream; nothing to submit, move on
                    log::debug!("source {sid:?}: stream exhausted, dropping chunk");
                    continue;
                }
                let more = stream.remaining() > 0;
                if more {
                    // remainder keeps its cursor and runs on a later tick
                    source.pending.push_front(QueuedSound::Streaming(stream));
                }
                submit(backend, buffers, sid, format, &piece, rate)?;
                queued += 1;
                if more {
                    break;
                }
            }
        }
    }

    Ok(())
}

/// Fills one buffer, attaches it, and starts playback if the source is not
/// already advancing.
fn submit(
    backend: &mut dyn AudioBackend,
    buffers: &mut BufferPool,
    sid: SourceId,
    format: BufferFormat,
    payload: &[u8],
    rate: u32,
) -> Result<()> {
    let buffer = buffers.acquire(backend)?;

    backend.fill_buffer(buffer, format, payload, rate);
    if let Err(err) = check(backend, ErrorScope::Context) {
        buffers.release(buffer);
        return Err(err);
    }

    backend.queue_buffers(sid, &[buffer]);
    if let Err(err) = check(backend, ErrorScope::Context) {
        buffers.release(buffer);
        return Err(err);
    }

    let state = backend.source_state(sid);
    if !matches!(state, SourceState::Playing | SourceState::Paused) {
        backend.play(sid);
        check(backend, ErrorScope::Context)?;
    }

    Ok(())
}
