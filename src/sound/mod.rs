//! Sound data types and loading.

mod load_options;
mod resampler;
mod symphonia_loader;

pub use load_options::LoadOptions;
pub use resampler::AudioResampler;
pub use symphonia_loader::{load_sound_file, load_sound_file_simple};

use crate::backend::BufferFormat;
use crate::error::{AuralError, Result};
use std::io::{Read, Seek, SeekFrom};
use std::sync::Arc;
use std::time::Duration;

/// Combined `Read + Seek` bound so the streaming reader can be stored as a
/// single trait object alongside the `Send` auto-trait.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// An immutable, fully buffered PCM chunk.
///
/// Cloning is cheap; the payload is shared. Once created the chunk is
/// read-only, so a clone queued on several sources stays consistent.
#[derive(Debug, Clone)]
pub struct AuralSoundData {
    inner: Arc<SoundDataInner>,
}

#[derive(Debug)]
struct SoundDataInner {
    payload: Vec<u8>,
    channels: u16,
    bits: u16,
    sample_rate: u32,
    format: BufferFormat,
}

impl AuralSoundData {
    /// Wraps raw interleaved PCM bytes. Fails with `UnsupportedFormat` when
    /// the channel/bit combination has no backend format tag.
    pub fn from_raw(payload: Vec<u8>, channels: u16, bits: u16, sample_rate: u32) -> Result<Self> {
        let format = BufferFormat::from_spec(channels, bits).ok_or_else(|| {
            AuralError::UnsupportedFormat(format!(
                "{channels} channel(s) at {bits} bits per sample"
            ))
        })?;
        Ok(Self {
            inner: Arc::new(SoundDataInner {
                payload,
                channels,
                bits,
                sample_rate,
                format,
            }),
        })
    }

    pub fn payload(&self) -> &[u8] {
        &self.inner.payload
    }

    pub fn len(&self) -> usize {
        self.inner.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.payload.is_empty()
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn bits(&self) -> u16 {
        self.inner.bits
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn format(&self) -> BufferFormat {
        self.inner.format
    }

    pub fn duration(&self) -> Duration {
        let bytes_per_second =
            self.inner.sample_rate as u64 * self.inner.format.bytes_per_frame() as u64;
        if bytes_per_second == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.inner.payload.len() as f64 / bytes_per_second as f64)
    }
}

/// PCM audio backed by a readable, seekable byte source instead of a fixed
/// payload. Chunks are materialized on demand in bounded pieces; the read
/// cursor is preserved between reads, so a partially consumed stream resumes
/// where it left off and is never re-opened.
pub struct AuralStreamingSound {
    reader: Box<dyn ReadSeek + Send>,
    channels: u16,
    bits: u16,
    sample_rate: u32,
    format: BufferFormat,
    total_len: u64,
    cursor: u64,
}

impl std::fmt::Debug for AuralStreamingSound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuralStreamingSound")
            .field("channels", &self.channels)
            .field("bits", &self.bits)
            .field("sample_rate", &self.sample_rate)
            .field("total_len", &self.total_len)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl AuralStreamingSound {
    pub fn new(
        reader: Box<dyn ReadSeek + Send>,
        channels: u16,
        bits: u16,
        sample_rate: u32,
        total_len: u64,
    ) -> Result<Self> {
        let format = BufferFormat::from_spec(channels, bits).ok_or_else(|| {
            AuralError::UnsupportedFormat(format!(
                "{channels} channel(s) at {bits} bits per sample"
            ))
        })?;
        Ok(Self {
            reader,
            channels,
            bits,
            sample_rate,
            format,
            total_len,
            cursor: 0,
        })
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn bits(&self) -> u16 {
        self.bits
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn format(&self) -> BufferFormat {
        self.format
    }

    pub fn total_len(&self) -> u64 {
        self.total_len
    }

    /// Current read offset in bytes.
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Bytes left between the cursor and the declared total length.
    pub fn remaining(&self) -> u64 {
        self.total_len.saturating_sub(self.cursor)
    }

    /// Reads up to `max_len` bytes from the cursor, advancing it. A short or
    /// empty result means the underlying stream ran out early; an empty
    /// result is treated by the scheduler as end-of-stream.
    pub fn read_chunk(&mut self, max_len: usize) -> Result<Vec<u8>> {
        let want = self.remaining().min(max_len as u64) as usize;
        if want == 0 {
            return Ok(Vec::new());
        }
        let mut chunk = vec![0u8; want];
        let mut filled = 0;
        while filled < want {
            let n = self.reader.read(&mut chunk[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        chunk.truncate(filled);
        self.cursor += filled as u64;
        Ok(chunk)
    }

    /// Repositions the cursor, e.g. to restart a stream from the top.
    pub fn seek_to(&mut self, offset: u64) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.cursor = offset;
        Ok(())
    }
}

/// One entry in a source's pending queue.
#[derive(Debug)]
pub enum QueuedSound {
    Buffered(AuralSoundData),
    Streaming(AuralStreamingSound),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn test_from_raw_rejects_unmapped_formats() {
        assert!(AuralSoundData::from_raw(vec![0; 8], 1, 16, 44100).is_ok());
        let err = AuralSoundData::from_raw(vec![0; 8], 5, 16, 44100).unwrap_err();
        assert!(matches!(err, AuralError::UnsupportedFormat(_)));
        assert!(AuralSoundData::from_raw(vec![0; 8], 2, 24, 44100).is_err());
    }

    #[test]
    fn test_duration_from_payload_size() {
        // one second of 16-bit stereo at 8 kHz = 32000 bytes
        let data = AuralSoundData::from_raw(vec![0; 32000], 2, 16, 8000).unwrap();
        assert_eq!(data.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_chunked_reads_preserve_cursor_and_order() {
        let bytes = pattern(10_000);
        let mut stream = AuralStreamingSound::new(
            Box::new(Cursor::new(bytes.clone())),
            1,
            16,
            44100,
            bytes.len() as u64,
        )
        .unwrap();

        let mut collected = Vec::new();
        loop {
            let chunk = stream.read_chunk(4096).unwrap();
            if chunk.is_empty() {
                break;
            }
            collected.extend_from_slice(&chunk);
        }
        assert_eq!(collected, bytes);
        assert_eq!(stream.remaining(), 0);
    }

    #[test]
    fn test_read_past_end_is_empty() {
        let mut stream =
            AuralStreamingSound::new(Box::new(Cursor::new(vec![1u8; 16])), 1, 8, 22050, 16)
                .unwrap();
        assert_eq!(stream.read_chunk(64).unwrap().len(), 16);
        assert!(stream.read_chunk(64).unwrap().is_empty());
    }

    #[test]
    fn test_seek_resets_cursor() {
        let bytes = pattern(256);
        let mut stream = AuralStreamingSound::new(
            Box::new(Cursor::new(bytes.clone())),
            1,
            8,
            22050,
            bytes.len() as u64,
        )
        .unwrap();
        stream.read_chunk(200).unwrap();
        stream.seek_to(0).unwrap();
        assert_eq!(stream.position(), 0);
        assert_eq!(stream.read_chunk(256).unwrap(), bytes);
    }
}
