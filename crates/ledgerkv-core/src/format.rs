//! Frame format for incremental persistence
//!
//! In `PersistMode::Incremental` each record is appended as one frame:
//! FrameHeader (12 bytes) + payload (codec-encoded record)

use std::path::Path;

use crate::error::{StoreError, StoreResult};

/// Magic bytes identifying a LedgerKV frame: "LKV1" in ASCII
pub const MAGIC_ARRAY: [u8; 4] = [0x4C, 0x4B, 0x56, 0x31];

/// Header size in bytes
pub const HEADER_SIZE: usize = 12;

/// Fixed-size header preceding every frame payload
///
/// Layout:
///   [0..4]   magic:    [u8;4] - "LKV1"
///   [4..8]   length:   u32 LE - payload length in bytes
///   [8..12]  checksum: u32 LE - CRC32C of payload bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub magic: [u8; 4],
    pub length: u32,
    pub checksum: u32,
}

impl FrameHeader {
    pub fn for_payload(payload: &[u8]) -> Self {
        Self {
            magic: MAGIC_ARRAY,
            length: payload.len() as u32,
            checksum: crc32c::crc32c(payload),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.magic);
        buf[4..8].copy_from_slice(&self.length.to_le_bytes());
        buf[8..12].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Self {
            magic,
            length: u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            checksum: u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
        }
    }
}

/// Wrap an encoded record in a frame ready to append.
pub fn encode_frame(payload: &[u8], path: &Path) -> StoreResult<Vec<u8>> {
    if payload.len() > u32::MAX as usize {
        return Err(StoreError::Encode {
            path: Some(path.to_path_buf()),
            reason: format!("record of {} bytes exceeds frame limit", payload.len()),
        });
    }

    let header = FrameHeader::for_payload(payload);
    let mut buffer = Vec::with_capacity(HEADER_SIZE + payload.len());
    buffer.extend_from_slice(&header.to_bytes());
    buffer.extend_from_slice(payload);
    Ok(buffer)
}

/// Frame payloads read from a buffer, plus where the last whole frame ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frames<'a> {
    pub payloads: Vec<&'a [u8]>,
    /// Bytes covered by complete frames. Anything after is a torn tail.
    pub valid_len: usize,
}

impl Frames<'_> {
    /// True when the buffer ends in an incomplete frame.
    pub fn has_torn_tail(&self, buffer_len: usize) -> bool {
        self.valid_len < buffer_len
    }
}

/// Split a file's contents into frame payloads, in file order.
///
/// An incomplete frame at the end of the buffer is the point where a write
/// was interrupted: it is dropped with a warning and everything before it
/// is returned. Callers must cut the file back to `valid_len` before
/// appending again. Bad magic or a checksum mismatch anywhere is fatal.
pub fn read_frames<'a>(buffer: &'a [u8], path: &Path) -> StoreResult<Frames<'a>> {
    let mut payloads = Vec::new();
    let mut offset = 0usize;

    while offset < buffer.len() {
        if offset + HEADER_SIZE > buffer.len() {
            tracing::warn!(
                path = %path.display(),
                offset,
                available = buffer.len() - offset,
                "torn frame header at end of file, ignoring tail"
            );
            break;
        }

        let header_bytes: [u8; HEADER_SIZE] = buffer[offset..offset + HEADER_SIZE]
            .try_into()
            .map_err(|_| StoreError::Corrupted {
                path: path.to_path_buf(),
                reason: format!("short frame header at offset {}", offset),
            })?;
        let header = FrameHeader::from_bytes(&header_bytes);

        if header.magic != MAGIC_ARRAY {
            return Err(StoreError::Corrupted {
                path: path.to_path_buf(),
                reason: format!(
                    "bad frame magic at offset {}: found {:02x}{:02x}{:02x}{:02x}",
                    offset, header.magic[0], header.magic[1], header.magic[2], header.magic[3]
                ),
            });
        }

        let start = offset + HEADER_SIZE;
        let end = start + header.length as usize;
        if end > buffer.len() {
            tracing::warn!(
                path = %path.display(),
                offset,
                expected = header.length,
                available = buffer.len() - start,
                "torn frame payload at end of file, ignoring tail"
            );
            break;
        }

        let payload = &buffer[start..end];
        let actual = crc32c::crc32c(payload);
        if actual != header.checksum {
            return Err(StoreError::ChecksumMismatch {
                path: path.to_path_buf(),
                expected: header.checksum,
                actual,
                offset: offset as u64,
            });
        }

        payloads.push(payload);
        offset = end;
    }

    Ok(Frames { payloads, valid_len: offset })
}
