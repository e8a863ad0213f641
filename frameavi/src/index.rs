//! Legacy `idx1` index.
//!
//! Offsets are relative to the `movi` list payload, i.e. the position of the
//! `movi` type tag, so the first data chunk sits at offset 4.

use crate::chunks::FourCC;
use crate::error::{AviError, Result};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

bitflags! {
    /// `dwFlags` of an idx1 record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct IndexFlags: u32 {
        /// Chunk is a LIST
        const LIST = 0x0000_0001;
        /// Chunk holds a complete frame (key frame)
        const KEYFRAME = 0x0000_0010;
        /// Chunk does not affect timing
        const NO_TIME = 0x0000_0100;
    }
}

/// Offset of the first data chunk inside `movi`.
pub const FIRST_CHUNK_OFFSET: u32 = 4;

/// Bookkeeping for one frame written into `movi`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameIndexEntry {
    /// Data chunk tag (`00dc`)
    pub tag: FourCC,
    /// Declared payload length
    pub length: u32,
    /// A pad byte follows the payload
    pub padded: bool,
    /// Frame is a key frame
    pub key_frame: bool,
}

impl FrameIndexEntry {
    pub fn new(tag: FourCC, length: u32, key_frame: bool) -> Self {
        FrameIndexEntry {
            tag,
            length,
            padded: length % 2 != 0,
            key_frame,
        }
    }

    /// Bytes this entry occupies in `movi`: header, payload and pad byte.
    pub fn stored_size(&self) -> u64 {
        8 + self.length as u64 + self.padded as u64
    }
}

/// idx1 record (AVIOLDINDEX entry)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Chunk ID
    pub chunk_id: FourCC,
    /// Flags
    pub flags: IndexFlags,
    /// Offset relative to the movi payload
    pub offset: u32,
    /// Size of chunk data
    pub size: u32,
}

impl IndexEntry {
    /// Encoded size
    pub const SIZE: usize = 16;

    /// Read from data
    pub fn read(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(AviError::InsufficientData {
                needed: Self::SIZE,
                available: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let mut id_bytes = [0u8; 4];
        cursor.read_exact(&mut id_bytes)?;

        Ok(IndexEntry {
            chunk_id: FourCC(id_bytes),
            flags: IndexFlags::from_bits_retain(cursor.read_u32::<LittleEndian>()?),
            offset: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Write to writer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(self.chunk_id.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.flags.bits())?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.size)?;
        Ok(())
    }

    /// Check if this is a keyframe
    pub fn is_keyframe(&self) -> bool {
        self.flags.contains(IndexFlags::KEYFRAME)
    }
}

/// Collects one entry per written frame and lays out the idx1 payload.
#[derive(Debug, Clone, Default)]
pub struct IndexBuilder {
    entries: Vec<FrameIndexEntry>,
}

impl IndexBuilder {
    pub fn new() -> Self {
        IndexBuilder::default()
    }

    /// Record a frame, in playback order.
    pub fn push(&mut self, entry: FrameIndexEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[FrameIndexEntry] {
        &self.entries
    }

    /// idx1 records with running offsets.
    ///
    /// Fails with [`AviError::ChunkTooLarge`] once an offset no longer fits
    /// the 32-bit field.
    pub fn records(&self) -> Result<Vec<IndexEntry>> {
        let mut offset = FIRST_CHUNK_OFFSET as u64;
        let mut records = Vec::with_capacity(self.entries.len());

        for entry in &self.entries {
            let record_offset = u32::try_from(offset).map_err(|_| AviError::ChunkTooLarge {
                tag: "movi".into(),
                size: offset,
            })?;
            let flags = if entry.key_frame {
                IndexFlags::KEYFRAME
            } else {
                IndexFlags::empty()
            };

            records.push(IndexEntry {
                chunk_id: entry.tag,
                flags,
                offset: record_offset,
                size: entry.length,
            });
            offset += entry.stored_size();
        }
        Ok(records)
    }

    /// Serialized idx1 payload, 16 bytes per entry.
    pub fn build(&self) -> Result<Vec<u8>> {
        let records = self.records()?;
        let mut data = Vec::with_capacity(records.len() * IndexEntry::SIZE);
        for record in &records {
            record.write(&mut data)?;
        }
        Ok(data)
    }
}

/// Build the idx1 payload for a sequence of frame entries.
pub fn build_index(entries: &[FrameIndexEntry]) -> Result<Vec<u8>> {
    let mut builder = IndexBuilder::new();
    for entry in entries {
        builder.push(*entry);
    }
    builder.build()
}

/// Parse an idx1 payload. A trailing partial record is ignored.
pub fn parse_index(data: &[u8]) -> Vec<IndexEntry> {
    data.chunks_exact(IndexEntry::SIZE)
        .filter_map(|record| IndexEntry::read(record).ok())
        .collect()
}
