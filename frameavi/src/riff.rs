//! Streaming RIFF chunk writer and reader.
//!
//! The writer never buffers payloads. Opening a chunk writes its tag and a
//! zero placeholder length; closing it seeks back and patches the size field
//! with the number of bytes written since. Open chunks form a stack, so only
//! the innermost one accepts writes, and a list can only be closed once all of
//! its children are.
//!
//! The reader walks a RIFF tree depth-first: a `LIST` header is reported and
//! then descended into, a plain chunk is reported and stepped over.

use crate::chunks::{chunk_ids, FourCC};
use crate::error::{AviError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};

/// Size of a chunk header (tag + size field).
pub const CHUNK_HEADER_SIZE: u64 = 8;

/// Size of a list header (`LIST` + size field + list type).
pub const LIST_HEADER_SIZE: u64 = 12;

/// Handle to a chunk or list opened on a [`RiffWriter`].
///
/// A handle only records where the chunk lives; the writer decides whether it
/// is still open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkHandle {
    id: u64,
    offset: u64,
    tag: FourCC,
    list_type: Option<FourCC>,
}

impl ChunkHandle {
    /// Absolute position of the tag.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Absolute position of the 32-bit size field.
    pub fn size_field_offset(&self) -> u64 {
        self.offset + 4
    }

    /// Absolute position of the first payload byte. For lists this is the
    /// list type, which counts as payload.
    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE
    }

    /// Chunk tag (`LIST` or `RIFF` for lists).
    pub fn tag(&self) -> FourCC {
        self.tag
    }

    /// List type, `None` for plain chunks.
    pub fn list_type(&self) -> Option<FourCC> {
        self.list_type
    }

    fn describe(&self) -> String {
        match self.list_type {
            Some(list_type) => format!("{}:{}", self.tag, list_type),
            None => self.tag.to_string(),
        }
    }
}

/// Writes a RIFF tree into a seekable sink.
///
/// The root `RIFF` list is opened by [`RiffWriter::new`] and closed by
/// [`RiffWriter::finish`]. Dropping an unfinished writer patches every open
/// size field on a best-effort basis.
pub struct RiffWriter<W: Write + Seek> {
    sink: Option<W>,
    open: Vec<ChunkHandle>,
    root: ChunkHandle,
    next_id: u64,
}

impl<W: Write + Seek> RiffWriter<W> {
    /// Start a RIFF file of the given form type at the sink's current position.
    pub fn new(mut sink: W, form_type: impl AsRef<[u8]>) -> Result<Self> {
        let form_type = FourCC::from_slice(form_type.as_ref())?;

        let offset = sink.stream_position()?;
        sink.write_all(chunk_ids::RIFF.as_bytes())?;
        sink.write_u32::<LittleEndian>(0)?;
        sink.write_all(form_type.as_bytes())?;

        let root = ChunkHandle {
            id: 0,
            offset,
            tag: chunk_ids::RIFF,
            list_type: Some(form_type),
        };

        log::debug!("RIFF '{}' opened at {}", form_type, offset);

        Ok(RiffWriter {
            sink: Some(sink),
            open: vec![root.clone()],
            root,
            next_id: 1,
        })
    }

    /// Handle of the root `RIFF` list.
    pub fn root(&self) -> &ChunkHandle {
        &self.root
    }

    /// Open a chunk. Fails with [`AviError::InvalidTag`] before writing
    /// anything if the tag is not exactly four bytes.
    pub fn create_chunk(&mut self, tag: impl AsRef<[u8]>) -> Result<ChunkHandle> {
        let tag = FourCC::from_slice(tag.as_ref())?;
        self.open_handle(tag, None)
    }

    /// Open a `LIST` of the given type.
    pub fn create_list(&mut self, list_type: impl AsRef<[u8]>) -> Result<ChunkHandle> {
        let list_type = FourCC::from_slice(list_type.as_ref())?;
        self.open_handle(chunk_ids::LIST, Some(list_type))
    }

    fn open_handle(&mut self, tag: FourCC, list_type: Option<FourCC>) -> Result<ChunkHandle> {
        let sink = self.sink()?;
        let offset = sink.stream_position()?;
        sink.write_all(tag.as_bytes())?;
        sink.write_u32::<LittleEndian>(0)?;
        if let Some(list_type) = list_type {
            sink.write_all(list_type.as_bytes())?;
        }

        let handle = ChunkHandle {
            id: self.next_id,
            offset,
            tag,
            list_type,
        };
        self.next_id += 1;
        self.open.push(handle.clone());

        Ok(handle)
    }

    /// Append payload bytes to the innermost open chunk.
    pub fn write(&mut self, handle: &ChunkHandle, data: &[u8]) -> Result<()> {
        self.ensure_innermost(handle)?;
        self.sink()?.write_all(data)?;
        Ok(())
    }

    /// Append a single byte to the innermost open chunk.
    pub fn write_byte(&mut self, handle: &ChunkHandle, value: u8) -> Result<()> {
        self.ensure_innermost(handle)?;
        self.sink()?.write_u8(value)?;
        Ok(())
    }

    /// Close a chunk and return its declared size.
    ///
    /// The size field receives the byte count written since the header. If
    /// that count is odd, a zero pad byte follows; it is not part of the
    /// declared size.
    pub fn close(&mut self, handle: &ChunkHandle) -> Result<u32> {
        self.ensure_innermost(handle)?;

        let end = self.sink()?.stream_position()?;
        if end < handle.data_offset() {
            return Err(AviError::InvalidParameter(format!(
                "cursor at {} is before the payload of '{}' at {}",
                end,
                handle.describe(),
                handle.data_offset()
            )));
        }
        self.open.pop();

        let sink = self.sink()?;
        let size = end - handle.data_offset();
        let size = u32::try_from(size).map_err(|_| AviError::ChunkTooLarge {
            tag: handle.describe(),
            size,
        })?;

        sink.seek(SeekFrom::Start(handle.size_field_offset()))?;
        sink.write_u32::<LittleEndian>(size)?;
        sink.seek(SeekFrom::Start(end))?;

        if size % 2 != 0 {
            sink.write_u8(0)?;
        }

        Ok(size)
    }

    /// Write a complete chunk in one call and return its declared size.
    pub fn write_chunk(&mut self, tag: impl AsRef<[u8]>, data: &[u8]) -> Result<u32> {
        let chunk = self.create_chunk(tag)?;
        self.write(&chunk, data)?;
        self.close(&chunk)
    }

    /// Whether the handle is still open on this writer.
    pub fn is_open(&self, handle: &ChunkHandle) -> bool {
        self.open.iter().any(|h| h.id == handle.id)
    }

    /// Number of currently open chunks, the root included.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    /// Current absolute position of the sink.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.sink()?.stream_position()?)
    }

    /// Move the cursor back to `offset` to rewrite already written content.
    pub fn rewind_to(&mut self, offset: u64) -> Result<()> {
        self.sink()?.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Move the cursor to the end of the stream and return its position.
    pub fn seek_to_end(&mut self) -> Result<u64> {
        Ok(self.sink()?.seek(SeekFrom::End(0))?)
    }

    /// Replace already written bytes at `offset`, then return to the current
    /// position. No chunk is opened or closed, so a write that fails halfway
    /// leaves every size field as it was.
    pub fn overwrite(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let sink = self.sink()?;
        let resume = sink.stream_position()?;
        let end = sink.seek(SeekFrom::End(0))?;
        if offset + data.len() as u64 > end {
            sink.seek(SeekFrom::Start(resume))?;
            return Err(AviError::InvalidParameter(format!(
                "overwrite of {} bytes at {} runs past the end of the stream at {}",
                data.len(),
                offset,
                end
            )));
        }

        sink.seek(SeekFrom::Start(offset))?;
        sink.write_all(data)?;
        sink.seek(SeekFrom::Start(resume))?;
        Ok(())
    }

    /// Forget every chunk opened after `handle` without patching their size
    /// fields. Returns how many were dropped.
    pub fn discard_above(&mut self, handle: &ChunkHandle) -> Result<usize> {
        let Some(depth) = self.open.iter().position(|h| h.id == handle.id) else {
            return Err(AviError::UseAfterClose {
                tag: handle.describe(),
                offset: handle.offset,
            });
        };
        let dropped = self.open.split_off(depth + 1);
        for chunk in &dropped {
            log::debug!("Discarding open chunk '{}' at {}", chunk.describe(), chunk.offset);
        }
        Ok(dropped.len())
    }

    /// Close every open chunk innermost first, the root included, flush the
    /// sink and hand it back.
    pub fn finish(mut self) -> Result<W> {
        self.close_all()?;
        let mut sink = self.sink.take().ok_or(AviError::Finalized)?;
        sink.flush()?;
        Ok(sink)
    }

    /// Close every open chunk, continuing past failures so that every
    /// reachable size field gets patched. Returns the first error.
    fn close_all(&mut self) -> Result<()> {
        let mut first_error = None;
        while let Some(handle) = self.open.last().cloned() {
            if let Err(e) = self.close(&handle) {
                log::warn!("Failed to close '{}' at {}: {}", handle.describe(), handle.offset, e);
                // A close that fails before patching leaves the handle open.
                if self.is_open(&handle) {
                    self.open.pop();
                }
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn ensure_innermost(&self, handle: &ChunkHandle) -> Result<()> {
        match self.open.last() {
            Some(top) if top.id == handle.id => Ok(()),
            Some(top) if self.is_open(handle) => Err(AviError::OutOfOrder {
                tag: handle.describe(),
                offset: handle.offset,
                open: top.describe(),
            }),
            _ => Err(AviError::UseAfterClose {
                tag: handle.describe(),
                offset: handle.offset,
            }),
        }
    }

    fn sink(&mut self) -> Result<&mut W> {
        self.sink.as_mut().ok_or(AviError::Finalized)
    }
}

impl<W: Write + Seek> Drop for RiffWriter<W> {
    fn drop(&mut self) {
        if self.sink.is_none() || self.open.is_empty() {
            return;
        }
        log::warn!(
            "RIFF writer dropped with {} open chunk(s), patching sizes",
            self.open.len()
        );
        let _ = self.close_all();
        if let Some(sink) = self.sink.as_mut() {
            let _ = sink.flush();
        }
    }
}

/// A plain chunk seen by [`RiffReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkView {
    /// Absolute position of the tag
    pub offset: u64,
    /// Chunk tag
    pub tag: FourCC,
    /// Declared payload size
    pub size: u32,
}

impl ChunkView {
    /// Absolute position of the payload
    pub fn data_offset(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE
    }

    /// Position right after the payload and its pad byte
    pub fn end(&self) -> u64 {
        self.data_offset() + padded_size(self.size)
    }
}

/// A `LIST` (or the `RIFF` root) seen by [`RiffReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListView {
    /// Absolute position of the `LIST` tag
    pub offset: u64,
    /// `LIST` or `RIFF`
    pub tag: FourCC,
    /// Declared size, list type included
    pub size: u32,
    /// List type (`hdrl`, `movi`, ...)
    pub list_type: FourCC,
    /// Declared extent runs past the end of the stream
    pub truncated: bool,
}

impl ListView {
    /// Absolute position of the first child
    pub fn children_offset(&self) -> u64 {
        self.offset + LIST_HEADER_SIZE
    }

    /// Position right after the list
    pub fn end(&self) -> u64 {
        self.offset + CHUNK_HEADER_SIZE + padded_size(self.size)
    }
}

/// Entity produced by the RIFF walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiffEntry {
    List(ListView),
    Chunk(ChunkView),
}

impl RiffEntry {
    pub fn offset(&self) -> u64 {
        match self {
            RiffEntry::List(list) => list.offset,
            RiffEntry::Chunk(chunk) => chunk.offset,
        }
    }

    pub fn tag(&self) -> FourCC {
        match self {
            RiffEntry::List(list) => list.tag,
            RiffEntry::Chunk(chunk) => chunk.tag,
        }
    }

    pub fn size(&self) -> u32 {
        match self {
            RiffEntry::List(list) => list.size,
            RiffEntry::Chunk(chunk) => chunk.size,
        }
    }

    pub fn end(&self) -> u64 {
        match self {
            RiffEntry::List(list) => list.end(),
            RiffEntry::Chunk(chunk) => chunk.end(),
        }
    }
}

/// Depth-first reader over a RIFF source.
///
/// Corruption never raises: when the next header cannot be read, or a chunk
/// claims more bytes than remain, the walk stops and [`is_broken`] turns true.
/// Only I/O failures are reported as errors.
///
/// [`is_broken`]: RiffReader::is_broken
pub struct RiffReader<R: Read + Seek> {
    source: R,
    root: ListView,
    len: u64,
    cursor: u64,
    broken: bool,
}

impl<R: Read + Seek> RiffReader<R> {
    /// Read the root header at the source's current position.
    pub fn open(mut source: R) -> Result<Self> {
        let origin = source.stream_position()?;
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(origin))?;

        if len.saturating_sub(origin) < LIST_HEADER_SIZE {
            return Err(AviError::InvalidRiff);
        }

        let mut tag = [0u8; 4];
        source.read_exact(&mut tag)?;
        if FourCC(tag) != chunk_ids::RIFF {
            return Err(AviError::InvalidRiff);
        }
        let size = source.read_u32::<LittleEndian>()?;
        let mut form_type = [0u8; 4];
        source.read_exact(&mut form_type)?;

        let root = ListView {
            offset: origin,
            tag: chunk_ids::RIFF,
            size,
            list_type: FourCC(form_type),
            truncated: origin + CHUNK_HEADER_SIZE + size as u64 > len,
        };

        log::debug!(
            "Opened RIFF '{}', declared size {}, stream length {}",
            root.list_type,
            size,
            len
        );

        Ok(RiffReader {
            source,
            root,
            len,
            cursor: root.children_offset(),
            broken: false,
        })
    }

    /// Root `RIFF` list.
    pub fn root(&self) -> &ListView {
        &self.root
    }

    /// Total stream length.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Whether the stream is empty past the root header.
    pub fn is_empty(&self) -> bool {
        self.len <= self.root.children_offset()
    }

    /// Whether the walk stopped on a broken entity.
    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Restart the walk at the first child of the root.
    pub fn reset(&mut self) {
        self.cursor = self.root.children_offset();
        self.broken = false;
    }

    /// Read the next entity of the walk, `None` at end of stream or after a
    /// broken entity.
    pub fn next_entry(&mut self) -> Result<Option<RiffEntry>> {
        if self.broken {
            return Ok(None);
        }

        let remaining = self.len.saturating_sub(self.cursor);
        if remaining == 0 {
            return Ok(None);
        }
        if remaining < CHUNK_HEADER_SIZE {
            return Ok(self.mark_broken("header"));
        }

        let offset = self.cursor;
        self.source.seek(SeekFrom::Start(offset))?;
        let mut tag = [0u8; 4];
        self.source.read_exact(&mut tag)?;
        let tag = FourCC(tag);
        let size = self.source.read_u32::<LittleEndian>()?;

        if tag == chunk_ids::LIST {
            if remaining < LIST_HEADER_SIZE {
                return Ok(self.mark_broken("list type"));
            }
            if size < 4 {
                return Ok(self.mark_broken("list size"));
            }
            let mut list_type = [0u8; 4];
            self.source.read_exact(&mut list_type)?;

            let list = ListView {
                offset,
                tag,
                size,
                list_type: FourCC(list_type),
                truncated: offset + CHUNK_HEADER_SIZE + size as u64 > self.len,
            };
            if list.truncated {
                log::debug!("List '{}' at {} is truncated", list.list_type, offset);
            }
            self.cursor = list.children_offset();
            return Ok(Some(RiffEntry::List(list)));
        }

        let chunk = ChunkView { offset, tag, size };
        if chunk.data_offset() + size as u64 > self.len {
            return Ok(self.mark_broken("payload"));
        }
        self.cursor = chunk.end().min(self.len);
        Ok(Some(RiffEntry::Chunk(chunk)))
    }

    fn mark_broken(&mut self, what: &str) -> Option<RiffEntry> {
        log::debug!("Broken {} at offset {}, stopping walk", what, self.cursor);
        self.broken = true;
        None
    }

    /// Read a chunk's declared payload. The walk position is not affected.
    pub fn read_all(&mut self, chunk: &ChunkView) -> Result<Vec<u8>> {
        let available = self.len.saturating_sub(chunk.data_offset());
        if (chunk.size as u64) > available {
            return Err(AviError::InsufficientData {
                needed: chunk.size as usize,
                available: available as usize,
            });
        }

        self.source.seek(SeekFrom::Start(chunk.data_offset()))?;
        let mut data = vec![0u8; chunk.size as usize];
        self.source.read_exact(&mut data)?;
        Ok(data)
    }

    /// Continue the walk after `entry` without visiting its payload. For a
    /// list this skips all of its children.
    pub fn skip_to_end(&mut self, entry: &RiffEntry) {
        self.cursor = entry.end().min(self.len);
    }

    /// Iterate over the remaining entities of the walk.
    pub fn entries(&mut self) -> Entries<'_, R> {
        Entries {
            reader: self,
            done: false,
        }
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> R {
        self.source
    }
}

/// Iterator returned by [`RiffReader::entries`]. Ends after the first I/O
/// error.
pub struct Entries<'a, R: Read + Seek> {
    reader: &'a mut RiffReader<R>,
    done: bool,
}

impl<R: Read + Seek> Iterator for Entries<'_, R> {
    type Item = Result<RiffEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Size rounded up to the RIFF word boundary.
pub fn padded_size(size: u32) -> u64 {
    (size as u64 + 1) & !1
}
