//! AVI demuxer

use crate::chunks::{chunk_ids, ChunkId, ChunkType, FourCC};
use crate::error::{AviError, Result};
use crate::index::{parse_index, IndexEntry};
use crate::riff::{ChunkView, ListView, RiffEntry, RiffReader};
use crate::source::{EncodedFrame, FrameSource};
use crate::types::{AviHeader, StreamHeader, StreamType, VideoFormat};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// Stream information
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream index
    pub index: u32,
    /// Stream header
    pub header: StreamHeader,
    /// Video format (if video stream)
    pub video_format: Option<VideoFormat>,
}

impl StreamInfo {
    /// Check if this is a video stream
    pub fn is_video(&self) -> bool {
        self.header.stream_type == StreamType::Video
    }

    /// Get frame rate for video streams
    pub fn frame_rate(&self) -> f64 {
        self.header.frame_rate()
    }

    /// Get duration in seconds
    pub fn duration(&self) -> f64 {
        if self.header.rate > 0 && self.header.scale > 0 {
            (self.header.length as f64 * self.header.scale as f64) / self.header.rate as f64
        } else {
            0.0
        }
    }
}

/// Stream data chunk read from `movi`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AviPacket {
    /// Stream index
    pub stream_index: u32,
    /// Chunk tag (`00dc`, ...)
    pub tag: FourCC,
    /// Packet data
    pub data: Vec<u8>,
    /// Position of the packet within its stream
    pub timestamp: u64,
    /// Is keyframe
    pub key_frame: bool,
}

#[derive(Debug, Clone, Copy)]
struct FrameRef {
    chunk: ChunkView,
    stream_index: u32,
    timestamp: u64,
    key_frame: bool,
}

/// AVI demuxer over any seekable source.
///
/// The structure is walked once on open; payloads are only read when a frame
/// is requested. A file cut short is not an error: every complete frame stays
/// readable and [`AviDemuxer::is_truncated`] reports the damage.
///
/// Frames of the video stream are pulled through [`FrameSource::next_frame`].
pub struct AviDemuxer<R: Read + Seek> {
    reader: RiffReader<R>,
    header: AviHeader,
    streams: Vec<StreamInfo>,
    index: Vec<IndexEntry>,
    frames: Vec<FrameRef>,
    movi: Option<ListView>,
    video_tag: FourCC,
    position: usize,
    truncated: bool,
}

impl<R: Read + Seek> AviDemuxer<R> {
    /// Open an AVI file and parse its headers and index.
    pub fn open(source: R) -> Result<Self> {
        let mut reader = RiffReader::open(source)?;
        if reader.root().list_type != chunk_ids::AVI {
            return Err(AviError::InvalidAvi);
        }

        let mut header = None;
        let mut streams: Vec<StreamInfo> = Vec::new();
        let mut index = Vec::new();
        let mut chunks = Vec::new();
        let mut movi: Option<ListView> = None;

        while let Some(entry) = reader.next_entry()? {
            let chunk = match entry {
                RiffEntry::List(list) => {
                    if list.list_type == chunk_ids::MOVI {
                        log::debug!("Found movi list at offset {}, size {}", list.offset, list.size);
                        movi = Some(list);
                    }
                    continue;
                }
                RiffEntry::Chunk(chunk) => chunk,
            };

            match chunk.tag {
                id if id == chunk_ids::AVIH => {
                    let parsed = AviHeader::parse(&reader.read_all(&chunk)?)?;
                    log::debug!(
                        "AVI header: {}x{}, {} frames, {:.2} fps",
                        parsed.width,
                        parsed.height,
                        parsed.total_frames,
                        parsed.frame_rate()
                    );
                    header = Some(parsed);
                }
                id if id == chunk_ids::STRH => {
                    let stream = StreamInfo {
                        index: streams.len() as u32,
                        header: StreamHeader::parse(&reader.read_all(&chunk)?)?,
                        video_format: None,
                    };
                    log::debug!("Added stream {}: {:?}", stream.index, stream.header.stream_type);
                    streams.push(stream);
                }
                id if id == chunk_ids::STRF => {
                    // strf describes the stream whose strh precedes it.
                    if let Some(stream) = streams.last_mut() {
                        if stream.is_video() && stream.video_format.is_none() {
                            stream.video_format = Some(VideoFormat::parse(&reader.read_all(&chunk)?)?);
                        }
                    }
                }
                id if id == chunk_ids::IDX1 => {
                    index = parse_index(&reader.read_all(&chunk)?);
                    log::debug!("Parsed {} index entries", index.len());
                }
                _ if movi.is_some_and(|m| m.children_offset() <= chunk.offset && chunk.offset < m.end()) => {
                    chunks.push(chunk);
                }
                _ => {
                    log::debug!("Skipping chunk: {}", chunk.tag);
                }
            }
        }

        let header = header.ok_or(AviError::MissingChunk("avih"))?;
        let truncated = reader.is_broken()
            || reader.root().truncated
            || movi.is_some_and(|m| m.truncated);
        if truncated {
            log::warn!("AVI is truncated, {} complete data chunks recovered", chunks.len());
        }

        let video_stream = streams.iter().find(|s| s.is_video()).map_or(0, |s| s.index);
        let video_tag = ChunkId::stream_chunk(video_stream as u16, ChunkType::VideoCompressed).fourcc;

        Ok(AviDemuxer {
            frames: resolve_frames(&chunks, &index),
            reader,
            header,
            streams,
            index,
            movi,
            video_tag,
            position: 0,
            truncated,
        })
    }

    /// Get AVI header
    pub fn header(&self) -> &AviHeader {
        &self.header
    }

    /// Get all streams
    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    /// Get video stream (first one)
    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.is_video())
    }

    /// Number of complete stream data chunks in `movi`
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Get index entries
    pub fn index(&self) -> &[IndexEntry] {
        &self.index
    }

    /// The `movi` list, if one was found
    pub fn movi(&self) -> Option<&ListView> {
        self.movi.as_ref()
    }

    /// Whether the file ended before its declared size
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Read the next packet of any stream.
    pub fn read_packet(&mut self) -> Result<Option<AviPacket>> {
        let Some(frame) = self.frames.get(self.position).copied() else {
            return Ok(None);
        };
        self.position += 1;

        Ok(Some(AviPacket {
            stream_index: frame.stream_index,
            tag: frame.chunk.tag,
            data: self.reader.read_all(&frame.chunk)?,
            timestamp: frame.timestamp,
            key_frame: frame.key_frame,
        }))
    }

    /// Read the next packet carrying `tag`, skipping all others.
    pub fn next_frame_for(&mut self, tag: impl AsRef<[u8]>) -> Result<Option<AviPacket>> {
        let tag = FourCC::from_slice(tag.as_ref())?;
        while let Some(frame) = self.frames.get(self.position) {
            if frame.chunk.tag == tag {
                return self.read_packet();
            }
            self.position += 1;
        }
        Ok(None)
    }

    /// Reset to beginning
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Give back the underlying source.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }
}

impl<R: Read + Seek> FrameSource for AviDemuxer<R> {
    fn next_frame(&mut self) -> Result<Option<EncodedFrame>> {
        let tag = self.video_tag;
        Ok(self
            .next_frame_for(tag)?
            .map(|packet| EncodedFrame::new(packet.data, packet.key_frame)))
    }
}

/// Pair each data chunk with its stream position and key-frame flag. The
/// n-th idx1 record of a tag describes the n-th chunk with that tag; without
/// a record every frame counts as a key frame.
fn resolve_frames(chunks: &[ChunkView], index: &[IndexEntry]) -> Vec<FrameRef> {
    let mut keys: HashMap<FourCC, Vec<bool>> = HashMap::new();
    for entry in index {
        keys.entry(entry.chunk_id).or_default().push(entry.is_keyframe());
    }

    let mut counters: HashMap<FourCC, u64> = HashMap::new();
    chunks
        .iter()
        .map(|chunk| {
            let counter = counters.entry(chunk.tag).or_insert(0);
            let timestamp = *counter;
            *counter += 1;

            let key_frame = keys
                .get(&chunk.tag)
                .and_then(|flags| flags.get(timestamp as usize))
                .copied()
                .unwrap_or(true);

            FrameRef {
                chunk: *chunk,
                stream_index: ChunkId::parse(chunk.tag).stream_number.unwrap_or(0) as u32,
                timestamp,
                key_frame,
            }
        })
        .collect()
}
