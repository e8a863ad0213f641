//! FourCC tags and chunk identifiers

use crate::error::{AviError, Result};
use std::str::FromStr;

/// FourCC (Four Character Code) identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Create from bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }

    /// Create from a byte slice, which must be exactly 4 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; 4] = bytes
            .try_into()
            .map_err(|_| AviError::InvalidTag(String::from_utf8_lossy(bytes).into_owned()))?;
        Ok(FourCC(array))
    }

    /// Get as string
    pub fn as_str(&self) -> String {
        String::from_utf8_lossy(&self.0).to_string()
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl FromStr for FourCC {
    type Err = AviError;

    fn from_str(s: &str) -> Result<Self> {
        FourCC::from_slice(s.as_bytes())
    }
}

impl std::fmt::Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FourCC(\"{}\")", self.as_str())
    }
}

impl std::fmt::Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

impl From<&[u8; 4]> for FourCC {
    fn from(bytes: &[u8; 4]) -> Self {
        FourCC(*bytes)
    }
}

impl AsRef<[u8]> for FourCC {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl TryFrom<&str> for FourCC {
    type Error = AviError;

    fn try_from(s: &str) -> Result<Self> {
        s.parse()
    }
}

impl TryFrom<&[u8]> for FourCC {
    type Error = AviError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        FourCC::from_slice(bytes)
    }
}

/// Well-known chunk IDs
pub mod chunk_ids {
    use super::FourCC;

    pub const RIFF: FourCC = FourCC(*b"RIFF");
    pub const AVI: FourCC = FourCC(*b"AVI ");
    pub const LIST: FourCC = FourCC(*b"LIST");
    pub const HDRL: FourCC = FourCC(*b"hdrl");
    pub const AVIH: FourCC = FourCC(*b"avih");
    pub const STRL: FourCC = FourCC(*b"strl");
    pub const STRH: FourCC = FourCC(*b"strh");
    pub const STRF: FourCC = FourCC(*b"strf");
    pub const MOVI: FourCC = FourCC(*b"movi");
    pub const IDX1: FourCC = FourCC(*b"idx1");
    pub const VIDS: FourCC = FourCC(*b"vids");
}

/// Chunk identifier with stream number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkId {
    /// Raw FourCC
    pub fourcc: FourCC,
    /// Stream number (if applicable)
    pub stream_number: Option<u16>,
    /// Chunk type
    pub chunk_type: ChunkType,
}

impl ChunkId {
    /// Parse chunk ID from FourCC
    pub fn parse(fourcc: FourCC) -> Self {
        let bytes = fourcc.as_bytes();

        // Stream data chunks look like "00dc", "01wb"
        if bytes[0].is_ascii_digit() && bytes[1].is_ascii_digit() {
            let stream_num = ((bytes[0] - b'0') as u16) * 10 + ((bytes[1] - b'0') as u16);

            let chunk_type = match &bytes[2..4] {
                b"dc" | b"DC" => ChunkType::VideoCompressed,
                b"db" | b"DB" => ChunkType::VideoUncompressed,
                b"wb" | b"WB" => ChunkType::Audio,
                b"tx" | b"TX" => ChunkType::Text,
                b"ix" | b"IX" => ChunkType::Index,
                b"pc" | b"PC" => ChunkType::PaletteChange,
                _ => ChunkType::Unknown,
            };

            ChunkId {
                fourcc,
                stream_number: Some(stream_num),
                chunk_type,
            }
        } else {
            ChunkId {
                fourcc,
                stream_number: None,
                chunk_type: ChunkType::Unknown,
            }
        }
    }

    /// Create a stream chunk ID. Stream numbers wrap at 100.
    pub fn stream_chunk(stream_num: u16, chunk_type: ChunkType) -> Self {
        let suffix = match chunk_type {
            ChunkType::VideoCompressed => *b"dc",
            ChunkType::VideoUncompressed => *b"db",
            ChunkType::Audio => *b"wb",
            ChunkType::Text => *b"tx",
            ChunkType::Index => *b"ix",
            ChunkType::PaletteChange => *b"pc",
            ChunkType::Unknown => *b"??",
        };

        let stream_num = stream_num % 100;
        let fourcc = FourCC([
            b'0' + (stream_num / 10) as u8,
            b'0' + (stream_num % 10) as u8,
            suffix[0],
            suffix[1],
        ]);

        ChunkId {
            fourcc,
            stream_number: Some(stream_num),
            chunk_type,
        }
    }

    /// Check if this chunk carries video data
    pub fn is_video(&self) -> bool {
        matches!(
            self.chunk_type,
            ChunkType::VideoCompressed | ChunkType::VideoUncompressed
        )
    }
}

/// Chunk type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkType {
    /// Compressed video frame
    VideoCompressed,
    /// Uncompressed video frame
    VideoUncompressed,
    /// Audio data
    Audio,
    /// Text/subtitle
    Text,
    /// Index chunk
    Index,
    /// Palette change
    PaletteChange,
    /// Unknown type
    Unknown,
}
