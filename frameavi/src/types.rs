//! AVI header structures and their little-endian wire layout.

use crate::chunks::FourCC;
use crate::error::{AviError, Result};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

bitflags! {
    /// AVI main header flags (`dwFlags` of `avih`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AviFlags: u32 {
        /// File has an idx1 index
        const HAS_INDEX = 0x0000_0010;
        /// Players must use the index for ordering
        const MUST_USE_INDEX = 0x0000_0020;
        /// File is interleaved
        const IS_INTERLEAVED = 0x0000_0100;
        /// Chunk tags can be trusted for key frame detection
        const TRUST_CHUNK_TYPE = 0x0000_0800;
        /// File was captured
        const WAS_CAPTURED = 0x0001_0000;
        /// File is copyrighted
        const IS_COPYRIGHTED = 0x0002_0000;
    }
}

impl AviFlags {
    /// Flags written by [`AviWriter`](crate::AviWriter): `0x0910`.
    pub const WRITER_DEFAULT: AviFlags = AviFlags::HAS_INDEX
        .union(AviFlags::IS_INTERLEAVED)
        .union(AviFlags::TRUST_CHUNK_TYPE);
}

/// AVI main header (avih chunk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AviHeader {
    /// Microseconds per frame
    pub microseconds_per_frame: u32,
    /// Maximum bytes per second
    pub max_bytes_per_sec: u32,
    /// Padding granularity
    pub padding_granularity: u32,
    /// AVI flags
    pub flags: AviFlags,
    /// Total number of frames
    pub total_frames: u32,
    /// Initial frames (for interleaved files)
    pub initial_frames: u32,
    /// Number of streams
    pub streams: u32,
    /// Suggested buffer size
    pub suggested_buffer_size: u32,
    /// Video width
    pub width: u32,
    /// Video height
    pub height: u32,
}

impl AviHeader {
    /// Encoded size, four reserved words included
    pub const SIZE: usize = 56;

    /// Byte offset of `total_frames` inside the encoded header
    pub const TOTAL_FRAMES_OFFSET: usize = 16;

    /// Calculate frame rate in fps
    pub fn frame_rate(&self) -> f64 {
        if self.microseconds_per_frame > 0 {
            1_000_000.0 / self.microseconds_per_frame as f64
        } else {
            0.0
        }
    }

    /// Calculate duration in seconds
    pub fn duration(&self) -> f64 {
        (self.total_frames as f64 * self.microseconds_per_frame as f64) / 1_000_000.0
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.microseconds_per_frame)?;
        writer.write_u32::<LittleEndian>(self.max_bytes_per_sec)?;
        writer.write_u32::<LittleEndian>(self.padding_granularity)?;
        writer.write_u32::<LittleEndian>(self.flags.bits())?;
        writer.write_u32::<LittleEndian>(self.total_frames)?;
        writer.write_u32::<LittleEndian>(self.initial_frames)?;
        writer.write_u32::<LittleEndian>(self.streams)?;
        writer.write_u32::<LittleEndian>(self.suggested_buffer_size)?;
        writer.write_u32::<LittleEndian>(self.width)?;
        writer.write_u32::<LittleEndian>(self.height)?;
        writer.write_all(&[0u8; 16])?; // reserved
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(Self::SIZE);
        self.write(&mut data)?;
        Ok(data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(AviError::InvalidChunk {
                id: *b"avih",
                message: "Header too short".into(),
            });
        }

        let mut cursor = Cursor::new(data);

        Ok(AviHeader {
            microseconds_per_frame: cursor.read_u32::<LittleEndian>()?,
            max_bytes_per_sec: cursor.read_u32::<LittleEndian>()?,
            padding_granularity: cursor.read_u32::<LittleEndian>()?,
            flags: AviFlags::from_bits_retain(cursor.read_u32::<LittleEndian>()?),
            total_frames: cursor.read_u32::<LittleEndian>()?,
            initial_frames: cursor.read_u32::<LittleEndian>()?,
            streams: cursor.read_u32::<LittleEndian>()?,
            suggested_buffer_size: cursor.read_u32::<LittleEndian>()?,
            width: cursor.read_u32::<LittleEndian>()?,
            height: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

impl Default for AviHeader {
    fn default() -> Self {
        AviHeader {
            microseconds_per_frame: 33333, // ~30 fps
            max_bytes_per_sec: 25_000,
            padding_granularity: 0,
            flags: AviFlags::WRITER_DEFAULT,
            total_frames: 0,
            initial_frames: 0,
            streams: 1,
            suggested_buffer_size: 0x10_0000,
            width: 0,
            height: 0,
        }
    }
}

/// Stream header (strh chunk)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    /// Stream type (vids, auds, txts, mids)
    pub stream_type: StreamType,
    /// FourCC handler/codec
    pub handler: FourCC,
    /// Stream flags
    pub flags: u32,
    /// Priority
    pub priority: u16,
    /// Language
    pub language: u16,
    /// Initial frames
    pub initial_frames: u32,
    /// Time scale
    pub scale: u32,
    /// Rate (samples per second = rate/scale)
    pub rate: u32,
    /// Start time
    pub start: u32,
    /// Length (number of frames)
    pub length: u32,
    /// Suggested buffer size
    pub suggested_buffer_size: u32,
    /// Quality (0-10000, `u32::MAX` for unspecified)
    pub quality: u32,
    /// Sample size (0 for variable)
    pub sample_size: u32,
    /// Frame rectangle
    pub frame: Rect,
}

impl StreamHeader {
    /// Encoded size
    pub const SIZE: usize = 56;

    /// `dwQuality` value meaning "driver default"
    pub const QUALITY_UNSPECIFIED: u32 = u32::MAX;

    /// Get frame rate (rate / scale)
    pub fn frame_rate(&self) -> f64 {
        if self.scale > 0 {
            self.rate as f64 / self.scale as f64
        } else {
            0.0
        }
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.stream_type.to_fourcc())?;
        writer.write_all(self.handler.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u16::<LittleEndian>(self.priority)?;
        writer.write_u16::<LittleEndian>(self.language)?;
        writer.write_u32::<LittleEndian>(self.initial_frames)?;
        writer.write_u32::<LittleEndian>(self.scale)?;
        writer.write_u32::<LittleEndian>(self.rate)?;
        writer.write_u32::<LittleEndian>(self.start)?;
        writer.write_u32::<LittleEndian>(self.length)?;
        writer.write_u32::<LittleEndian>(self.suggested_buffer_size)?;
        writer.write_u32::<LittleEndian>(self.quality)?;
        writer.write_u32::<LittleEndian>(self.sample_size)?;
        writer.write_i16::<LittleEndian>(self.frame.left)?;
        writer.write_i16::<LittleEndian>(self.frame.top)?;
        writer.write_i16::<LittleEndian>(self.frame.right)?;
        writer.write_i16::<LittleEndian>(self.frame.bottom)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(Self::SIZE);
        self.write(&mut data)?;
        Ok(data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(AviError::InvalidChunk {
                id: *b"strh",
                message: "Stream header too short".into(),
            });
        }

        let mut cursor = Cursor::new(data);

        let mut type_bytes = [0u8; 4];
        cursor.read_exact(&mut type_bytes)?;

        let mut handler = [0u8; 4];
        cursor.read_exact(&mut handler)?;

        Ok(StreamHeader {
            stream_type: StreamType::from_fourcc(&type_bytes),
            handler: FourCC(handler),
            flags: cursor.read_u32::<LittleEndian>()?,
            priority: cursor.read_u16::<LittleEndian>()?,
            language: cursor.read_u16::<LittleEndian>()?,
            initial_frames: cursor.read_u32::<LittleEndian>()?,
            scale: cursor.read_u32::<LittleEndian>()?,
            rate: cursor.read_u32::<LittleEndian>()?,
            start: cursor.read_u32::<LittleEndian>()?,
            length: cursor.read_u32::<LittleEndian>()?,
            suggested_buffer_size: cursor.read_u32::<LittleEndian>()?,
            quality: cursor.read_u32::<LittleEndian>()?,
            sample_size: cursor.read_u32::<LittleEndian>()?,
            frame: Rect {
                left: cursor.read_i16::<LittleEndian>()?,
                top: cursor.read_i16::<LittleEndian>()?,
                right: cursor.read_i16::<LittleEndian>()?,
                bottom: cursor.read_i16::<LittleEndian>()?,
            },
        })
    }
}

/// Stream type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Video,
    Audio,
    Text,
    Midi,
    Unknown([u8; 4]),
}

impl StreamType {
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"vids" => StreamType::Video,
            b"auds" => StreamType::Audio,
            b"txts" => StreamType::Text,
            b"mids" => StreamType::Midi,
            _ => StreamType::Unknown(*fourcc),
        }
    }

    pub fn to_fourcc(self) -> [u8; 4] {
        match self {
            StreamType::Video => *b"vids",
            StreamType::Audio => *b"auds",
            StreamType::Text => *b"txts",
            StreamType::Midi => *b"mids",
            StreamType::Unknown(fourcc) => fourcc,
        }
    }
}

/// Rectangle structure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i16,
    pub top: i16,
    pub right: i16,
    pub bottom: i16,
}

/// Video format (BITMAPINFOHEADER)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFormat {
    /// Structure size
    pub size: u32,
    /// Width in pixels
    pub width: i32,
    /// Height in pixels (negative for top-down)
    pub height: i32,
    /// Number of planes (always 1)
    pub planes: u16,
    /// Bits per pixel
    pub bit_count: u16,
    /// Compression FourCC
    pub compression: FourCC,
    /// Image size in bytes
    pub image_size: u32,
    /// Horizontal resolution
    pub x_pels_per_meter: i32,
    /// Vertical resolution
    pub y_pels_per_meter: i32,
    /// Colors used
    pub colors_used: u32,
    /// Important colors
    pub colors_important: u32,
}

impl Default for VideoFormat {
    fn default() -> Self {
        VideoFormat {
            size: Self::SIZE as u32,
            width: 0,
            height: 0,
            planes: 1,
            bit_count: 24,
            compression: FourCC(codec::DIB),
            image_size: 0,
            x_pels_per_meter: 0,
            y_pels_per_meter: 0,
            colors_used: 0,
            colors_important: 0,
        }
    }
}

impl VideoFormat {
    /// Encoded size
    pub const SIZE: usize = 40;

    /// Size of a 24-bit DIB with rows padded to 4 bytes. Compressed streams
    /// carry it too because some players refuse a zero `biSizeImage`.
    pub fn dib_image_size(width: u32, height: u32) -> Option<u32> {
        let stride = width.checked_mul(3)?.checked_add(3)? / 4 * 4;
        height.checked_mul(stride)
    }

    /// Get absolute height (handles negative for top-down)
    pub fn abs_height(&self) -> u32 {
        self.height.unsigned_abs()
    }

    /// Check if image is top-down
    pub fn is_top_down(&self) -> bool {
        self.height < 0
    }

    /// Get codec FourCC as string
    pub fn codec_string(&self) -> String {
        self.compression.as_str().trim().to_string()
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.size)?;
        writer.write_i32::<LittleEndian>(self.width)?;
        writer.write_i32::<LittleEndian>(self.height)?;
        writer.write_u16::<LittleEndian>(self.planes)?;
        writer.write_u16::<LittleEndian>(self.bit_count)?;
        writer.write_all(self.compression.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.image_size)?;
        writer.write_i32::<LittleEndian>(self.x_pels_per_meter)?;
        writer.write_i32::<LittleEndian>(self.y_pels_per_meter)?;
        writer.write_u32::<LittleEndian>(self.colors_used)?;
        writer.write_u32::<LittleEndian>(self.colors_important)?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(Self::SIZE);
        self.write(&mut data)?;
        Ok(data)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(AviError::InvalidChunk {
                id: *b"strf",
                message: "Video format too short".into(),
            });
        }

        let mut cursor = Cursor::new(data);

        let size = cursor.read_u32::<LittleEndian>()?;
        let width = cursor.read_i32::<LittleEndian>()?;
        let height = cursor.read_i32::<LittleEndian>()?;
        let planes = cursor.read_u16::<LittleEndian>()?;
        let bit_count = cursor.read_u16::<LittleEndian>()?;

        let mut compression = [0u8; 4];
        cursor.read_exact(&mut compression)?;

        Ok(VideoFormat {
            size,
            width,
            height,
            planes,
            bit_count,
            compression: FourCC(compression),
            image_size: cursor.read_u32::<LittleEndian>()?,
            x_pels_per_meter: cursor.read_i32::<LittleEndian>()?,
            y_pels_per_meter: cursor.read_i32::<LittleEndian>()?,
            colors_used: cursor.read_u32::<LittleEndian>()?,
            colors_important: cursor.read_u32::<LittleEndian>()?,
        })
    }
}

/// Common AVI codec FourCCs
pub mod codec {
    /// Uncompressed RGB
    pub const DIB: [u8; 4] = *b"DIB ";
    /// H.264
    pub const H264: [u8; 4] = *b"H264";
    pub const AVC1: [u8; 4] = *b"avc1";
    pub const X264: [u8; 4] = *b"X264";
    /// Motion JPEG
    pub const MJPG: [u8; 4] = *b"MJPG";
    /// MPEG-4 part 2
    pub const XVID: [u8; 4] = *b"XVID";
    pub const DIVX: [u8; 4] = *b"DIVX";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avi_header_frame_rate() {
        let header = AviHeader {
            microseconds_per_frame: 33333,
            ..Default::default()
        };
        let fps = header.frame_rate();
        assert!((fps - 30.0).abs() < 0.1);
    }

    #[test]
    fn test_avi_flags() {
        assert_eq!(AviFlags::WRITER_DEFAULT.bits(), 0x0910);

        let flags = AviFlags::from_bits_retain(0x110);
        assert!(flags.contains(AviFlags::HAS_INDEX));
        assert!(flags.contains(AviFlags::IS_INTERLEAVED));
        assert!(!flags.contains(AviFlags::WAS_CAPTURED));
    }

    #[test]
    fn test_avi_header_layout() {
        let header = AviHeader {
            total_frames: 42,
            width: 640,
            height: 480,
            ..Default::default()
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), AviHeader::SIZE);

        let offset = AviHeader::TOTAL_FRAMES_OFFSET;
        assert_eq!(&bytes[offset..offset + 4], &42u32.to_le_bytes());
        assert_eq!(&bytes[12..16], &0x0910u32.to_le_bytes());
        assert_eq!(&bytes[40..56], &[0u8; 16]);

        assert_eq!(AviHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn test_stream_header_layout() {
        let header = StreamHeader {
            stream_type: StreamType::Video,
            handler: FourCC(codec::H264),
            flags: 0,
            priority: 0,
            language: 0,
            initial_frames: 0,
            scale: 1_000_000,
            rate: 29_970_000,
            start: 0,
            length: 7,
            suggested_buffer_size: 0x10_0000,
            quality: StreamHeader::QUALITY_UNSPECIFIED,
            sample_size: 0,
            frame: Rect::default(),
        };
        let bytes = header.to_bytes().unwrap();
        assert_eq!(bytes.len(), StreamHeader::SIZE);
        assert_eq!(&bytes[0..8], b"vidsH264");
        assert_eq!(&bytes[40..44], &[0xFF; 4]);
        assert!((header.frame_rate() - 29.97).abs() < 1e-9);

        assert_eq!(StreamHeader::parse(&bytes).unwrap(), header);
        assert!(StreamHeader::parse(&bytes[..40]).is_err());
    }

    #[test]
    fn test_stream_type() {
        assert_eq!(StreamType::from_fourcc(b"vids"), StreamType::Video);
        assert_eq!(StreamType::from_fourcc(b"auds"), StreamType::Audio);
        assert_eq!(StreamType::Video.to_fourcc(), *b"vids");
    }

    #[test]
    fn test_video_format() {
        let fmt = VideoFormat {
            height: -480,
            ..Default::default()
        };
        assert!(fmt.is_top_down());
        assert_eq!(fmt.abs_height(), 480);
        assert_eq!(fmt.to_bytes().unwrap().len(), VideoFormat::SIZE);
        assert_eq!(fmt.codec_string(), "DIB");
    }

    #[test]
    fn test_dib_image_size() {
        // 3 * 5 = 15 bytes per row, padded to 16.
        assert_eq!(VideoFormat::dib_image_size(5, 2), Some(32));
        assert_eq!(VideoFormat::dib_image_size(640, 480), Some(640 * 3 * 480));
        assert_eq!(VideoFormat::dib_image_size(u32::MAX, 1), None);
    }
}
