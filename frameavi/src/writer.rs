//! Single-stream AVI writer
//!
//! The container is written front to back without buffering frame payloads.
//! The header list goes out first with a placeholder frame count; once all
//! frames are in, [`AviWriter::close`] appends the index, seeks back and
//! re-emits the header with the real count.

use crate::chunks::{chunk_ids, ChunkId, ChunkType, FourCC};
use crate::error::{AviError, Result};
use crate::index::{FrameIndexEntry, IndexBuilder};
use crate::riff::{ChunkHandle, RiffWriter, LIST_HEADER_SIZE};
use crate::source::FrameSource;
use crate::types::{codec, AviFlags, AviHeader, Rect, StreamHeader, StreamType, VideoFormat};
use std::io::{Cursor, Seek, Write};

/// Default `dwSuggestedBufferSize` for both avih and strh
pub const DEFAULT_SUGGESTED_BUFFER_SIZE: u32 = 0x10_0000;

/// Default `dwMaxBytesPerSec`
pub const DEFAULT_MAX_BYTES_PER_SEC: u32 = 25_000;

/// `dwScale` of the video stream; `dwRate` is `fps * RATE_SCALE`.
pub const RATE_SCALE: u32 = 1_000_000;

/// Writer configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AviWriterConfig {
    /// Codec FourCC, written as stream handler and bitmap compression
    pub codec: FourCC,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Frames per second
    pub fps: f64,
    /// Suggested buffer size hint for players
    pub suggested_buffer_size: u32,
    /// Approximate maximum data rate
    pub max_bytes_per_sec: u32,
}

impl Default for AviWriterConfig {
    fn default() -> Self {
        AviWriterConfig {
            codec: FourCC(codec::H264),
            width: 0,
            height: 0,
            fps: 30.0,
            suggested_buffer_size: DEFAULT_SUGGESTED_BUFFER_SIZE,
            max_bytes_per_sec: DEFAULT_MAX_BYTES_PER_SEC,
        }
    }
}

impl AviWriterConfig {
    /// Config for a codec and geometry with default tuning fields.
    pub fn new(codec: impl AsRef<[u8]>, width: u32, height: u32, fps: f64) -> Result<Self> {
        Ok(AviWriterConfig {
            codec: FourCC::from_slice(codec.as_ref())?,
            width,
            height,
            fps,
            ..Default::default()
        })
    }

    /// Check that every derived header field is representable.
    pub fn validate(&self) -> Result<()> {
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(AviError::InvalidParameter(format!(
                "fps must be a positive finite number, got {}",
                self.fps
            )));
        }

        let rate = (self.fps * RATE_SCALE as f64).round();
        if rate < 1.0 || rate > u32::MAX as f64 {
            return Err(AviError::InvalidParameter(format!(
                "fps {} is out of range for a {} scale",
                self.fps, RATE_SCALE
            )));
        }
        if (1_000_000.0 / self.fps).round() > u32::MAX as f64 {
            return Err(AviError::InvalidParameter(format!(
                "fps {} gives a frame duration beyond 32 bits",
                self.fps
            )));
        }

        if i32::try_from(self.width).is_err() || i32::try_from(self.height).is_err() {
            return Err(AviError::InvalidParameter(format!(
                "dimensions {}x{} do not fit a bitmap header",
                self.width, self.height
            )));
        }
        if VideoFormat::dib_image_size(self.width, self.height).is_none() {
            return Err(AviError::InvalidParameter(format!(
                "image size of {}x{} overflows 32 bits",
                self.width, self.height
            )));
        }

        Ok(())
    }

    /// `dwMicroSecPerFrame`
    pub fn microseconds_per_frame(&self) -> u32 {
        (1_000_000.0 / self.fps).round() as u32
    }

    /// `dwRate` over [`RATE_SCALE`]
    pub fn rate(&self) -> u32 {
        (self.fps * RATE_SCALE as f64).round() as u32
    }

    /// Main header for the given frame count.
    pub fn main_header(&self, total_frames: u32) -> AviHeader {
        AviHeader {
            microseconds_per_frame: self.microseconds_per_frame(),
            max_bytes_per_sec: self.max_bytes_per_sec,
            padding_granularity: 0,
            flags: AviFlags::WRITER_DEFAULT,
            total_frames,
            initial_frames: 0,
            streams: 1,
            suggested_buffer_size: self.suggested_buffer_size,
            width: self.width,
            height: self.height,
        }
    }

    /// Video stream header for the given frame count.
    pub fn stream_header(&self, length: u32) -> StreamHeader {
        StreamHeader {
            stream_type: StreamType::Video,
            handler: self.codec,
            flags: 0,
            priority: 0,
            language: 0,
            initial_frames: 0,
            scale: RATE_SCALE,
            rate: self.rate(),
            start: 0,
            length,
            suggested_buffer_size: self.suggested_buffer_size,
            quality: StreamHeader::QUALITY_UNSPECIFIED,
            sample_size: 0,
            frame: Rect::default(),
        }
    }

    /// Bitmap header of the video stream.
    pub fn video_format(&self) -> VideoFormat {
        VideoFormat {
            width: self.width as i32,
            height: self.height as i32,
            compression: self.codec,
            image_size: VideoFormat::dib_image_size(self.width, self.height).unwrap_or(0),
            ..Default::default()
        }
    }
}

/// Writer lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Header written, no frames yet
    Open,
    /// At least one frame written
    FramesWritten,
    /// Closed; the sink has been released
    Finalized,
}

/// AVI writer for a single video stream
pub struct AviWriter<W: Write + Seek> {
    riff: Option<RiffWriter<W>>,
    config: AviWriterConfig,
    frame_tag: FourCC,
    /// First byte after the `hdrl` type tag
    header_start: u64,
    /// First byte after the `hdrl` list
    header_end: u64,
    movi: ChunkHandle,
    index: IndexBuilder,
    bytes_written: u64,
    state: WriterState,
}

impl<W: Write + Seek> AviWriter<W> {
    /// Start an AVI file. Fails with [`AviError::InvalidTag`] unless `codec`
    /// is four bytes, and with [`AviError::InvalidParameter`] for an
    /// unusable frame rate or geometry.
    pub fn new(sink: W, codec: impl AsRef<[u8]>, width: u32, height: u32, fps: f64) -> Result<Self> {
        Self::with_config(sink, AviWriterConfig::new(codec, width, height, fps)?)
    }

    /// H.264 stream
    pub fn h264(sink: W, width: u32, height: u32, fps: f64) -> Result<Self> {
        Self::new(sink, codec::H264, width, height, fps)
    }

    /// Motion JPEG stream
    pub fn mjpeg(sink: W, width: u32, height: u32, fps: f64) -> Result<Self> {
        Self::new(sink, codec::MJPG, width, height, fps)
    }

    /// Start an AVI file from a full configuration.
    pub fn with_config(sink: W, config: AviWriterConfig) -> Result<Self> {
        config.validate()?;

        let mut riff = RiffWriter::new(sink, chunk_ids::AVI)?;

        let hdrl = riff.create_list(chunk_ids::HDRL)?;
        let header_start = hdrl.data_offset() + 4;
        riff.write(&hdrl, &header_content(&config, 0)?)?;
        riff.close(&hdrl)?;
        let header_end = riff.position()?;

        let movi = riff.create_list(chunk_ids::MOVI)?;

        log::debug!(
            "AVI '{}' {}x{} @ {} fps, header {}..{}, movi at {}",
            config.codec,
            config.width,
            config.height,
            config.fps,
            header_start,
            header_end,
            movi.offset()
        );

        Ok(AviWriter {
            riff: Some(riff),
            config,
            frame_tag: ChunkId::stream_chunk(0, ChunkType::VideoCompressed).fourcc,
            header_start,
            header_end,
            movi,
            index: IndexBuilder::new(),
            bytes_written: 0,
            state: WriterState::Open,
        })
    }

    /// Append one encoded frame as a `00dc` chunk.
    pub fn add_image(&mut self, data: &[u8], key_frame: bool) -> Result<()> {
        if self.state == WriterState::Finalized {
            return Err(AviError::Finalized);
        }

        let tag = self.frame_tag;
        let riff = self.riff.as_mut().ok_or(AviError::Finalized)?;
        let start = riff.position()?;
        let length = match write_frame(riff, tag, data) {
            Ok(length) => length,
            Err(e) => {
                self.abandon(start, &e);
                return Err(e);
            }
        };

        self.index.push(FrameIndexEntry::new(tag, length, key_frame));
        self.bytes_written += data.len() as u64;
        self.state = WriterState::FramesWritten;
        Ok(())
    }

    /// Pump a source until it is exhausted. Returns the number of frames
    /// taken from it.
    pub fn write_from<S: FrameSource>(&mut self, mut source: S) -> Result<u64> {
        let mut count = 0;
        while let Some(frame) = source.next_frame()? {
            self.add_image(&frame.data, frame.key_frame)?;
            count += 1;
        }
        log::debug!("Wrote {} frames from source", count);
        Ok(count)
    }

    /// Finish the file and release the sink.
    pub fn close(&mut self) -> Result<()> {
        self.finalize().map(drop)
    }

    /// Finish the file and hand the sink back.
    pub fn finish(mut self) -> Result<W> {
        self.finalize()
    }

    fn finalize(&mut self) -> Result<W> {
        if self.state == WriterState::Finalized {
            return Err(AviError::Finalized);
        }
        self.state = WriterState::Finalized;
        let mut riff = self.riff.take().ok_or(AviError::Finalized)?;

        match self.write_trailer(&mut riff) {
            Ok(()) => {
                let sink = riff.finish()?;
                log::debug!("AVI finalized with {} frames", self.index.len());
                Ok(sink)
            }
            Err(e) => {
                log::warn!("Finalizing AVI failed: {}", e);
                // Only movi (if still open) and the root get patched against
                // the end of the stream.
                let keep = if riff.is_open(&self.movi) {
                    self.movi.clone()
                } else {
                    riff.root().clone()
                };
                let _ = riff.discard_above(&keep);
                let _ = riff.seek_to_end();
                if let Err(finish_error) = riff.finish() {
                    log::warn!("Patching size fields failed: {}", finish_error);
                }
                Err(e)
            }
        }
    }

    /// Give up after a failed frame write. The partial frame is cut off by
    /// patching `movi` and the root to end where it began, and the sink is
    /// released.
    fn abandon(&mut self, frame_start: u64, cause: &AviError) {
        log::warn!("Writing frame {} failed ({}), closing AVI", self.index.len(), cause);
        self.state = WriterState::Finalized;
        let Some(mut riff) = self.riff.take() else {
            return;
        };

        let _ = riff.discard_above(&self.movi);
        if let Err(e) = riff.rewind_to(frame_start) {
            log::warn!("Seeking back to frame start failed: {}", e);
        }
        if let Err(e) = riff.finish() {
            log::warn!("Patching size fields failed: {}", e);
        }
    }

    fn write_trailer(&self, riff: &mut RiffWriter<W>) -> Result<()> {
        riff.close(&self.movi)?;
        riff.write_chunk(chunk_ids::IDX1, &self.index.build()?)?;

        let total_frames = u32::try_from(self.index.len()).map_err(|_| {
            AviError::InvalidParameter(format!("{} frames exceed the header field", self.index.len()))
        })?;

        let header = header_content(&self.config, total_frames)?;
        let expected = self.header_end - self.header_start;
        if header.len() as u64 != expected {
            return Err(AviError::HeaderSizeChanged {
                expected,
                actual: header.len() as u64,
            });
        }
        riff.overwrite(self.header_start, &header)?;
        riff.seek_to_end()?;
        Ok(())
    }

    /// Frames written so far
    pub fn frame_count(&self) -> usize {
        self.index.len()
    }

    /// Payload bytes written so far, excluding headers and padding
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn config(&self) -> &AviWriterConfig {
        &self.config
    }

    /// Index entries recorded so far
    pub fn index(&self) -> &IndexBuilder {
        &self.index
    }
}

impl<W: Write + Seek> Drop for AviWriter<W> {
    fn drop(&mut self) {
        if self.state == WriterState::Finalized {
            return;
        }
        log::warn!(
            "AVI writer dropped without close after {} frames, finalizing",
            self.index.len()
        );
        let _ = self.finalize();
    }
}

fn write_frame<W: Write + Seek>(riff: &mut RiffWriter<W>, tag: FourCC, data: &[u8]) -> Result<u32> {
    let chunk = riff.create_chunk(tag)?;
    riff.write(&chunk, data)?;
    riff.close(&chunk)
}

/// Content of the `hdrl` list after its type tag: `avih` and the `strl` list.
/// Always the same length for a given config, so the final header can be
/// written over the placeholder byte for byte.
fn header_content(config: &AviWriterConfig, total_frames: u32) -> Result<Vec<u8>> {
    let mut riff = RiffWriter::new(Cursor::new(Vec::new()), chunk_ids::HDRL)?;
    riff.write_chunk(chunk_ids::AVIH, &config.main_header(total_frames).to_bytes()?)?;

    let strl = riff.create_list(chunk_ids::STRL)?;
    riff.write_chunk(chunk_ids::STRH, &config.stream_header(total_frames).to_bytes()?)?;
    riff.write_chunk(chunk_ids::STRF, &config.video_format().to_bytes()?)?;
    riff.close(&strl)?;

    // Strip the scratch root header.
    let mut bytes = riff.finish()?.into_inner();
    bytes.drain(..LIST_HEADER_SIZE as usize);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{EncodedFrame, IterSource};
    use crate::AviDemuxer;
    use std::cell::Cell;
    use std::io::{self, Cursor, SeekFrom};
    use std::rc::Rc;

    /// Sink whose `skip + 1`-th write of exactly `fail_len` bytes fails once.
    struct FlakySink<'a> {
        inner: &'a mut Cursor<Vec<u8>>,
        fail_len: usize,
        skip: usize,
        released: Rc<Cell<bool>>,
    }

    impl<'a> FlakySink<'a> {
        fn new(inner: &'a mut Cursor<Vec<u8>>, fail_len: usize, skip: usize) -> (Self, Rc<Cell<bool>>) {
            let released = Rc::new(Cell::new(false));
            let sink = FlakySink {
                inner,
                fail_len,
                skip,
                released: released.clone(),
            };
            (sink, released)
        }
    }

    impl Write for FlakySink<'_> {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if buf.len() == self.fail_len {
                if self.skip == 0 {
                    self.fail_len = usize::MAX;
                    return Err(io::Error::other("disk hiccup"));
                }
                self.skip -= 1;
            }
            self.inner.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            self.inner.flush()
        }
    }

    impl Seek for FlakySink<'_> {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    impl Drop for FlakySink<'_> {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    fn u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    // RIFF(12) + LIST hdrl(12) + avih(8+56) + LIST strl(12) + strh(8+56) + strf(8+40)
    const MOVI_OFFSET: usize = 12 + 12 + 64 + 12 + 64 + 48;

    #[test]
    fn test_config_defaults() {
        let config = AviWriterConfig::new("H264", 640, 480, 30.0).unwrap();
        assert_eq!(config.suggested_buffer_size, 0x10_0000);
        assert_eq!(config.max_bytes_per_sec, 25_000);
        assert_eq!(config.microseconds_per_frame(), 33_333);
        assert_eq!(config.rate(), 30_000_000);
        assert_eq!(config.video_format().image_size, 480 * 1920);
    }

    #[test]
    fn test_fractional_fps_rounds() {
        let config = AviWriterConfig::new("H264", 16, 16, 29.97).unwrap();
        assert_eq!(config.rate(), 29_970_000);
        assert_eq!(config.microseconds_per_frame(), 33_367);
    }

    #[test]
    fn test_invalid_parameters() {
        for fps in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e10] {
            assert!(matches!(
                AviWriter::new(Cursor::new(Vec::new()), "H264", 64, 64, fps),
                Err(AviError::InvalidParameter(_))
            ));
        }
        assert!(matches!(
            AviWriter::new(Cursor::new(Vec::new()), "H264", u32::MAX, 64, 30.0),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(Cursor::new(Vec::new()), "H264", 100_000, 100_000, 30.0),
            Err(AviError::InvalidParameter(_))
        ));
        assert!(matches!(
            AviWriter::new(Cursor::new(Vec::new()), "H26", 64, 64, 30.0),
            Err(AviError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_empty_file_layout() {
        let writer = AviWriter::new(Cursor::new(Vec::new()), "H264", 64, 48, 30.0).unwrap();
        assert_eq!(writer.state(), WriterState::Open);
        let data = writer.finish().unwrap().into_inner();

        assert_eq!(&data[0..4], b"RIFF");
        assert_eq!(u32_at(&data, 4) as usize, data.len() - 8);
        assert_eq!(&data[8..12], b"AVI ");
        assert_eq!(&data[12..16], b"LIST");
        assert_eq!(u32_at(&data, 16), 4 + 64 + 12 + 64 + 48);
        assert_eq!(&data[20..24], b"hdrl");
        assert_eq!(&data[24..28], b"avih");
        assert_eq!(u32_at(&data, 28), 56);

        // avih
        assert_eq!(u32_at(&data, 32), 33_333);
        assert_eq!(u32_at(&data, 36), 25_000);
        assert_eq!(u32_at(&data, 44), 0x0910);
        assert_eq!(u32_at(&data, 48), 0);
        assert_eq!(u32_at(&data, 56), 1);
        assert_eq!(u32_at(&data, 60), 0x10_0000);
        assert_eq!(u32_at(&data, 64), 64);
        assert_eq!(u32_at(&data, 68), 48);

        assert_eq!(&data[88..92], b"LIST");
        assert_eq!(&data[96..100], b"strl");
        assert_eq!(&data[100..104], b"strh");
        assert_eq!(&data[108..112], b"vids");
        assert_eq!(&data[112..116], b"H264");
        assert_eq!(&data[164..168], b"strf");
        assert_eq!(u32_at(&data, 168), 40);

        assert_eq!(&data[MOVI_OFFSET..MOVI_OFFSET + 4], b"LIST");
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4), 4);
        assert_eq!(&data[MOVI_OFFSET + 8..MOVI_OFFSET + 12], b"movi");
        assert_eq!(&data[MOVI_OFFSET + 12..MOVI_OFFSET + 16], b"idx1");
        assert_eq!(u32_at(&data, MOVI_OFFSET + 16), 0);
        assert_eq!(data.len(), MOVI_OFFSET + 20);
    }

    #[test]
    fn test_frames_and_index() {
        let mut writer = AviWriter::new(Cursor::new(Vec::new()), "H264", 16, 16, 25.0).unwrap();
        writer.add_image(&[1, 2, 3, 4, 5], true).unwrap();
        writer.add_image(&[6; 6], false).unwrap();
        writer.add_image(&[7; 5], true).unwrap();
        assert_eq!(writer.state(), WriterState::FramesWritten);
        assert_eq!(writer.frame_count(), 3);
        assert_eq!(writer.bytes_written(), 16);
        let data = writer.finish().unwrap().into_inner();

        // Frame count fixed up in avih and strh.
        assert_eq!(u32_at(&data, 48), 3);
        assert_eq!(u32_at(&data, 108 + 32), 3);

        let movi_payload = MOVI_OFFSET + 8;
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4) as usize, 4 + 14 + 14 + 14);
        assert_eq!(&data[movi_payload + 4..movi_payload + 8], b"00dc");
        assert_eq!(u32_at(&data, movi_payload + 8), 5);
        assert_eq!(data[movi_payload + 17], 0);

        let idx1 = movi_payload + 4 + 42;
        assert_eq!(&data[idx1..idx1 + 4], b"idx1");
        assert_eq!(u32_at(&data, idx1 + 4), 48);
        let offsets: Vec<u32> = (0..3).map(|i| u32_at(&data, idx1 + 8 + i * 16 + 8)).collect();
        assert_eq!(offsets, vec![4, 18, 32]);
        let flags: Vec<u32> = (0..3).map(|i| u32_at(&data, idx1 + 8 + i * 16 + 4)).collect();
        assert_eq!(flags, vec![0x10, 0, 0x10]);
        for (i, offset) in offsets.iter().enumerate() {
            let at = movi_payload + *offset as usize;
            assert_eq!(&data[at..at + 4], b"00dc", "frame {}", i);
        }
    }

    #[test]
    fn test_close_twice_and_add_after_close() {
        let mut writer = AviWriter::mjpeg(Cursor::new(Vec::new()), 8, 8, 10.0).unwrap();
        writer.add_image(&[0xFF, 0xD8], true).unwrap();
        writer.close().unwrap();
        assert_eq!(writer.state(), WriterState::Finalized);

        assert!(matches!(writer.close(), Err(AviError::Finalized)));
        assert!(matches!(writer.add_image(&[1], true), Err(AviError::Finalized)));
    }

    #[test]
    fn test_drop_finalizes() {
        let mut buffer = Vec::new();
        {
            let mut writer = AviWriter::h264(Cursor::new(&mut buffer), 8, 8, 30.0).unwrap();
            writer.add_image(&[1, 2, 3], true).unwrap();
        }
        assert_eq!(u32_at(&buffer, 4) as usize, buffer.len() - 8);
        assert_eq!(u32_at(&buffer, 48), 1);
        assert_eq!(&buffer[buffer.len() - 24..buffer.len() - 20], b"idx1");
    }

    #[test]
    fn test_write_from_source() {
        let frames = vec![
            EncodedFrame::key(vec![1; 3]),
            EncodedFrame::delta(vec![2; 4]),
            EncodedFrame::delta(vec![3; 5]),
        ];
        let mut writer = AviWriter::h264(Cursor::new(Vec::new()), 8, 8, 30.0).unwrap();
        assert_eq!(writer.write_from(IterSource(frames.into_iter())).unwrap(), 3);

        let keys: Vec<bool> = writer.index().entries().iter().map(|e| e.key_frame).collect();
        assert_eq!(keys, vec![true, false, false]);
        writer.close().unwrap();
    }

    #[test]
    fn test_custom_config() {
        let config = AviWriterConfig {
            suggested_buffer_size: 4096,
            max_bytes_per_sec: 1_000_000,
            ..AviWriterConfig::new("XVID", 32, 32, 24.0).unwrap()
        };
        let data = AviWriter::with_config(Cursor::new(Vec::new()), config)
            .unwrap()
            .finish()
            .unwrap()
            .into_inner();
        assert_eq!(u32_at(&data, 36), 1_000_000);
        assert_eq!(u32_at(&data, 60), 4096);
        assert_eq!(&data[112..116], b"XVID");
    }

    #[test]
    fn test_failed_frame_write_ends_the_file() {
        let mut buffer = Cursor::new(Vec::new());
        let (sink, released) = FlakySink::new(&mut buffer, 200, 0);
        let mut writer = AviWriter::mjpeg(sink, 16, 16, 25.0).unwrap();
        writer.add_image(&[1; 10], true).unwrap();

        assert!(matches!(writer.add_image(&[2; 200], true), Err(AviError::Io(_))));
        assert_eq!(writer.state(), WriterState::Finalized);
        assert!(released.get());
        assert!(matches!(writer.add_image(&[3; 10], true), Err(AviError::Finalized)));
        assert!(matches!(writer.close(), Err(AviError::Finalized)));
        drop(writer);

        let data = buffer.into_inner();
        let frame_end = MOVI_OFFSET + 12 + 18;
        assert_eq!(u32_at(&data, 4) as usize, frame_end - 8);
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4), 4 + 18);

        let mut demuxer = AviDemuxer::open(Cursor::new(data)).unwrap();
        assert_eq!(demuxer.frame_count(), 1);
        assert_eq!(demuxer.read_packet().unwrap().unwrap().data, vec![1; 10]);
    }

    #[test]
    fn test_failed_index_write_patches_root() {
        let mut buffer = Cursor::new(Vec::new());
        let (sink, released) = FlakySink::new(&mut buffer, 32, 0);
        let mut writer = AviWriter::mjpeg(sink, 16, 16, 25.0).unwrap();
        writer.add_image(&[1; 10], true).unwrap();
        writer.add_image(&[2; 12], false).unwrap();

        assert!(matches!(writer.close(), Err(AviError::Io(_))));
        assert_eq!(writer.state(), WriterState::Finalized);
        assert!(released.get());
        assert!(matches!(writer.close(), Err(AviError::Finalized)));
        drop(writer);

        let data = buffer.into_inner();
        assert_eq!(u32_at(&data, 4) as usize, data.len() - 8);
        assert_eq!(u32_at(&data, MOVI_OFFSET + 4), 4 + 18 + 20);
        let idx1 = MOVI_OFFSET + 8 + 4 + 38;
        assert_eq!(&data[idx1..idx1 + 4], b"idx1");
        assert_eq!(u32_at(&data, idx1 + 4), 0);
        assert_eq!(u32_at(&data, 48), 0);

        let demuxer = AviDemuxer::open(Cursor::new(data)).unwrap();
        assert_eq!(demuxer.frame_count(), 2);
    }

    #[test]
    fn test_failed_header_rewrite_keeps_sizes() {
        // The first 188-byte write is the placeholder header, the second its rewrite.
        let mut buffer = Cursor::new(Vec::new());
        let (sink, released) = FlakySink::new(&mut buffer, 188, 1);
        let mut writer = AviWriter::mjpeg(sink, 16, 16, 25.0).unwrap();
        writer.add_image(&[1; 10], true).unwrap();
        writer.add_image(&[2; 12], false).unwrap();

        let err = writer.close().unwrap_err();
        assert!(matches!(err, AviError::Io(ref e) if e.to_string() == "disk hiccup"));
        assert_eq!(writer.state(), WriterState::Finalized);
        assert!(released.get());
        drop(writer);

        let data = buffer.into_inner();
        assert_eq!(u32_at(&data, 4) as usize, data.len() - 8);
        assert_eq!(u32_at(&data, 16), 4 + 64 + 12 + 64 + 48);
        assert_eq!(u32_at(&data, 28), 56);
        assert_eq!(u32_at(&data, 92), 4 + 64 + 48);
        assert_eq!(u32_at(&data, 104), 56);
        assert_eq!(u32_at(&data, 168), 40);
        assert_eq!(u32_at(&data, 48), 0);

        let mut demuxer = AviDemuxer::open(Cursor::new(data)).unwrap();
        assert!(!demuxer.is_truncated());
        assert_eq!(demuxer.index().len(), 2);
        assert!(demuxer.read_packet().unwrap().unwrap().key_frame);
        assert!(!demuxer.read_packet().unwrap().unwrap().key_frame);
    }
}
