//! AVI file inspection command.

use anyhow::Context;
use clap::Args;
use console::style;
use frameavi::{AviDemuxer, RiffEntry, RiffReader};
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::PathBuf;

/// Stream information for display.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSummary {
    /// Stream index.
    pub index: u32,
    /// Stream type (vids/auds/...).
    #[serde(rename = "type")]
    pub stream_type: String,
    /// Codec FourCC.
    pub codec: String,
    /// Declared length in frames.
    pub length: u32,
    /// Duration in seconds.
    pub duration_seconds: f64,
    /// Frame rate.
    pub frame_rate: f64,
    /// Video-specific: width.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<i32>,
    /// Video-specific: height.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<i32>,
    /// Video-specific: bitmap image size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_size: Option<u32>,
}

/// One entity of the flattened RIFF walk.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSummary {
    /// Nesting depth below the root.
    pub depth: usize,
    /// Absolute offset of the tag.
    pub offset: u64,
    /// Chunk tag.
    pub tag: String,
    /// Declared size.
    pub size: u32,
    /// List type, for lists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_type: Option<String>,
    /// List extends past the end of the file.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

/// AVI file information.
#[derive(Debug, Clone, Serialize)]
pub struct AviInfo {
    /// File path.
    pub file: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Frame width.
    pub width: u32,
    /// Frame height.
    pub height: u32,
    /// Frame rate from the main header.
    pub frame_rate: f64,
    /// Total duration in seconds.
    pub duration_seconds: f64,
    /// Frame count declared in the main header.
    pub declared_frames: u32,
    /// Complete data chunks found in movi.
    pub frames: usize,
    /// idx1 entries.
    pub index_entries: usize,
    /// idx1 entries flagged as key frame.
    pub key_frames: usize,
    /// File ends before its declared size.
    pub truncated: bool,
    /// Stream information.
    pub streams: Vec<StreamSummary>,
    /// Flattened chunk walk (--chunks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<Vec<ChunkSummary>>,
}

/// Inspect an AVI file.
#[derive(Args, Debug)]
pub struct CmdInfo {
    /// Path to the AVI file.
    pub file: PathBuf,

    /// Output in JSON format.
    #[arg(long)]
    pub json: bool,

    /// List every chunk and list of the file.
    #[arg(long)]
    pub chunks: bool,
}

impl CmdInfo {
    /// Execute the info command.
    pub fn run(&self) -> anyhow::Result<()> {
        let info = self.analyze()?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&info)?);
        } else {
            print_avi_info(&info);
        }

        Ok(())
    }

    fn analyze(&self) -> anyhow::Result<AviInfo> {
        if !self.file.exists() {
            anyhow::bail!("File not found: {}", self.file.display());
        }
        let size_bytes = std::fs::metadata(&self.file)?.len();

        let file = BufReader::new(File::open(&self.file)?);
        let demuxer = AviDemuxer::open(file)
            .with_context(|| format!("Not a readable AVI file: {}", self.file.display()))?;

        let streams = demuxer
            .streams()
            .iter()
            .map(|stream| {
                let video = stream.video_format.as_ref();
                StreamSummary {
                    index: stream.index,
                    stream_type: String::from_utf8_lossy(&stream.header.stream_type.to_fourcc()).into_owned(),
                    codec: stream.header.handler.to_string(),
                    length: stream.header.length,
                    duration_seconds: stream.duration(),
                    frame_rate: stream.frame_rate(),
                    width: video.map(|v| v.width),
                    height: video.map(|v| v.height),
                    image_size: video.map(|v| v.image_size),
                }
            })
            .collect();

        let chunks = if self.chunks {
            Some(walk_chunks(BufReader::new(File::open(&self.file)?))?)
        } else {
            None
        };

        let header = demuxer.header();
        Ok(AviInfo {
            file: self.file.display().to_string(),
            size_bytes,
            width: header.width,
            height: header.height,
            frame_rate: header.frame_rate(),
            duration_seconds: header.duration(),
            declared_frames: header.total_frames,
            frames: demuxer.frame_count(),
            index_entries: demuxer.index().len(),
            key_frames: demuxer.index().iter().filter(|e| e.is_keyframe()).count(),
            truncated: demuxer.is_truncated(),
            streams,
            chunks,
        })
    }
}

/// Flatten the RIFF tree, tracking depth through the enclosing list ends.
pub fn walk_chunks<R: Read + Seek>(source: R) -> anyhow::Result<Vec<ChunkSummary>> {
    let mut reader = RiffReader::open(source)?;
    let mut open_lists: Vec<u64> = Vec::new();
    let mut chunks = Vec::new();

    while let Some(entry) = reader.next_entry()? {
        while open_lists.last().is_some_and(|&end| end <= entry.offset()) {
            open_lists.pop();
        }

        let (list_type, truncated) = match entry {
            RiffEntry::List(list) => (Some(list.list_type.to_string()), list.truncated),
            RiffEntry::Chunk(_) => (None, false),
        };
        chunks.push(ChunkSummary {
            depth: open_lists.len(),
            offset: entry.offset(),
            tag: entry.tag().to_string(),
            size: entry.size(),
            list_type,
            truncated,
        });

        if let RiffEntry::List(list) = entry {
            open_lists.push(list.end());
        }
    }

    Ok(chunks)
}

fn print_avi_info(info: &AviInfo) {
    println!();
    println!("{}", style("AVI Information").cyan().bold());
    println!();

    println!("  {:<16} {}", style("File:").white(), info.file);
    println!("  {:<16} {}", style("Size:").white(), format_size(info.size_bytes));
    println!("  {:<16} {}x{}", style("Resolution:").white(), info.width, info.height);
    println!("  {:<16} {:.3} fps", style("Frame Rate:").white(), info.frame_rate);
    println!(
        "  {:<16} {}",
        style("Duration:").white(),
        format_duration(info.duration_seconds)
    );
    println!(
        "  {:<16} {} declared, {} found",
        style("Frames:").white(),
        info.declared_frames,
        info.frames
    );
    println!(
        "  {:<16} {} entries, {} key frames",
        style("Index:").white(),
        info.index_entries,
        info.key_frames
    );
    if info.truncated {
        println!("  {:<16} {}", style("Status:").white(), style("truncated").red().bold());
    }

    if !info.streams.is_empty() {
        println!();
        println!("{}", style("Streams:").cyan().bold());

        for stream in &info.streams {
            println!();
            println!(
                "  {} #{} ({})",
                style("Stream").white(),
                stream.index,
                style(&stream.stream_type).yellow()
            );
            println!("    {:<14} {}", style("Codec:").dim(), stream.codec);
            println!("    {:<14} {} frames", style("Length:").dim(), stream.length);
            println!(
                "    {:<14} {}",
                style("Duration:").dim(),
                format_duration(stream.duration_seconds)
            );
            println!("    {:<14} {:.3} fps", style("Frame Rate:").dim(), stream.frame_rate);

            // Video-specific
            if let (Some(w), Some(h)) = (stream.width, stream.height) {
                println!("    {:<14} {}x{}", style("Bitmap:").dim(), w, h);
            }
            if let Some(image_size) = stream.image_size {
                println!("    {:<14} {}", style("Image Size:").dim(), image_size);
            }
        }
    }

    if let Some(chunks) = &info.chunks {
        println!();
        println!("{}", style("Chunks:").cyan().bold());
        println!();
        for chunk in chunks {
            let indent = "  ".repeat(chunk.depth + 1);
            match &chunk.list_type {
                Some(list_type) => println!(
                    "{}{:>10}  {} '{}' ({} bytes){}",
                    indent,
                    chunk.offset,
                    style(&chunk.tag).yellow(),
                    list_type,
                    chunk.size,
                    if chunk.truncated { " [truncated]" } else { "" }
                ),
                None => println!(
                    "{}{:>10}  {} ({} bytes)",
                    indent,
                    chunk.offset,
                    style(&chunk.tag).white(),
                    chunk.size
                ),
            }
        }
    }

    println!();
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn format_duration(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    let millis = ((seconds - total_seconds as f64) * 1000.0) as u64;

    if hours > 0 {
        format!("{}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
    } else {
        format!("{}:{:02}.{:03}", minutes, secs, millis)
    }
}
