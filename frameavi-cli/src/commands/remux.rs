//! AVI to AVI remux command.

use anyhow::Context;
use clap::Args;
use console::style;
use frameavi::{AviDemuxer, AviWriter, AviWriterConfig, FourCC};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Seek};
use std::path::PathBuf;
use tracing::{info, warn};

/// Copy every video frame of an AVI file into a freshly written one.
///
/// Rebuilds headers, sizes and index, which recovers the playable part of a
/// truncated recording.
#[derive(Args, Debug)]
pub struct CmdRemux {
    /// Input AVI file
    pub input: PathBuf,

    /// Output AVI file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Override the codec FourCC
    #[arg(long)]
    pub fourcc: Option<String>,

    /// Override the frame rate
    #[arg(long)]
    pub fps: Option<f64>,

    /// Overwrite output file if it exists
    #[arg(short = 'y', long)]
    pub overwrite: bool,
}

impl CmdRemux {
    /// Execute the remux command.
    pub fn run(&self, quiet: bool) -> anyhow::Result<()> {
        if self.output.exists() && !self.overwrite {
            anyhow::bail!(
                "Output file exists: {} (use -y to overwrite)",
                self.output.display()
            );
        }

        let input = File::open(&self.input)
            .with_context(|| format!("Cannot open {}", self.input.display()))?;
        let mut demuxer = AviDemuxer::open(BufReader::new(input))?;
        if demuxer.is_truncated() {
            warn!(
                "{} is truncated, copying {} complete frames",
                self.input.display(),
                demuxer.frame_count()
            );
        }

        let config = self.output_config(&demuxer)?;
        info!(
            "Remuxing as {} {}x{} @ {} fps",
            config.codec, config.width, config.height, config.fps
        );

        let sink = BufWriter::new(
            File::create(&self.output)
                .with_context(|| format!("Cannot create {}", self.output.display()))?,
        );
        let mut writer = AviWriter::with_config(sink, config)?;
        let frames = writer.write_from(&mut demuxer)?;
        writer.close().context("Failed to finalize AVI")?;

        if !quiet {
            println!(
                "{} {} frames -> {}",
                style("Remuxed").green().bold(),
                frames,
                self.output.display()
            );
        }
        Ok(())
    }

    /// Stream parameters of the copy: taken from the source unless overridden.
    fn output_config<R: Read + Seek>(&self, demuxer: &AviDemuxer<R>) -> anyhow::Result<AviWriterConfig> {
        let header = demuxer.header();
        let stream = demuxer.video_stream();

        let codec = match &self.fourcc {
            Some(fourcc) => fourcc.parse::<FourCC>()?,
            None => stream
                .and_then(|s| s.video_format.as_ref().map(|v| v.compression))
                .or(stream.map(|s| s.header.handler))
                .context("Input has no video stream")?,
        };

        let fps = match self.fps {
            Some(fps) => fps,
            None => stream
                .map(|s| s.frame_rate())
                .filter(|fps| *fps > 0.0)
                .unwrap_or_else(|| header.frame_rate()),
        };

        Ok(AviWriterConfig {
            codec,
            width: header.width,
            height: header.height,
            fps,
            ..Default::default()
        })
    }
}
