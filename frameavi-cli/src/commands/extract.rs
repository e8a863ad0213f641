//! Frame extraction command.

use anyhow::Context;
use clap::Args;
use console::style;
use frameavi::AviDemuxer;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Write every frame payload of an AVI file to its own file.
#[derive(Args, Debug)]
pub struct CmdExtract {
    /// Path to the AVI file.
    pub file: PathBuf,

    /// Output directory (created if missing).
    #[arg(short, long)]
    pub output: PathBuf,

    /// Data chunk tag to extract.
    #[arg(long, default_value = "00dc")]
    pub tag: String,
}

impl CmdExtract {
    /// Execute the extract command.
    pub fn run(&self, quiet: bool) -> anyhow::Result<()> {
        let file = File::open(&self.file)
            .with_context(|| format!("Cannot open {}", self.file.display()))?;
        let mut demuxer = AviDemuxer::open(BufReader::new(file))?;
        if demuxer.is_truncated() {
            warn!("{} is truncated, extracting complete frames only", self.file.display());
        }

        std::fs::create_dir_all(&self.output)?;

        let pb = super::frame_progress(demuxer.frame_count() as u64, quiet)?;
        let mut count = 0usize;
        while let Some(packet) = demuxer.next_frame_for(self.tag.as_bytes())? {
            let path = frame_path(&self.output, count);
            std::fs::write(&path, &packet.data)
                .with_context(|| format!("Cannot write {}", path.display()))?;
            count += 1;
            pb.inc(1);
        }
        pb.finish_and_clear();

        info!("Extracted {} '{}' frames", count, self.tag);
        if !quiet {
            println!(
                "{} {} frames -> {}",
                style("Extracted").green().bold(),
                count,
                self.output.display()
            );
        }
        Ok(())
    }
}

fn frame_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("frame_{:06}.bin", index))
}
