//! Frame packing command.

use anyhow::Context;
use clap::Args;
use console::style;
use frameavi::{AviWriter, EncodedFrame, FrameSource};
use glob::glob;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Pack encoded frame files into an AVI file, one file per frame.
#[derive(Args, Debug)]
pub struct CmdPack {
    /// Frame files or glob patterns (e.g. "frames/*.jpg")
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Output AVI file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Frame width in pixels
    #[arg(long)]
    pub width: u32,

    /// Frame height in pixels
    #[arg(long)]
    pub height: u32,

    /// Frames per second
    #[arg(long, default_value = "30")]
    pub fps: f64,

    /// Codec FourCC written into the stream headers
    #[arg(long, default_value = "MJPG")]
    pub fourcc: String,

    /// Mark every Nth frame as key frame (0: only the first)
    #[arg(long, default_value = "1")]
    pub keyframe_interval: u32,

    /// Overwrite output file if it exists
    #[arg(short = 'y', long)]
    pub overwrite: bool,
}

impl CmdPack {
    /// Execute the pack command.
    pub fn run(&self, quiet: bool) -> anyhow::Result<()> {
        let files = expand_inputs(&self.inputs)?;
        if files.is_empty() {
            anyhow::bail!("No input files found");
        }
        if self.output.exists() && !self.overwrite {
            anyhow::bail!(
                "Output file exists: {} (use -y to overwrite)",
                self.output.display()
            );
        }

        let sink = BufWriter::new(
            File::create(&self.output)
                .with_context(|| format!("Cannot create {}", self.output.display()))?,
        );
        let mut writer = AviWriter::new(sink, self.fourcc.as_bytes(), self.width, self.height, self.fps)
            .context("Invalid stream parameters")?;

        info!(
            "Packing {} frames as {} {}x{} @ {} fps",
            files.len(),
            self.fourcc,
            self.width,
            self.height,
            self.fps
        );

        let pb = super::frame_progress(files.len() as u64, quiet)?;
        let mut source = FileFrames::new(files, self.keyframe_interval);
        while let Some(frame) = source.next_frame()? {
            writer.add_image(&frame.data, frame.key_frame)?;
            pb.inc(1);
        }
        let frames = writer.frame_count();
        let bytes = writer.bytes_written();
        writer.close().context("Failed to finalize AVI")?;
        pb.finish_and_clear();

        if !quiet {
            println!(
                "{} {} frames ({} payload bytes) -> {}",
                style("Packed").green().bold(),
                frames,
                bytes,
                self.output.display()
            );
        }
        Ok(())
    }
}

/// Frame source reading one whole file per frame.
pub struct FileFrames {
    paths: std::vec::IntoIter<PathBuf>,
    keyframe_interval: u32,
    position: u64,
}

impl FileFrames {
    pub fn new(paths: Vec<PathBuf>, keyframe_interval: u32) -> Self {
        FileFrames {
            paths: paths.into_iter(),
            keyframe_interval,
            position: 0,
        }
    }

    fn is_key_frame(&self, position: u64) -> bool {
        match self.keyframe_interval {
            0 => position == 0,
            interval => position % interval as u64 == 0,
        }
    }
}

impl FrameSource for FileFrames {
    fn next_frame(&mut self) -> frameavi::Result<Option<EncodedFrame>> {
        let Some(path) = self.paths.next() else {
            return Ok(None);
        };
        debug!("Reading frame {} from {}", self.position, path.display());

        let data = std::fs::read(&path)?;
        let key_frame = self.is_key_frame(self.position);
        self.position += 1;
        Ok(Some(EncodedFrame::new(data, key_frame)))
    }
}

/// Expand glob patterns in argument order. Matches of one pattern are sorted;
/// plain paths are taken as given.
pub fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for pattern in patterns {
        if !pattern.contains(['*', '?', '[']) {
            let path = PathBuf::from(pattern);
            if !path.is_file() {
                anyhow::bail!("File not found: {}", path.display());
            }
            files.push(path);
            continue;
        }

        let mut matched = Vec::new();
        for entry in glob(pattern)? {
            match entry {
                Ok(path) => {
                    if path.is_file() {
                        matched.push(path);
                    }
                }
                Err(e) => {
                    warn!("Error matching pattern: {}", e);
                }
            }
        }
        if matched.is_empty() {
            warn!("No files match pattern: {}", pattern);
        }
        matched.sort();
        files.extend(matched);
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frameavi::AviDemuxer;
    use tempfile::tempdir;

    #[test]
    fn test_expand_inputs_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.jpg", "a.jpg", "c.txt"] {
            std::fs::write(dir.path().join(name), name).unwrap();
        }

        let pattern = dir.path().join("*.jpg").display().to_string();
        let files = expand_inputs(&[pattern]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.jpg"]);
    }

    #[test]
    fn test_expand_inputs_missing_file() {
        assert!(expand_inputs(&["/nonexistent/frame.jpg".to_string()]).is_err());
    }

    #[test]
    fn test_keyframe_interval() {
        let paths = vec![PathBuf::new(); 5];
        let every_other = FileFrames::new(paths.clone(), 2);
        let keys: Vec<bool> = (0..5).map(|i| every_other.is_key_frame(i)).collect();
        assert_eq!(keys, vec![true, false, true, false, true]);

        let first_only = FileFrames::new(paths, 0);
        assert!(first_only.is_key_frame(0));
        assert!(!first_only.is_key_frame(3));
    }

    #[test]
    fn test_pack_run() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("0.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();
        std::fs::write(dir.path().join("1.jpg"), [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        let output = dir.path().join("out.avi");

        let cmd = CmdPack {
            inputs: vec![dir.path().join("*.jpg").display().to_string()],
            output: output.clone(),
            width: 8,
            height: 8,
            fps: 25.0,
            fourcc: "MJPG".into(),
            keyframe_interval: 1,
            overwrite: false,
        };
        cmd.run(true).unwrap();
        // Refuses to clobber without -y.
        assert!(cmd.run(true).is_err());

        let mut demuxer = AviDemuxer::open(File::open(&output).unwrap()).unwrap();
        assert_eq!(demuxer.header().total_frames, 2);
        assert_eq!(demuxer.next_frame().unwrap().unwrap().data, vec![0xFF, 0xD8, 0xFF]);
        assert_eq!(demuxer.next_frame().unwrap().unwrap().data.len(), 4);
    }
}
