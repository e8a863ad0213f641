//! CLI subcommand implementations.

pub mod extract;
pub mod info;
pub mod pack;
pub mod remux;

pub use extract::CmdExtract;
pub use info::CmdInfo;
pub use pack::CmdPack;
pub use remux::CmdRemux;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress bar counting frames, hidden in quiet mode.
pub(crate) fn frame_progress(total: u64, quiet: bool) -> anyhow::Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} frames | {msg}",
        )?
        .progress_chars("#>-"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}
