//! frameavi CLI - pack encoded frames into AVI files and take them apart again.

mod commands;

use clap::{Parser, Subcommand};
use commands::{CmdExtract, CmdInfo, CmdPack, CmdRemux};
use tracing_subscriber::util::SubscriberInitExt;

/// Command-line arguments for the frameavi tool.
#[derive(Parser, Debug)]
#[command(name = "frameavi")]
#[command(version)]
#[command(about = "Pack already-encoded video frames into AVI files")]
#[command(long_about = "frameavi wraps encoded frames (JPEG, H.264 access units, ...) into a\n\
    single-stream AVI container without re-encoding, and inspects or unpacks\n\
    existing AVI files.\n\n\
    EXAMPLES:\n    \
    frameavi pack 'frames/*.jpg' -o out.avi --width 640 --height 480\n    \
    frameavi pack 'au/*.h264' -o out.avi --width 1280 --height 720 --fourcc H264 --keyframe-interval 30\n    \
    frameavi info out.avi --chunks\n    \
    frameavi extract out.avi -o frames/\n    \
    frameavi remux broken.avi -o fixed.avi")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output (debug logging)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Quiet mode (no logging, no progress bar)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack frame files into an AVI file
    Pack(CmdPack),
    /// Show header, stream and index information
    Info(CmdInfo),
    /// Write every frame payload to its own file
    Extract(CmdExtract),
    /// Copy all frames into a freshly written AVI file
    Remux(CmdRemux),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging; library `log` records are forwarded as well
    if !cli.quiet {
        let _ = tracing_subscriber::fmt()
            .with_max_level(if cli.verbose {
                tracing::Level::DEBUG
            } else {
                tracing::Level::INFO
            })
            .with_target(false)
            .finish()
            .try_init();
    }

    match cli.command {
        Command::Pack(cmd) => cmd.run(cli.quiet),
        Command::Info(cmd) => cmd.run(),
        Command::Extract(cmd) => cmd.run(cli.quiet),
        Command::Remux(cmd) => cmd.run(cli.quiet),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_pack() {
        let cli = Cli::try_parse_from([
            "frameavi", "pack", "a.jpg", "b.jpg", "-o", "out.avi", "--width", "64", "--height", "48",
        ])
        .unwrap();
        let Command::Pack(pack) = cli.command else {
            panic!("expected pack");
        };
        assert_eq!(pack.inputs, vec!["a.jpg", "b.jpg"]);
        assert_eq!(pack.fps, 30.0);
        assert_eq!(pack.fourcc, "MJPG");
        assert_eq!(pack.keyframe_interval, 1);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["frameavi", "-v", "-q", "info", "x.avi"]).is_err());
    }
}
