use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::compositor::{CompositeOptions, RestorePrevious};

#[derive(Parser, Debug)]
#[command(author, version, about = "Step through, play and export the frames of an animated GIF", long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// GIF to open, or directory to browse
    pub path: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log compositing details to stderr")]
    pub verbose: bool,

    #[arg(
        short = 'd',
        long,
        global = true,
        default_value_t = 100,
        help = "Milliseconds to show frames whose delay is zero"
    )]
    pub default_delay: u64,

    #[arg(
        long,
        global = true,
        help = "Restore-previous disposal puts back the prior canvas instead of the first pixel's colour"
    )]
    pub strict_previous: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open a GIF, or browse a directory for one
    View { path: Option<PathBuf> },
    /// Write composited frames as PNG files
    Export {
        file: PathBuf,
        #[arg(short, long, help = "Output directory, the current directory by default")]
        out: Option<PathBuf>,
        #[arg(short, long, help = "Only this frame, counting from 1")]
        frame: Option<usize>,
    },
    /// Print the frame list of a GIF
    Info { file: PathBuf },
}

#[derive(Clone, Debug, PartialEq)]
pub struct ViewerConfig {
    pub default_delay: Duration,
    pub composite: CompositeOptions,
    pub export_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        ViewerConfig {
            default_delay: Duration::from_millis(100),
            composite: CompositeOptions::default(),
            export_dir: PathBuf::from("."),
        }
    }
}

impl From<&Cli> for ViewerConfig {
    fn from(cli: &Cli) -> Self {
        let restore_previous = if cli.strict_previous {
            RestorePrevious::Snapshot
        } else {
            RestorePrevious::FirstPixel
        };
        let export_dir = match &cli.command {
            Some(Command::Export { out: Some(out), .. }) => out.clone(),
            _ => PathBuf::from("."),
        };

        ViewerConfig {
            default_delay: Duration::from_millis(cli.default_delay),
            composite: CompositeOptions { restore_previous },
            export_dir,
        }
    }
}
