use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::info;

use crate::common::common::has_extension;
use crate::compositor::{composite_all_with, CompositeOptions, CompositedFrame};
use crate::config::{Cli, Command, ViewerConfig};
use crate::error::{Result, ViewerError};
use crate::export::{export_all, export_frame};
use crate::gif::{self, GifContainer, RawFrame};
use crate::window::{browse_root, Window};

/// Decodes GIF bytes and composites every frame.
pub fn load_bytes(bytes: Vec<u8>, options: CompositeOptions) -> Result<Vec<CompositedFrame>> {
    let frames = gif::decode(bytes, false)?;
    Ok(composite_all_with(&frames, options))
}

pub fn load_path(path: &Path, options: CompositeOptions) -> Result<Vec<CompositedFrame>> {
    if !has_extension(path, "gif") {
        return Err(ViewerError::UnsupportedFile(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    info!(path = %path.display(), bytes = bytes.len(), "read file");
    load_bytes(bytes, options)
}

pub fn run(cli: Cli) -> Result<()> {
    let config = ViewerConfig::from(&cli);
    match cli.command {
        None => match cli.path {
            Some(path) => handle_path(&path, config),
            None => handle_interactive(config, None, None),
        },
        Some(Command::View { path: None }) => handle_interactive(config, None, None),
        Some(Command::View { path: Some(path) }) => handle_path(&path, config),
        Some(Command::Export { file, frame, .. }) => {
            let paths = handle_export(&file, frame, &config)?;
            for path in paths {
                println!("{} {}", "saved".green(), path.display());
            }
            Ok(())
        }
        Some(Command::Info { file }) => {
            let bytes = fs::read(&file)?;
            print!("{}", handle_info(bytes)?);
            Ok(())
        }
    }
}

pub fn handle_interactive(config: ViewerConfig, dir: Option<PathBuf>, file: Option<PathBuf>) -> Result<()> {
    let mut window = Window::new(config, dir)?;
    window.do_interactive(file)
}

pub fn handle_path(path: &Path, config: ViewerConfig) -> Result<()> {
    let metadata = path.metadata()?;
    if metadata.is_dir() {
        return handle_interactive(config, Some(path.to_path_buf()), None);
    }
    if !has_extension(path, "gif") {
        return Err(ViewerError::UnsupportedFile(path.to_path_buf()));
    }
    handle_interactive(config, browse_root(path), Some(path.to_path_buf()))
}

/// Exports frame `frame` (counting from 1), or every frame when `None`.
pub fn handle_export(file: &Path, frame: Option<usize>, config: &ViewerConfig) -> Result<Vec<PathBuf>> {
    let frames = load_path(file, config.composite)?;
    if frames.is_empty() {
        return Err(ViewerError::EmptySequence);
    }

    match frame {
        Some(number) => {
            let index = number.checked_sub(1).ok_or(ViewerError::FrameOutOfRange {
                index: 0,
                len: frames.len(),
            })?;
            Ok(vec![export_frame(&frames, index, &config.export_dir)?])
        }
        None => export_all(&frames, &config.export_dir),
    }
}

/// Human-readable summary of a GIF: screen, loop count and one line per frame.
pub fn handle_info(bytes: Vec<u8>) -> Result<String> {
    let container = gif::parse(bytes)?;
    let header = describe_container(&container);
    let frames = gif::decompress_frames(container, false)?;
    Ok(header + &describe_frames(&frames))
}

fn describe_container(container: &GifContainer) -> String {
    let loops = match container.loop_count() {
        None => "forever".to_string(),
        Some(n) => n.to_string(),
    };
    format!(
        "{} {}x{}\n{} {}\n",
        "screen".bold(),
        container.screen_width(),
        container.screen_height(),
        "loops".bold(),
        loops
    )
}

fn describe_frames(frames: &[RawFrame]) -> String {
    let mut out = format!("{} {}\n", "frames".bold(), frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let transparent = frame
            .transparent_index
            .map(|t| t.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:>5}  {}x{}+{}+{}  {} ms  disposal {}  transparent {}  colors {}",
            i + 1,
            frame.width,
            frame.height,
            frame.left,
            frame.top,
            frame.delay_ms,
            frame.disposal.code(),
            transparent,
            frame.color_table.len()
        );
    }
    out
}
