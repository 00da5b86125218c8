use std::env::current_dir;
use std::fs::read_dir;
use std::io::{BufWriter, Read, Stdout, Write};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use termios::{tcsetattr, Termios, ECHO, ICANON, TCSANOW, VMIN, VTIME};
use termsize::Size;
use tracing::{debug, info};

use crate::ansi::ansi::{self, Color, CursorPos, Erase};
use crate::common::common::{get_larger_buffered_stdout, has_extension, path_to_str};
use crate::compositor::CompositedFrame;
use crate::config::ViewerConfig;
use crate::controller::{Controller, LoadTicket, PlayState};
use crate::error::{Result, ViewerError};
use crate::export::export_as_image;
use crate::handler::load_path;
use crate::render::{Area, FilmStrip, Renderer, TerminalRenderer};

const HEADER_COLOR: Color = Color { red: 0xd5, green: 0x98, blue: 0x90 };
const SYMBOLS: [char; 4] = ['📄', '📁', '📂', '➜'];
const IDLE_TIMEOUT: Duration = Duration::from_millis(250);
const VIEWER_HELP: &str = "space play/stop  h/l prev/next  0/$ first/last  e export  o open  q quit";
const BROWSER_HELP: &str = "j/k move  enter open  h parent  esc back  q quit";
/// Below this many rows the filmstrip is left out.
const MIN_ROWS_FOR_FILMSTRIP: usize = 14;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Up,
    Down,
    Left,
    Right,
    Enter,
    Esc,
}

/// Splits raw terminal input into keys. Unknown escape sequences are dropped.
pub fn parse_keys(bytes: &[u8]) -> Vec<Key> {
    scan_keys(bytes, false).0
}

/// Returns the keys found and how many bytes they used. With `hold_partial`,
/// an escape sequence cut off at the end of `bytes` is left unconsumed.
fn scan_keys(bytes: &[u8], hold_partial: bool) -> (Vec<Key>, usize) {
    let mut keys = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1b if hold_partial && (i + 1 == bytes.len() || (bytes[i + 1] == b'[' && i + 2 == bytes.len())) => {
                break;
            }
            0x1b if bytes.get(i + 1) == Some(&b'[') && i + 2 < bytes.len() => {
                let key = match bytes[i + 2] {
                    b'A' => Some(Key::Up),
                    b'B' => Some(Key::Down),
                    b'C' => Some(Key::Right),
                    b'D' => Some(Key::Left),
                    _ => None,
                };
                keys.extend(key);
                i += 3;
                continue;
            }
            0x1b => keys.push(Key::Esc),
            b'\r' | b'\n' => keys.push(Key::Enter),
            b if b.is_ascii() => keys.push(Key::Char(b as char)),
            _ => {}
        }
        i += 1;
    }
    (keys, i)
}

/// Key decoding across reads: an escape sequence split between two reads is
/// held back until the rest arrives, or until input goes quiet.
#[derive(Default)]
pub struct KeyParser {
    pending: Vec<u8>,
}

impl KeyParser {
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        self.pending.extend_from_slice(bytes);
        let (keys, used) = scan_keys(&self.pending, true);
        self.pending.drain(..used);
        keys
    }

    /// No more input for now: whatever is held back is taken as typed, so a
    /// lone escape becomes `Key::Esc`.
    pub fn flush(&mut self) -> Vec<Key> {
        let keys = parse_keys(&self.pending);
        self.pending.clear();
        keys
    }
}

enum Event {
    Key(Key),
    Loaded {
        ticket: LoadTicket,
        path: PathBuf,
        result: std::result::Result<Vec<CompositedFrame>, String>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Screen {
    Browser,
    Viewer,
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Quit,
}

/// Non-canonical, no-echo stdin for the lifetime of the value.
struct RawTerminal {
    fd: i32,
    original: Termios,
}

impl RawTerminal {
    fn enable() -> Result<Self> {
        let fd = std::io::stdin().as_raw_fd();
        let original = Termios::from_fd(fd).map_err(|err| ViewerError::Terminal(format!("stdin is not a terminal: {err}")))?;

        let mut raw = original;
        raw.c_lflag &= !(ICANON | ECHO);
        // Reads return after a tenth of a second without input.
        raw.c_cc[VMIN] = 0;
        raw.c_cc[VTIME] = 1;
        tcsetattr(fd, TCSANOW, &raw)?;

        let mut stdout = std::io::stdout();
        ansi::enter_alternate_screen(&mut stdout)?;
        ansi::hide_cursor(&mut stdout)?;
        stdout.flush()?;
        Ok(RawTerminal { fd, original })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        let mut stdout = std::io::stdout();
        let _ = ansi::reset_sgr(&mut stdout);
        let _ = ansi::show_cursor(&mut stdout);
        let _ = ansi::leave_alternate_screen(&mut stdout);
        let _ = stdout.flush();
        let _ = tcsetattr(self.fd, TCSANOW, &self.original);
    }
}

struct FileInfo {
    path: PathBuf,
    file_name: String,
    is_dir: bool,
    /// Target of a symlink, shown next to the name.
    canon_name: Option<String>,
}

/// Directory listing for picking a GIF: subdirectories and `.gif` files.
struct Browser {
    dir: PathBuf,
    entries: Vec<FileInfo>,
    /// 0 is the ".." row, entry `i` is row `i + 1`.
    selected: usize,
}

impl Browser {
    fn new(dir: PathBuf) -> std::io::Result<Self> {
        let mut browser = Browser { dir, entries: Vec::new(), selected: 0 };
        browser.read_current_dir()?;
        Ok(browser)
    }

    fn read_current_dir(&mut self) -> std::io::Result<()> {
        let mut dir_state = Vec::new();
        for entry in read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path_to_str(&path) else {
                continue;
            };
            let file_name = String::from(file_name);

            let is_dir = path.is_dir();
            if !is_dir && !has_extension(&path, "gif") {
                continue;
            }

            let canon_name = if path.is_symlink() {
                path.canonicalize().ok().map(|canon| canon.display().to_string())
            } else {
                None
            };
            dir_state.push(FileInfo { path, file_name, is_dir, canon_name });
        }

        dir_state.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.file_name.cmp(&b.file_name)));
        self.entries = dir_state;
        self.selected = self.selected.min(self.entries.len());
        Ok(())
    }

    fn move_by(&mut self, delta: isize) {
        let last = self.entries.len() as isize;
        self.selected = (self.selected as isize + delta).clamp(0, last) as usize;
    }

    fn enter_dir(&mut self, dir: PathBuf) -> std::io::Result<()> {
        let previous = std::mem::replace(&mut self.dir, dir);
        self.selected = 0;
        if let Err(err) = self.read_current_dir() {
            self.dir = previous;
            self.read_current_dir()?;
            return Err(err);
        }
        Ok(())
    }

    fn parent(&mut self) -> std::io::Result<()> {
        match self.dir.canonicalize()?.parent() {
            Some(parent) => self.enter_dir(parent.to_path_buf()),
            None => Ok(()),
        }
    }

    /// Opens the selected row: directories are entered, files are returned.
    fn activate(&mut self) -> std::io::Result<Option<PathBuf>> {
        if self.selected == 0 {
            self.parent()?;
            return Ok(None);
        }

        let info = &self.entries[self.selected - 1];
        if info.is_dir {
            let dir = info.path.clone();
            self.enter_dir(dir)?;
            return Ok(None);
        }
        Ok(Some(info.path.clone()))
    }
}

pub struct Window {
    term_size: Size,
    config: ViewerConfig,
    controller: Controller,
    screen: Screen,
    browser: Browser,
    loaded_path: Option<PathBuf>,
    loading: Option<PathBuf>,
    status: Option<String>,
    film_strip: FilmStrip,
    renderer: TerminalRenderer<BufWriter<Stdout>>,
    events: Sender<Event>,
    receiver: Receiver<Event>,
}

impl Window {
    pub fn new(config: ViewerConfig, dir: Option<PathBuf>) -> Result<Self> {
        let term_size = termsize::get().ok_or_else(|| ViewerError::Terminal("could not get terminal size".into()))?;
        if (term_size.rows as usize) < 4 {
            return Err(ViewerError::Terminal("terminal not big enough".into()));
        }

        let dir = match dir {
            Some(dir) => dir,
            None => current_dir()?,
        };
        let writer = get_larger_buffered_stdout(term_size.rows as usize, term_size.cols as usize);
        let area = Area { col: 1, row: 2, cols: term_size.cols as usize, rows: 1 };
        let (events, receiver) = mpsc::channel();

        Ok(Window {
            term_size,
            controller: Controller::new(config.default_delay),
            config,
            screen: Screen::Browser,
            browser: Browser::new(dir)?,
            loaded_path: None,
            loading: None,
            status: None,
            film_strip: FilmStrip { thumb_cols: 12, thumb_rows: 3 },
            renderer: TerminalRenderer::new(writer, area),
            events,
            receiver,
        })
    }

    /// Runs the session until the user quits. With `file`, starts by loading it.
    pub fn do_interactive(&mut self, file: Option<PathBuf>) -> Result<()> {
        let _raw = RawTerminal::enable()?;
        self.spawn_key_reader();

        if let Some(file) = file {
            self.start_load(file);
        }
        self.draw(true)?;

        loop {
            let timeout = self
                .controller
                .next_deadline()
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or(IDLE_TIMEOUT);

            match self.receiver.recv_timeout(timeout) {
                Ok(Event::Key(key)) => {
                    if self.handle_key(key)? == Flow::Quit {
                        break;
                    }
                }
                Ok(Event::Loaded { ticket, path, result }) => self.finish_load(ticket, path, result)?,
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }

            if self.controller.poll(Instant::now()) && self.screen == Screen::Viewer {
                self.draw(false)?;
            }
            self.check_resize()?;
        }

        Ok(())
    }

    fn spawn_key_reader(&self) {
        let events = self.events.clone();
        thread::spawn(move || {
            let mut stdin = std::io::stdin();
            let mut buf = [0u8; 32];
            let mut parser = KeyParser::default();
            loop {
                let keys = match stdin.read(&mut buf) {
                    Ok(0) => parser.flush(),
                    Ok(n) => parser.feed(&buf[..n]),
                    Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(_) => break,
                };
                for key in keys {
                    if events.send(Event::Key(key)).is_err() {
                        return;
                    }
                }
            }
        });
    }

    /// Decodes and composites on a worker thread; the result comes back as an event.
    fn start_load(&mut self, path: PathBuf) {
        let ticket = self.controller.begin_load();
        let events = self.events.clone();
        let options = self.config.composite;
        info!(path = %path.display(), "loading");

        self.loading = Some(path.clone());
        self.screen = Screen::Viewer;
        thread::spawn(move || {
            let result = load_path(&path, options).map_err(|err| err.to_string());
            let _ = events.send(Event::Loaded { ticket, path, result });
        });
    }

    fn finish_load(
        &mut self,
        ticket: LoadTicket,
        path: PathBuf,
        result: std::result::Result<Vec<CompositedFrame>, String>,
    ) -> Result<()> {
        if !self.controller.is_current(ticket) {
            debug!(path = %path.display(), "ignoring superseded load");
            return Ok(());
        }
        self.loading = None;

        match result {
            Ok(frames) => {
                self.controller.finish_load(ticket, frames);
                self.loaded_path = Some(path);
                self.status = None;
                self.screen = Screen::Viewer;
            }
            Err(message) => {
                let name = path_to_str(&path).unwrap_or("file").to_string();
                self.controller.fail_load(ticket, format!("Could not open {name}: {message}"));
                if self.controller.state().is_empty() {
                    self.screen = Screen::Browser;
                }
            }
        }
        self.draw(true)
    }

    fn check_resize(&mut self) -> Result<()> {
        if let Some(size) = termsize::get() {
            if size.rows != self.term_size.rows || size.cols != self.term_size.cols {
                self.term_size = size;
                self.draw(true)?;
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: Key) -> Result<Flow> {
        self.controller.dismiss_message();
        self.status = None;
        if key == Key::Char('q') {
            return Ok(Flow::Quit);
        }

        match self.screen {
            Screen::Browser => self.handle_browser_key(key)?,
            Screen::Viewer => self.handle_viewer_key(key)?,
        }
        Ok(Flow::Continue)
    }

    fn handle_browser_key(&mut self, key: Key) -> Result<()> {
        let outcome = match key {
            Key::Char('j') | Key::Down => {
                self.browser.move_by(1);
                Ok(())
            }
            Key::Char('k') | Key::Up => {
                self.browser.move_by(-1);
                Ok(())
            }
            Key::Char('h') | Key::Left => self.browser.parent(),
            Key::Enter | Key::Char('l') | Key::Right => match self.browser.activate() {
                Ok(Some(file)) => {
                    self.start_load(file);
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(err) => Err(err),
            },
            Key::Esc if self.loaded_path.is_some() || self.loading.is_some() => {
                self.screen = Screen::Viewer;
                Ok(())
            }
            _ => Ok(()),
        };
        if let Err(err) = outcome {
            self.status = Some(format!("{err}"));
        }
        self.draw(true)
    }

    fn handle_viewer_key(&mut self, key: Key) -> Result<()> {
        let now = Instant::now();
        match key {
            Key::Char(' ') => {
                self.controller.toggle_play(now);
            }
            Key::Char('l') | Key::Right => {
                self.controller.next(now);
            }
            Key::Char('h') | Key::Left => {
                self.controller.prev(now);
            }
            Key::Char('0') => {
                self.controller.first(now);
            }
            Key::Char('$') => {
                self.controller.last(now);
            }
            Key::Char('e') => self.export_current(),
            Key::Char('o') | Key::Esc => {
                self.controller.stop();
                self.screen = Screen::Browser;
                return self.draw(true);
            }
            _ => {}
        }
        self.draw(false)
    }

    fn export_current(&mut self) {
        let state = self.controller.state();
        let Some(frame) = state.current_frame() else {
            return;
        };
        self.status = Some(match export_as_image(&frame.bitmap, &self.config.export_dir, state.current_index()) {
            Ok(path) => format!("Saved {}", path.display()),
            Err(err) => format!("Export failed: {err}"),
        });
    }

    fn draw(&mut self, full: bool) -> Result<()> {
        match self.screen {
            Screen::Browser => self.print_current_dir()?,
            Screen::Viewer => self.print_viewer(full)?,
        }
        self.renderer.writer().flush()?;
        Ok(())
    }

    fn rows(&self) -> usize {
        self.term_size.rows as usize
    }

    fn cols(&self) -> usize {
        self.term_size.cols as usize
    }

    fn print_viewer(&mut self, full: bool) -> Result<()> {
        let (rows, cols) = (self.rows(), self.cols());
        if full {
            let writer = self.renderer.writer();
            ansi::erase(Erase::Screen, writer)?;
            ansi::reset_cursor(writer)?;
        }

        let header = self.viewer_header();
        self.print_line(1, &header, true)?;

        let state = self.controller.state();
        let show_strip = rows >= MIN_ROWS_FOR_FILMSTRIP && state.len() > 1;
        let strip_rows = if show_strip { self.film_strip.height() + 1 } else { 0 };
        let image_rows = rows.saturating_sub(2 + strip_rows).max(1);

        if let Some(frame) = state.current_frame() {
            self.renderer.set_area(Area { col: 1, row: 2, cols, rows: image_rows });
            self.renderer.display(&frame.bitmap)?;

            if show_strip {
                let area = Area { col: 1, row: rows - self.film_strip.height(), cols, rows: self.film_strip.height() };
                self.film_strip.render(
                    self.renderer.writer(),
                    state.frames(),
                    state.current_index(),
                    state.film_scroll(),
                    area,
                )?;
            }
        }

        let status = self.status_line(VIEWER_HELP);
        self.print_line(rows, &status, false)?;
        Ok(())
    }

    fn viewer_header(&self) -> String {
        let name = self
            .loaded_path
            .as_deref()
            .and_then(path_to_str)
            .unwrap_or("no file")
            .to_string();

        if let Some(loading) = &self.loading {
            return format!("{} Loading {}", SYMBOLS[3], loading.display());
        }

        let state = self.controller.state();
        if state.is_empty() {
            return format!("{name}  no frames to show");
        }

        let play = match state.play_state() {
            PlayState::Playing => "▶ playing",
            PlayState::Stopped => "■ stopped",
        };
        let delay = self.controller.frame_delay(state.current_index()).as_millis();
        format!(
            "{name}  Frame: {} / {}  {play}  {delay} ms",
            state.current_index() + 1,
            state.len()
        )
    }

    fn status_line(&self, help: &str) -> String {
        self.controller
            .message()
            .map(str::to_string)
            .or_else(|| self.status.clone())
            .unwrap_or_else(|| help.to_string())
    }

    fn print_line(&mut self, row: usize, text: &str, colored: bool) -> Result<()> {
        let cols = self.cols();
        let writer = self.renderer.writer();
        ansi::set_cursor(&CursorPos { x: 1, y: row }, writer)?;
        ansi::erase_line(writer)?;
        let text: String = text.chars().take(cols).collect();
        if colored {
            ansi::set_foreground_color(writer, &text, &HEADER_COLOR)?;
        } else {
            write!(writer, "{text}")?;
        }
        Ok(())
    }

    fn num_printable_lines(&self) -> usize {
        // header, divider, ".." and the status line
        self.rows().saturating_sub(4).max(1)
    }

    fn print_current_dir(&mut self) -> Result<()> {
        let num_printable_lines = self.num_printable_lines();
        let page = self.browser.selected.saturating_sub(1) / num_printable_lines;
        let entry_offset = page * num_printable_lines;

        let dir_name = self.browser.dir.display().to_string();
        self.print_header(&dir_name)?;

        let selected = self.browser.selected;
        let writer = self.renderer.writer();
        let infos = self.browser.entries.iter().enumerate().skip(entry_offset).take(num_printable_lines);
        for (i, info) in infos {
            let index = if info.is_dir { 1 } else { 0 };
            write!(writer, "{} ", SYMBOLS[index])?;
            print_highlighted_if(writer, selected == i + 1, &info.file_name)?;
            if let Some(canon_name) = &info.canon_name {
                write!(writer, " {} {}", SYMBOLS[3], canon_name)?;
            }
            ansi::next_line(writer)?;
        }

        let status = self.status_line(BROWSER_HELP);
        let rows = self.rows();
        self.print_line(rows, &status, false)
    }

    fn print_header(&mut self, dir_name: &str) -> Result<()> {
        let selected = self.browser.selected;
        let writer = self.renderer.writer();
        ansi::erase(Erase::Screen, writer)?;
        ansi::reset_cursor(writer)?;

        // Print directory name
        let dir_name = format!("{} {}", SYMBOLS[2], dir_name);
        ansi::set_foreground_color(writer, &dir_name, &HEADER_COLOR)?;
        ansi::next_line(writer)?;

        // Print divider
        let len = dir_name.chars().count() + 2;
        let divider = String::from_iter(std::iter::repeat_n("-", len));
        ansi::set_foreground_color(writer, &divider, &HEADER_COLOR)?;
        ansi::next_line(writer)?;

        // Print ".." path
        write!(writer, "{} ", SYMBOLS[1])?;
        print_highlighted_if(writer, selected == 0, "..")?;
        ansi::next_line(writer)?;

        Ok(())
    }
}

fn print_highlighted_if<W: Write>(writer: &mut W, highlighted: bool, to_highlight: &str) -> std::io::Result<()> {
    if highlighted {
        ansi::make_reverse(writer)?;
        ansi::make_underline(writer)?;
    }
    write!(writer, "{to_highlight}")?;

    if highlighted {
        ansi::reset_sgr(writer)?;
    }
    Ok(())
}

/// Directory to browse for `path`: the path itself, or the file's parent.
pub fn browse_root(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        return Some(path.to_path_buf());
    }
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map(Path::to_path_buf)
}
