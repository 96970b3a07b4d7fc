//! The Win32 console driver.
//!
//! Two output paths share one input pipeline. On a legacy console the
//! diff engine materializes runs of changed rows as [`DiffMsg`]s and
//! writes each with a single `WriteConsoleOutputW` rectangle. Under
//! Windows Terminal (`WT_SESSION` with VT processing available) the
//! driver switches the output code page to UTF-8 and reuses the
//! escape-sequence painter against the built-in xterm table, keeping
//! `ReadConsoleInput` for reliable key, mouse and resize semantics.

mod input;

use std::env;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, bounded, unbounded};
use tracing::debug;
use vtcap::Cap;
use vtevent::{Event, InputMode};
use vtgrid::{Attr, CellBuffer, OutputMode, wcwidth};

use crate::Terminal;
use crate::error::{Error, Result};
use crate::render::Painter;

use winapi::shared::minwindef::{DWORD, FALSE, TRUE, WORD};
use winapi::um::consoleapi::{GetConsoleMode, SetConsoleMode};
use winapi::um::fileapi::{CreateFileW, OPEN_EXISTING, WriteFile};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::wincon::{
    BACKGROUND_BLUE, BACKGROUND_GREEN, BACKGROUND_INTENSITY, BACKGROUND_RED, CHAR_INFO,
    COMMON_LVB_LEADING_BYTE, COMMON_LVB_TRAILING_BYTE, COMMON_LVB_UNDERSCORE,
    CONSOLE_CURSOR_INFO, CONSOLE_SCREEN_BUFFER_INFO, COORD, DISABLE_NEWLINE_AUTO_RETURN,
    ENABLE_EXTENDED_FLAGS, ENABLE_MOUSE_INPUT, ENABLE_VIRTUAL_TERMINAL_INPUT,
    ENABLE_VIRTUAL_TERMINAL_PROCESSING, ENABLE_WINDOW_INPUT, FOREGROUND_BLUE, FOREGROUND_GREEN,
    FOREGROUND_INTENSITY, FOREGROUND_RED, FillConsoleOutputAttribute,
    FillConsoleOutputCharacterW, GetConsoleCursorInfo, GetConsoleScreenBufferInfo, SMALL_RECT,
    SetConsoleCursorInfo, SetConsoleCursorPosition, SetConsoleOutputCP,
    SetConsoleScreenBufferSize, WriteConsoleOutputW,
};
use winapi::um::winnt::{FILE_SHARE_READ, FILE_SHARE_WRITE, GENERIC_READ, GENERIC_WRITE, HANDLE};

const CP_UTF8: DWORD = 65001;

/// A console handle that may cross thread boundaries.
#[derive(Copy, Clone)]
pub(crate) struct Handle(HANDLE);

unsafe impl Send for Handle {}
unsafe impl Sync for Handle {}

/// A run of contiguous changed rows, written with one rectangle write.
struct DiffMsg {
    /// First changed row.
    pos: i16,
    /// Number of rows in the run.
    lines: i16,
    /// `lines * width` cells in row-major order.
    chars: Vec<CHAR_INFO>,
}

pub(crate) struct Driver {
    conin: Handle,
    conout: Handle,
    orig_in_mode: DWORD,
    orig_out_mode: DWORD,
    orig_cp: DWORD,
    orig_cursor: CONSOLE_CURSOR_INFO,
    orig_screen: CONSOLE_SCREEN_BUFFER_INFO,
    /// Present on the WinVT path: escape output against the xterm table.
    painter: Option<Painter>,
    /// Default attribute word, from the console state at startup.
    default_attr: WORD,
    quit: Arc<AtomicBool>,
    input_mode: Arc<AtomicU8>,
    event_rx: Receiver<Event>,
    resize_rx: Receiver<()>,
    intr_tx: Sender<()>,
    intr_rx: Receiver<()>,
    notifier: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

/// A wake-up observed while waiting for events, in priority order.
enum Wake {
    Event(Event),
    Interrupt,
    Resize,
    Timeout,
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn open_console(name: &str, access: DWORD) -> Result<Handle> {
    let path = wide(name);
    let handle = unsafe {
        CreateFileW(
            path.as_ptr(),
            access,
            FILE_SHARE_READ | FILE_SHARE_WRITE,
            std::ptr::null_mut(),
            OPEN_EXISTING,
            0,
            std::ptr::null_mut(),
        )
    };
    if handle == INVALID_HANDLE_VALUE {
        return Err(Error::OpenTty(io::Error::last_os_error()));
    }
    Ok(Handle(handle))
}

impl Driver {
    fn open() -> Result<Driver> {
        let conin = open_console("CONIN$", GENERIC_READ | GENERIC_WRITE)?;
        let conout = open_console("CONOUT$", GENERIC_READ | GENERIC_WRITE)?;

        let mut orig_in_mode: DWORD = 0;
        let mut orig_out_mode: DWORD = 0;
        if unsafe { GetConsoleMode(conin.0, &raw mut orig_in_mode) } != TRUE
            || unsafe { GetConsoleMode(conout.0, &raw mut orig_out_mode) } != TRUE
        {
            return Err(Error::Termios(io::Error::last_os_error()));
        }
        let orig_cp = unsafe { winapi::um::consoleapi::GetConsoleOutputCP() };
        let mut orig_cursor: CONSOLE_CURSOR_INFO = unsafe { std::mem::zeroed() };
        let mut orig_screen: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        unsafe {
            GetConsoleCursorInfo(conout.0, &raw mut orig_cursor);
            GetConsoleScreenBufferInfo(conout.0, &raw mut orig_screen);
        }

        // Window + mouse input; extended flags clear Quick Edit so the
        // mouse reaches us.
        let in_mode = ENABLE_WINDOW_INPUT | ENABLE_MOUSE_INPUT | ENABLE_EXTENDED_FLAGS;
        if unsafe { SetConsoleMode(conin.0, in_mode) } != TRUE {
            return Err(Error::Termios(io::Error::last_os_error()));
        }

        // The WinVT path needs both the session marker and working VT
        // processing on the output handle.
        let vt_mode =
            orig_out_mode | ENABLE_VIRTUAL_TERMINAL_PROCESSING | DISABLE_NEWLINE_AUTO_RETURN;
        let vt = env::var_os("WT_SESSION").is_some()
            && unsafe { SetConsoleMode(conout.0, vt_mode) } == TRUE;
        let painter = if vt {
            unsafe {
                SetConsoleOutputCP(CP_UTF8);
                SetConsoleMode(conin.0, in_mode | ENABLE_VIRTUAL_TERMINAL_INPUT);
            }
            let caps = vtcap::load_builtin("xterm-256color")?;
            Some(Painter::new(caps, OutputMode::Normal))
        } else {
            unsafe {
                SetConsoleMode(conout.0, orig_out_mode);
            }
            fit_screen_buffer(conout, &orig_screen);
            None
        };
        debug!(vt, "win32 driver up");

        let quit = Arc::new(AtomicBool::new(false));
        let input_mode = Arc::new(AtomicU8::new(InputMode::ESC.bits()));
        let (ready_tx, ready_rx) = bounded(1);
        let (resize_tx, resize_rx) = bounded(1);
        let (event_tx, event_rx) = unbounded();
        let (intr_tx, intr_rx) = bounded(1);

        let notifier = {
            let quit = Arc::clone(&quit);
            thread::Builder::new()
                .name("vtbox-notify".to_owned())
                .spawn(move || input::notifier(conin, &quit, &ready_tx, &resize_tx))
                .map_err(Error::PollSetup)?
        };
        let consumer = {
            let quit = Arc::clone(&quit);
            let input_mode = Arc::clone(&input_mode);
            thread::Builder::new()
                .name("vtbox-input".to_owned())
                .spawn(move || input::consumer(conin, &quit, &ready_rx, &event_tx, &input_mode))
                .map_err(Error::PollSetup)?
        };

        Ok(Driver {
            conin,
            conout,
            orig_in_mode,
            orig_out_mode,
            orig_cp,
            orig_cursor,
            orig_screen,
            painter,
            default_attr: orig_screen.wAttributes,
            quit,
            input_mode,
            event_rx,
            resize_rx,
            intr_tx,
            intr_rx,
            notifier: Some(notifier),
            consumer: Some(consumer),
        })
    }

    pub(crate) fn interrupter(&self) -> Sender<()> {
        self.intr_tx.clone()
    }

    fn window_size(&self) -> Result<(usize, usize)> {
        let mut info: CONSOLE_SCREEN_BUFFER_INFO = unsafe { std::mem::zeroed() };
        if unsafe { GetConsoleScreenBufferInfo(self.conout.0, &raw mut info) } != TRUE {
            return Err(Error::Ioctl(io::Error::last_os_error()));
        }
        let w = i32::from(info.srWindow.Right) - i32::from(info.srWindow.Left) + 1;
        let h = i32::from(info.srWindow.Bottom) - i32::from(info.srWindow.Top) + 1;
        #[allow(clippy::cast_sign_loss)]
        let size = (w.max(1) as usize, h.max(1) as usize);
        Ok(size)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        // UTF-8 bytes; the output code page was switched accordingly.
        let mut written: DWORD = 0;
        let mut rest = bytes;
        while !rest.is_empty() {
            let ok = unsafe {
                WriteFile(
                    self.conout.0,
                    rest.as_ptr().cast(),
                    DWORD::try_from(rest.len()).unwrap_or(DWORD::MAX),
                    &raw mut written,
                    std::ptr::null_mut(),
                )
            };
            if ok != TRUE {
                return Err(Error::Write(io::Error::last_os_error()));
            }
            rest = &rest[written as usize..];
        }
        Ok(())
    }

    /// Clear the visible console area with the given attribute word.
    fn clear_console(&mut self, attr: WORD, w: usize, h: usize) {
        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let total = (w * h) as DWORD;
        let origin = COORD { X: 0, Y: 0 };
        let mut filled: DWORD = 0;
        unsafe {
            FillConsoleOutputCharacterW(self.conout.0, u16::from(b' '), total, origin, &raw mut filled);
            FillConsoleOutputAttribute(self.conout.0, attr, total, origin, &raw mut filled);
        }
    }

    /// Block until an event source is ready, preferring
    /// `input > interrupt > resize`, or until `deadline` passes.
    fn wait(&self, deadline: Option<Instant>) -> Result<Wake> {
        loop {
            match self.event_rx.try_recv() {
                Ok(event) => return Ok(Wake::Event(event)),
                Err(TryRecvError::Disconnected) => {
                    return Err(Error::Poll(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        "input consumer terminated",
                    )));
                }
                Err(TryRecvError::Empty) => {}
            }
            if self.intr_rx.try_recv().is_ok() {
                return Ok(Wake::Interrupt);
            }
            if self.resize_rx.try_recv().is_ok() {
                return Ok(Wake::Resize);
            }

            let mut sel = Select::new();
            sel.recv(&self.event_rx);
            sel.recv(&self.intr_rx);
            sel.recv(&self.resize_rx);
            match deadline {
                Some(deadline) => {
                    if sel.ready_deadline(deadline).is_err() {
                        return Ok(Wake::Timeout);
                    }
                }
                None => {
                    sel.ready();
                }
            }
        }
    }

    fn shutdown(&mut self) {
        self.quit.store(true, Ordering::Release);
        if let Some(handle) = self.notifier.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
    }
}

/// Shrink the screen buffer to the visible window so the grid and the
/// buffer agree. The window may not go below the minimum dictated by
/// the system metrics and the current console font.
fn fit_screen_buffer(conout: Handle, info: &CONSOLE_SCREEN_BUFFER_INFO) {
    use winapi::um::wincon::{CONSOLE_FONT_INFO, GetConsoleFontSize, GetCurrentConsoleFont};
    use winapi::um::winuser::{GetSystemMetrics, SM_CXMIN, SM_CYMIN};

    let mut min_w: i16 = 1;
    let mut min_h: i16 = 1;
    let mut font: CONSOLE_FONT_INFO = unsafe { std::mem::zeroed() };
    if unsafe { GetCurrentConsoleFont(conout.0, FALSE, &raw mut font) } == TRUE {
        let cell = unsafe { GetConsoleFontSize(conout.0, font.nFont) };
        if cell.X > 0 && cell.Y > 0 {
            #[allow(clippy::cast_possible_truncation)]
            {
                min_w = (unsafe { GetSystemMetrics(SM_CXMIN) } / i32::from(cell.X)).max(1) as i16;
                min_h = (unsafe { GetSystemMetrics(SM_CYMIN) } / i32::from(cell.Y)).max(1) as i16;
            }
        }
    }

    let win_w = info.srWindow.Right - info.srWindow.Left + 1;
    let win_h = info.srWindow.Bottom - info.srWindow.Top + 1;
    let size = COORD {
        X: win_w.max(min_w),
        Y: win_h.max(min_h),
    };
    unsafe {
        SetConsoleScreenBufferSize(conout.0, size);
    }
}

/// Map a cell attribute pair onto a console attribute word.
fn attr_word(fg: Attr, bg: Attr, default: WORD) -> WORD {
    const FG: [WORD; 9] = [
        0,
        0,
        FOREGROUND_RED,
        FOREGROUND_GREEN,
        FOREGROUND_RED | FOREGROUND_GREEN,
        FOREGROUND_BLUE,
        FOREGROUND_RED | FOREGROUND_BLUE,
        FOREGROUND_GREEN | FOREGROUND_BLUE,
        FOREGROUND_RED | FOREGROUND_GREEN | FOREGROUND_BLUE,
    ];

    let pick = |attr: Attr, background: bool| -> WORD {
        let c = attr.color_index() as usize;
        let mut word = match c {
            0 => {
                if background {
                    default & 0x00f0
                } else {
                    default & 0x000f
                }
            }
            1..=8 => {
                let base = FG[c];
                if background { base << 4 } else { base }
            }
            9..=16 => {
                let base = FG[c - 8];
                if background {
                    base << 4 | BACKGROUND_INTENSITY
                } else {
                    base | FOREGROUND_INTENSITY
                }
            }
            _ => 0,
        };
        if attr.contains(Attr::BOLD) {
            word |= if background {
                BACKGROUND_INTENSITY
            } else {
                FOREGROUND_INTENSITY
            };
        }
        word
    };

    let mut word = pick(fg, false) | pick(bg, true);
    if fg.contains(Attr::UNDERLINE) {
        word |= COMMON_LVB_UNDERSCORE;
    }
    if (fg | bg).contains(Attr::REVERSE) {
        word = (word & 0xff00) | ((word & 0x000f) << 4) | ((word & 0x00f0) >> 4);
    }
    word
}

fn char_info(unit: u16, attributes: WORD) -> CHAR_INFO {
    let mut info: CHAR_INFO = unsafe { std::mem::zeroed() };
    unsafe {
        *info.Char.UnicodeChar_mut() = unit;
    }
    info.Attributes = attributes;
    info
}

impl Terminal {
    pub(crate) fn open() -> Result<Terminal> {
        let mut sys = Driver::open()?;
        if let Some(painter) = sys.painter.as_mut() {
            painter.emit(Cap::EnterCa);
            painter.emit(Cap::EnterKeypad);
            painter.emit(Cap::HideCursor);
            painter.emit(Cap::ClearScreen);
            let bytes = painter.take();
            sys.write_all(&bytes)?;
        } else {
            let cursor = CONSOLE_CURSOR_INFO {
                dwSize: sys.orig_cursor.dwSize,
                bVisible: FALSE,
            };
            unsafe {
                SetConsoleCursorInfo(sys.conout.0, &raw const cursor);
            }
            let (w, h) = sys.window_size()?;
            let attr = sys.default_attr;
            sys.clear_console(attr, w, h);
        }
        let (w, h) = sys.window_size()?;
        let mut back = CellBuffer::new(w, h);
        back.clear(Attr::DEFAULT, Attr::DEFAULT);
        let front = CellBuffer::new(w, h);
        Ok(Terminal {
            sys,
            back,
            front,
            clear_fg: Attr::DEFAULT,
            clear_bg: Attr::DEFAULT,
            cursor: None,
            input_mode: InputMode::ESC,
            closed: false,
        })
    }

    /// Reconcile the console with the back buffer.
    ///
    /// On the legacy path changed rows are gathered into contiguous runs
    /// and each run is written with a single rectangle write; under
    /// WinVT the escape-sequence painter is used instead.
    ///
    /// # Errors
    ///
    /// [`Error::Ioctl`] when the size query fails, [`Error::Write`] when
    /// writing to the console fails.
    pub fn flush(&mut self) -> Result<()> {
        let size = self.sys.window_size()?;
        let resized = size != self.back.size();
        if resized {
            let (w, h) = size;
            self.back.resize(w, h);
            self.front.resize(w, h);
            self.front.clear(self.clear_fg, self.clear_bg);
            if self.sys.painter.is_none() {
                let attr = attr_word(self.clear_fg, self.clear_bg, self.sys.default_attr);
                self.sys.clear_console(attr, w, h);
            }
        }
        if let Some(painter) = self.sys.painter.as_mut() {
            painter.invalidate();
            if resized {
                painter.set_attrs(self.clear_fg, self.clear_bg);
                painter.emit(Cap::ClearScreen);
                painter.invalidate();
            }
            painter.draw_diff(&self.back, &mut self.front);
            if let Some((x, y)) = self.cursor {
                painter.goto(x, y);
            }
            let bytes = painter.take();
            self.sys.write_all(&bytes)?;
        } else {
            self.flush_legacy()?;
        }
        Ok(())
    }

    /// Diff the buffers row-wise and emit one rectangle write per run of
    /// contiguous changed rows.
    fn flush_legacy(&mut self) -> Result<()> {
        let (w, h) = self.back.size();
        let mut msgs: Vec<DiffMsg> = Vec::new();
        let mut y = 0;
        while y < h {
            let row_changed = {
                let start = y * w;
                self.back.cells()[start..start + w] != self.front.cells()[start..start + w]
            };
            if !row_changed {
                y += 1;
                continue;
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let pos = y as i16;
            let mut chars = Vec::with_capacity(w * 2);
            let mut lines: i16 = 0;
            while y < h {
                let start = y * w;
                if self.back.cells()[start..start + w] == self.front.cells()[start..start + w] {
                    break;
                }
                self.encode_row(y, &mut chars);
                for x in 0..w {
                    let cell = self.back.cells()[start + x];
                    self.front.set(x, y, cell);
                }
                lines += 1;
                y += 1;
            }
            msgs.push(DiffMsg { pos, lines, chars });
        }

        #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
        let w16 = w as i16;
        for msg in &msgs {
            let size = COORD {
                X: w16,
                Y: msg.lines,
            };
            let mut rect = SMALL_RECT {
                Left: 0,
                Top: msg.pos,
                Right: w16 - 1,
                Bottom: msg.pos + msg.lines - 1,
            };
            let ok = unsafe {
                WriteConsoleOutputW(
                    self.sys.conout.0,
                    msg.chars.as_ptr(),
                    size,
                    COORD { X: 0, Y: 0 },
                    &raw mut rect,
                )
            };
            if ok != TRUE {
                return Err(Error::Write(io::Error::last_os_error()));
            }
        }

        self.place_console_cursor();
        Ok(())
    }

    /// Encode one back-buffer row as `CHAR_INFO`s. Wide characters
    /// produce a leading/trailing cell pair.
    fn encode_row(&self, y: usize, chars: &mut Vec<CHAR_INFO>) {
        let (w, _) = self.back.size();
        let mut x = 0;
        while x < w {
            let cell = self.back.cells()[y * w + x];
            let attrs = attr_word(cell.fg, cell.bg, self.sys.default_attr);
            let cw = wcwidth(cell.ch).max(1);
            let ch = if (cell.ch as u32) < 0x20 { ' ' } else { cell.ch };
            let mut units = [0u16; 2];
            let unit = ch.encode_utf16(&mut units)[0];
            if cw == 2 && x + 1 < w {
                chars.push(char_info(unit, attrs | COMMON_LVB_LEADING_BYTE));
                chars.push(char_info(unit, attrs | COMMON_LVB_TRAILING_BYTE));
                x += 2;
            } else {
                let unit = if cw == 2 { u16::from(b' ') } else { unit };
                chars.push(char_info(unit, attrs));
                x += 1;
            }
        }
    }

    fn place_console_cursor(&mut self) {
        let visible = self.cursor.is_some();
        let cursor = CONSOLE_CURSOR_INFO {
            dwSize: self.sys.orig_cursor.dwSize.max(1),
            bVisible: if visible { TRUE } else { FALSE },
        };
        unsafe {
            SetConsoleCursorInfo(self.sys.conout.0, &raw const cursor);
        }
        if let Some((x, y)) = self.cursor {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let pos = COORD {
                X: x as i16,
                Y: y as i16,
            };
            unsafe {
                SetConsoleCursorPosition(self.sys.conout.0, pos);
            }
        }
    }

    /// Forget what is on the console, clear it and repaint in full.
    ///
    /// # Errors
    ///
    /// As for [`Terminal::flush`].
    pub fn sync(&mut self) -> Result<()> {
        let (w, h) = self.back.size();
        self.front.clear(self.clear_fg, self.clear_bg);
        if let Some(painter) = self.sys.painter.as_mut() {
            painter.set_attrs(self.clear_fg, self.clear_bg);
            painter.emit(Cap::ClearScreen);
            painter.invalidate();
        } else {
            let attr = attr_word(self.clear_fg, self.clear_bg, self.sys.default_attr);
            self.sys.clear_console(attr, w, h);
        }
        self.flush()
    }

    /// Place the user-visible cursor, or hide it with `None`.
    pub fn set_cursor(&mut self, pos: Option<(usize, usize)>) {
        self.cursor = pos;
        if let Some(painter) = self.sys.painter.as_mut() {
            match pos {
                Some((x, y)) => {
                    painter.emit(Cap::ShowCursor);
                    painter.goto(x, y);
                }
                None => painter.emit(Cap::HideCursor),
            }
        } else {
            self.place_console_cursor();
        }
    }

    /// Set the input mode, or query it with [`InputMode::CURRENT`].
    ///
    /// # Errors
    ///
    /// [`Error::Write`] when the WinVT mouse toggle cannot be written.
    pub fn set_input_mode(&mut self, mode: InputMode) -> Result<InputMode> {
        if mode == InputMode::CURRENT {
            return Ok(self.input_mode);
        }
        let mode = mode.normalize();
        self.input_mode = mode;
        self.sys.input_mode.store(mode.bits(), Ordering::Release);
        Ok(mode)
    }

    /// Set the output color mode, or query it with
    /// [`OutputMode::Current`]. The legacy console knows only the
    /// 16-color palette, so it always reports [`OutputMode::Normal`].
    pub fn set_output_mode(&mut self, mode: OutputMode) -> OutputMode {
        match self.sys.painter.as_mut() {
            Some(painter) => {
                if mode == OutputMode::Current {
                    return painter.output_mode();
                }
                painter.set_output_mode(mode);
                mode
            }
            None => OutputMode::Normal,
        }
    }

    /// Wait for and return the next event, preferring
    /// `input > interrupt > resize`.
    ///
    /// # Errors
    ///
    /// [`Error::Ioctl`] when the post-resize size query fails,
    /// [`Error::Poll`] when the input machinery has gone away.
    pub fn poll_event(&mut self) -> Result<Event> {
        match self.sys.wait(None)? {
            Wake::Event(event) => Ok(event),
            Wake::Interrupt => Ok(Event::Interrupt),
            Wake::Resize => self.resize_event(),
            Wake::Timeout => unreachable!("no deadline was armed"),
        }
    }

    /// Like [`Terminal::poll_event`], giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// As for [`Terminal::poll_event`].
    pub fn peek_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        match self.sys.wait(Some(Instant::now() + timeout))? {
            Wake::Event(event) => Ok(Some(event)),
            Wake::Interrupt => Ok(Some(Event::Interrupt)),
            Wake::Resize => self.resize_event().map(Some),
            Wake::Timeout => Ok(None),
        }
    }

    fn resize_event(&mut self) -> Result<Event> {
        let (w, h) = self.sys.window_size()?;
        Ok(Event::Resize {
            width: i32::try_from(w).unwrap_or(i32::MAX),
            height: i32::try_from(h).unwrap_or(i32::MAX),
        })
    }

    /// Tear the console down: stop the threads and restore modes, code
    /// page, cursor and screen buffer. Best-effort.
    pub(crate) fn platform_close(&mut self) {
        self.sys.shutdown();
        if let Some(painter) = self.sys.painter.as_mut() {
            painter.emit(Cap::ShowCursor);
            painter.emit(Cap::Sgr0);
            painter.emit(Cap::ClearScreen);
            painter.emit(Cap::ExitCa);
            painter.emit(Cap::ExitKeypad);
            painter.emit(Cap::ExitMouse);
            let bytes = painter.take();
            let _ = self.sys.write_all(&bytes);
        } else {
            let (w, h) = self.back.size();
            let attr = self.sys.orig_screen.wAttributes;
            self.sys.clear_console(attr, w, h);
        }
        unsafe {
            SetConsoleMode(self.sys.conin.0, self.sys.orig_in_mode);
            SetConsoleMode(self.sys.conout.0, self.sys.orig_out_mode);
            SetConsoleOutputCP(self.sys.orig_cp);
            SetConsoleCursorInfo(self.sys.conout.0, &raw const self.sys.orig_cursor);
            SetConsoleScreenBufferSize(self.sys.conout.0, self.sys.orig_screen.dwSize);
            CloseHandle(self.sys.conin.0);
            CloseHandle(self.sys.conout.0);
        }
    }
}
