//! A cell-grid terminal UI foundation.
//!
//! The terminal is presented as a rectangular grid of character cells
//! with per-cell attributes. Applications draw into a back buffer and
//! call [`Terminal::flush`] to reconcile the screen with the minimum
//! byte stream, while a background producer turns raw terminal input
//! into a unified stream of key, mouse and resize [`Event`]s.
//!
//! ```no_run
//! use vtbox::{Attr, Event, Key, Terminal};
//!
//! fn main() -> vtbox::Result<()> {
//!     let mut term = Terminal::new()?;
//!     term.set_cell(0, 0, '@', Attr::WHITE, Attr::BLUE)?;
//!     term.flush()?;
//!     loop {
//!         if let Event::Key { key: Key::ESC, .. } = term.poll_event()? {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]

mod error;
mod render;
#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
use unix as sys;
#[cfg(windows)]
use windows as sys;

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::TrySendError;

pub use crate::error::{Error, Result};
pub use vtevent::{Event, InputMode, Key, Mod};
pub use vtgrid::{Attr, Cell, CellBuffer, OutputMode, wcwidth};

/// One terminal per process.
static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// The terminal engine.
///
/// At most one instance exists per process; [`Terminal::new`] fails with
/// [`Error::AlreadyInitialized`] while another instance is alive.
/// Dropping the value restores the terminal, after which a new instance
/// may be created.
pub struct Terminal {
    sys: sys::Driver,
    back: CellBuffer,
    front: CellBuffer,
    clear_fg: Attr,
    clear_bg: Attr,
    cursor: Option<(usize, usize)>,
    input_mode: InputMode,
    closed: bool,
}

impl Terminal {
    /// Acquire the terminal: load capabilities, switch to the alternate
    /// screen in raw mode and start the input machinery.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyInitialized`] when an instance already exists;
    /// otherwise a platform setup error (`OpenTty`, `Termios`,
    /// `PollSetup`, `NoTerm`, `UnsupportedTerm`, ...). On failure the
    /// process environment is left untouched.
    pub fn new() -> Result<Terminal> {
        if INITIALIZED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::AlreadyInitialized);
        }
        match Terminal::open() {
            Ok(term) => Ok(term),
            Err(err) => {
                INITIALIZED.store(false, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// The current buffer dimensions, mirroring the last observed
    /// terminal size.
    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        self.back.size()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.back.width()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.back.height()
    }

    /// Write one cell of the back buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] when `(x, y)` lies outside the buffer; the
    /// buffer is left unchanged.
    pub fn set_cell(&mut self, x: usize, y: usize, ch: char, fg: Attr, bg: Attr) -> Result<()> {
        if self.back.set(x, y, Cell::new(ch, fg, bg)) {
            Ok(())
        } else {
            Err(Error::OutOfBounds { x, y })
        }
    }

    /// Read back one cell of the back buffer.
    ///
    /// # Errors
    ///
    /// [`Error::OutOfBounds`] when `(x, y)` lies outside the buffer.
    pub fn get_cell(&self, x: usize, y: usize) -> Result<Cell> {
        self.back.get(x, y).ok_or(Error::OutOfBounds { x, y })
    }

    /// Reset every back-buffer cell to a blank with the given pair, and
    /// record the pair for future clears and resizes.
    pub fn clear(&mut self, fg: Attr, bg: Attr) {
        self.clear_fg = fg;
        self.clear_bg = bg;
        self.back.clear(fg, bg);
    }

    /// A read view of the back buffer, valid until the next `clear` or
    /// `flush`.
    #[must_use]
    pub fn cell_buffer(&self) -> &CellBuffer {
        &self.back
    }

    /// A handle that can unblock a pending [`Terminal::poll_event`] from
    /// another thread.
    #[must_use]
    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            tx: self.sys.interrupter(),
        }
    }

    /// Restore the terminal. Equivalent to dropping the value;
    /// best-effort and always succeeds.
    pub fn close(mut self) {
        self.close_impl();
    }

    fn close_impl(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.platform_close();
        INITIALIZED.store(false, Ordering::SeqCst);
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        self.close_impl();
    }
}

/// Unblocks a pending [`Terminal::poll_event`], which then returns
/// [`Event::Interrupt`]. Clonable and safe to use from any thread,
/// concurrently with the poll itself.
#[derive(Clone)]
pub struct Interrupter {
    tx: crossbeam_channel::Sender<()>,
}

impl Interrupter {
    /// Wake one pending poll. A single pending interrupt is kept; extra
    /// calls coalesce.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialized`] once the terminal has been closed.
    pub fn interrupt(&self) -> Result<()> {
        match self.tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) => Ok(()),
            Err(TrySendError::Disconnected(())) => Err(Error::NotInitialized),
        }
    }
}
