//! The POSIX terminal driver: tty descriptors, raw mode, the signal
//! adapter and the input producer thread.
//!
//! Signals never touch engine state: a dedicated pump forwards SIGWINCH
//! and SIGIO onto bounded channels, and the producer thread turns SIGIO
//! wake-ups into non-blocking reads whose chunks land on the input
//! queue. Everything else happens on the application thread.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{
    Receiver, Select, Sender, TryRecvError, TrySendError, bounded, select, unbounded,
};
use signal_hook::consts::{SIGIO, SIGWINCH};
use signal_hook::iterator::Signals;
use tracing::{debug, trace};
use vtcap::{Cap, TermCaps};
use vtevent::{Event, Extracted, InputMode, extract_event};
use vtgrid::{Attr, CellBuffer, OutputMode};

use crate::error::{Error, Result};
use crate::render::Painter;
use crate::Terminal;

/// Upper bound on a single non-blocking read, per the producer
/// contract.
const READ_CHUNK: usize = 128;

/// How long a lone ESC may wait for the rest of a sequence before it is
/// reported as the ESC key.
const ESC_WAIT: Duration = Duration::from_millis(100);

/// A wake-up observed while waiting for events, in priority order.
pub(crate) enum Wake {
    Input(io::Result<Vec<u8>>),
    Interrupt,
    Winch,
    Timeout,
}

pub(crate) struct Driver {
    painter: Painter,
    out: File,
    /// Keeps the input descriptor alive when it is distinct from `out`.
    _input: Option<File>,
    orig_termios: libc::termios,
    input_rx: Receiver<io::Result<Vec<u8>>>,
    winch_rx: Receiver<()>,
    intr_tx: Sender<()>,
    intr_rx: Receiver<()>,
    quit_tx: Sender<()>,
    signals_handle: signal_hook::iterator::Handle,
    producer: Option<JoinHandle<()>>,
    signal_pump: Option<JoinHandle<()>>,
    /// Bytes read from the tty but not yet turned into events.
    pending: Vec<u8>,
    /// Deadline armed after an ambiguous lone ESC.
    esc_deadline: Option<Instant>,
    /// Set when the deadline fired so the same bytes are not waited on
    /// twice.
    esc_timed_out: bool,
}

impl Driver {
    fn open(caps: TermCaps) -> Result<Driver> {
        let (out, input, input_fd) = open_tty()?;
        let orig_termios = enter_raw_mode(out.as_raw_fd())?;
        arm_sigio(input_fd).map_err(Error::PollSetup)?;

        let mut signals = Signals::new([SIGWINCH, SIGIO]).map_err(Error::PollSetup)?;
        let signals_handle = signals.handle();
        let (winch_tx, winch_rx) = bounded(1);
        let (sigio_tx, sigio_rx) = bounded::<()>(1);
        let signal_pump = thread::Builder::new()
            .name("vtbox-signals".to_owned())
            .spawn(move || {
                for signal in signals.forever() {
                    match signal {
                        SIGWINCH => {
                            let _ = winch_tx.try_send(());
                        }
                        SIGIO => {
                            let _ = sigio_tx.try_send(());
                        }
                        _ => {}
                    }
                }
            })
            .map_err(Error::PollSetup)?;

        let (input_tx, input_rx) = unbounded();
        let (intr_tx, intr_rx) = bounded(1);
        let (quit_tx, quit_rx) = bounded(1);
        let producer = thread::Builder::new()
            .name("vtbox-input".to_owned())
            .spawn(move || producer_loop(input_fd, &sigio_rx, &quit_rx, &input_tx))
            .map_err(Error::PollSetup)?;

        debug!(input_fd, "posix driver up");
        Ok(Driver {
            painter: Painter::new(caps, OutputMode::Normal),
            out,
            _input: input,
            orig_termios,
            input_rx,
            winch_rx,
            intr_tx,
            intr_rx,
            quit_tx,
            signals_handle,
            producer: Some(producer),
            signal_pump: Some(signal_pump),
            pending: Vec::new(),
            esc_deadline: None,
            esc_timed_out: false,
        })
    }

    /// Write the whole byte stream. On the platforms where input and
    /// output share one non-blocking descriptor a write may report
    /// `WouldBlock`; those are retried.
    fn write_all(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            match self.out.write(bytes) {
                Ok(0) => {
                    return Err(Error::Write(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "terminal write returned zero",
                    )));
                }
                Ok(n) => bytes = &bytes[n..],
                Err(err)
                    if err.kind() == io::ErrorKind::Interrupted
                        || err.kind() == io::ErrorKind::WouldBlock => {}
                Err(err) => return Err(Error::Write(err)),
            }
        }
        Ok(())
    }

    /// The terminal window size in cells.
    pub(crate) fn window_size(&self) -> Result<(usize, usize)> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        let rc = unsafe { libc::ioctl(self.out.as_raw_fd(), libc::TIOCGWINSZ, &raw mut ws) };
        if rc < 0 {
            return Err(Error::Ioctl(io::Error::last_os_error()));
        }
        Ok((usize::from(ws.ws_col), usize::from(ws.ws_row)))
    }

    pub(crate) fn interrupter(&self) -> Sender<()> {
        self.intr_tx.clone()
    }

    /// Block until one of the event sources is ready, preferring
    /// `input > interrupt > winch`, or until `deadline` passes.
    pub(crate) fn wait(&self, deadline: Option<Instant>) -> Result<Wake> {
        loop {
            match self.input_rx.try_recv() {
                Ok(chunk) => return Ok(Wake::Input(chunk)),
                Err(TryRecvError::Disconnected) => return Err(producer_gone()),
                Err(TryRecvError::Empty) => {}
            }
            if self.intr_rx.try_recv().is_ok() {
                return Ok(Wake::Interrupt);
            }
            match self.winch_rx.try_recv() {
                Ok(()) => return Ok(Wake::Winch),
                Err(TryRecvError::Disconnected) => return Err(producer_gone()),
                Err(TryRecvError::Empty) => {}
            }

            // `ready` wakes without consuming, so the priority re-check
            // above stays authoritative.
            let mut sel = Select::new();
            sel.recv(&self.input_rx);
            sel.recv(&self.intr_rx);
            sel.recv(&self.winch_rx);
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

    pub(crate) fn restore_termios(&mut self) {
        unsafe {
            libc::tcsetattr(
                self.out.as_raw_fd(),
                libc::TCSAFLUSH,
                &raw const self.orig_termios,
            );
        }
    }

    /// Stop the auxiliary threads. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        match self.quit_tx.try_send(()) {
            Ok(()) | Err(TrySendError::Full(())) | Err(TrySendError::Disconnected(())) => {}
        }
        self.signals_handle.close();
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.signal_pump.take() {
            let _ = handle.join();
        }
        trace!("posix driver down");
    }
}

fn producer_gone() -> Error {
    Error::Poll(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "input producer terminated",
    ))
}

/// Open the controlling terminal. Output and input are separate
/// descriptors on Linux; the BSDs and macOS share one read-write
/// descriptor.
fn open_tty() -> Result<(File, Option<File>, RawFd)> {
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    ))]
    {
        let tty = OpenOptions::new()
            .read(true)
            .write(true)
            .open("/dev/tty")
            .map_err(Error::OpenTty)?;
        let fd = tty.as_raw_fd();
        Ok((tty, None, fd))
    }
    #[cfg(not(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd",
        target_os = "dragonfly"
    )))]
    {
        let out = OpenOptions::new()
            .write(true)
            .open("/dev/tty")
            .map_err(Error::OpenTty)?;
        let input = OpenOptions::new()
            .read(true)
            .open("/dev/tty")
            .map_err(Error::OpenTty)?;
        let fd = input.as_raw_fd();
        Ok((out, Some(input), fd))
    }
}

/// Raw mode per the classic recipe: no input translation, no echo, no
/// canonical buffering, 8-bit characters, byte-at-a-time reads.
fn enter_raw_mode(fd: RawFd) -> Result<libc::termios> {
    let mut orig: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(fd, &raw mut orig) } != 0 {
        return Err(Error::Termios(io::Error::last_os_error()));
    }
    let mut attrs = orig;
    attrs.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    attrs.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    attrs.c_cflag |= libc::CS8;
    attrs.c_cc[libc::VMIN] = 1;
    attrs.c_cc[libc::VTIME] = 0;
    if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const attrs) } != 0 {
        return Err(Error::Termios(io::Error::last_os_error()));
    }
    Ok(orig)
}

/// Make the input descriptor non-blocking and deliver SIGIO to this
/// process when it becomes readable.
fn arm_sigio(fd: RawFd) -> io::Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK | libc::O_ASYNC) < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::fcntl(fd, libc::F_SETOWN, libc::getpid()) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

/// The input producer: wait for a readiness signal or the quit message,
/// then drain the descriptor in `READ_CHUNK`-sized non-blocking reads.
fn producer_loop(
    fd: RawFd,
    sigio: &Receiver<()>,
    quit: &Receiver<()>,
    out: &Sender<io::Result<Vec<u8>>>,
) {
    // Input may have arrived before SIGIO delivery was armed.
    if !drain_input(fd, out) {
        return;
    }
    loop {
        select! {
            recv(quit) -> _ => return,
            recv(sigio) -> msg => {
                if msg.is_err() || !drain_input(fd, out) {
                    return;
                }
            }
        }
    }
}

impl Terminal {
    pub(crate) fn open() -> Result<Terminal> {
        let caps = vtcap::load()?;
        debug!(term = caps.name(), "acquiring terminal");
        let mut sys = Driver::open(caps)?;
        sys.painter.emit(Cap::EnterCa);
        sys.painter.emit(Cap::EnterKeypad);
        sys.painter.emit(Cap::HideCursor);
        sys.painter.emit(Cap::ClearScreen);
        let bytes = sys.painter.take();
        sys.write_all(&bytes)?;
        let (w, h) = sys.window_size()?;
        let mut back = CellBuffer::new(w, h);
        back.clear(Attr::DEFAULT, Attr::DEFAULT);
        // The front buffer stays zeroed so the first flush repaints
        // every cell of the freshly cleared screen.
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

    /// Reconcile the terminal with the back buffer.
    ///
    /// Queries the current window size first; on a change both buffers
    /// are resized (top-left preserved) and the screen is repainted in
    /// full. After a successful flush the front buffer equals the back
    /// buffer.
    ///
    /// # Errors
    ///
    /// [`Error::Ioctl`] when the size query fails, [`Error::Write`]
    /// when writing to the terminal fails.
    pub fn flush(&mut self) -> Result<()> {
        self.sys.painter.invalidate();
        let size = self.sys.window_size()?;
        if size != self.back.size() {
            let (w, h) = size;
            debug!(w, h, "terminal resized, full repaint");
            self.back.resize(w, h);
            self.front.resize(w, h);
            self.front.clear(self.clear_fg, self.clear_bg);
            self.sys.painter.set_attrs(self.clear_fg, self.clear_bg);
            self.sys.painter.emit(Cap::ClearScreen);
            self.sys.painter.invalidate();
        }
        self.sys.painter.draw_diff(&self.back, &mut self.front);
        if let Some((x, y)) = self.cursor {
            self.sys.painter.goto(x, y);
        }
        let bytes = self.sys.painter.take();
        self.sys.write_all(&bytes)
    }

    /// Forget what is on the terminal, clear it and flush the whole back
    /// buffer. Recovers from out-of-band screen corruption.
    ///
    /// # Errors
    ///
    /// As for [`Terminal::flush`].
    pub fn sync(&mut self) -> Result<()> {
        self.front.clear(self.clear_fg, self.clear_bg);
        self.sys.painter.set_attrs(self.clear_fg, self.clear_bg);
        self.sys.painter.emit(Cap::ClearScreen);
        self.sys.painter.invalidate();
        self.flush()
    }

    /// Place the user-visible cursor, or hide it with `None`. The
    /// position takes effect with the next flush.
    pub fn set_cursor(&mut self, pos: Option<(usize, usize)>) {
        match (self.cursor, pos) {
            (None, Some((x, y))) => {
                self.sys.painter.emit(Cap::ShowCursor);
                self.sys.painter.goto(x, y);
            }
            (Some(_), None) => self.sys.painter.emit(Cap::HideCursor),
            (Some(old), Some(new)) if old != new => self.sys.painter.goto(new.0, new.1),
            _ => {}
        }
        self.cursor = pos;
    }

    /// Set the input mode, or query it with [`InputMode::CURRENT`].
    /// Returns the mode in effect. Mouse reporting on the terminal is
    /// switched to match.
    ///
    /// # Errors
    ///
    /// [`Error::Write`] when the mouse toggle cannot be written.
    pub fn set_input_mode(&mut self, mode: InputMode) -> Result<InputMode> {
        if mode == InputMode::CURRENT {
            return Ok(self.input_mode);
        }
        let mode = mode.normalize();
        let cap = if mode.contains(InputMode::MOUSE) {
            Cap::EnterMouse
        } else {
            Cap::ExitMouse
        };
        self.sys.painter.emit(cap);
        let bytes = self.sys.painter.take();
        self.sys.write_all(&bytes)?;
        self.input_mode = mode;
        Ok(mode)
    }

    /// Set the output color mode, or query it with
    /// [`OutputMode::Current`]. Returns the mode in effect; the encoding
    /// changes at the next flush.
    pub fn set_output_mode(&mut self, mode: OutputMode) -> OutputMode {
        if mode == OutputMode::Current {
            return self.sys.painter.output_mode();
        }
        self.sys.painter.set_output_mode(mode);
        mode
    }

    /// Wait for and return the next event.
    ///
    /// Sources are served in the fixed priority `input > interrupt >
    /// resize`. Undecodable input bytes surface as [`Event::None`] with
    /// the number of bytes skipped.
    ///
    /// # Errors
    ///
    /// [`Error::Read`] for producer I/O failures, [`Error::Ioctl`] when
    /// the post-resize size query fails, [`Error::Poll`] when the input
    /// machinery has gone away.
    pub fn poll_event(&mut self) -> Result<Event> {
        loop {
            if let Some(event) = self.extract_pending() {
                return Ok(event);
            }
            match self.sys.wait(self.sys.esc_deadline)? {
                Wake::Input(Ok(chunk)) => {
                    self.sys.pending.extend_from_slice(&chunk);
                    self.sys.esc_deadline = None;
                    self.sys.esc_timed_out = false;
                }
                Wake::Input(Err(err)) => return Err(Error::Read(err)),
                Wake::Interrupt => return Ok(Event::Interrupt),
                Wake::Winch => return self.resize_event(),
                Wake::Timeout => {
                    self.sys.esc_deadline = None;
                    self.sys.esc_timed_out = true;
                }
            }
        }
    }

    /// Like [`Terminal::poll_event`], giving up after `timeout`.
    /// Returns `Ok(None)` when no event arrived in time.
    ///
    /// # Errors
    ///
    /// As for [`Terminal::poll_event`].
    pub fn peek_event(&mut self, timeout: Duration) -> Result<Option<Event>> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(event) = self.extract_pending() {
                return Ok(Some(event));
            }
            let wait_until = match self.sys.esc_deadline {
                Some(esc) => esc.min(deadline),
                None => deadline,
            };
            match self.sys.wait(Some(wait_until))? {
                Wake::Input(Ok(chunk)) => {
                    self.sys.pending.extend_from_slice(&chunk);
                    self.sys.esc_deadline = None;
                    self.sys.esc_timed_out = false;
                }
                Wake::Input(Err(err)) => return Err(Error::Read(err)),
                Wake::Interrupt => return Ok(Some(Event::Interrupt)),
                Wake::Winch => return self.resize_event().map(Some),
                Wake::Timeout => {
                    if let Some(esc) = self.sys.esc_deadline
                        && Instant::now() >= esc
                    {
                        self.sys.esc_deadline = None;
                        self.sys.esc_timed_out = true;
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Wait for input and deliver raw bytes into `buf`, bypassing the
    /// extractor. Interrupt and resize events are still reported.
    ///
    /// # Errors
    ///
    /// As for [`Terminal::poll_event`].
    pub fn poll_raw_event(&mut self, buf: &mut [u8]) -> Result<Event> {
        if buf.is_empty() {
            return Ok(Event::Raw { n: 0 });
        }
        loop {
            if !self.sys.pending.is_empty() {
                let n = buf.len().min(self.sys.pending.len());
                buf[..n].copy_from_slice(&self.sys.pending[..n]);
                self.sys.pending.drain(..n);
                return Ok(Event::Raw { n });
            }
            match self.sys.wait(None)? {
                Wake::Input(Ok(chunk)) => self.sys.pending.extend_from_slice(&chunk),
                Wake::Input(Err(err)) => return Err(Error::Read(err)),
                Wake::Interrupt => return Ok(Event::Interrupt),
                Wake::Winch => return self.resize_event(),
                Wake::Timeout => unreachable!("no deadline was armed"),
            }
        }
    }

    /// Run the extractor over the pending bytes. Arms the ESC deadline
    /// when the extractor wants to wait.
    fn extract_pending(&mut self) -> Option<Event> {
        if self.sys.pending.is_empty() {
            return None;
        }
        let allow_esc_wait = cfg!(target_os = "macos") && !self.sys.esc_timed_out;
        match extract_event(
            &self.sys.pending,
            self.sys.painter.caps().keys(),
            self.input_mode,
            allow_esc_wait,
        ) {
            Extracted::Event { event, n } => {
                self.sys.pending.drain(..n);
                Some(event)
            }
            Extracted::None { n: 0 } => None,
            Extracted::None { n } => {
                self.sys.pending.drain(..n);
                Some(Event::None { n })
            }
            Extracted::EscWait => {
                if self.sys.esc_deadline.is_none() {
                    self.sys.esc_deadline = Some(Instant::now() + ESC_WAIT);
                }
                None
            }
        }
    }

    fn resize_event(&mut self) -> Result<Event> {
        let (w, h) = self.sys.window_size()?;
        Ok(Event::Resize {
            width: i32::try_from(w).unwrap_or(i32::MAX),
            height: i32::try_from(h).unwrap_or(i32::MAX),
        })
    }

    /// Tear the terminal down: stop the threads, leave the alternate
    /// screen, restore termios. Best-effort.
    pub(crate) fn platform_close(&mut self) {
        self.sys.shutdown();
        self.sys.painter.emit(Cap::ShowCursor);
        self.sys.painter.emit(Cap::Sgr0);
        self.sys.painter.emit(Cap::ClearScreen);
        self.sys.painter.emit(Cap::ExitCa);
        self.sys.painter.emit(Cap::ExitKeypad);
        self.sys.painter.emit(Cap::ExitMouse);
        let bytes = self.sys.painter.take();
        let _ = self.sys.write_all(&bytes);
        self.sys.restore_termios();
    }
}

/// Read until the descriptor would block. `false` stops the producer.
fn drain_input(fd: RawFd, out: &Sender<io::Result<Vec<u8>>>) -> bool {
    loop {
        let mut buf = [0u8; READ_CHUNK];
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), READ_CHUNK) };
        if n > 0 {
            #[allow(clippy::cast_sign_loss)]
            let chunk = buf[..n as usize].to_vec();
            trace!(len = chunk.len(), "input chunk");
            if out.send(Ok(chunk)).is_err() {
                return false;
            }
            continue;
        }
        if n == 0 {
            return true;
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(code) if code == libc::EAGAIN || code == libc::EWOULDBLOCK => return true,
            Some(code) if code == libc::EINTR => {}
            _ => {
                let _ = out.send(Err(err));
                return false;
            }
        }
    }
}
