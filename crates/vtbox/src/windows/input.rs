//! Console input threads: the readiness notifier and the record
//! consumer, plus translation of `INPUT_RECORD`s into engine events.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tracing::trace;
use vtevent::{Event, InputMode, Key, Mod};

use winapi::shared::minwindef::{DWORD, TRUE};
use winapi::um::consoleapi::{GetNumberOfConsoleInputEvents, ReadConsoleInputW};
use winapi::um::fileapi::GetFileType;
use winapi::um::namedpipeapi::PeekNamedPipe;
use winapi::um::winbase::{FILE_TYPE_CHAR, FILE_TYPE_PIPE};
use winapi::um::wincon::{
    DOUBLE_CLICK, FROM_LEFT_1ST_BUTTON_PRESSED, FROM_LEFT_2ND_BUTTON_PRESSED, INPUT_RECORD,
    KEY_EVENT, KEY_EVENT_RECORD, LEFT_ALT_PRESSED, LEFT_CTRL_PRESSED, MOUSE_EVENT,
    MOUSE_EVENT_RECORD, MOUSE_MOVED, MOUSE_WHEELED, PeekConsoleInputW, RIGHT_ALT_PRESSED,
    RIGHT_CTRL_PRESSED, RIGHTMOST_BUTTON_PRESSED, SHIFT_PRESSED, WINDOW_BUFFER_SIZE_EVENT,
};
use winapi::um::winuser::{
    VK_BACK, VK_CAPITAL, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE, VK_F1, VK_F24,
    VK_HOME, VK_INSERT, VK_LEFT, VK_MENU, VK_NEXT, VK_NUMLOCK, VK_PRIOR, VK_RETURN, VK_RIGHT,
    VK_SCROLL, VK_SHIFT, VK_SPACE, VK_TAB, VK_UP,
};

use super::Handle;

/// Poll cadence of the notifier thread.
const NOTIFY_INTERVAL: Duration = Duration::from_millis(20);

/// Watches the input handle and raises the data-ready and resize
/// signals. Character devices are classified by peeking the queued
/// records; pipes by `PeekNamedPipe`.
pub(super) fn notifier(
    conin: Handle,
    quit: &Arc<AtomicBool>,
    ready_tx: &Sender<()>,
    resize_tx: &Sender<()>,
) {
    while !quit.load(Ordering::Acquire) {
        let file_type = unsafe { GetFileType(conin.0) };
        if file_type == FILE_TYPE_CHAR {
            let mut queued: DWORD = 0;
            let ok = unsafe { GetNumberOfConsoleInputEvents(conin.0, &raw mut queued) };
            if ok == TRUE && queued > 0 {
                let mut records: [INPUT_RECORD; 16] = unsafe { std::mem::zeroed() };
                let mut peeked: DWORD = 0;
                let ok = unsafe {
                    PeekConsoleInputW(conin.0, records.as_mut_ptr(), 16, &raw mut peeked)
                };
                if ok == TRUE {
                    for record in &records[..peeked as usize] {
                        if record.EventType == WINDOW_BUFFER_SIZE_EVENT {
                            let _ = resize_tx.try_send(());
                        }
                    }
                }
                let _ = ready_tx.try_send(());
            }
        } else if file_type == FILE_TYPE_PIPE {
            let mut avail: DWORD = 0;
            let ok = unsafe {
                PeekNamedPipe(
                    conin.0,
                    std::ptr::null_mut(),
                    0,
                    std::ptr::null_mut(),
                    &raw mut avail,
                    std::ptr::null_mut(),
                )
            };
            if ok == TRUE && avail > 0 {
                let _ = ready_tx.try_send(());
            }
        }
        thread::sleep(NOTIFY_INTERVAL);
    }
}

/// Per-consumer translation state.
struct InputState {
    /// Button mask of the previous mouse record, for press/release
    /// edge detection.
    last_buttons: DWORD,
    /// An ESC seen in ALT input mode; the next key gets the modifier.
    alt_pending: bool,
}

/// Drains console records whenever the notifier reports data, turning
/// them into events on the output queue.
pub(super) fn consumer(
    conin: Handle,
    quit: &Arc<AtomicBool>,
    ready_rx: &Receiver<()>,
    event_tx: &Sender<Event>,
    input_mode: &Arc<AtomicU8>,
) {
    let mut state = InputState {
        last_buttons: 0,
        alt_pending: false,
    };
    loop {
        match ready_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) => {}
            Err(RecvTimeoutError::Timeout) => {
                if quit.load(Ordering::Acquire) {
                    return;
                }
                continue;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
        if quit.load(Ordering::Acquire) {
            return;
        }
        let mode = InputMode::from_bits_truncate(input_mode.load(Ordering::Acquire));
        loop {
            let mut queued: DWORD = 0;
            let ok = unsafe { GetNumberOfConsoleInputEvents(conin.0, &raw mut queued) };
            if ok != TRUE || queued == 0 {
                break;
            }
            let mut records: [INPUT_RECORD; 64] = unsafe { std::mem::zeroed() };
            let mut read: DWORD = 0;
            let ok = unsafe { ReadConsoleInputW(conin.0, records.as_mut_ptr(), 64, &raw mut read) };
            if ok != TRUE {
                return;
            }
            for record in &records[..read as usize] {
                match record.EventType {
                    KEY_EVENT => {
                        let key = unsafe { record.Event.KeyEvent() };
                        if key.bKeyDown != TRUE {
                            continue;
                        }
                        for _ in 0..key.wRepeatCount.max(1) {
                            if let Some(event) = translate_key(key, mode, &mut state) {
                                trace!(?event, "key record");
                                if event_tx.send(event).is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    MOUSE_EVENT => {
                        if !mode.contains(InputMode::MOUSE) {
                            continue;
                        }
                        let mouse = unsafe { record.Event.MouseEvent() };
                        if let Some(event) = translate_mouse(mouse, &mut state) {
                            if event_tx.send(event).is_err() {
                                return;
                            }
                        }
                    }
                    // Resize records are reported through the notifier's
                    // resize signal.
                    _ => {}
                }
            }
        }
    }
}

/// Virtual keys that are modifiers on their own and never produce an
/// event.
fn is_pure_modifier(vk: i32) -> bool {
    matches!(
        vk,
        VK_SHIFT | VK_CONTROL | VK_MENU | VK_CAPITAL | VK_NUMLOCK | VK_SCROLL
    )
}

fn translate_key(key: &KEY_EVENT_RECORD, mode: InputMode, state: &mut InputState) -> Option<Event> {
    let vk = i32::from(key.wVirtualKeyCode);
    if is_pure_modifier(vk) {
        return None;
    }

    let ctrl = key.dwControlKeyState & (LEFT_CTRL_PRESSED | RIGHT_CTRL_PRESSED) != 0;
    let alt = key.dwControlKeyState & (LEFT_ALT_PRESSED | RIGHT_ALT_PRESSED) != 0;
    let shift = key.dwControlKeyState & SHIFT_PRESSED != 0;
    let mut mods = Mod::empty();
    if ctrl {
        mods |= Mod::CTRL;
    }
    if alt {
        mods |= Mod::ALT;
    }
    if shift {
        mods |= Mod::SHIFT;
    }
    if state.alt_pending {
        mods |= Mod::ALT;
        state.alt_pending = false;
    }

    let special = |key: Key| Some(Event::Key { mods, key, ch: '\0' });

    if (VK_F1..=VK_F24).contains(&vk) {
        let n = vk - VK_F1;
        if n < 12 {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            return special(Key(0xffff - n as u16));
        }
        return None;
    }
    match vk {
        VK_INSERT => return special(Key::INSERT),
        VK_DELETE => return special(Key::DELETE),
        VK_HOME => return special(Key::HOME),
        VK_END => return special(Key::END),
        VK_PRIOR => return special(Key::PGUP),
        VK_NEXT => return special(Key::PGDN),
        VK_UP => return special(Key::ARROW_UP),
        VK_DOWN => return special(Key::ARROW_DOWN),
        VK_LEFT => return special(Key::ARROW_LEFT),
        VK_RIGHT => return special(Key::ARROW_RIGHT),
        VK_BACK => {
            return special(if ctrl { Key::BACKSPACE2 } else { Key::BACKSPACE });
        }
        VK_TAB => return special(Key::TAB),
        VK_RETURN => return special(Key::ENTER),
        VK_SPACE => return special(Key::SPACE),
        VK_ESCAPE => {
            if mode.contains(InputMode::ESC) {
                return special(Key::ESC);
            }
            // ALT mode: mark the next keypress instead.
            state.alt_pending = true;
            return None;
        }
        _ => {}
    }

    if ctrl {
        // Ctrl-letter lands in the ASCII control region; a handful of
        // digit combinations have conventional codes.
        if (0x41..=0x5a).contains(&vk) {
            #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
            return special(Key(vk as u16 - 0x40));
        }
        match vk {
            0x32 => return special(Key::CTRL_2),
            0x36 => return special(Key::CTRL_6),
            0x37 => return special(Key::CTRL_7),
            _ => {}
        }
    }

    let unit = unsafe { *key.uChar.UnicodeChar() };
    if unit == 0 {
        return None;
    }
    if unit <= 0x20 || unit == 0x7f {
        return special(Key(unit));
    }
    // Unpaired surrogates cannot form a scalar; drop them.
    let ch = char::from_u32(u32::from(unit))?;
    Some(Event::Key {
        mods,
        key: Key(0),
        ch,
    })
}

const BUTTON_MASK: DWORD =
    FROM_LEFT_1ST_BUTTON_PRESSED | FROM_LEFT_2ND_BUTTON_PRESSED | RIGHTMOST_BUTTON_PRESSED;

fn translate_mouse(mouse: &MOUSE_EVENT_RECORD, state: &mut InputState) -> Option<Event> {
    let x = i32::from(mouse.dwMousePosition.X);
    let y = i32::from(mouse.dwMousePosition.Y);
    let event = |key: Key, mods: Mod| Some(Event::Mouse { mods, key, x, y });

    match mouse.dwEventFlags {
        0 | DOUBLE_CLICK => {
            let now = mouse.dwButtonState & BUTTON_MASK;
            let pressed = now & !state.last_buttons;
            let released = state.last_buttons & !now;
            state.last_buttons = now;
            if pressed & FROM_LEFT_1ST_BUTTON_PRESSED != 0 {
                event(Key::MOUSE_LEFT, Mod::empty())
            } else if pressed & RIGHTMOST_BUTTON_PRESSED != 0 {
                event(Key::MOUSE_RIGHT, Mod::empty())
            } else if pressed & FROM_LEFT_2ND_BUTTON_PRESSED != 0 {
                event(Key::MOUSE_MIDDLE, Mod::empty())
            } else if released != 0 && now == 0 {
                event(Key::MOUSE_RELEASE, Mod::empty())
            } else {
                None
            }
        }
        MOUSE_MOVED => {
            // Motion is reported while a button is held, tagged with the
            // held button.
            let held = state.last_buttons;
            let key = if held & FROM_LEFT_1ST_BUTTON_PRESSED != 0 {
                Key::MOUSE_LEFT
            } else if held & RIGHTMOST_BUTTON_PRESSED != 0 {
                Key::MOUSE_RIGHT
            } else if held & FROM_LEFT_2ND_BUTTON_PRESSED != 0 {
                Key::MOUSE_MIDDLE
            } else {
                return None;
            };
            event(key, Mod::MOTION)
        }
        MOUSE_WHEELED => {
            // Wheel direction lives in the signed high word of the
            // button state.
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let delta = (mouse.dwButtonState >> 16) as i16;
            if delta > 0 {
                event(Key::MOUSE_WHEEL_UP, Mod::empty())
            } else {
                event(Key::MOUSE_WHEEL_DOWN, Mod::empty())
            }
        }
        _ => None,
    }
}
