//! Minimal demo: draw some styled text, report mouse positions, quit on
//! `q` or Esc. Run with `RUST_LOG=vtbox=debug` to see driver logs on
//! stderr.

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use vtbox::{Attr, Event, InputMode, Key, Terminal, wcwidth};

fn print(
    term: &mut Terminal,
    x: usize,
    y: usize,
    fg: Attr,
    bg: Attr,
    text: &str,
) -> vtbox::Result<()> {
    let mut col = x;
    for ch in text.chars() {
        term.set_cell(col, y, ch, fg, bg)?;
        col += wcwidth(ch).max(1) as usize;
    }
    Ok(())
}

fn main() -> vtbox::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let mut term = Terminal::new()?;
    term.set_input_mode(InputMode::ESC | InputMode::MOUSE)?;

    print(
        &mut term,
        2,
        1,
        Attr::WHITE | Attr::BOLD,
        Attr::BLUE,
        " vtbox ",
    )?;
    print(
        &mut term,
        2,
        3,
        Attr::DEFAULT,
        Attr::DEFAULT,
        "press q or Esc to quit, click around, resize the window",
    )?;
    term.flush()?;

    loop {
        let Some(event) = term.peek_event(Duration::from_secs(60))? else {
            continue;
        };
        match event {
            Event::Key { key: Key::ESC, .. } | Event::Key { ch: 'q', .. } => break,
            Event::Mouse { key, x, y, .. } => {
                let line = format!("mouse {key:?} at ({x}, {y})      ");
                print(&mut term, 2, 5, Attr::CYAN, Attr::DEFAULT, &line)?;
                term.flush()?;
            }
            Event::Resize { width, height } => {
                let line = format!("resized to {width}x{height}      ");
                print(&mut term, 2, 5, Attr::YELLOW, Attr::DEFAULT, &line)?;
                term.flush()?;
            }
            _ => {}
        }
    }
    Ok(())
}
