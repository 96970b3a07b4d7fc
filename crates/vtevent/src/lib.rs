#![warn(clippy::pedantic)]

mod event;
mod extract;
mod mouse;
mod utf8;

pub use event::{Event, InputMode, Key, Mod};
pub use extract::{Extracted, extract_event};
