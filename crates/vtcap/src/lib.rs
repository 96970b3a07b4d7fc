#![warn(clippy::pedantic)]

mod builtin;
mod capability;
mod terminfo;

pub use capability::{Cap, KEY_COUNT, TermCaps};
pub use terminfo::{CapError, load, load_builtin};
