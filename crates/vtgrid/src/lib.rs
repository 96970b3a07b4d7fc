#![warn(clippy::pedantic)]

mod attr;
mod buffer;
mod cell;
mod width;

pub use attr::{Attr, OutputMode};
pub use buffer::CellBuffer;
pub use cell::Cell;
pub use width::wcwidth;
