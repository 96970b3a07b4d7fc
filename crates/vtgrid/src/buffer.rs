//! The row-major cell grid.

use std::cmp::min;

use crate::attr::Attr;
use crate::cell::Cell;

/// A width x height grid of [`Cell`]s stored in row-major order.
///
/// Two instances exist at runtime: the back buffer the application draws
/// into, and the front buffer mirroring what is believed to be on the
/// terminal. `cells.len() == width * height` holds after every operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl CellBuffer {
    /// A `width` x `height` buffer filled with [`Cell::ZERO`].
    ///
    /// A zero-filled fresh buffer differs from a cleared one in every
    /// cell, so the first reconciliation against it repaints the whole
    /// grid.
    #[must_use]
    pub fn new(width: usize, height: usize) -> CellBuffer {
        CellBuffer {
            width,
            height,
            cells: vec![Cell::ZERO; width * height],
        }
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// The cells, row by row.
    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Reset every cell to a blank carrying the given pair.
    pub fn clear(&mut self, fg: Attr, bg: Attr) {
        self.cells.fill(Cell::blank(fg, bg));
    }

    /// Grow or shrink the grid, preserving the top-left region and
    /// padding new cells with [`Cell::BLANK`].
    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) == (self.width, self.height) {
            return;
        }
        let mut cells = vec![Cell::BLANK; width * height];
        let minw = min(width, self.width);
        let minh = min(height, self.height);
        for y in 0..minh {
            let src = y * self.width;
            let dst = y * width;
            cells[dst..dst + minw].copy_from_slice(&self.cells[src..src + minw]);
        }
        self.width = width;
        self.height = height;
        self.cells = cells;
    }

    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.index_of(x, y).map(|i| self.cells[i])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.index_of(x, y).map(move |i| &mut self.cells[i])
    }

    /// Store `cell` at `(x, y)`; `false` when out of bounds.
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) -> bool {
        match self.get_mut(x, y) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    fn index_of(&self, x: usize, y: usize) -> Option<usize> {
        (x < self.width && y < self.height).then(|| y * self.width + x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn new_is_zeroed_and_sized() {
        let buf = CellBuffer::new(7, 3);
        assert_eq!(buf.size(), (7, 3));
        assert_eq!(buf.cells().len(), 7 * 3);
        assert!(buf.cells().iter().all(|&c| c == Cell::ZERO));
    }

    #[test]
    fn set_then_get() {
        let mut buf = CellBuffer::new(4, 4);
        let cell = Cell::new('x', Attr::RED, Attr::BLUE | Attr::BOLD);
        assert!(buf.set(3, 2, cell));
        assert_eq!(buf.get(3, 2), Some(cell));
    }

    #[test]
    fn out_of_bounds_is_rejected() {
        let mut buf = CellBuffer::new(4, 4);
        assert!(!buf.set(4, 0, Cell::BLANK));
        assert!(!buf.set(0, 4, Cell::BLANK));
        assert_eq!(buf.get(4, 0), None);
        // Nothing was disturbed.
        assert!(buf.cells().iter().all(|&c| c == Cell::ZERO));
    }

    #[test]
    fn clear_records_the_pair() {
        let mut buf = CellBuffer::new(2, 2);
        buf.set(0, 0, Cell::new('q', Attr::GREEN, Attr::DEFAULT));
        buf.clear(Attr::WHITE, Attr::BLUE);
        for &cell in buf.cells() {
            assert_eq!(cell, Cell::blank(Attr::WHITE, Attr::BLUE));
        }
    }

    #[test]
    fn resize_preserves_top_left() {
        let mut buf = CellBuffer::new(5, 4);
        for y in 0..4 {
            for x in 0..5 {
                let ch = char::from_u32(u32::try_from('a' as usize + y * 5 + x).unwrap()).unwrap();
                buf.set(x, y, Cell::new(ch, Attr::DEFAULT, Attr::DEFAULT));
            }
        }
        let snapshot = buf.clone();

        buf.resize(3, 6);
        assert_eq!(buf.size(), (3, 6));
        assert_eq!(buf.cells().len(), 3 * 6);
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(buf.get(x, y), snapshot.get(x, y), "at ({x}, {y})");
            }
        }
        // The padded rows are blank.
        for y in 4..6 {
            for x in 0..3 {
                assert_eq!(buf.get(x, y), Some(Cell::BLANK));
            }
        }

        buf.resize(5, 4);
        for y in 0..4 {
            for x in 0..3 {
                assert_eq!(buf.get(x, y), snapshot.get(x, y));
            }
        }
    }

    #[test]
    fn resize_to_same_size_is_a_no_op() {
        let mut buf = CellBuffer::new(3, 3);
        buf.set(1, 1, Cell::new('m', Attr::CYAN, Attr::DEFAULT));
        buf.resize(3, 3);
        assert_eq!(buf.get(1, 1).unwrap().ch, 'm');
    }
}
