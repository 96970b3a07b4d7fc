//! Escape-sequence rendering: the diff walk and the SGR emitter.
//!
//! The [`Painter`] owns the output byte buffer, the capability table and
//! the emit-side caches, and reconciles a front buffer against a back
//! buffer with the minimum byte stream. It never touches a file
//! descriptor, so the whole rendering path is testable against
//! in-memory buffers.

use vtcap::{Cap, TermCaps};
use vtgrid::{Attr, Cell, CellBuffer, OutputMode, wcwidth};

/// 256-color indices for the grayscale ramp: attribute payloads `1..=26`
/// map onto black, the 24 grays and bright white.
const GRAYSCALE: [u32; 27] = [
    0, 16, 232, 233, 234, 235, 236, 237, 238, 239, 240, 241, 242, 243, 244, 245, 246, 247, 248,
    249, 250, 251, 252, 253, 254, 255, 231,
];

pub(crate) struct Painter {
    caps: TermCaps,
    mode: OutputMode,
    out: Vec<u8>,
    /// Attribute pair the terminal is known to have active, when known.
    last_attrs: Option<(Attr, Attr)>,
    /// Cell the terminal cursor is known to sit on, when known.
    last_pos: Option<(usize, usize)>,
}

impl Painter {
    pub(crate) fn new(caps: TermCaps, mode: OutputMode) -> Painter {
        Painter {
            caps,
            mode,
            out: Vec::with_capacity(32 * 1024),
            last_attrs: None,
            last_pos: None,
        }
    }

    pub(crate) fn caps(&self) -> &TermCaps {
        &self.caps
    }

    pub(crate) fn output_mode(&self) -> OutputMode {
        self.mode
    }

    pub(crate) fn set_output_mode(&mut self, mode: OutputMode) {
        self.mode = mode;
        self.last_attrs = None;
    }

    /// Forget what the terminal is believed to display. Called at the
    /// start of every flush and after any sequence that may reset SGR
    /// state.
    pub(crate) fn invalidate(&mut self) {
        self.last_attrs = None;
        self.last_pos = None;
    }

    /// Take the accumulated byte stream.
    pub(crate) fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.out)
    }

    #[cfg(test)]
    fn bytes(&self) -> &[u8] {
        &self.out
    }

    /// Append the control string for `cap`.
    pub(crate) fn emit(&mut self, cap: Cap) {
        self.out.extend_from_slice(self.caps.func(cap).as_bytes());
    }

    /// Move the terminal cursor to the zero-based cell `(x, y)`.
    pub(crate) fn goto(&mut self, x: usize, y: usize) {
        let mut num = itoa::Buffer::new();
        self.out.extend_from_slice(b"\x1b[");
        self.out.extend_from_slice(num.format(y + 1).as_bytes());
        self.out.push(b';');
        self.out.extend_from_slice(num.format(x + 1).as_bytes());
        self.out.push(b'H');
        self.last_pos = Some((x, y));
    }

    /// Reconcile `front` with `back`, appending the required bytes.
    ///
    /// Both buffers must have the same dimensions. On return
    /// `front == back` and the byte stream, once written, brings the
    /// terminal along.
    pub(crate) fn draw_diff(&mut self, back: &CellBuffer, front: &mut CellBuffer) {
        let (w, h) = back.size();
        for y in 0..h {
            let mut x = 0;
            while x < w {
                let cell = back.cells()[y * w + x];
                let cw = wcwidth(cell.ch).max(1);
                #[allow(clippy::cast_sign_loss)]
                let cw = cw as usize;
                if front.get(x, y) == Some(cell) {
                    x += cw;
                    continue;
                }
                self.set_attrs(cell.fg, cell.bg);
                front.set(x, y, cell);
                if cw == 2 && x == w - 1 {
                    // No room for the right half; a space keeps the grid
                    // from smearing.
                    self.put_char(x, y, ' ');
                } else {
                    self.put_char(x, y, cell.ch);
                    if cw == 2 {
                        front.set(x + 1, y, Cell::continuation(cell.fg, cell.bg));
                    }
                }
                x += cw;
            }
        }
    }

    /// Emit the cell character at `(x, y)`, preceded by a cursor move
    /// unless the terminal cursor already sits there.
    fn put_char(&mut self, x: usize, y: usize, ch: char) {
        if self.last_pos != Some((x, y)) {
            self.goto(x, y);
        }
        let ch = if (ch as u32) < 0x20 { ' ' } else { ch };
        let mut utf8 = [0u8; 4];
        self.out.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
        #[allow(clippy::cast_sign_loss)]
        let cw = wcwidth(ch).max(1) as usize;
        self.last_pos = Some((x + cw, y));
    }

    /// Switch the terminal to the `(fg, bg)` pair: a full reset followed
    /// by the minimum color and style sequences. Skipped when the pair
    /// is already active.
    pub(crate) fn set_attrs(&mut self, fg: Attr, bg: Attr) {
        if self.last_attrs == Some((fg, bg)) {
            return;
        }
        self.last_attrs = Some((fg, bg));
        self.emit(Cap::Sgr0);

        match self.mode {
            OutputMode::Rgb => {
                self.write_rgb_color(fg, false);
                self.write_rgb_color(bg, true);
            }
            OutputMode::Col256 | OutputMode::Col216 | OutputMode::Grayscale => {
                self.write_indexed_color(fg, false);
                self.write_indexed_color(bg, true);
            }
            OutputMode::Normal | OutputMode::Current => {
                self.write_normal_color(fg, false);
                self.write_normal_color(bg, true);
            }
        }

        // Style bits apply to the foreground; reverse works from either
        // side. Background blink is deliberately dropped.
        let styles = fg.styles();
        if styles.contains(Attr::BOLD) {
            self.emit(Cap::Bold);
        }
        if styles.contains(Attr::BLINK) {
            self.emit(Cap::Blink);
        }
        if styles.contains(Attr::HIDDEN) {
            self.emit(Cap::Hidden);
        }
        if styles.contains(Attr::DIM) {
            self.emit(Cap::Dim);
        }
        if styles.contains(Attr::UNDERLINE) {
            self.emit(Cap::Underline);
        }
        if styles.contains(Attr::CURSIVE) {
            self.emit(Cap::Cursive);
        }
        if (fg | bg).contains(Attr::REVERSE) {
            self.emit(Cap::Reverse);
        }
    }

    fn write_normal_color(&mut self, attr: Attr, bg: bool) {
        let c = attr.color_index();
        let code = match c {
            1..=8 => c - 1 + if bg { 40 } else { 30 },
            9..=16 => c - 9 + if bg { 100 } else { 90 },
            _ => return,
        };
        let mut num = itoa::Buffer::new();
        self.out.extend_from_slice(b"\x1b[");
        self.out.extend_from_slice(num.format(code).as_bytes());
        self.out.push(b'm');
    }

    fn write_indexed_color(&mut self, attr: Attr, bg: bool) {
        let c = attr.color_index();
        if c == 0 {
            return;
        }
        let index = match self.mode {
            OutputMode::Col256 => (c - 1).min(255),
            OutputMode::Col216 => c.min(216) - 1 + 0x10,
            OutputMode::Grayscale => GRAYSCALE[c.min(26) as usize],
            _ => unreachable!(),
        };
        let mut num = itoa::Buffer::new();
        self.out
            .extend_from_slice(if bg { b"\x1b[48;5;" } else { b"\x1b[38;5;" });
        self.out.extend_from_slice(num.format(index).as_bytes());
        self.out.push(b'm');
    }

    fn write_rgb_color(&mut self, attr: Attr, bg: bool) {
        if !attr.is_rgb() {
            return;
        }
        let (r, g, b) = attr.as_rgb();
        let mut num = itoa::Buffer::new();
        self.out
            .extend_from_slice(if bg { b"\x1b[48;2;" } else { b"\x1b[38;2;" });
        self.out.extend_from_slice(num.format(r).as_bytes());
        self.out.push(b';');
        self.out.extend_from_slice(num.format(g).as_bytes());
        self.out.push(b';');
        self.out.extend_from_slice(num.format(b).as_bytes());
        self.out.push(b'm');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn painter(mode: OutputMode) -> Painter {
        Painter::new(vtcap::load_builtin("xterm").unwrap(), mode)
    }

    fn stream(p: &Painter) -> String {
        String::from_utf8_lossy(p.bytes()).into_owned()
    }

    #[test]
    fn paints_a_changed_cell() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(10, 4);
        let mut front = back.clone();
        back.set(0, 0, Cell::new('@', Attr::WHITE, Attr::BLUE));

        p.invalidate();
        p.draw_diff(&back, &mut front);

        assert_eq!(front, back);
        let s = stream(&p);
        assert!(s.contains("\x1b[1;1H"), "cursor move missing: {s:?}");
        assert!(s.contains("\x1b[37m"), "white foreground missing: {s:?}");
        assert!(s.contains("\x1b[44m"), "blue background missing: {s:?}");
        assert!(s.contains('@'));
        // SGR comes before the cursor move and the character.
        assert!(s.find("\x1b[37m").unwrap() < s.find("\x1b[1;1H").unwrap());
        assert!(s.find("\x1b[1;1H").unwrap() < s.find('@').unwrap());
    }

    #[test]
    fn equal_buffers_emit_nothing() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(5, 5);
        back.clear(Attr::DEFAULT, Attr::DEFAULT);
        let mut front = back.clone();
        p.draw_diff(&back, &mut front);
        assert!(p.bytes().is_empty());
    }

    #[test]
    fn attribute_runs_reset_once() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(4, 1);
        let mut front = back.clone();
        for x in 0..4 {
            back.set(x, 0, Cell::new('x', Attr::RED, Attr::DEFAULT));
        }
        p.draw_diff(&back, &mut front);
        let s = stream(&p);
        // One SGR reset for the whole run of identical attributes.
        assert_eq!(s.matches("\x1b(B\x1b[m").count(), 1);
        // Adjacent cells need no cursor moves beyond the first.
        assert_eq!(s.matches('H').count(), 1);
        assert_eq!(s.matches('x').count(), 4);
    }

    #[test]
    fn wide_character_reserves_a_continuation_cell() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(6, 1);
        let mut front = back.clone();
        back.set(1, 0, Cell::new('あ', Attr::DEFAULT, Attr::GREEN));
        p.draw_diff(&back, &mut front);

        assert_eq!(front.get(1, 0).unwrap().ch, 'あ');
        assert_eq!(
            front.get(2, 0).unwrap(),
            Cell::continuation(Attr::DEFAULT, Attr::GREEN)
        );
        assert!(stream(&p).contains('あ'));
    }

    #[test]
    fn wide_character_in_last_column_becomes_a_space() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(4, 1);
        let mut front = back.clone();
        back.set(3, 0, Cell::new('あ', Attr::DEFAULT, Attr::DEFAULT));
        p.draw_diff(&back, &mut front);
        let s = stream(&p);
        assert!(!s.contains('あ'));
        assert!(s.ends_with(' '));
    }

    #[test]
    fn control_characters_are_emitted_as_spaces() {
        let mut p = painter(OutputMode::Normal);
        let mut back = CellBuffer::new(2, 1);
        let mut front = back.clone();
        back.set(0, 0, Cell::new('\u{7}', Attr::DEFAULT, Attr::DEFAULT));
        p.draw_diff(&back, &mut front);
        assert!(!p.bytes().contains(&0x07));
    }

    #[test]
    fn default_pair_emits_no_color_codes() {
        let mut p = painter(OutputMode::Normal);
        p.set_attrs(Attr::DEFAULT, Attr::DEFAULT);
        let s = stream(&p);
        assert_eq!(s, "\x1b(B\x1b[m");
    }

    #[test]
    fn bright_palette_uses_the_90_range() {
        let mut p = painter(OutputMode::Normal);
        p.set_attrs(Attr::LIGHT_RED, Attr::DARK_GRAY);
        let s = stream(&p);
        assert!(s.contains("\x1b[91m"));
        assert!(s.contains("\x1b[100m"));
    }

    #[test]
    fn col256_offsets_the_payload_by_one() {
        let mut p = painter(OutputMode::Col256);
        p.set_attrs(Attr::from_bits(200), Attr::from_bits(1));
        let s = stream(&p);
        assert!(s.contains("\x1b[38;5;199m"));
        assert!(s.contains("\x1b[48;5;0m"));
    }

    #[test]
    fn col216_clamps_into_the_cube() {
        let mut p = painter(OutputMode::Col216);
        p.set_attrs(Attr::from_bits(1), Attr::from_bits(500));
        let s = stream(&p);
        assert!(s.contains("\x1b[38;5;16m"));
        // Clamped to the top of the cube: 216 - 1 + 0x10.
        assert!(s.contains("\x1b[48;5;231m"));
    }

    #[test]
    fn grayscale_maps_through_the_ramp() {
        let mut p = painter(OutputMode::Grayscale);
        p.set_attrs(Attr::from_bits(1), Attr::from_bits(26));
        let s = stream(&p);
        assert!(s.contains("\x1b[38;5;16m"));
        assert!(s.contains("\x1b[48;5;231m"));
    }

    #[test]
    fn rgb_unpacks_the_triple() {
        let mut p = painter(OutputMode::Rgb);
        p.set_attrs(Attr::rgb(1, 2, 3), Attr::rgb(250, 128, 0));
        let s = stream(&p);
        assert!(s.contains("\x1b[38;2;1;2;3m"));
        assert!(s.contains("\x1b[48;2;250;128;0m"));
    }

    #[test]
    fn styles_follow_the_color_pair() {
        let mut p = painter(OutputMode::Normal);
        p.set_attrs(Attr::WHITE | Attr::BOLD | Attr::UNDERLINE, Attr::REVERSE);
        let s = stream(&p);
        let bold = s.find("\x1b[1m").unwrap();
        let underline = s.find("\x1b[4m").unwrap();
        let reverse = s.find("\x1b[7m").unwrap();
        let color = s.find("\x1b[37m").unwrap();
        assert!(color < bold && bold < underline && underline < reverse);
    }

    #[test]
    fn background_blink_is_dropped() {
        let mut p = painter(OutputMode::Normal);
        p.set_attrs(Attr::WHITE, Attr::BLUE | Attr::BLINK);
        assert!(!stream(&p).contains("\x1b[5m"));
    }

    #[test]
    fn repeated_pair_is_cached() {
        let mut p = painter(OutputMode::Normal);
        p.set_attrs(Attr::RED, Attr::DEFAULT);
        let len = p.bytes().len();
        p.set_attrs(Attr::RED, Attr::DEFAULT);
        assert_eq!(p.bytes().len(), len);
        p.invalidate();
        p.set_attrs(Attr::RED, Attr::DEFAULT);
        assert!(p.bytes().len() > len);
    }
}
