pub mod ansi {
    use std::fmt;
    use std::io::Write;

    use rgb::RGBA8;

    const CSI: &str = "\x1b[";
    const UPPER_HALF_BLOCK: char = '▀';

    pub enum Erase {
        CursorToEnd,
        CursorToBegin,
        Screen,
        ScreenAndDelete,
    }

    impl Erase {
        fn code(&self) -> u8 {
            match self {
                Erase::CursorToEnd => 0,
                Erase::CursorToBegin => 1,
                Erase::Screen => 2,
                Erase::ScreenAndDelete => 3,
            }
        }
    }

    #[derive(Copy, Clone, PartialEq)]
    pub struct Color {
        pub red: u8,
        pub green: u8,
        pub blue: u8,
    }

    impl fmt::Debug for Color {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "r/g/b: {}/{}/{}", self.red, self.green, self.blue)
        }
    }

    impl From<u32> for Color {
        fn from(value: u32) -> Self {
            let red = ((value >> 16) & 0xff) as u8;
            let green = ((value >> 8) & 0xff) as u8;
            let blue = (value & 0xff) as u8;
            Color { red, green, blue }
        }
    }

    impl From<RGBA8> for Color {
        fn from(value: RGBA8) -> Self {
            Color { red: value.r, green: value.g, blue: value.b }
        }
    }

    impl fmt::Display for Color {
        fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "{};{};{}", self.red, self.green, self.blue)
        }
    }

    pub struct CursorPos {
        pub x: usize,
        pub y: usize,
    }

    pub fn erase<W: Write>(erase: Erase, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}{}J", erase.code())
    }

    pub fn erase_line<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}2K")
    }

    pub fn reset_cursor<W: Write>(writer: &mut W) -> std::io::Result<()> {
        set_cursor(&CursorPos { x: 1, y: 1 }, writer)
    }

    pub fn set_cursor<W: Write>(pos: &CursorPos, writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}{};{}H", pos.y, pos.x)
    }

    pub fn next_line<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}1E")
    }

    pub fn hide_cursor<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}?25l")
    }

    pub fn show_cursor<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}?25h")
    }

    pub fn enter_alternate_screen<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}?1049h")
    }

    pub fn leave_alternate_screen<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}?1049l")
    }

    pub fn set_foreground_color<W: Write>(writer: &mut W, text: &str, color: &Color) -> std::io::Result<()> {
        write!(writer, "{CSI}38;2;{color}m{text}{CSI}m")
    }

    /// One terminal cell showing two vertically stacked pixels.
    pub fn half_block<W: Write>(writer: &mut W, top: &Color, bottom: &Color) -> std::io::Result<()> {
        write!(writer, "{CSI}38;2;{top};48;2;{bottom}m{UPPER_HALF_BLOCK}")
    }

    pub fn make_underline<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}4m")
    }

    pub fn make_reverse<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}7m")
    }

    pub fn reset_sgr<W: Write>(writer: &mut W) -> std::io::Result<()> {
        write!(writer, "{CSI}0m")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn color_from_packed_rgb() {
            let color = Color::from(0x00d59890);
            assert_eq!(color, Color { red: 0xd5, green: 0x98, blue: 0x90 });
            assert_eq!(color.to_string(), "213;152;144");
        }

        #[test]
        fn half_block_sets_both_colors() {
            let mut out = Vec::new();
            let top = Color::from(0xff0000);
            let bottom = Color::from(0x0000ff);
            half_block(&mut out, &top, &bottom).unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "\x1b[38;2;255;0;0;48;2;0;0;255m▀");
        }

        #[test]
        fn cursor_is_one_based() {
            let mut out = Vec::new();
            reset_cursor(&mut out).unwrap();
            erase(Erase::Screen, &mut out).unwrap();
            assert_eq!(String::from_utf8(out).unwrap(), "\x1b[1;1H\x1b[2J");
        }
    }
}
