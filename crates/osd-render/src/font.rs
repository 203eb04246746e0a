//! Built-in 8x8 bitmap font.
//!
//! Rows are stored top to bottom, most significant bit leftmost. Lowercase
//! letters share the uppercase glyphs. Control codes `\x01..=\x08` are
//! status icons used by the compact overlay.

pub const GLYPH_W: i32 = 8;
pub const GLYPH_H: i32 = 8;

/// Vertical bar separating compact-overlay sections.
pub const ICON_SEPARATOR: char = '\x01';
pub const ICON_CPU: char = '\x02';
pub const ICON_TEMP: char = '\x03';
pub const ICON_WIFI: char = '\x04';
/// Left half of the "Mb" unit glyph pair.
pub const ICON_MEGA: char = '\x05';
/// Right half of the "Mb" unit glyph pair.
pub const ICON_BITS: char = '\x06';
pub const ICON_BATTERY: char = '\x07';
pub const ICON_BACKLIGHT: char = '\x08';

#[rustfmt::skip]
const ICONS: [[u8; 8]; 8] = [
    [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x10], // separator
    [0x54, 0xFE, 0x82, 0xBA, 0xBA, 0x82, 0xFE, 0x54], // cpu
    [0x10, 0x28, 0x28, 0x28, 0x38, 0x7C, 0x7C, 0x38], // thermometer
    [0x00, 0x7E, 0x81, 0x3C, 0x42, 0x18, 0x18, 0x00], // wifi
    [0x00, 0x00, 0xC6, 0xEE, 0xD6, 0xC6, 0xC6, 0x00], // M
    [0xC0, 0xC0, 0xFC, 0xC6, 0xC6, 0xC6, 0xFC, 0x00], // b
    [0x00, 0xFE, 0x82, 0xBB, 0xBB, 0x82, 0xFE, 0x00], // battery
    [0x10, 0x54, 0x38, 0xFE, 0x38, 0x54, 0x10, 0x00], // backlight
];

/// ASCII 32 (space) through 95 (underscore).
#[rustfmt::skip]
const ASCII: [[u8; 8]; 64] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x00, 0x18, 0x00], // !
    [0x6C, 0x6C, 0x24, 0x00, 0x00, 0x00, 0x00, 0x00], // "
    [0x6C, 0xFE, 0x6C, 0x6C, 0xFE, 0x6C, 0x00, 0x00], // #
    [0x18, 0x7E, 0x58, 0x7C, 0x1A, 0x7E, 0x18, 0x00], // $
    [0x62, 0x64, 0x08, 0x10, 0x26, 0x46, 0x00, 0x00], // %
    [0x38, 0x6C, 0x38, 0x76, 0xDC, 0xCC, 0x76, 0x00], // &
    [0x18, 0x18, 0x30, 0x00, 0x00, 0x00, 0x00, 0x00], // '
    [0x0C, 0x18, 0x30, 0x30, 0x30, 0x18, 0x0C, 0x00], // (
    [0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x18, 0x30, 0x00], // )
    [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00], // *
    [0x00, 0x18, 0x18, 0x7E, 0x18, 0x18, 0x00, 0x00], // +
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x30], // ,
    [0x00, 0x00, 0x00, 0x7E, 0x00, 0x00, 0x00, 0x00], // -
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x18, 0x18, 0x00], // .
    [0x02, 0x04, 0x08, 0x10, 0x20, 0x40, 0x80, 0x00], // /
    [0x7C, 0xC6, 0xCE, 0xD6, 0xE6, 0xC6, 0x7C, 0x00], // 0
    [0x18, 0x38, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00], // 1
    [0x7C, 0xC6, 0x06, 0x1C, 0x70, 0xC0, 0xFE, 0x00], // 2
    [0x7C, 0xC6, 0x06, 0x3C, 0x06, 0xC6, 0x7C, 0x00], // 3
    [0x1C, 0x3C, 0x6C, 0xCC, 0xFE, 0x0C, 0x1E, 0x00], // 4
    [0xFE, 0xC0, 0xFC, 0x06, 0x06, 0xC6, 0x7C, 0x00], // 5
    [0x38, 0x60, 0xC0, 0xFC, 0xC6, 0xC6, 0x7C, 0x00], // 6
    [0xFE, 0xC6, 0x0C, 0x18, 0x30, 0x30, 0x30, 0x00], // 7
    [0x7C, 0xC6, 0xC6, 0x7C, 0xC6, 0xC6, 0x7C, 0x00], // 8
    [0x7C, 0xC6, 0xC6, 0x7E, 0x06, 0x0C, 0x78, 0x00], // 9
    [0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x00], // :
    [0x00, 0x18, 0x18, 0x00, 0x00, 0x18, 0x18, 0x30], // ;
    [0x0C, 0x18, 0x30, 0x60, 0x30, 0x18, 0x0C, 0x00], // <
    [0x00, 0x00, 0x7E, 0x00, 0x7E, 0x00, 0x00, 0x00], // =
    [0x30, 0x18, 0x0C, 0x06, 0x0C, 0x18, 0x30, 0x00], // >
    [0x7C, 0xC6, 0x0C, 0x18, 0x18, 0x00, 0x18, 0x00], // ?
    [0x7C, 0xC6, 0xDE, 0xDE, 0xDE, 0xC0, 0x7C, 0x00], // @
    [0x38, 0x6C, 0xC6, 0xC6, 0xFE, 0xC6, 0xC6, 0x00], // A
    [0xFC, 0xC6, 0xC6, 0xFC, 0xC6, 0xC6, 0xFC, 0x00], // B
    [0x7C, 0xC6, 0xC0, 0xC0, 0xC0, 0xC6, 0x7C, 0x00], // C
    [0xF8, 0xCC, 0xC6, 0xC6, 0xC6, 0xCC, 0xF8, 0x00], // D
    [0xFE, 0xC0, 0xC0, 0xF8, 0xC0, 0xC0, 0xFE, 0x00], // E
    [0xFE, 0xC0, 0xC0, 0xF8, 0xC0, 0xC0, 0xC0, 0x00], // F
    [0x7C, 0xC6, 0xC0, 0xCE, 0xC6, 0xC6, 0x7E, 0x00], // G
    [0xC6, 0xC6, 0xC6, 0xFE, 0xC6, 0xC6, 0xC6, 0x00], // H
    [0x7E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x7E, 0x00], // I
    [0x1E, 0x06, 0x06, 0x06, 0xC6, 0xC6, 0x7C, 0x00], // J
    [0xC6, 0xCC, 0xD8, 0xF0, 0xD8, 0xCC, 0xC6, 0x00], // K
    [0xC0, 0xC0, 0xC0, 0xC0, 0xC0, 0xC0, 0xFE, 0x00], // L
    [0xC6, 0xEE, 0xFE, 0xD6, 0xC6, 0xC6, 0xC6, 0x00], // M
    [0xC6, 0xE6, 0xF6, 0xDE, 0xCE, 0xC6, 0xC6, 0x00], // N
    [0x7C, 0xC6, 0xC6, 0xC6, 0xC6, 0xC6, 0x7C, 0x00], // O
    [0xFC, 0xC6, 0xC6, 0xFC, 0xC0, 0xC0, 0xC0, 0x00], // P
    [0x7C, 0xC6, 0xC6, 0xC6, 0xD6, 0xDE, 0x7C, 0x06], // Q
    [0xFC, 0xC6, 0xC6, 0xFC, 0xD8, 0xCC, 0xC6, 0x00], // R
    [0x7C, 0xC6, 0xC0, 0x7C, 0x06, 0xC6, 0x7C, 0x00], // S
    [0xFF, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00], // T
    [0xC6, 0xC6, 0xC6, 0xC6, 0xC6, 0xC6, 0x7C, 0x00], // U
    [0xC6, 0xC6, 0xC6, 0xC6, 0x6C, 0x38, 0x10, 0x00], // V
    [0xC6, 0xC6, 0xC6, 0xD6, 0xFE, 0xEE, 0xC6, 0x00], // W
    [0xC6, 0xC6, 0x6C, 0x38, 0x6C, 0xC6, 0xC6, 0x00], // X
    [0xC3, 0xC3, 0x66, 0x3C, 0x18, 0x18, 0x18, 0x00], // Y
    [0xFE, 0x06, 0x0C, 0x18, 0x30, 0x60, 0xFE, 0x00], // Z
    [0x3C, 0x30, 0x30, 0x30, 0x30, 0x30, 0x3C, 0x00], // [
    [0x80, 0x40, 0x20, 0x10, 0x08, 0x04, 0x02, 0x00], // backslash
    [0x3C, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x3C, 0x00], // ]
    [0x10, 0x38, 0x6C, 0xC6, 0x00, 0x00, 0x00, 0x00], // ^
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF], // _
];

/// Characters after the lowercase range: ` { | } ~
#[rustfmt::skip]
const EXTRA: [[u8; 8]; 5] = [
    [0x30, 0x18, 0x0C, 0x00, 0x00, 0x00, 0x00, 0x00], // `
    [0x0E, 0x18, 0x18, 0x70, 0x18, 0x18, 0x0E, 0x00], // {
    [0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x18, 0x00], // |
    [0x70, 0x18, 0x18, 0x0E, 0x18, 0x18, 0x70, 0x00], // }
    [0x76, 0xDC, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ~
];

/// Bitmap for `ch`. Characters without a glyph render as `?`.
pub fn glyph(ch: char) -> &'static [u8; 8] {
    let code = ch as u32;
    match ch {
        '\x01'..='\x08' => &ICONS[(code - 1) as usize],
        ' '..='_' => &ASCII[(code - 32) as usize],
        'a'..='z' => &ASCII[(code - 'a' as u32 + 33) as usize],
        '`' => &EXTRA[0],
        '{'..='~' => &EXTRA[(code - '{' as u32 + 1) as usize],
        _ => &ASCII[('?' as u32 - 32) as usize],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_shares_uppercase() {
        assert_eq!(glyph('a'), glyph('A'));
        assert_eq!(glyph('z'), glyph('Z'));
    }

    #[test]
    fn unknown_falls_back_to_question_mark() {
        assert_eq!(glyph('\u{263A}'), glyph('?'));
        assert_eq!(glyph('\x7f'), glyph('?'));
        assert_eq!(glyph('\0'), glyph('?'));
    }

    #[test]
    fn space_is_blank() {
        assert!(glyph(' ').iter().all(|&row| row == 0));
    }

    #[test]
    fn icons_are_distinct_and_drawn() {
        let icons = [
            ICON_SEPARATOR,
            ICON_CPU,
            ICON_TEMP,
            ICON_WIFI,
            ICON_MEGA,
            ICON_BITS,
            ICON_BATTERY,
            ICON_BACKLIGHT,
        ];
        for (i, a) in icons.iter().enumerate() {
            assert!(glyph(*a).iter().any(|&row| row != 0));
            for b in &icons[i + 1..] {
                assert_ne!(glyph(*a), glyph(*b));
            }
        }
    }

    #[test]
    fn extra_punctuation() {
        assert_eq!(glyph('|')[0], 0x18);
        assert_eq!(glyph('~')[0], 0x76);
        assert_eq!(glyph('`')[0], 0x30);
    }
}
