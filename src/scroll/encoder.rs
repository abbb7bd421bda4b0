/*
 *  scroll/encoder.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Message to column bitmap encoding
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use crate::glyphs::{self, GLYPH_WIDTH};
use crate::scroll::buffer::ScrollBuffer;

use log::debug;

/// Lays the glyphs of `message` side by side, 8 columns per character.
///
/// Characters without a glyph become blank columns.
pub fn encode(message: &str) -> ScrollBuffer {
    let mut columns = Vec::with_capacity(message.chars().count() * GLYPH_WIDTH);
    for ch in message.chars() {
        if !glyphs::is_supported(ch) {
            debug!("No glyph for {:?}, rendering blank", ch);
        }
        columns.extend_from_slice(&glyphs::lookup(ch));
    }
    ScrollBuffer::from_bytes(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glyphs::{lookup, GLYPH_NONE};

    #[test]
    fn test_encode_empty() {
        let buffer = encode("");
        assert!(buffer.is_empty());
        assert_eq!(buffer.render_window(), [0u8; 8]);
    }

    #[test]
    fn test_encode_single_char() {
        let buffer = encode("A");
        assert_eq!(buffer.to_vec(), vec![0x7C, 0x7E, 0x13, 0x13, 0x7E, 0x7C, 0x00, 0x00]);
    }

    #[test]
    fn test_encode_concatenates_in_order() {
        let buffer = encode("HI");
        let mut expected = lookup('H').to_vec();
        expected.extend_from_slice(&lookup('I'));
        assert_eq!(buffer.to_vec(), expected);
    }

    #[test]
    fn test_encode_length_counts_chars_not_bytes() {
        // multi-byte UTF-8 still takes one glyph slot
        let buffer = encode("a\u{e9}b");
        assert_eq!(buffer.len(), 24);
        assert_eq!(&buffer.to_vec()[8..16], &GLYPH_NONE);
    }

    #[test]
    fn test_encode_is_deterministic() {
        assert_eq!(encode("HELLO * "), encode("HELLO * "));
    }
}
