/*
 *  scroll/buffer.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Circular column buffer behind the scrolling message
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

use std::collections::VecDeque;

use crate::glyphs::GLYPH_WIDTH;

/// The 8 columns currently visible on the matrix.
pub type Window = [u8; GLYPH_WIDTH];

/// Column bytes of an encoded message, rotated one column per tick.
///
/// Rotation only moves bytes around; the length never changes for the life of
/// a message and `len()` rotations bring the buffer back to where it started.
/// Equality looks at the column order only, not at how many rotations led to it.
#[derive(Debug, Clone, Default)]
pub struct ScrollBuffer {
    columns: VecDeque<u8>,
    offset: usize,
}

impl ScrollBuffer {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            columns: VecDeque::from(bytes),
            offset: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Rotations applied since encoding, modulo the length.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn iter(&self) -> impl Iterator<Item = &u8> + '_ {
        self.columns.iter()
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.columns.iter().copied().collect()
    }

    /// First 8 columns. A buffer shorter than the window is padded with
    /// blank columns.
    pub fn render_window(&self) -> Window {
        let mut window = [0u8; GLYPH_WIDTH];
        for (slot, &column) in window.iter_mut().zip(self.columns.iter()) {
            *slot = column;
        }
        window
    }

    /// Moves the first column to the end. No-op on an empty buffer.
    pub fn rotate_left_by_one(&mut self) {
        if self.columns.is_empty() {
            return;
        }
        self.columns.rotate_left(1);
        self.offset = (self.offset + 1) % self.columns.len();
    }

    /// Undo every rotation so the message starts from its first column again.
    pub fn reset(&mut self) {
        if self.offset != 0 {
            self.columns.rotate_right(self.offset);
            self.offset = 0;
        }
    }
}

impl PartialEq for ScrollBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl Eq for ScrollBuffer {}
