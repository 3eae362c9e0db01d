// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Bit-level field accessors.
//!
//! Many protocols pack several logically distinct fields into one machine word (the IPv6
//! version, traffic class and flow label all live in the first 32 bits of the header, for
//! instance). A [`BitField`] describes one such field as a (word, shift, mask) triple and reads
//! or writes it through a [`BufferView`] without disturbing any other bits of the word.
//!
//! Fields that occupy a whole word are simply bit fields with a shift of 0 and a full mask.

use crate::buffer::{BufferView, Endianness, Width};
use crate::error::Error;

/// A field occupying `mask << shift` within the word of width `width` found `offset` bytes into a
/// header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BitField {
    name: &'static str,
    offset: usize,
    width: Width,
    endian: Endianness,
    shift: u32,
    mask: u64,
}

impl BitField {
    /// A field of `bits` bits located `shift` bits above the least significant bit of a
    /// big-endian word.
    pub const fn new(name: &'static str, offset: usize, width: Width, shift: u32, bits: u32) -> Self {
        assert!(bits > 0 && shift + bits <= width.bits(), "bit field exceeds its word");
        let mask = if bits == 64 { u64::MAX } else { (1u64 << bits) - 1 };

        BitField {
            name,
            offset,
            width,
            endian: Endianness::Big,
            shift,
            mask,
        }
    }

    /// A field spanning an entire big-endian word.
    #[inline]
    pub const fn word(name: &'static str, offset: usize, width: Width) -> Self {
        Self::new(name, offset, width, 0, width.bits())
    }

    /// The same field, stored in little-endian byte order.
    #[inline]
    pub const fn little_endian(mut self) -> Self {
        self.endian = Endianness::Little;
        self
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Offset in bytes of the containing word from the start of the header.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub const fn width(&self) -> Width {
        self.width
    }

    #[inline]
    pub const fn shift(&self) -> u32 {
        self.shift
    }

    /// The mask of the field, aligned to bit 0.
    #[inline]
    pub const fn mask(&self) -> u64 {
        self.mask
    }

    /// The largest value the field can hold.
    #[inline]
    pub const fn max(&self) -> u64 {
        self.mask
    }

    /// Reads the field from `view`.
    #[inline]
    pub fn get(&self, view: &BufferView) -> Result<u64, Error> {
        let word = view.read_uint(self.offset, self.width, self.endian)?;
        Ok((word >> self.shift) & self.mask)
    }

    /// Writes `value` into the field, leaving every other bit of the containing word untouched.
    ///
    /// Fails with [`Error::FieldRange`] if `value` has bits set outside of the field's mask.
    pub fn set(&self, view: &BufferView, value: u64) -> Result<(), Error> {
        if value > self.mask {
            return Err(Error::FieldRange {
                field: self.name,
                value,
                max: self.mask,
            });
        }

        let word = view.read_uint(self.offset, self.width, self.endian)?;
        let word = (word & !(self.mask << self.shift)) | ((value & self.mask) << self.shift);
        view.write_uint(self.offset, word, self.width, self.endian)
    }
}
