// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Shared, bounds-checked windows into a capture buffer.
//!
//! A [`BufferView`] is the only way any layer in this crate touches packet bytes. Every header
//! and every opaque payload derived from one capture holds a view onto the same storage, so a
//! field written through one view is immediately visible through all the others (and in the
//! bytes returned by [`Packet::into_bytes()`](crate::node::Packet::into_bytes)).
//!
//! All bounds checks live here. A view upholds `offset + len <= storage.len()` at all times, and
//! any access outside of the visible window fails with [`Error::OutOfBounds`].
//!
//! Views over one capture are not `Send`; editing a capture from several threads requires
//! external synchronisation.

use core::cell::{Ref, RefCell};
use core::fmt;
use core::ops::Range;

use std::rc::Rc;

use crate::error::Error;

/// The width of an integer word read from or written to a [`BufferView`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Width {
    U8 = 1,
    U16 = 2,
    U32 = 4,
    U64 = 8,
}

impl Width {
    /// The width in bytes.
    #[inline]
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// The width in bits.
    #[inline]
    pub const fn bits(self) -> u32 {
        self as u32 * 8
    }

    /// The largest value representable in a word of this width.
    #[inline]
    pub const fn max_value(self) -> u64 {
        match self {
            Width::U64 => u64::MAX,
            w => (1u64 << w.bits()) - 1,
        }
    }
}

/// Byte order of a multi-byte word.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    /// Network byte order.
    #[default]
    Big,
    Little,
}

/// A window of `len` bytes starting at `offset` within a shared capture buffer.
///
/// Cloning a view is cheap and never copies packet bytes.
#[derive(Clone)]
pub struct BufferView {
    storage: Rc<RefCell<Box<[u8]>>>,
    offset: usize,
    len: usize,
}

impl BufferView {
    /// Takes ownership of `bytes` and returns a view spanning all of them.
    pub fn new(bytes: impl Into<Box<[u8]>>) -> Self {
        let storage: Box<[u8]> = bytes.into();
        let len = storage.len();
        BufferView {
            storage: Rc::new(RefCell::new(storage)),
            offset: 0,
            len,
        }
    }

    /// Takes ownership of `bytes` and returns a view of `len` bytes starting at `offset`.
    pub fn with_window(
        bytes: impl Into<Box<[u8]>>,
        offset: usize,
        len: usize,
    ) -> Result<Self, Error> {
        Self::new(bytes).slice(offset, len)
    }

    /// The absolute position of the first byte of the view within the capture.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The number of bytes visible through the view.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The largest length the view could be resized to.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.borrow().len() - self.offset
    }

    /// Indicates whether both views refer to the same capture buffer.
    #[inline]
    pub fn shares_storage(&self, other: &BufferView) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }

    /// Converts a range relative to the view into an absolute range within the storage.
    #[inline]
    fn absolute(&self, at: usize, len: usize) -> Result<Range<usize>, Error> {
        match at.checked_add(len) {
            Some(end) if end <= self.len => Ok(self.offset + at..self.offset + end),
            _ => Err(Error::OutOfBounds {
                offset: at,
                len,
                bound: self.len,
            }),
        }
    }

    /// Reads an unsigned integer of the given width at `at` bytes into the view.
    pub fn read_uint(&self, at: usize, width: Width, endian: Endianness) -> Result<u64, Error> {
        let range = self.absolute(at, width.bytes())?;
        let storage = self.storage.borrow();
        let word = &storage[range];

        Ok(match endian {
            Endianness::Big => word.iter().fold(0, |acc, &b| (acc << 8) | b as u64),
            Endianness::Little => word.iter().rev().fold(0, |acc, &b| (acc << 8) | b as u64),
        })
    }

    /// Writes `value` as an unsigned integer of the given width at `at` bytes into the view.
    ///
    /// Fails with [`Error::FieldRange`] if `value` does not fit in `width`.
    pub fn write_uint(
        &self,
        at: usize,
        value: u64,
        width: Width,
        endian: Endianness,
    ) -> Result<(), Error> {
        let range = self.absolute(at, width.bytes())?;
        if value > width.max_value() {
            return Err(Error::FieldRange {
                field: "word",
                value,
                max: width.max_value(),
            });
        }

        let mut storage = self
            .storage
            .try_borrow_mut()
            .map_err(|_| Error::BufferInUse)?;
        let be_bytes = value.to_be_bytes();
        let src = &be_bytes[be_bytes.len() - width.bytes()..];
        let dst = &mut storage[range];

        match endian {
            Endianness::Big => dst.copy_from_slice(src),
            Endianness::Little => {
                for (d, s) in dst.iter_mut().zip(src.iter().rev()) {
                    *d = *s;
                }
            }
        }

        Ok(())
    }

    #[inline]
    pub fn read_u8(&self, at: usize) -> Result<u8, Error> {
        Ok(self.read_uint(at, Width::U8, Endianness::Big)? as u8)
    }

    #[inline]
    pub fn write_u8(&self, at: usize, value: u8) -> Result<(), Error> {
        self.write_uint(at, value as u64, Width::U8, Endianness::Big)
    }

    /// Reads a big-endian `u16`.
    #[inline]
    pub fn read_u16(&self, at: usize) -> Result<u16, Error> {
        Ok(self.read_uint(at, Width::U16, Endianness::Big)? as u16)
    }

    /// Writes a big-endian `u16`.
    #[inline]
    pub fn write_u16(&self, at: usize, value: u16) -> Result<(), Error> {
        self.write_uint(at, value as u64, Width::U16, Endianness::Big)
    }

    /// Reads a big-endian `u32`.
    #[inline]
    pub fn read_u32(&self, at: usize) -> Result<u32, Error> {
        Ok(self.read_uint(at, Width::U32, Endianness::Big)? as u32)
    }

    /// Writes a big-endian `u32`.
    #[inline]
    pub fn write_u32(&self, at: usize, value: u32) -> Result<(), Error> {
        self.write_uint(at, value as u64, Width::U32, Endianness::Big)
    }

    /// Copies `N` bytes starting at `at` out of the view.
    pub fn read_array<const N: usize>(&self, at: usize) -> Result<[u8; N], Error> {
        let range = self.absolute(at, N)?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(&self.storage.borrow()[range]);
        Ok(arr)
    }

    /// Overwrites the bytes starting at `at` with `bytes`.
    pub fn write_bytes(&self, at: usize, bytes: &[u8]) -> Result<(), Error> {
        let range = self.absolute(at, bytes.len())?;
        let mut storage = self
            .storage
            .try_borrow_mut()
            .map_err(|_| Error::BufferInUse)?;
        storage[range].copy_from_slice(bytes);
        Ok(())
    }

    /// Returns a new view of `len` bytes starting `start` bytes into this view.
    ///
    /// The new view shares storage with this one.
    pub fn slice(&self, start: usize, len: usize) -> Result<BufferView, Error> {
        let range = self.absolute(start, len)?;
        Ok(BufferView {
            storage: Rc::clone(&self.storage),
            offset: range.start,
            len,
        })
    }

    /// Returns a view of every byte following the first `start` bytes of this view.
    #[inline]
    pub fn slice_from(&self, start: usize) -> Result<BufferView, Error> {
        let len = self.len.checked_sub(start).ok_or(Error::OutOfBounds {
            offset: start,
            len: 0,
            bound: self.len,
        })?;
        self.slice(start, len)
    }

    /// Grows or shrinks the visible window to `new_len` bytes.
    ///
    /// Growing fails with [`Error::OutOfBounds`] if the window would extend past the end of the
    /// capture buffer. The view is left unchanged on failure.
    pub fn resize(&mut self, new_len: usize) -> Result<(), Error> {
        let capacity = self.capacity();
        if new_len > capacity {
            return Err(Error::OutOfBounds {
                offset: 0,
                len: new_len,
                bound: capacity,
            });
        }

        self.len = new_len;
        Ok(())
    }

    /// Borrows the bytes visible through the view.
    ///
    /// Writes through any view of the same capture fail with [`Error::BufferInUse`] while the
    /// returned guard is alive.
    #[inline]
    pub fn bytes(&self) -> Ref<'_, [u8]> {
        let range = self.offset..self.offset + self.len;
        Ref::map(self.storage.borrow(), |s| &s[range])
    }

    /// Copies the bytes visible through the view into a new vector.
    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes().to_vec()
    }

    /// Consumes the view, returning the entire capture buffer (not just the visible window).
    ///
    /// The storage is moved out if this is the last view of the capture; otherwise it is copied.
    pub fn into_storage(self) -> Box<[u8]> {
        match Rc::try_unwrap(self.storage) {
            Ok(cell) => cell.into_inner(),
            Err(shared) => shared.borrow().clone(),
        }
    }
}

impl fmt::Debug for BufferView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferView")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}
