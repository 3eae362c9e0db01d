// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Small allocation-free helpers shared between `dissect` crates.

#![forbid(unsafe_code)]

use core::{array, fmt, ops};

/// A fixed-capacity buffer stored inline.
///
/// Used wherever a short byte sequence of bounded length must be assembled without touching the
/// heap, such as checksum pseudo-headers (at most 40 bytes for IPv6).
#[derive(Clone)]
pub struct Buffer<T: Copy, const N: usize> {
    buf: [T; N],
    buf_len: usize,
}

impl<T: Copy + Default, const N: usize> Buffer<T, N> {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.buf[..self.buf_len]
    }

    /// Appends the provided elements to the buffer, returning `None` and leaving the buffer
    /// unmodified if insufficient space is available.
    #[inline]
    pub fn try_append(&mut self, slice: &[T]) -> Option<()> {
        let dst = self.buf.get_mut(self.buf_len..self.buf_len + slice.len())?;
        dst.copy_from_slice(slice);
        self.buf_len += slice.len();
        Some(())
    }

    /// The number of elements stored in the buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.buf_len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf_len == 0
    }

    /// The total number of elements the buffer can hold.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

}

impl<T: Copy + Default, const N: usize> Default for Buffer<T, N> {
    #[inline]
    fn default() -> Self {
        Self {
            buf: array::from_fn(|_| T::default()),
            buf_len: 0,
        }
    }
}

impl<T: Copy + Default, const N: usize> ops::Deref for Buffer<T, N> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T: Copy + Default + PartialEq, const N: usize> PartialEq for Buffer<T, N> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<T: Copy + Default + Eq, const N: usize> Eq for Buffer<T, N> {}

impl<T: Copy + Default + fmt::Debug, const N: usize> fmt::Debug for Buffer<T, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_append_refuses_overflow() {
        let mut buf = Buffer::<u8, 4>::new();
        assert!(buf.is_empty());
        assert_eq!(buf.try_append(&[9; 3]), Some(()));
        assert_eq!(buf.try_append(&[9; 2]), None);
        assert_eq!(buf.as_slice(), &[9, 9, 9]);
        assert_eq!(buf.try_append(&[7]), Some(()));
        assert_eq!(&*buf, &[9, 9, 9, 7]);
        assert_eq!(buf.len(), buf.capacity());
    }

    #[test]
    fn equality_ignores_unused_capacity() {
        let mut a = Buffer::<u8, 4>::new();
        let mut b = Buffer::<u8, 4>::new();
        a.try_append(&[1, 2]).unwrap();
        b.try_append(&[1, 2]).unwrap();
        assert_eq!(a, b);

        b.try_append(&[0]).unwrap();
        assert_ne!(a, b);
    }
}
