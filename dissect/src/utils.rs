// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # General utility functions
//!
//! This submodule provides the one's-complement arithmetic used by the Internet checksum
//! (RFC 1071). None of these functions should be considered stable--they may be removed or
//! changed at any release.

/// Computes the 16-bit one's-complement sum of `bytes`, treated as a sequence of big-endian
/// words.
///
/// A trailing odd byte is summed as though it were followed by a zero pad byte.
pub fn ones_complement_16bit(bytes: &[u8]) -> u16 {
    let mut chunks = bytes.chunks_exact(2);
    let mut res = (&mut chunks).fold(0u16, |acc, word| {
        ones_complement_add(acc, u16::from_be_bytes([word[0], word[1]]))
    });

    if let Some(&last) = chunks.remainder().first() {
        res = ones_complement_add(res, (last as u16) << 8);
    }

    res
}

/// Adds two 16-bit words using one's-complement (end-around carry) arithmetic.
#[inline]
pub fn ones_complement_add(a: u16, b: u16) -> u16 {
    let (sum, carry) = a.overflowing_add(b);
    sum + carry as u16
}
