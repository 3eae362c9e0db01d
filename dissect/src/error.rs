// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types returned by buffer views, field accessors and header constructors.
//!
//! Note that an unrecognised protocol number is never reported as an error: the dispatcher keeps
//! the unexamined bytes as a [`Raw`](crate::layers::Raw) layer instead.

/// Errors raised by operations on a packet.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A read, write, slice or resize fell outside of a view's window or its backing storage.
    #[error("range {offset}..{offset}+{len} exceeds bound of {bound} bytes")]
    OutOfBounds {
        /// Start of the requested range, relative to the view.
        offset: usize,
        /// Length of the requested range.
        len: usize,
        /// Number of bytes actually available.
        bound: usize,
    },
    /// The operation has no well-defined meaning for the given layer (such as writing a
    /// derived field that has no inverse).
    #[error("{layer}: {operation} is not supported")]
    UnsupportedOperation {
        layer: &'static str,
        operation: &'static str,
    },
    /// A value could not be represented by the field it was written to.
    #[error("value {value} out of range for {field} (maximum {max})")]
    FieldRange {
        field: &'static str,
        value: u64,
        max: u64,
    },
    /// A write was attempted while a byte slice borrowed from the same capture was still held.
    #[error("capture buffer is currently borrowed")]
    BufferInUse,
    /// The bytes handed to a header constructor do not form a valid header.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Describes why a sequence of bytes could not be interpreted as a given header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {layer} header: {reason}")]
pub struct ValidationError {
    pub layer: &'static str,
    pub class: ValidationErrorClass,
    pub reason: &'static str,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValidationErrorClass {
    /// Fewer bytes were available than the header needs to be well-formed.
    InsufficientBytes,
    /// A size field conflicts with the actual composition of the header, or two size fields
    /// conflict with each other.
    InvalidSize,
    /// A field holds a value the protocol forbids.
    InvalidValue,
}

impl ValidationError {
    #[inline]
    pub(crate) const fn new(
        layer: &'static str,
        class: ValidationErrorClass,
        reason: &'static str,
    ) -> Self {
        ValidationError {
            layer,
            class,
            reason,
        }
    }
}
