// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! A library for dissecting and editing captured packets in place.
//!
//! A capture is handed over once, as an owned byte buffer, and every layer dissected from it is a
//! window ([`BufferView`](buffer::BufferView)) onto that same buffer. Reading a field reads the
//! capture; setting a field writes the capture, so edits made through any layer are visible
//! through every other layer and in the bytes returned by
//! [`Packet::into_bytes()`](node::Packet::into_bytes).
//!
//! Dissection starts from a protocol number and recurses through the "next protocol" field of
//! each header. Parsers are looked up in a [`Registry`](dispatch::Registry); bytes that no parser
//! claims, or that a parser rejects, are kept as an opaque [`Raw`](layers::Raw) layer rather than
//! reported as errors.
//!
//! The [`prelude`] module re-exports everything commonly needed to dissect a packet.

#![forbid(unsafe_code)]
#![allow(clippy::len_without_is_empty)]

pub mod buffer;
pub mod dispatch;
pub mod error;
pub mod field;
pub mod layers;
pub mod node;
pub mod prelude;
pub mod pseudo;
pub mod utils;
