// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The collection of protocol headers implemented by this library.
//!
//! Most communication protocols make use of multiple encapsulated layers of data, where each
//! layer performs a distinct purpose in relaying information from one peer to another. Each layer
//! can be generalized into a header and payload, where the header contains data specific to the
//! operation of that layer and the payload contains the next layer of data.
//!
//! Tightly related headers are grouped within their own modules. For instance, [`Ipv6`] and its
//! extension headers are all contained within the [`ip`] module. The [`traits`] module contains
//! the [`Header`](traits::Header) trait every header implements, and [`dev_traits`] contains
//! what is needed to write a new one.
//!
//! [`Ipv6`]: crate::layers::ip::Ipv6

pub mod dev_traits;
pub mod ip;
pub mod traits;
pub mod udp;

use core::cell::Ref;

use crate::buffer::BufferView;

/// A run of unstructured bytes.
///
/// This type is used when the payload of a layer cannot be interpreted (no parser is registered
/// for its protocol, the parser rejected it, or the header declares it uninterpretable), and for
/// trailing bytes beyond a header's declared length. A [`Raw`] layer does not necessarily hold
/// only one protocol; it may well contain several encapsulated layers that simply weren't
/// dissected.
///
/// Like every other layer, a [`Raw`] is a window onto the capture buffer rather than a copy of
/// it.
#[derive(Clone, Debug)]
pub struct Raw {
    data: BufferView,
}

impl Raw {
    pub const NAME: &'static str = "Raw";

    #[inline]
    pub fn new(data: BufferView) -> Self {
        Raw { data }
    }

    /// The bytes of the layer.
    ///
    /// The returned guard must be dropped before any field of the same capture is written.
    #[inline]
    pub fn data(&self) -> Ref<'_, [u8]> {
        self.data.bytes()
    }

    #[inline]
    pub fn to_vec(&self) -> Vec<u8> {
        self.data.to_vec()
    }

    #[inline]
    pub fn view(&self) -> &BufferView {
        &self.data
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<BufferView> for Raw {
    #[inline]
    fn from(data: BufferView) -> Self {
        Raw::new(data)
    }
}
