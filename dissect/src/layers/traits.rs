// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Traits used to provide [`Header`] functionality.

use core::fmt;

use super::dev_traits::*;
use crate::buffer::BufferView;
use crate::dispatch::DissectContext;
use crate::error::*;
use crate::layers::ip::IpProtocol;
use crate::pseudo::AddressPair;

/// A typed interpretation of a prefix of a packet's bytes.
///
/// A `Header` never owns packet bytes; every accessor reads or writes through the
/// [`BufferView`]s returned by [`BaseLayer`], which share storage with every other layer of the
/// same capture. Setting a field on a header is therefore immediately visible to its enclosing
/// layers and in the capture buffer itself.
///
/// This trait is object-safe: a dissected packet holds its headers as `Box<dyn Header>`, and the
/// concrete type can be recovered through [`AsAny`] (see
/// [`PacketNode::get_layer()`](crate::node::PacketNode::get_layer)).
pub trait Header: BaseLayer + AsAny + fmt::Debug {
    /// The length (in bytes) of the header alone.
    #[inline]
    fn header_len(&self) -> usize {
        self.header_view().len()
    }

    /// The length (in bytes) of the header plus the payload it declares.
    ///
    /// Bytes that were available to the header's constructor beyond this length are not part
    /// of the layer; the dispatcher keeps them as a trailer.
    #[inline]
    fn packet_len(&self) -> usize {
        self.packet_view().len()
    }

    /// The bytes following the header within its packet view.
    #[inline]
    fn payload_view(&self) -> Result<BufferView, Error> {
        self.packet_view().slice_from(self.header_len())
    }

    /// The protocol the payload should be dissected as, or `None` if the payload is never
    /// interpreted further (application data, non-initial fragments and the like).
    fn next_protocol(&self) -> Option<IpProtocol>;

    /// The source and destination addresses of a network-layer header.
    ///
    /// Layers encapsulated within this one receive these addresses through their
    /// [`DissectContext`], which is how upper-layer checksums find their pseudo-header.
    #[inline]
    fn addresses(&self) -> Option<AddressPair> {
        None
    }

    /// Checks field values that don't affect the size of the header (version numbers and the
    /// like).
    ///
    /// Dissection does not call this unless strict mode is enabled on the
    /// [`Dissector`](crate::dispatch::Dissector).
    #[inline]
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Recomputes and writes the header's checksum field, if it has one.
    ///
    /// Returns `false` if the header carries no checksum or if `ctx` lacks the information
    /// needed to compute it.
    #[inline]
    fn update_checksum(&mut self, _ctx: &DissectContext) -> Result<bool, Error> {
        Ok(false)
    }

    /// Verifies the header's checksum field against its current contents.
    ///
    /// Returns `None` if the header carries no checksum (or if it cannot be verified with the
    /// information available in `ctx`).
    #[inline]
    fn checksum_valid(&self, _ctx: &DissectContext) -> Result<Option<bool>, Error> {
        Ok(None)
    }
}
