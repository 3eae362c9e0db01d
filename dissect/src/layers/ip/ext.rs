// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! IPv6 extension headers (see RFC 8200, section 4).
//!
//! The Hop-by-Hop Options, Routing and Destination Options headers share one generic layout,
//! handled by [`Ipv6Ext`]. The Fragment header has a fixed layout of its own, handled by
//! [`Ipv6Fragment`].

use bitflags::bitflags;
use dissect_macros::Layer;

use super::IpProtocol;
use crate::buffer::{BufferView, Width};
use crate::dispatch::DissectContext;
use crate::error::*;
use crate::field::BitField;
use crate::layers::dev_traits::*;
use crate::layers::traits::*;

/// The minimum length of any extension header.
pub const IPV6_EXT_MIN_LEN: usize = 8;

const EXT_NEXT_HEADER: BitField = BitField::word("next header", 0, Width::U8);
const EXT_HDR_EXT_LEN: BitField = BitField::word("header extension length", 1, Width::U8);
const ROUTING_TYPE: BitField = BitField::word("routing type", 2, Width::U8);
const SEGMENTS_LEFT: BitField = BitField::word("segments left", 3, Width::U8);

/// A Hop-by-Hop Options, Routing or Destination Options header.
///
/// Each begins with a next header byte and a length byte giving the header length in 8-octet
/// units, not counting the first 8 octets. The payload of the layer is everything that remained
/// after the header within the enclosing IPv6 payload.
#[derive(Clone, Debug, Layer)]
pub struct Ipv6Ext {
    kind: IpProtocol,
    #[header_field]
    header: BufferView,
    #[packet_field]
    packet: BufferView,
}

impl Ipv6Ext {
    /// Constructor for the Hop-by-Hop Options header.
    pub fn hop_by_hop(
        remaining: BufferView,
        _ctx: &DissectContext,
    ) -> Result<Box<dyn Header>, Error> {
        Ok(Box::new(Self::from_view_kind(remaining, IpProtocol::HOPOPT)?))
    }

    /// Constructor for the Routing header.
    pub fn routing(remaining: BufferView, _ctx: &DissectContext) -> Result<Box<dyn Header>, Error> {
        Ok(Box::new(Self::from_view_kind(remaining, IpProtocol::IPV6_ROUTE)?))
    }

    /// Constructor for the Destination Options header.
    pub fn destination_options(
        remaining: BufferView,
        _ctx: &DissectContext,
    ) -> Result<Box<dyn Header>, Error> {
        Ok(Box::new(Self::from_view_kind(remaining, IpProtocol::IPV6_OPTS)?))
    }

    /// Interprets the start of `remaining` as an extension header of the given kind.
    pub fn from_view_kind(remaining: BufferView, kind: IpProtocol) -> Result<Self, Error> {
        if remaining.len() < IPV6_EXT_MIN_LEN {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InsufficientBytes,
                "insufficient bytes for 8-byte minimum extension header",
            )
            .into());
        }

        let hdr_ext_len = EXT_HDR_EXT_LEN.get(&remaining)? as usize;
        let header_len = (hdr_ext_len + 1) * 8;
        if header_len > remaining.len() {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InvalidSize,
                "header extension length exceeds remaining bytes",
            )
            .into());
        }

        Ok(Ipv6Ext {
            kind,
            header: remaining.slice(0, header_len)?,
            packet: remaining,
        })
    }

    /// Which of the extension headers this is.
    #[inline]
    pub fn kind(&self) -> IpProtocol {
        self.kind
    }

    #[inline]
    pub fn next_header(&self) -> Result<IpProtocol, Error> {
        Ok(IpProtocol(EXT_NEXT_HEADER.get(&self.header)? as u8))
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: IpProtocol) -> Result<(), Error> {
        EXT_NEXT_HEADER.set(&self.header, next_header.0.into())
    }

    /// The raw header extension length field (8-octet units beyond the first 8 octets).
    #[inline]
    pub fn hdr_ext_len(&self) -> Result<u8, Error> {
        Ok(EXT_HDR_EXT_LEN.get(&self.header)? as u8)
    }

    /// The options (or, for the Routing header, the type-specific data) following the first two
    /// bytes of the header.
    #[inline]
    pub fn options(&self) -> Result<BufferView, Error> {
        self.header.slice_from(2)
    }

    /// The routing type, for Routing headers.
    pub fn routing_type(&self) -> Result<Option<u8>, Error> {
        if self.kind != IpProtocol::IPV6_ROUTE {
            return Ok(None);
        }
        Ok(Some(ROUTING_TYPE.get(&self.header)? as u8))
    }

    /// The number of route segments remaining, for Routing headers.
    pub fn segments_left(&self) -> Result<Option<u8>, Error> {
        if self.kind != IpProtocol::IPV6_ROUTE {
            return Ok(None);
        }
        Ok(Some(SEGMENTS_LEFT.get(&self.header)? as u8))
    }

    pub fn set_segments_left(&mut self, segments_left: u8) -> Result<(), Error> {
        if self.kind != IpProtocol::IPV6_ROUTE {
            return Err(Error::UnsupportedOperation {
                layer: Self::name(),
                operation: "setting segments left on a non-routing header",
            });
        }
        SEGMENTS_LEFT.set(&self.header, segments_left.into())
    }
}

impl Header for Ipv6Ext {
    #[inline]
    fn next_protocol(&self) -> Option<IpProtocol> {
        self.next_header().ok()
    }
}

/// The fixed length of the Fragment header.
pub const IPV6_FRAGMENT_LEN: usize = 8;

const FRAG_NEXT_HEADER: BitField = BitField::word("next header", 0, Width::U8);
const FRAG_OFFSET: BitField = BitField::new("fragment offset", 2, Width::U16, 3, 13);
const FRAG_FLAGS: BitField = BitField::new("fragment flags", 2, Width::U16, 0, 3);
const FRAG_IDENTIFICATION: BitField = BitField::word("identification", 4, Width::U32);

bitflags! {
    /// The flag bits of the Fragment header.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct FragmentFlags: u16 {
        /// More fragments follow this one.
        const MORE_FRAGMENTS = 0b001;
        /// Reserved bits; zero on transmission.
        const RESERVED = 0b110;
    }
}

/// An IPv6 Fragment header.
///
/// Only an atomic fragment (offset 0 with no further fragments) holds a payload that can be
/// dissected on its own; the payload of any other fragment is left as raw bytes, since
/// reassembly is beyond the scope of a dissector.
#[derive(Clone, Debug, Layer)]
pub struct Ipv6Fragment {
    #[header_field]
    header: BufferView,
    #[packet_field]
    packet: BufferView,
}

impl Ipv6Fragment {
    #[inline]
    pub fn next_header(&self) -> Result<IpProtocol, Error> {
        Ok(IpProtocol(FRAG_NEXT_HEADER.get(&self.header)? as u8))
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: IpProtocol) -> Result<(), Error> {
        FRAG_NEXT_HEADER.set(&self.header, next_header.0.into())
    }

    /// The offset of this fragment's data, in 8-octet units.
    #[inline]
    pub fn fragment_offset(&self) -> Result<u16, Error> {
        Ok(FRAG_OFFSET.get(&self.header)? as u16)
    }

    /// Sets the 13-bit fragment offset.
    #[inline]
    pub fn set_fragment_offset(&mut self, offset: u16) -> Result<(), Error> {
        FRAG_OFFSET.set(&self.header, offset.into())
    }

    #[inline]
    pub fn flags(&self) -> Result<FragmentFlags, Error> {
        Ok(FragmentFlags::from_bits_retain(
            FRAG_FLAGS.get(&self.header)? as u16,
        ))
    }

    #[inline]
    pub fn set_flags(&mut self, flags: FragmentFlags) -> Result<(), Error> {
        FRAG_FLAGS.set(&self.header, flags.bits().into())
    }

    #[inline]
    pub fn more_fragments(&self) -> Result<bool, Error> {
        Ok(self.flags()?.contains(FragmentFlags::MORE_FRAGMENTS))
    }

    #[inline]
    pub fn identification(&self) -> Result<u32, Error> {
        Ok(FRAG_IDENTIFICATION.get(&self.header)? as u32)
    }

    #[inline]
    pub fn set_identification(&mut self, identification: u32) -> Result<(), Error> {
        FRAG_IDENTIFICATION.set(&self.header, identification.into())
    }

    /// Indicates whether this fragment is the whole of the original packet (RFC 6946).
    pub fn is_atomic(&self) -> Result<bool, Error> {
        Ok(self.fragment_offset()? == 0 && !self.more_fragments()?)
    }
}

impl FromView for Ipv6Fragment {
    fn from_view(remaining: BufferView, _ctx: &DissectContext) -> Result<Self, Error> {
        if remaining.len() < IPV6_FRAGMENT_LEN {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InsufficientBytes,
                "insufficient bytes for 8-byte fragment header",
            )
            .into());
        }

        Ok(Ipv6Fragment {
            header: remaining.slice(0, IPV6_FRAGMENT_LEN)?,
            packet: remaining,
        })
    }
}

impl Header for Ipv6Fragment {
    fn next_protocol(&self) -> Option<IpProtocol> {
        match self.is_atomic() {
            Ok(true) => self.next_header().ok(),
            _ => None,
        }
    }
}
