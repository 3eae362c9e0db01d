// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The Internet Protocol (IP) layer: protocol numbers, [`Ipv6`] and its extension headers.

pub mod ext;

use core::fmt;
use std::net::Ipv6Addr;

use dissect_macros::Layer;

use crate::buffer::{BufferView, Width};
use crate::dispatch::DissectContext;
use crate::error::*;
use crate::field::BitField;
use crate::layers::dev_traits::*;
use crate::layers::traits::*;
use crate::pseudo::{AddressPair, PseudoHeader};

/// An IANA-assigned Internet protocol number.
///
/// This is the value carried in the IPv4 Protocol field and the IPv6 Next Header field, and is
/// the key used to select the parser of an encapsulated layer. Every byte value is a valid
/// `IpProtocol`; the named constants cover the protocols this library knows something about.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpProtocol(pub u8);

impl IpProtocol {
    /// IPv6 Hop-by-Hop Option (see RFC 8200)
    pub const HOPOPT: IpProtocol = IpProtocol(0);
    /// Internet Control Message Protocol (see RFC 792)
    pub const ICMP: IpProtocol = IpProtocol(1);
    /// Internet Group Management Protocol (see RFC 1112)
    pub const IGMP: IpProtocol = IpProtocol(2);
    /// IP in IP encapsulation (see RFC 2003)
    pub const IPV4: IpProtocol = IpProtocol(4);
    /// Transmission Control Protocol (see RFC 793)
    pub const TCP: IpProtocol = IpProtocol(6);
    /// User Datagram Protocol (see RFC 768)
    pub const UDP: IpProtocol = IpProtocol(17);
    /// IPv6 encapsulation (see RFC 2473)
    pub const IPV6: IpProtocol = IpProtocol(41);
    /// Routing Header for IPv6 (see RFC 8200)
    pub const IPV6_ROUTE: IpProtocol = IpProtocol(43);
    /// Fragment Header for IPv6 (see RFC 8200)
    pub const IPV6_FRAG: IpProtocol = IpProtocol(44);
    /// Encapsulating Security Payload (see RFC 4303)
    pub const ESP: IpProtocol = IpProtocol(50);
    /// Authentication Header (see RFC 4302)
    pub const AH: IpProtocol = IpProtocol(51);
    /// ICMP for IPv6 (see RFC 4443)
    pub const ICMPV6: IpProtocol = IpProtocol(58);
    /// No Next Header for IPv6 (see RFC 8200)
    pub const IPV6_NONXT: IpProtocol = IpProtocol(59);
    /// Destination Options for IPv6 (see RFC 8200)
    pub const IPV6_OPTS: IpProtocol = IpProtocol(60);
    /// Stream Control Transmission Protocol (see RFC 4960)
    pub const SCTP: IpProtocol = IpProtocol(132);
    /// Lightweight User Datagram Protocol (see RFC 3828)
    pub const UDPLITE: IpProtocol = IpProtocol(136);
    /// Use for experimentation and testing
    pub const EXP1: IpProtocol = IpProtocol(253);
    /// Use for experimentation and testing
    pub const EXP2: IpProtocol = IpProtocol(254);

    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }

    /// The IANA keyword of the protocol, if it is one of the named constants.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::HOPOPT => "HOPOPT",
            Self::ICMP => "ICMP",
            Self::IGMP => "IGMP",
            Self::IPV4 => "IPv4",
            Self::TCP => "TCP",
            Self::UDP => "UDP",
            Self::IPV6 => "IPv6",
            Self::IPV6_ROUTE => "IPv6-Route",
            Self::IPV6_FRAG => "IPv6-Frag",
            Self::ESP => "ESP",
            Self::AH => "AH",
            Self::ICMPV6 => "IPv6-ICMP",
            Self::IPV6_NONXT => "IPv6-NoNxt",
            Self::IPV6_OPTS => "IPv6-Opts",
            Self::SCTP => "SCTP",
            Self::UDPLITE => "UDPLite",
            Self::EXP1 | Self::EXP2 => "Experimental",
            _ => return None,
        })
    }

    /// Indicates whether the protocol is one of the IPv6 extension headers that may appear
    /// between the fixed IPv6 header and the upper-layer protocol (see RFC 8200, section 4).
    #[inline]
    pub fn is_ipv6_extension(self) -> bool {
        matches!(
            self,
            Self::HOPOPT
                | Self::IPV6_ROUTE
                | Self::IPV6_FRAG
                | Self::ESP
                | Self::AH
                | Self::IPV6_OPTS
        )
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", name, self.0),
            None => write!(f, "protocol {}", self.0),
        }
    }
}

impl From<u8> for IpProtocol {
    #[inline]
    fn from(value: u8) -> Self {
        IpProtocol(value)
    }
}

impl From<IpProtocol> for u8 {
    #[inline]
    fn from(value: IpProtocol) -> Self {
        value.0
    }
}

/// The length of the fixed IPv6 header.
pub const IPV6_HEADER_LEN: usize = 40;

const IPV6_VERSION: BitField = BitField::new("version", 0, Width::U32, 28, 4);
const IPV6_TRAFFIC_CLASS: BitField = BitField::new("traffic class", 0, Width::U32, 20, 8);
const IPV6_DSCP: BitField = BitField::new("dscp", 0, Width::U32, 22, 6);
const IPV6_ECN: BitField = BitField::new("ecn", 0, Width::U32, 20, 2);
const IPV6_FLOW_LABEL: BitField = BitField::new("flow label", 0, Width::U32, 0, 20);
const IPV6_PAYLOAD_LENGTH: BitField = BitField::word("payload length", 4, Width::U16);
const IPV6_NEXT_HEADER: BitField = BitField::word("next header", 6, Width::U8);
const IPV6_HOP_LIMIT: BitField = BitField::word("hop limit", 7, Width::U8);
const IPV6_SADDR: usize = 8;
const IPV6_DADDR: usize = 24;

/// An IPv6 header (see RFC 8200).
///
/// The header view always spans the 40 bytes of the fixed header; the packet view spans the fixed
/// header followed by the `payload_length` bytes it declares. Extension headers are dissected as
/// layers of their own (see [`ext`]).
///
/// All accessors operate directly on the capture buffer, so they fail only if the capture is
/// currently borrowed (for writes) or if a field value doesn't fit.
#[derive(Clone, Debug, Layer)]
pub struct Ipv6 {
    #[header_field]
    header: BufferView,
    #[packet_field]
    packet: BufferView,
}

impl Ipv6 {
    /// The IP version number. This is 6 for any well-formed IPv6 header, but is not checked
    /// unless dissection is strict.
    #[inline]
    pub fn version(&self) -> Result<u8, Error> {
        Ok(IPV6_VERSION.get(&self.header)? as u8)
    }

    /// Sets the version field. Values above 15 do not fit in its 4 bits.
    #[inline]
    pub fn set_version(&mut self, version: u8) -> Result<(), Error> {
        IPV6_VERSION.set(&self.header, version.into())
    }

    #[inline]
    pub fn traffic_class(&self) -> Result<u8, Error> {
        Ok(IPV6_TRAFFIC_CLASS.get(&self.header)? as u8)
    }

    #[inline]
    pub fn set_traffic_class(&mut self, traffic_class: u8) -> Result<(), Error> {
        IPV6_TRAFFIC_CLASS.set(&self.header, traffic_class.into())
    }

    /// The Differentiated Services Code Point: the upper 6 bits of the traffic class.
    #[inline]
    pub fn dscp(&self) -> Result<u8, Error> {
        Ok(IPV6_DSCP.get(&self.header)? as u8)
    }

    #[inline]
    pub fn set_dscp(&mut self, dscp: u8) -> Result<(), Error> {
        IPV6_DSCP.set(&self.header, dscp.into())
    }

    /// The Explicit Congestion Notification bits: the lower 2 bits of the traffic class.
    #[inline]
    pub fn ecn(&self) -> Result<u8, Error> {
        Ok(IPV6_ECN.get(&self.header)? as u8)
    }

    #[inline]
    pub fn set_ecn(&mut self, ecn: u8) -> Result<(), Error> {
        IPV6_ECN.set(&self.header, ecn.into())
    }

    #[inline]
    pub fn flow_label(&self) -> Result<u32, Error> {
        Ok(IPV6_FLOW_LABEL.get(&self.header)? as u32)
    }

    /// Sets the 20-bit flow label.
    #[inline]
    pub fn set_flow_label(&mut self, flow_label: u32) -> Result<(), Error> {
        IPV6_FLOW_LABEL.set(&self.header, flow_label.into())
    }

    /// The number of bytes following the fixed 40-byte header, extension headers included.
    #[inline]
    pub fn payload_length(&self) -> Result<u16, Error> {
        Ok(IPV6_PAYLOAD_LENGTH.get(&self.header)? as u16)
    }

    /// Writes the payload length field.
    ///
    /// Only the field is written; the extent of the layer is left as dissected. Use
    /// [`set_total_length()`](Self::set_total_length) to resize the layer along with it.
    #[inline]
    pub fn set_payload_length(&mut self, payload_length: u16) -> Result<(), Error> {
        IPV6_PAYLOAD_LENGTH.set(&self.header, payload_length.into())
    }

    #[inline]
    pub fn next_header(&self) -> Result<IpProtocol, Error> {
        Ok(IpProtocol(IPV6_NEXT_HEADER.get(&self.header)? as u8))
    }

    #[inline]
    pub fn set_next_header(&mut self, next_header: IpProtocol) -> Result<(), Error> {
        IPV6_NEXT_HEADER.set(&self.header, next_header.0.into())
    }

    #[inline]
    pub fn hop_limit(&self) -> Result<u8, Error> {
        Ok(IPV6_HOP_LIMIT.get(&self.header)? as u8)
    }

    #[inline]
    pub fn set_hop_limit(&mut self, hop_limit: u8) -> Result<(), Error> {
        IPV6_HOP_LIMIT.set(&self.header, hop_limit.into())
    }

    #[inline]
    pub fn saddr(&self) -> Result<Ipv6Addr, Error> {
        Ok(Ipv6Addr::from(self.header.read_array::<16>(IPV6_SADDR)?))
    }

    #[inline]
    pub fn set_saddr(&mut self, saddr: Ipv6Addr) -> Result<(), Error> {
        self.header.write_bytes(IPV6_SADDR, &saddr.octets())
    }

    #[inline]
    pub fn daddr(&self) -> Result<Ipv6Addr, Error> {
        Ok(Ipv6Addr::from(self.header.read_array::<16>(IPV6_DADDR)?))
    }

    #[inline]
    pub fn set_daddr(&mut self, daddr: Ipv6Addr) -> Result<(), Error> {
        self.header.write_bytes(IPV6_DADDR, &daddr.octets())
    }

    /// The header length in 32-bit words, as the IPv4 IHL field would express it.
    ///
    /// IPv6 has no such field; the fixed header is always 10 words long.
    #[inline]
    pub fn header_length(&self) -> u8 {
        (IPV6_HEADER_LEN / 4) as u8
    }

    /// Always fails with [`Error::UnsupportedOperation`], since the IPv6 header length is fixed.
    #[inline]
    pub fn set_header_length(&mut self, _header_length: u8) -> Result<(), Error> {
        Err(Error::UnsupportedOperation {
            layer: Self::name(),
            operation: "setting the header length",
        })
    }

    /// The length of the fixed header plus its payload, as the IPv4 Total Length field would
    /// express it.
    #[inline]
    pub fn total_length(&self) -> Result<usize, Error> {
        Ok(self.payload_length()? as usize + self.header_length() as usize * 4)
    }

    /// Sets the payload length field to `total_length` minus the fixed header length, and
    /// resizes the layer to `total_length` bytes.
    ///
    /// Fails with [`Error::FieldRange`] if `total_length` is shorter than the fixed header or if
    /// the resulting payload length doesn't fit in 16 bits, and with [`Error::OutOfBounds`] if the
    /// capture is too short to hold the resized layer. Nothing is modified on failure.
    ///
    /// Only this header is resized; [`PacketNode::set_total_length()`] also rebuilds the payload
    /// and trailer of the node holding it.
    ///
    /// [`PacketNode::set_total_length()`]: crate::node::PacketNode::set_total_length
    pub fn set_total_length(&mut self, total_length: usize) -> Result<(), Error> {
        let header_len = self.header_length() as usize * 4;
        let payload_len = total_length
            .checked_sub(header_len)
            .filter(|&len| len <= u16::MAX as usize)
            .ok_or(Error::FieldRange {
                field: "total length",
                value: total_length as u64,
                max: (header_len + u16::MAX as usize) as u64,
            })?;

        let mut packet = self.packet.clone();
        packet.resize(total_length)?;
        IPV6_PAYLOAD_LENGTH.set(&self.header, payload_len as u64)?;
        self.packet = packet;
        Ok(())
    }

    /// The bytes following the fixed header.
    #[inline]
    pub fn payload(&self) -> Result<BufferView, Error> {
        self.payload_view()
    }

    /// Builds the pseudo-header an upper-layer protocol carried in this packet prepends to its
    /// segment of `upper_len` bytes when computing its checksum.
    ///
    /// The next header field is used as the protocol; with extension headers present, the
    /// upper layer should build its pseudo-header from [`addresses()`](Header::addresses)
    /// instead.
    pub fn pseudo_header(&self, upper_len: usize) -> Result<PseudoHeader, Error> {
        let addresses = AddressPair::V6 {
            src: self.saddr()?,
            dst: self.daddr()?,
        };
        PseudoHeader::new(&addresses, self.next_header()?, upper_len)
    }
}

impl FromView for Ipv6 {
    fn from_view(remaining: BufferView, _ctx: &DissectContext) -> Result<Self, Error> {
        if remaining.len() < IPV6_HEADER_LEN {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InsufficientBytes,
                "insufficient bytes for 40-byte fixed header",
            )
            .into());
        }

        let header = remaining.slice(0, IPV6_HEADER_LEN)?;
        let payload_len = IPV6_PAYLOAD_LENGTH.get(&header)? as usize;
        // a payload length beyond the captured bytes is rejected rather than truncated
        let packet = remaining.slice(0, IPV6_HEADER_LEN + payload_len)?;

        Ok(Ipv6 { header, packet })
    }
}

impl Header for Ipv6 {
    #[inline]
    fn next_protocol(&self) -> Option<IpProtocol> {
        self.next_header().ok()
    }

    fn addresses(&self) -> Option<AddressPair> {
        Some(AddressPair::V6 {
            src: self.saddr().ok()?,
            dst: self.daddr().ok()?,
        })
    }

    fn validate(&self) -> Result<(), ValidationError> {
        match self.version() {
            Ok(6) => Ok(()),
            _ => Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InvalidValue,
                "version field was not equal to 6",
            )),
        }
    }
}
