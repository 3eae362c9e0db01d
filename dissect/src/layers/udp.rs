// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The User Datagram Protocol (UDP) layer.

use dissect_macros::Layer;

use crate::buffer::{BufferView, Width};
use crate::dispatch::DissectContext;
use crate::error::*;
use crate::field::BitField;
use crate::layers::dev_traits::*;
use crate::layers::ip::IpProtocol;
use crate::layers::traits::*;
use crate::pseudo::{AddressPair, PseudoHeader};

/// The length of a UDP header.
pub const UDP_HEADER_LEN: usize = 8;

const UDP_SPORT: BitField = BitField::word("source port", 0, Width::U16);
const UDP_DPORT: BitField = BitField::word("destination port", 2, Width::U16);
const UDP_LENGTH: BitField = BitField::word("length", 4, Width::U16);
const UDP_CHECKSUM: BitField = BitField::word("checksum", 6, Width::U16);
const UDP_CHECKSUM_OFFSET: usize = 6;

/// A UDP datagram (see RFC 768).
///
/// The packet view spans the `length` bytes declared by the header. UDP payloads are never
/// dissected further, since port numbers don't reliably identify the application protocol.
///
/// The checksum covers a pseudo-header built from the addresses of the enclosing IP layer, which
/// the datagram learns through the [`DissectContext`] it is verified or updated with.
#[derive(Clone, Debug, Layer)]
pub struct Udp {
    #[header_field]
    header: BufferView,
    #[packet_field]
    packet: BufferView,
}

impl Udp {
    #[inline]
    pub fn sport(&self) -> Result<u16, Error> {
        Ok(UDP_SPORT.get(&self.header)? as u16)
    }

    #[inline]
    pub fn set_sport(&mut self, sport: u16) -> Result<(), Error> {
        UDP_SPORT.set(&self.header, sport.into())
    }

    #[inline]
    pub fn dport(&self) -> Result<u16, Error> {
        Ok(UDP_DPORT.get(&self.header)? as u16)
    }

    #[inline]
    pub fn set_dport(&mut self, dport: u16) -> Result<(), Error> {
        UDP_DPORT.set(&self.header, dport.into())
    }

    /// The length of the header plus payload.
    #[inline]
    pub fn length(&self) -> Result<u16, Error> {
        Ok(UDP_LENGTH.get(&self.header)? as u16)
    }

    /// Writes the length field without resizing the layer.
    #[inline]
    pub fn set_length(&mut self, length: u16) -> Result<(), Error> {
        UDP_LENGTH.set(&self.header, length.into())
    }

    #[inline]
    pub fn checksum(&self) -> Result<u16, Error> {
        Ok(UDP_CHECKSUM.get(&self.header)? as u16)
    }

    #[inline]
    pub fn set_checksum(&mut self, checksum: u16) -> Result<(), Error> {
        UDP_CHECKSUM.set(&self.header, checksum.into())
    }

    #[inline]
    pub fn payload(&self) -> Result<BufferView, Error> {
        self.payload_view()
    }

    /// The checksum the datagram should carry when sent between `addresses`.
    ///
    /// A computed checksum of zero is returned as `0xFFFF`, since a zero checksum field means
    /// "no checksum" (RFC 768, RFC 8200 section 8.1).
    pub fn compute_checksum(&self, addresses: &AddressPair) -> Result<u16, Error> {
        let pseudo = PseudoHeader::new(addresses, IpProtocol::UDP, self.packet.len())?;
        let mut segment = self.packet.to_vec();
        segment[UDP_CHECKSUM_OFFSET..UDP_CHECKSUM_OFFSET + 2].fill(0);

        Ok(match pseudo.checksum(&segment) {
            0 => 0xFFFF,
            checksum => checksum,
        })
    }
}

impl FromView for Udp {
    fn from_view(remaining: BufferView, _ctx: &DissectContext) -> Result<Self, Error> {
        if remaining.len() < UDP_HEADER_LEN {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InsufficientBytes,
                "insufficient bytes in UDP header (8 bytes required)",
            )
            .into());
        }

        let header = remaining.slice(0, UDP_HEADER_LEN)?;
        let length = UDP_LENGTH.get(&header)? as usize;
        if length < UDP_HEADER_LEN {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InvalidSize,
                "length field smaller than the UDP header",
            )
            .into());
        }

        if length > remaining.len() {
            return Err(ValidationError::new(
                Self::name(),
                ValidationErrorClass::InsufficientBytes,
                "insufficient bytes for payload length advertised by UDP header",
            )
            .into());
        }

        Ok(Udp {
            header,
            packet: remaining.slice(0, length)?,
        })
    }
}

impl Header for Udp {
    #[inline]
    fn next_protocol(&self) -> Option<IpProtocol> {
        None
    }

    fn update_checksum(&mut self, ctx: &DissectContext) -> Result<bool, Error> {
        let Some(addresses) = ctx.addresses() else {
            return Ok(false);
        };

        let checksum = self.compute_checksum(&addresses)?;
        self.set_checksum(checksum)?;
        Ok(true)
    }

    fn checksum_valid(&self, ctx: &DissectContext) -> Result<Option<bool>, Error> {
        let Some(addresses) = ctx.addresses() else {
            return Ok(None);
        };

        if self.checksum()? == 0 {
            // optional over IPv4, mandatory over IPv6
            return Ok(match addresses {
                AddressPair::V4 { .. } => None,
                AddressPair::V6 { .. } => Some(false),
            });
        }

        let pseudo = PseudoHeader::new(&addresses, IpProtocol::UDP, self.packet.len())?;
        Ok(Some(pseudo.verify(&self.packet.to_vec())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn datagram(payload: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1234u16.to_be_bytes());
        bytes.extend_from_slice(&53u16.to_be_bytes());
        bytes.extend_from_slice(&((UDP_HEADER_LEN + payload.len()) as u16).to_be_bytes());
        bytes.extend_from_slice(&[0, 0]);
        bytes.extend_from_slice(payload);
        bytes
    }

    fn v6_context() -> DissectContext {
        DissectContext::with_addresses(AddressPair::V6 {
            src: "fe80::1".parse().unwrap(),
            dst: "fe80::2".parse().unwrap(),
        })
    }

    fn parse(bytes: Vec<u8>) -> Udp {
        Udp::from_view(BufferView::new(bytes), &DissectContext::new()).unwrap()
    }

    #[test]
    fn reads_fields() {
        let udp = parse(datagram(b"abc"));
        assert_eq!(udp.sport().unwrap(), 1234);
        assert_eq!(udp.dport().unwrap(), 53);
        assert_eq!(udp.length().unwrap(), 11);
        assert_eq!(udp.payload().unwrap().to_vec(), b"abc".to_vec());
        assert_eq!(udp.next_protocol(), None);
    }

    #[test]
    fn length_bounds_the_layer() {
        let mut bytes = datagram(b"abc");
        bytes.extend_from_slice(&[0, 0]);
        let udp = parse(bytes);
        assert_eq!(udp.packet_len(), 11);

        let mut bytes = datagram(b"abc");
        bytes[4..6].copy_from_slice(&7u16.to_be_bytes());
        assert!(Udp::from_view(BufferView::new(bytes), &DissectContext::new()).is_err());

        let mut bytes = datagram(b"abc");
        bytes[4..6].copy_from_slice(&12u16.to_be_bytes());
        assert!(Udp::from_view(BufferView::new(bytes), &DissectContext::new()).is_err());
    }

    #[test]
    fn checksum_update_then_verify() {
        let mut udp = parse(datagram(b"odd"));
        let ctx = v6_context();
        assert_eq!(udp.checksum_valid(&ctx).unwrap(), Some(false));

        assert!(udp.update_checksum(&ctx).unwrap());
        assert_ne!(udp.checksum().unwrap(), 0);
        assert_eq!(udp.checksum_valid(&ctx).unwrap(), Some(true));

        udp.set_dport(54).unwrap();
        assert_eq!(udp.checksum_valid(&ctx).unwrap(), Some(false));
    }

    #[test]
    fn zero_checksum_over_ipv4_is_absent() {
        let udp = parse(datagram(b""));
        let ctx = DissectContext::with_addresses(AddressPair::V4 {
            src: Ipv4Addr::new(10, 0, 0, 1),
            dst: Ipv4Addr::new(10, 0, 0, 2),
        });
        assert_eq!(udp.checksum_valid(&ctx).unwrap(), None);
    }

    #[test]
    fn no_addresses_no_checksum() {
        let mut udp = parse(datagram(b"x"));
        assert!(!udp.update_checksum(&DissectContext::new()).unwrap());
        assert_eq!(udp.checksum_valid(&DissectContext::new()).unwrap(), None);
        assert_eq!(udp.checksum().unwrap(), 0);
    }

    #[test]
    fn computed_checksum_matches_manual_sum() {
        let udp = parse(datagram(&[0xAB]));
        let addresses = AddressPair::V6 {
            src: Ipv6Addr::LOCALHOST,
            dst: Ipv6Addr::LOCALHOST,
        };
        let pseudo = PseudoHeader::new(&addresses, IpProtocol::UDP, 9).unwrap();
        let input = pseudo.checksum_input(&udp.packet_view().to_vec());
        assert_eq!(input.len(), 40 + 9 + 1);

        let expected = !crate::utils::ones_complement_16bit(&input);
        assert_eq!(udp.compute_checksum(&addresses).unwrap(), expected);
    }
}
