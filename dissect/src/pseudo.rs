// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Checksum pseudo-headers.
//!
//! Transport protocols such as UDP and TCP protect their segment together with a few fields of
//! the enclosing IP header (RFC 768, RFC 8200 section 8.1). Those fields are assembled into a
//! pseudo-header that is summed ahead of the segment but never transmitted.

use std::net::{Ipv4Addr, Ipv6Addr};

use dissect_common::Buffer;

use crate::error::Error;
use crate::layers::ip::IpProtocol;
use crate::utils;

/// The length of the largest pseudo-header (IPv6).
pub const PSEUDO_HEADER_MAX_LEN: usize = 40;

/// The source and destination addresses of a network-layer header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressPair {
    V4 { src: Ipv4Addr, dst: Ipv4Addr },
    V6 { src: Ipv6Addr, dst: Ipv6Addr },
}

impl AddressPair {
    #[inline]
    pub fn pseudo_header(
        &self,
        protocol: IpProtocol,
        upper_len: usize,
    ) -> Result<PseudoHeader, Error> {
        PseudoHeader::new(self, protocol, upper_len)
    }
}

/// The pseudo-header prepended to an upper-layer segment for checksum computation.
///
/// For IPv4 this is `src(4) | dst(4) | 0 | protocol | length(u16)`; for IPv6 it is
/// `src(16) | dst(16) | length(u32) | 0 0 0 | next header`. All multi-byte values are in network
/// byte order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PseudoHeader {
    bytes: Buffer<u8, PSEUDO_HEADER_MAX_LEN>,
}

impl PseudoHeader {
    /// Assembles the pseudo-header for a segment of `upper_len` bytes carrying `protocol`.
    ///
    /// Fails with [`Error::FieldRange`] if `upper_len` doesn't fit the length field of the
    /// address family (16 bits for IPv4, 32 bits for IPv6).
    pub fn new(
        addresses: &AddressPair,
        protocol: IpProtocol,
        upper_len: usize,
    ) -> Result<Self, Error> {
        let mut bytes = Buffer::new();
        match addresses {
            AddressPair::V4 { src, dst } => {
                let len = u16::try_from(upper_len).map_err(|_| Error::FieldRange {
                    field: "pseudo-header length",
                    value: upper_len as u64,
                    max: u16::MAX.into(),
                })?;
                push(&mut bytes, &src.octets())?;
                push(&mut bytes, &dst.octets())?;
                push(&mut bytes, &[0, protocol.value()])?;
                push(&mut bytes, &len.to_be_bytes())?;
            }
            AddressPair::V6 { src, dst } => {
                let len = u32::try_from(upper_len).map_err(|_| Error::FieldRange {
                    field: "pseudo-header length",
                    value: upper_len as u64,
                    max: u32::MAX.into(),
                })?;
                push(&mut bytes, &src.octets())?;
                push(&mut bytes, &dst.octets())?;
                push(&mut bytes, &len.to_be_bytes())?;
                push(&mut bytes, &[0, 0, 0, protocol.value()])?;
            }
        }

        Ok(PseudoHeader { bytes })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.bytes.as_slice()
    }

    /// 12 for IPv4, 40 for IPv6.
    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// The exact byte sequence the checksum is computed over: the pseudo-header, then `segment`,
    /// then a single zero byte if the total length is odd.
    pub fn checksum_input(&self, segment: &[u8]) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.len() + segment.len() + 1);
        input.extend_from_slice(self.as_bytes());
        input.extend_from_slice(segment);
        if input.len() % 2 != 0 {
            input.push(0);
        }
        input
    }

    /// The Internet checksum of the pseudo-header followed by `segment`.
    ///
    /// The segment's own checksum field must be zeroed beforehand.
    pub fn checksum(&self, segment: &[u8]) -> u16 {
        !self.sum(segment)
    }

    /// Indicates whether `segment`, checksum field included, sums to the all-ones word.
    pub fn verify(&self, segment: &[u8]) -> bool {
        self.sum(segment) == 0xFFFF
    }

    // The pseudo-header is always of even length, so the two parts can be summed separately.
    fn sum(&self, segment: &[u8]) -> u16 {
        utils::ones_complement_add(
            utils::ones_complement_16bit(self.as_bytes()),
            utils::ones_complement_16bit(segment),
        )
    }
}

/// Appends `data` to a pseudo-header under construction.
fn push(bytes: &mut Buffer<u8, PSEUDO_HEADER_MAX_LEN>, data: &[u8]) -> Result<(), Error> {
    let offset = bytes.len();
    bytes.try_append(data).ok_or(Error::OutOfBounds {
        offset,
        len: data.len(),
        bound: bytes.capacity(),
    })
}
