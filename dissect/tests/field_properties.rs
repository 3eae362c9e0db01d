// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Property tests for IPv6 field accessors, checksum padding and dissection of arbitrary input.
//!
//! 1. Every field reads back what was written to it, whatever its bit-packed siblings hold
//! 2. Writing one of version, traffic class or flow label never disturbs the other two
//! 3. Total length and payload length stay exact inverses of each other
//! 4. Dissection of arbitrary bytes never fails and never loses bytes

use std::net::Ipv6Addr;

use dissect::prelude::*;
use proptest::{
    collection::vec,
    prelude::{any, ProptestConfig, TestCaseError},
    prop_assert, prop_assert_eq, proptest,
};

fn parse(bytes: Vec<u8>) -> Ipv6 {
    let node = Dissector::new().dissect(
        BufferView::new(bytes),
        IpProtocol::IPV6,
        &DissectContext::new(),
    );
    match node.layer() {
        Layer::Header(header) => (**header)
            .as_any()
            .downcast_ref::<Ipv6>()
            .cloned()
            .expect("root layer is not IPv6"),
        Layer::Raw(_) => panic!("IPv6 header was not dissected"),
    }
}

/// Sets each field in turn and checks that all fields hold their expected values afterwards.
#[test]
fn fields_round_trip_in_any_combination() {
    proptest!(
        ProptestConfig::with_cases(2_000),
        |(initial in vec(any::<u8>(), 40),
          version in 0u8..16,
          traffic_class: u8,
          flow_label in 0u32..(1 << 20),
          payload_length: u16,
          next_header: u8,
          hop_limit: u8,
          saddr: [u8; 16],
          daddr: [u8; 16],
          order: [u8; 3])| {
            test_impl(
                initial,
                (version, traffic_class, flow_label),
                (payload_length, next_header, hop_limit),
                (saddr, daddr),
                order,
            )?;
        }
    );

    fn test_impl(
        mut initial: Vec<u8>,
        (version, traffic_class, flow_label): (u8, u8, u32),
        (payload_length, next_header, hop_limit): (u16, u8, u8),
        (saddr, daddr): ([u8; 16], [u8; 16]),
        order: [u8; 3],
    ) -> Result<(), TestCaseError> {
        // payload length 0 so that any header parses
        initial[4] = 0;
        initial[5] = 0;
        let mut ip = parse(initial);

        ip.set_payload_length(payload_length).unwrap();
        ip.set_next_header(IpProtocol(next_header)).unwrap();
        ip.set_hop_limit(hop_limit).unwrap();
        ip.set_saddr(Ipv6Addr::from(saddr)).unwrap();
        ip.set_daddr(Ipv6Addr::from(daddr)).unwrap();

        // the three fields sharing the first word, written in a generated order
        let mut writes = [(order[0], 0u8), (order[1], 1), (order[2], 2)];
        writes.sort();
        for (_, field) in writes {
            match field {
                0 => ip.set_version(version).unwrap(),
                1 => ip.set_traffic_class(traffic_class).unwrap(),
                _ => ip.set_flow_label(flow_label).unwrap(),
            }
        }

        prop_assert_eq!(ip.version().unwrap(), version);
        prop_assert_eq!(ip.traffic_class().unwrap(), traffic_class);
        prop_assert_eq!(ip.flow_label().unwrap(), flow_label);
        prop_assert_eq!(ip.payload_length().unwrap(), payload_length);
        prop_assert_eq!(ip.next_header().unwrap(), IpProtocol(next_header));
        prop_assert_eq!(ip.hop_limit().unwrap(), hop_limit);
        prop_assert_eq!(ip.saddr().unwrap().octets(), saddr);
        prop_assert_eq!(ip.daddr().unwrap().octets(), daddr);

        let word = ip.header_view().read_u32(0).unwrap();
        prop_assert_eq!(
            word,
            (version as u32) << 28 | (traffic_class as u32) << 20 | flow_label
        );
        Ok(())
    }
}

/// For every ordered pair of fields in the first word, setting one leaves the other untouched.
#[test]
fn shared_word_siblings_are_independent() {
    proptest!(
        ProptestConfig::with_cases(2_000),
        |(initial in vec(any::<u8>(), 40), value: u32, target in 0usize..3)| {
            test_impl(initial, value, target)?;
        }
    );

    fn get(ip: &Ipv6, field: usize) -> u32 {
        match field {
            0 => ip.version().unwrap() as u32,
            1 => ip.traffic_class().unwrap() as u32,
            _ => ip.flow_label().unwrap(),
        }
    }

    fn test_impl(mut initial: Vec<u8>, value: u32, target: usize) -> Result<(), TestCaseError> {
        initial[4] = 0;
        initial[5] = 0;
        let mut ip = parse(initial);
        let before: Vec<u32> = (0..3).map(|f| get(&ip, f)).collect();

        match target {
            0 => ip.set_version((value & 0xF) as u8).unwrap(),
            1 => ip.set_traffic_class(value as u8).unwrap(),
            _ => ip.set_flow_label(value & 0xF_FFFF).unwrap(),
        }

        for other in (0..3).filter(|&f| f != target) {
            prop_assert_eq!(get(&ip, other), before[other]);
        }

        // writing back what was read is a no-op
        let bytes = ip.header_view().to_vec();
        ip.set_traffic_class(ip.traffic_class().unwrap()).unwrap();
        ip.set_flow_label(ip.flow_label().unwrap()).unwrap();
        ip.set_version(ip.version().unwrap()).unwrap();
        prop_assert_eq!(ip.header_view().to_vec(), bytes);
        Ok(())
    }
}

/// Setting the total length to `v` gives a payload length of `v - 40`, and back.
#[test]
fn total_length_inverts_payload_length() {
    proptest!(
        ProptestConfig::with_cases(256),
        |(total in 40usize..=(40 + u16::MAX as usize))| {
            test_impl(total)?;
        }
    );

    fn test_impl(total: usize) -> Result<(), TestCaseError> {
        let mut bytes = vec![0u8; 40 + u16::MAX as usize];
        bytes[0] = 0x60;
        let mut ip = parse(bytes);

        ip.set_total_length(total).unwrap();
        prop_assert_eq!(ip.payload_length().unwrap() as usize, total - 40);
        prop_assert_eq!(ip.total_length().unwrap(), total);
        prop_assert_eq!(
            ip.total_length().unwrap(),
            ip.payload_length().unwrap() as usize + ip.header_length() as usize * 4
        );
        prop_assert_eq!(ip.packet_len(), total);
        Ok(())
    }
}

/// The checksum input is the pseudo-header, the segment, and at most one pad byte.
#[test]
fn checksum_input_padding() {
    proptest!(
        |(src: [u8; 16], dst: [u8; 16], next: u8, segment in vec(any::<u8>(), 0..64))| {
            test_impl(src, dst, next, segment)?;
        }
    );

    fn test_impl(
        src: [u8; 16],
        dst: [u8; 16],
        next: u8,
        segment: Vec<u8>,
    ) -> Result<(), TestCaseError> {
        let mut bytes = vec![0x60, 0, 0, 0, 0, 0, next, 64];
        bytes.extend_from_slice(&src);
        bytes.extend_from_slice(&dst);
        let ip = parse(bytes);

        let pseudo = ip.pseudo_header(segment.len()).unwrap();
        let input = pseudo.checksum_input(&segment);

        prop_assert_eq!(&input[..16], &src[..]);
        prop_assert_eq!(&input[16..32], &dst[..]);
        prop_assert_eq!(&input[32..36], &(segment.len() as u32).to_be_bytes()[..]);
        prop_assert_eq!(&input[36..40], &[0, 0, 0, next][..]);
        prop_assert_eq!(&input[40..40 + segment.len()], &segment[..]);

        if segment.len() % 2 == 1 {
            prop_assert_eq!(input.len(), 40 + segment.len() + 1);
            prop_assert_eq!(input[input.len() - 1], 0);
        } else {
            prop_assert_eq!(input.len(), 40 + segment.len());
        }
        Ok(())
    }
}

/// Arbitrary input dissects without panicking, and the tree covers every byte exactly once.
#[test]
fn arbitrary_bytes_dissect_without_loss() {
    proptest!(
        ProptestConfig::with_cases(5_000),
        |(data in vec(any::<u8>(), 0..200), root: u8)| {
            test_impl(data, root)?;
        }
    );

    fn test_impl(data: Vec<u8>, root: u8) -> Result<(), TestCaseError> {
        let len = data.len();
        let node = Dissector::new().dissect(
            BufferView::new(data),
            IpProtocol(root),
            &DissectContext::new(),
        );

        prop_assert_eq!(node.len() + node.trailer().map_or(0, |t| t.len()), len);

        for layer in node.layers() {
            let covered = match (layer.header(), layer.payload()) {
                (Some(header), Some(payload)) => {
                    header.header_len()
                        + payload.len()
                        + payload.trailer().map_or(0, |t| t.len())
                }
                (Some(header), None) => header.header_len(),
                (None, _) => layer.len(),
            };
            prop_assert_eq!(covered, layer.len());
            prop_assert!(layer.depth() <= 33);
        }
        Ok(())
    }
}
