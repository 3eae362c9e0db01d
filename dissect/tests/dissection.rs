// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! End-to-end dissection of IPv6 captures.

use std::net::Ipv6Addr;
use std::time::{Duration, SystemTime};

use dissect::prelude::*;

fn ipv6_header(payload_len: u16, next: IpProtocol, hop_limit: u8) -> Vec<u8> {
    let mut bytes = vec![0u8; 40];
    bytes[0] = 0x60;
    bytes[4..6].copy_from_slice(&payload_len.to_be_bytes());
    bytes[6] = next.value();
    bytes[7] = hop_limit;
    bytes[8..24].copy_from_slice(&"2001:db8::1".parse::<Ipv6Addr>().unwrap().octets());
    bytes[24..40].copy_from_slice(&"2001:db8::2".parse::<Ipv6Addr>().unwrap().octets());
    bytes
}

fn udp_datagram(payload: &[u8]) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&5353u16.to_be_bytes());
    bytes.extend_from_slice(&5353u16.to_be_bytes());
    bytes.extend_from_slice(&(8 + payload.len() as u16).to_be_bytes());
    bytes.extend_from_slice(&[0, 0]);
    bytes.extend_from_slice(payload);
    bytes
}

#[test]
fn zeroed_header_with_short_payload() {
    let mut bytes = vec![0u8; 56];
    bytes[4..6].copy_from_slice(&[0x00, 0x08]);
    bytes[6] = 0x11;
    bytes[7] = 64;

    let packet = Dissector::new()
        .dissect_packet(bytes, 0, IpProtocol::IPV6, ())
        .unwrap();
    let root = packet.root();

    let ip = packet.get_layer::<Ipv6>().unwrap();
    assert_eq!(ip.version().unwrap(), 0);
    assert_eq!(ip.traffic_class().unwrap(), 0);
    assert_eq!(ip.flow_label().unwrap(), 0);
    assert_eq!(ip.payload_length().unwrap(), 8);
    assert_eq!(ip.next_header().unwrap(), IpProtocol::UDP);
    assert_eq!(ip.hop_limit().unwrap(), 64);

    // the all-zero datagram declares length 0, so UDP rejects it
    let payload = root.payload().unwrap();
    assert!(payload.is_opaque());
    assert_eq!(payload.len(), 8);
    assert_eq!(payload.to_bytes(), vec![0u8; 8]);
    assert!(payload.payload().is_none());

    assert_eq!(root.trailer().unwrap().len(), 8);
    assert_eq!(root.depth(), 2);
}

#[test]
fn unknown_next_header_leaves_remainder_untouched() {
    let mut bytes = ipv6_header(5, IpProtocol(0xFD), 1);
    bytes.extend_from_slice(b"hello");
    let packet = Packet::new(bytes, IpProtocol::IPV6);

    let leaf = packet.root().payload().unwrap();
    assert!(leaf.is_opaque());
    assert_eq!(&*leaf.as_raw().unwrap().data(), b"hello");
    assert_eq!(leaf.as_raw().unwrap().view().offset(), 40);
}

#[test]
fn unknown_root_protocol_is_raw() {
    let packet = Packet::new(vec![1, 2, 3], IpProtocol::TCP);
    assert!(packet.root().is_opaque());
    assert_eq!(packet.root().to_bytes(), vec![1, 2, 3]);
}

#[test]
fn truncated_input_never_errors() {
    for len in 0..40 {
        let bytes = ipv6_header(0, IpProtocol::IPV6_NONXT, 64);
        let packet = Packet::new(bytes[..len].to_vec(), IpProtocol::IPV6);
        assert!(packet.root().is_opaque(), "{} bytes", len);
        assert_eq!(packet.root().len(), len);
    }
}

#[test]
fn payload_length_beyond_capture_is_raw() {
    let mut bytes = ipv6_header(100, IpProtocol::UDP, 64);
    bytes.extend_from_slice(&udp_datagram(b"x"));
    let packet = Packet::new(bytes, IpProtocol::IPV6);
    assert!(packet.root().is_opaque());
    assert_eq!(packet.root().len(), 49);
}

#[test]
fn malformed_inner_layer_keeps_outer_layers() {
    let mut udp = udp_datagram(b"abcd");
    udp[4..6].copy_from_slice(&200u16.to_be_bytes());
    let mut bytes = ipv6_header(udp.len() as u16, IpProtocol::UDP, 64);
    bytes.extend_from_slice(&udp);

    let packet = Packet::new(bytes, IpProtocol::IPV6);
    assert!(packet.get_layer::<Ipv6>().is_some());
    let inner = packet.root().payload().unwrap();
    assert!(inner.is_opaque());
    assert_eq!(inner.len(), 12);
}

#[test]
fn starting_offset_skips_link_header() {
    let mut bytes = vec![0xEE; 14];
    bytes.extend_from_slice(&ipv6_header(0, IpProtocol::IPV6_NONXT, 9));
    let when = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

    let packet = Dissector::new()
        .dissect_packet(bytes, 14, IpProtocol::IPV6, when)
        .unwrap();
    assert_eq!(*packet.timestamp(), when);
    assert_eq!(packet.capture().len(), 54);
    let ip = packet.get_layer::<Ipv6>().unwrap();
    assert_eq!(ip.hop_limit().unwrap(), 9);
    assert_eq!(ip.header_view().offset(), 14);
}

#[cfg(feature = "udp")]
#[test]
fn udp_checksum_round_trip() {
    let udp = udp_datagram(b"payload");
    let mut bytes = ipv6_header(udp.len() as u16, IpProtocol::UDP, 64);
    bytes.extend_from_slice(&udp);

    let mut packet = Packet::new(bytes, IpProtocol::IPV6);
    assert_eq!(packet.root().depth(), 3);
    assert!(!packet.checksums_valid().unwrap());

    packet.update_checksums().unwrap();
    assert!(packet.checksums_valid().unwrap());

    let datagram = packet.get_layer::<Udp>().unwrap();
    let checksum = datagram.checksum().unwrap();
    let ip = packet.get_layer::<Ipv6>().unwrap();
    let pseudo = ip.pseudo_header(datagram.packet_len()).unwrap();
    assert!(pseudo.verify(&datagram.packet_view().to_vec()));

    let bytes = packet.into_bytes();
    assert_eq!(&bytes[46..48], &checksum.to_be_bytes());
}

#[cfg(feature = "udp")]
#[test]
fn edits_through_inner_layer_change_capture() {
    let udp = udp_datagram(b"");
    let mut bytes = ipv6_header(udp.len() as u16, IpProtocol::UDP, 64);
    bytes.extend_from_slice(&udp);

    let mut packet = Packet::new(bytes, IpProtocol::IPV6);
    packet.get_layer_mut::<Udp>().unwrap().set_dport(53).unwrap();

    let ip = packet.get_layer::<Ipv6>().unwrap();
    assert_eq!(ip.payload().unwrap().read_u16(2).unwrap(), 53);
}

#[test]
fn resizing_root_rebuilds_tree() {
    let mut bytes = ipv6_header(4, IpProtocol(0xFD), 64);
    bytes.extend_from_slice(&[1, 2, 3, 4]);
    bytes.extend_from_slice(&[9, 9, 9, 9]);
    let mut packet = Packet::new(bytes, IpProtocol::IPV6);

    packet
        .root_mut()
        .set_total_length(48, &Dissector::new(), &DissectContext::new())
        .unwrap();

    let root = packet.root();
    let payload = root.payload().unwrap();
    assert_eq!(root.len(), 48);
    assert_eq!(root.len(), payload.len() + 40);
    assert_eq!(
        payload.len(),
        packet.get_layer::<Ipv6>().unwrap().payload_length().unwrap() as usize
    );
    let root_end = root.layer().view().offset() + root.len();
    assert!(root.trailer().map_or(true, |t| t.view().offset() >= root_end));
    assert_eq!(packet.into_bytes()[4..6], [0, 8]);
}

#[cfg(all(feature = "ipv6-ext", feature = "udp"))]
#[test]
fn extension_header_chain() {
    let udp = udp_datagram(b"hi");
    let mut ext = vec![IpProtocol::UDP.value(), 0, 0, 0, 0, 0, 0, 0];
    ext.extend_from_slice(&udp);
    let mut hop_by_hop = vec![IpProtocol::IPV6_OPTS.value(), 0, 1, 4, 0, 0, 0, 0];
    hop_by_hop.extend_from_slice(&ext);

    let mut bytes = ipv6_header(hop_by_hop.len() as u16, IpProtocol::HOPOPT, 64);
    bytes.extend_from_slice(&hop_by_hop);

    let mut packet = Packet::new(bytes, IpProtocol::IPV6);
    let names: Vec<_> = packet.root().layers().map(|n| n.layer().name()).collect();
    assert_eq!(names, vec!["Ipv6", "Ipv6Ext", "Ipv6Ext", "Udp", "Raw"]);
    assert_eq!(
        packet.get_nth_layer::<Ipv6Ext>(2).unwrap().kind(),
        IpProtocol::IPV6_OPTS
    );

    // UDP checksums use the addresses of the IPv6 header, not the extension headers
    packet.update_checksums().unwrap();
    assert!(packet.checksums_valid().unwrap());
}

#[cfg(feature = "ipv6-ext")]
#[test]
fn non_initial_fragment_is_not_dissected() {
    let udp = udp_datagram(b"frag");
    let mut fragment = vec![IpProtocol::UDP.value(), 0];
    fragment.extend_from_slice(&(16u16 << 3).to_be_bytes());
    fragment.extend_from_slice(&7u32.to_be_bytes());
    fragment.extend_from_slice(&udp);

    let mut bytes = ipv6_header(fragment.len() as u16, IpProtocol::IPV6_FRAG, 64);
    bytes.extend_from_slice(&fragment);

    let packet = Packet::new(bytes, IpProtocol::IPV6);
    let frag = packet.get_layer::<Ipv6Fragment>().unwrap();
    assert_eq!(frag.fragment_offset().unwrap(), 16);
    assert_eq!(frag.identification().unwrap(), 7);
    assert!(packet.get_layer::<Udp>().is_none());
    assert!(packet.root().innermost().is_opaque());
    assert_eq!(packet.root().innermost().len(), udp.len());
}

#[test]
fn registry_extension_point() {
    fn always_udp(remaining: BufferView, ctx: &DissectContext) -> Result<Box<dyn Header>, Error> {
        Udp::from_view_boxed(remaining, ctx)
    }

    let registry = Registry::new().with(IpProtocol::EXP1, always_udp);
    let dissector = Dissector::with_registry(&registry);
    let node = dissector.dissect(
        BufferView::new(udp_datagram(b"x")),
        IpProtocol::EXP1,
        &DissectContext::new(),
    );

    assert_eq!(node.layer().name(), "Udp");
    assert_eq!(node.get_layer::<Udp>().unwrap().sport().unwrap(), 5353);
}
