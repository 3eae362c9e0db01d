// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

pub use crate::buffer::{BufferView, Endianness, Width};
pub use crate::dispatch::{default_registry, DissectContext, Dissector, HeaderConstructor, Registry};
pub use crate::error::{Error, ValidationError, ValidationErrorClass};
pub use crate::field::BitField;
pub use crate::layers::dev_traits::{AsAny, BaseLayer, FromView, LayerName};
pub use crate::layers::ip::ext::{FragmentFlags, Ipv6Ext, Ipv6Fragment};
pub use crate::layers::ip::{IpProtocol, Ipv6};
pub use crate::layers::traits::Header;
pub use crate::layers::udp::Udp;
pub use crate::layers::Raw;
pub use crate::node::{Layer, Layers, Packet, PacketNode};
pub use crate::pseudo::{AddressPair, PseudoHeader};
