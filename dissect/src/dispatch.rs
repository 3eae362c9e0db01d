// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Encapsulation dispatch: choosing the parser of each layer from the protocol number carried by
//! the layer before it.
//!
//! A [`Registry`] maps [`IpProtocol`] numbers to [`HeaderConstructor`]s, and a [`Dissector`]
//! walks a capture, constructing one header after another until a payload has no registered
//! parser, fails to parse, or isn't meant to be interpreted. Whatever is left over is kept as a
//! [`Raw`] layer, so dissection itself never fails.

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use tracing::{debug, trace};

use crate::buffer::BufferView;
use crate::error::Error;
use crate::layers::dev_traits::FromView;
use crate::layers::ip::{IpProtocol, Ipv6};
use crate::layers::traits::Header;
use crate::layers::Raw;
use crate::node::{Layer, Packet, PacketNode};
use crate::pseudo::AddressPair;

#[cfg(feature = "ipv6-ext")]
use crate::layers::ip::ext::{Ipv6Ext, Ipv6Fragment};
#[cfg(feature = "udp")]
use crate::layers::udp::Udp;

/// Constructs a header from the bytes remaining at its position in a packet.
///
/// See [`FromView`] for the contract a constructor must follow.
pub type HeaderConstructor = fn(BufferView, &DissectContext) -> Result<Box<dyn Header>, Error>;

/// The recursion limit of a [`Dissector`] unless configured otherwise.
pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Information about the enclosing layers of a header.
///
/// Headers hold no reference to their parent; whatever they need to know about it (such as the
/// addresses a checksum pseudo-header is built from) is passed down explicitly during dissection
/// and checksum maintenance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DissectContext {
    addresses: Option<AddressPair>,
}

impl DissectContext {
    /// A context for the outermost layer of a packet.
    #[inline]
    pub const fn new() -> Self {
        DissectContext { addresses: None }
    }

    #[inline]
    pub const fn with_addresses(addresses: AddressPair) -> Self {
        DissectContext {
            addresses: Some(addresses),
        }
    }

    /// The addresses of the innermost enclosing network layer.
    #[inline]
    pub fn addresses(&self) -> Option<AddressPair> {
        self.addresses
    }

    /// The context for the payload of `header`.
    #[inline]
    pub fn descend(&self, header: &dyn Header) -> Self {
        DissectContext {
            addresses: header.addresses().or(self.addresses),
        }
    }
}

/// A mapping from protocol numbers to header constructors.
///
/// This is the single extension point for new protocols: register a constructor under the
/// protocol number that announces it and any [`Dissector`] using the registry will pick it up.
#[derive(Clone, Default)]
pub struct Registry {
    constructors: HashMap<IpProtocol, HeaderConstructor>,
}

impl Registry {
    /// An empty registry, under which every layer is [`Raw`].
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every parser provided by this crate (subject to enabled features).
    pub fn with_defaults() -> Self {
        let mut registry = Registry::new();
        registry.register(IpProtocol::IPV6, Ipv6::from_view_boxed);

        #[cfg(feature = "ipv6-ext")]
        {
            registry.register(IpProtocol::HOPOPT, Ipv6Ext::hop_by_hop);
            registry.register(IpProtocol::IPV6_ROUTE, Ipv6Ext::routing);
            registry.register(IpProtocol::IPV6_OPTS, Ipv6Ext::destination_options);
            registry.register(IpProtocol::IPV6_FRAG, Ipv6Fragment::from_view_boxed);
        }

        #[cfg(feature = "udp")]
        registry.register(IpProtocol::UDP, Udp::from_view_boxed);

        registry
    }

    /// Registers `constructor` for `protocol`, returning the constructor it replaces.
    #[inline]
    pub fn register(
        &mut self,
        protocol: IpProtocol,
        constructor: HeaderConstructor,
    ) -> Option<HeaderConstructor> {
        self.constructors.insert(protocol, constructor)
    }

    /// Builder-style variant of [`register()`](Self::register).
    #[inline]
    pub fn with(mut self, protocol: IpProtocol, constructor: HeaderConstructor) -> Self {
        self.register(protocol, constructor);
        self
    }

    #[inline]
    pub fn unregister(&mut self, protocol: IpProtocol) -> Option<HeaderConstructor> {
        self.constructors.remove(&protocol)
    }

    #[inline]
    pub fn get(&self, protocol: IpProtocol) -> Option<HeaderConstructor> {
        self.constructors.get(&protocol).copied()
    }

    #[inline]
    pub fn contains(&self, protocol: IpProtocol) -> bool {
        self.constructors.contains_key(&protocol)
    }

    /// The registered protocol numbers, in ascending order.
    pub fn protocols(&self) -> Vec<IpProtocol> {
        let mut protocols: Vec<_> = self.constructors.keys().copied().collect();
        protocols.sort_unstable();
        protocols
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.protocols()).finish()
    }
}

static DEFAULT_REGISTRY: Lazy<Registry> = Lazy::new(Registry::with_defaults);

/// The process-wide registry built by [`Registry::with_defaults()`].
#[inline]
pub fn default_registry() -> &'static Registry {
    &DEFAULT_REGISTRY
}

/// Turns captured bytes into a tree of [`PacketNode`]s.
///
/// ```
/// use dissect::prelude::*;
///
/// let mut bytes = vec![0u8; 40];
/// bytes[0] = 0x60;
/// bytes[6] = 59; // no next header
/// bytes[7] = 64;
///
/// let packet = Dissector::new()
///     .strict(true)
///     .dissect_packet(bytes, 0, IpProtocol::IPV6, ())
///     .unwrap();
/// let ip = packet.get_layer::<Ipv6>().unwrap();
/// assert_eq!(ip.hop_limit().unwrap(), 64);
/// assert!(packet.root().payload().is_none());
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Dissector<'r> {
    registry: &'r Registry,
    max_depth: usize,
    strict: bool,
}

impl Dissector<'static> {
    /// A dissector using the [`default_registry()`].
    #[inline]
    pub fn new() -> Self {
        Dissector::with_registry(default_registry())
    }
}

impl Default for Dissector<'static> {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl<'r> Dissector<'r> {
    #[inline]
    pub fn with_registry(registry: &'r Registry) -> Self {
        Dissector {
            registry,
            max_depth: DEFAULT_MAX_DEPTH,
            strict: false,
        }
    }

    /// Limits the number of nested headers; anything past the limit is kept as [`Raw`].
    #[inline]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// When set, a header that fails [`Header::validate()`] is kept as [`Raw`] instead.
    #[inline]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[inline]
    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Interprets `remaining` as a layer of `protocol` and dissects its payload recursively.
    ///
    /// `ctx` describes the layers enclosing `remaining`. Any failure to interpret a layer turns
    /// that layer (and everything it would have contained) into a [`Raw`] node; the layers
    /// already dissected above it are unaffected.
    #[inline]
    pub fn dissect(
        &self,
        remaining: BufferView,
        protocol: IpProtocol,
        ctx: &DissectContext,
    ) -> PacketNode {
        self.dissect_layer(remaining, protocol, ctx, 0)
    }

    /// Takes ownership of a capture and dissects it starting `offset` bytes in.
    ///
    /// `timestamp` is attached to the packet as is; pass `()` when there is none.
    ///
    /// Fails with [`Error::OutOfBounds`] only if `offset` lies beyond the end of the capture.
    pub fn dissect_packet<Ts>(
        &self,
        bytes: impl Into<Box<[u8]>>,
        offset: usize,
        protocol: IpProtocol,
        timestamp: Ts,
    ) -> Result<Packet<Ts>, Error> {
        let capture = BufferView::new(bytes);
        let start = capture.slice_from(offset)?;
        let root = self.dissect(start, protocol, &DissectContext::new());
        Ok(Packet::from_parts(capture, root, timestamp))
    }

    fn dissect_layer(
        &self,
        remaining: BufferView,
        protocol: IpProtocol,
        ctx: &DissectContext,
        depth: usize,
    ) -> PacketNode {
        let Some(constructor) = self.registry.get(protocol) else {
            debug!(%protocol, len = remaining.len(), "no parser registered, keeping bytes as raw");
            return PacketNode::raw(remaining);
        };

        if depth >= self.max_depth {
            debug!(%protocol, depth, "maximum depth reached, keeping bytes as raw");
            return PacketNode::raw(remaining);
        }

        let header = match constructor(remaining.clone(), ctx) {
            Ok(header) => header,
            Err(e) => {
                debug!(%protocol, error = %e, "malformed header, keeping bytes as raw");
                return PacketNode::raw(remaining);
            }
        };

        if self.strict {
            if let Err(e) = header.validate() {
                debug!(%protocol, error = %e, "header failed validation, keeping bytes as raw");
                return PacketNode::raw(remaining);
            }
        }

        match self.dissect_contents(&*header, &remaining, ctx, depth) {
            Ok((child, trailer)) => PacketNode::from_parts(Layer::Header(header), child, trailer),
            Err(e) => {
                debug!(%protocol, error = %e, "header exceeds its own packet, keeping bytes as raw");
                PacketNode::raw(remaining)
            }
        }
    }

    /// Dissects the payload of `header` and splits off whatever part of `remaining` lies past the
    /// end of the header's packet.
    ///
    /// `depth` is the nesting level of `header` itself.
    pub(crate) fn dissect_contents(
        &self,
        header: &dyn Header,
        remaining: &BufferView,
        ctx: &DissectContext,
        depth: usize,
    ) -> Result<(Option<PacketNode>, Option<Raw>), Error> {
        let payload = header.payload_view()?;

        trace!(
            layer = header.layer_name(),
            offset = remaining.offset(),
            header_len = header.header_len(),
            payload_len = payload.len(),
            "dissected header"
        );

        let trailer = remaining
            .slice_from(header.packet_len())
            .ok()
            .filter(|trailer| !trailer.is_empty())
            .map(Raw::new);

        let child = if payload.is_empty() {
            None
        } else {
            Some(match header.next_protocol() {
                Some(next) => {
                    let inner = ctx.descend(header);
                    self.dissect_layer(payload, next, &inner, depth + 1)
                }
                None => PacketNode::raw(payload),
            })
        };

        Ok((child, trailer))
    }
}
