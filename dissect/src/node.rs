// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! The tree of layers produced by dissection.
//!
//! A [`PacketNode`] owns one layer (a dissected [`Header`] or an opaque [`Raw`] run of bytes) and
//! at most one child node holding its payload. Nodes never refer back to their parent; operations
//! that need information about enclosing layers take a [`DissectContext`] instead.

use crate::buffer::BufferView;
use crate::dispatch::{DissectContext, Dissector};
use crate::error::Error;
use crate::layers::ip::{IpProtocol, Ipv6};
use crate::layers::traits::Header;
use crate::layers::Raw;

/// The layer held by a [`PacketNode`].
#[derive(Debug)]
pub enum Layer {
    Header(Box<dyn Header>),
    Raw(Raw),
}

impl Layer {
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Header(header) => header.layer_name(),
            Layer::Raw(_) => Raw::NAME,
        }
    }

    /// The bytes covered by the layer, payload included.
    #[inline]
    pub fn view(&self) -> &BufferView {
        match self {
            Layer::Header(header) => header.packet_view(),
            Layer::Raw(raw) => raw.view(),
        }
    }
}

/// A layer of a dissected packet, along with its payload.
#[derive(Debug)]
pub struct PacketNode {
    layer: Layer,
    payload: Option<Box<PacketNode>>,
    trailer: Option<Raw>,
}

impl PacketNode {
    /// An opaque leaf spanning `view`.
    #[inline]
    pub fn raw(view: BufferView) -> Self {
        PacketNode {
            layer: Layer::Raw(Raw::new(view)),
            payload: None,
            trailer: None,
        }
    }

    pub(crate) fn from_parts(
        layer: Layer,
        payload: Option<PacketNode>,
        trailer: Option<Raw>,
    ) -> Self {
        PacketNode {
            layer,
            payload: payload.map(Box::new),
            trailer,
        }
    }

    #[inline]
    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    #[inline]
    pub fn layer_mut(&mut self) -> &mut Layer {
        &mut self.layer
    }

    #[inline]
    pub fn header(&self) -> Option<&dyn Header> {
        match &self.layer {
            Layer::Header(header) => Some(&**header),
            Layer::Raw(_) => None,
        }
    }

    #[inline]
    pub fn header_mut(&mut self) -> Option<&mut dyn Header> {
        match &mut self.layer {
            Layer::Header(header) => Some(&mut **header),
            Layer::Raw(_) => None,
        }
    }

    /// The bytes of the node if it is an opaque leaf.
    #[inline]
    pub fn as_raw(&self) -> Option<&Raw> {
        match &self.layer {
            Layer::Raw(raw) => Some(raw),
            Layer::Header(_) => None,
        }
    }

    #[inline]
    pub fn is_opaque(&self) -> bool {
        matches!(self.layer, Layer::Raw(_))
    }

    /// The node holding this layer's payload, or `None` if the payload is empty.
    #[inline]
    pub fn payload(&self) -> Option<&PacketNode> {
        self.payload.as_deref()
    }

    #[inline]
    pub fn payload_mut(&mut self) -> Option<&mut PacketNode> {
        self.payload.as_deref_mut()
    }

    /// Bytes that followed the layer's declared extent within the bytes it was dissected from.
    #[inline]
    pub fn trailer(&self) -> Option<&Raw> {
        self.trailer.as_ref()
    }

    /// The number of bytes covered by the layer and its payload (trailer excluded).
    #[inline]
    pub fn len(&self) -> usize {
        self.layer.view().len()
    }

    /// A copy of the bytes covered by the layer and its payload (trailer excluded).
    #[inline]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.layer.view().to_vec()
    }

    /// Iterates over this node and each of its nested payload nodes, outermost first.
    #[inline]
    pub fn layers(&self) -> Layers<'_> {
        Layers { next: Some(self) }
    }

    /// The number of nodes in the chain starting at this one.
    #[inline]
    pub fn depth(&self) -> usize {
        self.layers().count()
    }

    /// The most deeply nested node.
    pub fn innermost(&self) -> &PacketNode {
        let mut node = self;
        while let Some(payload) = node.payload() {
            node = payload;
        }
        node
    }

    /// The first header of type `T` within this node or its payloads.
    #[inline]
    pub fn get_layer<T: Header>(&self) -> Option<&T> {
        self.get_nth_layer(1)
    }

    /// The `n`th header of type `T` (starting from 1) within this node or its payloads.
    pub fn get_nth_layer<T: Header>(&self, n: usize) -> Option<&T> {
        let skip = n.checked_sub(1)?;
        self.layers()
            .filter_map(|node| node.header()?.as_any().downcast_ref::<T>())
            .nth(skip)
    }

    #[inline]
    pub fn get_layer_mut<T: Header>(&mut self) -> Option<&mut T> {
        self.get_nth_layer_mut(1)
    }

    pub fn get_nth_layer_mut<T: Header>(&mut self, n: usize) -> Option<&mut T> {
        if n == 0 {
            return None;
        }

        let is_match = self.header().map_or(false, |h| h.as_any().is::<T>());
        if is_match && n == 1 {
            return self.header_mut()?.as_any_mut().downcast_mut::<T>();
        }

        let n = if is_match { n - 1 } else { n };
        self.payload_mut()?.get_nth_layer_mut(n)
    }

    /// Sets the total length of the [`Ipv6`] header held by this node and re-dissects its payload
    /// and trailer from the resized layer.
    ///
    /// The layer may grow into its trailer but no further. `dissector` rebuilds the payload, with
    /// depth counted from this node, and `ctx` describes the layers enclosing this node.
    ///
    /// Fails with [`Error::UnsupportedOperation`] if the node doesn't hold an IPv6 header, with
    /// [`Error::OutOfBounds`] if `total_length` exceeds the layer and its trailer, and otherwise
    /// as [`Ipv6::set_total_length()`] does. Nothing is modified on failure.
    pub fn set_total_length(
        &mut self,
        total_length: usize,
        dissector: &Dissector<'_>,
        ctx: &DissectContext,
    ) -> Result<(), Error> {
        let name = self.layer.name();
        let view = self.layer.view();
        let mut extent = view.clone();
        extent.resize(view.len() + self.trailer.as_ref().map_or(0, Raw::len))?;
        if total_length > extent.len() {
            return Err(Error::OutOfBounds {
                offset: 0,
                len: total_length,
                bound: extent.len(),
            });
        }

        let Some(ip) = self
            .header_mut()
            .and_then(|header| header.as_any_mut().downcast_mut::<Ipv6>())
        else {
            return Err(Error::UnsupportedOperation {
                layer: name,
                operation: "setting total length",
            });
        };
        ip.set_total_length(total_length)?;

        let Layer::Header(header) = &self.layer else {
            return Ok(());
        };
        let (payload, trailer) = dissector.dissect_contents(&**header, &extent, ctx, 0)?;
        self.payload = payload.map(Box::new);
        self.trailer = trailer;
        Ok(())
    }

    /// Recomputes the checksum of every header in the chain, innermost first.
    ///
    /// `ctx` describes the layers enclosing this node. Inner layers are updated first so that
    /// a checksum covering an encapsulated checksum sees its final value.
    pub fn update_checksums(&mut self, ctx: &DissectContext) -> Result<(), Error> {
        let inner = match self.header() {
            Some(header) => ctx.descend(header),
            None => *ctx,
        };

        if let Some(payload) = self.payload_mut() {
            payload.update_checksums(&inner)?;
        }

        if let Some(header) = self.header_mut() {
            header.update_checksum(ctx)?;
        }
        Ok(())
    }

    /// Indicates whether no header in the chain carries an incorrect checksum.
    ///
    /// Headers whose checksum is absent or can't be verified are not counted as incorrect.
    pub fn checksums_valid(&self, ctx: &DissectContext) -> Result<bool, Error> {
        let mut ctx = *ctx;
        for node in self.layers() {
            if let Some(header) = node.header() {
                if header.checksum_valid(&ctx)? == Some(false) {
                    return Ok(false);
                }
                ctx = ctx.descend(header);
            }
        }
        Ok(true)
    }
}

/// An iterator over a chain of [`PacketNode`]s.
///
/// Returned by [`PacketNode::layers()`].
#[derive(Clone, Debug)]
pub struct Layers<'a> {
    next: Option<&'a PacketNode>,
}

impl<'a> Iterator for Layers<'a> {
    type Item = &'a PacketNode;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.payload();
        Some(node)
    }
}

/// A dissected capture.
///
/// Owns the capture buffer (through the views of its layers), the root of the dissected tree
/// and the capture timestamp. The timestamp is of whatever type the capture source provides and
/// is carried along without interpretation; `()` stands for no timestamp.
#[derive(Debug)]
pub struct Packet<Ts = ()> {
    capture: BufferView,
    root: PacketNode,
    timestamp: Ts,
}

impl Packet {
    /// Dissects `bytes` as a packet of `protocol` using the default [`Dissector`].
    pub fn new(bytes: impl Into<Box<[u8]>>, protocol: IpProtocol) -> Self {
        let capture = BufferView::new(bytes);
        let root = Dissector::new().dissect(capture.clone(), protocol, &DissectContext::new());
        Packet::from_parts(capture, root, ())
    }
}

impl<Ts> Packet<Ts> {
    pub(crate) fn from_parts(capture: BufferView, root: PacketNode, timestamp: Ts) -> Self {
        Packet {
            capture,
            root,
            timestamp,
        }
    }

    /// Replaces the capture timestamp, whatever its type.
    #[inline]
    pub fn with_timestamp<U>(self, timestamp: U) -> Packet<U> {
        Packet {
            capture: self.capture,
            root: self.root,
            timestamp,
        }
    }

    #[inline]
    pub fn timestamp(&self) -> &Ts {
        &self.timestamp
    }

    #[inline]
    pub fn root(&self) -> &PacketNode {
        &self.root
    }

    #[inline]
    pub fn root_mut(&mut self) -> &mut PacketNode {
        &mut self.root
    }

    /// The whole capture, including any bytes before the dissection offset.
    #[inline]
    pub fn capture(&self) -> &BufferView {
        &self.capture
    }

    #[inline]
    pub fn get_layer<T: Header>(&self) -> Option<&T> {
        self.root.get_layer()
    }

    #[inline]
    pub fn get_layer_mut<T: Header>(&mut self) -> Option<&mut T> {
        self.root.get_layer_mut()
    }

    #[inline]
    pub fn get_nth_layer<T: Header>(&self, n: usize) -> Option<&T> {
        self.root.get_nth_layer(n)
    }

    #[inline]
    pub fn get_nth_layer_mut<T: Header>(&mut self, n: usize) -> Option<&mut T> {
        self.root.get_nth_layer_mut(n)
    }

    #[inline]
    pub fn update_checksums(&mut self) -> Result<(), Error> {
        self.root.update_checksums(&DissectContext::new())
    }

    #[inline]
    pub fn checksums_valid(&self) -> Result<bool, Error> {
        self.root.checksums_valid(&DissectContext::new())
    }

    /// Consumes the packet, returning the capture buffer with every edit applied.
    pub fn into_bytes(self) -> Box<[u8]> {
        let Packet { capture, root, .. } = self;
        drop(root);
        capture.into_storage()
    }
}
