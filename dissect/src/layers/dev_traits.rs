// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Traits that are only needed for developing new header types.
//!
//! A new protocol participates in dissection by implementing [`BaseLayer`] (usually through
//! `#[derive(Layer)]` when inside this crate), [`Header`], and by registering a
//! [`HeaderConstructor`](crate::dispatch::HeaderConstructor) with a
//! [`Registry`](crate::dispatch::Registry). [`FromView`] provides that constructor for free.

use core::any;

use crate::buffer::BufferView;
use crate::dispatch::DissectContext;
use crate::error::Error;
use crate::layers::traits::Header;

#[cfg(test)]
use crate::layers::ip::IpProtocol;

/// Allows the name of a protocol layer to be retrieved as a string.
///
/// This trait's single associated function is effectively an object-unsafe variant of the
/// [`BaseLayer::layer_name()`] method.
pub trait LayerName {
    /// The name of the layer, usually (though not guaranteed to be) the same as the name of the
    /// struct.
    fn name() -> &'static str;
}

/// An object-safe base trait giving access to the views a header is made of.
///
/// Every header holds two views onto the capture: one covering only its own bytes and one
/// covering its bytes followed by its payload. The payload handed to the next layer is whatever
/// follows the header inside the packet view.
pub trait BaseLayer {
    /// The name of the layer, usually (though not guaranteed to be) the same as the name of the
    /// struct.
    fn layer_name(&self) -> &'static str;

    /// The bytes of the header itself.
    fn header_view(&self) -> &BufferView;

    /// The bytes of the header followed by its payload.
    fn packet_view(&self) -> &BufferView;
}

/// An extension to [`any::Any`]; adds methods for retrieving a `dyn Any` reference
/// or mutable reference.
pub trait AsAny: any::Any {
    /// Return a `dyn Any` reference to `self`.
    fn as_any(&self) -> &dyn any::Any;

    /// Return a mutable `dyn Any` reference to `self`.
    fn as_any_mut(&mut self) -> &mut dyn any::Any;
}

/// Blanket implementation of [`AsAny`] for all types capable of returning a `dyn Any` reference.
impl<T: any::Any> AsAny for T {
    #[inline]
    fn as_any(&self) -> &dyn any::Any {
        self
    }

    #[inline]
    fn as_any_mut(&mut self) -> &mut dyn any::Any {
        self
    }
}

/// Constructs a header from the bytes remaining at its position in a packet.
///
/// Implementors carve their own header (and packet) view out of the front of `remaining` and
/// must not read or write past it. A constructor that fails causes the dispatcher to keep
/// `remaining` as an opaque [`Raw`](crate::layers::Raw) layer, so it should fail rather than
/// guess whenever the bytes don't form a well-sized header.
pub trait FromView: Header + Sized {
    fn from_view(remaining: BufferView, ctx: &DissectContext) -> Result<Self, Error>;

    /// Same as [`from_view()`](Self::from_view), but boxed so that it can be registered as a
    /// [`HeaderConstructor`](crate::dispatch::HeaderConstructor).
    #[inline]
    fn from_view_boxed(
        remaining: BufferView,
        ctx: &DissectContext,
    ) -> Result<Box<dyn Header>, Error> {
        Ok(Box::new(Self::from_view(remaining, ctx)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A hand-written header, as an out-of-tree protocol would define one.
    #[derive(Debug)]
    struct Tag {
        header: BufferView,
        packet: BufferView,
    }

    impl LayerName for Tag {
        fn name() -> &'static str {
            "Tag"
        }
    }

    impl BaseLayer for Tag {
        fn layer_name(&self) -> &'static str {
            Self::name()
        }

        fn header_view(&self) -> &BufferView {
            &self.header
        }

        fn packet_view(&self) -> &BufferView {
            &self.packet
        }
    }

    impl Header for Tag {
        fn next_protocol(&self) -> Option<IpProtocol> {
            self.header.read_u8(0).ok().map(IpProtocol::from)
        }
    }

    impl FromView for Tag {
        fn from_view(remaining: BufferView, _ctx: &DissectContext) -> Result<Self, Error> {
            Ok(Tag {
                header: remaining.slice(0, 2)?,
                packet: remaining,
            })
        }
    }

    #[test]
    fn boxed_constructor_downcasts() {
        let view = BufferView::new(vec![17, 0, 0xAA, 0xBB]);
        let header = Tag::from_view_boxed(view, &DissectContext::new()).unwrap();

        assert_eq!(header.layer_name(), "Tag");
        assert_eq!(header.header_len(), 2);
        assert_eq!(header.packet_len(), 4);
        assert_eq!(header.payload_view().unwrap().to_vec(), vec![0xAA, 0xBB]);
        assert_eq!(header.next_protocol(), Some(IpProtocol::UDP));
        assert!(header.as_ref().as_any().downcast_ref::<Tag>().is_some());
    }

    #[test]
    fn short_input_is_rejected() {
        let view = BufferView::new(vec![17]);
        assert!(matches!(
            Tag::from_view(view, &DissectContext::new()),
            Err(Error::OutOfBounds { .. })
        ));
    }
}
