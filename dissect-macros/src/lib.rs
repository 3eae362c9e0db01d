// SPDX-License-Identifier: MIT OR Apache-2.0
//
// Copyright (c) 2024 Nathaniel Bennett <me[at]nathanielbennett[dotcom]>
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Derive macros for the `dissect` header traits.
//!
//! Every header type in `dissect` carries two views over the shared capture buffer: one spanning
//! just the header bytes and one spanning the header plus its payload. The plumbing that names a
//! header and hands out those two views is identical for every protocol, so it is generated here.
//!
//! ```ignore
//! #[derive(Clone, Debug, Layer)]
//! pub struct Udp {
//!     #[header_field]
//!     header: BufferView,
//!     #[packet_field]
//!     packet: BufferView,
//! }
//! ```
//!
//! The generated code refers to `crate::` paths, so the derive is only usable from within the
//! `dissect` crate itself. Out-of-tree protocols implement `LayerName` and `BaseLayer` by hand.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput};

/// Derives `LayerName` and `BaseLayer` for a header struct.
///
/// The struct must have exactly one field marked `#[header_field]` and exactly one field marked
/// `#[packet_field]`, both of type `BufferView`.
#[proc_macro_derive(Layer, attributes(header_field, packet_field))]
pub fn derive_layer(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    match expand_layer(&ast) {
        Ok(output) => output,
        Err(e) => e.to_compile_error().into(),
    }
}

fn expand_layer(ast: &DeriveInput) -> syn::Result<TokenStream> {
    let layer_type = &ast.ident;
    let layer_name = layer_type.to_string();
    let (impl_generics, ty_generics, where_clause) = ast.generics.split_for_impl();

    let header_field = marked_field(ast, "header_field")?;
    let packet_field = marked_field(ast, "packet_field")?;

    Ok(quote! {
        impl #impl_generics crate::layers::dev_traits::LayerName for #layer_type #ty_generics #where_clause {
            #[inline]
            fn name() -> &'static str {
                #layer_name
            }
        }

        impl #impl_generics crate::layers::dev_traits::BaseLayer for #layer_type #ty_generics #where_clause {
            #[inline]
            fn layer_name(&self) -> &'static str {
                #layer_name
            }

            #[inline]
            fn header_view(&self) -> &crate::buffer::BufferView {
                &self.#header_field
            }

            #[inline]
            fn packet_view(&self) -> &crate::buffer::BufferView {
                &self.#packet_field
            }
        }
    }
    .into())
}

/// Finds the single named field carrying the attribute `attr`.
fn marked_field(ast: &DeriveInput, attr: &str) -> syn::Result<syn::Ident> {
    let fields = match &ast.data {
        Data::Struct(data) => &data.fields,
        _ => {
            return Err(syn::Error::new_spanned(
                &ast.ident,
                "`Layer` can only be derived for structs",
            ))
        }
    };

    let mut marked = fields
        .iter()
        .filter(|f| f.attrs.iter().any(|a| a.path.is_ident(attr)));

    match (marked.next(), marked.next()) {
        (Some(field), None) => field.ident.clone().ok_or_else(|| {
            syn::Error::new_spanned(field, format!("`#[{}]` must be placed on a named field", attr))
        }),
        (Some(_), Some(duplicate)) => Err(syn::Error::new_spanned(
            duplicate,
            format!("only one field may be marked `#[{}]`", attr),
        )),
        (None, _) => Err(syn::Error::new_spanned(
            &ast.ident,
            format!("`Layer` requires a field marked `#[{}]`", attr),
        )),
    }
}
