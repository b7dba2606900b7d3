use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod derive;

/// Derives `TypeSupport` and its payload mapping.
///
/// Structs with named fields become IDL structs, fieldless enums IDL enums.
/// The IDL name defaults to the Rust name and can be set with
/// `#[idl(name = "...")]`. A `Vec<Self>` field marked `#[idl(recursive)]` is
/// described as a sequence of the enclosing struct.
#[proc_macro_derive(TypeSupport, attributes(idl))]
pub fn derive_type_support(input: TokenStream) -> TokenStream {
    let input: DeriveInput = parse_macro_input!(input);
    derive::type_support::expand_type_support(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
