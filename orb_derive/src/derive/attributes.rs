use quote::ToTokens;
use syn::{spanned::Spanned, DeriveInput, Field, Result};

/// IDL name of the type: `#[idl(name = "...")]` or the Rust identifier.
pub fn get_type_name(input: &DeriveInput) -> Result<String> {
    let mut name = input.ident.to_string();
    if let Some(idl_attribute) = input.attrs.iter().find(|attr| attr.path().is_ident("idl")) {
        idl_attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                let name_str: syn::LitStr = meta.value()?.parse()?;
                name = name_str.value();
                Ok(())
            } else {
                Err(syn::Error::new(
                    meta.path.span(),
                    format!(
                        "Unexpected element {}. Valid option is \"name\".",
                        meta.path.into_token_stream()
                    ),
                ))
            }
        })?;
    }
    Ok(name)
}

pub fn field_is_recursive(field: &Field) -> Result<bool> {
    let mut recursive = false;
    if let Some(idl_attribute) = field.attrs.iter().find(|attr| attr.path().is_ident("idl")) {
        idl_attribute.parse_nested_meta(|meta| {
            if meta.path.is_ident("recursive") {
                recursive = true;
                Ok(())
            } else {
                Err(syn::Error::new(
                    meta.path.span(),
                    format!(
                        "Unexpected element {}. Valid option is \"recursive\".",
                        meta.path.into_token_stream()
                    ),
                ))
            }
        })?;
    }
    Ok(recursive)
}
