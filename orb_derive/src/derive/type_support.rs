use crate::derive::attributes::{field_is_recursive, get_type_name};
use proc_macro2::{Span, TokenStream, TokenTree};
use quote::{format_ident, quote, ToTokens};
use syn::{
    spanned::Spanned, DataEnum, DataStruct, DeriveInput, Fields, GenericArgument, Ident,
    PathArguments, Result, Type,
};

pub fn expand_type_support(input: &DeriveInput) -> Result<TokenStream> {
    let type_name = get_type_name(input)?;
    match &input.data {
        syn::Data::Struct(data_struct) => expand_struct(input, data_struct, &type_name),
        syn::Data::Enum(data_enum) => expand_enum(input, data_enum, &type_name),
        syn::Data::Union(data_union) => Err(syn::Error::new(
            data_union.union_token.span,
            "Union not supported",
        )),
    }
}

// `Vec<Self>` or `Vec<Ident>` with the deriving type's identifier
fn is_sequence_of_self(ty: &Type, ident: &Ident) -> bool {
    let Type::Path(type_path) = ty else {
        return false;
    };
    let Some(segment) = type_path.path.segments.last() else {
        return false;
    };
    if segment.ident != "Vec" {
        return false;
    }
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return false;
    };
    match arguments.args.first() {
        Some(GenericArgument::Type(Type::Path(element))) => {
            element.path.is_ident("Self") || element.path.is_ident(ident)
        }
        _ => false,
    }
}

// Whether the deriving type appears anywhere inside `tokens`
fn mentions_self(tokens: TokenStream, ident: &Ident) -> bool {
    tokens.into_iter().any(|token| match token {
        TokenTree::Ident(i) => i == "Self" || i == *ident,
        TokenTree::Group(group) => mentions_self(group.stream(), ident),
        _ => false,
    })
}

fn expand_struct(
    input: &DeriveInput,
    data_struct: &DataStruct,
    type_name: &str,
) -> Result<TokenStream> {
    let Fields::Named(named_fields) = &data_struct.fields else {
        return Err(syn::Error::new(
            data_struct.fields.span(),
            "TypeSupport can only be derived for structs with named fields",
        ));
    };
    let ident = &input.ident;
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();
    let field_count = named_fields.named.len();

    let mut member_descriptors = quote! {};
    let mut into_fields = quote! {};
    let mut storage_bindings = Vec::new();
    let mut from_fields = quote! {};

    for (field_index, field) in named_fields.named.iter().enumerate() {
        let field_ident = field
            .ident
            .as_ref()
            .ok_or_else(|| syn::Error::new(field.span(), "Field must be named"))?;
        let field_name = field_ident.to_string();
        let field_type = &field.ty;

        let member_type = if field_is_recursive(field)? {
            if !is_sequence_of_self(field_type, ident) {
                return Err(syn::Error::new(
                    field_type.span(),
                    "A recursive field must be of type Vec<Self>",
                ));
            }
            quote! {
                dust_orb::xtypes::type_descriptor::TypeDescriptor::sequence(
                    dust_orb::xtypes::type_descriptor::TypeDescriptor::recursive(#type_name),
                    None,
                )
            }
        } else if mentions_self(field_type.to_token_stream(), ident) {
            return Err(syn::Error::new(
                field_type.span(),
                "A field holding the type itself must be a Vec<Self> marked #[idl(recursive)]",
            ));
        } else {
            quote! {
                <#field_type as dust_orb::xtypes::type_support::TypeSupport>::type_descriptor()
            }
        };
        member_descriptors.extend(quote! { (#field_name, #member_type), });

        into_fields.extend(quote! {
            dust_orb::xtypes::data_storage::DataStorageMapping::into_storage(self.#field_ident),
        });

        let binding = format_ident!("__field{}", field_index);
        from_fields.extend(quote! {
            #field_ident: dust_orb::xtypes::data_storage::DataStorageMapping::try_from_storage(#binding)?,
        });
        storage_bindings.push(binding);
    }

    Ok(quote! {
        impl #impl_generics dust_orb::xtypes::type_support::TypeSupport for #ident #type_generics #where_clause {
            fn type_descriptor() -> dust_orb::xtypes::type_descriptor::TypeDescriptor {
                dust_orb::xtypes::type_descriptor::TypeDescriptor::structure(
                    #type_name,
                    [#member_descriptors],
                )
                .expect("Derived struct descriptor is always valid")
            }
        }

        impl #impl_generics dust_orb::xtypes::data_storage::DataStorageMapping for #ident #type_generics #where_clause {
            fn into_storage(self) -> dust_orb::xtypes::data_storage::DataStorage {
                dust_orb::xtypes::data_storage::DataStorage::Struct(vec![#into_fields])
            }

            fn try_from_storage(
                data_storage: dust_orb::xtypes::data_storage::DataStorage,
            ) -> dust_orb::error::OrbResult<Self> {
                match data_storage {
                    dust_orb::xtypes::data_storage::DataStorage::Struct(fields) => {
                        let found = fields.len();
                        let [#(#storage_bindings),*]: [dust_orb::xtypes::data_storage::DataStorage; #field_count] =
                            fields.try_into().map_err(|_| dust_orb::error::OrbError::TypeMismatch {
                                expected: format!("{} with {} members", #type_name, #field_count),
                                found: format!("struct with {} members", found),
                            })?;
                        Ok(Self { #from_fields })
                    }
                    other => Err(dust_orb::error::OrbError::TypeMismatch {
                        expected: String::from(#type_name),
                        found: String::from(other.kind_name()),
                    }),
                }
            }
        }
    })
}

fn expand_enum(input: &DeriveInput, data_enum: &DataEnum, type_name: &str) -> Result<TokenStream> {
    let ident = &input.ident;
    let (impl_generics, type_generics, where_clause) = input.generics.split_for_impl();
    if data_enum.variants.is_empty() {
        return Err(syn::Error::new(
            ident.span(),
            "TypeSupport cannot be derived for an enum without variants",
        ));
    }

    let mut enumerators = quote! {};
    let mut into_arms = quote! {};
    let mut from_arms = quote! {};
    for (ordinal, variant) in data_enum.variants.iter().enumerate() {
        if !matches!(variant.fields, Fields::Unit) {
            return Err(syn::Error::new(
                variant.fields.span(),
                "TypeSupport can only be derived for enums without fields",
            ));
        }
        let variant_ident = &variant.ident;
        let variant_name = variant_ident.to_string();
        let ordinal = u32::try_from(ordinal)
            .map_err(|_| syn::Error::new(Span::call_site(), "Too many enumerators"))?;
        enumerators.extend(quote! { #variant_name, });
        into_arms.extend(quote! { #ident::#variant_ident => #ordinal, });
        from_arms.extend(quote! { #ordinal => Ok(#ident::#variant_ident), });
    }

    Ok(quote! {
        impl #impl_generics dust_orb::xtypes::type_support::TypeSupport for #ident #type_generics #where_clause {
            fn type_descriptor() -> dust_orb::xtypes::type_descriptor::TypeDescriptor {
                dust_orb::xtypes::type_descriptor::TypeDescriptor::enumeration(
                    #type_name,
                    [#enumerators],
                )
                .expect("Derived enum descriptor is always valid")
            }
        }

        impl #impl_generics dust_orb::xtypes::data_storage::DataStorageMapping for #ident #type_generics #where_clause {
            fn into_storage(self) -> dust_orb::xtypes::data_storage::DataStorage {
                dust_orb::xtypes::data_storage::DataStorage::Enum(match self {
                    #into_arms
                })
            }

            fn try_from_storage(
                data_storage: dust_orb::xtypes::data_storage::DataStorage,
            ) -> dust_orb::error::OrbResult<Self> {
                match data_storage {
                    dust_orb::xtypes::data_storage::DataStorage::Enum(ordinal) => match ordinal {
                        #from_arms
                        _ => Err(dust_orb::error::OrbError::InvalidData(format!(
                            "{} has no enumerator {}",
                            #type_name, ordinal
                        ))),
                    },
                    other => Err(dust_orb::error::OrbError::TypeMismatch {
                        expected: String::from(#type_name),
                        found: String::from(other.kind_name()),
                    }),
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand(source: &str) -> Result<TokenStream> {
        let input = syn::parse2::<DeriveInput>(source.parse().unwrap()).unwrap();
        expand_type_support(&input)
    }

    #[test]
    fn recursive_field_expands() {
        assert!(expand(
            "
            struct Node {
                value: i32,
                #[idl(recursive)]
                children: Vec<Node>,
            }
            "
        )
        .is_ok());
    }

    #[test]
    fn unmarked_self_field_is_rejected() {
        let error = expand(
            "
            struct Node {
                value: i32,
                children: Vec<Self>,
            }
            ",
        )
        .unwrap_err();
        assert!(error.to_string().contains("#[idl(recursive)]"));

        assert!(expand(
            "
            struct Node {
                next: Option<Box<Node>>,
            }
            "
        )
        .is_err());
    }
}
