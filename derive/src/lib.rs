extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, parse_quote, Attribute, Data, DataEnum, DeriveInput, Fields, Ident, Index, LitStr, Member,
    Type,
};

/// Container attributes parsed from `#[msgpack(...)]` on the struct or enum itself.
///
/// * `map` - Encode a struct with named fields as a string-keyed map
/// * `as_string` - Encode a unit-only enum as the variant name
#[derive(Debug, Default)]
struct ContainerAttributes {
    map: bool,
    as_string: bool,
}

/// Field attributes parsed from `#[msgpack(...)]` annotations.
///
/// * `rename` - Key used in map layout (and the name of a variant for `as_string`)
/// * `skip` - Not written; decoded as `Default::default()`
/// * `default` - Decoded as `Default::default()` when missing instead of failing
#[derive(Debug, Default, Clone)]
struct FieldAttributes {
    rename: Option<String>,
    skip: bool,
    default: bool,
}

/// Runs `on_item` for every comma-separated entry of every `#[msgpack(...)]` attribute.
fn parse_msgpack_attrs(
    attrs: &[Attribute],
    mut on_item: impl FnMut(&Ident, syn::parse::ParseStream) -> syn::Result<()>,
) -> syn::Result<()> {
    for attr in attrs {
        if !attr.path().is_ident("msgpack") {
            continue;
        }
        attr.parse_args_with(|input: syn::parse::ParseStream| {
            while !input.is_empty() {
                let ident = input.parse::<Ident>()?;
                on_item(&ident, input)?;
                if input.peek(syn::Token![,]) {
                    input.parse::<syn::Token![,]>()?;
                } else {
                    break;
                }
            }
            Ok(())
        })?;
    }
    Ok(())
}

fn get_container_attributes(attrs: &[Attribute]) -> syn::Result<ContainerAttributes> {
    let mut parsed = ContainerAttributes::default();
    parse_msgpack_attrs(attrs, |ident, _| {
        if ident == "map" {
            parsed.map = true;
        } else if ident == "as_string" {
            parsed.as_string = true;
        } else {
            return Err(syn::Error::new(
                ident.span(),
                format!("Unknown container attribute: {}", ident),
            ));
        }
        Ok(())
    })?;
    Ok(parsed)
}

fn get_field_attributes(attrs: &[Attribute]) -> syn::Result<FieldAttributes> {
    let mut parsed = FieldAttributes::default();
    parse_msgpack_attrs(attrs, |ident, input| {
        if ident == "rename" {
            input.parse::<syn::Token![=]>()?;
            parsed.rename = Some(input.parse::<LitStr>()?.value());
        } else if ident == "skip" {
            parsed.skip = true;
        } else if ident == "default" {
            parsed.default = true;
        } else {
            return Err(syn::Error::new(
                ident.span(),
                format!("Unknown field attribute: {}", ident),
            ));
        }
        Ok(())
    })?;
    Ok(parsed)
}

/// Check if a type is `Option<T>`. Missing `Option` fields decode as `None`.
fn is_option_type(ty: &Type) -> bool {
    if let Type::Path(type_path) = ty {
        type_path
            .path
            .segments
            .last()
            .map_or(false, |seg| seg.ident == "Option")
    } else {
        false
    }
}

/// One field of a struct or variant.
struct FieldInfo {
    member: Member,
    ty: Type,
    /// Map key.
    key: String,
    attrs: FieldAttributes,
    is_option: bool,
}

impl FieldInfo {
    fn optional(&self) -> bool {
        self.attrs.default || self.is_option
    }
}

fn collect_fields(fields: &Fields) -> syn::Result<Vec<FieldInfo>> {
    let mut infos = Vec::new();
    for (i, f) in fields.iter().enumerate() {
        let attrs = get_field_attributes(&f.attrs)?;
        let (member, name) = match &f.ident {
            Some(ident) => (Member::Named(ident.clone()), ident.to_string()),
            None => (Member::Unnamed(Index::from(i)), i.to_string()),
        };
        infos.push(FieldInfo {
            member,
            ty: f.ty.clone(),
            key: attrs.rename.clone().unwrap_or(name),
            is_option: is_option_type(&f.ty),
            attrs,
        });
    }
    Ok(infos)
}

/// Writes the non-skipped fields as an array. `access` yields a reference to each field.
fn serialize_array(fields: &[FieldInfo], access: impl Fn(usize, &FieldInfo) -> TokenStream2) -> TokenStream2 {
    let written: Vec<_> = fields.iter().enumerate().filter(|(_, f)| !f.attrs.skip).collect();
    let count = written.len();
    let writes = written.iter().map(|(i, f)| {
        let ty = &f.ty;
        let value = access(*i, f);
        quote! {
            resolver.serialize_value::<#ty>(writer, #value)?;
        }
    });
    quote! {
        writer.write_array_header(#count)?;
        #(#writes)*
    }
}

fn serialize_map(fields: &[FieldInfo]) -> TokenStream2 {
    let written: Vec<_> = fields.iter().filter(|f| !f.attrs.skip).collect();
    let count = written.len();
    let writes = written.iter().map(|f| {
        let ty = &f.ty;
        let member = &f.member;
        let key = &f.key;
        quote! {
            writer.write_str(#key)?;
            resolver.serialize_value::<#ty>(writer, &value.#member)?;
        }
    });
    quote! {
        writer.write_map_header(#count)?;
        #(#writes)*
    }
}

fn slot_ident(i: usize) -> Ident {
    format_ident!("__v{}", i)
}

/// Field initialisers for the value under construction, from the `__vN` slots.
fn construct_fields(fields: &[FieldInfo], type_name: &str) -> Vec<TokenStream2> {
    fields
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let member = &f.member;
            if f.attrs.skip {
                return quote! { #member: ::core::default::Default::default() };
            }
            let slot = slot_ident(i);
            if f.optional() {
                quote! { #member: #slot.unwrap_or_default() }
            } else {
                let key = &f.key;
                quote! {
                    #member: match #slot {
                        ::core::option::Option::Some(v) => v,
                        ::core::option::Option::None => {
                            return ::core::result::Result::Err(::packwire::MessagePackError::MissingField {
                                field: #key,
                                type_name: #type_name,
                            })
                        }
                    }
                }
            }
        })
        .collect()
}

/// Reads the array written by [`serialize_array`] into `__vN` slots.
///
/// With `strict` the array must hold exactly the written fields. Otherwise missing trailing
/// elements leave their slot empty and extra trailing elements are skipped.
fn deserialize_array(fields: &[FieldInfo], type_name: &str, strict: bool) -> TokenStream2 {
    let written: Vec<_> = fields.iter().enumerate().filter(|(_, f)| !f.attrs.skip).collect();
    let count = written.len();
    let check = if strict {
        quote! {
            if __count != #count {
                return ::core::result::Result::Err(::packwire::MessagePackError::CountMismatch {
                    type_name: #type_name,
                    expected: #count,
                    actual: __count,
                });
            }
        }
    } else {
        quote! {}
    };
    let slots = written.iter().map(|(i, f)| {
        let slot = slot_ident(*i);
        let ty = &f.ty;
        quote! {
            let mut #slot: ::core::option::Option<#ty> = ::core::option::Option::None;
        }
    });
    let reads = written.iter().enumerate().map(|(position, (i, f))| {
        let slot = slot_ident(*i);
        let ty = &f.ty;
        quote! {
            if __count > #position {
                #slot = ::core::option::Option::Some(resolver.deserialize_value::<#ty>(reader)?);
            }
        }
    });
    quote! {
        let __count = reader.read_array_header()? as usize;
        #check
        #(#slots)*
        reader.nested(|reader| {
            #(#reads)*
            for _ in #count..__count {
                reader.skip()?;
            }
            ::core::result::Result::Ok(())
        })?;
    }
}

fn deserialize_map(fields: &[FieldInfo]) -> TokenStream2 {
    let written: Vec<_> = fields.iter().enumerate().filter(|(_, f)| !f.attrs.skip).collect();
    let slots = written.iter().map(|(i, f)| {
        let slot = slot_ident(*i);
        let ty = &f.ty;
        quote! {
            let mut #slot: ::core::option::Option<#ty> = ::core::option::Option::None;
        }
    });
    let arms = written.iter().map(|(i, f)| {
        let slot = slot_ident(*i);
        let ty = &f.ty;
        let key = &f.key;
        quote! {
            #key => {
                #slot = ::core::option::Option::Some(resolver.deserialize_value::<#ty>(reader)?);
            }
        }
    });
    quote! {
        let __count = reader.read_map_header()? as usize;
        #(#slots)*
        reader.nested(|reader| {
            for _ in 0..__count {
                let __key = reader.read_str()?;
                match &*__key {
                    #(#arms)*
                    _ => {
                        reader.skip()?;
                    }
                }
            }
            ::core::result::Result::Ok(())
        })?;
    }
}

/// Serialize and deserialize bodies for a struct.
fn struct_bodies(
    name: &Ident,
    fields: &Fields,
    container: &ContainerAttributes,
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let type_name = name.to_string();
    if container.as_string {
        return Err(syn::Error::new(
            name.span(),
            "#[msgpack(as_string)] is only supported on unit-only enums",
        ));
    }
    if let Fields::Unit = fields {
        if container.map {
            return Err(syn::Error::new(name.span(), "#[msgpack(map)] requires named fields"));
        }
        return Ok((
            quote! {
                writer.write_nil();
                ::core::result::Result::Ok(())
            },
            quote! {
                reader.read_nil()?;
                ::core::result::Result::Ok(#name)
            },
        ));
    }

    let infos = collect_fields(fields)?;
    let construct = construct_fields(&infos, &type_name);
    if container.map {
        if let Fields::Unnamed(_) = fields {
            return Err(syn::Error::new(name.span(), "#[msgpack(map)] requires named fields"));
        }
        let write = serialize_map(&infos);
        let read = deserialize_map(&infos);
        return Ok((
            quote! {
                #write
                ::core::result::Result::Ok(())
            },
            quote! {
                #read
                ::core::result::Result::Ok(#name { #(#construct),* })
            },
        ));
    }

    let write = serialize_array(&infos, |_, f| {
        let member = &f.member;
        quote! { &value.#member }
    });
    let read = deserialize_array(&infos, &type_name, false);
    Ok((
        quote! {
            #write
            ::core::result::Result::Ok(())
        },
        quote! {
            #read
            ::core::result::Result::Ok(#name { #(#construct),* })
        },
    ))
}

/// Serialize and deserialize bodies for an enum.
fn enum_bodies(
    name: &Ident,
    data: &DataEnum,
    container: &ContainerAttributes,
) -> syn::Result<(TokenStream2, TokenStream2)> {
    let type_name = name.to_string();
    if container.map {
        return Err(syn::Error::new(name.span(), "#[msgpack(map)] is not supported on enums"));
    }
    if data.variants.is_empty() {
        return Err(syn::Error::new(
            name.span(),
            "MessagePackObject cannot be derived for an enum without variants",
        ));
    }

    let mut variant_names = Vec::new();
    for variant in &data.variants {
        let attrs = get_field_attributes(&variant.attrs)?;
        if attrs.skip || attrs.default {
            return Err(syn::Error::new(
                variant.ident.span(),
                "only #[msgpack(rename = \"...\")] is supported on variants",
            ));
        }
        variant_names.push(attrs.rename.unwrap_or_else(|| variant.ident.to_string()));
    }
    let unit_only = data.variants.iter().all(|v| matches!(v.fields, Fields::Unit));
    let idents: Vec<_> = data.variants.iter().map(|v| &v.ident).collect();
    let indices: Vec<u32> = (0..data.variants.len() as u32).collect();

    if container.as_string {
        if !unit_only {
            return Err(syn::Error::new(
                name.span(),
                "#[msgpack(as_string)] is only supported on unit-only enums",
            ));
        }
        return Ok((
            quote! {
                let __name: &str = match value {
                    #(#name::#idents => #variant_names,)*
                };
                writer.write_str(__name)?;
                ::core::result::Result::Ok(())
            },
            quote! {
                let __name = reader.read_str()?;
                match &*__name {
                    #(#variant_names => ::core::result::Result::Ok(#name::#idents),)*
                    other => ::core::result::Result::Err(::packwire::MessagePackError::InvalidValue(
                        ::std::format!("unknown variant '{}' for {}", other, #type_name),
                    )),
                }
            },
        ));
    }

    if unit_only {
        return Ok((
            quote! {
                let __index: u32 = match value {
                    #(#name::#idents => #indices,)*
                };
                writer.write_u32(__index);
                ::core::result::Result::Ok(())
            },
            quote! {
                match reader.read_u32()? {
                    #(#indices => ::core::result::Result::Ok(#name::#idents),)*
                    other => ::core::result::Result::Err(::packwire::MessagePackError::InvalidValue(
                        ::std::format!("unknown variant index {} for {}", other, #type_name),
                    )),
                }
            },
        ));
    }

    // Variants with data: [index, payload], where the payload is nil for unit variants
    // and an array of the fields otherwise.
    let mut write_arms = Vec::new();
    let mut read_arms = Vec::new();
    for ((variant, index), variant_name) in data.variants.iter().zip(&indices).zip(&variant_names) {
        let ident = &variant.ident;
        if let Fields::Unit = variant.fields {
            write_arms.push(quote! {
                #name::#ident => {
                    writer.write_u32(#index);
                    writer.write_nil();
                }
            });
            read_arms.push(quote! {
                #index => {
                    reader.read_nil()?;
                    #name::#ident
                }
            });
            continue;
        }

        let infos = collect_fields(&variant.fields)?;
        let bindings = infos.iter().enumerate().filter(|(_, f)| !f.attrs.skip).map(|(i, f)| {
            let member = &f.member;
            let binding = format_ident!("__f{}", i);
            quote! { #member: #binding }
        });
        let write = serialize_array(&infos, |i, _| {
            let binding = format_ident!("__f{}", i);
            quote! { #binding }
        });
        write_arms.push(quote! {
            #name::#ident { #(#bindings,)* .. } => {
                writer.write_u32(#index);
                #write
            }
        });

        let qualified = format!("{}::{}", type_name, variant_name);
        let read = deserialize_array(&infos, &qualified, true);
        let construct = construct_fields(&infos, &qualified);
        read_arms.push(quote! {
            #index => {
                #read
                #name::#ident { #(#construct),* }
            }
        });
    }

    Ok((
        quote! {
            writer.write_array_header(2)?;
            match value {
                #(#write_arms)*
            }
            ::core::result::Result::Ok(())
        },
        quote! {
            let __count = reader.read_array_header()? as usize;
            if __count != 2 {
                return ::core::result::Result::Err(::packwire::MessagePackError::CountMismatch {
                    type_name: #type_name,
                    expected: 2,
                    actual: __count,
                });
            }
            reader.nested(|reader| {
                ::core::result::Result::Ok(match reader.read_u32()? {
                    #(#read_arms)*
                    other => {
                        return ::core::result::Result::Err(::packwire::MessagePackError::InvalidValue(
                            ::std::format!("unknown variant index {} for {}", other, #type_name),
                        ))
                    }
                })
            })
        },
    ))
}

/// Derive macro generating a MessagePack formatter and a `Formattable` implementation.
///
/// Structs with named fields are written as an array in declaration order, or as a
/// string-keyed map with `#[msgpack(map)]`. Tuple structs are arrays and unit structs are
/// nil. Unit-only enums are written as the variant index (or the variant name with
/// `#[msgpack(as_string)]`); other enums as `[index, payload]`.
///
/// # Supported Attributes
///
/// * `#[msgpack(map)]` - On a struct: string-keyed map layout
/// * `#[msgpack(as_string)]` - On a unit-only enum: write the variant name
/// * `#[msgpack(rename = "name")]` - On a field: map key; on a variant: name for `as_string`
/// * `#[msgpack(skip)]` - On a field: never written, decoded as `Default::default()`
/// * `#[msgpack(default)]` - On a field: `Default::default()` when missing
///
/// Missing `Option` fields decode as `None`. Extra array elements and unknown map keys
/// are skipped.
///
/// # Examples
///
/// ```rust,ignore
/// #[derive(MessagePackObject)]
/// #[msgpack(map)]
/// struct User {
///     #[msgpack(rename = "user_id")]
///     id: u64,
///     name: String,
///     #[msgpack(skip)]
///     session: Option<String>,
/// }
/// ```
#[proc_macro_derive(MessagePackObject, attributes(msgpack))]
pub fn derive_message_pack_object(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    if let Some(lifetime) = input.generics.lifetimes().next() {
        return Err(syn::Error::new_spanned(
            lifetime,
            "MessagePackObject cannot be derived for types with lifetime parameters",
        ));
    }
    let container = get_container_attributes(&input.attrs)?;

    let (serialize_body, deserialize_body) = match &input.data {
        Data::Struct(s) => struct_bodies(name, &s.fields, &container)?,
        Data::Enum(e) => enum_bodies(name, e, &container)?,
        Data::Union(_) => {
            return Err(syn::Error::new(
                Span::call_site(),
                "MessagePackObject cannot be derived for unions",
            ))
        }
    };

    let mut generics = input.generics.clone();
    for param in generics.type_params_mut() {
        param.bounds.push(parse_quote!(::packwire::Formattable));
    }
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    Ok(quote! {
        const _: () = {
            struct __PackwireFormatter<__T>(::core::marker::PhantomData<fn() -> __T>);

            #[allow(unused_variables)]
            impl #impl_generics ::packwire::Formatter<#name #ty_generics> for __PackwireFormatter<#name #ty_generics> #where_clause {
                fn serialize(
                    &self,
                    writer: &mut ::packwire::Writer,
                    value: &#name #ty_generics,
                    resolver: &dyn ::packwire::FormatterResolver,
                ) -> ::packwire::Result<()> {
                    #serialize_body
                }

                fn deserialize(
                    &self,
                    reader: &mut ::packwire::Reader<'_>,
                    resolver: &dyn ::packwire::FormatterResolver,
                ) -> ::packwire::Result<#name #ty_generics> {
                    #deserialize_body
                }
            }

            impl #impl_generics ::packwire::Formattable for #name #ty_generics #where_clause {
                fn builtin_formatter() -> ::core::option::Option<::packwire::ErasedFormatter> {
                    ::core::option::Option::Some(::packwire::ErasedFormatter::new::<#name #ty_generics, _>(
                        __PackwireFormatter::<#name #ty_generics>(::core::marker::PhantomData),
                    ))
                }
            }
        };
    })
}
