use crate::derive_utils::{apply_derives, serde_rename, serde_skip};
use crate::field_utils::{FieldRole, field_name, take_field_role};
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{Item, LitStr, Result, Token, Type, parse::Parse, parse::ParseStream, parse_macro_input};

/// #[entity] 宏实现
/// - 为结构体实现 `::datastore_core::mapping::Persistent`（描述符、id 读写、关联字段读写）
/// - id 字段：`#[id]` 标注，或名为 `id` 的字段
/// - 字段属性：`#[field(name = "..")]`、`#[descendants]`、`#[reference]`、`#[lazy_reference]`
/// - 支持参数：`#[entity(kind = "..", discriminator_field = "..", discriminator_value = "..", debug = true|false)]`；
///   - `kind` 默认为首字母小写的结构体名
///   - `debug` 默认 `true`（派生 Debug）。当为 `false` 时不派生 Debug，便于用户自定义实现。
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EntityAttrConfig);
    let input = parse_macro_input!(item as Item);

    let st = match input {
        Item::Struct(s) => s,
        other => {
            return syn::Error::new(other.span(), "#[entity] only on struct")
                .to_compile_error()
                .into();
        }
    };

    match expand_struct(cfg, st) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct RelationField {
    ident: syn::Ident,
    ty: Type,
    name: String,
    stored: String,
    variant: syn::Ident,
}

fn expand_struct(cfg: EntityAttrConfig, mut st: syn::ItemStruct) -> Result<proc_macro2::TokenStream> {
    let struct_span = st.span();
    // 仅支持具名字段结构体
    let fields_named = match &mut st.fields {
        syn::Fields::Named(f) => f,
        _ => {
            return Err(syn::Error::new(
                struct_span,
                "only supports named-field struct",
            ));
        }
    };

    let explicit_id = fields_named
        .named
        .iter()
        .any(|f| f.attrs.iter().any(|a| a.path().is_ident("id")));
    let mut id: Option<(syn::Ident, Type, String)> = None;
    let mut properties: Vec<(String, String)> = Vec::new();
    let mut relations: Vec<RelationField> = Vec::new();

    for field in fields_named.named.iter_mut() {
        let name = field_name(field);
        let ident = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new(field.span(), "expected a named field"))?;
        let role = match take_field_role(field)? {
            FieldRole::Property { .. } if name == "id" && !explicit_id => FieldRole::Id,
            role => role,
        };

        match role {
            FieldRole::Id => {
                if id.is_some() {
                    return Err(syn::Error::new(
                        field.span(),
                        "an entity can declare only one id field",
                    ));
                }
                field.attrs.push(serde_skip());
                id = Some((ident, field.ty.clone(), name));
            }
            FieldRole::Property { stored } => {
                if stored != name {
                    field.attrs.push(serde_rename(&stored));
                }
                properties.push((name, stored));
            }
            FieldRole::Relation { kind, stored } => {
                field.attrs.push(serde_skip());
                relations.push(RelationField {
                    ident,
                    ty: field.ty.clone(),
                    name,
                    stored,
                    variant: kind.variant(),
                });
            }
        }
    }

    let (id_ident, id_ty, id_name) = id.ok_or_else(|| {
        syn::Error::new(
            struct_span,
            "#[entity] requires an id field: mark one with #[id] or name it `id`",
        )
    })?;

    // 合并/规范 derive：默认添加 Debug（可通过 debug=false 关闭）、Default、Serialize、Deserialize
    let mut required: Vec<syn::Path> = vec![
        syn::parse_quote!(Default),
        syn::parse_quote!(serde::Serialize),
        syn::parse_quote!(serde::Deserialize),
    ];
    if cfg.derive_debug.unwrap_or(true) {
        required.insert(0, syn::parse_quote!(Debug));
    }
    apply_derives(&mut st.attrs, required);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();
    let kind = cfg.kind.unwrap_or_else(|| lower_camel(&ident.to_string()));

    let discrimination = match (cfg.discriminator_field, cfg.discriminator_value) {
        (Some(field), Some(value)) => quote! { .discriminator(#field, ::core::option::Option::Some(#value)) },
        (Some(field), None) => quote! { .discriminator(#field, ::core::option::Option::None) },
        (None, Some(_)) => {
            return Err(syn::Error::new(
                struct_span,
                "'discriminator_value' requires 'discriminator_field'",
            ));
        }
        (None, None) => quote! {},
    };

    let property_calls = properties
        .iter()
        .map(|(name, stored)| quote! { .property(#name, #stored) });
    let relation_calls = relations.iter().map(|r| {
        let (ty, name, stored, variant) = (&r.ty, &r.name, &r.stored, &r.variant);
        quote! {
            .relation(<#ty as ::datastore_core::mapping::RelationField>::describe(
                #name,
                #stored,
                ::datastore_core::mapping::RelationKind::#variant,
            ))
        }
    });
    let value_arms = relations.iter().map(|r| {
        let (field, name) = (&r.ident, &r.name);
        quote! {
            #name => ::datastore_core::mapping::RelationField::relation_value(&self.#field),
        }
    });
    let hydrate_arms = relations.iter().map(|r| {
        let (field, ty, name) = (&r.ident, &r.ty, &r.name);
        quote! {
            #name => {
                self.#field = <#ty as ::datastore_core::mapping::RelationField>::from_hydrated(value)?;
                ::core::result::Result::Ok(())
            }
        }
    });

    Ok(quote! {
        #st

        impl #impl_generics ::datastore_core::mapping::Persistent for #ident #ty_generics #where_clause {
            fn describe() -> ::datastore_core::mapping::EntityDescriptor {
                ::datastore_core::mapping::EntityDescriptor::new::<Self>(#kind)
                    .id_property(#id_name, <#id_ty as ::datastore_core::mapping::EntityId>::KIND)
                    #(#property_calls)*
                    #(#relation_calls)*
                    #discrimination
            }

            fn id_value(&self) -> ::core::option::Option<::datastore_core::mapping::IdValue> {
                ::datastore_core::mapping::EntityId::id_value(&self.#id_ident)
            }

            fn assign_key(
                &mut self,
                key: &::datastore_core::key::Key,
            ) -> ::datastore_core::error::DatastoreResult<()> {
                self.#id_ident = <#id_ty as ::datastore_core::mapping::EntityId>::from_key(key)?;
                ::core::result::Result::Ok(())
            }

            #[allow(unused_variables)]
            fn relation_value(&self, field: &str) -> ::datastore_core::mapping::RelationValue {
                match field {
                    #(#value_arms)*
                    _ => ::datastore_core::mapping::RelationValue::Absent,
                }
            }

            #[allow(unused_variables)]
            fn hydrate(
                &mut self,
                field: &str,
                value: ::datastore_core::mapping::Hydrated,
            ) -> ::datastore_core::error::DatastoreResult<()> {
                match field {
                    #(#hydrate_arms)*
                    _ => ::core::result::Result::Err(
                        ::datastore_core::error::DatastoreError::unknown_relation::<Self>(field),
                    ),
                }
            }
        }
    })
}

fn lower_camel(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

// -------- parsing --------

struct EntityAttrConfig {
    kind: Option<String>,
    discriminator_field: Option<String>,
    discriminator_value: Option<String>,
    derive_debug: Option<bool>,
}

impl Parse for EntityAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut cfg = Self {
            kind: None,
            discriminator_field: None,
            discriminator_value: None,
            derive_debug: None,
        };

        if input.is_empty() {
            return Ok(cfg);
        }

        let elems: Punctuated<EntityAttrElem, Token![,]> =
            Punctuated::<EntityAttrElem, Token![,]>::parse_terminated(input)?;

        for elem in elems.into_iter() {
            let (slot, value, key) = match elem {
                EntityAttrElem::Kind(lit) => (&mut cfg.kind, lit, "kind"),
                EntityAttrElem::DiscriminatorField(lit) => {
                    (&mut cfg.discriminator_field, lit, "discriminator_field")
                }
                EntityAttrElem::DiscriminatorValue(lit) => {
                    (&mut cfg.discriminator_value, lit, "discriminator_value")
                }
                EntityAttrElem::Debug(b) => {
                    if cfg.derive_debug.is_some() {
                        return Err(syn::Error::new(
                            proc_macro2::Span::call_site(),
                            "duplicate key 'debug' in attribute",
                        ));
                    }
                    cfg.derive_debug = Some(b);
                    continue;
                }
            };
            if slot.is_some() {
                return Err(syn::Error::new(
                    value.span(),
                    format!("duplicate key '{key}' in attribute"),
                ));
            }
            *slot = Some(value.value());
        }

        Ok(cfg)
    }
}

enum EntityAttrElem {
    Kind(LitStr),
    DiscriminatorField(LitStr),
    DiscriminatorValue(LitStr),
    Debug(bool),
}

impl Parse for EntityAttrElem {
    fn parse(input: ParseStream) -> Result<Self> {
        let key: syn::Ident = input.parse()?;
        let _eq: Token![=] = input.parse()?;
        if key == "kind" {
            Ok(EntityAttrElem::Kind(input.parse()?))
        } else if key == "discriminator_field" {
            Ok(EntityAttrElem::DiscriminatorField(input.parse()?))
        } else if key == "discriminator_value" {
            Ok(EntityAttrElem::DiscriminatorValue(input.parse()?))
        } else if key == "debug" {
            let expr: syn::Expr = input.parse()?;
            match expr {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Bool(b),
                    ..
                }) => Ok(EntityAttrElem::Debug(b.value())),
                other => Err(syn::Error::new(
                    other.span(),
                    "expected boolean literal for 'debug'",
                )),
            }
        } else {
            Err(syn::Error::new(
                key.span(),
                "unknown key in attribute; expected 'kind', 'discriminator_field', 'discriminator_value' or 'debug'",
            ))
        }
    }
}
