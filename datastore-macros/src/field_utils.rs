use syn::ext::IdentExt;
use syn::spanned::Spanned;
use syn::{Attribute, Field, LitStr, Result};

/// 关联字段种类，对应 `::datastore_core::mapping::RelationKind` 的变体名
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum RelationAttr {
    Descendants,
    Reference,
    LazyReference,
}

impl RelationAttr {
    fn from_attr(attr: &Attribute) -> Option<Self> {
        let path = attr.path();
        if path.is_ident("descendants") {
            Some(RelationAttr::Descendants)
        } else if path.is_ident("reference") {
            Some(RelationAttr::Reference)
        } else if path.is_ident("lazy_reference") {
            Some(RelationAttr::LazyReference)
        } else {
            None
        }
    }

    pub(crate) fn variant(self) -> syn::Ident {
        match self {
            RelationAttr::Descendants => syn::parse_quote!(Descendant),
            RelationAttr::Reference => syn::parse_quote!(Reference),
            RelationAttr::LazyReference => syn::parse_quote!(LazyReference),
        }
    }
}

/// 字段在实体中的角色
pub(crate) enum FieldRole {
    Id,
    Property { stored: String },
    Relation { kind: RelationAttr, stored: String },
}

/// 字段名（去掉 `r#` 前缀）
pub(crate) fn field_name(field: &Field) -> String {
    field
        .ident
        .as_ref()
        .map(|i| i.unraw().to_string())
        .unwrap_or_default()
}

/// 读取并移除字段上的 `#[id]`/`#[field]`/关联属性，返回字段角色
pub(crate) fn take_field_role(field: &mut Field) -> Result<FieldRole> {
    let name = field_name(field);
    let mut is_id = false;
    let mut rename: Option<String> = None;
    let mut relation: Option<(RelationAttr, Option<String>)> = None;
    let mut retained = Vec::with_capacity(field.attrs.len());

    for attr in field.attrs.drain(..) {
        if attr.path().is_ident("id") {
            attr.meta.require_path_only()?;
            is_id = true;
        } else if attr.path().is_ident("field") {
            rename = Some(parse_name_arg(&attr)?.ok_or_else(|| {
                syn::Error::new(attr.span(), "expected #[field(name = \"...\")]")
            })?);
        } else if let Some(kind) = RelationAttr::from_attr(&attr) {
            if relation.is_some() {
                return Err(syn::Error::new(
                    attr.span(),
                    "a field can declare only one relation attribute",
                ));
            }
            relation = Some((kind, parse_name_arg(&attr)?));
        } else {
            retained.push(attr);
        }
    }
    field.attrs = retained;

    match (is_id, rename, relation) {
        (true, None, None) => Ok(FieldRole::Id),
        (true, _, _) => Err(syn::Error::new(
            field.span(),
            "#[id] cannot be combined with #[field] or relation attributes",
        )),
        (false, Some(_), Some(_)) => Err(syn::Error::new(
            field.span(),
            "relation fields take their stored name from `name = ...` on the relation attribute",
        )),
        (false, rename, None) => Ok(FieldRole::Property {
            stored: rename.unwrap_or(name),
        }),
        (false, None, Some((kind, stored))) => Ok(FieldRole::Relation {
            kind,
            stored: stored.unwrap_or(name),
        }),
    }
}

// `#[attr]` 或 `#[attr(name = "...")]`
fn parse_name_arg(attr: &Attribute) -> Result<Option<String>> {
    if let syn::Meta::Path(_) = attr.meta {
        return Ok(None);
    }
    let mut name = None;
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            let lit: LitStr = meta.value()?.parse()?;
            name = Some(lit.value());
            Ok(())
        } else {
            Err(meta.error("unknown key; expected 'name'"))
        }
    })?;
    Ok(name)
}
