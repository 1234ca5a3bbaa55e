use quote::ToTokens;
use syn::punctuated::Punctuated;
use syn::{Attribute, Token};

// 归一化 derive 的 key，避免 Serialize/serde::Serialize 重复
fn derive_key(path: &syn::Path) -> String {
    match path.segments.last() {
        Some(last) => match last.ident.to_string().as_str() {
            name @ ("Serialize" | "Deserialize") => format!("serde::{name}"),
            name => name.to_string(),
        },
        None => path.to_token_stream().to_string(),
    }
}

/// 合并实体所需的 derive 与用户已有的 derive
///
/// 所需项在前，用户已有项按原顺序追加并去重；其余属性保持不变。
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let mut merged: Vec<syn::Path> = required;
    let mut retained = Vec::with_capacity(attrs.len());

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("derive") {
            retained.push(attr);
            continue;
        }
        let Ok(list) = attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated)
        else {
            continue;
        };
        for path in list {
            let key = derive_key(&path);
            if !merged.iter().any(|p| derive_key(p) == key) {
                merged.push(path);
            }
        }
    }

    let derive: Attribute = syn::parse_quote!(#[derive(#(#merged),*)]);
    *attrs = std::iter::once(derive).chain(retained).collect();
}

/// serde 不参与序列化的字段（id 与关联由模板读写）
pub(crate) fn serde_skip() -> Attribute {
    syn::parse_quote!(#[serde(skip)])
}

pub(crate) fn serde_rename(stored: &str) -> Attribute {
    syn::parse_quote!(#[serde(rename = #stored)])
}
