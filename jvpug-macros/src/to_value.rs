use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::{DeriveInput, LitStr, parse_macro_input};

pub fn derive_to_value_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match input.data {
        syn::Data::Struct(data) => match data.fields {
            syn::Fields::Named(fields) => fields.named,
            _ => {
                return syn::Error::new_spanned(
                    name,
                    "ToValue only supports structs with named fields",
                )
                .to_compile_error()
                .into();
            }
        },
        _ => {
            return syn::Error::new_spanned(name, "ToValue only supports structs")
                .to_compile_error()
                .into();
        }
    };

    let mut inserts = Vec::with_capacity(fields.len());
    for f in fields.iter() {
        let Some(field_name) = f.ident.as_ref() else {
            continue;
        };
        let attrs = match parse_field_attrs(f) {
            Ok(attrs) => attrs,
            Err(e) => return e.to_compile_error().into(),
        };
        if attrs.skip {
            continue;
        }
        let key_lit = LitStr::new(&attrs.key, Span::call_site());
        inserts.push(quote! {
            map.insert(
                #key_lit.to_string(),
                ::jvpug::ToValue::to_value(&self.#field_name),
            );
        });
    }

    TokenStream::from(quote! {
        impl #impl_generics ::jvpug::ToValue for #name #ty_generics #where_clause {
            fn to_value(&self) -> ::jvpug::Value {
                let mut map = ::jvpug::value::Map::new();
                #(#inserts)*
                ::jvpug::Value::Map(map)
            }
        }
    })
}

struct FieldAttrs {
    key: String,
    skip: bool,
}

// 解析字段属性 (syn 2.0 风格)
fn parse_field_attrs(field: &syn::Field) -> syn::Result<FieldAttrs> {
    let mut key = field
        .ident
        .as_ref()
        .map(|i| i.to_string().trim_start_matches("r#").to_string())
        .unwrap_or_default();
    let mut skip = false;

    for attr in &field.attrs {
        if !attr.path().is_ident("value") {
            continue;
        }

        // #[value("custom_name")]
        if let Ok(s) = attr.parse_args::<LitStr>() {
            key = s.value();
            continue;
        }

        // #[value(skip)], #[value(rename = "xxx")]
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("skip") {
                skip = true;
                Ok(())
            } else if meta.path.is_ident("rename") {
                let s: LitStr = meta.value()?.parse()?;
                key = s.value();
                Ok(())
            } else {
                Err(meta.error("unsupported value attribute, expected `skip` or `rename`"))
            }
        })?;
    }

    Ok(FieldAttrs { key, skip })
}
