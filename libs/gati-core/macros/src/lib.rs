//! `#[module(...)]` attribute macro for declaring Gati modules.
//!
//! Generates an `inventory::submit!` registration so the module loader can
//! discover every module linked into the binary without a manual list.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input,
    punctuated::Punctuated,
    Expr, Ident, ItemStruct, LitStr, Token,
};

struct ModuleConfig {
    name: Option<LitStr>,
    deps: Vec<LitStr>,
    ctor: Option<Expr>,
}

impl Parse for ModuleConfig {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut name = None;
        let mut deps = Vec::new();
        let mut ctor = None;

        let pairs = Punctuated::<MetaKv, Token![,]>::parse_terminated(input)?;
        for kv in pairs {
            match kv.key.to_string().as_str() {
                "name" => {
                    name = Some(syn::parse2::<LitStr>(kv.value)?);
                }
                "deps" => {
                    let content: DepsList = syn::parse2(kv.value)?;
                    deps = content.0;
                }
                "ctor" => {
                    ctor = Some(syn::parse2::<Expr>(kv.value)?);
                }
                other => {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        format!("unknown `module` attribute key `{other}`; expected one of: name, deps, ctor"),
                    ))
                }
            }
        }

        Ok(ModuleConfig { name, deps, ctor })
    }
}

struct MetaKv {
    key: Ident,
    value: TokenStream2,
}

impl Parse for MetaKv {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let key: Ident = input.parse()?;
        input.parse::<Token![=]>()?;
        // Capture the rest of this comma-delimited segment verbatim so arrays
        // (`deps = [...]`) and arbitrary expressions (`ctor = ...`) both work.
        let mut value = TokenStream2::new();
        while !input.is_empty() && !input.peek(Token![,]) {
            let tt: proc_macro2::TokenTree = input.parse()?;
            value.extend(std::iter::once(tt));
        }
        Ok(MetaKv { key, value })
    }
}

struct DepsList(Vec<LitStr>);

impl Parse for DepsList {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let content;
        syn::bracketed!(content in input);
        let items = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
        Ok(DepsList(items.into_iter().collect()))
    }
}

/// Declares a struct as a Gati module and registers it for discovery.
///
/// ```ignore
/// #[derive(Default)]
/// #[gati_macros::module(name = "cache", deps = ["config"])]
/// pub struct CacheModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as ModuleConfig);
    let item_struct = parse_macro_input!(item as ItemStruct);
    let struct_ident = &item_struct.ident;

    let name_lit = match cfg.name {
        Some(n) => n,
        None => {
            return syn::Error::new_spanned(struct_ident, "`module` attribute requires `name = \"...\"`")
                .to_compile_error()
                .into()
        }
    };

    let deps = &cfg.deps;
    let ctor: Expr = cfg
        .ctor
        .unwrap_or_else(|| syn::parse_quote!(<#struct_ident as ::std::default::Default>::default()));

    let registrator_ident = Ident::new(
        &format!(
            "__gati_register_{}",
            struct_ident.to_string().to_lowercase()
        ),
        struct_ident.span(),
    );

    let expanded = quote! {
        #item_struct

        // Compile-time proof that this struct satisfies the `Module` contract
        // before it's handed to the registry as a trait object.
        const _: () = {
            fn __gati_assert_module_impl<T: ::gati_core::Module>() {}
            fn __gati_assert() {
                __gati_assert_module_impl::<#struct_ident>();
            }
        };

        #[allow(non_upper_case_globals)]
        fn #registrator_ident() -> ::gati_core::registry::Registrator {
            ::gati_core::registry::Registrator::new(#name_lit, &[#(#deps),*], || {
                ::std::sync::Arc::new(#ctor) as ::std::sync::Arc<dyn ::gati_core::Module>
            })
        }

        ::gati_core::inventory::submit! {
            #registrator_ident()
        }
    };

    expanded.into()
}
