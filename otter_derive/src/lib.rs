//! # otter_derive
//!
//! Proc macros that bridge fallible Rust helpers into the rhai script engine
//! used to evaluate test bodies.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use proc_macro::TokenStream;
use proc_macro_error::{abort_call_site, proc_macro_error};
use quote::{ToTokens, format_ident, quote};
use syn::{
    FnArg, GenericArgument, LitStr, PathArguments, ReturnType, Token, Type, parse_macro_input,
    punctuated::Punctuated,
};

/// Pulls `T` out of a `Result<T>` / `Result<T, E>` return type.
fn result_ok_type(output: &ReturnType) -> Option<Type> {
    let ReturnType::Type(_, ty) = output else {
        return None;
    };
    let Type::Path(path) = ty.as_ref() else {
        return None;
    };
    let last = path.path.segments.last()?;
    if last.ident != "Result" {
        return None;
    }
    let PathArguments::AngleBracketed(args) = &last.arguments else {
        return None;
    };
    match args.args.first()? {
        GenericArgument::Type(inner) => Some(inner.clone()),
        _ => None,
    }
}

#[proc_macro_error]
#[proc_macro_attribute]
/// Generates a `<name>_script` twin of a free function returning an
/// `anyhow::Result<T>`. The twin returns `Result<T, Box<EvalAltResult>>` and
/// turns every error into a runtime error carrying an object map of the form
/// `#{ kind: <attr>, message: <error text> }`.
///
/// * `attr`: the error kind as a string literal, eg. `"assertion"`.
/// * `input`: the function to wrap.
pub fn script_variant(attr: TokenStream, input: TokenStream) -> TokenStream {
    let kind = if attr.is_empty() {
        LitStr::new("runtime", proc_macro::Span::call_site().into())
    } else {
        parse_macro_input!(attr as LitStr)
    };

    let input = parse_macro_input!(input as syn::ItemFn);
    let og_fn = input.to_token_stream();
    let fn_name = input.sig.ident.clone();
    let new_fn_name = format_ident!("{}_script", fn_name);

    let Some(ok_type) = result_ok_type(&input.sig.output) else {
        abort_call_site!("`script_variant` expects a function returning `Result<T>`");
    };

    let mut params = Punctuated::<_, Token![,]>::new();
    let mut args = Punctuated::<_, Token![,]>::new();
    for arg in input.sig.inputs.iter() {
        match arg {
            FnArg::Receiver(_) => {
                abort_call_site!("`script_variant` only supports free functions");
            }
            FnArg::Typed(a) => {
                params.push(quote! {#a});
                args.push(a.pat.clone());
            }
        }
    }

    let expanded = quote! {
        #og_fn

        /// Macro generated variant of the function above that reports failures
        /// as typed rhai runtime errors, so it can be registered with an engine.
        pub fn #new_fn_name(#params) -> ::std::result::Result<#ok_type, ::std::boxed::Box<::rhai::EvalAltResult>> {
            #fn_name(#args).map_err(|e| {
                let mut payload = ::rhai::Map::new();
                payload.insert("kind".into(), ::rhai::Dynamic::from(#kind.to_string()));
                payload.insert("message".into(), ::rhai::Dynamic::from(format!("{e}")));
                ::std::boxed::Box::new(::rhai::EvalAltResult::ErrorRuntime(
                    ::rhai::Dynamic::from_map(payload),
                    ::rhai::Position::NONE,
                ))
            })
        }
    };

    expanded.into()
}
