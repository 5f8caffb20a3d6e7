//! Attribute macros for `taski`.
//!
//! `#[taski::task]` and `#[taski::section]` sit on top of a `TaskBody`/
//! `SectionBody` impl and do three things: capture the body's own source as
//! a string literal (so the analyzer can parse it without ever running user
//! code), generate a `Described` impl that hands back a process-wide
//! `&'static TaskClass`, and register that descriptor with `inventory` so
//! `all_task_classes()` can enumerate it.

use proc_macro::TokenStream;
use proc_macro2::Span;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::{parse_macro_input, Ident, ImplItem, ItemImpl, LitStr, Path, Token};

struct TaskArgs {
    exports: Vec<LitStr>,
}

impl Parse for TaskArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut exports = Vec::new();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if key == "exports" {
                let content;
                syn::bracketed!(content in input);
                let list = Punctuated::<LitStr, Token![,]>::parse_terminated(&content)?;
                exports = list.into_iter().collect();
            } else {
                return Err(syn::Error::new(key.span(), "unknown #[task] key, expected `exports`"));
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(TaskArgs { exports })
    }
}

struct SectionArgs {
    candidates: Vec<Path>,
}

impl Parse for SectionArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut candidates = Vec::new();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if key == "candidates" {
                let content;
                syn::bracketed!(content in input);
                let list = Punctuated::<Path, Token![,]>::parse_terminated(&content)?;
                candidates = list.into_iter().collect();
            } else {
                return Err(syn::Error::new(key.span(), "unknown #[section] key, expected `candidates`"));
            }
            if input.is_empty() {
                break;
            }
            input.parse::<Token![,]>()?;
        }
        Ok(SectionArgs { candidates })
    }
}

/// Marks an `impl TaskBody for X { .. }` block. `X` must implement
/// `Default` — taski constructs a fresh instance per execution the same
/// way the descriptor's `construct` vtable entry is invoked, there being no
/// user-supplied constructor arguments in the task model.
///
/// ```ignore
/// #[taski::task(exports = ["id"])]
/// impl TaskBody for FetchUser {
///     fn run(&self, ctx: &TaskContext<'_>) -> TaskResult<Exports> { .. }
/// }
/// ```
#[proc_macro_attribute]
pub fn task(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as TaskArgs);
    let item_impl = parse_macro_input!(item as ItemImpl);
    expand(item_impl, &args.exports, &[], quote!(taski::task::TaskKind::Task))
}

/// Marks an `impl SectionBody for X { .. }` block, naming every candidate
/// implementation up front so the dependency graph can be built without
/// running `select`.
///
/// ```ignore
/// #[taski::section(candidates = [LocalCache, RemoteCache])]
/// impl SectionBody for CacheBackend {
///     fn select(&self, ctx: &TaskContext<'_>) -> TaskResult<&'static TaskClass> { .. }
/// }
/// ```
#[proc_macro_attribute]
pub fn section(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as SectionArgs);
    let item_impl = parse_macro_input!(item as ItemImpl);
    expand(item_impl, &[], &args.candidates, quote!(taski::task::TaskKind::Section))
}

fn expand(
    item_impl: ItemImpl,
    exports: &[LitStr],
    candidates: &[Path],
    kind: proc_macro2::TokenStream,
) -> TokenStream {
    let self_ty = &item_impl.self_ty;

    let body_source = item_impl
        .items
        .iter()
        .find_map(|item| match item {
            ImplItem::Fn(method) if method.sig.ident == "run" || method.sig.ident == "select" => {
                let block = &method.block;
                Some(quote!(#block).to_string())
            }
            _ => None,
        })
        .unwrap_or_default();
    let source_lit = LitStr::new(&body_source, Span::call_site());

    let instance_ctor = if candidates.is_empty() {
        quote! {
            taski::task::Instance::Task(::std::boxed::Box::new(<#self_ty as ::std::default::Default>::default()))
        }
    } else {
        quote! {
            taski::task::Instance::Section(::std::boxed::Box::new(<#self_ty as ::std::default::Default>::default()))
        }
    };

    let candidate_fns: Vec<_> = candidates
        .iter()
        .map(|path| quote!(<#path as taski::task::Described>::descriptor))
        .collect();

    let exports_lits: Vec<_> = exports.iter().collect();

    let expanded = quote! {
        #item_impl

        impl taski::task::Described for #self_ty {
            fn descriptor() -> &'static taski::task::TaskClass {
                static CELL: ::std::sync::OnceLock<taski::task::TaskClass> = ::std::sync::OnceLock::new();
                CELL.get_or_init(|| {
                    taski::task::TaskClass::new(
                        ::std::stringify!(#self_ty),
                        ::std::module_path!(),
                        #kind,
                        #source_lit,
                        &[#(#exports_lits),*],
                        &[#(#candidate_fns),*],
                        || #instance_ctor,
                    )
                })
            }
        }

        taski::inventory::submit! {
            taski::task::TaskClassEntry { get: <#self_ty as taski::task::Described>::descriptor }
        }
    };

    expanded.into()
}
