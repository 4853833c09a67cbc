extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// Marks a type as a `PipelineError`. The trait has no methods of its own, so this only
/// emits the empty impl. The compiler still checks the supertraits (`Error`, `Kind`,
/// `Send`, `Sync`) at the derive site.
#[proc_macro_derive(PipelineError)]
pub fn pipeline_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    quote!(
        impl #impl_generics PipelineError for #name #ty_generics #where_clause {}
    )
    .into()
}
