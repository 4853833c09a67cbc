extern crate proc_macro;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Variant};

/// Derives `Kind` such that a struct reports its own name and an enum reports
/// `Enum::Variant` for whichever variant it holds.
#[proc_macro_derive(Kind)]
pub fn kind(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let body = match &input.data {
        Data::Struct(_) => quote!(stringify!(#name)),
        Data::Enum(data) => {
            let arms = data.variants.iter().map(|variant| arm(name, variant));
            quote!(
                match self {
                    #(#arms),*
                }
            )
        }
        // Unions only ever show up for FFI, which none of our errors cross.
        Data::Union(_) => {
            return syn::Error::new_spanned(
                name,
                "Kind cannot be derived for unions, implement it by hand instead",
            )
            .to_compile_error()
            .into()
        }
    };
    quote!(
        impl #impl_generics Kind for #name #ty_generics #where_clause {
            fn kind(&self) -> &'static str {
                #body
            }
        }
    )
    .into()
}

fn arm(name: &syn::Ident, variant: &Variant) -> TokenStream2 {
    let v = &variant.ident;
    let pattern = match variant.fields {
        Fields::Unnamed(_) => quote!(#name::#v(..)),
        Fields::Named(_) => quote!(#name::#v { .. }),
        Fields::Unit => quote!(#name::#v),
    };
    quote!(#pattern => concat!(stringify!(#name), "::", stringify!(#v)))
}
