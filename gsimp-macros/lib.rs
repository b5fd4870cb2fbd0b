//! Internal macros for gsimp

extern crate proc_macro;
extern crate proc_macro2;

use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, Fields, Index};

/// Default implementation of [HeapSpace](../gsimp_common/memory/trait.HeapSpace.html).
///
/// Sums the heap usage of every field. Fields that do not own heap memory
/// must implement `HeapSpace` anyway (all `Copy` types do).
#[proc_macro_derive(HeapSpace)]
pub fn heap_space(input: proc_macro::TokenStream) -> proc_macro::TokenStream {
    let ast: syn::DeriveInput = syn::parse(input).unwrap();
    let type_name = ast.ident;
    let (impl_generics, type_generics, where_clause) = ast.generics.split_for_impl();
    let block = match ast.data {
        Data::Struct(ref data_struct) => sum_fields(&data_struct.fields),
        Data::Enum(_) | Data::Union(_) => panic!("HeapSpace can only be derived for structs"),
    };
    let implementation = quote!(
        impl #impl_generics
        HeapSpace for #type_name #type_generics #where_clause {
            fn heap_space(&self) -> usize {
                #block
            }
        }
    );
    implementation.into()
}

fn sum_fields(fields: &Fields) -> TokenStream {
    fields
        .iter()
        .enumerate()
        .map(|(position, field)| match &field.ident {
            Some(name) => quote!(self.#name.heap_space()),
            None => {
                let index = Index::from(position);
                quote!(self.#index.heap_space())
            }
        })
        .fold(quote!(0), |a, b| quote!(#a + #b))
}
