use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Fields};

/// Implements `crate::params::Params` for a struct whose named fields are all
/// `Param`s. Each field is addressable by index and by its camelCase key,
/// which is the name used in saved state and `SetParam` commands.
#[proc_macro_derive(Params)]
pub fn derive_params(input: TokenStream) -> TokenStream {
    let ast = parse_macro_input!(input as DeriveInput);
    let struct_name = ast.ident;
    let fields = match ast.data {
        Data::Struct(DataStruct {
            fields: Fields::Named(fields),
            ..
        }) => fields,
        _ => {
            return syn::Error::new(
                struct_name.span(),
                "Params can only be derived for a struct with named fields",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut num_params: usize = 0;
    let mut param_arms = Vec::new();
    let mut key_arms = Vec::new();

    for (index, field) in fields.named.iter().enumerate() {
        if let Some(ident) = &field.ident {
            num_params += 1;
            let key = camel_case(&ident.to_string());
            param_arms.push(quote! {
                #index => &self.#ident
            });
            key_arms.push(quote! {
                #index => #key
            });
        }
    }
    param_arms.push(quote! {
        _ => panic!("param index {} out of range", idx),
    });
    key_arms.push(quote! {
        _ => panic!("param index {} out of range", idx),
    });

    quote! {
        impl crate::params::Params for #struct_name {
            fn len(&self) -> usize {
                #num_params
            }

            fn get_param(&self, idx: usize) -> &crate::params::Param {
                match idx {
                    #(#param_arms),*
                }
            }

            fn key(&self, idx: usize) -> &'static str {
                match idx {
                    #(#key_arms),*
                }
            }
        }
    }
    .into()
}

// kick_decay -> kickDecay
fn camel_case(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut upper = false;
    for ch in ident.trim_start_matches("r#").chars() {
        if ch == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(ch.to_uppercase());
            upper = false;
        } else {
            out.push(ch);
        }
    }
    out
}
