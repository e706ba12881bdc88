//! 被拦截 trait 的包装类型生成

use crate::utils::{
    argument_ident, has_supertrait, is_result_type, method_static_ident, parse_throws,
    requires_sized_self, take_attributes,
};
use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    parse::{Parse, ParseStream},
    punctuated::Punctuated,
    Expr, ExprLit, FnArg, Ident, ItemTrait, Lit, Meta, Pat, PatIdent, Path, Result, Signature,
    Token, TraitItem, Type,
};

/// `#[intercepted]` 参数
#[derive(Debug, Clone, Default)]
pub struct InterceptedArgs {
    /// 自定义包装类型名称，默认为 `<Trait>Subclass`
    pub name: Option<Ident>,
}

impl Parse for InterceptedArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = InterceptedArgs::default();

        let parsed = Punctuated::<Meta, Token![,]>::parse_terminated(input)?;

        for meta in parsed {
            match meta {
                Meta::NameValue(nv) if nv.path.is_ident("name") => match nv.value {
                    Expr::Lit(ExprLit {
                        lit: Lit::Str(lit_str),
                        ..
                    }) => {
                        args.name = Some(lit_str.parse::<Ident>()?);
                    }
                    other => {
                        return Err(syn::Error::new_spanned(other, "name 必须是字符串字面量"));
                    }
                },
                other => {
                    return Err(syn::Error::new_spanned(
                        other,
                        "未知参数，支持的参数: name = \"...\"",
                    ));
                }
            }
        }

        Ok(args)
    }
}

/// 实现 #[intercepted] 宏
pub fn intercepted_impl(args: TokenStream, input: TokenStream) -> TokenStream {
    match expand(args, input) {
        Ok(expanded) => expanded,
        Err(error) => error.to_compile_error(),
    }
}

fn expand(args: TokenStream, input: TokenStream) -> Result<TokenStream> {
    let args = if args.is_empty() {
        InterceptedArgs::default()
    } else {
        syn::parse2::<InterceptedArgs>(args)?
    };
    let mut item: ItemTrait = syn::parse2(input)?;
    validate_trait(&item)?;

    let trait_ident = item.ident.clone();
    let trait_name = trait_ident.to_string();
    let subclass = args
        .name
        .unwrap_or_else(|| format_ident!("{}Subclass", trait_ident));
    let subclass_name = subclass.to_string();
    let vis = item.vis.clone();

    let mut methods = Vec::new();
    for trait_item in &mut item.items {
        match trait_item {
            TraitItem::Fn(method) => {
                let throws = take_attributes(&mut method.attrs, "throws");
                let kinds = parse_throws(&throws)?;

                let where_predicates = method
                    .sig
                    .generics
                    .where_clause
                    .as_ref()
                    .map(|clause| &clause.predicates);
                if requires_sized_self(where_predicates) {
                    if method.default.is_none() {
                        return Err(syn::Error::new_spanned(
                            &method.sig,
                            "带有 `where Self: Sized` 的方法必须提供默认实现",
                        ));
                    }
                    continue;
                }

                methods.push(generate_method(&trait_name, &method.sig, &kinds)?);
            }
            TraitItem::Type(associated) => {
                return Err(syn::Error::new_spanned(
                    associated,
                    "被拦截的 trait 不能包含关联类型",
                ));
            }
            TraitItem::Const(associated) => {
                return Err(syn::Error::new_spanned(
                    associated,
                    "被拦截的 trait 不能包含关联常量",
                ));
            }
            _ => {}
        }
    }

    let doc = format!("`{}` 的拦截包装类型，由 `#[intercepted]` 生成", trait_name);

    Ok(quote! {
        #item

        #[doc = #doc]
        #vis struct #subclass {
            delegate: ::std::sync::Arc<dyn #trait_ident>,
            interception: ::di_abstractions::BoundInterception,
        }

        impl #subclass {
            /// 用拦截绑定包装委托实例
            #vis fn wrap(
                delegate: ::std::sync::Arc<dyn #trait_ident>,
                interception: ::di_abstractions::BoundInterception,
            ) -> ::std::sync::Arc<dyn #trait_ident> {
                ::std::sync::Arc::new(Self {
                    delegate,
                    interception,
                })
            }

            /// 被包装的委托实例
            #vis fn delegate(&self) -> &::std::sync::Arc<dyn #trait_ident> {
                &self.delegate
            }
        }

        impl #trait_ident for #subclass {
            #(#methods)*
        }

        impl ::std::fmt::Debug for #subclass {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(#subclass_name)
                    .field("interception", &self.interception)
                    .finish()
            }
        }
    })
}

fn validate_trait(item: &ItemTrait) -> Result<()> {
    if !item.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &item.generics,
            "被拦截的 trait 不能有泛型参数",
        ));
    }
    if !has_supertrait(&item.supertraits, "Send") || !has_supertrait(&item.supertraits, "Sync") {
        return Err(syn::Error::new_spanned(
            &item.ident,
            "被拦截的 trait 必须声明 `Send + Sync` 约束",
        ));
    }
    Ok(())
}

/// 生成单个方法的转发实现
///
/// 参数按位置重命名后移动进闭包，闭包在拦截链末端调用委托实例。
/// 拦截器可能多次 `proceed`，所以每次调用都克隆参数。
fn generate_method(trait_name: &str, sig: &Signature, kinds: &[Path]) -> Result<TokenStream> {
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new_spanned(asyncness, "被拦截的方法不能是 async"));
    }
    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                sig,
                "被拦截的方法必须以 `&self` 为接收者",
            ));
        }
    }
    if !is_result_type(&sig.output) {
        return Err(syn::Error::new_spanned(
            &sig.output,
            "被拦截的方法必须返回 `InvocationResult<T>`",
        ));
    }

    let mut forwarded = sig.clone();
    let mut arguments = Vec::new();
    for (index, input) in forwarded.inputs.iter_mut().skip(1).enumerate() {
        if let FnArg::Typed(pat_type) = input {
            if let Type::Reference(reference) = pat_type.ty.as_ref() {
                if reference.mutability.is_some() {
                    return Err(syn::Error::new_spanned(
                        &pat_type.ty,
                        "被拦截的方法参数不能是可变引用",
                    ));
                }
            }
            let ident = argument_ident(index);
            pat_type.pat = Box::new(Pat::Ident(PatIdent {
                attrs: Vec::new(),
                by_ref: None,
                mutability: None,
                ident: ident.clone(),
                subpat: None,
            }));
            arguments.push(ident);
        }
    }

    let method_ident = &sig.ident;
    let method_name = method_ident.to_string();
    let metadata = method_static_ident(method_ident, "METHOD");

    let (throws_static, contract) = if kinds.is_empty() {
        (
            TokenStream::new(),
            quote!(::infrastructure_common::ExceptionContract::EMPTY),
        )
    } else {
        let throws = Ident::new("__THROWS", Span::call_site());
        let count = kinds.len();
        (
            quote! {
                static #throws: [&'static ::infrastructure_common::ExceptionKind; #count] =
                    [#(&#kinds),*];
            },
            quote!(::infrastructure_common::ExceptionContract::declared(&#throws)),
        )
    };

    Ok(quote! {
        #forwarded {
            #throws_static
            static #metadata: ::infrastructure_common::MethodMetadata =
                ::infrastructure_common::MethodMetadata::new(#trait_name, #method_name, #contract);

            let delegate = ::std::sync::Arc::clone(&self.delegate);
            self.interception.invoke(&#metadata, move || {
                delegate.#method_ident(#(::std::clone::Clone::clone(&#arguments)),*)
            })
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand_str(args: TokenStream, input: TokenStream) -> String {
        expand(args, input).unwrap().to_string()
    }

    #[test]
    fn test_generates_subclass_and_metadata() {
        let expanded = expand_str(
            TokenStream::new(),
            quote! {
                pub trait Greeter: Send + Sync {
                    #[throws(MY_EXCEPTION)]
                    fn greet(&self, name: &str) -> InvocationResult<String>;
                    fn ping(&self) -> InvocationResult<()>;
                }
            },
        );

        assert!(expanded.contains("pub struct GreeterSubclass"));
        assert!(expanded.contains("\"greet\""));
        assert!(expanded.contains("__THROWS"));
        assert!(expanded.contains("ExceptionContract :: EMPTY"));
        assert!(!expanded.contains("throws"));
    }

    #[test]
    fn test_custom_subclass_name() {
        let expanded = expand_str(
            quote!(name = "LoggedGreeter"),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&self) -> InvocationResult<String>;
                }
            },
        );

        assert!(expanded.contains("struct LoggedGreeter"));
    }

    #[test]
    fn test_sized_methods_are_not_forwarded() {
        let expanded = expand_str(
            TokenStream::new(),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&self) -> InvocationResult<String>;
                    fn boxed(self) -> Box<Self> where Self: Sized { Box::new(self) }
                }
            },
        );

        assert!(!expanded.contains("\"boxed\""));
    }

    #[test]
    fn test_rejects_invalid_traits() {
        let missing_bounds = expand(
            TokenStream::new(),
            quote! {
                trait Greeter {
                    fn greet(&self) -> InvocationResult<String>;
                }
            },
        );
        assert!(missing_bounds.is_err());

        let mutable_receiver = expand(
            TokenStream::new(),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&mut self) -> InvocationResult<String>;
                }
            },
        );
        assert!(mutable_receiver.is_err());

        let plain_return = expand(
            TokenStream::new(),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&self) -> String;
                }
            },
        );
        assert!(plain_return.is_err());

        let mutable_argument = expand(
            TokenStream::new(),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&self, out: &mut String) -> InvocationResult<()>;
                }
            },
        );
        assert!(mutable_argument.is_err());
    }

    #[test]
    fn test_arguments_are_cloned_per_call() {
        let expanded = expand_str(
            TokenStream::new(),
            quote! {
                trait Greeter: Send + Sync {
                    fn greet(&self, name: String) -> InvocationResult<String>;
                }
            },
        );

        assert!(expanded.contains("Clone :: clone (& __arg0)"));
    }
}
