//! 宏工具函数

use proc_macro2::Span;
use syn::{
    punctuated::Punctuated, Attribute, Ident, Path, ReturnType, Token, Type, TypeParamBound,
    WherePredicate,
};

/// 检查返回类型是否为 `InvocationResult<T>` 或 `Result<T, E>`
pub fn is_result_type(output: &ReturnType) -> bool {
    match output {
        ReturnType::Type(_, ty) => match ty.as_ref() {
            Type::Path(type_path) => type_path
                .path
                .segments
                .last()
                .map_or(false, |segment| {
                    segment.ident == "InvocationResult" || segment.ident == "Result"
                }),
            _ => false,
        },
        ReturnType::Default => false,
    }
}

/// 检查 supertrait 列表中是否包含指定的 trait
pub fn has_supertrait(bounds: &Punctuated<TypeParamBound, Token![+]>, name: &str) -> bool {
    bounds.iter().any(|bound| match bound {
        TypeParamBound::Trait(trait_bound) => trait_bound
            .path
            .segments
            .last()
            .map_or(false, |segment| segment.ident == name),
        _ => false,
    })
}

/// 方法是否带有 `where Self: Sized` 约束，这类方法不能通过 trait 对象调用
pub fn requires_sized_self(predicates: Option<&Punctuated<WherePredicate, Token![,]>>) -> bool {
    predicates.map_or(false, |predicates| {
        predicates.iter().any(|predicate| match predicate {
            WherePredicate::Type(predicate_type) => {
                let is_self = matches!(
                    &predicate_type.bounded_ty,
                    Type::Path(type_path) if type_path.path.is_ident("Self")
                );
                is_self && has_supertrait(&predicate_type.bounds, "Sized")
            }
            _ => false,
        })
    })
}

/// 取出并移除指定名称的属性
pub fn take_attributes(attrs: &mut Vec<Attribute>, name: &str) -> Vec<Attribute> {
    let (taken, kept): (Vec<Attribute>, Vec<Attribute>) = attrs
        .drain(..)
        .partition(|attr| attr.path().is_ident(name));
    *attrs = kept;
    taken
}

/// 解析 `#[throws(A, b::B)]` 中的异常种类路径
pub fn parse_throws(attrs: &[Attribute]) -> syn::Result<Vec<Path>> {
    let mut kinds = Vec::new();
    for attr in attrs {
        let parsed = attr.parse_args_with(Punctuated::<Path, Token![,]>::parse_terminated)?;
        kinds.extend(parsed);
    }
    Ok(kinds)
}

/// 生成位置参数名
pub fn argument_ident(index: usize) -> Ident {
    Ident::new(&format!("__arg{}", index), Span::call_site())
}

/// 生成方法级静态项名称
pub fn method_static_ident(method: &Ident, suffix: &str) -> Ident {
    Ident::new(
        &format!("__{}_{}", method.to_string().to_uppercase(), suffix),
        Span::call_site(),
    )
}
