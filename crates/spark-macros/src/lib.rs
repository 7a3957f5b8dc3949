//! `spark-encode` 的过程宏入口。
//!
//! # 设计意图（Why）
//! - 结构体的字段元数据（输出名、空值省略、嵌入展开）在编译期即可确定，交给宏生成可避免手写
//!   `StructView` 时字段下标与名称错位；
//! - 生成代码把元数据缓存在 `OnceLock` 中，每个类型只构建一次。
//!
//! # 集成方式（How）
//! - 通过 `spark_encode::Encode` 再导出使用：`#[derive(spark_encode::Encode)]`；
//! - 生成代码以 `::spark_encode` 绝对路径引用运行时类型，调用方需直接依赖 `spark-encode`。

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    Data, DeriveInput, Error, Fields, LitStr, Type, ext::IdentExt, parse_macro_input,
    spanned::Spanned,
};

/// 为具名字段结构体派生 `Encode`、`StructView` 与 `EncodeStruct`。
///
/// # 属性（What）
/// - 容器级 `#[encode(omit_empty)]`：所有字段均省略空值；
/// - 字段级 `#[encode(rename = "name")]`：自定义输出键名；未指定时使用去掉 `r#` 前缀的字段名；
/// - 字段级 `#[encode(skip)]`：不输出该字段，字段类型无需实现 `Encode`；
/// - 字段级 `#[encode(omit_empty)]`：值为空时省略；
/// - 字段级 `#[encode(flatten)]`：把嵌入结构体的字段展开到当前层级，字段类型需实现 `EncodeStruct`；
///   与外层同名的展开字段被浅层字段遮蔽。
///
/// # 限制（Trade-offs）
/// - 元数据缓存在每个类型唯一的静态变量中，因此暂不支持带泛型参数的结构体；
/// - 元组结构体、枚举与联合体请手写 `Encode` 实现。
#[proc_macro_derive(Encode, attributes(encode))]
pub fn derive_encode(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_encode(input)
        .unwrap_or_else(|err| err.to_compile_error())
        .into()
}

#[derive(Default)]
struct FieldAttrs {
    rename: Option<LitStr>,
    skip: bool,
    omit_empty: bool,
    flatten: bool,
}

fn expand_encode(input: DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    if !input.generics.params.is_empty() {
        return Err(Error::new(
            input.generics.span(),
            "#[derive(Encode)] 暂不支持带泛型参数的结构体",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            other => {
                return Err(Error::new(
                    other.span(),
                    "#[derive(Encode)] 仅支持具名字段结构体",
                ));
            }
        },
        _ => {
            return Err(Error::new(
                input.ident.span(),
                "#[derive(Encode)] 仅支持结构体",
            ));
        }
    };

    let container_omit_empty = parse_container_attrs(&input)?;

    let ident = &input.ident;
    let type_name = LitStr::new(&ident.to_string(), ident.span());
    let mut schema_steps = Vec::new();
    let mut field_arms = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let attrs = parse_field_attrs(field)?;
        if attrs.skip {
            continue;
        }
        let member = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new(field.span(), "字段缺少名称"))?;
        let omit_empty = container_omit_empty || attrs.omit_empty;
        field_arms.push(quote! {
            #index => ::core::option::Option::Some(&self.#member as &dyn ::spark_encode::Encode),
        });

        if attrs.flatten {
            if attrs.rename.is_some() {
                return Err(Error::new(
                    field.span(),
                    "#[encode(flatten)] 与 rename 不能同时使用",
                ));
            }
            let ty: &Type = &field.ty;
            schema_steps.push(quote! {
                .flatten(
                    #index,
                    <#ty as ::spark_encode::EncodeStruct>::struct_schema(),
                    #omit_empty,
                )
            });
        } else {
            let name = attrs
                .rename
                .unwrap_or_else(|| LitStr::new(&member.unraw().to_string(), member.span()));
            schema_steps.push(quote! {
                .field(#name, #index, #omit_empty)
            });
        }
    }

    Ok(quote! {
        impl ::spark_encode::Encode for #ident {
            fn shape(&self) -> ::spark_encode::Shape<'_> {
                ::spark_encode::Shape::Struct(self)
            }
        }

        impl ::spark_encode::StructView for #ident {
            fn schema(&self) -> &'static ::spark_encode::StructSchema {
                <Self as ::spark_encode::EncodeStruct>::struct_schema()
            }

            fn field(&self, index: usize) -> ::core::option::Option<&dyn ::spark_encode::Encode> {
                match index {
                    #(#field_arms)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        impl ::spark_encode::EncodeStruct for #ident {
            fn struct_schema() -> &'static ::spark_encode::StructSchema {
                static SCHEMA: ::std::sync::OnceLock<::spark_encode::StructSchema> =
                    ::std::sync::OnceLock::new();
                SCHEMA.get_or_init(|| {
                    ::spark_encode::StructSchema::builder(#type_name)
                        #(#schema_steps)*
                        .build()
                })
            }
        }
    })
}

fn parse_container_attrs(input: &DeriveInput) -> Result<bool, Error> {
    let mut omit_empty = false;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("encode")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("omit_empty") {
                omit_empty = true;
                Ok(())
            } else {
                Err(meta.error("容器级 #[encode(..)] 仅支持 omit_empty"))
            }
        })?;
    }
    Ok(omit_empty)
}

fn parse_field_attrs(field: &syn::Field) -> Result<FieldAttrs, Error> {
    let mut attrs = FieldAttrs::default();
    for attr in field.attrs.iter().filter(|a| a.path().is_ident("encode")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename") {
                attrs.rename = Some(meta.value()?.parse()?);
            } else if meta.path.is_ident("skip") {
                attrs.skip = true;
            } else if meta.path.is_ident("omit_empty") {
                attrs.omit_empty = true;
            } else if meta.path.is_ident("flatten") {
                attrs.flatten = true;
            } else {
                return Err(meta.error("未知的 #[encode(..)] 字段属性"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}
