//! Derive macro for declarative slate table descriptors.
//!
//! This crate provides the `#[derive(Table)]` macro, which turns a plain
//! struct into a `slate_core::schema::TableDescriptor` plus typed column
//! references for the query compiler.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Expr, Fields, GenericArgument, Ident, Lit,
    LitStr, Meta, PathArguments, Type, UnOp,
};

/// Derives `slate_core::schema::Table` for a struct.
///
/// # Struct Attributes
///
/// - `#[table(name = "table_name")]` - SQL table name (defaults to the
///   snake_case struct name)
/// - `#[table(fts, tokenizer = "porter unicode61")]` - declares an FTS5
///   virtual table
/// - `#[index(name = "idx_name", columns = "a, b", unique)]` - declares an
///   index; repeatable
///
/// # Field Attributes
///
/// - `#[column(name = "column_name")]` - SQL column name (defaults to the
///   field name)
/// - `#[column(primary_key)]`, `#[column(autoincrement)]`,
///   `#[column(unique)]`, `#[column(nullable)]`
/// - `#[column(default = 0)]` - literal default (string, integer, float or
///   bool)
/// - `#[column(default_now)]` - `DEFAULT CURRENT_TIMESTAMP`
/// - `#[column(default_expr = "abs(random())")]` - raw SQL default
/// - `#[column(check = "age >= 0")]` - CHECK constraint
/// - `#[column(references = "users.id", cascade)]` - foreign key, with
///   `ON DELETE CASCADE` when `cascade` is present
/// - `#[column(type = "json")]` - overrides the inferred column type
///
/// `Option<T>` fields are nullable. Column types are inferred from the
/// field type: `bool` is boolean, integer types are integer, floats are
/// real, `Vec<u8>` is blob, chrono date/time types are datetime,
/// `serde_json::Value` is json and everything else is text.
///
/// # Generated Items
///
/// For a struct `User`, this macro generates `UserTable`, implementing
/// `Table`, with one `fn <field>() -> ColumnRef` accessor per column.
#[proc_macro_derive(Table, attributes(table, column, index))]
pub fn derive_table(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    derive_table_impl(&input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}

fn derive_table_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let struct_name = &input.ident;
    let table = parse_table_attrs(&input.attrs, struct_name)?;
    let indexes = parse_index_attrs(&input.attrs)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Table derive only supports structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Table derive only supports structs",
            ));
        }
    };

    let mut columns: Vec<ColumnInfo> = Vec::new();
    for field in fields {
        let field_name = field
            .ident
            .clone()
            .ok_or_else(|| syn::Error::new_spanned(field, "expected a named field"))?;
        let attrs = parse_column_attrs(&field.attrs)?;
        let (inner, optional) = unwrap_option(&field.ty);
        let column_type = match attrs.column_type {
            Some(ty) => ty,
            None => infer_column_type(inner),
        };
        columns.push(ColumnInfo {
            column_name: attrs.name.clone().unwrap_or_else(|| field_name.to_string()),
            field_name,
            column_type,
            nullable: attrs.nullable || optional,
            attrs,
        });
    }

    let table_name = &table.name;
    let table_struct_name = format_ident!("{}Table", struct_name);

    let all_column_names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();

    let primary_keys: Vec<&ColumnInfo> = columns.iter().filter(|c| c.attrs.primary_key).collect();
    let primary_key_impl = match primary_keys.as_slice() {
        [pk] => {
            let pk = &pk.column_name;
            quote! { const PRIMARY_KEY: Option<&'static str> = Some(#pk); }
        }
        _ => quote! { const PRIMARY_KEY: Option<&'static str> = None; },
    };

    let column_descriptors: Vec<TokenStream2> = columns.iter().map(column_descriptor).collect();

    let index_descriptors: Vec<TokenStream2> = indexes
        .iter()
        .map(|idx| {
            let name = &idx.name;
            let cols = &idx.columns;
            let unique = if idx.unique {
                quote! { .unique() }
            } else {
                quote! {}
            };
            quote! {
                .index(::slate_core::schema::IndexDescriptor::new(#name, &[#(#cols),*])#unique)
            }
        })
        .collect();

    let full_text = if table.fts {
        let tokenizer = match &table.tokenizer {
            Some(t) => quote! { Some(#t.to_string()) },
            None => quote! { None },
        };
        quote! {
            .full_text(::slate_core::schema::FtsOptions { tokenizer: #tokenizer })
        }
    } else {
        quote! {}
    };

    let column_accessors: Vec<TokenStream2> = columns
        .iter()
        .map(|info| {
            let method_name = &info.field_name;
            let column_name = &info.column_name;
            quote! {
                /// Returns a reference to this column for queries.
                #[inline]
                #[must_use]
                pub fn #method_name() -> ::slate_core::ast::ColumnRef {
                    ::slate_core::ast::ColumnRef::new(#table_name, #column_name)
                }
            }
        })
        .collect();

    Ok(quote! {
        /// Table metadata for `#struct_name`.
        #[derive(Debug, Clone, Copy)]
        pub struct #table_struct_name;

        impl ::slate_core::schema::Table for #table_struct_name {
            type Row = #struct_name;

            const NAME: &'static str = #table_name;
            const COLUMNS: &'static [&'static str] = &[#(#all_column_names),*];
            #primary_key_impl

            fn descriptor() -> ::slate_core::schema::TableDescriptor {
                ::slate_core::schema::TableDescriptor::new(#table_name)
                    #(.column(#column_descriptors))*
                    #(#index_descriptors)*
                    #full_text
            }
        }

        impl #table_struct_name {
            /// Returns the table name.
            #[inline]
            #[must_use]
            pub const fn table_name() -> &'static str {
                #table_name
            }

            #(#column_accessors)*
        }

        impl #struct_name {
            /// Returns the table metadata type.
            #[must_use]
            pub const fn table() -> #table_struct_name {
                #table_struct_name
            }
        }
    })
}

fn column_descriptor(info: &ColumnInfo) -> TokenStream2 {
    let name = &info.column_name;
    let ty = format_ident!("{}", info.column_type.variant());
    let mut modifiers = Vec::new();
    if info.nullable {
        modifiers.push(quote! { .nullable() });
    }
    if info.attrs.primary_key {
        modifiers.push(quote! { .primary_key() });
    }
    if info.attrs.autoincrement {
        modifiers.push(quote! { .autoincrement() });
    }
    if info.attrs.unique {
        modifiers.push(quote! { .unique() });
    }
    if let Some(default) = &info.attrs.default {
        modifiers.push(quote! { .default(#default) });
    }
    if let Some(check) = &info.attrs.check {
        modifiers.push(quote! { .check(#check) });
    }
    if let Some((table, column)) = &info.attrs.references {
        modifiers.push(quote! { .references(#table, #column) });
        if info.attrs.cascade {
            modifiers.push(quote! { .cascade() });
        }
    }
    quote! {
        ::slate_core::schema::ColumnDescriptor::new(#name, ::slate_core::schema::ColumnType::#ty)
            #(#modifiers)*
    }
}

// ================================================================
// Attribute parsing
// ================================================================

#[derive(Clone, Copy)]
enum ColumnKind {
    Text,
    Integer,
    Real,
    Boolean,
    DateTime,
    Json,
    Blob,
}

impl ColumnKind {
    const fn variant(self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Integer => "Integer",
            Self::Real => "Real",
            Self::Boolean => "Boolean",
            Self::DateTime => "DateTime",
            Self::Json => "Json",
            Self::Blob => "Blob",
        }
    }

    fn parse(lit: &LitStr) -> syn::Result<Self> {
        Ok(match lit.value().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            "integer" => Self::Integer,
            "real" => Self::Real,
            "boolean" => Self::Boolean,
            "datetime" => Self::DateTime,
            "json" => Self::Json,
            "blob" => Self::Blob,
            other => {
                return Err(syn::Error::new_spanned(
                    lit,
                    format!("unknown column type '{other}'"),
                ))
            }
        })
    }
}

struct TableAttrs {
    name: String,
    fts: bool,
    tokenizer: Option<String>,
}

struct IndexAttrs {
    name: String,
    columns: Vec<String>,
    unique: bool,
}

#[derive(Default)]
struct ColumnAttrs {
    name: Option<String>,
    primary_key: bool,
    autoincrement: bool,
    unique: bool,
    nullable: bool,
    default: Option<TokenStream2>,
    check: Option<String>,
    references: Option<(String, String)>,
    cascade: bool,
    column_type: Option<ColumnKind>,
}

struct ColumnInfo {
    field_name: Ident,
    column_name: String,
    column_type: ColumnKind,
    nullable: bool,
    attrs: ColumnAttrs,
}

fn parse_table_attrs(attrs: &[Attribute], struct_name: &Ident) -> syn::Result<TableAttrs> {
    let mut table = TableAttrs {
        name: to_snake_case(&struct_name.to_string()),
        fts: false,
        tokenizer: None,
    };
    for attr in attrs.iter().filter(|a| a.path().is_ident("table")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                table.name = meta.value()?.parse::<LitStr>()?.value();
            } else if meta.path.is_ident("fts") {
                table.fts = true;
            } else if meta.path.is_ident("tokenizer") {
                table.tokenizer = Some(meta.value()?.parse::<LitStr>()?.value());
            } else {
                return Err(meta.error("unsupported table attribute"));
            }
            Ok(())
        })?;
    }
    if table.tokenizer.is_some() && !table.fts {
        return Err(syn::Error::new_spanned(
            struct_name,
            "`tokenizer` requires `fts`",
        ));
    }
    Ok(table)
}

fn parse_index_attrs(attrs: &[Attribute]) -> syn::Result<Vec<IndexAttrs>> {
    let mut indexes = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("index")) {
        let mut name = None;
        let mut columns = Vec::new();
        let mut unique = false;
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("columns") {
                columns = meta
                    .value()?
                    .parse::<LitStr>()?
                    .value()
                    .split(',')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect();
            } else if meta.path.is_ident("unique") {
                unique = true;
            } else {
                return Err(meta.error("unsupported index attribute"));
            }
            Ok(())
        })?;
        let name = name.ok_or_else(|| syn::Error::new_spanned(attr, "index requires `name`"))?;
        if columns.is_empty() {
            return Err(syn::Error::new_spanned(attr, "index requires `columns`"));
        }
        indexes.push(IndexAttrs {
            name,
            columns,
            unique,
        });
    }
    Ok(indexes)
}

fn parse_column_attrs(attrs: &[Attribute]) -> syn::Result<ColumnAttrs> {
    let mut result = ColumnAttrs::default();

    for attr in attrs.iter().filter(|a| a.path().is_ident("column")) {
        // #[column] on its own
        if matches!(attr.meta, Meta::Path(_)) {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("primary_key") {
                result.primary_key = true;
            } else if meta.path.is_ident("autoincrement") {
                result.autoincrement = true;
            } else if meta.path.is_ident("unique") {
                result.unique = true;
            } else if meta.path.is_ident("nullable") {
                result.nullable = true;
            } else if meta.path.is_ident("cascade") {
                result.cascade = true;
            } else if meta.path.is_ident("name") {
                result.name = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("check") {
                result.check = Some(meta.value()?.parse::<LitStr>()?.value());
            } else if meta.path.is_ident("default") {
                let value: Expr = meta.value()?.parse()?;
                result.default = Some(default_literal(&value)?);
            } else if meta.path.is_ident("default_now") {
                result.default =
                    Some(quote! { ::slate_core::schema::DefaultValue::CurrentTimestamp });
            } else if meta.path.is_ident("default_expr") {
                let expr = meta.value()?.parse::<LitStr>()?.value();
                result.default = Some(
                    quote! { ::slate_core::schema::DefaultValue::Expression(#expr.to_string()) },
                );
            } else if meta.path.is_ident("references") {
                let lit = meta.value()?.parse::<LitStr>()?;
                let value = lit.value();
                let (table, column) = value.split_once('.').ok_or_else(|| {
                    syn::Error::new_spanned(&lit, "expected \"table.column\"")
                })?;
                result.references = Some((table.to_string(), column.to_string()));
            } else if meta.path.is_ident("type") || meta.path.is_ident("sql_type") {
                result.column_type = Some(ColumnKind::parse(&meta.value()?.parse::<LitStr>()?)?);
            } else {
                return Err(meta.error("unsupported column attribute"));
            }
            Ok(())
        })?;
    }

    Ok(result)
}

/// Turns `default = <literal>` into a `DefaultValue` expression.
fn default_literal(expr: &Expr) -> syn::Result<TokenStream2> {
    let (lit, negative) = match expr {
        Expr::Lit(lit) => (&lit.lit, false),
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => match unary.expr.as_ref() {
            Expr::Lit(lit) => (&lit.lit, true),
            other => return Err(syn::Error::new_spanned(other, "expected a literal default")),
        },
        other => return Err(syn::Error::new_spanned(other, "expected a literal default")),
    };
    let sign = if negative { quote! { - } } else { quote! {} };
    match lit {
        Lit::Str(s) if !negative => {
            Ok(quote! { ::slate_core::schema::DefaultValue::Text(#s.to_string()) })
        }
        Lit::Bool(b) if !negative => {
            Ok(quote! { ::slate_core::schema::DefaultValue::Boolean(#b) })
        }
        Lit::Int(i) => {
            let value: i64 = i.base10_parse()?;
            Ok(quote! { ::slate_core::schema::DefaultValue::Integer(#sign #value) })
        }
        Lit::Float(f) => {
            let value: f64 = f.base10_parse()?;
            Ok(quote! { ::slate_core::schema::DefaultValue::Real(#sign #value) })
        }
        other => Err(syn::Error::new_spanned(other, "unsupported default literal")),
    }
}

// ================================================================
// Type inference
// ================================================================

/// Returns the inner type of `Option<T>` and whether it was optional.
fn unwrap_option(ty: &Type) -> (&Type, bool) {
    if let Type::Path(path) = ty {
        if let Some(segment) = path.path.segments.last() {
            if segment.ident == "Option" {
                if let PathArguments::AngleBracketed(args) = &segment.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return (inner, true);
                    }
                }
            }
        }
    }
    (ty, false)
}

fn infer_column_type(ty: &Type) -> ColumnKind {
    let Type::Path(path) = ty else {
        return ColumnKind::Text;
    };
    let Some(segment) = path.path.segments.last() else {
        return ColumnKind::Text;
    };
    match segment.ident.to_string().as_str() {
        "bool" => ColumnKind::Boolean,
        "i8" | "i16" | "i32" | "i64" | "isize" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            ColumnKind::Integer
        }
        "f32" | "f64" => ColumnKind::Real,
        "DateTime" | "NaiveDateTime" | "NaiveDate" => ColumnKind::DateTime,
        "Value" => ColumnKind::Json,
        "Vec" => match &segment.arguments {
            PathArguments::AngleBracketed(args)
                if matches!(
                    args.args.first(),
                    Some(GenericArgument::Type(Type::Path(inner))) if inner.path.is_ident("u8")
                ) =>
            {
                ColumnKind::Blob
            }
            _ => ColumnKind::Text,
        },
        _ => ColumnKind::Text,
    }
}

fn to_snake_case(s: &str) -> String {
    let mut result = String::new();
    for (i, c) in s.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snake_case_names() {
        assert_eq!(to_snake_case("User"), "user");
        assert_eq!(to_snake_case("BlogPost"), "blog_post");
    }

    #[test]
    fn infers_types_through_option() {
        let ty: Type = syn::parse_quote!(Option<i64>);
        let (inner, optional) = unwrap_option(&ty);
        assert!(optional);
        assert_eq!(infer_column_type(inner).variant(), "Integer");

        let ty: Type = syn::parse_quote!(Vec<u8>);
        assert_eq!(infer_column_type(&ty).variant(), "Blob");
        let ty: Type = syn::parse_quote!(chrono::DateTime<chrono::Utc>);
        assert_eq!(infer_column_type(&ty).variant(), "DateTime");
        let ty: Type = syn::parse_quote!(serde_json::Value);
        assert_eq!(infer_column_type(&ty).variant(), "Json");
        let ty: Type = syn::parse_quote!(uuid::Uuid);
        assert_eq!(infer_column_type(&ty).variant(), "Text");
    }

    #[test]
    fn default_literals() {
        let expr: Expr = syn::parse_quote!(-5);
        let tokens = default_literal(&expr).unwrap().to_string();
        assert!(tokens.contains("Integer"), "{tokens}");
        let expr: Expr = syn::parse_quote!(col_name);
        assert!(default_literal(&expr).is_err());
    }
}
