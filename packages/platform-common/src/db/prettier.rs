//! Render SQL with its bound arguments inlined, for log lines only.
//!
//! The output is not safe to execute.

use sea_orm::Value;

/// Postgres-style positional placeholder prefix (`$1`, `$2`, ...).
pub const PLACEHOLDER_DOLLAR: &str = "$";

/// Inline `args` into `query` and collapse it onto one line.
///
/// Placeholders are numbered from 1. They are replaced from the highest index
/// down so that `$1` never eats the prefix of `$10`.
pub fn pretty(query: &str, placeholder: &str, args: &[Value]) -> String {
    let mut out = query.to_string();

    for (i, arg) in args.iter().enumerate().rev() {
        let token = format!("{placeholder}{}", i + 1);
        out = out.replace(&token, &render(arg));
    }

    out.replace('\t', "").replace('\n', " ").trim().to_string()
}

fn render(value: &Value) -> String {
    match value {
        Value::Bool(Some(v)) => v.to_string(),
        Value::TinyInt(Some(v)) => v.to_string(),
        Value::SmallInt(Some(v)) => v.to_string(),
        Value::Int(Some(v)) => v.to_string(),
        Value::BigInt(Some(v)) => v.to_string(),
        Value::TinyUnsigned(Some(v)) => v.to_string(),
        Value::SmallUnsigned(Some(v)) => v.to_string(),
        Value::Unsigned(Some(v)) => v.to_string(),
        Value::BigUnsigned(Some(v)) => v.to_string(),
        Value::Float(Some(v)) => v.to_string(),
        Value::Double(Some(v)) => v.to_string(),
        Value::Char(Some(v)) => format!("{:?}", v.to_string()),
        Value::String(Some(v)) => format!("{:?}", v.as_str()),
        Value::Bytes(Some(v)) => format!("{:?}", String::from_utf8_lossy(v)),
        Value::Bool(None)
        | Value::TinyInt(None)
        | Value::SmallInt(None)
        | Value::Int(None)
        | Value::BigInt(None)
        | Value::TinyUnsigned(None)
        | Value::SmallUnsigned(None)
        | Value::Unsigned(None)
        | Value::BigUnsigned(None)
        | Value::Float(None)
        | Value::Double(None)
        | Value::Char(None)
        | Value::String(None)
        | Value::Bytes(None) => "NULL".to_string(),
        other => format!("{other:?}"),
    }
}
