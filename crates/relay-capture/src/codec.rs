//! Single-line object encoding for captured records.
//!
//! Only backslash, double quote, newline, carriage return and tab are escaped.
//! There is no decoder; lines are consumed by external tooling.

pub fn encode<'a, I>(fields: I) -> String
where
    I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
{
    let mut out = String::from("{");
    for (idx, (key, value)) in fields.into_iter().enumerate() {
        if idx > 0 {
            out.push(',');
        }
        out.push('"');
        escape_into(&mut out, key);
        out.push_str("\":");
        match value {
            Some(value) => {
                out.push('"');
                escape_into(&mut out, value);
                out.push('"');
            }
            None => out.push_str("null"),
        }
    }
    out.push('}');
    out
}

fn escape_into(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
}
