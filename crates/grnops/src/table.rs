//! Minimal CSV reading/writing for numeric matrices with a label column.
//!
//! Handles double-quoted fields (with `""` escapes) but not quoted newlines.

/// Splits one CSV line into fields.
pub fn split_record(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    cur.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if cur.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut cur)),
            _ => cur.push(c),
        }
    }
    fields.push(cur);
    fields
}

/// Quotes a field when it contains a delimiter, quote or line break.
pub fn quote_field(field: &str) -> String {
    if field.contains(&[',', '"', '\n', '\r'][..]) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

pub fn join_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .map(|f| quote_field(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses a numeric cell; empty cells (and the usual NA spellings) are NaN.
pub fn parse_cell(cell: &str) -> Option<f64> {
    let t = cell.trim();
    if t.is_empty() || matches!(t, "NA" | "NaN" | "nan" | "null") {
        return Some(f64::NAN);
    }
    t.parse::<f64>().ok()
}
