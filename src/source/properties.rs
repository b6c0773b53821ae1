//! Parsers for the two property file formats.
//!
//! [`parse`] reads `.properties` text (`key=value`, `key: value` or
//! `key value`, with `#`/`!` comments, backslash line continuations and
//! escapes). [`flatten_yaml`] turns a YAML document into dotted keys.

use serde_yaml::Value;

/// Parse `.properties` text into key/value pairs, in file order.
///
/// Later duplicates are kept; inserting into a store lets the last one win.
pub fn parse(text: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = String::new();
        let mut current = trimmed;
        loop {
            if ends_with_continuation(current) {
                logical.push_str(&current[..current.len() - 1]);
                match lines.next() {
                    Some(next) => current = next.trim_start(),
                    None => break,
                }
            } else {
                logical.push_str(current);
                break;
            }
        }

        pairs.push(split_entry(&logical));
    }
    pairs
}

/// An odd number of trailing backslashes continues the line.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

fn split_entry(line: &str) -> (String, String) {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    let mut j = key_end;
    while j < chars.len() && is_blank(chars[j]) {
        j += 1;
    }
    if j < chars.len() && (chars[j] == '=' || chars[j] == ':') {
        j += 1;
        while j < chars.len() && is_blank(chars[j]) {
            j += 1;
        }
    }

    let key: String = chars[..key_end].iter().collect();
    let value: String = chars[j..].iter().collect();
    (unescape(&key), unescape(&value))
}

fn is_blank(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\u{c}')
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.clone().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if hex.len() == 4 => {
                        out.push(decoded);
                        for _ in 0..4 {
                            chars.next();
                        }
                    }
                    _ => out.push('u'),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

/// Flatten a YAML document into dotted `key=value` pairs.
///
/// Nested mappings join their keys with `.`. Sequences of scalars become a
/// comma-separated value; sequences containing mappings or sequences are
/// indexed as `key[0]`, `key[1]`, .... Nulls become empty strings.
pub fn flatten_yaml(text: &str) -> Result<Vec<(String, String)>, serde_yaml::Error> {
    let root: Value = serde_yaml::from_str(text)?;
    let mut pairs = Vec::new();
    flatten_into(&mut pairs, String::new(), &root);
    Ok(pairs)
}

fn flatten_into(out: &mut Vec<(String, String)>, prefix: String, value: &Value) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let Some(segment) = scalar_text(k) else {
                    continue;
                };
                let key = if prefix.is_empty() {
                    segment
                } else {
                    format!("{prefix}.{segment}")
                };
                flatten_into(out, key, v);
            }
        }
        Value::Sequence(items) => {
            if items.iter().all(|item| scalar_text(item).is_some()) {
                let joined = items
                    .iter()
                    .filter_map(scalar_text)
                    .collect::<Vec<_>>()
                    .join(",");
                if !prefix.is_empty() {
                    out.push((prefix, joined));
                }
            } else {
                for (index, item) in items.iter().enumerate() {
                    flatten_into(out, format!("{prefix}[{index}]"), item);
                }
            }
        }
        Value::Tagged(tagged) => flatten_into(out, prefix, &tagged.value),
        scalar => {
            if let Some(text) = scalar_text(scalar)
                && !prefix.is_empty()
            {
                out.push((prefix, text));
            }
        }
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Tagged(tagged) => scalar_text(&tagged.value),
        Value::Sequence(_) | Value::Mapping(_) => None,
    }
}
