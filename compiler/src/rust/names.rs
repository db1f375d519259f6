// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "do",
    "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl", "in",
    "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "static", "struct", "trait", "true", "try", "type", "typeof", "unsafe", "unsized",
    "use", "virtual", "where", "while", "yield",
];

// Words of an identifier, split on separators and case changes
fn words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

// Keywords that cannot be raw identifiers
const RESERVED: &[&str] = &["self", "super", "crate", "Self"];

fn escape(ident: String) -> String {
    if RESERVED.contains(&ident.as_str()) {
        format!("{ident}_")
    } else if KEYWORDS.contains(&ident.as_str()) {
        format!("r#{ident}")
    } else if ident.starts_with(|c: char| c.is_ascii_digit()) || ident.is_empty() {
        format!("_{ident}")
    } else {
        ident
    }
}

/// `ReserveAsync` -> `reserve_async`
pub fn snake_name(name: &str) -> String {
    let joined = words(name)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    escape(joined)
}

/// Module holding a service: `shop.Inventory` -> `shop_inventory`
pub fn module_name(service_name: &str) -> String {
    snake_name(service_name)
}

/// `ReserveAsync` -> `RESERVE_ASYNC`
pub fn const_name(name: &str) -> String {
    let joined = words(name)
        .iter()
        .map(|w| w.to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join("_");
    if joined.starts_with(|c: char| c.is_ascii_digit()) {
        format!("_{joined}")
    } else {
        joined
    }
}

/// Trait name of a service, from the last segment of its dotted name
pub fn type_name(service_name: &str) -> String {
    let last = service_name.rsplit('.').next().unwrap_or(service_name);
    let mut out = String::new();
    for word in words(last) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.push_str(chars.as_str());
        }
    }
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, 'S');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_name() {
        assert_eq!(snake_name("ReserveAsync"), "reserve_async");
        assert_eq!(snake_name("HTTPGet"), "http_get");
        assert_eq!(snake_name("getV2Items"), "get_v2_items");
        assert_eq!(snake_name("Type"), "r#type");
        assert_eq!(snake_name("Self"), "self_");
        assert_eq!(
            module_name("app.Repository-Int32-Nullable-String"),
            "app_repository_int32_nullable_string"
        );
    }

    #[test]
    fn test_const_and_type_names() {
        assert_eq!(const_name("ReserveAsync"), "RESERVE_ASYNC");
        assert_eq!(type_name("shop.Inventory"), "Inventory");
        assert_eq!(
            type_name("app.Repository-Int32-Nullable-String"),
            "RepositoryInt32NullableString"
        );
        assert_eq!(type_name("math.v1.calc"), "Calc");
    }
}
