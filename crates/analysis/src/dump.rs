//! Debug dump of the value sets, keyed by stable token ids.

use std::fmt::Write as _;

use crate::tokens::{Token, TokenList};
use crate::values::{Bound, Value, ValueKind, ValueType};

/// Stable identifier of a token: `file:line:column:text`.
pub fn token_id(list: &TokenList, tok: Token) -> String {
    let data = &list[tok];
    format!(
        "{}:{}:{}:{}",
        list.file_name(data.file_index),
        data.line,
        data.column,
        data.text
    )
}

fn kind_str(value: &Value) -> &'static str {
    match value.kind {
        ValueKind::Known | ValueKind::Impossible => "always",
        ValueKind::Inconclusive => "inconclusive",
        ValueKind::Possible => "possible",
    }
}

fn value_str(value: &Value) -> String {
    let mut s = String::new();
    if value.is_impossible() {
        s.push('!');
    }
    match value.bound {
        Bound::Point => {}
        Bound::Upper => s.push_str("<="),
        Bound::Lower => s.push_str(">="),
    }
    match value.value_type {
        ValueType::Int => {
            let _ = write!(s, "{}", value.int_value);
        }
        ValueType::Float => {
            let _ = write!(s, "{}", value.float_value);
        }
        ValueType::Tok => s.push_str("<expr>"),
        ValueType::Moved => s.push_str("<moved>"),
        ValueType::Uninit => s.push_str("<uninit>"),
        ValueType::BufferSize => {
            let _ = write!(s, "buffer-size={}", value.int_value);
        }
        ValueType::ContainerSize => {
            let _ = write!(s, "container-size={}", value.int_value);
        }
        ValueType::IteratorStart => {
            let _ = write!(s, "iterator-start={}", value.int_value);
        }
        ValueType::IteratorEnd => {
            let _ = write!(s, "iterator-end={}", value.int_value);
        }
        ValueType::Lifetime => s.push_str("<lifetime>"),
        ValueType::Symbolic => {
            let _ = write!(s, "symbolic+{}", value.int_value);
        }
    }
    s
}

/// Plain-text listing of every token's value set.
pub fn dump_text(list: &TokenList) -> String {
    let mut out = String::new();
    for tok in list.tokens() {
        let values = list.values(tok);
        if values.is_empty() {
            continue;
        }
        let _ = write!(out, "{}", token_id(list, tok));
        for value in values {
            let _ = write!(out, " {{{} {}}}", kind_str(value), value_str(value));
        }
        out.push('\n');
    }
    out
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// XML dump of every token's value set.
pub fn dump_xml(list: &TokenList) -> String {
    let mut out = String::from("<valueflow>\n");
    for tok in list.tokens() {
        let values = list.values(tok);
        if values.is_empty() {
            continue;
        }
        let _ = writeln!(
            out,
            "  <token id=\"{}\">",
            xml_escape(&token_id(list, tok))
        );
        for value in values {
            let _ = writeln!(
                out,
                "    <value kind=\"{}\" value=\"{}\"/>",
                kind_str(value),
                xml_escape(&value_str(value))
            );
        }
        out.push_str("  </token>\n");
    }
    out.push_str("</valueflow>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::{Language, TokenData};
    use crate::values::as_impossible;

    #[test]
    fn dump_shows_kind_and_payload() {
        let mut list = TokenList::new(Language::Cpp);
        list.add_file("test.cpp");
        let mut data = TokenData::new("x");
        data.line = 3;
        data.column = 5;
        let tok = list.push_back(data);
        list.add_value(tok, Value::known_int(42));
        list.add_value(tok, as_impossible(Value::new_int(0)));
        let text = dump_text(&list);
        assert!(text.contains("test.cpp:3:5:x"));
        assert!(text.contains("{always 42}"));
        assert!(text.contains("{always !0}"));
        let xml = dump_xml(&list);
        assert!(xml.contains("<token id=\"test.cpp:3:5:x\">"));
        assert!(xml.contains("value=\"42\""));
    }
}
