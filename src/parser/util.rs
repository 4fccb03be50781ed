//! Literal decoding helpers shared by the AST builder and the printer.

use crate::parser::ast::NumberLiteralType;

pub const TAB_WIDTH: usize = 2;

pub fn spaces(time: usize) -> String {
    " ".repeat(time)
}

/// Decodes a decimal integer literal, promoting to a float when it does not fit in 64 bits.
pub fn parse_integer_literal(text: &str) -> Result<NumberLiteralType, String> {
    match text.parse::<i64>() {
        Ok(i) => Ok(NumberLiteralType::IntegerLiteral(i)),
        Err(_) => text
            .parse::<f64>()
            .map(NumberLiteralType::FloatLiteral)
            .map_err(|_| format!("Invalid integer literal: {}", text)),
    }
}

/// Decodes `0x..` literals. Values beyond 64 bits are rejected.
pub fn parse_hex_literal(text: &str) -> Result<NumberLiteralType, String> {
    let digits = &text[2..];
    u64::from_str_radix(digits, 16)
        .map(|v| NumberLiteralType::IntegerLiteral(v as i64))
        .map_err(|_| format!("Hex literal out of range: {}", text))
}

pub fn parse_float_literal(text: &str) -> Result<NumberLiteralType, String> {
    text.parse::<f64>()
        .map(NumberLiteralType::FloatLiteral)
        .map_err(|_| format!("Invalid number literal: {}", text))
}

/// Resolves backslash escapes inside a string literal body.
pub fn unescape_string(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let escaped = chars
            .next()
            .ok_or_else(|| "Unterminated escape sequence".to_string())?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => out.push(read_code_point(&mut chars, 2)?),
            'u' => out.push(read_code_point(&mut chars, 4)?),
            other => out.push(other),
        }
    }
    Ok(out)
}

fn read_code_point(chars: &mut std::str::Chars, digits: usize) -> Result<char, String> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.len() != digits {
        return Err(format!("Invalid escape sequence: {}", hex));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(std::char::from_u32)
        .ok_or_else(|| format!("Invalid escape sequence: {}", hex))
}

/// Produces a double-quoted literal that `unescape_string` decodes back to `value`.
pub fn escape_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Formats a float so that it re-parses as a float literal.
pub fn format_float_literal(value: f64) -> String {
    let text = format!("{:?}", value);
    if text.contains('.') || text.contains('e') || text.contains("inf") || text.contains("NaN") {
        text
    } else {
        format!("{}.0", text)
    }
}
