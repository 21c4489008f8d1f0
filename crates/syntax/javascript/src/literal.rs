//! Literal text decoding.

/// Parse a JavaScript numeric literal (decimal, hex, octal, binary, with
/// optional `_` separators). BigInt literals return `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    if text.ends_with('n') {
        return None;
    }
    let cleaned: String = text.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    let radix = |digits: &str, base: u32| -> Option<f64> {
        u64::from_str_radix(digits, base).ok().map(|v| v as f64)
    };
    if let Some(hex) = lower.strip_prefix("0x") {
        return radix(hex, 16);
    }
    if let Some(oct) = lower.strip_prefix("0o") {
        return radix(oct, 8);
    }
    if let Some(bin) = lower.strip_prefix("0b") {
        return radix(bin, 2);
    }
    lower.parse::<f64>().ok()
}

fn hex_value(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Decode the escape sequences of a string or template segment.
///
/// `raw` is the text between the delimiters. Unknown escapes decode to the
/// escaped character itself, line continuations decode to nothing, and
/// surrogate pairs written as two `\u` escapes are joined.
pub fn unescape(raw: &str) -> String {
    let mut units: Vec<u16> = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    let push_char = |units: &mut Vec<u16>, c: char| {
        let mut buf = [0u16; 2];
        units.extend_from_slice(c.encode_utf16(&mut buf));
    };

    while let Some(c) = chars.next() {
        if c != '\\' {
            push_char(&mut units, c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            break;
        };
        match escaped {
            'n' => units.push(u16::from(b'\n')),
            't' => units.push(u16::from(b'\t')),
            'r' => units.push(u16::from(b'\r')),
            'b' => units.push(0x08),
            'f' => units.push(0x0c),
            'v' => units.push(0x0b),
            '0' if !chars.peek().is_some_and(|d| d.is_ascii_digit()) => units.push(0),
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            'x' => {
                let digits: String = chars.by_ref().take(2).collect();
                match hex_value(&digits) {
                    Some(v) => units.push(v as u16),
                    None => {
                        units.push(u16::from(b'x'));
                        digits.chars().for_each(|d| push_char(&mut units, d));
                    }
                }
            }
            'u' => {
                let value = if chars.peek() == Some(&'{') {
                    chars.next();
                    let digits: String = chars.by_ref().take_while(|d| *d != '}').collect();
                    hex_value(&digits)
                } else {
                    let digits: String = chars.by_ref().take(4).collect();
                    hex_value(&digits)
                };
                match value {
                    Some(v) if v <= 0xFFFF => units.push(v as u16),
                    Some(v) => match char::from_u32(v) {
                        Some(c) => push_char(&mut units, c),
                        None => push_char(&mut units, char::REPLACEMENT_CHARACTER),
                    },
                    None => push_char(&mut units, char::REPLACEMENT_CHARACTER),
                }
            }
            other => push_char(&mut units, other),
        }
    }

    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
