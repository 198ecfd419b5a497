//! # Value Model
//!
//! Splits a property-declaration body into `name[easing]:value` pairs and
//! lifts every numeric literal out of the value text into positional slots,
//! yielding `{template, numbers}` pairs the interpolator can blend.
//!
//! A leading `!` marker stores the value verbatim so discrete values (a
//! visibility toggle, say) are never numerically blended. Integer-triplet
//! `rgb()`/`rgba()` colors are normalized to percentage notation first so
//! channel interpolation stays linear and consistent with the
//! percentage-color path.
//!
//! Everything here is pure; errors bubble up as plain reasons and become
//! `InvalidDeclaration` at the parser level.

use scrollkit_data::{format_number, PropertySpec, PropertyValue, SLOT};

/// Parse a full declaration body into property specs.
pub fn parse_body(body: &str) -> Result<Vec<PropertySpec>, String> {
    let mut out = Vec::new();
    for stmt in body.split(';') {
        let stmt = stmt.trim();
        if stmt.is_empty() {
            continue;
        }
        let (head, value) = stmt
            .split_once(':')
            .ok_or_else(|| format!("missing `:` in `{stmt}`"))?;
        let (name, easing) = parse_head(head.trim())?;
        out.push(PropertySpec {
            name,
            easing,
            value: parse_value(value.trim()),
        });
    }
    Ok(out)
}

/// Parse a single value into its tokenized (or verbatim) form.
pub fn parse_value(value: &str) -> PropertyValue {
    if let Some(rest) = value.strip_prefix('!') {
        PropertyValue::Verbatim {
            text: rest.trim_start().to_string(),
        }
    } else {
        tokenize(&normalize_colors(value))
    }
}

/// `name` or `name[easing]`.
fn parse_head(head: &str) -> Result<(String, Option<String>), String> {
    if let Some(open) = head.find('[') {
        let name = head[..open].trim();
        let rest = &head[open + 1..];
        let close = rest
            .find(']')
            .ok_or_else(|| format!("unterminated easing override in `{head}`"))?;
        if !rest[close + 1..].trim().is_empty() {
            return Err(format!("trailing text after easing override in `{head}`"));
        }
        if name.is_empty() {
            return Err(format!("empty property name in `{head}`"));
        }
        Ok((name.to_string(), Some(rest[..close].trim().to_string())))
    } else if head.is_empty() {
        Err("empty property name".to_string())
    } else {
        Ok((head.to_string(), None))
    }
}

/// Replace every numeric literal, left to right, with a positional slot.
fn tokenize(raw: &str) -> PropertyValue {
    let mut template = String::with_capacity(raw.len());
    let mut numbers = Vec::new();
    let mut rest = raw;
    while !rest.is_empty() {
        if let Some((value, len)) = lex_number(rest) {
            numbers.push(value);
            template.push_str(SLOT);
            rest = &rest[len..];
        } else {
            let ch = rest.chars().next().unwrap_or_default();
            template.push(ch);
            rest = &rest[ch.len_utf8()..];
        }
    }
    PropertyValue::Tokenized { template, numbers }
}

/// Lex `[+-]?\d*\.?\d+` at the start of `s`. A sign or a dot with no
/// trailing digit is not a number.
fn lex_number(s: &str) -> Option<(f64, usize)> {
    let b = s.as_bytes();
    let mut i = 0;
    if matches!(b.first(), Some(b'-') | Some(b'+')) {
        i = 1;
    }
    let int_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    let int_digits = i - int_start;
    if b.get(i) == Some(&b'.') {
        let mut k = i + 1;
        while k < b.len() && b[k].is_ascii_digit() {
            k += 1;
        }
        if k > i + 1 {
            i = k;
        }
    }
    if i == int_start && int_digits == 0 {
        return None;
    }
    if !b[..i].iter().any(u8::is_ascii_digit) {
        return None;
    }
    s[..i].parse::<f64>().ok().map(|v| (v, i))
}

/// Rewrite integer-triplet `rgb()`/`rgba()` calls to percentage channels.
fn normalize_colors(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(pos) = find_color_call(rest) {
        let (pre, call) = rest.split_at(pos);
        out.push_str(pre);
        let open = match call.find('(') {
            Some(i) => i,
            None => {
                rest = call;
                break;
            }
        };
        let Some(close) = call.find(')') else {
            // Unterminated call, leave the tail untouched.
            rest = call;
            break;
        };
        let func = &call[..open];
        let args = &call[open + 1..close];
        out.push_str(func);
        out.push('(');
        out.push_str(&normalize_channels(args));
        out.push(')');
        rest = &call[close + 1..];
    }
    out.push_str(rest);
    out
}

fn find_color_call(s: &str) -> Option<usize> {
    let lower = s.to_ascii_lowercase();
    let mut from = 0;
    while let Some(i) = lower[from..].find("rgb") {
        let at = from + i;
        let tail = &lower[at + 3..];
        if tail.starts_with('(') || tail.starts_with("a(") {
            return Some(at);
        }
        from = at + 3;
    }
    None
}

fn normalize_channels(args: &str) -> String {
    let channels: Vec<&str> = args.split(',').map(str::trim).collect();
    if channels.len() < 3 {
        return args.to_string();
    }
    let is_plain_int = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !channels[..3].iter().all(|c| is_plain_int(c)) {
        return args.to_string();
    }
    let mut out: Vec<String> = channels[..3]
        .iter()
        .map(|c| {
            let v: f64 = c.parse().unwrap_or(0.0);
            format!("{}%", format_number(v / 255.0 * 100.0))
        })
        .collect();
    for extra in &channels[3..] {
        out.push((*extra).to_string());
    }
    out.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_statements_and_tokenizes() {
        let props = parse_body("opacity:0; transform: translate(0px, 0px);").unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].name, "opacity");
        assert_eq!(props[0].value.slot_count(), 1);
        assert_eq!(props[1].value.slot_count(), 2);
        assert_eq!(props[1].value.render(), "translate(0px, 0px)");
    }

    #[test]
    fn easing_override_in_brackets() {
        let props = parse_body("top[outCubic]:-100px").unwrap();
        assert_eq!(props[0].name, "top");
        assert_eq!(props[0].easing.as_deref(), Some("outCubic"));
        match &props[0].value {
            PropertyValue::Tokenized { numbers, .. } => assert_eq!(numbers, &[-100.0]),
            other => panic!("expected tokenized value, got {other:?}"),
        }
    }

    #[test]
    fn literal_marker_keeps_value_verbatim() {
        let props = parse_body("display:!hidden").unwrap();
        assert_eq!(
            props[0].value,
            PropertyValue::Verbatim {
                text: "hidden".into()
            }
        );
    }

    #[test]
    fn negative_and_fractional_numbers() {
        let props = parse_body("margin:-.5em .25em").unwrap();
        match &props[0].value {
            PropertyValue::Tokenized { numbers, .. } => assert_eq!(numbers, &[-0.5, 0.25]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integer_rgb_normalized_to_percent() {
        let a = parse_value("rgb(0,0,255)");
        let b = parse_value("rgb(0%,0%,100%)");
        match (&a, &b) {
            (
                PropertyValue::Tokenized {
                    numbers: na,
                    template: ta,
                },
                PropertyValue::Tokenized {
                    numbers: nb,
                    template: tb,
                },
            ) => {
                assert_eq!(na, nb);
                assert_eq!(ta, tb);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn percent_rgb_left_untouched() {
        let v = parse_value("rgba(10%, 20%, 30%, 0.5)");
        assert_eq!(v.render(), "rgba(10%, 20%, 30%, 0.5)");
    }

    #[test]
    fn rgba_alpha_is_not_rescaled() {
        match parse_value("rgba(255,0,0,1)") {
            PropertyValue::Tokenized { numbers, .. } => {
                assert_eq!(numbers, vec![100.0, 0.0, 0.0, 1.0]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_colon_is_an_error() {
        assert!(parse_body("opacity 1").is_err());
    }
}
