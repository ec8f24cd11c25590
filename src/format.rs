use crate::schema::{FieldValue, FormatCategory, RecordField};

/// Escapes the characters that would otherwise open markup inside substituted text.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            // Keeps values from adding cells when they land inside a pipe table row.
            '|' => out.push_str("&#124;"),
            _ => out.push(ch),
        }
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn group_signed(rendered: &str) -> String {
    let (sign, rest) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut out = String::from(sign);
    out.push_str(&group_thousands(int_part));
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

/// Whole number with thousands separators; ties round to even.
pub fn fmt_int(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let rounded = value.round_ties_even();
    // -0.4 rounds to -0; drop the sign.
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    group_signed(&format!("{rounded:.0}"))
}

pub fn fmt_integer(value: i64) -> String {
    group_signed(&value.to_string())
}

pub fn fmt_currency(value: f64) -> String {
    format!("${}", fmt_int(value))
}

pub fn fmt_percent(value: f64, digits: usize) -> String {
    format!("{value:.digits$}%")
}

pub fn fmt_decimal(value: f64, digits: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    group_signed(&format!("{value:.digits$}"))
}

fn fmt_number(value: &FieldValue, category: FormatCategory) -> Option<String> {
    let rendered = match (value, category) {
        (FieldValue::Integer(v), FormatCategory::Integer) => fmt_integer(*v),
        (FieldValue::Integer(v), FormatCategory::Currency) => format!("${}", fmt_integer(*v)),
        (_, FormatCategory::Currency) => fmt_currency(value.as_f64()?),
        (_, FormatCategory::Percent) => fmt_percent(value.as_f64()?, 1),
        (_, FormatCategory::Decimal) => fmt_decimal(value.as_f64()?, 1),
        (_, FormatCategory::Integer) => fmt_int(value.as_f64()?),
        _ => return None,
    };
    Some(rendered)
}

/// Renders a field for insertion into the template. Output is HTML-safe: text and list
/// items are escaped, bullet lists come back as `<ul>` markup.
pub fn format_value(field: &RecordField) -> String {
    match &field.value {
        FieldValue::List(items) => match field.category {
            FormatCategory::BulletList => {
                let mut out = String::from("<ul>");
                for item in items {
                    out.push_str("<li>");
                    out.push_str(&escape_html(item));
                    out.push_str("</li>");
                }
                out.push_str("</ul>");
                out
            }
            _ => escape_html(&items.join(", ")),
        },
        FieldValue::Text(text) => escape_html(text),
        number => match fmt_number(number, field.category) {
            Some(rendered) => rendered,
            None => match number {
                FieldValue::Integer(v) => v.to_string(),
                FieldValue::Real(v) => v.to_string(),
                _ => String::new(),
            },
        },
    }
}
