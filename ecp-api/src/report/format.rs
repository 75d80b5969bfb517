//! French number formatting for reports
//!
//! Thousands are grouped with a narrow no-break space (U+202F) and the
//! decimal separator is a comma, matching fr-FR locale output.

const GROUP_SEPARATOR: char = '\u{202F}';

/// Format with between `min_frac` and `max_frac` fraction digits
pub fn format_decimal(value: f64, min_frac: usize, max_frac: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let rendered = format!("{:.*}", max_frac, value.abs());

    let (int_part, frac_part) = match rendered.split_once('.') {
        Some((i, f)) => (i.to_string(), f.to_string()),
        None => (rendered, String::new()),
    };

    let mut frac = frac_part;
    while frac.len() > min_frac && frac.ends_with('0') {
        frac.pop();
    }

    let mut out = String::new();
    let is_zero = int_part.chars().all(|c| c == '0') && frac.chars().all(|c| c == '0');
    if value < 0.0 && !is_zero {
        out.push('-');
    }
    out.push_str(&group_thousands(&int_part));
    if !frac.is_empty() {
        out.push(',');
        out.push_str(&frac);
    }
    out
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(GROUP_SEPARATOR);
        }
        out.push(c);
    }
    out
}

/// Whole number, e.g. `1 234`
pub fn fmt_int(value: f64) -> String {
    format_decimal(value, 0, 0)
}

/// Line counts
pub fn fmt_count(count: usize) -> String {
    fmt_int(count as f64)
}

/// Emission values: always two decimals, e.g. `12 345,60`
pub fn fmt_kg(value: f64) -> String {
    format_decimal(value, 2, 2)
}

/// Percentage with at most one decimal, e.g. `12,5%`
pub fn fmt_pct(value: f64) -> String {
    format!("{}%", format_decimal(value, 0, 1))
}

/// Escape text for HTML/SVG content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
