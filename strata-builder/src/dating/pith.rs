//! Distance-to-pith value parser
//!
//! Raw pith distances arrive as free text with measurement modifiers:
//! `~` (estimate), `>` / `&gt;` (greater than), `<` / `&lt;` (less than),
//! `≤` / `≥`, a quoted value (measured width rather than a ring count), or
//! an embedded range `"lower-upper"`. The parser reports the best
//! single-point estimate plus the bounds a caller can pick from when a
//! minimum or maximum estimate is required.

use serde::Serialize;

/// Parsed pith distance.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PithValue {
    /// Best single-point estimate (midpoint for ranges).
    pub value: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    /// Names the detected modifier, e.g. "Estimation".
    pub note: Option<String>,
}

pub fn parse(raw: &str) -> PithValue {
    let mut text = raw
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .trim()
        .to_string();

    let mut out = PithValue::default();

    // Quoted values are measured widths, not ring counts.
    if text.len() >= 2 && text.starts_with('"') && text.ends_with('"') {
        out.note = Some("Measured width".to_string());
        text = text[1..text.len() - 1].trim().to_string();
    }

    if let Some(rest) = text.strip_prefix('~') {
        out.note = Some("Estimation".to_string());
        text = rest.trim().to_string();
    } else if let Some(rest) = text.strip_prefix('≥') {
        out.note = Some("Greater than or equal to".to_string());
        text = rest.trim().to_string();
    } else if let Some(rest) = text.strip_prefix('≤') {
        out.note = Some("Less than or equal to".to_string());
        text = rest.trim().to_string();
    } else if let Some(rest) = text.strip_prefix('>') {
        out.note = Some("Greater than".to_string());
        text = rest.trim().to_string();
    } else if let Some(rest) = text.strip_prefix('<') {
        out.note = Some("Less than".to_string());
        text = rest.trim().to_string();
    }

    // Embedded range "lower-upper"; a leading minus is not a range.
    let dash = text
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-')
        .map(|(i, _)| i);
    if let Some(i) = dash {
        let (left, right) = (&text[..i], &text[i + 1..]);
        if let (Ok(lower), Ok(upper)) = (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
            out.lower = Some(lower);
            out.upper = Some(upper);
            out.value = Some((lower + upper) / 2.0);
            if out.note.is_none() {
                out.note = Some("Range".to_string());
            }
            return out;
        }
    }

    match text.parse::<f64>() {
        Ok(v) => {
            out.value = Some(v);
            // Inequalities bound the true distance on one side only.
            match out.note.as_deref() {
                Some("Greater than") | Some("Greater than or equal to") => out.lower = Some(v),
                Some("Less than") | Some("Less than or equal to") => out.upper = Some(v),
                _ => {}
            }
        }
        Err(_) => {
            if !text.is_empty() {
                out.note = Some("Unparseable".to_string());
            }
        }
    }

    out
}
