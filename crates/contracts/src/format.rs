//! Message formatter
//!
//! printf-style positional substitution with a strict arity check. The
//! formatter never fails: a malformed template, or a template whose
//! placeholder count differs from the argument count, is returned verbatim.

use std::fmt::{self, Display, Write};

/// Positional argument passed alongside a template
pub type LogArg<'a> = &'a dyn Display;

const CONVERSIONS: &[u8] = b"sdiufFeEgGxXocpaA@";
const FLAGS: &[u8] = b"-+ #0'";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Spec {
    left: bool,
    zero: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

#[derive(Debug, PartialEq, Eq)]
enum Piece<'a> {
    Literal(&'a str),
    Percent,
    Placeholder(Spec),
}

/// Render `template` with `args`.
///
/// - empty template or empty `args`: returned unchanged
/// - malformed template or arity mismatch: returned unchanged
/// - otherwise every placeholder is replaced in order by the `Display` form
///   of its argument, honouring width, `-`, `0` and precision.
pub fn format_message(template: &str, args: &[LogArg<'_>]) -> String {
    if template.is_empty() || args.is_empty() {
        return template.to_string();
    }

    let Some(pieces) = parse(template) else {
        return template.to_string();
    };

    let placeholders = pieces
        .iter()
        .filter(|p| matches!(p, Piece::Placeholder(_)))
        .count();
    if placeholders != args.len() {
        return template.to_string();
    }

    let mut out = String::with_capacity(template.len() + args.len() * 8);
    let mut args = args.iter();
    for piece in pieces {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Percent => out.push('%'),
            Piece::Placeholder(spec) => {
                if let Some(arg) = args.next() {
                    // Writing into a String cannot fail; a Display impl that
                    // errors leaves the partial rendering in place.
                    let _ = render(&mut out, *arg, &spec);
                }
            }
        }
    }
    out
}

/// Number of positional placeholders in `template`, or `None` if the
/// template contains a `%` sequence that is not a valid conversion.
pub fn count_placeholders(template: &str) -> Option<usize> {
    parse(template).map(|pieces| {
        pieces
            .iter()
            .filter(|p| matches!(p, Piece::Placeholder(_)))
            .count()
    })
}

fn render(out: &mut String, arg: &dyn Display, spec: &Spec) -> fmt::Result {
    match (spec.width, spec.precision) {
        (None, None) => write!(out, "{arg}"),
        (None, Some(p)) => write!(out, "{:.p$}", arg, p = p),
        (Some(w), None) if spec.left => write!(out, "{:<w$}", arg, w = w),
        // sign-aware: `%05d` of -42 is "-0042"
        (Some(w), None) if spec.zero => write!(out, "{:0w$}", arg, w = w),
        (Some(w), None) => write!(out, "{:>w$}", arg, w = w),
        (Some(w), Some(p)) if spec.left => write!(out, "{:<w$.p$}", arg, w = w, p = p),
        (Some(w), Some(p)) if spec.zero => write!(out, "{:0w$.p$}", arg, w = w, p = p),
        (Some(w), Some(p)) => write!(out, "{:>w$.p$}", arg, w = w, p = p),
    }
}

fn parse(template: &str) -> Option<Vec<Piece<'_>>> {
    let bytes = template.as_bytes();
    let mut pieces = Vec::new();
    let mut literal_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        if literal_start < i {
            pieces.push(Piece::Literal(&template[literal_start..i]));
        }
        let (piece, next) = parse_conversion(bytes, i + 1)?;
        pieces.push(piece);
        i = next;
        literal_start = next;
    }

    if literal_start < bytes.len() {
        pieces.push(Piece::Literal(&template[literal_start..]));
    }
    Some(pieces)
}

/// Parse the conversion following a `%` at `start - 1`.
///
/// Returns the piece and the index just past it.
fn parse_conversion(bytes: &[u8], start: usize) -> Option<(Piece<'static>, usize)> {
    let mut i = start;
    if bytes.get(i) == Some(&b'%') {
        return Some((Piece::Percent, i + 1));
    }

    let mut spec = Spec::default();
    while let Some(&b) = bytes.get(i) {
        if !FLAGS.contains(&b) {
            break;
        }
        match b {
            b'-' => spec.left = true,
            b'0' => spec.zero = true,
            _ => {}
        }
        i += 1;
    }

    let (width, next) = parse_number(bytes, i);
    spec.width = width;
    i = next;

    if bytes.get(i) == Some(&b'.') {
        let (precision, next) = parse_number(bytes, i + 1);
        spec.precision = Some(precision.unwrap_or(0));
        i = next;
    }

    // Length modifiers carry no meaning for Display rendering
    while let Some(&b) = bytes.get(i) {
        if !b"hlqLzjt".contains(&b) {
            break;
        }
        i += 1;
    }

    let conv = *bytes.get(i)?;
    if !CONVERSIONS.contains(&conv) {
        return None;
    }
    Some((Piece::Placeholder(spec), i + 1))
}

fn parse_number(bytes: &[u8], start: usize) -> (Option<usize>, usize) {
    let mut i = start;
    let mut value: Option<usize> = None;
    while let Some(&b) = bytes.get(i) {
        if !b.is_ascii_digit() {
            break;
        }
        let digit = usize::from(b - b'0');
        value = Some(value.unwrap_or(0).saturating_mul(10).saturating_add(digit));
        i += 1;
    }
    (value, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_in_order() {
        let result = format_message("User %s has %d items", &[&"Alice", &5]);
        assert_eq!(result, "User Alice has 5 items");
    }

    #[test]
    fn test_arity_mismatch_returns_template() {
        let result = format_message("User %s logged in", &[&"Alice", &"Extra"]);
        assert_eq!(result, "User %s logged in");

        let too_few = format_message("%s and %s", &[&"one"]);
        assert_eq!(too_few, "%s and %s");
    }

    #[test]
    fn test_empty_template_ignores_args() {
        assert_eq!(format_message("", &[&"x"]), "");
    }

    #[test]
    fn test_no_args_returns_template() {
        assert_eq!(format_message("Simple message", &[]), "Simple message");
        assert_eq!(format_message("100%% done %s", &[]), "100%% done %s");
    }

    #[test]
    fn test_many_args() {
        let result = format_message("%@ %@ %@ %@", &[&"One", &"Two", &"Three", &"Four"]);
        assert_eq!(result, "One Two Three Four");
    }

    #[test]
    fn test_length_modifiers_and_objc_style() {
        let result = format_message("User %@ has %lld items", &[&"Alice", &5]);
        assert_eq!(result, "User Alice has 5 items");
    }

    #[test]
    fn test_escaped_percent() {
        let result = format_message("%d%% complete", &[&42]);
        assert_eq!(result, "42% complete");
        assert_eq!(count_placeholders("%d%% complete"), Some(1));
    }

    #[test]
    fn test_malformed_template_returned_verbatim() {
        assert_eq!(count_placeholders("50%!"), None);
        assert_eq!(format_message("50%! %s", &[&"today"]), "50%! %s");
        assert_eq!(format_message("trailing %", &[&1]), "trailing %");
    }

    #[test]
    fn test_width_and_precision() {
        assert_eq!(format_message("[%5s]", &[&"ab"]), "[   ab]");
        assert_eq!(format_message("[%-5s]", &[&"ab"]), "[ab   ]");
        assert_eq!(format_message("[%05d]", &[&42]), "[00042]");
        assert_eq!(format_message("%.2f", &[&1.23456]), "1.23");
        assert_eq!(format_message("[%8.3f]", &[&2.5]), "[   2.500]");
    }

    #[test]
    fn test_zero_padding_keeps_sign_first() {
        assert_eq!(format_message("%05d", &[&-42]), "-0042");
        assert_eq!(format_message("[%08.2f]", &[&-3.14159]), "[-0003.14]");
        assert_eq!(format_message("%06.1f", &[&2.5]), "0002.5");
        assert_eq!(format_message("%03d", &[&-1234]), "-1234");
    }

    #[test]
    fn test_unicode_literals_preserved() {
        let result = format_message("résumé %s → ok", &[&"ünïcode"]);
        assert_eq!(result, "résumé ünïcode → ok");
    }

    #[test]
    fn test_count_placeholders() {
        assert_eq!(count_placeholders("no markers"), Some(0));
        assert_eq!(count_placeholders("%s %d %.2f"), Some(3));
    }
}
