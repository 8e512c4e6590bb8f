use winnow::ascii::digit1;
use winnow::combinator::{alt, delimited};
use winnow::error::ModalResult;
use winnow::prelude::*;

fn mention<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    delimited(alt(("<@&", "<@!", "<@", "<#")), digit1, '>').parse_next(input)
}

/// Replace role, channel and user mentions with their bare identifiers and
/// trim surrounding whitespace.
///
/// ```
/// assert_eq!(
///     rolesync::parse::normalize_mentions(" <@&12> and not <@&34> "),
///     "12 and not 34"
/// );
/// ```
#[must_use]
pub fn normalize_mentions(text: &str) -> String {
    let mut input = text.trim();
    let mut out = String::with_capacity(input.len());
    while !input.is_empty() {
        let mut attempt = input;
        if let Ok(id) = mention.parse_next(&mut attempt) {
            out.push_str(id);
            input = attempt;
            continue;
        }
        let mut chars = input.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        input = chars.as_str();
    }
    out
}

/// Replace every run of digits with role mention syntax. Display only.
#[must_use]
pub fn render_mentions(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut digits = String::new();
    for c in text.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        flush_role(&mut out, &mut digits);
        out.push(c);
    }
    flush_role(&mut out, &mut digits);
    out
}

fn flush_role(out: &mut String, digits: &mut String) {
    if !digits.is_empty() {
        out.push_str("<@&");
        out.push_str(digits);
        out.push('>');
        digits.clear();
    }
}
