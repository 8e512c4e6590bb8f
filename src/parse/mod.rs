mod error;
mod grammar;
mod mention;

pub use error::{Construct, RuleSyntaxError};
pub use mention::{normalize_mentions, render_mentions};

use crate::Expr;

/// Parse normalized rule text into an expression tree.
///
/// The text must already have mentions replaced by bare identifiers; see
/// [`normalize_mentions`].
///
/// # Errors
///
/// Returns [`RuleSyntaxError`] if the text is not a boolean expression over
/// integer literals.
pub fn parse(input: &str) -> Result<Expr, RuleSyntaxError> {
    let tokens = grammar::lex(input)?;
    grammar::ExprParser::new(input, tokens).parse()
}
