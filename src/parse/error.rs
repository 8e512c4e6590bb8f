use std::fmt;

use thiserror::Error;

/// Kind of expression a rule may not contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Construct {
    /// `==`, `!=`, `<`, `<=`, `>`, `>=`, `in`, `is`
    Compare,
    /// Arithmetic and bitwise operators.
    BinOp,
    /// Unary `-`, `+` and `~`.
    UnaryOp,
    /// Anything followed by an argument list.
    Call,
    /// A bare identifier that is not a keyword.
    Name,
    /// Strings, floats and named constants.
    Constant,
}

impl fmt::Display for Construct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Construct::Compare => "Compare",
            Construct::BinOp => "BinOp",
            Construct::UnaryOp => "UnaryOp",
            Construct::Call => "Call",
            Construct::Name => "Name",
            Construct::Constant => "Constant",
        };
        f.write_str(name)
    }
}

/// Rule text that is not a boolean expression over role identifiers.
///
/// Offsets are byte offsets into the mention-normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleSyntaxError {
    #[error("unsupported node type {construct} at offset {offset}: `{fragment}`")]
    Unsupported {
        construct: Construct,
        offset: usize,
        fragment: String,
    },

    #[error("malformed rule at offset {offset}: {message}")]
    Malformed { offset: usize, message: String },
}

impl RuleSyntaxError {
    pub(crate) fn unsupported(construct: Construct, offset: usize, fragment: &str) -> Self {
        Self::Unsupported {
            construct,
            offset,
            fragment: fragment.to_owned(),
        }
    }

    pub(crate) fn malformed(offset: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            message: message.into(),
        }
    }

    /// The rejected construct, if the rule was well-formed but used one.
    #[must_use]
    pub fn construct(&self) -> Option<Construct> {
        match self {
            Self::Unsupported { construct, .. } => Some(*construct),
            Self::Malformed { .. } => None,
        }
    }
}
