use std::fmt;
use std::ops::Not;

use super::RoleId;

/// Expression tree of a rule: AND, OR and NOT over role literals.
///
/// A literal is true when the member holds that role. No other node kinds
/// exist, so evaluation is total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Role(RoleId),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Role(id) => write!(f, "{id}"),
            Expr::And(a, b) => write!(f, "({a} and {b})"),
            Expr::Or(a, b) => write!(f, "({a} or {b})"),
            Expr::Not(inner) => write!(f, "(not {inner})"),
        }
    }
}

impl Expr {
    #[must_use]
    pub fn and(self, other: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(other))
    }

    #[must_use]
    pub fn or(self, other: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(other))
    }

    /// Operands of the chain of ORs rooted at this node, flattened.
    /// A non-OR node yields itself.
    pub(crate) fn or_operands(&self) -> Vec<&Expr> {
        let mut out = Vec::new();
        collect_or_operands(self, &mut out);
        out
    }
}

fn collect_or_operands<'a>(expr: &'a Expr, out: &mut Vec<&'a Expr>) {
    match expr {
        Expr::Or(a, b) => {
            collect_or_operands(a, out);
            collect_or_operands(b, out);
        }
        other => out.push(other),
    }
}

impl Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

/// Literal for a role identifier.
#[must_use]
pub fn role(id: impl Into<RoleId>) -> Expr {
    Expr::Role(id.into())
}
