use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::parse::{self, RuleSyntaxError};

use super::expr::Expr;
use super::RoleId;

/// A boolean condition over the roles a member holds.
///
/// Created by parsing moderator input with [`Rule::parse()`] or from a built
/// expression with [`Rule::from_expr()`]. Rules are immutable; changing a
/// rule means replacing it in the [`RuleSet`](super::RuleSet).
///
/// ```
/// use std::collections::HashSet;
/// use rolesync::{Rule, RoleId};
///
/// let rule = Rule::parse("<@&10> and not <@&20>").unwrap();
/// assert_eq!(rule.source_text(), "10 and not 20");
///
/// let roles: HashSet<RoleId> = [RoleId(10)].into();
/// assert!(rule.evaluate(&roles));
/// ```
#[derive(Debug, Clone)]
pub struct Rule {
    source: String,
    expr: Expr,
}

impl Rule {
    /// Parse rule text, normalizing mentions to bare identifiers first.
    ///
    /// # Errors
    ///
    /// Returns [`RuleSyntaxError`] if the text is not a boolean expression
    /// over role identifiers.
    pub fn parse(text: &str) -> Result<Self, RuleSyntaxError> {
        let source = parse::normalize_mentions(text);
        let expr = parse::parse(&source)?;
        Ok(Self { source, expr })
    }

    #[must_use]
    pub fn from_expr(expr: Expr) -> Self {
        Self {
            source: expr.to_string(),
            expr,
        }
    }

    /// The normalized text, with mentions replaced by identifiers.
    #[must_use]
    pub fn source_text(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Whether a member holding `roles` satisfies this rule.
    #[must_use]
    pub fn evaluate(&self, roles: &HashSet<RoleId>) -> bool {
        crate::evaluate::eval_expr(&self.expr, roles)
    }

    #[must_use]
    pub fn render_with_mentions(&self) -> String {
        parse::render_mentions(&self.source)
    }

    /// Every role identifier used as a literal in this rule.
    #[must_use]
    pub fn referenced_role_ids(&self) -> BTreeSet<RoleId> {
        let mut out = BTreeSet::new();
        crate::evaluate::collect_role_ids(&self.expr, &mut out);
        out
    }

    /// True when the rule is an `or` with a bare role among its operands.
    ///
    /// A channel can grant access to such a role directly, so channel rules
    /// of this shape are refused.
    #[must_use]
    pub fn is_top_level_or_with_role(&self) -> bool {
        matches!(self.expr, Expr::Or(_, _))
            && self
                .expr
                .or_operands()
                .iter()
                .any(|e| matches!(e, Expr::Role(_)))
    }
}

impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for Rule {}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for Rule {
    type Err = RuleSyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
