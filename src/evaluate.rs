use std::collections::{BTreeSet, HashSet};

use crate::{Expr, RoleId};

/// Evaluate `expr` against the roles a member holds.
///
/// `&&` and `||` give the short-circuit order: AND stops at the first false
/// operand, OR at the first true one.
pub(crate) fn eval_expr(expr: &Expr, roles: &HashSet<RoleId>) -> bool {
    match expr {
        Expr::Role(id) => roles.contains(id),
        Expr::And(a, b) => eval_expr(a, roles) && eval_expr(b, roles),
        Expr::Or(a, b) => eval_expr(a, roles) || eval_expr(b, roles),
        Expr::Not(inner) => !eval_expr(inner, roles),
    }
}

pub(crate) fn collect_role_ids(expr: &Expr, out: &mut BTreeSet<RoleId>) {
    match expr {
        Expr::Role(id) => {
            out.insert(*id);
        }
        Expr::And(a, b) | Expr::Or(a, b) => {
            collect_role_ids(a, out);
            collect_role_ids(b, out);
        }
        Expr::Not(inner) => collect_role_ids(inner, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::role;

    fn roles(ids: &[u64]) -> HashSet<RoleId> {
        ids.iter().copied().map(RoleId).collect()
    }

    #[test]
    fn literal_checks_membership() {
        assert!(eval_expr(&role(1_u64), &roles(&[1, 2])));
        assert!(!eval_expr(&role(3_u64), &roles(&[1, 2])));
    }

    #[test]
    fn literal_against_empty_set_is_false() {
        assert!(!eval_expr(&role(1_u64), &roles(&[])));
    }

    #[test]
    fn and_logic() {
        let expr = role(1_u64).and(role(2_u64));
        assert!(eval_expr(&expr, &roles(&[1, 2])));
        assert!(!eval_expr(&expr, &roles(&[1])));
        assert!(!eval_expr(&expr, &roles(&[2])));
    }

    #[test]
    fn or_logic() {
        let expr = role(1_u64).or(role(2_u64));
        assert!(eval_expr(&expr, &roles(&[1])));
        assert!(eval_expr(&expr, &roles(&[2])));
        assert!(!eval_expr(&expr, &roles(&[3])));
    }

    #[test]
    fn not_logic() {
        let expr = !role(1_u64);
        assert!(!eval_expr(&expr, &roles(&[1])));
        assert!(eval_expr(&expr, &roles(&[])));
    }

    #[test]
    fn x_and_not_y() {
        let expr = role(10_u64).and(!role(20_u64));
        assert!(!eval_expr(&expr, &roles(&[10, 20])));
        assert!(eval_expr(&expr, &roles(&[10])));
        assert!(!eval_expr(&expr, &roles(&[20])));
    }

    #[test]
    fn collects_every_literal_once() {
        let expr = role(3_u64).or(!role(1_u64).and(role(3_u64)));
        let mut out = BTreeSet::new();
        collect_role_ids(&expr, &mut out);
        assert_eq!(out.into_iter().collect::<Vec<_>>(), vec![RoleId(1), RoleId(3)]);
    }
}
