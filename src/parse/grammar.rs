use winnow::ascii::{digit0, digit1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_while};

use crate::{Expr, RoleId};

use super::error::{Construct, RuleSyntaxError};

// -- Lexing -----------------------------------------------------------------
//
// The lexer accepts far more than the rule language so that the tree builder
// can name what it rejects instead of failing on the first odd character.

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Int(u64),
    Oversized,
    LParen,
    RParen,
    And,
    Or,
    Not,
    Compare,
    Arith,
    Tilde,
    Name,
    Constant,
    Punct,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    kind: TokenKind,
    offset: usize,
    len: usize,
}

fn number(input: &mut &str) -> ModalResult<TokenKind> {
    let digits = digit1.parse_next(input)?;
    if opt(preceded('.', digit0)).parse_next(input)?.is_some() {
        return Ok(TokenKind::Constant);
    }
    Ok(digits
        .parse::<u64>()
        .map_or(TokenKind::Oversized, TokenKind::Int))
}

fn word(input: &mut &str) -> ModalResult<TokenKind> {
    let w = (
        take_while(1.., |c: char| c.is_alphabetic() || c == '_'),
        take_while(0.., |c: char| c.is_alphanumeric() || c == '_'),
    )
        .take()
        .parse_next(input)?;
    Ok(match w {
        "and" | "AND" => TokenKind::And,
        "or" | "OR" => TokenKind::Or,
        "not" | "NOT" => TokenKind::Not,
        "in" | "is" => TokenKind::Compare,
        "True" | "False" | "None" | "true" | "false" => TokenKind::Constant,
        _ => TokenKind::Name,
    })
}

fn string_literal(input: &mut &str) -> ModalResult<TokenKind> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    take_till(0.., move |c: char| c == quote).parse_next(input)?;
    opt(one_of(quote)).parse_next(input)?;
    Ok(TokenKind::Constant)
}

fn operator(input: &mut &str) -> ModalResult<TokenKind> {
    alt((
        alt(("==", "!=", "<>", "<=", ">=")).value(TokenKind::Compare),
        alt(("**", "//", "<<", ">>")).value(TokenKind::Arith),
        one_of(['<', '>']).value(TokenKind::Compare),
        one_of(['+', '-', '*', '/', '%', '&', '|', '^', '@']).value(TokenKind::Arith),
        '~'.value(TokenKind::Tilde),
        '('.value(TokenKind::LParen),
        ')'.value(TokenKind::RParen),
        one_of([',', '.', '=', ':', '[', ']', '{', '}']).value(TokenKind::Punct),
    ))
    .parse_next(input)
}

fn token(input: &mut &str) -> ModalResult<TokenKind> {
    alt((number, word, string_literal, operator)).parse_next(input)
}

pub(crate) fn lex(source: &str) -> Result<Vec<Token>, RuleSyntaxError> {
    let mut tokens = Vec::new();
    let mut input = source.trim_start();
    while !input.is_empty() {
        let offset = source.len() - input.len();
        let kind = token.parse_next(&mut input).map_err(|_| {
            let ch = source[offset..].chars().next().unwrap_or_default();
            RuleSyntaxError::malformed(offset, format!("unexpected character `{ch}`"))
        })?;
        let len = source.len() - input.len() - offset;
        tokens.push(Token { kind, offset, len });
        input = input.trim_start();
    }
    Ok(tokens)
}

// -- Expressions (precedence: OR < AND < NOT < primary) ---------------------

/// Deepest combined nesting of `(` and `not` a rule may use.
pub(crate) const MAX_DEPTH: usize = 64;

/// Most role literals one rule may contain. Chains of `and`/`or` nest the
/// tree one level per operand, so this bounds the tree height.
pub(crate) const MAX_LITERALS: usize = 1024;

pub(crate) struct ExprParser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    literals: usize,
}

impl<'s> ExprParser<'s> {
    pub(crate) fn new(source: &'s str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            depth: 0,
            literals: 0,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Expr, RuleSyntaxError> {
        if self.tokens.is_empty() {
            return Err(RuleSyntaxError::malformed(0, "empty rule"));
        }
        let expr = self.or_expr()?;
        match self.tokens.get(self.pos) {
            None => Ok(expr),
            Some(tok) => Err(self.unexpected(self.pos, tok)),
        }
    }

    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn text(&self, tok: &Token) -> &'s str {
        &self.source[tok.offset..tok.offset + tok.len]
    }

    fn or_expr(&mut self) -> Result<Expr, RuleSyntaxError> {
        let mut acc = self.and_expr()?;
        while self.eat(&TokenKind::Or) {
            acc = acc.or(self.and_expr()?);
        }
        Ok(acc)
    }

    fn and_expr(&mut self) -> Result<Expr, RuleSyntaxError> {
        let mut acc = self.unary()?;
        while self.eat(&TokenKind::And) {
            acc = acc.and(self.unary()?);
        }
        Ok(acc)
    }

    fn unary(&mut self) -> Result<Expr, RuleSyntaxError> {
        let offset = self.tokens.get(self.pos).map_or(0, |t| t.offset);
        if self.eat(&TokenKind::Not) {
            self.descend(offset)?;
            let inner = self.unary();
            self.depth -= 1;
            Ok(!inner?)
        } else {
            self.primary()
        }
    }

    /// Enter one nesting level. Recursion depth follows it, so deep input
    /// is refused here rather than exhausting the stack.
    fn descend(&mut self, offset: usize) -> Result<(), RuleSyntaxError> {
        if self.depth >= MAX_DEPTH {
            return Err(RuleSyntaxError::malformed(offset, "rule nested too deeply"));
        }
        self.depth += 1;
        Ok(())
    }

    fn primary(&mut self) -> Result<Expr, RuleSyntaxError> {
        let index = self.pos;
        let Some(tok) = self.tokens.get(index).cloned() else {
            return Err(RuleSyntaxError::malformed(
                self.source.len(),
                "expected a role, found end of rule",
            ));
        };
        self.pos += 1;

        let expr = match tok.kind {
            TokenKind::Int(id) => {
                self.literals += 1;
                if self.literals > MAX_LITERALS {
                    return Err(RuleSyntaxError::malformed(
                        tok.offset,
                        format!("rule uses more than {MAX_LITERALS} roles"),
                    ));
                }
                Expr::Role(RoleId(id))
            }
            TokenKind::LParen => {
                self.descend(tok.offset)?;
                let inner = self.or_expr();
                self.depth -= 1;
                let inner = inner?;
                match self.tokens.get(self.pos) {
                    Some(t) if t.kind == TokenKind::RParen => self.pos += 1,
                    Some(t) => return Err(self.unexpected(self.pos, t)),
                    None => {
                        return Err(RuleSyntaxError::malformed(tok.offset, "unclosed `(`"));
                    }
                }
                inner
            }
            TokenKind::Name if self.peek() == Some(&TokenKind::LParen) => {
                return Err(self.unsupported(Construct::Call, &tok));
            }
            TokenKind::Name => return Err(self.unsupported(Construct::Name, &tok)),
            TokenKind::Constant => return Err(self.unsupported(Construct::Constant, &tok)),
            TokenKind::Tilde => return Err(self.unsupported(Construct::UnaryOp, &tok)),
            TokenKind::Arith if matches!(self.text(&tok), "-" | "+") => {
                return Err(self.unsupported(Construct::UnaryOp, &tok));
            }
            TokenKind::Oversized => {
                return Err(RuleSyntaxError::malformed(
                    tok.offset,
                    format!("role identifier `{}` is too large", self.text(&tok)),
                ));
            }
            _ => return Err(self.unexpected(index, &tok)),
        };

        if self.peek() == Some(&TokenKind::LParen) {
            return Err(self.unsupported(Construct::Call, &tok));
        }
        Ok(expr)
    }

    fn unsupported(&self, construct: Construct, tok: &Token) -> RuleSyntaxError {
        RuleSyntaxError::unsupported(construct, tok.offset, self.text(tok))
    }

    /// Error for a token that cannot appear where it was found.
    fn unexpected(&self, index: usize, tok: &Token) -> RuleSyntaxError {
        let next = self.tokens.get(index + 1).map(|t| &t.kind);
        match tok.kind {
            TokenKind::Compare => self.unsupported(Construct::Compare, tok),
            TokenKind::Not if next == Some(&TokenKind::Compare) => {
                self.unsupported(Construct::Compare, tok)
            }
            TokenKind::Arith => self.unsupported(Construct::BinOp, tok),
            TokenKind::LParen => self.unsupported(Construct::Call, tok),
            TokenKind::Name => self.unsupported(Construct::Name, tok),
            TokenKind::Constant => self.unsupported(Construct::Constant, tok),
            TokenKind::RParen => RuleSyntaxError::malformed(tok.offset, "unbalanced `)`"),
            _ => RuleSyntaxError::malformed(
                tok.offset,
                format!("unexpected `{}`", self.text(tok)),
            ),
        }
    }
}
