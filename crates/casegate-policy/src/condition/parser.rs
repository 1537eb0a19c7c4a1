//! Recursive-descent parser producing an [`Expr`] tree.

use serde_json::Value;

use super::lexer::{tokenize, Token, TokenKind};
use super::{Expr, Method, PropertyPath};
use crate::error::ConditionParseError;

/// Parse a full condition.
pub(crate) fn parse(source: &str) -> Result<Expr, ConditionParseError> {
    if source.trim() == "*" {
        return Ok(Expr::Wildcard);
    }
    if source.trim().is_empty() {
        return Err(ConditionParseError {
            condition: source.to_string(),
            position: 0,
            message: "condition is empty".into(),
        });
    }
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
    };
    let expr = parser.expr()?;
    parser.expect_end()?;
    Ok(expr)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> &Token {
        // The token stream always ends with `End`, and `pos` never passes it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::End {
            self.pos += 1;
        }
        token
    }

    fn error(&self, position: usize, message: impl Into<String>) -> ConditionParseError {
        ConditionParseError {
            condition: self.source.to_string(),
            position,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> ConditionParseError {
        let token = self.peek();
        self.error(
            token.position,
            format!("expected {expected}, found {}", token.kind.describe()),
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), ConditionParseError> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn expect_end(&self) -> Result<(), ConditionParseError> {
        if self.peek().kind == TokenKind::End {
            Ok(())
        } else {
            Err(self.unexpected("'AND', 'OR' or end of condition"))
        }
    }

    fn expr(&mut self) -> Result<Expr, ConditionParseError> {
        let mut lhs = self.term()?;
        loop {
            match self.peek().kind {
                TokenKind::And => {
                    self.advance();
                    let rhs = self.term()?;
                    lhs = Expr::And(Box::new(lhs), Box::new(rhs));
                }
                TokenKind::Or => {
                    self.advance();
                    let rhs = self.term()?;
                    lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
                }
                _ => return Ok(lhs),
            }
        }
    }

    fn term(&mut self) -> Result<Expr, ConditionParseError> {
        if self.peek().kind == TokenKind::LParen {
            self.advance();
            let inner = self.expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }

        let start = self.peek().position;
        let lhs = self.operand()?;
        if let TokenKind::Cmp(op) = self.peek().kind {
            self.advance();
            let rhs = self.operand()?;
            return Ok(Expr::Comparison {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
            });
        }

        match &lhs {
            Expr::Literal(Value::Bool(_)) | Expr::PropertyAccess(_) | Expr::MethodCall { .. } => {
                Ok(lhs)
            }
            _ => Err(self.error(start, "a literal on its own is not a condition")),
        }
    }

    fn operand(&mut self) -> Result<Expr, ConditionParseError> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                let number = serde_json::Number::from_f64(n)
                    .ok_or_else(|| self.error(token.position, "number is not finite"))?;
                Ok(Expr::Literal(Value::Number(number)))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Literal(Value::String(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(Expr::Literal(Value::Bool(false)))
            }
            TokenKind::Ident(_) => self.path_or_call(),
            TokenKind::Star => Err(self.error(
                token.position,
                "'*' is only valid as the entire condition",
            )),
            _ => Err(self.unexpected("a property path or literal")),
        }
    }

    fn path_or_call(&mut self) -> Result<Expr, ConditionParseError> {
        let mut segments = Vec::new();
        match self.advance().kind {
            TokenKind::Ident(name) => segments.push(name),
            _ => return Err(self.unexpected("an identifier")),
        }

        while self.peek().kind == TokenKind::Dot {
            self.advance();
            let seg = self.peek().clone();
            let TokenKind::Ident(name) = seg.kind else {
                return Err(self.unexpected("a property name after '.'"));
            };
            self.advance();

            if self.peek().kind == TokenKind::LParen {
                let method = self.method(&name, seg.position)?;
                return Ok(Expr::MethodCall {
                    target: PropertyPath(segments),
                    method,
                });
            }
            segments.push(name);
        }
        Ok(Expr::PropertyAccess(PropertyPath(segments)))
    }

    fn method(&mut self, name: &str, position: usize) -> Result<Method, ConditionParseError> {
        self.expect(TokenKind::LParen, "'('")?;
        let method = match name {
            "empty" => Method::Empty,
            "contains" => {
                let arg = self.operand()?;
                if matches!(arg, Expr::MethodCall { .. }) {
                    return Err(self.error(position, "method calls cannot be nested"));
                }
                Method::Contains(Box::new(arg))
            }
            other => {
                return Err(self.error(
                    position,
                    format!("unknown method '{other}'; expected 'contains' or 'empty'"),
                ))
            }
        };
        self.expect(TokenKind::RParen, "')'")?;
        if self.peek().kind == TokenKind::Dot {
            return Err(self.unexpected("end of method call"));
        }
        Ok(method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::CmpOp;

    fn path(p: &str) -> PropertyPath {
        PropertyPath(p.split('.').map(String::from).collect())
    }

    #[test]
    fn test_parse_comparison_tree() {
        let expr = parse("ensemble.confidence < 0.70").unwrap();
        assert_eq!(
            expr,
            Expr::Comparison {
                lhs: Box::new(Expr::PropertyAccess(path("ensemble.confidence"))),
                op: CmpOp::Lt,
                rhs: Box::new(Expr::Literal(serde_json::json!(0.7))),
            }
        );
    }

    #[test]
    fn test_left_assoc_mixed_combinators() {
        let expr = parse("a OR b AND c").unwrap();
        let Expr::And(lhs, rhs) = expr else {
            panic!("expected AND at the root");
        };
        assert!(matches!(*lhs, Expr::Or(_, _)));
        assert_eq!(*rhs, Expr::PropertyAccess(path("c")));
    }

    #[test]
    fn test_method_calls() {
        let expr = parse("ensemble.risk_flags.contains('address_unverified')").unwrap();
        assert_eq!(
            expr,
            Expr::MethodCall {
                target: path("ensemble.risk_flags"),
                method: Method::Contains(Box::new(Expr::Literal(serde_json::json!(
                    "address_unverified"
                )))),
            }
        );
        assert!(matches!(
            parse("x.empty()").unwrap(),
            Expr::MethodCall {
                method: Method::Empty,
                ..
            }
        ));
    }

    #[test]
    fn test_rejections() {
        for bad in [
            "",
            "ensemble.confidence >",
            "(a == 1",
            "a == 1)",
            "a == 1 and b == 2",
            "x.size()",
            "x.empty().contains(1)",
            "42",
            "* AND a",
            "a == *",
            "a..b",
            "NOT a",
        ] {
            assert!(parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_error_position_points_at_offender() {
        let err = parse("ensemble.confidence > 0.9 AND x.size()").unwrap_err();
        assert_eq!(&err.condition[err.position..err.position + 4], "size");
    }
}
