//! # Condition Language
//!
//! A minimal, sandboxed expression language for rule conditions. Strings
//! are parsed once into an [`Expr`] tree and evaluated against a read-only
//! JSON context; there is no runtime `eval`.
//!
//! ## Grammar
//!
//! ```text
//! condition  := "*" | expr
//! expr       := term (("AND" | "OR") term)*        left to right, no precedence
//! term       := "(" expr ")" | operand (cmp operand)?
//! operand    := path ("." method "(" args ")")? | literal
//! path       := ident ("." ident)*
//! method     := "contains" | "empty"
//! cmp        := "==" | "!=" | ">" | "<" | ">=" | "<="
//! literal    := number | 'string' | "string" | true | false
//! ```
//!
//! ## Semantics
//!
//! - A missing path (or a JSON `null`) is *unknown*. Every comparison
//!   involving unknown is false, `.contains()` on unknown is false, and
//!   `.empty()` on unknown is true.
//! - Numbers compare numerically and strings lexically. Any other
//!   combination of types makes that one comparison false; booleans,
//!   arrays and objects support only `==` and `!=`.
//! - A bare path is true only when it resolves to JSON `true`.

mod eval;
mod lexer;
mod parser;

use std::str::FromStr;

use serde_json::Value;

pub use lexer::CmpOp;

use crate::error::ConditionParseError;

/// A dotted property path such as `compliance.sanctions_screening.status`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyPath(pub Vec<String>);

impl PropertyPath {
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The namespace the path is rooted at.
    pub fn root(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }
}

impl std::fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// Methods callable on a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    Contains(Box<Expr>),
    Empty,
}

/// The condition expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `*`: matches unconditionally.
    Wildcard,
    Literal(Value),
    PropertyAccess(PropertyPath),
    Comparison {
        lhs: Box<Expr>,
        op: CmpOp,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    MethodCall {
        target: PropertyPath,
        method: Method,
    },
}

/// A parsed, evaluable rule condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    source: String,
    expr: Expr,
}

impl Condition {
    /// Parse a condition string.
    pub fn parse(source: &str) -> Result<Self, ConditionParseError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluate against a context object. Never fails.
    pub fn evaluate(&self, context: &Value) -> bool {
        eval::truthy(&self.expr, context)
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self.expr, Expr::Wildcard)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Every property path referenced by the condition.
    pub fn referenced_paths(&self) -> Vec<&PropertyPath> {
        let mut out = Vec::new();
        collect_paths(&self.expr, &mut out);
        out
    }
}

fn collect_paths<'a>(expr: &'a Expr, out: &mut Vec<&'a PropertyPath>) {
    match expr {
        Expr::Wildcard | Expr::Literal(_) => {}
        Expr::PropertyAccess(path) => out.push(path),
        Expr::Comparison { lhs, rhs, .. } | Expr::And(lhs, rhs) | Expr::Or(lhs, rhs) => {
            collect_paths(lhs, out);
            collect_paths(rhs, out);
        }
        Expr::MethodCall { target, method } => {
            out.push(target);
            if let Method::Contains(arg) = method {
                collect_paths(arg, out);
            }
        }
    }
}

impl FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Condition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> Value {
        json!({
            "case": {"priority": "urgent", "vertical": "kyc", "status": "processing"},
            "ensemble": {
                "action": "approve",
                "confidence": 0.97,
                "risk_score": 15.0,
                "risk_flags": [],
                "consensus_level": "unanimous"
            },
            "compliance": {"sanctions_screening": {"status": "hit"}, "pep": false},
            "identity": {"documents": ["passport", "utility_bill"], "verified": true}
        })
    }

    fn eval(src: &str) -> bool {
        Condition::parse(src).unwrap().evaluate(&ctx())
    }

    #[test]
    fn test_wildcard() {
        let cond = Condition::parse(" * ").unwrap();
        assert!(cond.is_wildcard());
        assert!(cond.evaluate(&json!({})));
    }

    #[test]
    fn test_sanctions_hit() {
        assert!(eval("compliance.sanctions_screening.status == 'hit'"));
        assert!(!eval("compliance.sanctions_screening.status == 'clear'"));
    }

    #[test]
    fn test_numeric_and_combinators() {
        assert!(eval("ensemble.confidence > 0.95 AND ensemble.risk_score < 20"));
        assert!(!eval("ensemble.confidence > 0.99 AND ensemble.risk_score < 20"));
        assert!(eval("ensemble.confidence > 0.99 OR ensemble.risk_score <= 15"));
    }

    #[test]
    fn test_left_to_right_without_precedence() {
        // (true OR true) AND false
        assert!(!eval(
            "case.vertical == 'kyc' OR case.vertical == 'x' AND case.priority == 'low'"
        ));
        // true OR (true AND false)
        assert!(eval(
            "case.vertical == 'kyc' OR (case.vertical == 'x' AND case.priority == 'low')"
        ));
    }

    #[test]
    fn test_unknown_paths_are_false_and_empty() {
        assert!(!eval("compliance.adverse_media.status == 'hit'"));
        assert!(!eval("compliance.adverse_media.status != 'hit'"));
        assert!(!eval("missing.score > 1"));
        assert!(eval("compliance.adverse_media.matches.empty()"));
        assert!(!eval("compliance.adverse_media.matches.contains('x')"));
    }

    #[test]
    fn test_type_mismatch_is_false_for_that_comparison_only() {
        assert!(!eval("ensemble.confidence == 'high'"));
        assert!(!eval("ensemble.confidence != 'high'"));
        assert!(eval("ensemble.confidence == 'high' OR case.priority == 'urgent'"));
    }

    #[test]
    fn test_methods() {
        assert!(eval("ensemble.risk_flags.empty()"));
        assert!(eval("identity.documents.contains('passport')"));
        assert!(!eval("identity.documents.contains('selfie')"));
        assert!(!eval("identity.documents.empty()"));
        assert!(eval("case.vertical.contains('ky')"));
    }

    #[test]
    fn test_bare_boolean_paths() {
        assert!(eval("identity.verified"));
        assert!(!eval("compliance.pep"));
        assert!(!eval("case.vertical"));
        assert!(eval("compliance.pep == false"));
    }

    #[test]
    fn test_referenced_paths() {
        let cond = Condition::parse("a.b == 1 AND c.d.contains(e.f)").unwrap();
        let paths: Vec<String> = cond.referenced_paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["a.b", "c.d", "e.f"]);
    }
}
