//! Tokenizer for the condition language.

use crate::error::ConditionParseError;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

impl std::fmt::Display for CmpOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Ident(String),
    Number(f64),
    Str(String),
    True,
    False,
    And,
    Or,
    Cmp(CmpOp),
    Dot,
    Comma,
    LParen,
    RParen,
    Star,
    End,
}

impl TokenKind {
    pub(crate) fn describe(&self) -> String {
        match self {
            Self::Ident(name) => format!("identifier '{name}'"),
            Self::Number(n) => format!("number {n}"),
            Self::Str(s) => format!("string {s:?}"),
            Self::True => "'true'".into(),
            Self::False => "'false'".into(),
            Self::And => "'AND'".into(),
            Self::Or => "'OR'".into(),
            Self::Cmp(op) => format!("'{op}'"),
            Self::Dot => "'.'".into(),
            Self::Comma => "','".into(),
            Self::LParen => "'('".into(),
            Self::RParen => "')'".into(),
            Self::Star => "'*'".into(),
            Self::End => "end of condition".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub kind: TokenKind,
    /// Byte offset of the first character.
    pub position: usize,
}

/// Split `source` into tokens, always ending with [`TokenKind::End`].
pub(crate) fn tokenize(source: &str) -> Result<Vec<Token>, ConditionParseError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    let fail = |position: usize, message: String| ConditionParseError {
        condition: source.to_string(),
        position,
        message,
    };

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;
        let kind = match c {
            b' ' | b'\t' | b'\n' | b'\r' => {
                i += 1;
                continue;
            }
            b'.' => {
                i += 1;
                TokenKind::Dot
            }
            b',' => {
                i += 1;
                TokenKind::Comma
            }
            b'(' => {
                i += 1;
                TokenKind::LParen
            }
            b')' => {
                i += 1;
                TokenKind::RParen
            }
            b'*' => {
                i += 1;
                TokenKind::Star
            }
            b'=' | b'!' | b'<' | b'>' => {
                let next = bytes.get(i + 1).copied();
                let (op, width) = match (c, next) {
                    (b'=', Some(b'=')) => (CmpOp::Eq, 2),
                    (b'!', Some(b'=')) => (CmpOp::Ne, 2),
                    (b'>', Some(b'=')) => (CmpOp::Ge, 2),
                    (b'<', Some(b'=')) => (CmpOp::Le, 2),
                    (b'>', _) => (CmpOp::Gt, 1),
                    (b'<', _) => (CmpOp::Lt, 1),
                    (b'=', _) => {
                        return Err(fail(start, "single '=' is not an operator; use '=='".into()))
                    }
                    _ => return Err(fail(start, "negation is not supported; use '!='".into())),
                };
                i += width;
                TokenKind::Cmp(op)
            }
            b'\'' | b'"' => {
                let quote = c;
                let mut value = String::new();
                i += 1;
                loop {
                    match bytes.get(i) {
                        None => return Err(fail(start, "unterminated string literal".into())),
                        Some(&b) if b == quote => {
                            i += 1;
                            break;
                        }
                        Some(b'\\') => {
                            let escaped = source[i + 1..].chars().next().ok_or_else(|| {
                                fail(start, "unterminated string literal".into())
                            })?;
                            value.push(escaped);
                            i += 1 + escaped.len_utf8();
                        }
                        Some(_) => {
                            // Copy one full UTF-8 character.
                            let ch = source[i..].chars().next().ok_or_else(|| {
                                fail(i, "invalid character in string literal".into())
                            })?;
                            value.push(ch);
                            i += ch.len_utf8();
                        }
                    }
                }
                TokenKind::Str(value)
            }
            b'0'..=b'9' | b'-' => {
                if c == b'-' && !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    return Err(fail(start, "'-' must begin a number".into()));
                }
                i += 1;
                let mut seen_dot = false;
                while let Some(&b) = bytes.get(i) {
                    if b.is_ascii_digit() {
                        i += 1;
                    } else if b == b'.'
                        && !seen_dot
                        && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)
                    {
                        seen_dot = true;
                        i += 1;
                    } else {
                        break;
                    }
                }
                let text = &source[start..i];
                let value: f64 = text
                    .parse()
                    .map_err(|_| fail(start, format!("invalid number '{text}'")))?;
                TokenKind::Number(value)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => {
                while bytes
                    .get(i)
                    .is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_')
                {
                    i += 1;
                }
                match &source[start..i] {
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    word => TokenKind::Ident(word.to_string()),
                }
            }
            _ => {
                let ch = source[i..].chars().next().unwrap_or('?');
                return Err(fail(start, format!("unexpected character '{ch}'")));
            }
        };
        tokens.push(Token {
            kind,
            position: start,
        });
    }

    tokens.push(Token {
        kind: TokenKind::End,
        position: source.len(),
    });
    Ok(tokens)
}
