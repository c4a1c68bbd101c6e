//! Condition expression language: lexer, parser, and AST.
//!
//! Conditions are single-line boolean expressions over rule variables,
//! numeric/string literals, comparisons, and `&`/`|` logic:
//!
//! ```text
//! x > 0.5
//! (x > 0.3 & y != 'missense') | z <= -1.2
//! TRUE
//! ```
//!
//! Precedence, lowest to highest: `|` → `&` → comparison → atom. Atoms are
//! identifiers, numeric literals, quoted string literals, the literal
//! `TRUE`, or parenthesized sub-expressions. Whitespace is insignificant.
//!
//! Parsing is pure: the same input always yields an identical AST, which
//! keeps re-validation and result caching deterministic. A tagged AST
//! replaces the dynamic string-eval the expression language descends from,
//! so malformed input is a [`ParseError`], never injected behavior.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

/// Condition syntax error, surfaced at rule-authoring time.
///
/// Positions are byte offsets into the condition string.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("unexpected token '{token}' at position {pos}")]
    UnexpectedToken { token: String, pos: usize },

    #[error("unexpected end of expression")]
    UnexpectedEnd,

    #[error("unbalanced parenthesis opened at position {pos}")]
    UnbalancedParen { pos: usize },

    #[error("unterminated string literal starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("invalid number '{text}' at position {pos}")]
    InvalidNumber { text: String, pos: usize },

    #[error("clause '{0}' is missing the '~' score separator")]
    MissingScoreSeparator(String),

    #[error("invalid score '{text}' in clause")]
    InvalidScore { text: String },

    #[error("empty condition")]
    Empty,
}

// ── AST ─────────────────────────────────────────────────────────────

/// Comparison operator between two condition atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
    Ne,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
        };
        write!(f, "{}", s)
    }
}

/// A parsed condition expression. Immutable once parsed.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The literal `TRUE` — the conventional trailing catch-all.
    True,
    /// Numeric literal.
    Number(f64),
    /// Quoted string literal.
    Text(String),
    /// Reference to a rule variable, bound via the rule's column mapping.
    Var(String),
    Compare {
        op: CompareOp,
        lhs: Box<Condition>,
        rhs: Box<Condition>,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
}

impl Condition {
    /// All variable names referenced anywhere in the expression.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_variables(&mut out);
        out
    }

    fn collect_variables(&self, out: &mut BTreeSet<String>) {
        match self {
            Condition::Var(name) => {
                out.insert(name.clone());
            }
            Condition::Compare { lhs, rhs, .. } => {
                lhs.collect_variables(out);
                rhs.collect_variables(out);
            }
            Condition::And(l, r) | Condition::Or(l, r) => {
                l.collect_variables(out);
                r.collect_variables(out);
            }
            Condition::True | Condition::Number(_) | Condition::Text(_) => {}
        }
    }
}

// ── Lexer ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Str(String),
    Gt,
    Lt,
    Ge,
    Le,
    EqEq,
    Ne,
    Amp,
    Pipe,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "{}", s),
            Token::Number(n) => write!(f, "{}", n),
            Token::Str(s) => write!(f, "'{}'", s),
            Token::Gt => write!(f, ">"),
            Token::Lt => write!(f, "<"),
            Token::Ge => write!(f, ">="),
            Token::Le => write!(f, "<="),
            Token::EqEq => write!(f, "=="),
            Token::Ne => write!(f, "!="),
            Token::Amp => write!(f, "&"),
            Token::Pipe => write!(f, "|"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<(Token, usize)>, ParseError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        match ch {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, pos));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, pos));
                i += 1;
            }
            '&' => {
                tokens.push((Token::Amp, pos));
                i += 1;
            }
            '|' => {
                tokens.push((Token::Pipe, pos));
                i += 1;
            }
            '>' => {
                if next == Some('=') {
                    tokens.push((Token::Ge, pos));
                    i += 2;
                } else {
                    tokens.push((Token::Gt, pos));
                    i += 1;
                }
            }
            '<' => {
                if next == Some('=') {
                    tokens.push((Token::Le, pos));
                    i += 2;
                } else {
                    tokens.push((Token::Lt, pos));
                    i += 1;
                }
            }
            '=' => {
                if next == Some('=') {
                    tokens.push((Token::EqEq, pos));
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '=', pos });
                }
            }
            '!' => {
                if next == Some('=') {
                    tokens.push((Token::Ne, pos));
                    i += 2;
                } else {
                    return Err(ParseError::UnexpectedChar { ch: '!', pos });
                }
            }
            quote @ ('\'' | '"') => {
                let mut j = i + 1;
                let mut text = String::new();
                loop {
                    match chars.get(j) {
                        Some(&(_, c)) if c == quote => break,
                        Some(&(_, c)) => {
                            text.push(c);
                            j += 1;
                        }
                        None => return Err(ParseError::UnterminatedString { pos }),
                    }
                }
                tokens.push((Token::Str(text), pos));
                i = j + 1;
            }
            c if c.is_ascii_digit() || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) => {
                let mut j = i + 1;
                while chars
                    .get(j)
                    .is_some_and(|&(_, c)| c.is_ascii_digit() || c == '.')
                {
                    j += 1;
                }
                let text: String = chars[i..j].iter().map(|&(_, c)| c).collect();
                let n = text.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
                    text: text.clone(),
                    pos,
                })?;
                tokens.push((Token::Number(n), pos));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while chars
                    .get(j)
                    .is_some_and(|&(_, c)| c.is_alphanumeric() || c == '_')
                {
                    j += 1;
                }
                let text: String = chars[i..j].iter().map(|&(_, c)| c).collect();
                tokens.push((Token::Ident(text), pos));
                i = j;
            }
            other => return Err(ParseError::UnexpectedChar { ch: other, pos }),
        }
    }

    Ok(tokens)
}

// ── Parser ──────────────────────────────────────────────────────────

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&(Token, usize)> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<(Token, usize)> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_expr(&mut self) -> Result<Condition, ParseError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Condition, ParseError> {
        let mut lhs = self.parse_and()?;
        while matches!(self.peek(), Some((Token::Pipe, _))) {
            self.advance();
            let rhs = self.parse_and()?;
            lhs = Condition::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Condition, ParseError> {
        let mut lhs = self.parse_comparison()?;
        while matches!(self.peek(), Some((Token::Amp, _))) {
            self.advance();
            let rhs = self.parse_comparison()?;
            lhs = Condition::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_comparison(&mut self) -> Result<Condition, ParseError> {
        let lhs = self.parse_atom()?;

        let op = match self.peek() {
            Some((Token::Gt, _)) => CompareOp::Gt,
            Some((Token::Lt, _)) => CompareOp::Lt,
            Some((Token::Ge, _)) => CompareOp::Ge,
            Some((Token::Le, _)) => CompareOp::Le,
            Some((Token::EqEq, _)) => CompareOp::Eq,
            Some((Token::Ne, _)) => CompareOp::Ne,
            _ => return Ok(lhs),
        };
        self.advance();

        let rhs = self.parse_atom()?;
        Ok(Condition::Compare {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_atom(&mut self) -> Result<Condition, ParseError> {
        match self.advance() {
            Some((Token::Ident(name), _)) => {
                if name == "TRUE" {
                    Ok(Condition::True)
                } else {
                    Ok(Condition::Var(name))
                }
            }
            Some((Token::Number(n), _)) => Ok(Condition::Number(n)),
            Some((Token::Str(s), _)) => Ok(Condition::Text(s)),
            Some((Token::LParen, open_pos)) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some((Token::RParen, _)) => Ok(inner),
                    _ => Err(ParseError::UnbalancedParen { pos: open_pos }),
                }
            }
            Some((tok, pos)) => Err(ParseError::UnexpectedToken {
                token: tok.to_string(),
                pos,
            }),
            None => Err(ParseError::UnexpectedEnd),
        }
    }
}

/// Parse a condition expression string into an AST.
///
/// Pure: no side effects, identical input yields an identical AST.
pub fn parse(input: &str) -> Result<Condition, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;

    if let Some((tok, pos)) = parser.peek() {
        return Err(ParseError::UnexpectedToken {
            token: tok.to_string(),
            pos: *pos,
        });
    }

    Ok(expr)
}

// ── Tests ───────────────────────────────────────────────────────────
