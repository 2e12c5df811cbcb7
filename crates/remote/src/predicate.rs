//! Requirement predicates (`name (>=1.0, !=1.3)`) and the environment marker
//! grammar that may follow them after a `;`.

use crate::consts::{CONSTRAINT_REGEX, MARKER_IDENT_REGEX, PREDICATE_REGEX};

/// Marker variables, in both the dotted legacy spelling and the modern one.
const MARKER_VARIABLES: &[&str] = &[
    "extra",
    "implementation_name",
    "implementation_version",
    "os.name",
    "os_name",
    "platform.machine",
    "platform.python_implementation",
    "platform.release",
    "platform.version",
    "platform_machine",
    "platform_python_implementation",
    "platform_release",
    "platform_system",
    "platform_version",
    "python_full_version",
    "python_implementation",
    "python_version",
    "sys.platform",
    "sys_platform",
];

const OPERATORS: &[&str] = &["===", "==", "!=", "<=", ">=", "~=", "<", ">"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Predicate {
    pub name: String,
    pub constraints: Vec<String>,
}

/// Parses `name`, `name (op ver, ...)` or `name op ver, ...`.
pub(crate) fn parse_predicate(raw: &str) -> Option<Predicate> {
    let caps = PREDICATE_REGEX.captures(raw.trim())?;
    let name = caps.get(1)?.as_str().to_string();
    let constraints = caps.get(3).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
    Some(Predicate {
        name,
        constraints: parse_constraints(constraints)?,
    })
}

/// Parses a comma-separated constraint list. A bare version means `==`.
pub(crate) fn parse_constraints(raw: &str) -> Option<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Some(Vec::new());
    }
    raw.split(',')
        .map(str::trim)
        .map(|constraint| {
            // Arbitrary equality compares opaque strings.
            if let Some(rest) = constraint.strip_prefix("===") {
                let rest = rest.trim();
                return (!rest.is_empty() && !rest.contains(char::is_whitespace)).then(|| format!("==={rest}"));
            }
            let caps = CONSTRAINT_REGEX.captures(constraint)?;
            let op = caps.get(1).map_or("==", |m| m.as_str());
            Some(format!("{}{}", op, &caps[2]))
        })
        .collect()
}

/// Splits `predicate; marker` into its two halves.
pub(crate) fn split_marker(raw: &str) -> (&str, Option<&str>) {
    match raw.split_once(';') {
        Some((predicate, marker)) => (predicate.trim(), Some(marker.trim())),
        None => (raw.trim(), None),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    Value,
    Op,
    And,
    Or,
    Open,
    Close,
}

fn tokenize(raw: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = raw;
    loop {
        rest = rest.trim_start();
        let Some(first) = rest.chars().next() else {
            break;
        };
        match first {
            '(' => {
                tokens.push(Token::Open);
                rest = &rest[1..];
            },
            ')' => {
                tokens.push(Token::Close);
                rest = &rest[1..];
            },
            '\'' | '"' => {
                let end = rest[1..].find(first)?;
                tokens.push(Token::Value);
                rest = &rest[end + 2..];
            },
            '=' | '!' | '<' | '>' | '~' => {
                let op = OPERATORS.iter().find(|op| rest.starts_with(*op))?;
                tokens.push(Token::Op);
                rest = &rest[op.len()..];
            },
            _ => {
                let word = MARKER_IDENT_REGEX.find(rest)?.as_str();
                rest = &rest[word.len()..];
                match word {
                    "and" => tokens.push(Token::And),
                    "or" => tokens.push(Token::Or),
                    "in" => tokens.push(Token::Op),
                    "not" => {
                        let next = rest.trim_start();
                        let after = next.strip_prefix("in")?;
                        if after.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
                            return None;
                        }
                        tokens.push(Token::Op);
                        rest = after;
                    },
                    variable if MARKER_VARIABLES.contains(&variable) => tokens.push(Token::Value),
                    _ => return None,
                }
            },
        }
    }
    Some(tokens)
}

struct MarkerParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl MarkerParser {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn or_expr(&mut self) -> bool {
        if !self.and_expr() {
            return false;
        }
        while self.eat(Token::Or) {
            if !self.and_expr() {
                return false;
            }
        }
        true
    }

    fn and_expr(&mut self) -> bool {
        if !self.atom() {
            return false;
        }
        while self.eat(Token::And) {
            if !self.atom() {
                return false;
            }
        }
        true
    }

    fn atom(&mut self) -> bool {
        if self.eat(Token::Open) {
            return self.or_expr() && self.eat(Token::Close);
        }
        self.eat(Token::Value) && self.eat(Token::Op) && self.eat(Token::Value)
    }
}

/// Checks an environment marker such as `python_version < "3" and extra == 'ssl'`.
pub(crate) fn is_valid_marker(raw: &str) -> bool {
    let Some(tokens) = tokenize(raw) else {
        return false;
    };
    if tokens.is_empty() {
        return false;
    }
    let mut parser = MarkerParser { tokens, pos: 0 };
    parser.or_expr() && parser.pos == parser.tokens.len()
}
