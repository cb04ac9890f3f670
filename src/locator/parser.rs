use crate::error::LocatorSyntaxError;

use super::locator_model::{Axis, CmpOp, Expr, LocationPath, NodeTest, Operand, Step};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    Star,
    Pipe,
    Cmp(CmpOp),
    Name(String),
    Str(String),
    Num(f64),
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-' || c == '.' || c == ':' || c == '$'
}

fn tokenize(raw: &str) -> Result<Vec<(usize, Token)>, LocatorSyntaxError> {
    let chars: Vec<(usize, char)> = raw.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => {
                i += 2;
                Token::DoubleSlash
            }
            '/' => {
                i += 1;
                Token::Slash
            }
            '[' => {
                i += 1;
                Token::LBracket
            }
            ']' => {
                i += 1;
                Token::RBracket
            }
            '(' => {
                i += 1;
                Token::LParen
            }
            ')' => {
                i += 1;
                Token::RParen
            }
            '@' => {
                i += 1;
                Token::At
            }
            ',' => {
                i += 1;
                Token::Comma
            }
            '|' => {
                i += 1;
                Token::Pipe
            }
            '*' => {
                i += 1;
                Token::Star
            }
            '.' if next == Some('.') => {
                i += 2;
                Token::DotDot
            }
            '.' if next.is_some_and(|n| n.is_ascii_digit()) => {
                let (num, len) = read_number(&chars[i..]);
                i += len;
                Token::Num(num)
            }
            '.' => {
                i += 1;
                Token::Dot
            }
            '=' => {
                i += 1;
                Token::Cmp(CmpOp::Eq)
            }
            '!' if next == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Ne)
            }
            '<' if next == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Le)
            }
            '<' => {
                i += 1;
                Token::Cmp(CmpOp::Lt)
            }
            '>' if next == Some('=') => {
                i += 2;
                Token::Cmp(CmpOp::Ge)
            }
            '>' => {
                i += 1;
                Token::Cmp(CmpOp::Gt)
            }
            q @ ('\'' | '"') => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != q {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(syntax(raw, offset, "unterminated string literal"));
                }
                let value: String = chars[start..end].iter().map(|&(_, c)| c).collect();
                i = end + 1;
                Token::Str(value)
            }
            c if c.is_ascii_digit() => {
                let (num, len) = read_number(&chars[i..]);
                i += len;
                Token::Num(num)
            }
            c if is_name_start(c) => {
                let start = i;
                while i < chars.len() && is_name_char(chars[i].1) {
                    i += 1;
                }
                // a trailing '.' belongs to the next token
                while i > start + 1 && chars[i - 1].1 == '.' {
                    i -= 1;
                }
                Token::Name(chars[start..i].iter().map(|&(_, c)| c).collect())
            }
            other => {
                return Err(syntax(raw, offset, format!("unexpected character '{}'", other)));
            }
        };
        tokens.push((offset, token));
    }
    Ok(tokens)
}

fn read_number(chars: &[(usize, char)]) -> (f64, usize) {
    let mut len = 0;
    let mut seen_dot = false;
    let mut text = String::new();
    for &(_, c) in chars {
        if c.is_ascii_digit() || (c == '.' && !seen_dot) {
            seen_dot |= c == '.';
            text.push(c);
            len += 1;
        } else {
            break;
        }
    }
    (text.parse().unwrap_or(f64::NAN), len)
}

fn syntax(raw: &str, offset: usize, message: impl Into<String>) -> LocatorSyntaxError {
    LocatorSyntaxError {
        locator: raw.to_string(),
        offset,
        message: message.into(),
    }
}

/// Parse a locator into its union branches.
pub fn parse_locator(raw: &str) -> Result<Vec<LocationPath>, LocatorSyntaxError> {
    let tokens = tokenize(raw)?;
    if tokens.is_empty() {
        return Err(syntax(raw, 0, "empty locator"));
    }
    let mut parser = Parser {
        raw,
        tokens,
        pos: 0,
    };

    let mut paths = vec![parser.path()?];
    while parser.eat(&Token::Pipe) {
        paths.push(parser.path()?);
    }
    if let Some((offset, tok)) = parser.tokens.get(parser.pos) {
        return Err(syntax(raw, *offset, format!("unexpected token {:?}", tok)));
    }
    Ok(paths)
}

struct Parser<'a> {
    raw: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(o, _)| *o)
            .unwrap_or(self.raw.len())
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, what: &str) -> Result<(), LocatorSyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {}", what)))
        }
    }

    fn error(&self, message: impl Into<String>) -> LocatorSyntaxError {
        syntax(self.raw, self.offset(), message)
    }

    fn path(&mut self) -> Result<LocationPath, LocatorSyntaxError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.step()?);
        loop {
            match self.peek() {
                Some(Token::Slash) => {
                    self.pos += 1;
                }
                Some(Token::DoubleSlash) => {
                    self.pos += 1;
                    steps.push(Step::descendant_or_self());
                }
                _ => break,
            }
            steps.push(self.step()?);
        }
        Ok(LocationPath { absolute, steps })
    }

    fn step(&mut self) -> Result<Step, LocatorSyntaxError> {
        let (axis, test) = match self.peek().cloned() {
            Some(Token::Dot) => {
                self.pos += 1;
                (Axis::SelfNode, NodeTest::AnyNode)
            }
            Some(Token::DotDot) => {
                self.pos += 1;
                (Axis::Parent, NodeTest::AnyNode)
            }
            Some(Token::Star) => {
                self.pos += 1;
                (Axis::Child, NodeTest::Wildcard)
            }
            Some(Token::Name(name)) => {
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    if name == "node" {
                        self.pos += 1;
                        self.expect(&Token::RParen, "')'")?;
                        (Axis::Child, NodeTest::AnyNode)
                    } else {
                        return Err(self.error(format!("'{}()' is not supported as a step", name)));
                    }
                } else {
                    (Axis::Child, NodeTest::Name(name))
                }
            }
            Some(Token::At) => return Err(self.error("attribute steps are not supported")),
            _ => return Err(self.error("expected a location step")),
        };

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.predicate()?);
            self.expect(&Token::RBracket, "']'")?;
        }
        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn predicate(&mut self) -> Result<Expr, LocatorSyntaxError> {
        let expr = self.or_expr()?;
        Ok(match expr {
            Expr::Exists(Operand::Number(n)) => {
                if n < 1.0 || n.fract() != 0.0 {
                    return Err(self.error(format!("invalid position {}", n)));
                }
                Expr::Position(n as usize)
            }
            Expr::Exists(Operand::Last) => Expr::Last,
            other => other,
        })
    }

    fn keyword(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token::Name(n)) if n == word)
    }

    fn or_expr(&mut self) -> Result<Expr, LocatorSyntaxError> {
        let mut left = self.and_expr()?;
        while self.keyword("or") {
            self.pos += 1;
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr, LocatorSyntaxError> {
        let mut left = self.primary()?;
        while self.keyword("and") {
            self.pos += 1;
            let right = self.primary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expr, LocatorSyntaxError> {
        if self.eat(&Token::LParen) {
            let inner = self.or_expr()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }

        if let Some(Token::Name(name)) = self.peek().cloned() {
            if self.peek_at(1) == Some(&Token::LParen) {
                match name.as_str() {
                    "not" => {
                        self.pos += 2;
                        let inner = self.or_expr()?;
                        self.expect(&Token::RParen, "')'")?;
                        return Ok(Expr::Not(Box::new(inner)));
                    }
                    "contains" | "starts-with" => {
                        self.pos += 2;
                        let haystack = self.operand()?;
                        self.expect(&Token::Comma, "','")?;
                        let needle = self.operand()?;
                        self.expect(&Token::RParen, "')'")?;
                        return Ok(if name == "contains" {
                            Expr::Contains(haystack, needle)
                        } else {
                            Expr::StartsWith(haystack, needle)
                        });
                    }
                    _ => {}
                }
            }
        }

        let left = self.operand()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.operand()?;
            return Ok(Expr::Compare { op, left, right });
        }
        Ok(Expr::Exists(left))
    }

    fn operand(&mut self) -> Result<Operand, LocatorSyntaxError> {
        match self.peek().cloned() {
            Some(Token::At) => {
                self.pos += 1;
                match self.peek().cloned() {
                    Some(Token::Name(name)) => {
                        self.pos += 1;
                        Ok(Operand::Attr(name))
                    }
                    _ => Err(self.error("expected attribute name after '@'")),
                }
            }
            Some(Token::Str(s)) => {
                self.pos += 1;
                Ok(Operand::Literal(s))
            }
            Some(Token::Num(n)) => {
                self.pos += 1;
                Ok(Operand::Number(n))
            }
            Some(Token::Dot)
                if !matches!(self.peek_at(1), Some(Token::Slash | Token::DoubleSlash)) =>
            {
                self.pos += 1;
                Ok(Operand::Context)
            }
            Some(Token::Name(name)) if self.peek_at(1) == Some(&Token::LParen) => {
                self.pos += 2;
                match name.as_str() {
                    "text" => {
                        self.expect(&Token::RParen, "')'")?;
                        Ok(Operand::Text)
                    }
                    "position" => {
                        self.expect(&Token::RParen, "')'")?;
                        Ok(Operand::Position)
                    }
                    "last" => {
                        self.expect(&Token::RParen, "')'")?;
                        Ok(Operand::Last)
                    }
                    "normalize-space" => {
                        if self.eat(&Token::RParen) {
                            return Ok(Operand::NormalizeSpace(None));
                        }
                        let inner = self.operand()?;
                        self.expect(&Token::RParen, "')'")?;
                        Ok(Operand::NormalizeSpace(Some(Box::new(inner))))
                    }
                    other => Err(self.error(format!("unsupported function '{}()'", other))),
                }
            }
            Some(
                Token::Name(_)
                | Token::Star
                | Token::Dot
                | Token::DotDot
                | Token::Slash
                | Token::DoubleSlash,
            ) => Ok(Operand::Path(self.path()?)),
            _ => Err(self.error("expected an expression")),
        }
    }
}
