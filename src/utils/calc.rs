//! Arithmetic expression evaluator used by `/calc` and the `calculate` tool.
//!
//! Grammar (usual precedence, `^` right-associative):
//! expr := term (('+' | '-') term)*
//! term := power (('*' | '/' | '%') power)*
//! power := unary ('^' power)?
//! unary := '-' unary | '+' unary | atom
//! atom := number | ident '(' expr ')' | ident | '(' expr ')'

use std::fmt;

/// Nesting allowed across parentheses, calls, unary signs and `^` chains.
const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum CalcError {
    UnexpectedChar(char, usize),
    UnexpectedEnd,
    UnknownIdentifier(String),
    DivisionByZero,
    NotFinite,
    TooDeep,
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CalcError::UnexpectedChar(c, pos) => write!(f, "unexpected '{c}' at position {pos}"),
            CalcError::UnexpectedEnd => write!(f, "unexpected end of expression"),
            CalcError::UnknownIdentifier(name) => write!(f, "unknown identifier '{name}'"),
            CalcError::DivisionByZero => write!(f, "division by zero"),
            CalcError::NotFinite => write!(f, "result is not a finite number"),
            CalcError::TooDeep => write!(f, "expression is nested more than {MAX_DEPTH} levels deep"),
        }
    }
}

impl std::error::Error for CalcError {}

struct Parser {
    chars: Vec<(usize, char)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn new(src: &str) -> Self {
        Self {
            chars: src.char_indices().filter(|(_, c)| !c.is_whitespace()).collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, want: char) -> Result<(), CalcError> {
        match self.chars.get(self.pos) {
            Some((_, c)) if *c == want => {
                self.pos += 1;
                Ok(())
            }
            Some((at, c)) => Err(CalcError::UnexpectedChar(*c, *at)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn nested(&mut self, parse: impl FnOnce(&mut Self) -> Result<f64, CalcError>) -> Result<f64, CalcError> {
        if self.depth >= MAX_DEPTH {
            return Err(CalcError::TooDeep);
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> Result<f64, CalcError> {
        let mut value = self.term()?;
        while let Some(op) = self.peek() {
            match op {
                '+' => {
                    self.bump();
                    value += self.term()?;
                }
                '-' => {
                    self.bump();
                    value -= self.term()?;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.power()?;
        while let Some(op) = self.peek() {
            match op {
                '*' | '×' => {
                    self.bump();
                    value *= self.power()?;
                }
                '/' | '÷' => {
                    self.bump();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= rhs;
                }
                '%' => {
                    self.bump();
                    let rhs = self.power()?;
                    if rhs == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value %= rhs;
                }
                _ => break,
            }
        }
        Ok(value)
    }

    fn power(&mut self) -> Result<f64, CalcError> {
        let base = self.unary()?;
        if self.peek() == Some('^') {
            self.bump();
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> Result<f64, CalcError> {
        match self.peek() {
            Some('-') => {
                self.bump();
                Ok(-self.nested(Self::unary)?)
            }
            Some('+') => {
                self.bump();
                self.nested(Self::unary)
            }
            _ => self.atom(),
        }
    }

    fn atom(&mut self) -> Result<f64, CalcError> {
        match self.chars.get(self.pos).copied() {
            Some((_, '(')) => {
                self.bump();
                let value = self.nested(Self::expr)?;
                self.expect(')')?;
                Ok(value)
            }
            Some((_, c)) if c.is_ascii_digit() || c == '.' => self.number(),
            Some((_, c)) if c.is_ascii_alphabetic() => self.identifier(),
            Some((at, c)) => Err(CalcError::UnexpectedChar(c, at)),
            None => Err(CalcError::UnexpectedEnd),
        }
    }

    fn number(&mut self) -> Result<f64, CalcError> {
        let start = self.pos;
        let mut text = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == '_' {
                if c != '_' {
                    text.push(c);
                }
                self.bump();
            } else {
                break;
            }
        }
        text.parse::<f64>().map_err(|_| {
            let (at, c) = self.chars[start];
            CalcError::UnexpectedChar(c, at)
        })
    }

    fn identifier(&mut self) -> Result<f64, CalcError> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() {
                name.push(c.to_ascii_lowercase());
                self.bump();
            } else {
                break;
            }
        }

        if self.peek() == Some('(') {
            self.bump();
            let arg = self.nested(Self::expr)?;
            self.expect(')')?;
            return match name.as_str() {
                "sqrt" => Ok(arg.sqrt()),
                "abs" => Ok(arg.abs()),
                "ln" => Ok(arg.ln()),
                "log" => Ok(arg.log10()),
                "sin" => Ok(arg.sin()),
                "cos" => Ok(arg.cos()),
                "tan" => Ok(arg.tan()),
                "round" => Ok(arg.round()),
                "floor" => Ok(arg.floor()),
                "ceil" => Ok(arg.ceil()),
                _ => Err(CalcError::UnknownIdentifier(name)),
            };
        }

        match name.as_str() {
            "pi" => Ok(std::f64::consts::PI),
            "e" => Ok(std::f64::consts::E),
            _ => Err(CalcError::UnknownIdentifier(name)),
        }
    }
}

pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let mut parser = Parser::new(expression);
    let value = parser.expr()?;
    if let Some((at, c)) = parser.chars.get(parser.pos).copied() {
        return Err(CalcError::UnexpectedChar(c, at));
    }
    if !value.is_finite() {
        return Err(CalcError::NotFinite);
    }
    Ok(value)
}

/// Render without a trailing `.0` for integral results.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let formatted = format!("{value:.10}");
        formatted.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}
