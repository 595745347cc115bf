//! Part 21 (STEP physical file format) lexer.
//!
//! Splits an ISO 10303-21 exchange file into tokens: keywords (which may
//! contain hyphens, as in `END-ISO-10303-21`), entity references `#12`,
//! quoted strings with `''` escapes, integers, reals (`1.`, `-2.5E-3`),
//! enumerations `.T.` and punctuation. `/* ... */` comments are skipped.

use crate::error::{Result, StepError};

/// A token in a STEP file.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Keyword or type name, upper-cased.
    Keyword(String),
    /// Entity reference (`#123` becomes `EntityRef(123)`).
    EntityRef(u64),
    /// String literal (contents without quotes).
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.TRUE.` becomes `Enum("TRUE")`).
    Enum(String),
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// `;`
    Semicolon,
    /// `=`
    Equals,
    /// `*` (derived value).
    Asterisk,
    /// `$` (unset value).
    Dollar,
}

/// A token and the line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    /// The token.
    pub token: Token,
    /// Line number (1-indexed).
    pub line: usize,
}

/// Lexer for Part 21 files.
pub struct Lexer<'a> {
    input: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Lexer<'a> {
    /// Create a lexer over `input`.
    pub fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> Result<Vec<SpannedToken>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let Some(ch) = self.peek() else {
                return Ok(tokens);
            };
            let line = self.line;
            let token = match ch {
                b'(' => self.punct(Token::LParen),
                b')' => self.punct(Token::RParen),
                b',' => self.punct(Token::Comma),
                b';' => self.punct(Token::Semicolon),
                b'=' => self.punct(Token::Equals),
                b'*' => self.punct(Token::Asterisk),
                b'$' => self.punct(Token::Dollar),
                b'#' => self.entity_ref()?,
                b'\'' => self.string()?,
                b'.' => self.enumeration()?,
                b'-' | b'+' if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.number()?
                }
                b'0'..=b'9' => self.number()?,
                c if c.is_ascii_alphabetic() || c == b'_' => self.keyword(),
                c => {
                    return Err(self.error(format!("unexpected character '{}'", c as char)));
                }
            };
            tokens.push(SpannedToken { token, line });
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let ch = self.peek()?;
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> StepError {
        StepError::lexer(self.line, self.col, message)
    }

    fn punct(&mut self, token: Token) -> Token {
        self.bump();
        token
    }

    /// Consume bytes while `pred` holds and return them as text.
    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> String {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
        String::from_utf8_lossy(&self.input[start..self.pos]).into_owned()
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
                self.bump();
            }
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'*') {
                let (line, col) = (self.line, self.col);
                self.bump();
                self.bump();
                loop {
                    match self.bump() {
                        Some(b'*') if self.peek() == Some(b'/') => {
                            self.bump();
                            break;
                        }
                        Some(_) => {}
                        None => return Err(StepError::lexer(line, col, "unterminated comment")),
                    }
                }
                continue;
            }
            return Ok(());
        }
    }

    fn entity_ref(&mut self) -> Result<Token> {
        self.bump();
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(self.error("expected digits after '#'"));
        }
        digits
            .parse()
            .map(Token::EntityRef)
            .map_err(|_| self.error(format!("invalid entity id #{digits}")))
    }

    fn string(&mut self) -> Result<Token> {
        let (line, col) = (self.line, self.col);
        self.bump();
        let mut content = Vec::new();
        loop {
            match self.bump() {
                None => return Err(StepError::lexer(line, col, "unterminated string")),
                Some(b'\'') if self.peek() == Some(b'\'') => {
                    self.bump();
                    content.push(b'\'');
                }
                Some(b'\'') => break,
                Some(c) => content.push(c),
            }
        }
        Ok(Token::String(String::from_utf8_lossy(&content).into_owned()))
    }

    fn enumeration(&mut self) -> Result<Token> {
        self.bump();
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_');
        if name.is_empty() {
            return Err(self.error("empty enumeration"));
        }
        if self.bump() != Some(b'.') {
            return Err(self.error(format!("enumeration .{name} is not closed")));
        }
        Ok(Token::Enum(name.to_ascii_uppercase()))
    }

    fn number(&mut self) -> Result<Token> {
        let mut text = String::new();
        if let Some(sign @ (b'-' | b'+')) = self.peek() {
            self.bump();
            text.push(sign as char);
        }
        text += &self.take_while(|c| c.is_ascii_digit());

        let mut real = false;
        // After digits a '.' always belongs to the number: `1.` is a real.
        if self.peek() == Some(b'.') {
            self.bump();
            real = true;
            text.push('.');
            text += &self.take_while(|c| c.is_ascii_digit());
        }
        if let Some(b'E' | b'e') = self.peek() {
            self.bump();
            real = true;
            text.push('E');
            if let Some(sign @ (b'-' | b'+')) = self.peek() {
                self.bump();
                text.push(sign as char);
            }
            let exponent = self.take_while(|c| c.is_ascii_digit());
            if exponent.is_empty() {
                return Err(self.error(format!("missing exponent in {text}")));
            }
            text += &exponent;
        }

        if real {
            text.parse()
                .map(Token::Real)
                .map_err(|_| self.error(format!("invalid real {text}")))
        } else {
            text.parse()
                .map(Token::Integer)
                .map_err(|_| self.error(format!("invalid integer {text}")))
        }
    }

    fn keyword(&mut self) -> Token {
        let name = self.take_while(|c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-');
        Token::Keyword(name.to_ascii_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input.as_bytes())
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|st| st.token)
            .collect()
    }

    #[test]
    fn test_references_and_strings() {
        assert_eq!(tokenize("#42"), vec![Token::EntityRef(42)]);
        assert_eq!(tokenize("'it''s'"), vec![Token::String("it's".into())]);
        assert_eq!(tokenize("''"), vec![Token::String(String::new())]);
    }

    #[test]
    fn test_numbers() {
        assert_eq!(tokenize("42"), vec![Token::Integer(42)]);
        assert_eq!(tokenize("-7"), vec![Token::Integer(-7)]);
        assert_eq!(tokenize("1."), vec![Token::Real(1.0)]);
        assert_eq!(tokenize("-1.5E-10"), vec![Token::Real(-1.5e-10)]);
        assert_eq!(tokenize("1.E-5"), vec![Token::Real(1e-5)]);
        assert_eq!(tokenize("2.5e3"), vec![Token::Real(2500.0)]);
    }

    #[test]
    fn test_enum_after_comma() {
        assert_eq!(
            tokenize("1.,.T."),
            vec![Token::Real(1.0), Token::Comma, Token::Enum("T".into())]
        );
    }

    #[test]
    fn test_keywords_with_hyphens() {
        assert_eq!(
            tokenize("END-ISO-10303-21;"),
            vec![Token::Keyword("END-ISO-10303-21".into()), Token::Semicolon]
        );
        assert_eq!(tokenize("data"), vec![Token::Keyword("DATA".into())]);
    }

    #[test]
    fn test_comments_and_lines() {
        let tokens = Lexer::new(b"/* header\n comment */\n#1 = $;")
            .tokenize()
            .unwrap();
        assert_eq!(tokens[0].token, Token::EntityRef(1));
        assert_eq!(tokens[0].line, 3);
        assert_eq!(tokens[2].token, Token::Dollar);
    }

    #[test]
    fn test_errors() {
        assert!(Lexer::new(b"'open").tokenize().is_err());
        assert!(Lexer::new(b"/* open").tokenize().is_err());
        assert!(Lexer::new(b"#").tokenize().is_err());
        assert!(Lexer::new(b"1.5E").tokenize().is_err());
        assert!(matches!(
            Lexer::new(b"@").tokenize(),
            Err(StepError::Lexer { line: 1, col: 1, .. })
        ));
    }
}
