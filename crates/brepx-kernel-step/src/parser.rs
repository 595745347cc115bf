//! Part 21 parser: builds the untyped entity graph of an exchange file.
//!
//! Entities are kept as a type name plus nested argument values; giving
//! them meaning is the reader's job.

use std::collections::BTreeMap;

use crate::error::{Result, StepError};
use crate::lexer::{Lexer, SpannedToken, Token};

/// A single argument value of a STEP entity.
#[derive(Debug, Clone, PartialEq)]
pub enum StepValue {
    /// Entity reference (`#123`).
    EntityRef(u64),
    /// String literal.
    String(String),
    /// Real number.
    Real(f64),
    /// Integer number.
    Integer(i64),
    /// Enumeration (`.T.`).
    Enum(String),
    /// Parenthesized list.
    List(Vec<StepValue>),
    /// Derived value (`*`).
    Derived,
    /// Unset value (`$`).
    Null,
    /// Inline typed value, `TYPE_NAME(args)`.
    Typed {
        /// The type name.
        type_name: String,
        /// Arguments.
        args: Vec<StepValue>,
    },
}

impl StepValue {
    /// Entity reference, if this is one.
    pub fn as_entity_ref(&self) -> Option<u64> {
        match self {
            StepValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    /// Real value; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            StepValue::Real(v) => Some(*v),
            StepValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// String contents, if this is a string.
    pub fn as_string(&self) -> Option<&str> {
        match self {
            StepValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Enumeration name, if this is an enumeration.
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            StepValue::Enum(s) => Some(s),
            _ => None,
        }
    }

    /// List items, if this is a list.
    pub fn as_list(&self) -> Option<&[StepValue]> {
        match self {
            StepValue::List(v) => Some(v),
            _ => None,
        }
    }

    /// `true` for `$`.
    pub fn is_null(&self) -> bool {
        matches!(self, StepValue::Null)
    }
}

/// A parsed STEP entity.
///
/// Complex instances (`#5 = (A() B());`) have an empty type name and one
/// [`StepValue::Typed`] argument per partial entity.
#[derive(Debug, Clone, PartialEq)]
pub struct StepEntity {
    /// Entity id (0 for header entities).
    pub id: u64,
    /// Entity type name, upper-cased.
    pub type_name: String,
    /// Constructor arguments.
    pub args: Vec<StepValue>,
}

/// The parsed content of an exchange file.
#[derive(Debug, Clone, Default)]
pub struct StepFile {
    /// Header section entities, in file order.
    pub header: Vec<StepEntity>,
    /// Data section entities, ordered by id.
    pub entities: BTreeMap<u64, StepEntity>,
}

impl StepFile {
    /// Parse an exchange file from bytes.
    pub fn parse(input: &[u8]) -> Result<Self> {
        let tokens = Lexer::new(input).tokenize()?;
        Parser { tokens, pos: 0 }.file()
    }

    /// Entity by id.
    pub fn get(&self, id: u64) -> Option<&StepEntity> {
        self.entities.get(&id)
    }

    /// Entity by id, failing when the reference dangles.
    pub fn require(&self, id: u64) -> Result<&StepEntity> {
        self.get(id).ok_or(StepError::MissingEntity(id))
    }

    /// Entities of one type, in id order.
    pub fn entities_of_type<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a StepEntity> + 'a {
        self.entities.values().filter(move |e| e.type_name == type_name)
    }

    /// Schema identifiers listed by the `FILE_SCHEMA` header entity.
    pub fn schema_names(&self) -> Vec<String> {
        self.header
            .iter()
            .filter(|e| e.type_name == "FILE_SCHEMA")
            .filter_map(|e| e.args.first()?.as_list())
            .flatten()
            .filter_map(|v| v.as_string().map(str::to_string))
            .collect()
    }
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl Parser {
    fn file(mut self) -> Result<StepFile> {
        let mut file = StepFile::default();
        self.expect_keyword("ISO-10303-21")?;
        self.expect(&Token::Semicolon)?;

        loop {
            match self.peek() {
                Some(Token::Keyword(k)) if k == "HEADER" => {
                    self.pos += 1;
                    self.expect(&Token::Semicolon)?;
                    file.header = self.header_section()?;
                }
                Some(Token::Keyword(k)) if k == "DATA" => {
                    self.pos += 1;
                    // DATA may carry a parameter list in newer editions.
                    if self.peek() == Some(&Token::LParen) {
                        self.arguments(None)?;
                    }
                    self.expect(&Token::Semicolon)?;
                    self.data_section(&mut file.entities)?;
                }
                Some(Token::Keyword(k)) if k == "END-ISO-10303-21" => {
                    self.pos += 1;
                    self.expect(&Token::Semicolon)?;
                    return Ok(file);
                }
                other => {
                    let message = format!("expected a section, got {other:?}");
                    return Err(self.error(None, message));
                }
            }
        }
    }

    fn header_section(&mut self) -> Result<Vec<StepEntity>> {
        let mut header = Vec::new();
        while let Some(Token::Keyword(name)) = self.peek().cloned() {
            self.pos += 1;
            if name == "ENDSEC" {
                self.expect(&Token::Semicolon)?;
                return Ok(header);
            }
            let args = self.arguments(None)?;
            self.expect(&Token::Semicolon)?;
            header.push(StepEntity {
                id: 0,
                type_name: name,
                args,
            });
        }
        Err(self.error(None, "header section is not closed by ENDSEC"))
    }

    fn data_section(&mut self, entities: &mut BTreeMap<u64, StepEntity>) -> Result<()> {
        loop {
            match self.peek().cloned() {
                Some(Token::Keyword(k)) if k == "ENDSEC" => {
                    self.pos += 1;
                    return self.expect(&Token::Semicolon);
                }
                Some(Token::EntityRef(id)) => {
                    self.pos += 1;
                    self.expect(&Token::Equals)?;
                    let entity = self.instance(id)?;
                    self.expect(&Token::Semicolon)?;
                    if entities.insert(id, entity).is_some() {
                        return Err(self.error(Some(id), "duplicate entity id"));
                    }
                }
                other => {
                    let message = format!("expected an entity instance, got {other:?}");
                    return Err(self.error(None, message));
                }
            }
        }
    }

    fn instance(&mut self, id: u64) -> Result<StepEntity> {
        match self.peek().cloned() {
            Some(Token::Keyword(type_name)) => {
                self.pos += 1;
                let args = self.arguments(Some(id))?;
                Ok(StepEntity { id, type_name, args })
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let mut parts = Vec::new();
                while let Some(Token::Keyword(type_name)) = self.peek().cloned() {
                    self.pos += 1;
                    let args = self.arguments(Some(id))?;
                    parts.push(StepValue::Typed { type_name, args });
                }
                self.expect(&Token::RParen)?;
                Ok(StepEntity {
                    id,
                    type_name: String::new(),
                    args: parts,
                })
            }
            other => Err(self.error(Some(id), format!("expected a type name, got {other:?}"))),
        }
    }

    fn arguments(&mut self, entity: Option<u64>) -> Result<Vec<StepValue>> {
        self.expect(&Token::LParen)?;
        let mut values = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(values);
        }
        loop {
            values.push(self.value(entity)?);
            match self.next() {
                Some(Token::Comma) => {}
                Some(Token::RParen) => return Ok(values),
                other => {
                    let message = format!("expected ',' or ')', got {other:?}");
                    return Err(self.error(entity, message));
                }
            }
        }
    }

    fn value(&mut self, entity: Option<u64>) -> Result<StepValue> {
        let value = match self.peek().cloned() {
            Some(Token::LParen) => return self.arguments(entity).map(StepValue::List),
            Some(Token::Keyword(type_name)) => {
                self.pos += 1;
                let args = self.arguments(entity)?;
                return Ok(StepValue::Typed { type_name, args });
            }
            Some(Token::EntityRef(id)) => StepValue::EntityRef(id),
            Some(Token::String(s)) => StepValue::String(s),
            Some(Token::Real(v)) => StepValue::Real(v),
            Some(Token::Integer(v)) => StepValue::Integer(v),
            Some(Token::Enum(s)) => StepValue::Enum(s),
            Some(Token::Asterisk) => StepValue::Derived,
            Some(Token::Dollar) => StepValue::Null,
            other => return Err(self.error(entity, format!("unexpected value {other:?}"))),
        };
        self.pos += 1;
        Ok(value)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.peek().cloned();
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            let message = format!("expected {expected:?}, got {:?}", self.peek());
            Err(self.error(None, message))
        }
    }

    fn expect_keyword(&mut self, name: &str) -> Result<()> {
        match self.peek() {
            Some(Token::Keyword(k)) if k == name => {
                self.pos += 1;
                Ok(())
            }
            other => {
                let message = format!("expected {name}, got {other:?}");
                Err(self.error(None, message))
            }
        }
    }

    fn error(&self, entity: Option<u64>, message: impl Into<String>) -> StepError {
        let line = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |t| t.line);
        StepError::parser(line, entity, message)
    }
}
