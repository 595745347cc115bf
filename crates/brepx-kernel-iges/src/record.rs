//! Fixed-format IGES records: Start, Global, Directory Entry, Parameter
//! Data and Terminate sections in 80-column lines.
//!
//! Columns 1-72 carry data (1-64 in the P section, followed by the owning
//! directory entry pointer in 65-72), column 73 the section letter and
//! 74-80 the sequence number.

use crate::error::{IgesError, Result};

/// One parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Integer, also used for pointers.
    Int(i64),
    /// Real.
    Real(f64),
    /// Hollerith string (`5Hbrepx`).
    Str(String),
    /// Empty field, meaning the default value.
    Default,
}

impl Param {
    fn encode(&self) -> String {
        match self {
            Param::Int(v) => v.to_string(),
            Param::Real(v) => format_real(*v),
            Param::Str(s) => {
                let text = ascii(s);
                format!("{}H{text}", text.len())
            }
            Param::Default => String::new(),
        }
    }

    /// Integer value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Param::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Real value; integers are widened.
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Param::Real(v) => Some(*v),
            Param::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// String value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Records are ASCII; anything else is replaced.
fn ascii(s: &str) -> String {
    s.chars().map(|c| if c.is_ascii() { c } else { '_' }).collect()
}

/// Shortest round-trip text with an upper-case exponent and a decimal point.
fn format_real(v: f64) -> String {
    let text = format!("{v:?}");
    match text.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => text,
    }
}

fn parse_scalar(token: &str, line: usize) -> Result<Param> {
    if token.is_empty() {
        return Ok(Param::Default);
    }
    if token.contains(['.', 'E', 'e', 'D', 'd']) {
        let normalized = token.replace(['D', 'd'], "E");
        normalized
            .parse()
            .map(Param::Real)
            .map_err(|_| IgesError::format(line, format!("invalid real '{token}'")))
    } else {
        token
            .parse()
            .map(Param::Int)
            .map_err(|_| IgesError::format(line, format!("invalid integer '{token}'")))
    }
}

/// Split free-format parameter text with the default `,` and `;`
/// delimiters. Parsing stops at the record delimiter.
pub(crate) fn split_params(text: &str, line: usize) -> Result<Vec<Param>> {
    let bytes = text.as_bytes();
    let skip_blanks = |mut i: usize| {
        while i < bytes.len() && bytes[i] == b' ' {
            i += 1;
        }
        i
    };

    let mut params = Vec::new();
    let mut i = skip_blanks(0);
    while i < bytes.len() {
        let digits_end = i + bytes[i..].iter().take_while(|b| b.is_ascii_digit()).count();
        if digits_end > i && bytes.get(digits_end) == Some(&b'H') {
            let count: usize = text[i..digits_end]
                .parse()
                .map_err(|_| IgesError::format(line, "invalid Hollerith count"))?;
            let start = digits_end + 1;
            let body = start
                .checked_add(count)
                .and_then(|end| bytes.get(start..end))
                .ok_or_else(|| IgesError::format(line, "Hollerith string runs past the record"))?;
            let end = start + body.len();
            params.push(Param::Str(String::from_utf8_lossy(body).into_owned()));
            i = end;
        } else {
            let end = i + bytes[i..].iter().take_while(|b| **b != b',' && **b != b';').count();
            let token = String::from_utf8_lossy(&bytes[i..end]);
            params.push(parse_scalar(token.trim(), line)?);
            i = end;
        }

        i = skip_blanks(i);
        match bytes.get(i) {
            None | Some(b';') => break,
            Some(b',') => i = skip_blanks(i + 1),
            Some(other) => {
                return Err(IgesError::format(
                    line,
                    format!("expected a delimiter, got '{}'", *other as char),
                ))
            }
        }
    }
    Ok(params)
}

/// Encode parameters as delimited tokens, the last one closing the record.
fn delimited(params: &[Param]) -> Vec<String> {
    let last = params.len().saturating_sub(1);
    params
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}{}", p.encode(), if i == last { ';' } else { ',' }))
        .collect()
}

/// Pack tokens into lines of at most `width` columns, keeping tokens whole
/// unless a single token is wider than a line.
fn pack(tokens: &[String], width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for token in tokens {
        if !current.is_empty() && current.len() + token.len() > width {
            lines.push(std::mem::take(&mut current));
        }
        let mut rest = token.as_str();
        while current.len() + rest.len() > width {
            let (head, tail) = rest.split_at(width - current.len());
            current.push_str(head);
            lines.push(std::mem::take(&mut current));
            rest = tail;
        }
        current.push_str(rest);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// An entity with its directory entry attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    /// Entity type number (110 line, 510 face, ...).
    pub type_code: i32,
    /// Form number.
    pub form: i32,
    /// Parameters following the entity type in the P section.
    pub params: Vec<Param>,
    /// Directory pointer of a 124 transformation matrix, 0 for none.
    pub transform: usize,
    /// Independent entity (subordinate switch `00`).
    pub independent: bool,
}

impl Entity {
    /// A dependent entity without transformation.
    pub fn new(type_code: i32, form: i32, params: Vec<Param>) -> Self {
        Self {
            type_code,
            form,
            params,
            transform: 0,
            independent: false,
        }
    }
}

/// Directory pointer of the entity stored at `index`.
pub fn de_pointer(index: usize) -> usize {
    2 * index + 1
}

/// Content of an IGES file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgesFile {
    /// Start section text.
    pub start: String,
    /// Global section parameters.
    pub global: Vec<Param>,
    /// Entities in directory order; entity `i` has pointer `2i + 1`.
    pub entities: Vec<Entity>,
}

impl IgesFile {
    /// Entity by directory pointer.
    pub fn get(&self, de: usize) -> Result<&Entity> {
        if de % 2 == 0 {
            return Err(IgesError::MissingEntity(de));
        }
        self.entities.get((de - 1) / 2).ok_or(IgesError::MissingEntity(de))
    }

    /// Global parameter 23, the IGES version flag.
    pub fn version_flag(&self) -> Option<i64> {
        self.global.get(22).and_then(Param::as_int)
    }

    /// Serialize to 80-column text.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let mut emit = |data: &str, section: char, seq: usize| {
            out.push_str(&format!("{data:<72}{section}{seq:>7}\n"));
        };

        let start_lines = pack(&[ascii(&self.start)], 72);
        let start_lines = if start_lines.is_empty() { vec![String::new()] } else { start_lines };
        for (i, line) in start_lines.iter().enumerate() {
            emit(line, 'S', i + 1);
        }

        let global_lines = pack(&delimited(&self.global), 72);
        for (i, line) in global_lines.iter().enumerate() {
            emit(line, 'G', i + 1);
        }

        let mut param_lines: Vec<(usize, String)> = Vec::new();
        let mut spans = Vec::with_capacity(self.entities.len());
        for (index, entity) in self.entities.iter().enumerate() {
            let mut params = vec![Param::Int(entity.type_code.into())];
            params.extend(entity.params.iter().cloned());
            let lines = pack(&delimited(&params), 64);
            spans.push((param_lines.len() + 1, lines.len()));
            param_lines.extend(lines.into_iter().map(|l| (de_pointer(index), l)));
        }

        for (index, (entity, (first, count))) in self.entities.iter().zip(&spans).enumerate() {
            let status = format!("00{:02}0000", if entity.independent { 0 } else { 1 });
            let line1 = format!(
                "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
                entity.type_code, first, 0, 0, 0, 0, entity.transform, 0, status
            );
            emit(&line1, 'D', 2 * index + 1);
            let line2 = format!(
                "{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}{:>8}",
                entity.type_code, 0, 0, count, entity.form, "", "", "", 0
            );
            emit(&line2, 'D', 2 * index + 2);
        }

        for (i, (de, line)) in param_lines.iter().enumerate() {
            emit(&format!("{line:<64}{de:>8}"), 'P', i + 1);
        }

        let totals = format!(
            "S{:>7}G{:>7}D{:>7}P{:>7}",
            start_lines.len(),
            global_lines.len(),
            2 * self.entities.len(),
            param_lines.len()
        );
        emit(&totals, 'T', 1);
        out
    }

    /// Parse 80-column text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut start = String::new();
        let mut global = String::new();
        let mut global_line = 0;
        let mut directory: Vec<(usize, &str)> = Vec::new();
        let mut parameters: Vec<(usize, &str)> = Vec::new();
        let mut terminated = false;

        for (n, raw) in text.lines().enumerate() {
            let line_no = n + 1;
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let data = line
                .get(..72)
                .ok_or_else(|| IgesError::format(line_no, "record shorter than 73 columns"))?;
            let section = line.as_bytes().get(72).copied().unwrap_or(b' ');
            match section {
                b'S' => start.push_str(data.trim_end()),
                b'G' => {
                    if global_line == 0 {
                        global_line = line_no;
                    }
                    global.push_str(data);
                }
                b'D' => directory.push((line_no, data)),
                b'P' => parameters.push((line_no, data)),
                b'T' => terminated = true,
                other => {
                    return Err(IgesError::format(
                        line_no,
                        format!("unknown section letter '{}'", other as char),
                    ))
                }
            }
        }
        if !terminated {
            return Err(IgesError::format(0, "missing terminate section"));
        }
        if directory.len() % 2 != 0 {
            return Err(IgesError::format(0, "directory section has an odd number of lines"));
        }

        let global = split_params(&global, global_line)?;
        if let Some(Param::Str(delimiter)) = global.first() {
            if delimiter != "," {
                return Err(IgesError::format(global_line, "custom delimiters are not supported"));
            }
        }

        let mut entities = Vec::with_capacity(directory.len() / 2);
        for pair in directory.chunks_exact(2) {
            let (no1, line1) = pair[0];
            let (no2, line2) = pair[1];
            let type_code = field(line1, 0, no1)? as i32;
            let first = field(line1, 1, no1)?;
            let transform = field(line1, 6, no1)?;
            let status = line1.get(64..72).unwrap_or("").replace(' ', "0");
            let independent = status.get(2..4).map_or(true, |s| s == "00");
            let count = field(line2, 3, no2)?;
            let form = field(line2, 4, no2)? as i32;

            let body = first
                .checked_sub(1)
                .and_then(|lo| parameters.get(lo as usize..(lo + count) as usize))
                .ok_or_else(|| IgesError::format(no1, "parameter pointer out of range"))?;
            let text: String = body.iter().map(|(_, l)| l.get(..64).unwrap_or(*l)).collect();
            let p_line = body.first().map_or(no1, |(n, _)| *n);
            let mut params = split_params(&text, p_line)?;
            if params.is_empty() || params[0].as_int() != Some(type_code.into()) {
                return Err(IgesError::format(p_line, "parameter record does not match its entity type"));
            }
            params.remove(0);

            entities.push(Entity {
                type_code,
                form,
                params,
                transform: transform as usize,
                independent,
            });
        }

        Ok(Self {
            start,
            global,
            entities,
        })
    }
}

/// Integer field `k` (8 columns) of a directory line; blank is 0.
fn field(line: &str, k: usize, line_no: usize) -> Result<i64> {
    let text = line.get(k * 8..k * 8 + 8).unwrap_or("").trim();
    if text.is_empty() {
        return Ok(0);
    }
    let value: i64 = text
        .parse()
        .map_err(|_| IgesError::format(line_no, format!("invalid directory field '{text}'")))?;
    if value < 0 {
        // Negative DE fields are pointers to definitions this reader does not use.
        return Ok(0);
    }
    Ok(value)
}
