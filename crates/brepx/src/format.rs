//! Format registry: accepted extensions and legal option values.
//!
//! One table is shared by path validation, the importer and exporter
//! constructors, and the dispatch helpers.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ExchangeError, Result};

/// Name of the IGES version option.
pub const IGES_VERSION: &str = "iges_version";
/// Name of the STEP schema option.
pub const STEP_SCHEMA: &str = "step_schema";

/// Supported exchange formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Native B-rep text format.
    Brep,
    /// IGES 5.x.
    Iges,
    /// STEP (ISO 10303-21).
    Step,
    /// STL triangle mesh.
    Stl,
}

/// A format option and the values it may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    /// Option name.
    pub name: &'static str,
    /// Legal values.
    pub allowed: &'static [&'static str],
    /// Value used when the caller does not supply one.
    pub default: &'static str,
}

impl OptionSpec {
    /// Check `value` against the legal set.
    pub fn validate(&self, value: &str) -> Result<&'static str> {
        self.allowed
            .iter()
            .copied()
            .find(|allowed| *allowed == value)
            .ok_or_else(|| ExchangeError::invalid_option(self.name, value, self.allowed))
    }
}

/// Static metadata of one format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSpec {
    /// Format tag.
    pub format: Format,
    /// Canonical name.
    pub name: &'static str,
    /// Accepted extensions, lower case, without the dot.
    pub extensions: &'static [&'static str],
    /// Options the format understands.
    pub options: &'static [OptionSpec],
}

impl FormatSpec {
    /// `true` when `extension` (any case) belongs to this format.
    pub fn accepts(&self, extension: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(extension))
    }

    /// Look up an option by name.
    pub fn option(&self, name: &str) -> Option<&'static OptionSpec> {
        self.options.iter().find(|o| o.name == name)
    }
}

const IGES_OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: IGES_VERSION,
    allowed: &["5.1", "5.3"],
    default: "5.1",
}];

const STEP_OPTIONS: &[OptionSpec] = &[OptionSpec {
    name: STEP_SCHEMA,
    allowed: &["AP203", "AP214CD"],
    default: "AP214CD",
}];

/// The registry, in [`Format::ALL`] order.
pub static FORMATS: [FormatSpec; 4] = [
    FormatSpec {
        format: Format::Brep,
        name: "brep",
        extensions: &["brep"],
        options: &[],
    },
    FormatSpec {
        format: Format::Iges,
        name: "iges",
        extensions: &["iges", "igs"],
        options: IGES_OPTIONS,
    },
    FormatSpec {
        format: Format::Step,
        name: "step",
        extensions: &["step", "stp"],
        options: STEP_OPTIONS,
    },
    FormatSpec {
        format: Format::Stl,
        name: "stl",
        extensions: &["stl"],
        options: &[],
    },
];

impl Format {
    /// All formats.
    pub const ALL: [Format; 4] = [Format::Brep, Format::Iges, Format::Step, Format::Stl];

    /// Registry entry of this format.
    pub fn spec(self) -> &'static FormatSpec {
        match self {
            Format::Brep => &FORMATS[0],
            Format::Iges => &FORMATS[1],
            Format::Step => &FORMATS[2],
            Format::Stl => &FORMATS[3],
        }
    }

    /// Canonical name.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Accepted extensions.
    pub fn extensions(self) -> &'static [&'static str] {
        self.spec().extensions
    }

    /// Format owning `extension` (case-insensitive, without the dot).
    pub fn from_extension(extension: &str) -> Option<Format> {
        FORMATS.iter().find(|s| s.accepts(extension)).map(|s| s.format)
    }

    /// Format inferred from the extension of `path`.
    pub fn from_path(path: &Path) -> Option<Format> {
        Self::from_extension(&crate::checks::file_extension(path))
    }

    /// Every extension known to the registry.
    pub fn all_extensions() -> Vec<&'static str> {
        FORMATS.iter().flat_map(|s| s.extensions.iter().copied()).collect()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ExchangeError;

    /// Parse a format name or one of its extensions.
    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| ExchangeError::UnknownFormat(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_order() {
        for format in Format::ALL {
            assert_eq!(format.spec().format, format);
        }
    }

    #[test]
    fn test_extension_lookup() {
        assert_eq!(Format::from_extension("IGS"), Some(Format::Iges));
        assert_eq!(Format::from_extension("stp"), Some(Format::Step));
        assert_eq!(Format::from_extension("Brep"), Some(Format::Brep));
        assert_eq!(Format::from_extension("obj"), None);
        assert_eq!(Format::from_path(Path::new("/tmp/part.STL")), Some(Format::Stl));
        assert_eq!(Format::from_path(Path::new("/tmp/part")), None);
        assert_eq!(Format::all_extensions().len(), 6);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("step".parse::<Format>().unwrap(), Format::Step);
        assert!(matches!("dxf".parse::<Format>(), Err(ExchangeError::UnknownFormat(n)) if n == "dxf"));
        assert_eq!(Format::Iges.to_string(), "iges");
    }

    #[test]
    fn test_option_validation() {
        let schema = Format::Step.spec().option(STEP_SCHEMA).unwrap();
        assert_eq!(schema.default, "AP214CD");
        assert_eq!(schema.validate("AP203").unwrap(), "AP203");
        let err = schema.validate("AP242").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value `AP242` for option `step_schema`, expected one of [AP203, AP214CD]"
        );
        assert!(Format::Iges.spec().option(STEP_SCHEMA).is_none());
        assert!(Format::Stl.spec().options.is_empty());
    }
}
