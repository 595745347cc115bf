//! Per-session options for importers and exporters.

use std::time::Duration;

use brepx_kernel::{IgesVersion, StepSchema};
use tracing::Span;

use crate::error::{ExchangeError, Result};
use crate::format::{Format, IGES_VERSION, STEP_SCHEMA};

/// Options of an export session.
///
/// Options that do not apply to the bound format are ignored.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    step_schema: Option<String>,
    iges_version: Option<String>,
    span: Option<Span>,
}

impl ExportOptions {
    /// Defaults for every format.
    pub fn new() -> Self {
        Self::default()
    }

    /// STEP schema, one of `AP203` or `AP214CD`.
    pub fn step_schema(mut self, schema: impl Into<String>) -> Self {
        self.step_schema = Some(schema.into());
        self
    }

    /// IGES version, one of `5.1` or `5.3`.
    pub fn iges_version(mut self, version: impl Into<String>) -> Self {
        self.iges_version = Some(version.into());
        self
    }

    /// Span the session span is parented to, instead of the current span.
    pub fn parent_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub(crate) fn parent(&self) -> Span {
        self.span.clone().unwrap_or_else(Span::current)
    }

    /// IGES version after validation against the registry.
    pub fn resolved_iges_version(&self) -> Result<IgesVersion> {
        let value = resolve(Format::Iges, IGES_VERSION, self.iges_version.as_deref())?;
        value
            .parse()
            .map_err(|_| ExchangeError::invalid_option(IGES_VERSION, value, &[]))
    }

    /// STEP schema after validation against the registry.
    pub fn resolved_step_schema(&self) -> Result<StepSchema> {
        let value = resolve(Format::Step, STEP_SCHEMA, self.step_schema.as_deref())?;
        value
            .parse()
            .map_err(|_| ExchangeError::invalid_option(STEP_SCHEMA, value, &[]))
    }
}

/// Validate `value` for `option` of `format`, falling back to the default.
fn resolve(format: Format, option: &str, value: Option<&str>) -> Result<&'static str> {
    let spec = format
        .spec()
        .option(option)
        .ok_or_else(|| ExchangeError::invalid_option(option, value.unwrap_or_default(), &[]))?;
    let resolved = match value {
        Some(v) => spec.validate(v)?,
        None => spec.default,
    };
    tracing::debug!(format = %format, option, value = resolved, "resolved option");
    Ok(resolved)
}

/// Options of an import session.
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    read_timeout: Option<Duration>,
    span: Option<Span>,
}

impl ImportOptions {
    /// Unbounded read, parented to the current span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`ExchangeError::ReadTimeout`] when reading takes longer.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Span the session span is parented to, instead of the current span.
    pub fn parent_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub(crate) fn parent(&self) -> Span {
        self.span.clone().unwrap_or_else(Span::current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ExportOptions::new();
        assert_eq!(options.resolved_iges_version().unwrap(), IgesVersion::V5_1);
        assert_eq!(options.resolved_step_schema().unwrap(), StepSchema::Ap214Cd);
    }

    #[test]
    fn test_explicit_values() {
        let options = ExportOptions::new().step_schema("AP203").iges_version("5.3");
        assert_eq!(options.resolved_iges_version().unwrap(), IgesVersion::V5_3);
        assert_eq!(options.resolved_step_schema().unwrap(), StepSchema::Ap203);
    }

    #[test]
    fn test_invalid_values() {
        let options = ExportOptions::new().step_schema("AP242").iges_version("6.0");
        match options.resolved_step_schema().unwrap_err() {
            ExchangeError::InvalidOption { option, value, allowed } => {
                assert_eq!(option, "step_schema");
                assert_eq!(value, "AP242");
                assert_eq!(allowed, "AP203, AP214CD");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            options.resolved_iges_version(),
            Err(ExchangeError::InvalidOption { .. })
        ));
    }
}
