//! # Error Types
//!
//! This module defines all error types surfaced by the Clef compiler.
//!
//! All errors include location information (line/column for parse errors, a textual
//! location for semantic errors) to help callers identify and fix issues in Clef source.
//!
//! ## Error Types
//! - `ParseError` - lexer/parser errors with line, column and a source-line excerpt.
//! - `SemanticError` - a single validation failure with an optional location/context.
//! - `ValidationReport` - the bundled errors+warnings produced by a non-strict analysis.
//!
//! ## Usage
//! ```rust
//! use clef::{compile_source, GenError};
//!
//! match compile_source("score { }") {
//!     Ok(_graph) => println!("compiled"),
//!     Err(GenError::Parse(e)) => eprintln!("parse error: {e}"),
//!     Err(GenError::Semantic(e)) => eprintln!("semantic error: {e}"),
//!     Err(GenError::Validation(report)) => {
//!         for e in &report.errors {
//!             eprintln!("error: {e}");
//!         }
//!     }
//! }
//! ```

use crate::ast::KeySignature;
use thiserror::Error;

/// A syntax violation at a specific source position.
///
/// # Example
/// ```
/// # use clef::ParseError;
/// let err = ParseError {
///     message: "Unexpected token ','".to_string(),
///     line: 5,
///     column: 10,
///     source_line: "measure { C4 , }".to_string(),
/// };
/// assert_eq!(
///     err.to_string(),
///     "Unexpected token ',' at line 5, column 10\nmeasure { C4 , }"
/// );
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at line {line}, column {column}\n{source_line}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub source_line: String,
}

/// An AST-level, arithmetic, or stateful validation failure.
///
/// `location` names the staff/voice/measure the error occurred in (when applicable);
/// `context` carries any extra detail (e.g. the offending pitch) worth surfacing.
#[derive(Error, Debug, Clone, PartialEq)]
pub struct SemanticError {
    pub message: String,
    pub location: Option<String>,
    pub context: Option<String>,
}

impl std::fmt::Display for SemanticError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "{} at {}", self.message, loc)?,
            None => write!(f, "{}", self.message)?,
        }
        if let Some(ctx) = &self.context {
            write!(f, "\n  Context: {ctx}")?;
        }
        Ok(())
    }
}

impl SemanticError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            context: None,
        }
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Accumulated result of a non-strict analysis pass: every error and warning collected
/// while walking the score, plus the analyzer's final observed state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub errors: Vec<SemanticError>,
    pub warnings: Vec<String>,
    /// Tempo in effect at the end of the walk (from the last `tempo` directive seen).
    pub final_tempo: Option<u32>,
    /// Time signature in effect at the end of the walk, as `(numerator, denominator)`.
    pub final_time_signature: Option<(u32, u32)>,
    /// Key signature in effect at the end of the walk.
    pub final_key_signature: Option<KeySignature>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} error(s), {} warning(s)", self.errors.len(), self.warnings.len())?;
        for e in &self.errors {
            writeln!(f, "  error: {e}")?;
        }
        for w in &self.warnings {
            writeln!(f, "  warning: {w}")?;
        }
        Ok(())
    }
}

/// Top-level error type returned by this crate's public entry points.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenError {
    /// A fatal, unrecoverable parse failure. Aborts the pipeline; no partial AST is produced.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A single semantic failure, raised immediately in strict-mode analysis.
    #[error(transparent)]
    Semantic(#[from] SemanticError),

    /// The bundled report raised at the end of a non-strict analysis that collected errors.
    #[error("validation failed:\n{0}")]
    Validation(ValidationReport),
}
