//! # Public API
//!
//! This module contains the main entry points for the Clef compiler library.
//!
//! ## Pipeline Functions
//!
//! - [`parse()`] - Lex and parse Clef source into an [`ast::Score`](crate::ast::Score)
//! - [`analyze()`] - Validate a score, producing a [`ValidationReport`](crate::error::ValidationReport)
//! - [`compile()`] - Compile an already-validated score into an [`EventGraph`](crate::events::EventGraph)
//! - [`compile_source()`] - The full pipeline in one call: parse, analyze (non-strict), compile
//!
//! ## Typical Usage
//!
//! ```rust
//! use clef::compile_source;
//!
//! let source = "score { tempo 120 time 4/4 staff piano { measure { C4 q D4 q E4 q F4 q } } }";
//! let graph = compile_source(source)?;
//! assert_eq!(graph.duration(), clef::rational::r(1, 1));
//! # Ok::<(), clef::GenError>(())
//! ```

use crate::ast::Score;
use crate::compiler::{self, CompileOptions};
use crate::error::{GenError, ValidationReport};
use crate::events::EventGraph;

/// Lexes and parses Clef source text into an AST.
pub fn parse(source: &str) -> Result<Score, GenError> {
    crate::parser::parse(source)
}

/// Validates a parsed score. In strict mode the first error aborts immediately
/// ([`GenError::Semantic`]); in non-strict mode every error is collected and raised
/// together as [`GenError::Validation`] once the whole score has been walked.
pub fn analyze(score: &Score, strict: bool) -> Result<ValidationReport, GenError> {
    crate::semantic::analyze(score, strict)
}

/// Compiles an already-parsed score into a time-ordered [`EventGraph`], using
/// default GM instrument assignment.
pub fn compile(score: &Score) -> EventGraph {
    compiler::compile_score(score, CompileOptions::default())
}

/// Compiles an already-parsed score with custom instrument overrides.
pub fn compile_with_options(score: &Score, options: CompileOptions) -> EventGraph {
    compiler::compile_score(score, options)
}

/// The full pipeline in one call: parse, validate in non-strict mode, compile.
///
/// Returns [`GenError::Validation`] if the score fails validation — even a single
/// accumulated error stops compilation, since a malformed score has no well-defined
/// event graph.
///
/// # Example
/// ```rust
/// use clef::{compile_source, GenError};
///
/// match compile_source("score { }") {
///     Ok(graph) => println!("compiled {} events", graph.len()),
///     Err(GenError::Parse(e)) => eprintln!("parse error: {e}"),
///     Err(GenError::Semantic(e)) => eprintln!("semantic error: {e}"),
///     Err(GenError::Validation(report)) => eprintln!("{report}"),
/// }
/// ```
pub fn compile_source(source: &str) -> Result<EventGraph, GenError> {
    let score = parse(source)?;
    analyze(&score, false)?;
    Ok(compile(&score))
}

/// Like [`compile_source`], but aborts on the first semantic error instead of
/// collecting a full report.
pub fn compile_source_strict(source: &str) -> Result<EventGraph, GenError> {
    let score = parse(source)?;
    analyze(&score, true)?;
    Ok(compile(&score))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rational::r;

    #[test]
    fn compile_source_runs_the_full_pipeline() {
        let graph = compile_source(
            "score { tempo 120 time 4/4 staff piano { measure { C4 q D4 q E4 q F4 q } } }",
        )
        .unwrap();
        assert_eq!(graph.duration(), r(1, 1));
    }

    #[test]
    fn compile_source_rejects_an_incomplete_measure() {
        let err = compile_source("score { time 4/4 staff p { measure { C4 q } } }").unwrap_err();
        assert!(matches!(err, GenError::Validation(_)));
    }

    #[test]
    fn compile_source_strict_aborts_on_first_error() {
        let err =
            compile_source_strict("score { time 4/4 staff p { measure { C4 q } } }").unwrap_err();
        assert!(matches!(err, GenError::Semantic(_)));
    }

    #[test]
    fn empty_score_compiles_to_an_empty_graph_of_zero_duration() {
        let graph = compile_source("score { }").unwrap();
        assert!(graph.is_empty() || graph.note_events().count() == 0);
        assert_eq!(graph.duration(), r(0, 1));
    }
}
