//! # Clef Music Notation Compiler
//!
//! A text-based music notation language compiler that resolves a brace-delimited
//! score into a validated, time-ordered event graph for downstream playback or
//! sequencing engines.
//!
//! ## Compilation Pipeline
//!
//! ```text
//! Clef source → Lexer → Parser → AST → Semantic Analyzer → Event Compiler → EventGraph
//! ```
//!
//! 1. **Lexer** ([`lexer`]) - Tokenizes Clef source into tokens with line/column info
//! 2. **Parser** ([`parser`]) - Recursive-descent parse into a typed [`ast::Score`]
//! 3. **Semantic Analyzer** ([`semantic`]) - Validates measure durations, ties, tuplets,
//!    voice synchronization, pedal state, and instrument names
//! 4. **Event Compiler** ([`compiler`]) - Produces a flat, time-ordered [`events::EventGraph`]
//!    with exact rational timestamps, GM instrument/channel assignment, tie fusion, and
//!    ornament expansion
//!
//! This crate never emits MIDI bytes, MusicXML, or any other wire format — its contract
//! ends at the typed [`events::EventGraph`].
//!
//! ## Quick Start
//!
//! ```rust
//! use clef::compile_source;
//!
//! let source = "score { tempo 120 time 4/4 staff piano { measure { C4 q D4 q E4 q F4 q } } }";
//! let graph = compile_source(source)?;
//! assert_eq!(graph.len(), 4 + 2); // 4 notes, plus initial tempo + time signature events
//! # Ok::<(), clef::GenError>(())
//! ```
//!
//! ## Public API Entry Points
//!
//! - [`parse()`] - Parse Clef source into an [`ast::Score`]
//! - [`analyze()`] - Validate a score, strict or accumulating
//! - [`compile()`] / [`compile_with_options()`] - Compile a validated score into an event graph
//! - [`compile_source()`] / [`compile_source_strict()`] - The whole pipeline in one call
//!
//! ## Module Structure
//!
//! - [`ast`] - Abstract Syntax Tree type definitions (Score, Measure, Note, etc.)
//! - [`rational`] - Exact rational arithmetic for musical time
//! - [`error`] - Error types (`GenError` and its variants)
//! - [`lexer`] - Tokenization (source text → tokens)
//! - [`parser`] - Parsing (tokens → `Score` AST)
//! - [`semantic`] - Validation (durations, ties, tuplets, voices, pedal, instruments)
//! - [`events`] - The compiled event graph and its event types
//! - [`compiler`] - AST → `EventGraph` compilation

pub mod ast;
pub mod compiler;
pub mod error;
pub mod events;
pub mod lexer;
pub mod parser;
pub mod rational;
pub mod semantic;

pub mod api;

pub use ast::*;
pub use error::*;
pub use events::{Event, EventGraph};
pub use rational::Rational;

pub use api::{analyze, compile, compile_source, compile_source_strict, compile_with_options, parse};
