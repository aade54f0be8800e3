//! Core library for the schwa language toolchain.
//!
//! This crate provides the whole compiler pipeline for schwa, a small
//! statically-typed, indentation-structured language that compiles to
//! a WebAssembly-compatible binary module:
//!
//!   source .schwa
//!     -> lexer      (tokens)
//!     -> parser     (AST)
//!     -> validator + analyzer (validity flags, scopes, types)
//!     -> formatter  (canonical source, side artifact)
//!     -> generator  (module bytes via the binary codec)
//!
//! Higher-level tools (CLI, editors, etc.) should depend on this crate
//! rather than reimplementing the pipeline.

// ---------------------------------------------------------------------
// Error handling and diagnostics
// ---------------------------------------------------------------------

pub mod diagnostic;
pub mod error;

// ---------------------------------------------------------------------
// Front-end data model: tokens and the AST arena
// ---------------------------------------------------------------------

pub mod token;
pub mod ast;

// ---------------------------------------------------------------------
// Front-end stages
// ---------------------------------------------------------------------

pub mod lexer;
pub mod parser;

// ---------------------------------------------------------------------
// Semantic layers: validity, scopes and symbols, types
// ---------------------------------------------------------------------

pub mod validator;
pub mod scope;
pub mod analyzer;

// ---------------------------------------------------------------------
// Back-end: binary codec, module builders, code generation
// ---------------------------------------------------------------------

pub mod binary;
pub mod wasm;
pub mod formatter;
pub mod generator;
pub mod compiler;

// ---------------------------------------------------------------------
// Public API re-exports
// ---------------------------------------------------------------------

pub use compiler::{CompilationArtifact, compile, compile_with_log};
pub use diagnostic::{Diagnostic, DiagnosticLog, Severity};
pub use error::CoreError;
