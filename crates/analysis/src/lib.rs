//! ccheck analysis core.
//!
//! The token graph and value-flow analysis for C/C++ sources: a lexer
//! produces a doubly linked token list with an arena-backed entity
//! representation, the symbol pass indexes scopes/variables/functions, an
//! AST overlay is built over the flat token chain, and the value-flow
//! engine attaches possible / known / impossible values to every token.
//! Rule-based checks consume the results through the [`checks`] registry.
//!
//! Analysis is single-threaded per translation unit; separate units may be
//! analyzed in parallel with a shared read-only [`settings::Settings`].

#![deny(missing_docs, trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod astbuild;
pub mod astutils;
pub mod checks;
pub mod dump;
pub mod error;
pub mod errorlogger;
pub mod library;
pub mod mathlib;
pub mod platform;
pub mod programmemory;
pub mod settings;
pub mod symbols;
pub mod tokenizer;
pub mod tokens;
pub mod types;
pub mod valueflow;
pub mod values;

use error::AnalysisResult;
use errorlogger::ErrorLogger;
use settings::Settings;
use symbols::SymbolDatabase;
use tokens::{Language, TokenList};

/// Version number of this crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// One analyzed translation unit: the token graph and its symbol index.
pub struct Analysis {
    /// The token list with AST overlay and value-flow facts.
    pub tokens: TokenList,
    /// Scopes, variables, functions, enumerators.
    pub symbols: SymbolDatabase,
}

/// Analyze one translation unit: tokenize, index symbols, build the AST
/// overlay and run the value-flow engine. Internal errors abandon the unit
/// and are returned; bailouts are reported through `logger` at debug
/// severity and analysis continues.
pub fn analyze(
    code: &str,
    path: &str,
    lang: Language,
    settings: &Settings,
    logger: &mut dyn ErrorLogger,
) -> AnalysisResult<Analysis> {
    let mut tokens = tokenizer::tokenize(code, path, lang)?;
    let symbols = symbols::build(&mut tokens, settings)?;
    astbuild::build_ast(&mut tokens, &symbols, settings)?;
    astbuild::set_value_types(&mut tokens, &symbols, settings);
    tokens.check_chain()?;
    valueflow::set_values(&mut tokens, &symbols, logger, settings)?;
    Ok(Analysis { tokens, symbols })
}
