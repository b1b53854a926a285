//! The ccheck command-line interface library.
//!
//! The heavy lifting lives in the `ccheck-analysis` crate; this crate
//! provides the argument parsing and reporting plumbing around it.

#![deny(trivial_numeric_casts, unused_extern_crates)]
#![warn(unused_import_braces)]

pub mod commands;
