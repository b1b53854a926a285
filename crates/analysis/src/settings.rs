//! Analysis settings.
//!
//! One `Settings` value is shared read-only by every pass of a translation
//! unit; units analyzed in parallel may share a single instance.

use std::time::Duration;

use rustc_hash::FxHashSet;

use crate::library::Library;
use crate::platform::Platform;

/// Language standards in effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CppStandard {
    /// C++03.
    Cpp03,
    /// C++11.
    Cpp11,
    /// C++17.
    Cpp17,
    /// C++20.
    Cpp20,
}

/// Standards configuration.
#[derive(Clone, Debug)]
pub struct Standards {
    /// Active C++ standard.
    pub cpp: CppStandard,
}

impl Default for Standards {
    fn default() -> Self {
        Standards {
            cpp: CppStandard::Cpp17,
        }
    }
}

/// Shared, read-only analysis configuration.
#[derive(Clone, Debug)]
pub struct Settings {
    /// Target platform widths.
    pub platform: Platform,
    /// Library configuration database.
    pub library: Library,
    /// Language standards.
    pub standards: Standards,
    /// Report inconclusive findings; when off, values that would become
    /// inconclusive are dropped instead.
    pub certainty_inconclusive: bool,
    /// Emit bailout diagnostics at debug severity.
    pub debug_warnings: bool,
    /// Functions whose unknown return values should be enumerated.
    pub check_unknown_function_return: FxHashSet<String>,
    /// Wall-clock budget for the value-flow fixed-point loop.
    pub value_flow_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            platform: Platform::native(),
            library: Library::with_defaults(),
            standards: Standards::default(),
            certainty_inconclusive: false,
            debug_warnings: false,
            check_unknown_function_return: FxHashSet::default(),
            value_flow_timeout: Duration::from_secs(10),
        }
    }
}

impl Settings {
    /// Default settings with bailout diagnostics enabled.
    pub fn with_debug_warnings() -> Self {
        Settings {
            debug_warnings: true,
            ..Settings::default()
        }
    }
}
