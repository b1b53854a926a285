//! Rule-based checks that consume the analysis results.
//!
//! The registry is an explicit value constructed at program start and
//! passed by reference into the analyzer entry point — there is no global
//! registration.

pub mod union_zero_init;

use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::settings::Settings;
use crate::Analysis;

/// One rule-based check.
pub trait Check {
    /// Stable name, e.g. `CheckUnionZeroInit`.
    fn name(&self) -> &'static str;

    /// Run the check against one analyzed translation unit.
    fn run_checks(
        &self,
        analysis: &Analysis,
        settings: &Settings,
        logger: &mut dyn ErrorLogger,
    ) -> AnalysisResult<()>;
}

/// The explicit check registry.
#[derive(Default)]
pub struct CheckRegistry {
    checks: Vec<Box<dyn Check>>,
}

impl CheckRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with all built-in checks.
    pub fn with_default_checks() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(union_zero_init::CheckUnionZeroInit));
        registry
    }

    /// Add a check.
    pub fn register(&mut self, check: Box<dyn Check>) {
        self.checks.push(check);
    }

    /// Names of the registered checks.
    pub fn names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|c| c.name()).collect()
    }

    /// Run every check against one analyzed unit.
    pub fn run_all(
        &self,
        analysis: &Analysis,
        settings: &Settings,
        logger: &mut dyn ErrorLogger,
    ) -> AnalysisResult<()> {
        for check in &self.checks {
            check.run_checks(analysis, settings, logger)?;
        }
        Ok(())
    }
}
