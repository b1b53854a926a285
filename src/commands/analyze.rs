//! Analyze C/C++ source files and report findings.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use ccheck_analysis::checks::CheckRegistry;
use ccheck_analysis::errorlogger::{CollectingLogger, Severity};
use ccheck_analysis::platform::Platform;
use ccheck_analysis::settings::Settings;
use ccheck_analysis::tokens::Language;
use ccheck_analysis::{analyze, dump};

/// Analyze C/C++ source files.
#[derive(Parser)]
pub struct AnalyzeCommand {
    /// Source files to analyze.
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Target platform: native, unspecified, unix32, unix64, win32, win64.
    #[arg(long, default_value = "native")]
    platform: String,

    /// Report inconclusive findings.
    #[arg(long)]
    inconclusive: bool,

    /// Print bailout diagnostics.
    #[arg(long)]
    debug: bool,

    /// Dump every token's value set after analysis.
    #[arg(long)]
    debug_valueflow: bool,

    /// Dump the value sets as XML instead of text.
    #[arg(long, requires = "debug_valueflow")]
    xml: bool,
}

fn parse_platform(name: &str) -> Result<Platform> {
    Ok(match name {
        "native" => Platform::native(),
        "unspecified" => Platform::unspecified(),
        "unix32" => Platform::unix32(),
        "unix64" => Platform::unix64(),
        "win32" => Platform::win32(),
        "win64" => Platform::win64(),
        other => anyhow::bail!("unknown platform '{other}'"),
    })
}

fn language_of(path: &Path) -> Language {
    match path.extension().and_then(|e| e.to_str()) {
        Some("c") | Some("h") => Language::C,
        _ => Language::Cpp,
    }
}

impl AnalyzeCommand {
    /// Run the analysis over every given file.
    pub fn execute(self) -> Result<()> {
        let settings = Settings {
            platform: parse_platform(&self.platform)?,
            certainty_inconclusive: self.inconclusive,
            debug_warnings: self.debug,
            ..Settings::default()
        };
        let registry = CheckRegistry::with_default_checks();
        let mut stderr = StandardStream::stderr(ColorChoice::Auto);
        let mut exit_with_findings = false;

        for file in &self.files {
            let code = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let path = file.display().to_string();
            let mut logger = CollectingLogger::new();

            let analysis = match analyze(
                &code,
                &path,
                language_of(file),
                &settings,
                &mut logger,
            ) {
                Ok(analysis) => analysis,
                Err(err) => {
                    // Internal errors abandon this unit only.
                    log::error!("{path}: {err}");
                    let mut spec = ColorSpec::new();
                    spec.set_fg(Some(Color::Red)).set_bold(true);
                    stderr.set_color(&spec)?;
                    write!(stderr, "error")?;
                    stderr.reset()?;
                    writeln!(stderr, ": {path}: {err}")?;
                    continue;
                }
            };

            registry.run_all(&analysis, &settings, &mut logger)?;

            let threshold = if self.debug {
                Severity::Debug
            } else {
                Severity::Style
            };
            for msg in logger.with_severity(threshold) {
                if msg.severity >= Severity::Warning {
                    exit_with_findings = true;
                }
                writeln!(stderr, "{msg}")?;
            }

            if self.debug_valueflow {
                let text = if self.xml {
                    dump::dump_xml(&analysis.tokens)
                } else {
                    dump::dump_text(&analysis.tokens)
                };
                print!("{text}");
            }
        }

        if exit_with_findings {
            std::process::exit(1);
        }
        Ok(())
    }
}
