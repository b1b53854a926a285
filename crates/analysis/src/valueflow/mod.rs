//! The value-flow engine.
//!
//! A collection of cooperating passes, each adding possible / known /
//! impossible / inconclusive values to tokens. [`set_values`] drives them:
//! seeding passes run once, the main passes iterate to a fixed point
//! (bounded), and a wall-clock budget is consulted between passes —
//! exceeding it keeps the facts computed so far and abandons the rest.

pub(crate) mod condition;
pub(crate) mod constants;
pub(crate) mod container;
pub(crate) mod exprs;
pub(crate) mod forward;
pub(crate) mod infer;
pub(crate) mod lifetime;
pub(crate) mod moves;
pub(crate) mod reverse;
pub(crate) mod settokenvalue;
pub(crate) mod subfunction;
pub(crate) mod uninit;

use std::time::Instant;

use crate::error::AnalysisResult;
use crate::errorlogger::{ErrorLogger, ErrorMessage, FileLocation, Severity};
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::{Token, TokenList};
use crate::values::Value;

pub use condition::either_the_condition_is_redundant;

/// Report a conservative give-up at debug severity. Bailouts never affect
/// analysis results downstream.
pub(crate) fn bailout(list: &TokenList, logger: &mut dyn ErrorLogger, tok: Token, what: &str) {
    let loc = list.location(tok);
    logger.report(ErrorMessage::new(
        FileLocation {
            file: list.file_name(loc.file_index).to_string(),
            line: loc.line,
            column: loc.column,
            info: String::new(),
        },
        Severity::Debug,
        "valueFlowBailout",
        format!("valueflow bailout: {what}"),
    ));
}

/// Bailout variant for names the symbol pass could not resolve.
pub(crate) fn bailout_incomplete_var(
    list: &TokenList,
    logger: &mut dyn ErrorLogger,
    tok: Token,
    what: &str,
) {
    let loc = list.location(tok);
    logger.report(ErrorMessage::new(
        FileLocation {
            file: list.file_name(loc.file_index).to_string(),
            line: loc.line,
            column: loc.column,
            info: String::new(),
        },
        Severity::Debug,
        "valueFlowBailoutIncompleteVar",
        format!("valueflow bailout: {what}"),
    ));
}

/// Constant folding of one expression tree; usable before the full
/// analysis has run. Returns the known value of the root, if any.
pub fn constant_fold_ast(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    expr: Option<Token>,
) -> AnalysisResult<Option<Value>> {
    fn fold(
        list: &mut TokenList,
        symbols: &SymbolDatabase,
        settings: &Settings,
        expr: Option<Token>,
    ) -> AnalysisResult<()> {
        let Some(expr) = expr else { return Ok(()) };
        if !list.values(expr).is_empty() {
            return Ok(());
        }
        fold(list, symbols, settings, list.ast_op1(expr))?;
        fold(list, symbols, settings, list.ast_op2(expr))?;
        constants::fold_constant_at(list, symbols, settings, expr)?;
        Ok(())
    }
    fold(list, symbols, settings, expr)?;
    Ok(expr.and_then(|e| {
        list.values(e)
            .iter()
            .find(|v| v.is_known())
            .cloned()
    }))
}

/// Run the whole value-flow analysis over one translation unit.
pub fn set_values(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    list.clear_all_values();

    let started = Instant::now();
    let deadline = started + settings.value_flow_timeout;
    let mut timed_out = false;
    let mut check_time = |list: &TokenList, logger: &mut dyn ErrorLogger| -> bool {
        if timed_out {
            return true;
        }
        if Instant::now() >= deadline {
            timed_out = true;
            if let Some(front) = list.front() {
                bailout(
                    list,
                    logger,
                    front,
                    "analysis time budget exceeded, keeping partial results",
                );
            }
            log::debug!("value-flow analysis timed out after {:?}", started.elapsed());
        }
        timed_out
    };

    // Seeding passes.
    constants::value_flow_number(list, symbols, settings)?;
    constants::value_flow_string(list, symbols, settings)?;
    constants::value_flow_array(list, symbols, settings)?;
    container::value_flow_unknown_function_return(list, symbols, settings)?;
    constants::value_flow_global_const_var(list, symbols, settings)?;
    constants::value_flow_global_static_var(list, symbols, settings)?;
    exprs::value_flow_pointer_alias(list, symbols, settings)?;
    lifetime::value_flow_lifetime(list, symbols, logger, settings)?;
    if list.is_cpp() {
        container::value_flow_iterators(list, symbols, settings)?;
    }
    exprs::value_flow_bit_and(list, symbols, settings)?;
    exprs::value_flow_same_expressions(list, symbols, settings)?;
    exprs::value_flow_right_shift(list, symbols, settings)?;
    forward::value_flow_fwd_analysis(list, symbols, settings)?;

    // Main passes, iterated to a fixed point on the total value count.
    let mut values_count = 0usize;
    let mut rounds_left = 4u32;
    while rounds_left > 0 && values_count < list.total_values() {
        values_count = list.total_values();
        if check_time(list, logger) {
            break;
        }
        exprs::value_flow_array_bool(list, symbols, settings)?;
        exprs::value_flow_array_element(list, symbols, settings)?;
        reverse::value_flow_before_condition(list, symbols, logger, settings)?;
        moves::value_flow_after_move(list, symbols, logger, settings)?;
        forward::value_flow_after_assign(list, symbols, logger, settings)?;
        condition::value_flow_after_condition(list, symbols, logger, settings)?;
        infer::value_flow_infer_condition(list, symbols, settings)?;
        reverse::value_flow_switch_variable(list, symbols, logger, settings)?;
        subfunction::value_flow_subfunction(list, symbols, logger, settings)?;
        subfunction::value_flow_function_default_parameter(list, symbols, logger, settings)?;
        uninit::value_flow_uninit(list, symbols, logger, settings)?;
        if list.is_cpp() {
            container::value_flow_smart_pointer(list, symbols, logger, settings)?;
            container::value_flow_container_size(list, symbols, logger, settings)?;
            container::value_flow_container_after_condition(list, symbols, logger, settings)?;
        }
        rounds_left -= 1;
    }

    if !check_time(list, logger) {
        container::value_flow_dynamic_buffer_size(list, symbols, logger, settings)?;
    }
    Ok(())
}
