//! Forward value propagation along control flow.
//!
//! [`forward_variable`] walks tokens from a start point to an end point,
//! maintaining the set of facts currently known about one variable. It is a
//! state machine over brace depth: conditional blocks partition the value
//! set through program-memory evaluation, loops demote known values,
//! escape scopes subtract the values that would have left the function, and
//! a collection of constructs (aliasing, address-of, stream reads,
//! unknown subfunction writes) give up conservatively. A `false` return
//! means "nothing is known beyond this point".

use crate::astutils::{
    ast_has_token, ast_has_var, find_variable_changed, is_escape_scope, is_likely_stream_read,
    is_return_scope, is_variable_changed, is_variable_changed_by_function_call,
    find_lambda_end_token, next_after_ast_rightmost_leaf,
};
use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::programmemory::{condition_is_false, condition_is_true, get_program_memory, ProgramMemory};
use crate::settings::Settings;
use crate::symbols::{ScopeKind, SymbolDatabase};
use crate::tokens::matcher::{find_match_varid, pat_match, simple_match};
use crate::tokens::{Token, TokenList};
use crate::values::{lower_to_inconclusive, lower_to_possible, remove_impossible, Value};

use super::bailout;
use super::settokenvalue::set_token_value;

/// Indirection levels present in a value set, ascending.
pub(crate) fn get_indirections(values: &[Value]) -> Vec<i32> {
    let mut levels: Vec<i32> = values.iter().map(|v| v.indirect.max(0)).collect();
    levels.sort_unstable();
    levels.dedup();
    levels
}

/// Apply a compound assignment to a tracked value. Returns false when the
/// value has to be dropped (wrong type, division by zero).
pub(crate) fn eval_assignment(lhs: &mut Value, assign: &str, rhs: &Value) -> bool {
    if lhs.is_int_value() {
        match assign {
            "+=" => lhs.int_value = lhs.int_value.wrapping_add(rhs.int_value),
            "-=" => lhs.int_value = lhs.int_value.wrapping_sub(rhs.int_value),
            "*=" => lhs.int_value = lhs.int_value.wrapping_mul(rhs.int_value),
            "/=" => {
                if rhs.int_value == 0 {
                    return false;
                }
                lhs.int_value = lhs.int_value.wrapping_div(rhs.int_value);
            }
            "%=" => {
                if rhs.int_value == 0 {
                    return false;
                }
                lhs.int_value = lhs.int_value.wrapping_rem(rhs.int_value);
            }
            "&=" => lhs.int_value &= rhs.int_value,
            "|=" => lhs.int_value |= rhs.int_value,
            "^=" => lhs.int_value ^= rhs.int_value,
            _ => return false,
        }
        true
    } else if lhs.is_float_value() {
        match assign {
            "+=" => lhs.float_value += rhs.int_value as f64,
            "-=" => lhs.float_value -= rhs.int_value as f64,
            "*=" => lhs.float_value *= rhs.int_value as f64,
            "/=" => lhs.float_value /= rhs.int_value as f64,
            _ => return false,
        }
        true
    } else {
        false
    }
}

/// Should the value be skipped because the variable is guarded inside a
/// `&&`/`||`/`?:` whose left side involves it? Returns the guarding
/// operator.
pub(crate) fn skip_value_in_conditional_expression(
    list: &TokenList,
    valuetok: Token,
) -> Option<Token> {
    let mut prev = valuetok;
    let mut tok = list.ast_parent(valuetok);
    while let Some(t) = tok {
        let prev_is_lhs = list.ast_op1(t) == Some(prev);
        prev = t;
        tok = list.ast_parent(t);
        if prev_is_lhs || !matches!(list.text(t), "||" | "&&" | "?" | ":") {
            continue;
        }
        if list.has_known_int_value(t) {
            return Some(t);
        }
        // Is the variable protected in the left side?
        let mut guarded = false;
        crate::astutils::visit_ast_nodes(list, list.ast_op1(t), &mut |t2| {
            if list.text(t2) == "." {
                return crate::astutils::ChildrenToVisit::None;
            }
            if t2 != valuetok && list[t2].var_id > 0 {
                let same = list[t2].var_id == list[valuetok].var_id;
                let unknown_other = !list.has_known_int_value(t2);
                if same || unknown_other {
                    guarded = true;
                    return crate::astutils::ChildrenToVisit::Done;
                }
            }
            crate::astutils::ChildrenToVisit::Op1AndOp2
        });
        if guarded {
            return Some(t);
        }
    }
    None
}

/// If a known value survives a loop body that modifies the variable, it is
/// only possible afterwards.
fn handle_known_values_in_loop(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    values: &mut Vec<Value>,
    var_id: u32,
    globalvar: bool,
) -> AnalysisResult<bool> {
    let changed = is_variable_changed(list, symbols, settings, start, end, var_id, globalvar)?;
    if changed {
        lower_to_possible(values, None);
    }
    Ok(changed)
}

/// Is `tok` (a different variable) an alias of the tracked variable?
fn is_alias_of(
    list: &TokenList,
    symbols: &SymbolDatabase,
    var_id: u32,
    tok: Token,
    values: &[Value],
) -> bool {
    if list[tok].var_id == var_id || list[tok].var_id == 0 {
        return false;
    }
    // Aliased through the other token's own (pointer alias) values.
    for v in list.values(tok) {
        if v.is_tok_value() {
            if let Some(tv) = v.tok_value {
                if ast_has_var(list, Some(tv), var_id) {
                    return true;
                }
            }
        }
    }
    let var_is_pointer = symbols
        .variable_by_id(var_id)
        .is_some_and(|var| var.is_pointer);
    if !var_is_pointer {
        return false;
    }
    // Search the tracked value set for lifetime/address facts naming the
    // other variable.
    for val in values {
        if !val.is_non_value() || val.is_inconclusive() {
            continue;
        }
        if val.is_lifetime_value()
            && val.lifetime_kind != crate::values::LifetimeKind::Address
        {
            continue;
        }
        if let Some(tv) = val.tok_value {
            if ast_has_var(list, Some(tv), list[tok].var_id) {
                return true;
            }
        }
    }
    false
}

/// Set one value on every use of the variable inside an expression tree,
/// short-circuiting `&&`/`||` legs the assumed value rules out.
fn value_flow_ast(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Option<Token>,
    var_id: u32,
    value: &Value,
) -> AnalysisResult<()> {
    let Some(tok) = tok else { return Ok(()) };
    if list[tok].var_id == var_id {
        set_token_value(list, symbols, settings, tok, value.clone())?;
    }
    value_flow_ast(list, symbols, settings, list.ast_op1(tok), var_id, value)?;
    let text = list.text(tok).to_string();
    if text == "&&" {
        let op1 = list.ast_op1(tok);
        if op1.is_some_and(|o| list.get_value_int(o, 0).is_some()) {
            let mut pm = ProgramMemory::new();
            pm.set_value(var_id, value.clone());
            if condition_is_false(list, op1, &pm) {
                return Ok(());
            }
        }
    } else if text == "||" {
        let op1 = list.ast_op1(tok);
        if let Some(o) = op1 {
            let nonzero = list
                .values(o)
                .iter()
                .any(|v| v.is_int_value() && v.int_value != 0);
            if !nonzero {
                return Ok(());
            }
            let mut pm = ProgramMemory::new();
            pm.set_value(var_id, value.clone());
            if condition_is_true(list, op1, &pm) {
                return Ok(());
            }
        }
    }
    value_flow_ast(list, symbols, settings, list.ast_op2(tok), var_id, value)
}

fn remove_values(values: &mut Vec<Value>, to_remove: &[Value]) {
    values.retain(|v| !to_remove.iter().any(|r| r.int_value == v.int_value));
}

/// Walk `[start, end)` forward, propagating `values` for the variable.
/// Returns false on bailout: values beyond that point are unknown.
#[allow(clippy::too_many_arguments)]
pub(crate) fn forward_variable(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    var_id: u32,
    values: &mut Vec<Value>,
    const_value: bool,
    sub_function: bool,
) -> AnalysisResult<bool> {
    let Some(var) = symbols.variable_by_id(var_id).cloned() else {
        if let Some(start) = start {
            super::bailout_incomplete_var(list, logger, start, "no variable record");
        }
        return Ok(false);
    };
    let mut indentlevel: i32 = 0;
    let mut number_of_if = 0u32;
    let mut varusagelevel: i32 = -1;
    let mut return_statement = false;
    let mut read = false;

    if values.is_empty() {
        return Ok(true);
    }

    let mut cur = start;
    while let Some(tok2) = cur {
        if end == Some(tok2) {
            break;
        }
        // Compute the next token up front; the handlers below may skip.
        let next = list.next(tok2);
        if values.is_empty() {
            return Ok(true);
        }

        let text = list.text(tok2).to_string();
        if indentlevel >= 0 && text == "{" {
            indentlevel += 1;
        } else if indentlevel >= 0 && text == "}" {
            indentlevel -= 1;
            let open = list.link(tok2);
            let open_prev_text = open
                .and_then(|o| list.prev(o))
                .map_or("", |p| list.text(p));
            if indentlevel <= 0
                && is_return_scope(list, settings, tok2)
                && matches!(open_prev_text, ")" | "else")
            {
                // The scope we just left ends in a return: decide per value
                // whether the conditional return fired.
                let open = open.expect("checked above");
                let iselse = simple_match(list, list.tok_at(open, -2), "} else {");
                let condition = if iselse {
                    list.tok_at(open, -2)
                        .and_then(|c| list.link(c))
                        .and_then(|ifopen| list.prev(ifopen))
                        .filter(|t| list.text(*t) == ")")
                        .and_then(|close| list.link(close))
                        .and_then(|par| list.ast_op2(par))
                } else {
                    list.prev(open)
                        .filter(|t| list.text(*t) == ")")
                        .and_then(|close| list.link(close))
                        .and_then(|par| list.ast_op2(par))
                };
                let Some(condition) = condition else {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!(
                                "variable {}, unknown if conditional return is executed",
                                var.name
                            ),
                        );
                    }
                    return Ok(false);
                };
                let mut bailout_flag = false;
                let mut kept: Vec<Value> = Vec::new();
                for v in values.iter() {
                    let pm = get_program_memory(list, symbols, tok2, var_id, v);
                    if !iselse && condition_is_true(list, Some(condition), &pm) {
                        bailout_flag = true;
                        break;
                    }
                    if iselse && condition_is_false(list, Some(condition), &pm) {
                        bailout_flag = true;
                        break;
                    }
                    if iselse && v.is_possible() {
                        let if_open = list
                            .tok_at(open, -2)
                            .and_then(|c| list.link(c));
                        if is_variable_changed(
                            list,
                            symbols,
                            settings,
                            if_open,
                            if_open.and_then(|o| list.link(o)),
                            var_id,
                            var.is_global,
                        )? {
                            continue;
                        }
                    }
                    kept.push(v.clone());
                }
                if bailout_flag {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!(
                                "variable {}, conditional return is assumed to be executed",
                                var.name
                            ),
                        );
                    }
                    return Ok(false);
                }
                *values = kept;
                if values.is_empty() {
                    return Ok(true);
                }
            } else if indentlevel <= 0
                && simple_match(list, open.and_then(|o| list.prev(o)), "else")
                && !open
                    .and_then(|o| list.tok_at(o, -2))
                    .is_some_and(|c| is_return_scope(list, settings, c))
                && is_variable_changed(
                    list,
                    symbols,
                    settings,
                    open,
                    Some(tok2),
                    var_id,
                    var.is_global,
                )?
            {
                lower_to_possible(values, None);
            }
        }

        // Lambdas: skipped, unless they modify the variable.
        if text == "[" {
            if let Some(lambda_end) = find_lambda_end_token(list, tok2) {
                let body_open = list.link(lambda_end);
                if is_variable_changed(
                    list,
                    symbols,
                    settings,
                    body_open,
                    Some(lambda_end),
                    var_id,
                    var.is_global,
                )? {
                    return Ok(false);
                }
                if !values.iter().all(|v| v.is_lifetime_value()) {
                    cur = list.next(lambda_end);
                    continue;
                }
            }
        }

        // Labels and case labels: control may arrive from elsewhere.
        if pat_match(list, list.prev(tok2), "[;{}] %name% :").unwrap_or(false)
            && list.text_at(tok2, 1) == ":"
            || text == "case"
        {
            lower_to_possible(values, None);
            cur = list.tok_at(tok2, 2);
            continue;
        }

        // An unknown call can write any global.
        if (var.is_global || text == "asm")
            && pat_match(list, Some(tok2), "%name% (")?
            && list
                .link_at(tok2, 1)
                .is_some_and(|close| list.text_at(close, 1) != "{")
            && list[tok2].function.is_none()
        {
            return Ok(false);
        }

        // Skip sizeof and friends.
        if pat_match(list, Some(tok2), "sizeof|typeof|typeid (")? {
            cur = list.link_at(tok2, 1).and_then(|c| list.next(c));
            continue;
        }

        if simple_match(list, Some(tok2), "else {") {
            // Skip the else branch when a tracked value makes the if
            // condition true.
            let condition = list
                .prev(tok2)
                .filter(|t| list.text(*t) == "}")
                .and_then(|c| list.link(c))
                .and_then(|ifopen| list.prev(ifopen))
                .filter(|t| list.text(*t) == ")")
                .and_then(|close| list.link(close))
                .and_then(|par| list.ast_op2(par));
            let skip_else = values.iter().any(|v| {
                let pm = get_program_memory(list, symbols, tok2, var_id, v);
                condition_is_true(list, condition, &pm)
            });
            if skip_else {
                cur = list.link_at(tok2, 1).and_then(|c| list.next(c));
                continue;
            }
        }

        if simple_match(list, Some(tok2), "do {") {
            let body_open = list.tok_at(tok2, 1).expect("matched above");
            let body_close = list.link(body_open);
            let mut loop_end = body_close;
            if simple_match(list, body_close, "} while (") {
                loop_end = body_close
                    .and_then(|c| list.tok_at(c, 2))
                    .and_then(|o| list.link(o));
            }
            if is_variable_changed(
                list,
                symbols,
                settings,
                Some(body_open),
                loop_end,
                var_id,
                var.is_global,
            )? {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {}, assignment in do-while", var.name),
                    );
                }
                return Ok(false);
            }
            handle_known_values_in_loop(
                list,
                symbols,
                settings,
                Some(body_open),
                loop_end,
                values,
                var_id,
                var.is_global,
            )?;
        }

        // Conditional block: `name ( ... ) {`.
        if list[tok2].var_id == 0
            && pat_match(list, Some(tok2), "%name% (")?
            && list
                .link_at(tok2, 1)
                .is_some_and(|close| list.text_at(close, 1) == "{")
        {
            let open = list.tok_at(tok2, 1).expect("matched above");
            let close = list.link(open).expect("link checked above");

            // Is the variable modified inside the condition/header?
            for i in get_indirections(values) {
                let tok_changed = find_variable_changed(
                    list,
                    symbols,
                    settings,
                    list.next(open),
                    Some(close),
                    var_id,
                    var.is_global,
                    i,
                )?;
                if let Some(changed) = tok_changed {
                    if list[changed].var_id == var_id {
                        let snapshot: Vec<Value> = values
                            .iter()
                            .filter(|v| v.is_non_value())
                            .cloned()
                            .collect();
                        for v in snapshot {
                            set_token_value(list, symbols, settings, changed, v)?;
                        }
                    }
                    values.retain(|v| v.indirect != i);
                }
            }
            if values.is_empty() {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {}, assignment in condition", var.name),
                    );
                }
                return Ok(false);
            }

            // Known values surviving a loop that modifies the variable are
            // merely possible.
            if matches!(text.as_str(), "for" | "while") {
                let body_open = list.tok_at(close, 1);
                let body_close = body_open.and_then(|o| list.link(o));
                if handle_known_values_in_loop(
                    list,
                    symbols,
                    settings,
                    Some(tok2),
                    body_close,
                    values,
                    var_id,
                    var.is_global,
                )? {
                    number_of_if += 1;
                }
            }

            // Set values inside the first clause of the condition.
            {
                let mut tok3 = list.tok_at(tok2, 2);
                while let Some(t3) = tok3 {
                    if t3 == close {
                        break;
                    }
                    if list[t3].var_id == var_id {
                        let snapshot = values.clone();
                        for v in snapshot {
                            set_token_value(list, symbols, settings, t3, v)?;
                        }
                    } else if pat_match(list, Some(t3), "%oror%|&&|?|;")? {
                        break;
                    }
                    tok3 = list.next(t3);
                }
            }

            let cond_tok = list.ast_op2(open);
            let cond_known = cond_tok.and_then(|c| list.known_int_value(c));
            let cond_always_true = cond_known.is_some_and(|v| v != 0);
            let cond_always_false = cond_known.is_some_and(|v| v == 0);

            // Partition into the values holding in the true and false
            // branches.
            let mut truevalues: Vec<Value> = Vec::new();
            let mut falsevalues: Vec<Value> = Vec::new();
            for v in values.iter() {
                if cond_always_true {
                    truevalues.push(v.clone());
                    continue;
                }
                if cond_always_false {
                    falsevalues.push(v.clone());
                    continue;
                }
                let pm = get_program_memory(list, symbols, tok2, var_id, v);
                if condition_is_true(list, cond_tok, &pm) {
                    truevalues.push(v.clone());
                }
                if condition_is_false(list, cond_tok, &pm) {
                    falsevalues.push(v.clone());
                }
            }

            if !truevalues.is_empty() || !falsevalues.is_empty() {
                let body_open = list.tok_at(close, 1).expect("checked above");
                let body_close = list.link(body_open);

                let mut tv = truevalues.clone();
                let vfresult = forward_variable(
                    list,
                    symbols,
                    logger,
                    settings,
                    list.next(body_open),
                    body_close,
                    var_id,
                    &mut tv,
                    const_value,
                    sub_function,
                )?;

                if !cond_always_false
                    && is_variable_changed(
                        list,
                        symbols,
                        settings,
                        Some(body_open),
                        body_close,
                        var_id,
                        var.is_global,
                    )?
                {
                    remove_values(values, &truevalues);
                    lower_to_possible(values, None);
                }

                let mut after = body_close;
                if is_escape_scope(list, settings, body_open, true) || !vfresult {
                    if cond_always_true {
                        return Ok(false);
                    }
                    remove_values(values, &truevalues);
                }

                if simple_match(list, after, "} else {") {
                    let else_open = after.and_then(|a| list.tok_at(a, 2)).expect("matched");
                    let else_close = list.link(else_open);
                    let mut fv = falsevalues.clone();
                    let vfresult = forward_variable(
                        list,
                        symbols,
                        logger,
                        settings,
                        list.next(else_open),
                        else_close,
                        var_id,
                        &mut fv,
                        const_value,
                        sub_function,
                    )?;
                    if !cond_always_true
                        && is_variable_changed(
                            list,
                            symbols,
                            settings,
                            Some(else_open),
                            else_close,
                            var_id,
                            var.is_global,
                        )?
                    {
                        remove_values(values, &falsevalues);
                        lower_to_possible(values, None);
                    }
                    after = else_close;
                    if is_escape_scope(list, settings, else_open, true) || !vfresult {
                        if cond_always_false {
                            return Ok(false);
                        }
                        remove_values(values, &falsevalues);
                    }
                }
                if values.is_empty() {
                    return Ok(false);
                }
                cur = after.and_then(|a| list.next(a));
                continue;
            }

            let body_open = list.tok_at(close, 1).expect("checked above");
            let body_close = list.link(body_open);
            let varusage = if indentlevel >= 0 && const_value && number_of_if == 0 {
                is_variable_changed(
                    list,
                    symbols,
                    settings,
                    Some(body_open),
                    body_close,
                    var_id,
                    var.is_global,
                )?
            } else {
                find_match_varid(list, Some(body_open), body_close, "%varid%", var_id)?.is_some()
            };
            if !read {
                read = find_match_varid(list, Some(tok2), body_close, "%varid% !!=", var_id)?
                    .is_some();
            }

            if varusage {
                varusagelevel = indentlevel;

                if indentlevel < 0 && text == "switch" {
                    return Ok(false);
                }

                if read
                    && (number_of_if > 0
                        || find_match_varid(list, Some(tok2), Some(body_open), "%varid%", var_id)?
                            .is_some())
                {
                    // Set values in the first clause of the condition, then
                    // give up: assigned in conditional code while read.
                    let mut condtok = Some(tok2);
                    while let Some(t) = condtok {
                        if t == close {
                            break;
                        }
                        if list[t].var_id == var_id {
                            let snapshot = values.clone();
                            for v in snapshot {
                                set_token_value(list, symbols, settings, t, v)?;
                            }
                        }
                        if pat_match(list, Some(t), "%oror%|&&|?|;")? {
                            break;
                        }
                        condtok = list.next(t);
                    }
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("variable {} is assigned in conditional code", var.name),
                        );
                    }
                    return Ok(false);
                }

                if var.is_static {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("variable {}, conditional code contains static var", var.name),
                        );
                    }
                    return Ok(false);
                }

                // Forward known values into the else branch.
                if simple_match(list, body_close, "} else {") {
                    let else_open = body_close
                        .and_then(|c| list.tok_at(c, 2))
                        .expect("matched above");
                    let mut known_values: Vec<Value> =
                        values.iter().filter(|v| v.is_known()).cloned().collect();
                    forward_variable(
                        list,
                        symbols,
                        logger,
                        settings,
                        list.next(else_open),
                        list.link(else_open),
                        var_id,
                        &mut known_values,
                        const_value,
                        sub_function,
                    )?;
                }

                // Remove conditional values.
                values.retain(|v| v.condition.is_none() && !v.conditional && !v.is_impossible());
                for v in values.iter_mut() {
                    v.change_known_to_possible();
                }
            }

            // Conditional return scopes that are executed stop the walk.
            if body_close.is_some_and(|c| is_return_scope(list, settings, c)) {
                let cond_tok = list.ast_op2(open);
                values.retain(|v| {
                    let pm = get_program_memory(list, symbols, tok2, var_id, v);
                    !condition_is_true(list, cond_tok, &pm)
                });
                if values.is_empty() {
                    return Ok(false);
                }
            }

            // Noreturn scopes.
            if (number_of_if > 0
                || find_match_varid(list, Some(tok2), Some(body_open), "%varid%", var_id)?
                    .is_some())
                && (is_escape_scope(list, settings, body_open, false)
                    || (simple_match(list, body_close, "} else {")
                        && body_close
                            .and_then(|c| list.tok_at(c, 2))
                            .is_some_and(|e| is_escape_scope(list, settings, e, false))))
            {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {}, noreturn conditional scope", var.name),
                    );
                }
                return Ok(false);
            }

            if is_variable_changed(
                list,
                symbols,
                settings,
                Some(body_open),
                body_close,
                var_id,
                var.is_global,
            )? {
                if (!read || number_of_if == 0)
                    && simple_match(list, Some(tok2), "if (")
                    && !(simple_match(list, body_close, "} else {")
                        && body_close
                            .and_then(|c| list.tok_at(c, 2))
                            .is_some_and(|e| is_escape_scope(list, settings, e, false)))
                {
                    number_of_if += 1;
                    cur = body_close.and_then(|c| list.next(c));
                    if number_of_if >= 2 {
                        return Ok(false);
                    }
                    continue;
                }
                // A loop that conditionally sets the variable and then
                // breaks leaves it either unchanged or the loop condition
                // was redundant.
                let mut bail = true;
                let loop_condition = (simple_match(list, Some(tok2), "while (")
                    && cond_tok.is_some_and(|c| list[c].is_op()))
                    || (simple_match(list, Some(tok2), "for (")
                        && cond_tok.is_some_and(|c| list.text(c) == ";"));
                if loop_condition {
                    let tok3 =
                        find_match_varid(list, Some(body_open), body_close, "%varid%", var_id)?;
                    if let Some(t3) = tok3 {
                        if list.text_at(t3, 1) == "="
                            && simple_match(list, body_close.and_then(|c| list.tok_at(c, -3)), ";")
                            && simple_match(
                                list,
                                body_close.and_then(|c| list.tok_at(c, -2)),
                                "break ;",
                            )
                            && find_match_varid(list, list.next(t3), body_close, "%varid%", var_id)?
                                .is_none()
                        {
                            bail = false;
                            cur = body_close.and_then(|c| list.next(c));
                        }
                    }
                }
                if bail {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("variable {} is assigned in conditional code", var.name),
                        );
                    }
                    return Ok(false);
                }
                continue;
            }

            if simple_match(list, Some(tok2), "if (")
                && find_match_varid(list, Some(tok2), list.link_at(tok2, 1), "%varid% !!=", var_id)?
                    .is_some()
            {
                return Ok(false);
            }
        } else if pat_match(list, Some(tok2), "assert|ASSERT (")?
            && list
                .link_at(tok2, 1)
                .is_some_and(|close| list.text_at(close, 1) == ";")
        {
            // assert(cond) is `if (!cond) return;`.
            let arg = list.tok_at(tok2, 1).and_then(|o| list.ast_op2(o));
            if let Some(arg) = arg {
                if list.text(arg) != "," {
                    values.retain(|v| {
                        let pm = get_program_memory(list, symbols, tok2, var_id, v);
                        !condition_is_false(list, Some(arg), &pm)
                    });
                }
            }
        } else if text == "}"
            && indentlevel <= 0
            && list[tok2]
                .scope
                .expand()
                .is_some_and(|s| symbols.scopes[s].kind == ScopeKind::Lambda)
        {
            return Ok(true);
        } else if text == "}" && indentlevel == varusagelevel {
            number_of_if += 1;
            // Values that survived a conditional region are conditional.
            remove_impossible(values, None);
            for v in values.iter_mut() {
                v.conditional = true;
                v.change_known_to_possible();
            }
            if simple_match(list, Some(tok2), "} else {") {
                cur = list.link_at(tok2, 2).and_then(|c| list.next(c));
                continue;
            }
        } else if matches!(text.as_str(), "break" | "continue" | "goto") {
            let mut scope = list[tok2].scope.expand();
            if indentlevel > 0 {
                let mut tok3 = list.tok_at(tok2, 2);
                let mut indentlevel2 = indentlevel;
                while indentlevel2 > 0 {
                    let Some(t3) = tok3 else { break };
                    if list.text(t3) != "}" {
                        break;
                    }
                    if list
                        .link(t3)
                        .and_then(|o| list.prev(o))
                        .is_some_and(|p| list.text(p) == ")")
                    {
                        break;
                    }
                    indentlevel2 -= 1;
                    tok3 = list.next(t3);
                    if tok3.is_some_and(|t| list.text(t) == ";") {
                        tok3 = tok3.and_then(|t| list.next(t));
                    }
                }
                if indentlevel2 > 0 {
                    cur = next;
                    continue;
                }
                scope = tok3.and_then(|t| list[t].scope.expand());
                indentlevel = 0;
            }
            if text == "break" {
                if let Some(s) = scope {
                    if symbols.scopes[s].kind == ScopeKind::Switch {
                        let switch_end = symbols.scopes[s].body_end;
                        if switch_end == end {
                            break;
                        }
                        cur = switch_end.and_then(|e| list.next(e));
                        indentlevel -= 1;
                        lower_to_possible(values, None);
                        continue;
                    }
                }
            }
            if settings.debug_warnings {
                bailout(
                    list,
                    logger,
                    tok2,
                    &format!("variable {}, jump out of scope", var.name),
                );
            }
            return Ok(false);
        } else if indentlevel <= 0
            && matches!(text.as_str(), "return" | "throw" | "setjmp" | "longjmp")
        {
            return_statement = true;
        } else if return_statement && text == ";" {
            return Ok(false);
        } else if text == "?" {
            // Ternary.
            if sub_function {
                if let Some(cond) = list.ast_op1(tok2) {
                    if crate::astutils::ast_is_pointer(list, cond)
                        || crate::astutils::ast_is_integral(list, cond, false)
                    {
                        cur = next_after_ast_rightmost_leaf(list, tok2);
                        if settings.debug_warnings {
                            bailout(
                                list,
                                logger,
                                tok2,
                                &format!("variable {}, skip ternary in subfunction", var.name),
                            );
                        }
                        continue;
                    }
                }
            }
            let condition = list.ast_op1(tok2);
            let colon = list.ast_op2(tok2);
            let (Some(condition), Some(colon)) = (condition, colon) else {
                cur = next;
                continue;
            };

            if let Some(cond_value) = list.known_int_value(condition) {
                let expr2 = if cond_value != 0 {
                    list.ast_op1(colon)
                } else {
                    list.ast_op2(colon)
                };
                let snapshot = values.clone();
                for v in &snapshot {
                    value_flow_ast(list, symbols, settings, expr2, var_id, v)?;
                }
                for indirect in [0, 1] {
                    if let Some(e) = expr2 {
                        let (changed, _) = is_variable_changed_by_function_call(
                            list, symbols, settings, e, indirect,
                        );
                        if changed {
                            lower_to_possible(values, Some(indirect));
                        }
                    }
                }
            } else {
                if number_of_if >= 1 {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("variable {}, used in conditional code (?:)", var.name),
                        );
                    }
                    return Ok(false);
                }
                let snapshot = values.clone();
                for v in &snapshot {
                    let pm = get_program_memory(list, symbols, tok2, var_id, v);
                    if condition_is_true(list, Some(condition), &pm) {
                        value_flow_ast(list, symbols, settings, list.ast_op1(colon), var_id, v)?;
                    } else if condition_is_false(list, Some(condition), &pm) {
                        value_flow_ast(list, symbols, settings, list.ast_op2(colon), var_id, v)?;
                    } else {
                        value_flow_ast(list, symbols, settings, Some(colon), var_id, v)?;
                    }
                }

                let expr0 = list.ast_op1(colon).unwrap_or(condition);
                let expr1 = list.ast_op2(colon);
                let changed0 = {
                    let (s, e) = list.find_expression_start_end(expr0);
                    is_variable_changed(
                        list,
                        symbols,
                        settings,
                        Some(s),
                        list.next(e),
                        var_id,
                        var.is_global,
                    )?
                };
                let changed1 = match expr1 {
                    Some(e1) => {
                        let (s, e) = list.find_expression_start_end(e1);
                        is_variable_changed(
                            list,
                            symbols,
                            settings,
                            Some(s),
                            list.next(e),
                            var_id,
                            var.is_global,
                        )?
                    }
                    None => false,
                };
                if changed0 && changed1 {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("variable {}, changed in both ternary arms", var.name),
                        );
                    }
                    return Ok(false);
                }
                if changed0 || changed1 {
                    lower_to_possible(values, None);
                }
            }
            // Skip the conditional expression.
            let mut t = tok2;
            loop {
                if let Some(op2) = list.ast_op2(t) {
                    t = op2;
                } else if list.is_unary_pre_op(t) {
                    t = list.ast_op1(t).expect("unary pre-op has operand");
                } else {
                    break;
                }
            }
            cur = list.next(t);
            continue;
        } else if list[tok2].var_id == var_id {
            // Compound assignment with known rhs.
            let after = list.tok_at(tok2, 1);
            let is_compound = pat_match(list, Some(tok2), "%name% %assign%")?
                && list.text_at(tok2, 1) != "="
                && !simple_match(list, list.prev(tok2), "*");
            if is_compound
                && after
                    .and_then(|a| list.ast_op2(a))
                    .is_some_and(|rhs| list.has_known_int_value(rhs))
            {
                let rhs = after
                    .and_then(|a| list.ast_op2(a))
                    .expect("checked above");
                let rhs_value = Value::new_int(list.known_int_value(rhs).expect("known int"));
                let assign = list.text_at(tok2, 1).to_string();
                let mut kept = Vec::new();
                for mut v in values.drain(..) {
                    if eval_assignment(&mut v, &assign, &rhs_value) {
                        let info = format!(
                            "Compound assignment '{}', assigned value is {}",
                            assign,
                            v.info_string()
                        );
                        v.push_error_path(tok2, info);
                        kept.push(v);
                    }
                }
                *values = kept;
                if values.is_empty() {
                    if settings.debug_warnings {
                        bailout(list, logger, tok2, "compound assignment");
                    }
                    return Ok(false);
                }
            } else if pat_match(list, Some(tok2), "%name% %assign%")?
                && !simple_match(list, list.prev(tok2), "*")
            {
                // Reassignment: seed the rhs with current values, then give
                // up on this variable.
                let rhs = after.and_then(|a| list.ast_op2(a));
                let mut stack: smallvec::SmallVec<[Option<Token>; 8]> = smallvec::smallvec![rhs];
                while let Some(r) = stack.pop() {
                    let Some(r) = r else { continue };
                    if list.text(r) == "("
                        && list
                            .ast_op1(r)
                            .is_some_and(|c| {
                                matches!(list.text(c), "sizeof" | "typeof" | "typeid")
                            })
                    {
                        continue;
                    }
                    if pat_match(list, Some(r), "++|--|?|:|;|,")? {
                        continue;
                    }
                    if list[r].var_id == var_id {
                        let snapshot = values.clone();
                        for v in snapshot {
                            set_token_value(list, symbols, settings, r, v)?;
                        }
                    }
                    stack.push(list.ast_op1(r));
                    stack.push(list.ast_op2(r));
                }
                if settings.debug_warnings {
                    bailout(list, logger, tok2, &format!("assignment of {}", var.name));
                }
                return Ok(false);
            } else if list
                .ast_parent(tok2)
                .is_some_and(|p| is_likely_stream_read(list, p))
            {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("possible assignment of {} by stream read", var.name),
                    );
                }
                return Ok(false);
            } else if let Some(guard) = skip_value_in_conditional_expression(list, tok2) {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!(
                            "no simplification of {} within {} expression",
                            var.name,
                            list.text(guard)
                        ),
                    );
                }
                let ast_top = list.ast_top(guard);
                if simple_match(list, list.ast_op1(ast_top), "for (") {
                    cur = list.link(ast_top).and_then(|c| list.next(c)).or(next);
                    continue;
                }
                // Taking the address inside destroys precision entirely.
                if list
                    .ast_parent(tok2)
                    .is_some_and(|p| list.is_unary_op(p, "&"))
                {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("taking address of {}", var.name),
                        );
                    }
                    return Ok(false);
                }
                cur = next;
                continue;
            } else {
                // Is the use protected by && || ?: on the right side?
                let mut tok3 = tok2;
                let mut parent = list.ast_parent(tok3);
                while let Some(p) = parent {
                    if matches!(list.text(p), "||" | "&&" | ":") {
                        break;
                    }
                    tok3 = p;
                    parent = list.ast_parent(p);
                }
                let conditional = parent.is_some_and(|p| {
                    list.text(p) == ":" || list.ast_op2(p) == Some(tok3)
                });
                let snapshot = values.clone();
                for v in snapshot {
                    if !conditional || !v.conditional {
                        set_token_value(list, symbols, settings, tok2, v)?;
                    }
                }

                // Increment / decrement.
                let pre = pat_match(list, list.prev(tok2), "++|--")?
                    && list.prev(tok2).is_some_and(|p| list[p].is_inc_dec_op());
                let post = after.is_some_and(|a| list[a].is_inc_dec_op());
                if pre || post {
                    values.retain(|v| v.is_int_value());
                    if values.is_empty() {
                        if settings.debug_warnings {
                            bailout(
                                list,
                                logger,
                                tok2,
                                &format!("increment/decrement of {}", var.name),
                            );
                        }
                        return Ok(false);
                    }
                    let op = if pre {
                        list.prev(tok2).expect("checked above")
                    } else {
                        after.expect("checked above")
                    };
                    let inc = list.text(op) == "++";
                    for i in 0..values.len() {
                        if !pre {
                            let v = values[i].clone();
                            set_token_value(list, symbols, settings, op, v)?;
                        }
                        values[i].int_value += if inc { 1 } else { -1 };
                        if pre {
                            let v = values[i].clone();
                            set_token_value(list, symbols, settings, op, v)?;
                        }
                        let info = format!(
                            "{} is {}, new value is {}",
                            var.name,
                            if inc { "incremented" } else { "decremented" },
                            values[i].info_string()
                        );
                        values[i].push_error_path(tok2, info);
                    }
                }

                // Address-of.
                if list
                    .ast_parent(tok2)
                    .is_some_and(|p| list.is_unary_op(p, "&"))
                {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("taking address of {}", var.name),
                        );
                    }
                    return Ok(false);
                }
                // Reference binding.
                if let Some(parent) = list.ast_parent(tok2) {
                    if pat_match(list, list.tok_at(parent, -2), "& %name% =")? {
                        if settings.debug_warnings {
                            bailout(list, logger, tok2, &format!("reference to {}", var.name));
                        }
                        return Ok(false);
                    }
                }

                // Assigned by a subfunction?
                for i in get_indirections(values) {
                    let (changed, inconclusive) = is_variable_changed_by_function_call(
                        list, symbols, settings, tok2, i,
                    );
                    if changed && !inconclusive {
                        values.retain(|v| v.indirect > i);
                    }
                    if inconclusive {
                        lower_to_inconclusive(values, settings.certainty_inconclusive, Some(i));
                    }
                }
                if values.is_empty() {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("possible assignment of {} by subfunction", var.name),
                        );
                    }
                    return Ok(false);
                }
                // Member function calls on the object are inconclusive.
                if list.text_at(tok2, 1) == "."
                    && after.is_some_and(|a| list[a].original_name() != "->")
                    && after
                        .and_then(|a| list.tok_at(a, 2))
                        .is_some_and(|t| list.text(t) == "(")
                {
                    lower_to_inconclusive(values, settings.certainty_inconclusive, None);
                    if !settings.certainty_inconclusive {
                        if settings.debug_warnings {
                            bailout(
                                list,
                                logger,
                                tok2,
                                &format!(
                                    "possible assignment of {} by member function",
                                    var.name
                                ),
                            );
                        }
                        return Ok(false);
                    }
                }
                // Uninit values die on modification.
                for i in get_indirections(values) {
                    if crate::astutils::is_variable_changed_at(list, symbols, settings, tok2, i) {
                        values.retain(|v| !(v.is_uninit_value() && v.indirect <= i));
                    }
                }
            }
        } else if is_alias_of(list, symbols, var_id, tok2, values)
            && crate::astutils::is_variable_changed_at(list, symbols, settings, tok2, 0)
        {
            if settings.debug_warnings {
                bailout(list, logger, tok2, "alias variable was modified");
            }
            // Bail at the end of the statement when inside an assignment.
            let top = list.ast_top(tok2);
            if list[top].is_assignment_op() && ast_has_token(list, list.ast_op1(top), tok2) {
                return_statement = true;
            } else {
                return Ok(false);
            }
        }

        // Lambda assigned to a variable: its body must not write ours.
        if simple_match(list, Some(tok2), "= [") {
            let open = list.tok_at(tok2, 1).expect("matched above");
            if let Some(lambda_end) = find_lambda_end_token(list, open) {
                let body_open = list.link(lambda_end);
                if is_variable_changed(
                    list,
                    symbols,
                    settings,
                    body_open,
                    Some(lambda_end),
                    var_id,
                    var.is_global,
                )? {
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok2,
                            &format!("{} is changed in lambda function", var.name),
                        );
                    }
                    return Ok(false);
                }
            }
        }

        if cur == Some(tok2) {
            cur = next;
        }
    }
    Ok(true)
}

/// Propagate assigned values from an assignment site to the end of the
/// variable's scope.
#[allow(clippy::too_many_arguments)]
pub(crate) fn forward_assign(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    tok: Token,
    var_id: u32,
    mut values: Vec<Value>,
    const_value: bool,
    init: bool,
) -> AnalysisResult<()> {
    let Some(var) = symbols.variable_by_id(var_id).cloned() else {
        return Ok(());
    };
    let end_of_var_scope = symbols.end_of_function(list, var.name_token);

    values.retain(|v| !v.is_lifetime_value());
    if !var.is_pointer && !var.is_smart_pointer {
        values.retain(|v| !v.is_tok_value());
    }
    if let Some(parent) = list.ast_parent(tok) {
        let expr = list.expression_string(parent);
        for v in values.iter_mut() {
            let info = format!("Assignment '{}', assigned value is {}", expr, v.info_string());
            v.push_error_path(tok, info);
        }
    }

    if list.is_cpp() && var.type_info.base == crate::types::BaseType::Bool {
        for v in values.iter_mut() {
            if v.is_int_value() {
                v.int_value = i64::from(v.int_value != 0);
            }
            if v.is_tok_value() {
                v.int_value = i64::from(v.tok_value.is_some());
            }
        }
    }

    if var.is_static && init {
        lower_to_possible(&mut values, None);
    }

    // Skip the rhs.
    let next_expression = match list.ast_parent(tok) {
        Some(parent) => next_after_ast_rightmost_leaf(list, parent),
        None => list.next(tok),
    };

    let tok_values: Vec<Value> = values.iter().filter(|v| v.is_tok_value()).cloned().collect();
    if !tok_values.is_empty() {
        let mut tv = tok_values;
        forward_variable(
            list,
            symbols,
            logger,
            settings,
            next_expression,
            end_of_var_scope,
            var_id,
            &mut tv,
            const_value,
            false,
        )?;
        values.retain(|v| !v.is_tok_value());
    }
    for v in values.iter_mut() {
        v.tok_value = Some(tok);
    }
    forward_variable(
        list,
        symbols,
        logger,
        settings,
        next_expression,
        end_of_var_scope,
        var_id,
        &mut values,
        const_value,
        false,
    )?;
    Ok(())
}

/// Assigned values truncate to the declared type of the left side.
pub(crate) fn truncate_values(
    list: &TokenList,
    settings: &Settings,
    mut values: Vec<Value>,
    lhs: Token,
) -> Vec<Value> {
    let Some(ti) = list[lhs].type_info.clone() else {
        return values;
    };
    if !ti.is_integral() {
        return values;
    }
    let sz = crate::types::get_size_of(&ti, settings);
    for value in values.iter_mut() {
        if value.is_float_value() {
            value.int_value = value.float_value as i64;
            value.value_type = crate::values::ValueType::Int;
        }
        if value.is_int_value() && sz > 0 && sz < 8 {
            value.int_value =
                super::settokenvalue::truncate_int_value(value.int_value, sz, ti.sign);
        }
    }
    values
}

fn is_literal_number(list: &TokenList, tok: Token) -> bool {
    list[tok].is_number()
        || list.text(tok) == "NULL"
        || (list.is_cpp() && matches!(list.text(tok), "false" | "true" | "nullptr"))
}

/// `lhs = rhs;` assignments: forward the rhs values.
pub(crate) fn value_flow_after_assign(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    for scope_idx in 0..symbols.function_scopes.len() {
        let scope = symbols.function_scopes[scope_idx];
        let (body_start, body_end) = {
            let s = &symbols.scopes[scope];
            (s.body_start, s.body_end)
        };
        let mut aliased: rustc_hash::FxHashSet<u32> = rustc_hash::FxHashSet::default();
        let mut cur = body_start;
        while let Some(tok) = cur {
            if body_end == Some(tok) {
                break;
            }
            cur = list.next(tok);

            if list.is_unary_op(tok, "&") {
                if let Some(op) = list.ast_op1(tok) {
                    aliased.insert(list[op].var_id);
                }
                continue;
            }

            if list.text(tok) != "=" || list.ast_parent(tok).is_some() {
                continue;
            }
            let Some(lhs) = list.ast_op1(tok) else { continue };
            let var_id = list[lhs].var_id;
            if var_id == 0 || list.has_known_value(lhs) {
                continue;
            }
            if aliased.contains(&var_id) {
                continue;
            }
            let Some(var) = symbols.variable_by_id(var_id) else {
                continue;
            };
            if !var.is_local && !var.is_global && !var.is_argument {
                continue;
            }
            let Some(rhs) = list.ast_op2(tok) else { continue };
            if list.values(rhs).is_empty() {
                continue;
            }
            let values = truncate_values(list, settings, list.values(rhs).to_vec(), lhs);
            let const_value = is_literal_number(list, rhs);
            let init = var.name_token == lhs;
            forward_assign(
                list, symbols, logger, settings, rhs, var_id, values, const_value, init,
            )?;
        }
    }
    Ok(())
}

/// Non-variable expression forwarding. The driver invokes it, but the
/// analysis of arbitrary expressions is not implemented; keeping the stub
/// preserves the observable behaviour of the pass pipeline.
#[allow(clippy::too_many_arguments)]
pub(crate) fn forward_expression(
    _list: &mut TokenList,
    _symbols: &SymbolDatabase,
    _settings: &Settings,
    _start: Option<Token>,
    _end: Option<Token>,
    _expr: Token,
    _values: &[Value],
) -> AnalysisResult<()> {
    Ok(())
}

/// Forward analysis of plain aggregate assignments through the expression
/// stub.
pub(crate) fn value_flow_fwd_analysis(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if simple_match(list, Some(tok), "for (") {
            cur = list.link_at(tok, 1).and_then(|c| list.next(c));
            continue;
        }
        if list.text(tok) != "=" || !list.is_binary_op(tok) || list.ast_parent(tok).is_some() {
            continue;
        }
        if !symbols.is_executable_scope(list, tok) {
            continue;
        }
        let rhs = list.ast_op2(tok).expect("binary op");
        let Some(known) = list.known_int_value(rhs) else {
            continue;
        };
        let mut v = Value::known_int(known);
        let lhs = list.ast_op1(tok).expect("binary op");
        let expr = list.expression_string(lhs);
        v.push_error_path(tok, format!("{expr} is assigned value {known}"));
        let (_, rhs_end) = list.find_expression_start_end(tok);
        let start_token = list.next(rhs_end);
        let end_token = symbols.end_of_function(list, tok);
        forward_expression(list, symbols, settings, start_token, end_token, lhs, &[v])?;
    }
    Ok(())
}

/// Dispatch forwarding of values for an expression: variables get the full
/// walker, other expressions the (stubbed) expression analysis.
#[allow(clippy::too_many_arguments)]
pub(crate) fn value_flow_forward(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    expr_tok: Token,
    values: &[Value],
    const_value: bool,
    sub_function: bool,
) -> AnalysisResult<bool> {
    let var_id = list[expr_tok].var_id;
    if var_id > 0 {
        let mut vals = values.to_vec();
        return forward_variable(
            list,
            symbols,
            logger,
            settings,
            start,
            end,
            var_id,
            &mut vals,
            const_value,
            sub_function,
        );
    }
    forward_expression(list, symbols, settings, start, end, expr_tok, values)?;
    Ok(true)
}
