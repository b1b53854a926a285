//! Reverse value propagation: starting from a token where a fact is known
//! (a comparison against a constant, a `case` label), walk backwards to the
//! start of the enclosing scope applying the inverse of each update. Every
//! inversion appends an error-path entry; anything non-invertible bails
//! out.

use crate::astutils::is_variable_changed;
use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::mathlib;
use crate::programmemory::{condition_is_true, ProgramMemory};
use crate::settings::Settings;
use crate::symbols::{ScopeKind, SymbolDatabase};
use crate::tokens::matcher::{find_match_varid, pat_match, simple_match};
use crate::tokens::{Token, TokenList};
use crate::values::Value;

use super::bailout;
use super::forward::{skip_value_in_conditional_expression, value_flow_forward};
use super::settokenvalue::set_token_value;

/// Is the variable used in the right side of an assignment to itself
/// anywhere up the AST?
fn bailout_self_assignment(list: &TokenList, tok: Token) -> bool {
    let var_id = list[tok].var_id;
    let mut parent = Some(tok);
    while let Some(op) = parent {
        parent = list.ast_parent(op);
        let Some(p) = parent else { break };
        if list.text(p) == "=" && list.ast_op2(p) == Some(op) {
            let mut lhs = list.ast_op1(p);
            while let Some(l) = lhs {
                if list[l].var_id == var_id {
                    return true;
                }
                if list
                    .ast_op2(l)
                    .is_some_and(|l2| list[l2].var_id == var_id)
                {
                    return true;
                }
                lhs = list.ast_op1(l);
            }
        }
    }
    false
}

/// Walk backwards from `tok`, propagating `val` (and the optional paired
/// `val2`) for the variable at `var_token`.
pub(crate) fn value_flow_reverse(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    tok: Token,
    var_token: Token,
    mut val: Value,
    mut val2: Option<Value>,
    ) -> AnalysisResult<()> {
    let num = val.int_value;
    let var_id = list[var_token].var_id;
    let Some(var) = symbols.variable_by_id(var_id).cloned() else {
        return Ok(());
    };
    let start_token = var.name_token;

    let mut cur = list.prev(tok);
    while let Some(tok2) = cur {
        let next_back = list.prev(tok2);
        if tok2 == start_token {
            break;
        }
        if list.text(tok2) == "{" {
            let function_scope = list[tok2].scope.expand().is_some_and(|s| {
                matches!(
                    symbols.scopes[s].kind,
                    ScopeKind::Function | ScopeKind::Lambda
                ) && symbols.scopes[s].body_start == Some(tok2)
            });
            if function_scope {
                break;
            }
        }

        if list[tok2].var_id == var_id {
            if list.has_known_value(tok2) {
                break;
            }
            // Assignment: seed the rhs and restart from it.
            if pat_match(list, Some(tok2), "%name% =")?
                && !simple_match(list, list.prev(tok2), "*")
            {
                let assign_rhs = list
                    .tok_at(tok2, 1)
                    .and_then(|eq| list.ast_op2(eq));
                if let Some(rhs) = assign_rhs {
                    if !list.has_known_value(rhs) {
                        set_token_value(list, symbols, settings, rhs, val.clone())?;
                        let info = format!(
                            "Assignment from '{}'",
                            list.expression_string(rhs)
                        );
                        val.push_error_path(rhs, info.clone());
                        let mut values = vec![val.clone()];
                        if let Some(v2) = &mut val2 {
                            if v2.condition.is_some() {
                                v2.push_error_path(rhs, info);
                                set_token_value(list, symbols, settings, rhs, v2.clone())?;
                                values.push(v2.clone());
                            }
                        }
                        let start_forward = list
                            .tok_at(tok2, 1)
                            .and_then(|eq| {
                                crate::astutils::next_after_ast_rightmost_leaf(list, eq)
                            });
                        let end_forward = symbols.end_of_function(list, tok);
                        value_flow_forward(
                            list,
                            symbols,
                            logger,
                            settings,
                            start_forward,
                            end_forward,
                            rhs,
                            &values,
                            false,
                            false,
                        )?;
                        // Reverse analysis continues through variables only.
                        if list[rhs].var_id > 0 {
                            if let Some(before) = list.prev(tok2) {
                                value_flow_reverse(
                                    list,
                                    symbols,
                                    logger,
                                    settings,
                                    before,
                                    rhs,
                                    val.clone(),
                                    val2.clone(),
                                )?;
                            }
                        }
                    }
                }
                if settings.debug_warnings {
                    bailout(list, logger, tok2, &format!("assignment of {}", var.name));
                }
                break;
            }

            // Increment/decrement: invert.
            let mut inc = 0i64;
            if pat_match(list, list.prev(tok2), "[;{}] %name% ++|--")?
                && list.text_at(tok2, 2) == ";"
            {
                inc = if list.text_at(tok2, 1) == "++" { -1 } else { 1 };
            } else if pat_match(list, list.tok_at(tok2, -2), "[;{}] ++|-- %name%")?
                && list.text_at(tok2, 1) == ";"
            {
                inc = if list.text_at(tok2, -1) == "++" { -1 } else { 1 };
            } else if pat_match(list, list.prev(tok2), "++|-- %name%")?
                || (list
                    .tok_at(tok2, 1)
                    .is_some_and(|a| list[a].is_inc_dec_op()))
            {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("increment/decrement of {}", var.name),
                    );
                }
                break;
            }
            if inc != 0 {
                val.int_value += inc;
                let info = format!(
                    "{} is {}, before this {} the value is {}",
                    var.name,
                    if inc == 1 { "decremented" } else { "incremented" },
                    if inc == 1 { "decrement" } else { "increment" },
                    val.info_string()
                );
                val.push_error_path(tok2, info);
            }

            // Compound assignment: invert when possible.
            if pat_match(list, list.prev(tok2), "[;{}] %var% %assign%")?
                && list.text_at(tok2, 1) != "="
            {
                let assign_tok = list.tok_at(tok2, 1).expect("matched above");
                let rhs = list.ast_op2(assign_tok);
                let rhs_value = rhs.and_then(|r| list.known_int_value(r));
                let Some(rhs_value) = rhs_value else {
                    if settings.debug_warnings {
                        bailout(list, logger, tok2, "compound assignment, rhs value unknown");
                    }
                    break;
                };
                match list.text(assign_tok) {
                    "+=" => val.int_value = val.int_value.wrapping_sub(rhs_value),
                    "-=" => val.int_value = val.int_value.wrapping_add(rhs_value),
                    "*=" if rhs_value != 0 => {
                        val.int_value = val.int_value.wrapping_div(rhs_value)
                    }
                    _ => {
                        if settings.debug_warnings {
                            bailout(
                                list,
                                logger,
                                tok2,
                                &format!("compound assignment {}", list.text(assign_tok)),
                            );
                        }
                        break;
                    }
                }
                let info = format!(
                    "Compound assignment '{}', before assignment value is {}",
                    list.text(assign_tok),
                    val.info_string()
                );
                val.push_error_path(tok2, info);
            }

            if bailout_self_assignment(list, tok2) {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("{} used in rhs of assignment to itself", var.name),
                    );
                }
                break;
            }

            // Inside sizeof: not an evaluated use.
            if pat_match(list, list.prev(tok2), "sizeof|.")? {
                let mut prev = list.prev(tok2);
                while let Some(p) = prev {
                    if !list[p].is_name() && list.text(p) != "." {
                        break;
                    }
                    if list.text(p) == "sizeof" {
                        break;
                    }
                    prev = list.prev(p);
                }
                if prev.is_some_and(|p| list.text(p) == "sizeof") {
                    cur = next_back;
                    continue;
                }
            }

            // Assigned by a subfunction?
            let indirect = val
                .indirect
                .max(val2.as_ref().map_or(0, |v| v.indirect));
            let (changed, inconclusive) = crate::astutils::is_variable_changed_by_function_call(
                list, symbols, settings, tok2, indirect,
            );
            if changed {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("possible assignment of {} by subfunction", var.name),
                    );
                }
                break;
            }
            if val.is_impossible() || val2.as_ref().is_some_and(|v| v.is_impossible()) {
                if inconclusive {
                    break;
                }
            } else {
                val.set_inconclusive(inconclusive);
                if let Some(v2) = &mut val2 {
                    v2.set_inconclusive(inconclusive);
                }
            }

            // Guarded inside && || ?: — skip this use.
            if skip_value_in_conditional_expression(list, tok2).is_some() {
                cur = next_back;
                continue;
            }

            // A do-while condition whose loop body breaks on the value.
            {
                let mut parent = list.ast_parent(tok2);
                while let Some(p) = parent {
                    if simple_match(list, list.prev(p), "while (") {
                        break;
                    }
                    parent = list.ast_parent(p);
                }
                if let Some(p) = parent {
                    if simple_match(list, list.tok_at(p, -2), "} while (")
                        && simple_match(
                            list,
                            list.tok_at(p, -2).and_then(|c| list.link(c)).and_then(|o| list.prev(o)),
                            "do",
                        )
                    {
                        let do_open = list.tok_at(p, -2).and_then(|c| list.link(c));
                        let mut break_bailout = false;
                        let mut iftok = do_open;
                        while let Some(t) = iftok {
                            if Some(t) == list.tok_at(p, -2) {
                                break;
                            }
                            if simple_match(list, Some(t), "if (")
                                && simple_match(
                                    list,
                                    list.link_at(t, 1),
                                    ") { break",
                                )
                            {
                                let mut pm = ProgramMemory::new();
                                pm.set_int_value(var_id, num);
                                let cond = list.tok_at(t, 1).and_then(|o| list.ast_op2(o));
                                if condition_is_true(list, cond, &pm) {
                                    break_bailout = true;
                                    break;
                                }
                            }
                            iftok = list.next(t);
                        }
                        if break_bailout {
                            if settings.debug_warnings {
                                bailout(
                                    list,
                                    logger,
                                    tok2,
                                    "do-while condition, loop body breaks on the value",
                                );
                            }
                            break;
                        }
                    }
                }
            }

            set_token_value(list, symbols, settings, tok2, val.clone())?;
            if let Some(v2) = &val2 {
                if v2.condition.is_some() {
                    set_token_value(list, symbols, settings, tok2, v2.clone())?;
                }
            }
            if tok2 == var.name_token {
                break;
            }
        }

        // Skip over sizeof backwards.
        if list.text(tok2) == ")"
            && pat_match(
                list,
                list.link(tok2).and_then(|o| list.prev(o)),
                "sizeof|typeof|typeid",
            )?
        {
            cur = list.link(tok2).and_then(|o| list.prev(o));
            continue;
        }

        // Goto labels stop the reverse walk.
        if pat_match(list, list.prev(tok2), "[;{}] %name% :")? && list.text_at(tok2, 1) == ":" {
            if settings.debug_warnings {
                bailout(
                    list,
                    logger,
                    tok2,
                    &format!("variable {}, stopping on goto label", var.name),
                );
            }
            break;
        }

        if list.text(tok2) == "}" {
            let open = list.link(tok2);
            let vartok = find_match_varid(list, open, Some(tok2), "%varid%", var_id)?;
            // Uses inside the skipped scope are fine only as plain
            // assignments of other constants; anything else (including an
            // assignment of this very value) stops the walk.
            let mut conflicting = None;
            let mut vt = vartok;
            while let Some(v) = vt {
                let plain_other_assignment = pat_match(list, Some(v), "%name% = %num% ;")?
                    && list
                        .tok_at(v, 2)
                        .and_then(|n| mathlib::parse_int(list.text(n)))
                        != Some(num);
                if plain_other_assignment {
                    vt = find_match_varid(list, list.next(v), Some(tok2), "%varid%", var_id)?;
                } else {
                    conflicting = Some(v);
                    break;
                }
            }
            if conflicting.is_some() {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {}, stopping on }}", var.name),
                    );
                }
                break;
            } else {
                cur = open.and_then(|o| list.prev(o));
                continue;
            }
        } else if list.text(tok2) == "{" {
            // If the variable is assigned in a loop, don't look above it.
            let loop_head = simple_match(list, list.prev(tok2), "do")
                || (list.text_at(tok2, -1) == ")"
                    && pat_match(
                        list,
                        list.link_at(tok2, -1).and_then(|o| list.prev(o)),
                        "for|while",
                    )?);
            if loop_head
                && is_variable_changed(
                    list,
                    symbols,
                    settings,
                    Some(tok2),
                    list.link(tok2),
                    var_id,
                    var.is_global,
                )?
            {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {} is assigned in loop, analysis stops", var.name),
                    );
                }
                break;
            }
            // Global variables stop when leaving the function scope.
            if !var.is_local {
                let prev_text = list.prev(tok2).map_or("", |p| list.text(p));
                if !matches!(prev_text, ")" | "else" | "do") {
                    break;
                }
                if prev_text == ")"
                    && !pat_match(
                        list,
                        list.link_at(tok2, -1).and_then(|o| list.prev(o)),
                        "if|for|while",
                    )?
                {
                    break;
                }
            }
        } else if list.text(tok2) == ";" {
            // Stop when the statement we just left escapes.
            let mut parent = list.prev(tok2);
            while let Some(p) = parent {
                if pat_match(list, Some(p), "return|break|continue|goto")? {
                    break;
                }
                parent = list.ast_parent(p);
            }
            if parent.is_some() {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok2,
                        &format!("variable {}, stopping on escape statement", var.name),
                    );
                }
                break;
            }
        }

        // Unknown function calls can write non-const globals.
        if pat_match(list, Some(tok2), "%name% (")?
            && list
                .link_at(tok2, 1)
                .is_some_and(|close| list.text_at(close, 1) != "{")
            && !(var.is_local || var.is_argument)
            && !var.is_const
        {
            if settings.debug_warnings {
                bailout(list, logger, tok2, &format!("global variable {}", var.name));
            }
            return Ok(());
        }

        cur = next_back;
    }
    Ok(())
}

/// Facts derived from comparisons propagate backwards to the preceding
/// code: `if (x == 10)` makes 10 a possible value of `x` before the
/// condition.
pub(crate) fn value_flow_before_condition(
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
        let mut cur = body_start;
        while let Some(tok) = cur {
            if body_end == Some(tok) {
                break;
            }
            cur = list.next(tok);

            let mut num = 0i64;
            let mut vartok: Option<Token> = None;
            if list[tok].is_comparison_op() && list.is_binary_op(tok) {
                let op1 = list.ast_op1(tok).expect("binary op");
                let op2 = list.ast_op2(tok).expect("binary op");
                if list[op1].is_name() && list.has_known_int_value(op2) {
                    vartok = Some(op1);
                    num = list.known_int_value(op2).expect("known int");
                } else if list.has_known_int_value(op1) && list[op2].is_name() {
                    vartok = Some(op2);
                    num = list.known_int_value(op1).expect("known int");
                } else {
                    continue;
                }
            } else if pat_match(list, list.prev(tok), "if|while ( %name% %oror%|&&|)")?
                || pat_match(list, Some(tok), "%oror%|&& %name% %oror%|&&|)")?
            {
                vartok = list.tok_at(tok, 1);
                num = 0;
            } else if pat_match(list, Some(tok), "[!?]")?
                && list
                    .ast_op1(tok)
                    .is_some_and(|op| list[op].is_name())
            {
                vartok = list.ast_op1(tok);
                num = 0;
            } else {
                continue;
            }

            let Some(vartok) = vartok else { continue };
            let mut var_id = list[vartok].var_id;
            if var_id == 0 {
                continue;
            }
            let Some(var) = symbols.variable_by_id(var_id).cloned() else {
                continue;
            };

            if list.text(tok) == "?" && list[tok].is_expanded_macro() {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok,
                        &format!("variable {}, condition defined in macro", var.name),
                    );
                }
                continue;
            }

            // Bailout: variable changed in the enclosing loop.
            let top = list.ast_top(tok);
            if list.text(top) == "("
                && list
                    .link(top)
                    .is_some_and(|c| list.text_at(c, 1) == "{")
            {
                let close = list.link(top);
                if simple_match(list, list.prev(top), "for (") {
                    let update = list
                        .ast_op2(top)
                        .and_then(|s1| list.ast_op2(s1))
                        .and_then(|s2| list.ast_op2(s2));
                    if let Some(update) = update {
                        let (us, ue) = list.find_expression_start_end(update);
                        if is_variable_changed(
                            list,
                            symbols,
                            settings,
                            Some(us),
                            list.next(ue),
                            var_id,
                            var.is_global,
                        )? {
                            var_id = 0;
                            if settings.debug_warnings {
                                bailout(
                                    list,
                                    logger,
                                    tok,
                                    &format!("variable {} used in loop", var.name),
                                );
                            }
                        }
                    }
                }
                if pat_match(list, list.prev(top), "for|while (")? {
                    let body_open = close.and_then(|c| list.next(c));
                    let body_close = body_open.and_then(|o| list.link(o));
                    if is_variable_changed(
                        list,
                        symbols,
                        settings,
                        body_open,
                        body_close,
                        var_id,
                        var.is_global,
                    )? {
                        var_id = 0;
                        if settings.debug_warnings {
                            bailout(
                                list,
                                logger,
                                tok,
                                &format!("variable {} used in loop", var.name),
                            );
                        }
                    }
                } else if simple_match(list, list.prev(top), "if (")
                    && list.prev(top).is_some_and(|p| list[p].is_expanded_macro())
                {
                    var_id = 0;
                    if settings.debug_warnings {
                        bailout(
                            list,
                            logger,
                            tok,
                            &format!("variable {}, condition defined in macro", var.name),
                        );
                    }
                }
            }
            if var_id == 0 {
                continue;
            }

            // For unsigned variables, `i > 0` / `i < 0` carry no backward
            // point fact.
            if matches!(list.text(tok), "<" | ">") {
                if num != 0 {
                    continue;
                }
                if !var.type_info.is_unsigned() {
                    continue;
                }
            }
            let mut val = Value::with_condition(tok, num);
            val.var_id = var_id;
            let mut val2 = None;
            if num == 1 && matches!(list.text(tok), "<=" | ">=") && var.type_info.is_unsigned() {
                let mut v2 = Value::with_condition(tok, 0);
                v2.var_id = var_id;
                val2 = Some(v2);
            }
            let start_tok = list.ast_parent(tok).or_else(|| list.prev(tok));
            if let Some(start_tok) = start_tok {
                value_flow_reverse(
                    list, symbols, logger, settings, start_tok, vartok, val, val2,
                )?;
            }
        }
    }
    Ok(())
}

/// `switch (x) { case N:` — propagate the case values backwards from the
/// switch.
pub(crate) fn value_flow_switch_variable(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    for scope in symbols.scopes.keys().collect::<Vec<_>>() {
        let (kind, class_def, body_start, body_end) = {
            let s = &symbols.scopes[scope];
            (s.kind, s.class_def, s.body_start, s.body_end)
        };
        if kind != ScopeKind::Switch {
            continue;
        }
        let Some(switch_tok) = class_def else { continue };
        if !pat_match(list, Some(switch_tok), "switch ( %var% ) {")? {
            continue;
        }
        let vartok = list.tok_at(switch_tok, 2).expect("matched above");
        let var_id = list[vartok].var_id;
        let Some(var) = symbols.variable_by_id(var_id).cloned() else {
            continue;
        };
        if !(var.is_local || var.is_argument) && !var.is_const {
            if settings.debug_warnings {
                bailout(
                    list,
                    logger,
                    vartok,
                    &format!("switch variable {} is global", var.name),
                );
            }
            continue;
        }

        let mut cur = body_start.and_then(|s| list.next(s));
        while let Some(tok) = cur {
            if body_end == Some(tok) {
                break;
            }
            if list.text(tok) == "{" {
                cur = list.link(tok).and_then(|c| list.next(c));
                continue;
            }
            if pat_match(list, Some(tok), "case %num% :")? {
                let mut values: Vec<Value> = Vec::new();
                let case_value = list
                    .tok_at(tok, 1)
                    .and_then(|n| mathlib::parse_int(list.text(n)));
                if let Some(v) = case_value {
                    let mut value = Value::new_int(v);
                    value.condition = Some(tok);
                    let info = format!(
                        "case {}: {} is {} here.",
                        v,
                        list.text(vartok),
                        v
                    );
                    value.push_error_path(tok, info);
                    values.push(value);
                }
                // Fall-through chains share the values.
                let mut t = tok;
                while pat_match(list, list.tok_at(t, 3), ";| case %num% :")? {
                    let mut n = list.tok_at(t, 3).expect("matched above");
                    if list.text(n) == ";" {
                        n = list.next(n).expect("matched above");
                    }
                    t = n;
                    let case_value = list
                        .tok_at(t, 1)
                        .and_then(|x| mathlib::parse_int(list.text(x)));
                    if let Some(v) = case_value {
                        let mut value = Value::new_int(v);
                        value.condition = Some(t);
                        let info = format!(
                            "case {}: {} is {} here.",
                            v,
                            list.text(vartok),
                            v
                        );
                        value.push_error_path(t, info);
                        values.push(value);
                    }
                }
                for value in &values {
                    value_flow_reverse(
                        list,
                        symbols,
                        logger,
                        settings,
                        switch_tok,
                        vartok,
                        value.clone(),
                        None,
                    )?;
                }
                cur = list.next(t);
                continue;
            }
            cur = list.next(tok);
        }
    }
    // Forwarding case values into the switch body stays disabled until
    // escape analysis of the surrounding cases is in place.
    Ok(())
}
