//! Condition-driven value derivation.
//!
//! A reusable driver enumerates control-flow conditions, parses each into
//! `(vartok, true_values, false_values)` through a hook, and applies the
//! respective sets to the then/else regions with a forward hook. The
//! driver also learns impossibilities in the branch where the condition is
//! decided, and propagates the surviving arm past the conditional when the
//! other arm escapes.

use smallvec::{smallvec, SmallVec};

use crate::astutils::{is_return_scope, is_same_expression, is_variable_changed, visit_ast_nodes, ChildrenToVisit};
use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::{find_match, pat_match, simple_match};
use crate::tokens::{Token, TokenList};
use crate::values::{
    as_impossible, change_known_to_possible, change_possible_to_known, Bound, Value,
};

use super::bailout;

/// A parsed condition.
pub(crate) struct Condition {
    /// The compared expression.
    pub vartok: Token,
    /// Values holding when the condition is true.
    pub true_values: Vec<Value>,
    /// Values holding when the condition is false.
    pub false_values: Vec<Value>,
    /// The condition pins the expression to a point (`==`-like): the false
    /// values are not valid possibles for the else branch.
    pub eq_like: bool,
}

/// Parse and forward hooks of one condition-driven pass.
pub(crate) trait ConditionHook {
    /// Parse `tok` into a condition, or `None`.
    fn parse(
        &self,
        list: &TokenList,
        symbols: &SymbolDatabase,
        settings: &Settings,
        tok: Token,
    ) -> AnalysisResult<Option<Condition>>;

    /// Forward `values` for `vartok` through `[start, stop)`. Returns true
    /// when the region modified the expression.
    #[allow(clippy::too_many_arguments)]
    fn forward(
        &self,
        list: &mut TokenList,
        symbols: &SymbolDatabase,
        logger: &mut dyn ErrorLogger,
        settings: &Settings,
        start: Token,
        stop: Option<Token>,
        vartok: Token,
        values: &[Value],
        const_value: bool,
    ) -> AnalysisResult<bool>;
}

/// Is the condition at `tok` decided when the branch is entered: walking
/// up through `&&` (for then) or `||` (for else) reaches the condition
/// parenthesis directly.
pub(crate) fn is_condition_known(list: &TokenList, tok: Token, then: bool) -> bool {
    let op = if then { "&&" } else { "||" };
    let mut parent = list.ast_parent(tok);
    while let Some(p) = parent {
        if list.text(p) != op {
            break;
        }
        parent = list.ast_parent(p);
    }
    parent.is_some_and(|p| list.text(p) == "(")
}

/// Promote point values to known in the branch where the condition is
/// decided.
pub(crate) fn value_flow_set_condition_to_known(
    list: &TokenList,
    tok: Token,
    values: &mut [Value],
    then: bool,
) -> AnalysisResult<()> {
    if values.is_empty() {
        return Ok(());
    }
    if then && !pat_match(list, Some(tok), "==|!|(")? {
        return Ok(());
    }
    if !then && !pat_match(list, Some(tok), "!=|%var%|(")? {
        return Ok(());
    }
    if is_condition_known(list, tok, then) {
        change_possible_to_known(values, None);
    }
    Ok(())
}

/// Does the scope ending at `end` contain a `break` or `goto`?
pub(crate) fn is_break_scope(list: &TokenList, end: Token) -> AnalysisResult<bool> {
    if list.text(end) != "}" {
        return Ok(false);
    }
    let Some(open) = list.link(end) else {
        return Ok(false);
    };
    Ok(find_match(list, Some(open), Some(end), "break|goto")?.is_some())
}

/// Append the impossibilities of `input` to `values`.
pub(crate) fn insert_impossible(values: &mut Vec<Value>, input: &[Value]) {
    values.extend(input.iter().cloned().map(as_impossible));
}

/// Variable ids occurring in an expression.
fn expr_var_ids(list: &TokenList, expr: Token) -> SmallVec<[u32; 4]> {
    let mut ids: SmallVec<[u32; 4]> = SmallVec::new();
    visit_ast_nodes(list, Some(expr), &mut |t| {
        if list[t].var_id > 0 && !ids.contains(&list[t].var_id) {
            ids.push(list[t].var_id);
        }
        ChildrenToVisit::Op1AndOp2
    });
    ids
}

fn any_expr_var_changed(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    vars: &[u32],
) -> AnalysisResult<bool> {
    for &id in vars {
        if is_variable_changed(list, symbols, settings, start, end, id, false)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Parse an integer comparison into the value holding when it is true and
/// the value holding when it is false. Returns the compared expression.
pub(crate) fn parse_compare_int(
    list: &TokenList,
    tok: Token,
) -> AnalysisResult<Option<(Token, Value, Value)>> {
    if !list[tok].is_comparison_op() || !list.is_binary_op(tok) {
        return Ok(None);
    }
    let op1 = list.ast_op1(tok).expect("binary op");
    let op2 = list.ast_op2(tok).expect("binary op");
    let (vartok, num, swapped) = if let Some(num) = list.known_int_value(op2) {
        (op1, num, false)
    } else if let Some(num) = list.known_int_value(op1) {
        (op2, num, true)
    } else {
        return Ok(None);
    };
    if list.has_known_int_value(vartok) {
        return Ok(None);
    }
    // Normalize so the expression is on the left.
    let op = match (list.text(tok), swapped) {
        ("==", _) => "==",
        ("!=", _) => "!=",
        ("<", false) | (">", true) => "<",
        (">", false) | ("<", true) => ">",
        ("<=", false) | (">=", true) => "<=",
        (">=", false) | ("<=", true) => ">=",
        _ => return Ok(None),
    };
    let mut true_value = Value::with_condition(tok, num);
    let mut false_value = Value::with_condition(tok, num);
    match op {
        "==" | "!=" => {}
        "<" => {
            true_value.int_value = num.wrapping_sub(1);
            true_value.bound = Bound::Upper;
            false_value.bound = Bound::Lower;
        }
        "<=" => {
            true_value.bound = Bound::Upper;
            false_value.int_value = num.wrapping_add(1);
            false_value.bound = Bound::Lower;
        }
        ">" => {
            true_value.int_value = num.wrapping_add(1);
            true_value.bound = Bound::Lower;
            false_value.bound = Bound::Upper;
        }
        ">=" => {
            true_value.bound = Bound::Lower;
            false_value.int_value = num.wrapping_sub(1);
            false_value.bound = Bound::Upper;
        }
        _ => unreachable!("normalized above"),
    }
    if op == "!=" {
        std::mem::swap(&mut true_value, &mut false_value);
    }
    Ok(Some((vartok, true_value, false_value)))
}

/// The shared after-condition driver.
pub(crate) fn after_condition(
    hook: &dyn ConditionHook,
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

            if pat_match(list, Some(tok), "if|while|for (")? {
                continue;
            }
            if pat_match(list, Some(tok), "= & %var% ;")? {
                if let Some(v) = list.tok_at(tok, 2) {
                    aliased.insert(list[v].var_id);
                }
            }
            let top = list.ast_top(tok);

            let top_is_condition = pat_match(list, list.prev(top), "if|while|for (")?;
            let in_logical_op = list
                .ast_parent(tok)
                .is_some_and(|p| matches!(list.text(p), "&&" | "||"));
            if !top_is_condition && !in_logical_op {
                continue;
            }

            let Some(cond) = hook.parse(list, symbols, settings, tok)? else {
                continue;
            };
            if cond.true_values.is_empty() || cond.false_values.is_empty() {
                continue;
            }
            let vars = expr_var_ids(list, cond.vartok);
            if vars.iter().any(|id| aliased.contains(id)) {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        cond.vartok,
                        "variable is aliased so we just skip all valueflow after condition",
                    );
                }
                continue;
            }

            // Seed other uses of the expression inside the same && / ||
            // chain.
            if let Some(parent) = list.ast_parent(tok) {
                if matches!(list.text(parent), "&&" | "||") {
                    let op = list.text(parent).to_string();
                    let lhs_of_parent = list.ast_op1(parent) == Some(tok);
                    let applicable = (op == "&&" && pat_match(list, Some(tok), "==|>=|<=|!")?)
                        || (op == "||" && pat_match(list, Some(tok), "%name%|!=")?);
                    if lhs_of_parent && applicable {
                        let mut p = Some(parent);
                        while let Some(par) = p {
                            if list.text(par) != op {
                                break;
                            }
                            let mut stack: SmallVec<[Option<Token>; 8]> =
                                smallvec![list.ast_op2(par)];
                            let mut assigned = false;
                            while let Some(rhstok) = stack.pop() {
                                let Some(r) = rhstok else { continue };
                                stack.push(list.ast_op1(r));
                                stack.push(list.ast_op2(r));
                                if is_same_expression(list, cond.vartok, r) {
                                    let v = cond.true_values[0].clone();
                                    super::settokenvalue::set_token_value(
                                        list, symbols, settings, r, v,
                                    )?;
                                } else if pat_match(list, Some(r), "++|--|=")?
                                    && list
                                        .ast_op1(r)
                                        .is_some_and(|o| is_same_expression(list, cond.vartok, o))
                                {
                                    assigned = true;
                                    break;
                                }
                            }
                            if assigned {
                                break;
                            }
                            let mut up = par;
                            while list
                                .ast_parent(up)
                                .is_some_and(|pp| list.ast_op2(pp) == Some(up))
                            {
                                up = list.ast_parent(up).expect("checked above");
                            }
                            p = list.ast_parent(up);
                        }
                    }
                }
            }

            if !pat_match(list, list.prev(top), "if|while (")?
                || list.prev(top).is_some_and(|p| list[p].is_expanded_macro())
            {
                continue;
            }

            // Does the condition itself reassign the expression?
            if Some(tok) != list.ast_op2(top)
                && list
                    .ast_op2(top)
                    .is_some_and(|c| matches!(list.text(c), "&&" | "||"))
                && any_expr_var_changed(
                    list,
                    symbols,
                    settings,
                    Some(top),
                    list.link(top),
                    &vars,
                )?
            {
                if settings.debug_warnings {
                    bailout(list, logger, tok, "assignment in condition");
                }
                continue;
            }

            let mut then_values: Vec<Value> = Vec::new();
            let mut else_values: Vec<Value> = Vec::new();

            if !pat_match(list, Some(tok), "!=|=")? && tok != cond.vartok {
                then_values.extend(cond.true_values.iter().cloned());
                if is_condition_known(list, tok, false) {
                    insert_impossible(&mut else_values, &cond.false_values);
                }
            }
            if !pat_match(list, Some(tok), "==|!")? && !cond.eq_like {
                else_values.extend(cond.false_values.iter().cloned());
                if is_condition_known(list, tok, true) {
                    insert_impossible(&mut then_values, &cond.true_values);
                }
            }

            // An outer `!` or `== false` swaps the branches.
            {
                let mut tok2 = tok;
                while let Some(mut parent) = list.ast_parent(tok2) {
                    while list.text(parent) == "&&" {
                        match list.ast_parent(parent) {
                            Some(p) => parent = p,
                            None => break,
                        }
                    }
                    if list.text(parent) == "!" || simple_match(list, Some(parent), "== false") {
                        std::mem::swap(&mut then_values, &mut else_values);
                    }
                    tok2 = parent;
                    if list.ast_parent(tok2).is_none() {
                        break;
                    }
                }
            }

            // Start tokens of the then and else blocks.
            let close = list.link(top);
            let then_start = close
                .filter(|c| list.text_at(*c, 1) == "{")
                .and_then(|c| list.next(c));
            let else_start = then_start
                .and_then(|t| list.link(t))
                .filter(|c| simple_match(list, Some(*c), "} else {"))
                .and_then(|c| list.tok_at(c, 2));

            let mut change_block: i32 = -1;
            for (i, start) in [then_start, else_start].iter().enumerate() {
                let Some(start) = start else { continue };
                let values = if i == 0 {
                    &mut then_values
                } else {
                    &mut else_values
                };
                value_flow_set_condition_to_known(list, tok, values, i == 0)?;
                let stop = list.link(*start);
                if hook.forward(
                    list,
                    symbols,
                    logger,
                    settings,
                    *start,
                    stop,
                    cond.vartok,
                    values,
                    true,
                )? {
                    change_block = i as i32;
                }
                change_known_to_possible(values, None);
            }
            if change_block >= 0 && !simple_match(list, list.prev(top), "while (") {
                if settings.debug_warnings {
                    bailout(
                        list,
                        logger,
                        tok,
                        &format!(
                            "{} is changed in conditional block",
                            list.expression_string(cond.vartok)
                        ),
                    );
                }
                continue;
            }

            // After the conditional code.
            let Some(close) = close else { continue };
            if list.text_at(close, 1) != "{" {
                continue;
            }
            let then_close = list
                .tok_at(close, 1)
                .and_then(|o| list.link(o))
                .expect("linked brace");
            let mut after = then_close;
            let mut unknown_noreturn = String::new();
            if settings
                .library
                .is_scope_noreturn(list, after, Some(&mut unknown_noreturn))
            {
                if settings.debug_warnings && !unknown_noreturn.is_empty() {
                    bailout(list, logger, after, "possible noreturn scope");
                }
                continue;
            }

            let is_while = list
                .ast_parent(tok)
                .is_some_and(|p| simple_match(list, list.prev(p), "while ("));
            let dead_if = is_return_scope(list, settings, after)
                || (is_while && !is_break_scope(list, after)?);
            let mut dead_else = false;

            if simple_match(list, Some(after), "} else {") {
                let else_open = list.tok_at(after, 2).expect("matched above");
                after = list.link(else_open).expect("linked brace");
                if simple_match(list, list.tok_at(after, -2), ") ; }") {
                    if settings.debug_warnings {
                        bailout(list, logger, after, "possible noreturn scope");
                    }
                    continue;
                }
                dead_else = is_return_scope(list, settings, after);
            }

            if dead_if && dead_else {
                continue;
            }

            let mut values: Vec<Value> = if dead_if {
                else_values.clone()
            } else if dead_else {
                then_values.clone()
            } else {
                then_values
                    .iter()
                    .chain(else_values.iter())
                    .filter(|v| v.is_possible())
                    .cloned()
                    .collect()
            };

            if !values.is_empty() {
                if (dead_if || dead_else)
                    && !list
                        .ast_parent(tok)
                        .is_some_and(|p| matches!(list.text(p), "&&" | "&"))
                {
                    value_flow_set_condition_to_known(list, tok, &mut values, true)?;
                    value_flow_set_condition_to_known(list, tok, &mut values, false)?;
                }
                // Propagate until the end of the scope enclosing the
                // conditional.
                let end = list[top]
                    .scope
                    .expand()
                    .and_then(|s| symbols.scopes[s].body_end)
                    .or(symbols.scopes[scope].body_end);
                hook.forward(
                    list, symbols, logger, settings, after, end, cond.vartok, &values, false,
                )?;
            }
        }
    }
    Ok(())
}

/// Integer conditions: comparisons against known values and bare truthiness
/// checks.
pub(crate) struct IntConditionHook;

impl ConditionHook for IntConditionHook {
    fn parse(
        &self,
        list: &TokenList,
        _symbols: &SymbolDatabase,
        _settings: &Settings,
        tok: Token,
    ) -> AnalysisResult<Option<Condition>> {
        if let Some((mut vartok, true_value, false_value)) = parse_compare_int(list, tok)? {
            if list.text(vartok) == "=" {
                if let Some(lhs) = list.ast_op1(vartok) {
                    vartok = lhs;
                }
            }
            return Ok(Some(Condition {
                vartok,
                true_values: vec![true_value],
                false_values: vec![false_value],
                eq_like: false,
            }));
        }

        let vartok = if list.text(tok) == "!" {
            list.ast_op1(tok)
        } else if list.ast_parent(tok).is_some_and(|p| {
            matches!(list.text(p), "&&" | "||")
                || pat_match(list, list.prev(p), "if|while (").unwrap_or(false)
        }) {
            if list.text(tok) == "=" {
                list.ast_op1(tok)
            } else if !list[tok].is_comparison_op() && !list[tok].is_assignment_op() {
                Some(tok)
            } else {
                None
            }
        } else {
            None
        };
        let Some(vartok) = vartok else {
            return Ok(None);
        };
        let true_value = Value::with_condition(tok, 0);
        let false_value = Value::with_condition(tok, 0);
        Ok(Some(Condition {
            vartok,
            true_values: vec![true_value],
            false_values: vec![false_value],
            eq_like: false,
        }))
    }

    fn forward(
        &self,
        list: &mut TokenList,
        symbols: &SymbolDatabase,
        logger: &mut dyn ErrorLogger,
        settings: &Settings,
        start: Token,
        stop: Option<Token>,
        vartok: Token,
        values: &[Value],
        const_value: bool,
    ) -> AnalysisResult<bool> {
        super::forward::value_flow_forward(
            list,
            symbols,
            logger,
            settings,
            list.next(start),
            stop,
            vartok,
            values,
            const_value,
            false,
        )?;
        let vars = expr_var_ids(list, vartok);
        any_expr_var_changed(list, symbols, settings, Some(start), stop, &vars)
    }
}

/// The after-condition pass for integer conditions.
pub(crate) fn value_flow_after_condition(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    after_condition(&IntConditionHook, list, symbols, logger, settings)
}

/// "Either the condition is redundant, or ..." message helper used by
/// checks that consume condition-derived values.
pub fn either_the_condition_is_redundant(list: &TokenList, condition: Option<Token>) -> String {
    let Some(condition) = condition else {
        return "Either the condition is redundant".to_string();
    };
    let cond_str = if list.text(condition) == "case" {
        format!("switch case {}:", list.text_at(condition, 1))
    } else {
        format!("condition '{}'", list.expression_string(condition))
    };
    format!("Either the {cond_str} is redundant")
}
