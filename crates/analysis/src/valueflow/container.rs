//! Container-size tracking, smart pointers, dynamic buffer sizes and
//! unknown function returns.
//!
//! Container sizes are CONTAINER_SIZE values on the container variable's
//! tokens, maintained by dedicated forward/reverse walkers that understand
//! the library's container actions (push/pop/clear/...) and yields
//! (size/empty/at).

use crate::astutils::{get_arguments, visit_ast_nodes, ChildrenToVisit};
use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::library::{BufferSizeKind, ContainerAction, ContainerYield};
use crate::mathlib;
use crate::settings::Settings;
use crate::symbols::{ScopeKind, SymbolDatabase};
use crate::tokenizer;
use crate::tokens::matcher::pat_match;
use crate::tokens::{Language, Token, TokenList};
use crate::types;
use crate::values::{Value, ValueType};

use super::condition::{after_condition, parse_compare_int, Condition, ConditionHook};
use super::forward::forward_assign;
use super::settokenvalue::{get_str_length, set_token_value};

fn container_info<'a>(
    list: &TokenList,
    settings: &'a Settings,
    tok: Token,
) -> Option<&'a crate::library::ContainerInfo> {
    settings
        .library
        .container(crate::astutils::container_of(list, tok)?)
}

/// `%var% . size|length (` on a container.
fn is_container_size(list: &TokenList, settings: &Settings, tok: Token) -> AnalysisResult<bool> {
    if !pat_match(list, Some(tok), "%var% . %name% (")? {
        return Ok(false);
    }
    let Some(info) = container_info(list, settings, tok) else {
        return Ok(false);
    };
    Ok(info.yields(list.text_at(tok, 2)) == ContainerYield::Size)
}

/// `%var% . empty (` on a container.
fn is_container_empty(list: &TokenList, settings: &Settings, tok: Token) -> AnalysisResult<bool> {
    if !pat_match(list, Some(tok), "%var% . %name% (")? {
        return Ok(false);
    }
    let Some(info) = container_info(list, settings, tok) else {
        return Ok(false);
    };
    Ok(info.yields(list.text_at(tok, 2)) == ContainerYield::Empty)
}

/// Is the container use guarded by a size check in the left side of an
/// enclosing `&&`/`||`/`?:`?
fn has_container_size_guard(list: &TokenList, tok: Token, container_id: u32) -> bool {
    let mut t = tok;
    while let Some(parent) = list.ast_parent(t) {
        if list.ast_op2(parent) == Some(t) && matches!(list.text(parent), "||" | "&&" | "?") {
            let mut found = false;
            visit_ast_nodes(list, list.ast_op1(parent), &mut |t2| {
                if list[t2].var_id == container_id {
                    found = true;
                    ChildrenToVisit::Done
                } else {
                    ChildrenToVisit::Op1AndOp2
                }
            });
            if found {
                return true;
            }
        }
        t = parent;
    }
    false
}

/// Does the function called with `tok` as argument change the container's
/// size?
fn is_container_size_changed_by_function(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
    depth: u32,
) -> AnalysisResult<bool> {
    // Accessing an element does not change the size.
    if pat_match(list, Some(tok), "%name% . %name% (")? {
        if let Some(info) = container_info(list, settings, tok) {
            if info.yields(list.text_at(tok, 2)) != ContainerYield::NoYield {
                return Ok(false);
            }
        }
    }
    if list
        .ast_parent(tok)
        .is_some_and(|p| list.text(p) == "[")
    {
        return Ok(false);
    }

    let address_of = list
        .ast_parent(tok)
        .is_some_and(|p| list.is_unary_op(p, "&"));

    let Some((callee, pos)) = crate::astutils::get_token_argument_function(list, tok) else {
        return Ok(false);
    };
    if let Some(func) = list[callee].function.expand() {
        let Some(arg) = symbols.functions[func].argument_var(pos) else {
            return Ok(true);
        };
        let (is_ref, is_const, decl_id, scope) = {
            let a = &symbols.variables[arg];
            (a.is_reference, a.is_const, a.decl_id, a.scope)
        };
        if !is_ref && !address_of {
            return Ok(false);
        }
        if !address_of && is_const {
            return Ok(false);
        }
        let (body_start, body_end) = {
            let s = &symbols.scopes[scope];
            (s.body_start, s.body_end)
        };
        if depth > 0 {
            return is_container_size_changed(
                list,
                symbols,
                settings,
                decl_id,
                body_start,
                body_end,
                depth - 1,
            );
        }
        return Ok(true);
    }
    // Unknown function: safe guess.
    let (changed, inconclusive) =
        crate::astutils::is_variable_changed_by_function_call(list, symbols, settings, tok, 0);
    Ok(changed || inconclusive)
}

/// Is the container's size changed anywhere in `[start, end)`?
fn is_container_size_changed(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    var_id: u32,
    start: Option<Token>,
    end: Option<Token>,
    depth: u32,
) -> AnalysisResult<bool> {
    let mut cur = start;
    while let Some(tok) = cur {
        if end == Some(tok) {
            break;
        }
        cur = list.next(tok);
        if list[tok].var_id != var_id {
            continue;
        }
        let Some(info) = container_info(list, settings, tok) else {
            return Ok(true);
        };
        if pat_match(list, Some(tok), "%name% %assign%|<<")? {
            return Ok(true);
        }
        if pat_match(list, Some(tok), "%name% . %name% (")? {
            let member = list.text_at(tok, 2);
            if info.yields(member) == ContainerYield::NoYield {
                let action = info.action(member);
                match action {
                    ContainerAction::Find
                    | ContainerAction::FindConst
                    | ContainerAction::ChangeContent => {}
                    // An unknown member might do anything.
                    _ if action.changes_size() => return Ok(true),
                    _ => {}
                }
            }
        }
        if is_container_size_changed_by_function(list, symbols, settings, tok, depth)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Backward walk for container sizes: stops at scope edges, reassignments
/// and size-changing calls.
pub(crate) fn value_flow_container_reverse(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Token,
    container_id: u32,
    value: &Value,
) -> AnalysisResult<()> {
    let mut cur = list.prev(start);
    while let Some(tok) = cur {
        cur = list.prev(tok);
        if pat_match(list, Some(tok), "[{}]")? {
            break;
        }
        if pat_match(list, Some(tok), "return|break|continue")? {
            break;
        }
        if list[tok].var_id != container_id {
            continue;
        }
        if pat_match(list, Some(tok), "%name% =")? {
            break;
        }
        if is_container_size_changed_by_function(list, symbols, settings, tok, 20)? {
            break;
        }
        let Some(info) = container_info(list, settings, tok) else {
            break;
        };
        if pat_match(list, Some(tok), "%name% . %name% (")?
            && info.action(list.text_at(tok, 2)) != ContainerAction::NoAction
        {
            break;
        }
        if !has_container_size_guard(list, tok, container_id) {
            set_token_value(list, symbols, settings, tok, value.clone())?;
        }
    }
    Ok(())
}

/// Forward walk for container sizes.
pub(crate) fn value_flow_container_forward(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Token,
    container_id: u32,
    value: &Value,
) -> AnalysisResult<()> {
    let mut value = value.clone();
    let mut cur = Some(start);
    while let Some(tok) = cur {
        cur = list.next(tok);
        if pat_match(list, Some(tok), "[{}]")? {
            break;
        }
        if pat_match(list, Some(tok), "while|for (")? {
            let Some(close) = list.link_at(tok, 1) else { break };
            let Some(body_open) = list.next(close).filter(|t| list.text(*t) == "{") else {
                break;
            };
            if is_container_size_changed(
                list,
                symbols,
                settings,
                container_id,
                list.next(body_open),
                list.link(body_open),
                20,
            )? {
                break;
            }
        }
        if list.text(tok) == ")"
            && list.text_at(tok, 1) == "{"
            && pat_match(
                list,
                list.link(tok).and_then(|o| list.prev(o)),
                "while|for|if",
            )?
        {
            let body_open = list.tok_at(tok, 1).expect("checked above");
            if is_container_size_changed(
                list,
                symbols,
                settings,
                container_id,
                list.next(body_open),
                list.link(body_open),
                20,
            )? || crate::astutils::is_escape_scope(list, settings, body_open, false)
            {
                break;
            }
            cur = list.link(body_open);
            if crate::tokens::matcher::simple_match(list, cur, "} else {") {
                let else_open = cur.and_then(|c| list.tok_at(c, 2)).expect("matched above");
                if is_container_size_changed(
                    list,
                    symbols,
                    settings,
                    container_id,
                    list.next(else_open),
                    list.link(else_open),
                    20,
                )? {
                    break;
                }
                cur = list.link(else_open);
            }
            continue;
        }
        if list[tok].var_id != container_id {
            continue;
        }
        if pat_match(list, Some(tok), "%name% =")? {
            break;
        }
        if pat_match(list, Some(tok), "%name% +=")? {
            let Some(info) = container_info(list, settings, tok) else {
                break;
            };
            if !info.std_string_like {
                break;
            }
            let rhs = list
                .tok_at(tok, 1)
                .and_then(|plus| list.ast_op2(plus));
            let Some(rhs) = rhs else { break };
            if list[rhs].is_string() {
                value.int_value += get_str_length(list, rhs);
            } else if crate::astutils::ast_is_container(list, rhs) {
                let mut found = false;
                for rhsval in list.values(rhs) {
                    if rhsval.is_known() && rhsval.is_container_size_value() {
                        value.int_value += rhsval.int_value;
                        found = true;
                    }
                }
                if !found {
                    break;
                }
            } else {
                break;
            }
        }
        if list
            .ast_parent(tok)
            .is_some_and(|p| crate::astutils::is_likely_stream_read(list, p))
        {
            break;
        }
        if is_container_size_changed_by_function(list, symbols, settings, tok, 20)? {
            break;
        }
        let Some(info) = container_info(list, settings, tok) else {
            break;
        };
        if pat_match(list, Some(tok), "%name% . %name% (")?
            && info.action(list.text_at(tok, 2)) != ContainerAction::NoAction
        {
            break;
        }
        if !has_container_size_guard(list, tok, container_id) {
            set_token_value(list, symbols, settings, tok, value.clone())?;
        }
    }
    Ok(())
}

/// Seed container sizes: empty declarations, string assignments, and
/// conditional sizes propagated backwards.
pub(crate) fn value_flow_container_size(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    _logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    // Declarations: a default-constructed container is empty.
    for var_idx in 0..symbols.variables.len() {
        let var = symbols.variables[crate::symbols::VarId::from_u32(var_idx as u32)].clone();
        if !var.is_local || var.is_pointer || var.is_reference {
            continue;
        }
        let Some(container_name) = var.type_info.container.clone() else {
            continue;
        };
        if list.text_at(var.name_token, 1) != ";" {
            continue;
        }
        if list.has_known_value(var.name_token) {
            continue;
        }
        let mut value = Value::new_int(0);
        if let Some(info) = settings.library.container(&container_name) {
            if let Some(arg_no) = info.size_template_arg {
                // `std::array<T, N>`-likes have their size in the template
                // argument list.
                let size = var
                    .dimensions
                    .first()
                    .filter(|d| d.known)
                    .map(|d| d.size)
                    .or_else(|| template_size_argument(list, &var, arg_no));
                match size {
                    Some(n) => value.int_value = n,
                    None => continue,
                }
            }
        }
        value.value_type = ValueType::ContainerSize;
        value.set_known();
        if let Some(start) = list.next(var.name_token) {
            value_flow_container_forward(list, symbols, settings, start, var.decl_id, &value)?;
        }
    }

    // Assignment of string literals to string-like containers.
    for scope in symbols.function_scopes.clone() {
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
            if !pat_match(list, Some(tok), "%name%|;|{|}")? {
                continue;
            }
            let Some(container_tok) = list.tok_at(tok, 1) else {
                continue;
            };
            if !pat_match(list, Some(container_tok), "%var% = %str% ;")? {
                continue;
            }
            let Some(info) = container_info(list, settings, container_tok) else {
                continue;
            };
            if !info.std_string_like {
                continue;
            }
            let strtok = list.tok_at(container_tok, 2).expect("matched above");
            let mut value = Value::new_int(get_str_length(list, strtok));
            value.value_type = ValueType::ContainerSize;
            value.set_known();
            let container_id = list[container_tok].var_id;
            if let Some(start) = list.next(container_tok) {
                value_flow_container_forward(list, symbols, settings, start, container_id, &value)?;
            }
        }
    }

    // Conditional sizes: `if (v.size() == 3)`, `if (v.empty())`,
    // `if (s == "abc")` propagate a possible size before the condition.
    for scope in symbols.scopes.keys().collect::<Vec<_>>() {
        let (kind, class_def, body_start) = {
            let s = &symbols.scopes[scope];
            (s.kind, s.class_def, s.body_start)
        };
        if kind != ScopeKind::If {
            continue;
        }
        let Some(class_def) = class_def else { continue };
        let mut cur = Some(class_def);
        while let Some(tok) = cur {
            if Some(tok) == body_start || list.text(tok) == "{" {
                break;
            }
            cur = list.next(tok);
            if !list[tok].is_name() || list[tok].var_id == 0 {
                continue;
            }
            if container_info(list, settings, tok).is_none() {
                continue;
            }

            let (condition_token, int_value) = if pat_match(list, Some(tok), "%name% . %name% (")? {
                if is_container_size(list, settings, tok)? {
                    let call = list.tok_at(tok, 3).expect("matched above");
                    let Some(parent) = list.ast_parent(call) else {
                        continue;
                    };
                    if !list[parent].is_comparison_op() || !list.is_binary_op(parent) {
                        continue;
                    }
                    let op1 = list.ast_op1(parent).expect("binary op");
                    let op2 = list.ast_op2(parent).expect("binary op");
                    let num = list
                        .known_int_value(op1)
                        .or_else(|| list.known_int_value(op2));
                    match num {
                        Some(n) => (parent, n),
                        None => continue,
                    }
                } else if is_container_empty(list, settings, tok)? {
                    let call = list.tok_at(tok, 3).expect("matched above");
                    (call, 0)
                } else {
                    continue;
                }
            } else if container_info(list, settings, tok)
                .is_some_and(|i| i.std_string_like)
                && pat_match(list, Some(tok), "%name% ==|!= %str%")?
            {
                let strtok = list.tok_at(tok, 2).expect("matched above");
                let cmp = list.tok_at(tok, 1).expect("matched above");
                (cmp, get_str_length(list, strtok))
            } else {
                continue;
            };

            let mut value = Value::with_condition(condition_token, int_value);
            value.value_type = ValueType::ContainerSize;
            value_flow_container_reverse(
                list,
                symbols,
                settings,
                class_def,
                list[tok].var_id,
                &value,
            )?;
        }
    }
    Ok(())
}

fn template_size_argument(
    list: &TokenList,
    var: &crate::symbols::VariableData,
    arg_no: usize,
) -> Option<i64> {
    // `std::array < T , N >`: pick the N-th template argument.
    let mut t = var.type_start;
    loop {
        if list.text(t) == "<" {
            break;
        }
        t = list.next(t)?;
        if t == var.name_token {
            return None;
        }
    }
    let close = list.find_closing_bracket(t)?;
    let mut arg_index = 1;
    let mut cur = list.next(t)?;
    while cur != close {
        if list.text(cur) == "," {
            arg_index += 1;
        } else if arg_index == arg_no && list[cur].is_number() {
            return mathlib::parse_int(list.text(cur));
        }
        cur = list.next(cur)?;
    }
    None
}

/// Container conditions share the generic condition driver.
struct ContainerConditionHook;

impl ConditionHook for ContainerConditionHook {
    fn parse(
        &self,
        list: &TokenList,
        _symbols: &SymbolDatabase,
        settings: &Settings,
        tok: Token,
    ) -> AnalysisResult<Option<Condition>> {
        // `v.size() == n`.
        if let Some((vartok, mut true_value, mut false_value)) = parse_compare_int(list, tok)? {
            // The compared expression is the size call; the variable sits
            // three tokens before the parenthesis.
            let Some(candidate) = list.tok_at(vartok, -3) else {
                return Ok(None);
            };
            if !is_container_size(list, settings, candidate)? {
                return Ok(None);
            }
            true_value.value_type = ValueType::ContainerSize;
            false_value.value_type = ValueType::ContainerSize;
            return Ok(Some(Condition {
                vartok: candidate,
                true_values: vec![true_value],
                false_values: vec![false_value],
                eq_like: false,
            }));
        }

        // `v.empty()` — the true branch pins the size to exactly 0.
        if list.text(tok) == "(" {
            let Some(candidate) = list.tok_at(tok, -3) else {
                return Ok(None);
            };
            if !is_container_empty(list, settings, candidate)? {
                return Ok(None);
            }
            // Comparisons above make this a size comparison instead.
            let mut negations = 0u32;
            let mut parent = list.ast_parent(tok);
            while let Some(p) = parent {
                if pat_match(list, Some(p), "%comp%")? {
                    return Ok(None);
                }
                if list.text(p) == "!" {
                    negations += 1;
                }
                parent = list.ast_parent(p);
            }
            let mut value = Value::with_condition(tok, 0);
            value.value_type = ValueType::ContainerSize;
            if negations % 2 == 1 {
                // `!v.empty()`: the driver swaps the branches afterwards,
                // so the false side carries the non-empty impossibility.
                return Ok(Some(Condition {
                    vartok: candidate,
                    true_values: vec![value.clone()],
                    false_values: vec![crate::values::as_impossible(value)],
                    eq_like: false,
                }));
            }
            return Ok(Some(Condition {
                vartok: candidate,
                true_values: vec![value.clone()],
                false_values: vec![value],
                eq_like: true,
            }));
        }

        // String comparison against a literal.
        if pat_match(list, Some(tok), "==|!=")? && list.is_binary_op(tok) {
            let op1 = list.ast_op1(tok).expect("binary op");
            let op2 = list.ast_op2(tok).expect("binary op");
            let (strtok, vartok) = if list[op1].is_string() {
                (op1, op2)
            } else if list[op2].is_string() {
                (op2, op1)
            } else {
                return Ok(None);
            };
            if !crate::astutils::ast_is_container(list, vartok) {
                return Ok(None);
            }
            let mut value = Value::with_condition(tok, get_str_length(list, strtok));
            value.value_type = ValueType::ContainerSize;
            return Ok(Some(Condition {
                vartok,
                true_values: vec![value.clone()],
                false_values: vec![value],
                eq_like: false,
            }));
        }
        Ok(None)
    }

    fn forward(
        &self,
        list: &mut TokenList,
        symbols: &SymbolDatabase,
        _logger: &mut dyn ErrorLogger,
        settings: &Settings,
        start: Token,
        stop: Option<Token>,
        vartok: Token,
        values: &[Value],
        _const_value: bool,
    ) -> AnalysisResult<bool> {
        let Some(value) = values.first() else {
            return Ok(false);
        };
        let var_id = list[vartok].var_id;
        if var_id == 0 {
            return Ok(false);
        }
        value_flow_container_forward(list, symbols, settings, start, var_id, value)?;
        is_container_size_changed(list, symbols, settings, var_id, Some(start), stop, 20)
    }
}

/// The after-condition pass for container sizes.
pub(crate) fn value_flow_container_after_condition(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    after_condition(&ContainerConditionHook, list, symbols, logger, settings)
}

/// Smart pointers: construction, `reset`, `release` produce known
/// null/non-null values.
pub(crate) fn value_flow_smart_pointer(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        let var_id = list[tok].var_id;
        if var_id == 0 {
            continue;
        }
        if !symbols.is_executable_scope(list, tok) {
            continue;
        }
        let Some(var) = symbols.variable_by_id(var_id).cloned() else {
            continue;
        };
        if !var.is_smart_pointer {
            continue;
        }
        if var.name_token == tok {
            if pat_match(list, Some(tok), "%var% (|{")?
                && list
                    .tok_at(tok, 1)
                    .and_then(|o| list.ast_op2(o))
                    .is_some_and(|in_tok| list.text(in_tok) != ",")
            {
                let in_tok = list
                    .tok_at(tok, 1)
                    .and_then(|o| list.ast_op2(o))
                    .expect("checked above");
                let values = list.values(in_tok).to_vec();
                let const_value = list[in_tok].is_number();
                forward_assign(
                    list, symbols, logger, settings, in_tok, var_id, values, const_value, true,
                )?;
            } else if pat_match(list, Some(tok), "%var% ;")? {
                let mut value = Value::new_int(0);
                value.set_known();
                forward_assign(
                    list, symbols, logger, settings, tok, var_id, vec![value], false, true,
                )?;
            }
        } else if pat_match(list, Some(tok), "%var% . reset (")?
            && list
                .tok_at(tok, 1)
                .is_some_and(|dot| list[dot].original_name() != "->")
        {
            if pat_match(list, list.tok_at(tok, 3), "( )")? {
                let mut value = Value::new_int(0);
                value.set_known();
                let after = list.tok_at(tok, 4).expect("matched above");
                forward_assign(
                    list, symbols, logger, settings, after, var_id, vec![value], false, false,
                )?;
            } else {
                list.remove_values(tok, |v| v.is_int_value());
                let in_tok = list.tok_at(tok, 3).and_then(|o| list.ast_op2(o));
                let Some(in_tok) = in_tok else { continue };
                let values = list.values(in_tok).to_vec();
                let const_value = list[in_tok].is_number();
                forward_assign(
                    list, symbols, logger, settings, in_tok, var_id, values, const_value, false,
                )?;
            }
        } else if pat_match(list, Some(tok), "%var% . release ( )")?
            && list
                .tok_at(tok, 1)
                .is_some_and(|dot| list[dot].original_name() != "->")
        {
            let mut value = Value::new_int(0);
            value.set_known();
            let after = list.tok_at(tok, 4).expect("matched above");
            forward_assign(
                list, symbols, logger, settings, after, var_id, vec![value], false, false,
            )?;
        }
    }
    Ok(())
}

/// Allocation sizes: `p = malloc(10)` gives `p` a BUFFER_SIZE of 10.
pub(crate) fn value_flow_dynamic_buffer_size(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    for scope in symbols.function_scopes.clone() {
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
            if !pat_match(list, Some(tok), "[;{}]")? {
                continue;
            }
            let Some(lhs) = list.tok_at(tok, 1) else { continue };
            if !pat_match(list, Some(lhs), "%var% =")? {
                continue;
            }
            if symbols.variable_by_id(list[lhs].var_id).is_none() {
                continue;
            }

            let mut rhs = list.tok_at(lhs, 1).and_then(|eq| list.ast_op2(eq));
            while let Some(r) = rhs {
                if list[r].is_cast() {
                    rhs = list.ast_op2(r).or_else(|| list.ast_op1(r));
                } else {
                    break;
                }
            }
            let Some(rhs) = rhs else { continue };
            if list.text(rhs) != "(" {
                continue;
            }
            let Some(name) = list.prev(rhs).filter(|n| list[*n].is_name()) else {
                continue;
            };
            let Some(alloc) = settings.library.alloc_func_info(list.text(name)).cloned() else {
                continue;
            };
            let args = get_arguments(list, rhs);
            let arg1 = args.get(alloc.size_arg1.wrapping_sub(1)).copied();
            let arg2 = args.get(alloc.size_arg2.wrapping_sub(1)).copied();

            let size_value: Option<i64> = match alloc.buffer_size {
                BufferSizeKind::Malloc => arg1.and_then(|a| list.known_int_value(a)),
                BufferSizeKind::Calloc => match (
                    arg1.and_then(|a| list.known_int_value(a)),
                    arg2.and_then(|a| list.known_int_value(a)),
                ) {
                    (Some(a), Some(b)) => Some(a.wrapping_mul(b)),
                    _ => None,
                },
                BufferSizeKind::Strdup => arg1.and_then(|a| {
                    list.values(a)
                        .iter()
                        .rev()
                        .find(|v| v.is_tok_value() && v.is_known())
                        .and_then(|v| v.tok_value)
                        .filter(|tv| list[*tv].is_string())
                        // One more byte for the terminator.
                        .map(|tv| get_str_length(list, tv) + 1)
                }),
            };
            let Some(size_value) = size_value else { continue };

            let mut value = Value::new_int(size_value);
            value.push_error_path(
                tok,
                format!("Assign {}, buffer with size {}", list.text(lhs), size_value),
            );
            value.value_type = ValueType::BufferSize;
            value.set_known();
            let var_id = list[lhs].var_id;
            let mut values = vec![value];
            super::forward::forward_variable(
                list,
                symbols,
                logger,
                settings,
                Some(rhs),
                body_end,
                var_id,
                &mut values,
                true,
                false,
            )?;
        }
    }
    Ok(())
}

/// Tag iterator-yielding member calls (`v.begin()`, `v.end()`, ...) with
/// known iterator values so that iterator comparisons can be inferred.
/// Both the begin- and end-style yields are tagged as end iterators.
/// TODO: the start-iterator yields should produce ITERATOR_START values.
pub(crate) fn value_flow_iterators(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if !crate::astutils::ast_is_container(list, tok) {
            continue;
        }
        let Some(dot) = list.ast_parent(tok) else { continue };
        if list.text(dot) != "." || list.ast_op1(dot) != Some(tok) {
            continue;
        }
        let Some(member) = list.ast_op2(dot) else { continue };
        let Some(call) = list.ast_parent(dot) else { continue };
        if list.text(call) != "(" || list.ast_op1(call) != Some(dot) {
            continue;
        }
        let Some(info) = container_info(list, settings, tok) else {
            continue;
        };
        let value_type = match info.yields(list.text(member)) {
            ContainerYield::EndIterator => ValueType::IteratorEnd,
            ContainerYield::StartIterator => ValueType::IteratorEnd,
            _ => continue,
        };
        let mut value = Value::new_int(0);
        value.value_type = value_type;
        value.set_known();
        set_token_value(list, symbols, settings, call, value)?;
    }
    Ok(())
}

/// For configured functions: seed the enumerated unknown return values,
/// clamped to the declared return type.
pub(crate) fn value_flow_unknown_function_return(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    if settings.check_unknown_function_return.is_empty() {
        return Ok(());
    }
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.ast_parent(tok).is_none() || list.text(tok) != "(" {
            continue;
        }
        let Some(name) = list.prev(tok).filter(|n| list[*n].is_name()) else {
            continue;
        };
        if !settings
            .check_unknown_function_return
            .contains(list.text(name))
        {
            continue;
        }
        let Some(info) = settings.library.function(list.text(name)) else {
            continue;
        };
        let unknown_values = info.unknown_return_values.clone();
        if unknown_values.is_empty() {
            continue;
        }
        // Clamp to the return type's range.
        let Some(typestr) = settings.library.return_value_type(list.text(name)).map(String::from)
        else {
            continue;
        };
        let Some((minvalue, maxvalue)) = min_max_from_typestr(&typestr, settings) else {
            continue;
        };
        for mut value in unknown_values {
            value = value.clamp(minvalue, maxvalue);
            set_token_value(list, symbols, settings, tok, Value::new_int(value))?;
        }
    }
    Ok(())
}

fn min_max_from_typestr(typestr: &str, settings: &Settings) -> Option<(i64, i64)> {
    let code = format!("{typestr};");
    let minilist = tokenizer::tokenize(&code, "<returnValueType>", Language::Cpp).ok()?;
    let front = minilist.front()?;
    let ti = types::parse_decl(&minilist, front, settings);
    types::min_max_values(&ti, &settings.platform)
}
