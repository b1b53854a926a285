//! Moved-from tracking: `std::move` / `std::forward` mark a variable
//! MOVED until something reinstates it (`reset`, `clear`, reassignment).

use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::settings::Settings;
use crate::settings::CppStandard;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::{pat_match, pat_match_varid, simple_match};
use crate::tokens::{Token, TokenList};
use crate::values::{MoveKind, Value, ValueType};

use super::forward::forward_variable;
use super::settokenvalue::set_token_value;

/// Detect `std :: move ( var )` / `std :: forward < .. > ( var )` starting
/// at a `std` token. Returns the moved variable token and the move kind.
fn is_std_move_or_forward(list: &TokenList, tok: Token) -> AnalysisResult<Option<(Token, MoveKind)>> {
    if list.text(tok) != "std" {
        return Ok(None);
    }
    let (variable_token, kind) = if pat_match(list, Some(tok), "std :: move ( %var% )")? {
        (list.tok_at(tok, 4), MoveKind::Moved)
    } else if simple_match(list, Some(tok), "std :: forward <") {
        let left_angle = list.tok_at(tok, 3).expect("matched above");
        let Some(right_angle) = list.find_closing_bracket(left_angle) else {
            return Ok(None);
        };
        if pat_match(list, Some(right_angle), "> ( %var% )")? {
            (list.tok_at(right_angle, 2), MoveKind::Forwarded)
        } else {
            return Ok(None);
        }
    } else {
        return Ok(None);
    };
    let Some(variable_token) = variable_token else {
        return Ok(None);
    };
    // Partial moves (`std::move(x.y)`) are not tracked.
    if list.text_at(variable_token, 1) == "." || list.text_at(variable_token, 2) == "." {
        return Ok(None);
    }
    Ok(Some((variable_token, kind)))
}

fn find_open_parenthesis_of_move(list: &TokenList, move_var: Token) -> Option<Token> {
    let mut tok = Some(move_var);
    while let Some(t) = tok {
        if list.text(t) == "(" {
            return Some(t);
        }
        tok = list.prev(t);
    }
    None
}

fn find_end_of_function_call(list: &TokenList, parameter: Token) -> Option<Token> {
    let mut parent = list.ast_parent(parameter);
    while let Some(p) = parent {
        if list[p].is_op() || list.text(p) == "(" {
            break;
        }
        parent = list.ast_parent(p);
    }
    let p = parent?;
    crate::astutils::next_after_ast_rightmost_leaf(list, list.ast_top(p))
}

/// Track moved-from state after `std::move`/`std::forward`, and its
/// reinstatement by `reset()` / `clear()`.
pub(crate) fn value_flow_after_move(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    if !list.is_cpp() || settings.standards.cpp < CppStandard::Cpp11 {
        return Ok(());
    }
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

            // Reinstatement: `x . reset (` / `x . clear (`.
            if pat_match(list, Some(tok), "%var% . reset|clear (")?
                && list
                    .tok_at(tok, 1)
                    .is_some_and(|dot| list[dot].original_name() != "->")
            {
                let var_id = list[tok].var_id;
                let Some(var) = symbols.variable_by_id(var_id) else {
                    continue;
                };
                if !var.is_local && !var.is_argument {
                    continue;
                }
                let end_of_var_scope = symbols.end_of_function(list, var.name_token);
                let mut value = Value {
                    value_type: ValueType::Moved,
                    move_kind: MoveKind::NonMoved,
                    ..Value::default()
                };
                value.push_error_path(
                    tok,
                    format!(
                        "Calling {}.{}() makes {} 'non-moved'",
                        list.text(tok),
                        list.text_at(tok, 2),
                        list.text(tok)
                    ),
                );
                value.set_known();
                set_token_value(list, symbols, settings, tok, value.clone())?;
                let mut values = vec![value];
                forward_variable(
                    list,
                    symbols,
                    logger,
                    settings,
                    list.next(tok),
                    end_of_var_scope,
                    var_id,
                    &mut values,
                    false,
                    false,
                )?;
                continue;
            }

            let Some((var_tok, move_kind)) = is_std_move_or_forward(list, tok)? else {
                continue;
            };
            let var_id = list[var_tok].var_id;
            // `x = .. std::move(x) ..` and `return std::move(x)` do not
            // leave x moved.
            let mut parent = list.ast_parent(tok);
            while let Some(p) = parent {
                if list.text(p) == "=" || list.text(p) == "return" {
                    break;
                }
                if list.text(p) == "("
                    && var_id > 0
                    && pat_match_varid(list, list.tok_at(p, -3), "%varid% . %name% (", var_id)?
                {
                    break;
                }
                parent = list.ast_parent(p);
            }
            if let Some(p) = parent {
                if list.text(p) == "return" || list.text(p) == "(" {
                    continue;
                }
                if list
                    .ast_op1(p)
                    .is_some_and(|lhs| list[lhs].var_id == var_id)
                {
                    continue;
                }
            }
            if symbols.variable_by_id(var_id).is_none() {
                continue;
            }
            let end_of_var_scope = symbols.end_of_function(list, var_tok);

            let mut value = Value {
                value_type: ValueType::Moved,
                move_kind,
                ..Value::default()
            };
            value.push_error_path(
                tok,
                match move_kind {
                    MoveKind::Forwarded => format!("Calling std::forward({})", list.text(var_tok)),
                    _ => format!("Calling std::move({})", list.text(var_tok)),
                },
            );
            value.set_known();
            let mut values = vec![value];

            let open_paren = find_open_parenthesis_of_move(list, var_tok);
            let end_of_call = open_paren.and_then(|p| find_end_of_function_call(list, p));
            if let Some(end_of_call) = end_of_call {
                forward_variable(
                    list,
                    symbols,
                    logger,
                    settings,
                    Some(end_of_call),
                    end_of_var_scope,
                    var_id,
                    &mut values,
                    false,
                    false,
                )?;
            }
        }
    }
    Ok(())
}
