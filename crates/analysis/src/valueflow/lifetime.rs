//! Lifetime seeding: pointers and references that borrow a local object
//! carry a LIFETIME value naming the borrowed token. Propagation upward
//! stays restricted to borrowed contexts (see the setter).

use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::pat_match;
use crate::tokens::TokenList;
use crate::values::{LifetimeKind, LifetimeScope, Value, ValueType};

use super::forward::forward_variable;
use super::settokenvalue::set_token_value;

/// Seed lifetime values for address-of assignments, reference bindings and
/// lambda captures.
pub(crate) fn value_flow_lifetime(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);

        // `p = & x ;` — p borrows x.
        if list.is_unary_op(tok, "&")
            && list
                .ast_parent(tok)
                .is_some_and(|p| list.text(p) == "=" && list.ast_op2(p) == Some(tok))
        {
            let Some(referent) = list.ast_op1(tok) else {
                continue;
            };
            let Some(ref_var) = symbols.variable_by_id(list[referent].var_id) else {
                continue;
            };
            if !ref_var.is_local && !ref_var.is_argument {
                continue;
            }
            let lhs = list
                .ast_parent(tok)
                .and_then(|eq| list.ast_op1(eq));
            let Some(lhs) = lhs else { continue };
            let lhs_var_id = list[lhs].var_id;
            if lhs_var_id == 0 {
                continue;
            }
            let mut value = Value {
                value_type: ValueType::Lifetime,
                tok_value: Some(referent),
                lifetime_kind: LifetimeKind::Address,
                lifetime_scope: if ref_var.is_argument {
                    LifetimeScope::Argument
                } else {
                    LifetimeScope::Local
                },
                ..Value::default()
            };
            value.push_error_path(tok, format!("Address of '{}' taken here.", ref_var.name));
            set_token_value(list, symbols, settings, tok, value.clone())?;
            let end = symbols.end_of_function(list, tok);
            let start = crate::astutils::next_after_ast_rightmost_leaf(
                list,
                list.ast_parent(tok).expect("checked above"),
            );
            let mut values = vec![value];
            forward_variable(
                list, symbols, logger, settings, start, end, lhs_var_id, &mut values, false,
                false,
            )?;
            continue;
        }

        // `T & r = x ;` — the reference borrows x for its whole life.
        if pat_match(list, Some(tok), "%var% = %var%")? {
            let Some(var) = symbols.variable_by_id(list[tok].var_id) else {
                continue;
            };
            if !var.is_reference || var.name_token != tok {
                continue;
            }
            let Some(referent) = list.tok_at(tok, 2) else {
                continue;
            };
            if list[referent].var_id == 0 {
                continue;
            }
            let mut value = Value {
                value_type: ValueType::Lifetime,
                tok_value: Some(referent),
                lifetime_kind: LifetimeKind::Object,
                lifetime_scope: LifetimeScope::Local,
                ..Value::default()
            };
            value.push_error_path(
                tok,
                format!("'{}' bound to '{}' here.", var.name, list.text(referent)),
            );
            set_token_value(list, symbols, settings, tok, value)?;
            continue;
        }

        // Lambda captures by reference borrow the captured variables.
        if list.text(tok) == "["
            && crate::astutils::find_lambda_end_token(list, tok).is_some()
        {
            let Some(close) = list.link(tok) else { continue };
            let mut capture = list.next(tok);
            while let Some(c) = capture {
                if c == close {
                    break;
                }
                if list.text(c) == "&" {
                    if let Some(captured) = list.next(c).filter(|n| list[*n].var_id > 0) {
                        let mut value = Value {
                            value_type: ValueType::Lifetime,
                            tok_value: Some(captured),
                            lifetime_kind: LifetimeKind::Lambda,
                            lifetime_scope: LifetimeScope::Local,
                            ..Value::default()
                        };
                        value.push_error_path(
                            c,
                            format!("Lambda captures '{}' by reference.", list.text(captured)),
                        );
                        set_token_value(list, symbols, settings, tok, value)?;
                    }
                }
                capture = list.next(c);
            }
        }
    }
    Ok(())
}
