//! One-level interprocedural propagation: argument values are injected
//! into called functions, library `returnValue` expressions are evaluated
//! over the call's argument values, and default parameters seed the
//! function body.

use crate::astbuild;
use crate::astutils::get_arguments;
use crate::error::AnalysisResult;
use crate::errorlogger::ErrorLogger;
use crate::mathlib;
use crate::settings::Settings;
use crate::symbols::{SymbolDatabase, VarId};
use crate::tokenizer;
use crate::tokens::matcher::pat_match;
use crate::tokens::{Language, Token, TokenList};
use crate::values::{lower_to_possible, remove_impossible, Value};

use super::forward::forward_variable;
use super::settokenvalue::set_token_value;

fn ordinal(n: usize) -> &'static str {
    match n % 10 {
        1 if n % 100 != 11 => "st",
        2 if n % 100 != 12 => "nd",
        3 if n % 100 != 13 => "rd",
        _ => "th",
    }
}

/// The values an argument expression contributes to a call.
fn function_argument_values(list: &TokenList, argtok: Token) -> AnalysisResult<Vec<Value>> {
    let mut argvalues: Vec<Value> = list.values(argtok).to_vec();
    remove_impossible(&mut argvalues, None);
    if argvalues.is_empty() && pat_match(list, Some(argtok), "%comp%|%oror%|&&|!")? {
        argvalues.push(Value::new_int(0));
        argvalues.push(Value::new_int(1));
    }
    Ok(argvalues)
}

/// The placeholder index of an `argN` name (1-based), if the text is one.
fn arg_placeholder(text: &str) -> Option<usize> {
    let n = text.strip_prefix("arg")?;
    if n.len() != 1 {
        return None;
    }
    let digit = n.chars().next()?.to_digit(10)?;
    if digit == 0 {
        return None;
    }
    Some(digit as usize)
}

/// Evaluate a tokenized return-value expression over the call's argument
/// value lists.
fn evaluate(
    minilist: &TokenList,
    reallist: &TokenList,
    expr: Option<Token>,
    arg_values: &[Vec<Value>],
) -> Vec<Value> {
    let Some(expr) = expr else { return Vec::new() };
    let text = minilist.text(expr);

    // strlen(argN) over string token values.
    if text == "(" {
        if let Some(callee) = minilist.ast_op1(expr) {
            if minilist.text(callee) == "strlen" {
                if let Some(arg) = minilist.ast_op2(expr) {
                    if let Some(n) = arg_placeholder(minilist.text(arg)) {
                        let Some(values) = arg_values.get(n - 1) else {
                            return Vec::new();
                        };
                        let mut result = Vec::new();
                        for argvalue in values {
                            if argvalue.is_tok_value() {
                                if let Some(tv) = argvalue.tok_value {
                                    if reallist[tv].is_string() {
                                        let mut res = argvalue.clone();
                                        res.value_type = crate::values::ValueType::Int;
                                        res.tok_value = None;
                                        res.int_value =
                                            super::settokenvalue::get_str_length(reallist, tv);
                                        result.push(res);
                                    }
                                }
                            }
                        }
                        return result;
                    }
                }
            }
        }
        return Vec::new();
    }

    let op1 = minilist.ast_op1(expr);
    let op2 = minilist.ast_op2(expr);

    // Unary operands.
    if op1.is_some() && op2.is_none() {
        let opvalues = evaluate(minilist, reallist, op1, arg_values);
        match text {
            "+" => return opvalues,
            "-" => {
                return opvalues
                    .into_iter()
                    .filter(|v| v.is_int_value())
                    .map(|mut v| {
                        v.int_value = v.int_value.wrapping_neg();
                        v
                    })
                    .collect();
            }
            _ => return Vec::new(),
        }
    }

    // Binary and ternary operands.
    if let (Some(_), Some(op2)) = (op1, op2) {
        let lhs_values = evaluate(minilist, reallist, op1, arg_values);
        if lhs_values.is_empty() {
            return Vec::new();
        }
        let mut result = Vec::new();
        if text == "?" {
            for val1 in &lhs_values {
                if !val1.is_int_value() {
                    continue;
                }
                let branch = if val1.int_value != 0 {
                    minilist.ast_op1(op2)
                } else {
                    minilist.ast_op2(op2)
                };
                result.extend(evaluate(minilist, reallist, branch, arg_values));
            }
            return result;
        }
        let rhs_values = evaluate(minilist, reallist, Some(op2), arg_values);
        if rhs_values.is_empty() {
            return Vec::new();
        }
        for val1 in &lhs_values {
            if !val1.is_int_value() {
                continue;
            }
            for val2 in &rhs_values {
                if !val2.is_int_value() {
                    continue;
                }
                if val1.var_id != 0
                    && val2.var_id != 0
                    && (val1.var_id != val2.var_id || val1.var_value != val2.var_value)
                {
                    continue;
                }
                let Ok(folded) = mathlib::calculate_int(text, val1.int_value, val2.int_value)
                else {
                    continue;
                };
                let mut res = Value::new_int(folded);
                crate::values::combine_value_properties(val1, val2, &mut res);
                result.push(res);
            }
        }
        return result;
    }

    // Leaves.
    if let Some(n) = arg_placeholder(text) {
        return arg_values.get(n - 1).cloned().unwrap_or_default();
    }
    if minilist[expr].is_number() {
        if let Some(v) = mathlib::parse_int(text) {
            return vec![Value::known_int(v)];
        }
    }
    if minilist[expr].is_char() {
        if let Some(v) = mathlib::char_literal_value(text) {
            return vec![Value::known_int(v)];
        }
    }
    Vec::new()
}

/// Evaluate a library `returnValue` expression for the call whose paren is
/// `call` and set the resulting int values.
pub(crate) fn value_flow_library_function(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    call: Token,
    return_value: &str,
) -> AnalysisResult<()> {
    let mut arg_values: Vec<Vec<Value>> = Vec::new();
    for argtok in get_arguments(list, call) {
        let values = function_argument_values(list, argtok)?;
        if values.is_empty() {
            return Ok(());
        }
        arg_values.push(values);
    }
    if return_value.contains("arg") && arg_values.is_empty() {
        return Ok(());
    }

    let mut minilist = match tokenizer::tokenize(return_value, "<returnValue>", Language::Cpp) {
        Ok(l) => l,
        Err(_) => return Ok(()),
    };
    let root = match astbuild::build_expression_ast(&mut minilist, settings) {
        Ok(r) => r,
        Err(_) => return Ok(()),
    };

    let results = evaluate(&minilist, list, root, &arg_values);
    for value in results {
        if value.is_int_value() {
            set_token_value(list, symbols, settings, call, value)?;
        }
    }
    Ok(())
}

/// Inject argument values into a called function's body.
pub(crate) fn value_flow_inject_parameter(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
    arg: VarId,
    argvalues: &[Value],
) -> AnalysisResult<()> {
    let (decl_id, body_start, body_end) = {
        let var = &symbols.variables[arg];
        // Pass by value or const reference only.
        if var.is_reference && !var.is_const {
            return Ok(());
        }
        let scope = &symbols.scopes[var.scope];
        (var.decl_id, scope.body_start, scope.body_end)
    };
    if decl_id == 0 {
        return Ok(());
    }
    let mut values = argvalues.to_vec();
    forward_variable(
        list,
        symbols,
        logger,
        settings,
        body_start.and_then(|s| list.next(s)),
        body_end,
        decl_id,
        &mut values,
        false,
        true,
    )?;
    Ok(())
}

/// Propagate call-site argument values into called functions, and fold
/// library functions with configured return values.
pub(crate) fn value_flow_subfunction(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if !pat_match(list, Some(tok), "%name% (")? {
            continue;
        }
        let Some(func) = list[tok].function.expand() else {
            // Library function?
            if let Some(return_value) = settings
                .library
                .return_value(list.text(tok))
                .map(|s| s.to_string())
            {
                let call = list.tok_at(tok, 1).expect("matched above");
                value_flow_library_function(list, symbols, settings, call, &return_value)?;
            }
            continue;
        };
        if symbols.functions[func].scope.is_none() {
            continue;
        }

        let call = list.tok_at(tok, 1).expect("matched above");
        let call_arguments = get_arguments(list, call);
        for (argnr, argtok) in call_arguments.iter().enumerate() {
            let Some(argvar) = symbols.functions[func].argument_var(argnr) else {
                break;
            };

            let mut argvalues = function_argument_values(list, *argtok)?;
            argvalues.retain(|v| !v.is_lifetime_value());
            if argvalues.is_empty() {
                continue;
            }

            let func_name = symbols.functions[func].name.clone();
            let arg_expr = list.expression_string(*argtok);
            for v in argvalues.iter_mut() {
                let nr = argnr + 1;
                let info = format!(
                    "Calling function '{}', {}{} argument '{}' value is {}",
                    func_name,
                    nr,
                    ordinal(nr),
                    arg_expr,
                    v.info_string()
                );
                v.push_error_path(*argtok, info);
            }

            // Values passed into a function are not "known" there.
            lower_to_possible(&mut argvalues, None);

            value_flow_inject_parameter(list, symbols, logger, settings, argvar, &argvalues)?;
            // Injecting several arguments at once is not supported by the
            // walker; stop after the first argument that carried values.
            if !argvalues.is_empty() {
                break;
            }
        }
    }
    Ok(())
}

/// Seed function bodies with the values of defaulted parameters.
pub(crate) fn value_flow_function_default_parameter(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    logger: &mut dyn ErrorLogger,
    settings: &Settings,
) -> AnalysisResult<()> {
    if !list.is_cpp() {
        return Ok(());
    }
    for scope in symbols.function_scopes.clone() {
        let Some(func) = symbols.scopes[scope].function else {
            continue;
        };
        let (min_args, arg_count) = {
            let f = &symbols.functions[func];
            (f.min_args, f.arg_count())
        };
        for argnr in min_args..arg_count {
            let Some(argvar) = symbols.functions[func].argument_var(argnr) else {
                continue;
            };
            let name_token = symbols.variables[argvar].name_token;
            if !pat_match(list, Some(name_token), "%var% = %num%|%str%")? {
                continue;
            }
            let default_tok = list.tok_at(name_token, 2).expect("matched above");
            if !matches!(list.text_at(default_tok, 1), "," | ")") {
                continue;
            }
            let mut argvalues: Vec<Value> = Vec::new();
            for value in list.values(default_tok) {
                let mut v = value.clone();
                v.default_arg = true;
                v.change_known_to_possible();
                if v.is_possible() {
                    argvalues.push(v);
                }
            }
            if !argvalues.is_empty() {
                value_flow_inject_parameter(list, symbols, logger, settings, argvar, &argvalues)?;
            }
        }
    }
    Ok(())
}
