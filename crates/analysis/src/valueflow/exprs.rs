//! Expression-level seeds: arrays used as booleans, constant array element
//! access, pointer aliases, power-of-two bit-ands, identical operands and
//! right-shift saturation.

use crate::astutils::{ast_is_bool, ast_is_container, ast_is_integral, is_same_expression};
use crate::error::AnalysisResult;
use crate::library::ContainerYield;
use crate::mathlib;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::pat_match;
use crate::tokens::{Token, TokenList};
use crate::types::BaseType;
use crate::values::{Value, ValueType};

use super::settokenvalue::set_token_value;

fn is_non_zero(list: &TokenList, tok: Option<Token>) -> bool {
    tok.is_some_and(|t| match list.known_int_value(t) {
        Some(v) => v != 0,
        None => true,
    })
}

fn other_operand(list: &TokenList, tok: Token) -> Option<Token> {
    let parent = list.ast_parent(tok)?;
    if list.ast_op1(parent) != Some(tok) {
        list.ast_op1(parent)
    } else if list.ast_op2(parent) != Some(tok) {
        list.ast_op2(parent)
    } else {
        None
    }
}

/// An array decays to a non-null pointer: in boolean context it is 1.
pub(crate) fn value_flow_array_bool(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.has_known_int_value(tok) {
            continue;
        }
        let (var, known) = {
            match list
                .values(tok)
                .iter()
                .find(|v| v.is_tok_value())
                .and_then(|v| v.tok_value)
            {
                Some(tv) => (symbols.variable_by_id(list[tv].var_id), {
                    list.values(tok)
                        .iter()
                        .find(|v| v.is_tok_value())
                        .is_some_and(|v| v.is_known())
                }),
                None => (symbols.variable_by_id(list[tok].var_id), true),
            }
        };
        let Some(var) = var else { continue };
        if !var.is_array || var.is_argument {
            continue;
        }
        if is_non_zero(list, other_operand(list, tok))
            && list
                .ast_parent(tok)
                .is_some_and(|p| list[p].is_comparison_op())
        {
            continue;
        }
        let parent = list.ast_parent(tok);
        let in_bool_context = match parent {
            Some(p) => {
                (ast_is_bool(list, p) && !pat_match(list, Some(p), "(|%name%")?)
                    || pat_match(list, list.prev(p), "if|while|for")?
            }
            None => false,
        };
        if in_bool_context {
            let mut value = Value::new_int(1);
            if known {
                value.set_known();
            }
            set_token_value(list, symbols, settings, tok, value)?;
        }
    }
    Ok(())
}

/// Fold `arr[i]` / `s[i]` when both the container constant and the index
/// are known.
pub(crate) fn value_flow_array_element(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.has_known_int_value(tok) {
            continue;
        }
        let (array_tok, index_tok) = if list.text(tok) == "[" && list.is_binary_op(tok) {
            (
                list.ast_op1(tok).expect("binary op"),
                list.ast_op2(tok).expect("binary op"),
            )
        } else if list.text(tok) == "(" {
            // `c.at(i)` on a non-associative container.
            let Some(dot) = list.ast_op1(tok).filter(|d| list.text(*d) == ".") else {
                continue;
            };
            let (Some(obj), Some(member)) = (list.ast_op1(dot), list.ast_op2(dot)) else {
                continue;
            };
            if !ast_is_container(list, obj) {
                continue;
            }
            let Some(container) = crate::astutils::container_of(list, obj)
                .and_then(|name| settings.library.container(name))
            else {
                continue;
            };
            if container.std_associative_like
                || container.yields(list.text(member)) != ContainerYield::AtIndex
            {
                continue;
            }
            let Some(index) = list.ast_op2(tok) else { continue };
            (obj, index)
        } else {
            continue;
        };

        let array_values = list.values(array_tok).to_vec();
        let index_values = list.values(index_tok).to_vec();
        for array_value in &array_values {
            if !array_value.is_tok_value() || array_value.is_impossible() {
                continue;
            }
            let Some(array_ref) = array_value.tok_value else {
                continue;
            };
            for index_value in &index_values {
                if !index_value.is_int_value() || index_value.is_impossible() {
                    continue;
                }
                if !array_value.is_known()
                    && !index_value.is_known()
                    && array_value.var_id != 0
                    && index_value.var_id != 0
                    && !(array_value.var_id == index_value.var_id
                        && array_value.var_value == index_value.var_value)
                {
                    continue;
                }

                let mut result = Value::new_int(0);
                result.condition = array_value.condition.or(index_value.condition);
                result.set_inconclusive(
                    array_value.is_inconclusive() || index_value.is_inconclusive(),
                );
                result.var_id = if array_value.var_id != 0 {
                    array_value.var_id
                } else {
                    index_value.var_id
                };
                result.var_value = if result.var_id == array_value.var_id {
                    array_value.int_value
                } else {
                    index_value.int_value
                };
                if array_value.kind == index_value.kind {
                    result.kind = array_value.kind;
                }
                result
                    .error_path
                    .extend(array_value.error_path.iter().cloned());
                result
                    .error_path
                    .extend(index_value.error_path.iter().cloned());

                let index = index_value.int_value;
                if list[array_ref].is_string() {
                    let chars: Vec<i64> = string_chars(list.text(array_ref));
                    if index == chars.len() as i64 {
                        result.int_value = 0;
                        set_token_value(list, symbols, settings, tok, result.clone())?;
                    } else if index >= 0 && (index as usize) < chars.len() {
                        result.int_value = chars[index as usize];
                        set_token_value(list, symbols, settings, tok, result.clone())?;
                    }
                } else if list.text(array_ref) == "{" {
                    let args = crate::astutils::get_arguments(list, array_ref);
                    if index < 0 || index as usize >= args.len() {
                        continue;
                    }
                    let arg = args[index as usize];
                    let Some(v) = list.known_int_value(arg) else {
                        continue;
                    };
                    result.int_value = v;
                    set_token_value(list, symbols, settings, tok, result.clone())?;
                }
            }
        }
    }
    Ok(())
}

fn string_chars(text: &str) -> Vec<i64> {
    let inner = text
        .trim_start_matches(|c| matches!(c, 'u' | 'U' | 'L' | '8'))
        .trim_start_matches('"')
        .trim_end_matches('"');
    let mut out = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push(10),
                Some('t') => out.push(9),
                Some('r') => out.push(13),
                Some('0') => break,
                Some(other) => out.push(other as i64),
                None => break,
            }
        } else {
            out.push(c as i64);
        }
    }
    out
}

/// `p = &buf;` style address-of assignments carry the referent.
pub(crate) fn value_flow_pointer_alias(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if !list.is_unary_op(tok, "&") {
            continue;
        }
        if !matches!(list.ast_parent(tok).map(|p| list.text(p)), Some("=")) {
            continue;
        }
        // The child should be a buffer or variable.
        let mut vartok = list.ast_op1(tok);
        while let Some(vt) = vartok {
            match list.text(vt) {
                "[" => vartok = list.ast_op1(vt),
                "." | "::" => vartok = list.ast_op2(vt),
                _ => break,
            }
        }
        let Some(vt) = vartok else { continue };
        let Some(var) = symbols.variable_by_id(list[vt].var_id) else {
            continue;
        };
        if var.is_pointer {
            continue;
        }
        let value = Value {
            value_type: ValueType::Tok,
            tok_value: Some(tok),
            ..Value::default()
        };
        set_token_value(list, symbols, settings, tok, value)?;
    }
    Ok(())
}

/// `x & 0x80` has the values 0 and 0x80 when the mask is a power of two.
pub(crate) fn value_flow_bit_and(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.text(tok) != "&" || list.has_known_value(tok) || !list.is_binary_op(tok) {
            continue;
        }
        let op1 = list.ast_op1(tok).expect("binary op");
        let op2 = list.ast_op2(tok).expect("binary op");
        let number = if mathlib::is_int(list.text(op1)) && list[op1].is_number() {
            mathlib::parse_int(list.text(op1))
        } else if mathlib::is_int(list.text(op2)) && list[op2].is_number() {
            mathlib::parse_int(list.text(op2))
        } else {
            None
        };
        let Some(number) = number else { continue };

        let mut bit = 0u32;
        while bit <= mathlib::BIGINT_BITS - 2 && (1i64 << bit) < number {
            bit += 1;
        }
        if (1i64 << bit) == number {
            set_token_value(list, symbols, settings, tok, Value::new_int(0))?;
            set_token_value(list, symbols, settings, tok, Value::new_int(number))?;
        }
    }
    Ok(())
}

/// `x == x`, `x - x`, `x <= x` and friends have a known result when the
/// operands are the same non-literal integral expression.
pub(crate) fn value_flow_same_expressions(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.has_known_int_value(tok) || !list.is_binary_op(tok) {
            continue;
        }
        let op1 = list.ast_op1(tok).expect("binary op");
        let op2 = list.ast_op2(tok).expect("binary op");
        if list[op1].is_literal() || list[op2].is_literal() {
            continue;
        }
        if !ast_is_integral(list, op1, false) && !ast_is_integral(list, op2, false) {
            continue;
        }
        let result = match list.text(tok) {
            "==" | ">=" | "<=" | "/" => 1,
            "!=" | ">" | "<" | "%" | "-" => 0,
            _ => continue,
        };
        if is_same_expression(list, op1, op2) {
            let mut value = Value::new_int(result);
            value.set_known();
            set_token_value(list, symbols, settings, tok, value)?;
        }
    }
    Ok(())
}

/// Conservative `[min, max]` range of an expression from known values,
/// masks and modulo.
pub(crate) fn get_expression_range(
    list: &TokenList,
    expr: Token,
) -> Option<(Option<i64>, Option<i64>)> {
    if let Some(v) = list.known_int_value(expr) {
        return Some((Some(v), Some(v)));
    }
    if list.text(expr) == "&" && list.is_binary_op(expr) {
        let r1 = get_expression_range(list, list.ast_op1(expr).expect("binary op"));
        let r2 = get_expression_range(list, list.ast_op2(expr).expect("binary op"));
        return match (r1, r2) {
            (None, None) => None,
            (Some(r), None) | (None, Some(r)) => Some(r),
            (Some((min1, max1)), Some((min2, max2))) => Some((
                min1.zip(min2).map(|(a, b)| a & b),
                max1.zip(max2).map(|(a, b)| a & b),
            )),
        };
    }
    if list.text(expr) == "%" && list.is_binary_op(expr) {
        let (_, max2) = get_expression_range(list, list.ast_op2(expr).expect("binary op"))?;
        let max2 = max2?;
        if max2 <= 0 {
            return None;
        }
        let lhs = list.ast_op1(expr).expect("binary op");
        match get_expression_range(list, lhs) {
            Some((Some(min1), _)) if min1 < 0 => return None,
            Some(_) => {}
            None => {
                // Unknown lhs must be unsigned for the result to be bounded.
                let unsigned = list[lhs]
                    .type_info
                    .as_ref()
                    .is_some_and(|ti| ti.sign == crate::types::Sign::Unsigned);
                if !unsigned {
                    return None;
                }
            }
        }
        return Some((Some(0), Some(max2 - 1)));
    }
    None
}

/// `x >> y` saturates to zero when the left side cannot reach the shifted
/// range.
pub(crate) fn value_flow_right_shift(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.text(tok) != ">>" || list.has_known_value(tok) || !list.is_binary_op(tok) {
            continue;
        }
        let op1 = list.ast_op1(tok).expect("binary op");
        let op2 = list.ast_op2(tok).expect("binary op");
        let Some(rhs_value) = list.known_int_value(op2) else {
            continue;
        };
        if rhs_value < 0 {
            continue;
        }
        if !ast_is_integral(list, op1, false) || !ast_is_integral(list, op2, false) {
            continue;
        }
        let Some((_, Some(lhs_max))) = get_expression_range(list, op1) else {
            continue;
        };
        if lhs_max < 0 {
            continue;
        }
        let lhs_bits = match list[op1].type_info.as_ref().map(|ti| ti.base) {
            Some(BaseType::Bool | BaseType::Char | BaseType::Short | BaseType::WcharT | BaseType::Int) => {
                settings.platform.int_bit
            }
            Some(BaseType::Long) => settings.platform.long_bit,
            Some(BaseType::LongLong) => settings.platform.long_long_bit,
            _ => continue,
        };
        if rhs_value >= i64::from(lhs_bits)
            || rhs_value >= i64::from(mathlib::BIGINT_BITS)
            || (1i64 << rhs_value) <= lhs_max
        {
            continue;
        }
        let mut value = Value::new_int(0);
        value.set_known();
        set_token_value(list, symbols, settings, tok, value)?;
    }
    Ok(())
}
