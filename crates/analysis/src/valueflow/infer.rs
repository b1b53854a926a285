//! Condition inference: turn accumulated facts into known results of the
//! conditions that consume them. `if (p)` after `p` was proven non-null
//! becomes a known-true condition; `x == 7` with a fact excluding 7
//! becomes known-false.

use crate::error::AnalysisResult;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::pat_match;
use crate::tokens::TokenList;
use crate::values::{Bound, Value, ValueType};

use super::settokenvalue::set_token_value;

/// Is `x` inside the range a value describes?
fn is_in_bounds(value: &Value, x: i64) -> bool {
    if value.int_value == x {
        return true;
    }
    if value.bound == Bound::Lower && value.int_value > x {
        return false;
    }
    if value.bound == Bound::Upper && value.int_value < x {
        return false;
    }
    if value.bound == Bound::Point && value.int_value != x {
        return false;
    }
    true
}

/// Find a fact proving the expression is never `x`: an impossibility whose
/// excluded range covers `x`, or a known point elsewhere.
fn prove_not_equal(values: &[Value], x: i64) -> Option<Value> {
    for value in values {
        if !value.is_int_value() {
            continue;
        }
        if value.is_impossible() {
            if is_in_bounds(value, x) {
                return Some(value.clone());
            }
        } else if value.is_known() && value.bound == Bound::Point && value.int_value != x {
            return Some(value.clone());
        }
    }
    None
}

/// Known point payload of the given value type, when present.
fn known_point(values: &[Value], value_type: ValueType) -> Option<i64> {
    values
        .iter()
        .find(|v| v.value_type == value_type && v.is_known() && v.bound == Bound::Point)
        .map(|v| v.int_value)
}

/// Derive known condition results from existing value sets.
pub(crate) fn value_flow_infer_condition(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = list.next(tok);
        if list.ast_parent(tok).is_none() {
            continue;
        }
        if list.has_known_value(tok) {
            continue;
        }

        let parent = list.ast_parent(tok).expect("checked above");
        let in_condition = pat_match(list, Some(parent), "?|&&|!|%oror%")?
            || pat_match(list, list.prev(parent), "if|while (")?;

        if list[tok].var_id > 0 && list.ast_op1(tok).is_none() && in_condition {
            let Some(result) = prove_not_equal(list.values(tok), 0) else {
                continue;
            };
            let mut value = result;
            value.int_value = 1;
            value.value_type = ValueType::Int;
            value.bound = Bound::Point;
            value.set_known();
            set_token_value(list, symbols, settings, tok, value)?;
        } else if pat_match(list, Some(tok), "==|!=")? && list.is_binary_op(tok) {
            let op1 = list.ast_op1(tok).expect("binary op");
            let op2 = list.ast_op2(tok).expect("binary op");

            // Iterator comparisons. The seeding tags every iterator yield
            // as an end iterator (see valueflow::container), so only
            // end-iterator points are looked up here.
            if let (Some(a), Some(b)) = (
                known_point(list.values(op1), ValueType::IteratorEnd),
                known_point(list.values(op2), ValueType::IteratorEnd),
            ) {
                let mut value = Value::new_int(i64::from(if list.text(tok) == "==" {
                    a == b
                } else {
                    a != b
                }));
                value.set_known();
                set_token_value(list, symbols, settings, tok, value)?;
                continue;
            }

            let (val, var_tok) = if let Some(v) = list.known_int_value(op1) {
                (v, op2)
            } else if let Some(v) = list.known_int_value(op2) {
                (v, op1)
            } else {
                continue;
            };
            if list.has_known_int_value(var_tok) {
                continue;
            }
            let Some(result) = prove_not_equal(list.values(var_tok), val) else {
                continue;
            };
            let mut value = result;
            value.int_value = i64::from(list.text(tok) == "!=");
            value.value_type = ValueType::Int;
            value.bound = Bound::Point;
            value.set_known();
            set_token_value(list, symbols, settings, tok, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::as_impossible;

    #[test]
    fn impossible_point_proves_not_equal() {
        let values = [as_impossible(Value::new_int(0))];
        assert!(prove_not_equal(&values, 0).is_some());
        assert!(prove_not_equal(&values, 1).is_none());
    }

    #[test]
    fn impossible_range_proves_not_equal() {
        // "never >= 10" proves != 12.
        let mut v = Value::new_int(10);
        v.bound = Bound::Lower;
        v.set_impossible();
        let values = [v];
        assert!(prove_not_equal(&values, 12).is_some());
        assert!(prove_not_equal(&values, 9).is_none());
    }

    #[test]
    fn known_point_proves_not_equal_elsewhere() {
        let values = [Value::known_int(10)];
        assert!(prove_not_equal(&values, 7).is_some());
        assert!(prove_not_equal(&values, 10).is_none());
    }
}
