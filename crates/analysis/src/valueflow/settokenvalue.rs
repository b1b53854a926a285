//! The single entry point through which every value-flow fact reaches a
//! token, and the upward constant folder that propagates facts through the
//! enclosing expression: arithmetic and comparison folding over the
//! cross-product of operand values, cast truncation, ternary demotion,
//! container-size lifting, uninit member tracking and short-circuit logic.

use crate::astutils::{
    ast_is_container, ast_is_integral, ast_is_iterator, ast_is_pointer, ast_is_unsigned,
    container_of, get_arguments, visit_ast_nodes, ChildrenToVisit,
};
use crate::error::AnalysisResult;
use crate::library::ContainerYield;
use crate::mathlib::{self, CalcError};
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::{pat_match, simple_match};
use crate::tokens::{Token, TokenKind, TokenList};
use crate::types::{self, BaseType, Sign, TypeInfo};
use crate::values::{combine_value_properties, Bound, Value, ValueType};

/// Width of the value payload in bytes.
const PAYLOAD_BYTES: u64 = 8;

/// Truncate `value` to `value_size` bytes with the destination signedness.
pub(crate) fn truncate_int_value(value: i64, value_size: u64, dst_sign: Sign) -> i64 {
    if value_size == 0 || value_size >= PAYLOAD_BYTES {
        return value;
    }
    let unsigned_max: u64 = u64::MAX >> ((PAYLOAD_BYTES - value_size) * 8);
    let sign_bit: u64 = 1u64 << (value_size * 8 - 1);
    let mut v = (value as u64) & unsigned_max;
    if dst_sign == Sign::Signed && (v & sign_bit) != 0 {
        v |= !unsigned_max;
    }
    v as i64
}

/// Cast a value to an integral type of `bit` bits with the given sign.
pub(crate) fn cast_value(mut value: Value, sign: Sign, bit: u32) -> Value {
    if value.is_float_value() {
        value.value_type = ValueType::Int;
        if value.float_value >= i32::MIN as f64 && value.float_value <= i32::MAX as f64 {
            value.int_value = value.float_value as i64;
        } else {
            // The conversion would be undefined; don't invent a result.
            value.int_value = 0;
        }
    }
    if bit < 64 {
        let mask = (1u64 << bit) - 1;
        let mut v = (value.int_value as u64) & mask;
        if sign == Sign::Signed && bit > 0 && (v & (1u64 << (bit - 1))) != 0 {
            v |= !mask;
        }
        value.int_value = v as i64;
    }
    value
}

/// Binary operators with mismatched signedness of different widths narrow
/// the payload to the wider operand; the pre-truncation value is kept in
/// `wide_int_value`.
fn truncate_implicit_conversion(
    list: &TokenList,
    parent: Option<Token>,
    value: Value,
    settings: &Settings,
) -> Value {
    if !value.is_int_value() && !value.is_float_value() {
        return value;
    }
    let Some(parent) = parent else { return value };
    if !list.is_binary_op(parent) || !list[parent].is_const_op() {
        return value;
    }
    let (Some(op1), Some(op2)) = (list.ast_op1(parent), list.ast_op2(parent)) else {
        return value;
    };
    if !ast_is_integral(list, op1, false) || !ast_is_integral(list, op2, false) {
        return value;
    }
    let (Some(t1), Some(t2)) = (list[op1].type_info.clone(), list[op2].type_info.clone()) else {
        return value;
    };
    if t1.sign == t2.sign {
        return value;
    }
    let n1 = types::get_size_of(&t1, settings);
    let n2 = types::get_size_of(&t2, settings);
    let sign = if n1 < n2 {
        t2.sign
    } else if n1 > n2 {
        t1.sign
    } else {
        Sign::Unsigned
    };
    let wide = value.int_value;
    let mut v = cast_value(value, sign, (n1.max(n2) * 8) as u32);
    v.wide_int_value = wide;
    v
}

/// The first type token of a cast applied by `parent`, if it is one.
fn cast_type_start(list: &TokenList, parent: Token) -> Option<Token> {
    if list[parent].is_cast() && list.text(parent) == "(" {
        return list.next(parent);
    }
    None
}

/// Rightmost name of a call's callee expression (`std :: size` → `size`).
fn callee_name(list: &TokenList, call: Token) -> Option<Token> {
    let mut t = list.ast_op1(call)?;
    while list.text(t) == "::" {
        t = list.ast_op2(t)?;
    }
    if list[t].is_name() {
        Some(t)
    } else {
        None
    }
}

/// Does the token's parent chain yield container information (`.size()`
/// or a `std::size`-style free function)? Returns the yield and the call
/// token to lift the value onto.
fn container_yield_parent(
    list: &TokenList,
    settings: &Settings,
    tok: Token,
    parent: Token,
) -> Option<(ContainerYield, Token)> {
    if list.text(parent) == "." && list.ast_op1(parent) == Some(tok) {
        let member = list.ast_op2(parent)?;
        let call = list.ast_parent(parent)?;
        if list.text(call) != "(" || list.ast_op1(call) != Some(parent) {
            return None;
        }
        let container = settings.library.container(container_of(list, tok)?)?;
        return Some((container.yields(list.text(member)), call));
    }
    if list.text(parent) == "(" && list.ast_op2(parent) == Some(tok) {
        let name = callee_name(list, parent)?;
        let info = settings.library.function(list.text(name))?;
        if info.container_yield != ContainerYield::NoYield {
            return Some((info.container_yield, parent));
        }
    }
    None
}

fn is_non_invertible_operation(list: &TokenList, tok: Token) -> bool {
    !matches!(list.text(tok), "+" | "-")
}

fn is_computable_value(list: &TokenList, parent: Token, value: &Value) -> bool {
    if is_non_invertible_operation(list, parent) && value.is_impossible() {
        return false;
    }
    if !value.is_int_value()
        && !value.is_float_value()
        && !value.is_tok_value()
        && !value.is_iterator_value()
    {
        return false;
    }
    if value.is_iterator_value() && !matches!(list.text(parent), "+" | "-") {
        return false;
    }
    if value.is_tok_value() {
        if !list[parent].is_comparison_op() {
            return false;
        }
        match value.tok_value {
            Some(tv) => {
                if !(list[tv].is_string() || list.text(tv) == "{") {
                    return false;
                }
            }
            None => return false,
        }
    }
    true
}

fn is_compatible_value_types(x: ValueType, y: ValueType) -> bool {
    if x == y {
        return true;
    }
    matches!(
        (x, y),
        (ValueType::Int, ValueType::Float)
            | (ValueType::Int, ValueType::Symbolic)
            | (ValueType::Int, ValueType::Tok)
            | (ValueType::Float, ValueType::Int)
            | (ValueType::Tok, ValueType::Int)
            | (ValueType::IteratorStart, ValueType::Int)
            | (ValueType::IteratorEnd, ValueType::Int)
    )
}

fn is_compatible_values(value1: &Value, value2: &Value) -> bool {
    if value1.is_symbolic_value()
        && value2.is_symbolic_value()
        && value1.tok_value != value2.tok_value
    {
        return false;
    }
    if !is_compatible_value_types(value1.value_type, value2.value_type) {
        return false;
    }
    if value1.is_known() || value2.is_known() {
        return true;
    }
    if value1.is_impossible() || value2.is_impossible() {
        return false;
    }
    if value1.var_id == 0 || value2.var_id == 0 {
        return true;
    }
    value1.var_id == value2.var_id
        && value1.var_value == value2.var_value
        && value1.is_int_value()
        && value2.is_int_value()
}

/// Number of characters of a string literal (stopping at an embedded
/// `\0`).
pub(crate) fn get_str_length(list: &TokenList, tok: Token) -> i64 {
    let text = list.text(tok);
    let inner = text
        .trim_start_matches(|c| matches!(c, 'u' | 'U' | 'L' | '8'))
        .trim_start_matches('"')
        .trim_end_matches('"');
    let mut len = 0i64;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('0') | None => break,
                Some(_) => {}
            }
        }
        len += 1;
    }
    len
}

/// Does the lifetime stay borrowed through `parent`? Assigning into a
/// plain integral kills the borrow.
fn is_lifetime_borrowed(list: &TokenList, parent: Token) -> bool {
    match &list[parent].type_info {
        Some(ti) => {
            ti.pointer > 0
                || ti.reference
                || matches!(
                    ti.base,
                    BaseType::Container | BaseType::Iterator | BaseType::Record | BaseType::Unknown
                )
        }
        None => true,
    }
}

/// Set a value on `tok` and fold it upward through the AST.
pub(crate) fn set_token_value(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
    mut value: Value,
) -> AnalysisResult<()> {
    // A negative value on an unsigned full-width expression is ambiguous.
    if !value.is_impossible()
        && value.is_int_value()
        && value.int_value < 0
        && ast_is_unsigned(list, tok)
    {
        if let Some(ti) = &list[tok].type_info {
            if types::get_size_of(ti, settings) >= PAYLOAD_BYTES {
                return Ok(());
            }
        }
    }

    if !value.is_impossible() && value.is_int_value() {
        value = truncate_implicit_conversion(list, list.ast_parent(tok), value, settings);
    }

    if !list.add_value(tok, value.clone()) {
        return Ok(());
    }

    if value.path < 0 {
        return Ok(());
    }

    let Some(parent) = list.ast_parent(tok) else {
        return Ok(());
    };

    // Comma: propagate through statement-like commas, not argument lists.
    if list.text(parent) == "," && !list[parent].is_init_comma() && list.ast_op2(parent) == Some(tok)
    {
        let mut call_parent = Some(parent);
        while let Some(p) = call_parent {
            if list.text(p) != "," {
                break;
            }
            call_parent = list.ast_parent(p);
        }
        let is_call = match call_parent {
            Some(p) => {
                list.text(p) == "("
                    || list.text(p) == "{"
                    || pat_match(list, list.prev(p), "%name%|>")?
            }
            None => false,
        };
        if !is_call {
            return set_token_value(list, symbols, settings, parent, value);
        }
    }

    if list.text(parent) == "=" && list.ast_op2(parent) == Some(tok) {
        set_token_value(list, symbols, settings, parent, value.clone())?;
        if !value.is_uninit_value() {
            return Ok(());
        }
    }

    if value.is_container_size_value() && ast_is_container(list, tok) {
        // `v + "abc"`, `v == v2` on containers fold size information.
        if matches!(list.text(parent), "+" | "==" | "!=") && list.is_binary_op(parent) {
            let op1 = list.ast_op1(parent).expect("binary op");
            let op2 = list.ast_op2(parent).expect("binary op");
            let values1 = list.values(op1).to_vec();
            let values2 = list.values(op2).to_vec();
            for value1 in &values1 {
                if value1.is_impossible() {
                    continue;
                }
                for value2 in &values2 {
                    if value2.is_impossible() {
                        continue;
                    }
                    if value1.path != value2.path {
                        continue;
                    }
                    let mut result = Value::default();
                    result.value_type = if list[parent].is_comparison_op() {
                        ValueType::Int
                    } else {
                        ValueType::ContainerSize
                    };
                    let str_len = |v: &Value| -> Option<i64> {
                        let t = v.tok_value?;
                        if list[t].is_string() {
                            Some(get_str_length(list, t))
                        } else {
                            None
                        }
                    };
                    let folded = if value1.is_container_size_value()
                        && value2.is_container_size_value()
                    {
                        mathlib::calculate_int(list.text(parent), value1.int_value, value2.int_value)
                    } else if value1.is_container_size_value() && value2.is_tok_value() {
                        match str_len(value2) {
                            Some(n) => {
                                mathlib::calculate_int(list.text(parent), value1.int_value, n)
                            }
                            None => continue,
                        }
                    } else if value2.is_container_size_value() && value1.is_tok_value() {
                        match str_len(value1) {
                            Some(n) => {
                                mathlib::calculate_int(list.text(parent), n, value2.int_value)
                            }
                            None => continue,
                        }
                    } else {
                        continue;
                    };
                    let Ok(folded) = folded else { continue };
                    result.int_value = folded;
                    combine_value_properties(value1, value2, &mut result);
                    if list.text(parent) == "==" && result.int_value != 0 {
                        continue;
                    }
                    if list.text(parent) == "!=" && result.int_value == 0 {
                        continue;
                    }
                    set_token_value(list, symbols, settings, parent, result)?;
                }
            }
        }
        if let Some((yields, call)) = container_yield_parent(list, settings, tok, parent) {
            match yields {
                ContainerYield::Size => {
                    let mut v = value.clone();
                    v.value_type = ValueType::Int;
                    set_token_value(list, symbols, settings, call, v)?;
                }
                ContainerYield::Empty => {
                    let mut v = value.clone();
                    v.value_type = ValueType::Int;
                    v.bound = Bound::Point;
                    if value.is_impossible() {
                        if value.int_value == 0 {
                            // Size is never 0: empty() is known to be 0.
                            v.set_known();
                        } else if (value.bound == Bound::Upper && value.int_value > 0)
                            || (value.bound == Bound::Lower && value.int_value < 0)
                        {
                            v.int_value = 0;
                            v.set_known();
                        } else {
                            v.set_possible();
                        }
                    } else {
                        v.int_value = i64::from(v.int_value == 0);
                    }
                    set_token_value(list, symbols, settings, call, v)?;
                }
                _ => {}
            }
        }
        return Ok(());
    }

    if value.is_lifetime_value() {
        if !is_lifetime_borrowed(list, parent) {
            return Ok(());
        }
        if value.lifetime_kind == crate::values::LifetimeKind::Iterator
            && ast_is_iterator(list, parent)
        {
            return set_token_value(list, symbols, settings, parent, value);
        }
        if ast_is_pointer(list, tok)
            && ast_is_pointer(list, parent)
            && !list.is_unary_op(parent, "*")
            && (list[parent].is_arithmetical_op() || list[parent].is_cast())
        {
            return set_token_value(list, symbols, settings, parent, value);
        }
        return Ok(());
    }

    if value.is_uninit_value() {
        if pat_match(list, Some(tok), ". %var%")? {
            if let Some(member) = list.tok_at(tok, 1) {
                set_token_value(list, symbols, settings, member, value.clone())?;
            }
        }
        if list[parent].is_cast() {
            return set_token_value(list, symbols, settings, parent, value);
        }
        let mut pvalue = value;
        if !pvalue.subexpressions.is_empty() && pat_match(list, Some(parent), ". %var%")? {
            let member_name = list.text_at(parent, 1).to_string();
            if pvalue.subexpressions.iter().any(|s| *s == member_name) {
                pvalue.subexpressions.clear();
            } else {
                return Ok(());
            }
        }
        if list.is_unary_op(parent, "&") {
            pvalue.indirect += 1;
            return set_token_value(list, symbols, settings, parent, pvalue);
        }
        if list.text(parent) == "."
            && list.ast_op1(parent) == Some(tok)
            && list.ast_op2(parent).is_some()
        {
            if list[parent].original_name() == "->" && pvalue.indirect > 0 {
                pvalue.indirect -= 1;
            }
            let member = list.ast_op2(parent).expect("checked above");
            return set_token_value(list, symbols, settings, member, pvalue);
        }
        if let Some(grandparent) = list.ast_parent(parent) {
            if list.text(grandparent) == "." && list.ast_op1(grandparent) == Some(parent) {
                if list[grandparent].original_name() == "->" && pvalue.indirect > 0 {
                    pvalue.indirect -= 1;
                }
                if let Some(member) = list.ast_op2(grandparent) {
                    return set_token_value(list, symbols, settings, member, pvalue);
                }
            }
        }
        if list.is_unary_op(parent, "*") && pvalue.indirect > 0 {
            pvalue.indirect -= 1;
            return set_token_value(list, symbols, settings, parent, pvalue);
        }
        return Ok(());
    }

    // Casts truncate per the destination type.
    if let Some(cast_type) = cast_type_start(list, parent) {
        let type_info = types::parse_decl(list, cast_type, settings);
        if value.is_impossible()
            && value.is_int_value()
            && value.int_value < 0
            && ast_is_unsigned(list, tok)
            && type_info.sign == Sign::Signed
        {
            if let Some(ti) = &list[tok].type_info {
                if types::get_size_of(ti, settings) >= types::get_size_of(&type_info, settings) {
                    return Ok(());
                }
            }
        }
        return set_token_value_cast(list, symbols, settings, parent, &type_info, value);
    }

    if list.text(parent) == ":" {
        return set_token_value(list, symbols, settings, parent, value);
    }

    // Ternary: value arrives from the ':' node.
    if list.text(parent) == "?" && list.text(tok) == ":" && list.ast_op2(parent) == Some(tok) {
        let Some(cond) = list.ast_op1(parent) else {
            return Ok(());
        };
        if list.has_known_int_value(cond) {
            let cond_value = list.known_int_value(cond).expect("known int");
            let chosen = if cond_value != 0 {
                list.ast_op1(tok)
            } else {
                list.ast_op2(tok)
            };
            let Some(op) = chosen else { return Ok(()) };
            if list.values(op).contains(&value) {
                return set_token_value(list, symbols, settings, parent, value);
            }
        } else if !value.is_impossible() {
            // Demote to a conditional possible value, unless the condition
            // depends on several variables or calls a function.
            let mut var_id = 0u32;
            let mut reject = false;
            visit_ast_nodes(list, Some(cond), &mut |t| {
                if list[t].var_id > 0 {
                    if var_id > 0 || value.var_id != 0 {
                        reject = true;
                    }
                    var_id = list[t].var_id;
                } else if list.text(t) == "("
                    && list.prev(t).is_some_and(|p| list[p].is_name())
                {
                    reject = true;
                }
                if reject {
                    ChildrenToVisit::Done
                } else {
                    ChildrenToVisit::Op1AndOp2
                }
            });
            if reject {
                return Ok(());
            }
            let mut v = value;
            v.conditional = true;
            v.change_known_to_possible();
            return set_token_value(list, symbols, settings, parent, v);
        }
        return Ok(());
    }

    // Known ternary condition: lift the chosen branch's values.
    if list.text(parent) == "?"
        && value.is_int_value()
        && list.ast_op1(parent) == Some(tok)
        && value.is_known()
    {
        if let Some(colon) = list.ast_op2(parent) {
            if let (Some(then_op), Some(else_op)) = (list.ast_op1(colon), list.ast_op2(colon)) {
                let source = if value.int_value == 0 { else_op } else { then_op };
                let branch_values = list.values(source).to_vec();
                for v in branch_values {
                    set_token_value(list, symbols, settings, parent, v)?;
                }
            }
        }
        return Ok(());
    }

    // A non-null pointer stays non-null under pointer arithmetic.
    if ast_is_pointer(list, tok)
        && matches!(list.text(parent), "+" | "-")
        && value.is_int_value()
        && value.is_impossible()
        && value.int_value == 0
        && list
            .ast_op2(parent)
            .map_or(true, |op2| !ast_is_pointer(list, op2))
    {
        return set_token_value(list, symbols, settings, parent, value);
    }

    // Calculations.
    if (list[parent].is_arithmetical_op()
        || list[parent].is_comparison_op()
        || list[parent].kind == TokenKind::BitOp
        || list[parent].kind == TokenKind::LogicalOp)
        && list.is_binary_op(parent)
    {
        let noninvertible = is_non_invertible_operation(list, parent);
        if noninvertible && value.is_impossible() {
            return Ok(());
        }

        // Known zero annihilates & and *.
        if matches!(list.text(parent), "&" | "*")
            && ast_is_integral(list, parent, true)
            && value.is_known()
            && value.is_int_value()
            && value.int_value == 0
        {
            return set_token_value(list, symbols, settings, parent, value);
        }
        // Short-circuit folding.
        if list.text(parent) == "&&"
            && value.is_known()
            && value.is_int_value()
            && value.int_value == 0
        {
            return set_token_value(list, symbols, settings, parent, value);
        }
        if list.text(parent) == "||"
            && value.is_known()
            && value.is_int_value()
            && value.int_value != 0
        {
            return set_token_value(list, symbols, settings, parent, value);
        }

        let op1 = list.ast_op1(parent).expect("binary op");
        let op2 = list.ast_op2(parent).expect("binary op");
        let values1 = list.values(op1).to_vec();
        let values2 = list.values(op2).to_vec();
        let parent_text = list.text(parent).to_string();
        let parent_is_float = crate::astutils::ast_is_float(list, parent, false);

        for value1 in &values1 {
            if !is_computable_value(list, parent, value1) {
                continue;
            }
            for value2 in &values2 {
                if value1.path != value2.path {
                    continue;
                }
                if !is_computable_value(list, parent, value2) {
                    continue;
                }
                if value1.is_iterator_value() && value2.is_iterator_value() {
                    continue;
                }
                if !is_compatible_values(value1, value2) {
                    continue;
                }
                let mut result = Value::new_int(0);
                combine_value_properties(value1, value2, &mut result);
                if parent_is_float {
                    if !result.is_int_value() && !result.is_float_value() {
                        continue;
                    }
                    result.value_type = ValueType::Float;
                }
                let float1 = if value1.is_float_value() {
                    value1.float_value
                } else {
                    value1.int_value as f64
                };
                let float2 = if value2.is_float_value() {
                    value2.float_value
                } else {
                    value2.int_value as f64
                };
                let int1 = if value1.is_float_value() {
                    value1.float_value as i64
                } else {
                    value1.int_value
                };
                let int2 = if value2.is_float_value() {
                    value2.float_value as i64
                } else {
                    value2.int_value
                };
                if (value1.is_float_value() || value2.is_float_value())
                    && matches!(
                        parent_text.as_str(),
                        "&" | "^" | "%" | "<<" | ">>" | "==" | "!=" | "|"
                    )
                {
                    continue;
                }
                if matches!(parent_text.as_str(), "==" | "!=") {
                    if (value1.is_int_value() && value2.is_tok_value())
                        || (value1.is_tok_value() && value2.is_int_value())
                    {
                        result.int_value = i64::from(parent_text == "!=");
                    } else if value1.is_int_value() && value2.is_int_value() {
                        match mathlib::calculate_int(&parent_text, int1, int2) {
                            Ok(v) => result.int_value = v,
                            Err(_) => continue,
                        }
                    } else if value1.is_tok_value() && value2.is_tok_value() {
                        let equal = match (value1.tok_value, value2.tok_value) {
                            (Some(a), Some(b))
                                if list[a].is_string() && list[b].is_string() =>
                            {
                                list.text(a) == list.text(b)
                            }
                            (Some(a), Some(b))
                                if list.text(a) == "{" && list.text(b) == "{" =>
                            {
                                let args1 = get_arguments(list, a);
                                let args2 = get_arguments(list, b);
                                if args1.len() != args2.len() {
                                    false
                                } else if args1
                                    .iter()
                                    .chain(args2.iter())
                                    .any(|t| !list.has_known_int_value(*t))
                                {
                                    continue;
                                } else {
                                    args1.iter().zip(args2.iter()).all(|(x, y)| {
                                        list.known_int_value(*x) == list.known_int_value(*y)
                                    })
                                }
                            }
                            _ => continue,
                        };
                        result.int_value = if parent_text == "==" {
                            i64::from(equal)
                        } else {
                            i64::from(!equal)
                        };
                    } else {
                        continue;
                    }
                    set_token_value(list, symbols, settings, parent, result)?;
                } else {
                    if list[parent].is_comparison_op() {
                        if !result.is_float_value()
                            && !value1.is_int_value()
                            && !value2.is_int_value()
                        {
                            continue;
                        }
                    } else if value1.is_tok_value() || value2.is_tok_value() {
                        break;
                    }
                    let calc: Result<(), CalcError> = if result.is_float_value() {
                        match mathlib::calculate_float(&parent_text, float1, float2) {
                            Ok(v) => {
                                result.float_value = v;
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    } else {
                        match mathlib::calculate_int(&parent_text, int1, int2) {
                            Ok(v) => {
                                result.int_value = v;
                                Ok(())
                            }
                            Err(e) => Err(e),
                        }
                    };
                    if calc.is_err() {
                        continue;
                    }
                    // Subtracting from a bound flips which end it is.
                    if parent_text == "-"
                        && value2.bound == result.bound
                        && value2.bound != Bound::Point
                    {
                        result.invert_bound();
                    }
                    set_token_value(list, symbols, settings, parent, result)?;
                }
            }
        }
        return Ok(());
    }

    // Logical negation.
    if list.text(parent) == "!" {
        let values = list.values(tok).to_vec();
        for val in values {
            if !val.is_int_value() {
                continue;
            }
            if val.is_impossible() && val.int_value != 0 {
                continue;
            }
            let mut v = val;
            if v.is_impossible() {
                // "never 0" negates to a known false.
                v.set_known();
            } else {
                v.int_value = i64::from(v.int_value == 0);
            }
            set_token_value(list, symbols, settings, parent, v)?;
        }
        return Ok(());
    }

    // Bitwise complement, masked to the declared width of unsigned types.
    if list.text(parent) == "~" {
        let values = list.values(tok).to_vec();
        for val in values {
            if !val.is_int_value() {
                continue;
            }
            let mut v = val;
            v.int_value = !v.int_value;
            let bits = match &list[tok].type_info {
                Some(ti)
                    if ti.sign == Sign::Unsigned && ti.pointer == 0 =>
                {
                    match ti.base {
                        BaseType::Int => settings.platform.int_bit,
                        BaseType::Long => settings.platform.long_bit,
                        _ => 0,
                    }
                }
                _ => 0,
            };
            if bits > 0 && bits < mathlib::BIGINT_BITS {
                v.int_value &= ((1u64 << bits) - 1) as i64;
            }
            set_token_value(list, symbols, settings, parent, v)?;
        }
        return Ok(());
    }

    // Unary minus.
    if list.is_unary_op(parent, "-") {
        let values = list.values(tok).to_vec();
        for val in values {
            if !val.is_int_value() && !val.is_float_value() {
                continue;
            }
            let mut v = val;
            if v.is_int_value() {
                if v.int_value == i64::MIN {
                    // Not invertible.
                    continue;
                }
                v.int_value = -v.int_value;
            } else {
                v.float_value = -v.float_value;
            }
            v.invert_bound();
            set_token_value(list, symbols, settings, parent, v)?;
        }
        return Ok(());
    }

    // Increment / decrement: the prefix form updates the payload, the
    // postfix form propagates the old value.
    if list[parent].is_inc_dec_op() {
        let increment = list.text(parent) == "++";
        let prefix = list.prev(tok) == Some(parent);
        let values = list.values(tok).to_vec();
        for val in values {
            if !val.is_int_value() && !val.is_float_value() && !val.is_symbolic_value() {
                continue;
            }
            let mut v = val;
            if prefix {
                if v.is_int_value() || v.is_symbolic_value() {
                    let delta = if increment { 1 } else { -1 };
                    let new_value = match &list[tok].type_info {
                        Some(ti) => truncate_int_value(
                            v.int_value.wrapping_add(delta),
                            types::get_size_of(ti, settings),
                            ti.sign,
                        ),
                        None => v.int_value.wrapping_add(delta),
                    };
                    if v.bound != Bound::Point {
                        let wrapped = if increment {
                            new_value < v.int_value
                        } else {
                            new_value > v.int_value
                        };
                        if wrapped {
                            v.invert_bound();
                        }
                    }
                    v.int_value = new_value;
                } else {
                    v.float_value += if increment { 1.0 } else { -1.0 };
                }
            }
            set_token_value(list, symbols, settings, parent, v)?;
        }
        return Ok(());
    }

    // Aggregate init with an integral or pointer left side.
    if list.text(parent) == "{" && simple_match(list, list.prev(parent), "= {") {
        if let Some(close) = list.link(parent) {
            if simple_match(list, Some(close), "} ;") {
                let lhs = list.prev(parent).and_then(|eq| list.ast_op1(eq));
                if let Some(lhs) = lhs {
                    if let Some(ti) = &list[lhs].type_info {
                        if ti.is_integral()
                            || ti.is_float()
                            || (ti.pointer > 0 && value.is_int_value())
                        {
                            return set_token_value(list, symbols, settings, parent, value);
                        }
                    }
                }
            }
        }
        return Ok(());
    }

    // Qualified name: the value of the right side is the value of the
    // whole.
    if list.text(parent) == "::" && list.ast_op2(parent) == Some(tok) {
        return set_token_value(list, symbols, settings, parent, value);
    }

    // `std::size` / `std::empty` on a brace-initialized array constant.
    if value.is_tok_value() {
        if let (Some(tv), Some(var)) = (
            value.tok_value,
            symbols.variable_by_id(list[tok].var_id),
        ) {
            if list.text(tv) == "{"
                && var.is_array
                && list.text(parent) == "("
                && list.ast_op2(parent) == Some(tok)
            {
                if let Some(name) = callee_name(list, parent) {
                    if let Some(info) = settings.library.function(list.text(name)) {
                        let args = get_arguments(list, tv);
                        match info.container_yield {
                            ContainerYield::Size => {
                                let mut v = value;
                                v.value_type = ValueType::Int;
                                v.int_value = args.len() as i64;
                                return set_token_value(list, symbols, settings, parent, v);
                            }
                            ContainerYield::Empty => {
                                let mut v = value;
                                v.value_type = ValueType::Int;
                                v.int_value = i64::from(args.is_empty());
                                return set_token_value(list, symbols, settings, parent, v);
                            }
                            _ => {}
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Cast-variant of the setter: truncate per the destination type before
/// storing on the cast token.
pub(crate) fn set_token_value_cast(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    parent: Token,
    type_info: &TypeInfo,
    value: Value,
) -> AnalysisResult<()> {
    let p = &settings.platform;
    if type_info.pointer > 0 || value.is_impossible() {
        return set_token_value(list, symbols, settings, parent, value);
    }
    let bits = match type_info.base {
        BaseType::Char => Some(p.char_bit),
        BaseType::Short => Some(p.short_bit),
        BaseType::Int => Some(p.int_bit),
        BaseType::Long => Some(p.long_bit),
        BaseType::LongLong => Some(p.long_long_bit),
        _ => None,
    };
    if let Some(bits) = bits {
        return set_token_value(
            list,
            symbols,
            settings,
            parent,
            cast_value(value, type_info.sign, bits),
        );
    }
    if type_info.is_float() && (value.is_int_value() || value.is_float_value()) {
        let mut v = value;
        if v.is_int_value() {
            v.float_value = v.int_value as f64;
        }
        v.value_type = ValueType::Float;
        return set_token_value(list, symbols, settings, parent, v);
    }
    if value.is_int_value() {
        let char_max = p.signed_char_max();
        let char_min = p.signed_char_min();
        if char_min <= value.int_value && value.int_value <= char_max {
            // Unknown destination type, but the value is small enough that
            // no truncation can occur.
            return set_token_value(list, symbols, settings, parent, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_to_char() {
        assert_eq!(truncate_int_value(0x1ff, 1, Sign::Unsigned), 0xff);
        assert_eq!(truncate_int_value(0xff, 1, Sign::Signed), -1);
        assert_eq!(truncate_int_value(42, 8, Sign::Signed), 42);
        assert_eq!(truncate_int_value(42, 0, Sign::Signed), 42);
    }

    #[test]
    fn cast_value_wraps() {
        let v = cast_value(Value::known_int(256), Sign::Unsigned, 8);
        assert_eq!(v.int_value, 0);
        let v = cast_value(Value::known_int(-1), Sign::Unsigned, 8);
        assert_eq!(v.int_value, 255);
        let v = cast_value(Value::known_int(128), Sign::Signed, 8);
        assert_eq!(v.int_value, -128);
    }

    #[test]
    fn cast_value_from_float() {
        let v = cast_value(Value::known_float(3.9), Sign::Signed, 32);
        assert!(v.is_int_value());
        assert_eq!(v.int_value, 3);
    }

    #[test]
    fn compatible_value_types() {
        assert!(is_compatible_value_types(ValueType::Int, ValueType::Float));
        assert!(is_compatible_value_types(ValueType::Tok, ValueType::Int));
        assert!(!is_compatible_value_types(
            ValueType::ContainerSize,
            ValueType::Int
        ));
    }
}
