//! Constant seeding: literals, enumerators, `sizeof`, default
//! initialization, and const/static globals. Runs once before the
//! fixed-point loop.

use crate::error::AnalysisResult;
use crate::mathlib;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::{pat_match, simple_match};
use crate::tokens::{Token, TokenFlags, TokenList};
use crate::types::{self, Sign};
use crate::values::{Value, ValueType};

use super::settokenvalue::set_token_value;

/// Character count of a string literal array including the terminator and
/// honouring escapes.
fn get_str_array_size(list: &TokenList, tok: Token) -> i64 {
    let text = list.text(tok);
    let inner = text
        .trim_start_matches(|c| matches!(c, 'u' | 'U' | 'L' | '8'))
        .trim_start_matches('"')
        .trim_end_matches('"');
    let mut size = 1i64;
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            chars.next();
        }
        size += 1;
    }
    size
}

/// Byte size of a string literal object.
fn get_str_size(list: &TokenList, settings: &Settings, tok: Token) -> i64 {
    let flags = list[tok].flags;
    let elem: i64 = if flags.contains(TokenFlags::UTF16) {
        2
    } else if flags.contains(TokenFlags::UTF32) {
        4
    } else if flags.contains(TokenFlags::LONG) {
        i64::from(settings.platform.sizeof_wchar_t)
    } else {
        1
    };
    get_str_array_size(list, tok) * elem
}

fn char_literal_size(list: &TokenList, settings: &Settings, tok: Token) -> i64 {
    let flags = list[tok].flags;
    if flags.contains(TokenFlags::UTF8) {
        1
    } else if flags.contains(TokenFlags::UTF16) {
        2
    } else if flags.contains(TokenFlags::UTF32) {
        4
    } else if flags.contains(TokenFlags::LONG) {
        i64::from(settings.platform.sizeof_wchar_t)
    } else if !list.is_cpp() {
        // A C character constant has type int.
        i64::from(settings.platform.sizeof_int)
    } else {
        1
    }
}

/// Handle one token's constant seeding; returns the next token to visit.
fn set_constant_value(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
) -> AnalysisResult<Option<Token>> {
    let data = &list[tok];
    let is_template_arg = data.is_template_arg();

    if (data.is_number() && mathlib::is_int(&data.text)) || data.is_char() {
        let parsed = if data.is_char() {
            mathlib::char_literal_value(&data.text)
        } else {
            mathlib::parse_int(&data.text)
        };
        if let Some(mut signed_value) = parsed {
            if let Some(ti) = &list[tok].type_info {
                if ti.sign == Sign::Unsigned
                    && signed_value < 0
                    && types::get_size_of(ti, settings) < 8
                {
                    if let Some((_, max)) = types::min_max_values(ti, &settings.platform) {
                        signed_value = signed_value.wrapping_add(max.wrapping_add(1));
                    }
                }
            }
            let mut value = Value::new_int(signed_value);
            if !is_template_arg {
                value.set_known();
            }
            set_token_value(list, symbols, settings, tok, value)?;
        }
        return Ok(list.next(tok));
    }

    if data.is_number() && mathlib::is_float(&data.text) {
        if let Some(f) = mathlib::parse_float(&data.text) {
            let mut value = Value {
                value_type: ValueType::Float,
                float_value: f,
                ..Value::default()
            };
            if !is_template_arg {
                value.set_known();
            }
            set_token_value(list, symbols, settings, tok, value)?;
        }
        return Ok(list.next(tok));
    }

    if let Some(e) = data.enumerator.expand() {
        let enumerator = &symbols.enumerators[e];
        if enumerator.value_known && enumerator.name_token != tok {
            let mut value = Value::new_int(enumerator.value);
            if !is_template_arg {
                value.set_known();
            }
            set_token_value(list, symbols, settings, tok, value)?;
        }
        return Ok(list.next(tok));
    }

    if data.text == "NULL" || (list.is_cpp() && data.text == "nullptr") {
        let mut value = Value::new_int(0);
        if !is_template_arg {
            value.set_known();
        }
        set_token_value(list, symbols, settings, tok, value)?;
        return Ok(list.next(tok));
    }

    if simple_match(list, Some(tok), "sizeof (") {
        let open = list.tok_at(tok, 1).expect("matched above");
        let close = list.link(open);
        seed_sizeof(list, symbols, settings, tok, open)?;
        return Ok(close.or_else(|| list.next(tok)));
    }

    // Default initialization: `T x{}` / `T x()` of integral or pointer.
    if pat_match(list, Some(tok), "%name% {|( }|)")? {
        let is_defaulted = data.is_standard_type()
            || symbols
                .variable_by_id(data.var_id)
                .is_some_and(|var| {
                    var.name_token == tok
                        && (var.is_pointer || var.type_info.is_integral())
                });
        if is_defaulted {
            let open = list.tok_at(tok, 1).expect("matched above");
            let mut value = Value::new_int(0);
            if !is_template_arg {
                value.set_known();
            }
            set_token_value(list, symbols, settings, open, value)?;
        }
        return Ok(list.next(tok));
    }

    // `= { } ;` zero-initializes integrals and pointers.
    if simple_match(list, Some(tok), "= { } ;") {
        if let Some(lhs) = list.ast_op1(tok) {
            let zeroed = list[lhs]
                .type_info
                .as_ref()
                .is_some_and(|ti| ti.is_integral() || ti.pointer > 0);
            if zeroed {
                let open = list.tok_at(tok, 1).expect("matched above");
                let mut value = Value::new_int(0);
                value.set_known();
                set_token_value(list, symbols, settings, open, value)?;
            }
        }
        return Ok(list.next(tok));
    }

    Ok(list.next(tok))
}

fn seed_sizeof(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    sizeof_tok: Token,
    open: Token,
) -> AnalysisResult<()> {
    let platform_known =
        settings.platform.platform_type != crate::platform::PlatformType::Unspecified;

    // `sizeof ( * p )`.
    if simple_match(list, Some(sizeof_tok), "sizeof ( *") {
        let star = list.tok_at(sizeof_tok, 2).expect("matched above");
        if let Some(operand) = list.tok_at(star, 1) {
            if let Some(ti) = &list[operand].type_info {
                let mut pointee = ti.clone();
                if pointee.pointer > 0 {
                    pointee.pointer -= 1;
                }
                let sz = types::get_size_of(&pointee, settings);
                if sz > 0 {
                    let mut value = Value::new_int(sz as i64);
                    if platform_known {
                        value.set_known();
                    }
                    set_token_value(list, symbols, settings, open, value)?;
                }
            }
        }
        return Ok(());
    }

    let Some(inner) = list.tok_at(open, 1) else {
        return Ok(());
    };

    // `sizeof ( var )`: objects and whole arrays.
    if pat_match(list, Some(inner), "%var% )")? {
        if let Some(var) = symbols.variable_by_id(list[inner].var_id) {
            let elem_size = types::get_size_of(&var.type_info, settings);
            let mut count: i64 = 1;
            for i in 0..var.dimensions.len() {
                if var.dimension_known(i) {
                    count *= var.dimension(i);
                } else {
                    count = 0;
                }
            }
            let total = if var.is_array {
                elem_size as i64 * count
            } else if var.is_pointer {
                i64::from(settings.platform.sizeof_pointer)
            } else {
                elem_size as i64
            };
            if total > 0 {
                let mut value = Value::new_int(total);
                if platform_known {
                    value.set_known();
                }
                set_token_value(list, symbols, settings, sizeof_tok, value.clone())?;
                set_token_value(list, symbols, settings, open, value)?;
            }
        }
        return Ok(());
    }

    // `sizeof ( "literal" )`.
    if list[inner].is_string() {
        let sz = get_str_size(list, settings, inner);
        if sz > 0 {
            let mut value = Value::new_int(sz);
            value.set_known();
            set_token_value(list, symbols, settings, open, value)?;
        }
        return Ok(());
    }

    // `sizeof ( 'c' )`.
    if list[inner].is_char() {
        let sz = char_literal_size(list, settings, inner);
        if sz > 0 {
            let mut value = Value::new_int(sz);
            value.set_known();
            set_token_value(list, symbols, settings, open, value)?;
        }
        return Ok(());
    }

    // `sizeof ( type )`.
    let ti = types::parse_decl(list, inner, settings);
    let sz = types::get_size_of(&ti, settings);
    if sz > 0 {
        let mut value = Value::new_int(sz as i64);
        if platform_known && !list[inner].is_template_arg() {
            value.set_known();
        }
        set_token_value(list, symbols, settings, open, value)?;
    }
    Ok(())
}

/// Fold the constant at one token (used by the standalone constant
/// folder).
pub(crate) fn fold_constant_at(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
) -> AnalysisResult<()> {
    set_constant_value(list, symbols, settings, tok)?;
    Ok(())
}

/// Literal, enumerator, bool, NULL and `sizeof` seeding over the whole
/// list.
pub(crate) fn value_flow_number(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        cur = set_constant_value(list, symbols, settings, tok)?;
    }

    if list.is_cpp() {
        let mut cur = list.front();
        while let Some(tok) = cur {
            if list[tok].is_boolean() {
                let mut value = Value::new_int(i64::from(list.text(tok) == "true"));
                if !list[tok].is_template_arg() {
                    value.set_known();
                }
                set_token_value(list, symbols, settings, tok, value)?;
            }
            cur = list.next(tok);
        }
    }
    Ok(())
}

/// String literals carry themselves as a known token value.
pub(crate) fn value_flow_string(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list[tok].is_string() {
            let mut value = Value {
                value_type: ValueType::Tok,
                tok_value: Some(tok),
                ..Value::default()
            };
            value.set_known();
            set_token_value(list, symbols, settings, tok, value)?;
        }
        cur = list.next(tok);
    }
    Ok(())
}

/// Constant arrays: uses of `const T arr[] = { ... }` and pointers
/// assigned whole arrays carry the initializer as a token value.
pub(crate) fn value_flow_array(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut constant_arrays: rustc_hash::FxHashMap<u32, Token> = rustc_hash::FxHashMap::default();
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list[tok].var_id > 0 {
            if let Some(&init) = constant_arrays.get(&list[tok].var_id) {
                let var = symbols.variable_by_id(list[tok].var_id);
                if var.is_some_and(|v| v.name_token != tok) {
                    let mut value = Value {
                        value_type: ValueType::Tok,
                        tok_value: Some(init),
                        ..Value::default()
                    };
                    value.set_known();
                    set_token_value(list, symbols, settings, tok, value)?;
                }
            } else if let Some(var) = symbols.variable_by_id(list[tok].var_id) {
                if var.is_array && var.is_const && var.name_token == tok {
                    // Find the `{` of the initializer.
                    let mut t = list.next(tok);
                    while let Some(s) = t {
                        match list.text(s) {
                            "[" => {
                                t = list.link(s).and_then(|l| list.next(l));
                                continue;
                            }
                            "=" => {
                                if let Some(open) = list.tok_at(s, 1) {
                                    if list.text(open) == "{" {
                                        constant_arrays.insert(list[tok].var_id, open);
                                    }
                                }
                                break;
                            }
                            _ => break,
                        }
                    }
                } else if var.is_array
                    && !var.is_const
                    && var.name_token != tok
                    && simple_match(list, list.ast_parent(tok), "=")
                    && list.ast_is_rhs(tok)
                {
                    // `pointer = array`.
                    let lhs_is_pointer = list
                        .ast_parent(tok)
                        .and_then(|eq| list.ast_op1(eq))
                        .and_then(|lhs| symbols.variable_by_id(list[lhs].var_id))
                        .is_some_and(|v| v.is_pointer);
                    if lhs_is_pointer {
                        let mut value = Value {
                            value_type: ValueType::Tok,
                            tok_value: Some(tok),
                            ..Value::default()
                        };
                        value.set_known();
                        set_token_value(list, symbols, settings, tok, value)?;
                    }
                }
            }
        }
        cur = list.next(tok);
    }
    Ok(())
}

/// `const T x = N;` globals: every use carries the known value, unless the
/// variable is volatile or an argument.
pub(crate) fn value_flow_global_const_var(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut vars: rustc_hash::FxHashMap<u32, Value> = rustc_hash::FxHashMap::default();
    let mut cur = list.front();
    while let Some(tok) = cur {
        if let Some(var) = symbols.variable_by_id(list[tok].var_id) {
            if var.name_token == tok
                && !var.is_volatile
                && !var.is_argument
                && var.is_const
                && var.type_info.is_integral()
                && !var.is_pointer
                && list.text_at(tok, 1) == "="
            {
                if let Some(eq) = list.tok_at(tok, 1) {
                    if let Some(rhs) = list.ast_op2(eq) {
                        if let Some(v) = list.known_int_value(rhs) {
                            vars.insert(list[tok].var_id, Value::known_int(v));
                        }
                    }
                }
            }
        }
        cur = list.next(tok);
    }

    let mut cur = list.front();
    while let Some(tok) = cur {
        if let Some(value) = vars.get(&list[tok].var_id).cloned() {
            set_token_value(list, symbols, settings, tok, value)?;
        }
        cur = list.next(tok);
    }
    Ok(())
}

/// `static T x = N;` globals, invalidated by any observed write in the
/// translation unit.
pub(crate) fn value_flow_global_static_var(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    let mut vars: rustc_hash::FxHashMap<u32, Value> = rustc_hash::FxHashMap::default();
    let mut cur = list.front();
    while let Some(tok) = cur {
        let var_id = list[tok].var_id;
        if let Some(var) = symbols.variable_by_id(var_id) {
            if var.name_token == tok
                && var.is_static
                && !var.is_const
                && var.type_info.is_integral()
                && !var.is_pointer
                && list.text_at(tok, 1) == "="
            {
                if let Some(eq) = list.tok_at(tok, 1) {
                    if let Some(rhs) = list.ast_op2(eq) {
                        if let Some(v) = list.known_int_value(rhs) {
                            vars.insert(var_id, Value::known_int(v));
                        }
                    }
                }
            } else if var_id > 0 {
                // Any other write invalidates the seed.
                if let Some(parent) = list.ast_parent(tok) {
                    let written = (list[parent].is_inc_dec_op())
                        || (list.is_unary_op(parent, "&"))
                        || (list[parent].is_assignment_op()
                            && list.ast_op1(parent) == Some(tok))
                        || crate::astutils::is_likely_stream_read(list, parent)
                        || matches!(list.text(parent), "(" | ",");
                    if written {
                        vars.remove(&var_id);
                    }
                }
            }
        }
        cur = list.next(tok);
    }

    let mut cur = list.front();
    while let Some(tok) = cur {
        if let Some(var) = symbols.variable_by_id(list[tok].var_id) {
            if var.name_token != tok {
                if let Some(value) = vars.get(&list[tok].var_id).cloned() {
                    set_token_value(list, symbols, settings, tok, value)?;
                }
            }
        }
        cur = list.next(tok);
    }
    Ok(())
}
