//! Check for error-prone zero initialization of unions.
//!
//! `union { char c; long long i; } u = {0};` zero-initializes only the
//! first member. When the largest member is not the first, the remaining
//! storage is not guaranteed to be zeroed, which is a portability trap.

use rustc_hash::FxHashMap;

use crate::error::AnalysisResult;
use crate::errorlogger::{ErrorLogger, ErrorMessage, FileLocation, Severity};
use crate::mathlib;
use crate::settings::Settings;
use crate::tokens::matcher::{pat_match, simple_match};
use crate::tokens::{Token, TokenList};
use crate::types::{self, BaseType};
use crate::Analysis;

use super::Check;

/// One union member with its computed size.
#[derive(Clone, Debug)]
struct UnionMember {
    name: String,
    size: u64,
}

/// The members of one union body, or `None` when a member's size is
/// unknown.
fn parse_union_members(
    list: &TokenList,
    settings: &Settings,
    open: Token,
) -> Option<Vec<UnionMember>> {
    let close = list.link(open)?;
    let mut members = Vec::new();
    let mut cur = list.next(open);
    while let Some(tok) = cur {
        if tok == close {
            break;
        }
        // Nested record member: `struct [name] { ... } sname ;`.
        if matches!(list.text(tok), "struct" | "union") {
            let is_union = list.text(tok) == "union";
            let mut body = list.next(tok)?;
            if list[body].is_name() {
                body = list.next(body)?;
            }
            if list.text(body) != "{" {
                return None;
            }
            let inner = parse_record_size(list, settings, body, is_union)?;
            let body_close = list.link(body)?;
            let name_tok = list.next(body_close)?;
            if !list[name_tok].is_name() {
                return None;
            }
            members.push(UnionMember {
                name: list.text(name_tok).to_string(),
                size: inner,
            });
            cur = list.next(name_tok).and_then(|t| {
                if list.text(t) == ";" {
                    list.next(t)
                } else {
                    Some(t)
                }
            });
            continue;
        }

        // Plain member: `type name [dims] ;` (bit-fields are rejected; a
        // union member with a width is unusual enough to skip).
        let (size, after) = parse_member(list, settings, tok)?;
        members.push(size);
        cur = Some(after);
    }
    Some(members)
}

/// Size of a nested struct/union body, summing (or maxing) member sizes.
/// Bit-fields accumulate bit counts. Alignment is not modelled; the
/// comparison against the first member only needs a lower bound.
fn parse_record_size(
    list: &TokenList,
    settings: &Settings,
    open: Token,
    is_union: bool,
) -> Option<u64> {
    let close = list.link(open)?;
    let mut total: u64 = 0;
    let mut bits: u64 = 0;
    let mut cur = list.next(open);
    while let Some(tok) = cur {
        if tok == close {
            break;
        }
        if matches!(list.text(tok), "struct" | "union") {
            let inner_union = list.text(tok) == "union";
            let mut body = list.next(tok)?;
            if list[body].is_name() {
                body = list.next(body)?;
            }
            if list.text(body) != "{" {
                return None;
            }
            let inner = parse_record_size(list, settings, body, inner_union)?;
            if is_union {
                total = total.max(inner);
            } else {
                total += inner;
            }
            let body_close = list.link(body)?;
            let mut t = list.next(body_close)?;
            if list[t].is_name() {
                t = list.next(t)?;
            }
            if list.text(t) == ";" {
                cur = list.next(t);
            } else {
                cur = Some(t);
            }
            continue;
        }
        // Bit-field declarator chains: `char a:3, b:1, c:1;`.
        if let Some((field_bits, after)) = parse_bitfields(list, tok) {
            bits += field_bits;
            cur = Some(after);
            continue;
        }
        let (member, after) = parse_member(list, settings, tok)?;
        if is_union {
            total = total.max(member.size);
        } else {
            total += member.size;
        }
        cur = Some(after);
    }
    Some(total + bits.div_ceil(8))
}

/// Parse a bit-field declarator chain starting at its type token. Returns
/// the total bits and the token after the terminating `;`.
fn parse_bitfields(list: &TokenList, tok: Token) -> Option<(u64, Token)> {
    // type name : width [, name : width]* ;
    let mut t = list.next(tok)?;
    if !list[t].is_name() || list.text_at(t, 1) != ":" {
        return None;
    }
    let mut bits: u64 = 0;
    loop {
        // t is the declarator name; expect `: width`.
        let width_tok = list.tok_at(t, 2)?;
        let width = mathlib::parse_int(list.text(width_tok))?;
        if width < 0 {
            return None;
        }
        bits += width as u64;
        let sep = list.tok_at(t, 3)?;
        match list.text(sep) {
            "," => t = list.next(sep)?,
            ";" => return Some((bits, list.next(sep)?)),
            _ => return None,
        }
    }
}

/// Parse one plain member declaration; returns the member and the token
/// after its `;`.
fn parse_member(
    list: &TokenList,
    settings: &Settings,
    tok: Token,
) -> Option<(UnionMember, Token)> {
    let ti = types::parse_decl(list, tok, settings);
    if matches!(ti.base, BaseType::Unknown | BaseType::Record) && ti.pointer == 0 {
        return None;
    }
    let elem_size = types::get_size_of(&ti, settings);
    if elem_size == 0 {
        return None;
    }
    // Find the declared name: the last name before `;`, `[` or `:`.
    let mut name_tok = None;
    let mut t = Some(tok);
    while let Some(s) = t {
        match list.text(s) {
            ";" | "[" | ":" => break,
            _ if list[s].is_name() && !list[s].is_keyword() => name_tok = Some(s),
            _ => {}
        }
        t = list.next(s);
    }
    let name_tok = name_tok?;
    let mut size = elem_size;
    let mut after = list.next(name_tok)?;
    // Array dimensions.
    while list.text(after) == "[" {
        let dim = list.next(after).and_then(|d| mathlib::parse_int(list.text(d)))?;
        if dim < 0 {
            return None;
        }
        size *= dim as u64;
        after = list.link(after).and_then(|c| list.next(c))?;
    }
    if list.text(after) == ":" {
        // A lone bit-field member; treat its storage as the base type.
        after = list.tok_at(after, 2)?;
    }
    if list.text(after) == ";" {
        after = list.next(after)?;
    }
    Some((
        UnionMember {
            name: list.text(name_tok).to_string(),
            size,
        },
        after,
    ))
}

fn report(
    list: &TokenList,
    logger: &mut dyn ErrorLogger,
    name_tok: Token,
    largest: &UnionMember,
) {
    let data = &list[name_tok];
    logger.report(ErrorMessage::new(
        FileLocation {
            file: list.file_name(data.file_index).to_string(),
            line: data.line,
            column: data.column,
            info: String::new(),
        },
        Severity::Portability,
        "UnionZeroInit",
        format!(
            "Zero initializing union '{}' does not guarantee its complete storage to be \
             zero initialized as its largest member is not declared as the first member. \
             Consider making {} the first member or favor memset().",
            list.text(name_tok),
            largest.name
        ),
    ));
}

/// Is the initializer after `name` a `= {0}` or `= {}`?
fn zero_initializer(list: &TokenList, name_tok: Token) -> AnalysisResult<bool> {
    Ok(pat_match(list, list.tok_at(name_tok, 1), "= { 0| }")?)
}

/// Does the member list make zero-init unsafe, and which member should be
/// first? Ties keep the earliest member.
fn unsafe_largest(members: &[UnionMember]) -> Option<&UnionMember> {
    let first = members.first()?;
    let mut largest = first;
    for m in members {
        if m.size > largest.size {
            largest = m;
        }
    }
    if largest.size > first.size {
        Some(largest)
    } else {
        None
    }
}

/// The union zero-init check.
pub struct CheckUnionZeroInit;

impl Check for CheckUnionZeroInit {
    fn name(&self) -> &'static str {
        "CheckUnionZeroInit"
    }

    fn run_checks(
        &self,
        analysis: &Analysis,
        settings: &Settings,
        logger: &mut dyn ErrorLogger,
    ) -> AnalysisResult<()> {
        let list = &analysis.tokens;
        // Named unions (and typedef'd anonymous unions) seen so far.
        let mut named: FxHashMap<String, Option<Vec<UnionMember>>> = FxHashMap::default();

        let mut cur = list.front();
        while let Some(tok) = cur {
            cur = list.next(tok);
            if list.text(tok) != "union" {
                continue;
            }
            let is_typedef = simple_match(list, list.prev(tok), "typedef");
            let mut body = match list.next(tok) {
                Some(t) => t,
                None => break,
            };
            let union_name = if list[body].is_name() {
                let name = list.text(body).to_string();
                body = match list.next(body) {
                    Some(t) => t,
                    None => break,
                };
                Some(name)
            } else {
                None
            };
            if list.text(body) != "{" {
                // A use of a previously declared union type:
                // `union name var = {0};`.
                if let (Some(name), Some(var_tok)) = (union_name.as_ref(), list.next(tok)) {
                    let var_tok = list.next(var_tok);
                    if let (Some(Some(members)), Some(var_tok)) =
                        (named.get(name.as_str()), var_tok)
                    {
                        if list[var_tok].is_name() && zero_initializer(list, var_tok)? {
                            if let Some(largest) = unsafe_largest(members) {
                                report(list, logger, var_tok, largest);
                            }
                        }
                    }
                }
                continue;
            }

            let members = parse_union_members(list, settings, body);
            let close = match list.link(body) {
                Some(c) => c,
                None => continue,
            };
            if let Some(name) = &union_name {
                named.insert(name.clone(), members.clone());
            }
            if is_typedef {
                if let Some(alias) = list.next(close).filter(|t| list[*t].is_name()) {
                    named.insert(list.text(alias).to_string(), members.clone());
                }
                cur = list.next(close);
                continue;
            }
            // Inline variable: `union [name] { ... } var = {0};`.
            if let Some(var_tok) = list.next(close).filter(|t| list[*t].is_name()) {
                if zero_initializer(list, var_tok)? {
                    if let Some(members) = &members {
                        if let Some(largest) = unsafe_largest(members) {
                            report(list, logger, var_tok, largest);
                        }
                    }
                }
            }
            cur = list.next(close);
        }

        // Uses of typedef'd names: `bad_union_1 bad2 = {0};`.
        let mut cur = list.front();
        while let Some(tok) = cur {
            cur = list.next(tok);
            if !list[tok].is_name() || list[tok].var_id != 0 {
                continue;
            }
            let Some(Some(members)) = named.get(list.text(tok)) else {
                continue;
            };
            // Skip the declaration/typedef occurrences themselves.
            if simple_match(list, list.prev(tok), "union")
                || simple_match(list, list.prev(tok), "}")
            {
                continue;
            }
            let Some(var_tok) = list.next(tok).filter(|t| {
                list[*t].is_name() && !list[*t].is_keyword()
            }) else {
                continue;
            };
            if zero_initializer(list, var_tok)? {
                if let Some(largest) = unsafe_largest(members) {
                    report(list, logger, var_tok, largest);
                }
            }
        }
        Ok(())
    }
}
