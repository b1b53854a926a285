//! Expression AST construction.
//!
//! Builds the AST overlay over the linked token chain, one statement at a
//! time, with a precedence-climbing parser. The resulting shapes are the
//! ones the value-flow walkers pattern-match against:
//!
//! * control headers: the `(` after `if`/`while`/`switch` carries the
//!   condition as its second operand; a `for` header chains its three parts
//!   through the two `;` tokens,
//! * calls: `(` with the callee as first operand and the (comma-chained)
//!   arguments as second,
//! * casts: a `(` flagged as cast with the casted expression as its single
//!   operand,
//! * ternary: `?` holds the condition and a `:` node with both branches.
//!
//! `->` is simplified to `.` (keeping the original spelling) before
//! parsing, expression types are computed bottom-up afterwards, and every
//! distinct expression gets an expression id.

use rustc_hash::FxHashMap;

use crate::error::{AnalysisError, AnalysisResult};
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::{Token, TokenFlags, TokenKind, TokenList};
use crate::types::{self, BaseType, Sign, TypeInfo};

/// Binding powers, higher binds tighter.
const BP_COMMA: u8 = 1;
const BP_ASSIGN: u8 = 2;
const BP_TERNARY: u8 = 3;
const BP_OROR: u8 = 4;
const BP_ANDAND: u8 = 5;
const BP_BITOR: u8 = 6;
const BP_BITXOR: u8 = 7;
const BP_BITAND: u8 = 8;
const BP_EQUALITY: u8 = 9;
const BP_RELATIONAL: u8 = 10;
const BP_SHIFT: u8 = 11;
const BP_ADDITIVE: u8 = 12;
const BP_MULTIPLICATIVE: u8 = 13;

fn binary_bp(op: &str) -> Option<u8> {
    Some(match op {
        "," => BP_COMMA,
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => BP_ASSIGN,
        "?" => BP_TERNARY,
        "||" => BP_OROR,
        "&&" => BP_ANDAND,
        "|" => BP_BITOR,
        "^" => BP_BITXOR,
        "&" => BP_BITAND,
        "==" | "!=" => BP_EQUALITY,
        "<" | ">" | "<=" | ">=" => BP_RELATIONAL,
        "<<" | ">>" => BP_SHIFT,
        "+" | "-" => BP_ADDITIVE,
        "*" | "/" | "%" => BP_MULTIPLICATIVE,
        _ => return None,
    })
}

struct Parser<'a> {
    list: &'a mut TokenList,
    settings: &'a Settings,
    cur: Option<Token>,
    /// Hard end of the current parse region (exclusive).
    end: Option<Token>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        match self.cur {
            Some(t) if self.end == Some(t) => None,
            other => other,
        }
    }

    fn peek_text(&self) -> &str {
        self.peek().map_or("", |t| self.list.text(t))
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.peek()?;
        self.cur = self.list.next(t);
        Some(t)
    }

    fn expect(&mut self, text: &str) -> AnalysisResult<Token> {
        match self.peek() {
            Some(t) if self.list.text(t) == text => {
                self.advance();
                Ok(t)
            }
            Some(t) => Err(AnalysisError::internal_at(
                self.list.location(t),
                format!("expected '{}', found '{}'", text, self.list.text(t)),
            )),
            None => Err(AnalysisError::internal(format!(
                "expected '{text}' before end of region"
            ))),
        }
    }

    /// Parse one expression with the given minimum binding power; returns
    /// the AST root, or `None` for an empty region.
    fn expression(&mut self, min_bp: u8) -> AnalysisResult<Option<Token>> {
        let Some(mut lhs) = self.unary()? else {
            return Ok(None);
        };
        loop {
            let Some(op) = self.peek() else { break };
            let text = self.list.text(op).to_string();
            let Some(bp) = binary_bp(&text) else { break };
            if bp < min_bp {
                break;
            }
            // `&` and `*` after an operator would have been consumed as
            // unary; here they are binary.
            self.advance();
            if text == "?" {
                let then_expr = self.expression(BP_ASSIGN)?;
                let colon = self.expect(":")?;
                let else_expr = self.expression(BP_ASSIGN)?;
                self.list.set_ast_op1(colon, then_expr)?;
                self.list.set_ast_op2(colon, else_expr)?;
                self.list.set_ast_op1(op, Some(lhs))?;
                self.list.set_ast_op2(op, Some(colon))?;
                lhs = op;
                continue;
            }
            // Right associativity for assignments; everything else left.
            let next_bp = if bp == BP_ASSIGN { bp } else { bp + 1 };
            let rhs = self.expression(next_bp)?;
            self.list.set_ast_op1(op, Some(lhs))?;
            self.list.set_ast_op2(op, rhs)?;
            lhs = op;
        }
        Ok(Some(lhs))
    }

    fn unary(&mut self) -> AnalysisResult<Option<Token>> {
        let Some(tok) = self.peek() else {
            return Ok(None);
        };
        let text = self.list.text(tok).to_string();
        match text.as_str() {
            "!" | "~" | "-" | "+" | "*" | "&" | "++" | "--" => {
                self.advance();
                let operand = self.unary()?;
                self.list.set_ast_op1(tok, operand)?;
                return Ok(Some(tok));
            }
            "sizeof" | "typeof" | "typeid" => {
                self.advance();
                if self.peek_text() == "(" {
                    let open = self.advance().expect("peeked above");
                    let close = self.list.link(open);
                    let saved_end = self.end;
                    self.end = close;
                    let inner = self.expression(0).unwrap_or(None);
                    self.end = saved_end;
                    self.cur = close.and_then(|c| self.list.next(c));
                    self.list.set_ast_op1(open, Some(tok))?;
                    self.list.set_ast_op2(open, inner)?;
                    return self.postfix(open);
                }
                return Ok(Some(tok));
            }
            "(" => {
                if self.is_cast(tok) {
                    self.advance();
                    let close = self.list.link(tok);
                    self.cur = close.and_then(|c| self.list.next(c));
                    self.list[tok].flags |= TokenFlags::CAST;
                    let operand = self.unary()?;
                    self.list.set_ast_op1(tok, operand)?;
                    return Ok(Some(tok));
                }
                // Grouping parentheses are transparent.
                self.advance();
                let close = self.list.link(tok);
                let saved_end = self.end;
                self.end = close;
                let inner = self.expression(0)?;
                self.end = saved_end;
                self.cur = close.and_then(|c| self.list.next(c));
                match inner {
                    Some(inner) => return self.postfix(inner),
                    None => return Ok(None),
                }
            }
            "{" => {
                // Brace initializer in expression position.
                self.advance();
                let close = self.list.link(tok);
                let saved_end = self.end;
                self.end = close;
                let inner = self.expression(0)?;
                self.end = saved_end;
                self.cur = close.and_then(|c| self.list.next(c));
                self.list.set_ast_op2(tok, inner)?;
                // Commas between initializer entries are separators, not
                // sequencing operators.
                let mut comma = inner;
                while let Some(c) = comma {
                    if self.list.text(c) != "," {
                        break;
                    }
                    self.list[c].flags |= TokenFlags::INIT_COMMA;
                    comma = self.list.ast_op1(c);
                }
                return Ok(Some(tok));
            }
            _ => {}
        }
        let data = &self.list[tok];
        if data.is_name() || data.is_literal() || text == "::" {
            self.advance();
            // Qualified names: `std :: move`, `a :: b`.
            let mut node = tok;
            while self.peek_text() == "::" {
                let qual = self.advance().expect("peeked above");
                let Some(rhs) = self.peek() else { break };
                if !self.list[rhs].is_name() {
                    break;
                }
                self.advance();
                self.list.set_ast_op1(qual, Some(node))?;
                self.list.set_ast_op2(qual, Some(rhs))?;
                node = qual;
            }
            return self.postfix(node);
        }
        Ok(None)
    }

    fn postfix(&mut self, mut node: Token) -> AnalysisResult<Option<Token>> {
        loop {
            let Some(tok) = self.peek() else { break };
            match self.list.text(tok) {
                "(" => {
                    self.advance();
                    let close = self.list.link(tok);
                    let saved_end = self.end;
                    self.end = close;
                    let args = self.expression(0)?;
                    self.end = saved_end;
                    self.cur = close.and_then(|c| self.list.next(c));
                    self.list.set_ast_op1(tok, Some(node))?;
                    self.list.set_ast_op2(tok, args)?;
                    node = tok;
                }
                "[" => {
                    self.advance();
                    let close = self.list.link(tok);
                    let saved_end = self.end;
                    self.end = close;
                    let index = self.expression(0)?;
                    self.end = saved_end;
                    self.cur = close.and_then(|c| self.list.next(c));
                    self.list.set_ast_op1(tok, Some(node))?;
                    self.list.set_ast_op2(tok, index)?;
                    node = tok;
                }
                "." => {
                    self.advance();
                    let Some(member) = self.peek() else { break };
                    if !self.list[member].is_name() {
                        break;
                    }
                    self.advance();
                    self.list.set_ast_op1(tok, Some(node))?;
                    self.list.set_ast_op2(tok, Some(member))?;
                    node = tok;
                }
                "++" | "--" => {
                    self.advance();
                    self.list.set_ast_op1(tok, Some(node))?;
                    node = tok;
                }
                _ => break,
            }
        }
        Ok(Some(node))
    }

    /// Is this `(` a C-style cast: `( qualifiers type *... )` followed by
    /// something that starts an expression?
    fn is_cast(&self, open: Token) -> bool {
        let list = &*self.list;
        let Some(close) = list.link(open) else {
            return false;
        };
        // Inspect the content: only type-ish tokens allowed, and at most
        // one unknown name (two names would be an expression like `a * b`).
        let mut t = list.next(open);
        let mut seen_type = false;
        let mut unknown_names = 0;
        while let Some(tok) = t {
            if tok == close {
                break;
            }
            let data = &list[tok];
            match list.text(tok) {
                "const" | "volatile" | "unsigned" | "signed" | "struct" | "union" | "*" => {}
                _ if data.is_standard_type() => seen_type = true,
                _ if data.kind == TokenKind::Name
                    && data.var_id == 0
                    && self
                        .settings
                        .library
                        .is_not_library_function(list.text(tok)) =>
                {
                    seen_type = true;
                    unknown_names += 1;
                    if unknown_names > 1 {
                        return false;
                    }
                }
                _ => return false,
            }
            t = list.next(tok);
        }
        if !seen_type {
            return false;
        }
        // The cast must be applied to something.
        matches!(
            list.tok_at(close, 1).map(|n| &list[n]),
            Some(data) if data.is_name() || data.is_literal()
        ) || matches!(list.text_at(close, 1), "(" | "&" | "*" | "!" | "~" | "-" | "+")
    }
}

/// Parse a free-standing token list (for instance a tokenized library
/// return-value expression) as one expression and return its root.
pub(crate) fn build_expression_ast(
    list: &mut TokenList,
    settings: &Settings,
) -> AnalysisResult<Option<Token>> {
    let start = list.front();
    list.assign_indexes();
    let mut parser = Parser {
        list,
        settings,
        cur: start,
        end: None,
    };
    parser.expression(0)
}

/// Parse the expression region `[start, end)` and return its root.
fn parse_region(
    list: &mut TokenList,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
) -> AnalysisResult<Option<Token>> {
    if start.is_none() || start == end {
        return Ok(None);
    }
    let mut parser = Parser {
        list,
        settings,
        cur: start,
        end,
    };
    parser.expression(0)
}

/// Skip declaration type tokens and return the declared name token if this
/// statement region is a declaration. The walk requires at least one base
/// type token before the declared name so that `*p = 5;` or `x = y;` are
/// not mistaken for declarations.
fn declaration_name(list: &TokenList, start: Token, end: Option<Token>) -> Option<Token> {
    let mut t = Some(start);
    let mut steps = 0;
    let mut seen_base = false;
    while let Some(tok) = t {
        if end == Some(tok) || steps > 32 {
            return None;
        }
        if list[tok].var_id > 0 && list[tok].kind == TokenKind::Variable {
            return seen_base.then_some(tok);
        }
        let data = &list[tok];
        match list.text(tok) {
            ";" | "{" | "}" => return None,
            "const" | "static" | "extern" | "volatile" | "struct" | "union" | "unsigned"
            | "signed" | "*" | "&" | "::" => {}
            "<" => {
                // Skip a template argument list in the type.
                if let Some(close) = list.find_closing_bracket(tok) {
                    t = list.next(close);
                    steps += 1;
                    continue;
                }
                return None;
            }
            _ if data.is_standard_type() => seen_base = true,
            _ if data.kind == TokenKind::Name && data.var_id == 0 => seen_base = true,
            _ => return None,
        }
        t = list.next(tok);
        steps += 1;
    }
    None
}

/// Build the AST for every statement of the unit.
pub fn build_ast(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
) -> AnalysisResult<()> {
    simplify_arrows(list);

    let mut cur = list.front();
    while let Some(tok) = cur {
        let text = list.text(tok).to_string();
        match text.as_str() {
            "if" | "while" | "switch" if list.text_at(tok, 1) == "(" => {
                let open = list.tok_at(tok, 1).expect("checked above");
                let close = list.link(open);
                let root = parse_region(list, settings, list.next(open), close)?;
                list.set_ast_op1(open, Some(tok))?;
                list.set_ast_op2(open, root)?;
                cur = close.and_then(|c| list.next(c));
                continue;
            }
            "for" if list.text_at(tok, 1) == "(" => {
                let open = list.tok_at(tok, 1).expect("checked above");
                let close = list.link(open);
                cur = close.and_then(|c| list.next(c));
                let semi1 =
                    crate::tokens::matcher::find_simple_match(list, list.next(open), close, ";");
                let Some(semi1) = semi1 else {
                    continue;
                };
                let semi2 =
                    crate::tokens::matcher::find_simple_match(list, list.next(semi1), close, ";");
                let Some(semi2) = semi2 else {
                    continue;
                };
                let init_start = match declaration_name(list, list.next(open).expect("non-empty"), Some(semi1)) {
                    Some(name) => Some(name),
                    None => list.next(open),
                };
                let init = parse_region(list, settings, init_start, Some(semi1))?;
                let cond = parse_region(list, settings, list.next(semi1), Some(semi2))?;
                let update = parse_region(list, settings, list.next(semi2), close)?;
                list.set_ast_op1(semi1, init)?;
                list.set_ast_op2(semi2, update)?;
                list.set_ast_op1(semi2, cond)?;
                list.set_ast_op2(semi1, Some(semi2))?;
                list.set_ast_op1(open, Some(tok))?;
                list.set_ast_op2(open, Some(semi1))?;
                continue;
            }
            "return" => {
                let semi =
                    crate::tokens::matcher::find_simple_match(list, list.next(tok), None, ";");
                let root = parse_region(list, settings, list.next(tok), semi)?;
                list.set_ast_op1(tok, root)?;
                cur = semi.and_then(|s| list.next(s));
                continue;
            }
            "case" => {
                // `case N :` — no AST needed, values are read textually.
                cur = list.next(tok);
                continue;
            }
            _ => {}
        }

        // Statement start? Non-executable scopes still need ASTs for
        // declaration initializers (`const int limit = 100;`).
        let prev_text = list.prev(tok).map_or("", |p| list.text(p));
        let at_statement_start = matches!(prev_text, "" | ";" | "{" | "}" | ":");
        let executable = symbols.is_executable_scope(list, tok)
            || declaration_name(list, tok, find_statement_end(list, tok)).is_some();
        if at_statement_start && executable && !matches!(text.as_str(), ";" | "{" | "}") {
            let semi = find_statement_end(list, tok);
            let start = match declaration_name(list, tok, semi) {
                Some(name) => {
                    // Declarations only need ASTs for their initializers.
                    if !matches!(list.text_at(name, 1), "=" | "(") {
                        cur = semi;
                        if cur.is_none() {
                            break;
                        }
                        continue;
                    }
                    Some(name)
                }
                None => Some(tok),
            };
            let mut region_start = start;
            // Declarations can chain: `int a = 1, b = 2;`.
            while let Some(s) = region_start {
                let mut parser = Parser {
                    list: &mut *list,
                    settings,
                    cur: Some(s),
                    end: semi,
                };
                parser.expression(BP_ASSIGN)?;
                let stopped = parser.cur;
                region_start = match stopped {
                    Some(t) if semi != Some(t) && list.text(t) == "," => {
                        let next = list.next(t);
                        next.filter(|n| list[*n].var_id > 0 || list[*n].is_name())
                    }
                    _ => None,
                };
            }
            cur = semi;
            if cur.is_none() {
                break;
            }
            continue;
        }
        cur = list.next(tok);
    }

    assign_expr_ids(list);
    Ok(())
}

fn find_statement_end(list: &TokenList, start: Token) -> Option<Token> {
    let mut t = Some(start);
    while let Some(tok) = t {
        match list.text(tok) {
            ";" => return Some(tok),
            "{" | "}" => return Some(tok),
            "(" | "[" => {
                t = list.link(tok).and_then(|l| list.next(l));
                continue;
            }
            _ => {}
        }
        t = list.next(tok);
    }
    None
}

/// Rewrite `->` into `.` with the original spelling retained, matching how
/// the analysis patterns expect member access to look.
fn simplify_arrows(list: &mut TokenList) {
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list.text(tok) == "->" {
            list[tok].text = ".".to_string();
            list[tok].original_name = Some("->".to_string());
            list[tok].kind = TokenKind::ExtendedOp;
        }
        cur = list.next(tok);
    }
}

/// Assign expression ids: variable tokens reuse their declaration id,
/// structurally identical expressions share a fresh id above the variable
/// id range.
pub fn assign_expr_ids(list: &mut TokenList) {
    const EXPR_ID_BASE: u32 = 0x1000_0000;
    let mut interner: FxHashMap<(String, u32, u32), u32> = FxHashMap::default();
    let mut next_id = EXPR_ID_BASE;

    fn visit(
        list: &mut TokenList,
        tok: Token,
        interner: &mut FxHashMap<(String, u32, u32), u32>,
        next_id: &mut u32,
    ) -> u32 {
        let op1 = list.ast_op1(tok).map(|t| visit(list, t, interner, next_id));
        let op2 = list.ast_op2(tok).map(|t| visit(list, t, interner, next_id));
        let id = if list[tok].var_id > 0 && op1.is_none() && op2.is_none() {
            list[tok].var_id
        } else if op1.is_none() && op2.is_none() && !list[tok].is_literal() {
            0
        } else {
            let key = (
                list.text(tok).to_string(),
                op1.unwrap_or(0),
                op2.unwrap_or(0),
            );
            *interner.entry(key).or_insert_with(|| {
                let id = *next_id;
                *next_id += 1;
                id
            })
        };
        list[tok].expr_id = id;
        id
    }

    let mut roots: Vec<Token> = Vec::new();
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list.ast_parent(tok).is_none()
            && (list.ast_op1(tok).is_some() || list.ast_op2(tok).is_some())
        {
            roots.push(tok);
        }
        cur = list.next(tok);
    }
    for root in roots {
        visit(list, root, &mut interner, &mut next_id);
    }
}

/// Compute expression types bottom-up for every AST node that doesn't have
/// one yet (variables and declarations were typed by the symbol pass).
pub fn set_value_types(list: &mut TokenList, symbols: &SymbolDatabase, settings: &Settings) {
    let mut roots: Vec<Token> = Vec::new();
    let mut cur = list.front();
    while let Some(tok) = cur {
        if list.ast_parent(tok).is_none() {
            roots.push(tok);
        }
        cur = list.next(tok);
    }
    for root in roots {
        compute_type(list, symbols, settings, root);
    }
}

fn literal_type(list: &TokenList, tok: Token) -> Option<TypeInfo> {
    let data = &list[tok];
    match data.kind {
        TokenKind::Number => {
            let text = &data.text;
            if crate::mathlib::is_float(text) {
                let base = if text.ends_with('f') || text.ends_with('F') {
                    BaseType::Float
                } else {
                    BaseType::Double
                };
                Some(TypeInfo {
                    base,
                    ..TypeInfo::default()
                })
            } else {
                let lower = text.to_lowercase();
                let unsigned = lower.ends_with('u')
                    || lower.ends_with("ul")
                    || lower.ends_with("ull")
                    || lower.contains("u");
                let long = lower.trim_end_matches('u').ends_with('l');
                let long_long = lower.trim_end_matches('u').ends_with("ll");
                let base = if long_long {
                    BaseType::LongLong
                } else if long {
                    BaseType::Long
                } else {
                    BaseType::Int
                };
                Some(TypeInfo {
                    sign: if unsigned { Sign::Unsigned } else { Sign::Signed },
                    base,
                    ..TypeInfo::default()
                })
            }
        }
        TokenKind::Char => Some(TypeInfo {
            sign: Sign::Signed,
            base: if data.flags.contains(TokenFlags::LONG) {
                BaseType::WcharT
            } else {
                BaseType::Char
            },
            ..TypeInfo::default()
        }),
        TokenKind::String => Some(TypeInfo {
            sign: Sign::Signed,
            base: BaseType::Char,
            pointer: 1,
            constness: 1,
            ..TypeInfo::default()
        }),
        TokenKind::Boolean => Some(TypeInfo {
            base: BaseType::Bool,
            ..TypeInfo::default()
        }),
        _ => None,
    }
}

fn promote(ti: &TypeInfo) -> TypeInfo {
    let mut ti = ti.clone();
    if ti.pointer == 0
        && matches!(ti.base, BaseType::Bool | BaseType::Char | BaseType::Short)
    {
        ti.base = BaseType::Int;
        ti.sign = Sign::Signed;
    }
    ti
}

fn common_type(a: &TypeInfo, b: &TypeInfo) -> TypeInfo {
    if a.pointer > 0 {
        return a.clone();
    }
    if b.pointer > 0 {
        return b.clone();
    }
    let (a, b) = (promote(a), promote(b));
    let mut result = if a.base >= b.base { a.clone() } else { b.clone() };
    if a.base == b.base && (a.sign == Sign::Unsigned || b.sign == Sign::Unsigned) {
        result.sign = Sign::Unsigned;
    }
    result
}

fn compute_type(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
) -> Option<TypeInfo> {
    if let Some(op1) = list.ast_op1(tok) {
        compute_type(list, symbols, settings, op1);
    }
    if let Some(op2) = list.ast_op2(tok) {
        compute_type(list, symbols, settings, op2);
    }
    if list[tok].type_info.is_some() {
        return list[tok].type_info.clone();
    }
    let ti = infer_type(list, symbols, settings, tok);
    list[tok].type_info = ti.clone();
    ti
}

fn child_type(list: &TokenList, tok: Option<Token>) -> Option<TypeInfo> {
    list[tok?].type_info.clone()
}

fn infer_type(
    list: &mut TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
) -> Option<TypeInfo> {
    if let Some(ti) = literal_type(list, tok) {
        return Some(ti);
    }
    let text = list.text(tok).to_string();
    let op1 = list.ast_op1(tok);
    let op2 = list.ast_op2(tok);
    let t1 = child_type(list, op1);
    let t2 = child_type(list, op2);
    match text.as_str() {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => t1,
        "+" | "-" | "*" | "/" | "%" => {
            if op2.is_none() {
                // Unary minus/plus or dereference/address-of usage.
                match text.as_str() {
                    "*" => {
                        let mut ti = t1?;
                        if ti.pointer > 0 {
                            ti.pointer -= 1;
                        }
                        Some(ti)
                    }
                    _ => t1.map(|ti| promote(&ti)),
                }
            } else {
                match (t1, t2) {
                    (Some(a), Some(b)) => Some(common_type(&a, &b)),
                    (Some(a), None) => Some(a),
                    (None, Some(b)) => Some(b),
                    (None, None) => None,
                }
            }
        }
        "&" => {
            if op2.is_none() {
                let mut ti = t1?;
                ti.pointer += 1;
                Some(ti)
            } else {
                match (t1, t2) {
                    (Some(a), Some(b)) => Some(common_type(&a, &b)),
                    _ => None,
                }
            }
        }
        "|" | "^" | "<<" | ">>" => match (t1, t2) {
            (Some(a), Some(b)) => Some(common_type(&a, &b)),
            _ => None,
        },
        "~" => t1.map(|ti| promote(&ti)),
        "!" | "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||" => Some(TypeInfo {
            base: BaseType::Bool,
            ..TypeInfo::default()
        }),
        "++" | "--" => t1,
        "[" => {
            let mut ti = t1?;
            if ti.pointer > 0 {
                ti.pointer -= 1;
                Some(ti)
            } else if ti.base == BaseType::Container {
                // Element type is unknown without template introspection.
                None
            } else {
                None
            }
        }
        "." => {
            // Member access; only container-yield members are typed.
            None
        }
        "?" => t2,
        ":" => match (t1.clone(), t2.clone()) {
            (Some(a), Some(b)) => Some(common_type(&a, &b)),
            (a, b) => a.or(b),
        },
        "," => t2,
        "(" => {
            if list[tok].is_cast() {
                let inner = list.next(tok)?;
                return Some(types::parse_decl(list, inner, settings));
            }
            // sizeof(...) yields size_t.
            if op1.is_some_and(|t| matches!(list.text(t), "sizeof")) {
                return Some(TypeInfo {
                    sign: Sign::Unsigned,
                    base: BaseType::Long,
                    ..TypeInfo::default()
                });
            }
            // Known function call: use the declared return type.
            if let Some(callee) = op1 {
                if let Some(func) = list[callee].function.expand() {
                    let f = &symbols.functions[func];
                    if let Some(ret) = f.ret_def {
                        return Some(types::parse_decl(list, ret, settings));
                    }
                }
                // Container yields via `.size()` / `.empty()`.
                if list.text(callee) == "." {
                    if let (Some(obj), Some(member)) =
                        (list.ast_op1(callee), list.ast_op2(callee))
                    {
                        if let Some(ti) = list[obj].type_info.clone() {
                            if let Some(name) = &ti.container {
                                if let Some(c) = settings.library.container(name) {
                                    use crate::library::ContainerYield;
                                    match c.yields(list.text(member)) {
                                        ContainerYield::Size => {
                                            return Some(TypeInfo {
                                                sign: Sign::Unsigned,
                                                base: BaseType::Long,
                                                ..TypeInfo::default()
                                            });
                                        }
                                        ContainerYield::Empty => {
                                            return Some(TypeInfo {
                                                base: BaseType::Bool,
                                                ..TypeInfo::default()
                                            });
                                        }
                                        ContainerYield::StartIterator
                                        | ContainerYield::EndIterator => {
                                            return Some(TypeInfo {
                                                base: BaseType::Iterator,
                                                ..TypeInfo::default()
                                            });
                                        }
                                        _ => {}
                                    }
                                }
                            }
                        }
                    }
                }
            }
            None
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;
    use crate::tokens::Language;

    fn prepare(code: &str) -> (TokenList, SymbolDatabase) {
        let settings = Settings::default();
        let mut list = tokenize(code, "test.cpp", Language::Cpp).unwrap();
        let db = crate::symbols::build(&mut list, &settings).unwrap();
        build_ast(&mut list, &db, &settings).unwrap();
        set_value_types(&mut list, &db, &settings);
        (list, db)
    }

    fn find(list: &TokenList, text: &str) -> Token {
        list.tokens().find(|t| list.text(*t) == text).unwrap()
    }

    fn find_nth(list: &TokenList, text: &str, n: usize) -> Token {
        list.tokens()
            .filter(|t| list.text(*t) == text)
            .nth(n)
            .unwrap()
    }

    #[test]
    fn binary_precedence() {
        let (list, _) = prepare("void f() { int r = 4 * 10 + 2; }");
        let plus = find(&list, "+");
        let star = find(&list, "*");
        assert_eq!(list.ast_op1(plus), Some(star));
        assert_eq!(list.text(list.ast_op2(plus).unwrap()), "2");
        assert_eq!(list.text(list.ast_op1(star).unwrap()), "4");
        assert_eq!(list.text(list.ast_op2(star).unwrap()), "10");
        // The initializer hangs off the '='.
        let eq = find(&list, "=");
        assert_eq!(list.ast_op2(eq), Some(plus));
    }

    #[test]
    fn condition_hangs_off_the_paren() {
        let (list, _) = prepare("void f(int a) { if (a > 1) { } }");
        let if_tok = find(&list, "if");
        let open = list.tok_at(if_tok, 1).unwrap();
        let cond = list.ast_op2(open).unwrap();
        assert_eq!(list.text(cond), ">");
        assert_eq!(list.text(list.ast_op1(cond).unwrap()), "a");
    }

    #[test]
    fn for_header_semicolon_chain() {
        let (list, _) = prepare("void f() { for (int i = 0; i < 10; ++i) { } }");
        let for_tok = find(&list, "for");
        let open = list.tok_at(for_tok, 1).unwrap();
        let semi1 = list.ast_op2(open).unwrap();
        assert_eq!(list.text(semi1), ";");
        let init = list.ast_op1(semi1).unwrap();
        assert_eq!(list.text(init), "=");
        let semi2 = list.ast_op2(semi1).unwrap();
        assert_eq!(list.text(semi2), ";");
        let cond = list.ast_op1(semi2).unwrap();
        assert_eq!(list.text(cond), "<");
        let update = list.ast_op2(semi2).unwrap();
        assert_eq!(list.text(update), "++");
    }

    #[test]
    fn call_shape() {
        let (list, _) = prepare("int g(int x) { return x; } void f() { g(1); }");
        let open = find_nth(&list, "(", 2);
        assert_eq!(list.text(list.ast_op1(open).unwrap()), "g");
        assert_eq!(list.text(list.ast_op2(open).unwrap()), "1");
    }

    #[test]
    fn ternary_shape() {
        let (list, _) = prepare("void f(int a) { int r = a ? 1 : 2; }");
        let q = find(&list, "?");
        let colon = find(&list, ":");
        assert_eq!(list.ast_op2(q), Some(colon));
        assert_eq!(list.text(list.ast_op1(colon).unwrap()), "1");
        assert_eq!(list.text(list.ast_op2(colon).unwrap()), "2");
    }

    #[test]
    fn arrow_is_simplified_to_dot() {
        let (list, _) = prepare("void f(S *p) { p->x = 1; }");
        let dot = find(&list, ".");
        assert_eq!(list[dot].original_name(), "->");
        assert_eq!(list.text(list.ast_op1(dot).unwrap()), "p");
    }

    #[test]
    fn subscript_shape() {
        let (list, _) = prepare("void f() { int arr[4]; arr[2] = 5; }");
        // The declaration `arr[4]` builds no AST; the use does.
        let use_bracket = find_nth(&list, "[", 1);
        assert_eq!(list.text(list.ast_op1(use_bracket).unwrap()), "arr");
        assert_eq!(list.text(list.ast_op2(use_bracket).unwrap()), "2");
    }

    #[test]
    fn comparison_types_are_bool() {
        let (list, _) = prepare("void f(int a) { if (a > 1) { } }");
        let gt = find(&list, ">");
        assert_eq!(list[gt].type_info.as_ref().unwrap().base, BaseType::Bool);
    }

    #[test]
    fn arithmetic_types_widen() {
        let (list, _) = prepare("void f(unsigned long a, int b) { a + b; }");
        let plus = find(&list, "+");
        let ti = list[plus].type_info.as_ref().unwrap();
        assert_eq!(ti.base, BaseType::Long);
        assert_eq!(ti.sign, Sign::Unsigned);
    }

    #[test]
    fn sizeof_yields_unsigned() {
        let (list, _) = prepare("void f() { sizeof(int); }");
        let open = find_nth(&list, "(", 1);
        let ti = list[open].type_info.as_ref().unwrap();
        assert_eq!(ti.sign, Sign::Unsigned);
    }

    #[test]
    fn expression_ids_share_structure() {
        let (list, _) = prepare("void f(int a, int b) { a + b; a + b; b + a; }");
        let plus0 = find_nth(&list, "+", 0);
        let plus1 = find_nth(&list, "+", 1);
        let plus2 = find_nth(&list, "+", 2);
        assert_ne!(list[plus0].expr_id, 0);
        assert_eq!(list[plus0].expr_id, list[plus1].expr_id);
        assert_ne!(list[plus0].expr_id, list[plus2].expr_id);
    }

    #[test]
    fn container_size_call_is_unsigned() {
        let (list, _) = prepare("void f() { std::vector<int> v; v.size(); }");
        let open = find_nth(&list, "(", 1);
        let ti = list[open].type_info.as_ref().unwrap();
        assert_eq!(ti.sign, Sign::Unsigned);
        assert_eq!(ti.base, BaseType::Long);
    }
}
