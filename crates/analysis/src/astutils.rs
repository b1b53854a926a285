//! Shared helpers over the token graph and AST overlay, used by every
//! value-flow pass: type queries, argument extraction, modification
//! analysis, escape-scope detection.

use crate::error::AnalysisResult;
use crate::library::ContainerAction;
use crate::settings::Settings;
use crate::symbols::SymbolDatabase;
use crate::tokens::matcher::{find_match_varid, pat_match, simple_match};
use crate::tokens::{Token, TokenList};
use crate::types::BaseType;

/// Visitor verdict for [`visit_ast_nodes`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ChildrenToVisit {
    /// Continue into both operands.
    Op1AndOp2,
    /// Don't descend below this node.
    None,
    /// Stop the whole traversal.
    Done,
}

/// Preorder walk of the expression tree rooted at `tok`.
pub fn visit_ast_nodes(
    list: &TokenList,
    tok: Option<Token>,
    f: &mut dyn FnMut(Token) -> ChildrenToVisit,
) -> bool {
    let Some(tok) = tok else { return false };
    match f(tok) {
        ChildrenToVisit::Done => true,
        ChildrenToVisit::None => false,
        ChildrenToVisit::Op1AndOp2 => {
            visit_ast_nodes(list, list.ast_op1(tok), f)
                || visit_ast_nodes(list, list.ast_op2(tok), f)
        }
    }
}

/// Does the expression under `root` contain a use of `var_id`?
pub fn ast_has_var(list: &TokenList, root: Option<Token>, var_id: u32) -> bool {
    let mut found = false;
    visit_ast_nodes(list, root, &mut |t| {
        if list[t].var_id == var_id {
            found = true;
            ChildrenToVisit::Done
        } else {
            ChildrenToVisit::Op1AndOp2
        }
    });
    found
}

/// Does the expression under `root` contain the exact token `needle`?
pub fn ast_has_token(list: &TokenList, root: Option<Token>, needle: Token) -> bool {
    let mut found = false;
    visit_ast_nodes(list, root, &mut |t| {
        if t == needle {
            found = true;
            ChildrenToVisit::Done
        } else {
            ChildrenToVisit::Op1AndOp2
        }
    });
    found
}

/// Is the expression integral-typed? `unknown` is returned for untyped
/// expressions.
pub fn ast_is_integral(list: &TokenList, tok: Token, unknown: bool) -> bool {
    match &list[tok].type_info {
        Some(ti) => ti.is_integral(),
        None => unknown,
    }
}

/// Is the expression float-typed?
pub fn ast_is_float(list: &TokenList, tok: Token, unknown: bool) -> bool {
    match &list[tok].type_info {
        Some(ti) => ti.is_float(),
        None => unknown,
    }
}

/// Is the expression pointer-typed?
pub fn ast_is_pointer(list: &TokenList, tok: Token) -> bool {
    list[tok].type_info.as_ref().is_some_and(|ti| ti.pointer > 0)
}

/// Is the expression unsigned integral?
pub fn ast_is_unsigned(list: &TokenList, tok: Token) -> bool {
    list[tok]
        .type_info
        .as_ref()
        .is_some_and(|ti| ti.is_integral() && ti.is_unsigned())
}

/// Is the expression bool-typed?
pub fn ast_is_bool(list: &TokenList, tok: Token) -> bool {
    list[tok]
        .type_info
        .as_ref()
        .is_some_and(|ti| ti.pointer == 0 && ti.base == BaseType::Bool)
}

/// Is the expression a known container object?
pub fn ast_is_container(list: &TokenList, tok: Token) -> bool {
    list[tok]
        .type_info
        .as_ref()
        .is_some_and(|ti| ti.base == BaseType::Container && ti.pointer == 0)
}

/// The container name of an expression, when it is a container.
pub fn container_of(list: &TokenList, tok: Token) -> Option<&str> {
    let ti = list[tok].type_info.as_ref()?;
    if ti.base == BaseType::Container {
        ti.container.as_deref()
    } else {
        None
    }
}

/// Is the expression an iterator?
pub fn ast_is_iterator(list: &TokenList, tok: Token) -> bool {
    list[tok]
        .type_info
        .as_ref()
        .is_some_and(|ti| ti.base == BaseType::Iterator)
}

/// Char-like expression (plain `char`, not a pointer)?
pub fn ast_is_generic_char(list: &TokenList, tok: Token) -> bool {
    list[tok]
        .type_info
        .as_ref()
        .is_some_and(|ti| ti.pointer == 0 && matches!(ti.base, BaseType::Char | BaseType::WcharT))
}

/// Flatten the (comma-chained) argument list of a call `(` or a brace
/// initializer `{`.
pub fn get_arguments(list: &TokenList, call: Token) -> Vec<Token> {
    let mut args = Vec::new();
    let root = match list.text(call) {
        "(" | "{" => list.ast_op2(call),
        _ => {
            // Called with the name token: use the following paren.
            list.tok_at(call, 1)
                .filter(|t| list.text(*t) == "(")
                .and_then(|t| list.ast_op2(t))
        }
    };
    fn flatten(list: &TokenList, tok: Option<Token>, args: &mut Vec<Token>) {
        let Some(tok) = tok else { return };
        if list.text(tok) == "," {
            flatten(list, list.ast_op1(tok), args);
            flatten(list, list.ast_op2(tok), args);
        } else {
            args.push(tok);
        }
    }
    flatten(list, root, &mut args);
    args
}

/// The token after the rightmost leaf of the expression rooted at `tok`.
pub fn next_after_ast_rightmost_leaf(list: &TokenList, tok: Token) -> Option<Token> {
    let (_, end) = list.find_expression_start_end(tok);
    list.next(end)
}

/// For a `[` introducing a lambda (`[..] (..) { .. }` or `[..] { .. }`),
/// the final `}`.
pub fn find_lambda_end_token(list: &TokenList, open: Token) -> Option<Token> {
    if list.text(open) != "[" {
        return None;
    }
    let close = list.link(open)?;
    let after = list.next(close)?;
    if list.text(after) == "(" {
        let par_close = list.link(after)?;
        let body = list.next(par_close)?;
        if list.text(body) == "{" {
            return list.link(body);
        }
        return None;
    }
    if list.text(after) == "{" {
        return list.link(after);
    }
    None
}

/// Is the `{` scope guaranteed to leave the enclosing scope: it contains a
/// `return`/`continue`/`break`/`throw`/`goto` in its own statement level,
/// or it ends in a call the library knows never returns. With `unknown`,
/// unknown trailing calls also count.
pub fn is_escape_scope(
    list: &TokenList,
    settings: &Settings,
    open: Token,
    unknown: bool,
) -> bool {
    if list.text(open) != "{" {
        return false;
    }
    let Some(close) = list.link(open) else {
        return false;
    };
    // Search for an escape statement belonging directly to this scope.
    let mut depth = 0;
    let mut cur = list.next(open);
    while let Some(tok) = cur {
        if tok == close {
            break;
        }
        match list.text(tok) {
            "{" => depth += 1,
            "}" => depth -= 1,
            "return" | "continue" | "break" | "throw" | "goto" if depth == 0 => return true,
            _ => {}
        }
        cur = list.next(tok);
    }
    let mut unknown_function = String::new();
    if settings
        .library
        .is_scope_noreturn(list, close, Some(&mut unknown_function))
    {
        return unknown_function.is_empty() || unknown;
    }
    false
}

/// Does the scope ending at `end` (a `}`) finish with an escape statement
/// on every path through its last statement?
pub fn is_return_scope(list: &TokenList, settings: &Settings, end: Token) -> bool {
    if list.text(end) != "}" {
        return false;
    }
    let Some(open) = list.link(end) else {
        return false;
    };
    let Some(prev) = list.prev(end) else {
        return false;
    };
    match list.text(prev) {
        ";" => {
            // Walk back to the start of the last statement.
            let mut t = list.prev(prev);
            let mut last_start = None;
            while let Some(tok) = t {
                if tok == open {
                    last_start = list.next(tok);
                    break;
                }
                match list.text(tok) {
                    ";" | "}" | "{" => {
                        last_start = list.next(tok);
                        break;
                    }
                    ")" => {
                        t = list.link(tok).and_then(|l| list.prev(l));
                        continue;
                    }
                    _ => {}
                }
                t = list.prev(tok);
            }
            match last_start {
                Some(first) => {
                    if matches!(
                        list.text(first),
                        "return" | "throw" | "break" | "continue" | "goto"
                    ) {
                        return true;
                    }
                    let mut unknown = String::new();
                    settings
                        .library
                        .is_scope_noreturn(list, end, Some(&mut unknown))
                        && unknown.is_empty()
                }
                None => false,
            }
        }
        "}" => {
            // `if (..) { return; } else { return; }` style: both branches
            // must escape.
            if simple_match(list, list.link(prev).and_then(|l| list.tok_at(l, -2)), "} else {") {
                let else_open = list.link(prev);
                let if_close = else_open.and_then(|o| list.tok_at(o, -2));
                return is_return_scope(list, settings, prev)
                    && if_close.is_some_and(|c| is_return_scope(list, settings, c));
            }
            false
        }
        _ => false,
    }
}

/// Is `a >> b` (or `<<`) likely stream i/o rather than a shift? True when
/// the unit is C++ and the operand types don't say integral.
pub fn is_likely_stream_read(list: &TokenList, op: Token) -> bool {
    if !list.is_cpp() {
        return false;
    }
    if !matches!(list.text(op), ">>" | "<<") {
        return false;
    }
    let Some(lhs) = list.ast_op1(op) else {
        return false;
    };
    if list[lhs].type_info.is_some() && ast_is_integral(list, lhs, false) {
        return false;
    }
    // Walk to the leftmost leaf: a stream object.
    let mut leaf = lhs;
    while let Some(op1) = list.ast_op1(leaf) {
        leaf = op1;
    }
    list[leaf].is_name() && list[leaf].type_info.is_none()
}

/// Structural equality of two expressions.
pub fn is_same_expression(list: &TokenList, a: Token, b: Token) -> bool {
    if list[a].expr_id != 0 && list[a].expr_id == list[b].expr_id {
        return true;
    }
    if list.text(a) != list.text(b) {
        return false;
    }
    if list[a].var_id != list[b].var_id {
        return false;
    }
    match (list.ast_op1(a), list.ast_op1(b)) {
        (Some(a1), Some(b1)) => {
            if !is_same_expression(list, a1, b1) {
                return false;
            }
        }
        (None, None) => {}
        _ => return false,
    }
    match (list.ast_op2(a), list.ast_op2(b)) {
        (Some(a2), Some(b2)) => is_same_expression(list, a2, b2),
        (None, None) => true,
        _ => false,
    }
}

/// If `argtok` is an argument of a call, the called name token and the
/// zero-based argument position.
pub fn get_token_argument_function(
    list: &TokenList,
    argtok: Token,
) -> Option<(Token, usize)> {
    let mut tok = argtok;
    loop {
        let parent = list.ast_parent(tok)?;
        match list.text(parent) {
            "," => tok = parent,
            "(" => {
                let callee = list.ast_op1(parent)?;
                if !list[callee].is_name() {
                    return None;
                }
                // Count which argument we are.
                let args = get_arguments(list, parent);
                let pos = args
                    .iter()
                    .position(|a| *a == tok || ast_has_token(list, Some(*a), argtok))?;
                return Some((callee, pos));
            }
            _ => {
                // Casts and unary & keep the argument relationship.
                if list[parent].is_cast() || list.is_unary_op(parent, "&") || list.is_unary_op(parent, "*")
                {
                    tok = parent;
                } else {
                    return None;
                }
            }
        }
    }
}

/// Would the function called with `tok` as argument change the value?
/// Returns `(changed, inconclusive)` for the given indirection level.
pub fn is_variable_changed_by_function_call(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
    indirect: i32,
) -> (bool, bool) {
    let Some((callee, pos)) = get_token_argument_function(list, tok) else {
        return (false, false);
    };
    // Address taken at the call site?
    let mut address_of = false;
    let mut t = tok;
    while let Some(parent) = list.ast_parent(t) {
        if list.is_unary_op(parent, "&") {
            address_of = true;
            break;
        }
        if !matches!(list.text(parent), "," | "(") && !list[parent].is_cast() {
            break;
        }
        t = parent;
    }

    if let Some(func) = list[callee].function.expand() {
        let f = &symbols.functions[func];
        if let Some(arg) = f.argument_var(pos) {
            let arg = &symbols.variables[arg];
            if arg.is_reference && !arg.is_const {
                return (true, false);
            }
            if (address_of || indirect > 0) && arg.is_pointer && !arg.is_const {
                return (true, false);
            }
            return (false, false);
        }
        return (true, false);
    }

    // Library function with a const contract for this argument?
    if let Some(info) = settings.library.function(list.text(callee)) {
        if info.const_args.contains(&(pos + 1)) {
            return (false, false);
        }
    }

    // Unknown function: by-value arguments are safe, anything by address
    // may be written through.
    let is_pointer = ast_is_pointer(list, tok);
    if address_of || (indirect > 0 && is_pointer) {
        return (true, true);
    }
    (false, false)
}

/// Is the use of `tok` (which has a variable id) a modification at the
/// given indirection level?
pub fn is_variable_changed_at(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    tok: Token,
    indirect: i32,
) -> bool {
    // Walk up through member access / subscript / dereference.
    let mut t = tok;
    let mut derefs = 0;
    while let Some(parent) = list.ast_parent(t) {
        match list.text(parent) {
            "." if list.ast_op1(parent) == Some(t) => t = parent,
            "[" if list.ast_op1(parent) == Some(t) => {
                derefs += 1;
                t = parent;
            }
            "*" if list.is_unary_op(parent, "*") => {
                derefs += 1;
                t = parent;
            }
            _ => break,
        }
    }
    if let Some(parent) = list.ast_parent(t) {
        if list[parent].is_assignment_op() && list.ast_op1(parent) == Some(t) {
            // Writing through `*p`/`p[i]` modifies one indirection level
            // deeper than writing `p` itself.
            return derefs == indirect;
        }
        if list[parent].is_inc_dec_op() {
            return true;
        }
        if list.is_unary_op(parent, "&") && list.ast_parent(parent).is_some_and(|gp| {
            list[gp].is_assignment_op() || list.text(gp) == "(" || list.text(gp) == ","
        }) {
            // Address escapes; assume a write.
            return true;
        }
        if is_likely_stream_read(list, parent) && list.ast_op2(parent) == Some(t) {
            return true;
        }
        if list.text(parent) == "." && list.ast_op1(parent) == Some(t) {
            // Member function call on the object.
            if let Some(gp) = list.ast_parent(parent) {
                if list.text(gp) == "(" && list.ast_op1(gp) == Some(parent) {
                    // Known container members that don't mutate are fine.
                    if let Some(container) = container_of(list, tok)
                        .and_then(|name| settings.library.container(name))
                    {
                        if let Some(member) = list.ast_op2(parent) {
                            let action = container.action(list.text(member));
                            use crate::library::ContainerYield;
                            if container.yields(list.text(member))
                                != ContainerYield::NoYield
                            {
                                return false;
                            }
                            return action != ContainerAction::Find
                                && action != ContainerAction::FindConst;
                        }
                    }
                    return true;
                }
            }
        }
    }
    let (changed, inconclusive) =
        is_variable_changed_by_function_call(list, symbols, settings, tok, indirect);
    changed || inconclusive
}

/// First token in `[start, end)` where the variable is modified.
pub fn find_variable_changed(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    var_id: u32,
    globalvar: bool,
    indirect: i32,
) -> AnalysisResult<Option<Token>> {
    if var_id == 0 {
        return Ok(None);
    }
    let mut cur = start;
    while let Some(tok) = cur {
        if end == Some(tok) {
            break;
        }
        if globalvar
            && list[tok].is_name()
            && list[tok].var_id == 0
            && list.text_at(tok, 1) == "("
            && list[tok].function.is_none()
        {
            // An unknown call may write any global.
            return Ok(Some(tok));
        }
        if list[tok].var_id == var_id
            && is_variable_changed_at(list, symbols, settings, tok, indirect)
        {
            return Ok(Some(tok));
        }
        cur = list.next(tok);
    }
    Ok(None)
}

/// Is the variable modified anywhere in `[start, end)`?
pub fn is_variable_changed(
    list: &TokenList,
    symbols: &SymbolDatabase,
    settings: &Settings,
    start: Option<Token>,
    end: Option<Token>,
    var_id: u32,
    globalvar: bool,
) -> AnalysisResult<bool> {
    Ok(
        find_variable_changed(list, symbols, settings, start, end, var_id, globalvar, 0)?
            .is_some(),
    )
}

/// Is `tok` used in a boolean context (condition, `!`, logical operand)?
pub fn is_used_as_bool(list: &TokenList, tok: Token) -> AnalysisResult<bool> {
    let Some(parent) = list.ast_parent(tok) else {
        return Ok(false);
    };
    if pat_match(list, Some(parent), "%comp%|!|&&|%oror%|?")? {
        return Ok(true);
    }
    if list.text(parent) == "("
        && list.ast_op2(parent) == Some(tok)
        && pat_match(list, list.prev(parent), "if|while")?
    {
        return Ok(true);
    }
    Ok(false)
}

/// Find a use of `var_id` in `[start, end)`.
pub fn find_var_token(
    list: &TokenList,
    start: Option<Token>,
    end: Option<Token>,
    var_id: u32,
) -> AnalysisResult<Option<Token>> {
    find_match_varid(list, start, end, "%varid%", var_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::astbuild;
    use crate::symbols;
    use crate::tokenizer::tokenize;
    use crate::tokens::Language;

    fn prepare(code: &str) -> (TokenList, SymbolDatabase, Settings) {
        let settings = Settings::default();
        let mut list = tokenize(code, "test.cpp", Language::Cpp).unwrap();
        let db = symbols::build(&mut list, &settings).unwrap();
        astbuild::build_ast(&mut list, &db, &settings).unwrap();
        astbuild::set_value_types(&mut list, &db, &settings);
        (list, db, settings)
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
    fn arguments_flatten_comma_chain() {
        let (list, _, _) = prepare("void f() { g(1, 2, 3); }");
        let call = find_nth(&list, "(", 1);
        let args = get_arguments(&list, call);
        let texts: Vec<&str> = args.iter().map(|t| list.text(*t)).collect();
        assert_eq!(texts, ["1", "2", "3"]);
    }

    #[test]
    fn escape_scope_detection() {
        let (list, _, settings) = prepare("void f(int a) { if (a) { return; } }");
        let open = find_nth(&list, "{", 1);
        assert!(is_escape_scope(&list, &settings, open, false));
        let (list2, _, settings2) = prepare("void f(int a) { if (a) { a = 1; } }");
        let open2 = find_nth(&list2, "{", 1);
        assert!(!is_escape_scope(&list2, &settings2, open2, false));
    }

    #[test]
    fn return_scope_detection() {
        let (list, _, settings) = prepare("void f(int a) { if (a) { a = 1; return; } }");
        let close = find_nth(&list, "}", 0);
        assert!(is_return_scope(&list, &settings, close));
        let (list2, _, settings2) = prepare("void f(int a) { if (a) { a = 1; } }");
        let close2 = find_nth(&list2, "}", 0);
        assert!(!is_return_scope(&list2, &settings2, close2));
    }

    #[test]
    fn noreturn_call_ends_scope() {
        let (list, _, settings) = prepare("void f(int a) { if (a) { abort(); } }");
        let close = find_nth(&list, "}", 0);
        assert!(is_return_scope(&list, &settings, close));
    }

    #[test]
    fn assignment_changes_variable() {
        let (list, db, settings) = prepare("void f() { int x = 1; x = 2; }");
        let x = find(&list, "x");
        let var_id = list[x].var_id;
        let changed = is_variable_changed(
            &list,
            &db,
            &settings,
            list.next(x),
            None,
            var_id,
            false,
        )
        .unwrap();
        assert!(changed);
    }

    #[test]
    fn read_does_not_change_variable() {
        let (list, db, settings) = prepare("void f() { int x = 1; int y = x + 1; }");
        let x = find(&list, "x");
        let var_id = list[x].var_id;
        let changed = is_variable_changed(
            &list,
            &db,
            &settings,
            list.next(x),
            None,
            var_id,
            false,
        )
        .unwrap();
        assert!(!changed);
    }

    #[test]
    fn increment_changes_variable() {
        let (list, db, settings) = prepare("void f() { int x = 1; ++x; }");
        let x = find(&list, "x");
        let changed =
            is_variable_changed(&list, &db, &settings, list.next(x), None, list[x].var_id, false)
                .unwrap();
        assert!(changed);
    }

    #[test]
    fn const_ref_argument_does_not_change() {
        let (list, db, settings) = prepare(
            "void g(const int &r) { } void f() { int x = 1; g(x); x; }",
        );
        let x = find_nth(&list, "x", 0);
        let changed = is_variable_changed(
            &list,
            &db,
            &settings,
            list.next(x),
            None,
            list[x].var_id,
            false,
        )
        .unwrap();
        assert!(!changed);
    }

    #[test]
    fn nonconst_ref_argument_changes() {
        let (list, db, settings) =
            prepare("void g(int &r) { r = 2; } void f() { int x = 1; g(x); }");
        let x = find_nth(&list, "x", 1);
        let changed = is_variable_changed(
            &list,
            &db,
            &settings,
            list.next(x),
            None,
            list[x].var_id,
            false,
        )
        .unwrap();
        assert!(changed);
    }

    #[test]
    fn same_expression_structural() {
        let (list, _, _) = prepare("void f(int a, int b) { a + b; a + b; a - b; }");
        let p0 = find_nth(&list, "+", 0);
        let p1 = find_nth(&list, "+", 1);
        let m = find(&list, "-");
        assert!(is_same_expression(&list, p0, p1));
        assert!(!is_same_expression(&list, p0, m));
    }

    #[test]
    fn lambda_end_token() {
        let (list, _, _) = prepare("void f() { auto l = [](int a) { return a; }; }");
        let open = find(&list, "[");
        let end = find_lambda_end_token(&list, open).unwrap();
        assert_eq!(list.text(end), "}");
        // The lambda end is the inner closing brace, not the function's.
        assert_eq!(list.text_at(end, 1), ";");
    }
}
