//! The AST overlay.
//!
//! Expression trees are layered over the flat token chain through three
//! `PackedOption<Token>` fields per token: `ast_parent`, `ast_op1` and
//! `ast_op2`. The overlay is cyclic by construction (parent ↔ child), so
//! every mutation goes through the guarded setters here: assigning an
//! operand detaches the old operand, re-parents the new operand's AST root
//! atomically and refuses any assignment that would close a cycle.

use super::list::TokenList;
use super::matcher::simple_match;
use super::token::Token;
use crate::error::{AnalysisError, AnalysisResult};

impl TokenList {
    /// First AST operand.
    pub fn ast_op1(&self, tok: Token) -> Option<Token> {
        self[tok].ast_op1.expand()
    }

    /// Second AST operand.
    pub fn ast_op2(&self, tok: Token) -> Option<Token> {
        self[tok].ast_op2.expand()
    }

    /// AST parent.
    pub fn ast_parent(&self, tok: Token) -> Option<Token> {
        self[tok].ast_parent.expand()
    }

    /// Root of the expression tree containing `tok`.
    pub fn ast_top(&self, tok: Token) -> Token {
        let mut top = tok;
        while let Some(parent) = self.ast_parent(top) {
            top = parent;
        }
        top
    }

    /// Set the AST parent of `tok`, rejecting cycles: walking up from the
    /// prospective parent must not reach `tok`.
    pub fn set_ast_parent(&mut self, tok: Token, parent: Option<Token>) -> AnalysisResult<()> {
        let mut cursor = parent;
        while let Some(p) = cursor {
            if p == tok {
                return Err(AnalysisError::internal_at(
                    self.location(tok),
                    "AST cyclic dependency",
                ));
            }
            cursor = self.ast_parent(p);
        }
        // Detach from the old parent so no node is referenced twice.
        if let Some(old_parent) = self.ast_parent(tok) {
            if self.ast_op1(old_parent) == Some(tok) {
                self[old_parent].ast_op1 = None.into();
            }
            if self.ast_op2(old_parent) == Some(tok) {
                self[old_parent].ast_op2 = None.into();
            }
        }
        self[tok].ast_parent = parent.into();
        Ok(())
    }

    /// Set the first operand of `tok`. The old operand is orphaned; the new
    /// operand is taken at its AST root.
    pub fn set_ast_op1(&mut self, tok: Token, operand: Option<Token>) -> AnalysisResult<()> {
        if let Some(old) = self.ast_op1(tok) {
            self[old].ast_parent = None.into();
        }
        let operand = match operand {
            Some(op) => {
                let top = self.ast_top(op);
                self.set_ast_parent(top, Some(tok))?;
                Some(top)
            }
            None => None,
        };
        self[tok].ast_op1 = operand.into();
        Ok(())
    }

    /// Set the second operand of `tok`. The old operand is orphaned; the
    /// new operand is taken at its AST root.
    pub fn set_ast_op2(&mut self, tok: Token, operand: Option<Token>) -> AnalysisResult<()> {
        if let Some(old) = self.ast_op2(tok) {
            self[old].ast_parent = None.into();
        }
        let operand = match operand {
            Some(op) => {
                let top = self.ast_top(op);
                self.set_ast_parent(top, Some(tok))?;
                Some(top)
            }
            None => None,
        };
        self[tok].ast_op2 = operand.into();
        Ok(())
    }

    /// Both operands present?
    pub fn is_binary_op(&self, tok: Token) -> bool {
        self.ast_op1(tok).is_some() && self.ast_op2(tok).is_some()
    }

    /// Is `tok` the unary operator `op` (one operand, matching text)?
    pub fn is_unary_op(&self, tok: Token, op: &str) -> bool {
        self.text(tok) == op && self.ast_op1(tok).is_some() && self.ast_op2(tok).is_none()
    }

    /// A unary operator written before its operand (`!x`, `-x`, `*p`).
    pub fn is_unary_pre_op(&self, tok: Token) -> bool {
        match (self.ast_op1(tok), self.ast_op2(tok)) {
            (Some(op1), None) => self.precedes(tok, op1),
            _ => false,
        }
    }

    /// Is `tok` the right-hand side of its parent?
    pub fn ast_is_rhs(&self, tok: Token) -> bool {
        self.ast_parent(tok)
            .is_some_and(|p| self.ast_op2(p) == Some(tok))
    }

    /// Is `tok` the left-hand side of its parent?
    pub fn ast_is_lhs(&self, tok: Token) -> bool {
        self.ast_parent(tok)
            .is_some_and(|p| self.ast_op1(p) == Some(tok))
    }

    /// The first and last token of the expression rooted at `top` in flat
    /// program order, with wrapping parentheses included.
    pub fn find_expression_start_end(&self, top: Token) -> (Token, Token) {
        let mut start = top;
        while let Some(op1) = self.ast_op1(start) {
            if !self.precedes(op1, start) {
                break;
            }
            start = op1;
        }

        let mut end = top;
        while self.ast_op1(end).is_some()
            && (self.ast_op2(end).is_some() || self.is_unary_pre_op(end))
        {
            if matches!(self.text(end), "(" | "[" | "{") {
                if let Some(close) = self.link(end) {
                    end = close;
                }
                break;
            }
            end = match self.ast_op2(end) {
                Some(op2) => op2,
                None => match self.ast_op1(end) {
                    Some(op1) => op1,
                    None => break,
                },
            };
        }

        // Move start out to a wrapping left parenthesis: '(*it).x'.
        let mut par = 0i32;
        let mut cur = Some(start);
        while let Some(t) = cur {
            if t == end {
                break;
            }
            match self.text(t) {
                "(" => par += 1,
                ")" => {
                    if par == 0 {
                        if let Some(open) = self.link(t) {
                            start = open;
                        }
                    } else {
                        par -= 1;
                    }
                }
                _ => {}
            }
            cur = self.next(t);
        }
        // Move end out to a wrapping right parenthesis: '2>(x+1)'.
        let mut par = 0i32;
        let mut cur = Some(end);
        while let Some(t) = cur {
            if t == start {
                break;
            }
            match self.text(t) {
                ")" => par += 1,
                "(" => {
                    if par == 0 {
                        if let Some(close) = self.link(t) {
                            end = close;
                        }
                    } else {
                        par -= 1;
                    }
                }
                _ => {}
            }
            cur = self.prev(t);
        }
        if self.text(end) == "{" {
            if let Some(close) = self.link(end) {
                end = close;
            }
        }
        (start, end)
    }

    /// Source string of the expression rooted at `top`.
    pub fn expression_string(&self, top: Token) -> String {
        let (start, end) = self.find_expression_start_end(top);
        let mut out = String::new();
        let mut cur = Some(start);
        while let Some(t) = cur {
            if !out.is_empty() && needs_space(&out, self.text(t)) {
                out.push(' ');
            }
            out.push_str(self.text(t));
            if t == end {
                break;
            }
            cur = self.next(t);
        }
        out
    }

    /// For a `<` token: find the matching `>` of a template argument list,
    /// or `None` when the `<` is a comparison. The search understands
    /// `>>`/`>>=` closing two levels in type context and collects named
    /// template parameters to avoid counting their uses as nested lists.
    pub fn find_closing_bracket(&self, tok: Token) -> Option<Token> {
        if self.text(tok) != "<" {
            return None;
        }
        let prev = self.prev(tok)?;
        let prev_is_operator = simple_match(self, self.tok_at(tok, -2), "operator")
            || simple_match(self, self.tok_at(tok, -3), "operator [ ]")
            || simple_match(self, self.tok_at(tok, -3), "operator ( )");
        if !(self[prev].is_name() || prev_is_operator) {
            return None;
        }

        let template_parameter = self.text_at(tok, -1) == "template";
        let mut template_parameters: Vec<String> = Vec::new();

        // Is this a declaration context (where >> always closes two)?
        let mut is_decl = true;
        let mut back = self.prev(tok);
        while let Some(p) = back {
            match self.text(p) {
                "=" => is_decl = false,
                ";" | "{" | "}" => break,
                "template" => {
                    if self.text_at(p, 1) == "<" {
                        is_decl = true;
                    }
                }
                _ => {}
            }
            back = self.prev(p);
        }

        let mut depth = 0u32;
        let mut cur = Some(tok);
        while let Some(closing) = cur {
            match self.text(closing) {
                "{" | "[" | "(" => {
                    cur = self.link(closing).and_then(|l| self.next(l));
                    if cur.is_none() {
                        return None;
                    }
                    continue;
                }
                "}" | "]" | ")" | ";" => return None,
                "<" => {
                    let name_before = self
                        .prev(closing)
                        .is_some_and(|p| self[p].is_name());
                    let known_parameter = template_parameter
                        && template_parameters
                            .iter()
                            .any(|p| p.as_str() == self.text_at(closing, -1));
                    if name_before && !known_parameter {
                        depth += 1;
                    }
                }
                ">" => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(closing);
                    }
                }
                ">>" | ">>=" => {
                    if !is_decl && depth == 1 {
                        cur = self.next(closing);
                        continue;
                    }
                    if depth <= 2 {
                        return Some(closing);
                    }
                    depth -= 2;
                }
                "," => {
                    if template_parameter && depth == 1 {
                        if let Some(p) = self.prev(closing) {
                            if self[p].is_name()
                                && !matches!(self.text(p), "class" | "typename")
                            {
                                template_parameters.push(self.text(p).to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
            cur = self.next(closing);
        }
        None
    }
}

fn needs_space(before: &str, next: &str) -> bool {
    let last = before.chars().last().unwrap_or(' ');
    let first = next.chars().next().unwrap_or(' ');
    (last.is_alphanumeric() || last == '_') && (first.is_alphanumeric() || first == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::token::TokenData;
    use crate::tokens::Language;

    fn list_of(words: &[&str]) -> (TokenList, Vec<Token>) {
        let mut list = TokenList::new(Language::Cpp);
        let toks: Vec<Token> = words
            .iter()
            .map(|w| list.push_back(TokenData::new(*w)))
            .collect();
        list.assign_indexes();
        (list, toks)
    }

    #[test]
    fn operand_setter_reparents() {
        // x + y
        let (mut list, toks) = list_of(&["x", "+", "y"]);
        list.set_ast_op1(toks[1], Some(toks[0])).unwrap();
        list.set_ast_op2(toks[1], Some(toks[2])).unwrap();
        assert_eq!(list.ast_parent(toks[0]), Some(toks[1]));
        assert_eq!(list.ast_parent(toks[2]), Some(toks[1]));
        assert_eq!(list.ast_op1(toks[1]), Some(toks[0]));
        assert!(list.is_binary_op(toks[1]));
    }

    #[test]
    fn operand_setter_detaches_old_operand() {
        let (mut list, toks) = list_of(&["a", "+", "b", "c"]);
        list.set_ast_op1(toks[1], Some(toks[0])).unwrap();
        list.set_ast_op1(toks[1], Some(toks[3])).unwrap();
        assert_eq!(list.ast_parent(toks[0]), None);
        assert_eq!(list.ast_parent(toks[3]), Some(toks[1]));
    }

    #[test]
    fn cycle_is_rejected() {
        let (mut list, toks) = list_of(&["a", "+"]);
        list.set_ast_op1(toks[1], Some(toks[0])).unwrap();
        // Making the parent an operand of its child closes a cycle.
        assert!(list.set_ast_op1(toks[0], Some(toks[1])).is_err());
    }

    #[test]
    fn ast_top_walks_to_root() {
        // 4 * x + 2 : ((4*x)+2)
        let (mut list, toks) = list_of(&["4", "*", "x", "+", "2"]);
        list.set_ast_op1(toks[1], Some(toks[0])).unwrap();
        list.set_ast_op2(toks[1], Some(toks[2])).unwrap();
        list.set_ast_op1(toks[3], Some(toks[1])).unwrap();
        list.set_ast_op2(toks[3], Some(toks[4])).unwrap();
        assert_eq!(list.ast_top(toks[0]), toks[3]);
        assert_eq!(list.ast_top(toks[4]), toks[3]);
    }

    #[test]
    fn unary_pre_op_detection() {
        let (mut list, toks) = list_of(&["!", "x"]);
        list.set_ast_op1(toks[0], Some(toks[1])).unwrap();
        assert!(list.is_unary_pre_op(toks[0]));
        assert!(list.is_unary_op(toks[0], "!"));
        assert!(!list.is_binary_op(toks[0]));
    }

    #[test]
    fn expression_start_end_simple() {
        let (mut list, toks) = list_of(&["a", "+", "b", ";"]);
        list.set_ast_op1(toks[1], Some(toks[0])).unwrap();
        list.set_ast_op2(toks[1], Some(toks[2])).unwrap();
        let (start, end) = list.find_expression_start_end(toks[1]);
        assert_eq!(start, toks[0]);
        assert_eq!(end, toks[2]);
        assert_eq!(list.expression_string(toks[1]), "a+b");
    }

    #[test]
    fn expression_start_end_skips_parens() {
        // ( a + b )
        let (mut list, toks) = list_of(&["(", "a", "+", "b", ")"]);
        list.create_mutual_links(toks[0], toks[4]);
        list.set_ast_op1(toks[2], Some(toks[1])).unwrap();
        list.set_ast_op2(toks[2], Some(toks[3])).unwrap();
        let (start, end) = list.find_expression_start_end(toks[2]);
        assert_eq!(start, toks[0]);
        assert_eq!(end, toks[4]);
    }

    #[test]
    fn template_bracket_matching() {
        // v < int > x ;  with a name before '<'
        let (mut list, toks) = list_of(&["v", "<", "int", ">", "x", ";"]);
        list[toks[0]].kind = crate::tokens::token::TokenKind::Name;
        assert_eq!(list.find_closing_bracket(toks[1]), Some(toks[3]));
    }

    #[test]
    fn shift_closes_two_template_levels() {
        // m < a < int >> x ;
        let (mut list, toks) = list_of(&["m", "<", "a", "<", "int", ">>", "x", ";"]);
        for t in [toks[0], toks[2]] {
            list[t].kind = crate::tokens::token::TokenKind::Name;
        }
        assert_eq!(list.find_closing_bracket(toks[1]), Some(toks[5]));
    }

    #[test]
    fn comparison_is_not_a_template_bracket() {
        // a < b ;  -- closes nothing
        let (mut list, toks) = list_of(&["a", "<", "b", ";"]);
        list[toks[0]].kind = crate::tokens::token::TokenKind::Name;
        assert_eq!(list.find_closing_bracket(toks[1]), None);
    }
}
