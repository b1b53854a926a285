//! Token list: arena ownership and the doubly linked chain.
//!
//! The `TokenList` owns every token of one translation unit in a
//! `PrimaryMap` arena. The chain order is kept in `prev`/`next` links,
//! terminated at both ends by `None`; `front`/`back` always name the true
//! ends. Deleting a token unlinks it but leaves the arena slot in place, so
//! outstanding `Token` references never dangle — they just refer to a node
//! that is no longer in the chain.

use cranelift_entity::PrimaryMap;

use super::token::{Token, TokenData, TokenKind};
use crate::error::{AnalysisError, AnalysisResult, ErrorLocation};

/// Language of the translation unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Language {
    /// Plain C.
    C,
    /// C++.
    Cpp,
}

/// The token list of one translation unit.
pub struct TokenList {
    arena: PrimaryMap<Token, TokenData>,
    front: Option<Token>,
    back: Option<Token>,
    files: Vec<String>,
    lang: Language,
}

impl std::ops::Index<Token> for TokenList {
    type Output = TokenData;

    fn index(&self, tok: Token) -> &TokenData {
        &self.arena[tok]
    }
}

impl std::ops::IndexMut<Token> for TokenList {
    fn index_mut(&mut self, tok: Token) -> &mut TokenData {
        &mut self.arena[tok]
    }
}

impl TokenList {
    /// New empty list.
    pub fn new(lang: Language) -> Self {
        TokenList {
            arena: PrimaryMap::new(),
            front: None,
            back: None,
            files: Vec::new(),
            lang,
        }
    }

    /// Language of the unit.
    pub fn language(&self) -> Language {
        self.lang
    }

    /// Is the unit C++?
    pub fn is_cpp(&self) -> bool {
        self.lang == Language::Cpp
    }

    /// Register a file path, returning its index.
    pub fn add_file(&mut self, path: impl Into<String>) -> u32 {
        self.files.push(path.into());
        (self.files.len() - 1) as u32
    }

    /// Path for a file index.
    pub fn file_name(&self, index: u32) -> &str {
        self.files
            .get(index as usize)
            .map_or("<unknown>", |s| s.as_str())
    }

    /// Path of the unit's main file.
    pub fn source_file(&self) -> &str {
        self.file_name(0)
    }

    /// First token of the chain.
    pub fn front(&self) -> Option<Token> {
        self.front
    }

    /// Last token of the chain.
    pub fn back(&self) -> Option<Token> {
        self.back
    }

    /// Number of arena slots (including unlinked tokens).
    pub fn arena_len(&self) -> usize {
        self.arena.len()
    }

    /// Next token in the chain.
    pub fn next(&self, tok: Token) -> Option<Token> {
        self.arena[tok].next.expand()
    }

    /// Previous token in the chain.
    pub fn prev(&self, tok: Token) -> Option<Token> {
        self.arena[tok].prev.expand()
    }

    /// Matched bracket partner.
    pub fn link(&self, tok: Token) -> Option<Token> {
        self.arena[tok].link.expand()
    }

    /// Text of a token.
    pub fn text(&self, tok: Token) -> &str {
        &self.arena[tok].text
    }

    /// The token `offset` steps away (negative = backwards).
    pub fn tok_at(&self, tok: Token, offset: i32) -> Option<Token> {
        let mut cur = Some(tok);
        if offset >= 0 {
            for _ in 0..offset {
                cur = self.next(cur?);
            }
        } else {
            for _ in 0..-offset {
                cur = self.prev(cur?);
            }
        }
        cur
    }

    /// Text of the token `offset` steps away, or `""`.
    pub fn text_at(&self, tok: Token, offset: i32) -> &str {
        self.tok_at(tok, offset).map_or("", |t| self.text(t))
    }

    /// Link partner of the token `offset` steps away.
    pub fn link_at(&self, tok: Token, offset: i32) -> Option<Token> {
        self.link(self.tok_at(tok, offset)?)
    }

    /// Source location of a token, for diagnostics.
    pub fn location(&self, tok: Token) -> ErrorLocation {
        let data = &self.arena[tok];
        ErrorLocation {
            file_index: data.file_index,
            line: data.line,
            column: data.column,
        }
    }

    /// Iterate the chain front to back. The iteration order is captured
    /// lazily, so the list must not be restructured while iterating; use a
    /// manual cursor loop for mutating passes.
    pub fn tokens(&self) -> TokenChainIter<'_> {
        TokenChainIter {
            list: self,
            cur: self.front,
        }
    }

    /// Append a token to the back of the chain.
    pub fn push_back(&mut self, mut data: TokenData) -> Token {
        data.prev = self.back.into();
        data.next = None.into();
        let tok = self.arena.push(data);
        if let Some(back) = self.back {
            self.arena[back].next = tok.into();
        } else {
            self.front = Some(tok);
        }
        self.back = Some(tok);
        tok
    }

    /// Splice a new token with text `text` after `tok` (before it when
    /// `prepend`). If `tok` currently has an empty string the new token
    /// takes its place instead and `tok` itself is returned.
    pub fn insert(&mut self, tok: Token, text: impl Into<String>, prepend: bool) -> Token {
        let text = text.into();
        if self.arena[tok].text.is_empty() {
            self.arena[tok].text = text;
            return tok;
        }
        let (file_index, line, column) = {
            let d = &self.arena[tok];
            (d.file_index, d.line, d.column)
        };
        let mut data = TokenData::new(text);
        data.file_index = file_index;
        data.line = line;
        data.column = column;
        let new = self.arena.push(data);
        if prepend {
            let prev = self.arena[tok].prev;
            self.arena[new].prev = prev;
            self.arena[new].next = tok.into();
            self.arena[tok].prev = new.into();
            match prev.expand() {
                Some(p) => self.arena[p].next = new.into(),
                None => self.front = Some(new),
            }
        } else {
            let next = self.arena[tok].next;
            self.arena[new].next = next;
            self.arena[new].prev = tok.into();
            self.arena[tok].next = new.into();
            match next.expand() {
                Some(n) => self.arena[n].prev = new.into(),
                None => self.back = Some(new),
            }
        }
        new
    }

    /// Unlink one token from the chain, clearing a partner's back link
    /// first so the mutual-link invariant holds.
    fn unlink(&mut self, tok: Token) {
        if let Some(partner) = self.arena[tok].link.expand() {
            if self.arena[partner].link.expand() == Some(tok) {
                self.arena[partner].link = None.into();
            }
        }
        let prev = self.arena[tok].prev;
        let next = self.arena[tok].next;
        match prev.expand() {
            Some(p) => self.arena[p].next = next,
            None => self.front = next.expand(),
        }
        match next.expand() {
            Some(n) => self.arena[n].prev = prev,
            None => self.back = prev.expand(),
        }
        let d = &mut self.arena[tok];
        d.prev = None.into();
        d.next = None.into();
        d.link = None.into();
    }

    /// Delete up to `count` tokens following `tok`.
    pub fn delete_next(&mut self, tok: Token, count: usize) {
        for _ in 0..count {
            match self.next(tok) {
                Some(n) => self.unlink(n),
                None => break,
            }
        }
    }

    /// Delete up to `count` tokens preceding `tok`.
    pub fn delete_prev(&mut self, tok: Token, count: usize) {
        for _ in 0..count {
            match self.prev(tok) {
                Some(p) => self.unlink(p),
                None => break,
            }
        }
    }

    /// Exchange the data of `tok` and its successor while keeping every
    /// external reference valid: link partners are retargeted to follow
    /// their data.
    pub fn swap_with_next(&mut self, tok: Token) -> AnalysisResult<()> {
        let next = self.next(tok).ok_or_else(|| {
            AnalysisError::internal_at(self.location(tok), "swap_with_next at end of list")
        })?;
        let mut a = std::mem::take(&mut self.arena[tok]);
        let mut b = std::mem::take(&mut self.arena[next]);
        std::mem::swap(&mut a.prev, &mut b.prev);
        std::mem::swap(&mut a.next, &mut b.next);
        std::mem::swap(&mut a.index, &mut b.index);
        self.arena[tok] = b;
        self.arena[next] = a;
        for t in [tok, next] {
            if let Some(partner) = self.arena[t].link.expand() {
                if partner == t {
                    // Mutually linked pair swapped onto itself.
                    let other = if t == tok { next } else { tok };
                    self.arena[t].link = other.into();
                } else if partner != tok && partner != next {
                    self.arena[partner].link = t.into();
                }
            }
        }
        Ok(())
    }

    /// Erase `tok` from the chain, semantically. Implemented by moving the
    /// successor's data into `tok` and deleting the successor (falling back
    /// to the predecessor at the end of the list), so external references
    /// to `tok` stay valid.
    pub fn erase(&mut self, tok: Token) {
        let (neighbour, took_next) = match self.next(tok) {
            Some(n) => (n, true),
            None => match self.prev(tok) {
                Some(p) => (p, false),
                None => {
                    self.unlink(tok);
                    return;
                }
            },
        };
        // The erased data's own bracket pair dissolves.
        if let Some(partner) = self.arena[tok].link.expand() {
            if self.arena[partner].link.expand() == Some(tok) {
                self.arena[partner].link = None.into();
            }
        }
        let mut moved = std::mem::take(&mut self.arena[neighbour]);
        let neighbour_prev = moved.prev;
        let neighbour_next = moved.next;
        {
            let own = &self.arena[tok];
            moved.prev = own.prev;
            moved.next = own.next;
            moved.index = own.index;
        }
        self.arena[tok] = moved;
        // Retarget the partner of the moved data.
        if let Some(partner) = self.arena[tok].link.expand() {
            if partner == tok {
                // tok and its neighbour were a mutual pair; the pair is gone.
                self.arena[tok].link = None.into();
            } else if self.arena[partner].link.expand() == Some(neighbour) {
                self.arena[partner].link = tok.into();
            }
        }
        // Skip the emptied neighbour slot in the chain.
        if took_next {
            self.arena[tok].next = neighbour_next;
            match neighbour_next.expand() {
                Some(a) => self.arena[a].prev = tok.into(),
                None => self.back = Some(tok),
            }
        } else {
            self.arena[tok].prev = neighbour_prev;
            match neighbour_prev.expand() {
                Some(b) => self.arena[b].next = tok.into(),
                None => self.front = Some(tok),
            }
        }
    }

    /// Splice the inclusive range `[first, last]` to just after `target`.
    pub fn move_range(&mut self, first: Token, last: Token, target: Token) {
        debug_assert_ne!(first, target);
        // Detach the range.
        let before = self.arena[first].prev;
        let after = self.arena[last].next;
        match before.expand() {
            Some(b) => self.arena[b].next = after,
            None => self.front = after.expand(),
        }
        match after.expand() {
            Some(a) => self.arena[a].prev = before,
            None => self.back = before.expand(),
        }
        // Splice after target.
        let tail = self.arena[target].next;
        self.arena[target].next = first.into();
        self.arena[first].prev = target.into();
        self.arena[last].next = tail;
        match tail.expand() {
            Some(t) => self.arena[t].prev = last.into(),
            None => self.back = Some(last),
        }
    }

    /// Splice the inclusive range `[first, last]` in place of `victim`,
    /// unlinking `victim`.
    pub fn replace_range(&mut self, victim: Token, first: Token, last: Token) {
        // Detach the range.
        let before = self.arena[first].prev;
        let after = self.arena[last].next;
        match before.expand() {
            Some(b) => self.arena[b].next = after,
            None => {
                if self.front == Some(first) {
                    self.front = after.expand();
                }
            }
        }
        match after.expand() {
            Some(a) => self.arena[a].prev = before,
            None => {
                if self.back == Some(last) {
                    self.back = before.expand();
                }
            }
        }
        // Wire the range where victim sat.
        let vprev = self.arena[victim].prev;
        let vnext = self.arena[victim].next;
        self.arena[first].prev = vprev;
        self.arena[last].next = vnext;
        match vprev.expand() {
            Some(p) => self.arena[p].next = first.into(),
            None => self.front = Some(first),
        }
        match vnext.expand() {
            Some(n) => self.arena[n].prev = last.into(),
            None => self.back = Some(last),
        }
        let d = &mut self.arena[victim];
        d.prev = None.into();
        d.next = None.into();
        d.link = None.into();
    }

    /// Establish mutual bracket links between `open` and `close`.
    pub fn create_mutual_links(&mut self, open: Token, close: Token) {
        self.arena[open].link = close.into();
        self.arena[close].link = open.into();
    }

    /// Assign monotonically increasing program-order indexes to the chain.
    /// Must be re-run after any restructuring before order comparisons.
    pub fn assign_indexes(&mut self) {
        let mut index = 0u32;
        let mut cur = self.front;
        while let Some(tok) = cur {
            self.arena[tok].index = index;
            index += 1;
            cur = self.next(tok);
        }
    }

    /// Does `a` come before `b` in program order? Relies on
    /// `assign_indexes`.
    pub fn precedes(&self, a: Token, b: Token) -> bool {
        self.arena[a].index < self.arena[b].index
    }

    /// Debug check of the chain invariants: `tok.next.prev == tok`, the
    /// ends match `front`/`back`, and link partners are mutual.
    pub fn check_chain(&self) -> AnalysisResult<()> {
        let mut prev: Option<Token> = None;
        let mut cur = self.front;
        while let Some(tok) = cur {
            if self.arena[tok].prev.expand() != prev {
                return Err(AnalysisError::internal_at(
                    self.location(tok),
                    format!("broken chain at '{}'", self.text(tok)),
                ));
            }
            if let Some(partner) = self.link(tok) {
                let back = self.link(partner);
                if back != Some(tok) && back.is_some() {
                    return Err(AnalysisError::internal_at(
                        self.location(tok),
                        format!("broken link pair at '{}'", self.text(tok)),
                    ));
                }
            }
            prev = cur;
            cur = self.next(tok);
        }
        if self.back != prev {
            return Err(AnalysisError::internal("back pointer out of date"));
        }
        Ok(())
    }
}

/// Iterator over the chain.
pub struct TokenChainIter<'a> {
    list: &'a TokenList,
    cur: Option<Token>,
}

impl Iterator for TokenChainIter<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let tok = self.cur?;
        self.cur = self.list.next(tok);
        Some(tok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(words: &[&str]) -> (TokenList, Vec<Token>) {
        let mut list = TokenList::new(Language::Cpp);
        let toks = words
            .iter()
            .map(|w| list.push_back(TokenData::new(*w)))
            .collect();
        (list, toks)
    }

    fn texts(list: &TokenList) -> Vec<String> {
        list.tokens().map(|t| list.text(t).to_string()).collect()
    }

    #[test]
    fn push_back_keeps_ends() {
        let (list, toks) = list_of(&["a", "b", "c"]);
        assert_eq!(list.front(), Some(toks[0]));
        assert_eq!(list.back(), Some(toks[2]));
        assert_eq!(texts(&list), ["a", "b", "c"]);
        list.check_chain().unwrap();
    }

    #[test]
    fn insert_after_and_before() {
        let (mut list, toks) = list_of(&["a", "c"]);
        list.insert(toks[0], "b", false);
        assert_eq!(texts(&list), ["a", "b", "c"]);
        list.insert(toks[0], "start", true);
        assert_eq!(texts(&list), ["start", "a", "b", "c"]);
        assert_eq!(list.text(list.front().unwrap()), "start");
        list.check_chain().unwrap();
    }

    #[test]
    fn insert_replaces_empty_token() {
        let (mut list, toks) = list_of(&["a", "", "c"]);
        let mid = list.insert(toks[1], "b", false);
        assert_eq!(mid, toks[1]);
        assert_eq!(texts(&list), ["a", "b", "c"]);
    }

    #[test]
    fn delete_next_unlinks_partners() {
        let (mut list, toks) = list_of(&["a", "(", ")", "b"]);
        list.create_mutual_links(toks[1], toks[2]);
        list.delete_next(toks[0], 2);
        assert_eq!(texts(&list), ["a", "b"]);
        // The close bracket's back link to the deleted open must be gone.
        assert_eq!(list.link(toks[2]), None);
        list.check_chain().unwrap();
    }

    #[test]
    fn delete_prev_fixes_front() {
        let (mut list, toks) = list_of(&["a", "b", "c"]);
        list.delete_prev(toks[1], 1);
        assert_eq!(list.front(), Some(toks[1]));
        assert_eq!(texts(&list), ["b", "c"]);
        list.check_chain().unwrap();
    }

    #[test]
    fn swap_with_next_retargets_links() {
        let (mut list, toks) = list_of(&["(", "x", ")", "y"]);
        list.create_mutual_links(toks[0], toks[2]);
        // Swap "x" and ")": afterwards the ")" data sits at toks[1].
        list.swap_with_next(toks[1]).unwrap();
        assert_eq!(texts(&list), ["(", ")", "x", "y"]);
        assert_eq!(list.link(toks[0]), Some(toks[1]));
        assert_eq!(list.link(toks[1]), Some(toks[0]));
        list.check_chain().unwrap();
    }

    #[test]
    fn swap_adjacent_mutual_pair() {
        let (mut list, toks) = list_of(&["(", ")"]);
        list.create_mutual_links(toks[0], toks[1]);
        list.swap_with_next(toks[0]).unwrap();
        assert_eq!(texts(&list), [")", "("]);
        assert_eq!(list.link(toks[0]), Some(toks[1]));
        assert_eq!(list.link(toks[1]), Some(toks[0]));
    }

    #[test]
    fn erase_keeps_external_reference_valid() {
        let (mut list, toks) = list_of(&["a", "b", "c"]);
        list.erase(toks[1]);
        // toks[1] now carries "c"'s data.
        assert_eq!(texts(&list), ["a", "c"]);
        assert_eq!(list.text(toks[1]), "c");
        assert_eq!(list.back(), Some(toks[1]));
        list.check_chain().unwrap();
    }

    #[test]
    fn erase_last_token_uses_predecessor() {
        let (mut list, toks) = list_of(&["a", "b"]);
        list.erase(toks[1]);
        assert_eq!(texts(&list), ["a"]);
        assert_eq!(list.text(toks[1]), "a");
        assert_eq!(list.front(), Some(toks[1]));
        assert_eq!(list.back(), Some(toks[1]));
        list.check_chain().unwrap();
    }

    #[test]
    fn move_range_splices() {
        let (mut list, toks) = list_of(&["a", "b", "c", "d"]);
        // Move [a, b] after d.
        list.move_range(toks[0], toks[1], toks[3]);
        assert_eq!(texts(&list), ["c", "d", "a", "b"]);
        assert_eq!(list.front(), Some(toks[2]));
        assert_eq!(list.back(), Some(toks[1]));
        list.check_chain().unwrap();
    }

    #[test]
    fn replace_range_deletes_victim() {
        let (mut list, toks) = list_of(&["x", "a", "b", "y"]);
        // Replace "x" by the range [a, b].
        list.replace_range(toks[0], toks[1], toks[2]);
        assert_eq!(texts(&list), ["a", "b", "y"]);
        assert_eq!(list.front(), Some(toks[1]));
        list.check_chain().unwrap();
    }

    #[test]
    fn indexes_give_program_order() {
        let (mut list, toks) = list_of(&["a", "b", "c"]);
        list.assign_indexes();
        assert!(list.precedes(toks[0], toks[2]));
        assert!(!list.precedes(toks[2], toks[0]));
    }

    #[test]
    fn tok_at_walks_both_ways() {
        let (list, toks) = list_of(&["a", "b", "c"]);
        assert_eq!(list.tok_at(toks[0], 2), Some(toks[2]));
        assert_eq!(list.tok_at(toks[2], -2), Some(toks[0]));
        assert_eq!(list.tok_at(toks[0], 5), None);
        assert_eq!(list.text_at(toks[0], 1), "b");
        assert_eq!(list.text_at(toks[0], 9), "");
    }
}
