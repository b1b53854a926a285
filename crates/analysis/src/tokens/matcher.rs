//! Token pattern matching.
//!
//! Every analysis pass drives its token inspection through this mini-DSL.
//! A pattern is a space separated sequence of words, each matched against
//! one token:
//!
//! * `word` — literal equality,
//! * `a|b|c` — alternatives; an empty alternative (`a||b`) matches without
//!   consuming a token,
//! * `!!x` — any token except `x` (and there must be a token),
//! * `[abc]` — a single-character token from the class,
//! * `%var%`, `%varid%`, `%type%`, `%name%`, `%num%`, `%bool%`, `%str%`,
//!   `%char%`, `%any%`, `%op%`, `%cop%`, `%comp%`, `%or%`, `%oror%`,
//!   `%assign%` — token-class meta commands.
//!
//! The comparisons here dominate analyzer wall time; the implementation
//! walks the pattern bytes directly and never allocates. A malformed meta
//! command is an internal error that aborts analysis of the current unit.

use super::list::TokenList;
use super::token::Token;
use crate::error::{AnalysisError, AnalysisResult};

/// Match `pattern` literally, word for word, starting at `tok`.
pub fn simple_match(list: &TokenList, tok: Option<Token>, pattern: &str) -> bool {
    let mut cur = tok;
    for word in pattern.split(' ') {
        if word.is_empty() {
            continue;
        }
        match cur {
            Some(t) if list.text(t) == word => cur = list.next(t),
            _ => return false,
        }
    }
    true
}

/// Match `pattern` starting at `tok`, without a `%varid%` binding.
pub fn pat_match(list: &TokenList, tok: Option<Token>, pattern: &str) -> AnalysisResult<bool> {
    match_impl(list, tok, pattern, None)
}

/// Match `pattern` starting at `tok`; `%varid%` matches tokens whose
/// variable id equals `varid`. Calling with `varid == 0` is a programmer
/// error reported as an internal error.
pub fn pat_match_varid(
    list: &TokenList,
    tok: Option<Token>,
    pattern: &str,
    varid: u32,
) -> AnalysisResult<bool> {
    if varid == 0 {
        return Err(AnalysisError::internal(
            "match called with varid 0 (pattern misuse)",
        ));
    }
    match_impl(list, tok, pattern, Some(varid))
}

/// First token in `[start, end)` where `pattern` matches literally.
pub fn find_simple_match(
    list: &TokenList,
    start: Option<Token>,
    end: Option<Token>,
    pattern: &str,
) -> Option<Token> {
    let mut cur = start;
    while let Some(t) = cur {
        if end == Some(t) {
            return None;
        }
        if simple_match(list, Some(t), pattern) {
            return Some(t);
        }
        cur = list.next(t);
    }
    None
}

/// First token in `[start, end)` where `pattern` matches.
pub fn find_match(
    list: &TokenList,
    start: Option<Token>,
    end: Option<Token>,
    pattern: &str,
) -> AnalysisResult<Option<Token>> {
    let mut cur = start;
    while let Some(t) = cur {
        if end == Some(t) {
            return Ok(None);
        }
        if match_impl(list, Some(t), pattern, None)? {
            return Ok(Some(t));
        }
        cur = list.next(t);
    }
    Ok(None)
}

/// First token in `[start, end)` where `pattern` matches with a `%varid%`
/// binding.
pub fn find_match_varid(
    list: &TokenList,
    start: Option<Token>,
    end: Option<Token>,
    pattern: &str,
    varid: u32,
) -> AnalysisResult<Option<Token>> {
    if varid == 0 {
        return Err(AnalysisError::internal(
            "find_match called with varid 0 (pattern misuse)",
        ));
    }
    let mut cur = start;
    while let Some(t) = cur {
        if end == Some(t) {
            return Ok(None);
        }
        if match_impl(list, Some(t), pattern, Some(varid))? {
            return Ok(Some(t));
        }
        cur = list.next(t);
    }
    Ok(None)
}

fn match_impl(
    list: &TokenList,
    tok: Option<Token>,
    pattern: &str,
    varid: Option<u32>,
) -> AnalysisResult<bool> {
    let mut cur = tok;
    for word in pattern.split(' ') {
        if word.is_empty() {
            continue;
        }

        let t = match cur {
            Some(t) => t,
            None => {
                // Out of tokens: only a negation can still succeed.
                if word.starts_with("!!") && word.len() > 2 {
                    continue;
                }
                return Ok(false);
            }
        };

        // Character class.
        if let Some(class) = word.strip_prefix('[').and_then(|w| w.strip_suffix(']')) {
            if !class.is_empty() {
                let text = list.text(t);
                let mut chars = text.chars();
                let (c, rest) = (chars.next(), chars.next());
                let single = rest.is_none();
                let hit = single && c.is_some_and(|c| class.contains(c));
                if !hit {
                    return Ok(false);
                }
                cur = list.next(t);
                continue;
            }
        }

        // Negation.
        if let Some(forbidden) = word.strip_prefix("!!") {
            if !forbidden.is_empty() {
                if list.text(t) == forbidden {
                    return Ok(false);
                }
                cur = list.next(t);
                continue;
            }
        }

        // Alternatives (a single word is a one-element alternation).
        match multi_compare(list, t, word, varid)? {
            MultiMatch::Hit => cur = list.next(t),
            MultiMatch::EmptyAlternative => {} // same token next round
            MultiMatch::Miss => return Ok(false),
        }
    }
    Ok(true)
}

enum MultiMatch {
    Hit,
    EmptyAlternative,
    Miss,
}

fn multi_compare(
    list: &TokenList,
    t: Token,
    word: &str,
    varid: Option<u32>,
) -> AnalysisResult<MultiMatch> {
    let mut empty_alternative = false;
    for alt in word.split('|') {
        if alt.is_empty() {
            empty_alternative = true;
            continue;
        }
        if alt.starts_with('%') && alt.ends_with('%') && alt.len() > 2 {
            if meta_matches(list, t, alt, varid)? {
                return Ok(MultiMatch::Hit);
            }
        } else if list.text(t) == alt {
            return Ok(MultiMatch::Hit);
        }
    }
    if empty_alternative {
        Ok(MultiMatch::EmptyAlternative)
    } else {
        Ok(MultiMatch::Miss)
    }
}

fn meta_matches(
    list: &TokenList,
    t: Token,
    command: &str,
    varid: Option<u32>,
) -> AnalysisResult<bool> {
    let data = &list[t];
    Ok(match command {
        "%var%" => data.var_id > 0,
        "%varid%" => match varid {
            Some(id) => data.var_id == id,
            None => {
                return Err(AnalysisError::internal_at(
                    list.location(t),
                    "%varid% used without a variable id",
                ));
            }
        },
        "%type%" => data.is_name() && data.var_id == 0 && (!data.is_keyword() || data.is_standard_type()),
        "%name%" => data.is_name(),
        "%num%" => data.is_number(),
        "%bool%" => data.is_boolean(),
        "%str%" => data.is_string(),
        "%char%" => data.is_char(),
        "%any%" => true,
        "%op%" => data.is_op(),
        "%cop%" => data.is_const_op(),
        "%comp%" => data.is_comparison_op(),
        "%or%" => data.text == "|",
        "%oror%" => data.text == "||",
        "%assign%" => data.is_assignment_op(),
        _ => {
            return Err(AnalysisError::internal_at(
                list.location(t),
                format!("unhandled meta command '{command}' in pattern"),
            ));
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokens::token::{TokenData, TokenKind};
    use crate::tokens::Language;

    fn make_list(spec: &[(&str, TokenKind, u32)]) -> (TokenList, Vec<Token>) {
        let mut list = TokenList::new(Language::Cpp);
        let toks = spec
            .iter()
            .map(|(text, kind, var_id)| {
                let mut data = TokenData::new(*text);
                data.kind = *kind;
                data.var_id = *var_id;
                list.push_back(data)
            })
            .collect();
        (list, toks)
    }

    #[test]
    fn literal_words() {
        let (list, toks) = make_list(&[
            ("if", TokenKind::Keyword, 0),
            ("(", TokenKind::Bracket, 0),
        ]);
        assert!(simple_match(&list, Some(toks[0]), "if ("));
        assert!(!simple_match(&list, Some(toks[0]), "while ("));
        assert!(!simple_match(&list, Some(toks[1]), "( )"));
        assert!(simple_match(&list, None, ""));
    }

    #[test]
    fn alternatives() {
        let (list, toks) = make_list(&[("void", TokenKind::Keyword, 0)]);
        assert!(pat_match(&list, Some(toks[0]), "int|void|char").unwrap());
        assert!(!pat_match(&list, Some(toks[0]), "int|char").unwrap());
    }

    #[test]
    fn empty_alternative_consumes_nothing() {
        let (list, toks) = make_list(&[
            ("b", TokenKind::Name, 0),
            (";", TokenKind::Other, 0),
        ]);
        // "a||b" matches "b" via the empty alternative followed by "b"? No:
        // the empty alternative matches at the first word without consuming,
        // then the next word must match the same token.
        assert!(pat_match(&list, Some(toks[0]), "a|| b ;").unwrap());
        assert!(pat_match(&list, Some(toks[0]), "b ;").unwrap());
    }

    #[test]
    fn negation() {
        let (list, toks) = make_list(&[("{", TokenKind::Bracket, 0)]);
        assert!(pat_match(&list, Some(toks[0]), "!!else").unwrap());
        assert!(!pat_match(&list, Some(toks[0]), "!!{").unwrap());
        // Negation succeeds at the end of the list.
        assert!(pat_match(&list, None, "!!else").unwrap());
    }

    #[test]
    fn char_class() {
        let (list, toks) = make_list(&[(")", TokenKind::Bracket, 0)]);
        assert!(pat_match(&list, Some(toks[0]), "[)}]").unwrap());
        assert!(!pat_match(&list, Some(toks[0]), "[({]").unwrap());
    }

    #[test]
    fn var_and_varid() {
        let (list, toks) = make_list(&[("x", TokenKind::Variable, 3)]);
        assert!(pat_match(&list, Some(toks[0]), "%var%").unwrap());
        assert!(pat_match_varid(&list, Some(toks[0]), "%varid%", 3).unwrap());
        assert!(!pat_match_varid(&list, Some(toks[0]), "%varid%", 4).unwrap());
        assert!(pat_match_varid(&list, Some(toks[0]), "%varid%", 0).is_err());
        assert!(pat_match(&list, Some(toks[0]), "%varid%").is_err());
    }

    #[test]
    fn operator_classes() {
        let (list, toks) = make_list(&[
            ("<", TokenKind::ComparisonOp, 0),
            ("=", TokenKind::AssignmentOp, 0),
            ("||", TokenKind::LogicalOp, 0),
            ("|", TokenKind::BitOp, 0),
        ]);
        assert!(pat_match(&list, Some(toks[0]), "%comp%").unwrap());
        assert!(pat_match(&list, Some(toks[0]), "%cop%").unwrap());
        assert!(pat_match(&list, Some(toks[1]), "%assign%").unwrap());
        assert!(!pat_match(&list, Some(toks[1]), "%cop%").unwrap());
        assert!(pat_match(&list, Some(toks[2]), "%oror%").unwrap());
        assert!(pat_match(&list, Some(toks[3]), "%or%").unwrap());
        assert!(!pat_match(&list, Some(toks[3]), "%oror%").unwrap());
    }

    #[test]
    fn type_excludes_variables() {
        let (list, toks) = make_list(&[
            ("int", TokenKind::Keyword, 0),
            ("x", TokenKind::Variable, 1),
        ]);
        // Keyword "int" without the standard-type flag is not a %type%.
        assert!(!pat_match(&list, Some(toks[0]), "%type%").unwrap());
        let mut list = list;
        list[toks[0]].flags |= crate::tokens::token::TokenFlags::STANDARD_TYPE;
        assert!(pat_match(&list, Some(toks[0]), "%type%").unwrap());
        assert!(!pat_match(&list, Some(toks[1]), "%type%").unwrap());
    }

    #[test]
    fn malformed_meta_command_is_internal_error() {
        let (list, toks) = make_list(&[("x", TokenKind::Name, 0)]);
        assert!(pat_match(&list, Some(toks[0]), "%bogus%").is_err());
    }

    #[test]
    fn find_match_scans_range() {
        let (list, toks) = make_list(&[
            ("a", TokenKind::Name, 1),
            ("=", TokenKind::AssignmentOp, 0),
            ("5", TokenKind::Number, 0),
        ]);
        let hit = find_match(&list, Some(toks[0]), None, "%num%").unwrap();
        assert_eq!(hit, Some(toks[2]));
        let miss = find_match(&list, Some(toks[0]), Some(toks[2]), "%num%").unwrap();
        assert_eq!(miss, None);
        let hit = find_simple_match(&list, Some(toks[0]), None, "= 5");
        assert_eq!(hit, Some(toks[1]));
    }
}
