//! C/C++ lexer.
//!
//! Turns preprocessed source text into a linked [`TokenList`]: identifiers,
//! keywords, numeric/char/string literals (with encoding prefixes),
//! multi-character operators, bracket links for `()`, `[]` and `{}`.
//! Comments are stripped; template angle brackets are left unlinked (the
//! AST overlay resolves them on demand, see
//! [`TokenList::find_closing_bracket`](crate::tokens::TokenList)).

use crate::error::{AnalysisError, AnalysisResult};
use crate::tokens::{Language, Token, TokenData, TokenFlags, TokenKind, TokenList};

const KEYWORDS: &[&str] = &[
    "alignas", "alignof", "asm", "auto", "break", "case", "catch", "class", "const",
    "const_cast", "constexpr", "continue", "decltype", "default", "delete", "do", "double",
    "dynamic_cast", "else", "enum", "explicit", "extern", "false", "float", "for", "friend",
    "goto", "if", "inline", "int", "long", "mutable", "namespace", "new", "noexcept",
    "nullptr", "operator", "private", "protected", "public", "register", "reinterpret_cast",
    "return", "short", "signed", "sizeof", "static", "static_cast", "struct", "switch",
    "template", "this", "throw", "true", "try", "typedef", "typeid", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "wchar_t", "while",
];

const CONTROL_FLOW: &[&str] = &[
    "break", "case", "continue", "default", "do", "else", "for", "goto", "if", "return",
    "switch", "throw", "while",
];

const STD_TYPES: &[&str] = &[
    "bool", "_Bool", "char", "double", "float", "int", "long", "short", "size_t", "void",
    "wchar_t",
];

/// Three-or-two-or-one character operators, longest first.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "...", "->*", "::", "->", "++", "--", "<<", ">>", "<=", ">=", "==", "!=",
    "&&", "||", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "&",
    "|", "^", "~", "!", "<", ">", "=", "?", ":", ";", ",", ".", "(", ")", "[", "]", "{", "}",
];

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.src.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek_at(1) == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek_at(1) == Some(b'*') => {
                    self.bump();
                    self.bump();
                    while let Some(c) = self.bump() {
                        if c == b'*' && self.peek() == Some(b'/') {
                            self.bump();
                            break;
                        }
                    }
                }
                Some(b'#') => {
                    // Preprocessor remnants (the input is expected to be
                    // preprocessed): skip the directive line.
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_string_like(&mut self, quote: u8) -> String {
        let start = self.pos;
        self.bump(); // opening quote
        while let Some(c) = self.bump() {
            if c == b'\\' {
                self.bump();
            } else if c == quote {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn lex_number(&mut self) -> String {
        let start = self.pos;
        let mut prev = 0u8;
        while let Some(c) = self.peek() {
            let take = c.is_ascii_alphanumeric()
                || c == b'.'
                || c == b'_'
                || ((c == b'+' || c == b'-') && (prev == b'e' || prev == b'E'));
            if !take {
                break;
            }
            prev = c;
            self.bump();
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn lex_name(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                self.bump();
            } else {
                break;
            }
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }
}

fn classify_name(data: &mut TokenData) {
    let text = data.text.as_str();
    if KEYWORDS.contains(&text) || text == "_Bool" {
        data.kind = TokenKind::Keyword;
        if text == "true" || text == "false" {
            data.kind = TokenKind::Boolean;
            data.flags |= TokenFlags::LITERAL;
        }
    } else {
        data.kind = TokenKind::Name;
    }
    if STD_TYPES.contains(&text) {
        data.flags |= TokenFlags::STANDARD_TYPE;
    }
    if CONTROL_FLOW.contains(&text) {
        data.flags |= TokenFlags::CONTROL_FLOW_KEYWORD;
    }
    if text == "unsigned" {
        data.flags |= TokenFlags::UNSIGNED;
    } else if text == "signed" {
        data.flags |= TokenFlags::SIGNED;
    } else if text == "long" {
        data.flags |= TokenFlags::LONG;
    }
}

fn operator_kind(op: &str) -> TokenKind {
    match op {
        "=" | "+=" | "-=" | "*=" | "/=" | "%=" | "&=" | "|=" | "^=" | "<<=" | ">>=" => {
            TokenKind::AssignmentOp
        }
        "+" | "-" | "*" | "/" | "%" => TokenKind::ArithmeticOp,
        "&" | "|" | "^" | "~" | "<<" | ">>" => TokenKind::BitOp,
        "&&" | "||" | "!" => TokenKind::LogicalOp,
        "==" | "!=" | "<" | ">" | "<=" | ">=" => TokenKind::ComparisonOp,
        "++" | "--" => TokenKind::IncDecOp,
        "." | "," | "::" | "->" | "->*" | "?" | ":" => TokenKind::ExtendedOp,
        "(" | ")" | "[" | "]" | "{" | "}" => TokenKind::Bracket,
        "..." => TokenKind::Ellipsis,
        _ => TokenKind::Other,
    }
}

/// Tokenize `source` into a fresh list, link the brackets and assign
/// program-order indexes.
pub fn tokenize(source: &str, path: &str, lang: Language) -> AnalysisResult<TokenList> {
    let mut list = TokenList::new(lang);
    let file_index = list.add_file(path);
    let mut lexer = Lexer::new(source);

    loop {
        lexer.skip_trivia();
        let (line, column) = (lexer.line, lexer.column);
        let c = match lexer.peek() {
            Some(c) => c,
            None => break,
        };

        let mut data;
        if c == b'"' || c == b'\'' {
            let text = lexer.lex_string_like(c);
            data = TokenData::new(text);
            data.kind = if c == b'"' {
                TokenKind::String
            } else {
                TokenKind::Char
            };
            data.flags |= TokenFlags::LITERAL;
        } else if c.is_ascii_digit()
            || (c == b'.' && lexer.peek_at(1).is_some_and(|d| d.is_ascii_digit()))
        {
            let text = lexer.lex_number();
            data = TokenData::new(text);
            data.kind = TokenKind::Number;
            data.flags |= TokenFlags::LITERAL;
        } else if c.is_ascii_alphabetic() || c == b'_' {
            let text = lexer.lex_name();
            match lexer.peek() {
                // Encoding prefix directly attached to a literal?
                Some(quote @ (b'"' | b'\''))
                    if matches!(text.as_str(), "u8" | "u" | "U" | "L") =>
                {
                    let literal = lexer.lex_string_like(quote);
                    data = TokenData::new(format!("{text}{literal}"));
                    data.kind = if quote == b'"' {
                        TokenKind::String
                    } else {
                        TokenKind::Char
                    };
                    data.flags |= TokenFlags::LITERAL;
                    match text.as_str() {
                        "u8" => data.flags |= TokenFlags::UTF8,
                        "u" => data.flags |= TokenFlags::UTF16,
                        "U" => data.flags |= TokenFlags::UTF32,
                        "L" => data.flags |= TokenFlags::LONG,
                        _ => {}
                    }
                }
                _ => {
                    data = TokenData::new(text);
                    classify_name(&mut data);
                }
            }
        } else {
            let mut matched = None;
            for op in OPERATORS {
                if lexer.src[lexer.pos..].starts_with(op.as_bytes()) {
                    matched = Some(*op);
                    break;
                }
            }
            match matched {
                Some(op) => {
                    for _ in 0..op.len() {
                        lexer.bump();
                    }
                    data = TokenData::new(op);
                    data.kind = operator_kind(op);
                }
                None => {
                    lexer.bump();
                    data = TokenData::new((c as char).to_string());
                    data.kind = TokenKind::Other;
                }
            }
        }

        data.file_index = file_index;
        data.line = line;
        data.column = column;
        list.push_back(data);
    }

    link_brackets(&mut list)?;
    list.assign_indexes();
    Ok(list)
}

/// Create mutual links for `()`, `[]` and `{}`.
fn link_brackets(list: &mut TokenList) -> AnalysisResult<()> {
    let mut stack: Vec<Token> = Vec::new();
    let mut cur = list.front();
    while let Some(tok) = cur {
        match list.text(tok) {
            "(" | "[" | "{" => stack.push(tok),
            ")" | "]" | "}" => {
                let open = stack.pop().ok_or_else(|| {
                    AnalysisError::malformed(list.location(tok), "unmatched closing bracket")
                })?;
                let expected = match list.text(tok) {
                    ")" => "(",
                    "]" => "[",
                    _ => "{",
                };
                if list.text(open) != expected {
                    return Err(AnalysisError::malformed(
                        list.location(tok),
                        format!(
                            "mismatched brackets: '{}' closed by '{}'",
                            list.text(open),
                            list.text(tok)
                        ),
                    ));
                }
                list.create_mutual_links(open, tok);
            }
            _ => {}
        }
        cur = list.next(tok);
    }
    if let Some(open) = stack.pop() {
        return Err(AnalysisError::malformed(
            list.location(open),
            "unmatched opening bracket",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(list: &TokenList) -> Vec<String> {
        list.tokens().map(|t| list.text(t).to_string()).collect()
    }

    #[test]
    fn basic_statement() {
        let list = tokenize("int x = 10;", "test.c", Language::C).unwrap();
        assert_eq!(texts(&list), ["int", "x", "=", "10", ";"]);
        let toks: Vec<Token> = list.tokens().collect();
        assert_eq!(list[toks[0]].kind, TokenKind::Keyword);
        assert!(list[toks[0]].is_standard_type());
        assert_eq!(list[toks[1]].kind, TokenKind::Name);
        assert_eq!(list[toks[2]].kind, TokenKind::AssignmentOp);
        assert_eq!(list[toks[3]].kind, TokenKind::Number);
    }

    #[test]
    fn multi_char_operators() {
        let list = tokenize("a <<= b >> c->d;", "t.c", Language::C).unwrap();
        assert_eq!(texts(&list), ["a", "<<=", "b", ">>", "c", "->", "d", ";"]);
    }

    #[test]
    fn comments_are_stripped() {
        let list = tokenize("a /* x */ b // y\nc", "t.c", Language::C).unwrap();
        assert_eq!(texts(&list), ["a", "b", "c"]);
    }

    #[test]
    fn brackets_are_linked() {
        let list = tokenize("f(a[1]) { }", "t.c", Language::C).unwrap();
        let toks: Vec<Token> = list.tokens().collect();
        // f ( a [ 1 ] ) { }
        assert_eq!(list.link(toks[1]), Some(toks[6]));
        assert_eq!(list.link(toks[6]), Some(toks[1]));
        assert_eq!(list.link(toks[3]), Some(toks[5]));
        assert_eq!(list.link(toks[7]), Some(toks[8]));
        list.check_chain().unwrap();
    }

    #[test]
    fn unmatched_bracket_is_malformed_input() {
        assert!(tokenize("f(", "t.c", Language::C).is_err());
        assert!(tokenize("f)", "t.c", Language::C).is_err());
        assert!(tokenize("f(]", "t.c", Language::C).is_err());
    }

    #[test]
    fn literals_are_classified() {
        let list = tokenize("x = \"abc\" + 'a' + 1.5f + 0x10 + true;", "t.cpp", Language::Cpp)
            .unwrap();
        let toks: Vec<Token> = list.tokens().collect();
        assert_eq!(list[toks[2]].kind, TokenKind::String);
        assert_eq!(list[toks[4]].kind, TokenKind::Char);
        assert_eq!(list[toks[6]].kind, TokenKind::Number);
        assert_eq!(list[toks[8]].kind, TokenKind::Number);
        assert_eq!(list[toks[10]].kind, TokenKind::Boolean);
    }

    #[test]
    fn encoding_prefixes() {
        let list = tokenize("u8'a' u'a' U'a' L'a'", "t.cpp", Language::Cpp).unwrap();
        let toks: Vec<Token> = list.tokens().collect();
        assert!(list[toks[0]].flags.contains(TokenFlags::UTF8));
        assert!(list[toks[1]].flags.contains(TokenFlags::UTF16));
        assert!(list[toks[2]].flags.contains(TokenFlags::UTF32));
        assert!(list[toks[3]].flags.contains(TokenFlags::LONG));
    }

    #[test]
    fn line_and_column_positions() {
        let list = tokenize("a\n  b", "t.c", Language::C).unwrap();
        let toks: Vec<Token> = list.tokens().collect();
        assert_eq!((list[toks[0]].line, list[toks[0]].column), (1, 1));
        assert_eq!((list[toks[1]].line, list[toks[1]].column), (2, 3));
    }
}
