//! Token entity references and per-token data.
//!
//! Tokens reference each other constantly: previous/next neighbours, the
//! matched bracket, AST parents and operands, symbolic value referents.
//! These references are not Rust references — the graph is full of cycles
//! and 64-bit pointers would double the memory footprint. Instead a token
//! is a `u32` index into the arena owned by the
//! [`TokenList`](super::TokenList), and compact link fields use
//! `PackedOption<Token>` so an absent link costs nothing.

use cranelift_entity::packed_option::PackedOption;
use cranelift_entity::entity_impl;

use crate::symbols::{EnumeratorId, FuncId, ScopeId};
use crate::types::TypeInfo;
use crate::values::Value;

/// An opaque reference to a token in a token list's arena.
///
/// The numbering is stable for the lifetime of the list; deleting a token
/// unlinks it from the chain but never invalidates other references.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u32);
entity_impl!(Token, "tok");

/// The tag of a token, set by the tokenizer and refined by the symbol pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TokenKind {
    /// Not yet classified.
    #[default]
    None,
    /// An identifier.
    Name,
    /// A language keyword.
    Keyword,
    /// A type name.
    Type,
    /// A variable use (has a variable id).
    Variable,
    /// A function name.
    Function,
    /// A lambda introducer.
    Lambda,
    /// A numeric literal.
    Number,
    /// `true` / `false`.
    Boolean,
    /// A string literal.
    String,
    /// A character literal.
    Char,
    /// `=`, `+=`, `<<=`, ...
    AssignmentOp,
    /// `+ - * / %`.
    ArithmeticOp,
    /// `& | ^ ~ << >>`.
    BitOp,
    /// `&& || !`.
    LogicalOp,
    /// `== != < > <= >=`.
    ComparisonOp,
    /// `++` / `--`.
    IncDecOp,
    /// `. , :: ? :` and other punctuation with operand roles.
    ExtendedOp,
    /// `( ) [ ] { } < >` when used as brackets.
    Bracket,
    /// `...`.
    Ellipsis,
    /// Everything else.
    Other,
}

bitflags::bitflags! {
    /// Boolean properties of a token.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TokenFlags: u32 {
        /// Declared `unsigned`.
        const UNSIGNED = 1 << 0;
        /// Declared `signed`.
        const SIGNED = 1 << 1;
        /// Declared `long`.
        const LONG = 1 << 2;
        /// `_Complex`.
        const COMPLEX = 1 << 3;
        /// A literal token.
        const LITERAL = 1 << 4;
        /// A standard type keyword (`int`, `char`, ...).
        const STANDARD_TYPE = 1 << 5;
        /// Produced by macro expansion.
        const EXPANDED_MACRO = 1 << 6;
        /// `if`/`for`/`while`/`return`/... keyword.
        const CONTROL_FLOW_KEYWORD = 1 << 7;
        /// Inside a template argument list.
        const TEMPLATE_ARG = 1 << 8;
        /// A `(` that is a C-style cast.
        const CAST = 1 << 9;
        /// String/char literal with `u8` prefix.
        const UTF8 = 1 << 10;
        /// String/char literal with `u` prefix.
        const UTF16 = 1 << 11;
        /// String/char literal with `U` prefix.
        const UTF32 = 1 << 12;
        /// A comma that separates initializer-list entries.
        const INIT_COMMA = 1 << 13;
    }
}

/// The data carried by one token.
#[derive(Clone, Debug, Default)]
pub struct TokenData {
    /// The textual form.
    pub text: String,
    /// Classification tag.
    pub kind: TokenKind,
    /// Flag set.
    pub flags: TokenFlags,
    /// Variable identifier; 0 means none.
    pub var_id: u32,
    /// Expression identifier; 0 means none.
    pub expr_id: u32,
    /// Index into the list's file table.
    pub file_index: u32,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// Program-order index, assigned by `TokenList::assign_indexes`.
    pub index: u32,
    /// Previous token in the list.
    pub prev: PackedOption<Token>,
    /// Next token in the list.
    pub next: PackedOption<Token>,
    /// Matched bracket partner.
    pub link: PackedOption<Token>,
    /// AST parent.
    pub ast_parent: PackedOption<Token>,
    /// First AST operand.
    pub ast_op1: PackedOption<Token>,
    /// Second AST operand.
    pub ast_op2: PackedOption<Token>,
    /// Enclosing scope, set by the symbol pass.
    pub scope: PackedOption<ScopeId>,
    /// Called/declared function, set by the symbol pass.
    pub function: PackedOption<FuncId>,
    /// Enumerator record, set by the symbol pass.
    pub enumerator: PackedOption<EnumeratorId>,
    /// Static type of the expression rooted here.
    pub type_info: Option<TypeInfo>,
    /// Spelling before simplification (`->` stored on the `.` token).
    pub original_name: Option<String>,
    /// The value-flow facts known about this token. Absent means no facts.
    pub values: Option<Box<Vec<Value>>>,
}

impl TokenData {
    /// A fresh token with the given text, untagged.
    pub fn new(text: impl Into<String>) -> Self {
        TokenData {
            text: text.into(),
            ..TokenData::default()
        }
    }

    /// Name-like token: identifier, keyword, type, variable, function or
    /// boolean literal.
    pub fn is_name(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Name
                | TokenKind::Keyword
                | TokenKind::Type
                | TokenKind::Variable
                | TokenKind::Function
                | TokenKind::Boolean
        )
    }

    /// Is this a keyword?
    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Keyword
    }

    /// Numeric literal?
    pub fn is_number(&self) -> bool {
        self.kind == TokenKind::Number
    }

    /// String literal?
    pub fn is_string(&self) -> bool {
        self.kind == TokenKind::String
    }

    /// Character literal?
    pub fn is_char(&self) -> bool {
        self.kind == TokenKind::Char
    }

    /// Boolean literal?
    pub fn is_boolean(&self) -> bool {
        self.kind == TokenKind::Boolean
    }

    /// Any literal?
    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Number | TokenKind::String | TokenKind::Char | TokenKind::Boolean
        )
    }

    /// Any operator tag, including assignment and `++`/`--` (but not
    /// punctuation like `,` and `.`).
    pub fn is_op(&self) -> bool {
        self.is_const_op() || matches!(self.kind, TokenKind::AssignmentOp | TokenKind::IncDecOp)
    }

    /// Operator that does not modify its operands.
    pub fn is_const_op(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::ArithmeticOp
                | TokenKind::BitOp
                | TokenKind::ComparisonOp
                | TokenKind::LogicalOp
        )
    }

    /// `+ - * / %`?
    pub fn is_arithmetical_op(&self) -> bool {
        self.kind == TokenKind::ArithmeticOp
    }

    /// `== != < > <= >=`?
    pub fn is_comparison_op(&self) -> bool {
        self.kind == TokenKind::ComparisonOp
    }

    /// `= += -= ...`?
    pub fn is_assignment_op(&self) -> bool {
        self.kind == TokenKind::AssignmentOp
    }

    /// `++` / `--`?
    pub fn is_inc_dec_op(&self) -> bool {
        self.kind == TokenKind::IncDecOp
    }

    /// Standard type keyword?
    pub fn is_standard_type(&self) -> bool {
        self.flags.contains(TokenFlags::STANDARD_TYPE)
    }

    /// Declared unsigned?
    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(TokenFlags::UNSIGNED)
    }

    /// Produced by macro expansion?
    pub fn is_expanded_macro(&self) -> bool {
        self.flags.contains(TokenFlags::EXPANDED_MACRO)
    }

    /// Inside a template argument list?
    pub fn is_template_arg(&self) -> bool {
        self.flags.contains(TokenFlags::TEMPLATE_ARG)
    }

    /// A `(` known to be a cast?
    pub fn is_cast(&self) -> bool {
        self.flags.contains(TokenFlags::CAST)
    }

    /// A comma separating initializer-list entries?
    pub fn is_init_comma(&self) -> bool {
        self.flags.contains(TokenFlags::INIT_COMMA)
    }

    /// Control-flow keyword?
    pub fn is_control_flow_keyword(&self) -> bool {
        self.flags.contains(TokenFlags::CONTROL_FLOW_KEYWORD)
    }

    /// The spelling before simplification, or the current text.
    pub fn original_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or("")
    }

    /// The values attached to this token, empty when none are known.
    pub fn values(&self) -> &[Value] {
        self.values.as_deref().map_or(&[], |v| v.as_slice())
    }

    /// Drop all value-flow facts.
    pub fn clear_value_flow(&mut self) {
        self.values = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_token_has_no_facts() {
        let data = TokenData::new("x");
        assert!(data.values().is_empty());
        assert_eq!(data.kind, TokenKind::None);
        assert!(data.prev.is_none() && data.next.is_none());
    }

    #[test]
    fn operator_classification() {
        let mut data = TokenData::new("+");
        data.kind = TokenKind::ArithmeticOp;
        assert!(data.is_op());
        assert!(data.is_const_op());
        data.kind = TokenKind::AssignmentOp;
        assert!(data.is_op());
        assert!(!data.is_const_op());
    }
}
