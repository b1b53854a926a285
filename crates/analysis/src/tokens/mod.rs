//! The token graph: arena, linked chain, pattern matcher, AST overlay and
//! per-token value lists.

pub mod ast;
pub mod list;
pub mod matcher;
pub mod token;
pub mod values;

pub use list::{Language, TokenChainIter, TokenList};
pub use token::{Token, TokenData, TokenFlags, TokenKind};
