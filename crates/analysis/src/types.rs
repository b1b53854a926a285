//! Expression type descriptors.
//!
//! A [`TypeInfo`] captures what the analysis needs to know about the static
//! type of an expression: signedness, base type, pointer depth, constness
//! and (for C++ containers) the container kind. It is attached to tokens by
//! the symbol pass and consulted by the value folder for truncation and
//! `sizeof` computation.

use crate::platform::Platform;
use crate::settings::Settings;
use crate::tokens::{Token, TokenList};

/// Signedness of an integral type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Sign {
    /// Not known or not applicable.
    #[default]
    Unknown,
    /// Signed.
    Signed,
    /// Unsigned.
    Unsigned,
}

/// Base type of an expression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum BaseType {
    /// Unknown type.
    #[default]
    Unknown,
    /// A non-standard (record) type.
    Record,
    /// An STL-like container; `TypeInfo::container` names which.
    Container,
    /// An iterator type.
    Iterator,
    /// `void`.
    Void,
    /// `bool` / `_Bool`.
    Bool,
    /// `char`.
    Char,
    /// `short`.
    Short,
    /// `wchar_t`.
    WcharT,
    /// `int`.
    Int,
    /// `long`.
    Long,
    /// `long long`.
    LongLong,
    /// `float`.
    Float,
    /// `double`.
    Double,
    /// `long double`.
    LongDouble,
}

/// Static type information for an expression or declaration.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeInfo {
    /// Signedness.
    pub sign: Sign,
    /// Base type.
    pub base: BaseType,
    /// Pointer indirection depth; `int **` has depth 2.
    pub pointer: u32,
    /// Constness bitfield per indirection level, innermost bit first.
    pub constness: u32,
    /// Reference type?
    pub reference: bool,
    /// For `BaseType::Container`: the container's library name, e.g.
    /// `std::vector`.
    pub container: Option<String>,
    /// True for enum types.
    pub is_enum: bool,
}

impl TypeInfo {
    /// A plain `int` of the platform's default signedness.
    pub fn plain_int() -> Self {
        TypeInfo {
            sign: Sign::Signed,
            base: BaseType::Int,
            ..TypeInfo::default()
        }
    }

    /// Is this an integral (non-pointer) type, `bool` through `long long`?
    pub fn is_integral(&self) -> bool {
        self.pointer == 0
            && matches!(
                self.base,
                BaseType::Bool
                    | BaseType::Char
                    | BaseType::Short
                    | BaseType::WcharT
                    | BaseType::Int
                    | BaseType::Long
                    | BaseType::LongLong
            )
    }

    /// Is this a floating type?
    pub fn is_float(&self) -> bool {
        self.pointer == 0
            && matches!(
                self.base,
                BaseType::Float | BaseType::Double | BaseType::LongDouble
            )
    }

    /// Is this type unsigned?
    pub fn is_unsigned(&self) -> bool {
        self.sign == Sign::Unsigned
    }

    /// Bit width of the integral base type on `platform`, or `None` for
    /// non-integral types.
    pub fn bit_width(&self, platform: &Platform) -> Option<u32> {
        if self.pointer > 0 {
            return Some(platform.sizeof_pointer * 8);
        }
        Some(match self.base {
            BaseType::Bool => 1,
            BaseType::Char => platform.char_bit,
            BaseType::Short => platform.short_bit,
            BaseType::WcharT => platform.sizeof_wchar_t * 8,
            BaseType::Int => platform.int_bit,
            BaseType::Long => platform.long_bit,
            BaseType::LongLong => platform.long_long_bit,
            _ => return None,
        })
    }
}

/// `sizeof` of a type on the configured platform, 0 when unknown.
pub fn get_size_of(ti: &TypeInfo, settings: &Settings) -> u64 {
    let p = &settings.platform;
    if ti.pointer > 0 || ti.reference {
        return u64::from(p.sizeof_pointer);
    }
    if ti.is_enum {
        return u64::from(p.sizeof_int);
    }
    u64::from(match ti.base {
        BaseType::Bool => p.sizeof_bool,
        BaseType::Char => 1,
        BaseType::Short => p.sizeof_short,
        BaseType::WcharT => p.sizeof_wchar_t,
        BaseType::Int => p.sizeof_int,
        BaseType::Long => p.sizeof_long,
        BaseType::LongLong => p.sizeof_long_long,
        BaseType::Float => p.sizeof_float,
        BaseType::Double => p.sizeof_double,
        BaseType::LongDouble => p.sizeof_long_double,
        _ => 0,
    })
}

/// Integral min/max on the configured platform. `None` for non-integral
/// types and for widths the payload cannot represent.
pub fn min_max_values(ti: &TypeInfo, platform: &Platform) -> Option<(i64, i64)> {
    if !ti.is_integral() {
        return None;
    }
    let bits = ti.bit_width(platform)?;
    if bits == 1 {
        Some((0, 1))
    } else if bits < 62 {
        if ti.sign == Sign::Unsigned {
            Some((0, (1i64 << bits) - 1))
        } else {
            Some((-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1))
        }
    } else if bits == 64 {
        if ti.sign == Sign::Unsigned {
            // The unsigned max is not representable in the payload.
            Some((0, i64::MAX))
        } else {
            Some((i64::MIN, i64::MAX))
        }
    } else {
        None
    }
}

/// Parse a declaration type starting at `tok`: `const`/`unsigned`/`signed`
/// qualifiers, standard base types (incl. two-word `long long`,
/// `unsigned char`, ...), `*` for pointers, `&` for references. Parsing
/// stops at the first token that cannot extend the type.
pub fn parse_decl(list: &TokenList, tok: Token, settings: &Settings) -> TypeInfo {
    let mut ti = TypeInfo::default();
    let mut cur = Some(tok);
    let mut seen_long = false;
    while let Some(t) = cur {
        match list.text(t) {
            "const" => ti.constness |= 1 << ti.pointer,
            "volatile" | "struct" | "union" | "enum" | "::" => {}
            "unsigned" => ti.sign = Sign::Unsigned,
            "signed" => ti.sign = Sign::Signed,
            "void" => ti.base = BaseType::Void,
            "bool" | "_Bool" => ti.base = BaseType::Bool,
            "char" => ti.base = BaseType::Char,
            "short" => ti.base = BaseType::Short,
            "wchar_t" => ti.base = BaseType::WcharT,
            "int" => {
                if !seen_long {
                    ti.base = BaseType::Int;
                }
            }
            "long" => {
                ti.base = if seen_long {
                    BaseType::LongLong
                } else {
                    BaseType::Long
                };
                seen_long = true;
            }
            "float" => ti.base = BaseType::Float,
            "double" => {
                ti.base = if seen_long {
                    BaseType::LongDouble
                } else {
                    BaseType::Double
                };
            }
            "size_t" => {
                ti.base = BaseType::Long;
                ti.sign = Sign::Unsigned;
            }
            "*" => {
                if ti.base == BaseType::Unknown {
                    break;
                }
                ti.pointer += 1;
            }
            "&" => {
                if ti.base == BaseType::Unknown {
                    break;
                }
                ti.reference = true;
            }
            name => {
                if ti.base != BaseType::Unknown {
                    break;
                }
                if name == "std" && list.text_at(t, 1) == "::" {
                    cur = list.next(t);
                    continue;
                }
                if let Some(container) = settings.library.container_full_name(list, t) {
                    ti.base = BaseType::Container;
                    ti.container = Some(container);
                    // Skip over the qualified name and any template
                    // argument list.
                    let mut skip = t;
                    while list.text_at(skip, 1) == "::" {
                        skip = match list.tok_at(skip, 2) {
                            Some(s) => s,
                            None => break,
                        };
                    }
                    if list.text_at(skip, 1) == "<" {
                        if let Some(close) = list.tok_at(skip, 1).and_then(|lt| list.link(lt)) {
                            cur = list.next(close);
                            continue;
                        }
                    }
                    cur = list.next(skip);
                    continue;
                }
                if name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_') {
                    ti.base = BaseType::Record;
                } else {
                    break;
                }
            }
        }
        cur = list.next(t);
    }
    if ti.sign == Sign::Unknown && ti.is_integral() && ti.base != BaseType::Bool {
        ti.sign = if ti.base == BaseType::Char && !settings.platform.default_sign_is_signed {
            Sign::Unsigned
        } else {
            Sign::Signed
        };
    }
    ti
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integral_classification() {
        let mut ti = TypeInfo::plain_int();
        assert!(ti.is_integral());
        assert!(!ti.is_float());
        ti.pointer = 1;
        assert!(!ti.is_integral());
    }

    #[test]
    fn size_of_pointer_ignores_pointee() {
        let settings = Settings::default();
        let char_ptr = TypeInfo {
            base: BaseType::Char,
            pointer: 1,
            ..TypeInfo::default()
        };
        let long_ptr = TypeInfo {
            base: BaseType::LongLong,
            pointer: 1,
            ..TypeInfo::default()
        };
        assert_eq!(get_size_of(&char_ptr, &settings), 8);
        assert_eq!(
            get_size_of(&char_ptr, &settings),
            get_size_of(&long_ptr, &settings)
        );
    }

    #[test]
    fn min_max_of_unsigned_char() {
        let ti = TypeInfo {
            sign: Sign::Unsigned,
            base: BaseType::Char,
            ..TypeInfo::default()
        };
        assert_eq!(min_max_values(&ti, &Platform::native()), Some((0, 255)));
    }

    #[test]
    fn min_max_of_bool() {
        let ti = TypeInfo {
            base: BaseType::Bool,
            ..TypeInfo::default()
        };
        assert_eq!(min_max_values(&ti, &Platform::native()), Some((0, 1)));
    }
}
