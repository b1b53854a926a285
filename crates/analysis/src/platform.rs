//! Target platform description.
//!
//! The bit widths and `sizeof` values of the analyzed platform, not of the
//! host. `Unspecified` keeps common widths but makes width-sensitive facts
//! possible rather than known.

/// Platform family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlatformType {
    /// No platform selected; width-sensitive constants stay tentative.
    Unspecified,
    /// Native platform of the analyzer build (64-bit unix layout).
    Native,
    /// 32-bit Unix.
    Unix32,
    /// 64-bit Unix.
    Unix64,
    /// 32-bit Windows.
    Win32,
    /// 64-bit Windows.
    Win64,
}

/// Type widths of the analyzed platform.
#[derive(Clone, Debug)]
pub struct Platform {
    /// Platform family.
    pub platform_type: PlatformType,
    /// Bits in `char`.
    pub char_bit: u32,
    /// Bits in `short`.
    pub short_bit: u32,
    /// Bits in `int`.
    pub int_bit: u32,
    /// Bits in `long`.
    pub long_bit: u32,
    /// Bits in `long long`.
    pub long_long_bit: u32,
    /// `sizeof(bool)`.
    pub sizeof_bool: u32,
    /// `sizeof(short)`.
    pub sizeof_short: u32,
    /// `sizeof(int)`.
    pub sizeof_int: u32,
    /// `sizeof(long)`.
    pub sizeof_long: u32,
    /// `sizeof(long long)`.
    pub sizeof_long_long: u32,
    /// `sizeof(float)`.
    pub sizeof_float: u32,
    /// `sizeof(double)`.
    pub sizeof_double: u32,
    /// `sizeof(long double)`.
    pub sizeof_long_double: u32,
    /// `sizeof(wchar_t)`.
    pub sizeof_wchar_t: u32,
    /// `sizeof(size_t)`.
    pub sizeof_size_t: u32,
    /// Width of any data pointer. `sizeof(char *)` is this irrespective of
    /// the pointee.
    pub sizeof_pointer: u32,
    /// Whether plain `char` is signed.
    pub default_sign_is_signed: bool,
}

impl Platform {
    fn base(platform_type: PlatformType) -> Self {
        Platform {
            platform_type,
            char_bit: 8,
            short_bit: 16,
            int_bit: 32,
            long_bit: 64,
            long_long_bit: 64,
            sizeof_bool: 1,
            sizeof_short: 2,
            sizeof_int: 4,
            sizeof_long: 8,
            sizeof_long_long: 8,
            sizeof_float: 4,
            sizeof_double: 8,
            sizeof_long_double: 16,
            sizeof_wchar_t: 4,
            sizeof_size_t: 8,
            sizeof_pointer: 8,
            default_sign_is_signed: true,
        }
    }

    /// Platform with common widths but no committed family.
    pub fn unspecified() -> Self {
        Self::base(PlatformType::Unspecified)
    }

    /// The analyzer host's own layout.
    pub fn native() -> Self {
        Self::base(PlatformType::Native)
    }

    /// 32-bit Unix layout.
    pub fn unix32() -> Self {
        Platform {
            long_bit: 32,
            sizeof_long: 4,
            sizeof_size_t: 4,
            sizeof_pointer: 4,
            sizeof_long_double: 12,
            ..Self::base(PlatformType::Unix32)
        }
    }

    /// 64-bit Unix layout.
    pub fn unix64() -> Self {
        Self::base(PlatformType::Unix64)
    }

    /// 32-bit Windows layout.
    pub fn win32() -> Self {
        Platform {
            long_bit: 32,
            sizeof_long: 4,
            sizeof_size_t: 4,
            sizeof_pointer: 4,
            sizeof_wchar_t: 2,
            sizeof_long_double: 8,
            ..Self::base(PlatformType::Win32)
        }
    }

    /// 64-bit Windows layout (LLP64: `long` stays 32-bit).
    pub fn win64() -> Self {
        Platform {
            long_bit: 32,
            sizeof_long: 4,
            sizeof_wchar_t: 2,
            sizeof_long_double: 8,
            ..Self::base(PlatformType::Win64)
        }
    }

    /// Largest value of `signed char`.
    pub fn signed_char_max(&self) -> i64 {
        (1i64 << (self.char_bit - 1)) - 1
    }

    /// Smallest value of `signed char`.
    pub fn signed_char_min(&self) -> i64 {
        -(1i64 << (self.char_bit - 1))
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::native()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_widths() {
        let p = Platform::unix64();
        assert_eq!(p.long_bit, 64);
        assert_eq!(p.sizeof_pointer, 8);
        let p = Platform::win64();
        assert_eq!(p.long_bit, 32);
        assert_eq!(p.sizeof_pointer, 8);
        let p = Platform::unix32();
        assert_eq!(p.sizeof_pointer, 4);
    }

    #[test]
    fn signed_char_range() {
        let p = Platform::native();
        assert_eq!(p.signed_char_max(), 127);
        assert_eq!(p.signed_char_min(), -128);
    }
}
