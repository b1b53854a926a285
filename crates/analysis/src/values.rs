//! The value model.
//!
//! A [`Value`] is one fact about the runtime result of a token's
//! expression. Facts come in four strengths (kinds): *possible*, *known*,
//! *impossible* and *inconclusive*. A non-impossible value with a bound
//! reads as a range fact (`Lower k` = "the value is ≥ k"); an impossible
//! value negates its own reading (`Impossible Point k` = "the value is
//! never k", `Impossible Lower k` = "the value is never ≥ k").

use crate::tokens::Token;

/// Strength of a fact.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ValueKind {
    /// May hold on some execution path.
    #[default]
    Possible,
    /// Holds on every path reaching the token.
    Known,
    /// Weakly supported; only reported when inconclusive mode is on.
    Inconclusive,
    /// The negation holds on every path.
    Impossible,
}

/// What the value describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// An integer result.
    #[default]
    Int,
    /// A floating result.
    Float,
    /// A token referent: string literal, brace list, array.
    Tok,
    /// Moved-from state.
    Moved,
    /// Uninitialized state.
    Uninit,
    /// Allocated buffer size in bytes.
    BufferSize,
    /// Container element count.
    ContainerSize,
    /// Iterator at the first element.
    IteratorStart,
    /// Iterator past the last element.
    IteratorEnd,
    /// Borrowed lifetime of another object.
    Lifetime,
    /// Equal to another expression plus a delta.
    Symbolic,
}

/// Whether the payload is an exact point or a range end.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Bound {
    /// Exactly the payload.
    #[default]
    Point,
    /// The payload is an inclusive upper bound.
    Upper,
    /// The payload is an inclusive lower bound.
    Lower,
}

/// How a moved-from value came to be.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MoveKind {
    /// Reinstated (e.g. `reset()` after a move).
    #[default]
    NonMoved,
    /// `std::move`.
    Moved,
    /// `std::forward`.
    Forwarded,
}

/// What kind of object a lifetime value borrows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LifetimeKind {
    /// A whole object.
    #[default]
    Object,
    /// A subobject (member).
    SubObject,
    /// A lambda capture.
    Lambda,
    /// An iterator into a container.
    Iterator,
    /// The address of an object.
    Address,
}

/// Where the borrowed object lives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LifetimeScope {
    /// A local variable.
    #[default]
    Local,
    /// A function argument.
    Argument,
    /// An object owned by a called function.
    SubFunction,
}

/// One step of the user-facing trail explaining a value.
pub type ErrorPathEntry = (Token, String);

/// One value-flow fact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Value {
    /// What is described.
    pub value_type: ValueType,
    /// Strength.
    pub kind: ValueKind,
    /// Point or range end.
    pub bound: Bound,
    /// Integer payload; also the symbolic delta.
    pub int_value: i64,
    /// Floating payload.
    pub float_value: f64,
    /// Token referent for `Tok`, `Lifetime` and `Symbolic` values.
    pub tok_value: Option<Token>,
    /// Pre-truncation value retained by implicit-conversion narrowing.
    pub wide_int_value: i64,
    /// The variable this fact is asserted about (0 = none).
    pub var_id: u32,
    /// That variable's concrete value for compound facts.
    pub var_value: i64,
    /// Levels of indirection (0 = the value itself).
    pub indirect: i32,
    /// Path label keeping mutually exclusive analysis paths apart.
    /// Negative paths never propagate.
    pub path: i64,
    /// Move kind for `Moved` values.
    pub move_kind: MoveKind,
    /// Lifetime kind for `Lifetime` values.
    pub lifetime_kind: LifetimeKind,
    /// Lifetime scope for `Lifetime` values.
    pub lifetime_scope: LifetimeScope,
    /// Originating condition token, if the fact is condition-derived.
    pub condition: Option<Token>,
    /// Value only holds under an unevaluated ternary condition.
    pub conditional: bool,
    /// Comes from a default argument.
    pub default_arg: bool,
    /// Comes from safe-checking assumptions.
    pub safe: bool,
    /// Member names the fact is restricted to (uninit tracking).
    pub subexpressions: Vec<String>,
    /// User-facing trail of how the fact arose.
    pub error_path: Vec<ErrorPathEntry>,
}

impl Value {
    /// A possible int value.
    pub fn new_int(value: i64) -> Self {
        Value {
            int_value: value,
            ..Value::default()
        }
    }

    /// A known int value.
    pub fn known_int(value: i64) -> Self {
        Value {
            int_value: value,
            kind: ValueKind::Known,
            ..Value::default()
        }
    }

    /// A possible int value derived from a condition.
    pub fn with_condition(condition: Token, value: i64) -> Self {
        Value {
            int_value: value,
            condition: Some(condition),
            ..Value::default()
        }
    }

    /// A known float value.
    pub fn known_float(value: f64) -> Self {
        Value {
            value_type: ValueType::Float,
            float_value: value,
            kind: ValueKind::Known,
            ..Value::default()
        }
    }

    /// Int fact?
    pub fn is_int_value(&self) -> bool {
        self.value_type == ValueType::Int
    }

    /// Float fact?
    pub fn is_float_value(&self) -> bool {
        self.value_type == ValueType::Float
    }

    /// Token-referent fact?
    pub fn is_tok_value(&self) -> bool {
        self.value_type == ValueType::Tok
    }

    /// Moved-from fact?
    pub fn is_moved_value(&self) -> bool {
        self.value_type == ValueType::Moved
    }

    /// Uninitialized fact?
    pub fn is_uninit_value(&self) -> bool {
        self.value_type == ValueType::Uninit
    }

    /// Buffer-size fact?
    pub fn is_buffer_size_value(&self) -> bool {
        self.value_type == ValueType::BufferSize
    }

    /// Container-size fact?
    pub fn is_container_size_value(&self) -> bool {
        self.value_type == ValueType::ContainerSize
    }

    /// Iterator fact?
    pub fn is_iterator_value(&self) -> bool {
        matches!(
            self.value_type,
            ValueType::IteratorStart | ValueType::IteratorEnd
        )
    }

    /// Lifetime fact?
    pub fn is_lifetime_value(&self) -> bool {
        self.value_type == ValueType::Lifetime
    }

    /// Symbolic fact?
    pub fn is_symbolic_value(&self) -> bool {
        self.value_type == ValueType::Symbolic
    }

    /// State-like fact (moved / uninit / lifetime) rather than a number.
    pub fn is_non_value(&self) -> bool {
        self.is_moved_value() || self.is_uninit_value() || self.is_lifetime_value()
    }

    /// Possible?
    pub fn is_possible(&self) -> bool {
        self.kind == ValueKind::Possible
    }

    /// Known?
    pub fn is_known(&self) -> bool {
        self.kind == ValueKind::Known
    }

    /// Impossible?
    pub fn is_impossible(&self) -> bool {
        self.kind == ValueKind::Impossible
    }

    /// Inconclusive?
    pub fn is_inconclusive(&self) -> bool {
        self.kind == ValueKind::Inconclusive
    }

    /// Mark known.
    pub fn set_known(&mut self) {
        self.kind = ValueKind::Known;
    }

    /// Mark possible.
    pub fn set_possible(&mut self) {
        self.kind = ValueKind::Possible;
    }

    /// Mark impossible.
    pub fn set_impossible(&mut self) {
        self.kind = ValueKind::Impossible;
    }

    /// Mark or unmark inconclusive.
    pub fn set_inconclusive(&mut self, inconclusive: bool) {
        if inconclusive {
            self.kind = ValueKind::Inconclusive;
        } else if self.kind == ValueKind::Inconclusive {
            self.kind = ValueKind::Possible;
        }
    }

    /// Demote a known fact to possible; other kinds are unchanged.
    pub fn change_known_to_possible(&mut self) {
        if self.is_known() {
            self.set_possible();
        }
    }

    /// Flip an upper bound to a lower bound and vice versa.
    pub fn invert_bound(&mut self) {
        self.bound = match self.bound {
            Bound::Upper => Bound::Lower,
            Bound::Lower => Bound::Upper,
            Bound::Point => Bound::Point,
        };
    }

    /// Replace the described range by its complement: `≤ 9` becomes
    /// `≥ 10`. Points are unchanged (their complement is "≠ point").
    pub fn invert_range(&mut self) {
        self.invert_bound();
        match self.bound {
            Bound::Lower => self.int_value = self.int_value.wrapping_add(1),
            Bound::Upper => self.int_value = self.int_value.wrapping_sub(1),
            Bound::Point => {}
        }
    }

    /// Shrink an excluded range by one (used when resolving a collision
    /// with a point fact).
    pub fn decrease_range(&mut self) {
        match self.bound {
            Bound::Lower => self.int_value = self.int_value.wrapping_add(1),
            Bound::Upper => self.int_value = self.int_value.wrapping_sub(1),
            Bound::Point => {}
        }
    }

    /// Same payload (ignoring kind and bound)?
    pub fn equal_value(&self, other: &Value) -> bool {
        if self.value_type != other.value_type {
            return false;
        }
        match self.value_type {
            ValueType::Int
            | ValueType::BufferSize
            | ValueType::ContainerSize
            | ValueType::IteratorStart
            | ValueType::IteratorEnd => self.int_value == other.int_value,
            ValueType::Float => self.float_value == other.float_value,
            ValueType::Tok | ValueType::Lifetime => self.tok_value == other.tok_value,
            ValueType::Moved => self.move_kind == other.move_kind,
            ValueType::Uninit => true,
            ValueType::Symbolic => {
                self.tok_value == other.tok_value && self.int_value == other.int_value
            }
        }
    }

    /// Numeric strictly-less comparison across int and float payloads.
    pub fn numeric_lt(&self, other: &Value) -> bool {
        let a = if self.is_float_value() {
            self.float_value
        } else {
            self.int_value as f64
        };
        let b = if other.is_float_value() {
            other.float_value
        } else {
            other.int_value as f64
        };
        a < b
    }

    /// Append one step to the user-facing trail.
    pub fn push_error_path(&mut self, tok: Token, info: impl Into<String>) {
        self.error_path.push((tok, info.into()));
    }

    /// Short "kind payload" string for diagnostics and the debug dump.
    pub fn info_string(&self) -> String {
        let payload = match self.value_type {
            ValueType::Float => format!("{}", self.float_value),
            ValueType::Moved => "<moved>".to_string(),
            ValueType::Uninit => "<uninit>".to_string(),
            ValueType::Lifetime => "<lifetime>".to_string(),
            ValueType::Tok => "<expr>".to_string(),
            ValueType::Symbolic => format!("<symbolic>+{}", self.int_value),
            _ => format!("{}", self.int_value),
        };
        match self.bound {
            Bound::Point => payload,
            Bound::Upper => format!("<={payload}"),
            Bound::Lower => format!(">={payload}"),
        }
    }
}

/// `value` transformed into the matching impossibility: the complement
/// range (or the point itself) marked impossible.
pub fn as_impossible(mut value: Value) -> Value {
    value.invert_range();
    value.set_impossible();
    value
}

/// Demote every known value in `values` to possible (optionally only at
/// one indirection level).
pub fn change_known_to_possible(values: &mut [Value], indirect: Option<i32>) {
    for v in values.iter_mut() {
        if indirect.is_some_and(|i| v.indirect != i) {
            continue;
        }
        v.change_known_to_possible();
    }
}

/// Remove impossible values (optionally only at one indirection level).
pub fn remove_impossible(values: &mut Vec<Value>, indirect: Option<i32>) {
    values.retain(|v| {
        if indirect.is_some_and(|i| v.indirect != i) {
            return true;
        }
        !v.is_impossible()
    });
}

/// Demote to possible: knowns weakened, impossibles removed.
pub fn lower_to_possible(values: &mut Vec<Value>, indirect: Option<i32>) {
    change_known_to_possible(values, indirect);
    remove_impossible(values, indirect);
}

/// Demote to inconclusive when inconclusive reporting is enabled,
/// otherwise drop the affected values entirely.
pub fn lower_to_inconclusive(values: &mut Vec<Value>, inconclusive_enabled: bool, indirect: Option<i32>) {
    if inconclusive_enabled {
        remove_impossible(values, indirect);
        for v in values.iter_mut() {
            if indirect.is_some_and(|i| v.indirect != i) {
                continue;
            }
            v.set_inconclusive(true);
        }
    } else {
        values.retain(|v| indirect.is_some_and(|i| v.indirect != i));
    }
}

/// Promote possible point values to known.
pub fn change_possible_to_known(values: &mut [Value], indirect: Option<i32>) {
    for v in values.iter_mut() {
        if indirect.is_some_and(|i| v.indirect != i) {
            continue;
        }
        if v.is_possible() && v.bound == Bound::Point {
            v.set_known();
        }
    }
}

/// Combine the bookkeeping of two operand values into a folded result:
/// strength, bound, path, conditions and trails.
pub fn combine_value_properties(value1: &Value, value2: &Value, result: &mut Value) {
    if value1.is_known() && value2.is_known() {
        result.set_known();
    } else if value1.is_impossible() || value2.is_impossible() {
        result.set_impossible();
    } else if value1.is_inconclusive() || value2.is_inconclusive() {
        result.set_inconclusive(true);
    } else {
        result.set_possible();
    }
    if value1.bound == value2.bound {
        result.bound = value1.bound;
    } else if value1.bound == Bound::Point {
        result.bound = value2.bound;
    } else if value2.bound == Bound::Point {
        result.bound = value1.bound;
    }
    result.condition = value1.condition.or(value2.condition);
    result.conditional = value1.conditional || value2.conditional;
    if value1.var_id != 0 {
        result.var_id = value1.var_id;
        result.var_value = value1.var_value;
    } else if value2.var_id != 0 {
        result.var_id = value2.var_id;
        result.var_value = value2.var_value;
    }
    result.path = if value1.path != 0 {
        value1.path
    } else {
        value2.path
    };
    result
        .error_path
        .extend(value1.error_path.iter().cloned());
    result
        .error_path
        .extend(value2.error_path.iter().cloned());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_range_complements_bounds() {
        let mut v = Value::new_int(9);
        v.bound = Bound::Upper;
        v.invert_range();
        assert_eq!(v.bound, Bound::Lower);
        assert_eq!(v.int_value, 10);
        v.invert_range();
        assert_eq!(v.bound, Bound::Upper);
        assert_eq!(v.int_value, 9);
    }

    #[test]
    fn as_impossible_on_point_keeps_payload() {
        let v = as_impossible(Value::new_int(0));
        assert!(v.is_impossible());
        assert_eq!(v.bound, Bound::Point);
        assert_eq!(v.int_value, 0);
    }

    #[test]
    fn lower_to_possible_weakens_and_prunes() {
        let mut values = vec![Value::known_int(1), as_impossible(Value::new_int(2))];
        lower_to_possible(&mut values, None);
        assert_eq!(values.len(), 1);
        assert!(values[0].is_possible());
    }

    #[test]
    fn change_possible_to_known_skips_bounds() {
        let mut point = Value::new_int(3);
        let mut bound = Value::new_int(4);
        bound.bound = Bound::Lower;
        let mut values = vec![point.clone(), bound.clone()];
        change_possible_to_known(&mut values, None);
        assert!(values[0].is_known());
        assert!(values[1].is_possible());
        point.set_known();
        bound.set_known();
    }

    #[test]
    fn combine_properties_strength() {
        let k1 = Value::known_int(1);
        let k2 = Value::known_int(2);
        let mut result = Value::new_int(3);
        combine_value_properties(&k1, &k2, &mut result);
        assert!(result.is_known());

        let mut result = Value::new_int(3);
        combine_value_properties(&k1, &Value::new_int(2), &mut result);
        assert!(result.is_possible());
    }

    #[test]
    fn inconclusive_round_trip() {
        let mut v = Value::new_int(5);
        v.set_inconclusive(true);
        assert!(v.is_inconclusive());
        v.set_inconclusive(false);
        assert!(v.is_possible());
    }
}
