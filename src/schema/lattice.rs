//! The column type lattice: `Empty ⊑ Boolean ⊑ Integer ⊑ Float ⊑ Date ⊑ String`.
//!
//! `Date` and the numeric types are not comparable: joining a date with anything
//! except `String` or `Empty` lands on `String`.
use serde::Serialize;
use std::fmt::Display;
use std::fmt::Formatter;

/// Inferred type of a column, ordered from most to least specific
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    #[default]
    Empty,
    Boolean,
    Integer,
    Float,
    Date,
    String,
}

impl ValueType {
    /// Least upper bound of two observations
    pub fn join(self, other: ValueType) -> ValueType {
        match (self, other) {
            (ValueType::Empty, other) | (other, ValueType::Empty) => other,
            (left, right) if left == right => left,
            (ValueType::Date, _) | (_, ValueType::Date) => ValueType::String,
            (left, right) => left.max(right),
        }
    }

    /// Returns true when joining `other` into `self` changes nothing
    pub fn accepts(self, other: ValueType) -> bool {
        self.join(other) == self
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Float)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Empty => "empty",
            ValueType::Boolean => "boolean",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Date => "date",
            ValueType::String => "string",
        }
    }
}

impl Display for ValueType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL: [ValueType; 6] = [
        ValueType::Empty,
        ValueType::Boolean,
        ValueType::Integer,
        ValueType::Float,
        ValueType::Date,
        ValueType::String,
    ];

    fn value_type() -> impl Strategy<Value = ValueType> {
        (0..ALL.len()).prop_map(|index| ALL[index])
    }

    #[test]
    fn widens_numbers_and_dates() {
        assert_eq!(ValueType::Boolean.join(ValueType::Integer), ValueType::Integer);
        assert_eq!(ValueType::Integer.join(ValueType::Float), ValueType::Float);
        assert_eq!(ValueType::Float.join(ValueType::Date), ValueType::String);
        assert_eq!(ValueType::Boolean.join(ValueType::Date), ValueType::String);
        assert_eq!(ValueType::Date.join(ValueType::Date), ValueType::Date);
        assert_eq!(ValueType::Empty.join(ValueType::Date), ValueType::Date);
        assert!(ValueType::String.accepts(ValueType::Date));
        assert!(!ValueType::Integer.accepts(ValueType::Float));
    }

    proptest! {
        #[test]
        fn join_is_commutative(left in value_type(), right in value_type()) {
            prop_assert_eq!(left.join(right), right.join(left));
        }

        #[test]
        fn join_is_associative(a in value_type(), b in value_type(), c in value_type()) {
            prop_assert_eq!(a.join(b).join(c), a.join(b.join(c)));
        }

        #[test]
        fn join_is_idempotent_with_empty_identity(value in value_type()) {
            prop_assert_eq!(value.join(value), value);
            prop_assert_eq!(value.join(ValueType::Empty), value);
        }

        #[test]
        fn fold_ignores_observation_order(mut values in prop::collection::vec(value_type(), 0..32), seed in any::<u64>()) {
            let forward = values.iter().fold(ValueType::Empty, |joined, value| joined.join(*value));
            let len = values.len().max(1);
            values.rotate_left((seed as usize) % len);
            values.reverse();
            let shuffled = values.iter().fold(ValueType::Empty, |joined, value| joined.join(*value));
            prop_assert_eq!(forward, shuffled);
        }
    }
}
