use core::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

/// State of a single (customer, product) cart line.
///
/// A line is either absent or present with a quantity of at least one. There is
/// no representation for a zero-quantity line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "quantity", rename_all = "lowercase")]
pub enum LineState {
    #[default]
    Absent,
    Present(NonZeroU32),
}

/// Row-level change needed to move storage from one state to another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineWrite {
    Insert(NonZeroU32),
    Update(NonZeroU32),
    Delete,
}

impl LineState {
    /// State for a stored quantity (`0` means no row).
    pub fn from_quantity(quantity: u32) -> Self {
        match NonZeroU32::new(quantity) {
            Some(q) => Self::Present(q),
            None => Self::Absent,
        }
    }

    pub fn quantity(self) -> u32 {
        match self {
            Self::Absent => 0,
            Self::Present(q) => q.get(),
        }
    }

    pub fn is_present(self) -> bool {
        matches!(self, Self::Present(_))
    }

    /// ABSENT -> PRESENT(delta); PRESENT(q) -> PRESENT(q + delta).
    pub fn add(self, delta: u32) -> DomainResult<Self> {
        let delta = NonZeroU32::new(delta)
            .ok_or_else(|| DomainError::validation("quantity must be at least 1"))?;

        match self {
            Self::Absent => Ok(Self::Present(delta)),
            Self::Present(q) => q
                .checked_add(delta.get())
                .map(Self::Present)
                .ok_or_else(|| DomainError::validation("cart quantity overflow")),
        }
    }

    /// PRESENT(1) -> ABSENT; PRESENT(q) -> PRESENT(q - 1); ABSENT is an error.
    pub fn remove(self) -> DomainResult<Self> {
        match self {
            Self::Absent => Err(DomainError::invalid_transition(
                "cannot remove from a line that is not in the cart",
            )),
            Self::Present(q) => Ok(Self::from_quantity(q.get() - 1)),
        }
    }

    /// The single-row write that turns `self` into `next`, if any.
    pub fn write_to(self, next: LineState) -> Option<LineWrite> {
        match (self, next) {
            (Self::Absent, Self::Absent) => None,
            (Self::Absent, Self::Present(q)) => Some(LineWrite::Insert(q)),
            (Self::Present(_), Self::Absent) => Some(LineWrite::Delete),
            (Self::Present(a), Self::Present(b)) if a == b => None,
            (Self::Present(_), Self::Present(b)) => Some(LineWrite::Update(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(q: u32) -> LineState {
        LineState::from_quantity(q)
    }

    #[test]
    fn add_to_absent_creates_line() {
        assert_eq!(LineState::Absent.add(2).unwrap(), present(2));
    }

    #[test]
    fn add_to_present_merges_quantity() {
        assert_eq!(present(2).add(3).unwrap(), present(5));
    }

    #[test]
    fn add_zero_is_rejected() {
        let err = present(2).add(0).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn add_overflow_is_rejected() {
        assert!(present(u32::MAX).add(1).is_err());
    }

    #[test]
    fn remove_last_unit_deletes_line() {
        assert_eq!(present(1).remove().unwrap(), LineState::Absent);
    }

    #[test]
    fn remove_decrements() {
        assert_eq!(present(4).remove().unwrap(), present(3));
    }

    #[test]
    fn remove_from_absent_is_an_error() {
        let err = LineState::Absent.remove().unwrap_err();
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn write_to_maps_transitions_to_row_writes() {
        assert_eq!(
            LineState::Absent.write_to(present(2)),
            Some(LineWrite::Insert(NonZeroU32::new(2).unwrap()))
        );
        assert_eq!(
            present(2).write_to(present(5)),
            Some(LineWrite::Update(NonZeroU32::new(5).unwrap()))
        );
        assert_eq!(present(1).write_to(LineState::Absent), Some(LineWrite::Delete));
        assert_eq!(present(3).write_to(present(3)), None);
        assert_eq!(LineState::Absent.write_to(LineState::Absent), None);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: without removals, the final quantity is the sum of all adds.
            #[test]
            fn adds_sum_up(deltas in proptest::collection::vec(1u32..1000, 1..50)) {
                let mut state = LineState::Absent;
                for d in &deltas {
                    state = state.add(*d).unwrap();
                }
                let expected: u32 = deltas.iter().sum();
                prop_assert_eq!(state.quantity(), expected);
            }

            /// Property: q removals take PRESENT(q) to ABSENT, and one more fails.
            #[test]
            fn removals_drain_to_absent(q in 1u32..200) {
                let mut state = LineState::from_quantity(q);
                for _ in 0..q {
                    prop_assert!(state.is_present());
                    state = state.remove().unwrap();
                }
                prop_assert_eq!(state, LineState::Absent);
                prop_assert!(state.remove().is_err());
            }

            /// Property: no sequence of operations produces a zero-quantity present line.
            #[test]
            fn never_present_with_zero(ops in proptest::collection::vec(prop_oneof![
                (1u32..10).prop_map(Some),
                Just(None),
            ], 0..100)) {
                let mut state = LineState::Absent;
                for op in ops {
                    let next = match op {
                        Some(delta) => state.add(delta),
                        None => state.remove(),
                    };
                    if let Ok(next) = next {
                        state = next;
                    }
                    if let LineState::Present(q) = state {
                        prop_assert!(q.get() >= 1);
                    }
                }
            }
        }
    }
}
