//! Array dimensions with partially-unknown sizes.
//!
//! A dimension is either `Known(n)` or `Unknown`. Arithmetic is lifted so
//! that any `Unknown` operand makes the result `Unknown`; operations that
//! would leave the non-negative integers (negative differences, division by
//! zero) also give `Unknown`.

use std::fmt;
use std::ops::{Add, Mul, Rem, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeElem {
    Known(usize),
    Unknown,
}

/// Ordered dimensions of an array, outermost first.
pub type Shape = Vec<ShapeElem>;

impl ShapeElem {
    pub fn value(self) -> Option<usize> {
        match self {
            ShapeElem::Known(n) => Some(n),
            ShapeElem::Unknown => None,
        }
    }

    pub fn is_known(self) -> bool {
        matches!(self, ShapeElem::Known(_))
    }

    fn lift(self, other: ShapeElem, f: impl FnOnce(usize, usize) -> Option<usize>) -> ShapeElem {
        match (self, other) {
            (ShapeElem::Known(a), ShapeElem::Known(b)) => {
                f(a, b).map_or(ShapeElem::Unknown, ShapeElem::Known)
            }
            _ => ShapeElem::Unknown,
        }
    }

    /// Floor division (`//`).
    pub fn floor_div(self, other: ShapeElem) -> ShapeElem {
        self.lift(other, usize::checked_div)
    }

    /// Lifted equality: `None` when either side is unknown.
    pub fn eq_lifted(self, other: ShapeElem) -> Option<bool> {
        match (self, other) {
            (ShapeElem::Known(a), ShapeElem::Known(b)) => Some(a == b),
            _ => None,
        }
    }

    /// `Known(n) ⊔ Known(n) = Known(n)`, anything else is `Unknown`.
    pub fn join(self, other: ShapeElem) -> ShapeElem {
        if self == other {
            self
        } else {
            ShapeElem::Unknown
        }
    }

    /// `Known(n) <: Unknown`, and every dimension is a subtype of itself.
    pub fn is_subtype_of(self, other: ShapeElem) -> bool {
        other == ShapeElem::Unknown || self == other
    }

    /// Dimensions are compatible unless both are known and differ.
    pub fn compatible(self, other: ShapeElem) -> bool {
        self.eq_lifted(other).unwrap_or(true)
    }

    /// The more precise of two compatible dimensions.
    pub fn refine(self, other: ShapeElem) -> ShapeElem {
        match self {
            ShapeElem::Known(_) => self,
            ShapeElem::Unknown => other,
        }
    }
}

impl From<usize> for ShapeElem {
    fn from(n: usize) -> Self {
        ShapeElem::Known(n)
    }
}

impl Add for ShapeElem {
    type Output = ShapeElem;

    fn add(self, rhs: ShapeElem) -> ShapeElem {
        self.lift(rhs, usize::checked_add)
    }
}

impl Sub for ShapeElem {
    type Output = ShapeElem;

    fn sub(self, rhs: ShapeElem) -> ShapeElem {
        self.lift(rhs, usize::checked_sub)
    }
}

impl Mul for ShapeElem {
    type Output = ShapeElem;

    fn mul(self, rhs: ShapeElem) -> ShapeElem {
        self.lift(rhs, usize::checked_mul)
    }
}

impl Rem for ShapeElem {
    type Output = ShapeElem;

    fn rem(self, rhs: ShapeElem) -> ShapeElem {
        self.lift(rhs, usize::checked_rem)
    }
}

impl fmt::Display for ShapeElem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeElem::Known(n) => write!(f, "{n}"),
            ShapeElem::Unknown => write!(f, "None"),
        }
    }
}

/// Shape with every dimension known.
pub fn known_shape(dims: &[usize]) -> Shape {
    dims.iter().copied().map(ShapeElem::Known).collect()
}

/// Shape of the given rank with every dimension unknown.
pub fn unknown_shape(rank: usize) -> Shape {
    vec![ShapeElem::Unknown; rank]
}

/// Number of elements, if every dimension is known.
pub fn num_elements(shape: &[ShapeElem]) -> ShapeElem {
    shape
        .iter()
        .fold(ShapeElem::Known(1), |acc, &dim| acc * dim)
}

/// Python tuple notation: `(3, None)`, `(4,)`, `()`.
pub fn display_shape(shape: &[ShapeElem]) -> String {
    match shape {
        [] => "()".to_string(),
        [single] => format!("({single},)"),
        dims => {
            let parts: Vec<String> = dims.iter().map(|d| d.to_string()).collect();
            format!("({})", parts.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShapeElem::{Known, Unknown};

    #[test]
    fn test_known_arithmetic() {
        assert_eq!(Known(3) + Known(4), Known(7));
        assert_eq!(Known(7) - Known(4), Known(3));
        assert_eq!(Known(3) * Known(4), Known(12));
        assert_eq!(Known(7).floor_div(Known(2)), Known(3));
        assert_eq!(Known(7) % Known(4), Known(3));
    }

    #[test]
    fn test_unknown_propagates() {
        assert_eq!(Known(3) + Unknown, Unknown);
        assert_eq!(Unknown + Known(3), Unknown);
        assert_eq!(Unknown + Unknown, Unknown);
        assert_eq!(Unknown.floor_div(Known(2)), Unknown);
        assert_eq!(Known(1).eq_lifted(Unknown), None);
    }

    #[test]
    fn test_out_of_range_results_are_unknown() {
        assert_eq!(Known(2) - Known(5), Unknown);
        assert_eq!(Known(2).floor_div(Known(0)), Unknown);
        assert_eq!(Known(2) % Known(0), Unknown);
    }

    #[test]
    fn test_join_and_subtype() {
        assert_eq!(Known(3).join(Known(3)), Known(3));
        assert_eq!(Known(3).join(Known(5)), Unknown);
        assert_eq!(Known(3).join(Unknown), Unknown);
        assert!(Known(3).is_subtype_of(Unknown));
        assert!(!Unknown.is_subtype_of(Known(3)));
        assert!(Known(3).is_subtype_of(Known(3)));
    }

    #[test]
    fn test_display_shape() {
        assert_eq!(display_shape(&[Known(3), Unknown]), "(3, None)");
        assert_eq!(display_shape(&[Known(4)]), "(4,)");
        assert_eq!(display_shape(&[]), "()");
        assert_eq!(num_elements(&known_shape(&[2, 3])), Known(6));
        assert_eq!(num_elements(&[Known(2), Unknown]), Unknown);
    }
}
