use std::fmt;

use crate::semantics::Semantics;

/// Returns true iff the label names a category (non-terminal), i.e. is
/// marked with an initial '$'.
pub fn is_cat(label: &str) -> bool {
  label.starts_with('$')
}

/// Returns true iff the RHS item is optional, i.e. is marked with an
/// initial '?'.
pub fn is_optional(label: &str) -> bool {
  label.starts_with('?') && label.len() > 1
}

/// A CFG rule with a semantic attachment. Immutable once loaded into a
/// grammar; shared by every edge built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
  pub lhs: String,
  pub rhs: Vec<String>,
  pub sem: Semantics,
}

impl Rule {
  /// `rhs` is whitespace-separated: `Rule::new("$E", "$UnOp $E", ..)`.
  pub fn new(lhs: &str, rhs: &str, sem: Semantics) -> Self {
    Self {
      lhs: lhs.to_string(),
      rhs: rhs.split_whitespace().map(|s| s.to_string()).collect(),
      sem,
    }
  }

  /// True iff the RHS contains only words (terminals).
  pub fn is_lexical(&self) -> bool {
    self.rhs.iter().all(|s| !is_cat(s))
  }

  /// True iff the RHS is a single category.
  pub fn is_unary(&self) -> bool {
    self.rhs.len() == 1 && is_cat(&self.rhs[0])
  }

  /// True iff the RHS is exactly two categories.
  pub fn is_binary(&self) -> bool {
    self.rhs.len() == 2 && is_cat(&self.rhs[0]) && is_cat(&self.rhs[1])
  }

  pub fn contains_optionals(&self) -> bool {
    self.rhs.iter().any(|s| is_optional(s))
  }
}

/// The display form doubles as a stable feature name, so it includes value
/// semantics (which distinguish lexical entries like `minus` read as `~`
/// vs. `-`) but not combinator functions, which have no stable rendering.
impl fmt::Display for Rule {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Rule({} -> {}", self.lhs, self.rhs.join(" "))?;
    if let Semantics::Value(v) = &self.sem {
      write!(f, ", {}", v)?;
    }
    write!(f, ")")
  }
}
