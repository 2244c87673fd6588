use std::fmt;
use std::rc::Rc;

use crate::utils::Err;

/// A semantic form, and also the denotation an executor evaluates it to.
///
/// Applications are encoded s-expression style as lists, so the semantics of
/// "two plus three" is `(+ 2 3)`:
///
/// ```
/// use parsnip::semantics::Sem;
///
/// let sem = Sem::List(vec![Sem::str("+"), Sem::Int(2), Sem::Int(3)]);
/// assert_eq!(sem.to_string(), "(+ 2 3)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sem {
  Int(i64),
  Str(String),
  List(Vec<Sem>),
  /// Placeholder a combinator receives for an elided optional RHS element
  Null,
}

impl Sem {
  pub fn str(s: impl Into<String>) -> Self {
    Self::Str(s.into())
  }

  pub fn int(&self) -> Option<i64> {
    match self {
      Self::Int(n) => Some(*n),
      _ => None,
    }
  }

  pub fn items(&self) -> Option<&[Sem]> {
    match self {
      Self::List(items) => Some(items),
      _ => None,
    }
  }
}

impl From<i64> for Sem {
  fn from(n: i64) -> Self {
    Self::Int(n)
  }
}

impl From<&str> for Sem {
  fn from(s: &str) -> Self {
    Self::str(s)
  }
}

impl fmt::Display for Sem {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Int(n) => write!(f, "{}", n),
      Self::Str(s) => write!(f, "{}", s),
      Self::List(items) => {
        write!(f, "(")?;
        for (idx, item) in items.iter().enumerate() {
          if idx > 0 {
            write!(f, " ")?;
          }
          write!(f, "{}", item)?;
        }
        write!(f, ")")
      }
      Self::Null => write!(f, "null"),
    }
  }
}

/// A semantic combinator: builds a parent semantics from child semantics.
/// Returning `Err` means the combinator doesn't apply to these children; the
/// parser discards just that candidate edge and keeps going.
pub type SemFn = Rc<dyn Fn(&[Sem]) -> Result<Sem, Err>>;

/// A rule's semantic attachment: a fixed value (the usual case for lexical
/// rules) or a combinator over the child semantics.
#[derive(Clone)]
pub enum Semantics {
  Value(Sem),
  Func(SemFn),
}

impl Semantics {
  pub fn value(sem: impl Into<Sem>) -> Self {
    Self::Value(sem.into())
  }

  pub fn func<F>(f: F) -> Self
  where
    F: Fn(&[Sem]) -> Result<Sem, Err> + 'static,
  {
    Self::Func(Rc::new(f))
  }

  pub fn apply(&self, children: &[Sem]) -> Result<Sem, Err> {
    match self {
      Self::Value(v) => Ok(v.clone()),
      Self::Func(f) => f(children),
    }
  }
}

impl fmt::Debug for Semantics {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Value(v) => write!(f, "Value({:?})", v),
      Self::Func(_) => write!(f, "Func(..)"),
    }
  }
}

impl PartialEq for Semantics {
  fn eq(&self, other: &Self) -> bool {
    match (self, other) {
      (Self::Value(a), Self::Value(b)) => a == b,
      (Self::Func(a), Self::Func(b)) => Rc::ptr_eq(a, b),
      _ => false,
    }
  }
}

/// Evaluates semantic forms against a domain's knowledge representation.
/// Supplied per domain and swappable without touching the core.
pub trait Executor {
  /// `None` means the form is undefined in this domain. Implementations must
  /// resolve malformed or type-inconsistent forms to `None`, never panic.
  fn evaluate(&self, sem: &Sem) -> Option<Sem>;
}
