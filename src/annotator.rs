use std::fmt;

use regex::Regex;

use crate::semantics::Sem;

/// helper macro for initializing a regex with lazy_static!
macro_rules! regex_static {
  ($name:ident, $pattern:expr) => {
    lazy_static! {
      static ref $name: Regex = Regex::new($pattern).unwrap();
    }
  };
}

/// An annotator is a predicate lexical entry: it matches token spans by
/// pattern rather than by exact string, producing a category and a semantic
/// value for each match. This is how open classes like numerals enter the
/// chart.
pub trait Annotator: fmt::Debug {
  /// The categories this annotator can produce. Used for load-time grammar
  /// validation, so a rule mentioning e.g. `$Number` is well-formed as long
  /// as a `NumberAnnotator` is installed.
  fn categories(&self) -> Vec<String>;

  /// Returns (category, semantics) pairs for the given token span.
  fn annotate(&self, tokens: &[&str]) -> Vec<(String, Sem)>;
}

/// Annotates any single token as `$Token`, with the token itself as the
/// semantic value.
#[derive(Debug, Default)]
pub struct TokenAnnotator;

impl Annotator for TokenAnnotator {
  fn categories(&self) -> Vec<String> {
    vec!["$Token".to_string()]
  }

  fn annotate(&self, tokens: &[&str]) -> Vec<(String, Sem)> {
    if let [token] = tokens {
      vec![("$Token".to_string(), Sem::str(*token))]
    } else {
      Vec::new()
    }
  }
}

/// Annotates a single integer-shaped token as `$Number`.
#[derive(Debug, Default)]
pub struct NumberAnnotator;

impl Annotator for NumberAnnotator {
  fn categories(&self) -> Vec<String> {
    vec!["$Number".to_string()]
  }

  fn annotate(&self, tokens: &[&str]) -> Vec<(String, Sem)> {
    regex_static!(NUMBER, r"^-?[0-9]+$");

    if let [token] = tokens {
      if NUMBER.is_match(token) {
        if let Ok(value) = token.parse::<i64>() {
          return vec![("$Number".to_string(), Sem::Int(value))];
        }
      }
    }
    Vec::new()
  }
}
