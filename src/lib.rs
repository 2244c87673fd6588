#[macro_use]
extern crate lazy_static;

pub mod annotator;
pub mod features;
pub mod grammar;
pub mod learning;
pub mod metrics;
pub mod parser;
pub mod rules;
pub mod scoring;
pub mod semantics;
pub mod utils;

pub use crate::annotator::{Annotator, NumberAnnotator, TokenAnnotator};
pub use crate::features::{FeatureFn, Features, standard_features};
pub use crate::grammar::Grammar;
pub use crate::learning::{Example, Target, TrainConfig, TrainReport, train};
pub use crate::parser::{Chart, Parse, parse_chart};
pub use crate::rules::Rule;
pub use crate::scoring::{Model, ScoredParse, Weights, score};
pub use crate::semantics::{Executor, Sem, SemFn, Semantics};
pub use crate::utils::Err;

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use super::*;
  use crate::features::rule_features;

  /// The arithmetic domain end to end: an ambiguous grammar, an executor,
  /// weak supervision from denotations only, and weight persistence.
  fn arithmetic_grammar() -> Grammar {
    let rules = vec![
      Rule::new("$E", "one", Semantics::value(1)),
      Rule::new("$E", "two", Semantics::value(2)),
      Rule::new("$E", "three", Semantics::value(3)),
      Rule::new("$E", "four", Semantics::value(4)),
      Rule::new("$UnOp", "minus", Semantics::value("~")),
      Rule::new("$BinOp", "plus", Semantics::value("+")),
      Rule::new("$BinOp", "minus", Semantics::value("-")),
      Rule::new("$BinOp", "times", Semantics::value("*")),
      Rule::new(
        "$E",
        "$UnOp $E",
        Semantics::func(|s| Ok(Sem::List(vec![s[0].clone(), s[1].clone()]))),
      ),
      Rule::new(
        "$EBO",
        "$E $BinOp",
        Semantics::func(|s| Ok(Sem::List(vec![s[1].clone(), s[0].clone()]))),
      ),
      Rule::new(
        "$E",
        "$EBO $E",
        Semantics::func(|s| {
          let mut items = s[0].items().ok_or("expected operator application")?.to_vec();
          items.push(s[1].clone());
          Ok(Sem::List(items))
        }),
      ),
    ];
    Grammar::new(rules, Vec::new(), "$E").unwrap()
  }

  #[derive(Debug)]
  struct ArithmeticExecutor;

  impl Executor for ArithmeticExecutor {
    fn evaluate(&self, sem: &Sem) -> Option<Sem> {
      match sem {
        Sem::Int(n) => Some(Sem::Int(*n)),
        Sem::List(items) => match items.as_slice() {
          [Sem::Str(op), a] if op == "~" => {
            self.evaluate(a)?.int()?.checked_neg().map(Sem::Int)
          }
          [Sem::Str(op), a, b] => {
            let a = self.evaluate(a)?.int()?;
            let b = self.evaluate(b)?.int()?;
            match op.as_str() {
              "+" => a.checked_add(b).map(Sem::Int),
              "-" => a.checked_sub(b).map(Sem::Int),
              "*" => a.checked_mul(b).map(Sem::Int),
              _ => None,
            }
          }
          _ => None,
        },
        _ => None,
      }
    }
  }

  /// Emits "prec:inner,outer" whenever operator `inner` is nested under a
  /// different operator `outer` in the semantics; this is what lets the
  /// model learn operator precedence, since competing readings of the same
  /// tokens use identical rule multisets.
  fn precedence_features(sem: &Sem, features: &mut Features) {
    if let Sem::List(items) = sem {
      if let Some(Sem::Str(op)) = items.first() {
        for child in items[1..].iter() {
          precedence_features(child, features);
          if let Sem::List(child_items) = child {
            if let Some(Sem::Str(child_op)) = child_items.first() {
              if child_op != op {
                *features
                  .entry(format!("prec:{},{}", child_op, op))
                  .or_insert(0.0) += 1.0;
              }
            }
          }
        }
      }
    }
  }

  fn arithmetic_features(parse: &Parse) -> Features {
    let mut features = rule_features(parse);
    precedence_features(&parse.sem, &mut features);
    features
  }

  fn arithmetic_model() -> Model {
    Model::new(
      arithmetic_grammar(),
      Rc::new(arithmetic_features),
      Some(Box::new(ArithmeticExecutor)),
    )
  }

  fn train_examples() -> Vec<Example> {
    vec![
      Example::new("one plus one", 2),
      Example::new("one plus two", 3),
      Example::new("two plus three", 5),
      Example::new("three minus two", 1),
      Example::new("minus three minus two", -5),
      Example::new("two times two", 4),
      Example::new("two times three", 6),
      Example::new("three plus three minus two", 4),
      Example::new("two times two plus three", 7),
      Example::new("minus four plus two", -2),
    ]
  }

  #[test]
  fn test_arithmetic_end_to_end() {
    let mut model = arithmetic_model();

    let config = TrainConfig {
      epochs: 20,
      ..Default::default()
    };
    let report = train(&mut model, &train_examples(), &config);
    assert_eq!(report.final_accuracy(), 1.0);

    // held out: precedence must carry over to an unseen utterance
    let ranked = model.parse_input("two plus two times three");
    assert!(!ranked.is_empty());
    assert_eq!(ranked[0].denotation, Some(Sem::Int(8)));
  }

  #[test]
  fn test_trained_weights_round_trip_through_json() {
    let mut model = arithmetic_model();
    train(&mut model, &train_examples(), &TrainConfig::default());

    let json = model.weights.to_json().unwrap();
    let mut reloaded = arithmetic_model();
    reloaded.weights = Weights::from_json(&json).unwrap();

    for input in ["two times two plus three", "minus three minus two"] {
      let a = model
        .parse_input(input)
        .iter()
        .map(|sp| (sp.parse.to_string(), sp.score))
        .collect::<Vec<_>>();
      let b = reloaded
        .parse_input(input)
        .iter()
        .map(|sp| (sp.parse.to_string(), sp.score))
        .collect::<Vec<_>>();
      assert_eq!(a, b);
    }
  }
}
