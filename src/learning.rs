use std::fmt;
use std::rc::Rc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::info;

use crate::scoring::Model;
use crate::semantics::Sem;

/// What counts as a correct denotation for a training example.
#[derive(Clone)]
pub enum Target {
  /// Correct iff the executed denotation equals this value.
  Denotation(Sem),
  /// Arbitrary predicate over the (possibly undefined) denotation, for
  /// domains where several denotations are acceptable answers.
  Predicate(Rc<dyn Fn(Option<&Sem>) -> bool>),
}

impl Target {
  pub fn matches(&self, denotation: Option<&Sem>) -> bool {
    match self {
      Self::Denotation(want) => denotation == Some(want),
      Self::Predicate(p) => p(denotation),
    }
  }
}

impl fmt::Debug for Target {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Denotation(sem) => write!(f, "Denotation({:?})", sem),
      Self::Predicate(_) => write!(f, "Predicate(..)"),
    }
  }
}

/// A weakly-supervised training example: an utterance and its correct
/// answer. No derivation is given; which derivation produces the answer
/// stays latent.
#[derive(Debug, Clone)]
pub struct Example {
  pub input: String,
  pub target: Target,
}

impl Example {
  pub fn new(input: &str, denotation: impl Into<Sem>) -> Self {
    Self {
      input: input.to_string(),
      target: Target::Denotation(denotation.into()),
    }
  }

  pub fn with_predicate<F>(input: &str, predicate: F) -> Self
  where
    F: Fn(Option<&Sem>) -> bool + 'static,
  {
    Self {
      input: input.to_string(),
      target: Target::Predicate(Rc::new(predicate)),
    }
  }
}

#[derive(Debug, Clone)]
pub struct TrainConfig {
  /// Full passes over the training set
  pub epochs: usize,
  pub learning_rate: f64,
  /// When set, the learning rate for epoch t is `learning_rate / t`
  pub decay_learning_rate: bool,
  /// When set, shuffles example order each epoch with this seed; otherwise
  /// examples are visited in slice order
  pub shuffle_seed: Option<u64>,
}

impl Default for TrainConfig {
  fn default() -> Self {
    Self {
      epochs: 10,
      learning_rate: 0.1,
      decay_learning_rate: false,
      shuffle_seed: None,
    }
  }
}

/// Per-epoch training statistics
#[derive(Debug, Clone, Default)]
pub struct EpochStats {
  /// Fraction of examples whose top-ranked derivation was already correct
  /// when the example was visited
  pub accuracy: f64,
  /// Weight updates applied
  pub updates: usize,
  /// Examples with no correct derivation at all, including no-parse; these
  /// are skipped, never fatal
  pub failures: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TrainReport {
  pub epochs: Vec<EpochStats>,
}

impl TrainReport {
  /// True iff training stopped because an epoch applied zero updates
  pub fn converged(&self) -> bool {
    self.epochs.last().map(|e| e.updates == 0).unwrap_or(false)
  }

  pub fn final_accuracy(&self) -> f64 {
    self.epochs.last().map(|e| e.accuracy).unwrap_or(0.0)
  }
}

/// Perceptron-style latent SGD. Per epoch, per example: reparse with the
/// current weights, partition derivations by whether their denotation
/// matches the target, and when the best correct derivation `y+` is
/// outranked by some incorrect `y-`, update
/// `w[f] += eta * (features(y+)[f] - features(y-)[f])`.
///
/// The update policy is fixed and deterministic: single best-vs-best, with
/// ranking ties broken by chart construction order. Stops early once an
/// epoch applies no updates.
pub fn train(model: &mut Model, examples: &[Example], config: &TrainConfig) -> TrainReport {
  let mut report = TrainReport::default();
  if examples.is_empty() {
    return report;
  }

  let mut order: Vec<usize> = (0..examples.len()).collect();
  let mut rng = config.shuffle_seed.map(StdRng::seed_from_u64);

  for epoch in 1..=config.epochs {
    if let Some(rng) = rng.as_mut() {
      order.shuffle(rng);
    }
    let eta = if config.decay_learning_rate {
      config.learning_rate / epoch as f64
    } else {
      config.learning_rate
    };

    let mut stats = EpochStats::default();
    let mut num_correct = 0usize;

    for &idx in order.iter() {
      let example = &examples[idx];
      let ranked = model.parse_input(&example.input);

      let correct_at = |sp: &crate::scoring::ScoredParse| example.target.matches(sp.denotation.as_ref());

      if ranked.first().map(&correct_at).unwrap_or(false) {
        num_correct += 1;
      }

      // best-ranked correct derivation; without one there is nothing to
      // learn toward
      let Some(plus_idx) = ranked.iter().position(&correct_at) else {
        stats.failures += 1;
        continue;
      };
      // best-ranked incorrect rival, if any
      let Some(minus_idx) = ranked.iter().position(|sp| !correct_at(sp)) else {
        continue;
      };
      if plus_idx < minus_idx {
        // y+ already outranks every incorrect derivation
        continue;
      }

      let plus = (model.feature_fn)(&ranked[plus_idx].parse);
      let minus = (model.feature_fn)(&ranked[minus_idx].parse);
      for (f, v) in plus.iter() {
        model.weights.add(f, eta * v);
      }
      for (f, v) in minus.iter() {
        model.weights.add(f, -eta * v);
      }
      stats.updates += 1;
    }

    stats.accuracy = num_correct as f64 / examples.len() as f64;
    info!(
      epoch,
      accuracy = stats.accuracy,
      updates = stats.updates,
      failures = stats.failures,
      "finished epoch"
    );
    let converged = stats.updates == 0;
    report.epochs.push(stats);
    if converged {
      break;
    }
  }

  report
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::features::rule_features;
  use crate::grammar::Grammar;
  use crate::rules::Rule;
  use crate::scoring::Model;
  use crate::semantics::{Executor, Semantics};

  /// Grammar where "two plus three" has exactly two readings: the additive
  /// one and a spurious multiplicative one.
  fn ambiguous_grammar() -> Grammar {
    let rules = vec![
      Rule::new("$E", "two", Semantics::value(2)),
      Rule::new("$E", "three", Semantics::value(3)),
      // the spurious reading comes first, so with fresh zero weights the
      // tie-break ranks it on top and there is something to learn
      Rule::new("$Op", "plus", Semantics::value("*")),
      Rule::new("$Op", "plus", Semantics::value("+")),
      Rule::new(
        "$EO",
        "$E $Op",
        Semantics::func(|s| Ok(Sem::List(vec![s[1].clone(), s[0].clone()]))),
      ),
      Rule::new(
        "$E",
        "$EO $E",
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
  struct Arith;

  impl Executor for Arith {
    fn evaluate(&self, sem: &Sem) -> Option<Sem> {
      match sem {
        Sem::Int(n) => Some(Sem::Int(*n)),
        Sem::List(items) => match items.as_slice() {
          [Sem::Str(op), a, b] => {
            let a = self.evaluate(a)?.int()?;
            let b = self.evaluate(b)?.int()?;
            match op.as_str() {
              "+" => a.checked_add(b).map(Sem::Int),
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

  fn ambiguous_model() -> Model {
    Model::new(ambiguous_grammar(), Rc::new(rule_features), Some(Box::new(Arith)))
  }

  #[test]
  fn test_learning_prefers_correct_reading() {
    let mut model = ambiguous_model();
    let examples = vec![Example::new("two plus three", 5)];

    let report = train(&mut model, &examples, &TrainConfig::default());

    assert!(report.converged());
    assert_eq!(report.final_accuracy(), 1.0);

    // the additive derivation must now outrank the multiplicative one
    let ranked = model.parse_input("two plus three");
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].denotation, Some(Sem::Int(5)));
    assert!(ranked[0].score > ranked[1].score);
  }

  #[test]
  fn test_training_is_idempotent_once_converged() {
    let mut model = ambiguous_model();
    let examples = vec![Example::new("two plus three", 5)];
    train(&mut model, &examples, &TrainConfig::default());

    let weights_before = model.weights.clone();
    let top_before = model.parse_input("two plus three")[0].parse.to_string();

    let report = train(&mut model, &examples, &TrainConfig::default());
    assert!(report.converged());
    assert_eq!(report.epochs.len(), 1);
    assert_eq!(model.weights, weights_before);
    assert_eq!(model.parse_input("two plus three")[0].parse.to_string(), top_before);
  }

  #[test]
  fn test_unlearnable_example_is_skipped_not_fatal() {
    let mut model = ambiguous_model();
    let examples = vec![
      Example::new("two plus three", 5),
      // no derivation of this input denotes 42, and "xyzzy" has no parse
      Example::new("two plus two", 42),
      Example::new("xyzzy", 0),
    ];

    let report = train(&mut model, &examples, &TrainConfig::default());
    let last = report.epochs.last().unwrap();
    assert_eq!(last.failures, 2);
    // the learnable example still converges
    assert!(report.converged());
    let ranked = model.parse_input("two plus three");
    assert_eq!(ranked[0].denotation, Some(Sem::Int(5)));
  }

  #[test]
  fn test_predicate_target() {
    let mut model = ambiguous_model();
    // accept any even denotation: only the multiplicative reading of
    // "two plus three" qualifies
    let examples = vec![Example::with_predicate("two plus three", |d| {
      d.and_then(Sem::int).map(|n| n % 2 == 0).unwrap_or(false)
    })];

    let report = train(&mut model, &examples, &TrainConfig::default());
    assert_eq!(report.final_accuracy(), 1.0);
    let ranked = model.parse_input("two plus three");
    assert_eq!(ranked[0].denotation, Some(Sem::Int(6)));
  }

  #[test]
  fn test_seeded_shuffle_is_reproducible() {
    let config = TrainConfig {
      shuffle_seed: Some(7),
      ..Default::default()
    };
    let examples = vec![
      Example::new("two plus three", 5),
      Example::new("three plus two", 5),
      Example::new("two plus two", 4),
    ];

    let mut a = ambiguous_model();
    let mut b = ambiguous_model();
    train(&mut a, &examples, &config);
    train(&mut b, &examples, &config);
    assert_eq!(a.weights, b.weights);
  }
}
