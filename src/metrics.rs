use std::collections::HashSet;

use crate::learning::Example;
use crate::scoring::{Model, ScoredParse};

/// An evaluation metric over one example's ranked parses.
pub trait Metric {
  fn name(&self) -> &'static str;
  fn evaluate(&self, example: &Example, parses: &[ScoredParse]) -> f64;
}

/// 1.0 iff the top-ranked parse's denotation matches the target.
pub struct DenotationAccuracy;

impl Metric for DenotationAccuracy {
  fn name(&self) -> &'static str {
    "denotation accuracy"
  }

  fn evaluate(&self, example: &Example, parses: &[ScoredParse]) -> f64 {
    match parses.first() {
      Some(sp) if example.target.matches(sp.denotation.as_ref()) => 1.0,
      _ => 0.0,
    }
  }
}

/// 1.0 iff any parse's denotation matches the target: an upper bound on
/// what reranking could achieve.
pub struct DenotationOracleAccuracy;

impl Metric for DenotationOracleAccuracy {
  fn name(&self) -> &'static str {
    "denotation oracle accuracy"
  }

  fn evaluate(&self, example: &Example, parses: &[ScoredParse]) -> f64 {
    if parses.iter().any(|sp| example.target.matches(sp.denotation.as_ref())) {
      1.0
    } else {
      0.0
    }
  }
}

pub struct NumParses;

impl Metric for NumParses {
  fn name(&self) -> &'static str {
    "number of parses"
  }

  fn evaluate(&self, _example: &Example, parses: &[ScoredParse]) -> f64 {
    parses.len() as f64
  }
}

/// Fraction of parses whose semantics were already produced by another
/// parse: 0.0 when every parse has unique semantics, 1.0 when all parses
/// share one semantics.
pub struct SpuriousAmbiguity;

impl Metric for SpuriousAmbiguity {
  fn name(&self) -> &'static str {
    "spurious ambiguity"
  }

  fn evaluate(&self, _example: &Example, parses: &[ScoredParse]) -> f64 {
    if parses.len() <= 1 {
      return 0.0;
    }
    let sems: HashSet<String> = parses.iter().map(|sp| sp.parse.sem.to_string()).collect();
    if sems.len() == parses.len() {
      return 0.0;
    }
    (parses.len() - sems.len()) as f64 / (parses.len() - 1) as f64
  }
}

pub fn denotation_metrics() -> Vec<Box<dyn Metric>> {
  vec![
    Box::new(DenotationAccuracy),
    Box::new(DenotationOracleAccuracy),
    Box::new(NumParses),
    Box::new(SpuriousAmbiguity),
  ]
}

/// Averages each metric over the example set.
pub fn evaluate_model(
  model: &Model,
  examples: &[Example],
  metrics: &[Box<dyn Metric>],
) -> Vec<(&'static str, f64)> {
  let mut totals = vec![0.0; metrics.len()];
  for example in examples {
    let parses = model.parse_input(&example.input);
    for (total, metric) in totals.iter_mut().zip(metrics.iter()) {
      *total += metric.evaluate(example, &parses);
    }
  }

  let n = examples.len().max(1) as f64;
  metrics
    .iter()
    .map(|m| m.name())
    .zip(totals.into_iter().map(|t| t / n))
    .collect()
}
