use std::cmp::Ordering;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::features::{FeatureFn, Features};
use crate::grammar::Grammar;
use crate::parser::Parse;
use crate::semantics::{Executor, Sem};
use crate::utils::Err;

/// The learned weight vector: feature name to weight, absent means zero.
/// This is the only mutable learned state in the system. It is constructed
/// once, mutated only by training, and serializes to plain JSON so a
/// trained model can be reloaded with identical ranking behavior.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Weights(HashMap<String, f64>);

impl Weights {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn get(&self, feature: &str) -> f64 {
    self.0.get(feature).copied().unwrap_or(0.0)
  }

  pub fn add(&mut self, feature: &str, delta: f64) {
    *self.0.entry(feature.to_string()).or_insert(0.0) += delta;
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  /// (feature, weight) pairs sorted by descending weight, for reporting
  pub fn sorted(&self) -> Vec<(&str, f64)> {
    let mut pairs: Vec<(&str, f64)> = self.0.iter().map(|(k, v)| (k.as_str(), *v)).collect();
    pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(b.0)));
    pairs
  }

  pub fn to_json(&self) -> Result<String, Err> {
    Ok(serde_json::to_string_pretty(self)?)
  }

  pub fn from_json(s: &str) -> Result<Self, Err> {
    Ok(serde_json::from_str(s)?)
  }

  pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), Err> {
    Ok(fs::write(path, self.to_json()?)?)
  }

  pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, Err> {
    Self::from_json(&fs::read_to_string(path)?)
  }
}

impl FromIterator<(String, f64)> for Weights {
  fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// Inner product of a feature vector with the weights.
pub fn score(features: &Features, weights: &Weights) -> f64 {
  features.iter().map(|(f, v)| v * weights.get(f)).sum()
}

/// A derivation with its model score and executed denotation
#[derive(Debug, Clone)]
pub struct ScoredParse {
  pub parse: Rc<Parse>,
  pub score: f64,
  /// `None` when there is no executor, or the form is undefined in the
  /// domain
  pub denotation: Option<Sem>,
}

/// Grammar + feature function + weights + executor: everything needed to
/// map an utterance to a ranked list of scored derivations.
pub struct Model {
  pub grammar: Grammar,
  pub feature_fn: FeatureFn,
  pub weights: Weights,
  pub executor: Option<Box<dyn Executor>>,
}

impl Model {
  pub fn new(grammar: Grammar, feature_fn: FeatureFn, executor: Option<Box<dyn Executor>>) -> Self {
    Self {
      grammar,
      feature_fn,
      weights: Weights::new(),
      executor,
    }
  }

  /// Parses the whitespace-separated input, executes each derivation if an
  /// executor is installed, scores, and ranks.
  pub fn parse_input(&self, input: &str) -> Vec<ScoredParse> {
    let tokens = input.split_whitespace().collect::<Vec<_>>();
    let parses = self.grammar.parse(&tokens);
    self.rank(parses)
  }

  /// Sorts derivations by descending score. The sort is stable and the
  /// parser is deterministic, so ties keep chart construction order and
  /// repeated calls with the same weights reproduce the same ranking.
  pub fn rank(&self, parses: Vec<Rc<Parse>>) -> Vec<ScoredParse> {
    let mut scored = parses
      .into_iter()
      .map(|parse| {
        let denotation = self.executor.as_ref().and_then(|e| e.evaluate(&parse.sem));
        let score = score(&(self.feature_fn)(&parse), &self.weights);
        ScoredParse {
          parse,
          score,
          denotation,
        }
      })
      .collect::<Vec<_>>();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored
  }
}
