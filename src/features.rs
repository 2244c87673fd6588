use std::collections::HashMap;
use std::rc::Rc;

use crate::parser::Parse;

/// A sparse feature vector keyed by stable feature-name strings, so weights
/// generalize across derivations and training examples. Built fresh per
/// derivation, never mutated afterwards.
pub type Features = HashMap<String, f64>;

/// Feature extraction plugged into a `Model`. Must be total, pure, and
/// deterministic; a derivation the extractor has never seen still gets a
/// vector, and features without a learned weight implicitly score zero.
pub type FeatureFn = Rc<dyn Fn(&Parse) -> Features>;

fn bump(features: &mut Features, key: String) {
  *features.entry(key).or_insert(0.0) += 1.0;
}

/// Counts how often each rule is used in the derivation.
pub fn rule_features(parse: &Parse) -> Features {
  fn collect(parse: &Parse, features: &mut Features) {
    bump(features, parse.rule.to_string());
    for child in parse.children.iter() {
      collect(child, features);
    }
  }

  let mut features = Features::new();
  collect(parse, &mut features);
  features
}

/// Counts (parent rule, child rule) adjacencies.
pub fn rule_pair_features(parse: &Parse) -> Features {
  fn collect(parse: &Parse, features: &mut Features) {
    for child in parse.children.iter() {
      bump(features, format!("{} / {}", parse.rule, child.rule));
      collect(child, features);
    }
  }

  let mut features = Features::new();
  collect(parse, &mut features);
  features
}

/// The derivation's depth, as a single feature named "depth".
pub fn depth_feature(parse: &Parse) -> Features {
  fn depth(parse: &Parse) -> usize {
    1 + parse.children.iter().map(|c| depth(c)).max().unwrap_or(0)
  }

  let mut features = Features::new();
  features.insert("depth".to_string(), depth(parse) as f64);
  features
}

/// Rule counts, rule adjacencies, and depth combined; a reasonable default
/// for domains without hand-crafted features.
pub fn standard_features(parse: &Parse) -> Features {
  let mut features = rule_features(parse);
  for (key, value) in rule_pair_features(parse) {
    *features.entry(key).or_insert(0.0) += value;
  }
  features.extend(depth_feature(parse));
  features
}
