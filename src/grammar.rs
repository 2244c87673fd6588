use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::annotator::Annotator;
use crate::parser::{Chart, Parse, parse_chart};
use crate::rules::{Rule, is_cat, is_optional};
use crate::semantics::{Sem, Semantics};
use crate::utils::Err;

/// Default upper bound on the number of edges in one chart cell. Doubles as
/// the bound on unary-rule closure for grammars with unary cycles.
pub const MAX_CELL_CAPACITY: usize = 1000;

/// A loaded grammar: rules indexed by shape, plus annotators. Built once,
/// read-only afterwards. Optional and n-ary rules are rewritten at load time
/// into the lexical, unary, and binary forms the parser works with.
#[derive(Debug)]
pub struct Grammar {
  pub start: String,
  pub max_cell_capacity: usize,
  categories: HashSet<String>,
  lexical_rules: HashMap<Vec<String>, Vec<Rc<Rule>>>,
  unary_rules: HashMap<String, Vec<Rc<Rule>>>,
  binary_rules: HashMap<(String, String), Vec<Rc<Rule>>>,
  annotators: Vec<Box<dyn Annotator>>,
}

impl Grammar {
  /// Builds and validates a grammar. Malformed rules are fatal here, at load
  /// time, rather than surfacing as silent mid-parse failures.
  pub fn new(
    rules: Vec<Rule>,
    annotators: Vec<Box<dyn Annotator>>,
    start: &str,
  ) -> Result<Self, Err> {
    let mut g = Self {
      start: start.to_string(),
      max_cell_capacity: MAX_CELL_CAPACITY,
      categories: HashSet::new(),
      lexical_rules: HashMap::new(),
      unary_rules: HashMap::new(),
      binary_rules: HashMap::new(),
      annotators,
    };
    for rule in rules {
      g.add_rule(rule)?;
    }
    g.validate()?;
    Ok(g)
  }

  fn add_rule(&mut self, rule: Rule) -> Result<(), Err> {
    if !is_cat(&rule.lhs) {
      return Err(format!("rule LHS is not a category: {}", rule).into());
    }
    if rule.rhs.is_empty() {
      return Err(format!("rule has an empty RHS: {}", rule).into());
    }
    self.categories.insert(rule.lhs.clone());

    if rule.contains_optionals() {
      self.add_rule_containing_optional(rule)
    } else if rule.is_lexical() {
      self
        .lexical_rules
        .entry(rule.rhs.clone())
        .or_default()
        .push(Rc::new(rule));
      Ok(())
    } else if rule.is_unary() {
      self
        .unary_rules
        .entry(rule.rhs[0].clone())
        .or_default()
        .push(Rc::new(rule));
      Ok(())
    } else if rule.is_binary() {
      self
        .binary_rules
        .entry((rule.rhs[0].clone(), rule.rhs[1].clone()))
        .or_default()
        .push(Rc::new(rule));
      Ok(())
    } else if rule.rhs.iter().all(|s| is_cat(s)) {
      self.add_n_ary_rule(rule)
    } else {
      Err(format!("RHS mixes terminals and categories: {}", rule).into())
    }
  }

  /// Expands the leftmost optional RHS element into two variants: one where
  /// it is required, and one where it is removed. The removed variant feeds
  /// `Sem::Null` to the combinator in the elided position. Recurses through
  /// `add_rule` if more optionals remain.
  fn add_rule_containing_optional(&mut self, rule: Rule) -> Result<(), Err> {
    let first = rule
      .rhs
      .iter()
      .position(|s| is_optional(s))
      .expect("rule has no optional element");
    if rule.rhs.len() == 1 {
      return Err(format!("entire RHS is optional: {}", rule).into());
    }

    let mut required = rule.rhs.clone();
    required[first] = rule.rhs[first][1..].to_string();
    self.add_rule(Rule {
      lhs: rule.lhs.clone(),
      rhs: required,
      sem: rule.sem.clone(),
    })?;

    let mut removed = rule.rhs.clone();
    removed.remove(first);
    let sem = match &rule.sem {
      Semantics::Value(_) => rule.sem.clone(),
      Semantics::Func(f) => {
        let f = f.clone();
        Semantics::func(move |sems: &[Sem]| {
          let mut padded = sems.to_vec();
          padded.insert(first, Sem::Null);
          f(&padded)
        })
      }
    };
    self.add_rule(Rule {
      lhs: rule.lhs,
      rhs: removed,
      sem,
    })
  }

  /// Binarizes a rule with three or more categories on the RHS by
  /// introducing a fresh category covering everything after the first
  /// element. The synthesized inner rule packages its children as a list,
  /// and the outer rule unpacks that list before applying the original
  /// combinator. Recurses through `add_rule` while the RHS stays too long.
  fn add_n_ary_rule(&mut self, rule: Rule) -> Result<(), Err> {
    let category = self.fresh_category(&format!("{}_{}", rule.lhs, rule.rhs[0]));

    self.add_rule(Rule {
      lhs: category.clone(),
      rhs: rule.rhs[1..].to_vec(),
      sem: Semantics::func(|sems| Ok(Sem::List(sems.to_vec()))),
    })?;

    let inner_sem = rule.sem.clone();
    self.add_rule(Rule {
      lhs: rule.lhs.clone(),
      rhs: vec![rule.rhs[0].clone(), category],
      sem: Semantics::func(move |sems: &[Sem]| {
        let rest = sems[1]
          .items()
          .ok_or("binarized rule expected a packaged child list")?;
        let mut flat = vec![sems[0].clone()];
        flat.extend(rest.iter().cloned());
        inner_sem.apply(&flat)
      }),
    })
  }

  fn fresh_category(&mut self, base: &str) -> String {
    let mut name = base.to_string();
    while self.categories.contains(&name) {
      name.push('_');
    }
    self.categories.insert(name.clone());
    name
  }

  /// Every RHS category must be produced by some rule or annotator, and the
  /// start symbol must be known.
  fn validate(&self) -> Result<(), Err> {
    let mut known = self.categories.clone();
    for annotator in self.annotators.iter() {
      known.extend(annotator.categories());
    }

    for rule in self.all_rules() {
      for rhs in rule.rhs.iter().filter(|s| is_cat(s)) {
        if !known.contains(rhs.as_str()) {
          return Err(format!("rule references undefined category {}: {}", rhs, rule).into());
        }
      }
    }
    if !known.contains(&self.start) {
      return Err(format!("start symbol {} is not defined by any rule", self.start).into());
    }
    Ok(())
  }

  fn all_rules(&self) -> impl Iterator<Item = &Rc<Rule>> {
    self
      .lexical_rules
      .values()
      .chain(self.unary_rules.values())
      .chain(self.binary_rules.values())
      .flatten()
  }

  pub fn annotators(&self) -> &[Box<dyn Annotator>] {
    &self.annotators
  }

  /// Lexical rules whose RHS is exactly this token span
  pub fn lexical(&self, tokens: &[&str]) -> &[Rc<Rule>] {
    let key: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    self.lexical_rules.get(&key).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Unary rules whose RHS is this category
  pub fn unary(&self, cat: &str) -> &[Rc<Rule>] {
    self.unary_rules.get(cat).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Binary rules whose RHS is this category pair, in order
  pub fn binary(&self, left: &str, right: &str) -> &[Rc<Rule>] {
    self
      .binary_rules
      .get(&(left.to_string(), right.to_string()))
      .map(Vec::as_slice)
      .unwrap_or(&[])
  }

  pub fn parse_chart(&self, input: &[&str]) -> Chart {
    parse_chart(self, input)
  }

  /// All derivations of `input` under the start category, in chart
  /// construction order. Ranking them is the scorer's job. An empty result
  /// is the ordinary "no parse" outcome, not an error.
  pub fn parse(&self, input: &[&str]) -> Vec<Rc<Parse>> {
    let chart = self.parse_chart(input);
    chart
      .cell(0, input.len())
      .iter()
      .filter(|p| p.lhs() == self.start)
      .cloned()
      .collect()
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn write_sorted<'a>(
      f: &mut fmt::Formatter<'_>,
      header: &str,
      rules: impl Iterator<Item = &'a Rc<Rule>>,
    ) -> fmt::Result {
      writeln!(f, "{}:", header)?;
      let mut lines: Vec<String> = rules.map(|r| r.to_string()).collect();
      lines.sort();
      for line in lines {
        writeln!(f, "  {}", line)?;
      }
      Ok(())
    }

    write_sorted(f, "Lexical rules", self.lexical_rules.values().flatten())?;
    write_sorted(f, "Unary rules", self.unary_rules.values().flatten())?;
    write_sorted(f, "Binary rules", self.binary_rules.values().flatten())
  }
}
