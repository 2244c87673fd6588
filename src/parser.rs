use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::grammar::Grammar;
use crate::rules::Rule;
use crate::semantics::{Sem, Semantics};
use crate::utils::Err;

/// A parse edge: one derivation node covering `span`, built under
/// `rule.lhs`, with its semantics computed at construction.
///
/// Children are shared between parent edges via `Rc`, never owned twice, and
/// the edge graph is acyclic by construction: a child always spans strictly
/// fewer tokens than its parent.
#[derive(Debug, Clone)]
pub struct Parse {
  pub rule: Rc<Rule>,
  /// Empty for lexical edges, whose surface tokens are the rule's RHS
  pub children: Vec<Rc<Parse>>,
  pub span: (usize, usize),
  pub sem: Sem,
}

impl Parse {
  /// Builds an edge, computing its semantics from the rule and children.
  /// Fails iff the rule's combinator rejects the child semantics.
  pub fn new(rule: Rc<Rule>, children: Vec<Rc<Parse>>, span: (usize, usize)) -> Result<Self, Err> {
    let sem = if rule.is_lexical() {
      match &rule.sem {
        Semantics::Value(v) => v.clone(),
        Semantics::Func(f) => f(&[])?,
      }
    } else {
      let child_sems = children.iter().map(|c| c.sem.clone()).collect::<Vec<_>>();
      rule.sem.apply(&child_sems)?
    };
    Ok(Self {
      rule,
      children,
      span,
      sem,
    })
  }

  /// The category this edge was built under.
  pub fn lhs(&self) -> &str {
    &self.rule.lhs
  }

  /// Edge identity: same rule, span, and children, with rule and children
  /// compared by pointer. Semantics is fully determined by these, so it
  /// doesn't participate.
  fn same_edge(&self, other: &Self) -> bool {
    Rc::ptr_eq(&self.rule, &other.rule)
      && self.span == other.span
      && self.children.len() == other.children.len()
      && self
        .children
        .iter()
        .zip(other.children.iter())
        .all(|(a, b)| Rc::ptr_eq(a, b))
  }
}

impl fmt::Display for Parse {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.rule.is_lexical() {
      write!(f, "({} {})", self.rule.lhs, self.rule.rhs.join(" "))
    } else {
      write!(f, "({}", self.rule.lhs)?;
      for child in self.children.iter() {
        write!(f, " {}", child)?;
      }
      write!(f, ")")
    }
  }
}

/// The dynamic-programming table for one parse call: every partial
/// derivation found so far, indexed by span. Private to that call and
/// discarded once the full-span derivations are extracted.
#[derive(Debug)]
pub struct Chart {
  cells: HashMap<(usize, usize), Vec<Rc<Parse>>>,
  n_tokens: usize,
  capacity: usize,
  capacity_hits: u64,
}

impl Chart {
  pub fn new(n_tokens: usize, capacity: usize) -> Self {
    Self {
      cells: HashMap::new(),
      n_tokens,
      capacity,
      capacity_hits: 0,
    }
  }

  pub fn n_tokens(&self) -> usize {
    self.n_tokens
  }

  pub fn cell(&self, i: usize, j: usize) -> &[Rc<Parse>] {
    self.cells.get(&(i, j)).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn len_at(&self, i: usize, j: usize) -> usize {
    self.cell(i, j).len()
  }

  /// Spans with at least one edge, sorted by length then start position
  pub fn spans(&self) -> Vec<(usize, usize)> {
    let mut spans: Vec<_> = self.cells.keys().copied().collect();
    spans.sort_by_key(|&(i, j)| (j - i, i));
    spans
  }

  /// How many insertions were dropped because their cell was full
  pub fn capacity_hits(&self) -> u64 {
    self.capacity_hits
  }

  /// Inserts an edge unless it duplicates one already in the cell or the
  /// cell is at capacity. Returns false iff the cell is full; the capacity
  /// bound is what keeps unary closure finite on grammars with unary cycles.
  pub fn add(&mut self, i: usize, j: usize, parse: Rc<Parse>) -> bool {
    debug_assert_eq!((i, j), parse.span, "edge inserted outside its own span");
    debug_assert!(j <= self.n_tokens, "edge spans beyond the input");

    let cell = self.cells.entry((i, j)).or_default();
    if cell.len() >= self.capacity {
      self.capacity_hits += 1;
      debug!(i, j, hits = self.capacity_hits, "chart cell at capacity, dropping edge");
      return false;
    }
    if !cell.iter().any(|p| p.same_edge(&parse)) {
      cell.push(parse);
    }
    true
  }

  /// Get an owned edge so that passing around &mut chart is more ergonomic.
  /// The clone is cheap, a handful of Rcs and two usizes.
  fn get(&self, i: usize, j: usize, idx: usize) -> Rc<Parse> {
    self.cells[&(i, j)][idx].clone()
  }
}

impl fmt::Display for Chart {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, j) in self.spans() {
      writeln!(f, "({}, {}):", i, j)?;
      for parse in self.cell(i, j).iter() {
        writeln!(f, "  {}: {}", parse, parse.sem)?;
      }
    }
    Ok(())
  }
}

/// Fills a chart bottom-up: for each span, smallest first, apply annotators
/// and lexical rules, then binary rules over every split, then unary-rule
/// closure. Cubic in input length, linear in grammar size per split.
pub fn parse_chart(g: &Grammar, input: &[&str]) -> Chart {
  let mut chart = Chart::new(input.len(), g.max_cell_capacity);

  for j in 1..=input.len() {
    for i in (0..j).rev() {
      apply_annotators(g, &mut chart, input, i, j);
      apply_lexical_rules(g, &mut chart, input, i, j);
      apply_binary_rules(g, &mut chart, i, j);
      apply_unary_rules(g, &mut chart, i, j);
    }
  }

  chart
}

/// Builds an edge and inserts it, discarding combinator rejections: a failed
/// combination produces no edge, not a parse failure. Returns false iff the
/// target cell is at capacity.
fn add_edge(chart: &mut Chart, i: usize, j: usize, rule: Rc<Rule>, children: Vec<Rc<Parse>>) -> bool {
  match Parse::new(rule, children, (i, j)) {
    Ok(parse) => chart.add(i, j, Rc::new(parse)),
    Err(e) => {
      trace!(i, j, error = %e, "combinator rejected edge");
      true
    }
  }
}

fn apply_annotators(g: &Grammar, chart: &mut Chart, input: &[&str], i: usize, j: usize) {
  for annotator in g.annotators() {
    for (category, sem) in annotator.annotate(&input[i..j]) {
      let rule = Rc::new(Rule {
        lhs: category,
        rhs: input[i..j].iter().map(|t| t.to_string()).collect(),
        sem: Semantics::Value(sem),
      });
      if !add_edge(chart, i, j, rule, Vec::new()) {
        return;
      }
    }
  }
}

fn apply_lexical_rules(g: &Grammar, chart: &mut Chart, input: &[&str], i: usize, j: usize) {
  for rule in g.lexical(&input[i..j]) {
    if !add_edge(chart, i, j, rule.clone(), Vec::new()) {
      return;
    }
  }
}

fn apply_binary_rules(g: &Grammar, chart: &mut Chart, i: usize, j: usize) {
  for k in (i + 1)..j {
    // collect the pairs up front so the cells can be borrowed again by add
    let mut pairs = Vec::new();
    for left in chart.cell(i, k).iter() {
      for right in chart.cell(k, j).iter() {
        pairs.push((left.clone(), right.clone()));
      }
    }
    for (left, right) in pairs {
      for rule in g.binary(left.lhs(), right.lhs()) {
        if !add_edge(chart, i, j, rule.clone(), vec![left.clone(), right.clone()]) {
          return;
        }
      }
    }
  }
}

fn apply_unary_rules(g: &Grammar, chart: &mut Chart, i: usize, j: usize) {
  // need a while loop because the cell grows while we walk it; that growth
  // is exactly unary closure, and the cell capacity bounds it on grammars
  // with unary cycles
  let mut idx = 0;
  while idx < chart.len_at(i, j) {
    let parse = chart.get(i, j, idx);
    idx += 1;

    for rule in g.unary(parse.lhs()) {
      if !add_edge(chart, i, j, rule.clone(), vec![parse.clone()]) {
        return;
      }
    }
  }
}
