use criterion::{Criterion, black_box, criterion_group, criterion_main};

use parsnip::{Grammar, Rule, Sem, Semantics};

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

fn parse(g: &Grammar, input: &[&str]) -> usize {
  g.parse(input).len()
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar = arithmetic_grammar();
  let simple_input = "two plus three".split(' ').collect::<Vec<_>>();
  let ambiguous_input = "minus two times two plus three minus four"
    .split(' ')
    .collect::<Vec<_>>();

  c.bench_function("parse simple", |b| {
    b.iter(|| parse(black_box(&grammar), black_box(&simple_input)))
  });

  c.bench_function("parse ambiguous", |b| {
    b.iter(|| parse(black_box(&grammar), black_box(&ambiguous_input)))
  });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
