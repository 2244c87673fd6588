use std::env;
use std::io;
use std::io::Write;
use std::process;
use std::rc::Rc;

use parsnip::features::rule_features;
use parsnip::{
  Err, Example, Executor, Features, Grammar, Model, NumberAnnotator, Parse, Rule, Sem, Semantics,
  TrainConfig, Weights, train,
};

fn usage(prog_name: &str) -> String {
  format!(
    r"Usage: {} [options]

An interactive semantic parser for spoken arithmetic, e.g.:

  > two times two plus three

Options:
  -h, --help          Print this message
  -t, --train         Train weights on the built-in examples first
  -c, --chart         Print the parse chart for each input
  -w, --weights FILE  Load weights from FILE before parsing
  -s, --save FILE     Save weights to FILE after training",
    prog_name
  )
}

// Arithmetic domain ==========================================================

fn arithmetic_grammar() -> Result<Grammar, Err> {
  let rules = vec![
    Rule::new("$E", "one", Semantics::value(1)),
    Rule::new("$E", "two", Semantics::value(2)),
    Rule::new("$E", "three", Semantics::value(3)),
    Rule::new("$E", "four", Semantics::value(4)),
    // digit tokens come in through the number annotator
    Rule::new("$E", "$Number", Semantics::func(|s| Ok(s[0].clone()))),
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
  Grammar::new(rules, vec![Box::new(NumberAnnotator)], "$E")
}

#[derive(Debug)]
struct ArithmeticExecutor;

impl Executor for ArithmeticExecutor {
  fn evaluate(&self, sem: &Sem) -> Option<Sem> {
    match sem {
      Sem::Int(n) => Some(Sem::Int(*n)),
      Sem::List(items) => match items.as_slice() {
        [Sem::Str(op), a] if op == "~" => self.evaluate(a)?.int()?.checked_neg().map(Sem::Int),
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
/// different operator `outer`; rule counts alone can't distinguish the
/// competing readings of the same tokens, precedence features can.
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

fn train_examples() -> Vec<Example> {
  vec![
    Example::new("one plus one", 2),
    Example::new("one plus two", 3),
    Example::new("one plus three", 4),
    Example::new("two plus two", 4),
    Example::new("two plus three", 5),
    Example::new("three plus one", 4),
    Example::new("three plus minus two", 1),
    Example::new("three minus two", 1),
    Example::new("minus three minus two", -5),
    Example::new("two times two", 4),
    Example::new("two times three", 6),
    Example::new("three plus three minus two", 4),
    Example::new("two times two plus three", 7),
    Example::new("minus four plus two", -2),
  ]
}

// REPL =======================================================================

fn parse(model: &Model, sentence: &str, print_chart: bool) -> Result<(), Err> {
  if print_chart {
    let tokens = sentence.split_whitespace().collect::<Vec<_>>();
    println!("chart:\n{}", model.grammar.parse_chart(&tokens));
  }

  let ranked = model.parse_input(sentence);

  println!(
    "{} parse{}",
    ranked.len(),
    if ranked.len() == 1 { "" } else { "s" }
  );

  for (idx, sp) in ranked.iter().enumerate() {
    let denotation = sp
      .denotation
      .as_ref()
      .map(|d| d.to_string())
      .unwrap_or_else(|| "undefined".to_string());
    println!("{:<3} {:8.3}  {} = {}", idx, sp.score, sp.parse.sem, denotation);
    println!("             {}", sp.parse);
  }
  println!();

  Ok(())
}

struct Args {
  train: bool,
  print_chart: bool,
  weights_file: Option<String>,
  save_file: Option<String>,
}

impl Args {
  fn make_error_message(msg: &str, prog_name: impl AsRef<str>) -> String {
    format!("argument error: {}.\n\n{}", msg, usage(prog_name.as_ref()))
  }

  fn parse(v: Vec<String>) -> Result<Self, String> {
    if v.is_empty() {
      return Err(Self::make_error_message("bad argument vector", "parsnip"));
    }

    let mut iter = v.into_iter();
    let prog_name = iter.next().unwrap();

    let mut train = false;
    let mut print_chart = false;
    let mut weights_file: Option<String> = None;
    let mut save_file: Option<String> = None;

    while let Some(o) = iter.next() {
      if o == "-h" || o == "--help" {
        println!("{}", usage(&prog_name));
        process::exit(0);
      } else if o == "-t" || o == "--train" {
        train = true;
      } else if o == "-c" || o == "--chart" {
        print_chart = true;
      } else if o == "-w" || o == "--weights" {
        match iter.next() {
          Some(f) => weights_file = Some(f),
          None => return Err(Self::make_error_message("--weights needs a file", prog_name)),
        }
      } else if o == "-s" || o == "--save" {
        match iter.next() {
          Some(f) => save_file = Some(f),
          None => return Err(Self::make_error_message("--save needs a file", prog_name)),
        }
      } else {
        return Err(Self::make_error_message("invalid arguments", prog_name));
      }
    }

    Ok(Self {
      train,
      print_chart,
      weights_file,
      save_file,
    })
  }
}

fn main() -> Result<(), Err> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let opts = match Args::parse(env::args().collect()) {
    Ok(opts) => opts,
    Err(msg) => {
      eprintln!("{}", msg);
      process::exit(255);
    }
  };

  let mut model = Model::new(
    arithmetic_grammar()?,
    Rc::new(arithmetic_features),
    Some(Box::new(ArithmeticExecutor)),
  );

  if let Some(f) = &opts.weights_file {
    model.weights = Weights::read_from_file(f)?;
    println!("Loaded {} weights from {}", model.weights.len(), f);
  }

  if opts.train {
    let examples = train_examples();
    let report = train(&mut model, &examples, &TrainConfig::default());
    for (idx, epoch) in report.epochs.iter().enumerate() {
      println!(
        "epoch {}: accuracy {:.3}, {} update{}, {} failure{}",
        idx + 1,
        epoch.accuracy,
        epoch.updates,
        if epoch.updates == 1 { "" } else { "s" },
        epoch.failures,
        if epoch.failures == 1 { "" } else { "s" },
      );
    }

    println!("\nLearned weights:");
    for (feature, weight) in model.weights.sorted() {
      if weight != 0.0 {
        println!("{:8.1}  {}", weight, feature);
      }
    }
    println!();

    if let Some(f) = &opts.save_file {
      model.weights.write_to_file(f)?;
      println!("Saved weights to {}", f);
    }
  }

  let mut input = String::new();
  loop {
    print!("> ");
    io::stdout().flush()?;

    match io::stdin().read_line(&mut input) {
      Ok(_) => {
        if input.is_empty() {
          // ctrl+d
          return Ok(());
        }
        input.make_ascii_lowercase();
        parse(&model, input.trim(), opts.print_chart)?;
        input.clear();
      }
      Err(error) => return Err(error.into()),
    }
  }
}
