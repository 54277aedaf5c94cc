//! A command-line decoder translating sentences with synchronous
//! context-free grammars.  The decoding itself is done by the `scfg-rs`
//! library; this tool loads the model, reads the input and prints the
//! translations.

use annotate_snippets::Renderer;
use clap::Parser;
use scfg_rs::grammar::Grammar;
use scfg_rs::lm::BigramModel;
use scfg_rs::scorer::LinearScorer;
use scfg_rs::{Decoder, DecoderOptions, Diagnostic, ModelBuilder, SourceInfo, Translation};
use simple_logger::SimpleLogger;
use std::fs;
use std::io::{self, stdout, BufWriter, Read, Write};
use std::time::Instant;

/// A chart decoder for synchronous context-free grammars
///
/// Reads one sentence per line and prints one translation per line.
/// Sentences which cannot be translated are echoed unchanged.
#[derive(Debug, clap::Parser)]
#[command(version, about, verbatim_doc_comment)]
struct Cli {
    /// Input file, one sentence per line; reads standard input if absent
    #[arg(id("INPUT"))]
    input: Option<String>,
    /// Grammar file to load; can be given several times
    #[arg(short, long, value_name("FILE"), required(true))]
    grammar: Vec<String>,
    /// Adds the glue rule concatenating adjacent spans of the given label
    #[arg(long, value_name("LABEL"), num_args(0..=1), default_missing_value("X"))]
    glue: Option<String>,
    /// Bigram language model file, in ARPA format
    #[arg(long, value_name("FILE"))]
    lm: Option<String>,
    /// Comma-separated weights of the grammar features
    #[arg(short, long, value_name("LIST"), value_delimiter(','))]
    weights: Option<Vec<f32>>,
    /// Weight of the target word count penalty
    #[arg(long, default_value_t = 0.0)]
    word_penalty: f32,
    /// Weight of the language model
    #[arg(long, default_value_t = 1.0)]
    lm_weight: f32,
    /// Maximum number of hypotheses per span
    #[arg(short, long, default_value_t = 100,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    stack_size: usize,
    /// Relative beam threshold, as a probability ratio to the best
    /// hypothesis of the span; 0 disables it
    #[arg(long, default_value_t = 1e-5)]
    beam_threshold: f32,
    /// Prints the N best translations of each sentence
    #[arg(short, long, value_name("N"), default_value_t = 0)]
    n_best: usize,
    /// Maximum number of target phrases per source side
    #[arg(long, default_value_t = 20)]
    table_limit: usize,
    /// Longest span grammar rules apply to; glue rules apply to any span
    #[arg(long, default_value_t = 10)]
    max_chart_span: usize,
    /// Label of the translations of whole sentences
    #[arg(long, value_name("LABEL"))]
    goal: Option<String>,
    /// Abandons sentences needing more hypotheses than this
    #[arg(long, value_name("COUNT"))]
    max_hypotheses: Option<usize>,
    /// Number of threads to use for decoding
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..))]
    jobs: Option<u32>,
    /// Prints the derivation of each translation
    #[arg(short, long)]
    derivation: bool,
    /// Prints milliseconds after loading, and for each sentence
    #[arg(long = "time")]
    timing: bool,
    /// Activates debug logs
    #[arg(long)]
    debug: bool,
}

/// Renders diagnostics pointing into `source` to standard error, and returns
/// how many were rendered.
fn report(renderer: &Renderer, source: &SourceInfo, diags: &[Diagnostic]) -> usize {
    let list: Vec<_> = diags.iter().map(|diag| (source, diag.clone())).collect();
    Diagnostic::render_list(&list, |msg| eprintln!("{}", renderer.render(msg))).len()
}

fn read_input(input: Option<&str>) -> io::Result<String> {
    match input {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

fn write_translation(
    out: &mut impl Write,
    index: usize,
    translation: &Translation,
    cli: &Cli,
) -> io::Result<()> {
    if cli.n_best > 0 {
        for alternative in &translation.alternatives {
            writeln!(out, "{index} ||| {} ||| {}", alternative.text, alternative.score)?;
        }
    } else {
        writeln!(out, "{translation}")?;
    }
    if cli.derivation {
        writeln!(out, "{}", translation.derivation)?;
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let options = DecoderOptions {
        stack_size: cli.stack_size,
        beam_threshold: if cli.beam_threshold > 0.0 {
            cli.beam_threshold.ln()
        } else {
            f32::NEG_INFINITY
        },
        n_best: cli.n_best,
        max_hypotheses: cli.max_hypotheses,
        table_limit: Some(cli.table_limit),
        max_chart_span: Some(cli.max_chart_span),
        goal_label: cli.goal.clone(),
        jobs: cli.jobs.unwrap_or(1) as usize,
        timing: cli.timing,
        ..DecoderOptions::default()
    };

    if cli.debug {
        SimpleLogger::new().init().unwrap();
    }

    let r = Renderer::styled();
    let mut count = 0;
    let start = Instant::now();

    let mut builder = ModelBuilder::new(options);
    let config = builder.options().grammar_config(cli.weights.clone());
    for path in &cli.grammar {
        match Grammar::load(path, builder.vocab_mut(), &config) {
            Ok(grammar) => {
                count += report(&r, grammar.source(), grammar.diagnostics());
                builder.add_source(Box::new(grammar));
            }
            Err(diag) => count += report(&r, &SourceInfo::new(path.clone(), "".into()), &[diag]),
        }
    }
    if let Some(label) = &cli.glue {
        builder.add_glue(label);
    }

    let mut scorer = LinearScorer::new(cli.word_penalty);
    if let Some(path) = &cli.lm {
        match fs::read_to_string(path) {
            Ok(text) => {
                let source = SourceInfo::new(path.clone(), text.into());
                match BigramModel::parse(&source, builder.vocab_mut()) {
                    Ok(lm) => scorer = scorer.with_lm(lm, cli.lm_weight),
                    Err(diag) => count += report(&r, &source, &[diag]),
                }
            }
            Err(err) => count += report(&r, &SourceInfo::new(path.clone(), "".into()), &[err.into()]),
        }
    }
    builder.set_scorer(Box::new(scorer));
    let decoder = Decoder::new(builder.build());
    if cli.timing {
        eprintln!("Loaded model in {} ms", start.elapsed().as_millis());
    }

    let text = match read_input(cli.input.as_deref()) {
        Ok(text) => text,
        Err(err) => {
            let name = cli.input.clone().unwrap_or_else(|| "<stdin>".to_owned());
            count += report(&r, &SourceInfo::new(name, "".into()), &[err.into()]);
            eprintln!("{count} diagnostics issued.");
            std::process::exit(1);
        }
    };
    let lines: Vec<String> = text.lines().map(str::to_owned).collect();
    let results = decoder.decode_all(lines.clone());

    let mut out = BufWriter::new(stdout().lock());
    for (index, (line, result)) in lines.iter().zip(results).enumerate() {
        let written = match result {
            Ok(translation) => {
                if cli.timing {
                    eprintln!(
                        "Sentence {}: {} ms, {} hypotheses",
                        index + 1,
                        translation.stats.elapsed.as_millis(),
                        translation.stats.created
                    );
                }
                write_translation(&mut out, index, &translation, &cli)
            }
            Err(diag) => {
                let source = SourceInfo::new(format!("<input>:{}", index + 1), line.as_str().into());
                count += report(&r, &source, &[diag]);
                writeln!(out, "{line}")
            }
        };
        if let Err(err) = written {
            count += report(&r, &SourceInfo::new("<stdout>".to_owned(), "".into()), &[err.into()]);
            break;
        }
    }
    if let Err(err) = out.flush() {
        count += report(&r, &SourceInfo::new("<stdout>".to_owned(), "".into()), &[err.into()]);
    }

    eprintln!("{count} diagnostics issued.");

    // Exit with code 1 if any warning or error were encountered
    let code = if count > 0 { 1 } else { 0 };
    std::process::exit(code);
}
