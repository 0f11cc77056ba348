//! Command implementations for the parlance CLI.

use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use log::debug;
use serde_json::Value;

use crate::cli::args::{
    Command, CompileArgs, FstArgs, ParlanceArgs, RecognizeArgs, SampleArgs,
};
use crate::error::{ParlanceError, Result};
use crate::expand::{expand, SlotReplacements};
use crate::graph::{compile, graph_to_fst, graph_to_json, IntentGraph};
use crate::recognize::{recognize, sample_by_intent, RecognizeOptions};
use crate::template::parse;

/// Exit code for success.
pub const EXIT_OK: i32 = 0;
/// Exit code for a template parse error.
pub const EXIT_PARSE_ERROR: i32 = 1;
/// Exit code for a recognition with no candidates.
pub const EXIT_NO_RECOGNITION: i32 = 2;
/// Exit code for a configuration error.
pub const EXIT_CONFIG_ERROR: i32 = 3;

/// Execute a CLI command and return the process exit code.
pub fn run(args: ParlanceArgs) -> i32 {
    let result = match &args.command {
        Command::Compile(compile_args) => compile_command(compile_args.clone(), &args),
        Command::Fst(fst_args) => fst_command(fst_args.clone(), &args),
        Command::Recognize(recognize_args) => recognize_command(recognize_args.clone(), &args),
        Command::Sample(sample_args) => sample_command(sample_args.clone(), &args),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err}");
            match err {
                ParlanceError::Parse { .. } => EXIT_PARSE_ERROR,
                _ => EXIT_CONFIG_ERROR,
            }
        }
    }
}

/// Read and concatenate template files, or stdin when none are given.
fn read_templates(paths: &[PathBuf]) -> Result<String> {
    if paths.is_empty() {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }

    let mut text = String::new();
    for path in paths {
        debug!("reading {}", path.display());
        text.push_str(&fs::read_to_string(path)?);
        text.push('\n');
    }
    Ok(text)
}

/// Parse, expand, and compile the given template files.
fn build_graph(paths: &[PathBuf]) -> Result<IntentGraph> {
    let text = read_templates(paths)?;
    let grammar = parse(&text)?;
    let expanded = expand(&grammar, &SlotReplacements::new())?;
    compile(&expanded)
}

fn print_json(value: &Value, cli_args: &ParlanceArgs) -> Result<()> {
    let rendered = if cli_args.pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{rendered}");
    Ok(())
}

/// Compile templates and print the graph as JSON.
fn compile_command(args: CompileArgs, cli_args: &ParlanceArgs) -> Result<i32> {
    let graph = build_graph(&args.templates)?;
    print_json(&graph_to_json(&graph)?, cli_args)?;
    Ok(EXIT_OK)
}

/// Compile templates and write FST text plus symbol tables.
fn fst_command(args: FstArgs, cli_args: &ParlanceArgs) -> Result<i32> {
    let graph = build_graph(&args.templates)?;
    let fst = graph_to_fst(&graph);
    fst.write_fst(&args.fst_text, &args.fst_isymbols, &args.fst_osymbols)?;

    if cli_args.verbosity() > 0 {
        eprintln!(
            "Wrote {}, {}, {}",
            args.fst_text.display(),
            args.fst_isymbols.display(),
            args.fst_osymbols.display()
        );
    }
    Ok(EXIT_OK)
}

/// Recognize an utterance and print the candidates as JSON.
fn recognize_command(args: RecognizeArgs, cli_args: &ParlanceArgs) -> Result<i32> {
    let graph = build_graph(&args.templates)?;

    let stop_words: HashSet<String> = args.stop_words.iter().cloned().collect();
    let options = RecognizeOptions {
        fuzzy: !args.strict,
        stop_words,
        max_recognitions: args.max_recognitions,
        max_seconds: args.max_seconds,
        ..RecognizeOptions::default()
    };

    let recognitions = recognize(&graph, &args.utterance, &options);
    print_json(&serde_json::to_value(&recognitions)?, cli_args)?;

    if recognitions.is_empty() {
        return Ok(EXIT_NO_RECOGNITION);
    }
    Ok(EXIT_OK)
}

/// Generate sample sentences and print them as JSON, keyed by intent.
fn sample_command(args: SampleArgs, cli_args: &ParlanceArgs) -> Result<i32> {
    let graph = build_graph(&args.templates)?;
    let sampled = sample_by_intent(&graph, args.count);
    print_json(&serde_json::to_value(&sampled)?, cli_args)?;
    Ok(EXIT_OK)
}
