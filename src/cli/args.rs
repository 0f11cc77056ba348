//! Command line argument parsing for the parlance CLI using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Parlance - template-grammar intent recognition for voice commands
#[derive(Parser, Debug, Clone)]
#[command(name = "parlance")]
#[command(about = "Template-grammar intent recognition for voice commands")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct ParlanceArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl ParlanceArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile template files into a graph, printed as JSON
    Compile(CompileArgs),

    /// Export the compiled graph in OpenFST text format
    Fst(FstArgs),

    /// Recognize an utterance against the compiled graph
    Recognize(RecognizeArgs),

    /// Generate sample sentences per intent
    Sample(SampleArgs),
}

/// Arguments for compiling templates to graph JSON
#[derive(Parser, Debug, Clone)]
pub struct CompileArgs {
    /// Template files (reads stdin when empty)
    #[arg(value_name = "TEMPLATE_FILE")]
    pub templates: Vec<PathBuf>,
}

/// Arguments for FST export
#[derive(Parser, Debug, Clone)]
pub struct FstArgs {
    /// Template files (reads stdin when empty)
    #[arg(value_name = "TEMPLATE_FILE")]
    pub templates: Vec<PathBuf>,

    /// Path to the FST text file
    #[arg(long, default_value = "fst.txt")]
    pub fst_text: PathBuf,

    /// Path to the FST input symbols file
    #[arg(long, default_value = "fst.isymbols.txt")]
    pub fst_isymbols: PathBuf,

    /// Path to the FST output symbols file
    #[arg(long, default_value = "fst.osymbols.txt")]
    pub fst_osymbols: PathBuf,
}

/// Arguments for recognizing an utterance
#[derive(Parser, Debug, Clone)]
pub struct RecognizeArgs {
    /// The utterance to recognize
    #[arg(value_name = "UTTERANCE")]
    pub utterance: String,

    /// Template files (reads stdin when empty)
    #[arg(value_name = "TEMPLATE_FILE")]
    pub templates: Vec<PathBuf>,

    /// Use the strict matcher instead of fuzzy search
    #[arg(long)]
    pub strict: bool,

    /// Stop words that may be skipped (repeatable)
    #[arg(long = "stop-word", value_name = "WORD")]
    pub stop_words: Vec<String>,

    /// Maximum number of candidates to return
    #[arg(long)]
    pub max_recognitions: Option<usize>,

    /// Wall-clock budget in seconds
    #[arg(long)]
    pub max_seconds: Option<f64>,
}

/// Arguments for sampling sentences
#[derive(Parser, Debug, Clone)]
pub struct SampleArgs {
    /// Template files (reads stdin when empty)
    #[arg(value_name = "TEMPLATE_FILE")]
    pub templates: Vec<PathBuf>,

    /// Samples per intent (all sentences when omitted)
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}
