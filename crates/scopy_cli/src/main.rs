//! scopy: The scope analyzer CLI.
//!
//! Usage:
//!   scopy check [options] [file...]
//!   scopy init
//!
//! Each file is a call-graph document. All files given to one `check` run are
//! merged into a single graph, so calls may cross files.

use clap::{Args, Parser as ClapParser, Subcommand};
use miette::{miette, IntoDiagnostic, Result, WrapErr};
use scopy_analyzer::{Analyzer, ProgramInput};
use scopy_diagnostics::Diagnostic;
use scopy_options::{AnalyzerOptions, ScopyConfig, CONFIG_FILE_NAME};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(ClapParser, Debug)]
#[command(name = "scopy", version, about = "scopy - static checks for scoped value providers")]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Never color diagnostics.
    #[arg(long = "no-color", global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze call-graph documents.
    Check(CheckArgs),
    /// Write a default scopy.json in the current directory.
    Init,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Call-graph documents to analyze. Defaults to the `files` list of the
    /// options file.
    #[arg(value_name = "FILE")]
    files: Vec<String>,

    /// Path to scopy.json.
    #[arg(short = 'o', long = "options")]
    options: Option<String>,

    /// Report every recorded effect as a message.
    #[arg(long = "debug-echo")]
    debug_echo: bool,

    /// Do not report effects hidden in local control flow.
    #[arg(long = "no-hidden-flow")]
    no_hidden_flow: bool,

    /// Report hidden effects as errors.
    #[arg(long = "hidden-flow-as-error")]
    hidden_flow_as_error: bool,

    /// Worker threads.
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

// ANSI color codes
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let use_color = !cli.no_color && stderr_is_terminal();
    let outcome = match &cli.command {
        Command::Check(args) => run_check(args, use_color),
        Command::Init => run_init().map(|()| 0),
    };

    match outcome {
        Ok(code) => process::exit(code),
        Err(report) => {
            eprintln!("{:?}", report);
            process::exit(1);
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("warn,scopy_cli=debug,scopy_analyzer=debug")
        } else {
            EnvFilter::new("warn")
        }
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_check(args: &CheckArgs, use_color: bool) -> Result<i32> {
    let start = Instant::now();

    let (config, config_dir) = load_config(args.options.as_deref())?;
    let files = resolve_input_files(args, config.as_ref(), &config_dir);
    if files.is_empty() {
        return Err(miette!("no input files; pass call-graph documents or list them in {}", CONFIG_FILE_NAME));
    }

    // CLI flags override the options file
    let mut options: AnalyzerOptions = config.and_then(|c| c.analyzer_options).unwrap_or_default();
    if args.debug_echo {
        options.debug_echo = Some(true);
    }
    if args.no_hidden_flow {
        options.report_hidden_flow = Some(false);
    }
    if args.hidden_flow_as_error {
        options.hidden_flow_as_error = Some(true);
    }
    if args.jobs.is_some() {
        options.jobs = args.jobs;
    }

    let mut input = ProgramInput::default();
    for file in &files {
        let text = std::fs::read_to_string(file)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to read {}", file.display()))?;
        let document = scopy_analyzer::parse_program(&text)
            .into_diagnostic()
            .wrap_err_with(|| format!("failed to parse {}", file.display()))?;
        debug!(file = %file.display(), routines = document.routines.len(), "loaded call graph");
        input.routines.extend(document.routines);
    }

    let result = Analyzer::new(options.effective())
        .analyze_program(input)
        .into_diagnostic()
        .wrap_err("analysis failed")?;

    for diag in result.diagnostics.diagnostics() {
        print_diagnostic(diag, use_color);
    }

    let elapsed = start.elapsed();

    if result.has_errors() {
        let count = result.diagnostics.error_count();
        let plural = if count == 1 { "" } else { "s" };
        if use_color {
            eprintln!("\n{}Found {} error{}.{}", RED, count, plural, RESET);
        } else {
            eprintln!("\nFound {} error{}.", count, plural);
        }
        return Ok(2);
    }

    if use_color {
        eprintln!(
            "{}Checked {} routines in {:.2}s.{}",
            GRAY,
            result.routines_checked,
            elapsed.as_secs_f64(),
            RESET
        );
    }

    Ok(0)
}

/// The options file named on the command line, or scopy.json in the current
/// directory if there is one. Returns the directory document paths in the
/// file are relative to.
fn load_config(explicit: Option<&str>) -> Result<(Option<ScopyConfig>, PathBuf)> {
    let path = match explicit {
        Some(path) => path.to_string(),
        None if Path::new(CONFIG_FILE_NAME).exists() => CONFIG_FILE_NAME.to_string(),
        None => return Ok((None, PathBuf::from("."))),
    };
    let config = scopy_options::parse_config_file(&path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read options '{}'", path))?;
    let dir = Path::new(&path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok((Some(config), dir))
}

fn resolve_input_files(args: &CheckArgs, config: Option<&ScopyConfig>, config_dir: &Path) -> Vec<PathBuf> {
    if !args.files.is_empty() {
        return args.files.iter().map(PathBuf::from).collect();
    }
    config
        .and_then(|c| c.files.as_ref())
        .map(|files| files.iter().map(|f| config_dir.join(f)).collect())
        .unwrap_or_default()
}

fn run_init() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);
    if path.exists() {
        return Err(miette!("a {} file already exists in the current directory", CONFIG_FILE_NAME));
    }
    std::fs::write(path, scopy_options::default_config_text())
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to create {}", CONFIG_FILE_NAME))?;
    println!("Successfully created a {} file.", CONFIG_FILE_NAME);
    Ok(())
}

fn print_diagnostic(diag: &Diagnostic, use_color: bool) {
    if !use_color {
        eprintln!("{}", diag);
        for related in &diag.related {
            eprintln!("  {}", related);
        }
        return;
    }

    let color = if diag.is_error() { RED } else { YELLOW };
    if let Some(ref file) = diag.file {
        eprint!("{}{}{}", CYAN, file, RESET);
        if let Some(span) = diag.span {
            eprint!("({})", span.start);
        }
        eprint!(": ");
    }
    eprintln!(
        "{}{}{}{} {}{}{}: {}",
        BOLD,
        color,
        diag.category,
        RESET,
        CYAN,
        diag.code_text(),
        RESET,
        diag.message
    );
    for related in &diag.related {
        eprintln!("  {}{}{}", GRAY, related, RESET);
    }
}

fn stderr_is_terminal() -> bool {
    #[cfg(unix)]
    {
        unsafe { libc::isatty(2) != 0 }
    }
    #[cfg(not(unix))]
    {
        false
    }
}
