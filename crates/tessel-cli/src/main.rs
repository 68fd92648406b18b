use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use miette::{Context, IntoDiagnostic};

use tessel_backend_core::{BackendOptions, BackendRegistry, OutputContent};
use tessel_lower::{KernelRequest, RuleTable};

/// Tessel: lowers tensor kernel programs to GPU kernel IR
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Input kernel request (JSON)
    input: PathBuf,

    /// Target backend (default: ir-dump)
    #[arg(short, long, default_value = "ir-dump")]
    target: String,

    /// Output path (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optimization level forwarded to the backend: 0 to 3
    #[arg(long, default_value = "0", value_parser = parse_opt_level)]
    opt_level: u8,

    /// Dump IR to stderr before backend compilation
    #[arg(long)]
    emit_ir: bool,

    /// Lower without producing output
    #[arg(long)]
    dry_run: bool,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn parse_opt_level(s: &str) -> Result<u8, String> {
    match s.parse::<u8>() {
        Ok(level) if level <= 3 => Ok(level),
        _ => Err(format!(
            "invalid optimization level '{s}', expected 0, 1, 2, or 3"
        )),
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::init_from_env(env_logger::Env::default().default_filter_or(filter));

    // 1. Read the request.
    let source = std::fs::read_to_string(&cli.input)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to read {}", cli.input.display()))?;

    let request = KernelRequest::from_json(&source)
        .into_diagnostic()
        .wrap_err("malformed kernel request")?;

    // 2. Lower to kernel IR.
    let kernel = request
        .lower(&RuleTable::with_builtins())
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err_with(|| format!("failed to lower kernel '{}'", request.name))?;
    log::debug!(
        "lowered '{}' for launch grid {:?}",
        request.name,
        kernel.grid
    );

    // 3. Optionally dump IR to stderr.
    if cli.emit_ir {
        eprintln!("{}", tessel_ir::dump_module(&kernel.module));
    }

    // 4. Dry-run: stop here.
    if cli.dry_run {
        return Ok(());
    }

    // 5. Backend dispatch.
    let registry = BackendRegistry::with_builtins();
    let backend = registry.find(&cli.target).ok_or_else(|| {
        let available = registry.list_targets().join(", ");
        miette::miette!("unknown target '{}' (available: {})", cli.target, available)
    })?;

    let opts = BackendOptions {
        target: cli.target.clone(),
        opt_level: cli.opt_level,
    };

    let output = backend
        .compile(&kernel.module, &kernel.grid, &opts)
        .map_err(|e| miette::miette!("{e}"))
        .wrap_err("backend compilation failed")?;

    // 6. Print diagnostics.
    for diag in &output.diagnostics {
        eprintln!("{diag}");
    }

    // 7. Write output.
    for file in &output.files {
        match (&cli.output, &file.content) {
            (Some(path), OutputContent::Text(text)) => {
                std::fs::write(path, text)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
            (Some(path), OutputContent::Binary(data)) => {
                std::fs::write(path, data)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("failed to write {}", path.display()))?;
            }
            (None, OutputContent::Text(text)) => {
                print!("{text}");
            }
            (None, OutputContent::Binary(_)) => {
                return Err(miette::miette!(
                    "backend produced binary output but no --output path was specified"
                ));
            }
        }
    }

    Ok(())
}
