#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{Diagnostic, IntoDiagnostic, NamedSource};
use skein_interpret::{Interpreter, InterpreterConfig, Value};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

mod manifest;

use manifest::ResolvedManifest;

#[derive(Parser, Debug)]
#[command(name = "skein", version, about = "Skein scripting runtime with OS threads")]
struct Cli {
    /// Explicit manifest path. By default `skein.toml` is searched upward.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Call depth limit of the main interpreter. Overrides `skein.toml`.
    #[arg(long, global = true)]
    max_call_depth: Option<usize>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run a script file
    Run {
        /// Input .sk file
        #[arg(default_value = "main.sk")]
        path: PathBuf,

        /// Arguments passed to the main chunk as `...`
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Run a source string and print what it returns
    Eval {
        source: String,

        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
}

#[derive(Debug, Error, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(skein::script))]
struct ScriptFailed {
    message: String,
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("SKEIN_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_manifest(
    cli_config: &Option<PathBuf>,
    start: &Path,
) -> miette::Result<ResolvedManifest> {
    let mut resolved = match cli_config {
        Some(path) => manifest::load_manifest_file(path)?,
        None => manifest::load_resolved_manifest(start)?,
    };
    resolved.apply_env(|key| std::env::var(key).ok());
    if let Some(path) = &resolved.manifest_path {
        tracing::debug!(
            manifest = %path.display(),
            root = %resolved.project_root.display(),
            "loaded manifest"
        );
    }
    Ok(resolved)
}

fn new_interpreter(resolved: &ResolvedManifest, max_call_depth: Option<usize>) -> Interpreter {
    let mut interp = Interpreter::new(InterpreterConfig {
        max_call_depth: max_call_depth.unwrap_or(resolved.max_call_depth),
        package: resolved.package.clone(),
        capture_output: false,
    });
    skein_thread::install(&mut interp, Arc::new(resolved.threads.clone()));
    interp.set_message_handler(|err| err.with_traceback());
    interp
}

fn exec(
    interp: &mut Interpreter,
    name: &str,
    src: &str,
    args: Vec<String>,
) -> miette::Result<Vec<Value>> {
    let main = interp.load(src, name).map_err(|e| {
        miette::Report::new(e).with_source_code(NamedSource::new(name, src.to_string()))
    })?;
    let args = args.into_iter().map(Value::from).collect();
    interp.call(&main, args).map_err(|err| {
        ScriptFailed {
            message: err.with_traceback(),
        }
        .into()
    })
}

fn main() -> miette::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Run { path, args } => {
            let resolved = resolve_manifest(&cli.config, &path)?;
            let src = fs::read_to_string(&path).into_diagnostic()?;
            let name = path.to_string_lossy().to_string();
            let mut interp = new_interpreter(&resolved, cli.max_call_depth);
            exec(&mut interp, &name, &src, args)?;
        }
        Cmd::Eval { source, args } => {
            let cwd = std::env::current_dir().into_diagnostic()?;
            let resolved = resolve_manifest(&cli.config, &cwd)?;
            let mut interp = new_interpreter(&resolved, cli.max_call_depth);
            let values = exec(&mut interp, "=eval", &source, args)?;
            if !values.is_empty() {
                let line: Vec<String> = values.iter().map(Value::to_string).collect();
                println!("{}", line.join("\t"));
            }
        }
    }

    tracing::debug!(live_workers = skein_thread::live_workers(), "exiting");
    Ok(())
}
