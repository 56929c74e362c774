use anyhow::Result;
use clap::Parser;
use linker_graph::{link, Catalog, LinkReport, ResolveMode, ResolveOptions};
use linker_protocol::{serialize_json, serialize_json_pretty, ErrorEnvelope};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

mod data_io;
mod flags;
mod report;

use flags::ResolveModeFlag;

const CATALOG_ENV: &str = "LINKER_CATALOG";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "linker")]
#[command(about = "Cross-link records between the sections of a data file", long_about = None)]
#[command(version)]
struct Cli {
    /// Data file to link in place
    #[arg(short, long, default_value = "data.txt")]
    data: PathBuf,

    /// Resolve sections once, in kind dependency order
    #[arg(long, conflicts_with = "mode")]
    fast: bool,

    /// Resolution strategy
    #[arg(long, value_enum)]
    mode: Option<ResolveModeFlag>,

    /// Attach the debug listing of every link to the aggregator records
    #[arg(long)]
    debug: bool,

    /// Parse and resolve without writing the data file
    #[arg(long)]
    dry: bool,

    /// Write the link graph preview (DOT, or JSON for a .json path)
    #[arg(long, value_name = "PATH")]
    preview: Option<PathBuf>,

    /// Relation catalog (TOML or JSON) replacing the built-in one (falls back to LINKER_CATALOG)
    #[arg(long, value_name = "PATH")]
    catalog: Option<PathBuf>,

    /// Write the linked file here instead of in place
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn resolve_mode(&self) -> ResolveMode {
        if self.fast {
            return ResolveMode::Fast;
        }
        self.mode
            .map(ResolveModeFlag::as_domain)
            .unwrap_or_default()
    }

    fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.clone().or_else(|| {
            env::var_os(CATALOG_ENV)
                .filter(|value| !value.is_empty())
                .map(PathBuf::from)
        })
    }
}

pub fn main_entry() -> ExitCode {
    let mut cli = Cli::parse();

    // stdout is reserved for the JSON document
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.json {
                let envelope = report::error_envelope(&err);
                if let Err(print_err) = print_envelope(&envelope, print_stdout) {
                    log::warn!("Failed to print error envelope: {print_err:#}");
                    eprintln!("error[{}]: {err:#}", envelope.code);
                }
            } else {
                eprintln!("error[{}]: {err:#}", report::error_code(&err));
            }
            ExitCode::FAILURE
        }
    }
}

fn print_envelope(envelope: &ErrorEnvelope, print: impl FnOnce(&str) -> Result<()>) -> Result<()> {
    print(&serialize_json(envelope)?)
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    let catalog = match path {
        Some(path) => {
            log::debug!("Loading relation catalog from {}", path.display());
            Catalog::parse(&data_io::read_catalog(path)?)?
        }
        None => Catalog::builtin()?,
    };
    Ok(catalog)
}

fn run(cli: &Cli) -> Result<()> {
    let catalog = load_catalog(cli.catalog_path().as_deref())?;
    let text = data_io::read_data(&cli.data)?;

    let options = ResolveOptions {
        mode: cli.resolve_mode(),
        with_debug: cli.debug,
    };
    let (linked, link_report) = link(&text, &catalog, options)?;

    for warning in &link_report.warnings {
        log::warn!("Unresolved link: {warning}");
    }

    if let Some(path) = &cli.preview {
        write_preview(path, &link_report)?;
    }

    let written = if cli.dry {
        log::info!("Dry run: {} left untouched", cli.data.display());
        None
    } else {
        let target = cli.output.as_deref().unwrap_or(&cli.data);
        if cli.output.is_none() && linked == text {
            log::info!("{} already up to date", target.display());
            None
        } else {
            data_io::write_atomic(target, &linked)?;
            log::info!("Wrote {}", target.display());
            Some(target)
        }
    };

    let run_report = report::run_report(&link_report, cli.dry, written);
    if cli.json {
        print_stdout(&serialize_json(&run_report)?)?;
    } else {
        print_stdout(&report::summary(&run_report))?;
    }
    Ok(())
}

fn write_preview(path: &Path, link_report: &LinkReport) -> Result<()> {
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let contents = if is_json {
        serialize_json_pretty(&link_report.graph.preview())?
    } else {
        link_report.graph.to_dot()
    };
    data_io::write_atomic(path, &contents)?;
    log::info!("Wrote preview to {}", path.display());
    Ok(())
}
