use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;

use gitver::config::load_config;
use gitver::git::Git2Repository;
use gitver::ui::{self, OutputFormat};
use gitver::{calculate_version, GitverError, Target};

#[derive(clap::Parser)]
#[command(
    name = "gitver",
    version,
    about = "Calculate semantic versions from git history and branch conventions"
)]
struct Args {
    #[arg(short, long, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[arg(
        short,
        long,
        conflicts_with = "commit",
        help = "Calculate the version of this branch instead of HEAD"
    )]
    branch: Option<String>,

    #[arg(long, help = "Calculate the version of this commit (any revision git understands)")]
    commit: Option<String>,

    #[arg(long, value_name = "NAME", help = "Print only the value of one variable, e.g. FullSemVer")]
    show_variable: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, help = "Output format")]
    format: OutputFormat,

    #[arg(long, help = "Print the effective configuration as TOML and exit")]
    show_config: bool,

    #[arg(short, long, default_value = ".", help = "Path inside the git repository")]
    path: PathBuf,

    #[arg(short, long, action = ArgAction::Count, help = "Log more (-v info, -vv debug, -vvv trace)")]
    verbose: u8,

    #[arg(short, long, conflicts_with = "verbose", help = "Only print the version output")]
    quiet: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            ui::display_error(&format!("{:#}", e));
            if is_configuration_error(&e) {
                ui::display_hint("run with --show-config to inspect the effective configuration");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;

    if args.show_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let repo = Git2Repository::open(&args.path)
        .with_context(|| format!("No git repository at {}", args.path.display()))?;

    let target = match (&args.branch, &args.commit) {
        (Some(branch), _) => Target::Branch(branch.clone()),
        (None, Some(revision)) => Target::Commit(
            repo.resolve_commit(revision)
                .with_context(|| format!("Cannot resolve commit '{}'", revision))?,
        ),
        (None, None) => Target::Current,
    };

    let calculated = calculate_version(&repo, &target, &config)
        .with_context(|| format!("Failed to calculate the version of {}", target))?;

    if args.verbose > 0 {
        ui::display_summary(&calculated);
    }
    // Diagnostics already reach stderr through the log at -v and above
    let show_diagnostics = !args.quiet && args.verbose == 0;
    ui::print_version(
        &calculated,
        args.format,
        args.show_variable.as_deref(),
        show_diagnostics,
    )?;
    Ok(())
}

fn is_configuration_error(error: &anyhow::Error) -> bool {
    error
        .chain()
        .filter_map(|cause| cause.downcast_ref::<GitverError>())
        .any(GitverError::is_configuration)
}

/// Log to stderr; stdout carries nothing but the version output
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "off",
        (false, 0) => "error",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };
    let default_filter = format!("gitver={}", level);
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
