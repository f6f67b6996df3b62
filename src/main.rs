use clap::{Parser, Subcommand};
use man2help::{config, output, process, system};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "man2help")]
#[command(about = "man-page to Qt Help converter")]
#[command(long_about = "\
man-page to Qt Help converter

Renders the man pages of the given categories to HTML with groff and writes
a Qt Help Project catalog listing every page. Runs are incremental: a page is
only re-rendered when its source changed.

Cache directory layout:

  <cache-dir>/
  ├── man2help.toml          # Optional config (see gen-config)
  ├── man.qhp                # Catalog, rewritten every run
  ├── html.2/
  │   ├── select.html        # From /usr/share/man/man2/select.2.gz
  │   └── images/            # Tables and diagrams, <page>-<n>.png
  └── html.3p/

To build the help file afterwards:

  qhelpgenerator <cache-dir>/man.qhp

Run 'man2help gen-config' to generate a documented man2help.toml.")]
#[command(version)]
#[command(subcommand_negates_reqs = true, args_conflicts_with_subcommands = true)]
struct Cli {
    /// Man page category to convert, such as 2 or 3p
    #[arg(value_name = "CATEGORY", required = true)]
    categories: Vec<String>,

    /// Cache root directory for the HTML output and the catalog
    #[arg(long, value_name = "DIR", default_value = ".")]
    cache_dir: PathBuf,

    /// Re-render every page, ignoring modification times
    #[arg(short, long)]
    force: bool,

    /// Catalog file name; it is always written into the cache directory
    #[arg(short, long, value_name = "FILE")]
    output: Option<String>,

    /// Qt Help namespace [default: man.linux.org.1.0]
    #[arg(long, value_name = "NS")]
    namespace: Option<String>,

    /// Directory containing man1/, man2/, ... [default: /usr/share/man]
    #[arg(long, value_name = "DIR")]
    source_root: Option<PathBuf>,

    /// Config file [default: <cache-dir>/man2help.toml if present]
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Only print category summaries and the final result
    #[arg(short, long)]
    quiet: bool,

    /// Process even when required tools are missing
    #[arg(long)]
    ignore_system_check: bool,

    /// Log progress details (same as RUST_LOG=info)
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a stock man2help.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Some(Command::GenConfig) = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = resolve_cli_config(&cli)?;

    let missing = system::check_system(&config.formatter.program);
    if !missing.is_empty() {
        output::print_missing_tools(&missing);
        if !cli.ignore_system_check {
            std::process::exit(1);
        }
    }

    init_thread_pool(&config.processing);

    let options = process::RunOptions {
        cache_root: cli.cache_dir.clone(),
        categories: cli.categories.clone(),
        force: cli.force,
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let cache_root = cli.cache_dir.clone();
    let quiet = cli.quiet;
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_process_event(&event, &cache_root, quiet) {
                println!("{}", line);
            }
        }
    });
    let result = process::run(&config, &options, Some(tx));
    // The sender is gone once run returns, so the printer drains and exits.
    let _ = printer.join();

    let report = result?;
    output::print_run_summary(&report);
    Ok(())
}

/// Load the config file, then apply command-line overrides.
fn resolve_cli_config(cli: &Cli) -> Result<config::ToolConfig, config::ConfigError> {
    let mut config = config::load_config(cli.config.as_deref(), &cli.cache_dir)?;
    if let Some(output) = &cli.output {
        config.output = output.clone();
    }
    if let Some(namespace) = &cli.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(source_root) = &cli.source_root {
        config.source_root = source_root.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Warnings by default; `--verbose` or `RUST_LOG` raise it.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Size the global rayon pool, which bounds concurrent formatter processes.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
