use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use lar_core::config::CONFIG_FILE_NAME;
use lar_core::packer::{default_output_name, ensure_archive_extension};
use lar_core::{Archive, ArchiveSet, CliOverrides, LarConfig, Packer};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// lar - pack Lua scripts into archives and run them
#[derive(Parser, Debug)]
#[command(name = "lar")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack every script in a directory into one archive
    Pack(PackArgs),
    /// Load archives and run an entry script
    Run(RunArgs),
    /// List the scripts stored in an archive
    List {
        /// Archive to inspect
        #[arg(value_name = "ARCHIVE")]
        archive: PathBuf,
    },
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Directory holding the scripts
    #[arg(short, long, value_name = "DIR", default_value = "scripts")]
    dir: PathBuf,

    /// Output archive (default: <dir name>.lar)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Script file extension to pack
    #[arg(long, value_name = "EXT", default_value = "lua")]
    ext: String,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Archive to load; repeat to layer several, earlier ones win
    #[arg(short = 'f', long = "file", value_name = "ARCHIVE")]
    archives: Vec<PathBuf>,

    /// Fallback directory for scripts missing from every archive
    #[arg(short = 's', long = "search-path", value_name = "DIR")]
    search_paths: Vec<PathBuf>,

    /// Entry script (logical path inside the archives)
    #[arg(short, long, value_name = "FILE")]
    entry: Option<String>,

    /// Run the entry straight from disk instead of resolving it
    #[arg(long)]
    disk: bool,

    /// Path to a lar.yaml configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Script file extension used when resolving modules
    #[arg(long, value_name = "EXT")]
    ext: Option<String>,

    /// Keep the engine's native library searchers
    #[arg(long)]
    no_sandbox: bool,
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug to trace module resolution
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Pack(args) => pack(args),
        Command::Run(args) => run(args),
        Command::List { archive } => list(archive),
    }
}

fn pack(args: PackArgs) -> anyhow::Result<()> {
    let output = match args.output {
        Some(ref name) => ensure_archive_extension(name),
        None => default_output_name(&args.dir),
    };

    let report = Packer::new(&args.ext)
        .pack(&output, &args.dir)
        .with_context(|| format!("failed to pack {}", args.dir.display()))?;

    println!(
        "Packed {} script(s) into {}",
        report.files.len(),
        output.display()
    );
    Ok(())
}

/// Configuration file (explicit or `./lar.yaml`) merged with CLI flags
fn load_config(args: &RunArgs) -> anyhow::Result<LarConfig> {
    let mut config = if let Some(ref path) = args.config {
        LarConfig::from_file(path)
            .with_context(|| format!("failed to load config file {}", path.display()))?
    } else {
        let default_path = PathBuf::from(CONFIG_FILE_NAME);
        if default_path.exists() {
            LarConfig::from_file(&default_path)
                .with_context(|| format!("failed to load {}", CONFIG_FILE_NAME))?
        } else {
            LarConfig::default()
        }
    };

    let overrides = CliOverrides {
        script_extension: args.ext.clone(),
        archives: args.archives.clone(),
        search_paths: args.search_paths.clone(),
        entry: args.entry.clone(),
        sandbox: args.no_sandbox.then_some(false),
    };
    config.merge(&overrides);

    if config.search_paths.is_empty() {
        config.search_paths = vec![PathBuf::from("./"), PathBuf::from("scripts")];
    }

    config.validate()?;
    Ok(config)
}

fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    debug!("Run configuration: {:?}", config);

    let set = ArchiveSet::with_config(config.clone()).context("failed to start Lua engine")?;

    set.add_search_paths(&config.search_paths)
        .context("failed to add search paths")?;

    for archive in &config.archives {
        set.load_archive(archive)
            .with_context(|| format!("failed to load archive {}", archive.display()))?;
    }
    info!(
        "{} archive(s), {} search path(s)",
        set.archive_names().len(),
        set.search_paths().len()
    );

    let outcome = if args.disk {
        set.run_disk_file(&config.entry)
    } else {
        set.run_file(&config.entry)
    };
    outcome.with_context(|| format!("failed to run {}", config.entry))?;

    Ok(())
}

fn list(path: PathBuf) -> anyhow::Result<()> {
    let archive =
        Archive::open(&path).with_context(|| format!("failed to open {}", path.display()))?;

    for name in archive.entry_names() {
        println!("{}", name);
    }
    Ok(())
}
