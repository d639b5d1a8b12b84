use anyhow::Result;
use clap::Parser;
use contribman::commands;
use contribman::config::Overrides;
use contribman::contribution::ContributionType;
use std::path::PathBuf;

/// contribman - sketchbook contribution manager
///
/// Browse, install, update and remove libraries, tools, modes and examples
/// advertised in the contribution listing.
///
/// Examples:
///   contribman refresh              # Download the latest listing
///   contribman list is:updatable    # Show installed contributions with updates
///   contribman install "Sound"      # Install or update a contribution
#[derive(Parser, Debug)]
#[command(author, version = env!("CONTRIBMAN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Sketchbook folder (also via CONTRIBMAN_SKETCHBOOK)
    #[arg(
        long = "sketchbook",
        short = 's',
        env = "CONTRIBMAN_SKETCHBOOK",
        value_name = "PATH",
        global = true
    )]
    pub sketchbook: Option<PathBuf>,

    /// Folder holding settings.json and the cached listing (also via CONTRIBMAN_SETTINGS_DIR)
    #[arg(
        long = "settings-dir",
        env = "CONTRIBMAN_SETTINGS_DIR",
        value_name = "PATH",
        global = true
    )]
    pub settings_dir: Option<PathBuf>,

    /// Contribution listing URL (overrides the settings file)
    #[arg(long = "listing-url", value_name = "URL", global = true)]
    pub listing_url: Option<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            sketchbook: self.sketchbook.clone(),
            settings_dir: self.settings_dir.clone(),
            listing_url: self.listing_url.clone(),
        }
    }
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List contributions, optionally filtered
    List(ListArgs),

    /// Download the latest contribution listing
    Refresh,

    /// Install or update a contribution
    Install(InstallArgs),

    /// Remove an installed contribution
    Remove(TargetArgs),

    /// Keep a tool or mode that was flagged for removal
    Restore(TargetArgs),

    /// Delete tools and modes flagged for removal
    Sweep,

    /// Show listed libraries that provide the given imports
    Suggest(SuggestArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only show this category ("Any" for all)
    #[arg(long, short = 'c')]
    pub category: Option<String>,

    /// Filter tokens: words to search for, or is:/has:/not: followed by
    /// installed, updatable, library, tool, mode, compilation or examples
    #[arg(value_name = "FILTER")]
    pub filters: Vec<String>,

    /// Hide contributions that do not run on this host revision
    #[arg(long, value_name = "REVISION")]
    pub revision: Option<i64>,
}

#[derive(clap::Args, Debug)]
pub struct SuggestArgs {
    /// Import headers such as `ddf.minim.*` or `ddf.minim.analysis.FFT`
    #[arg(value_name = "IMPORT", required = true)]
    pub imports: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Contribution name as shown by `list`
    #[arg(value_name = "NAME", required_unless_present = "archive")]
    pub name: Option<String>,

    /// Contribution type, needed when a name is shared across types
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub kind: Option<ContributionType>,

    /// Install from a local .zip or .tar.gz instead of the listing
    #[arg(long, value_name = "PATH", conflicts_with = "name")]
    pub archive: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct TargetArgs {
    /// Contribution name as shown by `list`
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Contribution type, needed when a name is shared across types
    #[arg(long = "type", short = 't', value_name = "TYPE")]
    pub kind: Option<ContributionType>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = contribman::runtime::RealRuntime;
    let overrides = cli.overrides();

    match cli.command {
        Commands::List(args) => {
            commands::list(runtime, overrides, args.category, args.filters, args.revision)?
        }
        Commands::Refresh => commands::refresh(runtime, overrides).await?,
        Commands::Install(args) => {
            commands::install(runtime, overrides, args.name, args.kind, args.archive).await?
        }
        Commands::Remove(args) => {
            commands::remove(runtime, overrides, &args.name, args.kind).await?
        }
        Commands::Restore(args) => commands::restore(runtime, overrides, &args.name, args.kind)?,
        Commands::Sweep => commands::sweep(runtime, overrides)?,
        Commands::Suggest(args) => commands::suggest(runtime, overrides, args.imports)?,
    }
    Ok(())
}
