use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use labeler::{commands, console, Config, Dataset};

#[derive(Parser)]
#[command(name = "labeler")]
#[command(about = "Labeler - Rubric labeling for model answers\nScore, store and export StackOverflow answer evaluations")]
#[command(version)]
struct Cli {
  /// Storage root for label files and exports
  #[arg(long, global = true)]
  root: Option<PathBuf>,

  /// Directory holding the source dataset files
  #[arg(long, global = true)]
  data_dir: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

/// Common (annotator, dataset) scope arguments
#[derive(Args)]
struct Scope {
  /// Annotator name; partitions the label files
  #[arg(short, long)]
  annotator: String,
  /// Dataset the labels belong to (Faiz_FJ or FJ_only)
  #[arg(short, long)]
  dataset: Dataset,
}

#[derive(Subcommand)]
enum Commands {
  /// Print a default evaluation record for a post
  Template {
    post_id: String,
    #[arg(short, long)]
    dataset: Dataset,
  },
  /// Check whether a draft record is complete
  Check {
    /// Draft record file
    file: PathBuf,
    #[arg(short, long)]
    dataset: Dataset,
  },
  /// Submit a draft record to the annotator's label file
  Submit {
    /// Draft record file
    file: PathBuf,
    #[command(flatten)]
    scope: Scope,
    /// Question title to store with the record
    #[arg(short, long)]
    title: Option<String>,
  },
  /// Show the stored record for a post
  Show {
    post_id: String,
    #[command(flatten)]
    scope: Scope,
    /// Render a readable summary instead of JSON
    #[arg(short, long)]
    preview: bool,
  },
  /// Show labeling progress against the source dataset
  Status {
    #[command(flatten)]
    scope: Scope,
  },
  /// List an annotator's label files
  Files {
    #[arg(short, long)]
    annotator: String,
  },
  /// Combine all of an annotator's records into one file
  Bundle {
    #[arg(short, long)]
    annotator: String,
    /// Output file
    #[arg(short, long)]
    output: PathBuf,
  },
  /// List every label file under the storage root
  List,
  /// Merge every label file into one JSON array
  Merge {
    /// Output file name (defaults to a timestamped name)
    #[arg(short, long)]
    name: Option<String>,
  },
  /// Merge and flatten every label file into a CSV table
  Export {
    /// Output file name (defaults to a timestamped name)
    #[arg(short, long)]
    name: Option<String>,
  },
}

fn init_logging(verbose: bool) {
  let default_filter = if verbose { "labeler=debug,warn" } else { "labeler=info,warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();
}

fn run(cli: Cli) -> Result<()> {
  let mut config = Config::load()?;
  if let Some(root) = cli.root {
    config.output_dir = root;
  }
  if let Some(data_dir) = cli.data_dir {
    config.data_dir = data_dir;
  }

  match cli.command {
    Commands::Template { post_id, dataset } => commands::print_template(&config, &post_id, dataset),
    Commands::Check { file, dataset } => commands::check_draft(&file, dataset),
    Commands::Submit { file, scope, title } => {
      commands::submit_draft(&config, &file, &scope.annotator, scope.dataset, title)
    }
    Commands::Show { post_id, scope, preview } => {
      commands::show_record(&config, &post_id, &scope.annotator, scope.dataset, preview)
    }
    Commands::Status { scope } => commands::show_status(&config, &scope.annotator, scope.dataset),
    Commands::Files { annotator } => commands::list_annotator_files(&config, &annotator),
    Commands::Bundle { annotator, output } => commands::bundle_annotator(&config, &annotator, &output),
    Commands::List => commands::list_all_files(&config),
    Commands::Merge { name } => commands::merge_files(&config, name.as_deref()),
    Commands::Export { name } => commands::export_csv(&config, name.as_deref()),
  }
}

fn main() {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  if let Err(err) = run(cli) {
    console::error(&format!("{err:#}"));
    std::process::exit(1);
  }
}
