use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use owo_colors::OwoColorize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use tjoy_sequencer::codec::read_files;
use tjoy_sequencer::sequence::TreeNode;
use tjoy_sequencer::{
    ElementStatus, ImportSettings, Role, Sequencer, SequencerConfig, SequencerError,
    SequencerResult, TestSequenceContainer, TestSequencerProject, TestType,
};

#[derive(Parser)]
#[command(name = "tseq", version, about = "Inspect, merge and discover test sequences")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Role to act as (Admin, Operator, Local).
    #[arg(long, global = true)]
    role: Option<Role>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print a summary of a sequence file.
    Show { file: PathBuf },

    /// Import several sequence files and save the merged sequence as OUT.
    Merge {
        out: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Discover tests and print them as JSON.
    Discover {
        /// python, pytest or robotframework.
        #[arg(long)]
        kind: TestType,
        /// Import the whole path as a single test.
        #[arg(long)]
        one_ref: bool,
        path: PathBuf,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!(error = ?err, "command failed");
            eprintln!("{} {}", "error:".red().bold(), err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> SequencerResult<()> {
    let mut config = SequencerConfig::load(cli.config.as_deref())?;
    if let Some(role) = cli.role {
        config = config.with_role(role);
    }

    match cli.command {
        Command::Show { file } => show(&config, &file),
        Command::Merge { out, files } => merge(&config, &out, &files).await,
        Command::Discover {
            kind,
            one_ref,
            path,
        } => discover(&config, kind, one_ref, &path).await,
    }
}

fn show(config: &SequencerConfig, file: &Path) -> SequencerResult<()> {
    let raw = std::fs::read_to_string(file)?;
    let codec = tjoy_sequencer::SequenceCodec::new(config.sequence_extension.clone());
    let container = codec.parse(file, &raw)?;
    print_summary(&container);
    Ok(())
}

async fn merge(config: &SequencerConfig, out: &Path, files: &[PathBuf]) -> SequencerResult<()> {
    let name = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| SequencerError::NotFound(format!("output name in {}", out.display())))?;
    let dir = out
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let sequencer = Sequencer::from_config(config)?;
    let picked = read_files(files).await?;
    sequencer.import_sequences(picked).await?;
    sequencer
        .registry()
        .await
        .set_test_sequencer_project(Some(TestSequencerProject::new(name).with_project_path(dir)));
    let path = sequencer.save().await?;

    let registry = sequencer.registry().await;
    println!(
        "{} {} ({} tests from {} files)",
        "saved".green(),
        path.display(),
        registry.elements().len(),
        files.len()
    );
    Ok(())
}

async fn discover(
    config: &SequencerConfig,
    kind: TestType,
    one_ref: bool,
    path: &Path,
) -> SequencerResult<()> {
    let sequencer = Sequencer::from_config(config)?;
    let settings = ImportSettings::new(kind).as_one_ref(one_ref);
    let elements = sequencer.discover_elements(path, settings).await?;
    println!("{}", serde_json::to_string_pretty(&elements)?);
    Ok(())
}

fn print_summary(container: &TestSequenceContainer) {
    let cycle = &container.cycle;
    println!("{}", container.project.name.bold());
    if !container.project.description.is_empty() {
        println!("  {}", container.project.description.dimmed());
    }
    let cycles = if cycle.infinite {
        "infinite".to_string()
    } else {
        cycle.cycle_count.to_string()
    };
    println!("  cycles: {}  tests: {}", cycles, container.elements.len());
    for node in container.tree.children() {
        print_node(node, 1);
    }
}

fn print_node(node: &TreeNode, depth: usize) {
    let indent = "  ".repeat(depth);
    match node {
        TreeNode::Test(test) => {
            let status = match test.status {
                ElementStatus::Passed => test.status.as_str().green().to_string(),
                ElementStatus::Failed => test.status.as_str().red().to_string(),
                ElementStatus::Running => test.status.as_str().yellow().to_string(),
                ElementStatus::Pending => test.status.as_str().dimmed().to_string(),
            };
            println!("{indent}- {} [{}] {}", test.test_name, test.test_type, status);
        }
        TreeNode::Group(group) => {
            println!("{indent}+ {}", group.name.cyan());
            for child in &group.children {
                print_node(child, depth + 1);
            }
        }
    }
}
