use anchor_patcher::config::{apply_patches, check_patches, load_from_path, ApplicationError};
use anchor_patcher::{
    AnchorPattern, InsertionBlock, LineCondition, PatchError, PatchOutcome, Patcher, Placement,
    RunMode,
};
use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use colored::Colorize;
use similar::{ChangeTag, TextDiff};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "anchor-patcher")]
#[command(about = "Insert code blocks at textual anchors in source files", long_about = None)]
#[command(version)]
struct Cli {
    /// Log each step of the run to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Insert a block into a single file
    Insert(InsertArgs),

    /// Apply patches from a TOML patch file (or every *.toml in a directory)
    Apply {
        /// Patch file or directory of patch files
        config: PathBuf,

        /// Directory relative target paths are resolved against (default: current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,

        /// Dry run - show what would be changed without modifying files
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Show a diff of each change
        #[arg(short, long)]
        diff: bool,
    },

    /// Report what applying would do, without writing
    Check {
        /// Patch file or directory of patch files
        config: PathBuf,

        /// Directory relative target paths are resolved against (default: current directory)
        #[arg(short, long)]
        workspace: Option<PathBuf>,
    },
}

#[derive(Args)]
#[command(group(ArgGroup::new("block").required(true).args(["text", "block_file"])))]
struct InsertArgs {
    /// File to patch
    #[arg(short, long)]
    file: PathBuf,

    /// Anchor condition, repeatable; all must hold (e.g. `0:trimmed:};` `2:contains:webhook`)
    #[arg(
        long = "when",
        value_name = "OFFSET:KIND[:TEXT]",
        required = true,
        allow_hyphen_values = true
    )]
    conditions: Vec<LineCondition>,

    /// Block to insert, given inline
    #[arg(long)]
    text: Option<String>,

    /// Block to insert, read from a file
    #[arg(long, value_name = "PATH")]
    block_file: Option<PathBuf>,

    /// Insert before the anchor line instead of after it
    #[arg(long)]
    before: bool,

    /// Insert even if the block is already present
    #[arg(long)]
    force: bool,

    /// Dry run - show what would be changed without modifying the file
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Show a diff of the change
    #[arg(short, long)]
    diff: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Insert(args) => cmd_insert(args),

        Commands::Apply {
            config,
            workspace,
            dry_run,
            diff,
        } => cmd_apply(config, workspace, dry_run, diff),

        Commands::Check { config, workspace } => cmd_check(config, workspace),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    // Ignore a second init; only happens when embedded
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run_mode(dry_run: bool) -> RunMode {
    if dry_run {
        RunMode::DryRun
    } else {
        RunMode::Apply
    }
}

fn cmd_insert(args: InsertArgs) -> Result<()> {
    // clap guarantees exactly one of the two
    let text = match args.block_file {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("cannot read block file {}", path.display()))?,
        None => args.text.unwrap_or_default(),
    };

    let placement = if args.before {
        Placement::Before
    } else {
        Placement::After
    };
    let patcher = Patcher::new(
        AnchorPattern::new(args.conditions),
        InsertionBlock::from_text(&text),
    )
    .placement(placement)
    .skip_if_present(!args.force);

    match patcher.run(&args.file, run_mode(args.dry_run)) {
        Ok(outcome) => {
            report_outcome("", &outcome, args.diff);
            Ok(())
        }
        Err(e) => {
            report_patch_error("", &e);
            std::process::exit(1);
        }
    }
}

/// Helper: Expand a config argument into the patch files it names.
///
/// A directory yields its top-level `*.toml` files in sorted order.
fn discover_patch_files(config: &Path) -> Result<Vec<PathBuf>> {
    if !config.is_dir() {
        return Ok(vec![config.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(config).max_depth(1) {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|s| s.to_str()) == Some("toml")
        {
            files.push(entry.path().to_path_buf());
        }
    }
    files.sort();

    if files.is_empty() {
        bail!("No .toml patch files found in {}", config.display());
    }
    Ok(files)
}

fn resolve_workspace(workspace: Option<PathBuf>) -> Result<PathBuf> {
    match workspace {
        Some(path) => path
            .canonicalize()
            .with_context(|| format!("workspace {} does not exist", path.display())),
        None => Ok(env::current_dir()?),
    }
}

fn cmd_apply(
    config: PathBuf,
    workspace: Option<PathBuf>,
    dry_run: bool,
    show_diff: bool,
) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = discover_patch_files(&config)?;
    let mode = run_mode(dry_run);

    println!("Workspace: {}", workspace.display());
    if dry_run {
        println!("{}", "[DRY RUN - no files will be modified]".cyan());
    }
    println!();

    let mut total_inserted = 0;
    let mut total_already_applied = 0;
    let mut total_failed = 0;

    'files: for patch_file in patch_files {
        println!("Loading patches from {}...", patch_file.display());
        let config = load_from_path(&patch_file)?;

        for (patch_id, result) in apply_patches(&config, &workspace, mode) {
            let label = format!("{patch_id}: ");
            match result {
                Ok(outcome) => {
                    match outcome {
                        PatchOutcome::Inserted { .. } => total_inserted += 1,
                        PatchOutcome::AlreadyApplied { .. } => total_already_applied += 1,
                    }
                    report_outcome(&label, &outcome, show_diff);
                }
                Err(e) => {
                    report_application_error(&label, &e);
                    total_failed += 1;
                    eprintln!("{}", "Stopping: remaining patches were not attempted".red());
                    break 'files;
                }
            }
        }
        println!();
    }

    println!();
    println!("{}", "Summary:".bold());
    let inserted_label = if dry_run { "would insert" } else { "inserted" };
    println!("  {} {}", format!("{}", total_inserted).green(), inserted_label);
    println!(
        "  {} already applied",
        format!("{}", total_already_applied).yellow()
    );
    println!("  {} failed", format!("{}", total_failed).red());

    if total_failed > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn cmd_check(config: PathBuf, workspace: Option<PathBuf>) -> Result<()> {
    let workspace = resolve_workspace(workspace)?;
    let patch_files = discover_patch_files(&config)?;

    println!("{}", "Patch Status Report".bold());
    println!("Workspace: {}", workspace.display());
    println!();

    let mut pending = 0;
    let mut applied = 0;
    let mut failing = 0;

    for patch_file in patch_files {
        let config = load_from_path(&patch_file)?;

        for (patch_id, result) in check_patches(&config, &workspace) {
            match result {
                Ok(PatchOutcome::Inserted {
                    file,
                    line,
                    inserted,
                    matches,
                    ..
                }) => {
                    println!(
                        "{} {}: would insert {} lines at line {} of {}",
                        "○".cyan(),
                        patch_id,
                        inserted,
                        line,
                        file.display()
                    );
                    if matches > 1 {
                        println!(
                            "  {}",
                            format!("anchor matched {matches} positions; the first is used")
                                .yellow()
                        );
                    }
                    pending += 1;
                }
                Ok(PatchOutcome::AlreadyApplied { file, line }) => {
                    println!(
                        "{} {}: already applied to {} (line {})",
                        "✓".green(),
                        patch_id,
                        file.display(),
                        line
                    );
                    applied += 1;
                }
                Err(e) => {
                    report_application_error(&format!("{patch_id}: "), &e);
                    failing += 1;
                }
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} pending", format!("{}", pending).cyan());
    println!("  {} already applied", format!("{}", applied).green());
    println!("  {} cannot apply", format!("{}", failing).red());

    if failing > 0 {
        std::process::exit(1);
    }

    Ok(())
}

fn report_outcome(label: &str, outcome: &PatchOutcome, show_diff: bool) {
    match outcome {
        PatchOutcome::Inserted {
            file,
            line,
            inserted,
            matches,
            written,
            change,
        } => {
            let verb = if *written { "Inserted" } else { "Would insert" };
            println!(
                "{} {}{} {} lines at line {} of {}",
                "✓".green(),
                label,
                verb,
                inserted,
                line,
                file.display()
            );
            if *matches > 1 {
                println!(
                    "  {}",
                    format!("Note: anchor matched {matches} positions; the first was used")
                        .yellow()
                );
            }
            if show_diff {
                display_diff(file, &change.before, &change.after);
            }
        }
        PatchOutcome::AlreadyApplied { file, line } => {
            println!(
                "{} {}Already applied to {} (block found at line {})",
                "⊙".yellow(),
                label,
                file.display(),
                line
            );
        }
    }
}

fn report_application_error(label: &str, error: &ApplicationError) {
    match error {
        ApplicationError::Patch(e) => report_patch_error(label, e),
        other => eprintln!("{} {}{}", "✗".red(), label, other),
    }
}

fn report_patch_error(label: &str, error: &PatchError) {
    eprintln!("{} {}{}", "✗".red(), label, error);

    match error {
        PatchError::AnchorNotFound { diagnosis, .. } => {
            eprintln!("  {}", "The file was not modified.".dimmed());
            for line in diagnosis.to_string().lines() {
                eprintln!("  {}", line);
            }
            eprintln!("  Possible causes:");
            eprintln!("    - The surrounding code was renamed, moved or reformatted");
            eprintln!("    - The offset between anchor conditions changed");
        }
        PatchError::Write { .. } => {
            eprintln!(
                "  {}",
                "The write may be incomplete; check the file against version control.".red()
            );
        }
        PatchError::ConcurrentModification { .. } => {
            eprintln!("  Re-run once the other writer has finished.");
        }
        PatchError::EmptyBlock { .. } => {
            eprintln!("  {}", "The file was not modified.".dimmed());
        }
        PatchError::FileAccess { .. } => {}
    }
}

/// Helper: Show a unified diff between original and patched content
fn display_diff(file: &Path, original: &str, patched: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (patched)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, patched);

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        println!("{}", hunk.header().to_string().cyan());
        for change in hunk.iter_changes() {
            let sign = match change.tag() {
                ChangeTag::Delete => format!("-{}", change).red(),
                ChangeTag::Insert => format!("+{}", change).green(),
                ChangeTag::Equal => format!(" {}", change).normal(),
            };
            print!("{}", sign);
            if change.missing_newline() {
                println!();
            }
        }
    }
}
