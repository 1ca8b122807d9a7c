use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::bib::rename::RenameRule;
use crate::bib::select::{DEFAULT_INPUT, DEFAULT_OUTPUT};
use crate::commands::{
    self, CommandReport, check::CheckOptions, collect::CollectOptions, gallery::GalleryOptions,
    rename::RenameOptions, select::SelectOptions, watch::WatchOptions,
};

#[derive(Debug, Parser)]
#[command(
    name = "bibarchive",
    version,
    about = "Keep BibTeX records, PDFs and preview images of a personal library in step"
)]
struct Cli {
    /// Print the command report as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show resolved paths, categories and environment overrides.
    Status,
    /// Normalize .bib files and reconcile records, PDFs and images.
    Check {
        /// Leave .bib files untouched.
        #[arg(long)]
        no_format: bool,
        /// List every incomplete entry.
        #[arg(long)]
        show_incomplete: bool,
        /// Include books when listing incomplete entries.
        #[arg(long)]
        check_books: bool,
    },
    /// Write the HTML image galleries.
    Gallery {
        #[arg(long)]
        category: Option<String>,
    },
    /// File new PDFs from the collect inbox into the archive.
    Collect {
        #[arg(long)]
        dry_run: bool,
    },
    /// Rename a theme or a single short code across records and files.
    Rename {
        #[command(subcommand)]
        target: RenameTarget,
    },
    /// Extract the records cited by a Typst document.
    Select {
        #[arg(long, default_value = DEFAULT_INPUT)]
        input: String,
        #[arg(long, default_value = DEFAULT_OUTPUT)]
        output: String,
    },
    /// Write LaTeX-encoded copies of the .bib files.
    Latex,
    /// Regenerate galleries when category folders change.
    Watch {
        #[arg(long)]
        once: bool,
        #[arg(long)]
        daemon: bool,
    },
}

#[derive(Debug, Subcommand)]
enum RenameTarget {
    Theme {
        old: String,
        new: String,
        #[arg(long)]
        dry_run: bool,
    },
    Code {
        old: String,
        new: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        dry_run: bool,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("[{}]", report.command);
    for detail in &report.details {
        println!("√ {detail}");
    }
    for issue in &report.issues {
        println!("× {issue}");
    }
    Ok(())
}

fn dispatch(command: Command) -> Result<CommandReport> {
    match command {
        Command::Status => commands::status::run(),
        Command::Check {
            no_format,
            show_incomplete,
            check_books,
        } => commands::check::run(&CheckOptions {
            no_format,
            show_incomplete,
            check_books,
        }),
        Command::Gallery { category } => commands::gallery::run(&GalleryOptions { category }),
        Command::Collect { dry_run } => commands::collect::run(&CollectOptions { dry_run }),
        Command::Rename { target } => {
            let opts = match target {
                RenameTarget::Theme { old, new, dry_run } => RenameOptions {
                    rule: RenameRule::Theme { old, new },
                    category: None,
                    dry_run,
                },
                RenameTarget::Code {
                    old,
                    new,
                    category,
                    dry_run,
                } => RenameOptions {
                    rule: RenameRule::Code { old, new },
                    category,
                    dry_run,
                },
            };
            commands::rename::run(&opts)
        }
        Command::Select { input, output } => {
            commands::select::run(&SelectOptions { input, output })
        }
        Command::Latex => commands::latex::run(),
        Command::Watch { once, daemon } => commands::watch::run(&WatchOptions { once, daemon }),
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let report = dispatch(cli.command)?;
    print_report(&report, cli.json)?;
    if !report.ok {
        std::process::exit(1);
    }
    Ok(())
}
