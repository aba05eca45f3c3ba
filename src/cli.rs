use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use crate::commands::CommandReport;

#[derive(Debug, Parser)]
#[command(
    name = "rankwatch",
    version,
    about = "Weekly skills.sh discoverability tracker backed by one GitHub issue"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Execute the weekly tracking cycle and write it to the tracking issue.
    Run,
    /// Recover the published run history and print the aggregate view without writing.
    Summary,
    /// Show resolved configuration and environment diagnostics.
    Status,
}

fn print_report(report: CommandReport) -> Result<()> {
    println!(
        "[{}] {}",
        report.command,
        if report.ok { "ok" } else { "issues found" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        eprintln!("  issue: {issue}");
    }
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run => commands::run::run(),
        Command::Summary => print_report(commands::summary::run()?),
        Command::Status => print_report(commands::status::run()?),
    }
}
