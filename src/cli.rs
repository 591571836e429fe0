use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "deposit-recon")]
#[command(about = "Reconcile wallet transactions into a store and report valid deposits", long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $DEPOSIT_RECON_CONFIG or config/deposit-recon.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding transactions-1.json and transactions-2.json
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Report output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Csv,
}
