use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ifscan")]
#[command(about = "A static information-flow taint analyzer for program slices")]
#[command(version)]
pub struct Cli {
    /// Path to the program slice to analyze
    pub slice: PathBuf,

    /// Path to the vulnerability patterns JSON file
    pub patterns: PathBuf,

    /// Pretty-print the JSON report
    #[arg(long)]
    pub pretty: bool,

    /// Disable pretty-printing even if the config file enables it
    #[arg(long, conflicts_with = "pretty")]
    pub no_pretty: bool,

    /// Optional TOML config file overriding built-in defaults
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the default log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,
}
