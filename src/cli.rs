use clap::{Parser, ValueEnum};
use gdrive_dl::SortField;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    Name,
    Size,
    Date,
}

impl From<SortArg> for SortField {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Name => SortField::Name,
            SortArg::Size => SortField::Size,
            SortArg::Date => SortField::Date,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "gdrive-dl")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Google Drive folder URLs
    pub urls: Vec<String>,

    /// File containing Google Drive folder links (one per line)
    #[arg(short = 'f', long)]
    pub links_file: Option<String>,

    /// Output directory
    #[arg(short, long, default_value = "./output")]
    pub output: String,

    /// Number of parallel downloads
    #[arg(short, long, default_value = "4", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Search terms (comma-separated), matches any
    #[arg(short, long)]
    pub search: Option<String>,

    /// Maximum folder recursion depth
    #[arg(short = 'd', long, default_value = "10")]
    pub max_depth: usize,

    /// Google Drive API key
    #[arg(short = 'k', long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OAuth access token
    #[arg(long, env = "GOOGLE_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Sort order of the file list
    #[arg(long, value_enum, default_value = "name")]
    pub sort: SortArg,

    /// Sort descending
    #[arg(long)]
    pub desc: bool,

    /// List matching files and exit without downloading
    #[arg(long)]
    pub list: bool,

    /// Print the file list as JSON (with --list)
    #[arg(long, requires = "list")]
    pub json: bool,

    /// HTTP proxy (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    pub proxy: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}
