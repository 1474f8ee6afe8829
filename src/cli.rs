use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "icloud2immich")]
#[command(version = "0.1.0")]
#[command(about = "Migrate iCloud Photos to Immich, keeping albums intact")]
pub struct Cli {
    /// Working directory; downloads/ and albums/ are created inside it
    #[arg(long = "base-dir", short = 'b', default_value = "photos")]
    pub base_dir: String,

    /// Credential file (ICLOUD_USERNAME, IMMICH_API_KEY, IMMICH_ADMIN_API_KEY, IMMICH_SERVER)
    #[arg(long = "env-file", short = 'e', default_value = ".env")]
    pub env_file: String,

    /// Skip the confirmation prompts between phases
    #[arg(long = "non-interactive", short = 'y', default_value_t = false)]
    pub non_interactive: bool,

    /// iCloud downloader executable
    #[arg(long, default_value = "icloudpd")]
    pub downloader: String,

    /// Immich uploader executable
    #[arg(long, default_value = "immich-go")]
    pub uploader: String,

    /// Timeout in seconds for authentication and album listing
    #[arg(long, default_value_t = 60)]
    pub timeout: u64,

    /// Log output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Show debug output
    #[arg(long, short = 'v', default_value_t = false)]
    pub verbose: bool,

    /// Only print warnings and errors
    #[arg(long, short = 'q', default_value_t = false, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Runtime logging configuration derived from CLI flags
#[derive(Clone, Debug)]
pub struct OutputConfig {
    pub quiet: bool,
    pub verbose: bool,
    pub output_format: OutputFormat,
}

impl OutputConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            quiet: cli.quiet,
            verbose: cli.verbose,
            output_format: cli.format,
        }
    }
}
