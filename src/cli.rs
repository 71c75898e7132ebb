//! Command-line interface definitions.
//!
//! All options can be given as flags or environment variables; the
//! defaults suit a cron-driven deployment where the binary runs three
//! times a day from its own working directory.

use clap::Parser;

/// Command-line arguments for the ingestion pipeline.
///
/// # Examples
///
/// ```sh
/// # default paths
/// nyhetssvep
///
/// # explicit config and output locations
/// nyhetssvep -c ./sources.yaml -o ./rundowns -s /var/lib/nyhetssvep
///
/// # force strict mode for one run
/// nyhetssvep --strict
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to the sources YAML configuration
    #[arg(short, long, env = "NYHETSSVEP_CONFIG", default_value = "sources.yaml")]
    pub config: String,

    /// Output directory for rundown JSON files
    #[arg(short, long, env = "NYHETSSVEP_OUTPUT_DIR", default_value = "./rundowns")]
    pub output_dir: String,

    /// Directory for persistent state (history, feed-URL cache)
    #[arg(short, long, env = "NYHETSSVEP_STATE_DIR", default_value = "./state")]
    pub state_dir: String,

    /// Run in strict mode from the start (drop items without extractable content)
    #[arg(long)]
    pub strict: bool,
}
