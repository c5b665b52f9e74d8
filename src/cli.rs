//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use relay_core::DEFAULT_CONFIG_PATH;

/// Relay new top image posts from a subreddit into a Discord channel.
///
/// Polls the subreddit on a fixed interval, skips posts already sent, and
/// posts each new image with its title and author.
#[derive(Parser, Debug)]
#[command(name = "media-relay")]
#[command(author, version, about)]
pub struct Args {
    /// Path to the JSON config file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Run a single cycle and exit instead of polling
    #[arg(long)]
    pub once: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
