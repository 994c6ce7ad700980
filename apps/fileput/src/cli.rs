//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Put one file on many targets in parallel, with end-to-end digest verification"
)]
pub struct Cli {
    /// Log at debug level, including request dumps
    #[arg(long, global = true)]
    pub debug: bool,

    /// Configuration file (defaults to ~/.config/fileput/fileput.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file to every target
    Put(PutArgs),
    /// Receive uploads into a directory
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    #[arg(short, long)]
    pub file: PathBuf,

    /// Remote file name (defaults to the local base name)
    #[arg(short, long)]
    pub remote_name: Option<String>,

    /// Chunk size in kilobytes
    #[arg(short, long)]
    pub write_size: Option<u64>,

    /// Remote permissions in octal ("0" keeps the local file's mode)
    #[arg(short, long)]
    pub permission: Option<String>,

    /// Digest algorithm: MD5, SHA256 or SHA512
    #[arg(long)]
    pub hash_method: Option<String>,

    /// Target address; replaces the configured targets (repeatable)
    #[arg(short, long = "target", action = clap::ArgAction::Append)]
    pub targets: Vec<String>,

    /// Token for the --target addresses
    #[arg(long)]
    pub token: Option<String>,

    /// Cancel every session after this many seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Listen address
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Directory uploads are written under
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Token clients must present (generated when omitted)
    #[arg(long)]
    pub token: Option<String>,
}
