use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bucketeer")]
#[command(about = "Upload files to object storage with a pool of workers", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload files, then stop once the queue drains or on Ctrl+C
    Upload(UploadArgs),
}

#[derive(clap::Args, Debug)]
pub struct UploadArgs {
    /// Configuration file (defaults to $BUCKETEER_CONFIG or config/bucketeer.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// File category selecting `files.<category>.bucket` / `.key`
    #[arg(long, default_value = "upload")]
    pub category: String,

    /// JSON array of `{"path", "category"?, "name"?}` entries to enqueue
    #[arg(long)]
    pub manifest: Option<PathBuf>,

    /// Files to upload
    pub files: Vec<PathBuf>,
}
