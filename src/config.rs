use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "tabixr")]
#[command(about = "Random access to tabix-indexed BGZF files")]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the lines overlapping each region
    Query(QueryArgs),
    /// List the BGZF blocks of a file
    Inspect {
        /// BGZF-compressed file
        path: PathBuf,
    },
    /// Compress a file to BGZF
    Bgzip(BgzipArgs),
    /// Serve region queries over HTTP
    Serve(ServeArgs),
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// BGZF-compressed file with a .tbi index next to it
    pub path: PathBuf,

    /// Regions as chr, chr:beg or chr:beg-end (1-based, inclusive)
    pub regions: Vec<String>,

    /// Print the sequence names in the index and exit
    #[arg(short, long)]
    pub list_chroms: bool,
}

#[derive(Debug, Clone, Args)]
pub struct BgzipArgs {
    /// File to compress
    pub input: PathBuf,

    /// Output path (defaults to INPUT.gz)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Uncompressed bytes per block
    #[arg(short, long, default_value = "65280")]
    pub block_size: usize,

    /// Compression level (0-9)
    #[arg(short, long, default_value = "6")]
    pub level: u32,
}

impl BgzipArgs {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let mut path = self.input.as_os_str().to_owned();
            path.push(".gz");
            PathBuf::from(path)
        })
    }
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "TABIXR_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "TABIXR_PORT", default_value = "8080")]
    pub port: u16,

    /// Directory containing indexed data files
    #[arg(long, env = "TABIXR_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Enable CORS for all origins
    #[arg(long, env = "TABIXR_CORS", default_value = "true")]
    pub cors: bool,
}

impl ServeArgs {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
