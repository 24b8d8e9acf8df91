use std::path::PathBuf;

use clap::Parser;
use files_bridge_core::ProcessSpec;

/// Configuration for the files-bridge server.
#[derive(Parser, Debug, Clone)]
#[command(name = "files-bridge")]
#[command(about = "HTTP/WebSocket bridge in front of an MCP file server")]
pub struct Config {
    /// TCP host to bind to
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    pub host: String,

    /// TCP port to bind to
    #[arg(long, default_value = "3000", env = "PORT")]
    pub port: u16,

    /// Storage root handed to the MCP server
    #[arg(long, default_value = "../storage", env = "STORAGE_DIR")]
    pub storage_dir: PathBuf,

    /// Program used to launch the MCP server
    #[arg(long, default_value = "node", env = "MCP_SERVER_COMMAND")]
    pub server_command: String,

    /// Script or binary passed to the launch program
    #[arg(long, default_value = "../file-server/build/index.js", env = "MCP_SERVER_PATH")]
    pub server_path: String,

    /// Extra arguments for the MCP server (comma-separated in the env var)
    #[arg(long = "server-arg", env = "MCP_SERVER_ARGS", value_delimiter = ',')]
    pub server_args: Vec<String>,

    /// Connect to the MCP server at startup
    #[arg(long, default_value_t = true, env = "AUTO_CONNECT", action = clap::ArgAction::Set)]
    pub auto_connect: bool,

    /// Request body limit for uploads, in megabytes
    #[arg(long, default_value = "100", env = "MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,
}

impl Config {
    pub fn process_spec(&self) -> ProcessSpec {
        ProcessSpec {
            program: self.server_command.clone(),
            server_path: self.server_path.clone(),
            args: self.server_args.clone(),
            env: vec![(
                "STORAGE_DIR".to_string(),
                self.storage_dir.to_string_lossy().into_owned(),
            )],
        }
    }

    pub fn body_limit(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
