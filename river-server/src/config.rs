//! Server settings
//!
//! Each setting resolves as command line > environment > TOML file > default.
//! clap covers the first two; the TOML layer and defaults are applied here.

use crate::services::LibrarySettings;
use clap::Parser;
use river_common::config::{
    default_probe_concurrency, TomlConfig, DEFAULT_BIND, DEFAULT_DATA_DIR, DEFAULT_PASSWORD_FILE,
    DEFAULT_PORT,
};
use river_common::tools::{resolve_configured_tool, PROBE_TOOL, TRANSCODE_TOOL};
use river_common::{Error, Result};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Command-line arguments for river
#[derive(Parser, Debug, Default)]
#[command(name = "river")]
#[command(about = "Personal audio library server with on-demand transcoding")]
#[command(version)]
pub struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "RIVER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Root folder of the audio library
    #[arg(short, long, env = "RIVER_LIBRARY")]
    pub library: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RIVER_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "RIVER_BIND")]
    pub bind: Option<String>,

    /// File whose first line is the server password
    #[arg(long, env = "RIVER_PASSWORD_FILE")]
    pub password_file: Option<PathBuf>,

    /// Directory holding the index snapshot and cached artifacts
    #[arg(long, env = "RIVER_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Probe executable (default: ffprobe, then avprobe)
    #[arg(long, env = "RIVER_PROBE_TOOL")]
    pub probe_tool: Option<PathBuf>,

    /// Transcode executable (default: ffmpeg, then avconv)
    #[arg(long, env = "RIVER_TRANSCODE_TOOL")]
    pub transcode_tool: Option<PathBuf>,
}

/// Fully resolved server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub library_root: PathBuf,
    pub listen: SocketAddr,
    pub password_file: PathBuf,
    pub data_dir: PathBuf,
    pub probe_tool: Option<PathBuf>,
    pub transcode_tool: Option<PathBuf>,
    pub probe_concurrency: usize,
}

impl ServerSettings {
    /// Merge arguments over the TOML file and defaults
    pub fn resolve(args: &Args, toml: &TomlConfig) -> Result<Self> {
        let library_root = args
            .library
            .clone()
            .or_else(|| toml.library.clone())
            .ok_or_else(|| {
                Error::Config(
                    "No library root: pass --library, set RIVER_LIBRARY, or set `library` in the config file"
                        .to_string(),
                )
            })?;

        let bind = args
            .bind
            .clone()
            .or_else(|| toml.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string());
        let ip: IpAddr = bind
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address '{}': {}", bind, e)))?;
        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);

        let probe_concurrency = match toml.probe_concurrency {
            Some(0) => {
                return Err(Error::Config(
                    "probe_concurrency must be at least 1".to_string(),
                ))
            }
            Some(n) => n,
            None => default_probe_concurrency(),
        };

        Ok(Self {
            library_root,
            listen: SocketAddr::new(ip, port),
            password_file: args
                .password_file
                .clone()
                .or_else(|| toml.password_file.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PASSWORD_FILE)),
            data_dir: args
                .data_dir
                .clone()
                .or_else(|| toml.data_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            probe_tool: args.probe_tool.clone().or_else(|| toml.probe_tool.clone()),
            transcode_tool: args
                .transcode_tool
                .clone()
                .or_else(|| toml.transcode_tool.clone()),
            probe_concurrency,
        })
    }

    /// Resolve the external tools and produce the library settings
    ///
    /// Fails when either tool cannot be found.
    pub fn library_settings(&self) -> Result<LibrarySettings> {
        let probe_tool = resolve_configured_tool(PROBE_TOOL, self.probe_tool.as_deref())?;
        let transcode_tool =
            resolve_configured_tool(TRANSCODE_TOOL, self.transcode_tool.as_deref())?;

        Ok(LibrarySettings {
            library_root: self.library_root.clone(),
            data_dir: self.data_dir.clone(),
            probe_tool,
            transcode_tool,
            probe_concurrency: self.probe_concurrency,
        })
    }
}
