//! Centralized configuration for Vidstash.
//!
//! All tunable parameters and settings are defined here to avoid
//! hard-coded values scattered throughout the codebase.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Central configuration for all Vidstash components.
///
/// Groups related configuration settings into logical sections.
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct VidstashConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub ingest: IngestConfig,
    pub transcode: TranscodeConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    /// Parses host and port into a socket address.
    ///
    /// # Errors
    /// - `std::net::AddrParseError` - Host is not a valid IP address
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        let ip: IpAddr = self.host.parse()?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Storage root and disk I/O configuration.
///
/// Controls where media files live and how they are read back out
/// when serving.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding every stored media file
    pub root: PathBuf,
    /// Maximum bytes read from disk per chunk while serving
    pub read_chunk_size: usize,
    /// Number of chunks buffered between producer and consumer
    pub channel_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("videos"),
            read_chunk_size: 65536, // 64 KiB
            channel_capacity: 8,
        }
    }
}

/// URL and swarm ingestion configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// User agent for outbound HTTP requests
    pub user_agent: &'static str,
    /// TCP connect timeout for URL ingestion
    pub connect_timeout: Duration,
    /// Upper bound on one swarm session (None = wait indefinitely)
    pub swarm_timeout: Option<Duration>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            user_agent: "vidstash/0.1.0",
            connect_timeout: Duration::from_secs(30),
            swarm_timeout: None,
        }
    }
}

/// External transcoder configuration.
#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Path or name of the ffmpeg binary
    pub ffmpeg_path: PathBuf,
    /// Maximum wall-clock time for one transcode job
    pub timeout: Duration,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            timeout: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl VidstashConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration using `lookup` to resolve override variables.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = lookup("VIDSTASH_HOST") {
            config.server.host = host;
        }
        if let Some(port) = parse_override::<u16>(&lookup, "VIDSTASH_PORT") {
            config.server.port = port;
        }

        if let Some(root) = lookup("VIDSTASH_STORAGE_ROOT") {
            config.storage.root = PathBuf::from(root);
        }
        if let Some(size) = parse_override::<usize>(&lookup, "VIDSTASH_READ_CHUNK_SIZE") {
            if size > 0 {
                config.storage.read_chunk_size = size;
            }
        }

        if let Some(seconds) = parse_override::<u64>(&lookup, "VIDSTASH_CONNECT_TIMEOUT") {
            config.ingest.connect_timeout = Duration::from_secs(seconds);
        }
        if let Some(seconds) = parse_override::<u64>(&lookup, "VIDSTASH_SWARM_TIMEOUT") {
            config.ingest.swarm_timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        if let Some(path) = lookup("VIDSTASH_FFMPEG") {
            config.transcode.ffmpeg_path = PathBuf::from(path);
        }
        if let Some(seconds) = parse_override::<u64>(&lookup, "VIDSTASH_TRANSCODE_TIMEOUT") {
            config.transcode.timeout = Duration::from_secs(seconds);
        }

        config
    }
}

fn parse_override<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring invalid value for {}: {:?}", key, raw);
            None
        }
    }
}
