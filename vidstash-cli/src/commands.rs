//! CLI command implementations

use std::sync::Arc;

use anyhow::Context;
use clap::Subcommand;
use vidstash_core::VidstashConfig;
use vidstash_core::ingest::{RqbitClientFactory, SwarmIngestor, UrlIngestor};
use vidstash_core::storage::StorageRoot;
use vidstash_core::transcode::{FfmpegTranscoder, TranscodeJob, TranscodeOperation, Transcoder};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Download a remote file over HTTP(S) into storage
    Fetch {
        /// Source URL
        url: String,
        /// Destination filename
        filename: String,
    },
    /// Download swarm content from a magnet link into storage
    Torrent {
        /// Magnet URI
        magnet: String,
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Run one transcode job between stored files
    Transcode {
        #[command(subcommand)]
        operation: TranscodeCommand,
    },
}

/// Transcode operations
#[derive(Subcommand)]
pub enum TranscodeCommand {
    /// Re-encode with other codecs
    Convert {
        input: String,
        output: String,
        /// Target video codec
        #[arg(long)]
        video_codec: String,
        /// Target audio codec (copied when absent)
        #[arg(long)]
        audio_codec: Option<String>,
    },
    /// Re-encode as H.264
    Compress {
        input: String,
        output: String,
        /// Constant rate factor, 0 to 51
        #[arg(long)]
        crf: Option<u8>,
        /// x264 speed preset
        #[arg(long)]
        preset: Option<String>,
    },
    /// Extract one subtitle stream
    Subtitles {
        input: String,
        output: String,
        /// Index among the input's subtitle streams
        #[arg(long, default_value_t = 0)]
        stream_index: u32,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command that ran
pub async fn handle_command(command: Commands, mut config: VidstashConfig) -> anyhow::Result<()> {
    match command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            vidstash_web::run_server(config)
                .await
                .context("HTTP server stopped")
        }
        Commands::Fetch { url, filename } => fetch(config, &url, &filename).await,
        Commands::Torrent { magnet, timeout } => {
            if let Some(seconds) = timeout {
                config.ingest.swarm_timeout = Some(std::time::Duration::from_secs(seconds));
            }
            torrent(config, &magnet).await
        }
        Commands::Transcode { operation } => transcode(config, operation).await,
    }
}

async fn prepared_storage(config: &VidstashConfig) -> anyhow::Result<StorageRoot> {
    let storage = StorageRoot::new(config.storage.root.clone());
    storage
        .ensure_exists()
        .await
        .with_context(|| format!("Cannot prepare {}", config.storage.root.display()))?;
    Ok(storage)
}

async fn fetch(config: VidstashConfig, url: &str, filename: &str) -> anyhow::Result<()> {
    let storage = prepared_storage(&config).await?;
    let ingestor = UrlIngestor::new(storage, &config.ingest, config.storage.channel_capacity)?;

    let receipt = ingestor.ingest(url, filename).await?;
    println!("Stored {} ({} bytes)", receipt.filename, receipt.bytes_written);
    Ok(())
}

async fn torrent(config: VidstashConfig, magnet: &str) -> anyhow::Result<()> {
    let storage = prepared_storage(&config).await?;
    let ingestor = SwarmIngestor::new(
        storage,
        Arc::new(RqbitClientFactory),
        config.ingest.swarm_timeout,
    );

    let receipt = ingestor.ingest(magnet).await?;
    println!("Downloaded: {}", receipt.name);
    Ok(())
}

async fn transcode(config: VidstashConfig, command: TranscodeCommand) -> anyhow::Result<()> {
    let storage = prepared_storage(&config).await?;
    let transcoder = FfmpegTranscoder::new(storage, &config.transcode);

    let job = match command {
        TranscodeCommand::Convert {
            input,
            output,
            video_codec,
            audio_codec,
        } => TranscodeJob::new(
            input,
            output,
            TranscodeOperation::ChangeCodec {
                video_codec,
                audio_codec,
            },
        ),
        TranscodeCommand::Compress {
            input,
            output,
            crf,
            preset,
        } => TranscodeJob::new(input, output, TranscodeOperation::compress(crf, preset)),
        TranscodeCommand::Subtitles {
            input,
            output,
            stream_index,
        } => TranscodeJob::new(
            input,
            output,
            TranscodeOperation::ExtractSubtitles { stream_index },
        ),
    };

    let receipt = transcoder.transcode(&job).await?;
    println!(
        "Wrote {} ({} bytes) in {:.1}s",
        receipt.output_filename,
        receipt.size_bytes,
        receipt.elapsed.as_secs_f64()
    );
    Ok(())
}
