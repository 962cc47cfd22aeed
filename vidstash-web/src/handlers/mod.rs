//! HTTP request handlers organized by functionality

pub mod download;
pub mod error;
pub mod media;
pub mod process;

// Re-export handler functions
pub use download::{
    TorrentDownloadRequest, UrlDownloadRequest, download_torrent, download_url,
};
pub use error::{ApiError, ERROR_CODE_HEADER};
pub use media::{health, serve_video};
pub use process::{
    CompressRequest, ConvertRequest, SubtitlesRequest, process_compress, process_convert,
    process_subtitles,
};
