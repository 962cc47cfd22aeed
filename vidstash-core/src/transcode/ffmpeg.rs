//! Transcoder backed by the ffmpeg command line tool

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{TranscodeError, TranscodeJob, TranscodeOperation, TranscodeReceipt, Transcoder};
use crate::config::TranscodeConfig;
use crate::storage::{StorageError, StorageRoot};

/// Lines of ffmpeg stderr kept in failure reasons.
const STDERR_TAIL_LINES: usize = 8;

/// Runs each job as one ffmpeg child process.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    storage: StorageRoot,
    ffmpeg_path: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(storage: StorageRoot, config: &TranscodeConfig) -> Self {
        Self {
            storage,
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: config.timeout,
        }
    }

    /// Command line arguments for `operation`, excluding the binary.
    pub fn build_args(
        input: &Path,
        output: &Path,
        operation: &TranscodeOperation,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-y".into(), "-i".into(), input.into()];

        match operation {
            TranscodeOperation::ChangeCodec {
                video_codec,
                audio_codec,
            } => {
                args.extend(["-c:v".into(), video_codec.into()]);
                args.extend([
                    "-c:a".into(),
                    audio_codec.as_deref().unwrap_or("copy").into(),
                ]);
            }
            TranscodeOperation::Compress { crf, preset } => {
                args.extend(["-c:v".into(), "libx264".into()]);
                args.extend(["-crf".into(), crf.to_string().into()]);
                args.extend(["-preset".into(), preset.into()]);
                args.extend(["-c:a".into(), "aac".into(), "-b:a".into(), "128k".into()]);
            }
            TranscodeOperation::ExtractSubtitles { stream_index } => {
                args.extend(["-map".into(), format!("0:s:{stream_index}").into()]);
            }
        }

        args.push(output.into());
        args
    }

    async fn run(&self, args: Vec<OsString>) -> Result<(), TranscodeError> {
        let mut cmd = tokio::process::Command::new(&self.ffmpeg_path);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        tracing::debug!("Executing {}: {:?}", self.ffmpeg_path.display(), args);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(TranscodeError::failed(format!(
                    "Failed to execute {}: {e}",
                    self.ffmpeg_path.display()
                )));
            }
            Err(_) => {
                return Err(TranscodeError::TimedOut {
                    elapsed: self.timeout,
                });
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::failed(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                stderr_tail(&stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, job: &TranscodeJob) -> Result<TranscodeReceipt, TranscodeError> {
        job.validate()?;
        let input = self.storage.stat(&job.input_filename).await?;
        let output_path = self.storage.resolve(&job.output_filename)?;

        let started = Instant::now();
        tracing::info!(
            "Starting {}: {} -> {}",
            job.operation.label(),
            job.input_filename,
            job.output_filename
        );

        let args = Self::build_args(&input.path, &output_path, &job.operation);
        if let Err(e) = self.run(args).await {
            tracing::error!("{} of {} failed: {}", job.operation.label(), job.input_filename, e);
            return Err(e);
        }

        let output = match self.storage.stat(&job.output_filename).await {
            Ok(output) => output,
            Err(StorageError::NotFound { .. }) => {
                return Err(TranscodeError::failed(format!(
                    "ffmpeg produced no output at {}",
                    job.output_filename
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let elapsed = started.elapsed();
        tracing::info!(
            "Finished {}: {} ({} bytes) in {:.2}s",
            job.operation.label(),
            output.filename,
            output.size_bytes,
            elapsed.as_secs_f64()
        );

        Ok(TranscodeReceipt {
            output_filename: output.filename,
            size_bytes: output.size_bytes,
            elapsed,
        })
    }
}

fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use crate::storage::test_fixtures::{create_temp_storage_root, write_media_file};

    fn strings(args: &[OsString]) -> Vec<&str> {
        args.iter().map(|a| a.to_str().unwrap()).collect()
    }

    fn transcoder(
        root: &StorageRoot,
        ffmpeg_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> FfmpegTranscoder {
        FfmpegTranscoder::new(
            root.clone(),
            &TranscodeConfig {
                ffmpeg_path: ffmpeg_path.into(),
                timeout,
            },
        )
    }

    #[test]
    fn test_build_args_per_operation() {
        let input = Path::new("/v/in.mkv");
        let output = Path::new("/v/out.mp4");

        let convert = TranscodeOperation::ChangeCodec {
            video_codec: "libx265".to_string(),
            audio_codec: None,
        };
        assert_eq!(
            strings(&FfmpegTranscoder::build_args(input, output, &convert)),
            ["-y", "-i", "/v/in.mkv", "-c:v", "libx265", "-c:a", "copy", "/v/out.mp4"]
        );

        let compress = TranscodeOperation::compress(Some(23), None);
        assert_eq!(
            strings(&FfmpegTranscoder::build_args(input, output, &compress)),
            [
                "-y", "-i", "/v/in.mkv", "-c:v", "libx264", "-crf", "23", "-preset", "medium",
                "-c:a", "aac", "-b:a", "128k", "/v/out.mp4"
            ]
        );

        let subtitles = TranscodeOperation::ExtractSubtitles { stream_index: 2 };
        assert_eq!(
            strings(&FfmpegTranscoder::build_args(input, Path::new("/v/out.srt"), &subtitles)),
            ["-y", "-i", "/v/in.mkv", "-map", "0:s:2", "/v/out.srt"]
        );
    }

    #[test]
    fn test_stderr_tail_keeps_last_lines() {
        let stderr: String = (0..20).map(|i| format!("line {i}\n\n")).collect();
        let tail = stderr_tail(&stderr);
        assert!(tail.starts_with("line 12"));
        assert!(tail.ends_with("line 19"));
    }

    #[tokio::test]
    async fn test_missing_input_is_not_found() {
        let (_temp_dir, root) = create_temp_storage_root();

        let job = TranscodeJob::new(
            "absent.mkv",
            "out.mp4",
            TranscodeOperation::compress(None, None),
        );
        let err = transcoder(&root, "ffmpeg", Duration::from_secs(5))
            .transcode(&job)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_missing_binary_is_failure() {
        let (temp_dir, root) = create_temp_storage_root();
        write_media_file(&root, "in.mkv", 64);

        let job = TranscodeJob::new("in.mkv", "out.mp4", TranscodeOperation::compress(None, None));
        let err = transcoder(&root, temp_dir.path().join("no-such-ffmpeg"), Duration::from_secs(5))
            .transcode(&job)
            .await
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Failed { .. }));
    }

    #[cfg(unix)]
    mod scripted {
        use std::os::unix::fs::PermissionsExt;

        use super::*;

        fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-ffmpeg.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_successful_job_reports_output() {
            let (temp_dir, root) = create_temp_storage_root();
            let bin_dir = tempfile::tempdir().unwrap();
            write_media_file(&root, "in.mkv", 64);
            let ffmpeg = fake_ffmpeg(
                bin_dir.path(),
                r#"for last; do :; done; printf transcoded > "$last""#,
            );

            let job = TranscodeJob::new(
                "in.mkv",
                "out.mp4",
                TranscodeOperation::ChangeCodec {
                    video_codec: "libx264".to_string(),
                    audio_codec: Some("aac".to_string()),
                },
            );
            let receipt = transcoder(&root, ffmpeg, Duration::from_secs(5))
                .transcode(&job)
                .await
                .unwrap();

            assert_eq!(receipt.output_filename, "out.mp4");
            assert_eq!(receipt.size_bytes, "transcoded".len() as u64);
            assert_eq!(
                std::fs::read(temp_dir.path().join("out.mp4")).unwrap(),
                b"transcoded"
            );
        }

        #[tokio::test]
        async fn test_nonzero_exit_carries_stderr() {
            let (_temp_dir, root) = create_temp_storage_root();
            let bin_dir = tempfile::tempdir().unwrap();
            write_media_file(&root, "in.mkv", 64);
            let ffmpeg = fake_ffmpeg(bin_dir.path(), "echo 'Invalid data found' >&2; exit 1");

            let job = TranscodeJob::new(
                "in.mkv",
                "out.srt",
                TranscodeOperation::ExtractSubtitles { stream_index: 0 },
            );
            let err = transcoder(&root, ffmpeg, Duration::from_secs(5))
                .transcode(&job)
                .await
                .unwrap_err();

            assert_eq!(err.code(), ErrorCode::UpstreamFailure);
            assert!(err.to_string().contains("Invalid data found"));
        }

        #[tokio::test]
        async fn test_slow_job_times_out() {
            let (_temp_dir, root) = create_temp_storage_root();
            let bin_dir = tempfile::tempdir().unwrap();
            write_media_file(&root, "in.mkv", 64);
            let ffmpeg = fake_ffmpeg(bin_dir.path(), "sleep 5");

            let job =
                TranscodeJob::new("in.mkv", "out.mp4", TranscodeOperation::compress(None, None));
            let err = transcoder(&root, ffmpeg, Duration::from_millis(100))
                .transcode(&job)
                .await
                .unwrap_err();

            assert!(matches!(err, TranscodeError::TimedOut { .. }));
        }
    }
}
