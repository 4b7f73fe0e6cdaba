//! FFmpeg-based transcoding with live progress.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::process::Child;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::cleanup::remove_partial_output;
use super::config::{ConverterConfig, VideoProfile};
use super::diagnostics::{DiagnosticLines, DiagnosticTail};
use super::error::ConverterError;
use super::process::{drain_lines, spawn_error, terminate, wait_for_exit, Exit};
use super::progress::{is_usable_duration, percent_of, ProgressMarker};
use super::traits::ConversionStrategy;
use super::types::{
    codecs_for_container, supports_faststart, ConversionJob, TranscodeProfile, VideoCodec,
};
use crate::resolver::{ExecutableHandle, ExecutableResolver, ToolSpec};

/// Drives ffprobe and ffmpeg for video and audio conversions.
pub struct TranscodeStrategy {
    config: ConverterConfig,
    resolver: Arc<ExecutableResolver>,
}

impl TranscodeStrategy {
    pub fn new(config: ConverterConfig, resolver: Arc<ExecutableResolver>) -> Self {
        Self { config, resolver }
    }

    /// Builds ffmpeg arguments for a profile.
    pub fn build_args(
        profile: TranscodeProfile,
        video: &VideoProfile,
        source: &Path,
        target: &Path,
        target_ext: &str,
    ) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["-i".into(), source.into()];

        match profile {
            TranscodeProfile::VideoReencode => {
                let (video_codec, audio_codec) = codecs_for_container(target_ext);
                args.push("-y".into());
                args.extend(["-c:v".into(), video_codec.ffmpeg_codec().into()]);
                match video_codec {
                    VideoCodec::H264 => args.extend([
                        "-preset".into(),
                        video.preset.as_str().into(),
                        "-crf".into(),
                        video.crf.to_string().into(),
                    ]),
                    // Constant quality mode for VP9 needs a zero target bitrate.
                    VideoCodec::Vp9 => args.extend([
                        "-crf".into(),
                        video.crf.to_string().into(),
                        "-b:v".into(),
                        "0".into(),
                    ]),
                }
                args.extend([
                    "-c:a".into(),
                    audio_codec.ffmpeg_codec().into(),
                    "-b:a".into(),
                    format!("{}k", video.audio_bitrate_kbps).into(),
                ]);
                if supports_faststart(target_ext) {
                    args.extend(["-movflags".into(), "+faststart".into()]);
                }
            }
            TranscodeProfile::AudioExtract => {
                args.extend(["-vn".into(), "-y".into()]);
                args.extend(progress_args());
            }
            TranscodeProfile::AudioTranscode => {
                args.push("-y".into());
                args.extend(progress_args());
            }
        }

        args.push(target.into());
        args
    }

    /// Runs ffprobe and parses the container duration in seconds.
    pub async fn probe_duration(
        ffprobe: &ExecutableHandle,
        source: &Path,
        token: &CancellationToken,
        timeout_secs: Option<u64>,
    ) -> Result<f64, ConverterError> {
        let mut command = ffprobe.command();
        command
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        let query = command.output();

        // Dropping the pending output kills the ffprobe child (kill_on_drop).
        let bounded = async {
            match timeout_secs {
                Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), query).await {
                    Ok(result) => result.map_err(|e| spawn_error(ffprobe, e)),
                    Err(_) => Err(ConverterError::Timeout { timeout_secs: secs }),
                },
                None => query.await.map_err(|e| spawn_error(ffprobe, e)),
            }
        };
        let output = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ConverterError::Cancelled),
            output = bounded => output?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        trimmed.parse::<f64>().map_err(|_| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            ConverterError::probe_failed(format!(
                "unparseable duration {trimmed:?}: {}",
                stderr.trim()
            ))
        })
    }

    async fn run(
        &self,
        ffmpeg: &ExecutableHandle,
        profile: TranscodeProfile,
        duration: f64,
        job: &ConversionJob,
    ) -> Result<(), ConverterError> {
        let args = Self::build_args(
            profile,
            &self.config.video,
            job.source(),
            job.target(),
            &job.target_ext,
        );
        debug!(?args, "Starting ffmpeg");

        let stdout = if profile.reports_on_stdout() {
            Stdio::piped()
        } else {
            Stdio::null()
        };
        let mut child = ffmpeg
            .command()
            .args(&args)
            .stdout(stdout)
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error(ffmpeg, e))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ConverterError::Io(std::io::Error::other("stderr not captured")))?;
        let tail_lines = self.config.diagnostic_tail_lines;

        let (exit, tail) = if profile.reports_on_stdout() {
            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| ConverterError::Io(std::io::Error::other("stdout not captured")))?;
            // stderr must keep flowing while stdout is followed, or the child
            // blocks on a full pipe.
            let diagnostics = drain_lines(stderr, tail_lines);
            let exit = self
                .supervise(&mut child, stdout, ProgressMarker::OutTime, duration, job, None)
                .await;
            if !matches!(exit, Ok(Exit::Status(_))) {
                diagnostics.abort();
            }
            let tail = diagnostics
                .await
                .unwrap_or_else(|_| DiagnosticTail::new(tail_lines));
            (exit, tail)
        } else {
            let mut tail = DiagnosticTail::new(tail_lines);
            let exit = self
                .supervise(
                    &mut child,
                    stderr,
                    ProgressMarker::Time,
                    duration,
                    job,
                    Some(&mut tail),
                )
                .await;
            (exit, tail)
        };

        match exit? {
            Exit::Status(status) => {
                let produced = output_is_valid(job.target()).await;
                if status.success() && produced {
                    if is_usable_duration(duration) {
                        job.progress.complete();
                    }
                    return Ok(());
                }
                remove_partial_output(job.target()).await;
                let reason = if status.success() {
                    "ffmpeg produced no output".to_string()
                } else {
                    format!("ffmpeg exited with {status}")
                };
                Err(ConverterError::conversion_failed(reason, Some(tail.text())))
            }
            Exit::Cancelled => {
                remove_partial_output(job.target()).await;
                Err(ConverterError::Cancelled)
            }
            Exit::TimedOut(timeout_secs) => {
                remove_partial_output(job.target()).await;
                Err(ConverterError::Timeout { timeout_secs })
            }
        }
    }

    /// Follows one output stream for progress markers until the child exits,
    /// is cancelled, or times out.
    async fn supervise<R>(
        &self,
        child: &mut Child,
        stream: R,
        marker: ProgressMarker,
        duration: f64,
        job: &ConversionJob,
        mut tail: Option<&mut DiagnosticTail>,
    ) -> Result<Exit, ConverterError>
    where
        R: AsyncRead + Unpin,
    {
        let mut lines = DiagnosticLines::new(stream);
        let token = job.cancellation();

        let follow = async {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok::<bool, std::io::Error>(false),
                    line = lines.next_line() => match line? {
                        None => return Ok(true),
                        Some(line) => {
                            trace!(line = %line, "ffmpeg");
                            if let Some(percent) = marker
                                .parse_elapsed(&line)
                                .and_then(|elapsed| percent_of(elapsed, duration))
                            {
                                job.progress.report(percent);
                            }
                            if let Some(tail) = tail.as_deref_mut() {
                                tail.push(line);
                            }
                        }
                    },
                }
            }
        };

        let finished = match self.config.timeout_secs {
            Some(secs) => {
                match tokio::time::timeout(Duration::from_secs(secs), follow).await {
                    Ok(result) => result?,
                    Err(_) => {
                        terminate(child).await;
                        return Ok(Exit::TimedOut(secs));
                    }
                }
            }
            None => follow.await?,
        };

        if !finished {
            terminate(child).await;
            return Ok(Exit::Cancelled);
        }

        // The stream closed; the process is exiting or has exited.
        wait_for_exit(child, token, self.config.timeout_secs)
            .await
            .map_err(ConverterError::from)
    }
}

fn progress_args() -> [OsString; 3] {
    ["-progress".into(), "pipe:1".into(), "-nostats".into()]
}

async fn output_is_valid(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

#[async_trait]
impl ConversionStrategy for TranscodeStrategy {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn execute(&self, job: &ConversionJob) -> Result<(), ConverterError> {
        let profile = TranscodeProfile::for_pair(job.pair)
            .ok_or_else(|| ConverterError::unsupported(&job.source_ext, &job.target_ext))?;
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        let [ffprobe, ffmpeg] = self
            .resolver
            .resolve_all([ToolSpec::FFPROBE, ToolSpec::FFMPEG]);

        let duration = Self::probe_duration(
            &ffprobe,
            job.source(),
            job.cancellation(),
            self.config.timeout_secs,
        )
        .await?;
        info!(duration_secs = duration, ?profile, "Probed source duration");
        if job.is_cancelled() {
            return Err(ConverterError::Cancelled);
        }

        self.run(&ffmpeg, profile, duration, job).await
    }
}
