//! FFmpeg-based engine implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, OnceCell};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::capabilities::EncoderCapabilities;
use super::config::EngineConfig;
use super::error::EngineError;
use super::profile::{supports_preset, CodecProfile, QualityControl};
use super::traits::ConversionEngine;
use super::types::{ConversionJob, ConversionOutcome, ConversionProgress, MediaInfo};
use crate::settings::ConversionMode;

/// Lines of stderr kept for error reporting.
const STDERR_TAIL_LINES: usize = 40;

/// FFmpeg-based engine implementation.
pub struct FfmpegEngine {
    config: EngineConfig,
    encoders: OnceCell<EncoderCapabilities>,
}

impl FfmpegEngine {
    /// Creates a new FFmpeg engine with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            encoders: OnceCell::new(),
        }
    }

    /// Creates an engine with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }

    /// Creates an engine with known hardware encoders, skipping detection.
    pub fn with_capabilities(config: EngineConfig, encoders: EncoderCapabilities) -> Self {
        Self {
            config,
            encoders: OnceCell::new_with(Some(encoders)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Hardware encoders, detected once on first use.
    pub async fn encoder_capabilities(&self) -> &EncoderCapabilities {
        self.encoders
            .get_or_init(|| async {
                let caps = EncoderCapabilities::detect(&self.config).await;
                debug!("Detected encoder capabilities: {:?}", caps);
                caps
            })
            .await
    }

    /// Builds ffmpeg arguments for a job.
    fn build_args(
        &self,
        job: &ConversionJob,
        output_path: &Path,
        encoders: &EncoderCapabilities,
    ) -> Vec<String> {
        let profile = CodecProfile::for_extension(&job.output_extension, &job.encoder.default_encoder);
        let mode = job.encoder.conversion_mode;
        let hardware = if mode == ConversionMode::Hwaccel && profile.hwaccel_supported {
            encoders.hardware_encoder()
        } else {
            None
        };

        let mut args = vec![
            "-y".to_string(), // Overwrite output
            "-progress".to_string(),
            "pipe:1".to_string(),
            "-nostats".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
        ];

        // Decode acceleration only when the matching encoder is used
        if let Some(method) = hardware.as_ref().and_then(|hw| hw.hwaccel) {
            args.extend(["-hwaccel".to_string(), method.to_string()]);
        }

        args.extend(["-i".to_string(), job.input_path.to_string_lossy().to_string()]);

        if profile.is_image() {
            if let Some(ref encoder) = profile.video {
                args.extend(["-c:v".to_string(), encoder.clone()]);
                if mode == ConversionMode::Lossless && encoder == "libwebp" {
                    args.extend(["-lossless".to_string(), "1".to_string()]);
                }
            }
            args.extend(["-frames:v".to_string(), "1".to_string()]);
        } else if let Some(ref encoder) = profile.video {
            match hardware {
                Some(ref hw) => {
                    args.extend(["-c:v".to_string(), hw.encoder.to_string()]);
                    args.extend(hw.quality_args.iter().map(|a| a.to_string()));
                }
                None => {
                    args.extend(["-c:v".to_string(), encoder.clone()]);
                    args.extend(quality_args(encoder, profile.quality, mode));
                }
            }
        } else {
            args.push("-vn".to_string());
        }

        args.extend(profile.arguments.iter().cloned());

        match profile.audio {
            Some(codec) => args.extend(["-c:a".to_string(), codec.to_string()]),
            None => args.push("-an".to_string()),
        }

        // Extra args
        args.extend(self.config.extra_ffmpeg_args.iter().cloned());

        // Output
        args.push(output_path.to_string_lossy().to_string());

        args
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, EngineError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: ProbeFormat,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            width: Option<u32>,
            height: Option<u32>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| EngineError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        let duration_secs = probe
            .format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = probe
            .format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");

        let format_name = probe
            .format
            .format_name
            .split(',')
            .next()
            .unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            has_video: video_stream.is_some(),
            has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
            width: video_stream.and_then(|s| s.width),
            height: video_stream.and_then(|s| s.height),
        })
    }

    /// Probes a media file to get its information.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo, EngineError> {
        if !path.exists() {
            return Err(EngineError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    /// Runs the conversion, reporting progress on `progress_tx`.
    async fn run_conversion(
        &self,
        job: &ConversionJob,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<ConversionOutcome, EngineError> {
        let start = Instant::now();

        if tokio::fs::metadata(&job.input_path).await.is_err() {
            return Err(EngineError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        let output_path = job.output_path();

        let encoders = if job.encoder.conversion_mode == ConversionMode::Hwaccel {
            self.encoder_capabilities().await.clone()
        } else {
            EncoderCapabilities::default()
        };

        // Input duration for progress calculation
        let duration_secs = match self.probe(&job.input_path).await {
            Ok(info) if info.duration_secs > 0.0 => Some(info.duration_secs),
            Ok(_) => None,
            Err(e) => {
                debug!("Probe failed for {}: {}", job.input_path.display(), e);
                None
            }
        };

        let args = self.build_args(job, &output_path, &encoders);
        debug!("Running ffmpeg for job {}: {:?}", job.job_id, args);

        let child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        // From here on, any exit path other than success kills FFmpeg and
        // removes the output.
        let mut process = ConversionProcess {
            child,
            output: PartialOutput::new(output_path.clone()),
        };

        let stdout = process
            .child
            .stdout
            .take()
            .ok_or_else(|| EngineError::conversion_failed("FFmpeg stdout not captured", None))?;
        let stderr = process
            .child
            .stderr
            .take()
            .ok_or_else(|| EngineError::conversion_failed("FFmpeg stderr not captured", None))?;
        let stderr_task = tokio::spawn(collect_stderr_tail(stderr));

        let progress_interval = Duration::from_millis(self.config.progress_interval_ms);
        let work = async {
            let mut reader = BufReader::new(stdout).lines();
            let mut parser = ProgressParser::new();
            let mut last_progress_send: Option<Instant> = None;

            while let Some(line) = reader.next_line().await? {
                if !parser.feed(&line) {
                    continue;
                }

                let due = last_progress_send
                    .map(|t| t.elapsed() >= progress_interval)
                    .unwrap_or(true);
                if due || parser.finished {
                    let progress = ConversionProgress {
                        job_id: job.job_id,
                        percent: parser.percent(duration_secs),
                        time_secs: parser.time_secs,
                        duration_secs,
                        speed: parser.speed.clone(),
                    };
                    // Non-blocking send
                    let _ = progress_tx.try_send(progress);
                    last_progress_send = Some(Instant::now());
                }
            }

            let status = process.child.wait().await?;
            Ok::<std::process::ExitStatus, std::io::Error>(status)
        };

        let result = match self.config.timeout() {
            Some(limit) => timeout(limit, work).await,
            None => Ok(work.await),
        };

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => return Err(EngineError::Io(e)),
            Err(_) => {
                // Kill the process on timeout
                let _ = process.child.kill().await;
                return Err(EngineError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        };

        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            return Err(classify_failure(status.code(), &stderr_tail));
        }

        // Verify output exists and get size
        let output_meta = tokio::fs::metadata(&output_path)
            .await
            .map_err(|_| EngineError::conversion_failed("Output file not created", None))?;

        process.output.keep();

        Ok(ConversionOutcome {
            job_id: job.job_id,
            output_path,
            output_size_bytes: output_meta.len(),
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[async_trait]
impl ConversionEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn convert(
        &self,
        job: ConversionJob,
        progress_tx: mpsc::Sender<ConversionProgress>,
    ) -> Result<ConversionOutcome, EngineError> {
        self.run_conversion(&job, progress_tx).await
    }

    async fn validate(&self) -> Result<(), EngineError> {
        // Check ffmpeg exists
        let ffmpeg_result = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffmpeg_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        // Check ffprobe exists
        let ffprobe_result = Command::new(&self.config.ffprobe_path)
            .arg("-version")
            .output()
            .await;

        if let Err(e) = ffprobe_result {
            if e.kind() == std::io::ErrorKind::NotFound {
                return Err(EngineError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                });
            }
            return Err(EngineError::Io(e));
        }

        Ok(())
    }
}

/// Encoder quality arguments for the CPU path.
fn quality_args(encoder: &str, quality: QualityControl, mode: ConversionMode) -> Vec<String> {
    let lossless = mode == ConversionMode::Lossless;
    let mut args = Vec::new();

    match quality {
        QualityControl::Crf => {
            let vp9 = encoder.starts_with("libvpx");
            let crf = match (lossless, vp9) {
                (true, true) => "30",
                (true, false) => "18",
                (false, true) => "33",
                (false, false) => "23",
            };
            args.extend(["-crf".to_string(), crf.to_string()]);
            // VP9 needs a zero bitrate for constant-quality mode
            if vp9 {
                args.extend(["-b:v".to_string(), "0".to_string()]);
            }
            if !lossless && supports_preset(encoder) {
                args.extend(["-preset".to_string(), "medium".to_string()]);
            }
        }
        QualityControl::Qscale => {
            let q = if lossless { "2" } else { "5" };
            args.extend(["-q:v".to_string(), q.to_string()]);
        }
        QualityControl::Image | QualityControl::EncoderDefault => {}
    }

    args
}

/// Maps a failed FFmpeg run to an engine error.
fn classify_failure(code: Option<i32>, stderr: &str) -> EngineError {
    let encoder_missing = stderr
        .lines()
        .any(|l| l.contains("Encoder not found") || l.contains("Unknown encoder"));

    if encoder_missing {
        let encoder = Regex::new(r"Unknown encoder '([^']+)'")
            .ok()
            .and_then(|re| re.captures(stderr))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| "requested".to_string());
        return EngineError::EncoderNotFound { encoder };
    }

    let reason = match code {
        Some(code) => format!("FFmpeg exited with code: {}", code),
        None => "FFmpeg terminated by signal".to_string(),
    };
    let stderr = stderr.trim();
    EngineError::conversion_failed(
        reason,
        if stderr.is_empty() {
            None
        } else {
            Some(stderr.to_string())
        },
    )
}

/// Reads a child's stderr to the end, keeping the last lines.
async fn collect_stderr_tail<R: AsyncRead + Unpin>(stderr: R) -> String {
    let mut reader = BufReader::new(stderr).lines();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

    while let Ok(Some(line)) = reader.next_line().await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Parser for `-progress` key=value blocks.
struct ProgressParser {
    time_regex: Option<Regex>,
    speed_regex: Option<Regex>,
    time_secs: f64,
    speed: Option<String>,
    finished: bool,
}

impl ProgressParser {
    fn new() -> Self {
        Self {
            // out_time_ms is also in microseconds
            time_regex: Regex::new(r"^out_time_(?:us|ms)=(\d+)$").ok(),
            speed_regex: Regex::new(r"^speed=\s*(\d+\.?\d*)x$").ok(),
            time_secs: 0.0,
            speed: None,
            finished: false,
        }
    }

    /// Consumes one line. Returns true at the end of a progress block.
    fn feed(&mut self, line: &str) -> bool {
        let line = line.trim();

        if let Some(ref re) = self.time_regex {
            if let Some(us) = re
                .captures(line)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                self.time_secs = us / 1_000_000.0;
            }
        }

        if let Some(value) = line.strip_prefix("out_time=") {
            if let Some(secs) = parse_timestamp(value) {
                self.time_secs = secs;
            }
        }

        if let Some(ref re) = self.speed_regex {
            if let Some(caps) = re.captures(line) {
                if let Some(speed) = caps.get(1) {
                    self.speed = Some(format!("{}x", speed.as_str()));
                }
            }
        }

        if let Some(state) = line.strip_prefix("progress=") {
            self.finished = state == "end";
            return true;
        }

        false
    }

    fn percent(&self, duration_secs: Option<f64>) -> f32 {
        match duration_secs {
            Some(dur) if dur > 0.0 => (self.time_secs / dur * 100.0).clamp(0.0, 100.0) as f32,
            _ if self.finished => 100.0,
            _ => 0.0,
        }
    }
}

/// Parses `HH:MM:SS.micro` into seconds.
fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours = parts.next()?.parse::<f64>().ok()?;
    let minutes = parts.next()?.parse::<f64>().ok()?;
    let seconds = parts.next()?.parse::<f64>().ok()?;
    if parts.next().is_some() || hours < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// A running FFmpeg child and the file it writes.
///
/// On drop the child is killed first, then the output is removed, so the
/// file is no longer held open when it is deleted.
struct ConversionProcess {
    child: Child,
    output: PartialOutput,
}

impl Drop for ConversionProcess {
    fn drop(&mut self) {
        // Fails harmlessly once the child has been waited on.
        let _ = self.child.start_kill();
        // `output` drops after this returns.
    }
}

/// Removes the output file on drop unless [`PartialOutput::keep`] was called.
struct PartialOutput {
    path: PathBuf,
    keep: bool,
}

impl PartialOutput {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(&mut self) {
        self.keep = true;
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.keep || !self.path.exists() {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed partial output {}", self.path.display()),
            Err(e) => warn!(
                "Failed to remove partial output {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::LogicalType;
    use crate::engine::EncoderParams;
    use crate::orchestrator::JobHandle;
    use crate::registry::FileId;
    use tempfile::TempDir;

    fn job(input: &str, ext: &str, mode: ConversionMode) -> ConversionJob {
        ConversionJob {
            job_id: JobHandle::new(),
            file_id: FileId::new(1),
            input_path: PathBuf::from(input),
            output_extension: ext.to_string(),
            media_type: LogicalType::new("video"),
            encoder: EncoderParams {
                default_encoder: "libx264".to_string(),
                conversion_mode: mode,
            },
        }
    }

    fn args_for(job: &ConversionJob, encoders: &EncoderCapabilities) -> Vec<String> {
        let engine = FfmpegEngine::with_defaults();
        engine.build_args(job, &job.output_path(), encoders)
    }

    fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
        args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    #[test]
    fn test_build_args_normal_mp4() {
        let job = job("/videos/a.mov", "mp4", ConversionMode::Normal);
        let args = args_for(&job, &EncoderCapabilities::default());

        assert!(has_pair(&args, "-progress", "pipe:1"));
        assert!(has_pair(&args, "-i", "/videos/a.mov"));
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(has_pair(&args, "-crf", "23"));
        assert!(has_pair(&args, "-preset", "medium"));
        assert!(has_pair(&args, "-c:a", "aac"));
        assert_eq!(args.last().unwrap(), "/videos/a.mp4");
    }

    #[test]
    fn test_build_args_lossless() {
        let mp4 = args_for(
            &job("/v/a.mov", "mp4", ConversionMode::Lossless),
            &EncoderCapabilities::default(),
        );
        assert!(has_pair(&mp4, "-crf", "18"));
        assert!(!mp4.contains(&"-preset".to_string()));

        let webm = args_for(
            &job("/v/a.mov", "webm", ConversionMode::Lossless),
            &EncoderCapabilities::default(),
        );
        assert!(has_pair(&webm, "-c:v", "libvpx-vp9"));
        assert!(has_pair(&webm, "-crf", "30"));
        assert!(has_pair(&webm, "-b:v", "0"));
    }

    #[test]
    fn test_build_args_hwaccel_uses_hardware_encoder() {
        let encoders = EncoderCapabilities {
            h264_nvenc: true,
            ..Default::default()
        };
        let args = args_for(&job("/v/a.mkv", "mp4", ConversionMode::Hwaccel), &encoders);

        assert!(has_pair(&args, "-hwaccel", "cuda"));
        assert!(has_pair(&args, "-c:v", "h264_nvenc"));
        assert!(!args.contains(&"-crf".to_string()));

        // -hwaccel must come before the input
        let hw = args.iter().position(|a| a == "-hwaccel").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(hw < input);
    }

    #[test]
    fn test_build_args_hwaccel_falls_back_to_cpu() {
        let args = args_for(
            &job("/v/a.mkv", "mp4", ConversionMode::Hwaccel),
            &EncoderCapabilities::default(),
        );
        assert!(has_pair(&args, "-c:v", "libx264"));
        assert!(!args.contains(&"-hwaccel".to_string()));

        // Profiles without hardware support ignore the encoder list
        let encoders = EncoderCapabilities {
            h264_nvenc: true,
            ..Default::default()
        };
        let webm = args_for(&job("/v/a.mkv", "webm", ConversionMode::Hwaccel), &encoders);
        assert!(has_pair(&webm, "-c:v", "libvpx-vp9"));
    }

    #[test]
    fn test_build_args_audio_only() {
        let args = args_for(
            &job("/v/a.mp4", "mp3", ConversionMode::Normal),
            &EncoderCapabilities::default(),
        );
        assert!(args.contains(&"-vn".to_string()));
        assert!(!args.contains(&"-c:v".to_string()));
        assert!(has_pair(&args, "-c:a", "libmp3lame"));
    }

    #[test]
    fn test_build_args_avi_uses_qscale() {
        let args = args_for(
            &job("/v/a.mp4", "avi", ConversionMode::Normal),
            &EncoderCapabilities::default(),
        );
        assert!(has_pair(&args, "-c:v", "mpeg4"));
        assert!(has_pair(&args, "-q:v", "5"));
        assert!(!args.contains(&"-crf".to_string()));
    }

    #[test]
    fn test_build_args_ico_image() {
        let args = args_for(
            &job("/img/logo.png", "ico", ConversionMode::Normal),
            &EncoderCapabilities::default(),
        );
        assert!(has_pair(&args, "-frames:v", "1"));
        assert!(args.iter().any(|a| a.contains("min(256,iw)")));
        assert!(args.contains(&"-an".to_string()));
        assert_eq!(args.last().unwrap(), "/img/logo.ico");
    }

    #[test]
    fn test_extra_args_before_output() {
        let config = EngineConfig {
            extra_ffmpeg_args: vec!["-threads".to_string(), "2".to_string()],
            ..Default::default()
        };
        let engine = FfmpegEngine::new(config);
        let job = job("/v/a.mov", "mp4", ConversionMode::Normal);
        let args = engine.build_args(&job, &job.output_path(), &EncoderCapabilities::default());

        let n = args.len();
        assert_eq!(args[n - 3], "-threads");
        assert_eq!(args[n - 2], "2");
    }

    #[test]
    fn test_progress_parser_block() {
        let mut parser = ProgressParser::new();
        assert!(!parser.feed("frame=120"));
        assert!(!parser.feed("out_time_us=5000000"));
        assert!(!parser.feed("speed=2.5x"));
        assert!(parser.feed("progress=continue"));

        assert!((parser.time_secs - 5.0).abs() < 1e-9);
        assert_eq!(parser.speed.as_deref(), Some("2.5x"));
        assert!((parser.percent(Some(20.0)) - 25.0).abs() < 0.01);
        assert!(!parser.finished);

        assert!(parser.feed("progress=end"));
        assert!(parser.finished);
    }

    #[test]
    fn test_progress_parser_ignores_na() {
        let mut parser = ProgressParser::new();
        parser.feed("out_time_us=N/A");
        parser.feed("out_time=N/A");
        assert_eq!(parser.time_secs, 0.0);
        assert_eq!(parser.percent(Some(10.0)), 0.0);
    }

    #[test]
    fn test_progress_percent_clamped_and_unknown_duration() {
        let mut parser = ProgressParser::new();
        parser.feed("out_time=00:01:00.000000");
        assert_eq!(parser.percent(Some(30.0)), 100.0);
        assert_eq!(parser.percent(None), 0.0);
        parser.feed("progress=end");
        assert_eq!(parser.percent(None), 100.0);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:00:01.500000"), Some(1.5));
        assert_eq!(parse_timestamp("01:02:03"), Some(3723.0));
        assert_eq!(parse_timestamp("-577014:32:22.77"), None);
        assert_eq!(parse_timestamp("garbage"), None);
    }

    #[test]
    fn test_classify_failure_encoder_not_found() {
        let err = classify_failure(Some(1), "[vost#0:0] Unknown encoder 'h264_amf'\nEncoder not found");
        match err {
            EngineError::EncoderNotFound { encoder } => assert_eq!(encoder, "h264_amf"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_failure_generic() {
        let err = classify_failure(Some(1), "Invalid data found when processing input");
        match err {
            EngineError::ConversionFailed { reason, stderr } => {
                assert_eq!(reason, "FFmpeg exited with code: 1");
                assert!(stderr.unwrap().contains("Invalid data"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let signalled = classify_failure(None, "");
        assert_eq!(
            signalled.to_string(),
            "Conversion failed: FFmpeg terminated by signal"
        );
    }

    #[test]
    fn test_parse_probe_output() {
        let json = r#"{
            "format": {
                "filename": "test.mkv",
                "format_name": "matroska,webm",
                "duration": "7200.0",
                "size": "5000000000"
            },
            "streams": [
                { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080 },
                { "codec_type": "audio", "codec_name": "aac" }
            ]
        }"#;

        let info = FfmpegEngine::parse_probe_output(Path::new("test.mkv"), json).unwrap();
        assert_eq!(info.format, "matroska");
        assert!((info.duration_secs - 7200.0).abs() < 0.01);
        assert!(info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.width, Some(1920));
    }

    #[test]
    fn test_parse_probe_output_image_without_duration() {
        let json = r#"{
            "format": { "format_name": "png_pipe" },
            "streams": [ { "codec_type": "video", "width": 64, "height": 64 } ]
        }"#;
        let info = FfmpegEngine::parse_probe_output(Path::new("a.png"), json).unwrap();
        assert_eq!(info.duration_secs, 0.0);
        assert!(!info.has_audio);
    }

    #[test]
    fn test_parse_probe_output_invalid() {
        let result = FfmpegEngine::parse_probe_output(Path::new("a"), "nope");
        assert!(matches!(result, Err(EngineError::ParseError { .. })));
    }

    #[test]
    fn test_partial_output_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half.mp4");
        std::fs::write(&path, b"partial").unwrap();

        drop(PartialOutput::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn test_partial_output_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("done.mp4");
        std::fs::write(&path, b"complete").unwrap();

        let mut guard = PartialOutput::new(path.clone());
        guard.keep();
        drop(guard);
        assert!(path.exists());
    }

    /// Writes a stand-in `ffmpeg` that creates its output file, then hangs.
    #[cfg(unix)]
    fn hanging_ffmpeg(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("fake-ffmpeg");
        std::fs::write(
            &script,
            "#!/bin/sh\nfor last; do :; done\necho partial > \"$last\"\nexec sleep 30\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        script
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_dropped_conversion_removes_partial_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("clip.mov");
        std::fs::write(&input, b"not really a movie").unwrap();
        let output = dir.path().join("clip.mp4");

        let engine = FfmpegEngine::with_capabilities(
            EngineConfig::with_paths(hanging_ffmpeg(dir.path()), dir.path().join("no-ffprobe")),
            EncoderCapabilities::default(),
        );
        let (tx, _rx) = mpsc::channel(4);
        let mut convert = engine.convert(
            job(input.to_str().unwrap(), "mp4", ConversionMode::Normal),
            tx,
        );

        // Drive the conversion until the child has written its output.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !output.exists() {
            assert!(tokio::time::Instant::now() < deadline, "output never written");
            tokio::select! {
                _ = &mut convert => panic!("conversion finished unexpectedly"),
                _ = tokio::time::sleep(Duration::from_millis(20)) => {}
            }
        }

        // Cancelling drops the future, as the orchestrator does on abort.
        drop(convert);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn test_convert_missing_input() {
        let engine = FfmpegEngine::with_defaults();
        let (tx, _rx) = mpsc::channel(1);
        let result = engine
            .convert(job("/definitely/missing.mov", "mp4", ConversionMode::Normal), tx)
            .await;
        assert!(matches!(result, Err(EngineError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_convert_missing_ffmpeg_binary() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.mov");
        std::fs::write(&input, b"not really a movie").unwrap();

        let engine = FfmpegEngine::new(EngineConfig::with_paths(
            dir.path().join("no-ffmpeg"),
            dir.path().join("no-ffprobe"),
        ));
        let (tx, _rx) = mpsc::channel(1);
        let result = engine
            .convert(
                job(input.to_str().unwrap(), "mp4", ConversionMode::Normal),
                tx,
            )
            .await;

        assert!(matches!(result, Err(EngineError::FfmpegNotFound { .. })));
        assert!(!dir.path().join("a.mp4").exists());
    }

    #[tokio::test]
    async fn test_validate_missing_binary() {
        let engine = FfmpegEngine::new(EngineConfig::with_paths(
            PathBuf::from("/nonexistent/ffmpeg"),
            PathBuf::from("/nonexistent/ffprobe"),
        ));
        assert!(matches!(
            engine.validate().await,
            Err(EngineError::FfmpegNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_preset_capabilities_skip_detection() {
        let encoders = EncoderCapabilities {
            h264_qsv: true,
            ..Default::default()
        };
        let engine = FfmpegEngine::with_capabilities(
            EngineConfig::with_paths(PathBuf::from("/nonexistent/ffmpeg"), PathBuf::from("x")),
            encoders.clone(),
        );
        assert_eq!(engine.encoder_capabilities().await, &encoders);
    }
}
