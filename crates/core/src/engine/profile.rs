//! Per-format codec profiles.
//!
//! A profile says which codecs FFmpeg should use for a target extension and
//! whether a hardware encoder may replace the video codec.

/// How the video encoder's quality is controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityControl {
    /// Constant rate factor (`-crf`), with `-preset` where the encoder has one.
    Crf,
    /// Fixed quantizer scale (`-q:v`), for older encoders without CRF.
    Qscale,
    /// Still image output.
    Image,
    /// Leave quality to the encoder defaults.
    EncoderDefault,
}

/// Codec choices for one output extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecProfile {
    /// Video encoder; `None` drops the video stream.
    pub video: Option<String>,
    /// Audio encoder; `None` drops the audio stream.
    pub audio: Option<&'static str>,
    pub quality: QualityControl,
    /// Whether a hardware H.264 encoder may replace `video`.
    pub hwaccel_supported: bool,
    /// Extra output arguments.
    pub arguments: Vec<String>,
}

impl CodecProfile {
    fn video(encoder: impl Into<String>, audio: &'static str, hwaccel_supported: bool) -> Self {
        let encoder = encoder.into();
        Self {
            quality: quality_for(&encoder),
            video: Some(encoder),
            audio: Some(audio),
            hwaccel_supported,
            arguments: Vec::new(),
        }
    }

    fn audio_only(audio: &'static str) -> Self {
        Self {
            video: None,
            audio: Some(audio),
            quality: QualityControl::EncoderDefault,
            hwaccel_supported: false,
            arguments: Vec::new(),
        }
    }

    fn image(encoder: Option<&str>, arguments: Vec<String>) -> Self {
        Self {
            video: encoder.map(str::to_string),
            audio: None,
            quality: QualityControl::Image,
            hwaccel_supported: false,
            arguments,
        }
    }

    /// Profile for a target extension.
    ///
    /// `default_encoder` is used by the general-purpose containers (mp4, mov,
    /// mkv and unknown extensions).
    pub fn for_extension(extension: &str, default_encoder: &str) -> Self {
        match extension.trim_start_matches('.').to_lowercase().as_str() {
            "mp4" | "mov" | "m4v" => Self::video(default_encoder, "aac", true),
            "mkv" => Self::video(default_encoder, "libopus", true),
            "webm" => Self::video("libvpx-vp9", "libopus", false),
            "avi" => {
                let mut profile = Self::video("mpeg4", "libmp3lame", false);
                profile.quality = QualityControl::Qscale;
                profile
            }
            "flv" => Self::video("flv", "libmp3lame", false),
            "wmv" => Self::video("msmpeg4", "wmav2", false),

            "mp3" => Self::audio_only("libmp3lame"),
            "aac" | "m4a" => Self::audio_only("aac"),
            "flac" => Self::audio_only("flac"),
            "wav" => Self::audio_only("pcm_s16le"),
            "ogg" | "opus" => Self::audio_only("libopus"),

            "png" | "bmp" | "tiff" | "tif" | "gif" => Self::image(None, Vec::new()),
            "jpg" | "jpeg" => Self::image(Some("mjpeg"), vec!["-q:v".into(), "2".into()]),
            "webp" => Self::image(Some("libwebp"), Vec::new()),
            // ICO frames are limited to 256x256.
            "ico" => Self::image(
                None,
                vec![
                    "-vf".into(),
                    "scale='min(256,iw)':'min(256,ih)':force_original_aspect_ratio=decrease"
                        .into(),
                ],
            ),

            _ => Self::video(default_encoder, "aac", true),
        }
    }

    pub fn is_image(&self) -> bool {
        self.quality == QualityControl::Image
    }

    pub fn has_video(&self) -> bool {
        self.video.is_some() || self.is_image()
    }
}

fn quality_for(encoder: &str) -> QualityControl {
    match encoder {
        "libx264" | "libx265" | "libvpx-vp9" | "libvpx" | "libaom-av1" | "libsvtav1" => {
            QualityControl::Crf
        }
        "mpeg4" | "msmpeg4" | "msmpeg4v2" | "flv" | "mjpeg" => QualityControl::Qscale,
        _ => QualityControl::EncoderDefault,
    }
}

/// Whether the encoder accepts `-preset`.
pub fn supports_preset(encoder: &str) -> bool {
    matches!(encoder, "libx264" | "libx265")
}
