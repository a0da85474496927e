//! Hardware encoder capability detection.

use serde::{Deserialize, Serialize};
use std::process::Stdio;
use tokio::process::Command;

use super::config::EngineConfig;

/// Available hardware encoders detected on the system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderCapabilities {
    /// NVIDIA NVENC H.264 available
    pub h264_nvenc: bool,
    /// AMD AMF H.264 available
    pub h264_amf: bool,
    /// Intel Quick Sync H.264 available
    pub h264_qsv: bool,
    /// Apple VideoToolbox H.264 available
    pub h264_videotoolbox: bool,
}

/// A hardware encoder and the arguments it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareEncoder {
    /// Value for `-c:v`.
    pub encoder: &'static str,
    /// Decode acceleration method for `-hwaccel`, if any.
    pub hwaccel: Option<&'static str>,
    /// Quality arguments placed after the codec.
    pub quality_args: &'static [&'static str],
}

impl EncoderCapabilities {
    /// Detect available hardware encoders by probing ffmpeg.
    pub async fn detect(config: &EngineConfig) -> Self {
        let output = Command::new(&config.ffmpeg_path)
            .args(["-hide_banner", "-encoders"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .output()
            .await;

        match output {
            Ok(o) if o.status.success() => Self::parse(&String::from_utf8_lossy(&o.stdout)),
            _ => Self::default(),
        }
    }

    /// Parses the output of `ffmpeg -encoders`.
    pub fn parse(encoders: &str) -> Self {
        Self {
            h264_nvenc: encoders.contains("h264_nvenc"),
            h264_amf: encoders.contains("h264_amf"),
            h264_qsv: encoders.contains("h264_qsv"),
            h264_videotoolbox: encoders.contains("h264_videotoolbox"),
        }
    }

    /// Check if any hardware encoder is available.
    pub fn has_hardware_encoder(&self) -> bool {
        self.h264_nvenc || self.h264_amf || self.h264_qsv || self.h264_videotoolbox
    }

    /// Preferred hardware encoder: NVENC, then AMF, then Quick Sync, then VideoToolbox.
    pub fn hardware_encoder(&self) -> Option<HardwareEncoder> {
        if self.h264_nvenc {
            return Some(HardwareEncoder {
                encoder: "h264_nvenc",
                hwaccel: Some("cuda"),
                quality_args: &["-preset", "p5"],
            });
        }
        if self.h264_amf {
            return Some(HardwareEncoder {
                encoder: "h264_amf",
                hwaccel: None,
                quality_args: &["-quality", "quality"],
            });
        }
        if self.h264_qsv {
            return Some(HardwareEncoder {
                encoder: "h264_qsv",
                hwaccel: Some("qsv"),
                quality_args: &["-global_quality", "23"],
            });
        }
        if self.h264_videotoolbox {
            return Some(HardwareEncoder {
                encoder: "h264_videotoolbox",
                hwaccel: Some("videotoolbox"),
                quality_args: &["-q:v", "65"],
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENCODERS: &str = "\
 V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)
 V....D h264_amf             AMD AMF H.264 Encoder (codec h264)
 V....D h264_qsv             H.264 / AVC / MPEG-4 AVC (Intel Quick Sync Video acceleration) (codec h264)
";

    #[test]
    fn test_default_capabilities() {
        let caps = EncoderCapabilities::default();
        assert!(!caps.h264_nvenc);
        assert!(!caps.has_hardware_encoder());
        assert!(caps.hardware_encoder().is_none());
    }

    #[test]
    fn test_parse_encoders_list() {
        let caps = EncoderCapabilities::parse(ENCODERS);
        assert!(caps.h264_amf);
        assert!(caps.h264_qsv);
        assert!(!caps.h264_nvenc);
        assert!(caps.has_hardware_encoder());
    }

    #[test]
    fn test_hardware_encoder_preference() {
        let caps = EncoderCapabilities::parse(ENCODERS);
        assert_eq!(caps.hardware_encoder().unwrap().encoder, "h264_amf");

        let nvidia = EncoderCapabilities {
            h264_nvenc: true,
            h264_qsv: true,
            ..Default::default()
        };
        let hw = nvidia.hardware_encoder().unwrap();
        assert_eq!(hw.encoder, "h264_nvenc");
        assert_eq!(hw.hwaccel, Some("cuda"));
    }
}
