use chrono_tz::Tz;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CamrecConfig {
    pub storage: StorageConfig,
    pub stream: StreamConfig,
    pub event: EventConfig,
    pub encoder: EncoderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StorageConfig {
    /// Directory where finished recordings are committed
    #[serde(default = "default_storage_dir")]
    pub dir: String,

    /// IANA timezone name used for timestamp text and file names
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StreamConfig {
    /// Frame rate numerator (e.g. 30000 for 29.97 fps streams)
    #[serde(default = "default_fps_numerator")]
    pub fps_numerator: u32,

    /// Frame rate denominator (e.g. 1001 for 29.97 fps streams)
    #[serde(default = "default_fps_denominator")]
    pub fps_denominator: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EventConfig {
    /// Seconds of pre-motion footage to keep buffered
    #[serde(default = "default_preroll_seconds")]
    pub preroll_seconds: u32,

    /// Seconds of continued no-motion tolerated before an event ends
    #[serde(default = "default_gap_seconds")]
    pub gap_seconds: u32,

    /// Seconds after gap expiry during which a new motion onset is
    /// merged into the same recording instead of starting a new one
    #[serde(default = "default_glue_seconds")]
    pub glue_seconds: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EncoderConfig {
    /// VAAPI render node handed to the encoder
    #[serde(default = "default_hwaccel_device")]
    pub hwaccel_device: String,

    /// Target video bitrate (ffmpeg syntax, e.g. "5M")
    #[serde(default = "default_video_bitrate")]
    pub video_bitrate: String,

    /// TrueType font used by the encoder's timestamp overlay
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Queue depth limit, as a multiple of the gap window, beyond which
    /// the current session is aborted
    #[serde(default = "default_backlog_multiplier")]
    pub backlog_multiplier: u32,
}

impl CamrecConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("camrec.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("storage.dir", default_storage_dir())?
            .set_default("storage.timezone", default_timezone())?
            .set_default("stream.fps_numerator", default_fps_numerator())?
            .set_default("stream.fps_denominator", default_fps_denominator())?
            .set_default("event.preroll_seconds", default_preroll_seconds())?
            .set_default("event.gap_seconds", default_gap_seconds())?
            .set_default("event.glue_seconds", default_glue_seconds())?
            .set_default("encoder.hwaccel_device", default_hwaccel_device())?
            .set_default("encoder.video_bitrate", default_video_bitrate())?
            .set_default("encoder.font_path", default_font_path())?
            .set_default(
                "encoder.backlog_multiplier",
                default_backlog_multiplier(),
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Add environment variables with CAMREC_ prefix
            .add_source(Environment::with_prefix("CAMREC").separator("_"))
            .build()?;

        let config: CamrecConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.dir.is_empty() {
            return Err(ConfigError::Message(
                "Storage dir must not be empty".to_string(),
            ));
        }

        if self.stream.fps_numerator == 0 || self.stream.fps_denominator == 0 {
            return Err(ConfigError::Message(
                "Stream frame rate terms must be greater than 0".to_string(),
            ));
        }

        if self.event.preroll_seconds == 0 {
            return Err(ConfigError::Message(
                "Event preroll_seconds must be greater than 0".to_string(),
            ));
        }

        if self.event.gap_seconds == 0 {
            return Err(ConfigError::Message(
                "Event gap_seconds must be greater than 0".to_string(),
            ));
        }

        if self.event.glue_seconds == 0 {
            return Err(ConfigError::Message(
                "Event glue_seconds must be greater than 0".to_string(),
            ));
        }

        if self.encoder.backlog_multiplier == 0 {
            return Err(ConfigError::Message(
                "Encoder backlog_multiplier must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Ring buffer capacity: frames covering the configured pre-roll window
    pub fn preroll_frames(&self) -> u32 {
        self.frames_for_duration(self.event.preroll_seconds)
    }

    /// Gap window in frames
    pub fn gap_frames(&self) -> u32 {
        self.frames_for_duration(self.event.gap_seconds)
    }

    /// Glue window in frames
    pub fn glue_frames(&self) -> u32 {
        self.frames_for_duration(self.event.glue_seconds)
    }

    /// Queue depth beyond which the backpressure monitor aborts a session
    pub fn backlog_limit(&self) -> usize {
        self.gap_frames() as usize * self.encoder.backlog_multiplier as usize
    }

    // Rounded up so a fractional frame rate never under-covers the
    // configured wall-clock window.
    fn frames_for_duration(&self, seconds: u32) -> u32 {
        let num = self.stream.fps_numerator as u64;
        let den = self.stream.fps_denominator as u64;
        let total = seconds as u64 * num;
        ((total + den - 1) / den) as u32
    }
}

impl StorageConfig {
    /// Resolve the configured timezone, falling back to UTC
    pub fn resolve_timezone(&self) -> Tz {
        match self.timezone.parse::<Tz>() {
            Ok(tz) => tz,
            Err(_) => {
                warn!(
                    "Invalid timezone '{}', falling back to UTC",
                    self.timezone
                );
                chrono_tz::UTC
            }
        }
    }
}

impl Default for CamrecConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                dir: default_storage_dir(),
                timezone: default_timezone(),
            },
            stream: StreamConfig {
                fps_numerator: default_fps_numerator(),
                fps_denominator: default_fps_denominator(),
            },
            event: EventConfig {
                preroll_seconds: default_preroll_seconds(),
                gap_seconds: default_gap_seconds(),
                glue_seconds: default_glue_seconds(),
            },
            encoder: EncoderConfig {
                hwaccel_device: default_hwaccel_device(),
                video_bitrate: default_video_bitrate(),
                font_path: default_font_path(),
                backlog_multiplier: default_backlog_multiplier(),
            },
        }
    }
}

// Default value functions
fn default_storage_dir() -> String {
    "./recordings".to_string()
}
fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_fps_numerator() -> u32 {
    30
}
fn default_fps_denominator() -> u32 {
    1
}

fn default_preroll_seconds() -> u32 {
    3
}
fn default_gap_seconds() -> u32 {
    3
}
fn default_glue_seconds() -> u32 {
    30
}

fn default_hwaccel_device() -> String {
    "/dev/dri/renderD128".to_string()
}
fn default_video_bitrate() -> String {
    "5M".to_string()
}
fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_backlog_multiplier() -> u32 {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        let config = CamrecConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = CamrecConfig::default();

        config.stream.fps_denominator = 0;
        assert!(config.validate().is_err());

        config.stream.fps_denominator = 1;
        assert!(config.validate().is_ok());

        config.event.glue_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_window_derivation_whole_rate() {
        let config = CamrecConfig::default();

        // 30/1 fps with the 3s/3s/30s defaults
        assert_eq!(config.preroll_frames(), 90);
        assert_eq!(config.gap_frames(), 90);
        assert_eq!(config.glue_frames(), 900);
        assert_eq!(config.backlog_limit(), 360);
    }

    #[test]
    fn test_window_derivation_rounds_up() {
        let mut config = CamrecConfig::default();
        config.stream.fps_numerator = 30000;
        config.stream.fps_denominator = 1001;

        // 3s at 29.97 fps is 89.91 frames; the window must cover it
        assert_eq!(config.gap_frames(), 90);
        // 1s is 29.97 frames
        config.event.gap_seconds = 1;
        assert_eq!(config.gap_frames(), 30);
    }

    #[test]
    fn test_load_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("camrec.toml");

        let mut config = CamrecConfig::default();
        config.storage.dir = "/var/lib/camrec".to_string();
        config.event.glue_seconds = 45;

        std::fs::write(&path, toml::to_string(&config).unwrap()).unwrap();

        let loaded = CamrecConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.storage.dir, "/var/lib/camrec");
        assert_eq!(loaded.event.glue_seconds, 45);
        // Untouched sections come back as defaults
        assert_eq!(loaded.stream.fps_numerator, default_fps_numerator());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let loaded = CamrecConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.event.gap_seconds, default_gap_seconds());
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn test_timezone_fallback() {
        let mut config = CamrecConfig::default();
        config.storage.timezone = "Not/AZone".to_string();
        assert_eq!(config.storage.resolve_timezone(), chrono_tz::UTC);

        config.storage.timezone = "America/New_York".to_string();
        assert_eq!(
            config.storage.resolve_timezone(),
            chrono_tz::America::New_York
        );
    }
}
