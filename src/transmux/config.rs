use crate::{Error, Result, CONTAINER_CLOCK_HZ, MPEG_CLOCK_HZ};

/// ID3 metadata stream type, announced on every segment's metadata list
pub const DEFAULT_METADATA_DISPATCH_TYPE: &str = "15";

#[derive(Debug, Clone)]
pub struct TransmuxConfig {
    /// Hold a segment back until every announced track contributed
    pub remux: bool,

    /// Track id of elementary audio samples
    pub audio_track_id: u32,

    /// Track id of elementary video samples
    pub video_track_id: u32,

    /// Output clock in Hz
    pub timescale: u32,

    /// Copied onto each segment's metadata list
    pub metadata_dispatch_type: String,

    /// Undecoded input limit, 0 for unlimited
    pub max_backlog_bytes: usize,
}

impl Default for TransmuxConfig {
    fn default() -> Self {
        TransmuxConfig {
            remux: true,
            audio_track_id: 100,
            video_track_id: 101,
            timescale: MPEG_CLOCK_HZ,
            metadata_dispatch_type: DEFAULT_METADATA_DISPATCH_TYPE.to_string(),
            max_backlog_bytes: 16 * 1024 * 1024,
        }
    }
}

impl TransmuxConfig {
    /// Create config builder
    pub fn builder() -> TransmuxConfigBuilder {
        TransmuxConfigBuilder::new()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.audio_track_id == 0 || self.video_track_id == 0 {
            return Err(Error::config("Track ids must be non-zero"));
        }

        if self.audio_track_id == self.video_track_id {
            return Err(Error::config(format!(
                "Audio and video share track id {}",
                self.audio_track_id
            )));
        }

        if self.timescale == 0 || self.timescale % CONTAINER_CLOCK_HZ != 0 {
            return Err(Error::config(format!(
                "Timescale must be a non-zero multiple of {}: {}",
                CONTAINER_CLOCK_HZ, self.timescale
            )));
        }

        Ok(())
    }
}

/// Builder for TransmuxConfig
pub struct TransmuxConfigBuilder {
    config: TransmuxConfig,
}

impl TransmuxConfigBuilder {
    /// Create new builder
    pub fn new() -> Self {
        TransmuxConfigBuilder {
            config: TransmuxConfig::default(),
        }
    }

    pub fn remux(mut self, remux: bool) -> Self {
        self.config.remux = remux;
        self
    }

    /// Set track ids
    pub fn track_ids(mut self, audio: u32, video: u32) -> Self {
        self.config.audio_track_id = audio;
        self.config.video_track_id = video;
        self
    }

    pub fn timescale(mut self, timescale: u32) -> Self {
        self.config.timescale = timescale;
        self
    }

    pub fn metadata_dispatch_type(mut self, dispatch_type: impl Into<String>) -> Self {
        self.config.metadata_dispatch_type = dispatch_type.into();
        self
    }

    /// Set backlog limit
    pub fn max_backlog_bytes(mut self, limit: usize) -> Self {
        self.config.max_backlog_bytes = limit;
        self
    }

    /// Build configuration
    pub fn build(self) -> Result<TransmuxConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for TransmuxConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
