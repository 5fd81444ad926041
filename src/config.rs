use holdfast_client::MAX_FRAME_DT;
use holdfast_net::FramingMode;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/client.toml";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port` of the game server.
    pub server_addr: String,
    /// How transport reads are split into frames.
    pub framing: FramingMode,
    /// `tracing` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Upper bound on a single simulation step, in seconds.
    pub max_frame_dt: f32,
    /// Target frames per second for the live loop.
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:8080".to_owned(),
            framing: FramingMode::Newline,
            log_filter: "warn".to_owned(),
            max_frame_dt: MAX_FRAME_DT,
            frame_rate: 60,
        }
    }
}

impl ClientConfig {
    /// Load configuration from the default path.
    pub fn load() -> Self {
        Self::load_from_path(Path::new(DEFAULT_CONFIG_PATH))
    }

    /// Load configuration from an explicit path, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        let config = match fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<ClientConfig>(&contents) {
                Ok(cfg) => cfg,
                Err(err) => {
                    warn!("Failed to parse {}: {err}. Using defaults", path.display());
                    ClientConfig::default()
                }
            },
            Err(err) => {
                if path != Path::new(DEFAULT_CONFIG_PATH)
                    || err.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to read {}: {err}. Using defaults", path.display());
                }
                ClientConfig::default()
            }
        };
        config.sanitized()
    }

    fn sanitized(mut self) -> Self {
        if !(self.max_frame_dt.is_finite() && self.max_frame_dt > 0.0) {
            warn!(value = self.max_frame_dt, "max_frame_dt must be positive; using default");
            self.max_frame_dt = MAX_FRAME_DT;
        }
        self.max_frame_dt = self.max_frame_dt.min(MAX_FRAME_DT);
        self.frame_rate = self.frame_rate.clamp(1, 240);
        self
    }
}
