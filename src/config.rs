use crate::playlist::OrderingMode;
use crate::prompt::Prompter;
use crate::target::StreamTarget;
use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Command line and config file options.
///
/// Anything left out of both is asked for interactively.
///
/// Example configuration file content
/// # Playlist Streamer Configuration
///
/// folder = "/srv/videos"
/// rtmp_url = "rtmp://live.example.com/app"
/// stream_key = "xxxx-xxxx-xxxx"
/// order = "shuffled"          # Options: "sequential" or "shuffled"
///
/// # Optional
/// verbose = false
/// ffmpeg = "/usr/local/bin/ffmpeg"
/// rescan_interval = 30        # seconds
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[serde(default)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// Folder with the videos to stream
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<PathBuf>,

    /// RTMP server URL, e.g. rtmp://live.example.com/app
    #[arg(short = 'u', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rtmp_url: Option<String>,

    /// Stream key appended to the RTMP URL
    #[arg(short = 'k', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_key: Option<String>,

    /// Playlist order for every pass
    #[arg(short, long, value_enum)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderingMode>,

    /// Log encoder output and debug events
    #[arg(short, long)]
    pub verbose: bool,

    /// Encoder program to invoke
    #[arg(long, default_value = "ffmpeg")]
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// Seconds to wait before rescanning a folder without videos
    #[arg(long, default_value_t = 30)]
    #[serde(default = "default_rescan_interval")]
    pub rescan_interval: u64,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            folder: None,
            rtmp_url: None,
            stream_key: None,
            order: None,
            verbose: false,
            ffmpeg: default_ffmpeg(),
            rescan_interval: default_rescan_interval(),
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // For Option fields, CLI takes precedence if Some
        if self.folder.is_none() {
            self.folder = file_config.folder;
        }
        if self.rtmp_url.is_none() {
            self.rtmp_url = file_config.rtmp_url;
        }
        if self.stream_key.is_none() {
            self.stream_key = file_config.stream_key;
        }
        if self.order.is_none() {
            self.order = file_config.order;
        }

        // If CLI value is default, use file value
        self.verbose |= file_config.verbose;
        if self.ffmpeg == default_ffmpeg() {
            self.ffmpeg = file_config.ffmpeg;
        }
        if self.rescan_interval == default_rescan_interval() {
            self.rescan_interval = file_config.rescan_interval;
        }

        self
    }

    /// Validate the values that are already known
    pub fn validate(&self) -> Result<()> {
        if let Some(folder) = &self.folder
            && !folder.is_dir()
        {
            bail!("Video folder {} does not exist", folder.display());
        }

        if self.rtmp_url.as_ref().is_some_and(|url| url.trim().is_empty()) {
            bail!("RTMP URL cannot be empty");
        }
        if self.stream_key.as_ref().is_some_and(|key| key.trim().is_empty()) {
            bail!("Stream key cannot be empty");
        }
        if self.ffmpeg.trim().is_empty() {
            bail!("Encoder program cannot be empty");
        }
        if self.rescan_interval == 0 {
            bail!("Rescan interval must be at least one second");
        }

        Ok(())
    }

    /// Fill the gaps through `prompter` and build the run settings.
    pub fn resolve<R, W>(self, prompter: &mut Prompter<R, W>) -> Result<Settings>
    where
        R: BufRead,
        W: Write,
    {
        let folder = match self.folder {
            Some(folder) => folder,
            None => prompter.folder()?,
        };
        let rtmp_url = match self.rtmp_url {
            Some(url) => url,
            None => prompter.non_empty("RTMP URL: ")?,
        };
        let stream_key = match self.stream_key {
            Some(key) => key,
            None => prompter.non_empty("Stream key: ")?,
        };
        let ordering = match self.order {
            Some(order) => order,
            None => prompter.ordering()?,
        };

        Ok(Settings {
            folder,
            target: StreamTarget::new(&rtmp_url, &stream_key)?,
            ordering,
            verbose: self.verbose,
            ffmpeg: self.ffmpeg,
            rescan_interval: Duration::from_secs(self.rescan_interval),
        })
    }
}

/// Fully resolved, immutable settings of one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub folder: PathBuf,
    pub target: StreamTarget,
    pub ordering: OrderingMode,
    pub verbose: bool,
    pub ffmpeg: String,
    pub rescan_interval: Duration,
}

// Default value functions
fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_rescan_interval() -> u64 {
    30
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(args: &[&str]) -> Config {
        let argv = std::iter::once("playlist-streamer").chain(args.iter().copied());
        Config::try_parse_from(argv).unwrap()
    }

    fn silent_prompter() -> Prompter<Cursor<Vec<u8>>, Vec<u8>> {
        Prompter::new(Cursor::new(Vec::new()), Vec::new())
    }

    #[test]
    fn test_cli_defaults() {
        let config = parse(&[]);
        assert_eq!(config.ffmpeg, "ffmpeg");
        assert_eq!(config.rescan_interval, 30);
        assert!(!config.verbose);
        assert!(config.folder.is_none());
        assert!(config.order.is_none());
    }

    #[test]
    fn test_file_values_fill_cli_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("streamer.toml");
        std::fs::write(
            &path,
            r#"
            rtmp_url = "rtmp://file/app"
            stream_key = "file-key"
            order = "shuffled"
            verbose = true
            ffmpeg = "/opt/ffmpeg"
            rescan_interval = 5
            "#,
        )
        .unwrap();

        let cli = parse(&["--rtmp-url", "rtmp://cli/app", "--rescan-interval", "10"]);
        let config = cli.merge_with_file(Config::from_file(&path).unwrap());

        assert_eq!(config.rtmp_url.as_deref(), Some("rtmp://cli/app"));
        assert_eq!(config.stream_key.as_deref(), Some("file-key"));
        assert_eq!(config.order, Some(OrderingMode::Shuffled));
        assert!(config.verbose);
        assert_eq!(config.ffmpeg, "/opt/ffmpeg");
        assert_eq!(config.rescan_interval, 10);
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "order = \"random\"").unwrap();

        assert!(Config::from_file(&path).is_err());
        assert!(Config::from_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().to_str().unwrap();

        assert!(parse(&["--folder", folder]).validate().is_ok());
        assert!(parse(&["--folder", "/definitely/not/here"]).validate().is_err());
        let file = dir.path().join("clip.mp4");
        std::fs::write(&file, b"").unwrap();
        assert!(parse(&["--folder", file.to_str().unwrap()]).validate().is_err());
        assert!(parse(&["--rtmp-url", " "]).validate().is_err());
        assert!(parse(&["--stream-key", ""]).validate().is_err());
        assert!(parse(&["--rescan-interval", "0"]).validate().is_err());
        assert!(parse(&["--ffmpeg", ""]).validate().is_err());
    }

    #[test]
    fn test_resolve_without_prompts() {
        let dir = tempfile::tempdir().unwrap();
        let config = parse(&[
            "-f",
            dir.path().to_str().unwrap(),
            "-u",
            "rtmp://host/live/",
            "-k",
            "key",
            "-o",
            "sequential",
            "-v",
        ]);

        let settings = config.resolve(&mut silent_prompter()).unwrap();
        assert_eq!(settings.folder, dir.path());
        assert_eq!(settings.target.as_str(), "rtmp://host/live/key");
        assert_eq!(settings.ordering, OrderingMode::Sequential);
        assert!(settings.verbose);
        assert_eq!(settings.rescan_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_resolve_prompts_for_missing_values() {
        let dir = tempfile::tempdir().unwrap();
        let input = format!("{}\nrtmp://host/live\nkey\ny\n", dir.path().display());
        let mut prompter = Prompter::new(Cursor::new(input.into_bytes()), Vec::new());

        let settings = parse(&[]).resolve(&mut prompter).unwrap();
        assert_eq!(settings.folder, dir.path());
        assert_eq!(settings.target.as_str(), "rtmp://host/live/key");
        assert_eq!(settings.ordering, OrderingMode::Shuffled);
    }
}
