use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub browser: BrowserSettings,
    pub discovery: DiscoverySettings,
    pub extraction: ExtractionSettings,
    pub enrichment: EnrichmentSettings,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ApplicationSettings {
    pub host: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct BrowserSettings {
    /// Connect to an already running driver instead of spawning one.
    pub webdriver_url: Option<String>,
    /// Probed in order; the first existing file is spawned.
    pub driver_paths: Vec<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub driver_port: u16,
    pub startup_timeout_secs: u64,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub page_load_timeout_secs: u64,
    pub implicit_wait_secs: u64,
    pub user_agent: String,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            webdriver_url: None,
            driver_paths: vec![
                "/usr/bin/chromedriver".to_string(),
                "/usr/local/bin/chromedriver".to_string(),
            ],
            driver_port: 9515,
            startup_timeout_secs: 10,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            page_load_timeout_secs: 60,
            implicit_wait_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl BrowserSettings {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout_secs)
    }

    pub fn implicit_wait(&self) -> Duration {
        Duration::from_secs(self.implicit_wait_secs)
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct DiscoverySettings {
    pub base_url: String,
    pub feed_wait_secs: u64,
    pub feed_poll_ms: u64,
    pub max_scrolls: u32,
    pub stable_reads: u32,
    pub page_settle: DelayRange,
    pub scroll_pause: DelayRange,
    pub post_scroll_pause_ms: u64,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        DiscoverySettings {
            base_url: "https://www.google.com/maps/search/".to_string(),
            feed_wait_secs: 15,
            feed_poll_ms: 500,
            max_scrolls: 8,
            stable_reads: 3,
            page_settle: DelayRange::new(4_000, 6_000),
            scroll_pause: DelayRange::new(1_500, 2_500),
            post_scroll_pause_ms: 2_000,
        }
    }
}

impl DiscoverySettings {
    pub fn feed_wait(&self) -> Duration {
        Duration::from_secs(self.feed_wait_secs)
    }

    pub fn feed_poll(&self) -> Duration {
        Duration::from_millis(self.feed_poll_ms)
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct ExtractionSettings {
    pub min_results: usize,
    pub max_results: usize,
    pub scroll_into_view_pause_ms: u64,
    pub activation_settle: DelayRange,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        ExtractionSettings {
            min_results: 3,
            max_results: 15,
            scroll_into_view_pause_ms: 600,
            activation_settle: DelayRange::new(2_500, 4_000),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct EnrichmentSettings {
    pub timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub min_text_len: usize,
    pub request_delay: DelayRange,
    /// Number of websites fetched at once. 1 keeps the polite sequential mode.
    pub concurrency: usize,
    pub user_agent: String,
}

impl Default for EnrichmentSettings {
    fn default() -> Self {
        EnrichmentSettings {
            timeout_secs: 8,
            fallback_timeout_secs: 5,
            min_text_len: 100,
            request_delay: DelayRange::new(1_000, 2_000),
            concurrency: 1,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl EnrichmentSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }
}

/// Inclusive range of milliseconds a randomized wait is drawn from.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DelayRange {
    pub const ZERO: DelayRange = DelayRange { min_ms: 0, max_ms: 0 };

    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        DelayRange { min_ms, max_ms }
    }

    pub fn sample(&self) -> Duration {
        if self.max_ms <= self.min_ms {
            return Duration::from_millis(self.min_ms);
        }
        let millis = rand::thread_rng().gen_range(self.min_ms..=self.max_ms);
        Duration::from_millis(millis)
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("No current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;
    let environment_filename = format!("{}.yaml", environment.as_str());

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join("base.yaml")).required(false))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename)).required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    settings.try_deserialize::<Settings>()
}
