use anyhow::anyhow;
use clap::Parser;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env,
    fs::{self, File},
    io::{Read, Write},
    path::PathBuf,
};
use time::{format_description::well_known::Iso8601, OffsetDateTime};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to Settings.toml file holding configuration options
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level to run with the service (default: info)
    #[arg(short, long)]
    pub level: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Settings {
    pub config: Option<String>,
    pub level: Option<String>,
    pub api_settings: APISettings,
    pub ui_settings: UISettings,
    pub backend_settings: BackendSettings,
    pub payment_settings: PaymentSettings,
}

impl ConfigurableSettings for Settings {
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings) {
        if let Some(level) = &cli_settings.level {
            self.level = Some(level.clone());
        }
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("./config/local.toml")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct APISettings {
    pub domain: String,
    pub port: String,
    pub origins: Vec<String>,
}

impl Default for APISettings {
    fn default() -> Self {
        APISettings {
            domain: String::from("127.0.0.1"),
            port: String::from("9880"),
            origins: vec![String::from("http://localhost:9880")],
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UISettings {
    /// Public base URL the browser reaches the portal on
    pub public_url: String,
    /// Directory with static assets (hero art, stylesheet)
    pub assets_dir: String,
}

impl Default for UISettings {
    fn default() -> Self {
        UISettings {
            public_url: String::from("http://127.0.0.1:9880"),
            assets_dir: String::from("./assets"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL of the remote event backend holding competitions and
    /// registrations
    pub base_url: String,
    /// Seconds a successful competitions fetch stays fresh
    pub catalog_ttl_secs: u64,
    /// Seconds a successful registrations fetch stays fresh
    pub registrations_ttl_secs: u64,
    /// Timeout for read calls
    pub fetch_timeout_secs: u64,
    /// Extended timeout for the multipart submission upload
    pub submit_timeout_secs: u64,
    /// Registration sessions idle longer than this are dropped
    pub session_idle_secs: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        BackendSettings {
            base_url: String::from("http://127.0.0.1:9800"),
            catalog_ttl_secs: 300,
            registrations_ttl_secs: 120,
            fetch_timeout_secs: 10,
            submit_timeout_secs: 60,
            session_idle_secs: 3600,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentSettings {
    /// Snap widget script, injected into the page on first payment
    pub script_url: String,
    /// Client key passed to the script via data-client-key
    pub client_key: String,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        PaymentSettings {
            script_url: String::from("https://app.sandbox.midtrans.com/snap/snap.js"),
            client_key: String::from("Mid-client-sandbox"),
        }
    }
}

pub fn get_settings() -> Result<Settings, anyhow::Error> {
    get_settings_with_cli(Cli::parse().into())
}

pub struct CliSettings {
    pub config: Option<String>,
    pub level: Option<String>,
}

impl From<Cli> for CliSettings {
    fn from(cli: Cli) -> Self {
        Self {
            config: cli.config,
            level: cli.level,
        }
    }
}

pub trait ConfigurableSettings: Serialize + for<'de> Deserialize<'de> + Default {
    /// Apply CLI settings after loading from file
    fn apply_cli_overrides(&mut self, cli_settings: &CliSettings);

    /// Get the default config file path
    fn default_config_path() -> PathBuf {
        PathBuf::from("./config/settings.toml")
    }

    /// Get the config directory path
    fn config_directory() -> PathBuf {
        PathBuf::from("./config")
    }
}

pub fn get_settings_with_cli<T: ConfigurableSettings>(
    cli_settings: CliSettings,
) -> Result<T, anyhow::Error> {
    let mut settings = if let Some(config_path) = cli_settings.config.clone() {
        let path = PathBuf::from(config_path);
        let absolute_path = if path.is_absolute() {
            path
        } else {
            env::current_dir()?.join(path)
        };
        read_settings_file(&absolute_path)?
    } else {
        let default_path = T::default_config_path();
        match read_settings_file(&default_path) {
            Ok(settings) => settings,
            Err(_) => {
                // First run: write the defaults out so the operator has a
                // file to edit
                let default_settings = T::default();
                fs::create_dir_all(T::config_directory())
                    .map_err(|e| anyhow!("Failed to create config directory: {}", e))?;
                let toml_content = toml::to_string(&default_settings)
                    .map_err(|e| anyhow!("Failed to serialize default settings: {}", e))?;
                let mut file = fs::File::create(&default_path)
                    .map_err(|e| anyhow!("Failed to create config file: {}", e))?;
                file.write_all(toml_content.as_bytes())
                    .map_err(|e| anyhow!("Failed to write default config: {}", e))?;
                default_settings
            }
        }
    };

    settings.apply_cli_overrides(&cli_settings);

    Ok(settings)
}

fn read_settings_file<T: ConfigurableSettings>(path: &PathBuf) -> Result<T, anyhow::Error> {
    let mut file = File::open(path).map_err(|e| anyhow!("Failed to find file: {}", e))?;
    let mut content = String::new();
    file.read_to_string(&mut content)
        .map_err(|e| anyhow!("Failed to read config: {}", e))?;
    toml::from_str(&content).map_err(|e| anyhow!("Failed to map config to settings: {}", e))
}

pub fn setup_logger(
    level: Option<String>,
    filter_targets: Vec<String>,
) -> Result<(), fern::InitError> {
    let rust_log = get_log_level(level);
    let colors = ColoredLevelConfig::new()
        .trace(Color::White)
        .debug(Color::Cyan)
        .info(Color::Blue)
        .warn(Color::Yellow)
        .error(Color::Magenta);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}: {}",
                OffsetDateTime::now_utc().format(&Iso8601::DEFAULT).unwrap(),
                colors.color(record.level()),
                record.target(),
                message
            ));
        })
        .level(rust_log)
        .filter(move |metadata| {
            !filter_targets
                .iter()
                .any(|filter| metadata.target().starts_with(filter))
        })
        .chain(std::io::stdout())
        .apply()?;
    Ok(())
}

pub fn get_log_level(level: Option<String>) -> LevelFilter {
    let level = level.unwrap_or_else(|| env::var("RUST_LOG").unwrap_or_default());
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => LevelFilter::Info,
    }
}
