use std::{
    fs::File,
    io::{ErrorKind, Read},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use chrono::NaiveDate;
use toml::Value;
use tracing::info;

use crate::{
    error::ConfigError,
    export::ImageMagick,
    overlay::DEFAULT_MA_WINDOW,
    stockplotter::{Palette, StillStyle},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Yahoo,
    AlphaVantage,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub symbol: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub split_dates: Vec<NaiveDate>,
    pub ma_window: usize,
    pub provider: ProviderKind,
    pub key: String,
    pub request_timeout: Option<Duration>,
    pub img_width: u32,
    pub img_height: u32,
    pub palette: Palette,
    pub still_style: StillStyle,
    pub hidden_series: Vec<String>,
    pub tick_interval: Duration,
    pub annotation_text: String,
    pub fade_duration: Duration,
    pub frame_dir: PathBuf,
    pub gif_path: PathBuf,
    pub snapshot_path: PathBuf,
    pub assembler: ImageMagick,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            symbol: String::from("AAPL"),
            start_date: NaiveDate::from_ymd_opt(2023, 10, 1).unwrap_or(NaiveDate::MIN),
            end_date: NaiveDate::from_ymd_opt(2023, 11, 30).unwrap_or(NaiveDate::MIN),
            split_dates: [(2023, 1, 10), (2023, 1, 20)]
                .iter()
                .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
                .collect(),
            ma_window: DEFAULT_MA_WINDOW,
            provider: ProviderKind::Yahoo,
            key: String::new(),
            request_timeout: None,
            img_width: 960,
            img_height: 480,
            palette: Palette::Coolwarm,
            still_style: StillStyle::Line,
            hidden_series: Vec::new(),
            tick_interval: Duration::from_millis(100),
            annotation_text: String::from("Market Peak"),
            fade_duration: Duration::from_millis(1000),
            frame_dir: PathBuf::from("animation_frames"),
            gif_path: PathBuf::from("stock_price_animation.gif"),
            snapshot_path: PathBuf::from("static_visualization.png"),
            assembler: ImageMagick::default(),
        }
    }
}

impl Config {
    /// Reads `path`, creating an empty file (all defaults) if it doesn't exist yet.
    pub fn read_config(path: &Path) -> Result<Self, ConfigError> {
        let mut config_file = match File::open(path) {
            Ok(config) => config,
            Err(error) => match error.kind() {
                ErrorKind::NotFound => {
                    info!(path = %path.display(), "no config file, creating an empty one");
                    File::create(path)?;
                    return Ok(Config::default());
                }
                _ => return Err(error.into()),
            },
        };

        let mut contents = String::new();
        config_file.read_to_string(&mut contents)?;
        Config::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config_toml = contents.parse::<Value>()?;
        let mut config = Config::default();

        if let Some(symbol) = get_str(&config_toml, "symbol")? {
            config.symbol = String::from(symbol);
        }
        if let Some(date) = get_date(&config_toml, "start_date")? {
            config.start_date = date;
        }
        if let Some(date) = get_date(&config_toml, "end_date")? {
            config.end_date = date;
        }
        if let Some(dates) = config_toml.get("split_dates") {
            let array = dates
                .as_array()
                .ok_or_else(|| ConfigError::invalid("split_dates", "expected an array of dates"))?;
            config.split_dates = array
                .iter()
                .map(|v| {
                    v.as_str()
                        .ok_or_else(|| ConfigError::invalid("split_dates", "expected date strings"))
                        .and_then(|s| parse_date("split_dates", s))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(window) = get_uint(&config_toml, "ma_window")? {
            config.ma_window = window as usize;
        }
        if let Some(provider) = get_str(&config_toml, "provider")? {
            config.provider = match provider.to_ascii_lowercase().as_str() {
                "yahoo" => ProviderKind::Yahoo,
                "alphavantage" => ProviderKind::AlphaVantage,
                other => return Err(ConfigError::invalid("provider", format!("unknown provider `{}`", other))),
            };
        }
        if let Some(key) = get_str(&config_toml, "key")? {
            config.key = String::from(key);
        }
        if let Some(secs) = get_uint(&config_toml, "request_timeout_secs")? {
            config.request_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(width) = get_uint(&config_toml, "img_width")? {
            config.img_width = to_u32("img_width", width)?;
        }
        if let Some(height) = get_uint(&config_toml, "img_height")? {
            config.img_height = to_u32("img_height", height)?;
        }
        if let Some(palette) = get_str(&config_toml, "palette")? {
            config.palette = Palette::from_name(palette)
                .ok_or_else(|| ConfigError::invalid("palette", format!("unknown palette `{}`", palette)))?;
        }
        if let Some(style) = get_str(&config_toml, "still_style")? {
            config.still_style = style
                .parse()
                .map_err(|reason: String| ConfigError::invalid("still_style", reason))?;
        }
        if let Some(labels) = config_toml.get("hidden_series") {
            let array = labels
                .as_array()
                .ok_or_else(|| ConfigError::invalid("hidden_series", "expected an array of series names"))?;
            config.hidden_series = array
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(String::from)
                        .ok_or_else(|| ConfigError::invalid("hidden_series", "expected strings"))
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(ms) = get_uint(&config_toml, "tick_interval_ms")? {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(text) = get_str(&config_toml, "annotation_text")? {
            config.annotation_text = String::from(text);
        }
        if let Some(ms) = get_uint(&config_toml, "fade_duration_ms")? {
            config.fade_duration = Duration::from_millis(ms);
        }
        if let Some(dir) = get_str(&config_toml, "frame_dir")? {
            config.frame_dir = PathBuf::from(dir);
        }
        if let Some(path) = get_str(&config_toml, "gif_path")? {
            config.gif_path = PathBuf::from(path);
        }
        if let Some(path) = get_str(&config_toml, "snapshot_path")? {
            config.snapshot_path = PathBuf::from(path);
        }
        if let Some(assembler) = config_toml.get("assembler") {
            if let Some(program) = get_str(assembler, "program")? {
                config.assembler.program = String::from(program);
            }
            if let Some(delay) = get_uint(assembler, "delay")? {
                config.assembler.delay = to_u32("assembler.delay", delay)?;
            }
            if let Some(count) = get_uint(assembler, "loop")? {
                config.assembler.loop_count = to_u32("assembler.loop", count)?;
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("symbol", "must not be empty"));
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::invalid("start_date", "must not be after end_date"));
        }
        if self.ma_window == 0 {
            return Err(ConfigError::invalid("ma_window", "must be at least 1"));
        }
        if self.img_width == 0 || self.img_height == 0 {
            return Err(ConfigError::invalid("img_width", "image size must be non-zero"));
        }
        if self.provider == ProviderKind::AlphaVantage && self.key.is_empty() {
            return Err(ConfigError::invalid("key", "alphavantage needs an api key"));
        }
        Ok(())
    }
}

fn get_str<'a>(table: &'a Value, key: &str) -> Result<Option<&'a str>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_str()
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(key, "expected a string")),
    }
}

fn get_uint(table: &Value, key: &str) -> Result<Option<u64>, ConfigError> {
    match table.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_integer()
            .and_then(|i| u64::try_from(i).ok())
            .map(Some)
            .ok_or_else(|| ConfigError::invalid(key, "expected a non-negative integer")),
    }
}

fn get_date(table: &Value, key: &str) -> Result<Option<NaiveDate>, ConfigError> {
    get_str(table, key)?.map(|s| parse_date(key, s)).transpose()
}

pub(crate) fn parse_date(key: &str, s: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::from_str(s).map_err(|e| ConfigError::invalid(key, format!("`{}` is not a YYYY-MM-DD date: {}", s, e)))
}

fn to_u32(key: &str, value: u64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::invalid(key, "value too large"))
}
