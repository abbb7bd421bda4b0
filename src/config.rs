/*
 *  config.rs
 *
 *  ledscroll - MAX7219 message scroller
 *  (c) 2020-26 Stuart Hunter
 *
 *  Configuration: defaults, YAML file and command line overrides
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::display::max7219::{DriverOptions, MAX_INTENSITY};

pub const DEFAULT_MESSAGE: &str = "HELLO WORLD * ";
pub const DEFAULT_SCROLL_DELAY_MS: u64 = 40;
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 10;
pub const DEFAULT_SPI_SPEED_HZ: u32 = 100_000;

const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration, as read from YAML. Unset fields fall back to
/// the defaults when resolved into a [`ScrollConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    pub log_level: Option<String>,       // e.g., "info" | "debug"
    pub message: Option<String>,
    pub scroll_delay_ms: Option<u64>,
    pub display: Option<DisplayConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct DisplayConfig {
    pub intensity: Option<u8>,           // 0-15
    pub settle_delay_ms: Option<u64>,    // pause after each setup command
    pub row_delay_us: Option<u64>,       // pause between row writes, normally 0
    pub clear_on_exit: Option<bool>,
    pub bus: Option<BusConfig>,
}

/// SPI wiring. Controller and chip select map to `/dev/spidevC.S` unless an
/// explicit path is given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BusConfig {
    pub controller: u8,
    pub chip_select: u8,
    pub speed_hz: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            controller: 0,
            chip_select: 0,
            speed_hz: DEFAULT_SPI_SPEED_HZ,
            path: None,
        }
    }
}

impl BusConfig {
    pub fn device_path(&self) -> PathBuf {
        match self.path.as_ref() {
            Some(p) => PathBuf::from(p),
            None => PathBuf::from(format!("/dev/spidev{}.{}", self.controller, self.chip_select)),
        }
    }
}

/// Fully resolved settings handed to the scroller.
#[derive(Debug, Clone, PartialEq)]
pub struct ScrollConfig {
    pub message: String,
    pub scroll_delay: Duration,
    pub bus: BusConfig,
    pub driver: DriverOptions,
    pub clear_on_exit: bool,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            scroll_delay: Duration::from_millis(DEFAULT_SCROLL_DELAY_MS),
            bus: BusConfig::default(),
            driver: DriverOptions::default(),
            clear_on_exit: true,
        }
    }
}

impl Config {
    pub fn log_level(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn scroll_config(&self) -> ScrollConfig {
        let display = self.display.clone().unwrap_or_default();
        ScrollConfig {
            message: self.message.clone().unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            scroll_delay: Duration::from_millis(self.scroll_delay_ms.unwrap_or(DEFAULT_SCROLL_DELAY_MS)),
            bus: display.bus.unwrap_or_default(),
            driver: DriverOptions {
                intensity: display.intensity.unwrap_or(0),
                settle_delay: Duration::from_millis(display.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS)),
                row_delay: Duration::from_micros(display.row_delay_us.unwrap_or(0)),
            },
            clear_on_exit: display.clear_on_exit.unwrap_or(true),
        }
    }
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone)]
#[command(name = "ledscroll", version, about = "Scroll a message across a MAX7219 8x8 LED matrix")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(short = 'v', long, alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// Message to scroll
    #[arg(short = 'm', long)]
    pub message: Option<String>,
    #[arg(long)]
    pub scroll_delay_ms: Option<u64>,
    /// Brightness register, 0-15
    #[arg(long)]
    pub intensity: Option<u8>,
    #[arg(long)]
    pub spi_controller: Option<u8>,
    #[arg(long)]
    pub chip_select: Option<u8>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub spi_path: Option<String>,
    /// Show a single character instead of scrolling (font check)
    #[arg(long)]
    pub show_char: Option<char>,
    /// Run against an in-memory bus instead of /dev/spidev
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: read YAML, merge CLI, validate.
pub fn load(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

pub fn to_yaml(cfg: &Config) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(cfg)?)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/ledscroll/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/ledscroll/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/ledscroll.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["ledscroll.yaml", "config/ledscroll.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    parse_yaml(&s)
}

pub fn parse_yaml(s: &str) -> Result<Config, ConfigError> {
    let cfg: Config = serde_yaml::from_str(s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    if src.log_level.is_some()       { dst.log_level = src.log_level; }
    if src.message.is_some()         { dst.message = src.message; }
    if src.scroll_delay_ms.is_some() { dst.scroll_delay_ms = src.scroll_delay_ms; }
    match (&mut dst.display, src.display) {
        (None, Some(c)) => dst.display = Some(c),
        (Some(d), Some(s)) => merge_display(d, s),
        _ => {}
    }
}

fn merge_display(dst: &mut DisplayConfig, src: DisplayConfig) {
    if src.intensity.is_some()       { dst.intensity = src.intensity; }
    if src.settle_delay_ms.is_some() { dst.settle_delay_ms = src.settle_delay_ms; }
    if src.row_delay_us.is_some()    { dst.row_delay_us = src.row_delay_us; }
    if src.clear_on_exit.is_some()   { dst.clear_on_exit = src.clear_on_exit; }
    if src.bus.is_some()             { dst.bus = src.bus; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()       { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                     { cfg.log_level = Some("debug".to_string()); }
    if cli.message.is_some()         { cfg.message = cli.message.clone(); }
    if cli.scroll_delay_ms.is_some() { cfg.scroll_delay_ms = cli.scroll_delay_ms; }

    let any_display = cli.intensity.is_some()
        || cli.spi_controller.is_some()
        || cli.chip_select.is_some()
        || cli.spi_path.is_some();
    if !any_display {
        return;
    }

    let display = cfg.display.get_or_insert_with(DisplayConfig::default);
    if cli.intensity.is_some() { display.intensity = cli.intensity; }

    let any_bus = cli.spi_controller.is_some() || cli.chip_select.is_some() || cli.spi_path.is_some();
    if any_bus {
        let bus = display.bus.get_or_insert_with(BusConfig::default);
        if let Some(c) = cli.spi_controller { bus.controller = c; }
        if let Some(cs) = cli.chip_select   { bus.chip_select = cs; }
        if cli.spi_path.is_some()           { bus.path = cli.spi_path.clone(); }
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(level) = cfg.log_level.as_deref() {
        if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!("unknown log_level '{}'", level)));
        }
    }
    if cfg.scroll_delay_ms == Some(0) {
        return Err(ConfigError::Validation("scroll_delay_ms must be > 0".into()));
    }
    if let Some(display) = cfg.display.as_ref() {
        if let Some(i) = display.intensity {
            if i > MAX_INTENSITY {
                return Err(ConfigError::Validation(format!(
                    "display intensity must be 0..={}", MAX_INTENSITY
                )));
            }
        }
        if let Some(bus) = display.bus.as_ref() {
            if bus.speed_hz == 0 {
                return Err(ConfigError::Validation("bus speed_hz must be > 0".into()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["ledscroll"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_resolve() {
        let sc = Config::default().scroll_config();
        assert_eq!(sc.message, DEFAULT_MESSAGE);
        assert_eq!(sc.scroll_delay, Duration::from_millis(40));
        assert_eq!(sc.driver.settle_delay, Duration::from_millis(10));
        assert_eq!(sc.driver.row_delay, Duration::ZERO);
        assert_eq!(sc.driver.intensity, 0);
        assert_eq!(sc.bus.speed_hz, 100_000);
        assert_eq!(sc.bus.device_path(), PathBuf::from("/dev/spidev0.0"));
        assert!(sc.clear_on_exit);
    }

    #[test]
    fn test_parse_yaml_partial_bus() {
        let yaml = r#"
message: "HI * "
scroll_delay_ms: 25
display:
  intensity: 7
  bus:
    chip_select: 1
"#;
        let cfg = parse_yaml(yaml).unwrap();
        let sc = cfg.scroll_config();
        assert_eq!(sc.message, "HI * ");
        assert_eq!(sc.scroll_delay, Duration::from_millis(25));
        assert_eq!(sc.driver.intensity, 7);
        assert_eq!(sc.bus.controller, 0);
        assert_eq!(sc.bus.chip_select, 1);
        assert_eq!(sc.bus.speed_hz, DEFAULT_SPI_SPEED_HZ);
        assert_eq!(sc.bus.device_path(), PathBuf::from("/dev/spidev0.1"));
    }

    #[test]
    fn test_cli_overrides_yaml() {
        let mut cfg = parse_yaml("message: from-file\ndisplay:\n  intensity: 3\n").unwrap();
        apply_cli_overrides(&mut cfg, &cli(&["-m", "from-cli", "--intensity", "9", "--spi-path", "/dev/spidev1.0"]));

        let sc = cfg.scroll_config();
        assert_eq!(sc.message, "from-cli");
        assert_eq!(sc.driver.intensity, 9);
        assert_eq!(sc.bus.device_path(), PathBuf::from("/dev/spidev1.0"));
    }

    #[test]
    fn test_merge_keeps_unset_fields() {
        let mut dst = parse_yaml("message: keep\nscroll_delay_ms: 60\n").unwrap();
        merge(&mut dst, parse_yaml("scroll_delay_ms: 15\n").unwrap());
        assert_eq!(dst.message.as_deref(), Some("keep"));
        assert_eq!(dst.scroll_delay_ms, Some(15));
    }

    #[test]
    fn test_debug_flag_sets_level() {
        let mut cfg = Config::default();
        apply_cli_overrides(&mut cfg, &cli(&["--debug"]));
        assert_eq!(cfg.log_level(), "debug");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_intensity = parse_yaml("display:\n  intensity: 16\n").unwrap();
        assert!(validate(&bad_intensity).is_err());

        let zero_delay = parse_yaml("scroll_delay_ms: 0\n").unwrap();
        assert!(validate(&zero_delay).is_err());

        let bad_level = parse_yaml("log_level: loud\n").unwrap();
        assert!(validate(&bad_level).is_err());

        let zero_speed = parse_yaml("display:\n  bus:\n    speed_hz: 0\n").unwrap();
        assert!(validate(&zero_speed).is_err());

        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_of_merged_config() {
        let cfg = parse_yaml("message: abc\ndisplay:\n  bus:\n    controller: 1\n").unwrap();
        let dumped = to_yaml(&cfg).unwrap();
        assert_eq!(parse_yaml(&dumped).unwrap(), cfg);
    }
}
