// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use pulse_core::init_tracing;
use pulse_platform::PlatformWindow;
use pulse_render::{ColorCycle, FrameClock, FrameDriver};
use pulse_render_vk::{VkRenderer, VkSettings};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file; missing means defaults
    #[arg(long, default_value = "pulse.toml")]
    config: PathBuf,
    /// Enable the Khronos validation layer regardless of config
    #[arg(long)]
    validation: bool,
    /// Stop after this many presented frames
    #[arg(long)]
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        WindowCfg {
            title: "pulse".to_owned(),
            width: 640,
            height: 480,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq)]
#[serde(default)]
struct RenderCfg {
    validation: bool,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
struct ColorCfg {
    start: [f32; 3],
    velocity: [f32; 3],
}

impl Default for ColorCfg {
    fn default() -> Self {
        ColorCfg {
            start: [0.0, 0.33, 0.66],
            velocity: [0.0011, 0.0017, 0.0023],
        }
    }
}

#[derive(Debug, Deserialize, Default, PartialEq)]
struct AppCfg {
    #[serde(default)]
    window: WindowCfg,
    #[serde(default)]
    render: RenderCfg,
    #[serde(default)]
    color: ColorCfg,
}

fn parse_cfg(text: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str::<AppCfg>(text)
}

impl ColorCfg {
    fn is_finite(&self) -> bool {
        self.start.iter().chain(&self.velocity).all(|v| v.is_finite())
    }
}

/// Replaces a `[color]` section holding nan or inf with the defaults.
fn checked(mut cfg: AppCfg, path: &Path) -> AppCfg {
    if !cfg.color.is_finite() {
        warn!("{}: non-finite [color] values, using defaults", path.display());
        cfg.color = ColorCfg::default();
    }
    cfg
}

fn load_cfg(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => match parse_cfg(&s) {
            Ok(cfg) => checked(cfg, path),
            Err(e) => {
                warn!("ignoring {}: {e}", path.display());
                AppCfg::default()
            }
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => AppCfg::default(),
        Err(e) => {
            warn!("cannot read {}: {e}", path.display());
            AppCfg::default()
        }
    }
}

fn run(args: Args) -> Result<u64> {
    let cfg = load_cfg(&args.config);
    if cfg.window.width == 0 || cfg.window.height == 0 {
        pulse_core::fatal("window width and height must be non-zero");
    }
    let settings = VkSettings {
        app_name: cfg.window.title.clone(),
        validation: cfg.render.validation || args.validation,
    };
    info!(
        "{}x{} \"{}\", validation={}",
        cfg.window.width, cfg.window.height, cfg.window.title, settings.validation
    );

    let mut window = PlatformWindow::create(cfg.window.width, cfg.window.height, &cfg.window.title)?;
    let clock = FrameClock::monotonic();

    let mut renderer = {
        let w = window.window();
        VkRenderer::new(w, w, window.render_size(), &settings)?
    };
    window.show();

    let colors = ColorCycle::new(cfg.color.start, cfg.color.velocity);
    let mut driver = FrameDriver::new(&clock, colors, cfg.window.title.as_str())
        .with_frame_limit(args.max_frames);
    driver.run(&mut renderer, &mut window)
}

fn main() {
    init_tracing();
    let args = Args::parse();
    match run(args) {
        Ok(frames) => info!("presented {frames} frames"),
        Err(e) => pulse_core::report(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let cfg = parse_cfg("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.title, "pulse");
        assert_eq!((cfg.window.width, cfg.window.height), (640, 480));
        assert!(!cfg.render.validation);
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "demo"

            [render]
            validation = true
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "demo");
        assert_eq!(cfg.window.width, 640);
        assert!(cfg.render.validation);
        assert_eq!(cfg.color, ColorCfg::default());
    }

    #[test]
    fn colour_section_is_read() {
        let cfg = parse_cfg(
            r#"
            [color]
            start = [1.0, 0.5, 0.0]
            velocity = [0.01, 0.02, 0.03]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.color.start, [1.0, 0.5, 0.0]);
        assert_eq!(cfg.color.velocity, [0.01, 0.02, 0.03]);
    }

    #[test]
    fn malformed_config_is_an_error() {
        assert!(parse_cfg("[window]\nwidth = \"wide\"").is_err());
    }

    #[test]
    fn non_finite_colour_falls_back_to_defaults() {
        let cfg = parse_cfg(
            r#"
            [window]
            title = "kept"

            [color]
            start = [0.5, 0.5, 0.5]
            velocity = [nan, 0.01, 0.01]
            "#,
        )
        .unwrap();
        assert!(cfg.color.velocity[0].is_nan());

        let cfg = checked(cfg, Path::new("pulse.toml"));
        assert_eq!(cfg.color, ColorCfg::default());
        assert_eq!(cfg.window.title, "kept");
    }

    #[test]
    fn infinite_start_is_rejected_too() {
        let cfg = parse_cfg("[color]\nstart = [inf, 0.0, 0.0]").unwrap();
        assert!(!cfg.color.is_finite());
        assert_eq!(checked(cfg, Path::new("pulse.toml")).color, ColorCfg::default());
    }

    #[test]
    fn unreadable_path_falls_back_to_defaults() {
        // A directory exists but cannot be read as a file.
        let cfg = load_cfg(&std::env::temp_dir());
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_cfg(Path::new("definitely/not/here/pulse.toml"));
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn cli_flags_parse() {
        let args = Args::parse_from(["pulse", "--validation", "--max-frames", "10"]);
        assert!(args.validation);
        assert_eq!(args.max_frames, Some(10));
        assert_eq!(args.config, PathBuf::from("pulse.toml"));
    }
}
