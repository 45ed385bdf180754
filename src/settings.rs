use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::components::engine::{DEFAULT_ERASER_RADIUS, DEFAULT_STROKE_WIDTH};
use crate::components::history::DEFAULT_MAX_HISTORY_ITEMS;
use crate::components::paths::StrokeColor;
use crate::components::slots::{
    DEFAULT_MAX_IMAGE_PIXELS, DEFAULT_MAX_UPLOAD_BYTES, EngineDefaults, SlotMode,
};
use crate::log_warn;
use crate::ops::ai::{DEFAULT_API_ENDPOINT, DEFAULT_TIMEOUT};
use crate::ops::request::GuidePolicy;

pub const DEFAULT_MAX_PROMPT_LENGTH: usize = 5000;

/// User-editable settings, persisted as `key=value` lines.
#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub api_endpoint: String,
    pub request_timeout_secs: u64,
    pub eraser_radius: f32,
    pub slot_mode: SlotMode,
    pub max_history_items: usize,
    pub max_prompt_length: usize,
    pub max_upload_bytes: usize,
    pub max_image_pixels: u64,
    pub default_color: StrokeColor,
    pub default_width: f32,
    pub guide_policy: GuidePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            eraser_radius: DEFAULT_ERASER_RADIUS,
            slot_mode: SlotMode::Dual,
            max_history_items: DEFAULT_MAX_HISTORY_ITEMS,
            max_prompt_length: DEFAULT_MAX_PROMPT_LENGTH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_image_pixels: DEFAULT_MAX_IMAGE_PIXELS,
            default_color: StrokeColor::RED,
            default_width: DEFAULT_STROKE_WIDTH,
            guide_policy: GuidePolicy::WhenEmpty,
        }
    }
}

/// Per-user config directory, created on demand.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                PathBuf::from(home).join(".config")
            })
            .join("refpaint");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(target_os = "windows")]
    {
        let appdata = std::env::var("APPDATA")
            .or_else(|_| std::env::var("USERPROFILE"))
            .ok()?;
        let dir = PathBuf::from(appdata).join("RefPaint");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(target_os = "macos")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
        let dir = PathBuf::from(home)
            .join("Library")
            .join("Application Support")
            .join("RefPaint");
        let _ = std::fs::create_dir_all(&dir);
        return Some(dir);
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
    }
}

impl Settings {
    pub fn settings_path() -> Option<PathBuf> {
        config_dir().map(|d| d.join("refpaint_settings.cfg"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn engine_defaults(&self) -> EngineDefaults {
        EngineDefaults {
            color: self.default_color,
            width: self.default_width,
            eraser_radius: self.eraser_radius,
        }
    }

    /// Load settings from disk (defaults if the file is missing).
    pub fn load() -> Self {
        match Self::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    /// Parse `key=value` lines. Unknown keys are ignored and unparsable
    /// values keep their defaults.
    pub fn parse(content: &str) -> Self {
        let mut s = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            let ok = match key {
                "api_endpoint" if !val.is_empty() => {
                    s.api_endpoint = val.to_string();
                    true
                }
                "request_timeout_secs" => set_parsed(&mut s.request_timeout_secs, val),
                "eraser_radius" => set_parsed(&mut s.eraser_radius, val),
                "slot_mode" => set_opt(&mut s.slot_mode, SlotMode::from_name(val)),
                "max_history_items" => set_parsed(&mut s.max_history_items, val),
                "max_prompt_length" => set_parsed(&mut s.max_prompt_length, val),
                "max_upload_bytes" => set_parsed(&mut s.max_upload_bytes, val),
                "max_image_pixels" => set_parsed(&mut s.max_image_pixels, val),
                "default_color" => set_parsed(&mut s.default_color, val),
                "default_width" => set_parsed(&mut s.default_width, val),
                "guide_policy" => set_opt(&mut s.guide_policy, GuidePolicy::from_name(val)),
                _ => true,
            };
            if !ok {
                log_warn!("Ignoring invalid setting {}={}", key, val);
            }
        }
        s
    }

    pub fn to_config_string(&self) -> String {
        format!(
            "api_endpoint={}\n\
             request_timeout_secs={}\n\
             eraser_radius={}\n\
             slot_mode={}\n\
             max_history_items={}\n\
             max_prompt_length={}\n\
             max_upload_bytes={}\n\
             max_image_pixels={}\n\
             default_color={}\n\
             default_width={}\n\
             guide_policy={}\n",
            self.api_endpoint,
            self.request_timeout_secs,
            self.eraser_radius,
            self.slot_mode.name(),
            self.max_history_items,
            self.max_prompt_length,
            self.max_upload_bytes,
            self.max_image_pixels,
            self.default_color,
            self.default_width,
            self.guide_policy.name(),
        )
    }

    pub fn save(&self) {
        let Some(path) = Self::settings_path() else { return };
        if let Err(e) = self.save_to(&path) {
            log_warn!("Could not save settings to {}: {}", path.display(), e);
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_config_string())
    }
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, val: &str) -> bool {
    set_opt(slot, val.parse().ok())
}

fn set_opt<T>(slot: &mut T, val: Option<T>) -> bool {
    match val {
        Some(v) => {
            *slot = v;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(&dir.path().join("nope.cfg"));
        assert_eq!(s, Settings::default());
        assert_eq!(s.request_timeout(), Duration::from_secs(60));
        assert_eq!(s.eraser_radius, 10.0);
        assert_eq!(s.max_prompt_length, 5000);
    }

    #[test]
    fn values_parse_and_bad_ones_keep_defaults() {
        let s = Settings::parse(
            "# comment\n\
             slot_mode = triple\n\
             eraser_radius=24\n\
             default_color=#00f\n\
             max_history_items=banana\n\
             something_else=1\n\
             guide_policy=never\n",
        );
        assert_eq!(s.slot_mode, SlotMode::Triple);
        assert_eq!(s.eraser_radius, 24.0);
        assert_eq!(s.default_color, StrokeColor::BLUE);
        assert_eq!(s.max_history_items, DEFAULT_MAX_HISTORY_ITEMS);
        assert_eq!(s.guide_policy, GuidePolicy::Never);
    }

    #[test]
    fn save_then_load_preserves_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refpaint_settings.cfg");
        let s = Settings {
            api_endpoint: "http://localhost:8080/gen".to_string(),
            request_timeout_secs: 5,
            eraser_radius: 12.5,
            slot_mode: SlotMode::Triple,
            max_history_items: 3,
            max_prompt_length: 100,
            max_upload_bytes: 2048,
            max_image_pixels: 4096,
            default_color: StrokeColor::GREEN,
            default_width: 7.0,
            guide_policy: GuidePolicy::Never,
        };
        s.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), s);
    }
}
