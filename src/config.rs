//! Site configuration module.
//!
//! Handles loading, validating, and merging `config.toml`. User values are
//! layered on top of the stock defaults, so a config file only needs the keys
//! it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [cms]
//! endpoint = ""                  # e.g. https://your-repo.cdn.prismic.io/api/v2
//! # access_token = "..."         # for private repositories
//! document_type = "post"         # document type that holds posts
//! paths_page_size = 2            # posts pre-generated at build time
//! max_retries = 3                # retries for transient HTTP failures
//!
//! [generation]
//! revalidate_secs = 1800         # minimum age before a page is regenerated
//! fallback_text = "Carregando..."
//! max_negative_pages = 1024      # cap on remembered missing/failed slugs
//!
//! [content]
//! strictness = "lenient"         # lenient | strict
//! word_splitting = "whitespace"  # whitespace | literal
//! words_per_minute = 200
//! timezone = "America/Sao_Paulo"
//!
//! [server]
//! bind = "127.0.0.1:3000"
//!
//! [logging]
//! level = "info"                 # RUST_LOG overrides this
//! format = "compact"             # compact | json
//!
//! [colors.light]
//! background = "#ffffff"
//! text = "#111111"
//! text_muted = "#666666"         # Post info line, captions
//! border = "#e0e0e0"
//! link = "#333333"
//! link_hover = "#000000"
//!
//! [colors.dark]
//! background = "#0a0a0a"
//! text = "#eeeeee"
//! text_muted = "#999999"
//! border = "#333333"
//! link = "#cccccc"
//! link_hover = "#ffffff"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::post::{NormalizeOptions, Strictness};
use crate::reading_time::{DEFAULT_WORDS_PER_MINUTE, ReadingOptions, WordSplitting};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Content service connection.
    pub cms: CmsConfig,
    /// Static generation: revalidation window and fallback placeholder.
    pub generation: GenerationConfig,
    /// Normalization and reading-time policy.
    pub content: ContentConfig,
    /// HTTP server settings for `serve`.
    pub server: ServerConfig,
    /// Log filter and output format.
    pub logging: LoggingConfig,
    /// Color schemes for light and dark modes.
    pub colors: ColorConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cms.paths_page_size == 0 {
            return Err(ConfigError::Validation(
                "cms.paths_page_size must be at least 1".into(),
            ));
        }
        if self.cms.document_type.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cms.document_type must not be empty".into(),
            ));
        }
        if self.generation.revalidate_secs == 0 {
            return Err(ConfigError::Validation(
                "generation.revalidate_secs must be at least 1".into(),
            ));
        }
        if self.generation.max_negative_pages == 0 {
            return Err(ConfigError::Validation(
                "generation.max_negative_pages must be at least 1".into(),
            ));
        }
        if self.content.words_per_minute == 0 {
            return Err(ConfigError::Validation(
                "content.words_per_minute must be at least 1".into(),
            ));
        }
        self.content.timezone()?;
        self.logging.level_filter()?;
        Ok(())
    }

    pub fn revalidate(&self) -> Duration {
        Duration::from_secs(self.generation.revalidate_secs)
    }

    pub fn normalize_options(&self) -> Result<NormalizeOptions, ConfigError> {
        Ok(NormalizeOptions {
            strictness: self.content.strictness,
            timezone: self.content.timezone()?,
        })
    }

    pub fn reading_options(&self) -> ReadingOptions {
        ReadingOptions {
            splitting: self.content.word_splitting,
            words_per_minute: self.content.words_per_minute,
        }
    }
}

/// Content service connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CmsConfig {
    /// API root of the content repository. Empty means "not configured".
    pub endpoint: String,
    /// Access token for private repositories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Document type holding posts.
    pub document_type: String,
    /// Number of posts enumerated (and pre-generated) at build time.
    pub paths_page_size: u32,
    /// Retries for transient HTTP failures (exponential backoff).
    pub max_retries: u32,
}

impl Default for CmsConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            access_token: None,
            document_type: "post".to_string(),
            paths_page_size: 2,
            max_retries: 3,
        }
    }
}

/// Static generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Minimum age in seconds before a generated page is regenerated.
    pub revalidate_secs: u64,
    /// Text of the placeholder shown while an on-demand page is generated.
    pub fallback_text: String,
    /// Most slugs remembered as missing or failed at once. The oldest are
    /// forgotten first.
    pub max_negative_pages: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            revalidate_secs: 60 * 30,
            fallback_text: "Carregando...".to_string(),
            max_negative_pages: 1024,
        }
    }
}

/// Normalization and reading-time settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentConfig {
    /// `lenient` keeps going on absent fields, `strict` fails fast.
    pub strictness: Strictness,
    /// `whitespace` ignores empty tokens, `literal` counts them.
    pub word_splitting: WordSplitting,
    /// Assumed reading speed.
    pub words_per_minute: u32,
    /// IANA time zone used to format publication dates.
    pub timezone: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            strictness: Strictness::Lenient,
            word_splitting: WordSplitting::Whitespace,
            words_per_minute: DEFAULT_WORDS_PER_MINUTE,
            timezone: "America/Sao_Paulo".to_string(),
        }
    }
}

impl ContentConfig {
    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigError::Validation(format!(
                "content.timezone: unknown time zone '{}'",
                self.timezone
            ))
        })
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Logging settings. `RUST_LOG` takes precedence over `level`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level.parse::<LevelFilter>().map_err(|_| {
            ConfigError::Validation(format!("logging.level: unknown level '{}'", self.level))
        })
    }
}

/// Color configuration for light and dark modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorConfig {
    /// Light mode color scheme.
    pub light: ColorScheme,
    /// Dark mode color scheme.
    pub dark: ColorScheme,
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            light: ColorScheme::default_light(),
            dark: ColorScheme::default_dark(),
        }
    }
}

/// Individual color scheme (light or dark).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ColorScheme {
    /// Background color.
    pub background: String,
    /// Primary text color.
    pub text: String,
    /// Muted/secondary text color (post info line, captions).
    pub text_muted: String,
    /// Border color.
    pub border: String,
    /// Link color.
    pub link: String,
    /// Link hover color.
    pub link_hover: String,
}

impl ColorScheme {
    pub fn default_light() -> Self {
        Self {
            background: "#ffffff".to_string(),
            text: "#111111".to_string(),
            text_muted: "#666666".to_string(),
            border: "#e0e0e0".to_string(),
            link: "#333333".to_string(),
            link_hover: "#000000".to_string(),
        }
    }

    pub fn default_dark() -> Self {
        Self {
            background: "#0a0a0a".to_string(),
            text: "#eeeeee".to_string(),
            text_muted: "#999999".to_string(),
            border: "#333333".to_string(),
            link: "#cccccc".to_string(),
            link_hover: "#ffffff".to_string(),
        }
    }
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self::default_light()
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default())
        .unwrap_or_else(|_| toml::Value::Table(toml::map::Map::new()))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from the given file.
///
/// A missing file yields the stock defaults. User values are merged on top
/// of stock defaults, unknown keys are rejected, and the result is validated.
pub fn load_config(path: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# post-render configuration
# =========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Content service
# ---------------------------------------------------------------------------
[cms]
# API root of the content repository, e.g.
# "https://your-repo.cdn.prismic.io/api/v2". Leave empty and pass
# --documents <dir> to build from local JSON documents instead.
endpoint = ""

# Access token for private repositories.
# access_token = ""

# Document type that holds blog posts.
document_type = "post"

# How many posts are enumerated and pre-generated by `build`/`serve`.
# Other posts are generated on demand the first time they are requested.
paths_page_size = 2

# Retries (with exponential backoff) for transient HTTP failures.
max_retries = 3

# ---------------------------------------------------------------------------
# Static generation
# ---------------------------------------------------------------------------
[generation]
# A generated page is regenerated in the background at most this often.
revalidate_secs = 1800

# Placeholder text shown while an on-demand page is being generated.
fallback_text = "Carregando..."

# Slugs that turned out missing (404) or failed to generate (500) are
# remembered until they are rechecked after revalidate_secs. At most this
# many are kept; the oldest are forgotten first.
max_negative_pages = 1024

# ---------------------------------------------------------------------------
# Content handling
# ---------------------------------------------------------------------------
[content]
# "lenient": absent title/author/banner/headings render as empty values.
# "strict": absent fields, invalid dates and duplicate headings are errors.
strictness = "lenient"

# "whitespace": words are separated by any whitespace, empty tokens ignored.
# "literal": split on single spaces and count empty tokens (legacy counting).
word_splitting = "whitespace"

# Assumed reading speed for the "N min" estimate.
words_per_minute = 200

# Time zone used to format publication dates (IANA name).
timezone = "America/Sao_Paulo"

# ---------------------------------------------------------------------------
# HTTP server (`serve`)
# ---------------------------------------------------------------------------
[server]
bind = "127.0.0.1:3000"

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# error | warn | info | debug | trace. RUST_LOG overrides this.
level = "info"
# "compact" for humans, "json" for log collectors.
format = "compact"

# ---------------------------------------------------------------------------
# Colors - Light mode (prefers-color-scheme: light)
# ---------------------------------------------------------------------------
[colors.light]
background = "#ffffff"
text = "#111111"
text_muted = "#666666"
border = "#e0e0e0"
link = "#333333"
link_hover = "#000000"

# ---------------------------------------------------------------------------
# Colors - Dark mode (prefers-color-scheme: dark)
# ---------------------------------------------------------------------------
[colors.dark]
background = "#0a0a0a"
text = "#eeeeee"
text_muted = "#999999"
border = "#333333"
link = "#cccccc"
link_hover = "#ffffff"
"##
}

/// Generate CSS custom properties from color config.
pub fn generate_color_css(colors: &ColorConfig) -> String {
    format!(
        r#":root {{
    --color-bg: {light_bg};
    --color-text: {light_text};
    --color-text-muted: {light_text_muted};
    --color-border: {light_border};
    --color-link: {light_link};
    --color-link-hover: {light_link_hover};
}}

@media (prefers-color-scheme: dark) {{
    :root {{
        --color-bg: {dark_bg};
        --color-text: {dark_text};
        --color-text-muted: {dark_text_muted};
        --color-border: {dark_border};
        --color-link: {dark_link};
        --color-link-hover: {dark_link_hover};
    }}
}}"#,
        light_bg = colors.light.background,
        light_text = colors.light.text,
        light_text_muted = colors.light.text_muted,
        light_border = colors.light.border,
        light_link = colors.light.link,
        light_link_hover = colors.light.link_hover,
        dark_bg = colors.dark.background,
        dark_text = colors.dark.text,
        dark_text_muted = colors.dark.text_muted,
        dark_border = colors.dark.border,
        dark_link = colors.dark.link,
        dark_link_hover = colors.dark.link_hover,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_generation_contract() {
        let config = SiteConfig::default();
        assert_eq!(config.generation.revalidate_secs, 1800);
        assert_eq!(config.revalidate(), Duration::from_secs(1800));
        assert_eq!(config.cms.document_type, "post");
        assert_eq!(config.cms.paths_page_size, 2);
        assert_eq!(config.generation.fallback_text, "Carregando...");
    }

    #[test]
    fn default_config_content_policy() {
        let config = SiteConfig::default();
        assert_eq!(config.content.strictness, Strictness::Lenient);
        assert_eq!(config.content.word_splitting, WordSplitting::Whitespace);
        assert_eq!(config.reading_options(), ReadingOptions::default());
        assert_eq!(
            config.normalize_options().unwrap().timezone,
            chrono_tz::America::Sao_Paulo
        );
    }

    #[test]
    fn default_config_is_valid() {
        SiteConfig::default().validate().unwrap();
    }

    #[test]
    fn parse_partial_config() {
        let toml = r##"
[content]
strictness = "strict"
word_splitting = "literal"

[colors.light]
background = "#fafafa"
"##;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.content.strictness, Strictness::Strict);
        assert_eq!(config.content.word_splitting, WordSplitting::Literal);
        assert_eq!(config.colors.light.background, "#fafafa");
        // Default values preserved
        assert_eq!(config.content.words_per_minute, 200);
        assert_eq!(config.colors.light.text, "#111111");
        assert_eq!(config.cms.max_retries, 3);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let toml = r#"
[generation]
revalidate = 60
"#;
        assert!(toml::from_str::<SiteConfig>(toml).is_err());
    }

    #[test]
    fn validation_rejects_zero_reading_speed() {
        let mut config = SiteConfig::default();
        config.content.words_per_minute = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_zero_revalidate() {
        let mut config = SiteConfig::default();
        config.generation.revalidate_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_zero_negative_cap() {
        let mut config = SiteConfig::default();
        config.generation.max_negative_pages = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_unknown_timezone() {
        let mut config = SiteConfig::default();
        config.content.timezone = "Mars/Olympus_Mons".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_unknown_log_level() {
        let mut config = SiteConfig::default();
        config.logging.level = "loud".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validation_rejects_zero_page_size() {
        let mut config = SiteConfig::default();
        config.cms.paths_page_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn merge_toml_overlays_nested_tables() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n[b]\nz = 4\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
        assert_eq!(merged["b"]["z"].as_integer(), Some(4));
    }

    // =========================================================================
    // load_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config.generation.revalidate_secs, 1800);
        assert_eq!(config.colors.dark.background, "#0a0a0a");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"
[cms]
endpoint = "https://blog.cdn.prismic.io/api/v2"
paths_page_size = 10

[generation]
revalidate_secs = 60
"#,
        )
        .unwrap();

        let config = load_config(&config_path).unwrap();
        assert_eq!(config.cms.endpoint, "https://blog.cdn.prismic.io/api/v2");
        assert_eq!(config.cms.paths_page_size, 10);
        assert_eq!(config.generation.revalidate_secs, 60);
        // Unspecified values should be defaults
        assert_eq!(config.cms.document_type, "post");
        assert_eq!(config.generation.fallback_text, "Carregando...");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "this is not valid toml [[[").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn load_config_validates_after_merge() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(&config_path, "[content]\nwords_per_minute = 0\n").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: SiteConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = SiteConfig::default();
        assert_eq!(config.cms.paths_page_size, defaults.cms.paths_page_size);
        assert_eq!(config.generation.revalidate_secs, defaults.generation.revalidate_secs);
        assert_eq!(config.content.timezone, defaults.content.timezone);
        assert_eq!(config.colors.dark.link, defaults.colors.dark.link);
    }

    // =========================================================================
    // CSS generation tests
    // =========================================================================

    #[test]
    fn generate_css_uses_config_colors() {
        let mut colors = ColorConfig::default();
        colors.light.background = "#f0f0f0".to_string();
        colors.dark.background = "#1a1a1a".to_string();

        let css = generate_color_css(&colors);
        assert!(css.contains("--color-bg: #f0f0f0"));
        assert!(css.contains("--color-bg: #1a1a1a"));
    }

    #[test]
    fn generate_css_includes_dark_mode_media_query() {
        let css = generate_color_css(&ColorConfig::default());
        assert!(css.contains("@media (prefers-color-scheme: dark)"));
    }
}
