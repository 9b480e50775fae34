use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use image::Rgb;

/// Where CV content is read from.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentBackend {
    Supabase { url: String, anon_key: String },
    /// A JSON-encoded snapshot on disk.
    File(PathBuf),
}

/// Tunables for the PDF export pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportConfig {
    pub page_width_px: f32,
    pub scale: f32,
    pub ready_timeout: Duration,
    pub grace: Duration,
    pub image_timeout: Duration,
    pub jpeg_quality: u8,
    pub background: Rgb<u8>,
}

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub content: ContentBackend,
    pub font_path: PathBuf,
    pub port: u16,
    pub rust_log: String,
    pub export: ExportConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = match lookup("CV_CONTENT_FILE") {
            Some(path) => ContentBackend::File(PathBuf::from(path)),
            None => ContentBackend::Supabase {
                url: require_env(&lookup, "SUPABASE_URL")?,
                anon_key: require_env(&lookup, "SUPABASE_ANON_KEY")?,
            },
        };

        let jpeg_quality: u8 = parse_or(&lookup, "EXPORT_JPEG_QUALITY", 95)?;
        if !(90..=98).contains(&jpeg_quality) {
            bail!("EXPORT_JPEG_QUALITY must be between 90 and 98, got {jpeg_quality}");
        }
        let scale: f32 = parse_or(&lookup, "EXPORT_SCALE", 3.0)?;
        if !(scale > 0.0 && scale <= 4.0) {
            bail!("EXPORT_SCALE must be in (0, 4], got {scale}");
        }
        let page_width_px: f32 = parse_or(&lookup, "EXPORT_PAGE_WIDTH_PX", 794.0)?;
        if !(page_width_px >= 1.0) {
            bail!("EXPORT_PAGE_WIDTH_PX must be positive, got {page_width_px}");
        }

        Ok(Config {
            content,
            font_path: PathBuf::from(require_env(&lookup, "CV_FONT_PATH")?),
            port: parse_or::<u16>(&lookup, "PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            export: ExportConfig {
                page_width_px,
                scale,
                ready_timeout: millis_or(&lookup, "EXPORT_READY_TIMEOUT_MS", 5000)?,
                grace: millis_or(&lookup, "EXPORT_GRACE_MS", 500)?,
                image_timeout: millis_or(&lookup, "EXPORT_IMAGE_TIMEOUT_MS", 4000)?,
                jpeg_quality,
                background: match lookup("EXPORT_BACKGROUND") {
                    Some(raw) => parse_hex_color(&raw)
                        .with_context(|| format!("EXPORT_BACKGROUND '{raw}' is not a hex colour"))?,
                    None => Rgb([0xff, 0xff, 0xff]),
                },
            },
        })
    }
}

fn require_env(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Environment variable '{key}' has invalid value '{raw}'")),
        None => Ok(default),
    }
}

fn millis_or(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<Duration> {
    parse_or(lookup, key, default).map(Duration::from_millis)
}

/// Parses `#rrggbb` or `#rgb`.
pub fn parse_hex_color(raw: &str) -> Result<Rgb<u8>> {
    let hex = raw.trim().trim_start_matches('#');
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid hex digits in '{raw}'");
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).context("invalid hex channel");
    match hex.len() {
        6 => Ok(Rgb([
            channel(&hex[0..2])?,
            channel(&hex[2..4])?,
            channel(&hex[4..6])?,
        ])),
        3 => {
            let expand = |i: usize| channel(&hex[i..=i].repeat(2));
            Ok(Rgb([expand(0)?, expand(1)?, expand(2)?]))
        }
        n => bail!("expected 3 or 6 hex digits, got {n}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const SUPABASE: [(&str, &str); 3] = [
        ("SUPABASE_URL", "https://project.supabase.co"),
        ("SUPABASE_ANON_KEY", "anon"),
        ("CV_FONT_PATH", "/fonts/Inter.ttf"),
    ];

    #[test]
    fn test_defaults() {
        let config = config(&SUPABASE).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.export.page_width_px, 794.0);
        assert_eq!(config.export.scale, 3.0);
        assert_eq!(config.export.ready_timeout, Duration::from_millis(5000));
        assert_eq!(config.export.grace, Duration::from_millis(500));
        assert_eq!(config.export.image_timeout, Duration::from_millis(4000));
        assert_eq!(config.export.jpeg_quality, 95);
        assert_eq!(config.export.background, Rgb([255, 255, 255]));
        assert!(matches!(config.content, ContentBackend::Supabase { .. }));
    }

    #[test]
    fn test_content_file_replaces_supabase() {
        let config = config(&[
            ("CV_CONTENT_FILE", "/data/cv.json"),
            ("CV_FONT_PATH", "/fonts/Inter.ttf"),
        ])
        .unwrap();
        assert_eq!(
            config.content,
            ContentBackend::File(PathBuf::from("/data/cv.json"))
        );
    }

    #[test]
    fn test_missing_font_is_error() {
        let err = config(&SUPABASE[..2]).unwrap_err();
        assert!(err.to_string().contains("CV_FONT_PATH"));
    }

    #[test]
    fn test_jpeg_quality_out_of_range_is_rejected() {
        let mut vars = SUPABASE.to_vec();
        vars.push(("EXPORT_JPEG_QUALITY", "80"));
        assert!(config(&vars).is_err());
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let mut vars = SUPABASE.to_vec();
        vars.push(("EXPORT_GRACE_MS", "soon"));
        assert!(config(&vars).is_err());
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(parse_hex_color("#ffffff").unwrap(), Rgb([255, 255, 255]));
        assert_eq!(parse_hex_color("1a1a1a").unwrap(), Rgb([0x1a, 0x1a, 0x1a]));
        assert_eq!(parse_hex_color("#fa0").unwrap(), Rgb([0xff, 0xaa, 0x00]));
        assert!(parse_hex_color("#ggg").is_err());
        assert!(parse_hex_color("#ffff").is_err());
    }
}
