//! CAPTCHA image rendering.
//!
//! Produces a noisy SVG of the answer text, shipped as a base64 data URI.

use base64::{Engine, engine::general_purpose::STANDARD};
use rand::Rng;
use std::path::Path;

use surelink_common::{Result, SurelinkError};

/// Turns answer text into a challenge image
pub trait CaptchaRenderer: Send + Sync {
    /// Render `text`, returning a data URI
    fn render(&self, text: &str) -> Result<String>;
}

/// SVG renderer using the configured font asset's family
pub struct SvgRenderer {
    font_family: String,
    width: u32,
    height: u32,
    noise_lines: u32,
}

impl SvgRenderer {
    pub fn new(font_family: impl Into<String>) -> Self {
        Self {
            font_family: font_family.into(),
            width: 200,
            height: 80,
            noise_lines: 15,
        }
    }

    /// Resolve the font asset. Its absence is a startup error.
    pub fn from_font_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(SurelinkError::Config(format!(
                "font asset not found: {}",
                path.display()
            )));
        }

        let family = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .ok_or_else(|| SurelinkError::Config(format!("bad font path: {}", path.display())))?;

        Ok(Self::new(family))
    }

    fn build_svg(&self, text: &str, rng: &mut impl Rng) -> String {
        let (width, height) = (self.width, self.height);

        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}">"#,
            width, height
        );

        // Background
        svg.push_str(r##"<rect width="100%" height="100%" fill="#1a1a2e"/>"##);

        // Noise lines
        for _ in 0..self.noise_lines {
            let x1 = rng.random_range(0..width);
            let y1 = rng.random_range(0..height);
            let x2 = rng.random_range(0..width);
            let y2 = rng.random_range(0..height);
            let opacity = rng.random_range(20..50);
            svg.push_str(&format!(
                r#"<line x1="{}" y1="{}" x2="{}" y2="{}" stroke="rgba(255,255,255,0.{})" stroke-width="1"/>"#,
                x1, y1, x2, y2, opacity
            ));
        }

        // Text characters
        let char_width = width as f32 / (text.chars().count() as f32 + 1.0);
        for (i, c) in text.chars().enumerate() {
            let x = char_width * (i as f32 + 0.8);
            let y = 50 + rng.random_range(-10..10);
            let rotation = rng.random_range(-15..15);
            let color = format!(
                "rgb({},{},{})",
                rng.random_range(150..255),
                rng.random_range(150..255),
                rng.random_range(150..255)
            );

            svg.push_str(&format!(
                r#"<text x="{}" y="{}" font-family="{}, monospace" font-size="32" font-weight="bold" fill="{}" transform="rotate({} {} {})">{}</text>"#,
                x, y, self.font_family, color, rotation, x, y, c
            ));
        }

        svg.push_str("</svg>");
        svg
    }
}

impl CaptchaRenderer for SvgRenderer {
    fn render(&self, text: &str) -> Result<String> {
        if text.is_empty() {
            return Err(SurelinkError::Render("empty captcha text".to_string()));
        }

        let svg = self.build_svg(text, &mut rand::rng());
        Ok(format!("data:image/svg+xml;base64,{}", STANDARD.encode(&svg)))
    }
}
