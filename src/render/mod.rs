//! Word-cloud rendering.
//!
//! The pipeline only sees `Renderer`: a frequency map goes in, opaque image
//! bytes come out. `SvgRenderer` is the built-in implementation.

use crate::analysis::WordFrequencyMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

pub trait Renderer: Send + Sync {
    fn content_type(&self) -> &'static str;

    fn file_extension(&self) -> &'static str;

    fn render(&self, freq: &WordFrequencyMap) -> anyhow::Result<Vec<u8>>;
}

/// Viridis, dark to light.
const PALETTE: &[&str] = &[
    "#440154", "#482878", "#3e4989", "#31688e", "#26828e", "#1f9e89", "#35b779", "#6ece58",
    "#b5de2b",
];

/// Spiral positions tried per word before giving up on it.
const MAX_SPIRAL_STEPS: usize = 2000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub width: u32,
    pub height: u32,
    pub max_words: usize,
    pub min_font_size: f64,
    pub max_font_size: f64,
    /// Share of words laid out horizontally (0.0 - 1.0).
    pub prefer_horizontal: f64,
    pub background: String,
    pub seed: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 800,
            max_words: 200,
            min_font_size: 10.0,
            max_font_size: 120.0,
            prefer_horizontal: 0.9,
            background: "white".to_string(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
}

impl Rect {
    fn centered(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self {
            x0: cx - w / 2.0,
            y0: cy - h / 2.0,
            x1: cx + w / 2.0,
            y1: cy + h / 2.0,
        }
    }

    fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }

    fn inside(&self, width: f64, height: f64) -> bool {
        self.x0 >= 0.0 && self.y0 >= 0.0 && self.x1 <= width && self.y1 <= height
    }
}

#[derive(Debug)]
struct Placed<'a> {
    word: &'a str,
    x: f64,
    y: f64,
    size: f64,
    vertical: bool,
    color: &'static str,
}

#[derive(Debug, Clone, Default)]
pub struct SvgRenderer {
    config: RenderConfig,
}

impl SvgRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    fn layout<'a>(&self, freq: &'a WordFrequencyMap) -> Vec<Placed<'a>> {
        let cfg = &self.config;
        let (width, height) = (f64::from(cfg.width), f64::from(cfg.height));
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let words = freq.top(cfg.max_words);
        let Some(&(_, max_count)) = words.first() else {
            return Vec::new();
        };

        let mut boxes: Vec<Rect> = Vec::with_capacity(words.len());
        let mut placed = Vec::with_capacity(words.len());
        let aspect = width / height.max(1.0);

        for (word, count) in words {
            let weight = count as f64 / max_count as f64;
            let size = cfg.min_font_size + (cfg.max_font_size - cfg.min_font_size) * weight;
            let vertical = rng.random::<f64>() >= cfg.prefer_horizontal;
            let color = PALETTE[rng.random_range(0..PALETTE.len())];

            // Rough glyph box: 0.6em per character.
            let (mut w, mut h) = (size * 0.6 * word.chars().count() as f64, size);
            if vertical {
                std::mem::swap(&mut w, &mut h);
            }

            let phase = rng.random::<f64>() * std::f64::consts::TAU;
            let spot = (0..MAX_SPIRAL_STEPS).find_map(|step| {
                let t = step as f64 * 0.1;
                let cx = width / 2.0 + aspect * 2.0 * t * (t + phase).cos();
                let cy = height / 2.0 + 2.0 * t * (t + phase).sin();
                let rect = Rect::centered(cx, cy, w, h);
                let free = rect.inside(width, height) && !boxes.iter().any(|b| b.intersects(&rect));
                free.then_some((cx, cy, rect))
            });

            match spot {
                Some((x, y, rect)) => {
                    boxes.push(rect);
                    placed.push(Placed {
                        word,
                        x,
                        y,
                        size,
                        vertical,
                        color,
                    });
                }
                None => tracing::debug!(word, "no room left in word cloud"),
            }
        }
        placed
    }
}

impl Renderer for SvgRenderer {
    fn content_type(&self) -> &'static str {
        "image/svg+xml"
    }

    fn file_extension(&self) -> &'static str {
        "svg"
    }

    fn render(&self, freq: &WordFrequencyMap) -> anyhow::Result<Vec<u8>> {
        let cfg = &self.config;
        let placed = self.layout(freq);

        let mut svg = String::new();
        writeln!(
            svg,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = cfg.width,
            h = cfg.height
        )?;
        writeln!(
            svg,
            r#"<rect width="100%" height="100%" fill="{}"/>"#,
            escape_xml(&cfg.background)
        )?;
        for p in &placed {
            let rotate = if p.vertical {
                format!(r#" transform="rotate(-90 {:.1} {:.1})""#, p.x, p.y)
            } else {
                String::new()
            };
            writeln!(
                svg,
                r#"<text x="{:.1}" y="{:.1}" font-family="sans-serif" font-size="{:.1}" fill="{}" text-anchor="middle" dominant-baseline="central"{}>{}</text>"#,
                p.x,
                p.y,
                p.size,
                p.color,
                rotate,
                escape_xml(p.word)
            )?;
        }
        svg.push_str("</svg>\n");

        tracing::debug!(words = placed.len(), "rendered word cloud");
        Ok(svg.into_bytes())
    }
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
