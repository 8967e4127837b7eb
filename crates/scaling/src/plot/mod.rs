//! Diagnostic figure comparing a clamping range with measured quantile ranges.
//!
//! The figure has two rows. The upper `clamp` row shows the clamping range
//! (and the scaling mean when there is one). The lower `quantile` row stacks
//! the 1, 2 and 3 sigma ranges around the median. Numeric summaries and the
//! names of raised suspicion flags are printed in the upper left corner.

mod canvas;
mod png;

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use resvg::usvg;
use serde::Serialize;

use crate::records::{QuantileParams, SigmaRange};

pub use canvas::{Anchor, Canvas, Color, LineStyle, Style, TextStyle};
pub use png::{svg_to_png, system_font_options};

/// Figure size in pixels (10.3 x 5 inches at 100 dpi).
const FIG_WIDTH: f64 = 1030.0;
const FIG_HEIGHT: f64 = 500.0;

const MARGIN_LEFT: f64 = 100.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 45.0;
const MARGIN_BOTTOM: f64 = 55.0;

/// Interquantile widths of a normal distribution, as printed in the legend.
const IQW_LABELS: [&str; 3] = [
    "1 sigma (IQW=0.68)",
    "2 sigma (IQW=0.95)",
    "3 sigma (IQW=0.997)",
];
const SIGMA_ALPHAS: [f64; 3] = [0.45, 0.3, 0.15];
const CLAMP_ALPHA: f64 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("{range} range is not ordered: left={left}, right={right}")]
    InvalidRange {
        range: &'static str,
        left: f64,
        right: f64,
    },

    #[error("{0} is not finite")]
    NonFinite(&'static str),

    #[error("Failed to parse generated SVG: {0}")]
    Svg(String),

    #[error("Failed to rasterize plot: {0}")]
    Raster(String),

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Figure geometry in data coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotLayout {
    pub level_quantile: f64,
    pub level_clamp: f64,
    pub bar_height: f64,
    pub xlim: (f64, f64),
    pub ylim: (f64, f64),
}

impl PlotLayout {
    pub fn x_span(&self) -> f64 {
        self.xlim.1 - self.xlim.0
    }

    pub fn y_span(&self) -> f64 {
        self.ylim.1 - self.ylim.0
    }

    /// Anchor of an annotation placed `depth` (as a fraction of the y span)
    /// below the top edge, 5% in from the left edge.
    pub fn annotation_anchor(&self, depth: f64) -> (f64, f64) {
        (
            self.xlim.0 + 0.05 * self.x_span(),
            self.ylim.1 - depth * self.y_span(),
        )
    }
}

/// Everything drawn in one diagnostic figure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RangePlot {
    pub file_id: String,
    pub var_name: String,
    pub cone_type: String,
    /// Absent for linearly scaled variables.
    pub mean: Option<f64>,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub clamp: SigmaRange,
    pub one_sigma: SigmaRange,
    pub two_sigma: SigmaRange,
    pub three_sigma: SigmaRange,
    /// Names of the raised suspicion flags.
    pub flags: Vec<String>,
}

fn check_finite(value: f64, what: &'static str) -> Result<(), PlotError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlotError::NonFinite(what))
    }
}

fn check_ordered(range: &SigmaRange, name: &'static str) -> Result<(), PlotError> {
    match range.left.partial_cmp(&range.right) {
        Some(Ordering::Less | Ordering::Equal) => Ok(()),
        _ => Err(PlotError::InvalidRange {
            range: name,
            left: range.left,
            right: range.right,
        }),
    }
}

impl RangePlot {
    pub fn new(
        var_name: &str,
        cone_type: &str,
        file_id: &str,
        mean: Option<f64>,
        clamp: SigmaRange,
        quantiles: &QuantileParams,
    ) -> Result<Self, PlotError> {
        check_finite(clamp.left, "clamp range left edge")?;
        check_finite(clamp.right, "clamp range right edge")?;
        if let Some(mean) = mean {
            check_finite(mean, "mean")?;
        }
        check_finite(quantiles.median, "median")?;
        for (range, name) in [
            (&quantiles.one_sigma, "1 sigma"),
            (&quantiles.two_sigma, "2 sigma"),
            (&quantiles.three_sigma, "3 sigma"),
        ] {
            check_finite(range.left, name)?;
            check_finite(range.right, name)?;
        }

        check_ordered(&clamp, "clamp")?;
        check_ordered(&quantiles.one_sigma, "1 sigma")?;
        check_ordered(&quantiles.two_sigma, "2 sigma")?;
        check_ordered(&quantiles.three_sigma, "3 sigma")?;

        Ok(Self {
            file_id: file_id.to_string(),
            var_name: var_name.to_string(),
            cone_type: cone_type.to_string(),
            mean,
            median: quantiles.median,
            min: quantiles.min,
            max: quantiles.max,
            clamp,
            one_sigma: quantiles.one_sigma,
            two_sigma: quantiles.two_sigma,
            three_sigma: quantiles.three_sigma,
            flags: Vec::new(),
        })
    }

    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// `{var_name}_{cone_type}.png`
    pub fn file_name(&self) -> String {
        format!("{}_{}.png", self.var_name, self.cone_type)
    }

    pub fn title(&self) -> String {
        format!("{}, {} [fid: {}]", self.var_name, self.cone_type, self.file_id)
    }

    pub fn layout(&self) -> PlotLayout {
        let width = self.clamp.width();
        let xscale = if width > 0.0 { width } else { 1.0 };
        let yscale = 1.0;
        let level_quantile = 0.0;
        let level_clamp = level_quantile + 3.0 * yscale;
        PlotLayout {
            level_quantile,
            level_clamp,
            bar_height: 1.5 * yscale,
            xlim: (self.clamp.left - 0.5 * xscale, self.clamp.right + 0.5 * xscale),
            ylim: (level_quantile - 2.0 * yscale, level_clamp + 13.0 * yscale),
        }
    }

    /// Annotation text blocks as `(depth below top, color, lines)`.
    pub fn annotations(&self) -> Vec<(f64, Color, Vec<String>)> {
        let mut blocks = Vec::new();
        if let Some(mean) = self.mean {
            blocks.push((0.15, Color::BLACK, vec![format!("mean: {}", sci(mean, 1))]));
        }
        blocks.push((
            0.3,
            Color::BLACK,
            vec![
                format!("median: {}", sci(self.median, 1)),
                format!("min, max: ({}, {})", sci(self.min, 1), sci(self.max, 1)),
            ],
        ));
        if !self.flags.is_empty() {
            blocks.push((0.55, Color::LIGHTCORAL, self.flags.clone()));
        }
        blocks
    }

    pub fn to_svg(&self) -> String {
        let layout = self.layout();
        let frame = Frame::new(layout);
        let mut c = Canvas::new(FIG_WIDTH, FIG_HEIGHT);

        let half_bar = layout.bar_height / 2.0;
        let dotted = LineStyle::dotted(Color::BLACK, 1.5).with_opacity(0.15);

        c.push_clip(frame.left, frame.top, frame.width(), frame.height());

        // clamp row
        if let Some(mean) = self.mean {
            frame.vline(&mut c, mean, layout.level_clamp, 1.1, Color::STEELBLUE);
        }
        frame.hbar(
            &mut c,
            &self.clamp,
            layout.level_clamp,
            half_bar,
            &Style::filled(Color::TAB_BLUE).with_opacity(CLAMP_ALPHA),
        );
        frame.hline(&mut c, layout.level_clamp, &dotted);

        // quantile row
        frame.vline(&mut c, self.median, layout.level_quantile, 1.1, Color::BLACK);
        frame.hline(&mut c, layout.level_quantile, &dotted);
        for (range, alpha) in [&self.one_sigma, &self.two_sigma, &self.three_sigma]
            .into_iter()
            .zip(SIGMA_ALPHAS)
        {
            frame.hbar(
                &mut c,
                range,
                layout.level_quantile,
                half_bar,
                &Style::filled(Color::BLACK).with_opacity(alpha),
            );
        }

        let text_size = 15.0;
        for (depth, color, lines) in self.annotations() {
            let (x, y) = layout.annotation_anchor(depth);
            let style = TextStyle::sized(text_size).with_color(color);
            for (i, line) in lines.iter().enumerate() {
                c.text(
                    frame.px(x),
                    frame.py(y) + i as f64 * 1.2 * text_size,
                    line,
                    &style,
                );
            }
        }

        c.pop_clip();

        frame.draw_axes(&mut c);
        c.text(
            frame.ytick_label_x(),
            frame.py(layout.level_clamp) + 5.0,
            "clamp",
            &TextStyle::sized(15.0).with_anchor(Anchor::End),
        );
        c.text(
            frame.ytick_label_x(),
            frame.py(layout.level_quantile) + 5.0,
            "quantile",
            &TextStyle::sized(15.0).with_anchor(Anchor::End),
        );
        c.text(
            frame.left + frame.width() / 2.0,
            MARGIN_TOP - 14.0,
            &self.title(),
            &TextStyle::sized(18.0).with_anchor(Anchor::Middle),
        );
        self.draw_legend(&mut c, &frame);

        c.finish_svg()
    }

    fn draw_legend(&self, c: &mut Canvas, frame: &Frame) {
        enum Handle {
            Line(Color),
            Patch(Color, f64),
        }

        let mut entries: Vec<(Handle, &str)> = Vec::new();
        if self.mean.is_some() {
            entries.push((Handle::Line(Color::STEELBLUE), "mean"));
        }
        entries.push((Handle::Patch(Color::TAB_BLUE, CLAMP_ALPHA), "clamping range"));
        entries.push((Handle::Line(Color::BLACK), "median"));
        for (label, alpha) in IQW_LABELS.into_iter().zip(SIGMA_ALPHAS) {
            entries.push((Handle::Patch(Color::BLACK, alpha), label));
        }

        let row = 22.0;
        let box_w = 230.0;
        let box_h = row * entries.len() as f64 + 10.0;
        let x0 = frame.right - box_w - 10.0;
        let y0 = frame.top + 10.0;
        c.rect(
            x0,
            y0,
            box_w,
            box_h,
            &Style {
                fill: Some(Color::WHITE),
                stroke: Some(Color::GRID),
                stroke_width: 1.0,
                opacity: 0.8,
            },
        );
        for (i, (handle, label)) in entries.iter().enumerate() {
            let y = y0 + 5.0 + row * (i as f64 + 0.5);
            match handle {
                Handle::Line(color) => {
                    c.line(x0 + 10.0, y, x0 + 40.0, y, &LineStyle::solid(*color, 2.5));
                }
                Handle::Patch(color, alpha) => {
                    c.rect(
                        x0 + 10.0,
                        y - 6.0,
                        30.0,
                        12.0,
                        &Style::filled(*color).with_opacity(*alpha),
                    );
                }
            }
            c.text(x0 + 50.0, y + 5.0, label, &TextStyle::sized(14.0));
        }
    }

    /// Rasterize to `dir/{var_name}_{cone_type}.png` using the system fonts.
    pub fn save_png(&self, dir: &Path) -> Result<PathBuf, PlotError> {
        PngPlotter::new().plot(self, dir)
    }
}

/// Maps data coordinates into the axes rectangle.
struct Frame {
    layout: PlotLayout,
    left: f64,
    right: f64,
    top: f64,
    bottom: f64,
}

impl Frame {
    fn new(layout: PlotLayout) -> Self {
        Self {
            layout,
            left: MARGIN_LEFT,
            right: FIG_WIDTH - MARGIN_RIGHT,
            top: MARGIN_TOP,
            bottom: FIG_HEIGHT - MARGIN_BOTTOM,
        }
    }

    fn width(&self) -> f64 {
        self.right - self.left
    }

    fn height(&self) -> f64 {
        self.bottom - self.top
    }

    fn px(&self, x: f64) -> f64 {
        self.left + (x - self.layout.xlim.0) / self.layout.x_span() * self.width()
    }

    fn py(&self, y: f64) -> f64 {
        self.bottom - (y - self.layout.ylim.0) / self.layout.y_span() * self.height()
    }

    fn ytick_label_x(&self) -> f64 {
        self.left - 10.0
    }

    fn vline(&self, c: &mut Canvas, x: f64, level: f64, half_height: f64, color: Color) {
        let px = self.px(x);
        c.line(
            px,
            self.py(level - half_height),
            px,
            self.py(level + half_height),
            &LineStyle::solid(color, 2.5),
        );
    }

    fn hline(&self, c: &mut Canvas, level: f64, style: &LineStyle) {
        let py = self.py(level);
        c.line(self.left, py, self.right, py, style);
    }

    fn hbar(&self, c: &mut Canvas, range: &SigmaRange, level: f64, half: f64, style: &Style) {
        let x = self.px(range.left);
        let y = self.py(level + half);
        c.rect(x, y, self.px(range.right) - x, self.py(level - half) - y, style);
    }

    fn draw_axes(&self, c: &mut Canvas) {
        c.rect(
            self.left,
            self.top,
            self.width(),
            self.height(),
            &Style::stroked(Color::BLACK, 1.0),
        );

        let tick = LineStyle::solid(Color::BLACK, 1.0);
        let (lo, hi) = self.layout.xlim;
        let step = nice_step(hi - lo, 6);
        for value in ticks(lo, hi, step) {
            let x = self.px(value);
            c.line(x, self.bottom, x, self.bottom + 5.0, &tick);
            c.text(
                x,
                self.bottom + 22.0,
                &tick_label(value, step),
                &TextStyle::sized(14.0).with_anchor(Anchor::Middle),
            );
        }
        for level in [self.layout.level_clamp, self.layout.level_quantile] {
            let y = self.py(level);
            c.line(self.left - 5.0, y, self.left, y, &tick);
        }
    }
}

/// Round `span / target` up to 1, 2 or 5 times a power of ten.
fn nice_step(span: f64, target: usize) -> f64 {
    let raw = span / target as f64;
    let magnitude = 10f64.powf(raw.log10().floor());
    let residual = raw / magnitude;
    let nice = if residual <= 1.0 {
        1.0
    } else if residual <= 2.0 {
        2.0
    } else if residual <= 5.0 {
        5.0
    } else {
        10.0
    };
    nice * magnitude
}

fn ticks(lo: f64, hi: f64, step: f64) -> impl Iterator<Item = f64> {
    let first = (lo / step).ceil() as i64;
    let last = (hi / step).floor() as i64;
    (first..=last).map(move |k| k as f64 * step)
}

fn tick_label(value: f64, step: f64) -> String {
    let value = if value.abs() < step * 1e-9 { 0.0 } else { value };
    if value != 0.0 && (value.abs() >= 1e5 || step < 1e-4) {
        return sci(value, 1);
    }
    let decimals = (-step.log10().floor()).max(0.0) as usize;
    format!("{value:.decimals$}")
}

/// Scientific notation with a signed two-digit exponent (`1.2e+03`, `-5.0e-07`), as printf `%.Ne` writes it.
pub fn sci(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.precision$e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        None => formatted,
    }
}

/// Where the validator sends suspicious ranges to be drawn.
pub trait RangePlotter {
    /// Draw `plot` into `dir` and return the written file.
    fn plot(&self, plot: &RangePlot, dir: &Path) -> Result<PathBuf, PlotError>;
}

/// Renders figures to PNG files.
pub struct PngPlotter {
    options: usvg::Options<'static>,
    scale: f32,
}

impl Default for PngPlotter {
    fn default() -> Self {
        Self::new()
    }
}

impl PngPlotter {
    pub fn new() -> Self {
        Self {
            options: system_font_options(),
            scale: 1.0,
        }
    }

    /// Pixel density multiplier (1.0 = 100 dpi).
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }
}

impl RangePlotter for PngPlotter {
    fn plot(&self, plot: &RangePlot, dir: &Path) -> Result<PathBuf, PlotError> {
        let png = svg_to_png(&plot.to_svg(), &self.options, self.scale)?;
        let path = dir.join(plot.file_name());
        std::fs::write(&path, png).map_err(|source| PlotError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Saved range plot");
        Ok(path)
    }
}
