//! Scatter plot rendering.
//!
//! Plots are drawn with `plotters` into an in-memory RGB buffer and written
//! out with the `png` encoder. The figure has a fixed size in inches, so the
//! DPI passed to [`Renderable::render_png`] sets the pixel size and with it
//! the encoded byte size.

use crate::analysis::{linspace, min_max, LinearFit};
use crate::error::RenderError;
use plotters::prelude::*;

/// Figure size in inches (width, height).
const FIGURE_INCHES: (f64, f64) = (6.4, 4.8);

/// Samples along the regression line.
const FIT_SAMPLES: usize = 100;

const POINT_COLOR: RGBColor = RGBColor(31, 119, 180);
const FIT_COLOR: RGBColor = RED;

/// Something that can be rasterized to PNG at a given DPI.
pub trait Renderable {
    fn render_png(&self, dpi: u32) -> Result<Vec<u8>, RenderError>;

    /// Short name for log lines.
    fn describe(&self) -> String {
        "plot".to_string()
    }
}

/// Scatter of `(x, y)` points with an optional dotted best-fit line.
#[derive(Debug, Clone, Default)]
pub struct ScatterPlot {
    pub points: Vec<(f64, f64)>,
    pub fit: Option<LinearFit>,
    pub x_label: String,
    pub y_label: String,
    pub title: Option<String>,
}

impl ScatterPlot {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            ..Self::default()
        }
    }

    pub fn with_fit(mut self, fit: Option<LinearFit>) -> Self {
        self.fit = fit;
        self
    }

    pub fn with_labels(mut self, x: &str, y: &str) -> Self {
        self.x_label = x.to_string();
        self.y_label = y.to_string();
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Pixel dimensions at `dpi`.
    pub fn pixel_size(dpi: u32) -> (u32, u32) {
        let w = (FIGURE_INCHES.0 * f64::from(dpi)).round() as u32;
        let h = (FIGURE_INCHES.1 * f64::from(dpi)).round() as u32;
        (w, h)
    }

    /// Regression line samples spanning the x extent of the points.
    fn fit_samples(&self) -> Vec<(f64, f64)> {
        let (Some(fit), Some((lo, hi))) = (self.fit, min_max(self.points.iter().map(|p| p.0)))
        else {
            return Vec::new();
        };
        linspace(lo, hi, FIT_SAMPLES)
            .into_iter()
            .map(|x| (x, fit.predict(x)))
            .collect()
    }

    fn axis_ranges(&self, line: &[(f64, f64)]) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
        let all = || self.points.iter().chain(line.iter());
        let x = padded(min_max(all().map(|p| p.0)));
        let y = padded(min_max(all().map(|p| p.1)));
        (x, y)
    }
}

/// Pad a data range by 5% on each side; degenerate ranges get a unit pad.
fn padded(bounds: Option<(f64, f64)>) -> std::ops::Range<f64> {
    match bounds {
        None => 0.0..1.0,
        Some((lo, hi)) if hi - lo <= f64::EPSILON => (lo - 1.0)..(hi + 1.0),
        Some((lo, hi)) => {
            let pad = (hi - lo) * 0.05;
            (lo - pad)..(hi + pad)
        }
    }
}

fn draw_err<E: std::fmt::Display>(e: E) -> RenderError {
    RenderError::Draw(e.to_string())
}

impl Renderable for ScatterPlot {
    fn describe(&self) -> String {
        match &self.title {
            Some(title) => title.clone(),
            None => format!("{} vs {}", self.y_label, self.x_label),
        }
    }

    fn render_png(&self, dpi: u32) -> Result<Vec<u8>, RenderError> {
        let (width, height) = Self::pixel_size(dpi);
        if width < 16 || height < 16 {
            return Err(RenderError::Dimensions(width, height));
        }

        let line = self.fit_samples();
        let (x_range, y_range) = self.axis_ranges(&line);
        let (x0, x1) = (x_range.start, x_range.end);
        let (y0, y1) = (y_range.start, y_range.end);

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(draw_err)?;

            let margin = (width.min(height) / 12).max(4);
            let mut chart = ChartBuilder::on(&root)
                .margin(margin)
                .build_cartesian_2d(x_range, y_range)
                .map_err(draw_err)?;

            chart
                .draw_series(std::iter::once(Rectangle::new(
                    [(x0, y0), (x1, y1)],
                    BLACK.stroke_width(1),
                )))
                .map_err(draw_err)?;

            let radius = (dpi / 30).max(2) as i32;
            chart
                .draw_series(
                    self.points
                        .iter()
                        .map(|&(x, y)| Circle::new((x, y), radius, POINT_COLOR.filled())),
                )
                .map_err(draw_err)?;

            // Evenly spaced dots give the dotted regression line.
            let dot = (dpi / 60).max(1) as i32;
            chart
                .draw_series(
                    line.iter()
                        .map(|&(x, y)| Circle::new((x, y), dot, FIT_COLOR.filled())),
                )
                .map_err(draw_err)?;

            root.present().map_err(draw_err)?;
        }

        encode_png(&buffer, width, height)
    }
}

/// Write an RGB8 buffer as PNG.
fn encode_png(rgb: &[u8], width: u32, height: u32) -> Result<Vec<u8>, RenderError> {
    let encode_err = |e: png::EncodingError| RenderError::Encode(e.to_string());

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        encoder.set_compression(png::Compression::Best);
        let mut writer = encoder.write_header().map_err(encode_err)?;
        writer.write_image_data(rgb).map_err(encode_err)?;
        writer.finish().map_err(encode_err)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::linear_fit;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

    fn sample_plot() -> ScatterPlot {
        let points = vec![(1.0, 2.0), (2.0, 4.1), (3.0, 5.9), (4.0, 8.2)];
        let fit = linear_fit(&points);
        ScatterPlot::new(points)
            .with_fit(fit)
            .with_labels("x", "y")
            .with_title("x vs y")
    }

    #[test]
    fn test_pixel_size_scales_with_dpi() {
        assert_eq!(ScatterPlot::pixel_size(100), (640, 480));
        assert_eq!(ScatterPlot::pixel_size(110), (704, 528));
    }

    #[test]
    fn test_render_produces_png() {
        let png = sample_plot().render_png(70).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn test_lower_dpi_is_not_larger() {
        let plot = sample_plot();
        let high = plot.render_png(110).unwrap();
        let low = plot.render_png(40).unwrap();
        assert!(low.len() <= high.len());
    }

    #[test]
    fn test_render_empty_and_degenerate_plots() {
        assert!(ScatterPlot::new(Vec::new()).render_png(50).is_ok());
        assert!(ScatterPlot::new(vec![(1.0, 1.0)]).render_png(50).is_ok());
    }

    #[test]
    fn test_tiny_dpi_is_rejected() {
        let err = sample_plot().render_png(1).unwrap_err();
        assert!(matches!(err, RenderError::Dimensions(_, _)));
    }
}
