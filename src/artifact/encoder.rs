//! Size-bounded PNG data URIs.
//!
//! The encoder walks a descending DPI ladder and keeps the first rendering
//! whose PNG payload fits the byte ceiling. When nothing fits, the rendering
//! at the lowest DPI is returned anyway: an oversized plot is better than a
//! failed request.

use super::plot::Renderable;
use crate::error::RenderError;
use base64::Engine as _;
use tracing::{debug, warn};

/// Prefix of every encoded artifact.
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Default ceiling on the PNG payload.
pub const DEFAULT_MAX_BYTES: usize = 100_000;

/// Default preferred DPI.
pub const DEFAULT_DPI: u32 = 110;

/// Fallback DPI levels tried below the preferred one.
const DEFAULT_LADDER: [u32; 5] = [110, 100, 90, 80, 70];

/// The preferred DPI followed by every default level strictly below it.
pub fn fidelity_ladder(preferred_dpi: u32) -> Vec<u32> {
    std::iter::once(preferred_dpi)
        .chain(DEFAULT_LADDER.iter().copied().filter(|dpi| *dpi < preferred_dpi))
        .collect()
}

/// Encodes plots under a fixed byte ceiling.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactEncoder {
    pub max_bytes: usize,
    pub preferred_dpi: u32,
}

impl Default for ArtifactEncoder {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            preferred_dpi: DEFAULT_DPI,
        }
    }
}

impl ArtifactEncoder {
    pub fn new(max_bytes: usize, preferred_dpi: u32) -> Self {
        Self {
            max_bytes,
            preferred_dpi,
        }
    }

    /// Encode with this encoder's ceiling and preferred DPI.
    pub fn encode<P: Renderable>(&self, plot: P) -> Result<String, RenderError> {
        encode(plot, self.max_bytes, self.preferred_dpi)
    }
}

/// Render `plot` down the fidelity ladder until the PNG fits `max_bytes`.
///
/// The plot is consumed and dropped once, after the final decision, on every
/// return path. Only a rendering failure produces an error.
pub fn encode<P: Renderable>(
    plot: P,
    max_bytes: usize,
    preferred_dpi: u32,
) -> Result<String, RenderError> {
    let ladder = fidelity_ladder(preferred_dpi);
    let Some((&lowest, upper)) = ladder.split_last() else {
        return Err(RenderError::Dimensions(0, 0));
    };

    for &dpi in upper {
        let png = plot.render_png(dpi)?;
        if png.len() <= max_bytes {
            debug!(
                "Encoded {} at {} dpi ({} bytes)",
                plot.describe(),
                dpi,
                png.len()
            );
            return Ok(to_data_uri(&png));
        }
        debug!(
            "{} at {} dpi is {} bytes, over {} byte ceiling",
            plot.describe(),
            dpi,
            png.len(),
            max_bytes
        );
    }

    let png = plot.render_png(lowest)?;
    if png.len() > max_bytes {
        warn!(
            "{} still {} bytes at {} dpi; returning best effort over {} byte ceiling",
            plot.describe(),
            png.len(),
            lowest,
            max_bytes
        );
    }
    Ok(to_data_uri(&png))
}

/// Wrap PNG bytes as a base64 data URI.
pub fn to_data_uri(png: &[u8]) -> String {
    format!(
        "{}{}",
        DATA_URI_PREFIX,
        base64::engine::general_purpose::STANDARD.encode(png)
    )
}

/// Decode the payload of a data URI produced by [`to_data_uri`].
pub fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let payload = uri.strip_prefix(DATA_URI_PREFIX)?;
    base64::engine::general_purpose::STANDARD.decode(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ScatterPlot;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Fake plot whose PNG size is `bytes_per_dpi * dpi` and which records
    /// every DPI it was rendered at plus how often it was dropped.
    struct FakePlot {
        bytes_per_dpi: usize,
        rendered: Rc<RefCell<Vec<u32>>>,
        drops: Rc<Cell<usize>>,
    }

    impl Renderable for FakePlot {
        fn render_png(&self, dpi: u32) -> Result<Vec<u8>, RenderError> {
            self.rendered.borrow_mut().push(dpi);
            Ok(vec![dpi as u8; self.bytes_per_dpi * dpi as usize])
        }
    }

    impl Drop for FakePlot {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn fake(bytes_per_dpi: usize) -> (FakePlot, Rc<RefCell<Vec<u32>>>, Rc<Cell<usize>>) {
        let rendered = Rc::new(RefCell::new(Vec::new()));
        let drops = Rc::new(Cell::new(0));
        let plot = FakePlot {
            bytes_per_dpi,
            rendered: Rc::clone(&rendered),
            drops: Rc::clone(&drops),
        };
        (plot, rendered, drops)
    }

    #[test]
    fn test_fidelity_ladder() {
        assert_eq!(fidelity_ladder(110), vec![110, 100, 90, 80, 70]);
        assert_eq!(fidelity_ladder(95), vec![95, 90, 80, 70]);
        assert_eq!(fidelity_ladder(150), vec![150, 110, 100, 90, 80, 70]);
        assert_eq!(fidelity_ladder(50), vec![50]);
    }

    #[test]
    fn test_first_fitting_level_wins() {
        let (plot, rendered, drops) = fake(10);
        // 110 dpi -> 1100 bytes, 100 -> 1000, 90 -> 900.
        let uri = encode(plot, 950, 110).unwrap();

        assert_eq!(*rendered.borrow(), vec![110, 100, 90]);
        assert_eq!(decode_data_uri(&uri).unwrap().len(), 900);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_fits_at_preferred_level() {
        let (plot, rendered, drops) = fake(1);
        let uri = encode(plot, DEFAULT_MAX_BYTES, 110).unwrap();

        assert!(uri.starts_with(DATA_URI_PREFIX));
        assert_eq!(*rendered.borrow(), vec![110]);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_best_effort_when_nothing_fits() {
        let (plot, rendered, drops) = fake(100);
        let uri = encode(plot, 10, 110).unwrap();

        assert_eq!(*rendered.borrow(), vec![110, 100, 90, 80, 70]);
        let payload = decode_data_uri(&uri).unwrap();
        assert_eq!(payload.len(), 7000);
        assert!(payload.iter().all(|b| *b == 70));
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_render_failure_still_drops_plot() {
        struct Broken(Rc<Cell<usize>>);
        impl Renderable for Broken {
            fn render_png(&self, _dpi: u32) -> Result<Vec<u8>, RenderError> {
                Err(RenderError::Draw("boom".to_string()))
            }
        }
        impl Drop for Broken {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        assert!(encode(Broken(Rc::clone(&drops)), 100, 110).is_err());
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn test_real_scatter_fits_default_ceiling() {
        let points: Vec<(f64, f64)> = (0..50).map(|i| (i as f64, (i * i) as f64)).collect();
        let uri = ArtifactEncoder::default()
            .encode(ScatterPlot::new(points))
            .unwrap();

        let payload = decode_data_uri(&uri).unwrap();
        assert!(payload.len() <= DEFAULT_MAX_BYTES);
    }
}
