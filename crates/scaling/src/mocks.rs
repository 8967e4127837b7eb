//! Plotter stand-ins for testing the validator without rasterizing.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::plot::{PlotError, RangePlot, RangePlotter};

/// Records every figure it is asked to draw and writes nothing.
#[derive(Default)]
pub struct RecordingPlotter {
    plots: Mutex<Vec<RangePlot>>,
    fail: bool,
}

impl RecordingPlotter {
    /// A plotter whose every call fails after recording the figure.
    pub fn failing() -> Self {
        Self {
            plots: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Figures requested so far, in call order.
    pub fn plots(&self) -> Vec<RangePlot> {
        self.plots.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl RangePlotter for RecordingPlotter {
    fn plot(&self, plot: &RangePlot, dir: &Path) -> Result<PathBuf, PlotError> {
        if let Ok(mut plots) = self.plots.lock() {
            plots.push(plot.clone());
        }
        let path = dir.join(plot.file_name());
        if self.fail {
            return Err(PlotError::Io {
                path,
                source: std::io::Error::other("plotting disabled"),
            });
        }
        Ok(path)
    }
}
