// Activity profiler: per-row / per-column intensity variability

use crate::error::Pdf2ImgError;
use crate::segment::raster::RasterImage;

/// Per-row and per-column activity of a raster.
///
/// `row_activity[r]` is the mean over channels of the standard deviation of
/// row `r` taken across the width; `col_activity[c]` is the same taken down
/// column `c`.
#[derive(Debug, Clone, PartialEq)]
pub struct VarianceProfile {
    pub row_activity: Vec<f64>,
    pub col_activity: Vec<f64>,
}

/// Running mean / variance accumulator (Welford).
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Moments {
    #[inline]
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// Population standard deviation (divides by `n`).
    fn std_dev(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            (self.m2 / self.n as f64).max(0.0).sqrt()
        }
    }
}

/// Compute the activity profile of `image`.
///
/// Fails with `ShapeError` on a zero-height or zero-width raster.
pub fn activity_profile(image: &RasterImage) -> crate::error::Result<VarianceProfile> {
    let (height, width, channels) = image.shape();
    if height == 0 || width == 0 || channels == 0 {
        return Err(Pdf2ImgError::shape(format!(
            "cannot profile a {height}x{width}x{channels} raster"
        )));
    }

    // One accumulator per (row, channel) and per (column, channel), filled in
    // a single pass over the samples.
    let mut rows = vec![Moments::default(); height * channels];
    let mut cols = vec![Moments::default(); width * channels];

    for r in 0..height {
        for c in 0..width {
            for ch in 0..channels {
                let v = image.sample(r, c, ch) as f64;
                rows[r * channels + ch].push(v);
                cols[c * channels + ch].push(v);
            }
        }
    }

    Ok(VarianceProfile {
        row_activity: channel_means(&rows, channels),
        col_activity: channel_means(&cols, channels),
    })
}

fn channel_means(moments: &[Moments], channels: usize) -> Vec<f64> {
    moments
        .chunks(channels)
        .map(|per_channel| {
            per_channel.iter().map(Moments::std_dev).sum::<f64>() / channels as f64
        })
        .collect()
}
