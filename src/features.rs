//! Frequency-domain features for one window of samples
//!
//! The live path uses [`FeatureExtractor`]: the magnitude spectrum of the
//! window (`N/2 + 1` bins) is folded into `F` groups by bin index modulo `F`
//! and each group is averaged. Models trained against this layout depend on
//! the interleaved grouping, so it must not become contiguous bands.
//!
//! [`frame_average_features`] is the offline trainer's scheme and produces
//! vectors that are NOT interchangeable with the live ones.

use crate::error::{BridgeError, Result};
use crate::window::Sample;
use log::trace;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Which feature layout to produce from a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum FeatureScheme {
    /// Modulo-grouped spectrum of every sliding window.
    Sliding,
    /// Mean spectrum magnitude per non-overlapping frame, one vector per recording.
    FrameAverage,
}

pub struct FeatureExtractor {
    window_size: usize,
    feature_count: usize,
    fft: Arc<dyn Fft<f64>>,
    scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
}

/// Both feature schemes need a non-empty window and at least one group.
pub fn check_dimensions(window_size: usize, feature_count: usize) -> Result<()> {
    if window_size == 0 {
        return Err(BridgeError::InvalidConfig("window size must be at least 1".to_string()));
    }
    if feature_count == 0 {
        return Err(BridgeError::InvalidConfig("feature count must be at least 1".to_string()));
    }
    Ok(())
}

impl FeatureExtractor {
    pub fn new(window_size: usize, feature_count: usize) -> Result<Self> {
        check_dimensions(window_size, feature_count)?;
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(window_size);
        Ok(FeatureExtractor {
            window_size,
            feature_count,
            fft,
            scratch: vec![Complex::new(0.0, 0.0); window_size],
            magnitudes: Vec::with_capacity(window_size / 2 + 1),
        })
    }

    pub fn extract(&mut self, window: &[Sample]) -> Vec<f32> {
        assert_eq!(window.len(), self.window_size, "window length must match the planned FFT size");
        magnitude_spectrum(&*self.fft, window, &mut self.scratch, &mut self.magnitudes);
        let features = group_by_modulo(&self.magnitudes, self.feature_count);
        trace!("features {:?}", features);
        features
    }
}

fn magnitude_spectrum(fft: &dyn Fft<f64>, window: &[Sample], scratch: &mut [Complex<f64>], out: &mut Vec<f64>) {
    for (c, s) in scratch.iter_mut().zip(window) {
        *c = Complex::new(*s as f64, 0.0);
    }
    fft.process(scratch);

    out.clear();
    out.extend(scratch[..window.len() / 2 + 1].iter().map(|c| c.norm()));
}

/// Mean of bins `g, g + F, g + 2F, ...` for every group `g`; empty groups are 0.
pub fn group_by_modulo(bins: &[f64], feature_count: usize) -> Vec<f32> {
    let mut sums = vec![0.0f64; feature_count];
    let mut counts = vec![0usize; feature_count];
    for (i, magnitude) in bins.iter().enumerate() {
        sums[i % feature_count] += magnitude;
        counts[i % feature_count] += 1;
    }
    sums.iter()
        .zip(&counts)
        .map(|(sum, &count)| if count == 0 { 0.0 } else { (sum / count as f64) as f32 })
        .collect()
}

/// Offline trainer features for a whole recording.
///
/// Frames start at `0, N, 2N, ...` while the start is below `len - N`, so a
/// recording that is an exact multiple of `N` loses its last frame. Only the
/// first `feature_count` frame means are kept, zero padded.
pub fn frame_average_features(signal: &[Sample], window_size: usize, feature_count: usize) -> Vec<f32> {
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(window_size);
    let mut scratch = vec![Complex::new(0.0, 0.0); window_size];
    let mut magnitudes = Vec::with_capacity(window_size / 2 + 1);

    let mut features = Vec::with_capacity(feature_count);
    let mut start = 0;
    while start + window_size < signal.len() && features.len() < feature_count {
        magnitude_spectrum(&*fft, &signal[start..start + window_size], &mut scratch, &mut magnitudes);
        let mean = magnitudes.iter().sum::<f64>() / magnitudes.len() as f64;
        features.push(mean as f32);
        start += window_size;
    }
    features.resize(feature_count, 0.0);
    features
}
