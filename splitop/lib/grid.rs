//! Uniform periodic position grids and their FFT-ordered momentum
//! counterparts.

use std::f64::consts::TAU;
use ndarray::{ self as nd, concatenate };
use crate::error::SplitError;

/// Generate an array of frequency-space coordinates to accompany a FFT of `n`
/// points for sampling interval `d`.
pub fn fft_freq(n: usize, d: f64) -> nd::Array1<f64> {
    let m = if n % 2 == 0 { n / 2 } else { (n + 1) / 2 };
    let fp: nd::Array1<f64>
        = (0..m)
        .map(|k| k as f64 / (n as f64 * d))
        .collect();
    let fm: nd::Array1<f64>
        = (1..n - m + 1).rev()
        .map(|k| -(k as f64) / (n as f64 * d))
        .collect();
    concatenate!(nd::Axis(0), fp, fm)
}

/// A uniform position grid with periodic boundaries.
///
/// The upper bound is excluded, i.e. `x[i] = xmin + i * dx` for
/// `i ∊ {0, ..., n - 1}` with `dx = (xmax - xmin) / n`. Momenta are stored in
/// FFT order, so `k[i]` is the wavenumber of the `i`-th output bin of a
/// forward transform.
#[derive(Clone, Debug)]
pub struct Grid {
    x: nd::Array1<f64>,
    k: nd::Array1<f64>,
    dx: f64,
}

impl Grid {
    /// Construct a grid of `n` points spanning `[xmin, xmax)`.
    pub fn new(xmin: f64, xmax: f64, n: usize) -> Result<Self, SplitError> {
        if n == 0 { return Err(SplitError::EmptyGrid); }
        if !(xmax > xmin) || !(xmax - xmin).is_finite() {
            return Err(SplitError::BadBounds(xmin, xmax));
        }
        let dx = (xmax - xmin) / n as f64;
        let x: nd::Array1<f64>
            = (0..n).map(|i| xmin + i as f64 * dx).collect();
        let k = fft_freq(n, dx) * TAU;
        Ok(Self { x, k, dx })
    }

    /// Number of grid points.
    pub fn len(&self) -> usize { self.x.len() }

    /// Always `false`; construction rejects empty grids.
    pub fn is_empty(&self) -> bool { self.x.is_empty() }

    /// Position coordinates.
    pub fn x(&self) -> nd::ArrayView1<'_, f64> { self.x.view() }

    /// Wavenumbers in FFT order.
    pub fn k(&self) -> nd::ArrayView1<'_, f64> { self.k.view() }

    /// Position spacing.
    pub fn dx(&self) -> f64 { self.dx }

    /// Momentum spacing.
    pub fn dk(&self) -> f64 { TAU / (self.len() as f64 * self.dx) }

    /// Total length of the periodic box.
    pub fn length(&self) -> f64 { self.len() as f64 * self.dx }
}
