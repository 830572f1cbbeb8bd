//! In-place spectral transforms along the grid axis of a multi-state
//! wavefunction array.
//!
//! Arrays are shaped `(ngrid, nstates)`; each electronic-state column is
//! transformed independently. Plans and scratch space are created once, so
//! repeated transforms perform no allocation.

use std::{ fmt, sync::Arc };
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use rustfft::{ Fft, FftPlanner };
use crate::error::SplitError;

/// Forward/inverse FFT pair for a fixed grid size.
///
/// The forward transform is unnormalized; the inverse carries the `1/n`
/// factor, so `to_position_space(to_momentum_space(x)) == x` up to rounding.
#[derive(Clone)]
pub struct SpectralTransform {
    n: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    column: Vec<C64>,
    scratch: Vec<C64>,
}

impl fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("n", &self.n)
            .finish()
    }
}

impl SpectralTransform {
    /// Plan transforms for a grid of `n` points.
    pub fn new(n: usize) -> Result<Self, SplitError> {
        if n == 0 { return Err(SplitError::EmptyGrid); }
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(n);
        let inverse = planner.plan_fft_inverse(n);
        let scratch_len
            = forward.get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Ok(Self {
            n,
            forward,
            inverse,
            column: vec![C64::zero(); n],
            scratch: vec![C64::zero(); scratch_len],
        })
    }

    /// Number of grid points the transforms were planned for.
    pub fn len(&self) -> usize { self.n }

    /// Always `false`; construction rejects empty grids.
    pub fn is_empty(&self) -> bool { self.n == 0 }

    /// Transform from position to momentum representation in place.
    ///
    /// *Panics if the first axis of `psi` does not have the planned length*.
    pub fn to_momentum_space<S>(&mut self, psi: &mut nd::ArrayBase<S, nd::Ix2>)
    where S: nd::DataMut<Elem = C64>
    {
        let plan = Arc::clone(&self.forward);
        self.process(plan.as_ref(), psi);
    }

    /// Transform from momentum to position representation in place, including
    /// the `1/n` normalization.
    ///
    /// *Panics if the first axis of `psi` does not have the planned length*.
    pub fn to_position_space<S>(&mut self, psi: &mut nd::ArrayBase<S, nd::Ix2>)
    where S: nd::DataMut<Elem = C64>
    {
        let plan = Arc::clone(&self.inverse);
        self.process(plan.as_ref(), psi);
        let n = self.n as f64;
        psi.map_inplace(|qk| { *qk /= n; });
    }

    // columns of a row-major (ngrid, nstates) array are strided, so each one
    // is staged through the preallocated column buffer
    fn process<S>(&mut self, plan: &dyn Fft<f64>, psi: &mut nd::ArrayBase<S, nd::Ix2>)
    where S: nd::DataMut<Elem = C64>
    {
        assert_eq!(psi.len_of(nd::Axis(0)), self.n, "grid size mismatch in spectral transform");
        for mut col in psi.axis_iter_mut(nd::Axis(1)) {
            self.column.iter_mut().zip(col.iter())
                .for_each(|(bk, qk)| { *bk = *qk; });
            plan.process_with_scratch(&mut self.column, &mut self.scratch);
            col.iter_mut().zip(self.column.iter())
                .for_each(|(qk, bk)| { *qk = *bk; });
        }
    }
}
