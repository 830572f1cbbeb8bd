pub mod config;
pub mod free_particle;
pub mod logging;

use ndarray as nd;
use num_complex::Complex64 as C64;

/// Build a `(nstates, nstates, ngrid)` potential with zero diagonal and a
/// uniform coupling `c` between neighboring states.
pub fn uniform_chain(nstates: usize, ngrid: usize, c: f64) -> nd::Array3<C64> {
    let mut v: nd::Array3<C64> = nd::Array3::zeros((nstates, nstates, ngrid));
    (0..nstates.saturating_sub(1))
        .for_each(|j| {
            v.slice_mut(nd::s![j, j + 1, ..]).fill(C64::new(c, 0.0));
            v.slice_mut(nd::s![j + 1, j, ..]).fill(C64::new(c, 0.0));
        });
    v
}
