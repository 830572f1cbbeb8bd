//! Multi-state wavefunction container.
//!
//! A [`Wavefunction`] owns a single `(ngrid, nstates)` array of complex
//! amplitudes for the lifetime of a trajectory. The array is only ever
//! overwritten in place: there is no method that swaps out the storage, and
//! the representation (position or momentum space) currently held is tracked
//! alongside it.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr3,
    error::{ ShapeError, SplitError },
    fft::SpectralTransform,
    grid::Grid,
};

/// Representation of the values currently stored in a [`Wavefunction`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Domain {
    Position,
    Momentum,
}

/// Amplitudes of a particle on a spatial grid across several coupled
/// electronic states.
#[derive(Clone, Debug)]
pub struct Wavefunction {
    psi: nd::Array2<C64>,
    domain: Domain,
    transform: SpectralTransform,
}

impl Wavefunction {
    /// Take ownership of a position-space amplitude array shaped
    /// `(ngrid, nstates)`.
    pub fn new(psi: nd::Array2<C64>) -> Result<Self, SplitError> {
        let (ngrid, nstates) = psi.dim();
        if nstates == 0 { return Err(SplitError::EmptyStates); }
        let transform = SpectralTransform::new(ngrid)?;
        Ok(Self { psi, domain: Domain::Position, transform })
    }

    /// Construct a Gaussian wavepacket centered at `x0` with mean wavenumber
    /// `k0` and position width `sigma`, occupying only electronic state
    /// `state`.
    ///
    /// The packet is normalized so that the sum of `|ψ|²` over the grid is 1.
    /// On a periodic grid the packet is wrapped onto the nearest image of
    /// `x0`.
    pub fn gaussian(
        grid: &Grid,
        x0: f64,
        k0: f64,
        sigma: f64,
        nstates: usize,
        state: usize,
    ) -> Result<Self, SplitError>
    {
        if !(sigma > 0.0) { return Err(SplitError::BadWidth(sigma)); }
        if nstates == 0 { return Err(SplitError::EmptyStates); }
        SplitError::check_state(state, nstates)?;
        let len = grid.length();
        let mut psi: nd::Array2<C64> = nd::Array2::zeros((grid.len(), nstates));
        psi.column_mut(state).iter_mut().zip(grid.x())
            .for_each(|(qk, &xk)| {
                let d = xk - x0;
                let d = d - len * (d / len).round();
                *qk = C64::from_polar(
                    (-(d / (2.0 * sigma)).powi(2)).exp(), k0 * d);
            });
        let norm: f64 = psi.iter().map(|qk| qk.norm_sqr()).sum();
        let norm = norm.sqrt();
        // every sample underflowed: the packet falls between grid points
        if !(norm > 0.0 && norm.is_finite()) { return Err(SplitError::BadWidth(sigma)); }
        psi.map_inplace(|qk| { *qk /= norm; });
        Self::new(psi)
    }

    /// Number of grid points.
    pub fn ngrid(&self) -> usize { self.psi.nrows() }

    /// Number of electronic states.
    pub fn nstates(&self) -> usize { self.psi.ncols() }

    /// `(ngrid, nstates)`
    pub fn dim(&self) -> (usize, usize) { self.psi.dim() }

    /// Representation of the currently stored amplitudes.
    pub fn domain(&self) -> Domain { self.domain }

    /// Live, read-only view of the stored amplitudes in whichever
    /// [`Domain`] they currently occupy.
    pub fn psi(&self) -> nd::ArrayView2<'_, C64> { self.psi.view() }

    /// Transform to momentum space in place. Does nothing if already there.
    pub fn to_momentum_space(&mut self) {
        if self.domain == Domain::Momentum { return; }
        self.transform.to_momentum_space(&mut self.psi);
        self.domain = Domain::Momentum;
    }

    /// Transform to position space in place. Does nothing if already there.
    pub fn to_position_space(&mut self) {
        if self.domain == Domain::Position { return; }
        self.transform.to_position_space(&mut self.psi);
        self.domain = Domain::Position;
    }

    // the only way to get mutable access to the amplitudes
    pub(crate) fn view_mut_in(&mut self, domain: Domain)
        -> Result<nd::ArrayViewMut2<'_, C64>, SplitError>
    {
        self.require(domain)?;
        Ok(self.psi.view_mut())
    }

    /// Total probability, `Σ |ψ|²` over grid points and states.
    ///
    /// In momentum space the unnormalized forward transform is undone by
    /// Parseval's theorem, so the result is independent of [`Self::domain`].
    pub fn norm(&self) -> f64 {
        self.populations().sum()
    }

    /// Probability in each electronic state.
    pub fn populations(&self) -> nd::Array1<f64> {
        let scale = self.parseval_scale();
        populations_of(self.psi.view()).mapv_into(|pk| scale * pk)
    }

    /// Position-space probability at each grid point, summed over states.
    pub fn density(&self) -> Result<nd::Array1<f64>, SplitError> {
        self.require(Domain::Position)?;
        Ok(density_of(self.psi.view()))
    }

    /// Momentum-space probability at each FFT bin, summed over states and
    /// normalized to [`Self::norm`].
    ///
    /// This is computed on a copy; the stored amplitudes are left untouched.
    pub fn momentum_density(&self) -> nd::Array1<f64> {
        match self.domain {
            Domain::Position => {
                let mut transform = self.transform.clone();
                momentum_density_of(&mut transform, self.psi.view())
            },
            Domain::Momentum => {
                let scale = (self.ngrid() as f64).recip();
                density_of(self.psi.view()).mapv_into(|rk| scale * rk)
            },
        }
    }

    /// Expectation value of position, `Σ x |ψ|² / Σ |ψ|²`.
    ///
    /// Positions are taken as-is from `grid`; on a periodic grid this is only
    /// meaningful while the packet stays away from the boundaries.
    pub fn mean_position(&self, grid: &Grid) -> Result<f64, SplitError> {
        let rho = self.density()?;
        ShapeError::check("grid", &grid.x(), &[self.ngrid()])?;
        Ok(weighted_mean(&rho, grid.x()))
    }

    /// Expectation value of wavenumber computed from
    /// [`Self::momentum_density`] and the grid's FFT-ordered wavenumbers.
    pub fn mean_momentum(&self, grid: &Grid) -> f64 {
        weighted_mean(&self.momentum_density(), grid.k())
    }

    /// Kinetic energy expectation value, `Σ k²/2m |φ(k)|²` over the
    /// momentum-space amplitudes.
    pub fn kinetic_energy(&self, grid: &Grid, mass: f64) -> Result<f64, SplitError> {
        SplitError::check_mass(mass)?;
        ShapeError::check("grid", &grid.k(), &[self.ngrid()])?;
        Ok(kinetic_energy_of(&self.momentum_density(), grid, mass))
    }

    /// Potential energy expectation value, `Σ ψ(x)† V(x) ψ(x)` summed over
    /// grid points, for a potential shaped `(nstates, nstates, ngrid)`.
    pub fn potential_energy<S>(&self, v: &Arr3<S>) -> Result<f64, SplitError>
    where S: nd::Data<Elem = C64>
    {
        self.require(Domain::Position)?;
        ShapeError::check("potential", v, &[self.nstates(), self.nstates(), self.ngrid()])?;
        Ok(potential_energy_of(self.psi.view(), v))
    }

    /// Amplitudes in the adiabatic basis `u` shaped
    /// `(nstates, nstates, ngrid)`, as returned by
    /// [`adiabatic_states`][crate::propagator::adiabatic_states].
    pub fn adiabatic_amplitudes<S>(&self, u: &Arr3<S>)
        -> Result<nd::Array2<C64>, SplitError>
    where S: nd::Data<Elem = C64>
    {
        self.require(Domain::Position)?;
        ShapeError::check("adiabatic states", u, &[self.nstates(), self.nstates(), self.ngrid()])?;
        Ok(adiabatic_amplitudes_of(self.psi.view(), u))
    }

    /// Probability in each adiabatic state of the basis `u`.
    pub fn adiabatic_populations<S>(&self, u: &Arr3<S>)
        -> Result<nd::Array1<f64>, SplitError>
    where S: nd::Data<Elem = C64>
    {
        Ok(populations_of(self.adiabatic_amplitudes(u)?.view()))
    }

    /// Per-state probabilities on either side of `x_div`, shape
    /// `(2, nstates)`.
    ///
    /// Row 0 holds the probability at `x < x_div` (reflected, for a packet
    /// launched from the left) and row 1 the probability at `x >= x_div`
    /// (transmitted).
    pub fn scattering(&self, grid: &Grid, x_div: f64)
        -> Result<nd::Array2<f64>, SplitError>
    {
        self.require(Domain::Position)?;
        ShapeError::check("grid", &grid.x(), &[self.ngrid()])?;
        Ok(split_populations(self.psi.view(), grid.x(), x_div))
    }

    /// Like [`Self::scattering`], but in the adiabatic basis `u`.
    pub fn adiabatic_scattering<S>(&self, grid: &Grid, u: &Arr3<S>, x_div: f64)
        -> Result<nd::Array2<f64>, SplitError>
    where S: nd::Data<Elem = C64>
    {
        ShapeError::check("grid", &grid.x(), &[self.ngrid()])?;
        let phi = self.adiabatic_amplitudes(u)?;
        Ok(split_populations(phi.view(), grid.x(), x_div))
    }

    fn require(&self, domain: Domain) -> Result<(), SplitError> {
        (self.domain == domain).then_some(())
            .ok_or(SplitError::Domain { expected: domain, found: self.domain })
    }

    fn parseval_scale(&self) -> f64 {
        match self.domain {
            Domain::Position => 1.0,
            Domain::Momentum => (self.ngrid() as f64).recip(),
        }
    }
}

// observables on raw `(ngrid, nstates)` position-space amplitudes, shared with
// `Trajectory`

pub(crate) fn populations_of(psi: nd::ArrayView2<'_, C64>) -> nd::Array1<f64> {
    psi.axis_iter(nd::Axis(1))
        .map(|col| col.iter().map(|qk| qk.norm_sqr()).sum::<f64>())
        .collect()
}

pub(crate) fn density_of(psi: nd::ArrayView2<'_, C64>) -> nd::Array1<f64> {
    psi.axis_iter(nd::Axis(0))
        .map(|row| row.iter().map(|qk| qk.norm_sqr()).sum::<f64>())
        .collect()
}

pub(crate) fn momentum_density_of(
    transform: &mut SpectralTransform,
    psi: nd::ArrayView2<'_, C64>,
) -> nd::Array1<f64>
{
    let mut phi = psi.to_owned();
    transform.to_momentum_space(&mut phi);
    let scale = (phi.nrows() as f64).recip();
    density_of(phi.view()).mapv_into(|rk| scale * rk)
}

pub(crate) fn weighted_mean(rho: &nd::Array1<f64>, values: nd::ArrayView1<'_, f64>) -> f64 {
    rho.iter().zip(values).map(|(rk, vk)| rk * vk).sum::<f64>() / rho.sum()
}

pub(crate) fn kinetic_energy_of(rho_k: &nd::Array1<f64>, grid: &Grid, mass: f64) -> f64 {
    rho_k.iter().zip(grid.k())
        .map(|(rk, kk)| rk * kk.powi(2) / (2.0 * mass))
        .sum()
}

pub(crate) fn potential_energy_of<S>(psi: nd::ArrayView2<'_, C64>, v: &Arr3<S>) -> f64
where S: nd::Data<Elem = C64>
{
    psi.axis_iter(nd::Axis(0)).enumerate()
        .map(|(i, row)| {
            let vi = v.slice(nd::s![.., .., i]);
            row.iter().enumerate()
                .map(|(j, qj)| qj.conj() * vi.row(j).dot(&row))
                .sum::<C64>()
                .re
        })
        .sum()
}

pub(crate) fn adiabatic_amplitudes_of<S>(psi: nd::ArrayView2<'_, C64>, u: &Arr3<S>)
    -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    let mut phi: nd::Array2<C64> = nd::Array2::zeros(psi.raw_dim());
    phi.axis_iter_mut(nd::Axis(0))
        .zip(psi.axis_iter(nd::Axis(0)))
        .enumerate()
        .for_each(|(i, (mut out, row))| {
            let ui = u.slice(nd::s![.., .., i]);
            out.iter_mut().zip(ui.columns())
                .for_each(|(pa, ua)| {
                    *pa = ua.iter().zip(row.iter())
                        .map(|(uja, qj)| uja.conj() * qj)
                        .sum();
                });
        });
    phi
}

pub(crate) fn split_populations(
    psi: nd::ArrayView2<'_, C64>,
    x: nd::ArrayView1<'_, f64>,
    x_div: f64,
) -> nd::Array2<f64>
{
    let mut out: nd::Array2<f64> = nd::Array2::zeros((2, psi.ncols()));
    psi.axis_iter(nd::Axis(0)).zip(x)
        .for_each(|(row, &xk)| {
            let side = if xk < x_div { 0 } else { 1 };
            out.row_mut(side).iter_mut().zip(row.iter())
                .for_each(|(pk, qk)| { *pk += qk.norm_sqr(); });
        });
    out
}
