//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use ndarray as nd;
use ndarray_linalg::error::LinalgError;
use thiserror::Error;
use crate::wavefunction::Domain;

/// Returned when an operator or wavefunction array does not have the shape
/// required by its counterpart.
#[derive(Debug, Error)]
#[error("{what}: expected shape {expected:?}; got {found:?}")]
pub struct ShapeError {
    /// Name of the offending array.
    pub what: &'static str,
    pub expected: Vec<usize>,
    pub found: Vec<usize>,
}

impl ShapeError {
    pub(crate) fn check<S, A, D>(
        what: &'static str,
        a: &nd::ArrayBase<S, D>,
        expected: &[usize],
    ) -> Result<(), Self>
    where
        S: nd::Data<Elem = A>,
        D: nd::Dimension,
    {
        (a.shape() == expected).then_some(())
            .ok_or_else(|| Self {
                what,
                expected: expected.to_vec(),
                found: a.shape().to_vec(),
            })
    }

    pub(crate) fn check_dims(
        what: &'static str,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Result<(), Self>
    {
        (expected == found).then_some(())
            .ok_or_else(|| Self {
                what,
                expected: vec![expected.0, expected.1],
                found: vec![found.0, found.1],
            })
    }
}

/// Returned from wavefunction, propagator, and stepper functions.
#[derive(Debug, Error)]
pub enum SplitError {
    /// Returned when an ordering value is not one of `PLAIN`, `TVT`, or `VTV`.
    #[error("unknown split-operator ordering: {0}")]
    BadOrdering(String),

    /// Returned when a grid or wavefunction with zero points is encountered.
    #[error("grid must have at least one point")]
    EmptyGrid,

    /// Returned when a wavefunction with zero electronic states is encountered.
    #[error("wavefunction must have at least one electronic state")]
    EmptyStates,

    /// Returned when a grid with non-increasing bounds is requested.
    #[error("grid bounds must be increasing; got ({0}, {1})")]
    BadBounds(f64, f64),

    /// Returned when a non-positive or non-finite timestep is encountered.
    #[error("timestep must be positive and finite; got {0}")]
    BadTimestep(f64),

    /// Returned when a non-positive mass is encountered.
    #[error("mass must be greater than 0; got {0}")]
    BadMass(f64),

    /// Returned when a wavepacket width is non-positive or too narrow to be
    /// sampled by the grid.
    #[error("wavepacket width must be greater than 0 and resolvable on the grid; got {0}")]
    BadWidth(f64),

    /// Returned when an electronic state index is out of range.
    #[error("state index {index} out of range for {nstates} states")]
    BadState { index: usize, nstates: usize },

    /// Returned when a non-positive norm tolerance is requested.
    #[error("norm tolerance must be greater than 0; got {0}")]
    BadTolerance(f64),

    /// Returned when a snapshot interval of zero is requested.
    #[error("save_every must be greater than 0")]
    BadSaveEvery,

    /// Returned when a potential matrix fails a Hermiticity check at a grid
    /// point.
    #[error("potential matrix is not Hermitian at grid point {0}")]
    NotHermitian(usize),

    /// Returned when mutable access to a wavefunction is requested in the
    /// wrong representation.
    #[error("wavefunction is in {found:?} space; expected {expected:?} space")]
    Domain { expected: Domain, found: Domain },

    /// Returned when the total probability drifts away from 1 by more than
    /// the allowed tolerance.
    #[error("numerical divergence: total probability {norm} deviates from 1 by more than {tol}")]
    Divergence { norm: f64, tol: f64 },

    /// [`ShapeError`]
    #[error("shape error: {0}")]
    Shape(#[from] ShapeError),

    /// [`ndarray::ShapeError`]
    #[error("array error: {0}")]
    Array(#[from] nd::ShapeError),

    /// [`LinalgError`].
    #[error("linalg error: {0}")]
    Linalg(#[from] LinalgError),
}

impl SplitError {
    pub(crate) fn check_timestep(dt: f64) -> Result<(), Self> {
        (dt > 0.0 && dt.is_finite()).then_some(()).ok_or(Self::BadTimestep(dt))
    }

    pub(crate) fn check_mass(mass: f64) -> Result<(), Self> {
        (mass > 0.0).then_some(()).ok_or(Self::BadMass(mass))
    }

    pub(crate) fn check_tolerance(tol: f64) -> Result<(), Self> {
        (tol > 0.0).then_some(()).ok_or(Self::BadTolerance(tol))
    }

    pub(crate) fn check_state(index: usize, nstates: usize) -> Result<(), Self> {
        (index < nstates).then_some(())
            .ok_or(Self::BadState { index, nstates })
    }

    /// Return `true` if `self` describes a setup problem rather than a failure
    /// during propagation.
    pub fn is_configuration(&self) -> bool {
        !matches!(self, Self::Divergence { .. } | Self::Domain { .. })
    }
}
