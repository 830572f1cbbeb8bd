//! Provides the split-operator method for the time-dependent Schrödinger
//! equation of a particle on a one-dimensional grid with several coupled
//! electronic states (a multi-surface wavepacket).
//!
//! Provides implementations for the following:
//! - In-place FFTs between position and momentum representations of a
//!   multi-state wavefunction ([`fft`], [`wavefunction`])
//! - Kinetic and state-coupling potential propagators, for static and
//!   time-dependent Hamiltonians ([`propagator`])
//! - Single steps in the `PLAIN`, `TVT`, and `VTV` orderings ([`step`])
//! - Repeated stepping with snapshots and stop conditions ([`evolve`])
//!
//! See [`docs`] for theoretical background.

pub mod error;
pub mod evolve;
pub mod fft;
pub mod grid;
pub mod propagator;
pub mod step;
pub mod wavefunction;

pub mod docs;

pub use error::SplitError;
pub use grid::Grid;
pub use propagator::{ Propagator, StaticPropagator, TimeDependentPropagator };
pub use step::{ SplitOperatorType, Stepper, propagate };
pub use wavefunction::{ Domain, Wavefunction };

pub type Arr1<S> = ndarray::ArrayBase<S, ndarray::Ix1>;
pub type Arr2<S> = ndarray::ArrayBase<S, ndarray::Ix2>;
pub type Arr3<S> = ndarray::ArrayBase<S, ndarray::Ix3>;
