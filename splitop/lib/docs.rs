//! Theoretical background.
//!
//! # Contents
//! - [Background](#background)
//! - [Orderings](#orderings)
//! - [Discretization](#discretization)
//! - [Time dependence](#time-dependence)
//!
//! # Background
//! We consider a particle of mass *m* moving in one dimension across *S*
//! coupled electronic (diabatic) states, described by an *S*-component
//! wavefunction **ψ**(*x*, *t*) obeying (with *ħ* = 1)
//! ```text
//!   ∂ψ
//! i -- = (T + V(x, t)) ψ
//!   ∂t
//!
//!        1  ∂²
//! T = - --- ---
//!       2 m ∂x²
//! ```
//! where **V**(*x*, *t*) is an *S*×*S* Hermitian matrix at every *x* whose
//! off-diagonal elements couple the states. Over a short time *δt* the
//! evolution operator exp(-i (*T* + **V**) *δt*) is approximated by products
//! of exp(-i *T* *δt*) and exp(-i **V** *δt*), each of which is cheap to apply
//! in its natural representation:
//! - *T* is diagonal in momentum space, where it acts as multiplication by
//!   *k*²/2*m* identically on every state;
//! - **V** is diagonal in position space, where it acts as an *S*×*S* matrix
//!   on the state vector at each grid point.
//!
//! The wavefunction is moved between the two representations with FFTs. Each
//! factor is unitary, so the total probability
//! ```text
//! Σ   |ψ[i, j]|²
//!  i,j
//! ```
//! is conserved up to rounding regardless of the timestep; drifts in this
//! quantity indicate a non-unitary propagator.
//!
//! # Orderings
//! Three factorizations are provided:
//! ```text
//! PLAIN: exp(-i V δt) exp(-i T δt)                          + O(δt²)
//! TVT:   exp(-i T δt/2) exp(-i V δt) exp(-i T δt/2)         + O(δt³)
//! VTV:   exp(-i V δt/2) exp(-i T δt) exp(-i V δt/2)         + O(δt³)
//! ```
//! (operators applied right to left). The local errors above give global
//! errors of first order for `PLAIN` and second order for the two symmetric
//! orderings. `TVT` requires two FFT round trips per step, while `PLAIN` and
//! `VTV` require one. When *T* and **V** commute (e.g. a single state in a
//! constant potential, or a coupling that does not depend on *x*), all three
//! are exact.
//!
//! # Discretization
//! Positions are sampled on a periodic grid
//! ```text
//! x[i] = x₀ + i δx, i ∊ {0, ..., N - 1}
//! ```
//! and wavenumbers follow FFT ordering,
//! ```text
//! k[i] = 2π i / (N δx)          for i < ⌈N/2⌉
//! k[i] = 2π (i - N) / (N δx)    otherwise
//! ```
//! The forward transform is unnormalized and the inverse carries a factor
//! 1/*N*, so that a round trip is the identity. Wavefunctions are normalized
//! so that the plain sum of |*ψ*|² over grid points and states is 1.
//!
//! # Time dependence
//! For a time-dependent potential, the propagators for a step beginning at
//! time *t* are all evaluated at *t*, including the half-step potential
//! operators of `VTV`. A strictly second-order symmetric splitting would
//! evaluate **V** at *t* + *δt*/2; the difference is negligible as long as the
//! potential varies slowly on the scale of *δt* (e.g. a drive frequency *Ω*
//! with *Ω* *δt* ≪ 1).
