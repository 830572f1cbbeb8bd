//! Split-operator time stepping for multi-state wavefunctions.
//!
//! A single step applies the kinetic operator *T* (diagonal in momentum
//! space) and the potential operator *V* (a state-coupling matrix at each
//! grid point, diagonal in position space) in one of three orders; see
//! [`SplitOperatorType`].
//!
//! All operators for a step are fetched from the [`Propagator`] at the time
//! passed in, which is taken to be the *start* of the step. This holds for
//! the half-step operators of [`SplitOperatorType::Tvt`] and
//! [`SplitOperatorType::Vtv`] as well, so for a time-dependent potential the
//! symmetric orderings are only second-order accurate while the potential
//! varies slowly over one `dt`.
//!
//! ```
//! use ndarray as nd;
//! use num_complex::Complex64 as C64;
//! use splitop::{ grid::Grid, propagator::StaticPropagator, step, wavefunction::Wavefunction };
//!
//! let grid = Grid::new(-20.0, 20.0, 128).unwrap();
//! let v: nd::Array3<C64> = nd::Array3::zeros((1, 1, grid.len()));
//! let prop = StaticPropagator::new(&grid, 1.0, 0.05, &v).unwrap();
//! let mut wf = Wavefunction::gaussian(&grid, -5.0, 2.0, 1.0, 1, 0).unwrap();
//! let stepper = step::Stepper::new(step::SplitOperatorType::Vtv, &wf, &prop).unwrap();
//! let mut t = 0.0;
//! for _ in 0..10 {
//!     t = stepper.step(t, &mut wf, &prop).unwrap();
//! }
//! assert!((t - 0.5).abs() < 1e-12);
//! assert!((wf.norm() - 1.0).abs() < 1e-10);
//! ```

use std::{ fmt, str::FromStr };
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::Zero;
use serde::{ Deserialize, Serialize };
use crate::{
    Arr1,
    Arr3,
    error::{ ShapeError, SplitError },
    propagator::{ Propagator, SplitResult },
    wavefunction::{ Domain, Wavefunction },
};

/// Order in which kinetic (*T*) and potential (*V*) operators are applied
/// within a single step.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SplitOperatorType {
    /// *T*(*dt*) then *V*(*dt*); first order in `dt`, one FFT round trip.
    #[default]
    Plain,
    /// *T*(*dt*/2), *V*(*dt*), *T*(*dt*/2); second order, two FFT round
    /// trips.
    Tvt,
    /// *V*(*dt*/2), *T*(*dt*), *V*(*dt*/2); second order, one FFT round trip.
    Vtv,
}

impl SplitOperatorType {
    /// Short upper-case name, e.g. `"TVT"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Tvt => "TVT",
            Self::Vtv => "VTV",
        }
    }

    /// Number of forward/inverse FFT pairs performed per step.
    pub fn transform_pairs(&self) -> usize {
        match self {
            Self::Plain | Self::Vtv => 1,
            Self::Tvt => 2,
        }
    }
}

impl fmt::Display for SplitOperatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SplitOperatorType {
    type Err = SplitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Ok(Self::Plain),
            "TVT" => Ok(Self::Tvt),
            "VTV" => Ok(Self::Vtv),
            _ => Err(SplitError::BadOrdering(s.to_string())),
        }
    }
}

impl TryFrom<String> for SplitOperatorType {
    type Error = SplitError;

    fn try_from(s: String) -> Result<Self, Self::Error> { s.parse() }
}

impl From<SplitOperatorType> for String {
    fn from(ty: SplitOperatorType) -> Self { ty.name().to_string() }
}

/// Numeric codes `1`, `2`, `3` for `PLAIN`, `TVT`, `VTV`.
impl TryFrom<u8> for SplitOperatorType {
    type Error = SplitError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(Self::Plain),
            2 => Ok(Self::Tvt),
            3 => Ok(Self::Vtv),
            _ => Err(SplitError::BadOrdering(code.to_string())),
        }
    }
}

impl From<SplitOperatorType> for u8 {
    fn from(ty: SplitOperatorType) -> Self {
        match ty {
            SplitOperatorType::Plain => 1,
            SplitOperatorType::Tvt => 2,
            SplitOperatorType::Vtv => 3,
        }
    }
}

fn check_kinetic<S>(wf: &Wavefunction, t_prop: &Arr1<S>) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    ShapeError::check("kinetic propagator", t_prop, &[wf.ngrid()])?;
    Ok(())
}

fn check_potential<S>(wf: &Wavefunction, v_prop: &Arr3<S>) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    let (ngrid, ns) = wf.dim();
    ShapeError::check("potential propagator", v_prop, &[ns, ns, ngrid])?;
    Ok(())
}

/// Apply a kinetic propagator: transform to momentum space, multiply every
/// state's amplitude at grid point `i` by `t_prop[i]`, and transform back.
///
/// `wf` must be in position space.
pub fn kinetic_propagate<S>(wf: &mut Wavefunction, t_prop: &Arr1<S>) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    check_kinetic(wf, t_prop)?;
    if wf.domain() != Domain::Position {
        return Err(SplitError::Domain {
            expected: Domain::Position,
            found: wf.domain(),
        });
    }
    wf.to_momentum_space();
    apply_kinetic(wf, t_prop)?;
    wf.to_position_space();
    Ok(())
}

fn apply_kinetic<S>(wf: &mut Wavefunction, t_prop: &Arr1<S>) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    let mut phi = wf.view_mut_in(Domain::Momentum)?;
    nd::Zip::from(phi.rows_mut()).and(t_prop)
        .for_each(|mut row, tk| { row.map_inplace(|qk| { *qk *= *tk; }); });
    Ok(())
}

/// Apply a potential propagator in position space: at every grid point `i`,
/// replace the state vector `ψ[i, :]` by `v_prop[:, :, i] · ψ[i, :]`.
pub fn potential_propagate<S>(wf: &mut Wavefunction, v_prop: &Arr3<S>) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    check_potential(wf, v_prop)?;
    let ns = wf.nstates();
    let mut buf: Vec<C64> = vec![C64::zero(); ns];
    let mut psi = wf.view_mut_in(Domain::Position)?;
    for (i, mut row) in psi.rows_mut().into_iter().enumerate() {
        let vi = v_prop.slice(nd::s![.., .., i]);
        buf.iter_mut().zip(vi.rows())
            .for_each(|(bj, vij)| {
                *bj = vij.iter().zip(row.iter())
                    .fold(C64::zero(), |acc, (vjk, qk)| acc + vjk * qk);
            });
        row.iter_mut().zip(buf.iter())
            .for_each(|(qj, bj)| { *qj = *bj; });
    }
    Ok(())
}

/// *T*(*dt*) → *V*(*dt*).
pub fn plain_propagate<S, T>(wf: &mut Wavefunction, t_prop: &Arr1<S>, v_prop: &Arr3<T>)
    -> SplitResult<()>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    check_kinetic(wf, t_prop)?;
    check_potential(wf, v_prop)?;
    kinetic_propagate(wf, t_prop)?;
    potential_propagate(wf, v_prop)
}

/// *T*(*dt*/2) → *V*(*dt*) → *T*(*dt*/2).
pub fn tvt_propagate<S, T>(
    wf: &mut Wavefunction,
    half_t_prop: &Arr1<S>,
    v_prop: &Arr3<T>,
) -> SplitResult<()>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    check_kinetic(wf, half_t_prop)?;
    check_potential(wf, v_prop)?;
    kinetic_propagate(wf, half_t_prop)?;
    potential_propagate(wf, v_prop)?;
    kinetic_propagate(wf, half_t_prop)
}

/// *V*(*dt*/2) → *T*(*dt*) → *V*(*dt*/2).
pub fn vtv_propagate<S, T>(
    wf: &mut Wavefunction,
    t_prop: &Arr1<S>,
    half_v_prop: &Arr3<T>,
) -> SplitResult<()>
where
    S: nd::Data<Elem = C64>,
    T: nd::Data<Elem = C64>,
{
    check_kinetic(wf, t_prop)?;
    check_potential(wf, half_v_prop)?;
    potential_propagate(wf, half_v_prop)?;
    kinetic_propagate(wf, t_prop)?;
    potential_propagate(wf, half_v_prop)
}

/// Advance `wf` in place by one timestep of `prop` starting at `time`, and
/// return `time + prop.dt()`.
///
/// All operators are fetched and shape-checked before `wf` is touched, so a
/// misbehaving provider leaves `wf` unchanged.
pub fn propagate<P>(
    time: f64,
    wf: &mut Wavefunction,
    prop: &P,
    ordering: SplitOperatorType,
) -> SplitResult<f64>
where P: Propagator + ?Sized
{
    match ordering {
        SplitOperatorType::Plain => {
            let t_prop = prop.kinetic(time)?;
            let v_prop = prop.potential(time)?;
            plain_propagate(wf, &t_prop, &v_prop)?;
        },
        SplitOperatorType::Tvt => {
            let half_t_prop = prop.half_kinetic(time)?;
            let v_prop = prop.potential(time)?;
            tvt_propagate(wf, &half_t_prop, &v_prop)?;
        },
        SplitOperatorType::Vtv => {
            let t_prop = prop.kinetic(time)?;
            let half_v_prop = prop.half_potential(time)?;
            vtv_propagate(wf, &t_prop, &half_v_prop)?;
        },
    }
    Ok(time + prop.dt())
}

/// A split-operator stepper bound to a fixed ordering.
///
/// Construction checks that a wavefunction and propagator agree in grid size
/// and number of states. Optionally, each step can be followed by a check
/// that the total probability remains within some tolerance of 1.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Stepper {
    ordering: SplitOperatorType,
    norm_tol: Option<f64>,
}

impl Stepper {
    /// Create a new stepper, validating `wf` against `prop`.
    pub fn new<P>(ordering: SplitOperatorType, wf: &Wavefunction, prop: &P)
        -> SplitResult<Self>
    where P: Propagator + ?Sized
    {
        ShapeError::check_dims(
            "wavefunction",
            (prop.ngrid(), prop.nstates()),
            wf.dim(),
        )?;
        SplitError::check_timestep(prop.dt())?;
        Ok(Self { ordering, norm_tol: None })
    }

    /// After every step, fail with [`SplitError::Divergence`] if the total
    /// probability differs from 1 by more than `tol`.
    ///
    /// `tol` must be greater than 0.
    pub fn with_norm_tolerance(mut self, tol: f64) -> SplitResult<Self> {
        SplitError::check_tolerance(tol)?;
        self.norm_tol = Some(tol);
        Ok(self)
    }

    /// The ordering used by [`Self::step`].
    pub fn ordering(&self) -> SplitOperatorType { self.ordering }

    /// The tolerance set by [`Self::with_norm_tolerance`], if any.
    pub fn norm_tolerance(&self) -> Option<f64> { self.norm_tol }

    /// Advance `wf` by one step from `time`, returning the new time.
    ///
    /// See [`propagate`].
    pub fn step<P>(&self, time: f64, wf: &mut Wavefunction, prop: &P)
        -> SplitResult<f64>
    where P: Propagator + ?Sized
    {
        let t_next = propagate(time, wf, prop, self.ordering)?;
        if let Some(tol) = self.norm_tol {
            let norm = wf.norm();
            if !((norm - 1.0).abs() <= tol) {
                return Err(SplitError::Divergence { norm, tol });
            }
        }
        Ok(t_next)
    }
}
