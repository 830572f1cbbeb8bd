//! Short-time evolution operators for the split-operator stepper.
//!
//! A [`Propagator`] hands out the four operators a step may need, evaluated
//! at a given simulation time:
//! - kinetic, full and half timestep: length-`ngrid` arrays of phase factors,
//!   applied in momentum space;
//! - potential, full and half timestep: `(nstates, nstates, ngrid)` arrays
//!   holding one state-coupling matrix per grid point, applied in position
//!   space.
//!
//! Units are such that *ħ* = 1, i.e. the kinetic factors are
//! exp(-i *k*² *dt* / 2*m*) and the potential factors are exp(-i *V*(*x*) *dt*)
//! for a Hermitian state-coupling matrix *V*(*x*).

use log::debug;
use ndarray as nd;
use ndarray_linalg::{ EighInto, UPLO };
use num_complex::Complex64 as C64;
use crate::{
    Arr2,
    Arr3,
    error::{ ShapeError, SplitError },
    grid::Grid,
};

pub type SplitResult<T> = Result<T, SplitError>;

// relative tolerance for Hermiticity checks on potential matrices
const HERM_EPSILON: f64 = 1e-12;

/// Source of kinetic and potential propagators for a fixed timestep.
///
/// All queries must be deterministic: two calls with the same `t` return
/// identical arrays, and no query mutates the provider. Providers for
/// time-independent systems may ignore `t` and hand out borrowed,
/// precomputed operators.
pub trait Propagator {
    /// Timestep covered by the full-step operators.
    fn dt(&self) -> f64;

    /// Number of grid points the operators act on.
    fn ngrid(&self) -> usize;

    /// Number of electronic states the operators act on.
    fn nstates(&self) -> usize;

    /// Full-step kinetic operator, shape `(ngrid,)`.
    fn kinetic(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>>;

    /// Half-step kinetic operator, shape `(ngrid,)`.
    fn half_kinetic(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>>;

    /// Full-step potential operator, shape `(nstates, nstates, ngrid)`.
    fn potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>>;

    /// Half-step potential operator, shape `(nstates, nstates, ngrid)`.
    fn half_potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>>;
}

impl<P> Propagator for &P
where P: Propagator + ?Sized
{
    fn dt(&self) -> f64 { (**self).dt() }

    fn ngrid(&self) -> usize { (**self).ngrid() }

    fn nstates(&self) -> usize { (**self).nstates() }

    fn kinetic(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        (**self).kinetic(t)
    }

    fn half_kinetic(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        (**self).half_kinetic(t)
    }

    fn potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        (**self).potential(t)
    }

    fn half_potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        (**self).half_potential(t)
    }
}

/// Compute the free-particle kinetic phase factors exp(-i *k*² *dt* / 2*m*)
/// over the (FFT-ordered) wavenumbers of `grid`.
pub fn free_kinetic(grid: &Grid, mass: f64, dt: f64) -> nd::Array1<C64> {
    grid.k().mapv(|kk| C64::cis(-kk.powi(2) * dt / (2.0 * mass)))
}

fn check_hermitian<S>(h: &Arr2<S>, idx: usize) -> SplitResult<()>
where S: nd::Data<Elem = C64>
{
    let scale = h.iter().map(|hjk| hjk.norm()).fold(0.0, f64::max).max(1.0);
    let n = h.nrows();
    for j in 0..n {
        for k in j..n {
            if (h[[j, k]] - h[[k, j]].conj()).norm() > HERM_EPSILON * scale {
                return Err(SplitError::NotHermitian(idx));
            }
        }
    }
    Ok(())
}

// eigenvalues in ascending order, with eigenvectors as columns
fn eigh<S>(h: &Arr2<S>) -> SplitResult<(nd::Array1<f64>, nd::Array2<C64>)>
where S: nd::Data<Elem = C64>
{
    if h.nrows() == 1 {
        return Ok((nd::array![h[[0, 0]].re], nd::array![[C64::new(1.0, 0.0)]]));
    }
    Ok(h.to_owned().eigh_into(UPLO::Lower)?)
}

/// Compute the unitary exp(-i *h* *dt*) for a single Hermitian matrix `h` by
/// diagonalization.
///
/// *Panics if `h` is not square*.
pub fn hermitian_propagator<S>(h: &Arr2<S>, dt: f64) -> SplitResult<nd::Array2<C64>>
where S: nd::Data<Elem = C64>
{
    assert_eq!(h.nrows(), h.ncols(), "hermitian_propagator requires a square matrix");
    if h.nrows() == 1 {
        return Ok(nd::array![[C64::cis(-h[[0, 0]].re * dt)]]);
    }
    let (e, v) = eigh(h)?;
    let phases: nd::Array1<C64> = e.mapv(|ek| C64::cis(-ek * dt));
    let vd = &v * &phases;
    let vh = v.t().mapv(|vjk| vjk.conj());
    Ok(vd.dot(&vh))
}

/// Compute exp(-i *V*(*x*) *dt*) at every grid point for a potential shaped
/// `(nstates, nstates, ngrid)`.
///
/// Each `nstates × nstates` slice must be Hermitian.
pub fn potential_propagators<S>(v: &Arr3<S>, dt: f64) -> SplitResult<nd::Array3<C64>>
where S: nd::Data<Elem = C64>
{
    let (ns, ns2, ngrid) = v.dim();
    ShapeError::check_dims("potential", (ns, ns), (ns, ns2))?;
    let mut u: nd::Array3<C64> = nd::Array3::zeros(v.raw_dim());
    for i in 0..ngrid {
        let vi = v.slice(nd::s![.., .., i]);
        check_hermitian(&vi, i)?;
        let ui = hermitian_propagator(&vi, dt)?;
        u.slice_mut(nd::s![.., .., i]).assign(&ui);
    }
    Ok(u)
}

/// Compute the adiabatic states of a potential shaped
/// `(nstates, nstates, ngrid)`.
///
/// Returns energies shaped `(nstates, ngrid)` in ascending order at each grid
/// point, and the eigenvectors shaped `(nstates, nstates, ngrid)`, where
/// `u[[j, a, i]]` is the amplitude of diabatic state `j` in adiabatic state
/// `a` at grid point `i`. Eigenvector phases are arbitrary.
pub fn adiabatic_states<S>(v: &Arr3<S>)
    -> SplitResult<(nd::Array2<f64>, nd::Array3<C64>)>
where S: nd::Data<Elem = C64>
{
    let (ns, ns2, ngrid) = v.dim();
    ShapeError::check_dims("potential", (ns, ns), (ns, ns2))?;
    let mut e: nd::Array2<f64> = nd::Array2::zeros((ns, ngrid));
    let mut u: nd::Array3<C64> = nd::Array3::zeros(v.raw_dim());
    for i in 0..ngrid {
        let vi = v.slice(nd::s![.., .., i]);
        check_hermitian(&vi, i)?;
        let (ei, ui) = eigh(&vi)?;
        e.column_mut(i).assign(&ei);
        u.slice_mut(nd::s![.., .., i]).assign(&ui);
    }
    Ok((e, u))
}

fn check_potential_shape<S>(v: &Arr3<S>, ngrid: usize) -> SplitResult<usize>
where S: nd::Data<Elem = C64>
{
    let ns = v.len_of(nd::Axis(0));
    if ns == 0 { return Err(SplitError::EmptyStates); }
    ShapeError::check("potential", v, &[ns, ns, ngrid])?;
    Ok(ns)
}

/// Propagators for a time-independent Hamiltonian, computed once at
/// construction.
#[derive(Clone, Debug)]
pub struct StaticPropagator {
    dt: f64,
    kinetic: nd::Array1<C64>,
    half_kinetic: nd::Array1<C64>,
    potential: nd::Array3<C64>,
    half_potential: nd::Array3<C64>,
}

impl StaticPropagator {
    /// Construct for a particle of mass `mass` on `grid`, with Hermitian
    /// potential `v` shaped `(nstates, nstates, ngrid)`.
    pub fn new<S>(grid: &Grid, mass: f64, dt: f64, v: &Arr3<S>)
        -> SplitResult<Self>
    where S: nd::Data<Elem = C64>
    {
        SplitError::check_mass(mass)?;
        SplitError::check_timestep(dt)?;
        let ns = check_potential_shape(v, grid.len())?;
        debug!(
            "precomputing static propagators: ngrid = {}, nstates = {}, dt = {}",
            grid.len(), ns, dt,
        );
        Ok(Self {
            dt,
            kinetic: free_kinetic(grid, mass, dt),
            half_kinetic: free_kinetic(grid, mass, dt / 2.0),
            potential: potential_propagators(v, dt)?,
            half_potential: potential_propagators(v, dt / 2.0)?,
        })
    }

    /// Assemble from precomputed operators.
    ///
    /// Only shapes are checked; unitarity of the operators is the caller's
    /// responsibility.
    pub fn from_parts(
        dt: f64,
        kinetic: nd::Array1<C64>,
        half_kinetic: nd::Array1<C64>,
        potential: nd::Array3<C64>,
        half_potential: nd::Array3<C64>,
    ) -> SplitResult<Self>
    {
        SplitError::check_timestep(dt)?;
        let ngrid = kinetic.len();
        if ngrid == 0 { return Err(SplitError::EmptyGrid); }
        ShapeError::check("half_kinetic", &half_kinetic, &[ngrid])?;
        let ns = check_potential_shape(&potential, ngrid)?;
        ShapeError::check("half_potential", &half_potential, &[ns, ns, ngrid])?;
        Ok(Self { dt, kinetic, half_kinetic, potential, half_potential })
    }
}

impl Propagator for StaticPropagator {
    fn dt(&self) -> f64 { self.dt }

    fn ngrid(&self) -> usize { self.kinetic.len() }

    fn nstates(&self) -> usize { self.potential.len_of(nd::Axis(0)) }

    fn kinetic(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        Ok(self.kinetic.view().into())
    }

    fn half_kinetic(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        Ok(self.half_kinetic.view().into())
    }

    fn potential(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        Ok(self.potential.view().into())
    }

    fn half_potential(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        Ok(self.half_potential.view().into())
    }
}

/// Propagators for a time-dependent potential described by a function of
/// time.
///
/// The kinetic operators are computed once; potential operators are
/// recomputed from `potential(t)` on every query. `potential` must be a pure
/// function of `t` returning Hermitian matrices shaped
/// `(nstates, nstates, ngrid)`.
pub struct TimeDependentPropagator<F>
where F: Fn(f64) -> nd::Array3<C64>
{
    dt: f64,
    nstates: usize,
    kinetic: nd::Array1<C64>,
    half_kinetic: nd::Array1<C64>,
    potential: F,
}

impl<F> TimeDependentPropagator<F>
where F: Fn(f64) -> nd::Array3<C64>
{
    /// Construct for a particle of mass `mass` on `grid`, for a trajectory
    /// starting at time `t0`.
    ///
    /// `potential` is sampled once at `t0` to determine the number of
    /// electronic states and validate its shape and Hermiticity.
    pub fn new(grid: &Grid, mass: f64, dt: f64, t0: f64, potential: F)
        -> SplitResult<Self>
    {
        SplitError::check_mass(mass)?;
        SplitError::check_timestep(dt)?;
        let v0 = potential(t0);
        let nstates = check_potential_shape(&v0, grid.len())?;
        potential_propagators(&v0, dt)?;
        debug!(
            "time-dependent propagator: ngrid = {}, nstates = {}, dt = {}",
            grid.len(), nstates, dt,
        );
        Ok(Self {
            dt,
            nstates,
            kinetic: free_kinetic(grid, mass, dt),
            half_kinetic: free_kinetic(grid, mass, dt / 2.0),
            potential,
        })
    }

    fn potential_at(&self, t: f64, dt: f64) -> SplitResult<nd::Array3<C64>> {
        let v = (self.potential)(t);
        ShapeError::check(
            "potential", &v, &[self.nstates, self.nstates, self.kinetic.len()])?;
        potential_propagators(&v, dt)
    }
}

impl<F> Propagator for TimeDependentPropagator<F>
where F: Fn(f64) -> nd::Array3<C64>
{
    fn dt(&self) -> f64 { self.dt }

    fn ngrid(&self) -> usize { self.kinetic.len() }

    fn nstates(&self) -> usize { self.nstates }

    fn kinetic(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        Ok(self.kinetic.view().into())
    }

    fn half_kinetic(&self, _t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix1>> {
        Ok(self.half_kinetic.view().into())
    }

    fn potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        self.potential_at(t, self.dt).map(nd::CowArray::from)
    }

    fn half_potential(&self, t: f64) -> SplitResult<nd::CowArray<'_, C64, nd::Ix3>> {
        self.potential_at(t, self.dt / 2.0).map(nd::CowArray::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_unitary(u: &nd::Array2<C64>) -> bool {
        let uh = u.t().mapv(|x| x.conj());
        let p = uh.dot(u);
        p.indexed_iter().all(|((j, k), pjk)| {
            let target = if j == k { C64::new(1.0, 0.0) } else { C64::new(0.0, 0.0) };
            (pjk - target).norm() < 1e-12
        })
    }

    #[test]
    fn scalar_propagator() {
        let h = nd::array![[C64::new(2.0, 0.0)]];
        let u = hermitian_propagator(&h, 0.3).unwrap();
        assert!((u[[0, 0]] - C64::cis(-0.6)).norm() < 1e-15);
    }

    #[test]
    fn pauli_x_propagator() {
        // exp(-i σx θ) = cos θ - i σx sin θ
        let c = 0.7;
        let dt = 0.4;
        let h = nd::array![
            [C64::new(0.0, 0.0), C64::new(c, 0.0)],
            [C64::new(c, 0.0), C64::new(0.0, 0.0)],
        ];
        let u = hermitian_propagator(&h, dt).unwrap();
        let th = c * dt;
        assert!((u[[0, 0]] - C64::new(th.cos(), 0.0)).norm() < 1e-12);
        assert!((u[[0, 1]] - C64::new(0.0, -th.sin())).norm() < 1e-12);
        assert!((u[[1, 0]] - C64::new(0.0, -th.sin())).norm() < 1e-12);
        assert!((u[[1, 1]] - C64::new(th.cos(), 0.0)).norm() < 1e-12);
        assert!(is_unitary(&u));
    }

    #[test]
    fn non_hermitian_rejected() {
        let mut v: nd::Array3<C64> = nd::Array3::zeros((2, 2, 4));
        v[[0, 1, 3]] = C64::new(1.0, 0.0);
        assert!(matches!(potential_propagators(&v, 0.1), Err(SplitError::NotHermitian(3))));
    }

    #[test]
    fn static_shapes() {
        let grid = Grid::new(-5.0, 5.0, 32).unwrap();
        let v: nd::Array3<C64> = nd::Array3::zeros((2, 2, 32));
        let p = StaticPropagator::new(&grid, 1.0, 0.1, &v).unwrap();
        assert_eq!(p.ngrid(), 32);
        assert_eq!(p.nstates(), 2);
        assert_eq!(p.dt(), 0.1);
        assert_eq!(p.potential(0.0).unwrap().shape(), &[2, 2, 32]);
        // zero potential gives the identity at every grid point
        let vh = p.half_potential(0.0).unwrap();
        assert!((vh[[0, 0, 5]] - C64::new(1.0, 0.0)).norm() < 1e-15);
        assert!(vh[[0, 1, 5]].norm() < 1e-15);
        // half-step kinetic squared is the full step
        let kh = p.half_kinetic(0.0).unwrap();
        let kf = p.kinetic(0.0).unwrap();
        kh.iter().zip(kf.iter())
            .for_each(|(h, f)| assert!((h * h - f).norm() < 1e-12));

        let bad: nd::Array3<C64> = nd::Array3::zeros((2, 2, 31));
        assert!(matches!(
            StaticPropagator::new(&grid, 1.0, 0.1, &bad),
            Err(SplitError::Shape(_))
        ));
        assert!(matches!(
            StaticPropagator::new(&grid, 0.0, 0.1, &v),
            Err(SplitError::BadMass(_))
        ));
        assert!(matches!(
            StaticPropagator::new(&grid, 1.0, -0.1, &v),
            Err(SplitError::BadTimestep(_))
        ));
    }

    #[test]
    fn from_parts_shapes() {
        let k: nd::Array1<C64> = nd::Array1::ones(8);
        let v: nd::Array3<C64> = nd::Array3::zeros((1, 1, 8));
        assert!(StaticPropagator::from_parts(0.1, k.clone(), k.clone(), v.clone(), v.clone()).is_ok());
        let v_bad: nd::Array3<C64> = nd::Array3::zeros((2, 2, 8));
        assert!(matches!(
            StaticPropagator::from_parts(0.1, k.clone(), k, v, v_bad),
            Err(SplitError::Shape(_))
        ));
    }

    #[test]
    fn time_dependent_is_deterministic() {
        let grid = Grid::new(-5.0, 5.0, 16).unwrap();
        let x = grid.x().to_owned();
        let p = TimeDependentPropagator::new(&grid, 2000.0, 0.1, 0.0, move |t| {
            let mut v: nd::Array3<C64> = nd::Array3::zeros((2, 2, x.len()));
            x.iter().enumerate().for_each(|(i, xi)| {
                v[[0, 0, i]] = C64::new(0.01 * xi.tanh(), 0.0);
                v[[1, 1, i]] = C64::new(-0.01 * xi.tanh(), 0.0);
                v[[0, 1, i]] = C64::new(0.005 * t.cos(), 0.0);
                v[[1, 0, i]] = C64::new(0.005 * t.cos(), 0.0);
            });
            v
        }).unwrap();
        assert_eq!(p.nstates(), 2);
        let a = p.potential(1.5).unwrap().to_owned();
        let b = p.potential(1.5).unwrap().to_owned();
        assert_eq!(a, b);
        let c = p.potential(0.0).unwrap().to_owned();
        assert_ne!(a, c);
    }

    #[test]
    fn time_dependent_checked_at_start_time() {
        // the potential gains a third state for t >= 1
        let grid = Grid::new(-5.0, 5.0, 16).unwrap();
        let n = grid.len();
        let potential = move |t: f64| {
            let ns = if t >= 1.0 { 3 } else { 2 };
            nd::Array3::<C64>::zeros((ns, ns, n))
        };
        let p = TimeDependentPropagator::new(&grid, 1.0, 0.1, 0.0, potential).unwrap();
        assert_eq!(p.nstates(), 2);
        assert!(matches!(p.potential(1.5), Err(SplitError::Shape(_))));
        let p = TimeDependentPropagator::new(&grid, 1.0, 0.1, 1.5, potential).unwrap();
        assert_eq!(p.nstates(), 3);

        let skewed = move |t: f64| {
            let mut v = nd::Array3::<C64>::zeros((2, 2, n));
            if t >= 1.0 { v[[0, 1, 4]] = C64::new(1.0, 0.0); }
            v
        };
        assert!(TimeDependentPropagator::new(&grid, 1.0, 0.1, 0.0, skewed).is_ok());
        assert!(matches!(
            TimeDependentPropagator::new(&grid, 1.0, 0.1, 2.0, skewed),
            Err(SplitError::NotHermitian(4))
        ));
    }

    #[test]
    fn adiabatic_states_of_crossing() {
        // V = [[a, c], [c, -a]] has energies ±sqrt(a² + c²)
        let (a, c) = (0.3, 0.4);
        let mut v: nd::Array3<C64> = nd::Array3::zeros((2, 2, 3));
        v.slice_mut(nd::s![0, 0, ..]).fill(C64::new(a, 0.0));
        v.slice_mut(nd::s![1, 1, ..]).fill(C64::new(-a, 0.0));
        v.slice_mut(nd::s![0, 1, ..]).fill(C64::new(c, 0.0));
        v.slice_mut(nd::s![1, 0, ..]).fill(C64::new(c, 0.0));
        let (e, u) = adiabatic_states(&v).unwrap();
        assert_eq!(e.shape(), &[2, 3]);
        assert_eq!(u.shape(), &[2, 2, 3]);
        assert!((e[[0, 1]] + 0.5).abs() < 1e-12);
        assert!((e[[1, 1]] - 0.5).abs() < 1e-12);
        let u1 = u.slice(nd::s![.., .., 1]).to_owned();
        assert!(is_unitary(&u1));
        // V u = u E
        let v1: nd::ArrayView2<C64> = v.slice(nd::s![.., .., 1]);
        let vu = v1.dot(&u1);
        (0..2).for_each(|b| {
            (0..2).for_each(|j| {
                assert!((vu[[j, b]] - u1[[j, b]] * e[[b, 1]]).norm() < 1e-12);
            });
        });

        let scalar: nd::Array3<C64> = nd::Array3::from_elem((1, 1, 4), C64::new(2.0, 0.0));
        let (e, u) = adiabatic_states(&scalar).unwrap();
        assert!(e.iter().all(|ek| *ek == 2.0));
        assert!(u.iter().all(|uk| *uk == C64::new(1.0, 0.0)));

        let mut skewed: nd::Array3<C64> = nd::Array3::zeros((2, 2, 4));
        skewed[[1, 0, 2]] = C64::new(1.0, 0.0);
        assert!(matches!(adiabatic_states(&skewed), Err(SplitError::NotHermitian(2))));
    }
}
