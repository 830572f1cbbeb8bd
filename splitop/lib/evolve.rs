//! Repeated stepping with periodic snapshots.
//!
//! In all 3D arrays, the first (or zero-th) axis indexes time.

use log::{ debug, warn };
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    Arr3,
    error::{ ShapeError, SplitError },
    fft::SpectralTransform,
    grid::Grid,
    propagator::{ Propagator, SplitResult },
    step::Stepper,
    wavefunction::{ self as wfn, Wavefunction },
};

/// Time series of position-space snapshots from a single trajectory.
#[derive(Clone, Debug)]
pub struct Trajectory {
    /// Snapshot times.
    pub t: nd::Array1<f64>,
    /// Amplitudes, shape `(nsnapshots, ngrid, nstates)`.
    pub psi: nd::Array3<C64>,
    /// Number of steps taken in total.
    pub nsteps: usize,
}

impl Trajectory {
    /// Per-state populations at each snapshot, shape `(nsnapshots, nstates)`.
    pub fn populations(&self) -> nd::Array2<f64> {
        self.psi.map_axis(nd::Axis(1), |lane| {
            lane.iter().map(|qk| qk.norm_sqr()).sum::<f64>()
        })
    }

    /// Total probability at each snapshot.
    pub fn norms(&self) -> nd::Array1<f64> {
        self.populations().sum_axis(nd::Axis(1))
    }

    /// Position-space densities summed over states, shape
    /// `(nsnapshots, ngrid)`.
    pub fn densities(&self) -> nd::Array2<f64> {
        self.psi.map_axis(nd::Axis(2), |lane| {
            lane.iter().map(|qk| qk.norm_sqr()).sum::<f64>()
        })
    }

    /// Time and amplitudes of the last snapshot.
    pub fn last(&self) -> Option<(f64, nd::ArrayView2<'_, C64>)> {
        let n = self.t.len();
        (n > 0).then(|| (self.t[n - 1], self.psi.index_axis(nd::Axis(0), n - 1)))
    }

    fn dim(&self) -> (usize, usize) {
        (self.psi.len_of(nd::Axis(1)), self.psi.len_of(nd::Axis(2)))
    }

    fn snapshots(&self) -> nd::iter::AxisIter<'_, C64, nd::Ix2> {
        self.psi.axis_iter(nd::Axis(0))
    }

    fn check_grid(&self, grid: &Grid) -> SplitResult<()> {
        Ok(ShapeError::check("grid", &grid.x(), &[self.dim().0])?)
    }

    fn check_states<S>(&self, what: &'static str, a: &Arr3<S>) -> SplitResult<()>
    where S: nd::Data<Elem = C64>
    {
        let (ngrid, nstates) = self.dim();
        Ok(ShapeError::check(what, a, &[nstates, nstates, ngrid])?)
    }

    /// Expectation value of position at each snapshot.
    pub fn mean_positions(&self, grid: &Grid) -> SplitResult<nd::Array1<f64>> {
        self.check_grid(grid)?;
        Ok(
            self.snapshots()
                .map(|psi| wfn::weighted_mean(&wfn::density_of(psi), grid.x()))
                .collect()
        )
    }

    /// Expectation value of wavenumber at each snapshot.
    pub fn mean_momenta(&self, grid: &Grid) -> SplitResult<nd::Array1<f64>> {
        self.check_grid(grid)?;
        let mut transform = SpectralTransform::new(self.dim().0)?;
        Ok(
            self.snapshots()
                .map(|psi| {
                    let rho = wfn::momentum_density_of(&mut transform, psi);
                    wfn::weighted_mean(&rho, grid.k())
                })
                .collect()
        )
    }

    /// Kinetic energy expectation value at each snapshot.
    pub fn kinetic_energies(&self, grid: &Grid, mass: f64)
        -> SplitResult<nd::Array1<f64>>
    {
        SplitError::check_mass(mass)?;
        self.check_grid(grid)?;
        let mut transform = SpectralTransform::new(self.dim().0)?;
        Ok(
            self.snapshots()
                .map(|psi| {
                    let rho = wfn::momentum_density_of(&mut transform, psi);
                    wfn::kinetic_energy_of(&rho, grid, mass)
                })
                .collect()
        )
    }

    /// Potential energy expectation value at each snapshot for a potential
    /// shaped `(nstates, nstates, ngrid)`.
    pub fn potential_energies<S>(&self, v: &Arr3<S>) -> SplitResult<nd::Array1<f64>>
    where S: nd::Data<Elem = C64>
    {
        self.check_states("potential", v)?;
        Ok(self.snapshots().map(|psi| wfn::potential_energy_of(psi, v)).collect())
    }

    /// Per-state populations in the adiabatic basis `u` at each snapshot,
    /// shape `(nsnapshots, nstates)`.
    pub fn adiabatic_populations<S>(&self, u: &Arr3<S>) -> SplitResult<nd::Array2<f64>>
    where S: nd::Data<Elem = C64>
    {
        self.check_states("adiabatic states", u)?;
        let (_, nstates) = self.dim();
        let mut pops: nd::Array2<f64> = nd::Array2::zeros((self.t.len(), nstates));
        pops.outer_iter_mut().zip(self.snapshots())
            .for_each(|(mut row, psi)| {
                let phi = wfn::adiabatic_amplitudes_of(psi, u);
                row.assign(&wfn::populations_of(phi.view()));
            });
        Ok(pops)
    }

    /// Per-state probabilities on either side of `x_div` at each snapshot,
    /// shape `(nsnapshots, 2, nstates)`; see [`Wavefunction::scattering`].
    pub fn scattering(&self, grid: &Grid, x_div: f64) -> SplitResult<nd::Array3<f64>> {
        self.check_grid(grid)?;
        let (_, nstates) = self.dim();
        let mut out: nd::Array3<f64> = nd::Array3::zeros((self.t.len(), 2, nstates));
        out.outer_iter_mut().zip(self.snapshots())
            .for_each(|(mut split, psi)| {
                split.assign(&wfn::split_populations(psi, grid.x(), x_div));
            });
        Ok(out)
    }

    /// Like [`Self::scattering`], but in the adiabatic basis `u`.
    pub fn adiabatic_scattering<S>(&self, grid: &Grid, u: &Arr3<S>, x_div: f64)
        -> SplitResult<nd::Array3<f64>>
    where S: nd::Data<Elem = C64>
    {
        self.check_grid(grid)?;
        self.check_states("adiabatic states", u)?;
        let (_, nstates) = self.dim();
        let mut out: nd::Array3<f64> = nd::Array3::zeros((self.t.len(), 2, nstates));
        out.outer_iter_mut().zip(self.snapshots())
            .for_each(|(mut split, psi)| {
                let phi = wfn::adiabatic_amplitudes_of(psi, u);
                split.assign(&wfn::split_populations(phi.view(), grid.x(), x_div));
            });
        Ok(out)
    }
}

// growable snapshot record, stacked into a `Trajectory` at the end
struct Recorder {
    t: Vec<f64>,
    psi: Vec<nd::Array2<C64>>,
    last_step: Option<usize>,
}

impl Recorder {
    fn new() -> Self { Self { t: Vec::new(), psi: Vec::new(), last_step: None } }

    fn record(&mut self, step: usize, t: f64, wf: &Wavefunction) {
        self.t.push(t);
        self.psi.push(wf.psi().to_owned());
        self.last_step = Some(step);
    }

    fn finish(self, nsteps: usize, dim: (usize, usize)) -> SplitResult<Trajectory> {
        let t: nd::Array1<f64> = nd::Array1::from_vec(self.t);
        let views: Vec<nd::ArrayView2<C64>>
            = self.psi.iter().map(|qk| qk.view()).collect();
        let psi: nd::Array3<C64>
            = if views.is_empty() {
                nd::Array3::zeros((0, dim.0, dim.1))
            } else {
                nd::stack(nd::Axis(0), &views)?
            };
        Ok(Trajectory { t, psi, nsteps })
    }
}

/// Take `nsteps` steps from time `t0`, recording a snapshot before the first
/// step, after every `save_every`-th step, and after the final step.
///
/// `wf` is left holding the final state. Errors from a step are returned
/// immediately; the wavefunction then holds whatever the failing step left.
pub fn evolve<P>(
    stepper: &Stepper,
    t0: f64,
    wf: &mut Wavefunction,
    prop: &P,
    nsteps: usize,
    save_every: usize,
) -> SplitResult<Trajectory>
where P: Propagator + ?Sized
{
    evolve_while(stepper, t0, wf, prop, nsteps, save_every, |_, _| true)
}

/// Like [`evolve`], but check `keep_going(t, wf)` before every step and stop
/// as soon as it returns `false`, or after `max_steps` steps.
///
/// The condition is only ever evaluated between steps, when `wf` is in
/// position space.
pub fn evolve_while<P, F>(
    stepper: &Stepper,
    t0: f64,
    wf: &mut Wavefunction,
    prop: &P,
    max_steps: usize,
    save_every: usize,
    mut keep_going: F,
) -> SplitResult<Trajectory>
where
    P: Propagator + ?Sized,
    F: FnMut(f64, &Wavefunction) -> bool,
{
    if save_every == 0 { return Err(SplitError::BadSaveEvery); }
    debug!(
        "evolving {} for at most {} steps of dt = {}, saving every {}",
        stepper.ordering(), max_steps, prop.dt(), save_every,
    );
    let mut rec = Recorder::new();
    let mut t = t0;
    let mut k: usize = 0;
    rec.record(k, t, wf);
    while k < max_steps && keep_going(t, &*wf) {
        t = stepper.step(t, wf, prop)
            .map_err(|err| {
                if let SplitError::Divergence { norm, .. } = &err {
                    warn!("diverged at step {} (t = {}): norm = {}", k + 1, t, norm);
                }
                err
            })?;
        k += 1;
        if k % save_every == 0 { rec.record(k, t, wf); }
    }
    if rec.last_step != Some(k) { rec.record(k, t, wf); }
    debug!("finished after {} steps at t = {}", k, t);
    rec.finish(k, wf.dim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        grid::Grid,
        propagator::StaticPropagator,
        step::SplitOperatorType,
    };

    fn setup() -> (Grid, StaticPropagator, Wavefunction, Stepper) {
        let grid = Grid::new(-40.0, 40.0, 256).unwrap();
        let mut v: nd::Array3<C64> = nd::Array3::zeros((2, 2, grid.len()));
        grid.x().iter().enumerate()
            .for_each(|(i, &x)| {
                let c = 0.1 * (-x.powi(2)).exp();
                v[[0, 1, i]] = C64::new(c, 0.0);
                v[[1, 0, i]] = C64::new(c, 0.0);
            });
        let prop = StaticPropagator::new(&grid, 1.0, 0.1, &v).unwrap();
        let wf = Wavefunction::gaussian(&grid, -10.0, 4.0, 1.0, 2, 0).unwrap();
        let stepper = Stepper::new(SplitOperatorType::Vtv, &wf, &prop).unwrap();
        (grid, prop, wf, stepper)
    }

    #[test]
    fn snapshot_layout() {
        let (_, prop, mut wf, stepper) = setup();
        let traj = evolve(&stepper, 0.0, &mut wf, &prop, 25, 10).unwrap();
        // steps 0, 10, 20, and the final step 25
        assert_eq!(traj.t.len(), 4);
        assert_eq!(traj.psi.shape(), &[4, 256, 2]);
        assert_eq!(traj.nsteps, 25);
        assert!((traj.t[1] - 1.0).abs() < 1e-12);
        assert!((traj.t[3] - 2.5).abs() < 1e-12);
        let (t_last, psi_last) = traj.last().unwrap();
        assert!((t_last - 2.5).abs() < 1e-12);
        assert_eq!(psi_last, wf.psi());
        traj.norms().iter().for_each(|n| assert!((n - 1.0).abs() < 1e-10));
        assert_eq!(traj.populations().shape(), &[4, 2]);
        assert_eq!(traj.densities().shape(), &[4, 256]);
    }

    #[test]
    fn no_duplicate_final_snapshot() {
        let (_, prop, mut wf, stepper) = setup();
        let traj = evolve(&stepper, 0.0, &mut wf, &prop, 20, 10).unwrap();
        assert_eq!(traj.t.len(), 3);
        let traj = evolve(&stepper, 0.0, &mut wf, &prop, 0, 10).unwrap();
        assert_eq!(traj.t.len(), 1);
        assert_eq!(traj.nsteps, 0);
    }

    #[test]
    fn zero_save_every_rejected() {
        let (_, prop, mut wf, stepper) = setup();
        let before = wf.psi().to_owned();
        assert!(matches!(
            evolve(&stepper, 0.0, &mut wf, &prop, 10, 0),
            Err(SplitError::BadSaveEvery)
        ));
        assert_eq!(before, wf.psi());
    }

    #[test]
    fn stop_condition() {
        // stop once the packet has passed the coupling region
        let (grid, prop, mut wf, stepper) = setup();
        let traj = evolve_while(&stepper, 0.0, &mut wf, &prop, 10_000, 5, |_, wf| {
            wf.mean_position(&grid).map(|x| x < 10.0).unwrap_or(false)
        }).unwrap();
        assert!(traj.nsteps < 10_000);
        assert!(wf.mean_position(&grid).unwrap() >= 10.0);
        let pops = traj.populations();
        let n = pops.nrows();
        assert!(pops[[n - 1, 1]] > 0.0);
        assert!((pops.row(n - 1).sum() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn mismatched_snapshots_are_an_error() {
        let (_, _, wf, _) = setup();
        let mut rec = Recorder::new();
        rec.record(0, 0.0, &wf);
        rec.t.push(0.1);
        rec.psi.push(nd::Array2::zeros((255, 2)));
        assert!(matches!(rec.finish(1, wf.dim()), Err(SplitError::Array(_))));
    }

    #[test]
    fn free_packet_energies() {
        let grid = Grid::new(-40.0, 40.0, 256).unwrap();
        let mass = 2.0;
        let v: nd::Array3<C64> = nd::Array3::zeros((2, 2, grid.len()));
        let prop = StaticPropagator::new(&grid, mass, 0.1, &v).unwrap();
        let mut wf = Wavefunction::gaussian(&grid, -10.0, 3.0, 1.0, 2, 0).unwrap();
        let ke0 = wf.kinetic_energy(&grid, mass).unwrap();
        for ty in [SplitOperatorType::Plain, SplitOperatorType::Tvt, SplitOperatorType::Vtv] {
            let stepper = Stepper::new(ty, &wf, &prop).unwrap();
            let traj = evolve(&stepper, 0.0, &mut wf.clone(), &prop, 30, 10).unwrap();
            traj.kinetic_energies(&grid, mass).unwrap().iter()
                .for_each(|ke| assert!((ke - ke0).abs() < 1e-10));
            traj.potential_energies(&v).unwrap().iter()
                .for_each(|pe| assert!(pe.abs() < 1e-15));
            traj.mean_momenta(&grid).unwrap().iter()
                .for_each(|k| assert!((k - 3.0).abs() < 1e-6));
            let x = traj.mean_positions(&grid).unwrap();
            x.iter().zip(traj.t.iter())
                .for_each(|(xk, tk)| assert!((xk - (-10.0 + 3.0 / mass * tk)).abs() < 1e-6));
        }
        let bad = Grid::new(-40.0, 40.0, 128).unwrap();
        let stepper = Stepper::new(SplitOperatorType::Vtv, &wf, &prop).unwrap();
        let traj = evolve(&stepper, 0.0, &mut wf, &prop, 1, 1).unwrap();
        assert!(matches!(traj.kinetic_energies(&bad, mass), Err(SplitError::Shape(_))));
        assert!(matches!(traj.kinetic_energies(&grid, -1.0), Err(SplitError::BadMass(_))));
    }

    #[test]
    fn crossing_scattering() {
        let (grid, prop, mut wf, stepper) = setup();
        let traj = evolve_while(&stepper, 0.0, &mut wf, &prop, 10_000, 20, |_, wf| {
            wf.mean_position(&grid).map(|x| x < 10.0).unwrap_or(false)
        }).unwrap();
        let n = traj.t.len();

        let diab = traj.scattering(&grid, 0.0).unwrap();
        assert_eq!(diab.shape(), &[n, 2, 2]);
        diab.outer_iter()
            .for_each(|split| assert!((split.sum() - 1.0).abs() < 1e-10));
        // everything starts reflected (left of the crossing) on state 0, and
        // ends up mostly transmitted with some population on state 1
        assert!((diab[[0, 0, 0]] - 1.0).abs() < 1e-10);
        let last = diab.index_axis(nd::Axis(0), n - 1);
        assert!(last.row(1).sum() > 0.99);
        assert!(last[[1, 1]] > 0.0);
        last.sum_axis(nd::Axis(0)).iter().zip(wf.populations().iter())
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-12));

        let mut v: nd::Array3<C64> = nd::Array3::zeros((2, 2, grid.len()));
        grid.x().iter().enumerate()
            .for_each(|(i, &x)| {
                let c = 0.1 * (-x.powi(2)).exp();
                v[[0, 1, i]] = C64::new(c, 0.0);
                v[[1, 0, i]] = C64::new(c, 0.0);
            });
        let (_, u) = crate::propagator::adiabatic_states(&v).unwrap();
        let adiab = traj.adiabatic_scattering(&grid, &u, 0.0).unwrap();
        adiab.outer_iter()
            .for_each(|split| assert!((split.sum() - 1.0).abs() < 1e-10));
        let pops = traj.adiabatic_populations(&u).unwrap();
        assert_eq!(pops.shape(), &[n, 2]);
        pops.outer_iter()
            .for_each(|row| assert!((row.sum() - 1.0).abs() < 1e-10));
        pops.row(n - 1).iter().zip(wf.adiabatic_populations(&u).unwrap().iter())
            .for_each(|(a, b)| assert!((a - b).abs() < 1e-12));

        let pe = traj.potential_energies(&v).unwrap();
        assert!((pe[n - 1] - wf.potential_energy(&v).unwrap()).abs() < 1e-14);
        let bad: nd::Array3<C64> = nd::Array3::zeros((3, 3, grid.len()));
        assert!(matches!(traj.potential_energies(&bad), Err(SplitError::Shape(_))));
    }
}
