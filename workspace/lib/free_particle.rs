//! Gaussian wavepacket under a uniform inter-state coupling, as configured by
//! a [`Config`].

use std::{ fs, path::Path };
use anyhow::{ Context, Result };
use log::info;
use ndarray as nd;
use ndarray_npy::NpzWriter;
use num_complex::Complex64 as C64;
use splitop::{
    evolve::{ self, Trajectory },
    propagator::adiabatic_states,
    Grid,
    StaticPropagator,
    Stepper,
    Wavefunction,
};
use crate::{ config::Config, uniform_chain };

/// Everything produced by a single run.
#[derive(Clone, Debug)]
pub struct Run {
    pub grid: Grid,
    /// Potential, shape `(nstates, nstates, ngrid)`.
    pub v: nd::Array3<C64>,
    /// Adiabatic states of `v`, shape `(nstates, nstates, ngrid)`.
    pub u: nd::Array3<C64>,
    pub traj: Trajectory,
    /// Final state.
    pub wf: Wavefunction,
}

/// Propagate for `cfg.nsteps` steps, failing if the total probability drifts
/// by more than `norm_tol`.
pub fn run(cfg: &Config, norm_tol: f64) -> Result<Run> {
    let grid = Grid::new(cfg.grid.xmin, cfg.grid.xmax, cfg.grid.ngrid)?;
    let v = uniform_chain(cfg.nstates, grid.len(), cfg.coupling);
    let (_, u) = adiabatic_states(&v)?;
    let prop = StaticPropagator::new(&grid, cfg.mass, cfg.dt, &v)?;
    let mut wf = Wavefunction::gaussian(
        &grid,
        cfg.wavepacket.x0,
        cfg.wavepacket.k0,
        cfg.wavepacket.sigma,
        cfg.nstates,
        cfg.wavepacket.state,
    )?;
    let stepper = Stepper::new(cfg.ordering, &wf, &prop)?
        .with_norm_tolerance(norm_tol)?;

    let now = std::time::Instant::now();
    let traj = evolve::evolve(
        &stepper, 0.0, &mut wf, &prop, cfg.nsteps, cfg.save_every)?;
    info!(
        "{} steps ({}) in {:?}; final norm = {:.12}",
        traj.nsteps, cfg.ordering, now.elapsed(), wf.norm(),
    );
    info!("final populations: {}", wf.populations());
    Ok(Run { grid, v, u, traj, wf })
}

/// Write the grid, trajectory, and its observables to an `.npz` archive at
/// `path`, creating parent directories as needed.
pub fn save<P>(path: P, cfg: &Config, run: &Run) -> Result<()>
where P: AsRef<Path>
{
    let path = path.as_ref();
    if let Some(outdir) = path.parent() {
        if !outdir.as_os_str().is_empty() {
            fs::create_dir_all(outdir)
                .with_context(|| format!("couldn't create {}", outdir.display()))?;
        }
    }
    let Run { grid, v, u, traj, .. } = run;
    let file = fs::File::create(path)
        .with_context(|| format!("couldn't create {}", path.display()))?;
    let mut npz = NpzWriter::new(file);
    npz.add_array("mass", &nd::array![cfg.mass])?;
    npz.add_array("dt", &nd::array![cfg.dt])?;
    npz.add_array("x", &grid.x())?;
    npz.add_array("k", &grid.k())?;
    npz.add_array("t", &traj.t)?;
    npz.add_array("psi", &traj.psi)?;
    npz.add_array("density", &traj.densities())?;
    npz.add_array("R", &traj.mean_positions(grid)?)?;
    npz.add_array("P", &traj.mean_momenta(grid)?)?;
    npz.add_array("diab_populations", &traj.populations())?;
    npz.add_array("adiab_populations", &traj.adiabatic_populations(u)?)?;
    npz.add_array("KE", &traj.kinetic_energies(grid, cfg.mass)?)?;
    npz.add_array("PE", &traj.potential_energies(v)?)?;
    npz.add_array("scatter_diab", &traj.scattering(grid, cfg.x_divide)?)?;
    npz.add_array(
        "scatter_adiab", &traj.adiabatic_scattering(grid, u, cfg.x_divide)?)?;
    npz.finish()?;
    info!("wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use ndarray_npy::NpzReader;
    use tempfile::tempdir;
    use super::*;

    const CONFIG: &str = r#"
        mass = 1.0
        dt = 0.05
        nsteps = 40
        save_every = 10
        ordering = "TVT"
        nstates = 2
        coupling = 0.1
        x_divide = 0.0

        [grid]
        xmin = -20.0
        xmax = 20.0
        ngrid = 64

        [wavepacket]
        x0 = -5.0
        k0 = 1.0
        sigma = 1.5
    "#;

    #[test]
    fn run_and_read_back() {
        let cfg = Config::from_toml(CONFIG).unwrap();
        let run = run(&cfg, 1e-8).unwrap();
        assert_eq!(run.traj.nsteps, 40);
        assert_eq!(run.traj.t.len(), 5);

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("free_particle.npz");
        save(&path, &cfg, &run).unwrap();

        let mut npz = NpzReader::new(fs::File::open(&path).unwrap()).unwrap();
        let t: nd::Array1<f64> = npz.by_name("t.npy").unwrap();
        assert_eq!(t, run.traj.t);
        let psi: nd::Array3<C64> = npz.by_name("psi.npy").unwrap();
        assert_eq!(psi.shape(), &[5, 64, 2]);
        assert_eq!(psi, run.traj.psi);
        let x: nd::Array1<f64> = npz.by_name("x.npy").unwrap();
        assert_eq!(x, run.grid.x());

        // uniform coupling on a free packet: the energies are constant and
        // the populations follow cos²(c t)
        let ke: nd::Array1<f64> = npz.by_name("KE.npy").unwrap();
        ke.iter().for_each(|kek| assert!((kek - ke[0]).abs() < 1e-10));
        let pe: nd::Array1<f64> = npz.by_name("PE.npy").unwrap();
        pe.iter().for_each(|pek| assert!(pek.abs() < 1e-10));
        let pops: nd::Array2<f64> = npz.by_name("diab_populations.npy").unwrap();
        pops.outer_iter().zip(&t)
            .for_each(|(row, tk)| {
                assert!((row[0] - (0.1 * tk).cos().powi(2)).abs() < 1e-10);
            });
        let adiab: nd::Array2<f64> = npz.by_name("adiab_populations.npy").unwrap();
        adiab.outer_iter()
            .for_each(|row| {
                assert!((row[0] - 0.5).abs() < 1e-10);
                assert!((row[1] - 0.5).abs() < 1e-10);
            });
        let scatter: nd::Array3<f64> = npz.by_name("scatter_diab.npy").unwrap();
        assert_eq!(scatter.shape(), &[5, 2, 2]);
        scatter.outer_iter()
            .for_each(|split| assert!((split.sum() - 1.0).abs() < 1e-10));
        let scatter: nd::Array3<f64> = npz.by_name("scatter_adiab.npy").unwrap();
        assert_eq!(scatter.shape(), &[5, 2, 2]);
        let r: nd::Array1<f64> = npz.by_name("R.npy").unwrap();
        assert!((r[0] + 5.0).abs() < 1e-6);
        assert!((r[4] - (-5.0 + 2.0)).abs() < 1e-6);
    }
}
