//! Run configuration read from TOML.
//!
//! ```toml
//! mass = 2000.0
//! dt = 0.1
//! nsteps = 2000
//! save_every = 10
//! ordering = "VTV"
//! nstates = 2
//! coupling = 0.0
//! x_divide = 0.0
//! output = "output/free_particle.npz"
//!
//! [grid]
//! xmin = -50.0
//! xmax = 50.0
//! ngrid = 1024
//!
//! [wavepacket]
//! x0 = -10.0
//! k0 = 20.0
//! sigma = 1.0
//! state = 0
//! ```

use std::{ fs, path::{ Path, PathBuf } };
use anyhow::{ Context, Result, bail };
use serde::Deserialize;
use splitop::SplitOperatorType;

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridConfig {
    pub xmin: f64,
    pub xmax: f64,
    pub ngrid: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WavepacketConfig {
    pub x0: f64,
    pub k0: f64,
    pub sigma: f64,
    #[serde(default)]
    pub state: usize,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub mass: f64,
    pub dt: f64,
    pub nsteps: usize,
    #[serde(default = "default_save_every")]
    pub save_every: usize,
    #[serde(default)]
    pub ordering: SplitOperatorType,
    #[serde(default = "default_nstates")]
    pub nstates: usize,
    /// Uniform off-diagonal coupling between neighboring states.
    #[serde(default)]
    pub coupling: f64,
    /// Dividing point between reflected and transmitted probability.
    #[serde(default)]
    pub x_divide: f64,
    #[serde(default = "default_output")]
    pub output: PathBuf,
    pub grid: GridConfig,
    pub wavepacket: WavepacketConfig,
}

fn default_save_every() -> usize { 10 }

fn default_nstates() -> usize { 1 }

fn default_output() -> PathBuf { PathBuf::from("output/free_particle.npz") }

impl Config {
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).context("malformed configuration")?;
        cfg.check()?;
        Ok(cfg)
    }

    pub fn from_file<P>(path: P) -> Result<Self>
    where P: AsRef<Path>
    {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("couldn't read {}", path.display()))?;
        Self::from_toml(&text)
    }

    fn check(&self) -> Result<()> {
        if self.nsteps == 0 { bail!("nsteps must be greater than 0"); }
        if self.save_every == 0 { bail!("save_every must be greater than 0"); }
        if self.wavepacket.state >= self.nstates {
            bail!(
                "initial state {} out of range for {} states",
                self.wavepacket.state, self.nstates,
            );
        }
        Ok(())
    }
}
