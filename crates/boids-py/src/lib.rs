use boids_core::config::FlockConfig;
use boids_core::flock::Flock;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

/// Python view of a flock; a renderer reads positions or segments each frame.
#[pyclass(name = "Flock")]
struct PyFlock {
    inner: Flock,
}

#[pymethods]
impl PyFlock {
    #[new]
    #[pyo3(signature = (agent_count=250, seed=42, config_json=None))]
    fn new(agent_count: usize, seed: u64, config_json: Option<&str>) -> PyResult<Self> {
        let mut config = match config_json {
            Some(json) => {
                FlockConfig::from_json(json).map_err(|e| PyValueError::new_err(e.to_string()))?
            }
            None => FlockConfig::default(),
        };
        config.agent_count = agent_count;
        config.seed = seed;
        let inner = Flock::spawn(config).map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Advance one frame; returns the frame's total time in microseconds.
    fn step(&mut self) -> u64 {
        self.inner.step().total_us
    }

    #[getter]
    fn frame_index(&self) -> usize {
        self.inner.frame_index()
    }

    fn __len__(&self) -> usize {
        self.inner.agents().len()
    }

    fn positions(&self) -> Vec<[f64; 3]> {
        self.inner.positions()
    }

    fn velocities(&self) -> Vec<[f64; 3]> {
        self.inner.velocities()
    }

    fn segments(&self) -> Vec<[[f64; 3]; 2]> {
        self.inner.segments()
    }

    fn run_experiment_json(&mut self, frames: usize, sample_every: usize) -> PyResult<String> {
        let summary = self
            .inner
            .try_run_experiment(frames, sample_every)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        serde_json::to_string(&summary).map_err(|e| PyValueError::new_err(e.to_string()))
    }
}

#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_class::<PyFlock>()?;
    Ok(())
}
