use std::time::Duration;

/// Wall-clock cap for stage 1 (makespan minimisation). Default 60s, per
/// spec.md §4.3.
pub static STAGE1_TIMEOUT_SECS: env_param::EnvParam<u64> =
    env_param::EnvParam::new("FJSM_STAGE1_TIMEOUT_SECS", "60");

/// Wall-clock cap for stage 2 (total-completion minimisation with makespan
/// fixed). Default 60s.
pub static STAGE2_TIMEOUT_SECS: env_param::EnvParam<u64> =
    env_param::EnvParam::new("FJSM_STAGE2_TIMEOUT_SECS", "60");

/// Multiplier applied to the sum of worst-case per-instance durations to
/// obtain the planning horizon H. Default 1.5, per spec.md §4.3.
pub static HORIZON_FACTOR: env_param::EnvParam<f64> = env_param::EnvParam::new("FJSM_HORIZON_FACTOR", "1.5");

#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    pub stage1_timeout: Duration,
    pub stage2_timeout: Duration,
    pub horizon_factor: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            stage1_timeout: Duration::from_secs(STAGE1_TIMEOUT_SECS.get()),
            stage2_timeout: Duration::from_secs(STAGE2_TIMEOUT_SECS.get()),
            horizon_factor: HORIZON_FACTOR.get(),
        }
    }
}
