use crate::generator::profile::WorldConfig;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use sightcore::{EngineConfig, ScheduleConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub engine: EngineConfig,
    pub schedule: ScheduleConfig,
    pub world: WorldConfig,
    /// Simulated session length.
    pub duration_secs: u64,
    /// Simulated seconds per wall-clock second.
    pub time_scale: f64,
    pub settings_path: Option<PathBuf>,
    pub dwell: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            schedule: ScheduleConfig::default(),
            world: WorldConfig::default(),
            duration_secs: 1_800,
            time_scale: 60.0,
            settings_path: None,
            dwell: false,
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(seed: u64, duration_secs: u64, output_dir: PathBuf) -> Self {
        let mut config = Self::default();
        config.world.seed = seed;
        config.duration_secs = duration_secs;
        config.engine.output_dir = output_dir;
        config
    }

    fn scale(&self) -> f64 {
        if self.time_scale.is_finite() && self.time_scale > 0.0 {
            self.time_scale
        } else {
            1.0
        }
    }

    /// The orchestrator cadence compressed into wall-clock time.
    pub fn wall_clock_schedule(&self) -> ScheduleConfig {
        let scale = self.scale();
        let compress = |ms: u64| ((ms as f64 / scale).round() as u64).max(1);
        ScheduleConfig {
            location_interval_ms: compress(self.schedule.location_interval_ms),
            scan_interval_ms: compress(self.schedule.scan_interval_ms),
            wifi_scan_min_gap_ms: compress(self.schedule.wifi_scan_min_gap_ms),
            wifi_snapshot_min_gap_ms: compress(self.schedule.wifi_snapshot_min_gap_ms),
            notify_min_gap_ms: compress(self.schedule.notify_min_gap_ms),
        }
    }

    pub fn wall_clock_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(self.duration_secs as f64 / self.scale())
    }

    pub fn simulated_secs(&self, wall: std::time::Duration) -> f64 {
        wall.as_secs_f64() * self.scale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn config_from_args_overrides_defaults() {
        let cfg = WorkflowConfig::from_args(42, 600, PathBuf::from("out"));
        assert_eq!(cfg.world.seed, 42);
        assert_eq!(cfg.engine.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.engine.suppress_radius_m, 100.0);
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"duration_secs: 120\ntime_scale: 10\nworld:\n  seed: 3\n  denied: [CELL]\nschedule:\n  scan_interval_ms: 20000\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = WorkflowConfig::load(&path).unwrap();
        assert_eq!(cfg.duration_secs, 120);
        assert_eq!(cfg.world.seed, 3);
        assert_eq!(cfg.world.denied, vec![sightcore::EmitterType::Cell]);
        assert_eq!(cfg.schedule.scan_interval_ms, 20_000);
        assert_eq!(cfg.schedule.location_interval_ms, 10_000);
        assert_eq!(cfg.wall_clock_schedule().scan_interval_ms, 2_000);
        assert_eq!(cfg.wall_clock_duration().as_secs(), 12);
    }

    #[test]
    fn invalid_scale_falls_back_to_real_time() {
        let cfg = WorkflowConfig {
            time_scale: 0.0,
            ..WorkflowConfig::default()
        };
        assert_eq!(cfg.wall_clock_schedule().location_interval_ms, 10_000);
    }
}
