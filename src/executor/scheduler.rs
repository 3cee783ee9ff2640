use std::time::Duration;

use crate::models::dsl_model::{LoadProfile, RampInterpolation};

/// Maps elapsed run time to the number of VUs that should be running.
#[derive(Debug, Clone)]
pub struct RampScheduler {
    profile: LoadProfile,
}

impl RampScheduler {
    pub fn new(profile: LoadProfile) -> Self {
        Self { profile }
    }

    pub fn total_duration(&self) -> Duration {
        self.profile.total_duration()
    }

    pub fn target_at(&self, elapsed: Duration) -> u64 {
        match &self.profile {
            LoadProfile::Constant { vus, .. } => *vus,
            LoadProfile::Ramping {
                start_vus,
                stages,
                interpolation,
            } => {
                let mut from = *start_vus;
                let mut stage_start = Duration::ZERO;
                for stage in stages {
                    let stage_end = stage_start + stage.duration;
                    if elapsed < stage_end {
                        return match interpolation {
                            RampInterpolation::Step => stage.target,
                            RampInterpolation::Linear => {
                                let progress = (elapsed - stage_start).as_secs_f64()
                                    / stage.duration.as_secs_f64();
                                let delta = stage.target as f64 - from as f64;
                                (from as f64 + delta * progress).round() as u64
                            }
                        };
                    }
                    from = stage.target;
                    stage_start = stage_end;
                }
                from
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::dsl_model::Stage;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn ramping(start_vus: u64, stages: &[(u64, u64)], interpolation: RampInterpolation) -> RampScheduler {
        RampScheduler::new(LoadProfile::Ramping {
            start_vus,
            stages: stages
                .iter()
                .map(|&(d, target)| Stage { duration: secs(d), target })
                .collect(),
            interpolation,
        })
    }

    #[test]
    fn constant_profile_is_flat() {
        let scheduler = RampScheduler::new(LoadProfile::Constant {
            vus: 50,
            duration: secs(20),
        });
        assert_eq!(scheduler.total_duration(), secs(20));
        for t in [0, 1, 10, 19, 20] {
            assert_eq!(scheduler.target_at(secs(t)), 50);
        }
    }

    #[test]
    fn linear_ramp_hits_midpoint() {
        let scheduler = ramping(0, &[(30, 10_000)], RampInterpolation::Linear);
        assert_eq!(scheduler.target_at(Duration::ZERO), 0);
        assert_eq!(scheduler.target_at(secs(15)), 5_000);
        assert_eq!(scheduler.target_at(secs(3)), 1_000);
        assert_eq!(scheduler.target_at(secs(30)), 10_000);
        assert_eq!(scheduler.target_at(secs(45)), 10_000);
    }

    #[test]
    fn linear_ramp_chains_stages() {
        let scheduler = ramping(10, &[(10, 110), (10, 110), (20, 10)], RampInterpolation::Linear);
        assert_eq!(scheduler.total_duration(), secs(40));
        assert_eq!(scheduler.target_at(secs(5)), 60);
        assert_eq!(scheduler.target_at(secs(15)), 110);
        assert_eq!(scheduler.target_at(secs(30)), 60);
        assert_eq!(scheduler.target_at(secs(40)), 10);
    }

    #[test]
    fn step_ramp_jumps_at_stage_start() {
        let scheduler = ramping(0, &[(10, 100), (10, 20)], RampInterpolation::Step);
        assert_eq!(scheduler.target_at(Duration::ZERO), 100);
        assert_eq!(scheduler.target_at(secs(9)), 100);
        assert_eq!(scheduler.target_at(secs(10)), 20);
        assert_eq!(scheduler.target_at(secs(25)), 20);
    }

    #[test]
    fn zero_length_stage_jumps() {
        let scheduler = ramping(0, &[(0, 40), (10, 40)], RampInterpolation::Linear);
        assert_eq!(scheduler.target_at(Duration::ZERO), 40);
        assert_eq!(scheduler.target_at(secs(5)), 40);
    }

    #[test]
    fn linear_target_is_monotone_while_ramping_up() {
        let scheduler = ramping(0, &[(30, 10_000)], RampInterpolation::Linear);
        let mut last = 0;
        for ms in (0..=30_000).step_by(250) {
            let target = scheduler.target_at(Duration::from_millis(ms));
            assert!(target >= last);
            last = target;
        }
    }
}
