//! Per-depth wavefront statistics.
//!
//! Counters are only read back when `RenderSettings::collect_statistics` is
//! set. With the default settings nothing is copied off the device, so ray
//! count conservation is not checked at all.

use std::time::Duration;

use super::frame::CounterLayout;

/// Counter snapshot of one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    /// Live rays entering each depth, `0..=D`.
    pub rays: Vec<u32>,
    pub shadow_rays: Vec<u32>,
    pub terminated: Vec<u32>,
    pub frame_time: Duration,
}

impl FrameReport {
    pub fn from_counters(layout: CounterLayout, counters: &[u32], frame_time: Duration) -> Self {
        let read = |index: u32| counters.get(index as usize).copied().unwrap_or(0);
        let depths = 0..layout.max_depth;
        Self {
            rays: (0..=layout.max_depth).map(|d| read(layout.rays(d))).collect(),
            shadow_rays: depths.clone().map(|d| read(layout.shadow_rays(d))).collect(),
            terminated: depths.map(|d| read(layout.terminated(d))).collect(),
            frame_time,
        }
    }

    /// Depths at which `rays[d] != rays[d + 1] + terminated[d]`.
    pub fn conservation_violations(&self) -> Vec<usize> {
        self.terminated
            .iter()
            .enumerate()
            .filter(|(d, terminated)| {
                let entering = self.rays[*d] as u64;
                let continuing = self.rays.get(d + 1).copied().unwrap_or(0) as u64;
                entering != continuing + **terminated as u64
            })
            .map(|(d, _)| d)
            .collect()
    }

    pub fn total_rays(&self) -> u64 {
        self.rays.iter().map(|r| *r as u64).sum()
    }

    pub fn total_shadow_rays(&self) -> u64 {
        self.shadow_rays.iter().map(|r| *r as u64).sum()
    }
}

/// Averages reports and logs them every `interval` frames.
#[derive(Debug, Clone)]
pub struct StatsAccumulator {
    interval: u32,
    frames: u32,
    rays: Vec<u64>,
    shadow_rays: Vec<u64>,
    frame_time: Duration,
}

/// Averages over one reporting interval.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageReport {
    pub frames: u32,
    pub rays: Vec<f64>,
    pub shadow_rays: Vec<f64>,
    pub frame_time: Duration,
}

impl Default for StatsAccumulator {
    fn default() -> Self {
        Self::new(100)
    }
}

impl StatsAccumulator {
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1),
            frames: 0,
            rays: Vec::new(),
            shadow_rays: Vec::new(),
            frame_time: Duration::ZERO,
        }
    }

    /// Adds a frame; returns the averages when an interval completes.
    pub fn push(&mut self, report: &FrameReport) -> Option<AverageReport> {
        let violations = report.conservation_violations();
        if !violations.is_empty() {
            tracing::warn!(?violations, rays = ?report.rays, terminated = ?report.terminated, "ray count not conserved");
        }

        add_into(&mut self.rays, &report.rays);
        add_into(&mut self.shadow_rays, &report.shadow_rays);
        self.frame_time += report.frame_time;
        self.frames += 1;
        if self.frames < self.interval {
            return None;
        }

        let n = self.frames as f64;
        let average = AverageReport {
            frames: self.frames,
            rays: self.rays.iter().map(|v| *v as f64 / n).collect(),
            shadow_rays: self.shadow_rays.iter().map(|v| *v as f64 / n).collect(),
            frame_time: self.frame_time / self.frames,
        };
        tracing::info!(
            frames = average.frames,
            frame_ms = average.frame_time.as_secs_f64() * 1000.0,
            rays = ?average.rays,
            shadow_rays = ?average.shadow_rays,
            "wavefront statistics"
        );
        *self = Self::new(self.interval);
        Some(average)
    }
}

fn add_into(sums: &mut Vec<u64>, values: &[u32]) {
    if sums.len() < values.len() {
        sums.resize(values.len(), 0);
    }
    for (sum, value) in sums.iter_mut().zip(values) {
        *sum += *value as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(rays: &[u32], terminated: &[u32]) -> FrameReport {
        FrameReport {
            rays: rays.to_vec(),
            shadow_rays: vec![0; terminated.len()],
            terminated: terminated.to_vec(),
            frame_time: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_from_counters() {
        let layout = CounterLayout::new(2);
        // rays 0..=2, shadow 0..2, terminated 0..2
        let counters = [100, 60, 0, 40, 20, 40, 60];
        let report = FrameReport::from_counters(layout, &counters, Duration::ZERO);
        assert_eq!(report.rays, vec![100, 60, 0]);
        assert_eq!(report.shadow_rays, vec![40, 20]);
        assert_eq!(report.terminated, vec![40, 60]);
        assert!(report.conservation_violations().is_empty());
        assert_eq!(report.total_rays(), 160);
    }

    #[test]
    fn test_conservation_violation_detected() {
        let report = report(&[100, 60, 0], &[30, 60]);
        assert_eq!(report.conservation_violations(), vec![0]);
    }

    #[test]
    fn test_average_every_interval() {
        let mut stats = StatsAccumulator::new(2);
        assert!(stats.push(&report(&[10, 4, 0], &[6, 4])).is_none());
        let average = stats.push(&report(&[20, 8, 0], &[12, 8])).unwrap();
        assert_eq!(average.frames, 2);
        assert_eq!(average.rays, vec![15.0, 6.0, 0.0]);
        assert_eq!(average.frame_time, Duration::from_millis(10));
        // restarted
        assert!(stats.push(&report(&[1, 0, 0], &[1, 0])).is_none());
    }
}
