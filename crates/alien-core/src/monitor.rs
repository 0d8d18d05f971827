//! Statistics published by the stepper after every committed step.

use crate::types::MAX_COLORS;
use serde::{Deserialize, Serialize};

/// Snapshot of the world at the end of a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimestepData {
    pub num_cells_by_color: [u64; MAX_COLORS],
    pub num_connections: u64,
    pub num_particles: u64,
    pub num_tokens: u64,
    /// Energy of cells, tokens and particles
    pub total_energy: f64,
}

impl TimestepData {
    pub fn num_cells(&self) -> u64 {
        self.num_cells_by_color.iter().sum()
    }
}

/// Activity counters accumulated during a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeIntervalData {
    pub num_created_cells: u64,
    pub num_successful_attacks: u64,
    pub num_failed_attacks: u64,
    pub num_muscle_activities: u64,
}

impl TimeIntervalData {
    pub fn merge(&mut self, other: &TimeIntervalData) {
        self.num_created_cells += other.num_created_cells;
        self.num_successful_attacks += other.num_successful_attacks;
        self.num_failed_attacks += other.num_failed_attacks;
        self.num_muscle_activities += other.num_muscle_activities;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonitorData {
    pub timestep: u64,
    pub timestep_data: TimestepData,
    pub time_interval_data: TimeIntervalData,
}

/// One sample of the long-term history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestep: u64,
    pub num_cells: u64,
    pub num_cells_by_color: [u64; MAX_COLORS],
    pub num_connections: u64,
    pub num_particles: u64,
    /// Interval counters averaged over the steps since the previous sample
    pub avg_created_cells: f64,
    pub avg_successful_attacks: f64,
    pub avg_failed_attacks: f64,
    pub avg_muscle_activities: f64,
}

/// Long-term statistics, sampled every `timestep_delta` steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatisticsHistory {
    timestep_delta: u64,
    samples: Vec<HistorySample>,
    accumulated: TimeIntervalData,
    accumulations: u64,
}

impl StatisticsHistory {
    pub fn new(timestep_delta: u64) -> Self {
        Self {
            timestep_delta,
            samples: Vec::new(),
            accumulated: TimeIntervalData::default(),
            accumulations: 1,
        }
    }

    pub fn add(&mut self, data: &MonitorData) {
        let due = match self.samples.last() {
            None => true,
            Some(last) => data.timestep.saturating_sub(last.timestep) > self.timestep_delta,
        };
        if !due {
            self.accumulated.merge(&data.time_interval_data);
            self.accumulations += 1;
            return;
        }

        let n = self.accumulations as f64;
        self.samples.push(HistorySample {
            timestep: data.timestep,
            num_cells: data.timestep_data.num_cells(),
            num_cells_by_color: data.timestep_data.num_cells_by_color,
            num_connections: data.timestep_data.num_connections,
            num_particles: data.timestep_data.num_particles,
            avg_created_cells: self.accumulated.num_created_cells as f64 / n,
            avg_successful_attacks: self.accumulated.num_successful_attacks as f64 / n,
            avg_failed_attacks: self.accumulated.num_failed_attacks as f64 / n,
            avg_muscle_activities: self.accumulated.num_muscle_activities as f64 / n,
        });
        self.accumulated = TimeIntervalData::default();
        self.accumulations = 1;
    }

    pub fn samples(&self) -> &[HistorySample] {
        &self.samples
    }
}

impl Default for StatisticsHistory {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(timestep: u64, created: u64) -> MonitorData {
        MonitorData {
            timestep,
            timestep_data: TimestepData {
                num_cells_by_color: [1, 2, 0, 0, 0, 0, 3],
                ..Default::default()
            },
            time_interval_data: TimeIntervalData {
                num_created_cells: created,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_num_cells_sums_colors() {
        assert_eq!(monitor(0, 0).timestep_data.num_cells(), 6);
    }

    #[test]
    fn test_history_samples_every_delta() {
        let mut history = StatisticsHistory::new(10);
        for t in 0..=22 {
            history.add(&monitor(t, 2));
        }
        let samples = history.samples();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].timestep, 0);
        assert_eq!(samples[1].timestep, 11);
        assert_eq!(samples[2].timestep, 22);
        assert_eq!(samples[1].num_cells, 6);
        // ten accumulated steps of 2 over eleven accumulations
        assert!((samples[1].avg_created_cells - 20.0 / 11.0).abs() < 1e-12);
    }
}
