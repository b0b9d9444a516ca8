//! The monitoring session: everything that is derived from a stream of readings.
//!
//! Processing a reading is a pure transformation, see [`process`]. A
//! [`Session`] owns the state between readings and the latest [`MonitorView`]
//! for the presentation layer.
use std::time::{Duration, Instant};

use bevy::prelude::Resource;
use filter::{ExponentialSmoother, SmoothingFactor};
use nalgebra::Point2;
use serde::Serialize;
use serde_with::{DurationMilliSeconds, serde_as};

use crate::{
    config::PlantarConfig,
    cop::{CenterOfPressure, CopConfig, Peak, instantaneous_peak},
    error::Result,
    gait::{Activation, GaitConfig, GaitPhase, GaitState},
    heatmap::{HeatmapCell, HeatmapConfig, heatmap_cells},
    layout::{self, Bounds, CoordinateMap},
    region::{PressureSnapshot, RegionAverages, RegionHistory, Regions},
    sensor::{
        SensorId, SensorReading,
        pressure::{Pressures, UnitConverter},
    },
};

/// The constant part of the processing, built once from a validated config.
#[derive(Debug, Clone)]
pub struct Pipeline {
    sensors: Vec<SensorId>,
    coordinates: CoordinateMap,
    bounds: Bounds,
    regions: Regions,
    converter: UnitConverter,
    cop: CopConfig,
    gait: GaitConfig,
    heatmap: HeatmapConfig,
    peak_alpha: SmoothingFactor,
    region_capacity: usize,
}

impl Pipeline {
    pub fn new(config: &PlantarConfig) -> Result<Self> {
        config.validate()?;

        let coordinates = layout::normalize(&config.sensors.raw, &config.sensors.target);
        let bounds = Bounds::of(&coordinates);

        Ok(Self {
            sensors: config.sensors.ids.clone(),
            coordinates,
            bounds,
            regions: Regions::new(config.regions.sensors.clone()),
            converter: UnitConverter::new(config.pressure.calibration),
            cop: config.center_of_pressure.clone(),
            gait: config.gait.clone(),
            heatmap: config.heatmap.clone(),
            peak_alpha: config.smoothing.peak_alpha,
            region_capacity: config.regions.history_capacity,
        })
    }

    #[must_use]
    pub fn sensors(&self) -> &[SensorId] {
        &self.sensors
    }

    /// Sensor positions in the target frame.
    #[must_use]
    pub fn coordinates(&self) -> &CoordinateMap {
        &self.coordinates
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    #[must_use]
    pub fn regions(&self) -> &Regions {
        &self.regions
    }

    fn snapshot(&self, elapsed: Duration, reading: &SensorReading) -> (Pressures, PressureSnapshot) {
        let pressures = self.converter.convert(reading, &self.sensors);
        let snapshot = PressureSnapshot::new(elapsed, &pressures, &self.regions);

        (pressures, snapshot)
    }
}

/// Everything a session remembers between two readings.
///
/// The default state keeps no history at all, use [`SessionState::new`] to
/// size the buffers for a pipeline.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    peak: ExponentialSmoother,
    gait: GaitState,
    cop: CenterOfPressure,
    region_history: RegionHistory,
    /// Time of the first processed reading, or of the latest hydration.
    origin: Option<Instant>,
    /// Elapsed session time at `origin`.
    offset: Duration,
    session_max: f32,
    samples: u64,
    steps: u64,
}

impl SessionState {
    #[must_use]
    pub fn new(pipeline: &Pipeline) -> Self {
        Self {
            peak: ExponentialSmoother::new(pipeline.peak_alpha),
            gait: GaitState::default(),
            cop: CenterOfPressure::new(pipeline.cop.trajectory_capacity),
            region_history: RegionHistory::new(pipeline.region_capacity),
            origin: None,
            offset: Duration::ZERO,
            session_max: 0.0,
            samples: 0,
            steps: 0,
        }
    }

    #[must_use]
    pub fn gait(&self) -> &GaitState {
        &self.gait
    }
}

/// Read-only snapshot of all derived signals, as shown to the user.
#[serde_as]
#[derive(Resource, Debug, Clone, Default, Serialize)]
pub struct MonitorView {
    /// Pressure of every sensor, in kPa.
    pub pressures: Pressures,
    /// Sum of all sensor pressures, in kPa.
    pub total_pressure: f32,
    /// Highest pressure of the latest reading.
    pub peak: Option<Peak>,
    /// Exponentially smoothed peak pressure, attributed to the sensor of the latest peak.
    pub smoothed_peak: Option<Peak>,
    /// Highest pressure seen since the session started.
    pub session_max: f32,
    pub center_of_pressure: Option<Point2<f32>>,
    /// Recent centers of pressure, oldest first.
    pub trajectory: Vec<Point2<f32>>,
    pub regions: RegionAverages,
    pub region_history: Vec<PressureSnapshot>,
    pub phase: GaitPhase,
    /// Stance duration of the most recently completed step.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub last_step: Option<Duration>,
    pub heatmap: Vec<HeatmapCell>,
    /// Number of processed readings.
    pub samples: u64,
    /// Number of completed steps.
    pub steps: u64,
}

/// Processes one reading to completion.
///
/// Pressures are converted first, then aggregated per region, followed by
/// the center of pressure, the peak smoother and finally the gait phase.
#[must_use]
pub fn process(
    mut state: SessionState,
    reading: &SensorReading,
    now: Instant,
    pipeline: &Pipeline,
) -> (SessionState, MonitorView) {
    let origin = *state.origin.get_or_insert(now);
    let elapsed = state.offset + now.saturating_duration_since(origin);
    let (pressures, snapshot) = pipeline.snapshot(elapsed, reading);
    let regions = snapshot.regions.clone();
    state.region_history.push(snapshot);

    let center_of_pressure = state.cop.update(
        &pressures,
        &pipeline.coordinates,
        &pipeline.bounds,
        pipeline.cop.activity_threshold,
    );

    let peak = instantaneous_peak(&pressures);
    let smoothed_peak = peak.as_ref().map(|peak| Peak {
        sensor: peak.sensor.clone(),
        pressure: state.peak.update(peak.pressure),
    });
    if let Some(peak) = &peak {
        state.session_max = state.session_max.max(peak.pressure);
    }

    let activation = Activation::from_pressures(&pipeline.regions, &pressures, &pipeline.gait);
    let (gait, step) = state.gait.next(activation, now);
    state.gait = gait;
    if let Some(duration) = step {
        state.steps += 1;
        tracing::debug!(?duration, steps = state.steps, "completed step");
    }
    state.samples += 1;

    let view = MonitorView {
        total_pressure: pressures.total(),
        heatmap: heatmap_cells(&pressures, &pipeline.coordinates, &pipeline.heatmap),
        pressures,
        peak,
        smoothed_peak,
        session_max: state.session_max,
        center_of_pressure,
        trajectory: state.cop.trajectory().to_vec(),
        regions,
        region_history: state.region_history.to_vec(),
        phase: state.gait.phase,
        last_step: state.gait.last_step,
        samples: state.samples,
        steps: state.steps,
    };

    (state, view)
}

/// A monitoring session for a single insole.
#[derive(Resource, Debug)]
pub struct Session {
    pipeline: Pipeline,
    state: SessionState,
    view: MonitorView,
}

impl Session {
    #[must_use]
    pub fn new(pipeline: Pipeline) -> Self {
        tracing::info!(sensors = pipeline.sensors.len(), "started monitoring session");

        Self {
            state: SessionState::new(&pipeline),
            pipeline,
            view: MonitorView::default(),
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[must_use]
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The view after the latest processed reading.
    #[must_use]
    pub fn view(&self) -> &MonitorView {
        &self.view
    }

    /// Processes the reading of one poll cycle.
    ///
    /// A cycle without a reading is skipped, all state is kept as it was.
    pub fn ingest(&mut self, reading: Option<&SensorReading>, now: Instant) -> &MonitorView {
        if let Some(reading) = reading {
            let state = std::mem::take(&mut self.state);
            let (state, view) = process(state, reading, now, &self.pipeline);
            self.state = state;
            self.view = view;
        }

        &self.view
    }

    /// Starts over with a fresh state, as if no reading was ever processed.
    pub fn restart(&mut self) {
        self.state = SessionState::new(&self.pipeline);
        self.view = MonitorView::default();
        tracing::info!("restarted monitoring session");
    }

    /// Restores the region history and session maximum from stored samples.
    ///
    /// Samples are `(elapsed, reading)` pairs in chronological order, where
    /// `elapsed` is relative to the start of the session. The gait phase,
    /// the peak smoother and the trajectory are left untouched, they only
    /// follow live readings. Without samples nothing changes.
    ///
    /// The session clock continues from the last sample at `now`, so live
    /// snapshots are timed after the restored ones.
    pub fn hydrate(
        &mut self,
        samples: impl IntoIterator<Item = (Duration, SensorReading)>,
        now: Instant,
    ) {
        let mut samples = samples.into_iter().peekable();
        if samples.peek().is_none() {
            return;
        }

        self.state.region_history.clear();
        let mut latest = None;
        for (elapsed, reading) in samples {
            let (pressures, snapshot) = self.pipeline.snapshot(elapsed, &reading);
            if let Some(peak) = instantaneous_peak(&pressures) {
                self.state.session_max = self.state.session_max.max(peak.pressure);
            }
            self.state.region_history.push(snapshot);
            latest = Some((elapsed, pressures));
        }

        let Some((elapsed, pressures)) = latest else {
            return;
        };
        self.state.origin = Some(now);
        self.state.offset = elapsed;

        self.view.session_max = self.state.session_max;
        self.view.region_history = self.state.region_history.to_vec();
        if let Some(snapshot) = self.state.region_history.latest() {
            self.view.regions = snapshot.regions.clone();
            self.view.total_pressure = snapshot.total;
        }
        self.view.heatmap = heatmap_cells(
            &pressures,
            &self.pipeline.coordinates,
            &self.pipeline.heatmap,
        );
        self.view.pressures = pressures;
        tracing::info!(
            snapshots = self.view.region_history.len(),
            session_max = self.view.session_max,
            "restored session history"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::config;

    const CYCLE: Duration = Duration::from_millis(150);

    fn reading(heel: f32, mid: f32, toe: f32) -> SensorReading {
        [("heel", heel), ("mid", mid), ("toe", toe)]
            .into_iter()
            .collect()
    }

    fn session() -> Session {
        Session::new(Pipeline::new(&config()).unwrap())
    }

    fn step_readings() -> [SensorReading; 5] {
        [
            reading(0.0, 0.0, 0.0),
            reading(3.0, 0.0, 0.0),
            reading(3.0, 2.0, 0.0),
            reading(0.0, 0.0, 2.0),
            reading(0.0, 0.0, 0.0),
        ]
    }

    #[test]
    fn single_step_end_to_end() {
        let mut session = session();
        let start = Instant::now();
        let mut phases = Vec::new();

        for (i, reading) in step_readings().iter().enumerate() {
            let view = session.ingest(Some(reading), start + CYCLE * i as u32);
            phases.push(view.phase);
        }

        assert_eq!(
            phases,
            [
                GaitPhase::Swing,
                GaitPhase::HeelStrike,
                GaitPhase::Midstance,
                GaitPhase::HeelOff,
                GaitPhase::Swing
            ]
        );

        let view = session.view();
        // from the second to the fifth reading
        assert_eq!(view.last_step, Some(CYCLE * 3));
        assert_eq!(view.steps, 1);
        assert_eq!(view.samples, 5);
        assert_eq!(view.center_of_pressure, None);
        assert!(view.trajectory.is_empty());
        assert!((view.session_max - 100.0 * 3.0_f32.powf(1.5)).abs() < 1e-3);
    }

    #[test]
    fn peak_is_smoothed_from_first_sample() {
        let mut session = session();
        let start = Instant::now();

        let view = session.ingest(Some(&reading(1.0, 0.0, 0.0)), start);
        let smoothed = view.smoothed_peak.clone().unwrap();
        assert_eq!(smoothed.sensor.as_str(), "heel");
        assert!((smoothed.pressure - 100.0).abs() < 1e-4);

        let view = session.ingest(Some(&reading(0.0, 0.0, 4.0)), start + CYCLE);
        let smoothed = view.smoothed_peak.clone().unwrap();
        assert_eq!(smoothed.sensor.as_str(), "toe");
        assert!((smoothed.pressure - (0.3 * 800.0 + 0.7 * 100.0)).abs() < 1e-3);
        assert!((view.peak.as_ref().unwrap().pressure - 800.0).abs() < 1e-3);
    }

    #[test]
    fn cop_stays_on_the_layout_and_resets_on_lift_off() {
        let mut session = session();
        let start = Instant::now();
        let bounds = *session.pipeline().bounds();

        for (i, reading) in step_readings().iter().take(4).enumerate() {
            let view = session.ingest(Some(reading), start + CYCLE * i as u32);
            if let Some(point) = view.center_of_pressure {
                assert!(bounds.contains(&point));
            }
        }
        assert_eq!(session.view().trajectory.len(), 3);

        session.ingest(Some(&reading(0.0, 0.0, 0.0)), start + CYCLE * 4);
        assert!(session.view().trajectory.is_empty());

        let view = session.ingest(Some(&reading(0.0, 0.0, 1.0)), start + CYCLE * 5);
        assert_eq!(view.trajectory, [Point2::new(150.0, 100.0)]);
    }

    #[test]
    fn missing_reading_skips_the_cycle() {
        let mut session = session();
        let start = Instant::now();

        session.ingest(Some(&reading(3.0, 0.0, 0.0)), start);
        let before = session.view().clone();
        let gait = *session.state().gait();

        session.ingest(None, start + CYCLE);

        assert_eq!(session.view().samples, before.samples);
        assert_eq!(session.view().phase, GaitPhase::HeelStrike);
        assert_eq!(session.view().region_history, before.region_history);
        assert_eq!(*session.state().gait(), gait);
    }

    #[test]
    fn region_history_is_bounded_and_timed() {
        let mut session = session();
        let start = Instant::now();

        for i in 0..6 {
            session.ingest(Some(&reading(1.0, 1.0, 1.0)), start + CYCLE * i);
        }

        let history = &session.view().region_history;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].elapsed, CYCLE * 2);
        assert_eq!(history[3].elapsed, CYCLE * 5);
        assert!((history[3].regions.get("heel") - 100.0).abs() < 1e-4);
        assert!((history[3].total - 300.0).abs() < 1e-3);
    }

    #[test]
    fn restart_resets_everything() {
        let mut session = session();
        let start = Instant::now();
        for (i, reading) in step_readings().iter().enumerate() {
            session.ingest(Some(reading), start + CYCLE * i as u32);
        }

        session.restart();
        assert_eq!(session.view().samples, 0);
        assert_eq!(session.state().gait().phase, GaitPhase::Swing);

        // the smoother starts over as well
        let view = session.ingest(Some(&reading(0.0, 1.0, 0.0)), start + CYCLE * 10);
        assert!((view.smoothed_peak.as_ref().unwrap().pressure - 100.0).abs() < 1e-4);
        assert_eq!(view.region_history.len(), 1);
        assert_eq!(view.region_history[0].elapsed, Duration::ZERO);
        assert_eq!(view.steps, 0);
        assert_eq!(view.last_step, None);
    }

    #[test]
    fn hydrate_restores_history_only() {
        let mut session = session();
        let start = Instant::now();
        session.ingest(Some(&reading(3.0, 0.0, 0.0)), start);

        let stored = (0..6_u32).map(|i| (CYCLE * i, reading(0.0, i as f32, 0.0)));
        session.hydrate(stored, start + CYCLE);

        let view = session.view();
        assert_eq!(view.region_history.len(), 4);
        assert_eq!(view.region_history[0].elapsed, CYCLE * 2);
        assert!((view.session_max - 100.0 * 5.0_f32.powf(1.5)).abs() < 1e-2);
        assert!((view.pressures.get("mid") - 100.0 * 5.0_f32.powf(1.5)).abs() < 1e-2);
        assert_eq!(view.phase, GaitPhase::HeelStrike);
        assert_eq!(session.state().gait().phase, GaitPhase::HeelStrike);
    }

    #[test]
    fn hydrate_without_samples_keeps_live_history() {
        let mut session = session();
        let start = Instant::now();
        for i in 0..3 {
            session.ingest(Some(&reading(1.0, 0.0, 0.0)), start + CYCLE * i);
        }

        session.hydrate(Vec::<(Duration, SensorReading)>::new(), start + CYCLE * 3);
        assert_eq!(session.view().region_history.len(), 3);

        let view = session.ingest(Some(&reading(1.0, 0.0, 0.0)), start + CYCLE * 3);
        assert_eq!(view.region_history.len(), 4);
        assert_eq!(view.region_history[3].elapsed, CYCLE * 3);
    }

    #[test]
    fn live_snapshots_continue_after_hydrated_ones() {
        let mut session = session();
        let start = Instant::now();

        let stored = (0..4_u32).map(|i| {
            (
                Duration::from_millis(10_000) + CYCLE * i,
                reading(1.0, 0.0, 0.0),
            )
        });
        session.hydrate(stored, start);
        let view = session.ingest(Some(&reading(0.0, 1.0, 0.0)), start + CYCLE);

        let elapsed: Vec<_> = view.region_history.iter().map(|s| s.elapsed).collect();
        assert_eq!(
            elapsed,
            [10_150, 10_300, 10_450, 10_600].map(Duration::from_millis)
        );
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = config();
        config.sensors.ids.clear();

        assert!(Pipeline::new(&config).is_err());
    }
}
