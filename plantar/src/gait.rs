//! Gait phase detection from regional foot contact.
//!
//! A step starts with the heel touching down, rolls over the midfoot and
//! ends with the toes pushing off. The phase is tracked with a small state
//! machine that is advanced exactly once per snapshot:
//!
//! ```text
//!  Swing ──heel──▶ HeelStrike ──midfoot|toe──▶ Midstance ──!heel & toe──▶ HeelOff
//!    ▲                 │                            │                        │
//!    └─────!heel───────┴────────nothing active──────┴─────────!toe───────────┘
//! ```
//!
//! Every return to [`GaitPhase::Swing`] after [`GaitPhase::Midstance`] or
//! [`GaitPhase::HeelOff`] completes a step, whose stance duration is measured
//! from the heel strike.
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::{region::Regions, sensor::pressure::Pressures};

/// Configuration of the gait phase detection.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct GaitConfig {
    /// Pressure (in kPa) any sensor of a region needs to exceed for the region to be in contact.
    pub activity_threshold: f32,
    /// Region that acts as the heel.
    pub heel_region: String,
    /// Region that acts as the midfoot.
    pub midfoot_region: String,
    /// Region that acts as the toes/forefoot.
    pub toe_region: String,
}

/// Contact phase of the foot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum GaitPhase {
    /// The foot is in the air.
    #[default]
    Swing,
    /// The heel touched down, full contact is not confirmed yet.
    HeelStrike,
    /// The foot is flat on the ground.
    Midstance,
    /// The heel lifted, the forefoot is still loaded.
    HeelOff,
}

impl GaitPhase {
    /// Whether the foot is on the ground in this phase.
    #[must_use]
    pub fn is_stance(self) -> bool {
        !matches!(self, Self::Swing)
    }
}

/// Which regions of the foot are in contact with the ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Activation {
    pub heel: bool,
    pub midfoot: bool,
    pub toe: bool,
}

impl Activation {
    #[must_use]
    pub fn from_pressures(regions: &Regions, pressures: &Pressures, config: &GaitConfig) -> Self {
        let threshold = config.activity_threshold;
        Self {
            heel: regions.is_active(&config.heel_region, pressures, threshold),
            midfoot: regions.is_active(&config.midfoot_region, pressures, threshold),
            toe: regions.is_active(&config.toe_region, pressures, threshold),
        }
    }

    #[must_use]
    pub fn any(self) -> bool {
        self.heel || self.midfoot || self.toe
    }
}

/// State of the gait phase machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GaitState {
    pub phase: GaitPhase,
    /// When the current step started, set while the foot is in stance.
    pub step_start: Option<Instant>,
    /// Stance duration of the most recently completed step.
    pub last_step: Option<Duration>,
}

impl GaitState {
    /// Advances the state machine by one snapshot.
    ///
    /// Returns the next state, and the stance duration if this transition
    /// completed a step. Combinations without a matching transition keep the
    /// current phase.
    #[must_use]
    pub fn next(self, activation: Activation, now: Instant) -> (Self, Option<Duration>) {
        let Activation { heel, midfoot, toe } = activation;

        match self.phase {
            GaitPhase::Swing if heel => (
                Self {
                    phase: GaitPhase::HeelStrike,
                    step_start: Some(now),
                    last_step: None,
                },
                None,
            ),
            GaitPhase::HeelStrike if midfoot || toe => (
                Self {
                    phase: GaitPhase::Midstance,
                    ..self
                },
                None,
            ),
            // false contact, the heel bounced without the foot rolling over
            GaitPhase::HeelStrike if !heel => (
                Self {
                    phase: GaitPhase::Swing,
                    step_start: None,
                    ..self
                },
                None,
            ),
            GaitPhase::Midstance if !heel && toe => (
                Self {
                    phase: GaitPhase::HeelOff,
                    ..self
                },
                None,
            ),
            GaitPhase::Midstance if !activation.any() => self.lift_off(now),
            GaitPhase::HeelOff if !toe => self.lift_off(now),
            _ => (self, None),
        }
    }

    fn lift_off(self, now: Instant) -> (Self, Option<Duration>) {
        let step = self
            .step_start
            .map(|start| now.saturating_duration_since(start));

        (
            Self {
                phase: GaitPhase::Swing,
                step_start: None,
                last_step: step.or(self.last_step),
            },
            step,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEEL: Activation = Activation {
        heel: true,
        midfoot: false,
        toe: false,
    };
    const HEEL_MID: Activation = Activation {
        heel: true,
        midfoot: true,
        toe: false,
    };
    const TOE: Activation = Activation {
        heel: false,
        midfoot: false,
        toe: true,
    };
    const NONE: Activation = Activation {
        heel: false,
        midfoot: false,
        toe: false,
    };

    fn run(activations: &[Activation]) -> (Vec<GaitPhase>, Vec<Option<Duration>>, GaitState) {
        let start = Instant::now();
        let mut state = GaitState::default();
        let mut phases = Vec::new();
        let mut steps = Vec::new();

        for (i, activation) in activations.iter().enumerate() {
            let now = start + Duration::from_millis(150 * i as u64);
            let (next, step) = state.next(*activation, now);
            state = next;
            phases.push(state.phase);
            steps.push(step);
        }

        (phases, steps, state)
    }

    #[test]
    fn full_step_records_one_duration() {
        let (phases, steps, state) = run(&[NONE, HEEL, HEEL_MID, TOE, NONE]);

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
        assert_eq!(steps.iter().flatten().count(), 1);
        assert_eq!(steps[4], Some(Duration::from_millis(450)));
        assert_eq!(state.last_step, Some(Duration::from_millis(450)));
        assert_eq!(state.step_start, None);
    }

    #[test]
    fn heel_bounce_is_not_a_step() {
        let (phases, steps, state) = run(&[HEEL, NONE]);

        assert_eq!(phases, [GaitPhase::HeelStrike, GaitPhase::Swing]);
        assert!(steps.iter().all(Option::is_none));
        assert_eq!(state.step_start, None);
        assert_eq!(state.last_step, None);
    }

    #[test]
    fn flat_foot_lift_off_completes_step() {
        let (phases, steps, _) = run(&[HEEL, HEEL_MID, NONE]);

        assert_eq!(phases[2], GaitPhase::Swing);
        assert_eq!(steps[2], Some(Duration::from_millis(300)));
    }

    #[test]
    fn new_heel_strike_clears_previous_duration() {
        let (_, _, state) = run(&[HEEL, HEEL_MID, NONE, HEEL]);

        assert_eq!(state.phase, GaitPhase::HeelStrike);
        assert_eq!(state.last_step, None);
        assert!(state.step_start.is_some());
    }

    #[test]
    fn unmatched_combinations_hold_the_phase() {
        // toes without heel never start a step
        let (phases, _, _) = run(&[TOE, TOE]);
        assert_eq!(phases, [GaitPhase::Swing, GaitPhase::Swing]);

        // heel strike holds while only the heel is loaded
        let (phases, _, _) = run(&[HEEL, HEEL, HEEL]);
        assert!(phases.iter().all(|p| *p == GaitPhase::HeelStrike));

        // midstance holds while the midfoot alone stays loaded
        let midfoot = Activation {
            heel: false,
            midfoot: true,
            toe: false,
        };
        let (phases, _, _) = run(&[HEEL, HEEL_MID, midfoot]);
        assert_eq!(phases[2], GaitPhase::Midstance);

        // heel off holds while the heel comes back down with the toes
        let heel_toe = Activation {
            heel: true,
            midfoot: false,
            toe: true,
        };
        let (phases, _, _) = run(&[HEEL, HEEL_MID, TOE, heel_toe]);
        assert_eq!(phases[3], GaitPhase::HeelOff);
    }

    #[test]
    fn transitions_are_deterministic() {
        let now = Instant::now();
        let phases = [
            GaitPhase::Swing,
            GaitPhase::HeelStrike,
            GaitPhase::Midstance,
            GaitPhase::HeelOff,
        ];

        for phase in phases {
            for bits in 0..8_u8 {
                let activation = Activation {
                    heel: bits & 1 != 0,
                    midfoot: bits & 2 != 0,
                    toe: bits & 4 != 0,
                };
                let state = GaitState {
                    phase,
                    step_start: Some(now),
                    last_step: None,
                };
                let later = now + Duration::from_millis(10);

                assert_eq!(state.next(activation, later), state.next(activation, later));
            }
        }
    }
}
