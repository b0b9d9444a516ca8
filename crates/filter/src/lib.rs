use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("smoothing factor must lie in (0, 1], got {0}")]
    InvalidSmoothingFactor(f32),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Weight of the newest sample in an exponential filter, guaranteed to lie in `(0, 1]`.
///
/// A factor of `1` disables smoothing entirely, values close to `0` make the
/// filter react very slowly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct SmoothingFactor(f32);

impl SmoothingFactor {
    pub fn new(alpha: f32) -> Result<Self> {
        if alpha > 0.0 && alpha <= 1.0 {
            Ok(Self(alpha))
        } else {
            Err(Error::InvalidSmoothingFactor(alpha))
        }
    }

    /// Clamps `alpha` into `(0, 1]`, NaN disables smoothing.
    #[must_use]
    pub fn saturating(alpha: f32) -> Self {
        if alpha.is_nan() {
            Self(1.0)
        } else {
            Self(alpha.clamp(f32::MIN_POSITIVE, 1.0))
        }
    }

    #[must_use]
    pub fn get(self) -> f32 {
        self.0
    }
}

impl Default for SmoothingFactor {
    /// No smoothing, the newest sample is passed through.
    fn default() -> Self {
        Self(1.0)
    }
}

impl TryFrom<f32> for SmoothingFactor {
    type Error = Error;

    fn try_from(alpha: f32) -> Result<Self> {
        Self::new(alpha)
    }
}

impl From<SmoothingFactor> for f32 {
    fn from(factor: SmoothingFactor) -> Self {
        factor.0
    }
}

/// Single-pole exponential moving average over a scalar signal.
///
/// The first sample initializes the state as is, every following sample `x`
/// updates it as `alpha * x + (1 - alpha) * state`.
#[derive(Copy, Clone, Debug, Default)]
pub struct ExponentialSmoother {
    alpha: SmoothingFactor,
    state: Option<f32>,
}

impl ExponentialSmoother {
    #[must_use]
    pub fn new(alpha: SmoothingFactor) -> Self {
        Self { alpha, state: None }
    }

    /// Creates a smoother that starts from `initial` instead of the first sample.
    #[must_use]
    pub fn with_initial(alpha: SmoothingFactor, initial: f32) -> Self {
        Self {
            alpha,
            state: Some(initial),
        }
    }

    pub fn update(&mut self, x: f32) -> f32 {
        let alpha = self.alpha.get();
        let next = match self.state {
            Some(state) => alpha * x + (1.0 - alpha) * state,
            None => x,
        };

        self.state = Some(next);
        next
    }

    /// The current smoothed value, `None` until the first sample arrived.
    #[must_use]
    pub fn state(&self) -> Option<f32> {
        self.state
    }

    #[must_use]
    pub fn alpha(&self) -> SmoothingFactor {
        self.alpha
    }

    /// Forgets the current state, the next sample initializes the filter again.
    pub fn reset(&mut self) {
        self.state = None;
    }
}
