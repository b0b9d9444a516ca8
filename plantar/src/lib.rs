pub mod config;
pub mod cop;
pub mod error;
pub mod gait;
pub mod heatmap;
pub mod history;
pub mod layout;
pub mod monitor;
pub mod region;
pub mod sensor;
pub mod session;

pub use error::{Error, Result};

/// The plantar prelude includes the types needed to set up a monitoring app.
pub mod prelude {
    pub use crate::{
        config::{PlantarConfig, load_config},
        monitor::{ActiveSource, MonitorPlugin, RestartSession},
        sensor::{ReadingSource, SensorId, SensorReading},
        session::{MonitorView, Pipeline, Session},
    };
    pub use odal::Config;
}
