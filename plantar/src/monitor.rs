use std::time::Instant;

use bevy::{app::AppExit, prelude::*};

use crate::{
    sensor::ReadingSource,
    session::{MonitorView, Session},
};

/// Plugin that feeds the readings of the [`ActiveSource`] into the [`Session`].
///
/// Every frame polls the source once and processes the reading to completion,
/// so the frame rate of the app is the acquisition rate. The app requests an
/// exit once the source is exhausted.
///
/// The [`Session`] and [`ActiveSource`] resources have to be inserted by the
/// app, the plugin provides:
/// - [`MonitorView`], updated after every processed reading
/// - [`RestartSession`], an event that starts the session over
pub struct MonitorPlugin;

impl Plugin for MonitorPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MonitorView>()
            .add_event::<RestartSession>()
            .add_systems(Update, (restart_session, poll_source).chain());
    }
}

/// The source the monitor reads from.
#[derive(Resource)]
pub struct ActiveSource(Box<dyn ReadingSource + Send + Sync>);

impl ActiveSource {
    pub fn new(source: impl ReadingSource + Send + Sync + 'static) -> Self {
        Self(Box::new(source))
    }
}

/// Discards all session state before the next reading is processed.
#[derive(Event, Debug, Default)]
pub struct RestartSession;

fn restart_session(
    mut restarts: EventReader<RestartSession>,
    mut session: ResMut<Session>,
    mut view: ResMut<MonitorView>,
) {
    if restarts.read().count() == 0 {
        return;
    }

    session.restart();
    view.clone_from(session.view());
}

fn poll_source(
    mut source: ResMut<ActiveSource>,
    mut session: ResMut<Session>,
    mut view: ResMut<MonitorView>,
    mut exit: EventWriter<AppExit>,
) {
    match source.0.poll() {
        Ok(Some(reading)) => {
            view.clone_from(session.ingest(Some(&reading), Instant::now()));
        }
        Ok(None) => {}
        Err(error) => {
            tracing::warn!(%error, "skipped acquisition cycle");
        }
    }

    if source.0.is_exhausted() {
        exit.write(AppExit::Success);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        config::tests::config,
        gait::GaitPhase,
        sensor::{SensorReading, SourceError},
        session::Pipeline,
    };

    type Poll = Result<Option<SensorReading>, SourceError>;

    struct ScriptedSource(VecDeque<Poll>);

    impl ReadingSource for ScriptedSource {
        fn poll(&mut self) -> Poll {
            self.0.pop_front().unwrap_or(Ok(None))
        }

        fn is_exhausted(&self) -> bool {
            self.0.is_empty()
        }
    }

    fn heel(volts: f32) -> Poll {
        Ok(Some([("heel", volts)].into_iter().collect()))
    }

    fn app(script: Vec<Poll>) -> App {
        let mut app = App::new();
        app.add_plugins(MonitorPlugin)
            .insert_resource(Session::new(Pipeline::new(&config()).unwrap()))
            .insert_resource(ActiveSource::new(ScriptedSource(script.into())));
        app
    }

    #[test]
    fn failed_and_empty_polls_are_skipped() {
        let mut app = app(vec![
            heel(3.0),
            Err(SourceError::Io(std::io::Error::other("unplugged"))),
            Ok(None),
            heel(3.0),
            Ok(None),
        ]);

        for _ in 0..4 {
            app.update();
        }

        let view = app.world().resource::<MonitorView>();
        assert_eq!(view.samples, 2);
        assert_eq!(view.phase, GaitPhase::HeelStrike);
        assert!(app.should_exit().is_none());
    }

    #[test]
    fn exhausted_source_exits() {
        let mut app = app(vec![heel(1.0)]);
        app.update();

        assert_eq!(app.should_exit(), Some(AppExit::Success));
        assert_eq!(app.world().resource::<MonitorView>().samples, 1);
    }

    #[test]
    fn restart_event_resets_the_view() {
        let mut app = app(vec![heel(3.0), heel(3.0), Ok(None), Ok(None)]);
        app.update();
        app.update();
        assert_eq!(app.world().resource::<MonitorView>().samples, 2);

        app.world_mut().send_event(RestartSession);
        app.update();

        let view = app.world().resource::<MonitorView>();
        assert_eq!(view.samples, 0);
        assert_eq!(view.phase, GaitPhase::Swing);
        assert_eq!(app.world().resource::<Session>().view().samples, 0);
    }
}
