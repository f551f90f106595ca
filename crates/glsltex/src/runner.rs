use tracing::{debug, info};

use crate::clock::{Clock, ClockEvent};
use crate::host::{DocumentStore, ImageStore, Renderer};
use crate::session::Session;

/// Totals over one run, across all sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub recompiles: u64,
    pub renders: u64,
    pub publishes: u64,
}

/// Drives `sessions` from `clock` until it reports [`ClockEvent::Cancel`].
///
/// Every tick visits each session once, in order, with the same time sample.
pub fn run<C, D, R, I>(
    clock: &mut C,
    documents: &mut D,
    renderer: &mut R,
    images: &mut I,
    sessions: &mut [Session<R>],
) -> RunSummary
where
    C: Clock + ?Sized,
    D: DocumentStore,
    R: Renderer,
    I: ImageStore,
{
    let mut summary = RunSummary::default();
    loop {
        match clock.next_event() {
            ClockEvent::Tick(sample) => {
                summary.ticks += 1;
                for session in sessions.iter_mut() {
                    let report = session.tick(documents, renderer, images, sample.seconds);
                    summary.recompiles += u64::from(report.recompiled);
                    summary.renders += u64::from(report.rendered);
                    summary.publishes += u64::from(report.published);
                }
                debug!(frame = sample.frame_index, time = sample.seconds, "tick handled");
            }
            ClockEvent::Cancel => {
                for session in sessions.iter() {
                    info!(source = %session.source_id(), "cancel refreshing");
                }
                break;
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::clock::{ScriptedClock, TimeSample};
    use crate::documents::FsDocumentStore;
    use crate::fakes::RecordingRenderer;
    use crate::images::MemoryImageStore;
    use crate::session::SessionParams;

    fn sessions(sources: &[&str]) -> Vec<Session<RecordingRenderer>> {
        sources
            .iter()
            .map(|source| {
                Session::new(SessionParams {
                    source: source.to_string(),
                    width: 4,
                    height: 4,
                })
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn drives_every_session_until_cancel() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let mut renderer = RecordingRenderer::new();
        let mut images = MemoryImageStore::new();
        let mut sessions = sessions(&["one.frag", "two.frag"]);
        let mut clock = ScriptedClock::from_times([0.0, 0.0, 0.5]);

        let summary = run(&mut clock, &mut documents, &mut renderer, &mut images, &mut sessions);

        assert_eq!(
            summary,
            RunSummary {
                ticks: 3,
                recompiles: 2,
                renders: 4,
                publishes: 4,
            }
        );
        assert_eq!(images.keys().collect::<Vec<_>>(), vec!["one", "two"]);
        assert_eq!(renderer.live_targets, 0);
    }

    #[test]
    fn stops_at_cancel_even_with_ticks_queued() {
        let root = TempDir::new().unwrap();
        let mut documents = FsDocumentStore::new(root.path());
        let mut renderer = RecordingRenderer::new();
        let mut images = MemoryImageStore::new();
        let mut sessions = sessions(&["solo.frag"]);
        let mut clock = ScriptedClock::new([
            ClockEvent::Tick(TimeSample::new(0.0, 0)),
            ClockEvent::Cancel,
            ClockEvent::Tick(TimeSample::new(1.0, 1)),
        ]);

        let summary = run(&mut clock, &mut documents, &mut renderer, &mut images, &mut sessions);

        assert_eq!(summary.ticks, 1);
        assert_eq!(renderer.compiles(), 1);
    }
}
