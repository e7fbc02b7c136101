use tracing::{debug, info};

use crate::notifications::Participant;
use crate::store::{Meeting, StoredParticipant};

/// Recorder-role application type observed on recording participants.
const RECORDER_APPLICATION_TYPE: &str = "TeamsRecorder";

/// Merge a full participant snapshot into a meeting.
///
/// The stored roster only grows: participants seen for the first time are
/// appended, existing entries are left untouched, and departures show up
/// only through `active_participants`, which tracks the snapshot size.
/// `recording` latches on once a recorder is observed and is never cleared.
pub fn apply_snapshot(meeting: &mut Meeting, snapshot: &[Participant]) {
    for participant in snapshot {
        let Some(id) = participant.canonical_id() else {
            continue;
        };
        if !meeting.participants.iter().any(|p| p.id == id) {
            meeting.participants.push(StoredParticipant::new(id));
        }
    }

    meeting.active_participants = snapshot.len();
    debug!(
        thread_id = %meeting.thread_id,
        active = meeting.active_participants,
        "participant snapshot applied"
    );

    let recorder_present = snapshot.iter().any(|p| {
        p.application()
            .and_then(|app| app.application_type.as_deref())
            == Some(RECORDER_APPLICATION_TYPE)
    });
    if recorder_present && !meeting.recording {
        info!(thread_id = %meeting.thread_id, "recording is active");
        meeting.recording = true;
    }
}

/// Log raised hands present in the snapshot. No state is persisted beyond
/// the roster itself.
pub fn log_raised_hands(snapshot: &[Participant]) {
    for participant in snapshot.iter().filter(|p| p.has_raised_hand()) {
        info!(
            participant = participant.display_name().unwrap_or("(unknown)"),
            "hand raised"
        );
    }
}

/// When the snapshot contains exactly one participant and it is this
/// application's own bot, return the tenant id to scope the eventual
/// leave command. Anything else means no auto-leave action this cycle.
pub fn bot_alone_tenant(snapshot: &[Participant], app_id: &str) -> Option<String> {
    let [sole] = snapshot else {
        return None;
    };
    let app = sole.application()?;
    if app.id != app_id {
        return None;
    }
    app.tenant_id.clone()
}
