use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::auth::TokenValidator;
use crate::autoleave::{AfterMeetingNotifier, AutoLeaveScheduler};
use crate::notifications::{
    call_id_from_resource_url, classify, thread_id_of, CallState, NotificationBatch,
    NotificationItem, NotificationKind, Participant,
};
use crate::reconcile;
use crate::store::{Meeting, MeetingStore};

#[derive(Clone)]
pub struct AppState {
    pub store: MeetingStore,
    pub validator: TokenValidator,
    pub scheduler: AutoLeaveScheduler,
    pub notifier: Arc<dyn AfterMeetingNotifier>,
    pub app_id: String,
    /// Tracks spawned per-item work so tests can await completion.
    pub tasks: TaskTracker,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/calling", post(calling_webhook))
        .with_state(state)
}

async fn health_check() -> &'static str {
    "ok"
}

/// POST /api/calling - the calling webhook.
///
/// The token is validated before anything else; any auth failure maps to
/// its status and no item is touched. Items are processed on their own
/// tasks and the response goes out once dispatch has been initiated.
pub async fn calling_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<NotificationBatch>, JsonRejection>,
) -> StatusCode {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    if let Err(err) = state.validator.validate(authorization) {
        warn!(error = %err, "rejected call notification");
        return err.status();
    }

    // A missing batch is indistinguishable from a malformed delivery.
    let Ok(Json(batch)) = body else {
        return StatusCode::UNAUTHORIZED;
    };
    let Some(items) = batch.value else {
        return StatusCode::UNAUTHORIZED;
    };

    for item in items {
        let state = state.clone();
        let tracker = state.tasks.clone();
        let _ = tracker.spawn(async move {
            process_item(state, item).await;
        });
    }

    StatusCode::OK
}

/// Handle one notification item. Failures are logged here so a bad item
/// never affects its siblings or the HTTP response.
async fn process_item(state: AppState, item: NotificationItem) {
    let Some(resource_url) = item.resource_url.clone() else {
        return;
    };
    let Some(call_id) = call_id_from_resource_url(&resource_url).map(str::to_string) else {
        debug!(%resource_url, "resource url carries no call id");
        return;
    };

    let Some(meeting) = resolve_meeting(&state.store, &call_id, &item) else {
        debug!(%call_id, "meeting not managed by this processor");
        return;
    };

    match classify(&item) {
        NotificationKind::Terminated { organizer_user_id } => {
            info!(%call_id, "call terminated");
            if let Some(user_id) = organizer_user_id {
                let notifier = state.notifier.clone();
                let _ = state.tasks.spawn(async move {
                    if let Err(err) = notifier.notify(&user_id, &call_id).await {
                        warn!(%call_id, error = %err, "unable to send after-meeting signal");
                    }
                });
            }
        }
        NotificationKind::Participants(snapshot) => {
            handle_participants(&state, &call_id, &meeting, snapshot);
        }
        NotificationKind::CallState(CallState::Establishing) => {
            debug!(%call_id, "call establishing");
        }
        NotificationKind::CallState(CallState::Established) => {
            debug!(%call_id, "call established");
        }
        NotificationKind::CallState(CallState::Other) => {}
        NotificationKind::Operations | NotificationKind::Ignored => {}
    }
}

/// Resolve the meeting this item belongs to: by call id first, then by the
/// thread id on the resource data. A thread-only hit links the call id
/// onto the meeting (first sighting) before anything else runs.
fn resolve_meeting(store: &MeetingStore, call_id: &str, item: &NotificationItem) -> Option<Meeting> {
    if let Some(meeting) = store.get_by_call_id(call_id) {
        return Some(meeting);
    }
    let thread_id = thread_id_of(item.resource_data.as_ref())?;
    let linked = store.link_call_id(&thread_id, call_id)?;
    debug!(%call_id, %thread_id, "linked call to tracked meeting");
    Some(linked)
}

fn handle_participants(
    state: &AppState,
    call_id: &str,
    meeting: &Meeting,
    snapshot: Vec<Participant>,
) {
    let updated = state.store.update_by_call_id(call_id, |m| {
        reconcile::apply_snapshot(m, &snapshot);
    });
    let Some(updated) = updated else {
        // The meeting vanished between resolution and update; a later
        // delivery will be reconciled against whatever the store holds.
        warn!(%call_id, thread_id = %meeting.thread_id, "meeting disappeared before update");
        return;
    };

    reconcile::log_raised_hands(&snapshot);

    if updated.active_participants == 1 {
        if let Some(tenant_id) = reconcile::bot_alone_tenant(&snapshot, &state.app_id) {
            let _ = state.scheduler.schedule(call_id.to_string(), tenant_id);
        }
    }
}
