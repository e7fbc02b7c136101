use serde::{Deserialize, Serialize};

/// One delivery from the calling platform: a batch of independent items.
#[derive(Debug, Deserialize)]
pub struct NotificationBatch {
    pub value: Option<Vec<NotificationItem>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationItem {
    #[serde(default)]
    pub change_type: ChangeType,
    #[serde(default)]
    pub resource_url: Option<String>,
    #[serde(default)]
    pub resource_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
    #[serde(other)]
    #[default]
    Other,
}

/// Participant entry as delivered on `/participants` notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    #[serde(default)]
    pub info: Option<ParticipantInfo>,
    #[serde(default)]
    pub published_states: Vec<PublishedState>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantInfo {
    #[serde(default)]
    pub identity: Option<Identity>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    #[serde(default)]
    pub user: Option<IdentityUser>,
    #[serde(default)]
    pub application: Option<IdentityApplication>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityApplication {
    pub id: String,
    // The platform emits this field with a capital A.
    #[serde(default, alias = "ApplicationType")]
    pub application_type: Option<String>,
    #[serde(default)]
    pub tenant_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedState {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Participant {
    /// Canonical participant id: the user id when present, otherwise the
    /// application id.
    pub fn canonical_id(&self) -> Option<&str> {
        let identity = self.info.as_ref()?.identity.as_ref()?;
        identity
            .user
            .as_ref()
            .map(|u| u.id.as_str())
            .or_else(|| identity.application.as_ref().map(|a| a.id.as_str()))
    }

    pub fn application(&self) -> Option<&IdentityApplication> {
        self.info.as_ref()?.identity.as_ref()?.application.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.info
            .as_ref()?
            .identity
            .as_ref()?
            .user
            .as_ref()?
            .display_name
            .as_deref()
    }

    pub fn has_raised_hand(&self) -> bool {
        self.published_states.iter().any(|s| s.kind == "raiseHand")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Establishing,
    Established,
    Other,
}

/// The shapes a notification item can take, derived in one classification
/// step and matched exhaustively by the dispatcher.
#[derive(Debug)]
pub enum NotificationKind {
    Participants(Vec<Participant>),
    Operations,
    CallState(CallState),
    Terminated { organizer_user_id: Option<String> },
    Ignored,
}

pub fn classify(item: &NotificationItem) -> NotificationKind {
    let data = item.resource_data.as_ref();
    match item.change_type {
        ChangeType::Deleted => {
            if state_of(data) == Some("terminated") {
                NotificationKind::Terminated {
                    organizer_user_id: organizer_user_id(data),
                }
            } else {
                NotificationKind::Ignored
            }
        }
        ChangeType::Updated => match item.resource_url.as_deref() {
            Some(url) if url.ends_with("/participants") => data
                .and_then(|d| serde_json::from_value::<Vec<Participant>>(d.clone()).ok())
                .map(NotificationKind::Participants)
                .unwrap_or(NotificationKind::Ignored),
            Some(url) if url.ends_with("/operations") => NotificationKind::Operations,
            Some(_) => NotificationKind::CallState(match state_of(data) {
                Some("establishing") => CallState::Establishing,
                Some("established") => CallState::Established,
                _ => CallState::Other,
            }),
            None => NotificationKind::Ignored,
        },
        ChangeType::Created | ChangeType::Other => NotificationKind::Ignored,
    }
}

/// Call id embedded in the resource URL, e.g.
/// `/communications/calls/f31f5b00-.../participants`.
pub fn call_id_from_resource_url(resource_url: &str) -> Option<&str> {
    resource_url.split('/').nth(3).filter(|id| !id.is_empty())
}

/// Thread id carried on call-shaped resource data.
pub fn thread_id_of(data: Option<&serde_json::Value>) -> Option<String> {
    data?
        .get("chatInfo")?
        .get("threadId")?
        .as_str()
        .map(str::to_string)
}

fn state_of(data: Option<&serde_json::Value>) -> Option<&str> {
    data?.get("state")?.as_str()
}

fn organizer_user_id(data: Option<&serde_json::Value>) -> Option<String> {
    data?
        .get("meetingInfo")?
        .get("organizer")?
        .get("user")?
        .get("id")?
        .as_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(change_type: &str, url: &str, data: serde_json::Value) -> NotificationItem {
        serde_json::from_value(json!({
            "changeType": change_type,
            "resourceUrl": url,
            "resourceData": data,
        }))
        .unwrap()
    }

    #[test]
    fn extracts_call_id_from_resource_url() {
        assert_eq!(
            call_id_from_resource_url("/communications/calls/f31f5b00-b724/participants"),
            Some("f31f5b00-b724")
        );
        assert_eq!(
            call_id_from_resource_url("/communications/calls/abc123"),
            Some("abc123")
        );
        assert_eq!(call_id_from_resource_url("/communications/calls"), None);
    }

    #[test]
    fn classifies_participant_updates() {
        let item = item(
            "updated",
            "/communications/calls/abc/participants",
            json!([
                { "info": { "identity": { "user": { "id": "u1", "displayName": "Ada" } } } },
                { "info": { "identity": { "application": { "id": "app1" } } } },
            ]),
        );
        match classify(&item) {
            NotificationKind::Participants(ps) => {
                assert_eq!(ps.len(), 2);
                assert_eq!(ps[0].canonical_id(), Some("u1"));
                assert_eq!(ps[1].canonical_id(), Some("app1"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn classifies_operations_and_call_state() {
        let ops = item("updated", "/communications/calls/abc/operations", json!({}));
        assert!(matches!(classify(&ops), NotificationKind::Operations));

        let establishing = item(
            "updated",
            "/communications/calls/abc",
            json!({ "state": "establishing" }),
        );
        assert!(matches!(
            classify(&establishing),
            NotificationKind::CallState(CallState::Establishing)
        ));

        let established = item(
            "updated",
            "/communications/calls/abc",
            json!({ "state": "established" }),
        );
        assert!(matches!(
            classify(&established),
            NotificationKind::CallState(CallState::Established)
        ));
    }

    #[test]
    fn classifies_termination_with_and_without_organizer() {
        let with = item(
            "deleted",
            "/communications/calls/abc",
            json!({
                "state": "terminated",
                "meetingInfo": { "organizer": { "user": { "id": "org-1" } } },
            }),
        );
        match classify(&with) {
            NotificationKind::Terminated { organizer_user_id } => {
                assert_eq!(organizer_user_id.as_deref(), Some("org-1"));
            }
            other => panic!("unexpected kind: {other:?}"),
        }

        let without = item(
            "deleted",
            "/communications/calls/abc",
            json!({ "state": "terminated" }),
        );
        assert!(matches!(
            classify(&without),
            NotificationKind::Terminated { organizer_user_id: None }
        ));

        // A deleted item that is not terminated carries no action.
        let not_terminated = item(
            "deleted",
            "/communications/calls/abc",
            json!({ "state": "establishing" }),
        );
        assert!(matches!(classify(&not_terminated), NotificationKind::Ignored));
    }

    #[test]
    fn created_and_unknown_change_types_are_ignored() {
        let created = item("created", "/communications/calls/abc", json!({}));
        assert!(matches!(classify(&created), NotificationKind::Ignored));

        let odd = item("somethingElse", "/communications/calls/abc", json!({}));
        assert!(matches!(classify(&odd), NotificationKind::Ignored));
    }

    #[test]
    fn recorder_and_raised_hand_shapes_parse() {
        let p: Participant = serde_json::from_value(json!({
            "info": { "identity": { "application": {
                "id": "rec-1", "ApplicationType": "TeamsRecorder", "tenantId": "t-1"
            } } },
            "publishedStates": [ { "type": "raiseHand" } ],
        }))
        .unwrap();
        let app = p.application().unwrap();
        assert_eq!(app.application_type.as_deref(), Some("TeamsRecorder"));
        assert_eq!(app.tenant_id.as_deref(), Some("t-1"));
        assert!(p.has_raised_hand());
    }
}
