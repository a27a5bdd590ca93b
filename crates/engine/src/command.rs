//! JSON command protocol for scripted sessions.

use serde::{Deserialize, Serialize};
use shared::{DisplayPatch, LatLng, ObjectId};

use crate::harness::TestHarness;
use crate::input::{DirectionalKey, InputOutcome};
use crate::persistence::RemoteStore;
use crate::view::ViewState;

fn one_frame() -> u32 {
    1
}

/// A scripted session command.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    /// Refetch everything from the store
    Refresh,
    /// Create an object at a position; it becomes selected
    CreateObject { lat: f64, lng: f64 },
    DeleteObject { id: ObjectId },
    Select { id: ObjectId },
    Deselect,
    PointerDown { id: ObjectId },
    /// Move the dragged object by a delta in degrees
    PointerMove { id: ObjectId, dlat: f64, dlng: f64 },
    PointerUp { id: ObjectId },
    /// Down + move + up
    Drag { id: ObjectId, dlat: f64, dlng: f64 },
    KeyDown { key: DirectionalKey },
    KeyUp { key: DirectionalKey },
    /// Run frame ticks
    Tick {
        #[serde(default = "one_frame")]
        frames: u32,
    },
    Undo,
    /// Live compass preview, viewport-relative angle
    PreviewHeading { id: ObjectId, visual_angle: f64 },
    CommitHeading { id: ObjectId, visual_angle: f64 },
    FaceScreenLeft { id: ObjectId },
    /// Edit label / type / color
    SetDisplay {
        id: ObjectId,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        aircraft_type: Option<String>,
        #[serde(default)]
        color: Option<String>,
    },
    SetFrameRotation { degrees: f64 },
    /// Move the map; the bearing also sets the frame rotation
    SetView {
        lat: f64,
        lng: f64,
        zoom: f64,
        bearing: f64,
    },
    /// Move the virtual clock and flush due writes
    Advance { ms: u64 },
    /// Advance until nothing is pending
    Settle,
    /// Final flush
    Teardown,
    Inspect,
}

/// Response from executing a command.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl CommandResponse {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
            data: None,
        }
    }

    fn ok_with_data(data: serde_json::Value) -> Self {
        Self {
            success: true,
            error: None,
            data: Some(data),
        }
    }

    fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(msg.into()),
            data: None,
        }
    }
}

fn outcome(result: InputOutcome) -> CommandResponse {
    let (name, id) = match result {
        InputOutcome::Ignored => ("ignored", None),
        InputOutcome::Updated => ("updated", None),
        InputOutcome::Commit(id) => ("commit", Some(id)),
        InputOutcome::Reverted(id) => ("reverted", Some(id)),
    };
    CommandResponse::ok_with_data(serde_json::json!({ "outcome": name, "id": id }))
}

fn transform_data<R: RemoteStore>(harness: &TestHarness<R>, id: ObjectId) -> CommandResponse {
    match harness.transform(id) {
        Some(t) => CommandResponse::ok_with_data(serde_json::json!({
            "id": id,
            "lat": t.position.lat,
            "lng": t.position.lng,
            "heading": t.heading,
        })),
        None => CommandResponse::err(format!("Unknown object {}", id)),
    }
}

/// Execute a single command on the harness.
pub fn execute_command<R: RemoteStore>(
    harness: &mut TestHarness<R>,
    cmd: SessionCommand,
) -> CommandResponse {
    match cmd {
        SessionCommand::Refresh => match harness.refresh() {
            Ok(report) => CommandResponse::ok_with_data(serde_json::json!(report)),
            Err(e) => CommandResponse::err(e),
        },

        SessionCommand::CreateObject { lat, lng } => match harness.create_object(lat, lng) {
            Ok(id) => transform_data(harness, id),
            Err(e) => CommandResponse::err(e),
        },

        SessionCommand::DeleteObject { id } => match harness.delete_object(id) {
            Ok(()) => CommandResponse::ok(),
            Err(e) => CommandResponse::err(e),
        },

        SessionCommand::Select { id } => outcome(harness.select(id)),
        SessionCommand::Deselect => outcome(harness.deselect()),
        SessionCommand::PointerDown { id } => outcome(harness.pointer_down(id)),
        SessionCommand::PointerMove { id, dlat, dlng } => {
            outcome(harness.pointer_move(id, dlat, dlng))
        }
        SessionCommand::PointerUp { id } => outcome(harness.pointer_up(id)),
        SessionCommand::Drag { id, dlat, dlng } => outcome(harness.drag(id, dlat, dlng)),
        SessionCommand::KeyDown { key } => outcome(harness.key_down(key)),
        SessionCommand::KeyUp { key } => outcome(harness.key_up(key)),

        SessionCommand::Tick { frames } => match harness.tick(frames) {
            Some(t) => CommandResponse::ok_with_data(serde_json::json!({
                "lat": t.position.lat,
                "lng": t.position.lng,
                "heading": t.heading,
            })),
            None => CommandResponse::ok(),
        },

        SessionCommand::Undo => outcome(harness.undo()),

        SessionCommand::PreviewHeading { id, visual_angle } => {
            outcome(harness.preview_heading(id, visual_angle))
        }
        SessionCommand::CommitHeading { id, visual_angle } => {
            outcome(harness.commit_heading(id, visual_angle))
        }
        SessionCommand::FaceScreenLeft { id } => outcome(harness.face_screen_left(id)),

        SessionCommand::SetDisplay {
            id,
            label,
            aircraft_type,
            color,
        } => {
            let patch = DisplayPatch {
                label,
                aircraft_type,
                color,
            };
            if harness.update_display(id, &patch) {
                CommandResponse::ok()
            } else {
                CommandResponse::err(format!("Unknown object {}", id))
            }
        }

        SessionCommand::SetFrameRotation { degrees } => {
            harness.engine_mut().set_frame_rotation(degrees);
            CommandResponse::ok_with_data(serde_json::json!({
                "frame_rotation": harness.engine().frame_rotation()
            }))
        }

        SessionCommand::SetView {
            lat,
            lng,
            zoom,
            bearing,
        } => {
            let view = ViewState {
                center: LatLng::new(lat, lng),
                zoom,
                bearing_deg: bearing,
            };
            harness.engine_mut().apply_view(&view);
            CommandResponse::ok_with_data(serde_json::json!(harness.engine().view()))
        }

        SessionCommand::Advance { ms } => {
            let report = harness.advance(ms);
            CommandResponse::ok_with_data(serde_json::json!(report))
        }

        SessionCommand::Settle => {
            let report = harness.settle();
            CommandResponse::ok_with_data(serde_json::json!(report))
        }

        SessionCommand::Teardown => {
            let report = harness.teardown();
            CommandResponse::ok_with_data(serde_json::json!(report))
        }

        SessionCommand::Inspect => CommandResponse::ok_with_data(harness.inspect()),
    }
}

/// Parse and execute a single JSON command string.
pub fn execute_json<R: RemoteStore>(
    harness: &mut TestHarness<R>,
    json: &str,
) -> Result<CommandResponse, String> {
    let cmd: SessionCommand =
        serde_json::from_str(json).map_err(|e| format!("Invalid command JSON: {e}"))?;
    Ok(execute_command(harness, cmd))
}

/// Parse and execute multiple JSON commands (array).
pub fn execute_json_batch<R: RemoteStore>(
    harness: &mut TestHarness<R>,
    json: &str,
) -> Result<Vec<CommandResponse>, String> {
    let cmds: Vec<SessionCommand> =
        serde_json::from_str(json).map_err(|e| format!("Invalid commands JSON: {e}"))?;
    Ok(cmds
        .into_iter()
        .map(|cmd| execute_command(harness, cmd))
        .collect())
}
