//! Flow names and shared context field names

use flow_state::FlowName;

pub const MAIN_MENU: FlowName = FlowName::MAIN_MENU;
pub const SEARCH: FlowName = FlowName::from_static("search");
pub const SONG_ACTIONS: FlowName = FlowName::from_static("song_actions");
pub const TRANSPOSE: FlowName = FlowName::from_static("transpose");
pub const DELETE_SONG: FlowName = FlowName::from_static("delete_song");
pub const GET_VOICES: FlowName = FlowName::from_static("get_voices");
pub const UPLOAD_VOICE: FlowName = FlowName::from_static("upload_voice");
pub const CHOOSE_BAND: FlowName = FlowName::from_static("choose_band");
pub const CREATE_BAND: FlowName = FlowName::from_static("create_band");
pub const CREATE_EVENT: FlowName = FlowName::from_static("create_event");
pub const GET_EVENTS: FlowName = FlowName::from_static("get_events");
pub const EVENT_ACTIONS: FlowName = FlowName::from_static("event_actions");
pub const ADD_EVENT_SONG: FlowName = FlowName::from_static("add_event_song");
pub const REMOVE_EVENT_SONG: FlowName = FlowName::from_static("remove_event_song");
pub const DELETE_EVENT: FlowName = FlowName::from_static("delete_event");

/// Context fields passed between flows or kept across steps.
pub mod fields {
    pub const SONG_ID: &str = "song_id";
    pub const EVENT_ID: &str = "event_id";
    pub const BAND_ID: &str = "band_id";

    pub const FILE_ID: &str = "file_id";
    pub const FILE_NAME: &str = "file_name";
    pub const NAME: &str = "name";
    pub const DATE: &str = "date";
}
