//! Reply-keyboard button labels

pub const CANCEL: &str = "🚫 Cancel";
pub const BACK: &str = "◀️ Back";
pub const YES: &str = "✅ Yes";
pub const NO: &str = "⛔️ No";

pub const SCHEDULE: &str = "🗓️ Schedule";
pub const CREATE_EVENT: &str = "➕ Add event";
pub const CHANGE_BAND: &str = "Change band";
pub const CREATE_BAND: &str = "Create band";

pub const VOICES: &str = "Voices";
pub const TRANSPOSE: &str = "🎛 Transpose";
pub const DELETE: &str = "Delete";

pub const ADD_SONG: &str = "➕ Song";
pub const REMOVE_SONG: &str = "➖ Song";
pub const TODAY: &str = "⏰ Today";

pub const NEXT_PAGE: &str = "▶️ Next page";
pub const PREV_PAGE: &str = "◀️ Previous page";
