//! Main menu

use flow_engine::{register_flow, FlowDef, FlowError, Turn};
use flow_state::{Context, Session};

use crate::labels;
use crate::names;
use crate::ui::{self, is_label};

fn flow() -> FlowDef {
    FlowDef::new(names::MAIN_MENU).step(menu)
}

register_flow!(flow);

/// Menu buttons start their flows; any other text is a song search.
async fn menu(turn: &Turn, mut session: Session) -> Result<Session, FlowError> {
    let Some(text) = turn.text().filter(|text| !text.starts_with('/')) else {
        turn.ask(
            "Send a song name to search for it, or pick an action.",
            ui::menu_keyboard(),
        )
        .await?;
        return Ok(session);
    };

    if is_label(text, labels::SCHEDULE) {
        turn.start(session, names::GET_EVENTS, Context::new()).await
    } else if is_label(text, labels::CREATE_EVENT) {
        turn.start(session, names::CREATE_EVENT, Context::new()).await
    } else if is_label(text, labels::CHANGE_BAND) {
        turn.start(session, names::CHOOSE_BAND, Context::new()).await
    } else {
        session.push(names::SEARCH, Context::new());
        turn.forward(session).await
    }
}
