use std::sync::Arc;

use axum::{extract::State, http::HeaderMap, response::Html};
use log::warn;
use maud::Markup;

use crate::{
    startup::AppState,
    templates::{
        components::warning_notice,
        fragments::registration_form::{closed_modal, registration_modal},
        layouts::base::{base, PageConfig},
        pages::landing::landing_page,
    },
};

pub(crate) fn page(state: &AppState, title: &str, content: Markup) -> Html<String> {
    let config = PageConfig {
        title,
        payment_script_url: &state.payment_script_url,
        payment_client_key: &state.payment_client_key,
    };
    Html(base(&config, content).into_string())
}

/// Landing page. The registered-team counter rides on the cached
/// registrations read, which degrades to an empty list on backend trouble.
pub async fn landing_handler(State(state): State<Arc<AppState>>) -> Html<String> {
    let registered = state.registrations.pending().await.len();
    page(&state, "REC Cup", landing_page(registered))
}

/// Renders the fragment alone for HTMX swaps, or wraps it in the base
/// layout when the URL is opened directly.
fn render_fragment(
    headers: &HeaderMap,
    state: &AppState,
    title: &str,
    content: Markup,
) -> Html<String> {
    if headers.get("HX-Request").is_some() {
        Html(content.into_string())
    } else {
        page(state, title, content)
    }
}

/// Opens a fresh registration session and returns the modal fragment.
pub async fn open_form_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Html<String> {
    let (competitions, notice) = match state.catalog.competitions().await {
        Ok(list) => (list, None),
        Err(err) => {
            warn!("competition catalog unavailable for new form: {err}");
            (
                Vec::new(),
                Some(warning_notice(
                    "Daftar kompetisi belum dapat dimuat. Silakan coba beberapa saat lagi.",
                )),
            )
        }
    };

    let id = state.sessions.create().await;
    let sessions = state.sessions.sessions().read().await;
    match sessions.get(&id) {
        Some(session) => render_fragment(
            &headers,
            &state,
            "Registrasi - REC Cup",
            registration_modal(session, &competitions, notice),
        ),
        None => Html(closed_modal().into_string()),
    }
}

/// Empty modal target, used after the success message is dismissed.
pub async fn closed_form_handler() -> Html<String> {
    Html(closed_modal().into_string())
}
