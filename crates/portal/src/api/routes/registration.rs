use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    response::Html,
    Form,
};
use log::{debug, warn};
use maud::{html, Markup};
use portal_core::{Attachment, Competition, OfficialField, OfficialRole, PersonField};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    domain::{PaymentOutcome, RegistrationSession},
    infra::{ProgressObserver, SubmitError},
    startup::AppState,
    templates::{
        components::{error_notice, info_notice, warning_notice},
        fragments::registration_form::{
            closed_modal, payment_settled, payment_started, registration_modal,
        },
    },
};

#[derive(Deserialize)]
pub struct OutcomeForm {
    pub outcome: PaymentOutcome,
}

async fn load_catalog(state: &AppState) -> (Vec<Competition>, Option<Markup>) {
    match state.catalog.competitions().await {
        Ok(list) => (list, None),
        Err(err) => {
            warn!("competition catalog unavailable: {err}");
            (
                Vec::new(),
                Some(warning_notice(
                    "Daftar kompetisi belum dapat dimuat. Silakan coba beberapa saat lagi.",
                )),
            )
        }
    }
}

fn session_expired() -> Markup {
    html! {
        div class="modal is-active" {
            div class="modal-background" {}
            div class="modal-card registration-modal" {
                section class="modal-card-body" {
                    (error_notice(
                        "Sesi pendaftaran Anda sudah berakhir. Silakan buka formulir kembali."
                    ))
                    button class="button is-warning is-fullwidth"
                           hx-get="/register"
                           hx-target="#registration-modal"
                           hx-swap="innerHTML" {
                        "Buka Formulir"
                    }
                }
            }
        }
    }
}

/// Copies the posted text fields back into the session. Every mutation
/// endpoint includes the whole form, so typed input survives the full
/// fragment swap; file inputs never round-trip and are skipped here.
fn apply_form_fields(session: &mut RegistrationSession, fields: &[(String, String)]) {
    for (key, value) in fields {
        apply_text_field(session, key, value);
    }
}

fn apply_text_field(session: &mut RegistrationSession, key: &str, value: &str) {
    match key {
        "team_name" => session.team_name = value.to_string(),
        "school" => session.school = value.to_string(),
        "email" => session.email = value.to_string(),
        "whatsapp" => session.whatsapp = value.to_string(),
        "leader_name" => session.update_leader(PersonField::Name(value.to_string())),
        "leader_phone" => session.update_leader(PersonField::Phone(value.to_string())),
        _ => apply_indexed_field(session, key, value),
    }
}

fn apply_indexed_field(session: &mut RegistrationSession, key: &str, value: &str) {
    if let Some(rest) = key.strip_prefix("member_") {
        if let Some((index, field)) = split_indexed(rest) {
            if index >= session.roster.members.len() {
                return;
            }
            match field {
                "name" => session.update_member(index, PersonField::Name(value.to_string())),
                "phone" => session.update_member(index, PersonField::Phone(value.to_string())),
                _ => {}
            }
        }
    } else if let Some(rest) = key.strip_prefix("official_") {
        if let Some((index, field)) = split_indexed(rest) {
            if index >= session.roster.officials.len() {
                return;
            }
            match field {
                "name" => session.update_official(index, OfficialField::Name(value.to_string())),
                "phone" => session.update_official(index, OfficialField::Phone(value.to_string())),
                _ => {}
            }
        }
    }
}

fn split_indexed(rest: &str) -> Option<(usize, &str)> {
    let (index, field) = rest.split_once('_')?;
    Some((index.parse().ok()?, field))
}

/// The classified submit error always leads; a concurrent catalog outage
/// is appended, never substituted for it.
fn submit_failure_notice(catalog_notice: Option<Markup>, err: &SubmitError) -> Markup {
    let error = error_notice(&err.to_string());
    match catalog_notice {
        Some(warning) => html! {
            (error)
            (warning)
        },
        None => error,
    }
}

fn apply_attachment(session: &mut RegistrationSession, key: &str, attachment: Attachment) {
    match key {
        "leader_photo" => session.update_leader(PersonField::Photo(attachment)),
        "leader_surat" => session.update_leader(PersonField::Surat(attachment)),
        "leader_pakta" => session.update_leader(PersonField::Pakta(attachment)),
        _ => {
            if let Some(rest) = key.strip_prefix("member_") {
                if let Some((index, slot)) = split_indexed(rest) {
                    if index >= session.roster.members.len() {
                        return;
                    }
                    match slot {
                        "photo" => session.update_member(index, PersonField::Photo(attachment)),
                        "surat" => session.update_member(index, PersonField::Surat(attachment)),
                        "pakta" => session.update_member(index, PersonField::Pakta(attachment)),
                        _ => {}
                    }
                }
            } else if let Some(rest) = key.strip_prefix("official_") {
                if let Some((index, "photo")) = split_indexed(rest) {
                    if index < session.roster.officials.len() {
                        session.update_official(index, OfficialField::Photo(attachment));
                    }
                }
            }
        }
    }
}

/// Select (or clear) the competition. The roster is wiped on an actual
/// change, so the fragment is always re-rendered in full.
pub async fn select_competition_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let (competitions, mut notice) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();
    apply_form_fields(session, &fields);

    let choice = fields
        .iter()
        .find(|(key, _)| key == "competition")
        .map(|(_, value)| value.as_str())
        .unwrap_or("");

    let selected = if choice.is_empty() {
        None
    } else {
        let found = competitions.iter().find(|c| c.name == choice).cloned();
        if found.is_none() {
            notice = Some(warning_notice("Kompetisi tidak dikenal, silakan pilih ulang."));
        }
        found
    };

    if let Err(err) = session.select_competition(selected) {
        notice = Some(error_notice(&err.to_string()));
    }
    Html(registration_modal(session, &competitions, notice).into_string())
}

pub async fn add_member_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let (competitions, mut notice) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();
    apply_form_fields(session, &fields);

    if let Err(err) = session.add_member() {
        notice = Some(error_notice(&err.to_string()));
    }
    Html(registration_modal(session, &competitions, notice).into_string())
}

pub async fn remove_member_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let (competitions, mut notice) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();
    // Posted names still use pre-removal indexes, so sync first.
    apply_form_fields(session, &fields);

    if index < session.roster.members.len() {
        if let Err(err) = session.remove_member(index) {
            notice = Some(error_notice(&err.to_string()));
        }
    }
    Html(registration_modal(session, &competitions, notice).into_string())
}

pub async fn add_official_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let (competitions, mut notice) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();
    apply_form_fields(session, &fields);

    let role = fields
        .iter()
        .find(|(key, _)| key == "role")
        .and_then(|(_, value)| OfficialRole::from_str(value).ok());

    match role {
        Some(role) => {
            if let Err(err) = session.add_official(role) {
                notice = Some(error_notice(&err.to_string()));
            }
        }
        None => notice = Some(error_notice("Jenis pendamping tidak dikenal.")),
    }
    Html(registration_modal(session, &competitions, notice).into_string())
}

pub async fn remove_official_handler(
    State(state): State<Arc<AppState>>,
    Path((id, index)): Path<(Uuid, usize)>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Html<String> {
    let (competitions, mut notice) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();
    apply_form_fields(session, &fields);

    if index < session.roster.officials.len() {
        if let Err(err) = session.remove_official(index) {
            notice = Some(error_notice(&err.to_string()));
        }
    }
    Html(registration_modal(session, &competitions, notice).into_string())
}

/// Closing is refused while a submission or payment attempt is in flight.
pub async fn close_form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Html<String> {
    let dismissal = {
        let sessions = state.sessions.sessions().read().await;
        sessions.get(&id).map(|s| s.dismiss())
    };

    match dismissal {
        None | Some(Ok(())) => {
            state.sessions.remove(&id).await;
            Html(closed_modal().into_string())
        }
        Some(Err(err)) => {
            let (competitions, _) = load_catalog(&state).await;
            let sessions = state.sessions.sessions().read().await;
            match sessions.get(&id) {
                Some(session) => Html(
                    registration_modal(
                        session,
                        &competitions,
                        Some(warning_notice(&err.to_string())),
                    )
                    .into_string(),
                ),
                None => Html(closed_modal().into_string()),
            }
        }
    }
}

/// The registration write. The multipart body is drained into the session
/// first, the draft is validated and locked in, and only then does the
/// backend call run, without holding the session map.
pub async fn submit_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Html<String> {
    let (competitions, catalog_notice) = load_catalog(&state).await;

    let draft = {
        let mut sessions = state.sessions.sessions().write().await;
        let Some(session) = sessions.get_mut(&id) else {
            return Html(session_expired().into_string());
        };
        session.touch();

        loop {
            match multipart.next_field().await {
                Ok(Some(field)) => {
                    let name = field.name().unwrap_or_default().to_string();
                    if field.file_name().is_some() {
                        let file_name = field.file_name().unwrap_or("file").to_string();
                        let content_type = field
                            .content_type()
                            .unwrap_or("application/octet-stream")
                            .to_string();
                        match field.bytes().await {
                            Ok(bytes) if bytes.is_empty() => {}
                            Ok(bytes) => apply_attachment(
                                session,
                                &name,
                                Attachment::new(file_name, content_type, bytes.to_vec()),
                            ),
                            Err(err) => {
                                warn!("session {id}: unreadable upload field '{name}': {err}");
                                return Html(
                                    registration_modal(
                                        session,
                                        &competitions,
                                        Some(error_notice(
                                            "Berkas tidak dapat dibaca, silakan unggah ulang.",
                                        )),
                                    )
                                    .into_string(),
                                );
                            }
                        }
                    } else {
                        match field.text().await {
                            Ok(text) => apply_text_field(session, &name, &text),
                            Err(err) => {
                                warn!("session {id}: unreadable form field '{name}': {err}");
                            }
                        }
                    }
                }
                Ok(None) => break,
                Err(err) => {
                    warn!("session {id}: multipart body rejected: {err}");
                    return Html(
                        registration_modal(
                            session,
                            &competitions,
                            Some(error_notice(
                                "Data formulir tidak dapat dibaca, silakan coba lagi.",
                            )),
                        )
                        .into_string(),
                    );
                }
            }
        }

        match session.begin_submit() {
            Ok(draft) => draft,
            Err(err) => {
                return Html(
                    registration_modal(session, &competitions, Some(error_notice(&err.to_string())))
                        .into_string(),
                )
            }
        }
    };

    let progress: ProgressObserver = Arc::new(move |fraction: f64| {
        debug!("session {id}: upload progress {:.0}%", fraction * 100.0);
    });
    let result = state.registrations.submit(&draft, Some(progress)).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };

    match result {
        Ok(ack) => {
            session.submit_succeeded(ack.snap_token.clone());
            Html(payment_started(session, &ack.snap_token).into_string())
        }
        Err(err) => {
            session.submit_failed();
            let notice = submit_failure_notice(catalog_notice, &err);
            Html(registration_modal(session, &competitions, Some(notice)).into_string())
        }
    }
}

/// Terminal report from the payment widget.
pub async fn payment_outcome_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Form(form): Form<OutcomeForm>,
) -> Html<String> {
    let (competitions, _) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();

    match session.payment_outcome(form.outcome) {
        Ok(()) => match form.outcome {
            PaymentOutcome::Success => Html(payment_settled().into_string()),
            PaymentOutcome::Pending => Html(
                registration_modal(
                    session,
                    &competitions,
                    Some(info_notice(
                        "Pembayaran Anda sedang diproses. Selesaikan melalui tombol di bawah.",
                    )),
                )
                .into_string(),
            ),
            PaymentOutcome::Error | PaymentOutcome::Closed => Html(
                registration_modal(
                    session,
                    &competitions,
                    Some(warning_notice(
                        "Pembayaran belum selesai. Data Anda tersimpan, silakan bayar kembali.",
                    )),
                )
                .into_string(),
            ),
        },
        Err(err) => Html(
            registration_modal(session, &competitions, Some(error_notice(&err.to_string())))
                .into_string(),
        ),
    }
}

/// Re-invokes the widget with the token kept from the stored submission.
pub async fn payment_retry_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Html<String> {
    let (competitions, _) = load_catalog(&state).await;

    let mut sessions = state.sessions.sessions().write().await;
    let Some(session) = sessions.get_mut(&id) else {
        return Html(session_expired().into_string());
    };
    session.touch();

    match session.retry_payment() {
        Ok(token) => Html(payment_started(session, &token).into_string()),
        Err(err) => Html(
            registration_modal(session, &competitions, Some(error_notice(&err.to_string())))
                .into_string(),
        ),
    }
}
