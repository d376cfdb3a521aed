use maud::{html, Markup};
use portal_core::{rules, Competition, Official, TeamMember};

use crate::domain::{Phase, RegistrationSession};
use crate::templates::components::{payment_invocation, success_notice};

/// The registration modal, re-rendered in full after every mutation.
///
/// Text inputs carry their values from the session so the form survives
/// fragment swaps; file inputs cannot be re-populated by the browser and
/// are read once, at submit time.
pub fn registration_modal(
    session: &RegistrationSession,
    competitions: &[Competition],
    notice: Option<Markup>,
) -> Markup {
    let sid = session.id.to_string();
    let busy = matches!(session.phase, Phase::Submitting | Phase::AwaitingPayment);
    // After a pending or failed payment the draft is locked in; only the
    // retry and close actions apply until the session resets.
    let locked = !matches!(session.phase, Phase::Editing);
    let selected = session.competition.as_ref().map(|c| c.name.as_str());
    let show_school = selected.map_or(true, rules::school_required);

    html! {
        div class="modal is-active" {
            div class="modal-background" {}
            div class="modal-card registration-modal" {
                header class="modal-card-head" {
                    p class="modal-card-title" { "Registration Form" }
                    @if busy {
                        button class="delete" aria-label="close" disabled {}
                    } @else {
                        button class="delete" aria-label="close"
                               hx-post={ "/register/" (sid) "/close" }
                               hx-target="#registration-modal"
                               hx-swap="innerHTML" {}
                    }
                }
                section class="modal-card-body" {
                    @if let Some(notice) = notice {
                        (notice)
                    }

                    form id="registration-form"
                         hx-post={ "/register/" (sid) "/submit" }
                         hx-encoding="multipart/form-data"
                         hx-target="#registration-modal"
                         hx-swap="innerHTML" {

                        fieldset disabled[locked] {
                            (competition_select(&sid, competitions, selected))

                            div class="field" {
                                label class="label" { "Nama Tim" }
                                input class="input" type="text" name="team_name"
                                      placeholder="Masukkan nama tim"
                                      value=(session.team_name) required;
                            }

                            (leader_card(session))
                            (members_section(&sid, session))
                            (officials_section(&sid, session))

                            @if show_school {
                                div class="field" {
                                    label class="label" { "Asal Sekolah" }
                                    input class="input" type="text" name="school"
                                          placeholder="Enter your school name"
                                          value=(session.school) required;
                                }
                            }

                            div class="field" {
                                label class="label" { "Email" }
                                input class="input" type="email" name="email"
                                      placeholder="Enter your email"
                                      value=(session.email) required;
                            }
                            div class="field" {
                                label class="label" { "No. WhatsApp" }
                                input class="input" type="tel" name="whatsapp"
                                      placeholder="Enter your WhatsApp number"
                                      value=(session.whatsapp) required;
                            }

                            (fee_box(session))

                            div class="field" {
                                label class="checkbox" {
                                    input type="checkbox" name="confirm" required;
                                    " Saya menyatakan bahwa data yang saya berikan adalah benar"
                                }
                            }

                            @let submit_class = if busy {
                                "button is-warning is-fullwidth is-loading"
                            } else {
                                "button is-warning is-fullwidth"
                            };
                            button type="submit" class=(submit_class) {
                                "Daftar & Bayar"
                            }
                        }
                    }

                    (retry_button(&sid, session))
                    div id="payment-status" {}
                }
            }
        }
    }
}

/// Fragment returned after a stored submission: keeps the modal up, shows
/// the waiting state, and fires the widget for the fresh token.
pub fn payment_started(session: &RegistrationSession, token: &str) -> Markup {
    let sid = session.id.to_string();
    html! {
        div class="modal is-active" {
            div class="modal-background" {}
            div class="modal-card registration-modal" {
                header class="modal-card-head" {
                    p class="modal-card-title" { "Menunggu Pembayaran" }
                    button class="delete" aria-label="close" disabled {}
                }
                section class="modal-card-body" {
                    div class="notification is-info" {
                        "Registrasi tersimpan. Selesaikan pembayaran Anda melalui jendela Midtrans."
                    }
                    div id="payment-status" {}
                    (payment_invocation(&sid, token))
                }
            }
        }
    }
}

/// Fragment returned when the widget reports success: the form state is
/// already reset, the modal closes itself after the message.
pub fn payment_settled() -> Markup {
    html! {
        div class="modal is-active" {
            div class="modal-background" {}
            div class="modal-card registration-modal" {
                section class="modal-card-body" {
                    (success_notice(
                        "Pembayaran berhasil! Terima kasih, pendaftaran Anda telah dikonfirmasi."
                    ))
                    button class="button is-primary is-fullwidth"
                           hx-get="/register/closed"
                           hx-target="#registration-modal"
                           hx-swap="innerHTML" {
                        "Tutup"
                    }
                }
            }
        }
    }
}

/// An empty target: the modal is gone.
pub fn closed_modal() -> Markup {
    html! {}
}

fn competition_select(
    sid: &str,
    competitions: &[Competition],
    selected: Option<&str>,
) -> Markup {
    html! {
        div class="field" {
            label class="label" { "Pilih Kompetisi" }
            div class="select is-fullwidth" {
                select name="competition" required
                       hx-post={ "/register/" (sid) "/competition" }
                       hx-include="closest form"
                       hx-target="#registration-modal"
                       hx-swap="innerHTML" {
                    option value="" selected[selected.is_none()] { "-- Pilih Kompetisi --" }
                    @if competitions.is_empty() {
                        option disabled { "Loading competitions..." }
                    }
                    @for comp in competitions {
                        option value=(comp.name) selected[selected == Some(comp.name.as_str())] {
                            (comp.name)
                        }
                    }
                }
            }
        }
    }
}

fn leader_card(session: &RegistrationSession) -> Markup {
    let leader = &session.roster.leader;
    html! {
        div class="field" {
            label class="label" { "Data Ketua Tim" }
            div class="box leader-card" {
                span class="tag is-link mb-3" { "Ketua Tim" }

                input class="input mb-2" type="text" name="leader_name"
                      placeholder="Nama lengkap ketua tim"
                      value=(leader.name) required;
                input class="input mb-2" type="tel" name="leader_phone"
                      placeholder="Nomor HP ketua tim"
                      value=(leader.phone) required;

                (file_field("leader_photo", "Pas Foto Ketua Tim", "image/*"))
                (file_field("leader_surat", "Kartu Pelajar/Surat Keterangan", ".pdf,.jpg,.jpeg,.png,.webp"))
                (file_field("leader_pakta", "Pakta Integritas", ".pdf,.jpg,.jpeg,.png,.webp"))
            }
        }
    }
}

fn members_section(sid: &str, session: &RegistrationSession) -> Markup {
    html! {
        div class="field" {
            label class="label" { "Anggota Tim (Selain Ketua)" }
            @if session.roster.members.is_empty() {
                p class="is-italic has-text-grey" {
                    "Belum ada anggota tambahan. Klik tombol \"Tambah Anggota\" untuk menambahkan."
                }
            }
            @for (idx, member) in session.roster.members.iter().enumerate() {
                (member_card(sid, idx, member))
            }
            button type="button" class="button is-small is-info"
                   hx-post={ "/register/" (sid) "/members" }
                   hx-include="closest form"
                   hx-target="#registration-modal"
                   hx-swap="innerHTML" {
                "+ Tambah Anggota"
            }
        }
    }
}

fn member_card(sid: &str, idx: usize, member: &TeamMember) -> Markup {
    html! {
        div class="box member-card" {
            div class="level is-mobile mb-2" {
                div class="level-left" {
                    strong { "Anggota " (idx + 1) }
                }
                div class="level-right" {
                    button type="button" class="delete"
                           hx-post={ "/register/" (sid) "/members/" (idx) "/remove" }
                           hx-include="closest form"
                           hx-target="#registration-modal"
                           hx-swap="innerHTML" {}
                }
            }

            input class="input mb-2" type="text" name={ "member_" (idx) "_name" }
                  placeholder="Nama lengkap" value=(member.name) required;
            input class="input mb-2" type="tel" name={ "member_" (idx) "_phone" }
                  placeholder="Nomor HP" value=(member.phone) required;

            (file_field(&format!("member_{idx}_photo"), "Pas Foto", "image/*"))
            (file_field(&format!("member_{idx}_surat"), "Kartu Pelajar/Surat Keterangan", ".pdf,.jpg,.jpeg,.png,.webp"))
            (file_field(&format!("member_{idx}_pakta"), "Pakta Integritas", ".pdf,.jpg,.jpeg,.png,.webp"))
        }
    }
}

fn officials_section(sid: &str, session: &RegistrationSession) -> Markup {
    html! {
        div class="field" {
            label class="label" { "Pendamping (Opsional)" }
            div class="buttons" {
                (add_official_button(sid, "coach", "+ Coach", "is-info"))
                (add_official_button(sid, "guru_pendamping", "+ Guru Pendamping", "is-success"))
                (add_official_button(sid, "official", "+ Official", "is-link"))
            }
            @for (idx, official) in session.roster.officials.iter().enumerate() {
                (official_card(sid, idx, official))
            }
        }
    }
}

fn add_official_button(sid: &str, role: &str, label: &str, color: &str) -> Markup {
    html! {
        button type="button" class={ "button is-small " (color) }
               hx-post={ "/register/" (sid) "/officials" }
               hx-vals=(format!(r#"{{"role":"{role}"}}"#))
               hx-include="closest form"
               hx-target="#registration-modal"
               hx-swap="innerHTML" {
            (label)
        }
    }
}

fn official_card(sid: &str, idx: usize, official: &Official) -> Markup {
    html! {
        div class="box official-card" {
            div class="level is-mobile mb-2" {
                div class="level-left" {
                    strong { (official.role.label()) }
                }
                div class="level-right" {
                    button type="button" class="delete"
                           hx-post={ "/register/" (sid) "/officials/" (idx) "/remove" }
                           hx-include="closest form"
                           hx-target="#registration-modal"
                           hx-swap="innerHTML" {}
                }
            }

            input class="input mb-2" type="text" name={ "official_" (idx) "_name" }
                  placeholder="Nama lengkap" value=(official.name) required;
            input class="input mb-2" type="tel" name={ "official_" (idx) "_phone" }
                  placeholder="Nomor Whatsapp" value=(official.phone) required;

            (file_field(&format!("official_{idx}_photo"), "Pas Foto", "image/*"))
        }
    }
}

fn file_field(name: &str, label: &str, accept: &str) -> Markup {
    html! {
        label class="label is-small mt-2" { (label) }
        input class="input mb-2" type="file" name=(name) accept=(accept) required;
    }
}

fn fee_box(session: &RegistrationSession) -> Markup {
    let total = session.total_fee();
    let headcount = session.roster.headcount();
    let selected = session.competition.as_ref().map(|c| c.name.as_str());

    html! {
        div class="box fee-box" {
            div class="level is-mobile" {
                div class="level-left" {
                    span class="has-text-weight-semibold" { "Total Biaya:" }
                }
                div class="level-right" {
                    span class="is-size-5 has-text-weight-bold has-text-link" {
                        "Rp " (format_rupiah(total))
                    }
                }
            }

            @if selected == Some(rules::SHORT_MOVIE) {
                @if headcount <= rules::SHORT_MOVIE_INCLUDED {
                    p class="is-size-7 has-text-grey" {
                        (headcount) " orang (termasuk dalam base fee)"
                    }
                } @else {
                    p class="is-size-7 has-text-grey" {
                        "Base fee (" (rules::SHORT_MOVIE_INCLUDED) " orang) + "
                        (headcount - rules::SHORT_MOVIE_INCLUDED)
                        " orang x Rp " (format_rupiah(rules::SHORT_MOVIE_EXTRA_FEE))
                    }
                }
            } @else if selected.is_some() {
                p class="is-size-7 has-text-grey" {
                    "Harga flat per tim (" (headcount) " orang)"
                }
            }
        }
    }
}

/// Thousands separator, id-ID style.
fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

fn retry_button(sid: &str, session: &RegistrationSession) -> Markup {
    let retryable = matches!(session.phase, Phase::PaymentPending | Phase::PaymentFailed)
        && session.payment.is_some();
    html! {
        @if retryable {
            button class="button is-success is-fullwidth mt-2"
                   hx-post={ "/register/" (sid) "/payment/retry" }
                   hx-target="#registration-modal"
                   hx-swap="innerHTML" {
                "Bayar Sekarang"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentOutcome;
    use portal_core::{Attachment, PersonField};

    fn submittable_session() -> RegistrationSession {
        let mut session = RegistrationSession::open();
        session
            .select_competition(Some(Competition::named("Band", 150_000)))
            .unwrap();
        session.team_name = "Garuda".into();
        session.email = "kapten@example.com".into();
        session.whatsapp = "0812000".into();
        let attachment = Attachment::new("doc.pdf", "application/pdf", vec![0u8; 4]);
        session.update_leader(PersonField::Name("Sinta".into()));
        session.update_leader(PersonField::Phone("0812111".into()));
        session.update_leader(PersonField::Photo(attachment.clone()));
        session.update_leader(PersonField::Surat(attachment.clone()));
        session.update_leader(PersonField::Pakta(attachment));
        session
    }

    #[test]
    fn test_fields_locked_after_failed_payment() {
        let mut session = submittable_session();
        session.begin_submit().unwrap();
        session.submit_succeeded("tok-1".into());
        session.payment_outcome(PaymentOutcome::Error).unwrap();

        let markup = registration_modal(&session, &[], None).into_string();
        assert!(markup.contains("<fieldset disabled>"));
        assert!(markup.contains("Bayar Sekarang"));
        // close stays available once the payment attempt has concluded
        assert!(markup.contains("/close"));
    }

    #[test]
    fn test_fields_enabled_while_editing() {
        let session = submittable_session();
        let markup = registration_modal(&session, &[], None).into_string();
        assert!(!markup.contains("<fieldset disabled>"));
    }

    #[test]
    fn test_format_rupiah_groups_thousands() {
        assert_eq!(format_rupiah(0), "0");
        assert_eq!(format_rupiah(950), "950");
        assert_eq!(format_rupiah(20_000), "20.000");
        assert_eq!(format_rupiah(1_250_000), "1.250.000");
    }

    #[test]
    fn test_school_field_hidden_for_exempt_competition() {
        let mut session = RegistrationSession::open();
        session
            .select_competition(Some(Competition::named("Modern Dance", 100_000)))
            .unwrap();
        let markup = registration_modal(&session, &[], None).into_string();
        assert!(!markup.contains("name=\"school\""));

        session
            .select_competition(Some(Competition::named("Basket Putra", 100_000)))
            .unwrap();
        let markup = registration_modal(&session, &[], None).into_string();
        assert!(markup.contains("name=\"school\""));
    }
}
