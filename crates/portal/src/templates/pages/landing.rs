use maud::{html, Markup};

/// Landing hero for the event. The registration button pulls the form
/// fragment into the modal container; the other actions are static links.
///
/// `registered` comes from the cached registrations read and may be zero
/// when the backend is unreachable, in which case the counter is omitted.
pub fn landing_page(registered: usize) -> Markup {
    html! {
        div class="landing-hero has-text-centered" {
            figure class="landing-art" {
                img src="/ui/title.webp" alt="REC Cup" fetchpriority="high";
            }

            h1 class="title is-2" { "REC Cup" }
            p class="subtitle is-5" {
                "Kompetisi antar sekolah: olahraga, seni, dan akademik."
            }
            @if registered > 0 {
                p class="has-text-grey" { (registered) " tim telah terdaftar" }
            }

            div class="buttons is-centered mt-5" {
                button class="button is-warning is-medium"
                       hx-get="/register"
                       hx-target="#registration-modal"
                       hx-swap="innerHTML" {
                    "Registration"
                }
                a class="button is-light is-medium" href="/ui/info-lomba.pdf" {
                    "Info Lomba"
                }
            }
            div class="buttons is-centered" {
                a class="button is-link is-medium" href="/ui/guidebook.pdf" {
                    "Guidebook"
                }
            }
        }
    }
}
