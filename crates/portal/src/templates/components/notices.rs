use maud::{html, Markup};

/// Blocking-style notification used for every user-visible failure.
pub fn error_notice(message: &str) -> Markup {
    html! {
        div class="notification is-danger" role="alert" {
            (message)
        }
    }
}

pub fn warning_notice(message: &str) -> Markup {
    html! {
        div class="notification is-warning" role="alert" {
            (message)
        }
    }
}

pub fn info_notice(message: &str) -> Markup {
    html! {
        div class="notification is-info" {
            (message)
        }
    }
}

pub fn success_notice(message: &str) -> Markup {
    html! {
        div class="notification is-success" {
            (message)
        }
    }
}
