use maud::{html, Markup, DOCTYPE};

use crate::templates::components::payment_bridge;

pub struct PageConfig<'a> {
    pub title: &'a str,
    pub payment_script_url: &'a str,
    pub payment_client_key: &'a str,
}

pub fn base(config: &PageConfig, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="id" {
            head {
                base href="/";
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (config.title) }

                link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bulma@1.0.2/css/bulma.min.css";
                link rel="stylesheet" href="/ui/styles.css";

                script src="https://unpkg.com/htmx.org@1.9.10" {}
            }
            body {
                section class="section pt-3" {
                    div class="container" {
                        div id="main-content" {
                            (content)
                        }
                    }
                }

                div id="registration-modal" {}

                (payment_bridge(config.payment_script_url, config.payment_client_key))
            }
        }
    }
}
