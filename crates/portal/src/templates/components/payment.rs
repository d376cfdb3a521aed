use maud::{html, Markup, PreEscaped};

/// Inline bridge to the external Snap widget.
///
/// The provider script is injected lazily, on the first payment attempt,
/// never at page load: most visitors only browse the landing page. The
/// shared `snapLoading` promise makes concurrent calls reuse one injection,
/// and a `script[src*="snap.js"]` probe keeps a prior injection (e.g. after
/// an htmx swap re-runs this block) from being duplicated.
///
/// The widget's four callbacks collapse into one outcome value posted back
/// to the workflow endpoint, which answers with the next form fragment.
pub fn payment_bridge(script_url: &str, client_key: &str) -> Markup {
    let script_url = js_string(script_url);
    let client_key = js_string(client_key);
    let bootstrap = format!(
        r#"
(function () {{
    var snapLoading = null;

    window.ensureSnap = function () {{
        if (window.snap) {{ return Promise.resolve(); }}
        if (snapLoading) {{ return snapLoading; }}
        snapLoading = new Promise(function (resolve, reject) {{
            if (document.querySelector('script[src*="snap.js"]')) {{ resolve(); return; }}
            var script = document.createElement('script');
            script.src = {script_url};
            script.setAttribute('data-client-key', {client_key});
            script.async = true;
            script.onload = resolve;
            script.onerror = function () {{ snapLoading = null; reject(new Error('snap load failed')); }};
            document.body.appendChild(script);
        }});
        return snapLoading;
    }};

    window.portalPay = function (token, sessionId) {{
        window.ensureSnap().then(function () {{
            if (!window.snap) {{ return showFatal(); }}
            window.snap.pay(token, {{
                onSuccess: function () {{ reportOutcome(sessionId, 'success'); }},
                onPending: function () {{ reportOutcome(sessionId, 'pending'); }},
                onError:   function () {{ reportOutcome(sessionId, 'error'); }},
                onClose:   function () {{ reportOutcome(sessionId, 'closed'); }}
            }});
        }}).catch(showFatal);
    }};

    function reportOutcome(sessionId, outcome) {{
        htmx.ajax('POST', '/register/' + sessionId + '/payment/outcome', {{
            target: '#registration-modal',
            swap: 'innerHTML',
            values: {{ outcome: outcome }}
        }});
    }}

    function showFatal() {{
        var status = document.getElementById('payment-status');
        if (status) {{
            status.innerHTML =
                '<div class="notification is-danger">' +
                'Sistem pembayaran belum siap. Silakan muat ulang halaman dan coba lagi.' +
                '</div>';
        }}
    }}
}})();
"#
    );

    html! {
        script {
            (PreEscaped(bootstrap))
        }
    }
}

/// Script fragment that kicks the widget off for a fresh token. Returned
/// together with the payment status box after a successful submission.
pub fn payment_invocation(session_id: &str, token: &str) -> Markup {
    let call = format!("portalPay({}, {});", js_string(token), js_string(session_id));
    html! {
        script {
            (PreEscaped(call))
        }
    }
}

/// Renders a value as a single-quoted JS string literal. These literals end
/// up inside `PreEscaped` inline scripts, so the token and the config values
/// cannot be allowed to terminate the literal or the surrounding
/// `<script>` element. `<` becomes a unicode escape to keep `</script>`
/// inert, and the JS-only line terminators U+2028/U+2029 are escaped too.
fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '<' => out.push_str("\\u003c"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            _ => out.push(ch),
        }
    }
    out.push('\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_quotes_plain_values() {
        assert_eq!(js_string("tok-abc123"), "'tok-abc123'");
    }

    #[test]
    fn test_js_string_neutralizes_breakout_attempts() {
        assert_eq!(
            js_string("a'b</script>"),
            "'a\\'b\\u003c/script>'"
        );
        assert_eq!(js_string("a\\'b"), "'a\\\\\\'b'");
        assert_eq!(js_string("a\nb\u{2028}c"), "'a\\nb\\u2028c'");
    }

    #[test]
    fn test_invocation_keeps_hostile_token_inside_the_literal() {
        let markup =
            payment_invocation("sid-1", "x'); alert(1); //</script>").into_string();
        assert!(!markup.contains("</script>portalPay"));
        assert!(!markup.contains("x'); alert"));
        assert!(markup.contains("\\u003c/script>"));
    }

    #[test]
    fn test_bridge_quotes_config_values() {
        let markup = payment_bridge(
            "https://app.sandbox.midtrans.com/snap/snap.js",
            "SB-Mid-client-x",
        )
        .into_string();
        assert!(markup.contains("script.src = 'https://app.sandbox.midtrans.com/snap/snap.js';"));
        assert!(markup.contains("setAttribute('data-client-key', 'SB-Mid-client-x');"));
    }
}
