//! Script and landing page sent to browsers

const HOST_PLACEHOLDER: &str = "{{host}}";

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>reloadwatch</title></head>
<body>
<h2>reloadwatch</h2>
<p>Insert the following snippet into your webpage:
<code>
&lt;script src="http://{{host}}/js"&gt;&lt;/script&gt;
</code>
</p>
</body>
</html>
"#;

const RELOAD_JS: &str = r#"(function () {
    var added = false;
    function connect() {
        if (added) { return; }
        added = true;

        if (!window.WebSocket) {
            console.log("reloadwatch: websockets not supported");
            return;
        }

        var sock = new WebSocket("ws://{{host}}/ws");
        sock.onopen = function () {
            console.log("reloadwatch connected");
        };
        sock.onclose = function () {
            console.log("reloadwatch disconnected");
        };
        sock.onmessage = function (e) {
            setTimeout(function () {
                location.reload();
            }, parseFloat(e.data));
        };
    }

    setTimeout(function () {
        setTimeout(connect, 600);
        window.onload = connect;
    }, 600);
})();
"#;

/// Reload script for a page served from `host`
pub fn reload_js(host: &str) -> String {
    RELOAD_JS.replace(HOST_PLACEHOLDER, &escape_js(host))
}

/// Landing page showing the snippet to embed
pub fn index_html(host: &str) -> String {
    INDEX_HTML.replace(HOST_PLACEHOLDER, &escape_html(host))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn escape_js(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' | '"' | '\'' => {
                out.push('\\');
                out.push(c);
            }
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            c if c.is_control() => {}
            _ => out.push(c),
        }
    }
    out
}
