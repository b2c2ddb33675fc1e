// HTML rendering for the gallery pages.

use axum::http::StatusCode;
use std::fmt::Write as _;

use crate::caption::Caption;

/// One entry of the index page.
#[derive(Debug, Clone)]
pub struct GalleryItem {
    pub name: String,
    pub caption: Option<Caption>,
}

const STYLE: &str = r#"
    <style>
        * { margin: 0; padding: 0; box-sizing: border-box; }
        body {
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Oxygen, Ubuntu, Cantarell, sans-serif;
            background: linear-gradient(135deg, #667eea 0%, #764ba2 100%);
            min-height: 100vh;
            padding: 20px;
        }
        .container {
            background: white;
            border-radius: 20px;
            box-shadow: 0 20px 60px rgba(0,0,0,0.3);
            max-width: 900px;
            margin: 0 auto;
            padding: 40px;
        }
        h1, h2 { color: #333; margin-bottom: 20px; }
        form.upload { margin-bottom: 30px; padding: 20px; border: 3px dashed #667eea; border-radius: 15px; background: #f8f9ff; }
        ul.gallery { list-style: none; }
        ul.gallery li { padding: 15px 0; border-top: 1px solid #e0e0e0; }
        .title { color: #667eea; font-weight: 600; margin-top: 8px; }
        .description { color: #333; line-height: 1.6; }
        table { border-collapse: collapse; margin-top: 20px; }
        td { border: 1px solid #ccc; padding: 4px 8px; font-size: 0.9em; }
        button { background: #667eea; color: white; border: none; border-radius: 20px; padding: 6px 14px; cursor: pointer; }
        button.delete { background: #c33; margin-top: 8px; }
        .error { background: #fee; border: 2px solid #fcc; color: #c33; padding: 15px; border-radius: 10px; }
    </style>
"#;

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{}</title>
{STYLE}</head>
<body>
    <div class="container">
{body}
    </div>
</body>
</html>
"#,
        escape_html(title)
    )
}

pub fn index(items: &[GalleryItem]) -> String {
    let mut body = String::from(
        r#"        <h1>Upload and View Images</h1>
        <form class="upload" method="post" enctype="multipart/form-data" action="/upload">
            <label for="file">Choose file to upload</label>
            <input type="file" id="file" name="form_file" accept="image/jpeg,image/jpg" />
            <button type="submit">Submit</button>
        </form>
        <h2>Uploaded Files</h2>
        <ul class="gallery">
"#,
    );

    for item in items {
        let name = escape_html(&item.name);
        let href = encode_segment(&item.name);
        let _ = write!(
            body,
            r#"            <li>
                <a href="/files/{href}">{name}</a><br>
                <img src="/image/{href}" width="200" alt="{name}">
"#
        );
        if let Some(caption) = &item.caption {
            let _ = write!(
                body,
                r#"                <div class="title">{}</div>
                <div class="description">{}</div>
"#,
                escape_html(&caption.title),
                escape_html(&caption.description)
            );
        }
        let _ = write!(
            body,
            r#"                <form method="post" action="/delete/{href}">
                    <button class="delete" type="submit">Delete</button>
                </form>
            </li>
"#
        );
    }

    body.push_str("        </ul>\n");
    layout("Image Gallery", &body)
}

pub fn detail(name: &str, caption: Option<&Caption>, rows: &[(String, String)]) -> String {
    let escaped = escape_html(name);
    let href = encode_segment(name);
    let mut body = format!(
        r#"        <h2>{escaped}</h2>
        <img src="/image/{href}" width="500" alt="{escaped}">
"#
    );

    if let Some(caption) = caption {
        let _ = write!(
            body,
            r#"        <div class="title">{}</div>
        <div class="description">{}</div>
"#,
            escape_html(&caption.title),
            escape_html(&caption.description)
        );
    }

    body.push_str("        <table width=\"500\">\n");
    for (label, value) in rows {
        let _ = writeln!(
            body,
            "            <tr><td>{}</td><td>{}</td></tr>",
            escape_html(label),
            escape_html(value)
        );
    }
    body.push_str("        </table>\n        <br><a href=\"/\">Back</a>\n");
    layout(name, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let body = format!(
        r#"        <h2>{}</h2>
        <div class="error">{}</div>
        <br><a href="/">Back</a>
"#,
        status,
        escape_html(message)
    );
    layout(&status.to_string(), &body)
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

/// Percent-encode a filename for use as a single URL path segment.
pub fn encode_segment(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            let _ = write!(out, "%{byte:02X}");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[test]
    fn encodes_path_segments() {
        assert_eq!(encode_segment("my photo#1.jpg"), "my%20photo%231.jpg");
        assert_eq!(encode_segment("café.jpg"), "caf%C3%A9.jpg");
    }

    #[test]
    fn index_lists_items_with_captions_and_delete_controls() {
        let html = index(&[
            GalleryItem {
                name: "a b.jpg".to_string(),
                caption: Some(Caption::new("Sunset", "A <red> sky")),
            },
            GalleryItem {
                name: "plain.jpg".to_string(),
                caption: None,
            },
        ]);
        assert!(html.contains(r#"name="form_file""#));
        assert!(html.contains(r#"<a href="/files/a%20b.jpg">a b.jpg</a>"#));
        assert!(html.contains(r#"<img src="/image/plain.jpg""#));
        assert!(html.contains("A &lt;red&gt; sky"));
        assert!(html.contains(r#"action="/delete/plain.jpg""#));
        assert_eq!(html.matches(r#"class="title""#).count(), 1);
    }

    #[test]
    fn detail_renders_table_rows() {
        let rows = vec![
            ("Filename".to_string(), "x.jpg".to_string()),
            ("Make".to_string(), "\"Canon\"".to_string()),
        ];
        let html = detail("x.jpg", Some(&Caption::new("T", "D")), &rows);
        assert!(html.contains("<h2>x.jpg</h2>"));
        assert!(html.contains("<tr><td>Make</td><td>&quot;Canon&quot;</td></tr>"));
        assert!(html.contains(r#"<div class="title">T</div>"#));
        assert!(html.contains(r#"<a href="/">Back</a>"#));
    }

    #[test]
    fn error_page_shows_status() {
        let html = error_page(StatusCode::NOT_FOUND, "object not found: <x>");
        assert!(html.contains("404 Not Found"));
        assert!(html.contains("object not found: &lt;x&gt;"));
    }
}
