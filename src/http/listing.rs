//! Directory listing page

use crate::vfs::DirEntry;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters escaped in a single path segment of an `href`
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b':');

/// Render entries as a `<pre>` list of relative links
///
/// Directories get a trailing `/` in both the link and the label.
pub fn render(entries: &[DirEntry]) -> String {
    let mut html = String::from("<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n");
    for entry in entries {
        let suffix = if entry.kind.is_dir() { "/" } else { "" };
        let href = escape_html(&encode_segment(&entry.name));
        html.push_str(&format!(
            "<a href=\"./{href}{suffix}\">{}{suffix}</a>\n",
            escape_html(&entry.name)
        ));
    }
    html.push_str("</pre>\n");
    html
}

/// Percent-encode one path segment for use in a URL
pub fn encode_segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
