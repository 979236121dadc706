//! HTML escaping for text bodies and HTML-safe JSON.

/// Escapes `<`, `>`, `&`, `'` and `"` for inclusion in HTML text.
///
/// ```
/// use httpctx::context::escape::escape_html;
///
/// assert_eq!(escape_html(r#"<a href="x">Tom & 'Jerry'</a>"#),
///            "&lt;a href=&#34;x&#34;&gt;Tom &amp; &#39;Jerry&#39;&lt;/a&gt;");
/// ```
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            _ => out.push(c),
        }
    }
    out
}

// Longest entity we try to decode, `&` and `;` excluded.
const MAX_ENTITY_LEN: usize = 10;

/// Decodes named (`&amp;`, `&lt;`, `&gt;`, `&quot;`, `&apos;`, `&nbsp;`) and
/// numeric (`&#39;`, `&#x27;`) character references.
///
/// Anything that is not a recognised reference is kept verbatim.
pub fn unescape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];

        let decoded = tail
            .find(';')
            .filter(|&end| end <= MAX_ENTITY_LEN)
            .and_then(|end| decode_entity(&tail[..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code);
    }

    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

/// Rewrites `<`, `>`, `&`, U+2028 and U+2029 in encoded JSON as `\u` escapes
/// so the document can be embedded inside HTML `<script>` tags.
///
/// Those characters only occur inside JSON strings, so the result decodes to
/// the same value.
pub fn escape_json_html(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' => out.extend_from_slice(b"\\u003c"),
            b'>' => out.extend_from_slice(b"\\u003e"),
            b'&' => out.extend_from_slice(b"\\u0026"),
            // U+2028 and U+2029 encode as E2 80 A8 / E2 80 A9.
            0xE2 if data.get(i + 1) == Some(&0x80)
                && matches!(data.get(i + 2), Some(0xA8 | 0xA9)) =>
            {
                let last = if data[i + 2] == 0xA8 { b'8' } else { b'9' };
                out.extend_from_slice(b"\\u202");
                out.push(last);
                i += 2;
            }
            byte => out.push(byte),
        }
        i += 1;
    }
    out
}
