//! Comment bodies cross the wire with every code point above 0x7F flattened
//! to a decimal HTML entity. Inbound text is messier: decimal and hex
//! entities, `u{N}` curly escapes and colon emoji shortcodes all show up,
//! and must all decode to the literal character before display.

/// Longest digit run accepted inside an entity or escape. Unicode tops out
/// at 0x10FFFF, so anything longer is garbage and passes through untouched.
const MAX_ESCAPE_DIGITS: usize = 8;

const MAX_SHORTCODE_LEN: usize = 32;

/// The shortcodes the upstream composer actually emits.
const SHORTCODES: &[(&str, char)] = &[
    ("clap", '\u{1F44F}'),
    ("cry", '\u{1F622}'),
    ("eyes", '\u{1F440}'),
    ("fire", '\u{1F525}'),
    ("grin", '\u{1F601}'),
    ("heart", '\u{2764}'),
    ("joy", '\u{1F602}'),
    ("laughing", '\u{1F606}'),
    ("pray", '\u{1F64F}'),
    ("rocket", '\u{1F680}'),
    ("smile", '\u{1F604}'),
    ("sob", '\u{1F62D}'),
    ("sparkles", '\u{2728}'),
    ("star", '\u{2B50}'),
    ("sunglasses", '\u{1F60E}'),
    ("tada", '\u{1F389}'),
    ("thinking", '\u{1F914}'),
    ("thumbsup", '\u{1F44D}'),
    ("wave", '\u{1F44B}'),
    ("wink", '\u{1F609}'),
];

/// Outbound form: every code point above 0x7F becomes `&#N;` (decimal).
pub fn encode_entities(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    for c in s.chars() {
        if (c as u32) > 0x7F {
            res.push_str(&format!("&#{};", c as u32));
        } else {
            res.push(c);
        }
    }
    res
}

/// Inbound form: decodes `&#N;`, `&#xN;`, `u{N}` and `:shortcode:` back to
/// literal characters. Anything malformed or out of range is left as-is;
/// this never fails.
pub fn decode_entities(s: &str) -> String {
    let mut res = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '&' => decode_numeric_entity(rest),
            'u' => decode_curly_escape(rest),
            ':' => decode_shortcode(rest),
            _ => None,
        };
        match consumed {
            Some((decoded, len)) => {
                res.push(decoded);
                rest = &rest[len..];
            }
            None => {
                res.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }
    res
}

/// `&#N;` or `&#xN;` at the start of `s`; returns the character and the
/// byte length of the escape.
fn decode_numeric_entity(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("&#")?;
    let (radix, digits_start) = match body.as_bytes().first() {
        Some(b'x') | Some(b'X') => (16, 1),
        _ => (10, 0),
    };
    let digits_and_rest = &body[digits_start..];
    let end = digits_and_rest.find(';')?;
    if end == 0 || end > MAX_ESCAPE_DIGITS {
        return None;
    }
    let code = u32::from_str_radix(&digits_and_rest[..end], radix).ok()?;
    let decoded = char::from_u32(code)?;
    Some((decoded, 2 + digits_start + end + 1))
}

/// `u{N}` at the start of `s`, N in hex.
fn decode_curly_escape(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("u{")?;
    let end = body.find('}')?;
    if end == 0 || end > MAX_ESCAPE_DIGITS {
        return None;
    }
    let code = u32::from_str_radix(&body[..end], 16).ok()?;
    let decoded = char::from_u32(code)?;
    Some((decoded, 2 + end + 1))
}

/// `:name:` at the start of `s`, for known names only.
fn decode_shortcode(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix(':')?;
    let end = body.find(':')?;
    if end == 0 || end > MAX_SHORTCODE_LEN {
        return None;
    }
    let name = &body[..end];
    let decoded = SHORTCODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, c)| *c)?;
    Some((decoded, 1 + end + 1))
}
