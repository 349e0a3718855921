//! Email de-obfuscation for slides saved from sites behind a CDN that hides
//! addresses from scrapers.
//!
//! The scheme hex-encodes the address and XORs every byte with a one-byte key
//! stored as the first hex pair:
//!
//! ```text
//! 1f 76 71 79 70 5f 67 31 75 6f
//! ^^ key
//!    0x76 ^ 0x1f = 'i', 0x71 ^ 0x1f = 'n', …  →  "info@x.jp"
//! ```
//!
//! Elements carry the encoded string in a `data-cfemail` attribute, and
//! protected links point at `/cdn-cgi/l/email-protection#<hex>`. A saved copy
//! has no decoder script, so the PDF would show "[email protected]" unless the
//! transform runs in the page before capture. [`DECODE_EMAILS_JS`] does that;
//! [`decode_cf_email`] is the same algorithm in Rust.

use once_cell::sync::Lazy;
use regex::Regex;

/// Attribute marking an obfuscated address.
pub const MARKER_ATTRIBUTE: &str = "data-cfemail";

static RE_ENCODED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:[0-9a-fA-F]{2}){2,}$").unwrap());

/// Decode one obfuscated address.
///
/// Returns `None` for malformed input: odd length, non-hex characters, or no
/// payload after the key byte.
pub fn decode_cf_email(encoded: &str) -> Option<String> {
    let encoded = encoded.trim();
    if !RE_ENCODED.is_match(encoded) {
        return None;
    }

    let bytes: Vec<u8> = (0..encoded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&encoded[i..i + 2], 16))
        .collect::<Result<_, _>>()
        .ok()?;

    let (key, payload) = bytes.split_first()?;
    Some(payload.iter().map(|b| char::from(b ^ key)).collect())
}

/// In-page transform. Evaluates to the number of addresses decoded.
///
/// Each decoded element loses its marker attribute, so running the script a
/// second time decodes nothing.
pub const DECODE_EMAILS_JS: &str = r#"(() => {
    const decode = (encoded) => {
        if (typeof encoded !== 'string' || !/^(?:[0-9a-fA-F]{2}){2,}$/.test(encoded.trim())) {
            return null;
        }
        const hex = encoded.trim();
        const key = parseInt(hex.substr(0, 2), 16);
        let out = '';
        for (let n = 2; n < hex.length; n += 2) {
            out += String.fromCharCode(parseInt(hex.substr(n, 2), 16) ^ key);
        }
        return out;
    };
    const linkFor = (el) => (el.tagName === 'A' ? el : el.closest('a'));
    let decoded = 0;

    document.querySelectorAll('[data-cfemail]').forEach((el) => {
        const address = decode(el.getAttribute('data-cfemail'));
        if (address === null) {
            return;
        }
        el.textContent = address;
        const link = linkFor(el);
        if (link) {
            link.setAttribute('href', 'mailto:' + address);
        }
        el.removeAttribute('data-cfemail');
        decoded += 1;
    });

    document.querySelectorAll('a[href*="/cdn-cgi/l/email-protection#"]').forEach((a) => {
        const href = a.getAttribute('href') || '';
        const address = decode(href.slice(href.indexOf('#') + 1));
        if (address === null) {
            return;
        }
        a.setAttribute('href', 'mailto:' + address);
        decoded += 1;
    });

    return decoded;
})()"#;
