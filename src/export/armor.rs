//! Text armor for exported keys and signatures
//!
//! ```text
//! ------ BEGIN POST QUANTUM PUBLIC KEY USING DILITHIUM5 ------
//! <base64, 76 columns per line>
//! ------ END POST QUANTUM PUBLIC KEY USING DILITHIUM5 ------
//! ```
//!
//! Lines are joined with CRLF on output; decoding accepts LF as well.

use std::fmt;

use zeroize::Zeroize;

use crate::algorithm::Algorithm;
use crate::error::{KeyError, KeyResult};

/// Base64 characters per body line
pub const LINE_WIDTH: usize = 76;

const LINE_ENDING: &str = "\r\n";
const DASHES: &str = "------";

/// What an armored block carries
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArmorKind {
    PublicKey,
    PrivateKey,
    Signature,
}

impl ArmorKind {
    pub fn label(&self) -> &'static str {
        match self {
            ArmorKind::PublicKey => "PUBLIC KEY",
            ArmorKind::PrivateKey => "PRIVATE KEY",
            ArmorKind::Signature => "SIGNATURE",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        [ArmorKind::PublicKey, ArmorKind::PrivateKey, ArmorKind::Signature]
            .into_iter()
            .find(|kind| kind.label() == label)
    }
}

impl fmt::Display for ArmorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A decoded armored block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Armored {
    pub kind: ArmorKind,
    pub algorithm: Algorithm,
    pub data: Vec<u8>,
}

fn header(marker: &str, kind: ArmorKind, algorithm: Algorithm) -> String {
    format!(
        "{} {} POST QUANTUM {} USING {} {}",
        DASHES,
        marker,
        kind.label(),
        algorithm.armor_tag(),
        DASHES
    )
}

/// Armor `data` as a block of the given kind
pub fn encode(kind: ArmorKind, algorithm: Algorithm, data: &[u8]) -> String {
    let mut encoded = base64::encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / LINE_WIDTH * 2 + 160);

    out.push_str(&header("BEGIN", kind, algorithm));
    out.push_str(LINE_ENDING);
    // base64 output is ASCII
    for (i, line) in encoded.as_bytes().chunks(LINE_WIDTH).enumerate() {
        if i > 0 {
            out.push_str(LINE_ENDING);
        }
        out.extend(line.iter().map(|&b| b as char));
    }
    out.push_str(LINE_ENDING);
    out.push_str(&header("END", kind, algorithm));

    // May hold private key material
    encoded.zeroize();
    out
}

/// Parse one BEGIN/END line into its kind and algorithm
fn parse_header(line: &str, marker: &str) -> KeyResult<(ArmorKind, Algorithm)> {
    let prefix = format!("{} {} POST QUANTUM ", DASHES, marker);
    let suffix = format!(" {}", DASHES);

    let inner = line
        .strip_prefix(prefix.as_str())
        .and_then(|rest| rest.strip_suffix(suffix.as_str()))
        .ok_or_else(|| KeyError::malformed_armor(&format!("missing {} line", marker)))?;

    let (label, tag) = inner
        .split_once(" USING ")
        .ok_or_else(|| KeyError::malformed_armor(&format!("{} line has no algorithm", marker)))?;

    let kind = ArmorKind::from_label(label)
        .ok_or_else(|| KeyError::malformed_armor(&format!("unknown block kind '{}'", label)))?;
    let algorithm: Algorithm = tag
        .parse()
        .map_err(|_| KeyError::malformed_armor(&format!("unknown algorithm tag '{}'", tag)))?;

    Ok((kind, algorithm))
}

/// Decode an armored block produced by [`encode`]
pub fn decode(text: &str) -> KeyResult<Armored> {
    let lines: Vec<&str> = text
        .trim()
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let (first, rest) = lines
        .split_first()
        .ok_or_else(|| KeyError::malformed_armor("empty input"))?;
    let (last, body) = rest
        .split_last()
        .ok_or_else(|| KeyError::malformed_armor("missing END line"))?;

    let (kind, algorithm) = parse_header(first, "BEGIN")?;
    let (end_kind, end_algorithm) = parse_header(last, "END")?;

    if kind != end_kind || algorithm != end_algorithm {
        return Err(KeyError::malformed_armor(&format!(
            "BEGIN ({} / {}) and END ({} / {}) disagree",
            kind, algorithm, end_kind, end_algorithm
        )));
    }

    let data = base64::decode(body.concat())
        .map_err(|e| KeyError::malformed_armor(&format!("invalid base64 body: {}", e)))?;

    Ok(Armored {
        kind,
        algorithm,
        data,
    })
}

/// Decode and insist on a particular kind
pub fn decode_kind(text: &str, expected: ArmorKind) -> KeyResult<Armored> {
    let armored = decode(text)?;
    if armored.kind != expected {
        return Err(KeyError::malformed_armor(&format!(
            "expected {} block, found {}",
            expected, armored.kind
        )));
    }
    Ok(armored)
}
