use serde::{Deserialize, Serialize};

/// Line ending convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    /// Unix format (\n)
    LF,
    /// Windows format (\r\n)
    CRLF,
    /// Old Mac format (\r) - rare but supported
    CR,
}

impl Default for LineEnding {
    fn default() -> Self {
        Self::LF
    }
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LF => "\n",
            Self::CRLF => "\r\n",
            Self::CR => "\r",
        }
    }

    /// Display name for status surfaces.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::LF => "LF",
            Self::CRLF => "CRLF",
            Self::CR => "CR",
        }
    }
}

const UTF8_BOM: &str = "\u{feff}";

/// The initial content of a buffer together with everything detected about
/// it: byte-order mark, dominant line ending, character-class hints, and the
/// absolute offsets at which lines start.
///
/// `text` does not include the BOM; it is kept aside so embedders can
/// restore it when persisting.
#[derive(Debug, Clone)]
pub struct TextSource {
    pub bom: &'static str,
    pub eol: LineEnding,
    pub is_basic_ascii: bool,
    pub contains_rtl: bool,
    pub text: Vec<u8>,
    pub line_starts: Vec<usize>,
}

impl TextSource {
    /// Analyse `raw` and build a source: strips a UTF-8 BOM, picks the
    /// dominant line ending by majority count, scans for non-ASCII and RTL
    /// characters, and records every line start.
    pub fn from_str(raw: &str) -> Self {
        let (bom, body) = match raw.strip_prefix(UTF8_BOM) {
            Some(rest) => (UTF8_BOM, rest),
            None => ("", raw),
        };

        let is_basic_ascii = is_basic_ascii(body);
        let contains_rtl = if is_basic_ascii {
            false
        } else {
            contains_rtl(body)
        };

        TextSource {
            bom,
            eol: detect_line_ending(body.as_bytes()),
            is_basic_ascii,
            contains_rtl,
            line_starts: compute_line_starts(body.as_bytes()),
            text: body.as_bytes().to_vec(),
        }
    }

    pub fn empty() -> Self {
        Self::from_str("")
    }

    /// Implied line count: one more than the number of recorded line feeds.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Absolute byte offsets at which lines start: offset 0, then one entry
/// past every `\n`.
fn compute_line_starts(bytes: &[u8]) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, &byte)| byte == b'\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

/// Detect the line ending convention by majority vote over the whole text,
/// defaulting to LF on a tie or when no terminator appears.
///
/// The construction path already holds the full document in memory, so
/// there is nothing to gain from sampling a prefix.
pub fn detect_line_ending(bytes: &[u8]) -> LineEnding {
    let mut total_lf = 0usize;
    let mut total_cr = 0usize;
    let mut crlf = 0usize;
    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'\n' => {
                total_lf += 1;
                if i > 0 && bytes[i - 1] == b'\r' {
                    crlf += 1;
                }
            }
            b'\r' => total_cr += 1,
            _ => {}
        }
    }
    // Every CRLF was counted once as a carriage return and once as a line
    // feed; the lone counts fall out by subtraction.
    let lone_lf = total_lf - crlf;
    let lone_cr = total_cr - crlf;

    if crlf > lone_lf && crlf > lone_cr {
        LineEnding::CRLF
    } else if lone_cr > lone_lf && lone_cr > crlf {
        LineEnding::CR
    } else {
        LineEnding::LF
    }
}

/// True when the text consists solely of tab, line feed, carriage return and
/// printable ASCII.
pub fn is_basic_ascii(text: &str) -> bool {
    text.bytes()
        .all(|b| b == b'\t' || b == b'\n' || b == b'\r' || (0x20..=0x7E).contains(&b))
}

/// True when the text contains characters from a right-to-left script
/// (Hebrew, Arabic and their presentation forms).
pub fn contains_rtl(text: &str) -> bool {
    text.chars().any(|c| {
        matches!(c,
            '\u{0591}'..='\u{08FF}'
            | '\u{FB1D}'..='\u{FDFD}'
            | '\u{FE70}'..='\u{FEFC}'
        )
    })
}
