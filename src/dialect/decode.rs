use clap::ValueEnum;
use encoding_rs::{mem::decode_latin1, UTF_8};
use serde::{Deserialize, Serialize};

use crate::error::NormalizeError;

/// Text encodings the pipeline reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    /// Legacy 8-bit encoding of every data file the authority publishes.
    Latin1,
    /// Header definition files.
    Utf8,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Latin1 => "latin-1",
            TextEncoding::Utf8 => "utf-8",
        }
    }
}

/// Decodes a whole file body. Malformed UTF-8 is an error, never replaced.
///
/// Latin-1 is ISO-8859-1 proper: every byte is the code point of the same
/// value, so 0x80-0x9F become C1 controls (not the windows-1252 glyphs).
pub fn decode(bytes: &[u8], encoding: TextEncoding, context: &str) -> Result<String, NormalizeError> {
    match encoding {
        TextEncoding::Latin1 => Ok(decode_latin1(bytes).into_owned()),
        TextEncoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            UTF_8
                .decode_without_bom_handling_and_without_replacement(bytes)
                .map(|text| text.into_owned())
                .ok_or_else(|| NormalizeError::Decode {
                    context: context.to_string(),
                    encoding: encoding.label(),
                })
        }
    }
}
