use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotId {
    Reference,
    Candidate(usize),
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotId::Reference => f.write_str("reference"),
            SlotId::Candidate(index) => write!(f, "candidate {}", index + 1),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhotoSlot {
    pub raw_bytes: Option<Vec<u8>>,
    /// `data:<mime>;base64,<payload>` rendition of `raw_bytes`.
    pub encoded_preview: Option<String>,
    pub file_name: Option<String>,
}

impl PhotoSlot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_image(bytes: Vec<u8>, mime: &str, file_name: Option<String>) -> Self {
        let preview = format!("data:{};base64,{}", mime, STANDARD.encode(&bytes));
        Self {
            raw_bytes: Some(bytes),
            encoded_preview: Some(preview),
            file_name,
        }
    }

    pub fn is_filled(&self) -> bool {
        self.raw_bytes.is_some()
    }

    /// Base64 payload sent to the classifier, without any data-URI prefix.
    pub fn payload_base64(&self) -> Option<String> {
        if let Some(preview) = &self.encoded_preview {
            return Some(strip_data_uri(preview).to_string());
        }
        self.raw_bytes.as_ref().map(|bytes| STANDARD.encode(bytes))
    }
}

pub fn strip_data_uri(encoded: &str) -> &str {
    if encoded.starts_with("data:") {
        match encoded.split_once(',') {
            Some((_, payload)) => payload,
            None => encoded,
        }
    } else {
        encoded
    }
}
