//! Structured keys: an ordered path of segments plus an optional
//! content-kind and event-kind, encoded to/from a single byte key.
//!
//! The suffix grammar is applied to the *last* path segment only — `/`
//! always remains a plain separator, matching the disk backend's
//! directory-mirrors-path-segments convention in `kv_store::disk`.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StructuredKeyError {
    #[error("key is not valid UTF-8")]
    InvalidUtf8,
    #[error("structured key has an empty path")]
    EmptyPath,
}

/// The closed set of event-kind tags recognised in a structured key
/// suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Icp,
    Rot,
    Ixn,
    Vcp,
    Iss,
    Rev,
    Upg,
    Vtc,
    Nrx,
}

impl EventKind {
    fn as_str(self) -> &'static str {
        match self {
            EventKind::Icp => "icp",
            EventKind::Rot => "rot",
            EventKind::Ixn => "ixn",
            EventKind::Vcp => "vcp",
            EventKind::Iss => "iss",
            EventKind::Rev => "rev",
            EventKind::Upg => "upg",
            EventKind::Vtc => "vtc",
            EventKind::Nrx => "nrx",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "icp" => EventKind::Icp,
            "rot" => EventKind::Rot,
            "ixn" => EventKind::Ixn,
            "vcp" => EventKind::Vcp,
            "iss" => EventKind::Iss,
            "rev" => EventKind::Rev,
            "upg" => EventKind::Upg,
            "vtc" => EventKind::Vtc,
            "nrx" => EventKind::Nrx,
            _ => return None,
        })
    }
}

/// CESR framing marker: whether the attached payload is the binary or
/// text domain representation. Optional in the suffix grammar — when
/// absent, the encoding is implementation-default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CesrEncoding {
    Binary,
    Text,
}

impl CesrEncoding {
    fn as_str(self) -> &'static str {
        match self {
            CesrEncoding::Binary => "binary",
            CesrEncoding::Text => "text",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "binary" => CesrEncoding::Binary,
            "text" => CesrEncoding::Text,
            _ => return None,
        })
    }
}

/// The content-kind tag of a structured key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentKind {
    /// `.{eventKind?}.{encoding?}.cesr`
    Cesr { encoding: Option<CesrEncoding> },
    /// `.{eventKind?}.json`
    Json,
    /// No suffix at all — plain scalar payloads like `aid/{AID}/head`.
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredKey {
    pub path: Vec<String>,
    pub content_kind: ContentKind,
    pub event_kind: Option<EventKind>,
}

impl StructuredKey {
    pub fn text(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            content_kind: ContentKind::Text,
            event_kind: None,
        }
    }

    pub fn json(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            content_kind: ContentKind::Json,
            event_kind: None,
        }
    }

    pub fn json_typed(
        path: impl IntoIterator<Item = impl Into<String>>,
        event_kind: EventKind,
    ) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            content_kind: ContentKind::Json,
            event_kind: Some(event_kind),
        }
    }

    pub fn cesr(path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            content_kind: ContentKind::Cesr { encoding: None },
            event_kind: None,
        }
    }

    pub fn cesr_typed(
        path: impl IntoIterator<Item = impl Into<String>>,
        event_kind: EventKind,
        encoding: Option<CesrEncoding>,
    ) -> Self {
        Self {
            path: path.into_iter().map(Into::into).collect(),
            content_kind: ContentKind::Cesr { encoding },
            event_kind: Some(event_kind),
        }
    }

    /// Encode to the byte key stored in the KV backend.
    pub fn encode(&self) -> Vec<u8> {
        if self.path.is_empty() {
            return Vec::new();
        }
        let mut segments = self.path.clone();
        let last = segments.pop().expect("checked non-empty above");
        let mut last = last;

        match &self.content_kind {
            ContentKind::Text => {}
            ContentKind::Json => {
                if let Some(ek) = self.event_kind {
                    last.push('.');
                    last.push_str(ek.as_str());
                }
                last.push_str(".json");
            }
            ContentKind::Cesr { encoding } => {
                if let Some(ek) = self.event_kind {
                    last.push('.');
                    last.push_str(ek.as_str());
                }
                if let Some(enc) = encoding {
                    last.push('.');
                    last.push_str(enc.as_str());
                }
                last.push_str(".cesr");
            }
        }
        segments.push(last);
        segments.join("/").into_bytes()
    }

    /// Decode a byte key back into a structured key. Never fails except
    /// on invalid UTF-8 or an empty key — an unrecognised suffix is not
    /// an error, it's simply treated as plain `Text` content, so this is
    /// total over any key actually produced by `encode`.
    pub fn decode(key: &[u8]) -> Result<Self, StructuredKeyError> {
        let s = std::str::from_utf8(key).map_err(|_| StructuredKeyError::InvalidUtf8)?;
        if s.is_empty() {
            return Err(StructuredKeyError::EmptyPath);
        }
        let mut segments: Vec<String> = s.split('/').map(|p| p.to_string()).collect();
        let last = segments.pop().expect("checked non-empty above");
        let mut labels: Vec<&str> = last.split('.').collect();
        let base = labels.remove(0).to_string();

        let (content_kind, event_kind) = parse_suffix(&labels);

        segments.push(base);
        Ok(Self {
            path: segments,
            content_kind,
            event_kind,
        })
    }
}

fn parse_suffix(labels: &[&str]) -> (ContentKind, Option<EventKind>) {
    match labels.last().copied() {
        Some("cesr") => {
            let rest = &labels[..labels.len() - 1];
            let (rest, encoding) = match rest.last().and_then(|l| CesrEncoding::parse(l)) {
                Some(enc) => (&rest[..rest.len() - 1], Some(enc)),
                None => (rest, None),
            };
            let event_kind = rest.last().and_then(|l| EventKind::parse(l));
            (ContentKind::Cesr { encoding }, event_kind)
        }
        Some("json") => {
            let rest = &labels[..labels.len() - 1];
            let event_kind = rest.last().and_then(|l| EventKind::parse(l));
            (ContentKind::Json, event_kind)
        }
        _ => (ContentKind::Text, None),
    }
}
