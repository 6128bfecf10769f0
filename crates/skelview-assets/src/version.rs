//! Skeleton version sniffing.
//!
//! Pulls the editor version a skeleton was exported with out of either the
//! binary header or the JSON `skeleton.spine` field, without parsing the rest
//! of the payload.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::binary::BinaryInput;

static VERSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]+\.[0-9]+\.[0-9]+").expect("version pattern is a valid regex")
});

/// Encoding of a skeleton descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkeletonFormat {
    /// `.skel` binary export.
    Binary,
    /// `.json` export.
    Json,
}

impl SkeletonFormat {
    /// Pick a format from a file extension, case-insensitively.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "skel" => Some(SkeletonFormat::Binary),
            "json" => Some(SkeletonFormat::Json),
            _ => None,
        }
    }
}

/// Version string from a binary skeleton, or `None`.
///
/// Decode failures (truncated buffers, absent string) are logged and
/// reported as "no version".
pub fn from_binary(bytes: &[u8]) -> Option<String> {
    let mut input = BinaryInput::skeleton(bytes);
    let text = match input.read_string() {
        Ok(Some(text)) => text,
        Ok(None) => return None,
        Err(err) => {
            tracing::debug!("no version in binary skeleton: {}", err);
            return None;
        }
    };

    VERSION_PATTERN
        .find(&text)
        .map(|m| m.as_str().to_string())
}

/// Version from a JSON skeleton's `skeleton.spine` field, or `None`.
///
/// The field must contain a `MAJOR.MINOR.PATCH` version; empty or other
/// strings count as no version.
pub fn from_text(json_bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = match serde_json::from_slice(json_bytes) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!("no version in json skeleton: {}", err);
            return None;
        }
    };

    value
        .get("skeleton")
        .and_then(|skeleton| skeleton.get("spine"))
        .and_then(|spine| spine.as_str())
        .and_then(|spine| VERSION_PATTERN.find(spine))
        .map(|m| m.as_str().to_string())
}

/// Dispatch to [`from_binary`] or [`from_text`].
pub fn sniff(format: SkeletonFormat, bytes: &[u8]) -> Option<String> {
    match format {
        SkeletonFormat::Binary => from_binary(bytes),
        SkeletonFormat::Json => from_text(bytes),
    }
}

/// Playback runtime family a skeleton needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeLine {
    /// 3.x exports.
    Spine38,
    /// 4.x exports.
    Spine41,
    /// Anything else.
    Unsupported,
}

/// Parsed `MAJOR.MINOR.PATCH` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SkeletonVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SkeletonVersion {
    /// Parse the first `MAJOR.MINOR.PATCH` triple in `text`.
    pub fn parse(text: &str) -> Option<Self> {
        let found = VERSION_PATTERN.find(text)?;
        let mut parts = found.as_str().split('.').map(str::parse::<u32>);
        let major = parts.next()?.ok()?;
        let minor = parts.next()?.ok()?;
        let patch = parts.next()?.ok()?;
        Some(Self {
            major,
            minor,
            patch,
        })
    }

    pub fn runtime(&self) -> RuntimeLine {
        match self.major {
            3 => RuntimeLine::Spine38,
            4 => RuntimeLine::Spine41,
            _ => RuntimeLine::Unsupported,
        }
    }
}

impl fmt::Display for SkeletonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::SKELETON_HEADER_SKIP;
    use crate::binary::tests::write_string;

    fn binary_skeleton(version: Option<&str>) -> Vec<u8> {
        let mut buf = vec![0x2Au8; SKELETON_HEADER_SKIP];
        write_string(&mut buf, version);
        buf.extend_from_slice(&[1, 2, 3, 4]);
        buf
    }

    #[test]
    fn test_from_binary_exact_version() {
        let bytes = binary_skeleton(Some("3.8.95"));
        assert_eq!(from_binary(&bytes).as_deref(), Some("3.8.95"));
    }

    #[test]
    fn test_from_binary_version_embedded_in_text() {
        let bytes = binary_skeleton(Some("spine 4.1.23-beta"));
        assert_eq!(from_binary(&bytes).as_deref(), Some("4.1.23"));
    }

    #[test]
    fn test_from_binary_without_version() {
        assert_eq!(from_binary(&binary_skeleton(Some("no version here"))), None);
        assert_eq!(from_binary(&binary_skeleton(None)), None);
        assert_eq!(from_binary(&binary_skeleton(Some(""))), None);
    }

    #[test]
    fn test_from_binary_truncated() {
        assert_eq!(from_binary(&[0u8; 4]), None);
        assert_eq!(from_binary(&[]), None);
    }

    #[test]
    fn test_from_text() {
        let json = br#"{"skeleton":{"hash":"x","spine":"4.1.17"},"bones":[]}"#;
        assert_eq!(from_text(json).as_deref(), Some("4.1.17"));
    }

    #[test]
    fn test_from_text_missing_or_malformed() {
        assert_eq!(from_text(br#"{"skeleton":{}}"#), None);
        assert_eq!(from_text(br#"{"skeleton":{"spine":38}}"#), None);
        assert_eq!(from_text(b"{not json"), None);
    }

    #[test]
    fn test_from_text_rejects_non_versions() {
        assert_eq!(from_text(br#"{"skeleton":{"spine":""}}"#), None);
        assert_eq!(from_text(br#"{"skeleton":{"spine":"garbage"}}"#), None);
        assert_eq!(
            from_text(br#"{"skeleton":{"spine":"v3.8.99 export"}}"#).as_deref(),
            Some("3.8.99")
        );
    }

    #[test]
    fn test_only_ascii_digits_form_a_version() {
        let bytes = binary_skeleton(Some("\u{663}.\u{668}.\u{669}"));
        assert_eq!(from_binary(&bytes), None);
        let json = "{\"skeleton\":{\"spine\":\"\u{663}.\u{668}.\u{669}\"}}";
        assert_eq!(from_text(json.as_bytes()), None);
    }

    #[test]
    fn test_sniff_dispatch() {
        let bytes = binary_skeleton(Some("3.8.99"));
        assert_eq!(sniff(SkeletonFormat::Binary, &bytes).as_deref(), Some("3.8.99"));
        assert_eq!(sniff(SkeletonFormat::Json, &bytes), None);
    }

    #[test]
    fn test_skeleton_version_runtime() {
        let v = SkeletonVersion::parse("3.8.95").unwrap();
        assert_eq!(v.runtime(), RuntimeLine::Spine38);
        assert_eq!(v.to_string(), "3.8.95");
        assert_eq!(
            SkeletonVersion::parse("4.1.0").unwrap().runtime(),
            RuntimeLine::Spine41
        );
        assert_eq!(
            SkeletonVersion::parse("2.1.27").unwrap().runtime(),
            RuntimeLine::Unsupported
        );
        assert!(SkeletonVersion::parse("4.1").is_none());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(SkeletonFormat::from_extension("SKEL"), Some(SkeletonFormat::Binary));
        assert_eq!(SkeletonFormat::from_extension("json"), Some(SkeletonFormat::Json));
        assert_eq!(SkeletonFormat::from_extension("atlas"), None);
    }
}
