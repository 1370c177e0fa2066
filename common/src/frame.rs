use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// An ephemeral JPEG sample of the camera stream.
///
/// A snapshot lives exactly as long as the one request it is attached to:
/// the detection loop takes one per tick for `/detect`, and the capture path
/// takes an independent one for `/save`. Nothing retains it afterwards.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub jpeg: Vec<u8>,
    /// Wall-clock sampling time, Unix millis.
    pub captured_at_ms: i64,
    /// Monotonic per-source sample counter, for log correlation.
    pub seq: u64,
}

impl FrameSnapshot {
    pub fn new(jpeg: Vec<u8>, captured_at_ms: i64, seq: u64) -> Self {
        Self {
            jpeg,
            captured_at_ms,
            seq,
        }
    }

    /// Snapshot of `jpeg` taken right now.
    pub fn now(jpeg: Vec<u8>, seq: u64) -> Self {
        Self::new(jpeg, chrono::Utc::now().timestamp_millis(), seq)
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }

    /// Encode as the `data:image/jpeg;base64,...` string both collaborator
    /// endpoints expect in their `image` field.
    pub fn to_data_uri(&self) -> String {
        let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        uri.push_str(DATA_URI_PREFIX);
        BASE64.encode_string(&self.jpeg, &mut uri);
        uri
    }

    /// Decode a data URI back into raw JPEG bytes. Accepts any `data:*;base64,`
    /// header since the collaborators only ever look at the payload.
    pub fn from_data_uri(uri: &str) -> Result<Vec<u8>, FrameError> {
        let (_, payload) = uri.split_once(";base64,").ok_or(FrameError::NotADataUri)?;
        BASE64
            .decode(payload)
            .map_err(|e| FrameError::Base64(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("not a base64 data URI")]
    NotADataUri,
    #[error("invalid base64 payload: {0}")]
    Base64(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_has_jpeg_header() {
        let frame = FrameSnapshot::new(vec![0xFF, 0xD8, 0xFF, 0xE0], 1708300000000, 42);
        let uri = frame.to_data_uri();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert_eq!(FrameSnapshot::from_data_uri(&uri).unwrap(), frame.jpeg);
    }

    #[test]
    fn from_data_uri_rejects_plain_base64() {
        assert!(matches!(
            FrameSnapshot::from_data_uri("/9j/4AAQSkZJRg=="),
            Err(FrameError::NotADataUri)
        ));
    }

    #[test]
    fn from_data_uri_rejects_bad_payload() {
        assert!(matches!(
            FrameSnapshot::from_data_uri("data:image/jpeg;base64,!!notbase64!!"),
            Err(FrameError::Base64(_))
        ));
    }

    #[test]
    fn snapshot_now_carries_seq() {
        let frame = FrameSnapshot::now(vec![1, 2, 3], 7);
        assert_eq!(frame.seq, 7);
        assert_eq!(frame.len(), 3);
        assert!(!frame.is_empty());
    }
}
