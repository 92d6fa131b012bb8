//! Built-in placeholder video
//!
//! Returned instead of real output while the backend is unavailable. It is
//! the smallest well-formed MP4 we could make: an `ftyp` box followed by a
//! `moov` box holding only a movie header (no tracks, zero duration).

use bytes::Bytes;
use std::path::Path;
use tracing::info;

#[rustfmt::skip]
pub const PLACEHOLDER_MP4: &[u8] = &[
    // ftyp (24 bytes): major brand isom, minor version 512, brands isom mp41
    0x00, 0x00, 0x00, 0x18, b'f', b't', b'y', b'p',
    b'i', b's', b'o', b'm', 0x00, 0x00, 0x02, 0x00,
    b'i', b's', b'o', b'm', b'm', b'p', b'4', b'1',
    // moov (116 bytes)
    0x00, 0x00, 0x00, 0x74, b'm', b'o', b'o', b'v',
    // mvhd (108 bytes), version 0
    0x00, 0x00, 0x00, 0x6C, b'm', b'v', b'h', b'd',
    0x00, 0x00, 0x00, 0x00, // version + flags
    0x00, 0x00, 0x00, 0x00, // creation time
    0x00, 0x00, 0x00, 0x00, // modification time
    0x00, 0x00, 0x03, 0xE8, // timescale 1000
    0x00, 0x00, 0x00, 0x00, // duration
    0x00, 0x01, 0x00, 0x00, // rate 1.0
    0x01, 0x00, // volume 1.0
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // reserved
    // unity matrix
    0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x00,
    // pre_defined
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x01, // next track id
];

/// Built-in placeholder as shared bytes
pub fn builtin() -> Bytes {
    Bytes::from_static(PLACEHOLDER_MP4)
}

/// Placeholder from `path`, or the built-in one when unset
pub async fn load(path: Option<&Path>) -> std::io::Result<Bytes> {
    match path {
        Some(path) => {
            let bytes = tokio::fs::read(path).await?;
            info!(
                "Using placeholder video {} ({} bytes)",
                path.display(),
                bytes.len()
            );
            Ok(Bytes::from(bytes))
        }
        None => Ok(builtin()),
    }
}
