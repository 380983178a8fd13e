//! Content hashes used as ETags.
//!
//! A single-part object's ETag is the quoted hex MD5 of its content. An object
//! assembled from a multipart upload gets the composite form
//! `"<md5-of-part-md5s>-<part count>"`.

use digest::Digest;

/// Compute the hex-encoded MD5 digest of `data`.
///
/// # Examples
///
/// ```
/// use s3lite_core::checksums::compute_md5;
///
/// assert_eq!(compute_md5(b"hello"), "5d41402abc4b2a76b9719d911017c592");
/// ```
#[must_use]
pub fn compute_md5(data: &[u8]) -> String {
    hex::encode(md5::Md5::digest(data))
}

/// Compute the quoted hex MD5 of `data`, suitable for use as an ETag.
///
/// # Examples
///
/// ```
/// use s3lite_core::checksums::compute_etag;
///
/// assert_eq!(compute_etag(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
/// ```
#[must_use]
pub fn compute_etag(data: &[u8]) -> String {
    format!("\"{}\"", compute_md5(data))
}

/// Compute the composite ETag of a multipart object.
///
/// Each entry in `part_md5_hexes` is the hex MD5 of one part, quoted or not.
/// The binary digests are concatenated in the given order and hashed again.
#[must_use]
pub fn compute_multipart_etag(part_md5_hexes: &[impl AsRef<str>]) -> String {
    let mut combined = Vec::with_capacity(part_md5_hexes.len() * 16);
    for hex_str in part_md5_hexes {
        if let Ok(bytes) = hex::decode(normalize_etag(hex_str.as_ref())) {
            combined.extend_from_slice(&bytes);
        }
    }
    let final_md5 = hex::encode(md5::Md5::digest(&combined));
    format!("\"{final_md5}-{}\"", part_md5_hexes.len())
}

/// Strip surrounding quotes (and a weak `W/` prefix) from an ETag.
#[must_use]
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim().trim_start_matches("W/").trim_matches('"')
}
