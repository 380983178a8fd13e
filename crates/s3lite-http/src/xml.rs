//! S3 XML bodies.
//!
//! Response documents are written with `quick_xml::Writer` under the S3
//! namespace, with an XML declaration, lowercase booleans and ISO 8601
//! timestamps with millisecond precision. The two request documents the
//! gateway accepts (`CompleteMultipartUpload` and `VersioningConfiguration`)
//! are read with `quick_xml::Reader`; unknown elements are skipped.

use std::io::{self, Write};

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::{Reader, Writer};
use s3lite_core::listing::ListPage;
use s3lite_core::ops::bucket::BucketSummary;
use s3lite_core::ops::multipart::{PartSummary, UploadSummary};
use s3lite_core::state::{CompletedPart, Principal, VersioningStatus};

/// The S3 XML namespace.
pub const S3_NAMESPACE: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

/// Errors reading or writing an XML body.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// Writing to the output buffer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document is not well-formed.
    #[error("XML processing error: {0}")]
    QuickXml(#[from] quick_xml::Error),

    /// A required element is absent.
    #[error("missing required XML element: {0}")]
    MissingElement(String),

    /// A value could not be parsed.
    #[error("failed to parse value: {0}")]
    ParseError(String),
}

/// A value written as the children of a root element.
pub trait S3Serialize {
    /// Write this value's child elements.
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()>;
}

/// Serialize `value` as a complete document under `root_element`.
pub fn to_xml<T: S3Serialize>(root_element: &str, value: &T) -> Result<Vec<u8>, XmlError> {
    let mut buf = Vec::with_capacity(512);
    let mut writer = Writer::new(&mut buf);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer
        .create_element(root_element)
        .with_attribute(("xmlns", S3_NAMESPACE))
        .write_inner_content(|w| value.serialize_xml(w))?;
    Ok(buf)
}

/// The flat `<Error>` document returned with every failed request.
#[must_use]
pub fn error_to_xml(code: &str, message: &str, resource: Option<&str>, request_id: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);
    if let Err(e) = write_error_xml(&mut buf, code, message, resource, request_id) {
        tracing::error!(error = %e, "failed to serialize error XML");
        buf.clear();
    }
    buf
}

fn write_error_xml(
    buf: &mut Vec<u8>,
    code: &str,
    message: &str,
    resource: Option<&str>,
    request_id: &str,
) -> io::Result<()> {
    let mut writer = Writer::new(buf);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.create_element("Error").write_inner_content(|w| {
        write_text_element(w, "Code", code)?;
        write_text_element(w, "Message", message)?;
        write_optional_text(w, "Resource", resource)?;
        write_text_element(w, "RequestId", request_id)
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Writer helpers
// ---------------------------------------------------------------------------

fn write_text_element<W: Write>(writer: &mut Writer<W>, tag: &str, text: &str) -> io::Result<()> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_optional_text<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: Option<&str>,
) -> io::Result<()> {
    if let Some(v) = value {
        write_text_element(writer, tag, v)?;
    }
    Ok(())
}

fn write_display<W: Write>(
    writer: &mut Writer<W>,
    tag: &str,
    value: impl std::fmt::Display,
) -> io::Result<()> {
    write_text_element(writer, tag, &value.to_string())
}

fn write_bool<W: Write>(writer: &mut Writer<W>, tag: &str, value: bool) -> io::Result<()> {
    write_text_element(writer, tag, if value { "true" } else { "false" })
}

fn write_timestamp<W: Write>(writer: &mut Writer<W>, tag: &str, dt: &DateTime<Utc>) -> io::Result<()> {
    write_text_element(writer, tag, &format_timestamp(dt))
}

/// ISO 8601 with milliseconds and a `Z` suffix.
#[must_use]
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn write_owner<W: Write>(writer: &mut Writer<W>, tag: &str, principal: &Principal) -> io::Result<()> {
    writer.create_element(tag).write_inner_content(|w| {
        write_text_element(w, "ID", principal.id())?;
        write_text_element(w, "DisplayName", principal.id())
    })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Response documents
// ---------------------------------------------------------------------------

/// `ListAllMyBucketsResult`.
#[derive(Debug)]
pub struct ListAllMyBucketsResult<'a> {
    /// The caller.
    pub owner: &'a Principal,
    /// Their buckets.
    pub buckets: &'a [BucketSummary],
}

impl S3Serialize for ListAllMyBucketsResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_owner(writer, "Owner", self.owner)?;
        writer.create_element("Buckets").write_inner_content(|w| {
            for bucket in self.buckets {
                w.create_element("Bucket").write_inner_content(|w| {
                    write_text_element(w, "Name", &bucket.name)?;
                    write_timestamp(w, "CreationDate", &bucket.creation_date)
                })?;
            }
            Ok(())
        })?;
        Ok(())
    }
}

/// `ListBucketResult` for a V2 listing.
#[derive(Debug)]
pub struct ListBucketResult<'a> {
    /// Bucket listed.
    pub bucket: &'a str,
    /// Prefix filter echoed back.
    pub prefix: &'a str,
    /// Token the request carried.
    pub continuation_token: Option<&'a str>,
    /// `start-after` the request carried.
    pub start_after: Option<&'a str>,
    /// The page.
    pub page: &'a ListPage,
}

impl S3Serialize for ListBucketResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Name", self.bucket)?;
        write_text_element(writer, "Prefix", self.prefix)?;
        write_display(writer, "KeyCount", self.page.key_count)?;
        write_display(writer, "MaxKeys", self.page.max_keys)?;
        write_bool(writer, "IsTruncated", self.page.is_truncated)?;
        write_optional_text(writer, "ContinuationToken", self.continuation_token)?;
        write_optional_text(
            writer,
            "NextContinuationToken",
            self.page.next_continuation_token.as_deref(),
        )?;
        write_optional_text(writer, "StartAfter", self.start_after)?;
        for item in &self.page.items {
            writer.create_element("Contents").write_inner_content(|w| {
                write_text_element(w, "Key", &item.key)?;
                write_timestamp(w, "LastModified", &item.last_modified)?;
                write_text_element(w, "ETag", &item.etag)?;
                write_display(w, "Size", item.size)?;
                write_text_element(w, "StorageClass", "STANDARD")
            })?;
        }
        Ok(())
    }
}

/// `InitiateMultipartUploadResult`.
#[derive(Debug)]
pub struct InitiateMultipartUploadResult<'a> {
    /// Target bucket.
    pub bucket: &'a str,
    /// Target key.
    pub key: &'a str,
    /// New upload id.
    pub upload_id: &'a str,
}

impl S3Serialize for InitiateMultipartUploadResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", self.bucket)?;
        write_text_element(writer, "Key", self.key)?;
        write_text_element(writer, "UploadId", self.upload_id)
    }
}

/// `CompleteMultipartUploadResult`.
#[derive(Debug)]
pub struct CompleteMultipartUploadResult<'a> {
    /// Path-style location of the object.
    pub location: &'a str,
    /// Bucket.
    pub bucket: &'a str,
    /// Key.
    pub key: &'a str,
    /// Composite ETag.
    pub etag: &'a str,
}

impl S3Serialize for CompleteMultipartUploadResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Location", self.location)?;
        write_text_element(writer, "Bucket", self.bucket)?;
        write_text_element(writer, "Key", self.key)?;
        write_text_element(writer, "ETag", self.etag)
    }
}

/// `ListPartsResult`.
#[derive(Debug)]
pub struct ListPartsResult<'a> {
    /// Bucket.
    pub bucket: &'a str,
    /// Key.
    pub key: &'a str,
    /// Upload id.
    pub upload_id: &'a str,
    /// Parts in part-number order.
    pub parts: &'a [PartSummary],
}

impl S3Serialize for ListPartsResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", self.bucket)?;
        write_text_element(writer, "Key", self.key)?;
        write_text_element(writer, "UploadId", self.upload_id)?;
        write_bool(writer, "IsTruncated", false)?;
        for part in self.parts {
            writer.create_element("Part").write_inner_content(|w| {
                write_display(w, "PartNumber", part.part_number)?;
                write_timestamp(w, "LastModified", &part.last_modified)?;
                write_text_element(w, "ETag", &part.etag)?;
                write_display(w, "Size", part.size)
            })?;
        }
        Ok(())
    }
}

/// `ListMultipartUploadsResult`.
#[derive(Debug)]
pub struct ListMultipartUploadsResult<'a> {
    /// Bucket.
    pub bucket: &'a str,
    /// Open uploads.
    pub uploads: &'a [UploadSummary],
}

impl S3Serialize for ListMultipartUploadsResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Bucket", self.bucket)?;
        write_bool(writer, "IsTruncated", false)?;
        for upload in self.uploads {
            writer.create_element("Upload").write_inner_content(|w| {
                write_text_element(w, "Key", &upload.key)?;
                write_text_element(w, "UploadId", &upload.upload_id)?;
                write_owner(w, "Initiator", &upload.owner)?;
                write_owner(w, "Owner", &upload.owner)?;
                write_text_element(w, "StorageClass", "STANDARD")?;
                write_timestamp(w, "Initiated", &upload.initiated)
            })?;
        }
        Ok(())
    }
}

/// `VersioningConfiguration` as returned by `GET ?versioning`.
#[derive(Debug)]
pub struct VersioningConfiguration(pub VersioningStatus);

impl S3Serialize for VersioningConfiguration {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_optional_text(writer, "Status", self.0.as_str())
    }
}

/// `PresignResult` for `GET ?presign`.
#[derive(Debug)]
pub struct PresignResult<'a> {
    /// The presigned URL.
    pub url: &'a str,
    /// Method the URL is good for.
    pub method: &'a str,
    /// Absolute expiry.
    pub expires: DateTime<Utc>,
}

impl S3Serialize for PresignResult<'_> {
    fn serialize_xml<W: Write>(&self, writer: &mut Writer<W>) -> io::Result<()> {
        write_text_element(writer, "Url", self.url)?;
        write_text_element(writer, "Method", self.method)?;
        write_timestamp(writer, "Expires", &self.expires)
    }
}

// ---------------------------------------------------------------------------
// Request documents
// ---------------------------------------------------------------------------

/// Parts listed in a `CompleteMultipartUpload` body, in document order.
pub fn parse_complete_multipart_upload(xml: &[u8]) -> Result<Vec<CompletedPart>, XmlError> {
    let mut reader = root_reader(xml)?;
    let mut parts = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"Part" => {
                parts.push(read_completed_part(&mut reader)?);
            }
            Event::Start(_) => skip_element(&mut reader)?,
            Event::End(_) => return Ok(parts),
            Event::Eof => return Err(XmlError::MissingElement("CompleteMultipartUpload".to_owned())),
            _ => {}
        }
    }
}

fn read_completed_part(reader: &mut Reader<&[u8]>) -> Result<CompletedPart, XmlError> {
    let mut part_number = None;
    let mut etag = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"PartNumber" => {
                    let text = read_text_content(reader)?;
                    let number = text
                        .parse::<u32>()
                        .map_err(|err| XmlError::ParseError(format!("invalid PartNumber '{text}': {err}")))?;
                    part_number = Some(number);
                }
                b"ETag" => etag = Some(read_text_content(reader)?),
                _ => skip_element(reader)?,
            },
            Event::End(_) => break,
            Event::Eof => return Err(XmlError::MissingElement("Part".to_owned())),
            _ => {}
        }
    }
    Ok(CompletedPart {
        part_number: part_number.ok_or_else(|| XmlError::MissingElement("PartNumber".to_owned()))?,
        etag: etag.ok_or_else(|| XmlError::MissingElement("ETag".to_owned()))?,
    })
}

/// The `Status` of a `VersioningConfiguration` body.
pub fn parse_versioning_configuration(xml: &[u8]) -> Result<VersioningStatus, XmlError> {
    let mut reader = root_reader(xml)?;
    let mut status = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"Status" => {
                let text = read_text_content(&mut reader)?;
                let parsed = text
                    .parse::<VersioningStatus>()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                status = Some(parsed);
            }
            Event::Start(_) => skip_element(&mut reader)?,
            Event::End(_) => break,
            Event::Eof => return Err(XmlError::MissingElement("VersioningConfiguration".to_owned())),
            _ => {}
        }
    }
    status.ok_or_else(|| XmlError::MissingElement("Status".to_owned()))
}

/// A reader positioned just inside the root element.
fn root_reader(xml: &[u8]) -> Result<Reader<&[u8]>, XmlError> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    loop {
        match reader.read_event()? {
            Event::Start(_) => return Ok(reader),
            Event::Eof => return Err(XmlError::MissingElement("root element".to_owned())),
            _ => {}
        }
    }
}

/// Text of the current element, consuming its end tag.
fn read_text_content(reader: &mut Reader<&[u8]>) -> Result<String, XmlError> {
    let mut text = String::new();
    loop {
        match reader.read_event()? {
            Event::Text(e) => {
                let decoded = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                let unescaped = quick_xml::escape::unescape(&decoded)
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::GeneralRef(e) => {
                // `&quot;` around ETags arrives as its own event.
                let name = e
                    .decode()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?;
                if let Some(ch) = e
                    .resolve_char_ref()
                    .map_err(|err| XmlError::ParseError(err.to_string()))?
                {
                    text.push(ch);
                } else if let Some(resolved) = quick_xml::escape::resolve_predefined_entity(&name) {
                    text.push_str(resolved);
                } else {
                    return Err(XmlError::ParseError(format!("unknown entity &{name};")));
                }
            }
            Event::End(_) => return Ok(text),
            Event::Eof => return Err(XmlError::MissingElement("end tag".to_owned())),
            _ => {}
        }
    }
}

fn skip_element(reader: &mut Reader<&[u8]>) -> Result<(), XmlError> {
    let mut depth: u32 = 1;
    loop {
        match reader.read_event()? {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Ok(());
                }
            }
            Event::Eof => return Err(XmlError::MissingElement("end tag".to_owned())),
            _ => {}
        }
    }
}
