use std::{
    borrow::Cow,
    time::{SystemTime, UNIX_EPOCH},
};

use http_kit::utils::Bytes;

/// Binary form value, sent as a file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    data: Bytes,
    filename: Option<Cow<'static, str>>,
    content_type: Option<Cow<'static, str>>,
}

impl Blob {
    /// Create a blob from raw bytes.
    #[must_use]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }

    /// Attach/override the filename metadata.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<Cow<'static, str>>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Attach/override the content type metadata.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<Cow<'static, str>>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Raw bytes.
    #[must_use]
    pub const fn data(&self) -> &Bytes {
        &self.data
    }

    /// Filename metadata, if any.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Content type metadata, if any.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// Value of one multipart field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPart {
    /// UTF-8 text field.
    Text(String),
    /// Binary field, sent with filename and content type when present.
    Blob(Blob),
}

/// Multipart form container produced from a request `form`.
///
/// Fields keep insertion order. The boundary is chosen when the form is
/// encoded unless one was set explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    boundary: Option<String>,
    fields: Vec<(String, FormPart)>,
}

impl FormData {
    /// Create an empty multipart container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the boundary string (otherwise auto-generated).
    #[must_use]
    pub fn boundary(mut self, boundary: impl Into<String>) -> Self {
        self.boundary = Some(boundary.into());
        self
    }

    /// Append a text field.
    pub fn append_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), FormPart::Text(value.into())));
    }

    /// Append a binary field.
    pub fn append_blob(&mut self, name: impl Into<String>, blob: Blob) {
        self.fields.push((name.into(), FormPart::Blob(blob)));
    }

    /// First field named `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, part)| part)
    }

    /// Iterate over `(name, part)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormPart)> {
        self.fields.iter().map(|(name, part)| (name.as_str(), part))
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the form has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Encode the multipart payload into `(boundary, body_bytes)`.
    #[must_use]
    pub fn encode(&self) -> (String, Vec<u8>) {
        let boundary = self.boundary.clone().unwrap_or_else(default_boundary);
        let mut body = Vec::new();

        for (name, part) in &self.fields {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            match part {
                FormPart::Text(text) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n")
                            .as_bytes(),
                    );
                    body.extend_from_slice(text.as_bytes());
                }
                FormPart::Blob(blob) => {
                    // Browsers name unnamed files "blob"; servers treat the part as a file either way.
                    let filename = blob.filename().unwrap_or("blob");
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n"
                        )
                        .as_bytes(),
                    );
                    let content_type = blob.content_type().unwrap_or("application/octet-stream");
                    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
                    body.extend_from_slice(blob.data());
                }
            }
            body.extend_from_slice(b"\r\n");
        }

        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (boundary, body)
    }
}

fn default_boundary() -> String {
    format!("zenschema-{:#x}", monotonic_suffix())
}

fn monotonic_suffix() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or_else(|_| 0, |duration| duration.as_micros())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_text_and_binary_parts() {
        let mut form = FormData::new().boundary("XYZ");
        form.append_text("name", "John");
        form.append_blob(
            "avatar",
            Blob::new(vec![0_u8, 1, 2])
                .with_filename("a.bin")
                .with_content_type("application/x-test"),
        );

        let (boundary, body) = form.encode();
        assert_eq!(boundary, "XYZ");

        let mut expected = Vec::new();
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\nJohn\r\n",
        );
        expected.extend_from_slice(
            b"--XYZ\r\nContent-Disposition: form-data; name=\"avatar\"; filename=\"a.bin\"\r\nContent-Type: application/x-test\r\n\r\n",
        );
        expected.extend_from_slice(&[0, 1, 2]);
        expected.extend_from_slice(b"\r\n--XYZ--\r\n");
        assert_eq!(body, expected);
    }

    #[test]
    fn generated_boundary_is_used_consistently() {
        let mut form = FormData::new();
        form.append_text("a", "1");
        let (boundary, body) = form.encode();
        assert!(boundary.starts_with("zenschema-"));
        let text = String::from_utf8(body).unwrap();
        assert!(text.ends_with(&format!("--{boundary}--\r\n")));
    }

    #[test]
    fn lookup_by_name() {
        let mut form = FormData::new();
        form.append_text("age", "20");
        assert_eq!(form.get("age"), Some(&FormPart::Text("20".into())));
        assert!(form.get("missing").is_none());
        assert_eq!(form.len(), 1);
    }
}
