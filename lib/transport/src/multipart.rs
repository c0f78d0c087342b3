use bytes::{BufMut, Bytes, BytesMut};
use indexmap::IndexMap;
use multer::Multipart;
use serde_json::{json, Value};
use tracing::{trace, warn};

use crate::{
    codec::decode_body,
    error::TransportError,
    upload_map::{FileReference, UploadMap},
};

pub const OPERATIONS_FIELD: &str = "operations";
pub const MAP_FIELD: &str = "map";

/// One file part of a multipart request.
#[derive(Clone, Debug, PartialEq)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub content: Bytes,
}

impl FileReference for UploadedFile {
    fn to_reference(&self, key: &str) -> Value {
        json!({
            "key": key,
            "filename": self.filename,
            "contentType": self.content_type,
            "size": self.content.len(),
        })
    }
}

/// Files keyed by their form field name, in the order they were received.
pub type FileSet = IndexMap<String, UploadedFile>;

/// The three parts of a `multipart/form-data` GraphQL request, not yet bound together.
#[derive(Debug)]
pub struct MultipartOperations {
    pub operations: Value,
    pub map: UploadMap,
    pub files: FileSet,
}

pub async fn parse_multipart(
    content_type: &str,
    body: Bytes,
) -> Result<MultipartOperations, TransportError> {
    let boundary = multer::parse_boundary(content_type).map_err(TransportError::MalformedMultipart)?;
    let stream = futures_util::stream::once(async move { Ok::<Bytes, std::io::Error>(body) });
    let mut multipart = Multipart::new(stream, boundary);

    let mut operations = None;
    let mut map = None;
    let mut files = FileSet::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(TransportError::MalformedMultipart)?
    {
        let Some(name) = field.name().map(str::to_string) else {
            warn!("skipping multipart field without a name");
            continue;
        };
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(|mime| mime.to_string());
        let content = field
            .bytes()
            .await
            .map_err(TransportError::MalformedMultipart)?;

        match name.as_str() {
            OPERATIONS_FIELD => operations = Some(decode_body(&content)?),
            MAP_FIELD => {
                map = Some(
                    sonic_rs::from_slice::<UploadMap>(&content)
                        .map_err(TransportError::MalformedJson)?,
                )
            }
            _ => {
                trace!(field = %name, size = content.len(), "received file part");
                files.insert(
                    name,
                    UploadedFile {
                        filename,
                        content_type,
                        content,
                    },
                );
            }
        }
    }

    Ok(MultipartOperations {
        operations: operations.ok_or(TransportError::MissingMultipartField(OPERATIONS_FIELD))?,
        map: map.ok_or(TransportError::MissingMultipartField(MAP_FIELD))?,
        files,
    })
}

/// Writes a `multipart/form-data` body carrying `operations`, `map` and the files.
pub fn write_form(
    boundary: &str,
    operations: &Value,
    map: &UploadMap,
    files: &FileSet,
) -> Result<Bytes, TransportError> {
    let mut body = BytesMut::new();

    let mut text_part = |name: &str, value: Vec<u8>| {
        body.put_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n",
                boundary, name
            )
            .as_bytes(),
        );
        body.put_slice(&value);
        body.put_slice(b"\r\n");
    };
    text_part(
        OPERATIONS_FIELD,
        sonic_rs::to_vec(operations).map_err(TransportError::Serialization)?,
    );
    text_part(
        MAP_FIELD,
        sonic_rs::to_vec(map).map_err(TransportError::Serialization)?,
    );

    for (name, file) in files {
        let filename = file.filename.as_deref().unwrap_or(name);
        let content_type = file
            .content_type
            .as_deref()
            .unwrap_or("application/octet-stream");
        body.put_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        body.put_slice(&file.content);
        body.put_slice(b"\r\n");
    }
    body.put_slice(format!("--{}--\r\n", boundary).as_bytes());

    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::upload_map::{bind_operations, build_map};

    const BOUNDARY: &str = "------------------------graphql-upload";

    fn content_type() -> String {
        format!("multipart/form-data; boundary={}", BOUNDARY)
    }

    fn text_file(name: &str, content: &'static str) -> UploadedFile {
        UploadedFile {
            filename: Some(name.to_string()),
            content_type: Some("text/plain".to_string()),
            content: Bytes::from_static(content.as_bytes()),
        }
    }

    #[tokio::test]
    async fn parses_a_written_form() {
        let operations = json!({
            "query": "mutation($files: [Upload!]!) { upload(files: $files) }",
            "variables": {"files": [null, null]}
        });
        let mut files = FileSet::new();
        files.insert("0".to_string(), text_file("a.txt", "first"));
        files.insert("1".to_string(), text_file("b.txt", "second"));
        let map = build_map(operations["variables"].as_object().unwrap(), &files);

        let body = write_form(BOUNDARY, &operations, &map, &files).unwrap();
        let parsed = parse_multipart(&content_type(), body).await.unwrap();

        assert_eq!(parsed.operations, operations);
        assert_eq!(parsed.map, map);
        assert_eq!(parsed.files, files);

        let bound = bind_operations(parsed.operations, &parsed.map, &parsed.files, true).unwrap();
        assert_eq!(
            bound["variables"]["files"][1],
            json!({"key": "1", "filename": "b.txt", "contentType": "text/plain", "size": 6})
        );
    }

    #[tokio::test]
    async fn requires_the_map_field() {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"operations\"\r\n\r\n{{\"query\":\"{{ a }}\"}}\r\n--{b}--\r\n",
            b = BOUNDARY
        );

        let err = parse_multipart(&content_type(), Bytes::from(body))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MissingMultipartField("map")));
    }

    #[tokio::test]
    async fn rejects_invalid_operations_json() {
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"operations\"\r\n\r\n{{not json\r\n--{b}--\r\n",
            b = BOUNDARY
        );

        let err = parse_multipart(&content_type(), Bytes::from(body))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MalformedJson(_)));
    }

    #[tokio::test]
    async fn rejects_a_missing_boundary() {
        let err = parse_multipart("multipart/form-data", Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::MalformedMultipart(_)));
    }
}
