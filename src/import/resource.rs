//! Buffer and image locator handling: data-URI decoding, URL resolution and
//! the fetch collaborator.

use std::fs;

use anyhow::{Context, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use url::Url;

use crate::error::ImportError;

use super::document::Document;

/// Loads external resources on behalf of the importer.
///
/// The importer calls [`ResourceFetcher::fetch`] synchronously and checks
/// [`ResourceFetcher::is_cancelled`] around every call.
pub trait ResourceFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<Vec<u8>>;

    /// Whether the surrounding application asked the import to stop.
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl<F> ResourceFetcher for F
where
    F: Fn(&Url) -> anyhow::Result<Vec<u8>>,
{
    fn fetch(&self, url: &Url) -> anyhow::Result<Vec<u8>> {
        self(url)
    }
}

/// Fetcher for `file://` locators.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

impl ResourceFetcher for FileFetcher {
    fn fetch(&self, url: &Url) -> anyhow::Result<Vec<u8>> {
        if url.scheme() != "file" {
            bail!("unsupported scheme for local fetch: {url}");
        }
        let Ok(path) = url.to_file_path() else {
            bail!("locator is not a local path: {url}");
        };
        fs::read(&path).with_context(|| format!("failed to read resource: {}", path.display()))
    }
}

// ─── Data URIs ────────────────────────────────────────────────────────────────

pub(crate) fn is_data_uri(uri: &str) -> bool {
    uri.starts_with("data:")
}

/// Decode a base64 `data:` URI. Returns `None` for any other URI form or
/// for an undecodable payload.
pub(crate) fn decode_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

/// Resolve `uri` against the document locator. Falls back to the raw URI
/// text when it cannot be joined.
pub(crate) fn resolve_locator(base_url: &Url, uri: &str) -> String {
    base_url
        .join(uri)
        .map(String::from)
        .unwrap_or_else(|_| uri.to_string())
}

/// Last path segment of a URI, without query or fragment.
pub(crate) fn file_name(uri: &str) -> String {
    let path = uri.split(['?', '#']).next().unwrap_or(uri);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

// ─── Buffer loading ───────────────────────────────────────────────────────────

/// Fill every declared buffer with bytes or fail.
pub(crate) fn load_buffers(
    document: &mut Document,
    base_url: &Url,
    fetcher: &dyn ResourceFetcher,
) -> Result<(), ImportError> {
    let mut glb_bin = document.glb_bin.take();

    for index in document.pending_buffers() {
        let declared = document.root.buffers[index].clone();

        let data = match declared.uri.as_deref() {
            None if index == 0 && glb_bin.is_some() => {
                let bin = glb_bin.take().unwrap_or_default();
                if bin.len() < declared.byte_length {
                    return Err(ImportError::MissingBuffer {
                        index,
                        reason: format!(
                            "binary chunk holds {} bytes, {} declared",
                            bin.len(),
                            declared.byte_length
                        ),
                    });
                }
                bin
            }
            None if declared.byte_length == 0 => Vec::new(),
            None => {
                return Err(ImportError::MissingBuffer {
                    index,
                    reason: "buffer has no uri and no binary chunk".to_string(),
                });
            }
            Some(uri) if is_data_uri(uri) => {
                let bytes = decode_data_uri(uri).ok_or_else(|| ImportError::MissingBuffer {
                    index,
                    reason: "undecodable data uri".to_string(),
                })?;
                if bytes.len() != declared.byte_length {
                    return Err(ImportError::MissingBuffer {
                        index,
                        reason: format!(
                            "data uri holds {} bytes, {} declared",
                            bytes.len(),
                            declared.byte_length
                        ),
                    });
                }
                bytes
            }
            Some(uri) => {
                let url = base_url.join(uri).map_err(|error| ImportError::MissingBuffer {
                    index,
                    reason: format!("cannot resolve '{uri}': {error}"),
                })?;
                fetch_buffer(index, &url, declared.byte_length, fetcher)?
            }
        };

        document.buffer_data[index] = Some(data);
    }

    Ok(())
}

fn fetch_buffer(
    index: usize,
    url: &Url,
    byte_length: usize,
    fetcher: &dyn ResourceFetcher,
) -> Result<Vec<u8>, ImportError> {
    if fetcher.is_cancelled() {
        return Err(ImportError::Cancelled(url.to_string()));
    }

    tracing::debug!(%url, index, "fetching buffer");
    let fetched = fetcher.fetch(url);

    if fetcher.is_cancelled() {
        return Err(ImportError::Cancelled(url.to_string()));
    }

    let bytes = fetched.map_err(|error| ImportError::MissingBuffer {
        index,
        reason: format!("{error:#}"),
    })?;
    if bytes.len() != byte_length {
        return Err(ImportError::MissingBuffer {
            index,
            reason: format!(
                "fetched {} bytes from {url}, {byte_length} declared",
                bytes.len()
            ),
        });
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::diagnostic::ImportDiagnostics;
    use crate::import::document::parse_document;
    use crate::options::ImportOptions;

    fn document_with_buffer(uri: &str, byte_length: usize) -> Document {
        let json = format!(
            r#"{{ "asset": {{ "version": "2.0" }}, "buffers": [ {{ "uri": "{uri}", "byteLength": {byte_length} }} ] }}"#
        );
        parse_document(
            json.as_bytes(),
            &ImportOptions::default(),
            &mut ImportDiagnostics::default(),
        )
        .expect("document should parse")
    }

    fn base() -> Url {
        Url::parse("https://example.com/models/avatar.gltf").expect("valid url")
    }

    struct CancelAfterFetch {
        fetched: Cell<bool>,
    }

    impl ResourceFetcher for CancelAfterFetch {
        fn fetch(&self, _url: &Url) -> anyhow::Result<Vec<u8>> {
            self.fetched.set(true);
            Ok(vec![0; 4])
        }

        fn is_cancelled(&self) -> bool {
            self.fetched.get()
        }
    }

    #[test]
    fn given_base64_data_uri_when_decoding_then_payload_is_returned() {
        let decoded = decode_data_uri("data:application/octet-stream;base64,AQID");
        assert_eq!(decoded, Some(vec![1, 2, 3]));
        assert_eq!(decode_data_uri("data:text/plain,hello"), None);
        assert_eq!(decode_data_uri("buffer.bin"), None);
    }

    #[test]
    fn given_relative_uri_when_loading_then_fetcher_sees_resolved_url() {
        let mut document = document_with_buffer("buffers/mesh.bin", 3);
        let fetcher = |url: &Url| -> anyhow::Result<Vec<u8>> {
            assert_eq!(url.as_str(), "https://example.com/models/buffers/mesh.bin");
            Ok(vec![7, 8, 9])
        };

        load_buffers(&mut document, &base(), &fetcher).expect("buffers load");

        assert_eq!(document.buffer_bytes(0), Some(&[7u8, 8, 9][..]));
    }

    #[test]
    fn given_fetch_failure_when_loading_then_missing_buffer_is_returned() {
        let mut document = document_with_buffer("mesh.bin", 3);
        let fetcher = |_: &Url| -> anyhow::Result<Vec<u8>> { bail!("404 not found") };

        let result = load_buffers(&mut document, &base(), &fetcher);

        assert!(matches!(
            result,
            Err(ImportError::MissingBuffer { index: 0, .. })
        ));
    }

    #[test]
    fn given_size_mismatch_when_loading_then_missing_buffer_is_returned() {
        let mut document = document_with_buffer("mesh.bin", 16);
        let fetcher = |_: &Url| -> anyhow::Result<Vec<u8>> { Ok(vec![0; 8]) };

        let result = load_buffers(&mut document, &base(), &fetcher);

        assert!(matches!(result, Err(ImportError::MissingBuffer { .. })));
    }

    #[test]
    fn given_data_uri_shorter_than_declared_when_loading_then_missing_buffer_is_returned() {
        let mut document = document_with_buffer("data:application/octet-stream;base64,AQID", 5);
        let fetcher = |_: &Url| -> anyhow::Result<Vec<u8>> { bail!("data uri needs no fetch") };

        let result = load_buffers(&mut document, &base(), &fetcher);

        assert!(matches!(
            result,
            Err(ImportError::MissingBuffer { index: 0, .. })
        ));
        assert_eq!(document.buffer_bytes(0), None);
    }

    #[test]
    fn given_cancellation_during_fetch_when_loading_then_import_is_cancelled() {
        let mut document = document_with_buffer("mesh.bin", 4);
        let fetcher = CancelAfterFetch {
            fetched: Cell::new(false),
        };

        let result = load_buffers(&mut document, &base(), &fetcher);

        assert!(matches!(result, Err(ImportError::Cancelled(_))));
    }

    #[test]
    fn given_local_file_when_fetching_with_file_fetcher_then_bytes_are_read() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("mesh.bin");
        fs::write(&path, [1u8, 2, 3, 4]).expect("write fixture");
        let url = Url::from_file_path(&path).expect("file url");

        let bytes = FileFetcher.fetch(&url).expect("file fetch");

        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert!(FileFetcher.fetch(&base()).is_err());
    }

    #[test]
    fn given_uri_with_query_when_taking_file_name_then_last_segment_is_returned() {
        assert_eq!(file_name("https://cdn.test/tex/skin.png?v=2"), "skin.png");
        assert_eq!(file_name("face.jpg"), "face.jpg");
    }
}
