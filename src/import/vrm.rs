use serde_json::{Map, Value};

use super::types::{EXT_VRM0, EXT_VRM1};

/// Model title: VRM 1.x `meta/name`, VRM 0.x `meta/title`, or the
/// VRM 0.x exporters that also wrote `meta/name`.
pub(crate) fn extract_title(extensions: &Map<String, Value>) -> Option<String> {
    let vrm1 = extensions
        .get(EXT_VRM1)
        .and_then(|vrm| vrm.pointer("/meta/name"));
    let vrm0 = extensions.get(EXT_VRM0).and_then(|vrm| {
        vrm.pointer("/meta/title")
            .or_else(|| vrm.pointer("/meta/name"))
    });

    vrm1.or(vrm0)
        .and_then(Value::as_str)
        .filter(|title| !title.is_empty())
        .map(ToOwned::to_owned)
}

/// Author list: VRM 1.x `meta/authors` array, or the single VRM 0.x
/// `meta/author` string.
pub(crate) fn extract_authors(extensions: &Map<String, Value>) -> Vec<String> {
    if let Some(authors) = extensions
        .get(EXT_VRM1)
        .and_then(|vrm| vrm.pointer("/meta/authors"))
        .and_then(Value::as_array)
    {
        return authors
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect();
    }

    extensions
        .get(EXT_VRM0)
        .and_then(|vrm| vrm.pointer("/meta/author"))
        .and_then(Value::as_str)
        .filter(|author| !author.is_empty())
        .map(|author| vec![author.to_owned()])
        .unwrap_or_default()
}
