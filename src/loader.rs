//! Assertion-aware module loading.
//!
//! Once the resolver has encoded an assertion into a module id, `load`
//! turns the asserted file into a JavaScript module:
//!
//! - `buffer` exports the file's bytes as a binary buffer
//! - `json` exports the parsed JSON value
//! - `raw` / `text` export the file text as a string
//! - `url` exports the resolved module id string, without touching disk
//! - `javascript` loads the file content verbatim
//!
//! Any other assertion type is a hard error naming the offending tag.

use crate::assertion::{self, AssertionKind};
use crate::utils;
use crate::ImportsError;

/// Load an assertion-carrying module id. Ids without a decodable
/// assertion yield `None` so the host's own loaders take over.
pub async fn load(id: &str) -> Result<Option<String>, ImportsError> {
    if !id.contains("assert=") {
        return Ok(None);
    }

    let Some((safe_id, assertion)) = assertion::split_assertion(id) else {
        return Ok(None);
    };

    // Query parameters stay on the id for the host; the file on disk is
    // the bare path.
    let (file, _) = assertion::split_query(&safe_id);

    let code = match assertion.kind() {
        AssertionKind::Buffer => {
            let bytes = read(&file).await?;
            let elements = bytes
                .iter()
                .map(|byte| byte.to_string())
                .collect::<Vec<_>>()
                .join(",");
            format!("export default new Uint16Array([{elements}]).buffer")
        }
        AssertionKind::Json => {
            let text = read_to_string(&file).await?;
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|source| ImportsError::Json {
                    path: file.clone(),
                    source,
                })?;
            let serialized =
                serde_json::to_string(&value).map_err(|source| ImportsError::Json {
                    path: file.clone(),
                    source,
                })?;
            format!("export default {serialized}")
        }
        AssertionKind::Raw | AssertionKind::Text => {
            let text = read_to_string(&file).await?;
            format!("export default {}", utils::js_string(&text))
        }
        AssertionKind::Url => format!("export default {}", utils::js_string(&safe_id)),
        AssertionKind::Javascript => read_to_string(&file).await?,
        AssertionKind::Unsupported(kind) => {
            return Err(ImportsError::UnsupportedAssertion { kind });
        }
    };

    Ok(Some(code))
}

async fn read(path: &str) -> Result<Vec<u8>, ImportsError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| ImportsError::Read {
            path: path.to_string(),
            source,
        })
}

async fn read_to_string(path: &str) -> Result<String, ImportsError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ImportsError::Read {
            path: path.to_string(),
            source,
        })
}
