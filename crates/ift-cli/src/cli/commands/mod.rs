mod certificate;
mod dispatch;
mod map;

pub use dispatch::dispatch;

use std::path::Path;

use anyhow::Context;
use ift_registry::RegistryError;
use serde_json::Value;

use crate::exit_codes::{EXIT_INPUT_ERROR, EXIT_INTERNAL_ERROR};

/// Exit code for a failed command.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if let Some(registry) = err.downcast_ref::<RegistryError>() {
        return registry.exit_code();
    }
    if err.downcast_ref::<std::io::Error>().is_some()
        || err.downcast_ref::<serde_json::Error>().is_some()
    {
        return EXIT_INPUT_ERROR;
    }
    EXIT_INTERNAL_ERROR
}

pub(crate) fn read_json(path: &Path) -> anyhow::Result<Value> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

/// Audit and certificate documents; the audit doubles as the certificate
/// when no separate file is given.
pub(crate) fn read_sources(
    audit: &Path,
    certificate: Option<&Path>,
) -> anyhow::Result<(Value, Value)> {
    let audit_doc = read_json(audit)?;
    let certificate_doc = match certificate {
        Some(path) => read_json(path)?,
        None => audit_doc.clone(),
    };
    Ok((audit_doc, certificate_doc))
}
