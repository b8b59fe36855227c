//! Output helpers shared by commands.

use serde::Serialize;

use crate::error::{DocsError, Result};

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)
        .map_err(|err| DocsError::Serialization(format!("serialize output: {err}")))?;
    println!("{payload}");
    Ok(())
}
