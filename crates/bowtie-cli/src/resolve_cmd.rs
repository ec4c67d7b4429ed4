//! `bowtie resolve` command: show how connectable strings resolve.

use anyhow::{Context, Result};
use serde::Serialize;

use bowtie_core::Connectable;

/// One resolved connectable, as printed.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Resolution<'a> {
    pub id: &'a str,
    pub connector: &'a str,
    pub argument: &'a str,
    pub terse: String,
}

impl<'a> Resolution<'a> {
    pub fn of(connectable: &'a Connectable) -> Self {
        Self {
            id: connectable.id().as_str(),
            connector: connectable.kind(),
            argument: connectable.connector().argument(),
            terse: connectable.to_terse(),
        }
    }
}

/// Print each resolution as one line of JSON.
pub fn run_resolve(connectables: &[Connectable]) -> Result<()> {
    for connectable in connectables {
        let line = serde_json::to_string(&Resolution::of(connectable))
            .with_context(|| format!("failed to serialize resolution of {connectable}"))?;
        println!("{line}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_of_implicit_image() {
        let connectable: Connectable = "example".parse().unwrap();
        assert_eq!(
            Resolution::of(&connectable),
            Resolution {
                id: "example",
                connector: "image",
                argument: "example",
                terse: "example".to_string(),
            }
        );
    }

    #[test]
    fn resolution_serializes_all_fields() {
        let connectable: Connectable = "container:deadbeef".parse().unwrap();
        let json = serde_json::to_value(Resolution::of(&connectable)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "id": "container:deadbeef",
                "connector": "container",
                "argument": "deadbeef",
                "terse": "container:deadbeef",
            })
        );
    }
}
