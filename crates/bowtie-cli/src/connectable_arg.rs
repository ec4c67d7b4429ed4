//! Clap adapter for connectable arguments.
//!
//! - [`ConnectableParser`] resolves an argument into a [`Connectable`],
//!   reporting resolution errors verbatim.
//! - [`complete_implementation`] offers known implementation names that
//!   start with what the user has typed so far.

use std::ffi::OsStr;
use std::sync::Arc;

use clap::builder::{PossibleValue, TypedValueParser};
use clap::error::ErrorKind;
use clap::{Arg, Command};

use bowtie_core::{Connectable, ConnectorRegistry};

/// Implementations Bowtie ships harnesses for, used when the config file
/// does not list any.
pub const KNOWN_IMPLEMENTATIONS: &[&str] = &[
    "c-jsonschema",
    "clojure-json-schema",
    "cpp-blaze",
    "cpp-valijson",
    "dotnet-corvus-jsonschema",
    "dotnet-jsonschema-net",
    "go-gojsonschema",
    "go-jsonschema",
    "java-json-schema",
    "java-networknt-json-schema-validator",
    "js-ajv",
    "js-hyperjump",
    "kotlin-kotlinx-schema",
    "lua-jsonschema",
    "php-opis-json-schema",
    "python-fastjsonschema",
    "python-jsonschema",
    "ruby-json_schemer",
    "rust-boon",
    "rust-jsonschema",
    "ts-vscode-json-languageservice",
];

/// Parses a connectable string (`[<connector>:]<id>[:<arguments>*]`)
/// against a connector registry.
///
/// Known implementation names are advertised as possible values so that
/// generated shell completions offer them, but any resolvable string is
/// accepted.
#[derive(Debug, Clone)]
pub struct ConnectableParser {
    registry: Arc<ConnectorRegistry>,
    known: Arc<[String]>,
}

impl ConnectableParser {
    pub fn new(registry: ConnectorRegistry, known: &[String]) -> Self {
        Self {
            registry: Arc::new(registry),
            known: known.into(),
        }
    }
}

impl Default for ConnectableParser {
    /// Built-in connectors and implementation names.
    fn default() -> Self {
        let known: Vec<String> = KNOWN_IMPLEMENTATIONS.iter().map(|s| s.to_string()).collect();
        Self::new(ConnectorRegistry::with_defaults(), &known)
    }
}

impl TypedValueParser for ConnectableParser {
    type Value = Connectable;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let Some(value) = value.to_str() else {
            return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
        };

        Connectable::resolve_with(&self.registry, value).map_err(|e| {
            let arg = arg.map_or_else(|| "...".to_string(), |arg| arg.to_string());
            clap::Error::raw(
                ErrorKind::ValueValidation,
                format!("invalid value '{value}' for '{arg}': {e}\n"),
            )
            .with_cmd(cmd)
        })
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        Some(Box::new(
            self.known.iter().map(|name| PossibleValue::new(name.clone())),
        ))
    }
}

/// Known implementation names starting with `incomplete` (case-insensitive
/// on the typed side).
pub fn complete_implementation<'a>(incomplete: &str, known: &'a [String]) -> Vec<&'a str> {
    let incomplete = incomplete.to_lowercase();
    known
        .iter()
        .map(String::as_str)
        .filter(|name| name.starts_with(&incomplete))
        .collect()
}
