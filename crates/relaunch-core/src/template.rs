//! Argv templates for collaborator commands.
//!
//! A template is a plain argv list. Three placeholders are recognised:
//!
//! - `{revision}` — replaced inside any argument with the revision id.
//! - `{service}` — replaced inside any argument with a single service name.
//! - `{services}` — only as a whole argument; expands to one argument per
//!   service name, in service-set order.

use serde::{Deserialize, Serialize};

use crate::types::Revision;

const REVISION: &str = "{revision}";
const SERVICE: &str = "{service}";
const SERVICES: &str = "{services}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandTemplate(Vec<String>);

/// Values substituted into a [`CommandTemplate`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateVars<'a> {
    pub revision: Option<&'a Revision>,
    pub services: &'a [String],
    pub service: Option<&'a str>,
}

impl CommandTemplate {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(argv.into_iter().map(Into::into).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether any argument mentions the given placeholder.
    pub fn uses(&self, placeholder: &str) -> bool {
        self.0.iter().any(|arg| arg.contains(placeholder))
    }

    pub fn uses_service(&self) -> bool {
        self.uses(SERVICE)
    }

    /// Expand placeholders into a concrete argv.
    pub fn expand(&self, vars: TemplateVars<'_>) -> Vec<String> {
        let mut out = Vec::with_capacity(self.0.len() + vars.services.len());
        for arg in &self.0 {
            if arg == SERVICES {
                out.extend(vars.services.iter().cloned());
                continue;
            }
            let mut expanded = arg.clone();
            if let Some(rev) = vars.revision {
                expanded = expanded.replace(REVISION, rev.as_str());
            }
            if let Some(service) = vars.service {
                expanded = expanded.replace(SERVICE, service);
            }
            out.push(expanded);
        }
        out
    }
}
