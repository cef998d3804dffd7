use crate::types::json_path::JsonPath;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// A resolved (path template, method) endpoint descriptor together with its
/// pointer into the specification document.
#[derive(Debug, Serialize)]
pub struct Operation {
    pub(crate) data: Value,

    #[serde(skip_serializing)]
    pub(crate) path: JsonPath,

    #[serde(skip_serializing)]
    pub(crate) template: String,

    #[serde(skip_serializing)]
    pub(crate) method: String,
}

impl Operation {
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Pointer to this operation: `paths/<escaped template>/<method>`.
    pub fn json_path(&self) -> &JsonPath {
        &self.path
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Base path used for `KeywordLocation` pointers. The template keeps its
    /// leading slash out of the segment, so `/x` renders as `/paths/x/get`
    /// rather than the raw document pointer `/paths/~1x/get`.
    pub fn keyword_base(&self) -> JsonPath {
        let mut path = JsonPath::new();
        path.add("paths").add_template(&self.template).add(&self.method);
        path
    }
}

/// The outcome of routing a request URL and method through the path router:
/// the matched operation, its surrounding path item, and the raw (still
/// string-typed) path variables in brace order.
#[derive(Debug)]
pub struct RouteMatch {
    pub(crate) operation: Arc<Operation>,
    pub(crate) path_item: Value,
    pub(crate) path_vars: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn operation(&self) -> &Arc<Operation> {
        &self.operation
    }

    pub fn path_item(&self) -> &Value {
        &self.path_item
    }

    /// Raw path variables as extracted from the URL, keyed by template
    /// parameter name, in the order the braces appear in the template.
    pub fn path_vars(&self) -> &[(String, String)] {
        &self.path_vars
    }

    pub fn path_var(&self, name: &str) -> Option<&str> {
        self.path_vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}
