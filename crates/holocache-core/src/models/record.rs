use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored entity in its generic form.
///
/// `uid` is unique within a table; `name` is the display name (the title for
/// films). Every other field the remote API returned, including `url` and the
/// relation fields, lives in `properties`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl Record {
    pub fn new(uid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            properties: Map::new(),
        }
    }

    /// Merge detail properties over a uid and a fallback name.
    ///
    /// A `name` inside the properties wins over the fallback, matching how the
    /// detail payload overrides the lightweight listing entry.
    pub fn merged(uid: impl Into<String>, fallback_name: &str, mut properties: Map<String, Value>) -> Self {
        properties.remove("uid");
        let name = match properties.remove("name") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => fallback_name.to_string(),
        };
        Self {
            uid: uid.into(),
            name,
            properties,
        }
    }

    /// Builder-style setter used by fixtures and the listing flattener.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    pub fn url(&self) -> Option<&str> {
        self.reference("url")
    }

    /// A single-url field such as `homeworld`.
    pub fn reference(&self, field: &str) -> Option<&str> {
        self.properties.get(field).and_then(Value::as_str)
    }

    /// A url-list field such as `films` or `pilots`. Missing or malformed
    /// fields yield nothing.
    pub fn references<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.properties
            .get(field)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
    }

    /// Decode into a typed view.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}
