use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use async_graphql_value::{ConstValue, Name};
use serde::{Deserialize, Serialize};

/// Variables of a request, keyed by variable name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Variables(BTreeMap<Name, ConstValue>);

impl Display for Variables {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.0.iter().enumerate() {
            write!(f, "{}{name}: {value}", if i == 0 { "" } else { ", " })?;
        }
        f.write_str("}")
    }
}

impl Variables {
    /// Parse variables from a JSON object value. Any non-object value is
    /// treated as no variables.
    pub fn from_json(value: serde_json::Value) -> Self {
        ConstValue::from_json(value)
            .ok()
            .and_then(|value| match value {
                ConstValue::Object(object) => Some(Variables(object.into_iter().collect())),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Convert the variables back into a value.
    pub fn into_value(self) -> ConstValue {
        ConstValue::Object(self.0.into_iter().collect())
    }

    pub fn get(&self, name: &str) -> Option<&ConstValue> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: Name, value: ConstValue) -> Option<ConstValue> {
        self.0.insert(name, value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &ConstValue)> {
        self.0.iter()
    }
}

impl FromIterator<(Name, ConstValue)> for Variables {
    fn from_iter<I: IntoIterator<Item = (Name, ConstValue)>>(iter: I) -> Self {
        Variables(iter.into_iter().collect())
    }
}
