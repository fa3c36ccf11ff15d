use serde::{Deserialize, Serialize};

/// The signed-in delivery person issuing requests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Courier {
    pub id: String,
    pub name: String,
}

impl Courier {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}
