use serde::{Deserialize, Serialize};

use crate::utils::string_to_safe_path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub name: String,
    pub category: String,
    pub value: i64,
    pub solves: i64,
    pub solved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<String>>,
}

impl Challenge {
    /// Reconciles a freshly fetched record with the cached one.
    ///
    /// Every field carried by `new` wins. Optional fields that `new` does not
    /// carry (list endpoints omit descriptions and files) keep their cached
    /// value.
    pub fn merged(old: Option<&Challenge>, new: Challenge) -> Challenge {
        let Some(old) = old else {
            return new;
        };

        Challenge {
            description: new.description.or_else(|| old.description.clone()),
            connection: new.connection.or_else(|| old.connection.clone()),
            files: new.files.or_else(|| old.files.clone()),
            ..new
        }
    }

    /// Name of the local folder this challenge is scaffolded into.
    pub fn folder_name(&self) -> String {
        let name = string_to_safe_path(&self.name);
        if name.is_empty() {
            format!("challenge_{}", string_to_safe_path(&self.id))
        } else {
            name
        }
    }
}
