use serde::{Deserialize, Serialize};

use stockflow_core::DomainError;

/// Physical or logical place where stock of a batch can sit.
///
/// The serialized tag is what the transfer ledger records as from/to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Location {
    Warehouse,
    Shelf,
    Web,
}

impl Location {
    pub fn tag(self) -> &'static str {
        match self {
            Location::Warehouse => "WAREHOUSE",
            Location::Shelf => "SHELF",
            Location::Web => "WEB",
        }
    }
}

impl core::fmt::Display for Location {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.tag())
    }
}

/// In-store shelf identifier (e.g. "A-01").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShelfCode(String);

impl ShelfCode {
    /// Surrounding whitespace is dropped; an empty code is rejected.
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        let trimmed = code.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("shelf code cannot be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl core::fmt::Display for ShelfCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ShelfCode {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShelfCode> for String {
    fn from(value: ShelfCode) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_tags_are_stable() {
        assert_eq!(Location::Warehouse.tag(), "WAREHOUSE");
        assert_eq!(serde_json::to_string(&Location::Web).unwrap(), "\"WEB\"");
        assert_eq!(Location::Shelf.to_string(), "SHELF");
    }

    #[test]
    fn shelf_code_is_trimmed_and_non_empty() {
        assert_eq!(ShelfCode::new(" A-01 ").unwrap().to_string(), "A-01");
        assert!(ShelfCode::new("   ").is_err());
        assert!(serde_json::from_str::<ShelfCode>("\"\"").is_err());
    }
}
