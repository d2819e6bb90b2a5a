//! [`TableTranslator`] is a [`Translator`] over a static JSON table.
//!
//! The table maps enumeration name to source code to public value:
//!
//! ```json
//! { "ProviderType": { "01": "CommunitySchool" }, "ProviderStatus": { "1": "Open" } }
//! ```

use std::{collections::HashMap, convert::Infallible, path::Path, str::FromStr};

use gias_core::mapping::{EnumerationName, Translator};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct TableTranslator {
  table: HashMap<EnumerationName, HashMap<String, String>>,
}

impl TableTranslator {
  pub async fn load(path: &Path) -> Result<Self> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|source| Error::Io {
      path: path.to_path_buf(),
      source,
    })?;
    let table: HashMap<String, HashMap<String, String>> =
      serde_json::from_str(&raw).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
      })?;
    Self::from_table(table)
  }

  /// Build from raw names. Unknown enumeration names are rejected so a typo
  /// in the table does not silently disable a translation.
  pub fn from_table(raw: HashMap<String, HashMap<String, String>>) -> Result<Self> {
    let table = raw
      .into_iter()
      .map(|(name, values)| {
        EnumerationName::from_str(&name)
          .map(|enumeration| (enumeration, values))
          .map_err(|_| Error::UnknownEnumeration(name))
      })
      .collect::<Result<_>>()?;
    Ok(Self { table })
  }
}

impl Translator for TableTranslator {
  type Error = Infallible;

  async fn translate<'a>(
    &'a self,
    enumeration: EnumerationName,
    source_value: &'a str,
  ) -> Result<Option<String>, Infallible> {
    Ok(
      self
        .table
        .get(&enumeration)
        .and_then(|values| values.get(source_value.trim()))
        .cloned(),
    )
  }
}
