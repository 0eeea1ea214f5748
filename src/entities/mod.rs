use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Deserializer, Serialize};

pub mod course;
pub mod enrolled_course;
pub mod enrollment;
pub mod lesson;
pub mod lesson_completion;
pub mod playlist;
pub mod prelude;
pub mod review;
pub mod user;
pub mod video;

/// A list of strings stored as a single JSON column.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct StringList(pub Vec<String>);

impl From<Vec<String>> for StringList {
    fn from(values: Vec<String>) -> Self {
        Self(values)
    }
}

impl StringList {
    /// Trims every entry and drops the empty ones.
    pub fn cleaned(values: Vec<String>) -> Self {
        Self(
            values
                .into_iter()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        )
    }

    pub fn into_inner(self) -> Vec<String> {
        self.0
    }
}

/// Keeps an explicit JSON `null` apart from a missing field, so a partial
/// update can clear a nullable column.
pub(crate) fn explicit_null<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
