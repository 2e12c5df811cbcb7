/// A trove classifier string, stored once and shared between versions.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Classifier {
    pub id: i64,
    pub trove: String,
}

pub(crate) type ClassifierRow = Classifier;
