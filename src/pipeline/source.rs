//! Pipeline entry points

use crate::errors::BuildResult;
use crate::stage::Stage;
use crate::value::DocumentReference;

use super::query::{to_pipeline, StructuredQuery};
use super::Pipeline;

/// Constructors for pipelines, one per source stage
pub struct PipelineSource;

impl PipelineSource {
    /// All documents of the collection at `path` (relative, e.g. `users/alice/orders`).
    ///
    /// Paths are relative to the database root. A leading `/` is rejected
    /// with `InvalidPath`, unlike `DocumentReference::new` which strips it.
    pub fn collection(path: &str) -> BuildResult<Pipeline> {
        Ok(Pipeline::from_source(Stage::collection(path)?))
    }

    /// All collections named `collection_id`, wherever they are nested
    pub fn collection_group(collection_id: &str) -> BuildResult<Pipeline> {
        Ok(Pipeline::from_source(Stage::collection_group(collection_id)?))
    }

    /// Every document in the database
    pub fn database() -> Pipeline {
        Pipeline::from_source(Stage::Database)
    }

    pub fn documents<I, S>(paths: I) -> BuildResult<Pipeline>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Pipeline::from_source(Stage::documents(paths)?))
    }

    pub fn document_refs(docs: Vec<DocumentReference>) -> BuildResult<Pipeline> {
        Ok(Pipeline::from_source(Stage::document_refs(docs)?))
    }

    /// Equivalent pipeline for a classic structured query
    pub fn create_from(query: &StructuredQuery) -> BuildResult<Pipeline> {
        to_pipeline(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources() {
        assert_eq!(PipelineSource::database().stages(), &[Stage::Database]);
        assert!(PipelineSource::documents(["users/alice", "users/bob"]).is_ok());
        assert!(PipelineSource::documents(["users"]).is_err());
        assert!(PipelineSource::collection_group("a/b").is_err());
    }
}
