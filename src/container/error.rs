/// Errors that can occur during container operations
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// I/O error reading or writing the container file
    #[error("I/O error on container '{path}': {source}")]
    Io {
        /// Container filepath
        path: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("malformed container '{path}': {source}")]
    Json {
        /// Container filepath
        path: String,
        /// Underlying serde error
        #[source]
        source: serde_json::Error,
    },

    /// The container has no raw dataset
    #[error("container '{path}' has no raw dataset")]
    MissingRaw {
        /// Container filepath
        path: String,
    },

    /// More than one dataset claims to be the raw acquisition
    #[error("container has multiple raw datasets: [{names}]")]
    MultipleRaw {
        /// Comma-separated offending dataset names
        names: String,
    },

    /// The raw dataset carries a parent reference
    #[error("raw dataset '{name}' must not have a parent")]
    RawWithParent {
        /// The raw dataset name
        name: String,
    },

    /// A derived dataset has no parent reference
    #[error("derived dataset '{name}' has no parent")]
    MissingParent {
        /// The derived dataset name
        name: String,
    },

    /// A derived dataset references a parent that does not exist
    #[error("dataset '{dataset}' references unknown parent '{parent}'")]
    UnknownParent {
        /// The child dataset name
        dataset: String,
        /// The dangling parent name
        parent: String,
    },

    /// Parent links loop instead of terminating at the raw dataset
    #[error("provenance cycle involving dataset '{dataset}'")]
    CycleDetected {
        /// A dataset on the cycle
        dataset: String,
    },

    /// A 2-D payload's value count disagrees with its declared shape
    #[error("dataset '{dataset}' payload has {actual} values, shape implies {expected}")]
    ShapeMismatch {
        /// The offending dataset name
        dataset: String,
        /// Values implied by the declared shape
        expected: usize,
        /// Values actually present
        actual: usize,
    },

    /// A required attribute is absent from the container
    #[error("container '{path}' is missing attribute '{key}'")]
    MissingAttribute {
        /// Namespaced attribute key (`CATEGORY.Property`)
        key: String,
        /// Container filepath
        path: String,
    },

    /// An attribute value could not be parsed as a number
    #[error("attribute '{key}' value '{value}' is not numeric")]
    InvalidNumber {
        /// Namespaced attribute key
        key: String,
        /// The unparseable value
        value: String,
    },
}
