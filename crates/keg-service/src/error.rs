use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("cannot render service field `{field}`")]
    Template {
        field: String,
        #[source]
        source: keg_resource::ResourceError,
    },

    #[error("service program must not be empty")]
    EmptyProgram,

    #[error("failed to serialize service descriptor")]
    Serialize(#[from] serde_json::Error),
}
