use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("an error occurred with the index")]
    Index(#[from] tantivy::TantivyError),

    #[error("an error occurred parsing the file")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Parsing(#[from] ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Configuration(#[from] ConfigError),
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("invalid archive: could not find {0}")]
    FileNotFound(String),

    #[error(transparent)]
    Xml(#[from] quick_xml::DeError),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("a darwin core archive is required for this command. pass it with --dwca")]
    MissingArchive,

    #[error("no loading index found at {0}. run the load command first")]
    MissingLoadingIndex(PathBuf),

    #[error("cannot write to the target directory: {0}")]
    UnwritableTarget(PathBuf),
}
