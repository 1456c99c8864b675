use camino::Utf8PathBuf;

#[derive(Debug)]
#[non_exhaustive]
pub struct StoreConfig {
    pub path: Utf8PathBuf,
    /// Open without creating the directory or missing column families.
    pub must_exist: bool,
}

impl StoreConfig {
    #[must_use]
    pub const fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            must_exist: false,
        }
    }

    #[must_use]
    pub const fn existing(path: Utf8PathBuf) -> Self {
        Self {
            path,
            must_exist: true,
        }
    }
}
