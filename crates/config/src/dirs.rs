//! Home directory resolution.

use camino::{Utf8Path, Utf8PathBuf};
use eyre::{eyre, Result as EyreResult};

/// Directory name under the user's home.
pub const HOME_DIR_NAME: &str = ".flowkv";

/// `~/.flowkv`
pub fn default_home() -> EyreResult<Utf8PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| eyre!("cannot determine home directory"))?;

    let home = Utf8PathBuf::try_from(home)
        .map_err(|err| eyre!("home directory is not valid UTF-8: {err}"))?;

    Ok(home.join(HOME_DIR_NAME))
}

/// `path` if absolute, otherwise `path` under `home`.
#[must_use]
pub fn resolve(home: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        home.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_paths_under_home() {
        let home = Utf8Path::new("/srv/flowkv");

        assert_eq!(resolve(home, Utf8Path::new("flows")), "/srv/flowkv/flows");
        assert_eq!(resolve(home, Utf8Path::new("/data/flows")), "/data/flows");
    }
}
