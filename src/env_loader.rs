use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(bib_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    match (bib_home, home_dir) {
        (Some(bib_home), _) => Some(bib_home.join(".env")),
        (None, Some(home)) => Some(home.join(".bibarchive/.env")),
        (None, None) => None,
    }
}

/// Load `.env` from the working directory, else from `$BIB_HOME` or
/// `~/.bibarchive`. Variables already set win.
pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("BIB_HOME").map(PathBuf::from),
        dirs::home_dir(),
    );

    let Some(path) = fallback else {
        return;
    };
    if path.is_file() {
        let _ = dotenvy::from_path(&path);
    }
}

#[cfg(test)]
mod tests {
    use super::fallback_dotenv_path;
    use std::path::PathBuf;

    #[test]
    fn fallback_prefers_bib_home() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/srv/library")),
            Some(PathBuf::from("/home/reader")),
        );
        assert_eq!(got, Some(PathBuf::from("/srv/library/.env")));
    }

    #[test]
    fn fallback_uses_dot_dir_in_home() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/reader")));
        assert_eq!(got, Some(PathBuf::from("/home/reader/.bibarchive/.env")));
    }

    #[test]
    fn no_fallback_without_any_home() {
        assert_eq!(fallback_dotenv_path(None, None), None);
    }
}
