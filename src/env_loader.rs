use std::env;
use std::path::PathBuf;

fn fallback_dotenv_path(studio_home: Option<PathBuf>, home_dir: Option<PathBuf>) -> Option<PathBuf> {
    match studio_home {
        Some(dir) => Some(dir.join(".env")),
        None => Some(home_dir?.join(".diary-studio/.env")),
    }
}

pub fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    let fallback = fallback_dotenv_path(
        env::var_os("DIARY_STUDIO_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from),
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
    fn fallback_uses_studio_home_when_set() {
        let got = fallback_dotenv_path(
            Some(PathBuf::from("/workspace/studio")),
            Some(PathBuf::from("/home/alice")),
        );
        assert_eq!(got, Some(PathBuf::from("/workspace/studio/.env")));
    }

    #[test]
    fn fallback_uses_default_home_dir_otherwise() {
        let got = fallback_dotenv_path(None, Some(PathBuf::from("/home/alice")));
        assert_eq!(got, Some(PathBuf::from("/home/alice/.diary-studio/.env")));
    }
}
