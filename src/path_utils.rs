use std::path::{Path, PathBuf};

pub fn expand_tilde_path(path: &str) -> PathBuf {
    expand_with_home(path, dirs::home_dir().as_deref())
}

fn expand_with_home(path: &str, home: Option<&Path>) -> PathBuf {
    let trimmed = path.trim();
    match (trimmed, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (_, Some(home)) => match trimmed.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(trimmed),
        },
        _ => PathBuf::from(trimmed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_leading_tilde_only() {
        let home = Path::new("/home/dev");
        assert_eq!(
            expand_with_home("~/.claude/settings.json", Some(home)),
            PathBuf::from("/home/dev/.claude/settings.json")
        );
        assert_eq!(expand_with_home("~", Some(home)), PathBuf::from("/home/dev"));
        assert_eq!(
            expand_with_home("/etc/~/x", Some(home)),
            PathBuf::from("/etc/~/x")
        );
        assert_eq!(expand_with_home("~/x", None), PathBuf::from("~/x"));
    }
}
