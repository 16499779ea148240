use crate::api::{Error, RepoTarget, Result};
use std::path::Path;
use std::str::FromStr;
use url::Url;

const GITHUB_HOSTS: [&str; 2] = ["github.com", "www.github.com"];

impl FromStr for RepoTarget {
    type Err = Error;

    /// Accepts `https://github.com/owner/repo`, with or without scheme, `www.`, trailing slash or `.git`.
    fn from_str(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{}", trimmed)
        };
        let url = Url::parse(&with_scheme).map_err(|_| Error::Parse(input.to_string()))?;
        match url.host_str() {
            Some(host) if GITHUB_HOSTS.contains(&host) => {}
            _ => return Err(Error::Parse(input.to_string())),
        }
        let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
        let owner = segments.next();
        let name = segments.next().map(|name| name.trim_end_matches(".git"));
        match (owner, name) {
            (Some(owner), Some(name)) if !name.is_empty() => Ok(RepoTarget::new(owner.to_string(), name.to_string())),
            _ => Err(Error::Parse(input.to_string())),
        }
    }
}

/// Parses CLI targets. A single argument naming an existing file is read as a newline-delimited list of URLs.
pub fn read_targets(args: &[String]) -> Result<Vec<RepoTarget>> {
    if let [single] = args {
        let path = Path::new(single);
        if path.is_file() {
            let content = std::fs::read_to_string(path)?;
            return parse_lines(&content);
        }
    }
    args.iter().map(|arg| arg.parse()).collect()
}

fn parse_lines(content: &str) -> Result<Vec<RepoTarget>> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(RepoTarget::from_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(owner: &str, name: &str) -> RepoTarget {
        RepoTarget::new(owner.to_string(), name.to_string())
    }

    #[test]
    fn parses_url_variants() {
        for input in [
            "https://github.com/rust-lang/cargo",
            "https://github.com/rust-lang/cargo/",
            "http://www.github.com/rust-lang/cargo.git",
            "github.com/rust-lang/cargo",
            "  https://github.com/rust-lang/cargo/tree/master  ",
        ] {
            assert_eq!(input.parse::<RepoTarget>().unwrap(), target("rust-lang", "cargo"), "{}", input);
        }
    }

    #[test]
    fn rejects_foreign_hosts_and_missing_repo() {
        for input in [
            "https://gitlab.com/rust-lang/cargo",
            "https://example.com/github.com/rust-lang/cargo",
            "https://github.com/rust-lang",
            "not a url at all",
            "",
        ] {
            assert!(
                matches!(input.parse::<RepoTarget>(), Err(Error::Parse(_))),
                "{} should not parse",
                input
            );
        }
    }

    #[test]
    fn reads_targets_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("targets.txt");
        std::fs::write(
            &file,
            "# seed list\nhttps://github.com/a/one\n\ngithub.com/b/two.git\n",
        )
        .unwrap();
        let targets = read_targets(&[file.to_string_lossy().into_owned()]).unwrap();
        assert_eq!(targets, vec![target("a", "one"), target("b", "two")]);
    }

    #[test]
    fn one_bad_line_fails_the_batch() {
        let args = vec!["https://github.com/a/one".to_string(), "https://bitbucket.org/b/two".to_string()];
        assert!(matches!(read_targets(&args), Err(Error::Parse(input)) if input.contains("bitbucket")));
    }
}
