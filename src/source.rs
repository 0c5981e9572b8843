use anyhow::{Context, Result, bail};
use reqwest::blocking::Client;
use url::Url;

/// Published sheet the page is built from when nothing else is configured.
pub const DEFAULT_SOURCE_URL: &str = "https://docs.google.com/spreadsheets/d/e/2PACX-1vR3TICsNkBp13yprTa3sQY1lD3RY-vHdVEZRwFLxEQW5idIvod87_Sp1xeZj50-7rdEAI8ahGvdcXw1/pub?output=csv";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    Remote(Url),
    File(std::path::PathBuf),
}

impl Source {
    pub fn parse(s: &str) -> Source {
        match Url::parse(s) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => Source::Remote(u),
            Ok(u) if u.scheme() == "file" => Source::File(u.to_file_path().unwrap_or_else(|_| s.into())),
            _ => Source::File(std::path::PathBuf::from(s)),
        }
    }

    /// What the page links to as the downloadable dataset.
    pub fn link_target(&self) -> String {
        match self {
            Source::Remote(u) => u.to_string(),
            Source::File(p) => p.to_string_lossy().into_owned(),
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Source::Remote(u) => write!(f, "{}", u),
            Source::File(p) => write!(f, "{}", p.display()),
        }
    }
}

/// Single attempt, no retry. Timeouts are whatever the transport defaults to.
pub fn fetch_csv(source: &Source) -> Result<String> {
    match source {
        Source::Remote(u) => {
            let client = Client::builder()
                .user_agent(concat!("SheetView/", env!("CARGO_PKG_VERSION")))
                .build()
                .context("building http client")?;
            let resp = client.get(u.clone()).send().with_context(|| format!("GET {}", u))?;
            let status = resp.status();
            if !status.is_success() {
                bail!("HTTP {} from {}", status, u);
            }
            let body = resp.text().with_context(|| format!("reading body of {}", u))?;
            log::debug!("Fetched {} bytes from {}", body.len(), u);
            Ok(body)
        }
        Source::File(p) => std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn https_is_remote() {
        assert!(matches!(Source::parse(DEFAULT_SOURCE_URL), Source::Remote(_)));
        assert!(matches!(Source::parse("http://x.test/a.csv"), Source::Remote(_)));
    }

    #[test]
    fn plain_paths_are_files() {
        assert_eq!(Source::parse("data/export.csv"), Source::File("data/export.csv".into()));
        assert!(matches!(Source::parse("file:///tmp/a.csv"), Source::File(_)));
    }

    #[test]
    fn reads_local_file() {
        let p = std::env::temp_dir().join("sheetview_source_test.csv");
        std::fs::write(&p, "Timestamp,Name\n2024-01-01,Alice\n").unwrap();
        let body = fetch_csv(&Source::File(p.clone())).unwrap();
        assert!(body.starts_with("Timestamp,Name"));
        let _ = std::fs::remove_file(&p);
    }

    #[test]
    fn missing_file_is_an_error() {
        let p = std::env::temp_dir().join("sheetview_definitely_missing.csv");
        let err = fetch_csv(&Source::File(p)).unwrap_err();
        assert!(format!("{:#}", err).contains("reading"));
    }
}
