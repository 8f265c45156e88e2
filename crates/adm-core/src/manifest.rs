//! Archive manifests: the input model for batch downloads.
//!
//! A manifest is a JSON document naming the archives a list needs. Several
//! manifests can be loaded together; archives appearing more than once are
//! deduplicated by content hash.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// One downloadable archive entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Archive {
    /// Local filename the archive is saved under.
    pub name: String,
    /// Direct HTTP/HTTPS URL.
    pub url: String,
    /// Size estimate in bytes; orders downloads and weights limiter jobs.
    pub size: u64,
    /// Expected SHA-256 (lowercase hex), when the publisher knows it.
    #[serde(default)]
    pub sha256: Option<String>,
}

/// A parsed manifest file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub name: String,
    pub archives: Vec<Archive>,
}

/// Load and validate a single manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("read manifest {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&data)
        .with_context(|| format!("parse manifest {}", path.display()))?;
    validate(&manifest)?;
    Ok(manifest)
}

/// Load several manifests, flatten their archives, and deduplicate.
pub fn load_manifests(paths: &[impl AsRef<Path>]) -> Result<Vec<Archive>> {
    let mut all = Vec::new();
    for path in paths {
        let manifest = load_manifest(path.as_ref())?;
        tracing::debug!(
            manifest = %manifest.name,
            archives = manifest.archives.len(),
            "manifest loaded"
        );
        all.extend(manifest.archives);
    }
    Ok(dedupe_archives(all))
}

/// Keep the first occurrence of each archive, identified by its content hash
/// (or by URL for entries without one).
pub fn dedupe_archives(archives: Vec<Archive>) -> Vec<Archive> {
    let mut seen = HashSet::new();
    archives
        .into_iter()
        .filter(|a| {
            let key = a
                .sha256
                .as_ref()
                .map(|h| h.to_ascii_lowercase())
                .unwrap_or_else(|| a.url.clone());
            seen.insert(key)
        })
        .collect()
}

fn validate(manifest: &Manifest) -> Result<()> {
    for archive in &manifest.archives {
        if archive.name.is_empty() {
            bail!("manifest \"{}\": archive with empty name", manifest.name);
        }
        let parsed = Url::parse(&archive.url)
            .with_context(|| format!("archive \"{}\": bad URL", archive.name))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            bail!(
                "archive \"{}\": unsupported URL scheme \"{}\"",
                archive.name,
                parsed.scheme()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn archive(name: &str, url: &str, sha256: Option<&str>) -> Archive {
        Archive {
            name: name.to_string(),
            url: url.to_string(),
            size: 1,
            sha256: sha256.map(str::to_string),
        }
    }

    #[test]
    fn manifest_json_parses() {
        let json = r#"
            {
                "name": "base-pack",
                "archives": [
                    { "name": "a.zip", "url": "https://example.com/a.zip", "size": 100, "sha256": "ab12" },
                    { "name": "b.zip", "url": "https://example.com/b.zip", "size": 200 }
                ]
            }
        "#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.name, "base-pack");
        assert_eq!(manifest.archives.len(), 2);
        assert_eq!(manifest.archives[0].sha256.as_deref(), Some("ab12"));
        assert!(manifest.archives[1].sha256.is_none());
    }

    #[test]
    fn dedupe_prefers_first_occurrence() {
        let archives = vec![
            archive("a.zip", "https://one.example/a.zip", Some("AA11")),
            archive("a-mirror.zip", "https://two.example/a.zip", Some("aa11")),
            archive("b.zip", "https://one.example/b.zip", None),
            archive("b.zip", "https://one.example/b.zip", None),
        ];
        let deduped = dedupe_archives(archives);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "a.zip");
        assert_eq!(deduped[1].name, "b.zip");
    }

    #[test]
    fn validate_rejects_bad_schemes_and_empty_names() {
        let bad_scheme = Manifest {
            name: "m".into(),
            archives: vec![archive("a.zip", "ftp://example.com/a.zip", None)],
        };
        assert!(validate(&bad_scheme).is_err());

        let empty_name = Manifest {
            name: "m".into(),
            archives: vec![archive("", "https://example.com/a.zip", None)],
        };
        assert!(validate(&empty_name).is_err());
    }
}
