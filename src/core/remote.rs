//! # Remote Resolution & Installation
//!
//! Turns an install specifier (`<url>[==<version>]`) into a concrete
//! checkout and fetches the payload into the filter cache. The moving
//! pieces are kept pure where possible: version parsing and tag selection
//! take plain data so they are testable without touching the network.

use anyhow::{Context, Result, anyhow, bail};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::FILTER_CACHE_DIR;
use crate::system::executor;

// --- Version specifiers ---

/// A parsed semantic version. Only the strict `major.minor.patch` form is
/// accepted; pre-release suffixes on remote tags are ignored rather than
/// ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl SemVer {
    pub fn parse(s: &str) -> Option<Self> {
        let mut parts = s.splitn(3, '.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        Some(Self { major, minor, patch })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// The version half of an install specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Semver(SemVer),
    /// A full git commit hash.
    Hash(String),
    /// Track the latest commit; persisted literally so it keeps floating.
    Head,
    /// Track the highest version tag; persisted literally as well.
    Latest,
}

impl VersionSpec {
    pub fn parse(s: &str) -> Result<Self> {
        if s == "HEAD" {
            return Ok(Self::Head);
        }
        if s == "latest" {
            return Ok(Self::Latest);
        }
        if s.len() == 40 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::Hash(s.to_string()));
        }
        if let Some(version) = SemVer::parse(s) {
            return Ok(Self::Semver(version));
        }
        bail!(
            "Invalid version specifier '{}'. Expected a semantic version, a commit hash, 'HEAD' or 'latest'.",
            s
        );
    }
}

/// A parsed install request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSpec {
    pub url: String,
    /// The logical filter name, derived from the last URL path segment.
    pub name: String,
    pub version: Option<VersionSpec>,
}

/// Parses `<url>` or `<url>==<version>` into an [`InstallSpec`].
pub fn parse_install_spec(spec: &str) -> Result<InstallSpec> {
    let (url, version) = match spec.split_once("==") {
        Some((url, version)) => (url, Some(VersionSpec::parse(version)?)),
        None => (spec, None),
    };
    if url.is_empty() {
        bail!("Empty repository URL in install specifier '{}'.", spec);
    }
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|segment| segment.trim_end_matches(".git"))
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| anyhow!("Could not derive a filter name from the URL '{}'.", url))?;
    Ok(InstallSpec {
        url: url.to_string(),
        name: name.to_string(),
        version,
    })
}

// --- Resolution ---

/// What a version specifier resolved to: the revision to check out (none
/// means the default branch head) and the version string written back into
/// the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    pub checkout: Option<String>,
    pub persisted: String,
}

/// Resolves a version specifier against the remote's tag listing.
///
/// `HEAD` and `latest` stay literal in the persisted configuration so later
/// installs and updates re-resolve them; explicit versions and hashes are
/// pinned verbatim. An omitted specifier pins the highest tag found, or
/// `HEAD` when the remote has no version tags at all.
pub fn resolve_version(url: &str, spec: Option<&VersionSpec>) -> Result<ResolvedVersion> {
    let needs_tags = matches!(spec, None | Some(VersionSpec::Latest) | Some(VersionSpec::Semver(_)));
    let tags = if needs_tags {
        list_remote_tags(url)?
    } else {
        Vec::new()
    };
    resolve_from_tags(spec, &tags)
}

fn resolve_from_tags(
    spec: Option<&VersionSpec>,
    tags: &[(SemVer, String)],
) -> Result<ResolvedVersion> {
    match spec {
        Some(VersionSpec::Head) => Ok(ResolvedVersion {
            checkout: None,
            persisted: "HEAD".to_string(),
        }),
        Some(VersionSpec::Hash(hash)) => Ok(ResolvedVersion {
            checkout: Some(hash.clone()),
            persisted: hash.clone(),
        }),
        Some(VersionSpec::Latest) => Ok(match pick_latest_tag(tags) {
            Some((_, refname)) => ResolvedVersion {
                checkout: Some(refname.clone()),
                persisted: "latest".to_string(),
            },
            // No version tags: latest degrades to tracking the head.
            None => ResolvedVersion {
                checkout: None,
                persisted: "latest".to_string(),
            },
        }),
        Some(VersionSpec::Semver(wanted)) => {
            let (_, refname) = tags
                .iter()
                .find(|(version, _)| version == wanted)
                .ok_or_else(|| anyhow!("Version '{}' was not found on the remote.", wanted))?;
            Ok(ResolvedVersion {
                checkout: Some(refname.clone()),
                persisted: wanted.to_string(),
            })
        }
        None => Ok(match pick_latest_tag(tags) {
            Some((version, refname)) => ResolvedVersion {
                checkout: Some(refname.clone()),
                persisted: version.to_string(),
            },
            None => ResolvedVersion {
                checkout: None,
                persisted: "HEAD".to_string(),
            },
        }),
    }
}

fn pick_latest_tag(tags: &[(SemVer, String)]) -> Option<&(SemVer, String)> {
    tags.iter().max_by_key(|(version, _)| *version)
}

/// Lists the remote's version tags as (parsed version, tag name) pairs.
/// Tags that do not parse as semantic versions are ignored.
fn list_remote_tags(url: &str) -> Result<Vec<(SemVer, String)>> {
    let output = executor::run_captured("git", &["ls-remote", "--tags", "--refs", url], None)
        .with_context(|| format!("Could not list version tags of '{}'.", url))?;
    Ok(parse_tag_listing(&output))
}

fn parse_tag_listing(listing: &str) -> Vec<(SemVer, String)> {
    listing
        .lines()
        .filter_map(|line| {
            let refname = line.split('\t').nth(1)?.strip_prefix("refs/tags/")?;
            let version = SemVer::parse(refname.strip_prefix('v').unwrap_or(refname))?;
            Some((version, refname.to_string()))
        })
        .collect()
}

// --- Installation ---

/// Whether the git executable is available. A missing git is a warning at
/// command start, not a hard failure: only operations that actually contact
/// a remote will fail later.
pub fn has_git() -> bool {
    executor::probe("git", &["--version"])
}

pub fn filter_cache_path(cache_root: &Path, name: &str) -> PathBuf {
    cache_root.join(FILTER_CACHE_DIR).join(name)
}

/// Fetches a remote filter payload into the cache directory keyed by its
/// name. An existing cache entry is left untouched unless `force` is set,
/// which makes repeated installation of the same (name, version) pair a
/// no-op. Returns whether anything was downloaded.
pub fn download_filter(
    url: &str,
    name: &str,
    checkout: Option<&str>,
    cache_root: &Path,
    force: bool,
) -> Result<bool> {
    let target = filter_cache_path(cache_root, name);
    if target.exists() {
        if !force {
            log::debug!("Filter '{}' is already cached, skipping download.", name);
            return Ok(false);
        }
        fs::remove_dir_all(&target).with_context(|| {
            format!("Could not clear the cached filter '{}'.", target.display())
        })?;
    }
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Could not create the filter cache directory '{}'.", parent.display())
        })?;
    }

    let target_str = target.to_string_lossy().into_owned();
    executor::run_captured("git", &["clone", url, &target_str], None)
        .with_context(|| format!("Could not download filter '{}' from '{}'.", name, url))?;
    if let Some(revision) = checkout {
        executor::run_captured("git", &["checkout", revision], Some(&target))
            .with_context(|| {
                format!("Could not check out '{}' for filter '{}'.", revision, name)
            })?;
    }
    // The payload is a snapshot, not a working copy.
    let git_dir = target.join(".git");
    if git_dir.exists() {
        fs::remove_dir_all(&git_dir).with_context(|| {
            format!("Could not trim the repository metadata of filter '{}'.", name)
        })?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_spec_without_version_derives_the_name() {
        let spec = parse_install_spec("github.com/org/name-ninja").unwrap();
        assert_eq!(spec.url, "github.com/org/name-ninja");
        assert_eq!(spec.name, "name-ninja");
        assert_eq!(spec.version, None);
    }

    #[test]
    fn install_spec_strips_a_git_suffix_from_the_name() {
        let spec = parse_install_spec("https://github.com/org/texel.git==1.2.3").unwrap();
        assert_eq!(spec.name, "texel");
        assert_eq!(
            spec.version,
            Some(VersionSpec::Semver(SemVer {
                major: 1,
                minor: 2,
                patch: 3
            }))
        );
    }

    #[test]
    fn version_specifier_grammar_covers_all_forms() {
        assert_eq!(VersionSpec::parse("HEAD").unwrap(), VersionSpec::Head);
        assert_eq!(VersionSpec::parse("latest").unwrap(), VersionSpec::Latest);
        let hash = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(
            VersionSpec::parse(hash).unwrap(),
            VersionSpec::Hash(hash.to_string())
        );
        assert!(matches!(
            VersionSpec::parse("2.0.1").unwrap(),
            VersionSpec::Semver(_)
        ));
        assert!(VersionSpec::parse("not-a-version").is_err());
        // A short hex string is not a commit hash.
        assert!(VersionSpec::parse("abc123").is_err());
    }

    fn tags(entries: &[(&str, &str)]) -> Vec<(SemVer, String)> {
        entries
            .iter()
            .map(|(v, name)| (SemVer::parse(v).unwrap(), name.to_string()))
            .collect()
    }

    #[test]
    fn omitted_version_pins_the_highest_tag() {
        let tags = tags(&[("1.0.0", "v1.0.0"), ("1.10.0", "v1.10.0"), ("1.2.0", "v1.2.0")]);
        let resolved = resolve_from_tags(None, &tags).unwrap();
        assert_eq!(resolved.checkout.as_deref(), Some("v1.10.0"));
        assert_eq!(resolved.persisted, "1.10.0");
    }

    #[test]
    fn omitted_version_falls_back_to_head_without_tags() {
        let resolved = resolve_from_tags(None, &[]).unwrap();
        assert_eq!(resolved.checkout, None);
        assert_eq!(resolved.persisted, "HEAD");
    }

    #[test]
    fn latest_stays_literal_and_follows_the_highest_tag() {
        let tags = tags(&[("0.9.0", "0.9.0"), ("2.0.0", "2.0.0")]);
        let resolved = resolve_from_tags(Some(&VersionSpec::Latest), &tags).unwrap();
        assert_eq!(resolved.checkout.as_deref(), Some("2.0.0"));
        assert_eq!(resolved.persisted, "latest");

        // And degrades to head semantics when the remote has no tags.
        let resolved = resolve_from_tags(Some(&VersionSpec::Latest), &[]).unwrap();
        assert_eq!(resolved.checkout, None);
        assert_eq!(resolved.persisted, "latest");
    }

    #[test]
    fn explicit_version_must_exist_on_the_remote() {
        let tags = tags(&[("1.0.0", "v1.0.0")]);
        let wanted = VersionSpec::Semver(SemVer::parse("2.0.0").unwrap());
        let err = resolve_from_tags(Some(&wanted), &tags).unwrap_err();
        assert!(err.to_string().contains("2.0.0"));

        let wanted = VersionSpec::Semver(SemVer::parse("1.0.0").unwrap());
        let resolved = resolve_from_tags(Some(&wanted), &tags).unwrap();
        assert_eq!(resolved.checkout.as_deref(), Some("v1.0.0"));
        assert_eq!(resolved.persisted, "1.0.0");
    }

    #[test]
    fn tag_listing_parser_skips_non_version_tags() {
        let listing = "\
0000000000000000000000000000000000000001\trefs/tags/v1.0.0\n\
0000000000000000000000000000000000000002\trefs/tags/nightly\n\
0000000000000000000000000000000000000003\trefs/tags/2.1.0\n";
        let tags = parse_tag_listing(listing);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].1, "v1.0.0");
        assert_eq!(tags[1].1, "2.1.0");
    }
}
