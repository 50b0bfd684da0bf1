//! Version descriptor record

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::version::error::FormatError;

/// Version of a destination where nothing has been installed yet
pub const NONE_VERSION: &str = "0.0.0";

/// Where the artifact for a version can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DownloadReference {
    /// One artifact shared by every platform
    Url(String),
    /// One artifact per platform, keyed by platform name
    PerPlatform(IndexMap<String, String>),
}

impl Default for DownloadReference {
    fn default() -> Self {
        Self::Url(String::new())
    }
}

impl DownloadReference {
    /// Resolve the artifact URL for `platform`
    ///
    /// A plain URL applies to every platform. Platform keys are matched
    /// case-insensitively. Empty URLs resolve to `None`.
    pub fn resolve(&self, platform: &str) -> Option<&str> {
        let url = match self {
            Self::Url(url) => url.as_str(),
            Self::PerPlatform(urls) => urls
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(platform))
                .map(|(_, url)| url.as_str())?,
        };
        (!url.is_empty()).then_some(url)
    }
}

/// One version descriptor: version, artifact location and expected libraries
///
/// Two records are equal when their version strings are identical; the download
/// reference and library names do not take part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VersionDescriptor", into = "VersionDescriptor")]
pub struct VersionRecord {
    version: String,
    components: Vec<u64>,
    download_reference: DownloadReference,
    library_names: BTreeSet<String>,
}

/// Wire shape shared by the online descriptor and the installed version file
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VersionDescriptor {
    version: String,
    #[serde(rename = "file2DownloadUrl", default)]
    file_to_download_url: DownloadReference,
    #[serde(rename = "librariesNames", default)]
    libraries_names: Vec<String>,
}

impl VersionRecord {
    pub fn new<I, S>(
        version: impl Into<String>,
        download_reference: DownloadReference,
        library_names: I,
    ) -> Result<Self, FormatError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let version = version.into();
        let components = parse_components(&version)?;
        Ok(Self {
            version,
            components,
            download_reference,
            library_names: library_names.into_iter().map(Into::into).collect(),
        })
    }

    /// Record with only a version, no artifact and no libraries
    pub fn parse(version: &str) -> Result<Self, FormatError> {
        Self::new(version, DownloadReference::default(), Vec::<String>::new())
    }

    /// Record describing an empty installation
    pub fn none() -> Self {
        Self {
            version: NONE_VERSION.to_string(),
            components: vec![0, 0, 0],
            download_reference: DownloadReference::default(),
            library_names: BTreeSet::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn download_reference(&self) -> &DownloadReference {
        &self.download_reference
    }

    pub fn library_names(&self) -> &BTreeSet<String> {
        &self.library_names
    }

    /// Same version and artifact, with a different set of libraries
    pub fn with_library_names<I, S>(&self, library_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            version: self.version.clone(),
            components: self.components.clone(),
            download_reference: self.download_reference.clone(),
            library_names: library_names.into_iter().map(Into::into).collect(),
        }
    }

    /// Three-way comparison of two records
    ///
    /// Identical version strings compare `Equal`. Otherwise the components are
    /// compared pairwise up to the length of the shorter version and the first
    /// difference decides. Trailing components are never looked at, so `1.2` and
    /// `1.2.0` compare `Equal` even though the records are not `==`.
    pub fn compare(&self, other: &Self) -> Ordering {
        if self.version == other.version {
            return Ordering::Equal;
        }
        self.components
            .iter()
            .zip(&other.components)
            .map(|(a, b)| a.cmp(b))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Greater
    }
}

impl PartialEq for VersionRecord {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
    }
}

impl Eq for VersionRecord {}

impl fmt::Display for VersionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.version)
    }
}

impl TryFrom<VersionDescriptor> for VersionRecord {
    type Error = FormatError;

    fn try_from(descriptor: VersionDescriptor) -> Result<Self, Self::Error> {
        Self::new(
            descriptor.version,
            descriptor.file_to_download_url,
            descriptor.libraries_names,
        )
    }
}

impl From<VersionRecord> for VersionDescriptor {
    fn from(record: VersionRecord) -> Self {
        Self {
            version: record.version,
            file_to_download_url: record.download_reference,
            libraries_names: record.library_names.into_iter().collect(),
        }
    }
}

fn parse_components(version: &str) -> Result<Vec<u64>, FormatError> {
    let bad_format = || FormatError {
        version: version.to_string(),
    };
    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(bad_format());
            }
            part.parse::<u64>().map_err(|_| bad_format())
        })
        .collect()
}
