//! Directory integration configuration.
//!
//! Configuration comes from the process environment, from a JSON file holding a
//! `directory` (or legacy `ad`) section, or from both, with the file taking
//! precedence. An absent URL or an empty scope list is not an error: it turns the
//! integration off and every operation answers "not available".
//!
//! # Example
//!
//! ```rust
//! use directory_identity::config::DirectoryConfig;
//!
//! let config = DirectoryConfig::new(
//!     "ldap://dc1.corp.example:389",
//!     "DC=corp,DC=example",
//!     "OU=Sales,DC=corp,DC=example|OU=Eng,DC=corp,DC=example",
//! )
//! .with_bind_credentials("CN=svc-directory,OU=Service,DC=corp,DC=example", "s3cret");
//!
//! assert!(config.is_enabled());
//! assert_eq!(config.scopes.len(), 2);
//! assert_eq!(config.principal_suffix().as_deref(), Some("corp.example"));
//! ```

use crate::error::ConfigurationError;
use crate::filter;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder substituted with the username in filter templates.
pub const USERNAME_PLACEHOLDER: &str = "%(user)s";

/// Filter template used when none is configured.
pub const DEFAULT_FILTER_TEMPLATE: &str = "(sAMAccountName=%(user)s)";

/// Separator between scopes in the configured scope list.
pub const SCOPE_SEPARATOR: char = '|';

const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Attributes requested when no attribute list is configured.
pub fn default_attribute_list() -> Vec<String> {
    [
        "cn",
        "sn",
        "givenName",
        "mail",
        "telephoneNumber",
        "department",
        "title",
        "manager",
        "distinguishedName",
        "samaccountname",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_filter_template() -> String {
    DEFAULT_FILTER_TEMPLATE.to_string()
}

fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

fn default_sync_interval_secs() -> u64 {
    DEFAULT_SYNC_INTERVAL_SECS
}

/// Ordered set of organizational scopes used as the allow-list boundary.
///
/// Parsed from a `|`-delimited list; entries are trimmed and empty entries dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub struct ScopeConfiguration {
    scopes: Vec<String>,
}

impl ScopeConfiguration {
    /// Parse a `|`-delimited scope list.
    pub fn parse(raw: &str) -> Self {
        let scopes = raw
            .split(SCOPE_SEPARATOR)
            .map(str::trim)
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect();
        Self { scopes }
    }

    /// Build from already separated scope strings.
    pub fn from_scopes<I, S>(scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let scopes = scopes
            .into_iter()
            .map(Into::into)
            .map(|scope: String| scope.trim().to_string())
            .filter(|scope| !scope.is_empty())
            .collect();
        Self { scopes }
    }

    /// The configured scopes in order.
    pub fn as_slice(&self) -> &[String] {
        &self.scopes
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }
}

impl From<String> for ScopeConfiguration {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<&str> for ScopeConfiguration {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for ScopeConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.scopes.join("|"))
    }
}

/// Directory attribute feeding each identity field.
///
/// Defaults follow Active Directory naming. Lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeMap {
    pub account_id: String,
    pub principal_name: String,
    pub display_name: String,
    pub given_name: String,
    pub surname: String,
    pub email: String,
    pub phone: String,
    pub department: String,
    pub title: String,
    pub manager_ref: String,
    pub directory_path: String,
}

impl Default for AttributeMap {
    fn default() -> Self {
        Self {
            account_id: "sAMAccountName".to_string(),
            principal_name: "userPrincipalName".to_string(),
            display_name: "cn".to_string(),
            given_name: "givenName".to_string(),
            surname: "sn".to_string(),
            email: "mail".to_string(),
            phone: "telephoneNumber".to_string(),
            department: "department".to_string(),
            title: "title".to_string(),
            manager_ref: "manager".to_string(),
            directory_path: "distinguishedName".to_string(),
        }
    }
}

/// Complete directory integration configuration.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryConfig {
    /// Directory endpoint, e.g. `ldap://dc1.corp.example:389`
    #[serde(default)]
    pub url: String,
    /// Full-domain search root
    #[serde(default, alias = "baseDN")]
    pub base_root: String,
    /// Service account used for the shared connection
    #[serde(default, alias = "username")]
    pub bind_identity: String,
    #[serde(default, alias = "password")]
    pub bind_secret: String,
    /// Organizational scopes allowed to authenticate and be surfaced
    #[serde(default, alias = "searchBase")]
    pub scopes: ScopeConfiguration,
    /// User lookup filter with a single `%(user)s` placeholder
    #[serde(default = "default_filter_template", alias = "searchFilter")]
    pub filter_template: String,
    /// Attributes requested for profile lookups
    #[serde(default = "default_attribute_list", alias = "attributes")]
    pub attribute_list: Vec<String>,
    /// Domain suffix appended to short account names to form a bind principal
    #[serde(default)]
    pub principal_suffix: Option<String>,
    /// Per-operation timeout; zero disables it
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,
    #[serde(default)]
    pub attribute_map: AttributeMap,
}

impl DirectoryConfig {
    /// Create a configuration with defaults for everything but the endpoint,
    /// search root and scope list.
    pub fn new(
        url: impl Into<String>,
        base_root: impl Into<String>,
        scopes: impl Into<ScopeConfiguration>,
    ) -> Self {
        Self {
            url: url.into(),
            base_root: base_root.into(),
            bind_identity: String::new(),
            bind_secret: String::new(),
            scopes: scopes.into(),
            filter_template: default_filter_template(),
            attribute_list: default_attribute_list(),
            principal_suffix: None,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            sync_interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            attribute_map: AttributeMap::default(),
        }
    }

    /// A configuration with the integration turned off.
    pub fn disabled() -> Self {
        Self::new("", "", ScopeConfiguration::default())
    }

    pub fn with_bind_credentials(
        mut self,
        identity: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.bind_identity = identity.into();
        self.bind_secret = secret.into();
        self
    }

    pub fn with_filter_template(mut self, template: impl Into<String>) -> Self {
        self.filter_template = template.into();
        self
    }

    pub fn with_attribute_list<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute_list = attributes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_principal_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.principal_suffix = Some(suffix.into());
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_secs = timeout.as_secs();
        self
    }

    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval_secs = interval.as_secs();
        self
    }

    pub fn with_attribute_map(mut self, attribute_map: AttributeMap) -> Self {
        self.attribute_map = attribute_map;
        self
    }

    /// Whether directory integration is turned on.
    pub fn is_enabled(&self) -> bool {
        !self.url.trim().is_empty() && !self.scopes.is_empty()
    }

    /// Build the user lookup filter for `username`.
    pub fn user_filter(&self, username: &str) -> String {
        filter::user_filter(&self.filter_template, username)
    }

    /// Attributes requested for user lookups: the configured list plus every
    /// attribute an identity field is read from.
    pub fn lookup_attributes(&self) -> Vec<String> {
        let map = &self.attribute_map;
        let mut attributes = self.attribute_list.clone();
        for name in [
            &map.account_id,
            &map.principal_name,
            &map.display_name,
            &map.given_name,
            &map.surname,
            &map.email,
            &map.phone,
            &map.department,
            &map.title,
            &map.manager_ref,
            &map.directory_path,
        ] {
            if !attributes.iter().any(|a| a.eq_ignore_ascii_case(name)) {
                attributes.push(name.clone());
            }
        }
        attributes
    }

    /// Suffix used to turn a short account name into a bind principal.
    ///
    /// Falls back to the `DC=` components of the search root.
    pub fn principal_suffix(&self) -> Option<String> {
        match &self.principal_suffix {
            Some(suffix) if !suffix.trim().is_empty() => {
                Some(suffix.trim().trim_start_matches('@').to_string())
            }
            _ => domain_from_base_root(&self.base_root),
        }
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        match self.operation_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs.max(1))
    }

    /// Check an enabled configuration for values that would break every lookup.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.is_enabled() {
            return Ok(());
        }

        if !self.filter_template.contains(USERNAME_PLACEHOLDER) {
            return Err(ConfigurationError::Invalid {
                message: format!(
                    "filter template '{}' has no {} placeholder",
                    self.filter_template, USERNAME_PLACEHOLDER
                ),
            });
        }

        if !self.url.contains("://") {
            return Err(ConfigurationError::Invalid {
                message: format!("directory url '{}' has no scheme", self.url),
            });
        }

        Ok(())
    }

    /// Read configuration from the process environment.
    ///
    /// Returns `None` when no directory URL is set.
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |primary: &str, legacy: &str| {
            lookup(primary)
                .or_else(|| lookup(legacy))
                .filter(|value| !value.is_empty())
        };

        let url = var("DIRECTORY_URL", "AD_URL")?;
        let mut config = Self::new(
            url,
            var("DIRECTORY_BASE_ROOT", "AD_BASE_DN").unwrap_or_default(),
            ScopeConfiguration::parse(
                &var("DIRECTORY_SCOPES", "AD_SEARCH_BASE").unwrap_or_default(),
            ),
        )
        .with_bind_credentials(
            var("DIRECTORY_BIND_IDENTITY", "AD_USERNAME").unwrap_or_default(),
            var("DIRECTORY_BIND_SECRET", "AD_PASSWORD").unwrap_or_default(),
        );

        if let Some(template) = var("DIRECTORY_FILTER_TEMPLATE", "AD_SEARCH_FILTER") {
            config.filter_template = template;
        }

        Some(config)
    }

    /// Read configuration from a JSON file with a `directory` or `ad` section.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let document: Value = serde_json::from_str(&content)?;
        let section = document
            .get("directory")
            .or_else(|| document.get("ad"))
            .filter(|section| section.is_object())
            .cloned()
            .ok_or_else(|| ConfigurationError::MissingSection {
                path: path.to_path_buf(),
            })?;

        let config: DirectoryConfig = serde_json::from_value(section)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve configuration from the environment, overridden by the first
    /// candidate file that holds a directory section.
    ///
    /// Unreadable or malformed candidates are logged and skipped.
    pub fn discover<P: AsRef<Path>>(candidates: &[P]) -> Option<Self> {
        let mut config = Self::from_env();
        if config.is_some() {
            debug!("Directory configuration found in environment");
        }

        for candidate in candidates {
            let path = candidate.as_ref();
            if !path.exists() {
                continue;
            }

            match Self::from_file(path) {
                Ok(file_config) => {
                    info!("Loaded directory configuration from {}", path.display());
                    config = Some(file_config);
                    break;
                }
                Err(ConfigurationError::MissingSection { .. }) => {
                    debug!("{} has no directory section, skipping", path.display());
                }
                Err(e) => {
                    warn!("Skipping directory configuration {}: {}", path.display(), e);
                }
            }
        }

        config
    }

    /// Default candidate files next to `dir`.
    pub fn default_candidates(dir: impl AsRef<Path>) -> Vec<PathBuf> {
        let dir = dir.as_ref();
        vec![dir.join(".config"), dir.join(".ad.config")]
    }
}

impl fmt::Debug for DirectoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectoryConfig")
            .field("url", &self.url)
            .field("base_root", &self.base_root)
            .field("bind_identity", &self.bind_identity)
            .field("bind_secret", &"<redacted>")
            .field("scopes", &self.scopes)
            .field("filter_template", &self.filter_template)
            .field("attribute_list", &self.attribute_list)
            .field("principal_suffix", &self.principal_suffix)
            .field("operation_timeout_secs", &self.operation_timeout_secs)
            .field("sync_interval_secs", &self.sync_interval_secs)
            .finish()
    }
}

/// `DC=corp,DC=example` → `corp.example`.
fn domain_from_base_root(base_root: &str) -> Option<String> {
    let labels: Vec<&str> = base_root
        .split(',')
        .filter_map(|component| {
            let (attr, value) = component.split_once('=')?;
            attr.trim()
                .eq_ignore_ascii_case("dc")
                .then(|| value.trim())
        })
        .filter(|label| !label.is_empty())
        .collect();

    if labels.is_empty() {
        None
    } else {
        Some(labels.join("."))
    }
}
