//! Target registry: which models to broadcast to, and with what credentials.
//!
//! A [`Target`] is one configured destination (provider kind + model id +
//! credential reference). Targets come from a [`TargetStore`] and are cached
//! as an immutable snapshot inside [`TargetRegistry`]; [`invalidate`] drops
//! the snapshot so the next read reloads. Credential references are resolved
//! through a [`CredentialSource`] at dispatch time, never at load time, so a
//! key added to the environment takes effect without a reload.
//!
//! The registry owns no global state. Two registries over different stores
//! can coexist in one process.
//!
//! [`invalidate`]: TargetRegistry::invalidate

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;

use crate::error::{DispatchError, DispatchResult};
use crate::logging::{log_debug, log_info, log_warn};

/// Opaque identifier for a target, unique within a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub i64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which wire dialect a target speaks.
///
/// Stored target records carry a free-form kind string; [`from_store_kind`]
/// maps it here. Unrecognized strings fall back to [`Gateway`], the most
/// permissive dialect, so one mistyped row degrades a single target instead
/// of failing the snapshot.
///
/// [`from_store_kind`]: ProviderKind::from_store_kind
/// [`Gateway`]: ProviderKind::Gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// An OpenAI-compatible aggregator (OpenRouter) that fronts many
    /// models and expects attribution headers.
    Gateway,
    /// OpenAI's own chat completions endpoint.
    OpenAi,
    /// Anthropic's native messages endpoint.
    Anthropic,
    /// DeepSeek's OpenAI-compatible endpoint.
    DeepSeek,
    /// Groq's OpenAI-compatible endpoint.
    Groq,
}

impl ProviderKind {
    /// Maps a stored kind string to a variant. Matching is case-insensitive
    /// and ignores surrounding whitespace; unknown values log a warning and
    /// fall back to [`ProviderKind::Gateway`].
    pub fn from_store_kind(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "openrouter" => Self::Gateway,
            "openai" => Self::OpenAi,
            "anthropic" => Self::Anthropic,
            "deepseek" => Self::DeepSeek,
            "groq" => Self::Groq,
            other => {
                log_warn!(
                    kind = %other,
                    "Unknown provider kind in target store, treating as gateway"
                );
                Self::Gateway
            }
        }
    }

    /// Canonical store spelling of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gateway => "openrouter",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::DeepSeek => "deepseek",
            Self::Groq => "groq",
        }
    }

    /// Endpoint used when the target record does not override one.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gateway => "https://openrouter.ai/api/v1/chat/completions",
            Self::OpenAi => "https://api.openai.com/v1/chat/completions",
            Self::Anthropic => "https://api.anthropic.com/v1/messages",
            Self::DeepSeek => "https://api.deepseek.com/chat/completions",
            Self::Groq => "https://api.groq.com/openai/v1/chat/completions",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw target row as a [`TargetStore`] produces it.
///
/// `kind` stays a plain string at this layer; the registry maps it to a
/// [`ProviderKind`] while building a snapshot.
#[derive(Debug, Clone)]
pub struct TargetRecord {
    pub id: i64,
    /// API model string as the provider expects it, e.g. `openai/gpt-4`.
    /// Doubles as the target's unique name.
    pub name: String,
    pub kind: String,
    /// Explicit endpoint override; `None` uses the kind's default.
    pub endpoint: Option<String>,
    /// Where to find the API key, typically an environment variable name.
    pub credential_ref: String,
    pub active: bool,
}

/// One validated broadcast destination.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: TargetId,
    /// API model string, also the unique name. Goes on the wire verbatim.
    pub name: String,
    pub kind: ProviderKind,
    pub endpoint: Option<String>,
    pub credential_ref: String,
    pub active: bool,
}

impl Target {
    /// Endpoint this target actually talks to.
    pub fn endpoint_url(&self) -> &str {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.kind.default_endpoint())
    }

    /// Human-facing label derived from the API name: the provider prefix is
    /// stripped and known model families get their customary casing, so
    /// `openai/gpt-3.5-turbo` shows as `GPT-3.5 Turbo` and
    /// `anthropic/claude-3.5-sonnet` as `Claude 3.5 Sonnet`. Names without a
    /// provider prefix are returned unchanged.
    pub fn display_name(&self) -> String {
        let Some((_, model_name)) = self.name.split_once('/') else {
            return self.name.clone();
        };

        if let Some(rest) = model_name.strip_prefix("gpt-") {
            let mut parts = rest.split('-');
            let version = parts.next().unwrap_or(rest);
            let tail: Vec<String> = parts.map(capitalize_word).collect();
            if tail.is_empty() {
                format!("GPT-{version}")
            } else {
                format!("GPT-{} {}", version.to_uppercase(), tail.join(" "))
            }
        } else if let Some(rest) = model_name.strip_prefix("claude-") {
            format!("Claude {}", title_case(&rest.replace('-', " ")))
        } else {
            title_case(&model_name.replace('-', " "))
        }
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of a credential dry-run for one target. See
/// [`TargetRegistry::validate_credentials`].
#[derive(Debug, Clone)]
pub struct CredentialCheck {
    pub target: Arc<Target>,
    /// Whether the credential reference resolved to a non-blank value.
    pub present: bool,
}

/// Source of target records. Implementations wrap whatever persistence the
/// host application uses (an embedded database, a config file, a fixture).
#[async_trait]
pub trait TargetStore: Send + Sync {
    /// Loads every stored target, active or not.
    async fn load_targets(&self) -> DispatchResult<Vec<TargetRecord>>;
}

/// Resolves credential references to secret values.
///
/// Resolution must be cheap and side-effect free: the registry calls it on
/// every dispatch and during validation sweeps.
pub trait CredentialSource: Send + Sync {
    /// Returns the secret for `reference`, or `None` when it is not set.
    /// Callers treat blank values as absent.
    fn resolve(&self, reference: &str) -> Option<String>;
}

/// [`CredentialSource`] backed by process environment variables.
#[derive(Debug, Default)]
pub struct EnvCredentialSource;

impl EnvCredentialSource {
    pub fn new() -> Self {
        Self
    }

    /// Loads a `.env` file from the working directory (if one exists) into
    /// the process environment, then returns the source. Missing files are
    /// fine; existing process variables win over file entries. The file is
    /// read once per process, later calls reuse that load.
    pub fn from_dotenv() -> Self {
        static DOTENV: Lazy<()> = Lazy::new(|| match dotenvy::dotenv() {
            Ok(path) => log_info!(path = %path.display(), "Loaded .env file"),
            Err(_) => log_debug!("No .env file found, using process environment only"),
        });
        Lazy::force(&DOTENV);
        Self
    }
}

impl CredentialSource for EnvCredentialSource {
    fn resolve(&self, reference: &str) -> Option<String> {
        std::env::var(reference).ok()
    }
}

/// Cached view over a [`TargetStore`] plus credential resolution.
///
/// The first read after construction (or after [`invalidate`]) loads a
/// snapshot from the store, verifies id and name uniqueness, and keeps it
/// until explicitly invalidated. All reads between invalidations observe the
/// same snapshot.
///
/// [`invalidate`]: TargetRegistry::invalidate
pub struct TargetRegistry {
    store: Arc<dyn TargetStore>,
    credentials: Arc<dyn CredentialSource>,
    cache: RwLock<Option<Arc<Vec<Arc<Target>>>>>,
}

impl TargetRegistry {
    pub fn new(store: Arc<dyn TargetStore>, credentials: Arc<dyn CredentialSource>) -> Self {
        Self {
            store,
            credentials,
            cache: RwLock::new(None),
        }
    }

    /// Targets in store order. With `active_only` set, inactive targets are
    /// filtered out.
    pub async fn list(&self, active_only: bool) -> DispatchResult<Vec<Arc<Target>>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot
            .iter()
            .filter(|t| !active_only || t.active)
            .cloned()
            .collect())
    }

    /// Looks a target up by id, active or not.
    pub async fn get_by_id(&self, id: TargetId) -> DispatchResult<Option<Arc<Target>>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.iter().find(|t| t.id == id).cloned())
    }

    /// Looks a target up by exact stored name, active or not.
    pub async fn get_by_name(&self, name: &str) -> DispatchResult<Option<Arc<Target>>> {
        let snapshot = self.snapshot().await?;
        Ok(snapshot.iter().find(|t| t.name == name).cloned())
    }

    /// Drops the cached snapshot. The next read reloads from the store.
    pub fn invalidate(&self) {
        let mut guard = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if guard.take().is_some() {
            log_debug!("Target snapshot invalidated");
        }
    }

    /// Dry-runs credential resolution for the given targets without any
    /// network traffic. Each distinct credential reference is resolved once
    /// and the verdict shared across targets that use it.
    pub fn validate_credentials(&self, targets: &[Arc<Target>]) -> Vec<CredentialCheck> {
        let mut verdicts: Vec<(String, bool)> = Vec::new();
        let mut checks = Vec::with_capacity(targets.len());
        for target in targets {
            let present = match verdicts
                .iter()
                .find(|(reference, _)| *reference == target.credential_ref)
            {
                Some((_, present)) => *present,
                None => {
                    let present = self.credential_for(target).is_some();
                    verdicts.push((target.credential_ref.clone(), present));
                    present
                }
            };
            checks.push(CredentialCheck {
                target: Arc::clone(target),
                present,
            });
        }
        let missing = checks.iter().filter(|c| !c.present).count();
        log_info!(
            checked = checks.len(),
            missing = missing,
            "Credential validation sweep complete"
        );
        checks
    }

    /// Resolves the target's credential right now. The value comes back
    /// trimmed; blank values count as missing.
    pub fn credential_for(&self, target: &Target) -> Option<String> {
        self.credentials
            .resolve(&target.credential_ref)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    /// Returns the cached snapshot, loading it from the store first if
    /// needed.
    async fn snapshot(&self) -> DispatchResult<Arc<Vec<Arc<Target>>>> {
        {
            let guard = match self.cache.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(snapshot) = guard.as_ref() {
                return Ok(Arc::clone(snapshot));
            }
        }

        // Load outside the lock; concurrent first readers may both hit the
        // store, and the later write simply wins with an equivalent snapshot.
        let records = self.store.load_targets().await?;
        let snapshot = Arc::new(build_snapshot(records)?);
        log_info!(targets = snapshot.len(), "Target snapshot loaded");

        let mut guard = match self.cache.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }
}

/// Converts store records into targets, rejecting the whole batch when two
/// records collide on id or on (non-blank) name.
fn build_snapshot(records: Vec<TargetRecord>) -> DispatchResult<Vec<Arc<Target>>> {
    let mut seen_ids: HashSet<i64> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();
    let mut targets = Vec::with_capacity(records.len());

    for record in records {
        if !seen_ids.insert(record.id) {
            return Err(DispatchError::duplicate_target("id", record.id.to_string()));
        }
        if !seen_names.insert(record.name.clone()) {
            return Err(DispatchError::duplicate_target("name", record.name));
        }
        targets.push(Arc::new(Target {
            id: TargetId(record.id),
            name: record.name,
            kind: ProviderKind::from_store_kind(&record.kind),
            endpoint: record.endpoint,
            credential_ref: record.credential_ref,
            active: record.active,
        }));
    }

    Ok(targets)
}
