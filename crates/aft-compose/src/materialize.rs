//! Secret materialization
//!
//! Resolves the slots declared in a package's `secrets.yaml` against the
//! secret store and produces the `.env` file of the rendered service.
//!
//! Per slot, the first of these wins:
//! 1. a non-empty value already in the store
//! 2. the slot's `default`, written back to the store
//! 3. a generated value when `create` is set, written back to the store
//! 4. nothing: the slot resolves to an empty string and a warning is logged

use serde_json::{Map, Value as JsonValue, json};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::context::ExecutionContext;
use crate::error::{ComposeError, Result};
use crate::store::write_private;
use crate::tools::{SopsMode, sops};
use aft_core::{EnvFile, SecretGenerator, SecretMasker, SecretSlot, Values, load_declarations};

/// Where a slot's value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSource {
    Store,
    Default,
    Generated,
    Missing,
    /// The declaration lacks a path or a name
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotReport {
    /// Position in the declaration file
    pub index: usize,
    pub name: String,
    pub path: String,
    pub source: SlotSource,
    pub warning: Option<String>,
}

/// Result of processing a declaration file
#[derive(Debug, Clone, PartialEq)]
pub enum MaterializeOutcome {
    /// No declaration file; nothing to do
    NoSecretsFile,
    /// The declaration file is empty
    NoDeclarations,
    Resolved(MaterializeReport),
}

impl MaterializeOutcome {
    pub fn report(&self) -> Option<&MaterializeReport> {
        match self {
            MaterializeOutcome::Resolved(report) => Some(report),
            _ => None,
        }
    }
}

#[derive(Clone, PartialEq)]
pub struct MaterializeReport {
    pub slots: Vec<SlotReport>,
    pub env_file: PathBuf,
    /// The env file was (re)written by this run
    pub written: bool,
    /// The written env file was encrypted with sops
    pub encrypted: bool,
    secrets: Map<String, JsonValue>,
}

impl MaterializeReport {
    /// Slots that resolved from `source`
    pub fn count(&self, source: SlotSource) -> usize {
        self.slots.iter().filter(|s| s.source == source).count()
    }

    /// `{ "secrets": { NAME: value } }`, ready to merge into the context
    pub fn context_values(&self) -> Values {
        Values(json!({ "secrets": self.secrets }))
    }
}

impl fmt::Debug for MaterializeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MaterializeReport")
            .field("slots", &self.slots)
            .field("env_file", &self.env_file)
            .field("written", &self.written)
            .field("encrypted", &self.encrypted)
            .field("secrets", &self.secrets.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Resolve the declarations in `secrets_file` and write `env_file`
///
/// The env file is written only when absent or when `force` is set. Every
/// resolved value is registered with `masker`.
pub async fn materialize_secrets(
    ctx: &ExecutionContext,
    secrets_file: &Path,
    env_file: &Path,
    force: bool,
    generator: &mut SecretGenerator,
    masker: &mut SecretMasker,
) -> Result<MaterializeOutcome> {
    let slots = match load_declarations(secrets_file)? {
        None => {
            tracing::debug!(file = %secrets_file.display(), "no secrets file");
            return Ok(MaterializeOutcome::NoSecretsFile);
        }
        Some(slots) if slots.is_empty() => {
            tracing::debug!(file = %secrets_file.display(), "secrets file declares nothing");
            return Ok(MaterializeOutcome::NoDeclarations);
        }
        Some(slots) => slots,
    };

    let mut env = EnvFile::new();
    let mut secrets = Map::new();
    let mut reports = Vec::with_capacity(slots.len());

    for (index, slot) in slots.iter().enumerate() {
        if let Some(reason) = slot.invalid_reason() {
            tracing::warn!("secret slot {} {}, skipping", index, reason);
            reports.push(SlotReport {
                index,
                name: slot.name.clone(),
                path: slot.path.clone(),
                source: SlotSource::Skipped,
                warning: Some(format!("slot {} {}", index, reason)),
            });
            continue;
        }

        let (value, source, warning) = resolve_slot(ctx, slot, generator).await?;

        match value {
            Some(value) => {
                masker.add(value.as_str());
                env.push(slot.name.as_str(), value.as_str());
                secrets.insert(slot.name.clone(), JsonValue::String(value));
            }
            None => {
                secrets.insert(slot.name.clone(), JsonValue::String(String::new()));
            }
        }

        reports.push(SlotReport {
            index,
            name: slot.name.clone(),
            path: slot.path.clone(),
            source,
            warning,
        });
    }

    let mut report = MaterializeReport {
        slots: reports,
        env_file: env_file.to_path_buf(),
        written: false,
        encrypted: false,
        secrets,
    };

    if env_file.exists() && !force {
        tracing::debug!(file = %env_file.display(), "skip overwriting existing env file");
        return Ok(MaterializeOutcome::Resolved(report));
    }

    if let Some(parent) = env_file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ComposeError::io(parent, e))?;
    }
    write_private(env_file, env.render().as_bytes())
        .await
        .map_err(|e| ComposeError::io(env_file, e))?;
    report.written = true;

    if let Some(encryption) = ctx.encryption().await {
        sops(
            ctx.tools.as_ref(),
            SopsMode::Encrypt,
            env_file,
            &encryption.recipient,
            &encryption.key_file,
        )
        .await?;
        report.encrypted = true;
        tracing::info!(file = %env_file.display(), "env file encrypted with sops");
    }

    Ok(MaterializeOutcome::Resolved(report))
}

async fn resolve_slot(
    ctx: &ExecutionContext,
    slot: &SecretSlot,
    generator: &mut SecretGenerator,
) -> Result<(Option<String>, SlotSource, Option<String>)> {
    if let Some(stored) = ctx.store.get(&slot.path).await?.filter(|v| !v.is_empty()) {
        return Ok((Some(stored), SlotSource::Store, None));
    }

    if let Some(default) = slot.default.as_deref().filter(|v| !v.is_empty()) {
        ctx.store.set(&slot.path, default).await?;
        return Ok((Some(default.to_string()), SlotSource::Default, None));
    }

    if slot.create {
        let generated = generator.generate(slot.length(), slot.classes());
        let warning = generated.fell_back.then(|| {
            tracing::warn!(
                "secret {} disables every character class, using letters and digits",
                slot.name
            );
            format!("{} disables every character class", slot.name)
        });
        ctx.store.set(&slot.path, &generated.value).await?;
        return Ok((Some(generated.value), SlotSource::Generated, warning));
    }

    tracing::warn!(
        "secret {} using {} has no value and is not generated",
        slot.name,
        slot.path
    );
    Ok((
        None,
        SlotSource::Missing,
        Some(format!("{} has no value", slot.name)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemorySecretStore, SecretStore};
    use crate::tools::{MockToolRunner, SOPS};
    use aft_core::AftConfig;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        ctx: ExecutionContext,
        store: MemorySecretStore,
        tools: MockToolRunner,
        secrets_file: PathBuf,
        env_file: PathBuf,
    }

    fn fixture(declarations: Option<&str>) -> Fixture {
        let dir = TempDir::new().unwrap();
        let secrets_file = dir.path().join("secrets.yaml");
        if let Some(content) = declarations {
            std::fs::write(&secrets_file, content).unwrap();
        }

        let mut config = AftConfig::default();
        config.paths.data = dir.path().join("data");
        config.paths.config = dir.path().join("config");

        let store = MemorySecretStore::new();
        let tools = MockToolRunner::new();
        let ctx = ExecutionContext::new(config, Arc::new(store.clone()), Arc::new(tools.clone()));
        let env_file = dir.path().join("data/etc/aft/demo/.env");

        Fixture {
            _dir: dir,
            ctx,
            store,
            tools,
            secrets_file,
            env_file,
        }
    }

    async fn run(f: &Fixture, force: bool) -> (MaterializeOutcome, SecretMasker) {
        let mut masker = SecretMasker::new();
        let outcome = materialize_secrets(
            &f.ctx,
            &f.secrets_file,
            &f.env_file,
            force,
            &mut SecretGenerator::seeded(7),
            &mut masker,
        )
        .await
        .unwrap();
        (outcome, masker)
    }

    #[tokio::test]
    async fn test_no_secrets_file() {
        let f = fixture(None);
        let (outcome, _) = run(&f, false).await;

        assert_eq!(outcome, MaterializeOutcome::NoSecretsFile);
        assert!(!f.env_file.exists());
    }

    #[tokio::test]
    async fn test_empty_secrets_file() {
        let f = fixture(Some("\n"));
        let (outcome, _) = run(&f, false).await;

        assert_eq!(outcome, MaterializeOutcome::NoDeclarations);
    }

    #[tokio::test]
    async fn test_resolution_order() {
        let f = fixture(Some(
            r#"
- name: STORED
  path: demo/stored
  default: ignored
- name: DEFAULTED
  path: demo/defaulted
  default: fallback
- name: GENERATED
  path: demo/generated
  create: true
  length: 24
- name: ABSENT
  path: demo/absent
- name: NOPATH
"#,
        ));
        f.store.set("demo/stored", "from-store").await.unwrap();

        let (outcome, masker) = run(&f, false).await;
        let report = outcome.report().unwrap();

        let sources: Vec<_> = report.slots.iter().map(|s| s.source).collect();
        assert_eq!(
            sources,
            vec![
                SlotSource::Store,
                SlotSource::Default,
                SlotSource::Generated,
                SlotSource::Missing,
                SlotSource::Skipped,
            ]
        );

        let stored = f.store.snapshot().await;
        assert_eq!(stored["demo/defaulted"], "fallback");
        assert_eq!(stored["demo/generated"].len(), 24);
        assert!(!stored.contains_key("demo/absent"));

        let env = std::fs::read_to_string(&f.env_file).unwrap();
        let lines: Vec<_> = env.lines().collect();
        assert_eq!(lines[0], "STORED=\"from-store\"");
        assert_eq!(lines[1], "DEFAULTED=\"fallback\"");
        assert!(lines[2].starts_with("GENERATED="));
        assert_eq!(lines.len(), 3);

        let context = report.context_values();
        assert_eq!(context.get_str("secrets.STORED"), Some("from-store"));
        assert_eq!(
            context.get("secrets.ABSENT"),
            Some(&JsonValue::String(String::new()))
        );
        assert_eq!(masker.len(), 3);
        assert!(report.written);
        assert!(!report.encrypted);
    }

    #[tokio::test]
    async fn test_second_run_makes_no_writes() {
        let f = fixture(Some(
            "- name: DB\n  path: demo/db\n  create: true\n- name: API\n  path: demo/api\n  default: k\n",
        ));

        run(&f, false).await;
        let first = f.store.snapshot().await;
        let env_before = std::fs::read_to_string(&f.env_file).unwrap();
        f.store.reset_counts().await;

        let (outcome, _) = run(&f, false).await;

        assert_eq!(f.store.operation_counts().await.sets, 0);
        assert_eq!(f.store.snapshot().await, first);
        assert_eq!(std::fs::read_to_string(&f.env_file).unwrap(), env_before);
        assert!(!outcome.report().unwrap().written);
        assert_eq!(outcome.report().unwrap().count(SlotSource::Store), 2);
    }

    #[tokio::test]
    async fn test_quotes_switch_to_single_quotes() {
        let f = fixture(Some("- name: Q\n  path: demo/q\n  default: 'a\"b'\n"));
        run(&f, false).await;

        let env = std::fs::read_to_string(&f.env_file).unwrap();
        assert_eq!(env, "Q='a\"b'\n");
    }

    #[tokio::test]
    async fn test_all_classes_disabled_warns() {
        let f = fixture(Some(
            "- name: X\n  path: demo/x\n  create: true\n  length: 12\n  digits: false\n  symbols: false\n  uppercase: false\n  lowercase: false\n",
        ));
        let (outcome, _) = run(&f, false).await;
        let slot = &outcome.report().unwrap().slots[0];

        assert_eq!(slot.source, SlotSource::Generated);
        assert!(slot.warning.is_some());
        let value = f.store.get("demo/x").await.unwrap().unwrap();
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_encrypts_when_configured() {
        let mut f = fixture(Some("- name: A\n  path: demo/a\n  default: v\n"));
        f.ctx.config.sops.recipient = Some("age1abc".to_string());

        let (outcome, _) = run(&f, false).await;

        assert!(outcome.report().unwrap().encrypted);
        let commands = f.tools.commands().await;
        assert_eq!(commands.len(), 1);
        assert!(commands[0].starts_with("sops -e -i "));
    }

    #[tokio::test]
    async fn test_skips_encryption_without_sops() {
        let mut f = fixture(Some("- name: A\n  path: demo/a\n  default: v\n"));
        f.ctx.config.sops.recipient = Some("age1abc".to_string());
        f.tools.set_missing(SOPS).await;

        let (outcome, _) = run(&f, false).await;

        assert!(!outcome.report().unwrap().encrypted);
        assert!(f.tools.commands().await.is_empty());
    }

    #[test]
    fn test_debug_hides_values() {
        let mut secrets = Map::new();
        secrets.insert("DB".to_string(), JsonValue::String("hunter2".to_string()));
        let report = MaterializeReport {
            slots: Vec::new(),
            env_file: PathBuf::from(".env"),
            written: false,
            encrypted: false,
            secrets,
        };

        let debug = format!("{:?}", report);
        assert!(debug.contains("DB"));
        assert!(!debug.contains("hunter2"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_env_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let f = fixture(Some("- name: DB_PASS\n  path: demo/db\n  default: pw\n"));
        run(&f, false).await;

        let mode = std::fs::metadata(&f.env_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
