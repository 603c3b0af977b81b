//! Secret slot declarations, generation and masking
//!
//! A package may ship a `secrets.yaml` declaring the environment variables it
//! needs and where their values live in the secret store:
//!
//! ```yaml
//! - name: DB_PASS
//!   path: demo/db
//!   create: true
//!   length: 24
//!   symbols: false
//! ```

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{CoreError, Result, read_to_string};

/// Length used when a slot asks for generation without a length
pub const DEFAULT_SECRET_LENGTH: usize = 16;

/// Replacement text for masked secrets
pub const MASK: &str = "*******";

// =============================================================================
// DECLARATIONS
// =============================================================================

/// One entry of `secrets.yaml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSlot {
    /// Environment variable receiving the value
    #[serde(default)]
    pub name: String,

    /// Lookup key in the secret store
    #[serde(default)]
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<usize>,

    /// Generate a value when neither the store nor `default` has one
    #[serde(default)]
    pub create: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbols: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uppercase: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lowercase: Option<bool>,
}

impl SecretSlot {
    /// Why this slot cannot be processed, if it cannot
    pub fn invalid_reason(&self) -> Option<&'static str> {
        if self.path.trim().is_empty() {
            Some("has no path")
        } else if self.name.trim().is_empty() {
            Some("has no name")
        } else {
            None
        }
    }

    pub fn length(&self) -> usize {
        self.length.unwrap_or(DEFAULT_SECRET_LENGTH)
    }

    pub fn classes(&self) -> CharClasses {
        CharClasses {
            lowercase: self.lowercase.unwrap_or(true),
            uppercase: self.uppercase.unwrap_or(true),
            digits: self.digits.unwrap_or(true),
            symbols: self.symbols.unwrap_or(true),
        }
    }
}

/// Read the declarations of a secrets file
///
/// Returns `Ok(None)` when the file does not exist; packages without secrets
/// are legal. An empty file yields an empty list.
pub fn load_declarations(path: &Path) -> Result<Option<Vec<SecretSlot>>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = read_to_string(path)?;
    if content.trim().is_empty() {
        return Ok(Some(Vec::new()));
    }

    let slots: Option<Vec<SecretSlot>> =
        serde_yaml::from_str(&content).map_err(|e| CoreError::parse(path, e.to_string()))?;
    Ok(Some(slots.unwrap_or_default()))
}

// =============================================================================
// GENERATOR
// =============================================================================

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
// Safe inside double-quoted env values and compose interpolation
const SYMBOLS: &[u8] = b"!@#%^&*_-+=~";

/// Character classes requested for a generated secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharClasses {
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
}

impl Default for CharClasses {
    fn default() -> Self {
        Self::all()
    }
}

impl CharClasses {
    pub const fn all() -> Self {
        Self {
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
        }
    }

    pub const fn alphanumeric() -> Self {
        Self {
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !(self.lowercase || self.uppercase || self.digits || self.symbols)
    }

    fn sets(&self) -> Vec<&'static [u8]> {
        let mut sets = Vec::with_capacity(4);
        if self.lowercase {
            sets.push(LOWERCASE);
        }
        if self.uppercase {
            sets.push(UPPERCASE);
        }
        if self.digits {
            sets.push(DIGITS);
        }
        if self.symbols {
            sets.push(SYMBOLS);
        }
        sets
    }
}

/// A generated value and whether the requested classes had to be replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    pub value: String,
    /// Every class was disabled, so alphanumeric was used instead
    pub fell_back: bool,
}

/// Random secret generator
#[derive(Debug)]
pub struct SecretGenerator {
    rng: StdRng,
}

impl SecretGenerator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Deterministic generator for tests
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate `length` characters drawn from `classes`
    ///
    /// When `length` is at least the number of enabled classes, each of them
    /// appears at least once.
    pub fn generate(&mut self, length: usize, classes: CharClasses) -> GeneratedSecret {
        let fell_back = classes.is_empty();
        let classes = if fell_back {
            CharClasses::alphanumeric()
        } else {
            classes
        };

        let sets = classes.sets();
        let pool: Vec<u8> = sets.iter().flat_map(|s| s.iter().copied()).collect();

        let mut out: Vec<u8> = Vec::with_capacity(length);
        if length >= sets.len() {
            for set in &sets {
                out.push(self.pick(set));
            }
        }
        while out.len() < length {
            out.push(self.pick(&pool));
        }
        out.shuffle(&mut self.rng);

        GeneratedSecret {
            value: out.into_iter().map(char::from).collect(),
            fell_back,
        }
    }

    fn pick(&mut self, set: &[u8]) -> u8 {
        set[self.rng.random_range(0..set.len())]
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// MASKING
// =============================================================================

/// Collects secret values so diagnostic output can hide them
#[derive(Clone, Default)]
pub struct SecretMasker {
    secrets: Vec<String>,
}

impl fmt::Debug for SecretMasker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretMasker")
            .field("secrets", &self.secrets.len())
            .finish()
    }
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a value; empty values are ignored
    pub fn add(&mut self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() || self.secrets.contains(&secret) {
            return;
        }
        self.secrets.push(secret);
        // Longest first so a secret containing another is fully hidden
        self.secrets.sort_by(|a, b| b.len().cmp(&a.len()));
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }

    /// Replace every registered secret in `text`
    pub fn mask(&self, text: &str) -> String {
        let mut masked = text.to_string();
        for secret in &self.secrets {
            if masked.contains(secret.as_str()) {
                masked = masked.replace(secret.as_str(), MASK);
            }
        }
        masked
    }
}

// =============================================================================
// ENV FILE
// =============================================================================

/// `NAME="value"`, or `NAME='value'` when the value contains a double quote
pub fn format_env_line(name: &str, value: &str) -> String {
    if value.contains('"') {
        format!("{}='{}'", name, value)
    } else {
        format!("{}=\"{}\"", name, value)
    }
}

/// Ordered environment file payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// File content, one line per entry, each terminated by a newline
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, value) in &self.entries {
            out.push_str(&format_env_line(name, value));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn count_in(value: &str, set: &[u8]) -> usize {
        value.bytes().filter(|b| set.contains(b)).count()
    }

    #[test]
    fn test_slot_defaults() {
        let slots: Vec<SecretSlot> =
            serde_yaml::from_str("- name: DB_PASS\n  path: demo/db\n  create: true").unwrap();
        let slot = &slots[0];

        assert_eq!(slot.length(), DEFAULT_SECRET_LENGTH);
        assert_eq!(slot.classes(), CharClasses::all());
        assert!(slot.invalid_reason().is_none());
    }

    #[test]
    fn test_slot_missing_fields() {
        let slots: Vec<SecretSlot> =
            serde_yaml::from_str("- name: A\n- path: x/y\n- {name: B, path: ''}").unwrap();

        assert_eq!(slots[0].invalid_reason(), Some("has no path"));
        assert_eq!(slots[1].invalid_reason(), Some("has no name"));
        assert_eq!(slots[2].invalid_reason(), Some("has no path"));
    }

    #[test]
    fn test_load_declarations_outcomes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");

        assert!(load_declarations(&path).unwrap().is_none());

        fs::write(&path, "").unwrap();
        assert_eq!(load_declarations(&path).unwrap(), Some(vec![]));

        fs::write(&path, "- name: A\n  path: a\n").unwrap();
        assert_eq!(load_declarations(&path).unwrap().unwrap().len(), 1);

        fs::write(&path, "name: not-a-list").unwrap();
        assert!(matches!(
            load_declarations(&path),
            Err(CoreError::Parse { .. })
        ));
    }

    #[test]
    fn test_generate_length_and_classes() {
        let mut generator = SecretGenerator::seeded(7);

        for length in [4, 12, 16, 64] {
            let secret = generator.generate(length, CharClasses::all());
            assert_eq!(secret.value.len(), length);
            assert!(!secret.fell_back);
            assert!(count_in(&secret.value, LOWERCASE) >= 1);
            assert!(count_in(&secret.value, UPPERCASE) >= 1);
            assert!(count_in(&secret.value, DIGITS) >= 1);
            assert!(count_in(&secret.value, SYMBOLS) >= 1);
        }
    }

    #[test]
    fn test_generate_respects_disabled_classes() {
        let mut generator = SecretGenerator::seeded(11);
        let classes = CharClasses {
            symbols: false,
            uppercase: false,
            ..CharClasses::all()
        };

        let secret = generator.generate(32, classes);
        assert_eq!(count_in(&secret.value, SYMBOLS), 0);
        assert_eq!(count_in(&secret.value, UPPERCASE), 0);
        assert!(count_in(&secret.value, DIGITS) >= 1);
    }

    #[test]
    fn test_generate_all_disabled_falls_back() {
        let mut generator = SecretGenerator::seeded(3);
        let none = CharClasses {
            lowercase: false,
            uppercase: false,
            digits: false,
            symbols: false,
        };

        let secret = generator.generate(20, none);
        assert!(secret.fell_back);
        assert_eq!(secret.value.len(), 20);
        assert!(secret.value.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_shorter_than_class_count() {
        let mut generator = SecretGenerator::seeded(5);
        let secret = generator.generate(2, CharClasses::all());
        assert_eq!(secret.value.len(), 2);

        assert_eq!(generator.generate(0, CharClasses::all()).value, "");
    }

    #[test]
    fn test_symbols_are_env_safe() {
        for b in SYMBOLS {
            assert!(!matches!(*b, b'"' | b'\'' | b'$' | b'\\' | b'`'));
        }
    }

    #[test]
    fn test_masker() {
        let mut masker = SecretMasker::new();
        masker.add("hunter2");
        masker.add("");
        masker.add("hunter2");
        masker.add("hunter2-long");

        assert_eq!(masker.len(), 2);
        assert_eq!(
            masker.mask("a=hunter2 b=hunter2-long"),
            format!("a={} b={}", MASK, MASK)
        );
        assert_eq!(masker.mask("nothing here"), "nothing here");
    }

    #[test]
    fn test_masker_debug_hides_values() {
        let mut masker = SecretMasker::new();
        masker.add("hunter2");

        let debug = format!("{:?}", masker);
        assert_eq!(debug, "SecretMasker { secrets: 1 }");
    }

    #[test]
    fn test_env_line_quoting() {
        assert_eq!(format_env_line("A", "plain"), "A=\"plain\"");
        assert_eq!(format_env_line("B", "has\"quote"), "B='has\"quote'");
        assert_eq!(format_env_line("C", ""), "C=\"\"");
    }

    #[test]
    fn test_env_file_render_keeps_order() {
        let mut env = EnvFile::new();
        env.push("Z", "1");
        env.push("A", "2");

        env.push("Q", "say \"hi\"");

        insta::assert_snapshot!(env.render(), @r#"
        Z="1"
        A="2"
        Q='say "hi"'
        "#);
        assert!(env.render().ends_with('\n'));
        assert_eq!(env.len(), 3);
    }
}
