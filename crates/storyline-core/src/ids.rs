//! Deterministic, content-addressed identifiers.
//!
//! `id(kind, salt, parts) = sha256(salt ␟ kind ␟ part₀ ␟ part₁ …)` hex,
//! truncated to [`ID_LEN`] characters. The `kind` namespace keeps, e.g., a
//! pickle id and a test-case id built from the same parts apart; the salt
//! separates identifier spaces (per project, per tool) while staying stable
//! for identical inputs.

use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest.
pub const ID_LEN: usize = 16;

/// Field separator (ASCII unit separator). Never appears in ordinary text.
pub const ID_SEPARATOR: char = '\u{1f}';

/// Kinds of entity that get an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdKind {
    Run,
    TestCase,
    Tag,
    Scenario,
    Step,
    DataTableRow,
    Pickle,
    PickleStep,
    ProtocolTestCase,
    TestStep,
    TestCaseStarted,
    Hook,
}

impl IdKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdKind::Run => "run",
            IdKind::TestCase => "test-case",
            IdKind::Tag => "tag",
            IdKind::Scenario => "scenario",
            IdKind::Step => "step",
            IdKind::DataTableRow => "data-table-row",
            IdKind::Pickle => "pickle",
            IdKind::PickleStep => "pickle-step",
            IdKind::ProtocolTestCase => "protocol-test-case",
            IdKind::TestStep => "test-step",
            IdKind::TestCaseStarted => "test-case-started",
            IdKind::Hook => "hook",
        }
    }
}

/// Compute a namespaced, salted identifier from `parts`.
pub fn generate_id<S: AsRef<str>>(kind: IdKind, salt: &str, parts: &[S]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    let mut buf = [0u8; 4];
    let sep = ID_SEPARATOR.encode_utf8(&mut buf).as_bytes();
    hasher.update(sep);
    hasher.update(kind.as_str().as_bytes());
    for part in parts {
        hasher.update(sep);
        hasher.update(part.as_ref().as_bytes());
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(ID_LEN);
    id
}

/// Salted generator bound to one identifier space.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    salt: String,
}

impl IdGenerator {
    pub fn new(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    pub fn id<S: AsRef<str>>(&self, kind: IdKind, parts: &[S]) -> String {
        generate_id(kind, &self.salt, parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_deterministic_hex() {
        let a = generate_id(IdKind::TestCase, "", &["a.test.ts", "logs in"]);
        let b = generate_id(IdKind::TestCase, "", &["a.test.ts", "logs in"]);
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn kind_namespaces_ids() {
        let parts = ["a.test.ts", "logs in"];
        assert_ne!(
            generate_id(IdKind::Pickle, "", &parts),
            generate_id(IdKind::ProtocolTestCase, "", &parts)
        );
    }

    #[test]
    fn salt_separates_identifier_spaces() {
        let a = IdGenerator::new("project-a").id(IdKind::Scenario, &["x"]);
        let b = IdGenerator::new("project-b").id(IdKind::Scenario, &["x"]);
        assert_ne!(a, b);
    }

    #[test]
    fn separator_prevents_concatenation_collisions() {
        let a = generate_id(IdKind::Step, "", &["ab", "c"]);
        let b = generate_id(IdKind::Step, "", &["a", "bc"]);
        assert_ne!(a, b);
    }
}
