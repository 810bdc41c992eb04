//! Identifier generation for source blocks without an `id`.

use diagramlens_shared::GENERATED_ID_PREFIX;
use uuid::Uuid;

/// Length of the random suffix after [`GENERATED_ID_PREFIX`].
const SUFFIX_LEN: usize = 9;

/// Produces candidate ids. Uniqueness against the document is checked by the
/// caller, which asks again on collision.
pub trait IdGenerator: Send {
    fn next_id(&mut self) -> String;
}

/// Random base36 suffixes (`idname_k3j9x0q2a`).
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdGenerator for RandomIds {
    fn next_id(&mut self) -> String {
        let mut value = Uuid::new_v4().as_u128();
        let mut suffix = String::with_capacity(SUFFIX_LEN);
        for _ in 0..SUFFIX_LEN {
            let digit = (value % 36) as u32;
            value /= 36;
            suffix.push(char::from_digit(digit, 36).unwrap_or('0'));
        }
        format!("{GENERATED_ID_PREFIX}{suffix}")
    }
}

/// Deterministic `idname_1`, `idname_2`, … for tests and reproducible output.
#[derive(Debug, Default)]
pub struct SequentialIds {
    next: u64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from `start`.
    pub fn starting_at(start: u64) -> Self {
        Self { next: start.saturating_sub(1) }
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&mut self) -> String {
        self.next += 1;
        format!("{GENERATED_ID_PREFIX}{}", self.next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_short_base36() {
        let mut ids = RandomIds;
        let id = ids.next_id();
        let suffix = id.strip_prefix(GENERATED_ID_PREFIX).unwrap();
        assert_eq!(suffix.len(), SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, ids.next_id());
    }

    #[test]
    fn sequential_ids_count_up() {
        let mut ids = SequentialIds::new();
        assert_eq!(ids.next_id(), "idname_1");
        assert_eq!(ids.next_id(), "idname_2");

        let mut ids = SequentialIds::starting_at(10);
        assert_eq!(ids.next_id(), "idname_10");
    }
}
