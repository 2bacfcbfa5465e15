//! Identifier generation for protocols and steps.

use uuid::Uuid;

/// Largest batch `generate_ids` will produce in one call.
pub const MAX_GENERATED_IDS: usize = 1000;

/// Returns a fresh random identifier: a v4 UUID as 32 lowercase hex digits.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Returns `count` random identifiers.
///
/// Identifiers are not checked against earlier batches; 122 random bits make
/// collisions negligible.
#[must_use]
pub fn generate_ids(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_id()).collect()
}
