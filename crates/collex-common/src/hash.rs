//! Deterministic row identifiers
//!
//! When a source record carries no natural identifier, the fallback id must
//! be a pure function of the row's content so a re-run over the same input
//! yields the same id, in-process and across processes. Runtime object
//! hashes do not satisfy that, hence a real content digest.

use sha2::{Digest, Sha256};

/// Length of the hex digest kept for synthesized ids
const CONTENT_ID_HEX_LEN: usize = 16;

/// Prefix distinguishing synthesized ids from natural ones
const CONTENT_ID_PREFIX: &str = "h-";

/// Compute a deterministic identifier from ordered field values
///
/// Values are fed to the digest in the order given, separated by a `0x1f`
/// unit separator so `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn content_id<S: AsRef<str>>(values: &[S]) -> String {
    let mut hasher = Sha256::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            hasher.update([0x1f]);
        }
        hasher.update(value.as_ref().as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", CONTENT_ID_PREFIX, &digest[..CONTENT_ID_HEX_LEN])
}

/// Whether an identifier was synthesized by [`content_id`]
pub fn is_synthesized(id: &str) -> bool {
    id.len() == CONTENT_ID_PREFIX.len() + CONTENT_ID_HEX_LEN && id.starts_with(CONTENT_ID_PREFIX)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_id_is_deterministic() {
        let a = content_id(&["Bufo bufo", "1998-07-14", "Matsalu"]);
        let b = content_id(&["Bufo bufo", "1998-07-14", "Matsalu"]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_content_id_depends_on_order() {
        let a = content_id(&["x", "y"]);
        let b = content_id(&["y", "x"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_content_id_separator_prevents_boundary_collisions() {
        assert_ne!(content_id(&["ab", "c"]), content_id(&["a", "bc"]));
    }

    #[test]
    fn test_content_id_shape() {
        let id = content_id(&["only"]);
        assert!(is_synthesized(&id));
        assert_eq!(id.len(), 18);
        assert!(id[2..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_natural_ids_are_not_flagged_as_synthesized() {
        assert!(!is_synthesized("X1"));
        assert!(!is_synthesized("h-short"));
    }
}
