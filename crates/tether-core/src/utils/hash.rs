//! Blake3 hashing utilities.
//!
//! Provides the lock inputs digest and compact signatures for solver
//! bookkeeping.

use std::collections::BTreeSet;

use crate::types::{Manifest, ProjectProperties};

/// Hash a sequence of string fields. Fields are length-prefixed so that
/// `["ab", "c"]` and `["a", "bc"]` hash differently.
pub fn signature<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = blake3::Hasher::new();
    for field in fields {
        let bytes = field.as_ref().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    hasher.finalize().to_hex().to_string()
}

/// Digest of everything that determines a solve: declared constraints,
/// overrides, ignore rules and the root project's imports.
///
/// Two runs with the same digest need not re-solve when the lock is intact.
pub fn inputs_digest(manifest: &Manifest, root_imports: &BTreeSet<String>) -> String {
    let mut fields: Vec<String> = Vec::new();

    fields.push("constraints".to_string());
    for (root, props) in &manifest.constraints {
        push_properties(&mut fields, root.as_str(), props);
    }

    fields.push("overrides".to_string());
    for (root, props) in &manifest.overrides {
        push_properties(&mut fields, root.as_str(), props);
    }

    fields.push("ignored".to_string());
    fields.extend(manifest.ignored.iter().cloned());

    fields.push("imports".to_string());
    fields.extend(root_imports.iter().cloned());

    signature(&fields)
}

fn push_properties(fields: &mut Vec<String>, root: &str, props: &ProjectProperties) {
    fields.push(root.to_string());
    fields.push(props.source.clone().unwrap_or_default());
    fields.push(props.constraint.type_name().to_string());
    fields.push(props.constraint.to_string());
}
