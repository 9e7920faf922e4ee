//! Deterministic App Mesh resource names.
//!
//! Every name is `<name>.<namespace>` of the owning entity. Namespaces are DNS
//! labels and never contain a dot, so distinct identities never collide.
//! Names above the App Mesh limit are cut and suffixed with a digest of the
//! full name.

use sha2::{Digest, Sha256};

use crate::model::ObjectRef;

/// Name of the single catch-all route on each virtual router.
pub const DEFAULT_ROUTE_NAME: &str = "default";

/// Priority of the default route (lowest App Mesh priority).
pub const DEFAULT_ROUTE_PRIORITY: i32 = 1000;

/// App Mesh resource name length limit.
pub const MAX_NAME_LEN: usize = 255;

/// Hex digits of the digest kept when a name is truncated.
const DIGEST_SUFFIX_LEN: usize = 16;

/// Name of the virtual service for a mesh service.
#[must_use]
pub fn virtual_service_name(service: &ObjectRef) -> String {
    qualified_name(service)
}

/// Name of the virtual router for a mesh service.
#[must_use]
pub fn virtual_router_name(service: &ObjectRef) -> String {
    qualified_name(service)
}

/// Name of the virtual node for a mesh workload.
#[must_use]
pub fn virtual_node_name(workload: &ObjectRef) -> String {
    qualified_name(workload)
}

fn qualified_name(object: &ObjectRef) -> String {
    let full = format!("{}.{}", object.name, object.namespace);
    if full.len() <= MAX_NAME_LEN {
        return full;
    }

    let digest = hex::encode(Sha256::digest(full.as_bytes()));
    let mut keep = MAX_NAME_LEN - DIGEST_SUFFIX_LEN - 1;
    while !full.is_char_boundary(keep) {
        keep -= 1;
    }

    format!("{}-{}", &full[..keep], &digest[..DIGEST_SUFFIX_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_embed_name_and_namespace() {
        let service = ObjectRef::new("reviews", "bookinfo");
        assert_eq!(virtual_service_name(&service), "reviews.bookinfo");
        assert_eq!(virtual_router_name(&service), "reviews.bookinfo");
        assert_eq!(virtual_node_name(&ObjectRef::new("web", "default")), "web.default");
    }

    #[test]
    fn test_same_name_different_namespace_does_not_collide() {
        let a = virtual_node_name(&ObjectRef::new("web", "team-a"));
        let b = virtual_node_name(&ObjectRef::new("web", "team-b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_long_names_are_truncated_deterministically() {
        let long = ObjectRef::new("x".repeat(300), "default");
        let other = ObjectRef::new(format!("{}y", "x".repeat(299)), "default");

        let name = virtual_node_name(&long);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert_eq!(name, virtual_node_name(&long));
        assert_ne!(name, virtual_node_name(&other));
    }

    #[test]
    fn test_multibyte_names_fit_the_byte_limit() {
        // 'é' is two bytes, so the cut point falls inside a character.
        let wide = ObjectRef::new(format!("a{}", "é".repeat(200)), "default");

        let name = virtual_service_name(&wide);
        assert!(name.len() <= MAX_NAME_LEN);
        assert!(name.starts_with("aé"));
        assert_eq!(name.len(), MAX_NAME_LEN - 1);
    }
}
