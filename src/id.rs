//! Prefixed ID generation for Snapmenu billing entities.
//!
//! All IDs use an `sm_` brand prefix to guarantee collision avoidance with
//! payment provider IDs (Stripe's `sub_`, `cus_`, Paystack's `SUB_`, etc.).
//!
//! Format: `sm_{entity}_{uuid_simple}` (32 hex chars, no hyphens)

use uuid::Uuid;

/// All known entity prefixes for validation.
const ALL_PREFIXES: &[&str] = &["sm_usr_", "sm_sub_", "sm_pay_", "sm_ref_"];

/// Validate that a string is a valid Snapmenu prefixed ID.
///
/// This is a cheap check to reject garbage before hitting the database.
/// Validates format: `sm_{entity}_{32_hex_chars}`
pub fn is_valid_prefixed_id(s: &str) -> bool {
    let Some(prefix) = ALL_PREFIXES.iter().find(|p| s.starts_with(*p)) else {
        return false;
    };

    let hex_part = &s[prefix.len()..];
    hex_part.len() == 32 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Entity types that have prefixed IDs in the billing service.
#[derive(Debug, Clone, Copy)]
pub enum EntityType {
    User,
    Subscription,
    Payment,
    /// Canonical checkout reference, echoed back by provider webhooks.
    Reference,
}

impl EntityType {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::User => "sm_usr",
            Self::Subscription => "sm_sub",
            Self::Payment => "sm_pay",
            Self::Reference => "sm_ref",
        }
    }

    /// Generates a new prefixed ID for this entity type.
    pub fn gen_id(&self) -> String {
        format!("{}_{}", self.prefix(), Uuid::new_v4().as_simple())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_format() {
        let id = EntityType::User.gen_id();
        assert!(id.starts_with("sm_usr_"));
        // sm_usr_ (7 chars) + 32 hex chars = 39 chars total
        assert_eq!(id.len(), 39);
    }

    #[test]
    fn test_ids_are_unique() {
        let id1 = EntityType::Reference.gen_id();
        let id2 = EntityType::Reference.gen_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_is_valid_prefixed_id() {
        assert!(is_valid_prefixed_id("sm_usr_a1b2c3d4e5f6789012345678901234ab"));
        assert!(is_valid_prefixed_id(&EntityType::Subscription.gen_id()));
        assert!(is_valid_prefixed_id(&EntityType::Reference.gen_id()));

        assert!(!is_valid_prefixed_id(""));
        assert!(!is_valid_prefixed_id("a1b2c3d4-e5f6-7890-1234-567890123456"));
        assert!(!is_valid_prefixed_id("sm_unknown_a1b2c3d4e5f6789012345678901234ab"));
        assert!(!is_valid_prefixed_id("sm_usr_a1b2c3d4"));
        assert!(!is_valid_prefixed_id("sm_usr_a1b2c3d4e5f6789012345678901234gg"));
        assert!(!is_valid_prefixed_id("sub_a1b2c3d4e5f6789012345678901234ab"));
    }
}
