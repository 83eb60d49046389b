// crates/transformer-config-cli/src/tests/i18n.rs
// ============================================================================
// Module: CLI i18n Tests
// Description: Unit tests for the message catalog and placeholder substitution.
// Purpose: Ensure CLI messages resolve deterministically.
// Dependencies: transformer-config-cli i18n module
// ============================================================================

//! ## Overview
//! Verifies catalog keys are unique, placeholders substitute, and unknown keys
//! fall back to the key itself.

use std::collections::BTreeSet;

use crate::i18n::CATALOG_ITEMS;
use crate::i18n::MessageArg;
use crate::i18n::translate;

#[test]
fn catalog_keys_are_unique() {
    let keys: BTreeSet<&str> = CATALOG_ITEMS.iter().map(|(key, _)| *key).collect();
    assert_eq!(keys.len(), CATALOG_ITEMS.len(), "duplicate catalog key");
}

#[test]
fn translate_substitutes_placeholders() {
    let output = translate(
        "config.validate.summary.layout",
        vec![
            MessageArg::new("tp", "2"),
            MessageArg::new("pp", "4"),
            MessageArg::new("vpp", "none"),
            MessageArg::new("ep", "1"),
            MessageArg::new("sp", "true"),
        ],
    );
    assert!(output.contains("tp=2"));
    assert!(output.contains("pp=4"));
    assert!(!output.contains('{'));
}

#[test]
fn translate_falls_back_to_key() {
    assert_eq!(translate("missing.key", Vec::new()), "missing.key");
}

#[test]
fn t_macro_formats_display_values() {
    let output = crate::t!("config.load_failed", error = 42);
    assert_eq!(output, "Failed to load config: 42");
}
