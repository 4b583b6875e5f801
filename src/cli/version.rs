//! Version command handler

use crate::models::ConfigKind;
use crate::validation::{RULESET_VERSION, RuleSet};

/// Display version information
pub fn display_version() {
    println!("meshcfg {}", env!("CARGO_PKG_VERSION"));
    println!("  {}", env!("CARGO_PKG_DESCRIPTION"));
    println!("  License: {}", env!("CARGO_PKG_LICENSE"));
    println!(
        "  Rule set: v{} ({} rules, {} kinds)",
        RULESET_VERSION,
        RuleSet::default_rules().len(),
        ConfigKind::all().len()
    );
}
