use anyhow::{Context, Result};

use crate::cargo;

/// `roe-common` feature sets; each is checked with default features off.
const FEATURE_COMBINATIONS: &[&[&str]] = &[&["foundation"], &["runtime"]];

/// Check that every feature tier of `roe-common` compiles on its own.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} roe-common feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, features) in FEATURE_COMBINATIONS.iter().enumerate() {
        let joined = features.join(",");
        println!(
            "\n[{}/{}] cargo check -p roe-common --no-default-features --features {joined}",
            index + 1,
            FEATURE_COMBINATIONS.len(),
        );

        cargo(&["check", "-p", "roe-common", "--no-default-features", "--features", &joined])
            .with_context(|| format!("Feature combination '{joined}' failed to compile"))?;

        println!("✅ Features '{joined}' compiled successfully");
    }

    println!("\n✅ All {} feature combinations compile successfully!", FEATURE_COMBINATIONS.len());

    Ok(())
}
