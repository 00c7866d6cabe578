//! Feature matrix: test `contentsync-infra` under each supported feature set.

use std::process::Command;

use anyhow::{Context, Result};

/// Feature sets of `contentsync-infra` that must build and pass tests.
const FEATURE_COMBINATIONS: &[&[&str]] = &[
    &[], // default: local sink only
    &["s3"],
];

/// Test every supported feature combination of the infra crate.
pub fn test_feature_matrix() -> Result<()> {
    println!("Testing {} contentsync-infra feature combinations...", FEATURE_COMBINATIONS.len());

    for (index, features) in FEATURE_COMBINATIONS.iter().enumerate() {
        let label = if features.is_empty() { "default".to_string() } else { features.join(",") };

        println!("\n[{}/{}] cargo test -p contentsync-infra ({label})", index + 1, FEATURE_COMBINATIONS.len());

        let mut command = Command::new("cargo");
        command.args(["test", "-p", "contentsync-infra"]);
        if !features.is_empty() {
            command.arg("--features").arg(features.join(","));
        }

        let status =
            command.status().with_context(|| format!("Failed to run cargo test for '{label}'"))?;
        if !status.success() {
            anyhow::bail!("Feature combination '{label}' failed");
        }

        println!("✅ Features '{label}' passed");
    }

    println!("\n✅ All {} feature combinations passed!", FEATURE_COMBINATIONS.len());
    Ok(())
}
