//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ScanProfile;
use reconstruction::required_native_lines;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::load_profile;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    profile_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ProfileSummary>,
}

#[derive(Serialize)]
struct ProfileSummary {
    name: String,
    channels: usize,
    bit_depth: u32,
    pixels_per_line: u32,
    output_lines: u32,
    native_lines: u64,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(profile = %args.profile.display(), "Validating profile");

    let result = validate_profile(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Profile validation failed")
    }
}

fn validate_profile(args: &ValidateArgs) -> ValidationResult {
    let profile_path = args.profile.display().to_string();

    match load_profile(&args.profile) {
        Ok(profile) => {
            let warnings = collect_warnings(&profile);
            ValidationResult {
                valid: true,
                profile_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ProfileSummary {
                    name: profile.name.clone(),
                    channels: profile.scan.channels.len(),
                    bit_depth: profile.scan.geometry.bit_depth.bits(),
                    pixels_per_line: profile.scan.geometry.pixels_per_line,
                    output_lines: profile.scan.geometry.total_output_lines,
                    native_lines: profile
                        .scan
                        .native_lines
                        .map(u64::from)
                        .unwrap_or_else(|| required_native_lines(&profile.scan)),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            profile_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Non-fatal profile issues
fn collect_warnings(profile: &ScanProfile) -> Vec<String> {
    let scan = &profile.scan;
    let mut warnings = Vec::new();

    if let Some(native) = scan.native_lines {
        let needed = required_native_lines(scan);
        if u64::from(native) < needed {
            warnings.push(format!(
                "native_lines = {native} is below the {needed} lines the geometry needs; the scan will end short"
            ));
        }
    }

    if !scan.double_buffering {
        warnings.push("double_buffering is off; reads and reconstruction will not overlap".to_string());
    }

    let upscaling = scan.channels.iter().any(|c| c.target_rate > c.native_rate);
    if upscaling {
        warnings.push("target_rate above native_rate: lines pass 1:1, no upsampling is performed".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Profile is valid: {}", result.profile_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Name: {}", summary.name);
            println!("  Channels: {} x {}-bit", summary.channels, summary.bit_depth);
            println!("  Pixels per line: {}", summary.pixels_per_line);
            println!("  Output lines: {}", summary.output_lines);
            println!("  Native lines: {}", summary.native_lines);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Profile is invalid: {}", result.profile_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
