//! `info` command implementation.

use acquisition::ScanPlan;
use anyhow::{Context, Result};
use contracts::{ChannelConfig, RawLayout, ScanProfile};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;
use crate::error::load_profile;

/// Profile info for JSON output
#[derive(Serialize)]
struct ProfileInfo {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    geometry: GeometryInfo,
    plan: PlanInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    channels: Vec<ChannelConfig>,
}

#[derive(Serialize)]
struct GeometryInfo {
    pixels_per_line: u32,
    output_lines: u32,
    channels: usize,
    bit_depth: u32,
    output_row_bytes: usize,
    output_bytes: u64,
    raw_line_bytes: u32,
    raw_layout: RawLayout,
    mirror: bool,
    invert: bool,
}

#[derive(Serialize)]
struct PlanInfo {
    native_lines: u64,
    lines_per_request: u32,
    bytes_per_request: usize,
    requests: u64,
    block_lines: u64,
    buffers: usize,
    ring_capacity: u32,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(profile = %args.profile.display(), "Loading profile info");

    let profile = load_profile(&args.profile)?;
    let info = build_profile_info(&profile, args);

    if args.json {
        let json = serde_json::to_string_pretty(&info).context("Failed to serialize profile info")?;
        println!("{}", json);
    } else {
        print_profile_info(&info);
    }

    Ok(())
}

fn build_profile_info(profile: &ScanProfile, args: &InfoArgs) -> ProfileInfo {
    let scan = &profile.scan;
    let geometry = &scan.geometry;
    let plan = ScanPlan::from_config(scan);

    ProfileInfo {
        name: profile.name.clone(),
        description: profile.description.clone(),
        geometry: GeometryInfo {
            pixels_per_line: geometry.pixels_per_line,
            output_lines: geometry.total_output_lines,
            channels: geometry.channel_count.get(),
            bit_depth: geometry.bit_depth.bits(),
            output_row_bytes: geometry.output_row_bytes(),
            output_bytes: geometry.total_output_bytes(),
            raw_line_bytes: geometry.bytes_per_raw_line,
            raw_layout: scan.raw_layout,
            mirror: scan.mirror,
            invert: scan.invert,
        },
        plan: PlanInfo {
            native_lines: plan.native_lines,
            lines_per_request: plan.buffer_lines,
            bytes_per_request: plan.buffer_bytes(),
            requests: plan.request_count(),
            block_lines: plan.block_lines,
            buffers: plan.depth,
            ring_capacity: scan.skew_spread(),
        },
        channels: if args.channels {
            scan.channels.clone()
        } else {
            Vec::new()
        },
    }
}

fn print_profile_info(info: &ProfileInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     linescan Profile                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📄 {}", info.name);
    if let Some(ref description) = info.description {
        println!("   {}", description);
    }

    let g = &info.geometry;
    println!("\n📐 Geometry");
    println!("   ├─ Pixels per line: {}", g.pixels_per_line);
    println!("   ├─ Output lines: {}", g.output_lines);
    println!("   ├─ Channels: {} x {}-bit", g.channels, g.bit_depth);
    println!("   ├─ Output row: {} bytes ({} total)", g.output_row_bytes, g.output_bytes);
    println!("   ├─ Raw line: {} bytes, {:?}", g.raw_line_bytes, g.raw_layout);
    println!("   └─ Mirror: {}, invert: {}", g.mirror, g.invert);

    let p = &info.plan;
    println!("\n⚙️  Acquisition Plan");
    println!("   ├─ Native lines: {}", p.native_lines);
    println!(
        "   ├─ Requests: {} x {} lines ({} bytes)",
        p.requests, p.lines_per_request, p.bytes_per_request
    );
    println!("   ├─ Block: {} lines", p.block_lines);
    println!("   ├─ Buffers: {}", p.buffers);
    println!("   └─ Ring capacity: {} rows per channel", p.ring_capacity);

    if !info.channels.is_empty() {
        println!("\n🎨 Channels ({})", info.channels.len());
        for (i, channel) in info.channels.iter().enumerate() {
            let prefix = if i == info.channels.len() - 1 { "└─" } else { "├─" };
            println!(
                "   {} #{}: skew {}, {}→{} dpi",
                prefix, i, channel.skew, channel.native_rate, channel.target_rate
            );
        }
    }

    println!();
}
