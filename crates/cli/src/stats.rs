use std::process::ExitCode;

use anyhow::Context;
use flacport_core::StatsConfig;
use flacport_scanner::stats::{LibraryStats, collect_stats};

use crate::cli::StatsArgs;

pub fn run(args: StatsArgs, mut config: StatsConfig) -> anyhow::Result<ExitCode> {
    args.apply(&mut config);
    config.validate().context("invalid stats settings")?;

    let stats = collect_stats(&args.input_dir, &config)
        .with_context(|| format!("failed to scan '{}'", args.input_dir.display()))?;

    let written = stats.write_listings(&config.listing_dir).with_context(|| {
        format!(
            "failed to write listings to '{}'",
            config.listing_dir.display()
        )
    })?;

    if args.json {
        let top: Vec<_> = stats
            .top_directories(config.top_directories)
            .into_iter()
            .map(|(path, bytes)| serde_json::json!({ "path": path, "bytes": bytes }))
            .collect();
        let mut body = serde_json::to_value(&stats)?;
        if let Some(fields) = body.as_object_mut() {
            fields.insert("top_directories".into(), serde_json::Value::Array(top));
            fields.insert("listings".into(), serde_json::json!(written));
        }
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_summary(&stats, config.top_directories);
    }

    Ok(ExitCode::SUCCESS)
}

fn print_summary(stats: &LibraryStats, top: usize) {
    println!("Audio file counts:");
    for (fmt, count) in &stats.audio_counts {
        println!("{fmt}: {count}");
    }

    println!("\nOther file counts:");
    for (ext, count) in &stats.other_counts {
        let label = if ext.is_empty() { "(none)" } else { ext.as_str() };
        println!("{label}: {count}");
    }

    println!("\nTop {top} largest directories:");
    for (dir, size) in stats.top_directories(top) {
        println!("{}: {size} bytes", dir.display());
    }

    println!(
        "\nMissing converted {} files: {}",
        stats.source_extension,
        stats.missing_converted.len()
    );
}
