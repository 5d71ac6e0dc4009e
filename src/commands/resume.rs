use anyhow::{Context, Result};

use iptv_checker::config::Config;
use iptv_checker::storage::{ResumeManager, ResumeStatus};

use super::{collect_inputs, InputArgs};

pub fn status(config: Config, input: InputArgs) -> Result<()> {
    let layout = config.output_layout();
    let inputs = collect_inputs(&input, &layout)?;
    let manager = ResumeManager::new(layout, config.input.encodings);
    let info = manager.info(&inputs);

    println!("Resume Status");
    println!("=============");
    println!("Total files: {}", info.total());
    println!("Already completed: {}", info.completed());
    println!("Incomplete: {}", info.incomplete());
    println!("New files: {}", info.new_files());

    let completed: Vec<_> = info
        .entries
        .iter()
        .filter(|(_, s)| matches!(s, ResumeStatus::Complete(_)))
        .collect();
    if !completed.is_empty() {
        println!("\nCompleted files (skipped)");
        println!("-------------------------");
        for (path, status) in completed {
            println!("{}: {status}", path.display());
        }
    }

    let pending: Vec<_> = info
        .entries
        .iter()
        .filter(|(_, s)| matches!(s, ResumeStatus::Incomplete(_) | ResumeStatus::Unreadable { .. }))
        .collect();
    if !pending.is_empty() {
        println!("\nIncomplete files (will be checked again)");
        println!("----------------------------------------");
        for (path, status) in pending {
            println!("{}: {status}", path.display());
        }
    }

    Ok(())
}

pub fn cleanup(config: Config, input: InputArgs) -> Result<()> {
    let layout = config.output_layout();
    let inputs = collect_inputs(&input, &layout)?;
    let manager = ResumeManager::new(layout, config.input.encodings);

    let removed = manager
        .cleanup_incomplete(&inputs)
        .context("Failed to remove incomplete outputs")?;

    if removed.is_empty() {
        println!("No incomplete outputs found");
        return Ok(());
    }

    println!("Removed {} incomplete outputs", removed.len());
    for path in &removed {
        println!("  {}", path.display());
    }

    Ok(())
}
