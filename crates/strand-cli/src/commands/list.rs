//! `strand list`: show the jobs `strand run` accepts.

use crate::demos;
use strand_core::TimingStats;

pub fn execute(json: bool) -> anyhow::Result<()> {
    let registry = demos::registry(&TimingStats::new())?;

    if json {
        let entries: Vec<serde_json::Value> = registry
            .names()
            .map(|name| {
                serde_json::json!({
                    "name": name,
                    "description": registry.description(name).unwrap_or_default(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    let width = registry.names().map(str::len).max().unwrap_or(0);
    for name in registry.names() {
        println!(
            "{:width$}  {}",
            name,
            registry.description(name).unwrap_or_default(),
            width = width
        );
    }
    Ok(())
}
