//! `concierge synth`: write the topology as template documents.

use std::path::Path;

use anyhow::Result;
use console::style;

use concierge_core::topology::concierge_units;
use concierge_infra::synth::synthesize_to_dir;
use concierge_types::config::DeploymentConfig;

pub async fn synth(config: &DeploymentConfig, out: &Path, json: bool) -> Result<()> {
    let graph = concierge_units(config)?;
    let written = synthesize_to_dir(&graph, out).await?;

    if json {
        let paths: Vec<String> = written.iter().map(|p| p.display().to_string()).collect();
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Synthesized {} units into {}",
        style("✓").green().bold(),
        graph.len(),
        style(out.display()).cyan()
    );
    for path in &written {
        println!("    {}", style(path.display()).dim());
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_synth_writes_into_out_dir() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("cdk.out");
        synth(&DeploymentConfig::default(), &out, true).await.unwrap();
        assert!(out.join("HotelBedrockKBStack.template.json").exists());
        assert!(out.join("manifest.json").exists());
    }
}
