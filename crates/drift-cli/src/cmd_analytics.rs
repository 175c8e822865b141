use crate::context::{block_on, print_json, Context};
use drift_store::compute_analytics;

/// Execute `drift analytics`
pub fn execute(ctx: &Context, workspace: &str, json: bool) -> anyhow::Result<()> {
    let store = ctx.open_store()?;
    let records = block_on(compute_analytics(&store, workspace))??;
    if json {
        return print_json(&records);
    }
    for record in &records {
        println!(
            "{}  count={} variants={} entropy={:.3}",
            record.kind,
            record.cohort_analysis.count,
            record.cohort_analysis.variants,
            record.cohort_analysis.entropy
        );
    }
    println!("Stored analytics for {} kind(s) in workspace {workspace}", records.len());
    Ok(())
}
