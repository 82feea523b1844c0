use std::path::Path;

use csv::Writer;
use tracing::info;

use crate::analysis::optimum_table::WeeklyOptimumTable;
use crate::core::dispatch::DispatchReport;
use crate::error::Result;
use crate::utils::logging::{self, FileIOType, OperationCategory};

fn create_writer(path: &Path) -> Result<Writer<std::fs::File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Writer::from_path(path)?)
}

/// One row per timestep: demand, dispatch per source, surplus per source and shortfall (MW).
pub fn export_dispatch_csv(report: &DispatchReport, path: &Path) -> Result<()> {
    let _timing = logging::start_timing(
        "export_dispatch_csv",
        OperationCategory::FileIO { subcategory: FileIOType::Export },
    );
    let mut writer = create_writer(path)?;

    let mut header = vec!["datetime".to_string(), "demand".to_string()];
    header.extend(report.sources.iter().map(|s| format!("{}_dispatched", s)));
    header.extend(report.sources.iter().map(|s| format!("{}_surplus", s)));
    header.push("shortfall".to_string());
    writer.write_record(&header)?;

    for step in &report.steps {
        let mut row = vec![step.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(), format!("{:.3}", step.demand)];
        row.extend(step.dispatched.iter().map(|mw| format!("{:.3}", mw)));
        row.extend(step.surplus.iter().map(|mw| format!("{:.3}", mw)));
        row.push(format!("{:.3}", step.shortfall));
        writer.write_record(&row)?;
    }
    writer.flush()?;
    info!("Wrote {} dispatch rows to {}", report.steps.len(), path.display());
    Ok(())
}

/// One row per week: status, headline score figures and installed MW per source.
pub fn export_table_summary(table: &WeeklyOptimumTable, path: &Path) -> Result<()> {
    let _timing = logging::start_timing(
        "export_table_summary",
        OperationCategory::FileIO { subcategory: FileIOType::Export },
    );
    let mut writer = create_writer(path)?;
    let source_names: Vec<String> = match &table.sources {
        Some(sources) => sources.names().into_iter().map(String::from).collect(),
        None => {
            let mut names: Vec<String> = table
                .entries
                .values()
                .flat_map(|r| r.capacity.iter().map(|(n, _)| n.to_string()))
                .collect();
            names.sort();
            names.dedup();
            names
        }
    };

    let mut header: Vec<String> = ["week", "status", "objective_eur", "cost_eur", "capacity_cost_eur", "carbon_cost_eur", "emissions_t", "eur_per_mwh"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(source_names.iter().map(|s| format!("{}_mw", s)));
    writer.write_record(&header)?;

    for (week, record) in &table.entries {
        let score = &record.score;
        let mut row = vec![
            week.to_string(),
            "solved".to_string(),
            format!("{:.2}", score.objective),
            format!("{:.2}", score.cost),
            format!("{:.2}", score.capacity_cost),
            format!("{:.2}", score.carbon_cost),
            format!("{:.3}", score.emissions),
            score.cost_per_mwh().map(|v| format!("{:.4}", v)).unwrap_or_default(),
        ];
        row.extend(source_names.iter().map(|s| format!("{:.3}", record.capacity.get(s))));
        writer.write_record(&row)?;
    }
    for (week, failure) in &table.failures {
        let mut row = vec![week.to_string(), failure.to_string()];
        row.resize(header.len(), String::new());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}
