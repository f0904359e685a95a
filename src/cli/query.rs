//! Query and delete commands.
//!
//! These share the bot's argument grammar and routing, so a `/data` query
//! and a `cranewatch data` invocation resolve identically.

use console::style;

use crate::bot::command::{self, ParsedCommand};
use crate::bot::router::{FaultResolution, QueryRouter};
use crate::bot::state::CraneScope;
use crate::config::Settings;
use crate::models::crane_label;
use crate::repository::{FaultRepository, MaintenanceRepository};

struct Scope {
    crane: Option<i32>,
    fault: Option<i32>,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
}

fn router(settings: &Settings) -> (QueryRouter, FaultRepository, MaintenanceRepository) {
    let pool = settings.pool();
    let faults = FaultRepository::new(pool.clone());
    let records = MaintenanceRepository::new(pool);
    (
        QueryRouter::new(faults.clone(), records.clone()),
        faults,
        records,
    )
}

/// Parse and resolve the four query arguments to storage filters.
async fn resolve_scope(
    router: &QueryRouter,
    crane: &str,
    start: &str,
    end: &str,
    fault: &str,
) -> anyhow::Result<Scope> {
    let args = format!("{crane} {start} {end} {fault}");
    let ParsedCommand::Full {
        crane,
        start,
        end,
        fault,
    } = command::parse(&args)
    else {
        anyhow::bail!("invalid arguments: expected CRANE DD-MM-YYYY DD-MM-YYYY [FAULT]");
    };

    let fault = match router.resolve_fault(&fault).await? {
        FaultResolution::Resolved(fault) => fault,
        FaultResolution::Choices(choices) => {
            println!("Several faults match, rerun with one of:");
            for choice in choices {
                println!("  {:>5}  {}", choice.fault_id, choice.label());
            }
            anyhow::bail!("ambiguous fault keyword");
        }
    };
    Ok(Scope {
        crane: crane.filter(),
        fault,
        start,
        end,
    })
}

/// Show debounced maintenance records in scope.
pub async fn cmd_data(
    settings: &Settings,
    crane: &str,
    start: &str,
    end: &str,
    fault: &str,
) -> anyhow::Result<()> {
    let (router, _, _) = router(settings);
    let scope = resolve_scope(&router, crane, start, end, fault).await?;

    let records = router
        .fetch(scope.start, scope.end, scope.crane, scope.fault)
        .await?;
    if records.is_empty() {
        println!("{} No data in the selected range", style("!").yellow());
        return Ok(());
    }
    for record in &records {
        println!(
            "{} {}  {}  act={}  {}",
            record.event_date,
            record.event_time,
            crane_label(record.crane_id),
            record.act,
            record.fault.label()
        );
    }
    println!("{} {} records", style("✓").green(), records.len());

    Ok(())
}

/// Search fault references.
pub async fn cmd_faults(settings: &Settings, keyword: &str) -> anyhow::Result<()> {
    let (_, faults, _) = router(settings);
    let matches = faults.search(keyword).await?;
    if matches.is_empty() {
        println!("{} No fault matches \"{keyword}\"", style("!").yellow());
        return Ok(());
    }
    for fault in matches {
        println!("{:>5}  {}", fault.fault_id, fault.label());
    }

    Ok(())
}

/// List cranes with recorded data.
pub async fn cmd_cranes(settings: &Settings) -> anyhow::Result<()> {
    let (_, _, records) = router(settings);
    let cranes = records.distinct_cranes().await?;
    if cranes.is_empty() {
        println!("{} No data recorded yet", style("!").yellow());
        return Ok(());
    }
    for id in cranes {
        println!("{}", crane_label(id));
    }

    Ok(())
}

/// List years with recorded data for a crane (or the whole fleet).
pub async fn cmd_years(settings: &Settings, crane: &str) -> anyhow::Result<()> {
    let Some(crane) = CraneScope::parse(crane) else {
        anyhow::bail!("invalid crane: expected a number or \"all\"");
    };
    let (_, _, records) = router(settings);
    let years = records.distinct_years(crane.filter()).await?;
    if years.is_empty() {
        println!("{} No data recorded", style("!").yellow());
        return Ok(());
    }
    for year in years {
        println!("{year}");
    }

    Ok(())
}

/// Delete records in scope, honoring the bulk delete ceiling.
pub async fn cmd_delete(
    settings: &Settings,
    crane: &str,
    start: &str,
    end: &str,
    fault: &str,
    yes: bool,
) -> anyhow::Result<()> {
    let (router, _, _) = router(settings);
    let scope = resolve_scope(&router, crane, start, end, fault).await?;

    let count = router
        .count(scope.start, scope.end, scope.crane, scope.fault)
        .await?;
    if count == 0 {
        println!("{} No data in the selected range", style("!").yellow());
        return Ok(());
    }
    if count > settings.bulk_delete_limit {
        anyhow::bail!(
            "refusing to delete {count} records at once (limit {})",
            settings.bulk_delete_limit
        );
    }
    if !yes {
        println!(
            "{} Would delete {} records, rerun with --yes to confirm",
            style("!").yellow(),
            count
        );
        return Ok(());
    }

    let deleted = router
        .delete(scope.start, scope.end, scope.crane, scope.fault)
        .await?;
    println!("{} Deleted {} records", style("✓").green(), deleted);

    Ok(())
}
