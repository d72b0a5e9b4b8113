//! Policy-related CLI commands

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use planner_lib::Policy;
use uuid::Uuid;

use crate::client::{ApiClient, PolicyList};
use crate::output::{print_info, print_policy_table, print_success, print_warning, OutputFormat};

fn window_query(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(start) = start {
        query.push(("start", start.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    if let Some(end) = end {
        query.push(("end", end.to_rfc3339_opts(SecondsFormat::Secs, true)));
    }
    query
}

fn print_policies(policies: &[Policy], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(policies)?);
        }
        OutputFormat::Table => {
            if policies.is_empty() {
                print_warning("No policies found");
                return Ok(());
            }
            print_policy_table(policies);
            println!("\nTotal: {} policies", policies.len());
        }
    }
    Ok(())
}

/// List stored policies, optionally bounded by window start and end
pub async fn list_policies(
    client: &ApiClient,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    format: OutputFormat,
) -> Result<()> {
    let result: PolicyList = client
        .get("api/v1/policies", &window_query(start, end))
        .await?;
    print_policies(&result.policies, format)
}

/// Show one policy with its scaling actions
pub async fn get_policy(client: &ApiClient, id: Uuid, format: OutputFormat) -> Result<()> {
    let policy: Policy = client.get(&format!("api/v1/policies/{}", id), &[]).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&policy)?),
        OutputFormat::Table => {
            print_policy_table(std::slice::from_ref(&policy));
            println!();
            for (i, action) in policy.scaling_actions.iter().enumerate() {
                let vms: Vec<String> = action
                    .desired_state
                    .vms
                    .iter()
                    .map(|(t, n)| format!("{}x{}", n, t))
                    .collect();
                println!(
                    "  {:>3}. {} -> {}  vms [{}]  cost {:.2}",
                    i,
                    action.time_start.format("%Y-%m-%d %H:%M"),
                    action.time_end.format("%Y-%m-%d %H:%M"),
                    vms.join(", "),
                    action.metrics.cost
                );
            }
        }
    }
    Ok(())
}

/// Show the selected policy of a window
pub async fn selected_policy(
    client: &ApiClient,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    format: OutputFormat,
) -> Result<()> {
    let policy: Policy = client
        .get(
            "api/v1/policies/selected",
            &window_query(Some(start), Some(end)),
        )
        .await?;
    print_policies(std::slice::from_ref(&policy), format)
}

/// Delete a stored policy; refuses unless forced
pub async fn delete_policy(client: &ApiClient, id: Uuid, force: bool) -> Result<()> {
    if !force {
        print_info("Are you sure you want to delete this policy? Use --force to delete it");
        return Ok(());
    }

    client.delete(&format!("api/v1/policies/{}", id)).await?;
    print_success(&format!("Policy {} deleted", id));
    Ok(())
}
