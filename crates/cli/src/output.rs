//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use planner_lib::{Policy, PolicyStatus};
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Row for policy tables
#[derive(Tabled)]
pub struct PolicyRow {
    #[tabled(rename = "ID")]
    pub id: String,
    #[tabled(rename = "Algorithm")]
    pub algorithm: String,
    #[tabled(rename = "Window")]
    pub window: String,
    #[tabled(rename = "Cost")]
    pub cost: String,
    #[tabled(rename = "Over %")]
    pub over_provision: String,
    #[tabled(rename = "Under %")]
    pub under_provision: String,
    #[tabled(rename = "Container Acts")]
    pub container_actions: String,
    #[tabled(rename = "VM Types")]
    pub vm_types: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl From<&Policy> for PolicyRow {
    fn from(p: &Policy) -> Self {
        Self {
            id: p.id.to_string(),
            algorithm: p.algorithm.clone(),
            window: format!(
                "{} - {}",
                p.time_window_start.format("%Y-%m-%d %H:%M"),
                p.time_window_end.format("%Y-%m-%d %H:%M")
            ),
            cost: format_cost(p.metrics.cost),
            over_provision: format_pct(p.metrics.over_provision_pct),
            under_provision: format_pct(p.metrics.under_provision_pct),
            container_actions: p.metrics.number_container_scaling_actions.to_string(),
            vm_types: p.vm_types().join(","),
            status: color_status(p.status),
        }
    }
}

/// Print policies as a table
pub fn print_policy_table(policies: &[Policy]) {
    let rows: Vec<PolicyRow> = policies.iter().map(PolicyRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

pub fn format_cost(amount: f64) -> String {
    format!("{:.2}", amount)
}

pub fn format_pct(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Color a policy status
pub fn color_status(status: PolicyStatus) -> String {
    match status {
        PolicyStatus::Selected => status.as_str().green().bold().to_string(),
        PolicyStatus::Candidate => status.as_str().to_string(),
    }
}
