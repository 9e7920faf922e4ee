//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::appmesh::DesiredResources;
use crate::config::ValidationResult;
use crate::model::{ObjectRef, StatusState, VirtualMesh, VirtualMeshStatus};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Desired resource row for table display.
#[derive(Tabled)]
struct ResourceRow {
    #[tabled(rename = "Kind")]
    kind: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Virtual mesh status row for table display.
#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Virtual mesh")]
    virtual_mesh: String,
    #[tabled(rename = "Enforcement")]
    policy: String,
    #[tabled(rename = "Meshes")]
    meshes: usize,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Observed")]
    observed: String,
    #[tabled(rename = "Message")]
    message: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats desired resources for display.
    #[must_use]
    pub fn format_plan(&self, plans: &[DesiredResources]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(plans).unwrap_or_default(),
            OutputFormat::Text => Self::format_plan_text(plans),
        }
    }

    /// Formats desired resources as text.
    fn format_plan_text(plans: &[DesiredResources]) -> String {
        if plans.is_empty() {
            return format!("{} No App Mesh meshes to plan.\n", "⚠".yellow());
        }

        let mut output = String::new();

        for plan in plans {
            let mode = if plan.enforced {
                "enforced".green()
            } else {
                "open".yellow()
            };
            let _ = write!(output, "\nMesh {} ({mode})\n\n", plan.mesh_name.bold());

            if plan.is_empty() {
                output.push_str("   No resources.\n");
            } else {
                let table = Table::new(Self::resource_rows(plan)).to_string();
                output.push_str(&table);
                output.push('\n');
            }

            let _ = write!(
                output,
                "\n{} routers, {} services, {} routes, {} nodes\n",
                plan.virtual_routers.len(),
                plan.virtual_services.len(),
                plan.routes.len(),
                plan.virtual_nodes.len()
            );

            for failure in &plan.route_failures {
                let _ = writeln!(output, "{} {failure}", "✗".red());
            }
        }

        output
    }

    fn resource_rows(plan: &DesiredResources) -> Vec<ResourceRow> {
        let mut rows = Vec::with_capacity(plan.len());

        for router in &plan.virtual_routers {
            let ports: Vec<String> = router
                .spec
                .listeners
                .iter()
                .map(|l| format!("{}/{}", l.port_mapping.port, l.port_mapping.protocol))
                .collect();
            rows.push(ResourceRow {
                kind: "VirtualRouter",
                name: router.virtual_router_name.clone(),
                detail: format!("listeners: {}", ports.join(", ")),
            });
        }

        for service in &plan.virtual_services {
            let provider = service
                .spec
                .provider
                .as_ref()
                .and_then(|p| p.virtual_router.as_ref())
                .map_or_else(|| String::from("-"), |r| r.virtual_router_name.clone());
            rows.push(ResourceRow {
                kind: "VirtualService",
                name: service.virtual_service_name.clone(),
                detail: format!("router: {provider}"),
            });
        }

        for route in &plan.routes {
            let targets = route
                .spec
                .http_route
                .as_ref()
                .map_or(0, |r| r.action.weighted_targets.len());
            rows.push(ResourceRow {
                kind: "Route",
                name: format!("{}/{}", route.virtual_router_name, route.route_name),
                detail: format!("{targets} weighted targets"),
            });
        }

        for node in &plan.virtual_nodes {
            let dns = node
                .spec
                .service_discovery
                .as_ref()
                .and_then(|d| d.dns.as_ref())
                .map_or("no dns", |d| d.hostname.as_str());
            rows.push(ResourceRow {
                kind: "VirtualNode",
                name: node.virtual_node_name.clone(),
                detail: format!("{} backends, {}", node.spec.backends.len(), Self::truncate(dns, 40)),
            });
        }

        rows
    }

    /// Formats virtual mesh statuses for display.
    #[must_use]
    pub fn format_status(&self, virtual_meshes: &[VirtualMesh]) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::to_string_pretty(virtual_meshes).unwrap_or_default()
            }
            OutputFormat::Text => Self::format_status_text(virtual_meshes),
        }
    }

    /// Formats statuses as text.
    fn format_status_text(virtual_meshes: &[VirtualMesh]) -> String {
        if virtual_meshes.is_empty() {
            return String::from("   No virtual meshes declared.\n");
        }

        let rows: Vec<StatusRow> = virtual_meshes
            .iter()
            .map(|vm| {
                let status = vm.status.as_ref();
                StatusRow {
                    virtual_mesh: vm.metadata.to_string(),
                    policy: vm.enforce_access_control.to_string(),
                    meshes: vm.meshes.len(),
                    state: status.map_or_else(
                        || Self::format_state(StatusState::Pending),
                        |s| Self::format_state(s.access_control_enforcement.state),
                    ),
                    observed: status.map_or_else(
                        || String::from("-"),
                        |s| s.observed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    ),
                    message: status
                        .and_then(|s| s.access_control_enforcement.message.as_deref())
                        .map_or_else(String::new, |m| Self::truncate(m, 60)),
                }
            })
            .collect();

        let mut output = Table::new(rows).to_string();
        output.push('\n');
        output
    }

    /// Formats the statuses written by a run.
    #[must_use]
    pub fn format_run(&self, statuses: &[(ObjectRef, VirtualMeshStatus)]) -> String {
        match self.format {
            OutputFormat::Json => {
                let entries: Vec<RunJson<'_>> = statuses
                    .iter()
                    .map(|(metadata, status)| RunJson {
                        virtual_mesh: metadata.to_string(),
                        status,
                    })
                    .collect();
                serde_json::to_string_pretty(&entries).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for (metadata, status) in statuses {
                    let enforcement = &status.access_control_enforcement;
                    let _ = write!(output, "{metadata}: {}", Self::format_state(enforcement.state));
                    if let Some(message) = &enforcement.message {
                        let _ = write!(output, " - {message}");
                    }
                    output.push('\n');
                }
                let accepted = statuses
                    .iter()
                    .filter(|(_, s)| s.access_control_enforcement.state == StatusState::Accepted)
                    .count();
                let _ = writeln!(output, "\n{accepted}/{} virtual meshes accepted", statuses.len());
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(
        &self,
        subject: &str,
        result: &ValidationResult,
        show_warnings: bool,
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "subject": subject,
                    "valid": result.is_valid(),
                    "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "warnings": result.warnings,
                });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = format!("{} {subject} is valid\n", "✓".green());
                if show_warnings {
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   {} {warning}", "⚠".yellow());
                    }
                } else if result.warning_count() > 0 {
                    let _ = writeln!(
                        output,
                        "   {} warnings (use --warnings to show)",
                        result.warning_count()
                    );
                }
                output
            }
        }
    }

    /// Formats a state with color.
    fn format_state(state: StatusState) -> String {
        match state {
            StatusState::Accepted => state.to_string().green().to_string(),
            StatusState::ProcessingError => state.to_string().red().to_string(),
            StatusState::Invalid => state.to_string().red().bold().to_string(),
            StatusState::Pending => state.to_string().dimmed().to_string(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow(), message)
    }

    fn message(&self, status: &str, symbol: &colored::ColoredString, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RunJson<'a> {
    virtual_mesh: String,
    status: &'a VirtualMeshStatus,
}
