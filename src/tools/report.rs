//! Power BI report URL composition.
//!
//! This module implements the `generate_powerbi_url` MCP tool. Composition is
//! a pure function over the configured workspace/report identifiers: no
//! network access and no check that the run identifier exists.
//!
//! One canonical [`VisualHint`] enumeration reconciles the two historical
//! spellings of visualization kinds: the insert path's English names
//! (`line|bar|pie|table`) and the report page map's Spanish names
//! (`linea|barras|barras_agrupadas|pie`). Unknown hints fall back to the
//! default report page.

use crate::error::{DbError, DbResult};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Report page used when the visual hint is unknown or has no dedicated page.
pub const DEFAULT_PAGE_NAME: &str = "ReportSectionBarras";

/// Canonical visualization kinds accepted across the tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisualHint {
    Line,
    Bar,
    GroupedBar,
    Pie,
    Table,
}

impl VisualHint {
    /// Parse a caller-supplied hint, accepting both the English and Spanish
    /// spellings. Returns None for anything unrecognized.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "linea" => Some(Self::Line),
            "bar" | "barras" => Some(Self::Bar),
            "grouped_bar" | "barras_agrupadas" => Some(Self::GroupedBar),
            "pie" => Some(Self::Pie),
            "table" | "tabla" => Some(Self::Table),
            _ => None,
        }
    }

    /// Canonical name stored in the agent_output table.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::GroupedBar => "grouped_bar",
            Self::Pie => "pie",
            Self::Table => "table",
        }
    }

    /// Report page for this kind. Tables have no dedicated page and use the
    /// default.
    pub fn page_name(&self) -> &'static str {
        match self {
            Self::Line => "Line",
            Self::Bar => "Bar",
            Self::GroupedBar => "StackedBar",
            Self::Pie => "PieChart",
            Self::Table => DEFAULT_PAGE_NAME,
        }
    }
}

/// Fixed report location read from configuration at startup.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub workspace_id: String,
    pub report_id: String,
}

/// Resolve a raw hint string to a report page name.
pub fn resolve_page_name(visual_hint: &str) -> &'static str {
    VisualHint::parse(visual_hint)
        .map(|h| h.page_name())
        .unwrap_or(DEFAULT_PAGE_NAME)
}

/// Compose the report URL for a run.
///
/// The OData filter value is percent-encoded in full so any character in the
/// run identifier survives the round trip through URL decoding.
pub fn compose_report_url(config: &ReportConfig, run_id: &str, visual_hint: &str) -> String {
    let page_name = resolve_page_name(visual_hint);
    let filter = format!("agent_output/run_id eq '{run_id}'");
    let encoded_filter = utf8_percent_encode(&filter, NON_ALPHANUMERIC);

    format!(
        "https://app.powerbi.com/groups/{}/reports/{}?pageName={}&filter={}",
        config.workspace_id, config.report_id, page_name, encoded_filter
    )
}

/// Input for the generate_powerbi_url tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct GenerateReportUrlInput {
    /// Run identifier returned by insert_agent_output_batch
    pub run_id: String,
    /// Visualization kind: line, bar, grouped_bar, pie, or table
    /// (linea/barras/barras_agrupadas also accepted)
    pub visual_hint: String,
}

/// Output from the generate_powerbi_url tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ReportUrlOutput {
    /// Constructed report URL with a fully percent-encoded filter
    pub url: String,
    /// Report page the hint resolved to
    pub page_name: String,
    pub run_id: String,
}

/// Handler for report URL generation.
pub struct ReportToolHandler {
    config: ReportConfig,
}

impl ReportToolHandler {
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Handle the generate_powerbi_url tool call.
    pub fn generate_powerbi_url(&self, input: GenerateReportUrlInput) -> DbResult<ReportUrlOutput> {
        if self.config.workspace_id.is_empty() || self.config.report_id.is_empty() {
            return Err(DbError::validation(
                "Report workspace is not configured. Set WORKSPACE_ID and REPORT_ID.",
            ));
        }

        let url = compose_report_url(&self.config, &input.run_id, &input.visual_hint);
        Ok(ReportUrlOutput {
            url,
            page_name: resolve_page_name(&input.visual_hint).to_string(),
            run_id: input.run_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;

    fn test_config() -> ReportConfig {
        ReportConfig {
            workspace_id: "ws-123".to_string(),
            report_id: "rep-456".to_string(),
        }
    }

    #[test]
    fn test_parse_accepts_both_spellings() {
        assert_eq!(VisualHint::parse("line"), Some(VisualHint::Line));
        assert_eq!(VisualHint::parse("linea"), Some(VisualHint::Line));
        assert_eq!(VisualHint::parse("bar"), Some(VisualHint::Bar));
        assert_eq!(VisualHint::parse("barras"), Some(VisualHint::Bar));
        assert_eq!(
            VisualHint::parse("barras_agrupadas"),
            Some(VisualHint::GroupedBar)
        );
        assert_eq!(VisualHint::parse("pie"), Some(VisualHint::Pie));
        assert_eq!(VisualHint::parse("table"), Some(VisualHint::Table));
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        assert_eq!(VisualHint::parse(" Pie "), Some(VisualHint::Pie));
        assert_eq!(VisualHint::parse("BARRAS"), Some(VisualHint::Bar));
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert_eq!(VisualHint::parse("scatter"), None);
        assert_eq!(VisualHint::parse(""), None);
    }

    #[test]
    fn test_page_names_match_fixed_map() {
        assert_eq!(resolve_page_name("linea"), "Line");
        assert_eq!(resolve_page_name("barras"), "Bar");
        assert_eq!(resolve_page_name("barras_agrupadas"), "StackedBar");
        assert_eq!(resolve_page_name("pie"), "PieChart");
    }

    #[test]
    fn test_unknown_hint_uses_default_page() {
        assert_eq!(resolve_page_name("scatter"), DEFAULT_PAGE_NAME);
        assert_eq!(resolve_page_name(""), DEFAULT_PAGE_NAME);
        assert_eq!(resolve_page_name("table"), DEFAULT_PAGE_NAME);
    }

    #[test]
    fn test_url_embeds_workspace_report_and_page() {
        let url = compose_report_url(&test_config(), "run-1", "pie");
        assert!(url.starts_with("https://app.powerbi.com/groups/ws-123/reports/rep-456?"));
        assert!(url.contains("pageName=PieChart"));
    }

    #[test]
    fn test_filter_is_fully_percent_encoded() {
        let url = compose_report_url(&test_config(), "run-1", "pie");
        let filter = url.split("&filter=").nth(1).unwrap();
        // Nothing outside [A-Za-z0-9%] survives encoding
        assert!(
            filter
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '%')
        );
    }

    #[test]
    fn test_filter_round_trips_through_url_decoding() {
        let run_id = "abc 123/x'y&z=?#";
        let url = compose_report_url(&test_config(), run_id, "bar");
        let filter = url.split("&filter=").nth(1).unwrap();
        let decoded = percent_decode_str(filter).decode_utf8().unwrap();
        assert_eq!(decoded, format!("agent_output/run_id eq '{run_id}'"));
    }

    #[test]
    fn test_handler_rejects_unconfigured_workspace() {
        let handler = ReportToolHandler::new(ReportConfig {
            workspace_id: String::new(),
            report_id: String::new(),
        });
        let err = handler
            .generate_powerbi_url(GenerateReportUrlInput {
                run_id: "run-1".to_string(),
                visual_hint: "pie".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[test]
    fn test_handler_output() {
        let handler = ReportToolHandler::new(test_config());
        let output = handler
            .generate_powerbi_url(GenerateReportUrlInput {
                run_id: "run-1".to_string(),
                visual_hint: "linea".to_string(),
            })
            .unwrap();
        assert_eq!(output.page_name, "Line");
        assert_eq!(output.run_id, "run-1");
        assert!(output.url.contains("pageName=Line"));
    }
}
