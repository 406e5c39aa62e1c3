//! Parameter-name normalization and load reporting for exported networks
//!
//! Networks trained with data-parallel wrappers carry a `module.` prefix on
//! every parameter name. Names are normalized by stripping that prefix, then
//! the graph is checked for parameters that are consumed but never provided
//! (missing) and parameters that are provided but never consumed
//! (unexpected). Mismatches are logged; they never fail the load.

use log::{info, warn};
use std::collections::HashSet;

/// Prefix added by data-parallel training wrappers
pub const PARALLEL_PREFIX: &str = "module.";

/// Maximum number of names listed per category in the load report
pub const REPORT_LIMIT: usize = 10;

/// Strip the prefix in place; returns whether the name changed
pub fn normalize_name(name: &mut String) -> bool {
    if name.starts_with(PARALLEL_PREFIX) {
        name.replace_range(..PARALLEL_PREFIX.len(), "");
        true
    } else {
        false
    }
}

/// Outcome of matching a network's parameters against its graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParameterReport {
    /// Names renamed by prefix stripping
    pub renamed: usize,
    /// Consumed by some node but produced by nothing
    pub missing: Vec<String>,
    /// Stored parameters that no node consumes
    pub unexpected: Vec<String>,
}

impl ParameterReport {
    /// Compare stored parameters with what the graph consumes and produces.
    ///
    /// `graph_inputs` and node outputs count as produced values, so only
    /// genuinely absent tensors are reported as missing. Empty names denote
    /// omitted optional inputs and are ignored.
    pub fn analyze<'a>(
        parameters: impl IntoIterator<Item = &'a str>,
        graph_inputs: impl IntoIterator<Item = &'a str>,
        node_inputs: impl IntoIterator<Item = &'a str>,
        node_outputs: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let parameters: Vec<&str> = parameters.into_iter().collect();
        let consumed: HashSet<&str> = node_inputs
            .into_iter()
            .filter(|name| !name.is_empty())
            .collect();
        let provided: HashSet<&str> = parameters
            .iter()
            .copied()
            .chain(graph_inputs)
            .chain(node_outputs)
            .collect();

        let mut missing: Vec<String> = consumed
            .iter()
            .filter(|name| !provided.contains(*name))
            .map(|name| (*name).to_string())
            .collect();
        missing.sort();

        let mut unexpected: Vec<String> = parameters
            .iter()
            .filter(|name| !consumed.contains(*name))
            .map(|name| (*name).to_string())
            .collect();
        unexpected.sort();
        unexpected.dedup();

        Self {
            renamed: 0,
            missing,
            unexpected,
        }
    }

    #[must_use]
    pub fn with_renamed(mut self, renamed: usize) -> Self {
        self.renamed = renamed;
        self
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }

    /// Log the report, listing at most [`REPORT_LIMIT`] names per category
    pub fn log(&self) {
        if self.renamed > 0 {
            info!(
                "🔧 Stripped '{}' prefix from {} tensor name(s)",
                PARALLEL_PREFIX, self.renamed
            );
        }

        if self.is_clean() {
            info!("✅ All network parameters matched");
            return;
        }

        if !self.missing.is_empty() {
            warn!(
                "⚠️ {} missing parameter(s): {}{}",
                self.missing.len(),
                preview(&self.missing),
                ellipsis(self.missing.len())
            );
        }
        if !self.unexpected.is_empty() {
            warn!(
                "⚠️ {} unexpected parameter(s): {}{}",
                self.unexpected.len(),
                preview(&self.unexpected),
                ellipsis(self.unexpected.len())
            );
        }
    }
}

fn preview(names: &[String]) -> String {
    names
        .iter()
        .take(REPORT_LIMIT)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn ellipsis(count: usize) -> &'static str {
    if count > REPORT_LIMIT {
        ", ..."
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_stripping() {
        // Only the leading prefix is removed
        let mut name = "module.module.fc".to_string();
        assert!(normalize_name(&mut name));
        assert_eq!(name, "module.fc");

        let mut name = "backbone.module.fc".to_string();
        assert!(!normalize_name(&mut name));
        assert_eq!(name, "backbone.module.fc");

        let mut name = "module.layer4.0.bn1.running_mean".to_string();
        assert!(normalize_name(&mut name));
        assert_eq!(name, "layer4.0.bn1.running_mean");
        assert!(!normalize_name(&mut name));
    }

    #[test]
    fn test_clean_report() {
        let report = ParameterReport::analyze(
            ["conv.weight", "conv.bias"],
            ["input"],
            ["input", "conv.weight", "conv.bias", "relu_in"],
            ["relu_in", "output"],
        );
        assert!(report.is_clean());
    }

    #[test]
    fn test_missing_and_unexpected() {
        let report = ParameterReport::analyze(
            ["conv.weight", "aux.weight"],
            ["input"],
            ["input", "conv.weight", "conv.bias", ""],
            ["output"],
        );
        assert_eq!(report.missing, vec!["conv.bias".to_string()]);
        assert_eq!(report.unexpected, vec!["aux.weight".to_string()]);
        assert!(!report.is_clean());
        report.with_renamed(3).log();
    }

    #[test]
    fn test_preview_is_bounded() {
        let names: Vec<String> = (0..25).map(|i| format!("p{}", i)).collect();
        assert_eq!(preview(&names).split(", ").count(), REPORT_LIMIT);
        assert_eq!(ellipsis(names.len()), ", ...");
        assert_eq!(ellipsis(3), "");
    }
}
