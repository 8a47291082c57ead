// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Analyst workflow for Sightline.
//!
//! Four independent prep steps run concurrently, then a think-and-prep agent
//! plans the analysis and an analyst agent builds the assets. The finished
//! conversation is aggregated into tool call, chart and summary reports.

pub mod input;
pub mod output;
pub mod steps;
pub mod store;
pub mod termination;
pub mod workflow;

pub use input::{Dataset, WorkflowContext, WorkflowInput};
pub use output::{
    ChartInfo, ChartKind, ToolCallInfo, UserRequestSegment, WorkflowAnalysis, WorkflowOutput,
    WorkflowSummary, analyze,
};
pub use steps::analysis_mode::{AnalysisMode, AnalysisModeDecision};
pub use steps::extract_values::ExtractedValues;
pub use store::{MessageStore, TitleSink};
pub use termination::EarlyTermination;
pub use workflow::{AnalystWorkflow, merge_prep_results};
