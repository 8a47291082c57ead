// SPDX-FileCopyrightText: 2026 Sightline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Workflow output and the post-run analysis of the conversation.
//!
//! Tool calls are paired with their results by tool call ID. A call succeeds
//! when a result exists and is not flagged as an error. Charts are read from
//! successful create/modify calls: the file contents come from the call's
//! arguments and the IDs from its result.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sightline_core::messages::{ChatMessage, ContentPart, Role};
use strum::{AsRefStr, Display};

use crate::steps::agents::EXECUTE_SQL_TOOL;
use crate::steps::analysis_mode::AnalysisMode;
use crate::steps::extract_values::ExtractedValues;
use crate::termination::EarlyTermination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallInfo {
    pub tool_call_id: String,
    pub tool_name: String,
    pub args: Value,
    pub result: Option<Value>,
    pub success: bool,
    /// Result text of a failed call.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    MetricFile,
    DashboardFile,
    ReportFile,
}

impl ChartKind {
    fn for_tool(tool_name: &str) -> Option<Self> {
        match tool_name {
            "createMetrics" | "modifyMetrics" => Some(Self::MetricFile),
            "createDashboards" | "modifyDashboards" => Some(Self::DashboardFile),
            "createReports" | "modifyReports" => Some(Self::ReportFile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartInfo {
    pub id: String,
    pub name: String,
    pub kind: ChartKind,
    /// `chartConfig.selectedChartType` of a metric.
    pub chart_type: Option<String>,
    pub sql: Option<String>,
    pub content: String,
    pub tool_call_id: String,
}

/// Tool activity that followed one user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRequestSegment {
    pub user_message_index: usize,
    pub user_message: String,
    pub tool_calls: Vec<ToolCallInfo>,
    pub charts_created: Vec<ChartInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub total_tool_calls: usize,
    pub successful_tool_calls: usize,
    pub failed_tool_calls: usize,
    pub total_charts_created: usize,
    pub charts_by_type: BTreeMap<String, usize>,
    pub total_sql_queries: usize,
    pub unique_tools_used: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowAnalysis {
    pub all_tool_calls: Vec<ToolCallInfo>,
    pub failed_tool_calls: Vec<ToolCallInfo>,
    pub charts_created: Vec<ChartInfo>,
    pub segments: Vec<UserRequestSegment>,
    pub summary: WorkflowSummary,
}

/// Everything a completed run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutput {
    pub workflow_id: String,
    pub chat_id: String,
    pub message_id: String,
    pub user_id: String,
    pub organization_id: String,
    pub data_source_id: Option<String>,
    pub title: String,
    pub todos: String,
    pub analysis_mode: AnalysisMode,
    pub analysis_mode_reasoning: String,
    pub extracted_values: ExtractedValues,
    pub early_termination: Option<EarlyTermination>,
    pub messages: Vec<ChatMessage>,
    pub analysis: WorkflowAnalysis,
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
}

impl WorkflowOutput {
    /// Text to show the user: the final tool's response argument, else the
    /// last assistant text.
    pub fn response_text(&self) -> Option<String> {
        let from_tool = self.analysis.all_tool_calls.iter().rev().find_map(|call| {
            let field = match EarlyTermination::from_tool_name(&call.tool_name) {
                Some(kind) => kind.response_field(),
                None if call.tool_name == crate::steps::agents::DONE_TOOL => "final_response",
                None => return None,
            };
            call.args.get(field).and_then(Value::as_str).map(str::to_string)
        });
        from_tool.filter(|t| !t.trim().is_empty()).or_else(|| {
            self.messages
                .iter()
                .rev()
                .filter(|m| m.role == Role::Assistant)
                .map(ChatMessage::text_content)
                .find(|t| !t.trim().is_empty())
        })
    }
}

fn result_error_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("error")
            .or_else(|| map.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| result.to_string()),
        other => other.to_string(),
    }
}

/// Pair every tool call with its result, in conversation order.
pub fn collect_tool_calls(messages: &[ChatMessage]) -> Vec<ToolCallInfo> {
    let mut results: HashMap<&str, (&Value, bool)> = HashMap::new();
    for part in messages.iter().flat_map(|m| &m.content) {
        if let ContentPart::ToolResult {
            tool_call_id,
            result,
            is_error,
            ..
        } = part
        {
            results.insert(tool_call_id.as_str(), (result, *is_error));
        }
    }

    messages
        .iter()
        .filter(|m| m.role == Role::Assistant)
        .flat_map(|m| &m.content)
        .filter_map(|part| match part {
            ContentPart::ToolCall {
                tool_call_id,
                tool_name,
                args,
            } => Some(tool_call_info(tool_call_id, tool_name, args, results.get(tool_call_id.as_str()))),
            _ => None,
        })
        .collect()
}

fn tool_call_info(
    tool_call_id: &str,
    tool_name: &str,
    args: &Value,
    result: Option<&(&Value, bool)>,
) -> ToolCallInfo {
    let success = matches!(result, Some((_, false)));
    let error = match result {
        Some((value, true)) => Some(result_error_text(value)),
        _ => None,
    };
    ToolCallInfo {
        tool_call_id: tool_call_id.to_string(),
        tool_name: tool_name.to_string(),
        args: args.clone(),
        result: result.map(|(value, _)| (*value).clone()),
        success,
        error,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Chart type and SQL from a metric's YAML. Unparseable YAML yields neither.
fn metric_details(yml: &str) -> (Option<String>, Option<String>) {
    let Ok(doc) = serde_yaml::from_str::<serde_yaml::Value>(yml) else {
        return (None, None);
    };
    let chart_type = doc
        .get("chartConfig")
        .and_then(|c| c.get("selectedChartType"))
        .and_then(serde_yaml::Value::as_str)
        .map(str::to_string);
    let sql = doc
        .get("sql")
        .and_then(serde_yaml::Value::as_str)
        .map(|s| s.trim().to_string());
    (chart_type, sql)
}

/// Charts created or modified by one successful call.
pub fn extract_charts(call: &ToolCallInfo) -> Vec<ChartInfo> {
    let Some(kind) = ChartKind::for_tool(&call.tool_name) else {
        return Vec::new();
    };
    let (true, Some(result)) = (call.success, call.result.as_ref()) else {
        return Vec::new();
    };
    let Some(created) = result.get("files").and_then(Value::as_array) else {
        return Vec::new();
    };
    let requested = call.args.get("files").and_then(Value::as_array);

    created
        .iter()
        .enumerate()
        .filter_map(|(i, file)| {
            let id = str_field(file, "id")?.to_string();
            let source = requested.and_then(|files| files.get(i));
            let content = source
                .and_then(|f| match kind {
                    ChartKind::ReportFile => str_field(f, "content").or_else(|| str_field(f, "yml_content")),
                    _ => str_field(f, "yml_content"),
                })
                .unwrap_or_default()
                .to_string();
            let name = str_field(file, "name")
                .or_else(|| source.and_then(|f| str_field(f, "name")))
                .unwrap_or_default()
                .to_string();
            let (chart_type, sql) = match kind {
                ChartKind::MetricFile => metric_details(&content),
                _ => (None, None),
            };
            Some(ChartInfo {
                id,
                name,
                kind,
                chart_type,
                sql,
                content,
                tool_call_id: call.tool_call_id.clone(),
            })
        })
        .collect()
}

/// Split tool activity by the user message it followed.
pub fn segment_by_user_request(messages: &[ChatMessage]) -> Vec<UserRequestSegment> {
    let mut segments = Vec::new();
    let mut start: Option<usize> = None;
    for (index, message) in messages.iter().enumerate() {
        if message.role == Role::User {
            if let Some(begin) = start {
                segments.push(build_segment(messages, begin, index));
            }
            start = Some(index);
        }
    }
    if let Some(begin) = start {
        segments.push(build_segment(messages, begin, messages.len()));
    }
    segments
}

fn build_segment(messages: &[ChatMessage], begin: usize, end: usize) -> UserRequestSegment {
    // Results may land after the next user message, so pair against the whole conversation.
    let all = collect_tool_calls(messages);
    let in_range: BTreeSet<String> = collect_tool_calls(&messages[begin..end])
        .into_iter()
        .map(|c| c.tool_call_id)
        .collect();
    let tool_calls: Vec<ToolCallInfo> = all
        .into_iter()
        .filter(|c| in_range.contains(&c.tool_call_id))
        .collect();
    let charts_created = tool_calls.iter().flat_map(extract_charts).collect();
    UserRequestSegment {
        user_message_index: begin,
        user_message: messages[begin].text_content(),
        tool_calls,
        charts_created,
    }
}

fn sql_query_count(call: &ToolCallInfo) -> usize {
    call.args
        .get("statements")
        .and_then(Value::as_array)
        .map(|s| s.len())
        .unwrap_or(1)
}

/// Analyze a finished conversation.
pub fn analyze(messages: &[ChatMessage]) -> WorkflowAnalysis {
    let all_tool_calls = collect_tool_calls(messages);
    let failed_tool_calls: Vec<ToolCallInfo> =
        all_tool_calls.iter().filter(|c| !c.success).cloned().collect();
    let charts_created: Vec<ChartInfo> = all_tool_calls.iter().flat_map(extract_charts).collect();

    let mut charts_by_type = BTreeMap::new();
    for chart in &charts_created {
        *charts_by_type.entry(chart.kind.to_string()).or_insert(0) += 1;
    }
    let unique_tools_used: BTreeSet<String> =
        all_tool_calls.iter().map(|c| c.tool_name.clone()).collect();

    let summary = WorkflowSummary {
        total_tool_calls: all_tool_calls.len(),
        successful_tool_calls: all_tool_calls.len() - failed_tool_calls.len(),
        failed_tool_calls: failed_tool_calls.len(),
        total_charts_created: charts_created.len(),
        charts_by_type,
        total_sql_queries: all_tool_calls
            .iter()
            .filter(|c| c.tool_name == EXECUTE_SQL_TOOL)
            .map(sql_query_count)
            .sum(),
        unique_tools_used: unique_tools_used.into_iter().collect(),
    };

    WorkflowAnalysis {
        segments: segment_by_user_request(messages),
        all_tool_calls,
        failed_tool_calls,
        charts_created,
        summary,
    }
}
