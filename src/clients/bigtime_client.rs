use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::read_body;
use crate::error::UpstreamError;
use crate::models::budget::ProjectBudget;

pub const DEFAULT_BASE_URL: &str = "https://iq.bigtime.net/BigtimeData/api/v2";

#[derive(Debug, Clone)]
pub enum BigTimeAuth {
    /// Permanent firm-level API token.
    FirmToken { api_token: String },
    /// User login exchanged for a session token.
    Credentials { username: String, password: String },
}

#[derive(Debug, Serialize)]
struct SessionRequest<'a> {
    #[serde(rename = "UserId")]
    user_id: &'a str,
    #[serde(rename = "Pwd")]
    pwd: &'a str,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    #[serde(default)]
    firm: Value,
}

#[derive(Debug, Clone)]
struct SessionHeaders {
    token_header: &'static str,
    token: String,
    realm: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskTotals {
    pub budget_hours: f64,
    pub logged_hours: f64,
    pub task_count: usize,
}

pub struct BigTimeClient {
    http: reqwest::Client,
    base_url: String,
    auth: BigTimeAuth,
    session: Mutex<Option<SessionHeaders>>,
}

impl BigTimeClient {
    pub fn new(auth: BigTimeAuth, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            auth,
            session: Mutex::new(None),
        }
    }

    async fn session(&self, realm: &str) -> Result<SessionHeaders, UpstreamError> {
        let mut session = self.session.lock().await;
        if let Some(headers) = session.as_ref() {
            return Ok(headers.clone());
        }
        let headers = match &self.auth {
            BigTimeAuth::FirmToken { api_token } => SessionHeaders {
                token_header: "X-Auth-ApiToken",
                token: api_token.clone(),
                realm: realm.to_string(),
            },
            BigTimeAuth::Credentials { username, password } => {
                let response = self
                    .http
                    .post(format!("{}/session", self.base_url))
                    .header("Accept", "application/json")
                    .json(&SessionRequest {
                        user_id: username,
                        pwd: password,
                    })
                    .send()
                    .await?;
                let body = read_body(response).await?;
                let parsed: SessionResponse = serde_json::from_str(&body).map_err(|e| {
                    UpstreamError::Auth(format!("unreadable BigTime session response: {}", e))
                })?;
                SessionHeaders {
                    token_header: "X-Auth-Token",
                    token: parsed.token,
                    realm: if realm.is_empty() {
                        value_to_string(&parsed.firm).unwrap_or_default()
                    } else {
                        realm.to_string()
                    },
                }
            }
        };
        *session = Some(headers.clone());
        Ok(headers)
    }

    async fn get_json(&self, realm: &str, path: &str) -> Result<Value, UpstreamError> {
        let headers = self.session(realm).await?;
        debug!(path, "BigTime request");
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("Accept", "application/json")
            .header(headers.token_header, headers.token)
            .header("X-Auth-Realm", headers.realm)
            .send()
            .await?;
        let body = read_body(response).await?;
        serde_json::from_str(&body)
            .map_err(|e| UpstreamError::Network(format!("unreadable BigTime response: {}", e)))
    }

    async fn project_totals(&self, realm: &str, project_sid: &str) -> Result<TaskTotals, UpstreamError> {
        let tasks = self
            .get_json(
                realm,
                &format!("/task/listByProject/{}?showCompleted=False", project_sid),
            )
            .await?;
        let status = self
            .get_json(realm, &format!("/task/BudgetStatusByProject/{}", project_sid))
            .await?;
        Ok(summarize_tasks(&tasks, &status))
    }

    /// Active projects with budget and logged hours summed over their open tasks.
    pub async fn get_project_summaries(&self, realm: &str) -> Result<Vec<ProjectBudget>, UpstreamError> {
        let projects = self.get_json(realm, "/project").await?;
        let mut summaries = Vec::new();
        for project in projects.as_array().into_iter().flatten() {
            let Some(sid) = field_string(project, &["SystemId", "Id"]) else {
                continue;
            };
            let totals = match self.project_totals(realm, &sid).await {
                Ok(totals) => totals,
                Err(err @ UpstreamError::Auth(_)) => return Err(err),
                Err(err) => {
                    warn!(project = %sid, error = %err, "no task budgets for project");
                    TaskTotals::default()
                }
            };
            summaries.push(project_budget(project, sid, totals));
        }
        Ok(summaries)
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| value.get(*key).and_then(value_to_string))
}

fn field_f64(value: &Value, keys: &[&str]) -> f64 {
    keys.iter()
        .find_map(|key| value.get(*key).and_then(Value::as_f64))
        .unwrap_or(0.0)
}

fn field_date(value: &Value, key: &str) -> Option<NaiveDate> {
    let raw = value.get(key)?.as_str()?;
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

/// Joins task budgets with budget-status actuals by task id.
pub fn summarize_tasks(tasks: &Value, status: &Value) -> TaskTotals {
    let logged_by_task: HashMap<String, f64> = status
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let sid = field_string(entry, &["TaskSid"])?;
            Some((sid, field_f64(entry, &["HoursInput"])))
        })
        .collect();

    let mut totals = TaskTotals::default();
    for task in tasks.as_array().into_iter().flatten() {
        let sid = field_string(task, &["TaskSid", "Id"]);
        totals.budget_hours += field_f64(task, &["BudgetHrs", "BudgetHours"]);
        totals.logged_hours += sid
            .and_then(|sid| logged_by_task.get(&sid).copied())
            .unwrap_or(0.0);
        totals.task_count += 1;
    }
    totals
}

fn project_budget(project: &Value, project_id: String, totals: TaskTotals) -> ProjectBudget {
    ProjectBudget {
        project_id,
        name: field_string(project, &["Nm", "Name"]).unwrap_or_default(),
        code: field_string(project, &["ProjectCode"]).unwrap_or_default(),
        start_date: field_date(project, "StartDt"),
        end_date: field_date(project, "EndDt"),
        budget_hours: totals.budget_hours,
        logged_hours: totals.logged_hours,
        task_count: totals.task_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn summarizes_tasks_against_budget_status() {
        let tasks = json!([
            {"TaskSid": 11, "Nm": "Design", "BudgetHrs": 40.0},
            {"TaskSid": 12, "Nm": "Build", "BudgetHours": 60},
            {"Id": 13, "Nm": "Unbudgeted", "BudgetHrs": null}
        ]);
        let status = json!([
            {"TaskSid": 11, "HoursInput": 12.5},
            {"TaskSid": 12, "HoursInput": 20},
            {"TaskSid": 99, "HoursInput": 100}
        ]);

        let totals = summarize_tasks(&tasks, &status);
        assert_eq!(
            totals,
            TaskTotals {
                budget_hours: 100.0,
                logged_hours: 32.5,
                task_count: 3,
            }
        );
    }

    #[test]
    fn non_array_payloads_sum_to_zero() {
        let totals = summarize_tasks(&json!({"Message": "denied"}), &Value::Null);
        assert_eq!(totals, TaskTotals::default());
    }

    #[test]
    fn builds_project_budget_from_listing() {
        let project = json!({
            "SystemId": 501,
            "Nm": "Website refresh",
            "ProjectCode": "WEB-01",
            "StartDt": "2026-09-01T00:00:00",
            "EndDt": ""
        });
        let totals = TaskTotals {
            budget_hours: 100.0,
            logged_hours: 30.0,
            task_count: 2,
        };

        let budget = project_budget(&project, "501".to_string(), totals);
        assert_eq!(budget.name, "Website refresh");
        assert_eq!(budget.code, "WEB-01");
        assert_eq!(budget.start_date, NaiveDate::from_ymd_opt(2026, 9, 1));
        assert_eq!(budget.end_date, None);
        assert_eq!(budget.remaining_hours(), 70.0);
    }

    #[test]
    fn project_ids_accept_numbers_and_strings() {
        assert_eq!(field_string(&json!({"Id": 7}), &["SystemId", "Id"]), Some("7".to_string()));
        assert_eq!(field_string(&json!({"SystemId": "x1"}), &["SystemId", "Id"]), Some("x1".to_string()));
        assert_eq!(field_string(&json!({"SystemId": ""}), &["SystemId"]), None);
    }
}
