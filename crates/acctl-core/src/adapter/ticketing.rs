//! Ticketing system REST adapter (blocking).
//!
//! Authenticates once per run with the admin web-services key and holds the
//! bearer token for the process lifetime. All mutations here are ticket
//! bookkeeping: workflow approvals, status transitions, task-feed comments,
//! group membership, and requestor reassignment.

use crate::config::{TicketingConfig, TicketingCredentials};
use crate::error::{AcctlError, Result};
use crate::types::Classification;
use serde_json::{json, Value};
use std::time::Duration;

use super::TicketingClient;

#[derive(Debug)]
pub struct TicketingAdapter {
    http: reqwest::blocking::Client,
    config: TicketingConfig,
    token: String,
}

impl TicketingAdapter {
    /// Log in with the admin key and hold the bearer token for the run.
    pub fn connect(config: TicketingConfig, credentials: &TicketingCredentials) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let url = format!("{}/auth/loginadmin", config.base_url);
        let response = http
            .post(&url)
            .json(&json!({
                "BEID": credentials.beid,
                "WebServicesKey": credentials.web_services_key,
            }))
            .send()
            .map_err(|e| net_err(e))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::FORBIDDEN
        {
            return Err(AcctlError::auth("ticketing", "admin login rejected"));
        }
        let token = response.error_for_status().map_err(AcctlError::Http)?.text()?;

        Ok(Self {
            http,
            config,
            token: format!("Bearer {}", token.trim()),
        })
    }

    fn app_url(&self, tail: &str) -> String {
        format!("{}/{}/{}", self.config.base_url, self.config.app_id, tail)
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .map_err(net_err)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AcctlError::auth("ticketing", format!("{status} for {what}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AcctlError::not_found("ticketing", what.to_string()));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AcctlError::transient(
                "ticketing",
                format!("{status} for {what}"),
            ));
        }
        let response = response.error_for_status().map_err(AcctlError::Http)?;
        let text = response.text()?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|_| AcctlError::UnexpectedPayload(format!("{what}: non-JSON body")))
    }

    fn get_ticket(&self, ticket_id: u64) -> Result<Value> {
        self.send(
            self.http.get(self.app_url(&format!("tickets/{ticket_id}"))),
            &format!("ticket {ticket_id}"),
        )
    }

    fn set_status(&self, ticket_id: u64, status_id: u64) -> Result<()> {
        let patch = json!([{ "op": "replace", "path": "/StatusID", "value": status_id }]);
        self.send(
            self.http
                .patch(self.app_url(&format!("tickets/{ticket_id}")))
                .json(&patch),
            &format!("ticket {ticket_id} status"),
        )?;
        Ok(())
    }

    /// Person UID for a username, via the people search endpoint.
    fn person_uid(&self, username: &str) -> Result<String> {
        let login = if username.contains('@') {
            username.to_string()
        } else {
            format!("{username}@{}", self.config.user_domain)
        };
        let results = self.send(
            self.http
                .post(format!("{}/people/search", self.config.base_url))
                .json(&json!({ "UserName": login })),
            &format!("person {login}"),
        )?;
        results
            .as_array()
            .and_then(|a| a.first())
            .and_then(|p| p["UID"].as_str())
            .map(str::to_string)
            .ok_or_else(|| AcctlError::not_found("ticketing", format!("person {login}")))
    }
}

impl TicketingClient for TicketingAdapter {
    fn search_new_separations(&self) -> Result<Vec<u64>> {
        let body = json!({
            "MaxResults": 0,
            "TypeIDs": self.config.separation_type_ids,
            "StatusIDs": self.config.new_status_ids,
        });
        let results = self.send(
            self.http.post(self.app_url("tickets/search")).json(&body),
            "separation search",
        )?;
        let tickets = results
            .as_array()
            .ok_or_else(|| AcctlError::UnexpectedPayload("search: expected array".into()))?;
        Ok(tickets
            .iter()
            .filter_map(|t| t["ID"].as_u64())
            .collect())
    }

    fn ticket_erp_id(&self, ticket_id: u64) -> Result<String> {
        let ticket = self.get_ticket(ticket_id)?;
        ticket["Attributes"]
            .as_array()
            .and_then(|attrs| {
                attrs
                    .iter()
                    .find(|a| a["ID"].as_u64() == Some(self.config.erp_attribute_id))
            })
            .and_then(|a| a["Value"].as_str())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                AcctlError::not_found("ticketing", format!("ERP id attribute on ticket {ticket_id}"))
            })
    }

    fn advance_workflow(&self, ticket_id: u64, classification: Classification) -> Result<String> {
        let action_id = match classification {
            Classification::Student => "Choice1",
            Classification::Retiree => "Choice2",
            Classification::Employee => "Choice3",
        };
        let approval = self.send(
            self.http
                .post(self.app_url(&format!("tickets/{ticket_id}/workflow/approve")))
                .json(&json!({
                    "StepID": self.config.workflow_step_id,
                    "ActionID": action_id,
                })),
            &format!("workflow approve on ticket {ticket_id}"),
        )?;
        self.set_status(ticket_id, self.config.status_in_process)?;
        Ok(approval["Message"].as_str().unwrap_or_default().to_string())
    }

    fn complete_with_comment(&self, ticket_id: u64, comment: &str) -> Result<()> {
        let ticket = self.get_ticket(ticket_id)?;
        let task_id = ticket["Tasks"]
            .as_array()
            .and_then(|tasks| tasks.first())
            .and_then(|t| t["ID"].as_u64())
            .ok_or_else(|| {
                AcctlError::not_found("ticketing", format!("task on ticket {ticket_id}"))
            })?;

        self.send(
            self.http
                .post(self.app_url(&format!("tickets/{ticket_id}/tasks/{task_id}/feed")))
                .json(&json!({
                    "PercentComplete": 100,
                    "Comments": comment,
                    "IsPrivate": true,
                    "IsRichHtml": false,
                })),
            &format!("task feed on ticket {ticket_id}"),
        )?;
        self.set_status(ticket_id, self.config.status_open)
    }

    fn remove_employee_group(&self, username: &str) -> Result<()> {
        let uid = self.person_uid(username)?;
        self.send(
            self.http.delete(format!(
                "{}/people/{}/groups/{}",
                self.config.base_url, uid, self.config.employees_group_id
            )),
            &format!("employee group for {username}"),
        )?;
        Ok(())
    }

    fn reassign_requestor(&self, ticket_id: u64, requestor_uid: &str) -> Result<()> {
        let patch = json!([{
            "op": "replace",
            "path": "/RequestorUid",
            "value": requestor_uid,
        }]);
        self.send(
            self.http
                .patch(format!(
                    "{}?notifyNewResponsible=false",
                    self.app_url(&format!("tickets/{ticket_id}"))
                ))
                .json(&patch),
            &format!("requestor on ticket {ticket_id}"),
        )?;
        Ok(())
    }
}

fn net_err(e: reqwest::Error) -> AcctlError {
    if e.is_timeout() || e.is_connect() {
        AcctlError::transient("ticketing", e.to_string())
    } else {
        AcctlError::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Classification;

    fn test_config(base_url: String) -> TicketingConfig {
        TicketingConfig {
            base_url,
            app_id: "431".to_string(),
            credentials: "secrets/ticketing.json".into(),
            erp_attribute_id: 9001,
            workflow_step_id: "step-1".to_string(),
            status_in_process: 20,
            status_open: 10,
            separation_type_ids: vec![77],
            new_status_ids: vec![1],
            employees_group_id: 55,
            user_domain: "example.com".to_string(),
        }
    }

    fn credentials() -> TicketingCredentials {
        TicketingCredentials {
            beid: "B1".to_string(),
            web_services_key: "K1".to_string(),
        }
    }

    fn connect(server: &mockito::ServerGuard) -> TicketingAdapter {
        TicketingAdapter::connect(test_config(server.url()), &credentials()).unwrap()
    }

    #[test]
    fn connect_holds_bearer_token() {
        let mut server = mockito::Server::new();
        let login = server
            .mock("POST", "/auth/loginadmin")
            .with_status(200)
            .with_body("tok123")
            .create();

        let adapter = connect(&server);
        login.assert();
        assert_eq!(adapter.token, "Bearer tok123");
    }

    #[test]
    fn connect_rejection_is_auth() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_status(401)
            .create();

        let err =
            TicketingAdapter::connect(test_config(server.url()), &credentials()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn search_extracts_ticket_ids() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("POST", "/431/tickets/search")
            .match_header("authorization", "Bearer tok")
            .with_body(r#"[{"ID": 101}, {"ID": 102}]"#)
            .create();

        let adapter = connect(&server);
        assert_eq!(adapter.search_new_separations().unwrap(), vec![101, 102]);
    }

    #[test]
    fn erp_id_comes_from_the_configured_attribute() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("GET", "/431/tickets/1234")
            .with_body(
                r#"{"ID": 1234, "Attributes": [
                    {"ID": 8000, "Value": "other"},
                    {"ID": 9001, "Value": "E100200"}
                ]}"#,
            )
            .create();

        let adapter = connect(&server);
        assert_eq!(adapter.ticket_erp_id(1234).unwrap(), "E100200");
    }

    #[test]
    fn missing_erp_attribute_is_not_found() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("GET", "/431/tickets/1234")
            .with_body(r#"{"ID": 1234, "Attributes": []}"#)
            .create();

        let adapter = connect(&server);
        assert!(adapter.ticket_erp_id(1234).unwrap_err().is_not_found());
    }

    #[test]
    fn advance_workflow_approves_then_sets_in_process() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        let approve = server
            .mock("POST", "/431/tickets/1234/workflow/approve")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"ActionID": "Choice3"}"#.to_string(),
            ))
            .with_body(r#"{"Message": "advanced"}"#)
            .create();
        let patch = server
            .mock("PATCH", "/431/tickets/1234")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"[{"path": "/StatusID", "value": 20}]"#.to_string(),
            ))
            .with_body("{}")
            .create();

        let adapter = connect(&server);
        let message = adapter
            .advance_workflow(1234, Classification::Employee)
            .unwrap();
        assert_eq!(message, "advanced");
        approve.assert();
        patch.assert();
    }

    #[test]
    fn complete_posts_comment_on_first_task() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("GET", "/431/tickets/1234")
            .with_body(r#"{"ID": 1234, "Tasks": [{"ID": 7}]}"#)
            .create();
        let feed = server
            .mock("POST", "/431/tickets/1234/tasks/7/feed")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"PercentComplete": 100, "IsPrivate": true}"#.to_string(),
            ))
            .with_body("{}")
            .create();
        server
            .mock("PATCH", "/431/tickets/1234")
            .with_body("{}")
            .create();

        let adapter = connect(&server);
        adapter.complete_with_comment(1234, "all done").unwrap();
        feed.assert();
    }

    #[test]
    fn remove_employee_group_resolves_uid_first() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("POST", "/people/search")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"UserName": "jdoe@example.com"}"#.to_string(),
            ))
            .with_body(r#"[{"UID": "u-778"}]"#)
            .create();
        let delete = server
            .mock("DELETE", "/people/u-778/groups/55")
            .with_status(200)
            .create();

        let adapter = connect(&server);
        adapter.remove_employee_group("jdoe").unwrap();
        delete.assert();
    }

    #[test]
    fn unknown_person_is_not_found() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("POST", "/people/search")
            .with_body("[]")
            .create();

        let adapter = connect(&server);
        assert!(adapter
            .remove_employee_group("ghost")
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn server_error_is_transient() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        server
            .mock("POST", "/431/tickets/search")
            .with_status(503)
            .create();

        let adapter = connect(&server);
        assert!(adapter.search_new_separations().unwrap_err().is_transient());
    }

    #[test]
    fn reassign_patches_requestor_without_notification() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/auth/loginadmin")
            .with_body("tok")
            .create();
        let patch = server
            .mock("PATCH", "/431/tickets/42")
            .match_query(mockito::Matcher::UrlEncoded(
                "notifyNewResponsible".into(),
                "false".into(),
            ))
            .match_body(mockito::Matcher::PartialJsonString(
                r#"[{"path": "/RequestorUid", "value": "u-1"}]"#.to_string(),
            ))
            .with_body("{}")
            .create();

        let adapter = connect(&server);
        adapter.reassign_requestor(42, "u-1").unwrap();
        patch.assert();
    }
}
