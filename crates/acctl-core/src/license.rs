//! Meeting-service license reclamation.
//!
//! The meeting service bills per licensed seat. Entitlement lives in the ERP
//! (current employees and instructors); anyone licensed who is neither
//! entitled nor a member of a manually-managed service group gets downgraded
//! to a basic seat. Group membership is the operator escape hatch for
//! exceptions, so grouped users are never touched.

use std::collections::HashSet;
use std::time::Duration;

use serde_json::{json, Value};

use crate::adapter::ErpClient;
use crate::config::{MeetingsConfig, MeetingsCredentials};
use crate::error::{AcctlError, Result};

const LICENSED_TYPE: u64 = 2;
const BASIC_TYPE: u64 = 1;
const PAGE_SIZE: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicensedUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug)]
pub struct MeetingsAdapter {
    http: reqwest::blocking::Client,
    config: MeetingsConfig,
    token: String,
}

impl MeetingsAdapter {
    /// Exchange the server-to-server OAuth client for an access token.
    pub fn connect(config: MeetingsConfig, credentials: &MeetingsCredentials) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;

        let response = http
            .post(&config.auth_url)
            .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
            .query(&[
                ("grant_type", "account_credentials"),
                ("account_id", credentials.account_id.as_str()),
            ])
            .send()
            .map_err(net_err)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED
            || response.status() == reqwest::StatusCode::BAD_REQUEST
        {
            return Err(AcctlError::auth("meetings", "OAuth token request rejected"));
        }
        let body: Value = response.error_for_status().map_err(AcctlError::Http)?.json()?;
        let token = body["access_token"]
            .as_str()
            .ok_or_else(|| AcctlError::UnexpectedPayload("token response".into()))?;

        Ok(Self {
            http,
            config,
            token: format!("Bearer {token}"),
        })
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder, what: &str) -> Result<Value> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, &self.token)
            .send()
            .map_err(net_err)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(AcctlError::auth("meetings", format!("{status} for {what}")));
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AcctlError::not_found("meetings", what.to_string()));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AcctlError::transient(
                "meetings",
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

    /// Walk a paginated collection, concatenating the array under `key`.
    fn paged(&self, path: &str, key: &str) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        let mut page_token = String::new();
        loop {
            let url = format!("{}/{path}", self.config.base_url);
            let page = self.send(
                self.http.get(&url).query(&[
                    ("page_size", PAGE_SIZE.to_string().as_str()),
                    ("next_page_token", page_token.as_str()),
                ]),
                path,
            )?;
            if let Some(batch) = page[key].as_array() {
                items.extend(batch.iter().cloned());
            }
            match page["next_page_token"].as_str() {
                Some(next) if !next.is_empty() => page_token = next.to_string(),
                _ => return Ok(items),
            }
        }
    }

    /// Every user currently holding a licensed seat.
    pub fn licensed_users(&self) -> Result<Vec<LicensedUser>> {
        Ok(self
            .paged("users", "users")?
            .iter()
            .filter(|u| u["type"].as_u64() == Some(LICENSED_TYPE))
            .filter_map(|u| {
                Some(LicensedUser {
                    id: u["id"].as_str()?.to_string(),
                    email: u["email"].as_str()?.to_ascii_lowercase(),
                })
            })
            .collect())
    }

    /// Emails of everyone in any service group. Grouped users are managed by
    /// hand and excluded from reclamation.
    pub fn grouped_users(&self) -> Result<HashSet<String>> {
        let groups = self.paged("groups", "groups")?;
        let mut members = HashSet::new();
        for group in groups {
            let Some(group_id) = group["id"].as_str() else {
                continue;
            };
            for member in self.paged(&format!("groups/{group_id}/members"), "members")? {
                if let Some(email) = member["email"].as_str() {
                    members.insert(email.to_ascii_lowercase());
                }
            }
        }
        Ok(members)
    }

    pub fn downgrade_to_basic(&self, user_id: &str) -> Result<()> {
        self.send(
            self.http
                .patch(format!("{}/users/{user_id}", self.config.base_url))
                .json(&json!({ "type": BASIC_TYPE })),
            &format!("user {user_id}"),
        )?;
        Ok(())
    }
}

fn net_err(e: reqwest::Error) -> AcctlError {
    if e.is_timeout() || e.is_connect() {
        AcctlError::transient("meetings", e.to_string())
    } else {
        AcctlError::Http(e)
    }
}

// ---------------------------------------------------------------------------
// Reclamation planning and execution
// ---------------------------------------------------------------------------

/// Licensed users who are neither ERP-entitled nor in a service group.
/// Pure so the decision logic is testable without HTTP.
pub fn plan_reclamation<'a>(
    licensed: &'a [LicensedUser],
    entitled: &HashSet<String>,
    grouped: &HashSet<String>,
) -> Vec<&'a LicensedUser> {
    licensed
        .iter()
        .filter(|u| !entitled.contains(&u.email) && !grouped.contains(&u.email))
        .collect()
}

#[derive(Debug, Default)]
pub struct ReclamationSummary {
    pub licensed: usize,
    pub entitled: usize,
    pub grouped: usize,
    pub downgraded: Vec<String>,
    /// `email: error` per user whose downgrade failed.
    pub failed: Vec<String>,
    pub dry_run: bool,
}

/// Full reclamation pass. With `dry_run` the plan is computed and reported
/// but no seat is touched. A downgrade that fails for one user is recorded
/// in the summary and the pass moves on; only fatal errors abort it.
pub fn reclaim(
    meetings: &MeetingsAdapter,
    erp: &dyn ErpClient,
    dry_run: bool,
) -> Result<ReclamationSummary> {
    let licensed = meetings.licensed_users()?;
    let entitled: HashSet<String> = erp
        .licensed_meeting_users()?
        .into_iter()
        .map(|e| e.to_ascii_lowercase())
        .collect();
    let grouped = meetings.grouped_users()?;

    let plan = plan_reclamation(&licensed, &entitled, &grouped);
    let mut summary = ReclamationSummary {
        licensed: licensed.len(),
        entitled: entitled.len(),
        grouped: grouped.len(),
        downgraded: Vec::with_capacity(plan.len()),
        failed: Vec::new(),
        dry_run,
    };

    for user in plan {
        if dry_run {
            tracing::info!(user = %user.email, "would downgrade to basic");
            summary.downgraded.push(user.email.clone());
            continue;
        }
        match meetings.downgrade_to_basic(&user.id) {
            Ok(()) => {
                tracing::info!(user = %user.email, "downgraded to basic");
                summary.downgraded.push(user.email.clone());
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(user = %user.email, "downgrade failed: {e}");
                summary.failed.push(format!("{}: {e}", user.email));
            }
        }
    }
    Ok(summary)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::mock::MockErp;

    fn entitled(emails: &[&str]) -> HashSet<String> {
        emails.iter().map(|e| e.to_string()).collect()
    }

    fn user(id: &str, email: &str) -> LicensedUser {
        LicensedUser {
            id: id.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn plan_keeps_entitled_and_grouped() {
        let licensed = vec![
            user("u1", "keep@example.com"),
            user("u2", "grouped@example.com"),
            user("u3", "stale@example.com"),
        ];
        let plan = plan_reclamation(
            &licensed,
            &entitled(&["keep@example.com"]),
            &entitled(&["grouped@example.com"]),
        );
        assert_eq!(plan, vec![&licensed[2]]);
    }

    #[test]
    fn empty_entitlement_downgrades_everyone_ungrouped() {
        let licensed = vec![user("u1", "a@example.com"), user("u2", "b@example.com")];
        let plan = plan_reclamation(&licensed, &HashSet::new(), &HashSet::new());
        assert_eq!(plan.len(), 2);
    }

    fn test_config(base_url: String, auth_url: String) -> MeetingsConfig {
        MeetingsConfig {
            base_url,
            auth_url,
            credentials: "secrets/meetings.json".into(),
        }
    }

    fn test_credentials() -> MeetingsCredentials {
        MeetingsCredentials {
            account_id: "acct-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "shh".to_string(),
        }
    }

    fn connect(server: &mockito::ServerGuard) -> MeetingsAdapter {
        MeetingsAdapter::connect(
            test_config(server.url(), format!("{}/oauth/token", server.url())),
            &test_credentials(),
        )
        .unwrap()
    }

    fn mock_token(server: &mut mockito::ServerGuard) -> mockito::Mock {
        server
            .mock("POST", "/oauth/token")
            .match_query(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "account_credentials".into(),
            ))
            .with_body(r#"{"access_token": "tok", "token_type": "bearer"}"#)
            .create()
    }

    #[test]
    fn connect_exchanges_oauth_client_for_token() {
        let mut server = mockito::Server::new();
        let token = mock_token(&mut server);
        let adapter = connect(&server);
        token.assert();
        assert_eq!(adapter.token, "Bearer tok");
    }

    #[test]
    fn rejected_oauth_client_is_fatal() {
        let mut server = mockito::Server::new();
        server
            .mock("POST", "/oauth/token")
            .match_query(mockito::Matcher::Any)
            .with_status(401)
            .create();
        let err = MeetingsAdapter::connect(
            test_config(server.url(), format!("{}/oauth/token", server.url())),
            &test_credentials(),
        )
        .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn licensed_users_follow_pagination_and_filter_type() {
        let mut server = mockito::Server::new();
        mock_token(&mut server);
        server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::UrlEncoded(
                "next_page_token".into(),
                "".into(),
            ))
            .with_body(
                r#"{"users": [
                    {"id": "u1", "email": "A@Example.com", "type": 2},
                    {"id": "u2", "email": "basic@example.com", "type": 1}
                ], "next_page_token": "page2"}"#,
            )
            .create();
        server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::UrlEncoded(
                "next_page_token".into(),
                "page2".into(),
            ))
            .with_body(
                r#"{"users": [{"id": "u3", "email": "c@example.com", "type": 2}],
                    "next_page_token": ""}"#,
            )
            .create();

        let adapter = connect(&server);
        let users = adapter.licensed_users().unwrap();
        assert_eq!(
            users,
            vec![user("u1", "a@example.com"), user("u3", "c@example.com")]
        );
    }

    #[test]
    fn dry_run_plans_without_patching() {
        let mut server = mockito::Server::new();
        mock_token(&mut server);
        server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"users": [{"id": "u1", "email": "stale@example.com", "type": 2}]}"#)
            .create();
        server
            .mock("GET", "/groups")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"groups": []}"#)
            .create();
        let patch = server
            .mock("PATCH", "/users/u1")
            .with_body("{}")
            .expect(0)
            .create();

        let adapter = connect(&server);
        let erp = MockErp::default();
        let summary = reclaim(&adapter, &erp, true).unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.downgraded, vec!["stale@example.com"]);
        patch.assert();
    }

    #[test]
    fn live_run_patches_stale_seats() {
        let mut server = mockito::Server::new();
        mock_token(&mut server);
        server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"users": [{"id": "u1", "email": "stale@example.com", "type": 2}]}"#)
            .create();
        server
            .mock("GET", "/groups")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"groups": [{"id": "g1", "name": "Exceptions"}]}"#)
            .create();
        server
            .mock("GET", "/groups/g1/members")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"members": [{"email": "kept@example.com"}]}"#)
            .create();
        let patch = server
            .mock("PATCH", "/users/u1")
            .match_body(mockito::Matcher::PartialJsonString(r#"{"type": 1}"#.into()))
            .with_body("{}")
            .create();

        let adapter = connect(&server);
        let erp = MockErp::default();
        let summary = reclaim(&adapter, &erp, false).unwrap();
        assert_eq!(summary.downgraded, vec!["stale@example.com"]);
        assert_eq!(summary.grouped, 1);
        patch.assert();
    }

    #[test]
    fn failed_downgrade_is_recorded_and_the_pass_continues() {
        let mut server = mockito::Server::new();
        mock_token(&mut server);
        server
            .mock("GET", "/users")
            .match_query(mockito::Matcher::Any)
            .with_body(
                r#"{"users": [
                    {"id": "u1", "email": "first@example.com", "type": 2},
                    {"id": "u2", "email": "second@example.com", "type": 2}
                ]}"#,
            )
            .create();
        server
            .mock("GET", "/groups")
            .match_query(mockito::Matcher::Any)
            .with_body(r#"{"groups": []}"#)
            .create();
        server
            .mock("PATCH", "/users/u1")
            .with_status(500)
            .create();
        let patch_second = server
            .mock("PATCH", "/users/u2")
            .with_body("{}")
            .create();

        let adapter = connect(&server);
        let erp = MockErp::default();
        let summary = reclaim(&adapter, &erp, false).unwrap();
        assert_eq!(summary.downgraded, vec!["second@example.com"]);
        assert_eq!(summary.failed.len(), 1);
        assert!(summary.failed[0].starts_with("first@example.com:"));
        patch_second.assert();
    }
}
