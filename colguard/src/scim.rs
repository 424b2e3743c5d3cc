//! SCIM directory client: users, groups and group membership.

use crate::config::ApiSettings;
use crate::error::Error;
use crate::http::{ApiEndpoint, HttpMethod, HttpPorter, HttpResponse};
use crate::report::Report;
use serde_json::{json, Value};
use tracing::{debug, warn};

const USERS_PATH: &str = "/scim/Users";
const GROUPS_PATH: &str = "/scim/Groups";

const USER_HEADER: &str = "\tUser Id                  : User Name";
const GROUP_HEADER: &str = "\tGroup Id                 : Group Name";

/// Reads a string field, treating absent or non-string values as empty.
fn text<'a>(value: &'a Value, pointer: &str) -> &'a str {
    value.pointer(pointer).and_then(Value::as_str).unwrap_or_default()
}

fn user_line(user: &Value) -> String {
    format!("\t{} : {}", text(user, "/id"), text(user, "/name/formatted"))
}

fn group_line(group: &Value) -> String {
    format!("\t{} : {}", text(group, "/id"), text(group, "/displayName"))
}

fn resources(list: &Value) -> &[Value] {
    list.get("Resources").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default()
}

fn total_results(list: &Value) -> u64 {
    list.get("totalResults").and_then(Value::as_u64).unwrap_or_default()
}

/// Chained SCIM calls against one tenant.
#[derive(Debug, Clone)]
pub struct ScimClient {
    porter: HttpPorter,
    endpoint: ApiEndpoint,
}

impl ScimClient {
    #[must_use]
    pub const fn new(porter: HttpPorter, endpoint: ApiEndpoint) -> Self {
        Self { porter, endpoint }
    }

    async fn send(&self, method: HttpMethod, path: &str, body: Option<&str>) -> HttpResponse {
        let url = self.endpoint.url(path);
        self.porter.send(method, &url, Some(self.endpoint.authorization()), body).await
    }

    pub async fn request_get_user(&self, user_id: &str) -> HttpResponse {
        self.send(HttpMethod::Get, &format!("{USERS_PATH}/{user_id}"), None).await
    }

    /// Lists users; `search` is appended verbatim, e.g. `?userName=ann`.
    pub async fn request_list_users(&self, search: Option<&str>) -> HttpResponse {
        self.send(HttpMethod::Get, &format!("{USERS_PATH}{}", search.unwrap_or_default()), None).await
    }

    pub async fn request_get_group(&self, group_id: &str) -> HttpResponse {
        self.send(HttpMethod::Get, &format!("{GROUPS_PATH}/{group_id}"), None).await
    }

    /// Lists groups; `search` is appended verbatim, e.g. `?displayName=hr`.
    pub async fn request_list_groups(&self, search: Option<&str>) -> HttpResponse {
        self.send(HttpMethod::Get, &format!("{GROUPS_PATH}{}", search.unwrap_or_default()), None).await
    }

    async fn put_group(&self, group_id: &str, group: &Value) -> HttpResponse {
        let body = group.to_string();
        self.send(HttpMethod::Put, &format!("{GROUPS_PATH}/{group_id}"), Some(&body)).await
    }

    /// Appends the user to the group's members and writes the group back.
    ///
    /// Returns the first failed response if the user or group cannot be read.
    /// A user already in the group is appended again.
    pub async fn request_add_user_to_group(&self, group_id: &str, user_id: &str) -> HttpResponse {
        let response = self.request_get_user(user_id).await;
        if response.status_code != 200 {
            eprintln!(
                "Unable to update group. Failed to obtain user info. Error: {}, {}",
                response.status_code,
                response.error_message()
            );
            return response;
        }
        let user = response.body;

        let response = self.request_get_group(group_id).await;
        if response.status_code != 200 {
            eprintln!(
                "Unable to update group. Failed to obtain group info. Error: {}, {}",
                response.status_code,
                response.error_message()
            );
            return response;
        }
        let mut group = response.body;

        let member = json!({
            "type": "user",
            "value": text(&user, "/id"),
            "display": text(&user, "/name/formatted"),
        });
        let mut members = group_members(&group);
        if members.iter().any(|m| m.get("value") == member.get("value")) {
            warn!("user {user_id} is already a member of group {group_id}");
        }
        members.push(member);
        set_members(&mut group, members);

        self.put_group(group_id, &group).await
    }

    /// Drops the user from the group's members and writes the group back.
    pub async fn request_remove_user_from_group(
        &self,
        group_id: &str,
        user_id: &str,
    ) -> HttpResponse {
        let response = self.request_get_group(group_id).await;
        if response.status_code != 200 {
            eprintln!(
                "Unable to update group. Failed to obtain group info. Error: {}, {}",
                response.status_code,
                response.error_message()
            );
            return response;
        }
        let mut group = response.body;

        let mut members = group_members(&group);
        let before = members.len();
        members.retain(|m| m.get("value").and_then(Value::as_str) != Some(user_id));
        debug!("removed {} membership(s) of {user_id}", before - members.len());
        set_members(&mut group, members);

        self.put_group(group_id, &group).await
    }
}

/// The group's members; empty when the array is absent or null.
fn group_members(group: &Value) -> Vec<Value> {
    group.get("members").and_then(Value::as_array).cloned().unwrap_or_default()
}

fn set_members(group: &mut Value, members: Vec<Value>) {
    if let Value::Object(fields) = group {
        fields.insert("members".to_string(), Value::Array(members));
    }
}

/// Builds a client, or explains which parameter is missing.
fn client(porter: &HttpPorter, api: &ApiSettings, operation: &str) -> Result<ScimClient, Report> {
    ApiEndpoint::from_settings(api).map(|endpoint| ScimClient::new(porter.clone(), endpoint)).map_err(
        |e: Error| {
            debug!("{operation}: {e}");
            parameter_not_set(operation)
        },
    )
}

fn parameter_not_set(operation: &str) -> Report {
    eprintln!("Error: {operation} failed.  A parameter is not set.");
    Report::failed(operation, "A parameter is not set.")
}

fn request_failed(operation: &str, verb: &str, response: &HttpResponse) -> Report {
    let status = format!("Error: {}, {}", response.status_code, response.error_message());
    eprintln!("Failed to {verb}. {status}");
    Report::failed(operation, status)
}

/// Shows the user `user_id`, or the configured sample user.
pub async fn get_user(porter: &HttpPorter, api: &ApiSettings, user_id: Option<&str>) -> Report {
    const OPERATION: &str = "Get User";
    let Some(user_id) = user_id.or(api.sample_user_id.as_deref()) else {
        return parameter_not_set(OPERATION);
    };
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    let response = scim.request_get_user(user_id).await;
    if response.status_code != 200 {
        return request_failed(OPERATION, "fetch user", &response);
    }
    println!("{USER_HEADER}");
    let line = user_line(&response.body);
    println!("{line}");
    Report::succeeded(OPERATION, line.trim_start().to_string())
}

pub async fn list_users(porter: &HttpPorter, api: &ApiSettings) -> Report {
    const OPERATION: &str = "List Users";
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    let response = scim.request_list_users(None).await;
    if response.status_code != 200 {
        return request_failed(OPERATION, "fetch users", &response);
    }
    let total = total_results(&response.body);
    println!("\t{total} Users:");
    println!("{USER_HEADER}");
    for user in resources(&response.body) {
        println!("{}", user_line(user));
    }
    Report::succeeded(OPERATION, format!("{total} user(s)"))
}

/// Shows the group `group_id`, or the configured sample group, with members.
pub async fn get_group(porter: &HttpPorter, api: &ApiSettings, group_id: Option<&str>) -> Report {
    const OPERATION: &str = "Get Group";
    let Some(group_id) = group_id.or(api.sample_group_id.as_deref()) else {
        return parameter_not_set(OPERATION);
    };
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    let response = scim.request_get_group(group_id).await;
    if response.status_code != 200 {
        return request_failed(OPERATION, "fetch group", &response);
    }
    let group = &response.body;
    println!("{GROUP_HEADER}");
    println!("{}", group_line(group));
    let members = group.get("members").and_then(Value::as_array);
    if let Some(members) = members {
        println!("\tMembers:");
        for member in members {
            println!(
                "\t\t{} > {} : {}",
                text(member, "/type"),
                text(member, "/value"),
                text(member, "/display")
            );
        }
    }
    Report::succeeded(OPERATION, format!("{} member(s)", members.map_or(0, Vec::len)))
}

pub async fn list_groups(porter: &HttpPorter, api: &ApiSettings) -> Report {
    const OPERATION: &str = "List Groups";
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    let response = scim.request_list_groups(None).await;
    if response.status_code != 200 {
        return request_failed(OPERATION, "fetch groups", &response);
    }
    let total = total_results(&response.body);
    println!("\t{total} Groups:");
    println!("{GROUP_HEADER}");
    for group in resources(&response.body) {
        println!("{}", group_line(group));
    }
    Report::succeeded(OPERATION, format!("{total} group(s)"))
}

fn updated_group(operation: &str, response: &HttpResponse) -> Report {
    if response.status_code != 200 {
        return request_failed(operation, "update group", response);
    }
    let status = format!(
        "Updated group with ID: {} and Name: {}",
        text(&response.body, "/id"),
        text(&response.body, "/displayName")
    );
    println!("{status}");
    Report::succeeded(operation, status)
}

pub async fn add_user_to_group(
    porter: &HttpPorter,
    api: &ApiSettings,
    user_id: Option<&str>,
    group_id: Option<&str>,
) -> Report {
    const OPERATION: &str = "Add User to Group";
    let user_id = user_id.or(api.sample_user_id.as_deref());
    let group_id = group_id.or(api.sample_group_id.as_deref());
    let (Some(user_id), Some(group_id)) = (user_id, group_id) else {
        return parameter_not_set(OPERATION);
    };
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    updated_group(OPERATION, &scim.request_add_user_to_group(group_id, user_id).await)
}

pub async fn remove_user_from_group(
    porter: &HttpPorter,
    api: &ApiSettings,
    user_id: Option<&str>,
    group_id: Option<&str>,
) -> Report {
    const OPERATION: &str = "Remove User from Group";
    let user_id = user_id.or(api.sample_user_id.as_deref());
    let group_id = group_id.or(api.sample_group_id.as_deref());
    let (Some(user_id), Some(group_id)) = (user_id, group_id) else {
        return parameter_not_set(OPERATION);
    };
    let scim = match client(porter, api, OPERATION) {
        Ok(scim) => scim,
        Err(report) => return report,
    };

    updated_group(OPERATION, &scim.request_remove_user_from_group(group_id, user_id).await)
}
