use crate::commands::Commands;
use colguard::access::{access_keys, ensure_access_record};
use colguard::agent::KeyAgent;
use colguard::config::Settings;
use colguard::db;
use colguard::http::HttpPorter;
use colguard::policy::{add_policy, list_policies, remove_policy};
use colguard::records::{create_record, read_records, PersonnelRow};
use colguard::report::Report;
use colguard::scenario::policy_scenario;
use colguard::scim;
use std::path::Path;
use tracing::{debug, error};

const USAGE: [&str; 16] = [
    "Usage: prog <command>",
    "\ttestSetup",
    "\tcreateAccessRecord",
    "\tgetAccessRecord",
    "\tcreatePersonnelRecord [first last zip department]",
    "\treadPersonnelRecord",
    "\tlistPolicies",
    "\taddPolicy policy-name",
    "\tremovePolicy policy-id",
    "\tlistUsers",
    "\tgetUser [userId]",
    "\tlistGroups",
    "\tgetGroup [groupId]",
    "\taddUserToGroup [userId] [groupId]",
    "\tremoveUserFromGroup [userId] [groupId]",
    "\tpolicyScenario policy-name...",
];

#[must_use]
pub fn usage_text() -> String {
    USAGE.join("\n")
}

pub fn usage() {
    println!("{}", usage_text());
}

fn missing_argument(message: &str) {
    eprintln!("{message}");
    usage();
}

/// Collaborators shared by every verb.
pub struct Context<'a> {
    pub settings: &'a Settings,
    pub agent: &'a dyn KeyAgent,
    pub porter: &'a HttpPorter,
    pub keystore: &'a Path,
}

/// Confirms settings and key store, creating the tables when a schema is
/// configured.
async fn test_setup(ctx: &Context<'_>) -> Report {
    const TEST_SETUP: &str = "Test Setup";
    let Some(schema) = ctx.settings.database.sql.schema.as_deref() else {
        return Report::succeeded(
            TEST_SETUP,
            format!("settings loaded, key store {}", ctx.keystore.display()),
        );
    };
    match db::apply_schema(&ctx.settings.database, schema).await {
        Ok(applied) => Report::succeeded(
            TEST_SETUP,
            format!("{applied} schema statement(s) applied, key store {}", ctx.keystore.display()),
        ),
        Err(e) => {
            error!("{e}");
            Report::failed(TEST_SETUP, format!("ERROR: Failure to access database. {e}"))
        }
    }
}

/// Runs one verb and prints its report.
///
/// Returns the report, or `None` when the verb was refused for a missing
/// argument.
pub async fn run(command: Commands, ctx: &Context<'_>) -> Option<Report> {
    debug!("dispatching {command:?}");
    let report = match command {
        Commands::TestSetup => test_setup(ctx).await,
        Commands::CreateAccessRecord => ensure_access_record(ctx.settings, ctx.agent).await,
        Commands::GetAccessRecord => {
            let keys = access_keys(ctx.settings, ctx.agent).await;
            if keys.is_empty() {
                Report::failed("Get Access Record", "no keys available")
            } else {
                Report::succeeded("Get Access Record", format!("{} key(s) available", keys.len()))
            }
        }
        Commands::CreatePersonnelRecord { fields } => {
            let row = match fields.as_slice() {
                [] => PersonnelRow::sample(),
                [first, last, zip, department] => PersonnelRow::new(first, last, zip, department),
                _ => {
                    missing_argument("ERROR: a personnel record needs first, last, zip and department.");
                    return None;
                }
            };
            create_record(ctx.settings, ctx.agent, &row).await
        }
        Commands::ReadPersonnelRecord => read_records(ctx.settings, ctx.agent).await.0,
        Commands::ListPolicies => list_policies(ctx.porter, ctx.settings).await,
        Commands::AddPolicy { name } => {
            let Some(name) = name else {
                missing_argument("ERROR: missing name of policy to add to tenant.");
                return None;
            };
            add_policy(ctx.porter, ctx.settings, &name).await
        }
        Commands::RemovePolicy { policy_id } => {
            let Some(policy_id) = policy_id else {
                missing_argument("ERROR: missing policy Id to remove");
                return None;
            };
            remove_policy(ctx.porter, ctx.settings, &policy_id).await
        }
        Commands::ListUsers => scim::list_users(ctx.porter, &ctx.settings.api).await,
        Commands::GetUser { user_id } => {
            scim::get_user(ctx.porter, &ctx.settings.api, user_id.as_deref()).await
        }
        Commands::ListGroups => scim::list_groups(ctx.porter, &ctx.settings.api).await,
        Commands::GetGroup { group_id } => {
            scim::get_group(ctx.porter, &ctx.settings.api, group_id.as_deref()).await
        }
        Commands::AddUserToGroup { user_id, group_id } => {
            scim::add_user_to_group(
                ctx.porter,
                &ctx.settings.api,
                user_id.as_deref(),
                group_id.as_deref(),
            )
            .await
        }
        Commands::RemoveUserFromGroup { user_id, group_id } => {
            scim::remove_user_from_group(
                ctx.porter,
                &ctx.settings.api,
                user_id.as_deref(),
                group_id.as_deref(),
            )
            .await
        }
        Commands::PolicyScenario { names } => {
            if names.is_empty() {
                missing_argument("ERROR: missing name of policy to add to tenant.");
                return None;
            }
            policy_scenario(ctx.settings, ctx.agent, ctx.porter, &names).await
        }
    };
    report.print();
    Some(report)
}
