use clap::builder::ValueParser;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Accepts a count (`0`-`4`) or a level name for `COLGUARD_LOG_LEVEL`.
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 4 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[derive(Debug, Parser)]
#[command(name = "colguard", version)]
#[command(about = "Column-level key access control demo: records, policies and directory")]
pub struct Cli {
    /// Application properties (XML)
    #[arg(long, env = "COLGUARD_CONFIG", default_value = "demo.properties.xml", global = true)]
    pub config: PathBuf,

    /// Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)
    #[arg(
        short = 'v',
        long = "verbose",
        env = "COLGUARD_LOG_LEVEL",
        global = true,
        action = ArgAction::Count,
        value_parser = validator_log_level()
    )]
    pub verbosity: u8,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
#[command(rename_all = "camelCase")]
pub enum Commands {
    /// Load settings and open the key store, then stop
    TestSetup,
    /// Create one key per protected column and record their ids
    CreateAccessRecord,
    /// Fetch the keys named by the access record
    GetAccessRecord,
    /// Encrypt and store a record; random sample data when no fields are given
    CreatePersonnelRecord {
        /// first last zip department
        #[arg(value_names = ["FIRST", "LAST", "ZIP", "DEPARTMENT"])]
        fields: Vec<String>,
    },
    /// Read every record, masking columns without a key
    ReadPersonnelRecord,
    ListPolicies,
    /// Apply `<policy dir>/policy.<name>.json` to the tenant
    AddPolicy { name: Option<String> },
    RemovePolicy { policy_id: Option<String> },
    ListUsers,
    GetUser { user_id: Option<String> },
    ListGroups,
    GetGroup { group_id: Option<String> },
    AddUserToGroup { user_id: Option<String>, group_id: Option<String> },
    RemoveUserFromGroup { user_id: Option<String>, group_id: Option<String> },
    /// Read, apply a policy, wait, read, remove it, wait, read
    PolicyScenario { names: Vec<String> },
}
