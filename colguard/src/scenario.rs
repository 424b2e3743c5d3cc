//! Policy walkthrough: show how a tenant policy changes what a read returns.
//!
//! For each policy: read, add the policy, wait until the accessible key set
//! changes, read again, remove the policy, wait until the key set is
//! restored, and read a last time.

use crate::access::accessible_keys;
use crate::agent::KeyAgent;
use crate::config::Settings;
use crate::http::HttpPorter;
use crate::policy::PolicyClient;
use crate::records::read_records;
use crate::report::Report;
use crate::wait::{wait_until, WaitOutcome};
use tracing::{info, warn};

const POLICY_SCENARIO: &str = "Policy Scenario";

async fn wait_for_key_count<F>(settings: &Settings, agent: &dyn KeyAgent, done: F) -> WaitOutcome
where
    F: Fn(usize) -> bool + Copy,
{
    let outcome = wait_until(&settings.policy.propagation, move || async move {
        done(accessible_keys(settings, agent).await.len())
    })
    .await;
    match outcome {
        WaitOutcome::Satisfied { attempts, elapsed } => {
            info!("policy change visible after {attempts} probe(s), {elapsed:?}");
        }
        WaitOutcome::TimedOut { attempts, elapsed } => {
            warn!("policy change not visible after {attempts} probe(s), {elapsed:?}");
        }
    }
    outcome
}

async fn print_read(settings: &Settings, agent: &dyn KeyAgent) {
    read_records(settings, agent).await.0.print();
}

/// Runs the walkthrough for every policy in `names`, in order.
pub async fn policy_scenario(
    settings: &Settings,
    agent: &dyn KeyAgent,
    porter: &HttpPorter,
    names: &[String],
) -> Report {
    let client = match PolicyClient::from_settings(porter, settings) {
        Ok(client) => client,
        Err(e) => return Report::failed(POLICY_SCENARIO, format!("ERROR: {e}")),
    };

    let baseline = accessible_keys(settings, agent).await.len();
    print_read(settings, agent).await;

    let mut unobserved = 0;
    for name in names {
        let policy_id = match client.add_named(&settings.policy.dir, name).await {
            Ok(id) => id,
            Err(e) => {
                return Report::failed(POLICY_SCENARIO, format!("ERROR: Failure to apply policy. {e}"));
            }
        };
        println!("Policy: {policy_id} has been added to tenant.");
        if !wait_for_key_count(settings, agent, move |count| count != baseline).await.is_satisfied() {
            unobserved += 1;
        }
        print_read(settings, agent).await;

        if let Err(e) = client.remove(&policy_id).await {
            return Report::failed(
                POLICY_SCENARIO,
                format!("ERROR: Failure to remove policy {policy_id} from tenant. {e}"),
            );
        }
        println!("Policy {policy_id} removed from tenant.");
        if !wait_for_key_count(settings, agent, move |count| count == baseline).await.is_satisfied() {
            unobserved += 1;
        }
        print_read(settings, agent).await;
    }

    if unobserved == 0 {
        Report::succeeded(POLICY_SCENARIO, format!("{} policy change(s) observed", names.len() * 2))
    } else {
        Report::failed(
            POLICY_SCENARIO,
            format!(
                "{unobserved} policy change(s) not observed within {:?}",
                settings.policy.propagation.timeout
            ),
        )
    }
}
