//! Community tier: a shared key behind a local daily/monthly quota.

use tracing::{debug, info};

use super::chat::ChatCompletionClient;
use super::ProviderCall;
use crate::engine::error::EngineError;
use crate::engine::provider::ProviderId;
use crate::engine::usage::UsageTracker;

/// Runs a community call.
///
/// The quota is checked before any network traffic and one use is recorded
/// only after a successful completion.
pub async fn complete(
    chat: &ChatCompletionClient,
    usage: &UsageTracker,
    base_url: &str,
    call: &ProviderCall,
) -> Result<String, EngineError> {
    let counter = usage.read_counters();
    usage.check_quota(&counter)?;

    let key = call.credential.as_deref().ok_or_else(|| {
        EngineError::Configuration(format!(
            "No community key available. Set {} or configure a personal API key",
            ProviderId::Community.profile().env_var
        ))
    })?;

    let limits = usage.limits();
    debug!(
        day_count = counter.day_count,
        daily_limit = limits.daily,
        month_count = counter.month_count,
        monthly_limit = limits.monthly,
        "Community quota available"
    );

    let text = chat
        .complete(ProviderId::Community, base_url, Some(key), call)
        .await?;

    let recorded = usage.record_use(counter);
    info!(
        "Community tier usage: {}/{} today, {}/{} this month",
        recorded.day_count, limits.daily, recorded.month_count, limits.monthly
    );
    Ok(text)
}
