use tracing::{debug, warn};

use crate::evaluate::EvalContext;
use crate::github::SEARCH_PAGE_SIZE;
use crate::throttle::resilient_call;

/// Collect up to `cap` repository handles ("owner/name") from the star
/// search, most-starred first. A failed page fetch ends discovery with
/// whatever accumulated so far; the batch continues on partial candidates.
pub async fn discover_repositories(ctx: &EvalContext, min_stars: u64, cap: usize) -> Vec<String> {
    let mut handles = Vec::with_capacity(cap);
    let mut page: u32 = 1;

    while handles.len() < cap {
        let Some(results) = resilient_call(&ctx.governor, &ctx.policy, || {
            ctx.client.search_repositories(min_stars, page)
        })
        .await
        else {
            warn!(page, collected = handles.len(), "repository search failed; stopping discovery");
            break;
        };

        if results.items.is_empty() {
            break;
        }
        let short_page = results.items.len() < SEARCH_PAGE_SIZE;
        debug!(page, matched = results.total_count, "discovery page fetched");

        for repo in results.items {
            handles.push(repo.full_name);
            if handles.len() >= cap {
                break;
            }
        }
        if short_page {
            break;
        }
        page += 1;
    }

    handles
}
