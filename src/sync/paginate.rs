use anyhow::Result;
use std::future::Future;
use tracing::warn;

use crate::util::env::env_parse;

/// One page of remote results plus the continuation signal, if any.
#[derive(Debug)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    pub next: Option<C>,
}

/// Safety ceilings bounding the total work of one paginated walk.
#[derive(Debug, Clone, Copy)]
pub struct PagePolicy {
    pub max_pages: u32,
    pub max_items: usize,
}

impl PagePolicy {
    pub fn from_env() -> Self {
        Self {
            max_pages: env_parse("SYNC_MAX_PAGES", 50u32),
            max_items: env_parse("SYNC_MAX_ITEMS", 5000usize),
        }
    }
}

impl Default for PagePolicy {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_items: 5000,
        }
    }
}

/// Walk a paginated endpoint until it stops signalling further pages or a
/// safety ceiling trips. `fetch` receives `None` for the first page and the
/// previous page's continuation afterwards.
///
/// Every fetch stage shares this loop; only the continuation type and the
/// ceilings differ per call site.
pub async fn fetch_all<T, C, F, Fut>(
    op: &'static str,
    policy: PagePolicy,
    mut fetch: F,
) -> Result<Vec<T>>
where
    F: FnMut(Option<C>) -> Fut,
    Fut: Future<Output = Result<Page<T, C>>>,
{
    let mut out: Vec<T> = Vec::new();
    let mut cursor: Option<C> = None;
    let mut pages = 0u32;
    loop {
        let page = fetch(cursor.take()).await?;
        out.extend(page.items);
        pages += 1;
        if out.len() >= policy.max_items {
            warn!(
                op,
                items = out.len(),
                "item ceiling reached; stopping pagination"
            );
            break;
        }
        match page.next {
            None => break,
            Some(_) if pages >= policy.max_pages => {
                warn!(op, pages, "page ceiling reached; stopping pagination");
                break;
            }
            Some(next) => cursor = Some(next),
        }
    }
    Ok(out)
}
