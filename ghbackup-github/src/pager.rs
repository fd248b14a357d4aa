//! Paginated repository listing
//!
//! Pages are requested one at a time, starting at page 1. The listing ends at
//! the first empty array or empty body; a short page does not end it.

use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use tracing::{debug, info};

use ghbackup_core::{AccountKind, RepoSource, RepositoryRecord};

use crate::{Error, GitHubClient, Result};

/// Walks the pages of one account's repository listing
#[derive(Debug)]
pub struct Pager<'a> {
    client: &'a GitHubClient,
    account: String,
    kind: AccountKind,
    next: u32,
    requests: usize,
    done: bool,
}

impl<'a> Pager<'a> {
    /// Create a pager positioned before page 1
    pub fn new(client: &'a GitHubClient, account: impl Into<String>, kind: AccountKind) -> Self {
        Self {
            client,
            account: account.into(),
            kind,
            next: 1,
            requests: 0,
            done: false,
        }
    }

    /// Number of page requests issued so far
    pub fn requests_made(&self) -> usize {
        self.requests
    }

    /// Fetch the next non-empty page
    ///
    /// Returns `Ok(None)` once the listing has ended, without issuing further
    /// requests. An error also ends the listing.
    pub async fn next_page(&mut self) -> Result<Option<Vec<RepositoryRecord>>> {
        if self.done {
            return Ok(None);
        }

        let page = self.next;
        self.requests += 1;

        let result = self.client.get_page(&self.account, self.kind, page).await;
        match result {
            Ok(Some(records)) if !records.is_empty() => {
                self.next += 1;
                Ok(Some(records))
            }
            Ok(_) => {
                debug!(account = %self.account, page, "Listing exhausted");
                self.done = true;
                Ok(None)
            }
            Err(e) => {
                self.done = true;
                Err(e)
            }
        }
    }

    /// Lazily yield every record, in page order
    pub fn into_stream(self) -> impl Stream<Item = Result<RepositoryRecord>> + 'a {
        stream::try_unfold(self, |mut pager| async move {
            let page = pager.next_page().await?;
            Ok::<_, Error>(page.map(|page| (page, pager)))
        })
        .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, Error>)))
        .try_flatten()
    }

    /// Drain the listing into a vector
    pub async fn collect_all(mut self) -> Result<Vec<RepositoryRecord>> {
        let mut records = Vec::new();
        while let Some(page) = self.next_page().await? {
            records.extend(page);
        }

        info!(
            account = %self.account,
            kind = %self.kind,
            repos = records.len(),
            requests = self.requests,
            "Listed repositories"
        );

        Ok(records)
    }
}

#[async_trait]
impl RepoSource for GitHubClient {
    async fn list_repositories(
        &self,
        account: &str,
        kind: AccountKind,
    ) -> ghbackup_core::Result<Vec<RepositoryRecord>> {
        Ok(Pager::new(self, account, kind).collect_all().await?)
    }
}
