use std::pin::pin;

use futures::stream::{self, Stream, TryStreamExt};
use log::{debug, info};
use serde::de::DeserializeOwned;

use crate::clients::{
    entities::Page,
    errors::{Error, Result},
    http::{Headers, Transport},
};

/// Streams every page of a listing, starting at `endpoint` and following
/// `next` until the API stops returning one.
///
/// Only the first request carries `limit`; the `next` URLs already encode
/// offset and limit and are requested verbatim.
pub fn pages<'a, T, R>(
    transport: &'a T,
    headers: &'a Headers,
    endpoint: &str,
    page_size: u32,
) -> impl Stream<Item = Result<Page<R>>> + 'a
where
    T: Transport,
    R: DeserializeOwned + 'a,
{
    let start = Some((endpoint.to_string(), true));
    stream::try_unfold(start, move |cursor| async move {
        let Some((url, first)) = cursor else {
            return Ok::<_, Error>(None);
        };
        let query = if first {
            vec![("limit", page_size.to_string())]
        } else {
            Vec::new()
        };

        let response = transport.get(&url, headers, &query).await?;
        if !response.is_success() {
            return Err(Error::FetchError {
                endpoint: url,
                status: response.status,
            });
        }

        let page: Page<R> = serde_json::from_value(response.body)?;
        debug!("Fetched page of {} items from {url}", page.items.len());
        let next = page.next.clone().map(|next| (next, false));
        Ok::<_, Error>(Some((page, next)))
    })
}

/// Collects a whole listing in page order, projecting each raw item.
///
/// Items the projection rejects are dropped. `label` only feeds the
/// progress log.
pub async fn fetch_all<T, R, I, F>(
    transport: &T,
    headers: &Headers,
    endpoint: &str,
    page_size: u32,
    label: &str,
    mut project: F,
) -> Result<Vec<I>>
where
    T: Transport,
    R: DeserializeOwned,
    F: FnMut(R) -> Option<I>,
{
    let mut pages = pin!(pages::<T, R>(transport, headers, endpoint, page_size));
    let mut collected = Vec::new();
    let mut seen = 0;

    while let Some(page) = pages.try_next().await? {
        seen += page.items.len();
        collected.extend(page.items.into_iter().filter_map(&mut project));
        info!("Collected {seen} {label}");
    }

    Ok(collected)
}
