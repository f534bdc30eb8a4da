// Click analytics and revenue reports
//
// Clicks are stored one row per redirect and aggregated here by UTC day
// and channel. A click whose slug has no link row counts as `link`.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument, warn};

use crate::db::{Store, StoreResult};
use crate::models::{Channel, ShortClick, ShortLink};
use crate::services::billing::{compute_mrr, BillingProvider, SubscriberStats};
use crate::services::email::{DigestTotals, EmailService};
use crate::services::entitlements::start_of_day_utc;

pub const DEFAULT_TIMESERIES_DAYS: i64 = 30;
pub const MAX_TIMESERIES_DAYS: i64 = 90;

/// Row cap on the clicks scanned for the daily summary
pub const SUMMARY_CLICK_LIMIT: i64 = 20_000;
const TIMESERIES_CLICK_LIMIT: i64 = 200_000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timeseries {
    pub labels: Vec<String>,
    pub series: BTreeMap<&'static str, Vec<i64>>,
    pub totals: BTreeMap<&'static str, i64>,
}

impl Timeseries {
    fn empty(labels: Vec<String>) -> Self {
        Self {
            labels,
            series: BTreeMap::new(),
            totals: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub since: DateTime<Utc>,
    pub clicks_by_channel: BTreeMap<&'static str, i64>,
    pub total_clicks: i64,
    pub new_businesses: i64,
    #[serde(rename = "revenueUSD")]
    pub revenue_usd: f64,
}

/// ISO dates for the `days` UTC days ending with `today`
pub fn day_labels(today: NaiveDate, days: i64) -> Vec<String> {
    let start = today - Duration::days(days - 1);
    (0..days)
        .map(|i| (start + Duration::days(i)).format("%Y-%m-%d").to_string())
        .collect()
}

fn channel_map(links: &[ShortLink]) -> HashMap<&str, Channel> {
    links
        .iter()
        .map(|link| (link.slug.as_str(), link.channel()))
        .collect()
}

fn zeroed_channels() -> BTreeMap<&'static str, i64> {
    Channel::ALL.iter().map(|c| (c.as_str(), 0)).collect()
}

/// Bucket clicks into per-channel daily series aligned with `labels`.
/// Clicks outside the labelled days are ignored.
pub fn bucket_clicks(labels: Vec<String>, links: &[ShortLink], clicks: &[ShortClick]) -> Timeseries {
    let channels = channel_map(links);
    let index: HashMap<&str, usize> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (label.as_str(), i))
        .collect();

    let mut series: BTreeMap<&'static str, Vec<i64>> = Channel::ALL
        .iter()
        .map(|c| (c.as_str(), vec![0; labels.len()]))
        .collect();
    let mut totals = zeroed_channels();

    for click in clicks {
        let day = click.ts.format("%Y-%m-%d").to_string();
        let Some(&i) = index.get(day.as_str()) else {
            continue;
        };
        let channel = channels
            .get(click.slug.as_str())
            .copied()
            .unwrap_or(Channel::Link)
            .as_str();

        if let Some(counts) = series.get_mut(channel) {
            counts[i] += 1;
        }
        *totals.entry(channel).or_insert(0) += 1;
    }

    Timeseries {
        labels,
        series,
        totals,
    }
}

/// Per-channel daily clicks over the caller's businesses for the last `days` days
#[instrument(skip(store))]
pub async fn link_timeseries(
    store: &dyn Store,
    uid: &str,
    days: i64,
    now: DateTime<Utc>,
) -> StoreResult<Timeseries> {
    let labels = day_labels(now.date_naive(), days);
    let since = start_of_day_utc(now) - Duration::days(days - 1);

    let business_ids: Vec<_> = store
        .list_businesses_by_owner(uid)
        .await?
        .into_iter()
        .map(|b| b.id)
        .collect();
    if business_ids.is_empty() {
        return Ok(Timeseries::empty(labels));
    }

    let links = store.list_short_links_for_businesses(&business_ids).await?;
    if links.is_empty() {
        return Ok(Timeseries::empty(labels));
    }

    let slugs: Vec<String> = links.iter().map(|l| l.slug.clone()).collect();
    let clicks = store
        .clicks_since(Some(&slugs), since, TIMESERIES_CLICK_LIMIT)
        .await?;

    Ok(bucket_clicks(labels, &links, &clicks))
}

/// Today's (UTC) clicks by channel, new businesses and provider revenue.
/// A provider failure reports zero revenue.
#[instrument(skip(store, billing))]
pub async fn daily_summary(
    store: &dyn Store,
    billing: &dyn BillingProvider,
    now: DateTime<Utc>,
) -> StoreResult<DailySummary> {
    let since = start_of_day_utc(now);

    let clicks = store.clicks_since(None, since, SUMMARY_CLICK_LIMIT).await?;
    let mut slugs: Vec<String> = clicks.iter().map(|c| c.slug.clone()).collect();
    slugs.sort();
    slugs.dedup();

    let links = if slugs.is_empty() {
        Vec::new()
    } else {
        store.list_short_links_by_slugs(&slugs).await?
    };
    let channels = channel_map(&links);

    let mut clicks_by_channel = zeroed_channels();
    for click in &clicks {
        let channel = channels
            .get(click.slug.as_str())
            .copied()
            .unwrap_or(Channel::Link);
        *clicks_by_channel.entry(channel.as_str()).or_insert(0) += 1;
    }

    let new_businesses = store.count_businesses_created_since(since).await?;

    let revenue_usd = match billing.sum_succeeded_charges_since(since).await {
        Ok(amount) => amount,
        Err(e) => {
            warn!("Revenue lookup failed, reporting zero: {}", e);
            0.0
        },
    };

    Ok(DailySummary {
        since,
        clicks_by_channel,
        total_clicks: clicks.len() as i64,
        new_businesses,
        revenue_usd,
    })
}

/// Active subscribers and MRR; zeros when the provider is unavailable
#[instrument(skip(billing))]
pub async fn subscriber_stats(
    billing: &dyn BillingProvider,
    monthly_price_id: &str,
    yearly_price_id: Option<&str>,
) -> SubscriberStats {
    match billing.list_active_subscriptions().await {
        Ok(subscriptions) => compute_mrr(&subscriptions, monthly_price_id, yearly_price_id),
        Err(e) => {
            warn!("Subscriber lookup failed, reporting zeros: {}", e);
            SubscriberStats::zero()
        },
    }
}

/// Email every business owner with short links their last-24h click totals.
/// Returns the number of digests sent; individual send failures are skipped.
#[instrument(skip(store, email))]
pub async fn send_daily_digests(
    store: &dyn Store,
    email: &EmailService,
    now: DateTime<Utc>,
) -> StoreResult<usize> {
    let since = now - Duration::hours(24);

    let businesses = store.list_businesses().await?;
    if businesses.is_empty() {
        return Ok(0);
    }

    let mut owner_by_business = HashMap::new();
    for business in &businesses {
        owner_by_business.insert(business.id, business.owner_uid.clone());
    }

    let ids: Vec<_> = businesses.iter().map(|b| b.id).collect();
    let links = store.list_short_links_for_businesses(&ids).await?;
    if links.is_empty() {
        return Ok(0);
    }

    let slugs: Vec<String> = links.iter().map(|l| l.slug.clone()).collect();
    let clicks = store
        .clicks_since(Some(&slugs), since, TIMESERIES_CLICK_LIMIT)
        .await?;
    let mut clicks_by_slug: HashMap<&str, i64> = HashMap::new();
    for click in &clicks {
        *clicks_by_slug.entry(click.slug.as_str()).or_insert(0) += 1;
    }

    let mut totals_by_owner: BTreeMap<String, DigestTotals> = BTreeMap::new();
    for link in &links {
        let Some(owner) = owner_by_business.get(&link.business_id) else {
            continue;
        };
        let n = clicks_by_slug.get(link.slug.as_str()).copied().unwrap_or(0);
        let totals = totals_by_owner.entry(owner.clone()).or_default();
        match link.channel() {
            Channel::Qr => totals.qr += n,
            Channel::Whatsapp => totals.whatsapp += n,
            Channel::Sms => totals.sms += n,
            Channel::Email => totals.email += n,
            Channel::Link => totals.link += n,
        }
    }

    let mut sent = 0;
    for (owner_uid, totals) in &totals_by_owner {
        let Some(user) = store.find_user(owner_uid).await? else {
            continue;
        };
        match email.send_daily_digest(&user.email, totals).await {
            Ok(_) => sent += 1,
            Err(e) => warn!("Digest for {} failed: {}", owner_uid, e),
        }
    }

    info!("Sent {} daily digests", sent);
    Ok(sent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn link(slug: &str, channel: &str) -> ShortLink {
        ShortLink {
            slug: slug.to_string(),
            business_id: Uuid::nil(),
            channel: channel.to_string(),
            created_at: Utc::now(),
        }
    }

    fn click(slug: &str, ts: DateTime<Utc>) -> ShortClick {
        ShortClick {
            id: 0,
            slug: slug.to_string(),
            ts,
        }
    }

    #[test]
    fn test_day_labels_span_exactly_days() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let labels = day_labels(today, 3);
        assert_eq!(labels, vec!["2025-02-28", "2025-03-01", "2025-03-02"]);

        assert_eq!(day_labels(today, 1), vec!["2025-03-02"]);
        assert_eq!(day_labels(today, 90).len(), 90);
    }

    #[test]
    fn test_bucket_clicks_by_day_and_channel() {
        let labels = day_labels(NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(), 2);
        let links = vec![link("qr1", "qr"), link("sms1", "sms"), link("odd1", "telegram")];
        let day1 = Utc.with_ymd_and_hms(2025, 3, 1, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2025, 3, 2, 0, 0, 1).unwrap();
        let before = Utc.with_ymd_and_hms(2025, 2, 27, 12, 0, 0).unwrap();

        let clicks = vec![
            click("qr1", day1),
            click("qr1", day2),
            click("qr1", day2),
            click("sms1", day2),
            click("odd1", day1),
            click("gone", day1),
            click("qr1", before),
        ];

        let ts = bucket_clicks(labels, &links, &clicks);
        assert_eq!(ts.series["qr"], vec![1, 2]);
        assert_eq!(ts.series["sms"], vec![0, 1]);
        assert_eq!(ts.series["link"], vec![2, 0]);
        assert_eq!(ts.series["whatsapp"], vec![0, 0]);
        assert_eq!(ts.totals["qr"], 3);
        assert_eq!(ts.totals["link"], 2);
        assert_eq!(ts.totals.values().sum::<i64>(), 6);
    }
}
