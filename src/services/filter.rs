//! Archive list filtering and sorting
//!
//! Applied in memory to the cached approved listing.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use crate::models::EntryListing;

/// Sort order of the archive list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Title,
    /// Oldest origin first; entries without a usable origin date last
    OriginDate,
}

/// Filter criteria; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArchiveFilter {
    #[serde(default, deserialize_with = "blank_as_none")]
    pub q: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "blank_as_none")]
    pub entry_type: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub city: Option<String>,
    #[serde(default, rename = "location", deserialize_with = "blank_as_none")]
    pub location_name: Option<String>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_date_as_none")]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SortOrder,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

fn blank_date_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match blank_as_none(deserializer)? {
        None => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Reduce a free-text origin date to the first day of the period it names.
///
/// Recognized: `YYYY`, `YYYY-MM`, `YYYY-MM-DD`, `DD.MM.YYYY`, `MM/YYYY`.
pub fn parse_origin_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    let all_digits = |part: &str, len: usize| {
        part.len() == len && part.chars().all(|c| c.is_ascii_digit())
    };

    if all_digits(s, 4) {
        return NaiveDate::from_ymd_opt(s.parse().ok()?, 1, 1);
    }
    if let Some((year, month)) = s.split_once('-') {
        if all_digits(year, 4) && all_digits(month, 2) {
            return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1);
        }
    }
    if let Some((month, year)) = s.split_once('/') {
        if (all_digits(month, 1) || all_digits(month, 2)) && all_digits(year, 4) {
            return NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d.%m.%Y"))
        .ok()
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl ArchiveFilter {
    pub fn has_date_bounds(&self) -> bool {
        self.from.is_some() || self.to.is_some()
    }

    /// Whether one listing passes every criterion
    pub fn matches(&self, listing: &EntryListing) -> bool {
        let entry = &listing.entry;

        if let Some(q) = &self.q {
            let haystack = format!("{} {}", entry.title, entry.description).to_lowercase();
            if !haystack.contains(&q.to_lowercase()) {
                return false;
            }
        }

        if let Some(wanted) = &self.entry_type {
            if !eq_ignore_case(&entry.entry_type.to_string(), wanted) {
                return false;
            }
        }

        if let Some(city) = &self.city {
            let actual = listing.location.as_ref().and_then(|l| l.city.as_deref());
            if !actual.is_some_and(|c| eq_ignore_case(c, city)) {
                return false;
            }
        }

        if let Some(name) = &self.location_name {
            let actual = listing.location.as_ref().map(|l| l.name.as_str());
            if !actual.is_some_and(|n| eq_ignore_case(n, name)) {
                return false;
            }
        }

        if self.has_date_bounds() {
            let Some(date) = entry.origin_date.as_deref().and_then(parse_origin_date) else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) {
                return false;
            }
            if self.to.is_some_and(|to| date > to) {
                return false;
            }
        }

        true
    }

    /// Filter, then sort
    pub fn apply(&self, listings: Vec<EntryListing>) -> Vec<EntryListing> {
        let mut kept: Vec<EntryListing> = listings.into_iter().filter(|l| self.matches(l)).collect();
        sort_listings(&mut kept, self.sort);
        kept
    }
}

pub fn sort_listings(listings: &mut [EntryListing], order: SortOrder) {
    match order {
        SortOrder::Newest => listings.sort_by(|a, b| {
            b.entry
                .created_at
                .cmp(&a.entry.created_at)
                .then(b.entry.id.cmp(&a.entry.id))
        }),
        SortOrder::Oldest => listings.sort_by(|a, b| {
            a.entry
                .created_at
                .cmp(&b.entry.created_at)
                .then(a.entry.id.cmp(&b.entry.id))
        }),
        SortOrder::Title => listings.sort_by_cached_key(|l| l.entry.title.to_lowercase()),
        SortOrder::OriginDate => listings.sort_by_cached_key(|l| {
            let date = l.entry.origin_date.as_deref().and_then(parse_origin_date);
            (date.is_none(), date)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArchiveEntry, EntryStatus, EntryType, Location};
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn listing(id: i64, title: &str, origin: Option<&str>, city: Option<&str>) -> EntryListing {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + Duration::days(id);
        EntryListing {
            entry: ArchiveEntry {
                id,
                title: title.to_string(),
                description: format!("About {}", title),
                entry_type: EntryType::Space,
                keywords: vec![],
                origin_date: origin.map(str::to_string),
                external_links: vec![],
                image_url: None,
                status: EntryStatus::Approved,
                author_id: None,
                location_id: None,
                created_by: None,
                created_at: created,
                updated_at: created,
            },
            author: None,
            location: city.map(|c| Location {
                id,
                name: format!("Place {}", id),
                city: Some(c.to_string()),
                address: None,
                latitude: None,
                longitude: None,
            }),
            cover_url: None,
        }
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_origin_date_patterns() {
        assert_eq!(parse_origin_date("1947"), Some(ymd(1947, 1, 1)));
        assert_eq!(parse_origin_date("1950-06"), Some(ymd(1950, 6, 1)));
        assert_eq!(parse_origin_date("1950-06-17"), Some(ymd(1950, 6, 17)));
        assert_eq!(parse_origin_date("17.06.1950"), Some(ymd(1950, 6, 17)));
        assert_eq!(parse_origin_date("06/1950"), Some(ymd(1950, 6, 1)));
        assert_eq!(parse_origin_date(" 1947 "), Some(ymd(1947, 1, 1)));
        assert_eq!(parse_origin_date("unknown"), None);
        assert_eq!(parse_origin_date("circa 1900"), None);
        assert_eq!(parse_origin_date("1950-13"), None);
        assert_eq!(parse_origin_date(""), None);
    }

    #[test]
    fn test_from_bound_excludes_unparseable_dates() {
        let rows = vec![
            listing(1, "A", Some("1947"), None),
            listing(2, "B", Some("1950-06"), None),
            listing(3, "C", Some("unknown"), None),
        ];
        let filter = ArchiveFilter {
            from: Some(ymd(1948, 1, 1)),
            ..Default::default()
        };

        let kept = filter.apply(rows);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].entry.origin_date.as_deref(), Some("1950-06"));
    }

    #[test]
    fn test_no_bounds_keeps_undated_entries() {
        let rows = vec![listing(1, "A", None, None), listing(2, "B", Some("x"), None)];
        assert_eq!(ArchiveFilter::default().apply(rows).len(), 2);
    }

    #[test]
    fn test_text_type_and_city_filters() {
        let rows = vec![
            listing(1, "Corner Café", None, Some("Wien")),
            listing(2, "Tile Stove", None, Some("Graz")),
        ];

        let by_text = ArchiveFilter { q: Some("café".into()), ..Default::default() };
        assert_eq!(by_text.apply(rows.clone())[0].entry.id, 1);

        let by_city = ArchiveFilter { city: Some("GRAZ".into()), ..Default::default() };
        assert_eq!(by_city.apply(rows.clone())[0].entry.id, 2);

        let by_location = ArchiveFilter { location_name: Some("place 1".into()), ..Default::default() };
        assert_eq!(by_location.apply(rows.clone())[0].entry.id, 1);

        let by_type = ArchiveFilter { entry_type: Some("artifact".into()), ..Default::default() };
        assert!(by_type.apply(rows).is_empty());
    }

    #[test]
    fn test_sort_orders() {
        let rows = vec![
            listing(1, "beta", Some("1960"), None),
            listing(2, "Alpha", None, None),
            listing(3, "gamma", Some("1901-02"), None),
        ];
        let ids = |order: SortOrder| {
            let filter = ArchiveFilter { sort: order, ..Default::default() };
            filter.apply(rows.clone()).iter().map(|l| l.entry.id).collect::<Vec<_>>()
        };

        assert_eq!(ids(SortOrder::Newest), vec![3, 2, 1]);
        assert_eq!(ids(SortOrder::Oldest), vec![1, 2, 3]);
        assert_eq!(ids(SortOrder::Title), vec![2, 1, 3]);
        assert_eq!(ids(SortOrder::OriginDate), vec![3, 1, 2]);
    }

    #[test]
    fn test_filter_deserializes_query_names() {
        let filter: ArchiveFilter = serde_json::from_value(serde_json::json!({
            "q": "  ",
            "type": "Space",
            "location": "Kino",
            "from": "1948-01-01",
            "to": "",
            "sort": "origin_date"
        }))
        .unwrap();

        assert!(filter.q.is_none());
        assert_eq!(filter.entry_type.as_deref(), Some("Space"));
        assert_eq!(filter.location_name.as_deref(), Some("Kino"));
        assert_eq!(filter.from, Some(ymd(1948, 1, 1)));
        assert!(filter.to.is_none());
        assert_eq!(filter.sort, SortOrder::OriginDate);
    }

    proptest! {
        #[test]
        fn prop_year_parses_to_new_year(year in 1000i32..=9999) {
            prop_assert_eq!(parse_origin_date(&year.to_string()), Some(ymd(year, 1, 1)));
        }

        #[test]
        fn prop_month_forms_agree(year in 1000i32..=9999, month in 1u32..=12) {
            let iso = format!("{:04}-{:02}", year, month);
            let slash = format!("{:02}/{:04}", month, year);
            prop_assert_eq!(parse_origin_date(&iso), parse_origin_date(&slash));
            prop_assert_eq!(parse_origin_date(&iso), Some(ymd(year, month, 1)));
        }

        #[test]
        fn prop_filter_never_adds_rows(q in "[a-z]{0,3}", n in 0usize..8) {
            let rows: Vec<_> = (0..n as i64).map(|i| listing(i, &format!("t{}", i), None, None)).collect();
            let filter = ArchiveFilter { q: Some(q), ..Default::default() };
            prop_assert!(filter.apply(rows).len() <= n);
        }
    }
}
