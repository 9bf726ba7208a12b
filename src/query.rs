use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Query parameters that are not dimension filters.
pub const RESERVED_PARAMS: &[&str] = &[
    "format",
    "lang",
    "language",
    "geoLevel",
    "time",
    "sinceTimePeriod",
    "untilTimePeriod",
    "lastTimePeriod",
];

/// Geographic aggregation level accepted by the `geoLevel` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoLevel {
    Aggregate,
    Country,
    Nuts1,
    Nuts2,
    Nuts3,
    City,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 6] = [
        GeoLevel::Aggregate,
        GeoLevel::Country,
        GeoLevel::Nuts1,
        GeoLevel::Nuts2,
        GeoLevel::Nuts3,
        GeoLevel::City,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeoLevel::Aggregate => "aggregate",
            GeoLevel::Country => "country",
            GeoLevel::Nuts1 => "nuts1",
            GeoLevel::Nuts2 => "nuts2",
            GeoLevel::Nuts3 => "nuts3",
            GeoLevel::City => "city",
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        GeoLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| {
                let valid: Vec<&str> = GeoLevel::ALL.iter().map(|l| l.as_str()).collect();
                Error::invalid(format!(
                    "invalid geo level '{s}', must be one of: {}",
                    valid.join(", ")
                ))
            })
    }
}

/// How to select time periods. At most one selection applies per query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSpec {
    /// Explicit periods like `2020`, `2020-Q1`, `2020-M03`.
    Periods(Vec<String>),
    /// Inclusive range; either bound may be open.
    Range {
        since: Option<String>,
        until: Option<String>,
    },
    /// The N most recent periods.
    Last(u32),
}

impl TimeSpec {
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        match self {
            TimeSpec::Periods(periods) => periods
                .iter()
                .map(|p| ("time".to_string(), p.clone()))
                .collect(),
            TimeSpec::Range { since, until } => {
                let mut out = Vec::new();
                if let Some(s) = since {
                    out.push(("sinceTimePeriod".to_string(), s.clone()));
                }
                if let Some(u) = until {
                    out.push(("untilTimePeriod".to_string(), u.clone()));
                }
                out
            }
            TimeSpec::Last(n) => vec![("lastTimePeriod".to_string(), n.to_string())],
        }
    }
}

/// Filters for a statistics-API data request.
///
/// ```
/// # use eustat_rs::{DataQuery, TimeSpec};
/// let q = DataQuery::new()
///     .filter("geo", ["FR", "DE"])?
///     .filter("unit", ["CP_MEUR"])?
///     .time(TimeSpec::Last(3));
/// assert!(q.to_query_params().contains(&("geo".into(), "DE".into())));
/// # Ok::<(), eustat_rs::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQuery {
    geo_level: Option<GeoLevel>,
    time: Option<TimeSpec>,
    filters: Vec<(String, String)>,
}

const TIME_CONFLICT: &str = "only one time parameter allowed, except sinceTimePeriod and untilTimePeriod can be used together";

impl DataQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geo_level(mut self, level: GeoLevel) -> Self {
        self.geo_level = Some(level);
        self
    }

    /// Replace any previous time selection.
    pub fn time(mut self, time: TimeSpec) -> Self {
        self.time = Some(time);
        self
    }

    /// Restrict a dimension to the given category codes (one request parameter per value).
    pub fn filter<I, S>(mut self, dimension: &str, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let dimension = dimension.trim();
        if dimension.is_empty() {
            return Err(Error::invalid("dimension name must not be empty"));
        }
        if RESERVED_PARAMS.contains(&dimension) {
            return Err(Error::invalid(format!(
                "'{dimension}' is not a dimension filter; use the dedicated time/geo level setters"
            )));
        }
        for v in values {
            self.filters.push((dimension.to_string(), v.into()));
        }
        Ok(self)
    }

    /// Add one raw `key=value` parameter, the way it would appear in the request URL.
    ///
    /// Time parameters are validated as a group: only `sinceTimePeriod` and
    /// `untilTimePeriod` may be combined, `time` may repeat. `format`/`lang` are fixed by
    /// the client and are ignored here.
    pub fn param(mut self, key: &str, value: &str) -> Result<Self> {
        match key {
            "format" | "lang" | "language" => {
                log::debug!("ignoring fixed parameter {key}={value}");
            }
            "geoLevel" => self.geo_level = Some(value.parse()?),
            "time" => {
                let slot = self
                    .time
                    .get_or_insert_with(|| TimeSpec::Periods(Vec::new()));
                let TimeSpec::Periods(periods) = slot else {
                    return Err(Error::invalid(TIME_CONFLICT));
                };
                periods.push(value.to_string());
            }
            "sinceTimePeriod" | "untilTimePeriod" => {
                let slot = self.time.get_or_insert_with(|| TimeSpec::Range {
                    since: None,
                    until: None,
                });
                let TimeSpec::Range { since, until } = slot else {
                    return Err(Error::invalid(TIME_CONFLICT));
                };
                let field = if key == "sinceTimePeriod" { since } else { until };
                *field = Some(value.to_string());
            }
            "lastTimePeriod" => {
                if self.time.is_some() {
                    return Err(Error::invalid(TIME_CONFLICT));
                }
                let n = value.trim().parse::<u32>().map_err(|_| {
                    Error::invalid(format!("lastTimePeriod must be a positive integer, got '{value}'"))
                })?;
                self.time = Some(TimeSpec::Last(n));
            }
            dim => self = self.filter(dim, [value])?,
        }
        Ok(self)
    }

    /// Request parameters in emission order: format, language, geo level, time, filters.
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("format".to_string(), "JSON".to_string()),
            ("lang".to_string(), "EN".to_string()),
        ];
        if let Some(level) = self.geo_level {
            params.push(("geoLevel".to_string(), level.as_str().to_string()));
        }
        if let Some(time) = &self.time {
            params.extend(time.to_query_params());
        }
        params.extend(self.filters.iter().cloned());
        params
    }

    /// Product of the requested value counts per filtered dimension, if any are filtered.
    ///
    /// Unfiltered dimensions are unbounded, so this is a lower bound on the cell count.
    pub fn filtered_cardinality(&self) -> Option<usize> {
        if self.filters.is_empty() {
            return None;
        }
        let mut per_dim: Vec<(&str, usize)> = Vec::new();
        for (dim, _) in &self.filters {
            match per_dim.iter_mut().find(|(d, _)| d == dim) {
                Some((_, n)) => *n += 1,
                None => per_dim.push((dim.as_str(), 1)),
            }
        }
        Some(per_dim.iter().map(|(_, n)| *n).product())
    }
}

/// Deterministic cache key for a request: `url?k=v&...` with sorted parameters.
pub fn cache_key(url: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();
    let joined: Vec<String> = sorted.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{url}?{}", joined.join("&"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has(params: &[(String, String)], k: &str, v: &str) -> bool {
        params.iter().any(|(pk, pv)| pk == k && pv == v)
    }

    #[test]
    fn always_requests_english_json() {
        let p = DataQuery::new().to_query_params();
        assert_eq!(p[0], ("format".to_string(), "JSON".to_string()));
        assert_eq!(p[1], ("lang".to_string(), "EN".to_string()));
    }

    #[test]
    fn multiple_values_become_repeated_params() {
        let p = DataQuery::new()
            .filter("geo", ["SE", "NO"])
            .unwrap()
            .time(TimeSpec::Periods(vec!["2020".into(), "2021".into()]))
            .to_query_params();
        assert!(has(&p, "geo", "SE"));
        assert!(has(&p, "geo", "NO"));
        assert!(has(&p, "time", "2020"));
        assert!(has(&p, "time", "2021"));
    }

    #[test]
    fn raw_params_allow_since_until_pair() {
        let q = DataQuery::new()
            .param("sinceTimePeriod", "2015")
            .unwrap()
            .param("untilTimePeriod", "2020")
            .unwrap();
        let p = q.to_query_params();
        assert!(has(&p, "sinceTimePeriod", "2015"));
        assert!(has(&p, "untilTimePeriod", "2020"));
    }

    #[test]
    fn raw_params_reject_other_time_combinations() {
        let err = DataQuery::new()
            .param("time", "2020")
            .unwrap()
            .param("lastTimePeriod", "5")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));

        let err = DataQuery::new()
            .param("lastTimePeriod", "5")
            .unwrap()
            .param("sinceTimePeriod", "2015")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidParameter(_)));
    }

    #[test]
    fn invalid_geo_level_is_rejected() {
        assert!(matches!(
            "planet".parse::<GeoLevel>(),
            Err(Error::InvalidParameter(_))
        ));
        let q = DataQuery::new().param("geoLevel", "nuts2").unwrap();
        assert!(has(&q.to_query_params(), "geoLevel", "nuts2"));
    }

    #[test]
    fn reserved_names_are_not_dimensions() {
        assert!(DataQuery::new().filter("time", ["2020"]).is_err());
        assert!(DataQuery::new().filter(" ", ["x"]).is_err());
    }

    #[test]
    fn cache_key_ignores_param_order() {
        let a = DataQuery::new()
            .filter("geo", ["SE"])
            .unwrap()
            .filter("unit", ["EUR"])
            .unwrap();
        let b = DataQuery::new()
            .filter("unit", ["EUR"])
            .unwrap()
            .filter("geo", ["SE"])
            .unwrap();
        let ka = cache_key("http://test.com/data/x", &a.to_query_params());
        let kb = cache_key("http://test.com/data/x", &b.to_query_params());
        assert_eq!(ka, kb);
        assert!(ka.starts_with("http://test.com/data/x?"));
        assert!(ka.contains("geo=SE"));
        assert!(ka.contains("format=JSON"));
    }

    #[test]
    fn cardinality_multiplies_filtered_dimensions() {
        let q = DataQuery::new()
            .filter("geo", ["SE", "NO", "DK"])
            .unwrap()
            .filter("unit", ["EUR", "USD"])
            .unwrap();
        assert_eq!(q.filtered_cardinality(), Some(6));
        assert_eq!(DataQuery::new().filtered_cardinality(), None);
    }
}
