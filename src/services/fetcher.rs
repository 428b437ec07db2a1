use crate::constants::{CUSTOM_SERVER_OPTION, SERVER_LIST_COLUMNS, SERVER_LIST_HEADER};
use crate::error::{AppError, Result};
use crate::models::{BoundingBox, Coordinates, ServerRecord};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::time::Duration;
use time::OffsetDateTime;

/// Source of the published server list.
#[async_trait]
pub trait ServerListFetcher: Send + Sync {
    /// Download and parse the list. Never returns an empty list.
    async fn fetch(&self, url: &str) -> Result<Vec<ServerRecord>>;
}

#[derive(Clone)]
pub struct HttpServerListFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpServerListFetcher {
    pub fn new(timeout_secs: u64) -> Self {
        HttpServerListFetcher {
            client: Client::new(),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[async_trait]
impl ServerListFetcher for HttpServerListFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<ServerRecord>> {
        tracing::debug!("Downloading server list from {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let msg = if e.is_timeout() {
                    "Request timed out".to_string()
                } else {
                    format!("Request failed: {}", e)
                };
                tracing::warn!("Unable to download server list: {}", msg);
                AppError::FetchFailure(msg)
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Server list download returned HTTP {}", status);
            return Err(AppError::FetchFailure(format!("HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::FetchFailure(format!("Failed to read response: {}", e)))?;

        let servers = parse_server_list(&body, fetch_timestamp())?;
        tracing::debug!("Servers: {}", servers.len());
        Ok(servers)
    }
}

/// Current time truncated to milliseconds, the precision the store keeps.
pub fn fetch_timestamp() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_millisecond(now.millisecond()).unwrap_or(now)
}

/// Parse the CSV server list.
///
/// Header rows (column 0 equal to `Region`) are skipped. Any malformed row
/// fails the whole list; so does an empty list or a repeated region name.
pub fn parse_server_list(body: &str, fetched_at: OffsetDateTime) -> Result<Vec<ServerRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());

    let mut servers = Vec::new();
    let mut seen_regions = HashSet::new();

    for (index, record) in reader.records().enumerate() {
        let line = index + 1;
        let record = record
            .map_err(|e| AppError::FetchFailure(format!("Malformed CSV at row {}: {}", line, e)))?;

        if record.iter().all(str::is_empty) {
            continue;
        }
        if record
            .get(0)
            .is_some_and(|first| first.eq_ignore_ascii_case(SERVER_LIST_HEADER))
        {
            continue;
        }

        let server = parse_row(&record, line, fetched_at)?;
        if !seen_regions.insert(server.region.clone()) {
            return Err(AppError::FetchFailure(format!(
                "Duplicate region '{}' at row {}",
                server.region, line
            )));
        }
        servers.push(server);
    }

    if servers.is_empty() {
        return Err(AppError::FetchFailure(
            "Server list contains no servers".to_string(),
        ));
    }

    Ok(servers)
}

fn parse_row(
    record: &csv::StringRecord,
    line: usize,
    fetched_at: OffsetDateTime,
) -> Result<ServerRecord> {
    if record.len() != SERVER_LIST_COLUMNS {
        return Err(AppError::FetchFailure(format!(
            "Row {} has {} columns, expected {}",
            line,
            record.len(),
            SERVER_LIST_COLUMNS
        )));
    }

    let number = |col: usize| -> Result<f64> {
        record[col].parse::<f64>().map_err(|_| {
            AppError::FetchFailure(format!(
                "Row {} column {}: '{}' is not a number",
                line,
                col + 1,
                &record[col]
            ))
        })
    };
    let point = |lat_col: usize, lng_col: usize| -> Result<Coordinates> {
        Coordinates::new(number(lat_col)?, number(lng_col)?)
            .map_err(|e| AppError::FetchFailure(format!("Row {}: {}", line, e)))
    };

    let region = record[0].to_string();
    if region.is_empty() {
        return Err(AppError::FetchFailure(format!("Row {} has no region", line)));
    }
    if region.eq_ignore_ascii_case(CUSTOM_SERVER_OPTION) {
        return Err(AppError::FetchFailure(format!(
            "Row {}: '{}' is reserved for the custom server entry",
            line, region
        )));
    }

    let lower_left = point(1, 2)?;
    let upper_right = point(3, 4)?;
    let center = point(5, 6)?;

    let base_url = record[7].to_string();
    if base_url.is_empty() {
        return Err(AppError::FetchFailure(format!(
            "Row {} ('{}') has no base URL",
            line, region
        )));
    }

    Ok(ServerRecord {
        id: None,
        region,
        updated_at: fetched_at,
        bounds: Some(BoundingBox::from_corners(&lower_left, &upper_right)),
        center: Some(center),
        base_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Region,LowerLeftLat,LowerLeftLon,UpperRightLat,UpperRightLon,CenterLat,CenterLon,BaseURL
Tampa,27.5,-82.9,28.3,-82.1,27.95,-82.45,http://tampa.example.org/otp
Portland,45.2,-123.2,45.7,-122.3,45.52,-122.68,http://portland.example.org/otp
";

    fn ts() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    #[test]
    fn parses_rows_and_skips_header() {
        let servers = parse_server_list(SAMPLE, ts()).unwrap();
        assert_eq!(servers.len(), 2);

        let tampa = &servers[0];
        assert_eq!(tampa.region, "Tampa");
        assert_eq!(tampa.id, None);
        assert_eq!(tampa.updated_at, ts());
        assert_eq!(tampa.base_url, "http://tampa.example.org/otp");
        let bounds = tampa.bounds.unwrap();
        assert_eq!((bounds.min_lat, bounds.max_lat), (27.5, 28.3));
        assert_eq!((bounds.min_lng, bounds.max_lng), (-82.9, -82.1));
        assert_eq!(tampa.center, Some(Coordinates::new(27.95, -82.45).unwrap()));
        assert_eq!(servers[1].region, "Portland");
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let body = "REGION,a,b,c,d,e,f,g\nTampa,27.5,-82.9,28.3,-82.1,27.95,-82.45,http://t\n";
        assert_eq!(parse_server_list(body, ts()).unwrap().len(), 1);
    }

    #[test]
    fn swapped_corners_are_normalized() {
        let body = "Tampa,28.3,-82.1,27.5,-82.9,27.95,-82.45,http://t\n";
        let bounds = parse_server_list(body, ts()).unwrap()[0].bounds.unwrap();
        assert_eq!(bounds.min_lat, 27.5);
        assert_eq!(bounds.max_lng, -82.1);
    }

    #[test]
    fn quoted_fields_and_whitespace() {
        let body = "\"Tampa, FL\", 27.5 , -82.9 , 28.3 , -82.1 , 27.95 , -82.45 , http://t \n";
        let servers = parse_server_list(body, ts()).unwrap();
        assert_eq!(servers[0].region, "Tampa, FL");
        assert_eq!(servers[0].base_url, "http://t");
    }

    #[test]
    fn wrong_column_count_fails_whole_list() {
        let body = format!("{SAMPLE}Broken,1,2,3\n");
        let err = parse_server_list(&body, ts()).unwrap_err();
        assert!(matches!(err, AppError::FetchFailure(ref m) if m.contains("columns")), "{err}");
    }

    #[test]
    fn non_numeric_coordinate_fails() {
        let body = "Tampa,north,-82.9,28.3,-82.1,27.95,-82.45,http://t\n";
        assert!(parse_server_list(body, ts()).is_err());
    }

    #[test]
    fn out_of_range_coordinate_fails() {
        let body = "Tampa,95.0,-82.9,28.3,-82.1,27.95,-82.45,http://t\n";
        assert!(parse_server_list(body, ts()).is_err());
    }

    #[test]
    fn header_only_is_empty_failure() {
        let body = "Region,a,b,c,d,e,f,g\n";
        assert!(matches!(
            parse_server_list(body, ts()),
            Err(AppError::FetchFailure(_))
        ));
        assert!(parse_server_list("", ts()).is_err());
    }

    #[test]
    fn duplicate_regions_fail() {
        let body = format!("{SAMPLE}Tampa,1,1,2,2,1.5,1.5,http://dup\n");
        let err = parse_server_list(&body, ts()).unwrap_err();
        assert!(err.to_string().contains("Duplicate region"), "{err}");
    }

    #[test]
    fn custom_entry_name_is_not_a_region() {
        let body = format!("{SAMPLE}custom server,1,1,2,2,1.5,1.5,http://c\n");
        let err = parse_server_list(&body, ts()).unwrap_err();
        assert!(err.to_string().contains("reserved"), "{err}");
    }

    #[test]
    fn fetch_timestamp_has_millisecond_precision() {
        let ts = fetch_timestamp();
        assert_eq!(ts.nanosecond() % 1_000_000, 0);
    }
}
