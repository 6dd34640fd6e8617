use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use csv::StringRecord;

use crate::error::{AttendanceError, AttendanceResult};
use crate::models::RosterRow;

pub const ATTENDANCE_COLUMN: &str = "Attendance:";
pub const EVENT_TYPE_COLUMN: &str = "Operation or training:";

const FETCH_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// HTTP client for sheet exports. Requests give up after `FETCH_TIMEOUT`.
pub fn http_client() -> AttendanceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(AttendanceError::Client)
}

/// Raw roster as exported from the sheet: header row plus text cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterTable {
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl RosterTable {
    pub fn from_reader<R: std::io::Read>(reader: R) -> AttendanceResult<Self> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let records = reader
            .records()
            .collect::<Result<Vec<StringRecord>, csv::Error>>()?;

        Ok(RosterTable { headers, records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn rows(&self) -> AttendanceResult<Vec<RosterRow>> {
        let attendance_idx = self.column(ATTENDANCE_COLUMN);
        let event_type_idx = self.column(EVENT_TYPE_COLUMN);

        let (Some(attendance_idx), Some(event_type_idx)) = (attendance_idx, event_type_idx) else {
            let missing = [
                (ATTENDANCE_COLUMN, attendance_idx),
                (EVENT_TYPE_COLUMN, event_type_idx),
            ]
            .into_iter()
            .filter(|(_, idx)| idx.is_none())
            .map(|(name, _)| name.to_string())
            .collect();
            return Err(AttendanceError::Schema { missing });
        };

        let rows = self
            .records
            .iter()
            .map(|record| RosterRow {
                attendance: record
                    .get(attendance_idx)
                    .filter(|cell| !cell.trim().is_empty())
                    .map(str::to_string),
                event_type: record.get(event_type_idx).unwrap_or("").to_string(),
            })
            .collect();

        Ok(rows)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterSource {
    Url(String),
    File(PathBuf),
}

impl RosterSource {
    pub fn parse(value: &str) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            RosterSource::Url(value.to_string())
        } else {
            RosterSource::File(PathBuf::from(value))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            RosterSource::Url(url) => url.clone(),
            RosterSource::File(path) => path.display().to_string(),
        }
    }

    pub async fn load(&self, client: &reqwest::Client) -> AttendanceResult<RosterTable> {
        match self {
            RosterSource::Url(url) => {
                log::info!("fetching roster from {}", url);
                let fetch_error = |source| AttendanceError::Fetch {
                    url: url.clone(),
                    source,
                };
                let response = client
                    .get(url)
                    .send()
                    .await
                    .and_then(|response| response.error_for_status())
                    .map_err(fetch_error)?;
                let body = response.bytes().await.map_err(fetch_error)?;
                RosterTable::from_reader(body.as_ref())
            }
            RosterSource::File(path) => {
                log::info!("reading roster from {}", path.display());
                let body = tokio::fs::read(path).await?;
                RosterTable::from_reader(body.as_slice())
            }
        }
    }
}

/// Keeps the last fetched roster for `ttl` after `fetched_at`.
#[derive(Debug, Clone)]
pub struct RosterCache {
    ttl: Duration,
    fetched_at: Option<DateTime<Utc>>,
    table: Option<RosterTable>,
}

impl RosterCache {
    pub fn new(ttl: Duration) -> Self {
        RosterCache {
            ttl,
            fetched_at: None,
            table: None,
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            // An expiry past the representable range never expires.
            Some(fetched_at) if self.table.is_some() => fetched_at
                .checked_add_signed(self.ttl)
                .map_or(true, |expires_at| now < expires_at),
            _ => false,
        }
    }

    pub fn get(&self, now: DateTime<Utc>) -> Option<&RosterTable> {
        if self.is_fresh(now) {
            self.table.as_ref()
        } else {
            None
        }
    }

    pub fn store(&mut self, table: RosterTable, now: DateTime<Utc>) {
        self.fetched_at = Some(now);
        self.table = Some(table);
    }

    pub async fn load(
        &mut self,
        source: &RosterSource,
        client: &reqwest::Client,
        now: DateTime<Utc>,
    ) -> AttendanceResult<RosterTable> {
        if let Some(table) = self.get(now) {
            log::debug!("roster cache hit ({} rows)", table.len());
            return Ok(table.clone());
        }

        log::debug!("roster cache miss for {}", source.describe());
        let table = source.load(client).await?;
        log::info!("loaded {} roster rows", table.len());
        self.store(table.clone(), now);
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const ROSTER: &str = "Timestamp,Attendance:,Operation or training:\n\
        2024-01-06,\"Alice, Bob\",Operation Alpha\n\
        2024-01-13,Alice,Training Beta\n\
        2024-01-20,,Operation Gamma\n";

    fn table(csv: &str) -> RosterTable {
        RosterTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn projects_required_columns() {
        let rows = table(ROSTER).rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].attendance.as_deref(), Some("Alice, Bob"));
        assert_eq!(rows[0].event_type, "Operation Alpha");
        assert_eq!(rows[2].attendance, None);
    }

    #[test]
    fn short_records_are_tolerated() {
        let rows = table("Attendance:,Operation or training:\nAlice\n")
            .rows()
            .unwrap();
        assert_eq!(rows[0].attendance.as_deref(), Some("Alice"));
        assert_eq!(rows[0].event_type, "");
    }

    #[test]
    fn missing_columns_are_schema_errors() {
        let err = table("Attendance:,Type\nAlice,Operation\n").rows().unwrap_err();
        match err {
            AttendanceError::Schema { missing } => {
                assert_eq!(missing, vec![EVENT_TYPE_COLUMN.to_string()])
            }
            other => panic!("unexpected error {other:?}"),
        }

        let err = table("Name,Kind\n").rows().unwrap_err();
        match err {
            AttendanceError::Schema { missing } => assert_eq!(missing.len(), 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn column_match_is_case_sensitive() {
        let err = table("attendance:,Operation or training:\n").rows().unwrap_err();
        assert!(err.is_schema());
    }

    #[test]
    fn header_only_table_has_no_rows() {
        let roster = table("Attendance:,Operation or training:\n");
        assert!(roster.is_empty());
        assert!(roster.rows().unwrap().is_empty());
    }

    #[test]
    fn parses_sources() {
        assert_eq!(
            RosterSource::parse("https://example.com/export?format=csv"),
            RosterSource::Url("https://example.com/export?format=csv".to_string())
        );
        assert_eq!(
            RosterSource::parse("data/roster.csv"),
            RosterSource::File(PathBuf::from("data/roster.csv"))
        );
    }

    #[test]
    fn cache_expires_after_ttl() {
        let start = Utc::now();
        let mut cache = RosterCache::new(Duration::hours(1));
        assert!(!cache.is_fresh(start));

        cache.store(table(ROSTER), start);
        assert_eq!(cache.fetched_at(), Some(start));
        assert!(cache.get(start + Duration::minutes(59)).is_some());
        assert!(cache.get(start + Duration::hours(1)).is_none());
    }

    #[test]
    fn zero_ttl_never_serves_cached_rows() {
        let now = Utc::now();
        let mut cache = RosterCache::new(Duration::zero());
        cache.store(table(ROSTER), now);
        assert!(cache.get(now).is_none());
    }

    #[tokio::test]
    async fn loads_file_source_through_cache() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{ROSTER}").unwrap();

        let source = RosterSource::File(file.path().to_path_buf());
        let client = http_client().unwrap();
        let now = Utc::now();
        let mut cache = RosterCache::new(Duration::hours(1));

        let first = cache.load(&source, &client, now).await.unwrap();
        assert_eq!(first.len(), 3);

        // A cache hit does not touch the file again.
        std::fs::write(file.path(), "Attendance:,Operation or training:\n").unwrap();
        let second = cache.load(&source, &client, now).await.unwrap();
        assert_eq!(second, first);

        let refreshed = cache
            .load(&source, &client, now + Duration::hours(2))
            .await
            .unwrap();
        assert!(refreshed.is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let source = RosterSource::File(PathBuf::from("/nonexistent/roster.csv"));
        let err = source.load(&http_client().unwrap()).await.unwrap_err();
        assert!(matches!(err, AttendanceError::Io(_)));
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let now = Utc::now();
        let mut cache = RosterCache::new(Duration::seconds(9_000_000_000_000));
        cache.store(table(ROSTER), now);
        assert!(cache.is_fresh(now));
        assert!(cache.get(now + Duration::days(365)).is_some());
    }

    #[tokio::test]
    async fn loads_url_source() {
        let addr = test_support::serve_roster(ROSTER).await;
        let source = RosterSource::Url(format!("http://{addr}/roster.csv"));

        let roster = source.load(&http_client().unwrap()).await.unwrap();
        assert_eq!(roster.len(), 3);
        assert_eq!(roster.rows().unwrap()[1].event_type, "Training Beta");
    }

    #[tokio::test]
    async fn error_status_is_fetch_error() {
        let addr = test_support::serve_roster(ROSTER).await;
        let url = format!("http://{addr}/missing.csv");
        let source = RosterSource::Url(url.clone());

        let err = source.load(&http_client().unwrap()).await.unwrap_err();
        match err {
            AttendanceError::Fetch { url: failed, source } => {
                assert_eq!(failed, url);
                assert_eq!(source.status(), Some(reqwest::StatusCode::NOT_FOUND));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
