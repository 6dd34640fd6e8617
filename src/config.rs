use std::path::Path;

use serde::Deserialize;

use crate::error::{AttendanceError, AttendanceResult};

pub const DEFAULT_CACHE_TTL_SECS: i64 = 3600;
/// One week.
pub const MAX_CACHE_TTL_SECS: i64 = 7 * 24 * 3600;
pub const DEFAULT_PRESET: &str = "30";

const FORM_URL: &str = "https://docs.google.com/forms/d/e/1FAIpQLScdtQchZhAaH_Y6wDvgHCw2O_GTsOgfC97YK_Dn4i5cBGrTpg/viewform";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Rounding {
    #[default]
    HalfEven,
    HalfUp,
}

/// What the overall attendance count is divided by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Denominator {
    #[default]
    MaxOperationAttendance,
    DistinctEventTypes,
    EventTypeRows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Name,
    CountDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(default)]
pub struct AggregationSettings {
    pub rounding: Rounding,
    pub denominator: Denominator,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8501,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DashboardConfig {
    pub title: String,
    pub sheet_url: String,
    #[serde(default = "default_form_url")]
    pub form_url: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
    #[serde(default)]
    pub aggregation: AggregationSettings,
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_form_url() -> String {
    FORM_URL.to_string()
}

fn default_cache_ttl_secs() -> i64 {
    DEFAULT_CACHE_TTL_SECS
}

impl DashboardConfig {
    pub fn preset(name: &str) -> AttendanceResult<Self> {
        let (title, sheet_url, denominator) = match name {
            "30" => (
                "30 Attendance Report",
                "https://docs.google.com/spreadsheets/d/1fC_SgPyV7vEhS6lHimtaKLWDizrbMugU8LxYATHPkdE/export?format=csv&gid=361858897",
                Denominator::MaxOperationAttendance,
            ),
            "45-yankee" => (
                "45 Yankee Attendance Report",
                "https://docs.google.com/spreadsheets/d/1JZsnrbtk2y4hUrdEFkS9-zhlkiFzOKGjcju0QbYd3Hw/export?format=csv&gid=1607918864",
                Denominator::DistinctEventTypes,
            ),
            other => {
                return Err(AttendanceError::Config(format!(
                    "unknown preset '{other}' (expected 30 or 45-yankee)"
                )))
            }
        };

        Ok(DashboardConfig {
            title: title.to_string(),
            sheet_url: sheet_url.to_string(),
            form_url: default_form_url(),
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            aggregation: AggregationSettings {
                denominator,
                ..AggregationSettings::default()
            },
            server: ServerSettings::default(),
        })
    }

    pub fn from_toml(contents: &str) -> AttendanceResult<Self> {
        let config: DashboardConfig =
            toml::from_str(contents).map_err(|err| AttendanceError::Config(err.to_string()))?;
        if !(0..=MAX_CACHE_TTL_SECS).contains(&config.cache_ttl_secs) {
            return Err(AttendanceError::Config(format!(
                "cache_ttl_secs must be between 0 and {MAX_CACHE_TTL_SECS}, got {}",
                config.cache_ttl_secs
            )));
        }
        Ok(config)
    }

    pub fn load(path: &Path) -> AttendanceResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::try_seconds(self.cache_ttl_secs.clamp(0, MAX_CACHE_TTL_SECS))
            .unwrap_or_else(chrono::Duration::zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn presets_carry_variant_constants() {
        let thirty = DashboardConfig::preset("30").unwrap();
        assert_eq!(thirty.title, "30 Attendance Report");
        assert_eq!(
            thirty.aggregation.denominator,
            Denominator::MaxOperationAttendance
        );
        assert_eq!(thirty.cache_ttl_secs, 3600);

        let yankee = DashboardConfig::preset("45-yankee").unwrap();
        assert!(yankee.sheet_url.contains("1JZsnrbtk2y4hUrdEFkS9"));
        assert_eq!(
            yankee.aggregation.denominator,
            Denominator::DistinctEventTypes
        );
        assert_eq!(yankee.form_url, thirty.form_url);
    }

    #[test]
    fn unknown_preset_is_config_error() {
        let err = DashboardConfig::preset("99").unwrap_err();
        assert!(matches!(err, AttendanceError::Config(_)));
    }

    #[test]
    fn toml_fills_defaults() {
        let config = DashboardConfig::from_toml(
            r#"
            title = "Unit Report"
            sheet_url = "https://example.com/roster.csv"

            [aggregation]
            rounding = "half-up"
            denominator = "event-type-rows"
            "#,
        )
        .unwrap();

        assert_eq!(config.cache_ttl_secs, DEFAULT_CACHE_TTL_SECS);
        assert_eq!(config.form_url, FORM_URL);
        assert_eq!(config.aggregation.rounding, Rounding::HalfUp);
        assert_eq!(config.aggregation.denominator, Denominator::EventTypeRows);
        assert_eq!(config.aggregation.order, SortOrder::Name);
        assert_eq!(config.server, ServerSettings::default());
    }

    #[test]
    fn rejects_negative_ttl_and_bad_policy() {
        let negative = DashboardConfig::from_toml(
            r#"
            title = "x"
            sheet_url = "y"
            cache_ttl_secs = -5
            "#,
        );
        assert!(negative.is_err());

        let bad_policy = DashboardConfig::from_toml(
            r#"
            title = "x"
            sheet_url = "y"
            [aggregation]
            denominator = "times-ten"
            "#,
        );
        assert!(matches!(bad_policy, Err(AttendanceError::Config(_))));
    }

    #[test]
    fn rejects_ttl_beyond_maximum() {
        for ttl in ["604801", "9000000000000", "9223372036854775807"] {
            let config = DashboardConfig::from_toml(&format!(
                "title = \"x\"\nsheet_url = \"y\"\ncache_ttl_secs = {ttl}\n"
            ));
            assert!(matches!(config, Err(AttendanceError::Config(_))), "ttl {ttl}");
        }

        let week = DashboardConfig::from_toml(
            "title = \"x\"\nsheet_url = \"y\"\ncache_ttl_secs = 604800\n",
        )
        .unwrap();
        assert_eq!(week.cache_ttl(), chrono::Duration::weeks(1));
    }

    #[test]
    fn cache_ttl_is_clamped_for_hand_built_configs() {
        let mut config = DashboardConfig::preset("30").unwrap();
        config.cache_ttl_secs = i64::MAX;
        assert_eq!(
            config.cache_ttl(),
            chrono::Duration::seconds(MAX_CACHE_TTL_SECS)
        );
        config.cache_ttl_secs = -1;
        assert_eq!(config.cache_ttl(), chrono::Duration::zero());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "title = \"File Report\"\nsheet_url = \"roster.csv\"\ncache_ttl_secs = 60\n\n[server]\nport = 9000"
        )
        .unwrap();

        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.title, "File Report");
        assert_eq!(config.cache_ttl(), chrono::Duration::seconds(60));
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
