use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use watchtower_client::ClientConfig;
use watchtower_wire::{DateRange, EventTypeFilter};

const DEFAULT_PAGES: usize = 3;

// Dashboard process configuration: the client settings plus what to show.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub client: ClientConfig,
    // Organization whose alert stream is tailed; alerts are off when unset.
    pub organization_id: Option<String>,
    // Upper bound on pages walked per browse pass.
    pub pages: usize,
    pub department: Option<String>,
    pub team: Option<String>,
    pub event_types: EventTypeFilter,
    pub date_range: DateRange,
}

#[derive(Debug, Deserialize, Default)]
struct DashboardConfigOverride {
    organization_id: Option<String>,
    pages: Option<usize>,
    department: Option<String>,
    team: Option<String>,
    event_types: Option<String>,
    dates: Option<String>,
}

impl DashboardConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let client = ClientConfig::from_env_or_yaml(None)?;
        let mut config = Self::from_env(client)?;
        if let Ok(path) = std::env::var("WATCHTOWER_DASHBOARD_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read dashboard config: {path}"))?;
            let override_cfg: DashboardConfigOverride =
                serde_yaml::from_str(&contents).context("parse dashboard config yaml")?;
            override_cfg.apply(&mut config)?;
        }
        Ok(config)
    }

    fn from_env(client: ClientConfig) -> Result<Self> {
        let event_types = match read_string_env("WATCHTOWER_EVENT_TYPES") {
            Some(value) => EventTypeFilter::parse_list(&value)
                .with_context(|| format!("parse WATCHTOWER_EVENT_TYPES={value}"))?,
            None => EventTypeFilter::All,
        };
        Ok(Self {
            client,
            organization_id: read_string_env("WATCHTOWER_ORG_ID"),
            pages: std::env::var("WATCHTOWER_PAGES")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .filter(|value| *value > 0)
                .unwrap_or(DEFAULT_PAGES),
            department: read_string_env("WATCHTOWER_DEPARTMENT"),
            team: read_string_env("WATCHTOWER_TEAM"),
            event_types,
            date_range: read_string_env("WATCHTOWER_DATES")
                .map(|value| DateRange::from_digits(&value))
                .unwrap_or_default(),
        })
    }
}

impl DashboardConfigOverride {
    fn apply(self, config: &mut DashboardConfig) -> Result<()> {
        if let Some(value) = self.organization_id
            && !value.trim().is_empty()
        {
            config.organization_id = Some(value.trim().to_string());
        }
        if let Some(value) = self.pages
            && value > 0
        {
            config.pages = value;
        }
        if let Some(value) = self.department {
            config.department = Some(value).filter(|value| !value.is_empty());
        }
        if let Some(value) = self.team {
            config.team = Some(value).filter(|value| !value.is_empty());
        }
        if let Some(value) = self.event_types {
            config.event_types =
                EventTypeFilter::parse_list(&value).context("parse event_types")?;
        }
        if let Some(value) = self.dates {
            config.date_range = DateRange::from_digits(&value);
        }
        Ok(())
    }
}

fn read_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use watchtower_wire::EventType;

    struct EnvGuard {
        key: &'static str,
        prev: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::set_var(key, value);
            }
            Self { key, prev }
        }

        fn unset(key: &'static str) -> Self {
            let prev = std::env::var(key).ok();
            unsafe {
                std::env::remove_var(key);
            }
            Self { key, prev }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.prev {
                Some(value) => unsafe {
                    std::env::set_var(self.key, value);
                },
                None => unsafe {
                    std::env::remove_var(self.key);
                },
            }
        }
    }

    #[test]
    #[serial]
    fn env_selects_filters() -> Result<()> {
        let _g1 = EnvGuard::set("WATCHTOWER_ORG_ID", "org-3");
        let _g2 = EnvGuard::set("WATCHTOWER_EVENT_TYPES", "logon,device");
        let _g3 = EnvGuard::set("WATCHTOWER_DATES", "2010-01-02 ~ 2010-01-31");
        let _g4 = EnvGuard::unset("WATCHTOWER_DASHBOARD_CONFIG");
        let _g5 = EnvGuard::unset("WATCHTOWER_PAGES");
        let config = DashboardConfig::from_env_or_yaml()?;
        assert_eq!(config.organization_id.as_deref(), Some("org-3"));
        assert_eq!(config.pages, DEFAULT_PAGES);
        assert_eq!(
            config.event_types,
            EventTypeFilter::from_types([EventType::Logon, EventType::Device])
        );
        assert!(config.date_range.from.is_some());
        assert!(config.date_range.to.is_some());
        Ok(())
    }

    #[test]
    #[serial]
    fn bad_event_type_is_an_error() {
        let _g1 = EnvGuard::set("WATCHTOWER_EVENT_TYPES", "logon,telepathy");
        let _g2 = EnvGuard::unset("WATCHTOWER_DASHBOARD_CONFIG");
        let err = DashboardConfig::from_env_or_yaml().expect_err("unknown type");
        assert!(format!("{err:#}").contains("telepathy"));
    }

    #[test]
    #[serial]
    fn yaml_override_applies() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(
            file,
            "organization_id: org-9\npages: 5\ndepartment: Eng\nevent_types: all"
        )?;
        let path = file.path().to_str().context("utf8 path")?;
        let _g1 = EnvGuard::set("WATCHTOWER_DASHBOARD_CONFIG", path);
        let _g2 = EnvGuard::set("WATCHTOWER_EVENT_TYPES", "email");
        let config = DashboardConfig::from_env_or_yaml()?;
        assert_eq!(config.organization_id.as_deref(), Some("org-9"));
        assert_eq!(config.pages, 5);
        assert_eq!(config.department.as_deref(), Some("Eng"));
        assert!(config.event_types.is_all());
        Ok(())
    }
}
