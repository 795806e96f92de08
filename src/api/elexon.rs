//! [Elexon BMRS](https://data.elexon.co.uk/bmrs/api/v1) balancing data client.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_with::serde_as;
use ureq::Agent;

use crate::{
    core::fetcher::{AcceptanceSource, RawRecord},
    prelude::*,
};

pub const DEFAULT_URL: &str = "https://data.elexon.co.uk/bmrs/api/v1/balancing/bid-offer/all";

/// Some endpoints refuse obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

pub struct Api {
    client: Agent,
    url: String,
    user_agent: String,
}

impl Api {
    pub fn new(url: impl Into<String>, timeout: Duration, user_agent: impl Into<String>) -> Self {
        let client = Agent::config_builder().timeout_global(Some(timeout)).build().into();
        Self { client, url: url.into(), user_agent: user_agent.into() }
    }
}

impl AcceptanceSource for Api {
    #[instrument(skip_all, fields(date = %date, period = period))]
    fn get_period(&self, date: NaiveDate, period: u8) -> Result<Vec<RawRecord>> {
        debug!("fetching…");
        let records = self
            .client
            .get(&self.url)
            .query("settlementDate", date.to_string())
            .query("settlementPeriod", period.to_string())
            .query("format", "json")
            .header("User-Agent", self.user_agent.as_str())
            .call()
            .with_context(|| format!("failed to call `{}`", self.url))?
            .body_mut()
            .read_json::<Response>()
            .context("failed to deserialize the response")?
            .data;
        debug!(n_records = records.len(), "fetched");
        Ok(records)
    }
}

#[serde_as]
#[derive(Deserialize)]
struct Response {
    /// Entries that are not JSON objects carry no acceptance and are skipped.
    #[serde_as(as = "serde_with::VecSkipError<_>")]
    data: Vec<RawRecord>,
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, Server};
    use serde_json::Value;

    use super::*;

    const PATH: &str = "/balancing/bid-offer/all";

    fn api(server: &Server) -> Api {
        Api::new(format!("{}{PATH}", server.url()), Duration::from_secs(5), "curtail-test")
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 24).unwrap()
    }

    #[test]
    fn test_get_period_ok() -> Result {
        let mut server = Server::new();
        let mock = server
            .mock("GET", PATH)
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("settlementDate".into(), "2024-01-24".into()),
                Matcher::UrlEncoded("settlementPeriod".into(), "7".into()),
                Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .match_header("user-agent", "curtail-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            // language=JSON
            .with_body(
                r#"{
                    "data": [
                        {
                            "settlementDate": "2024-01-24",
                            "settlementPeriod": 7,
                            "timeFrom": "2024-01-24T03:00:00Z",
                            "timeTo": "2024-01-24T03:30:00Z",
                            "levelFrom": -250,
                            "levelTo": -250,
                            "nationalGridBmUnit": "HOWAO-1",
                            "bmUnit": "T_HOWAO-1"
                        },
                        "garbage"
                    ]
                }"#,
            )
            .create();

        let records = api(&server).get_period(date(), 7)?;
        mock.assert();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("bmUnit"), Some(&Value::from("T_HOWAO-1")));
        assert_eq!(records[0].get("levelFrom"), Some(&Value::from(-250)));
        Ok(())
    }

    #[test]
    fn test_get_period_error_status() {
        let mut server = Server::new();
        let mock = server.mock("GET", PATH).match_query(Matcher::Any).with_status(503).create();
        assert!(api(&server).get_period(date(), 1).is_err());
        mock.assert();
    }

    #[test]
    fn test_get_period_malformed_body() {
        let mut server = Server::new();
        let mock = server
            .mock("GET", PATH)
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(r#"{"error": "no data array here"}"#)
            .create();
        assert!(api(&server).get_period(date(), 1).is_err());
        mock.assert();
    }

    #[test]
    #[ignore = "makes the API request"]
    fn test_get_period_live() -> Result {
        let records = Api::new(DEFAULT_URL, Duration::from_secs(10), DEFAULT_USER_AGENT)
            .get_period(date(), 20)?;
        assert!(!records.is_empty());
        Ok(())
    }
}
