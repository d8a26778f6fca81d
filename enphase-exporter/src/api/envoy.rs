use std::time::Duration;

use async_trait::async_trait;
use enphase_quantities::{WattHours, Watts};
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::{
    errors::{ConfigError, FetchError},
    prelude::*,
};

/// Source of production readings.
#[async_trait]
pub trait Device: Send + Sync {
    /// Perform exactly one round trip to the device.
    async fn fetch(&self) -> Result<Reading, FetchError>;
}

/// Envoy local API client.
///
/// API: `GET /api/v1/production`, no authentication.
pub struct Client {
    inner: reqwest::Client,
    url: Url,
}

impl Client {
    const PATH: &'static str = "/api/v1/production";

    /// Validate the address and build the client, without touching the network.
    #[instrument(skip_all, fields(address = address))]
    pub fn new(address: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let invalid_address = |reason: String| ConfigError::InvalidAddress {
            address: address.to_owned(),
            reason,
        };
        if address.trim().is_empty() {
            return Err(invalid_address("the address is empty".to_owned()));
        }
        let url = Url::parse(&format!("http://{address}{}", Self::PATH))
            .map_err(|error| invalid_address(error.to_string()))?;
        if url.path() != Self::PATH || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid_address("expected `host[:port]`".to_owned()));
        }
        let inner =
            reqwest::Client::builder().timeout(timeout).build().map_err(ConfigError::HttpClient)?;
        Ok(Self { inner, url })
    }
}

#[async_trait]
impl Device for Client {
    #[instrument(skip_all, fields(url = %self.url))]
    async fn fetch(&self) -> Result<Reading, FetchError> {
        let response =
            self.inner.get(self.url.clone()).send().await.map_err(FetchError::Transport)?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::BadStatus(status.as_u16()));
        }
        let body = response.bytes().await.map_err(FetchError::Transport)?;
        serde_json::from_slice::<Reading>(&body).map_err(FetchError::Decode)
    }
}

/// One complete production reading.
///
/// `wattHoursSevenDays` is also reported, but not used.
#[must_use]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
pub struct Reading {
    #[serde(rename = "wattsNow")]
    pub power_now: Watts,

    /// Resets at the local midnight.
    #[serde(rename = "wattHoursToday")]
    pub energy_today: WattHours,

    /// Expected to grow, but the device doesn't promise that.
    #[serde(rename = "wattHoursLifetime")]
    pub energy_lifetime: WattHours,
}

#[cfg(test)]
mod tests {
    use mockito::Server;
    use tokio::net::TcpListener;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    // language=json
    const BODY: &str = r#"{
        "wattHoursToday": 5585,
        "wattHoursSevenDays": 118960,
        "wattHoursLifetime": 7021969,
        "wattsNow": 3860
    }"#;

    #[tokio::test]
    async fn fetch_ok() -> Result {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v1/production")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(BODY)
            .create_async()
            .await;

        let reading = Client::new(&server.host_with_port(), TIMEOUT)?.fetch().await?;

        assert_eq!(reading.power_now, Watts(3860));
        assert_eq!(reading.energy_today, WattHours(5585));
        assert_eq!(reading.energy_lifetime, WattHours(7_021_969));
        mock.assert_async().await;
        Ok(())
    }

    #[test]
    fn seven_days_is_ignored() -> Result {
        // language=json
        let without = r#"{"wattHoursToday": 5585, "wattHoursLifetime": 7021969, "wattsNow": 3860}"#;
        assert_eq!(serde_json::from_str::<Reading>(BODY)?, serde_json::from_str::<Reading>(without)?);
        Ok(())
    }

    #[test]
    fn zero_readings_ok() -> Result {
        // language=json
        let body = r#"{"wattHoursToday": 0, "wattHoursLifetime": 0, "wattsNow": 0}"#;
        let reading = serde_json::from_str::<Reading>(body)?;
        assert_eq!(reading.power_now, Watts::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn bad_status() -> Result {
        let mut server = Server::new_async().await;
        let _mock =
            server.mock("GET", "/api/v1/production").with_status(500).create_async().await;

        let result = Client::new(&server.host_with_port(), TIMEOUT)?.fetch().await;

        assert!(matches!(result, Err(FetchError::BadStatus(500))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn bad_status_wins_over_valid_body() -> Result {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/production")
            .with_status(503)
            .with_body(BODY)
            .create_async()
            .await;

        let result = Client::new(&server.host_with_port(), TIMEOUT)?.fetch().await;

        assert!(matches!(result, Err(FetchError::BadStatus(503))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body() -> Result {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/production")
            .with_status(200)
            .with_body("<html>maintenance</html>")
            .create_async()
            .await;

        let result = Client::new(&server.host_with_port(), TIMEOUT)?.fetch().await;

        assert!(matches!(result, Err(FetchError::Decode(_))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn missing_field() -> Result {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/production")
            .with_status(200)
            .with_body(r#"{"wattHoursToday": 5585, "wattsNow": 3860}"#)
            .create_async()
            .await;

        let result = Client::new(&server.host_with_port(), TIMEOUT)?.fetch().await;

        assert!(matches!(result, Err(FetchError::Decode(_))), "{result:?}");
        Ok(())
    }

    #[test]
    fn negative_value_is_rejected() {
        // language=json
        let body = r#"{"wattHoursToday": 5585, "wattHoursLifetime": 7021969, "wattsNow": -3}"#;
        assert!(serde_json::from_str::<Reading>(body).is_err());
    }

    #[tokio::test]
    async fn connection_refused() -> Result {
        let address = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
            listener.local_addr()?
        };

        let result = Client::new(&address.to_string(), TIMEOUT)?.fetch().await;

        assert!(matches!(result, Err(FetchError::Transport(_))), "{result:?}");
        Ok(())
    }

    #[tokio::test]
    async fn timeout() -> Result {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        let _silent = tokio::spawn(async move {
            let mut connections = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                connections.push(stream);
            }
        });

        let result = Client::new(&address.to_string(), Duration::from_millis(200))?.fetch().await;

        assert!(matches!(result, Err(FetchError::Transport(_))), "{result:?}");
        Ok(())
    }

    #[test]
    fn empty_address_is_rejected() {
        assert!(matches!(
            Client::new(" ", TIMEOUT),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn address_with_path_is_rejected() {
        assert!(matches!(
            Client::new("192.168.1.10/api", TIMEOUT),
            Err(ConfigError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn address_with_port_ok() -> Result {
        let client = Client::new("envoy.local:8080", TIMEOUT)?;
        assert_eq!(client.url.as_str(), "http://envoy.local:8080/api/v1/production");
        Ok(())
    }
}
