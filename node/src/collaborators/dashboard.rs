use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use sdrcore::dashboard::DashboardClient;
use sdrcore::prelude::{DashboardParameters, NetworkError, PipelineResult};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

const PARAMETER_VARIABLES: [&str; 4] = ["frequency", "seconds", "saveMP3", "emergency"];

/// One data point as the dashboard stores it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub variable: &'static str,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Value>,
}

impl DataPoint {
    fn new(variable: &'static str, value: Value) -> Self {
        Self {
            variable,
            value,
            location: None,
        }
    }

    pub fn emergency(set: bool) -> Self {
        Self::new("emergency", json!(set))
    }

    pub fn location(lat: f64, lon: f64) -> Self {
        Self {
            variable: "location",
            value: json!(format!("{},{}", lat, lon)),
            location: Some(json!({"lat": lat, "lng": lon})),
        }
    }

    pub fn fires_and_rescue(count: u32) -> Self {
        Self::new("fires_and_rescue", json!(count.to_string()))
    }

    pub fn road_incident(item: &str) -> Self {
        Self::new("road_incident", json!(item))
    }

    pub fn recording_status(result: &PipelineResult) -> Self {
        Self::new("recording_status", json!(result.summary()))
    }
}

/// Dashboard reached over its HTTP data API with a device token.
pub struct HttpDashboard {
    client: Client,
    data_url: String,
    device_token: String,
}

impl HttpDashboard {
    pub fn new(base_url: &str, device_token: &str, timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| NetworkError::Request(err.to_string()))?;
        Ok(Self {
            client,
            data_url: format!("{}/data", base_url.trim_end_matches('/')),
            device_token: device_token.to_string(),
        })
    }

    async fn post(&self, points: &[DataPoint]) -> Result<(), NetworkError> {
        let response = self
            .client
            .post(&self.data_url)
            .header("device-token", &self.device_token)
            .json(points)
            .send()
            .await
            .map_err(|err| NetworkError::Request(err.to_string()))?;
        let body = read_body(response).await?;
        debug!("dashboard accepted {} point(s): {}", points.len(), body);
        Ok(())
    }
}

async fn read_body(response: reqwest::Response) -> Result<Value, NetworkError> {
    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::Status(status.as_u16()));
    }
    let body: Value = response
        .json()
        .await
        .map_err(|err| NetworkError::Malformed(err.to_string()))?;
    if body.get("status").and_then(Value::as_bool) == Some(false) {
        return Err(NetworkError::Malformed(format!("request refused: {}", body)));
    }
    Ok(body)
}

/// Picks the recording parameters out of a `last_item` query response.
pub fn parse_parameters(body: &Value) -> Result<DashboardParameters, NetworkError> {
    let items = body
        .get("result")
        .and_then(Value::as_array)
        .ok_or_else(|| NetworkError::Malformed("missing result array".into()))?;
    let lookup = |name: &str| {
        items
            .iter()
            .find(|item| item.get("variable").and_then(Value::as_str) == Some(name))
            .and_then(|item| item.get("value"))
    };

    let frequency_mhz = lookup("frequency")
        .and_then(as_number)
        .filter(|value| value.is_finite())
        .ok_or_else(|| NetworkError::Malformed("frequency missing or not numeric".into()))?;
    let duration_secs = lookup("seconds")
        .and_then(as_number)
        .filter(|value| *value >= 0.0 && *value <= u32::MAX as f64)
        .map(|value| value.round() as u32)
        .ok_or_else(|| NetworkError::Malformed("seconds missing or not numeric".into()))?;

    Ok(DashboardParameters {
        frequency_mhz,
        duration_secs,
        save_to_removable: lookup("saveMP3").and_then(as_flag).unwrap_or(false),
        emergency_flag_set: lookup("emergency").and_then(as_flag).unwrap_or(false),
    })
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::Number(number) => number.as_f64().map(|n| n != 0.0),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

#[async_trait]
impl DashboardClient for HttpDashboard {
    async fn get_parameters(&self) -> Result<DashboardParameters, NetworkError> {
        let mut query: Vec<(&str, &str)> = PARAMETER_VARIABLES
            .iter()
            .map(|name| ("variables[]", *name))
            .collect();
        query.push(("query", "last_item"));

        let response = self
            .client
            .get(&self.data_url)
            .header("device-token", &self.device_token)
            .query(&query)
            .send()
            .await
            .map_err(|err| NetworkError::Request(err.to_string()))?;
        parse_parameters(&read_body(response).await?)
    }

    async fn set_emergency_flag(&self, set: bool) -> Result<(), NetworkError> {
        self.post(&[DataPoint::emergency(set)]).await
    }

    async fn publish_location(&self, lat: f64, lon: f64) -> Result<(), NetworkError> {
        self.post(&[DataPoint::location(lat, lon)]).await
    }

    async fn publish_fire_count(&self, count: u32) -> Result<(), NetworkError> {
        self.post(&[DataPoint::fires_and_rescue(count)]).await
    }

    async fn publish_summary(&self, items: &[String]) -> Result<(), NetworkError> {
        let points: Vec<DataPoint> = items
            .iter()
            .map(|item| DataPoint::road_incident(item))
            .collect();
        self.post(&points).await
    }

    async fn publish_result(&self, result: &PipelineResult) -> Result<(), NetworkError> {
        self.post(&[DataPoint::recording_status(result)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::{Arc, Mutex};
    use warp::Filter;

    #[test]
    fn parameters_accept_numbers_and_strings() {
        let body = json!({
            "status": true,
            "result": [
                {"variable": "seconds", "value": "30"},
                {"variable": "frequency", "value": 101.1},
                {"variable": "saveMP3", "value": "True"},
                {"variable": "emergency", "value": false}
            ]
        });
        assert_eq!(
            parse_parameters(&body).unwrap(),
            DashboardParameters {
                frequency_mhz: 101.1,
                duration_secs: 30,
                save_to_removable: true,
                emergency_flag_set: false,
            }
        );
    }

    #[test]
    fn optional_flags_default_to_false() {
        let body = json!({"result": [
            {"variable": "frequency", "value": "96.5"},
            {"variable": "seconds", "value": 10}
        ]});
        let params = parse_parameters(&body).unwrap();
        assert!(!params.save_to_removable);
        assert!(!params.emergency_flag_set);
    }

    #[test]
    fn missing_frequency_is_malformed() {
        let body = json!({"result": [{"variable": "seconds", "value": 10}]});
        assert!(matches!(
            parse_parameters(&body),
            Err(NetworkError::Malformed(_))
        ));
        assert!(parse_parameters(&json!({"status": true})).is_err());
    }

    #[test]
    fn location_point_carries_coordinates() {
        let point = serde_json::to_value(DataPoint::location(-27.5, 153.25)).unwrap();
        assert_eq!(
            point,
            json!({
                "variable": "location",
                "value": "-27.5,153.25",
                "location": {"lat": -27.5, "lng": 153.25}
            })
        );
        let flag = serde_json::to_value(DataPoint::emergency(false)).unwrap();
        assert_eq!(flag, json!({"variable": "emergency", "value": false}));
    }

    type Posted = Arc<Mutex<Vec<Value>>>;

    fn serve(posted: Posted) -> SocketAddr {
        let read = warp::path("data")
            .and(warp::get())
            .and(warp::header::<String>("device-token"))
            .and(warp::query::<HashMap<String, String>>())
            .map(|token: String, query: HashMap<String, String>| {
                assert_eq!(token, "secret");
                assert_eq!(query.get("query").map(String::as_str), Some("last_item"));
                warp::reply::json(&json!({"status": true, "result": [
                    {"variable": "frequency", "value": "101.1"},
                    {"variable": "seconds", "value": "30"},
                    {"variable": "saveMP3", "value": "true"},
                    {"variable": "emergency", "value": "true"}
                ]}))
            });
        let write = warp::path("data")
            .and(warp::post())
            .and(warp::body::json())
            .map(move |body: Value| {
                posted.lock().unwrap().push(body);
                warp::reply::json(&json!({"status": true, "result": "1 Data Added"}))
            });
        let (addr, server) = warp::serve(read.or(write)).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        addr
    }

    #[tokio::test]
    async fn talks_to_the_data_endpoint() {
        let posted = Posted::default();
        let addr = serve(posted.clone());
        let dashboard =
            HttpDashboard::new(&format!("http://{}/", addr), "secret", Duration::from_secs(5))
                .unwrap();

        let params = dashboard.get_parameters().await.unwrap();
        assert!(params.emergency_flag_set);
        assert_eq!(params.duration_secs, 30);

        dashboard.clear_emergency_flag().await.unwrap();
        dashboard.publish_fire_count(3).await.unwrap();
        dashboard
            .publish_summary(&["Crash on M1 - Springwood 4127".to_string()])
            .await
            .unwrap();

        let posted = posted.lock().unwrap();
        assert_eq!(posted[0], json!([{"variable": "emergency", "value": false}]));
        assert_eq!(
            posted[1],
            json!([{"variable": "fires_and_rescue", "value": "3"}])
        );
        assert_eq!(posted[2][0]["variable"], "road_incident");
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let route = warp::path("data").map(|| {
            warp::reply::with_status("denied", warp::http::StatusCode::UNAUTHORIZED)
        });
        let (addr, server) = warp::serve(route).bind_ephemeral(([127, 0, 0, 1], 0));
        tokio::spawn(server);
        let dashboard =
            HttpDashboard::new(&format!("http://{}", addr), "bad", Duration::from_secs(5)).unwrap();

        assert!(matches!(
            dashboard.get_parameters().await,
            Err(NetworkError::Status(401))
        ));
    }
}
