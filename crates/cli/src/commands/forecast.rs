//! Forecast-related CLI commands

use anyhow::{Context, Result};
use planner_lib::Forecast;
use std::path::Path;

use crate::client::{ApiClient, ForecastAccepted};
use crate::output::{print_success, OutputFormat};

/// Read a forecast document from a JSON file
pub fn read_forecast(path: &Path) -> Result<Forecast> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read forecast file {}", path.display()))?;
    let forecast: Forecast = serde_json::from_str(&content).context("Failed to parse forecast")?;
    if forecast.time_window_end <= forecast.time_window_start {
        anyhow::bail!("Forecast window must end after it starts");
    }
    Ok(forecast)
}

/// Push a forecast update to the planner, which re-plans its window
pub async fn push_forecast(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let forecast = read_forecast(path)?;
    let accepted: ForecastAccepted = client.post("api/v1/forecasts", &forecast).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&accepted)?),
        OutputFormat::Table => print_success(&format!(
            "Forecast {} for {} ({} samples) {}",
            accepted.id,
            forecast.service_name,
            forecast.forecasted_values.len(),
            accepted.status
        )),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_forecast_validates_window() {
        let mut good = tempfile::NamedTempFile::new().unwrap();
        write!(
            good,
            r#"{{"service_name": "web",
                "time_window_start": "2024-03-01T00:00:00Z",
                "time_window_end": "2024-03-01T01:00:00Z",
                "forecasted_values": [{{"timestamp": "2024-03-01T00:00:00Z", "requests": 10.0}}]}}"#
        )
        .unwrap();
        let forecast = read_forecast(good.path()).unwrap();
        assert_eq!(forecast.forecasted_values.len(), 1);

        let mut inverted = tempfile::NamedTempFile::new().unwrap();
        write!(
            inverted,
            r#"{{"service_name": "web",
                "time_window_start": "2024-03-01T01:00:00Z",
                "time_window_end": "2024-03-01T00:00:00Z",
                "forecasted_values": []}}"#
        )
        .unwrap();
        assert!(read_forecast(inverted.path()).is_err());
    }
}
