use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::{NarrativeMode, NarrativeSettings};
use crate::detectors::DetectionOutcome;
use crate::error::{ProcessingError, Result};
use crate::models::{Column, Feature, WeatherTable};
use crate::utils::constants::{FLOOD_RISK_HEAVY_DAYS, HEAT_RISK_MEAN_TEMP, HEAVY_PRECIPITATION_MM};

/// Everything a narrator may draw on.
pub struct NarrativeContext<'a> {
    pub table: &'a WeatherTable,
    pub summary: &'a str,
    pub outcome: &'a DetectionOutcome,
}

/// Produces the insights section of a report.
pub trait Narrator {
    fn heading(&self) -> &str;

    fn narrate(&self, context: &NarrativeContext<'_>) -> Result<String>;
}

/// Template narrative with a few threshold rules. Never fails.
#[derive(Debug, Clone, Default)]
pub struct RuleBasedNarrator;

impl RuleBasedNarrator {
    pub fn new() -> Self {
        Self
    }

    pub fn insights(&self, table: &WeatherTable) -> Vec<String> {
        let mut insights = Vec::new();

        let temperatures = table.present_values(Feature::Temperature);
        if !temperatures.is_empty() {
            let mean = temperatures.iter().sum::<f64>() / temperatures.len() as f64;
            if mean > HEAT_RISK_MEAN_TEMP {
                insights.push("Mean temperature is high; possible heat risk.".to_string());
            }
        }

        let heavy_days = table
            .present_values(Feature::Precipitation)
            .into_iter()
            .filter(|p| *p > HEAVY_PRECIPITATION_MM)
            .count();
        if heavy_days > FLOOD_RISK_HEAVY_DAYS {
            insights.push("Several heavy precipitation days; possible flooding risk.".to_string());
        }

        insights
    }
}

impl Narrator for RuleBasedNarrator {
    fn heading(&self) -> &str {
        "Insights"
    }

    fn narrate(&self, context: &NarrativeContext<'_>) -> Result<String> {
        let mut text = String::from(
            "(Insights are generated from built-in rules. \
             Configure an external narrator for deeper analysis.)\n",
        );
        for insight in self.insights(context.table) {
            text.push_str(&format!("- {}\n", insight));
        }
        Ok(text)
    }
}

/// Delegates the narrative to an external program.
///
/// The prompt is written to the program's stdin and its stdout becomes the
/// section text. The run is bounded by `timeout`; the child is killed when
/// the deadline passes.
#[derive(Debug, Clone)]
pub struct CommandNarrator {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandNarrator {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn prompt(context: &NarrativeContext<'_>) -> String {
        let anomalies = if context.outcome.has_anomalies() {
            context
                .outcome
                .anomalies
                .iter()
                .map(|r| {
                    format!(
                        "{}: temperature={}, humidity={}, precipitation={}, wind_speed={}",
                        r.formatted_date(),
                        r.cell(Column::Temperature),
                        r.cell(Column::Humidity),
                        r.cell(Column::Precipitation),
                        r.cell(Column::WindSpeed),
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            "No significant anomalies".to_string()
        };

        format!(
            "Based on the following weather data summary and anomaly analysis, \
             write a professional insights report.\n\
             Summary: {}\n\
             Anomalies:\n{}\n\
             Describe notable trends, patterns and risks.",
            context.summary, anomalies
        )
    }

    async fn run(&self, prompt: String) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that ignores its input may exit before we finish writing
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(ProcessingError::Narrator(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(ProcessingError::Narrator(format!(
                "{} produced no output",
                self.program
            )));
        }
        Ok(text)
    }
}

impl Narrator for CommandNarrator {
    fn heading(&self) -> &str {
        "External Insights"
    }

    fn narrate(&self, context: &NarrativeContext<'_>) -> Result<String> {
        let prompt = Self::prompt(context);
        debug!(program = %self.program, "delegating narrative");

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        runtime.block_on(async {
            tokio::time::timeout(self.timeout, self.run(prompt))
                .await
                .map_err(|_| ProcessingError::NarratorTimeout(self.timeout))?
        })
        .map(|text| format!("{}\n", text))
    }
}

/// Pick the narrator named by the settings.
pub fn narrator_from_settings(settings: &NarrativeSettings) -> Result<Box<dyn Narrator>> {
    match settings.mode {
        NarrativeMode::Rules => Ok(Box::new(RuleBasedNarrator::new())),
        NarrativeMode::Command => {
            let program = settings.command.clone().ok_or_else(|| {
                ProcessingError::Config(
                    "narrative.command is required when narrative.mode = \"command\"".to_string(),
                )
            })?;
            Ok(Box::new(CommandNarrator::new(
                program,
                settings.args.clone(),
                Duration::from_secs(settings.timeout_secs),
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::AnomalyDetector;
    use crate::models::WeatherRecord;
    use chrono::NaiveDate;

    fn hot_wet_table() -> WeatherTable {
        let records = (1..=6)
            .map(|d| {
                let date = NaiveDate::from_ymd_opt(2023, 7, d).unwrap();
                WeatherRecord::new(date, Some(30.0), Some(70.0), Some(25.0), Some(3.0))
            })
            .collect();
        WeatherTable::from_raw_records(records).unwrap()
    }

    #[test]
    fn test_rules_fire_on_heat_and_flooding() {
        let insights = RuleBasedNarrator::new().insights(&hot_wet_table());
        assert_eq!(insights.len(), 2);
        assert!(insights[0].contains("heat risk"));
        assert!(insights[1].contains("flooding risk"));
    }

    #[test]
    fn test_rules_stay_quiet_on_mild_data() {
        let mut table = hot_wet_table();
        for record in table.records_mut() {
            record.temperature = Some(25.0);
        }
        // Three heavy days is not "more than three"
        for record in &mut table.records_mut()[3..] {
            record.precipitation = Some(20.0);
        }
        assert!(RuleBasedNarrator::new().insights(&table).is_empty());
    }

    #[test]
    fn test_prompt_mentions_summary_and_anomalies() {
        let mut table = hot_wet_table();
        let outcome = AnomalyDetector::new().detect(&mut table);
        let context = NarrativeContext {
            table: &table,
            summary: "Average temperature is 30.0°C.",
            outcome: &outcome,
        };

        let prompt = CommandNarrator::prompt(&context);
        assert!(prompt.contains("Summary: Average temperature is 30.0°C."));
        assert!(prompt.contains("Anomalies:"));
    }

    #[test]
    fn test_command_mode_requires_program() {
        let settings = NarrativeSettings {
            mode: NarrativeMode::Command,
            command: None,
            ..NarrativeSettings::default()
        };
        assert!(narrator_from_settings(&settings).is_err());

        let rules = narrator_from_settings(&NarrativeSettings::default()).unwrap();
        assert_eq!(rules.heading(), "Insights");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_narrator_reads_stdout() {
        let narrator = CommandNarrator::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo warm and wet".to_string()],
            Duration::from_secs(10),
        );
        let mut table = hot_wet_table();
        let outcome = AnomalyDetector::new().detect(&mut table);
        let context = NarrativeContext {
            table: &table,
            summary: "summary",
            outcome: &outcome,
        };

        assert_eq!(narrator.narrate(&context).unwrap(), "warm and wet\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_narrator_failures() {
        let table = hot_wet_table();
        let outcome = AnomalyDetector::new().detect(&mut table.clone());
        let context = NarrativeContext {
            table: &table,
            summary: "summary",
            outcome: &outcome,
        };

        let failing = CommandNarrator::new(
            "sh",
            vec!["-c".to_string(), "exit 3".to_string()],
            Duration::from_secs(10),
        );
        assert!(matches!(
            failing.narrate(&context),
            Err(ProcessingError::Narrator(_))
        ));

        let slow = CommandNarrator::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string()],
            Duration::from_millis(200),
        );
        match slow.narrate(&context) {
            Err(err @ ProcessingError::NarratorTimeout(_)) => {
                assert_eq!(err.to_string(), "Narrator timed out after 200 ms")
            }
            other => panic!("unexpected result: {:?}", other),
        }

        let missing = CommandNarrator::new(
            "definitely-not-a-real-narrator-binary",
            vec![],
            Duration::from_secs(1),
        );
        assert!(missing.narrate(&context).is_err());
    }
}
